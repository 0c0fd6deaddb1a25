use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::aggregator::StatsAggregator;

/// Log a statistics snapshot every `interval` until the task is aborted.
///
/// The first report is emitted one full interval after start.
pub fn spawn_reporter(stats: Arc<StatsAggregator>, interval: Duration) -> JoinHandle<()> {
    let interval = interval.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let snap = stats.snapshot();
            let active_users = serde_json::to_string(&snap.most_active_users).unwrap_or_default();
            info!(
                total_messages = snap.total_messages,
                total_unique_users = snap.total_unique_users,
                uptime_minutes = format_args!("{:.1}", snap.uptime_secs / 60.0),
                active_users = %active_users,
                "chat statistics"
            );
        }
    })
}
