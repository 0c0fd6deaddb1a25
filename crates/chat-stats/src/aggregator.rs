use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use chat_bus::{ChatEvent, EventKind, Subscriber};
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Default)]
struct Counters {
    total_messages: u64,
    total_unique_users: u64,
    messages_per_hour: BTreeMap<u32, u64>,
    user_joins: BTreeMap<String, u64>,
}

/// Point-in-time copy of the aggregator's counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_messages: u64,
    /// Join events seen. Reconnects count again.
    pub total_unique_users: u64,
    /// Message counts keyed by UTC hour of day (0-23).
    pub messages_per_hour: BTreeMap<u32, u64>,
    /// Join counts per username.
    pub most_active_users: BTreeMap<String, u64>,
    pub uptime_secs: f64,
}

/// Counts messages and joins as they pass through the bus.
///
/// Counters are cumulative for the life of the process; leaving does not
/// decrement anything.
pub struct StatsAggregator {
    counters: RwLock<Counters>,
    started: Instant,
}

impl StatsAggregator {
    pub const ID: &'static str = "stats";

    pub fn new() -> Self {
        Self {
            counters: RwLock::new(Counters::default()),
            started: Instant::now(),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Apply one event to the counters.
    pub fn record(&self, event: &ChatEvent) {
        match event.kind {
            EventKind::Message => {
                let hour = event.timestamp.hour();
                let mut c = self.write();
                c.total_messages += 1;
                *c.messages_per_hour.entry(hour).or_insert(0) += 1;
            }
            EventKind::UserJoin => {
                let key = event
                    .username
                    .clone()
                    .or_else(|| event.origin.as_ref().map(|id| id.to_string()));
                let mut c = self.write();
                c.total_unique_users += 1;
                if let Some(key) = key {
                    *c.user_joins.entry(key).or_insert(0) += 1;
                }
            }
            EventKind::UserLeave => {}
            EventKind::System => {
                debug!(text = %event.text, "system event observed");
            }
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let c = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        StatsSnapshot {
            total_messages: c.total_messages,
            total_unique_users: c.total_unique_users,
            messages_per_hour: c.messages_per_hour.clone(),
            most_active_users: c.user_joins.clone(),
            uptime_secs: self.started.elapsed().as_secs_f64(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Counters> {
        self.counters.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscriber for StatsAggregator {
    fn receive(&self, event: Arc<ChatEvent>) {
        self.record(&event);
    }
}
