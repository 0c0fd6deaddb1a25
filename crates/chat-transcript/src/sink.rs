use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chat_bus::{ChatEvent, Subscriber};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::record::TranscriptRecord;
use crate::writer::{TranscriptConfig, TranscriptWriteError, TranscriptWriter};

const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Default)]
struct GapCounters {
    /// Drops not yet attached to a written record.
    pending: AtomicU64,
    total: AtomicU64,
}

/// Bus subscriber that records every event to a JSON-lines file.
///
/// Receiving only queues the record; a background task does the file I/O.
/// When the queue is full the event is dropped and the next record that
/// gets through carries the count in `dropped_before`, so the file shows
/// exactly where it has holes.
///
/// The writer task flushes and exits once every handle to the sink is gone.
pub struct TranscriptSink {
    tx: mpsc::Sender<TranscriptRecord>,
    gaps: Arc<GapCounters>,
}

impl TranscriptSink {
    pub const ID: &'static str = "transcript";

    /// Open the transcript and spawn its writer task.
    pub async fn start(
        config: TranscriptConfig,
    ) -> Result<(Arc<Self>, JoinHandle<()>), TranscriptWriteError> {
        let (tx, rx) = mpsc::channel::<TranscriptRecord>(config.queue_capacity);
        let writer = TranscriptWriter::open(config).await?;
        let gaps = Arc::new(GapCounters::default());

        let handle = tokio::spawn(run_writer_loop(writer, rx, Arc::clone(&gaps)));

        Ok((Arc::new(Self { tx, gaps }), handle))
    }

    /// Queue `event` for writing without waiting.
    pub fn record(&self, event: &ChatEvent) {
        let mut record = TranscriptRecord::new(event);
        record.dropped_before = self.gaps.pending.swap(0, Ordering::AcqRel);

        let (record, reason) = match self.tx.try_send(record) {
            Ok(()) => return,
            Err(TrySendError::Full(record)) => (record, "transcript queue full"),
            Err(TrySendError::Closed(record)) => (record, "transcript writer stopped"),
        };

        self.gaps
            .pending
            .fetch_add(record.dropped_before + 1, Ordering::AcqRel);
        let total = self.gaps.total.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(kind = %record.event.kind, total_dropped = total, "{reason}, event not recorded");
    }

    /// Events that never reached the transcript.
    pub fn dropped(&self) -> u64 {
        self.gaps.total.load(Ordering::Relaxed)
    }
}

impl Subscriber for TranscriptSink {
    fn receive(&self, event: Arc<ChatEvent>) {
        self.record(&event);
    }
}

async fn run_writer_loop(
    mut writer: TranscriptWriter,
    mut rx: mpsc::Receiver<TranscriptRecord>,
    gaps: Arc<GapCounters>,
) {
    let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut unflushed = 0usize;

    loop {
        tokio::select! {
            next = rx.recv() => {
                let Some(record) = next else { break };
                if record.has_gap() {
                    tracing::warn!(dropped = record.dropped_before, "transcript gap before record {}", record.id);
                }
                match writer.write(&record).await {
                    Ok(()) => unflushed += 1,
                    Err(err) => tracing::error!(%err, kind = %record.event.kind, "transcript record lost"),
                }
            }
            _ = ticker.tick(), if unflushed > 0 => {
                match writer.flush().await {
                    Ok(()) => {
                        tracing::debug!(records = unflushed, "transcript flushed");
                        unflushed = 0;
                    }
                    Err(err) => tracing::error!(%err, "transcript flush failed"),
                }
            }
        }
    }

    let trailing = gaps.pending.swap(0, Ordering::AcqRel);
    if trailing > 0 {
        if let Err(err) = writer.write(&TranscriptRecord::trailing_gap(trailing)).await {
            tracing::error!(%err, dropped = trailing, "could not record trailing transcript gap");
        }
    }
    if let Err(err) = writer.flush().await {
        tracing::error!(%err, "final transcript flush failed");
    }
    tracing::debug!(path = %writer.path().display(), "transcript writer stopped");
}
