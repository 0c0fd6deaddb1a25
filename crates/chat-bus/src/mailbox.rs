use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::event::{ChatEvent, SubscriberId};
use crate::metrics::BusMetrics;
use crate::subscriber::Subscriber;

/// Default number of events a mailbox buffers before dropping.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 100;

struct Shared {
    closed: AtomicBool,
    wake: Notify,
    dropped: AtomicU64,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns `true` if this call performed the transition.
    fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        if first {
            self.wake.notify_one();
        }
        first
    }
}

/// Bounded outbound queue for one subscriber, drained by its own task.
///
/// The bus only ever calls [`enqueue`](Self::enqueue), which never waits, so
/// a slow transport can only hurt its own subscriber. Overflow drops the
/// event for this subscriber alone.
///
/// Closing is idempotent. Once [`close`](Self::close) returns, the drain
/// task starts no further sends. A failed send closes the mailbox from the
/// inside; the owner learns about the dead connection from its read side.
pub struct Mailbox {
    id: SubscriberId,
    tx: mpsc::Sender<Arc<ChatEvent>>,
    capacity: usize,
    shared: Arc<Shared>,
    metrics: Arc<BusMetrics>,
}

impl Mailbox {
    /// Spawn the drain task for `sink` and return a `(mailbox, join_handle)`
    /// pair.
    ///
    /// Each queued event is serialised to its JSON wire form and sent as one
    /// `String`. The sink is closed when the drain task ends.
    pub fn start<S>(
        id: SubscriberId,
        sink: S,
        capacity: usize,
        metrics: Arc<BusMetrics>,
    ) -> (Self, JoinHandle<()>)
    where
        S: Sink<String> + Send + 'static,
        S::Error: Display,
    {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel::<Arc<ChatEvent>>(capacity);
        let shared = Arc::new(Shared {
            closed: AtomicBool::new(false),
            wake: Notify::new(),
            dropped: AtomicU64::new(0),
        });

        let handle = tokio::spawn(run_drain(
            id.clone(),
            Box::pin(sink),
            rx,
            Arc::clone(&shared),
            Arc::clone(&metrics),
        ));

        (
            Self {
                id,
                tx,
                capacity,
                shared,
                metrics,
            },
            handle,
        )
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Append `event` without waiting. Dropped (and counted) when the queue
    /// is full; ignored once the mailbox is closed.
    pub fn enqueue(&self, event: Arc<ChatEvent>) {
        if self.shared.is_closed() {
            return;
        }

        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_mailbox_drop();
                warn!(
                    subscriber_id = %self.id,
                    kind = %event.kind,
                    capacity = self.capacity,
                    "mailbox full, event dropped"
                );
            }
            // Drain task already gone.
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Stop the drain task. Safe to call any number of times, from any
    /// thread, whether or not the drain task ever ran.
    pub fn close(&self) {
        if self.shared.close() {
            debug!(subscriber_id = %self.id, "mailbox closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Events this mailbox dropped because its queue was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Subscriber for Mailbox {
    fn receive(&self, event: Arc<ChatEvent>) {
        if event.is_for(&self.id) {
            self.enqueue(event);
        }
    }
}

impl Drop for Mailbox {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Core loop executed inside the drain task.
async fn run_drain<S>(
    id: SubscriberId,
    mut sink: std::pin::Pin<Box<S>>,
    mut rx: mpsc::Receiver<Arc<ChatEvent>>,
    shared: Arc<Shared>,
    metrics: Arc<BusMetrics>,
) where
    S: Sink<String> + Send + 'static,
    S::Error: Display,
{
    loop {
        let event = tokio::select! {
            biased;
            _ = shared.wake.notified() => break,
            next = rx.recv() => match next {
                Some(event) => event,
                None => break,
            },
        };

        let frame = match event.to_wire() {
            Ok(frame) => frame,
            Err(err) => {
                error!(subscriber_id = %id, %err, "failed to serialise event");
                continue;
            }
        };

        if shared.is_closed() {
            break;
        }

        if let Err(err) = sink.send(frame).await {
            metrics.record_send_failure();
            warn!(subscriber_id = %id, %err, "transport send failed, closing mailbox");
            shared.close();
            break;
        }
    }

    rx.close();
    if let Err(err) = sink.close().await {
        debug!(subscriber_id = %id, %err, "transport close failed");
    }
    debug!(subscriber_id = %id, "mailbox drain task finished");
}
