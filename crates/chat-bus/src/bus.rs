use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::BusError;
use crate::event::{ChatEvent, SubscriberId};
use crate::metrics::BusMetrics;
use crate::subscriber::Subscriber;

/// Default size of the ingress queue between publishers and the fan-out task.
pub const DEFAULT_INGRESS_CAPACITY: usize = 1000;

/// A `receive` call taking longer than this is logged and counted as slow.
/// Every handler runs on the fan-out task, so a slow one delays the rest.
pub const SLOW_HANDLER_THRESHOLD: Duration = Duration::from_millis(10);

type Registry = RwLock<HashMap<SubscriberId, Arc<dyn Subscriber>>>;

/// Cloneable handle to the event bus.
///
/// Publishing never waits: events go into a bounded ingress queue and a
/// single background task fans each one out to every registered
/// [`Subscriber`]. When the queue is full the event is dropped, logged and
/// counted.
///
/// The fan-out task exits once every `EventBus` clone has been dropped and
/// the queue is drained.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<ChatEvent>,
    capacity: usize,
    registry: Arc<Registry>,
    metrics: Arc<BusMetrics>,
}

impl EventBus {
    /// Spawn the fan-out task and return a `(bus, join_handle)` pair.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(capacity: usize) -> (Self, JoinHandle<()>) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel::<ChatEvent>(capacity);
        let registry: Arc<Registry> = Arc::new(RwLock::new(HashMap::new()));
        let metrics = Arc::new(BusMetrics::new());

        let handle = tokio::spawn(run_fan_out(
            rx,
            Arc::clone(&registry),
            Arc::clone(&metrics),
        ));

        info!(capacity, "event bus started");

        (
            Self {
                tx,
                capacity,
                registry,
                metrics,
            },
            handle,
        )
    }

    /// Register `handler` under `id`, replacing any previous registration.
    pub fn subscribe(&self, id: SubscriberId, handler: Arc<dyn Subscriber>) {
        let replaced = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), handler)
            .is_some();
        debug!(subscriber_id = %id, replaced, "subscriber registered");
    }

    /// Remove the registration for `id`. No-op if absent.
    pub fn unsubscribe(&self, id: &SubscriberId) {
        let removed = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some();
        if removed {
            debug!(subscriber_id = %id, "subscriber removed");
        }
    }

    /// Queue `event` for fan-out without waiting.
    ///
    /// Delivery is at most once. A full queue drops the event; the drop is
    /// logged and counted before the error is returned.
    pub fn publish(&self, event: ChatEvent) -> Result<(), BusError> {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.metrics.record_published();
                Ok(())
            }
            Err(TrySendError::Full(event)) => {
                self.metrics.record_ingress_drop();
                warn!(
                    kind = %event.kind,
                    capacity = self.capacity,
                    "event bus ingress full, event dropped"
                );
                Err(BusError::IngressFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(event)) => {
                self.metrics.record_ingress_drop();
                warn!(kind = %event.kind, "event bus stopped, event dropped");
                Err(BusError::Stopped)
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_subscribed(&self, id: &SubscriberId) -> bool {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Shared counters. Mailboxes are started with this handle so their
    /// drops and send failures land in the same place.
    pub fn metrics(&self) -> &Arc<BusMetrics> {
        &self.metrics
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Fan-out loop executed inside the background task.
///
/// Each event's timestamp is clamped to the previous one so every
/// subscriber sees a non-decreasing sequence, then the event is frozen in an
/// `Arc` and handed to a snapshot of the registry. Registry changes made
/// while a snapshot is being delivered apply from the next event on.
async fn run_fan_out(
    mut rx: mpsc::Receiver<ChatEvent>,
    registry: Arc<Registry>,
    metrics: Arc<BusMetrics>,
) {
    let mut last_timestamp: Option<DateTime<Utc>> = None;

    while let Some(mut event) = rx.recv().await {
        if let Some(prev) = last_timestamp {
            if event.timestamp < prev {
                event.timestamp = prev;
            }
        }
        last_timestamp = Some(event.timestamp);
        let event = Arc::new(event);

        let targets: Vec<(SubscriberId, Arc<dyn Subscriber>)> = registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, handler)| (id.clone(), Arc::clone(handler)))
            .collect();

        for (id, handler) in targets {
            let delivery = Arc::clone(&event);
            let started = Instant::now();
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler.receive(delivery))) {
                metrics.record_handler_panic();
                error!(
                    subscriber_id = %id,
                    panic = panic_message(panic.as_ref()),
                    "subscriber panicked while receiving event"
                );
            }

            let elapsed = started.elapsed();
            if elapsed > SLOW_HANDLER_THRESHOLD {
                metrics.record_slow_handler();
                warn!(
                    subscriber_id = %id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "subscriber blocked the fan-out task"
                );
            }
        }

        metrics.record_dispatched();
    }

    debug!("event bus fan-out task shutting down");
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    struct Counter(std::sync::atomic::AtomicUsize);

    impl Subscriber for Counter {
        fn receive(&self, _event: Arc<ChatEvent>) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn subscribe_is_idempotent_by_id() {
        let (bus, _handle) = EventBus::start(8);
        let id = SubscriberId::from("obs_1");
        let counter = Arc::new(Counter(Default::default()));

        bus.subscribe(id.clone(), counter.clone());
        bus.subscribe(id.clone(), counter.clone());
        assert_eq!(bus.subscriber_count(), 1);

        bus.unsubscribe(&id);
        bus.unsubscribe(&id);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(!bus.is_subscribed(&id));
    }

    #[tokio::test]
    async fn publish_after_shutdown_reports_stopped() {
        let (bus, handle) = EventBus::start(8);
        handle.abort();
        let _ = handle.await;

        let err = bus.publish(ChatEvent::new(EventKind::System, "late")).unwrap_err();
        assert_eq!(err, BusError::Stopped);
        assert_eq!(bus.metrics().snapshot().ingress_dropped, 1);
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(boxed.as_ref()), "<non-string panic payload>");
    }
}
