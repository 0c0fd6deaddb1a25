use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Process-wide delivery counters shared by the bus and every mailbox.
#[derive(Debug, Default)]
pub struct BusMetrics {
    published: AtomicU64,
    ingress_dropped: AtomicU64,
    dispatched: AtomicU64,
    mailbox_dropped: AtomicU64,
    send_failures: AtomicU64,
    handler_panics: AtomicU64,
    slow_handlers: AtomicU64,
}

/// Point-in-time copy of [`BusMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BusMetricsSnapshot {
    /// Events accepted into the ingress queue.
    pub published: u64,
    /// Events refused because the ingress queue was full.
    pub ingress_dropped: u64,
    /// Events the fan-out task has finished delivering.
    pub dispatched: u64,
    /// Events refused by a full subscriber mailbox.
    pub mailbox_dropped: u64,
    /// Transport sends that failed and closed their mailbox.
    pub send_failures: u64,
    /// Subscriber `receive` calls that panicked.
    pub handler_panics: u64,
    /// Subscriber `receive` calls that exceeded the slow-handler threshold.
    #[serde(default)]
    pub slow_handlers: u64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ingress_drop(&self) {
        self.ingress_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_mailbox_drop(&self) {
        self.mailbox_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_handler_panic(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_slow_handler(&self) {
        self.slow_handlers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BusMetricsSnapshot {
        BusMetricsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            ingress_dropped: self.ingress_dropped.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            mailbox_dropped: self.mailbox_dropped.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            slow_handlers: self.slow_handlers.load(Ordering::Relaxed),
        }
    }
}
