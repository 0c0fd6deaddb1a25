use std::sync::Arc;

use tracing::info;

use crate::event::ChatEvent;

/// Something that wants to observe every event published on the bus.
///
/// `receive` is called from the bus's single fan-out task, once per event,
/// in publish order. It must not block or perform I/O: implementations that
/// need to do slow work hand the event to their own queue (see
/// [`Mailbox`](crate::Mailbox)) and return. Calls longer than
/// [`SLOW_HANDLER_THRESHOLD`](crate::SLOW_HANDLER_THRESHOLD) show up in
/// `BusMetricsSnapshot::slow_handlers`.
///
/// A panic inside `receive` is caught by the bus and does not affect other
/// subscribers.
pub trait Subscriber: Send + Sync {
    fn receive(&self, event: Arc<ChatEvent>);
}

/// Writes every event to the `tracing` log at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSubscriber;

impl LoggingSubscriber {
    pub const ID: &'static str = "logger";
}

impl Subscriber for LoggingSubscriber {
    fn receive(&self, event: Arc<ChatEvent>) {
        info!(
            kind = %event.kind,
            username = event.username.as_deref().unwrap_or("-"),
            origin = event.origin.as_ref().map(|id| id.as_str()).unwrap_or("-"),
            text = %event.text,
            "chat event"
        );
    }
}
