/// Reasons an event was not accepted by [`EventBus::publish`](crate::EventBus::publish).
///
/// Both cases are already logged and counted by the bus; callers are free to
/// ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("event bus ingress queue is full ({capacity} events); event dropped")]
    IngressFull { capacity: usize },

    #[error("event bus fan-out task has stopped; event dropped")]
    Stopped,
}
