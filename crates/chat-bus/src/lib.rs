//! In-process publish/subscribe event bus for chat events.
//!
//! Publishers hand [`ChatEvent`]s to an [`EventBus`]; a single fan-out task
//! delivers each event to every registered [`Subscriber`]. Connected clients
//! subscribe through a [`Mailbox`], a bounded queue with its own drain task,
//! so a slow or dead transport never stalls the bus or other clients.
//!
//! ```text
//! publish ─► [ingress queue] ─► fan-out ─┬─► Mailbox ─► drain ─► transport
//!                                        ├─► Mailbox ─► drain ─► transport
//!                                        └─► stats / logging / transcript
//! ```
//!
//! Every queue is bounded and every overflow is a counted drop, never a wait.

pub mod bus;
pub mod error;
pub mod event;
pub mod mailbox;
pub mod metrics;
pub mod subscriber;

pub use bus::{EventBus, DEFAULT_INGRESS_CAPACITY, SLOW_HANDLER_THRESHOLD};
pub use error::BusError;
pub use event::{ChatEvent, EventKind, SubscriberId};
pub use mailbox::{Mailbox, DEFAULT_MAILBOX_CAPACITY};
pub use metrics::{BusMetrics, BusMetricsSnapshot};
pub use subscriber::{LoggingSubscriber, Subscriber};
