//! Chat session coordinator.
//!
//! [`ChatServer`] sits between a transport and the event bus. For each
//! connection it allocates an `obs_<n>` identity, subscribes a bounded
//! [`Mailbox`](chat_bus::Mailbox) for outbound delivery, and returns a
//! [`Session`] that moderates and publishes whatever the client sends.
//!
//! The transport is anything that can take outbound `String` frames as a
//! [`futures_util::Sink`] and hand inbound payloads to
//! [`Session::handle_inbound`]. Administrative operations live in
//! [`admin`], both as direct methods and as a serde-tagged [`AdminCommand`].

pub mod admin;
pub mod coordinator;
pub mod inbound;

pub use admin::{AdminCommand, AdminError, AdminResponse};
pub use coordinator::{ChatServer, ChatServerConfig, Session};
pub use inbound::InboundMessage;
