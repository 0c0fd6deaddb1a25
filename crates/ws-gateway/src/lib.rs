//! WebSocket transport for the chat server.
//!
//! ```text
//! Client  <--WS-->  ws-gateway  -->  Session::handle_inbound  -->  EventBus
//!    ^                                                               |
//!    +-----------------------  Mailbox drain  <----------------------+
//! ```
//!
//! Each connection is split: the read half feeds the session, the write half
//! is wrapped as a `Sink<String>` and handed to the session's mailbox. The
//! session is torn down when the read half ends, whether by close frame or
//! error.

pub mod listener;

pub use listener::Gateway;
