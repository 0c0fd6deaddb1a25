//! Append-only JSON-lines transcript of everything published on the chat
//! bus.
//!
//! Each event becomes one newline-terminated JSON object, producing a
//! [JSON Lines](https://jsonlines.org/) file that is easy to grep and replay.
//! Events dropped under back-pressure leave a `dropped_before` count on the
//! next line, and the live file can be rotated by size.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use chat_bus::{EventBus, SubscriberId};
//! use chat_transcript::{TranscriptConfig, TranscriptSink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (bus, _bus_handle) = EventBus::start(1000);
//! let (transcript, _writer) = TranscriptSink::start(
//!     TranscriptConfig::new("logs/transcript.jsonl").with_rotation(10 * 1024 * 1024, 5),
//! )
//! .await?;
//! bus.subscribe(SubscriberId::from(TranscriptSink::ID), transcript);
//! # Ok(())
//! # }
//! ```

pub mod record;
pub mod sink;
pub mod writer;

pub use record::TranscriptRecord;
pub use sink::TranscriptSink;
pub use writer::{rotated_path, TranscriptConfig, TranscriptWriteError, TranscriptWriter};
