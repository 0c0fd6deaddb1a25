//! # chat-moderation
//!
//! Pluggable content moderation for outgoing chat messages.
//!
//! The crate is organised in layers:
//!
//! 1. **[`wordlists`]** -- built-in word catalogues.
//! 2. **[`leaf`]** and **[`composite`]** -- the [`ModerationStrategy`]
//!    implementations: word replacement, strict blocking, warning, and an
//!    ordered chain of those.
//! 3. **[`schema`]** / **[`loader`]** -- an optional YAML policy that
//!    overrides the word lists and chain order.
//! 4. **[`context`]** -- the swappable active strategy plus verdict counters.
//!
//! ## Quick start
//!
//! ```rust
//! use chat_moderation::{ModerationAction, ModerationContext, StrategyKind};
//!
//! let ctx = ModerationContext::default();
//! let verdict = ctx.moderate("eres tonto");
//! assert_eq!(verdict.action, ModerationAction::Modify);
//! assert_eq!(verdict.modified_message, "eres ***");
//!
//! ctx.set_strategy(StrategyKind::StrictBlocking);
//! assert!(ctx.moderate("this is spam content").is_blocked());
//! ```

pub mod composite;
pub mod context;
pub mod leaf;
pub mod loader;
pub mod schema;
pub mod strategy;
pub mod verdict;
pub mod wordlists;

pub use composite::CompositeStrategy;
pub use context::{ModerationContext, ModerationStats};
pub use leaf::{StrictBlockingStrategy, WarningStrategy, WordReplacementStrategy};
pub use schema::ModerationPolicy;
pub use strategy::{ModerationStrategy, StrategyKind, UnknownStrategy};
pub use verdict::{ModerationAction, ModerationVerdict};
