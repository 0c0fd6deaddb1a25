use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the coordinator should do with a moderated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    /// Publish the message unchanged.
    Allow,
    /// Publish the rewritten message.
    Modify,
    /// Drop the message and notify the sender.
    Block,
    /// Publish unchanged; the concern is only recorded.
    Warn,
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Modify => write!(f, "modify"),
            Self::Block => write!(f, "block"),
            Self::Warn => write!(f, "warn"),
        }
    }
}

/// The outcome of running one message through a
/// [`ModerationStrategy`](crate::ModerationStrategy).
///
/// Verdicts are produced fresh per call and never mutated afterwards; the
/// coordinator attaches them to the published event as `moderation_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationVerdict {
    /// Text as it was handed to the strategy.
    pub original_message: String,
    /// Text after the strategy's rewrites. Empty for blocked messages.
    pub modified_message: String,
    pub action: ModerationAction,
    /// Human-readable explanation.
    pub reason: String,
    /// Strategy-defined confidence in `[0, 1]`.
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    /// Name of the strategy that produced the verdict.
    pub strategy_used: String,
}

impl ModerationVerdict {
    pub fn new(
        action: ModerationAction,
        original: impl Into<String>,
        modified: impl Into<String>,
        reason: impl Into<String>,
        confidence: f64,
        strategy: impl Into<String>,
    ) -> Self {
        Self {
            original_message: original.into(),
            modified_message: modified.into(),
            action,
            reason: reason.into(),
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: Utc::now(),
            strategy_used: strategy.into(),
        }
    }

    /// Allow `text` unchanged.
    pub fn allow(
        text: &str,
        reason: impl Into<String>,
        confidence: f64,
        strategy: impl Into<String>,
    ) -> Self {
        Self::new(ModerationAction::Allow, text, text, reason, confidence, strategy)
    }

    /// Allow `text` unchanged but record a concern.
    pub fn warn(
        text: &str,
        reason: impl Into<String>,
        confidence: f64,
        strategy: impl Into<String>,
    ) -> Self {
        Self::new(ModerationAction::Warn, text, text, reason, confidence, strategy)
    }

    /// Reject `text` outright.
    pub fn block(
        text: &str,
        reason: impl Into<String>,
        confidence: f64,
        strategy: impl Into<String>,
    ) -> Self {
        Self::new(ModerationAction::Block, text, "", reason, confidence, strategy)
    }

    pub fn is_blocked(&self) -> bool {
        self.action == ModerationAction::Block
    }

    /// The text that should be published for this verdict, or `None` when
    /// the message must not be published at all.
    ///
    /// Only `Modify` publishes the rewritten text; `Allow` and `Warn` publish
    /// the sender's original text even when `modified_message` differs.
    pub fn effective_text(&self) -> Option<&str> {
        match self.action {
            ModerationAction::Block => None,
            ModerationAction::Modify => Some(&self.modified_message),
            ModerationAction::Allow | ModerationAction::Warn => Some(&self.original_message),
        }
    }
}
