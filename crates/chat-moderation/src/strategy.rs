use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::verdict::ModerationVerdict;

/// A pluggable moderation rule.
///
/// Implementations are synchronous and must not perform I/O: they run on the
/// session's read task for every inbound message. The only state a strategy
/// may consult is its own configuration (word lists, member order).
pub trait ModerationStrategy: Send + Sync {
    /// Evaluate `text` and produce a fresh verdict.
    fn moderate(&self, text: &str) -> ModerationVerdict;

    /// Stable display name, reported as `strategy_used`.
    fn name(&self) -> &str;
}

/// The strategies an administrator can switch between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    WordReplacement,
    StrictBlocking,
    Warning,
    Composite,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::WordReplacement,
        StrategyKind::StrictBlocking,
        StrategyKind::Warning,
        StrategyKind::Composite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WordReplacement => "word_replacement",
            Self::StrictBlocking => "strict_blocking",
            Self::Warning => "warning",
            Self::Composite => "composite",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a strategy name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStrategy(pub String);

impl fmt::Display for UnknownStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown moderation strategy '{}' (expected one of: word_replacement, strict_blocking, warning, composite)",
            self.0
        )
    }
}

impl std::error::Error for UnknownStrategy {}

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    /// Accepts the snake_case names plus short aliases such as `badword`
    /// and `strict`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "word_replacement" | "badword" | "bad_word" | "replace" => Ok(Self::WordReplacement),
            "strict_blocking" | "strict" | "block" => Ok(Self::StrictBlocking),
            "warning" | "warn" => Ok(Self::Warning),
            "composite" => Ok(Self::Composite),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}
