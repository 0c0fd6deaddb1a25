use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::composite::CompositeStrategy;
use crate::leaf::{StrictBlockingStrategy, WarningStrategy, WordReplacementStrategy};
use crate::strategy::{ModerationStrategy, StrategyKind};
use crate::wordlists;

/// Moderation policy: the word lists and chain order every strategy is built
/// from. Usually loaded from YAML via [`crate::loader`]; every field falls
/// back to the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationPolicy {
    /// Schema version; currently must be "1.0".
    #[serde(default = "default_version")]
    pub version: String,
    /// Strategy active at startup.
    #[serde(default)]
    pub default_strategy: StrategyKind,
    /// Token substituted for masked words.
    #[serde(default = "default_mask")]
    pub mask: String,
    /// Whole-word list for the word-replacement strategy.
    #[serde(default = "default_replacement_words")]
    pub replacement_words: Vec<String>,
    /// Substring list for the strict-blocking strategy.
    #[serde(default = "default_strict_words")]
    pub strict_words: Vec<String>,
    /// Substring list for the warning strategy.
    #[serde(default = "default_warning_words")]
    pub warning_words: Vec<String>,
    /// Member order of the composite strategy.
    #[serde(default = "default_composite_order")]
    pub composite_order: Vec<StrategyKind>,
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self {
            version: default_version(),
            default_strategy: StrategyKind::default(),
            mask: default_mask(),
            replacement_words: default_replacement_words(),
            strict_words: default_strict_words(),
            warning_words: default_warning_words(),
            composite_order: default_composite_order(),
        }
    }
}

impl ModerationPolicy {
    /// Build a fresh strategy instance of the given kind.
    ///
    /// A `Composite` entry inside `composite_order` is skipped; the loader
    /// rejects such policies, so this only matters for hand-built values.
    pub fn build(&self, kind: StrategyKind) -> Arc<dyn ModerationStrategy> {
        match kind {
            StrategyKind::WordReplacement => Arc::new(WordReplacementStrategy::new(
                &self.replacement_words,
                self.mask.clone(),
            )),
            StrategyKind::StrictBlocking => {
                Arc::new(StrictBlockingStrategy::new(&self.strict_words))
            }
            StrategyKind::Warning => Arc::new(WarningStrategy::new(&self.warning_words)),
            StrategyKind::Composite => {
                let members = self
                    .composite_order
                    .iter()
                    .filter(|k| **k != StrategyKind::Composite)
                    .map(|k| self.build(*k))
                    .collect();
                Arc::new(CompositeStrategy::new(members))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Default-value functions used by serde
// ---------------------------------------------------------------------------

fn default_version() -> String {
    "1.0".to_string()
}

fn default_mask() -> String {
    wordlists::DEFAULT_MASK.to_string()
}

fn default_replacement_words() -> Vec<String> {
    to_owned(wordlists::REPLACEMENT_WORDS)
}

fn default_strict_words() -> Vec<String> {
    to_owned(wordlists::STRICT_WORDS)
}

fn default_warning_words() -> Vec<String> {
    to_owned(wordlists::WARNING_WORDS)
}

fn default_composite_order() -> Vec<StrategyKind> {
    vec![
        StrategyKind::StrictBlocking,
        StrategyKind::WordReplacement,
        StrategyKind::Warning,
    ]
}

fn to_owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}
