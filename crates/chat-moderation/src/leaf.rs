//! The three word-list strategies.

use regex::{NoExpand, Regex};
use tracing::warn;

use crate::strategy::ModerationStrategy;
use crate::verdict::{ModerationAction, ModerationVerdict};
use crate::wordlists::DEFAULT_MASK;

// ---------------------------------------------------------------------------
// Word replacement
// ---------------------------------------------------------------------------

/// Masks listed words wherever they appear as whole words.
///
/// Matching is case-insensitive and Unicode-aware; a listed word inside a
/// larger word (`malo` in `maloso`) is left alone. Every occurrence of every
/// listed word is masked, and longer entries are applied first so a phrase
/// like `hijo de puta` is masked as one unit.
pub struct WordReplacementStrategy {
    rules: Vec<(String, Regex)>,
    mask: String,
}

impl WordReplacementStrategy {
    pub const NAME: &'static str = "BadWordReplacement";

    /// Compile one whole-word pattern per entry. Entries that fail to
    /// compile are skipped with a warning.
    pub fn new<I, S>(words: I, mask: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words: Vec<String> = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        words.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));

        let mut rules = Vec::with_capacity(words.len());
        for word in words {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(&word));
            match Regex::new(&pattern) {
                Ok(re) => rules.push((word, re)),
                Err(err) => {
                    warn!(%word, %err, "skipping block-list entry that failed to compile");
                }
            }
        }

        Self {
            rules,
            mask: mask.into(),
        }
    }

    /// Number of compiled entries.
    pub fn word_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for WordReplacementStrategy {
    fn default() -> Self {
        Self::new(crate::wordlists::REPLACEMENT_WORDS, DEFAULT_MASK)
    }
}

impl ModerationStrategy for WordReplacementStrategy {
    fn moderate(&self, text: &str) -> ModerationVerdict {
        let mut modified = text.to_string();
        let mut found: Vec<&str> = Vec::new();

        for (word, re) in &self.rules {
            if re.is_match(&modified) {
                found.push(word);
                modified = re
                    .replace_all(&modified, NoExpand(&self.mask))
                    .into_owned();
            }
        }

        if found.is_empty() {
            return ModerationVerdict::allow(
                text,
                "No inappropriate content detected",
                0.0,
                Self::NAME,
            );
        }

        ModerationVerdict::new(
            ModerationAction::Modify,
            text,
            modified,
            format!(
                "Inappropriate words detected and replaced: {}",
                found.join(", ")
            ),
            0.8,
            Self::NAME,
        )
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

// ---------------------------------------------------------------------------
// Strict blocking
// ---------------------------------------------------------------------------

/// Rejects any message containing a listed term as a substring.
///
/// The first term (in list order) found anywhere in the message decides the
/// verdict.
pub struct StrictBlockingStrategy {
    terms: Vec<(String, String)>,
}

impl StrictBlockingStrategy {
    pub const NAME: &'static str = "StrictBlocking";

    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: lowered_terms(terms),
        }
    }
}

impl Default for StrictBlockingStrategy {
    fn default() -> Self {
        Self::new(crate::wordlists::STRICT_WORDS)
    }
}

impl ModerationStrategy for StrictBlockingStrategy {
    fn moderate(&self, text: &str) -> ModerationVerdict {
        let lower = text.to_lowercase();

        if let Some((term, _)) = self.terms.iter().find(|(_, l)| lower.contains(l.as_str())) {
            return ModerationVerdict::block(
                text,
                format!("Message contains prohibited content: {term}"),
                0.9,
                Self::NAME,
            );
        }

        ModerationVerdict::allow(text, "Message is clean", 0.1, Self::NAME)
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

// ---------------------------------------------------------------------------
// Warning
// ---------------------------------------------------------------------------

/// Lets every message through but reports all listed caution terms it
/// contains.
pub struct WarningStrategy {
    terms: Vec<(String, String)>,
}

impl WarningStrategy {
    pub const NAME: &'static str = "Warning";

    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: lowered_terms(terms),
        }
    }
}

impl Default for WarningStrategy {
    fn default() -> Self {
        Self::new(crate::wordlists::WARNING_WORDS)
    }
}

impl ModerationStrategy for WarningStrategy {
    fn moderate(&self, text: &str) -> ModerationVerdict {
        let lower = text.to_lowercase();
        let hits: Vec<&str> = self
            .terms
            .iter()
            .filter(|(_, l)| lower.contains(l.as_str()))
            .map(|(term, _)| term.as_str())
            .collect();

        if hits.is_empty() {
            return ModerationVerdict::allow(text, "No warnings detected", 0.2, Self::NAME);
        }

        ModerationVerdict::warn(
            text,
            format!("Message contains warning words: {}", hits.join(", ")),
            0.6,
            Self::NAME,
        )
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

/// Pair each non-blank term with its lowercase form.
fn lowered_terms<I, S>(terms: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    terms
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .map(|t| {
            let lower = t.to_lowercase();
            (t, lower)
        })
        .collect()
}
