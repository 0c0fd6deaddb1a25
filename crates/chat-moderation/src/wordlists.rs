//! Built-in word lists.
//!
//! These are the defaults used when no moderation policy file is supplied.
//! A policy file replaces a list wholesale; it does not merge with it.

/// Words masked by the word-replacement strategy (whole-word matches).
pub static REPLACEMENT_WORDS: &[&str] = &[
    "malo",
    "feo",
    "tonto",
    "idiota",
    "estúpido",
    "imbécil",
    "odio",
    "asco",
    "basura",
    "mierda",
    "joder",
    "puta",
    "cabrón",
    "hijo de puta",
    "maldito",
    "desgraciado",
];

/// Severe terms that make the strict-blocking strategy reject a message
/// (substring matches).
pub static STRICT_WORDS: &[&str] = &[
    "spam", "scam", "hack", "virus", "malware", "phishing", "fraud", "illegal", "drugs",
];

/// Caution terms reported by the warning strategy (substring matches).
pub static WARNING_WORDS: &[&str] = &[
    "violencia",
    "agresión",
    "amenaza",
    "peligro",
    "riesgo",
    "cuidado",
    "atención",
];

/// Token substituted for every masked word.
pub const DEFAULT_MASK: &str = "***";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_have_no_duplicates_or_blanks() {
        for list in [REPLACEMENT_WORDS, STRICT_WORDS, WARNING_WORDS] {
            let mut seen = std::collections::HashSet::new();
            for word in list {
                assert!(!word.trim().is_empty(), "blank entry in word list");
                assert!(seen.insert(word.to_lowercase()), "duplicate word: {word}");
            }
        }
    }

    #[test]
    fn all_replacement_words_compile_as_whole_word_patterns() {
        for word in REPLACEMENT_WORDS {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(word));
            regex::Regex::new(&pattern)
                .unwrap_or_else(|e| panic!("pattern for '{word}' failed to compile: {e}"));
        }
    }
}
