//! Redaction equivalence check.
//!
//! Confirms that a redacted text is the original with only token
//! substitutions applied: words carrying a replacement token are dropped
//! from the redacted text, the original is reduced to the words that
//! survived, and the two normalized forms must match. A paraphrased
//! sentence, altered punctuation or a hallucinated word fails the check.
//! Useful as a guard when the backing model had any chance to
//! rewrite text instead of only detecting entities.

use crate::detectors::FAILURE_SENTINEL;

/// German letters to keep alongside ASCII during normalization.
const EXTRA_CHARS: [char; 7] = ['ä', 'ü', 'ö', 'Ä', 'Ü', 'Ö', 'ß'];

/// Checks a redacted text against the original it was derived from.
pub struct TextEquivalence {
    original: String,
    replace_tokens: Vec<String>,
}

impl TextEquivalence {
    /// Creates a check for one original text.
    ///
    /// `replace_tokens` are the tokens substitution may have introduced;
    /// words containing them are ignored in the redacted text.
    #[must_use]
    pub fn new(original: impl Into<String>, replace_tokens: Vec<String>) -> Self {
        Self {
            original: original.into(),
            replace_tokens,
        }
    }

    /// Returns the redacted text when it is equivalent to the original, and
    /// the failure sentinel otherwise.
    #[must_use]
    pub fn check(&self, altered: &str) -> (bool, String) {
        let kept_words: Vec<&str> = altered
            .split_whitespace()
            .filter(|word| !self.replace_tokens.iter().any(|t| word.contains(t.as_str())))
            .collect();
        let altered_normalized: String = kept_words
            .iter()
            .flat_map(|w| w.chars())
            .filter(|c| keep_char(*c))
            .collect();

        let kept_set: std::collections::HashSet<String> = kept_words
            .iter()
            .map(|w| normalize_word(w))
            .collect();
        let original_normalized: String = self
            .original
            .split_whitespace()
            .map(normalize_word)
            .filter(|w| kept_set.contains(w))
            .collect();

        if altered_normalized == original_normalized {
            (true, altered.to_string())
        } else {
            (false, FAILURE_SENTINEL.to_string())
        }
    }
}

fn keep_char(c: char) -> bool {
    c.is_ascii() || EXTRA_CHARS.contains(&c)
}

fn normalize_word(word: &str) -> String {
    word.chars().filter(|c| keep_char(*c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pure_substitution_passes() {
        let check = TextEquivalence::new(
            "Dear Christian, see you in Berlin.",
            vec!["[NAME]".to_string()],
        );
        let (ok, text) = check.check("Dear [NAME], see you in Berlin.");

        assert!(ok);
        assert_eq!(text, "Dear [NAME], see you in Berlin.");
    }

    #[test]
    fn test_rewritten_text_fails() {
        let check = TextEquivalence::new(
            "Dear Christian, see you in Berlin.",
            vec!["[NAME]".to_string()],
        );
        let (ok, text) = check.check("Hello [NAME], meet me in Berlin!");

        assert!(!ok);
        assert_eq!(text, FAILURE_SENTINEL);
    }

    #[test]
    fn test_added_word_fails() {
        let check = TextEquivalence::new("one two three", vec!["[X]".to_string()]);
        let (ok, _) = check.check("one two extra three");

        assert!(!ok);
    }

    #[test]
    fn test_umlauts_survive_normalization() {
        let check = TextEquivalence::new("Grüße aus München", vec!["[NAME]".to_string()]);
        let (ok, _) = check.check("Grüße aus München");

        assert!(ok);
    }

    #[test]
    fn test_identical_without_tokens_passes() {
        let check = TextEquivalence::new("nothing redacted", Vec::new());
        let (ok, _) = check.check("nothing redacted");

        assert!(ok);
    }
}
