//! Entity detectors.
//!
//! One trait, four implementations: literal patterns, token classifiers,
//! span taggers and prompted completion models. All of them answer the same
//! question (which literal substrings of this unit of text are sensitive)
//! and differ only in how they get there.
//!
//! Shared failure semantics: "nothing found" is an empty set, never an
//! error. Infrastructure failures (backend unreachable, bad configuration)
//! propagate and abort the whole invocation; a silently skipped redaction
//! task would be a worse failure than an aborted one.

mod classifier;
mod generative;
mod pattern;
mod registry;
mod tagger;

pub use classifier::ClassifierDetector;
pub use generative::GenerativeDetector;
pub use pattern::PatternDetector;
pub use registry::DetectorRegistry;
pub use tagger::TaggerDetector;

use crate::audit::AuditTrail;
use crate::models::{EntitySet, TaskConfig};
use crate::Result;
use unicode_segmentation::UnicodeSegmentation;

/// Sentinel value a generative detector substitutes for unparsable output.
///
/// The pipeline filters it out before substitution; it must never reach the
/// redacted text.
pub const FAILURE_SENTINEL: &str = "FAILED";

/// The unit size a detector needs to be run over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// The detector handles the whole current text in one call.
    Document,
    /// The detector has a bounded input-context budget and is run once per
    /// sentence, results unioned across sentences.
    Sentence,
}

/// Polymorphic entity-extraction capability.
pub trait EntityDetector: Send + Sync {
    /// The unit size this detector requires.
    fn granularity(&self) -> Granularity;

    /// Extracts sensitive entities from one unit of text.
    ///
    /// Model-backed detectors record their raw backend output in the audit
    /// trail under the bare task name before any filtering.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures; an empty result is
    /// `Ok`.
    fn detect(&self, unit: &str, task: &TaskConfig, audit: &mut AuditTrail)
    -> Result<EntitySet>;
}

/// Splits text into non-empty sentence units.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.unicode_sentences()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        let text = "Hello there. My name is Alice! Who are you?";
        let sentences = split_sentences(text);
        assert_eq!(
            sentences,
            vec!["Hello there.", "My name is Alice!", "Who are you?"]
        );
    }

    #[test]
    fn test_split_sentences_skips_blank_units() {
        let sentences = split_sentences("One.   \n\n  Two.");
        assert_eq!(sentences, vec!["One.", "Two."]);
    }

    #[test]
    fn test_split_sentences_empty_input() {
        assert!(split_sentences("   ").is_empty());
    }
}
