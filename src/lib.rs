//! # Scrub
//!
//! Configurable redaction pipeline for sensitive spans in free text.
//!
//! Scrub runs an ordered list of *tasks* over an input text. Each task binds
//! a detector (a literal pattern, a token classifier, a span tagger, or a
//! prompted completion model) to a replacement token; the pipeline substitutes
//! every detected entity and feeds the rewritten text to the next task. Every
//! intermediate value is kept in an ordered audit trail that can be flushed to
//! disk for compliance review.
//!
//! ## Example
//!
//! ```rust,ignore
//! use scrub::{RedactionPipeline, TaskConfig};
//!
//! let tasks = vec![TaskConfig::pattern(
//!     "emails",
//!     r"[\w.+-]+@[\w-]+\.[\w.]+",
//!     "EMAIL@EMAIL.DE",
//! )];
//! let mut pipeline = RedactionPipeline::new(tasks, backends)?;
//! let redacted = pipeline.edit_text("Contact: christian.mayer@gmx.de")?;
//! assert_eq!(redacted, "Contact: EMAIL@EMAIL.DE");
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod audit;
pub mod backends;
pub mod config;
pub mod detectors;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod store;
pub mod substitute;
pub mod verify;

// Re-exports for convenience
pub use audit::{AuditTrail, AuditValue};
pub use backends::{CompletionClient, ModelBackends, SpanTagger, TokenClassifier};
pub use config::ScrubConfig;
pub use detectors::{DetectorRegistry, EntityDetector, FAILURE_SENTINEL};
pub use models::{DetectorBinding, DetectorKind, EntitySet, ReplaceSpec, TaskConfig};
pub use pipeline::RedactionPipeline;
pub use store::{ConfigStore, SqliteConfigStore};

/// Error type for scrub operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty input text, empty task list, malformed entity values |
/// | `Configuration` | Missing/malformed task or model config, store name conflicts |
/// | `Backend` | Model backend unreachable, bad status, unparsable wire response |
/// | `OperationFailed` | Filesystem I/O errors, database failures, lock poisoning |
///
/// A single detection unit producing unusable output is *not* an error: the
/// generative detector contains it as the [`FAILURE_SENTINEL`] value, which
/// the pipeline filters out before substitution.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - The input text is empty or whitespace-only
    /// - A pipeline is constructed with no tasks
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A task or model configuration is unusable.
    ///
    /// Raised when:
    /// - A detector kind string is not one of the known kinds
    /// - A required detector parameter (pattern, entity type, context) is missing
    /// - The replace-token shape does not match the detector's output shape
    /// - A store mutation hits a duplicate or missing name
    #[error("configuration '{name}': {cause}")]
    Configuration {
        /// The task, model or store entry the error refers to.
        name: String,
        /// The underlying cause.
        cause: String,
    },

    /// A model backend failed.
    ///
    /// Raised when:
    /// - The inference endpoint is unreachable or times out
    /// - The endpoint returns a non-success status
    /// - The wire response cannot be deserialized
    ///
    /// Propagates out of `edit_text` uncaught; the caller never receives
    /// partially redacted text.
    #[error("backend operation '{operation}' failed: {cause}")]
    Backend {
        /// The backend operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` store operations fail
    /// - Filesystem I/O errors occur (audit flush, file read/write)
    /// - Internal invariants are violated (poisoned locks)
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for scrub operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("empty input text".to_string());
        assert_eq!(err.to_string(), "invalid input: empty input text");

        let err = Error::Configuration {
            name: "emails".to_string(),
            cause: "missing pattern".to_string(),
        };
        assert_eq!(err.to_string(), "configuration 'emails': missing pattern");

        let err = Error::Backend {
            operation: "llama_completion".to_string(),
            cause: "connect error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "backend operation 'llama_completion' failed: connect error"
        );
    }
}
