//! Audit trail of intermediate pipeline values.
//!
//! Every `edit_text` invocation owns one [`AuditTrail`]: an ordered,
//! append-only record of the input text, each task's raw detector output,
//! its merged entity set, and the text snapshot after substitution. The last
//! recorded text value is always the working text the next task operates on.
//!
//! Trails are never shared across invocations; interleaving records from two
//! documents would corrupt the edit history.

use crate::{Error, Result};
use serde::Serialize;
use serde::ser::SerializeMap;
use std::path::Path;

/// A value recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AuditValue {
    /// A text snapshot (input text or a task's output text).
    Text(String),
    /// A list of strings (merged entity sets, raw generative responses).
    Items(Vec<String>),
    /// A list of structured records (raw classifier/tagger predictions).
    Records(Vec<serde_json::Value>),
}

/// Ordered, append-only record of one invocation's intermediate values.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AuditTrail {
    entries: Vec<(String, AuditValue)>,
}

impl AuditTrail {
    /// Creates an empty trail.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Clears all records.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Records a value under a key.
    ///
    /// A new key is appended. List-like values under an existing key extend
    /// the stored list; repeated text values under one key are an internal
    /// error (each task derives its keys from its own unique name).
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] when a text value is recorded under
    /// an existing key or the list shapes differ.
    pub fn record(&mut self, key: impl Into<String>, value: AuditValue) -> Result<()> {
        let key = key.into();
        let Some((_, existing)) = self.entries.iter_mut().find(|(k, _)| *k == key) else {
            self.entries.push((key, value));
            return Ok(());
        };

        match (existing, value) {
            (AuditValue::Items(dst), AuditValue::Items(src)) => {
                dst.extend(src);
                Ok(())
            },
            (AuditValue::Records(dst), AuditValue::Records(src)) => {
                dst.extend(src);
                Ok(())
            },
            _ => Err(Error::OperationFailed {
                operation: "audit_record".to_string(),
                cause: format!("non-extendable value recorded twice under key '{key}'"),
            }),
        }
    }

    /// Returns the most recently recorded value.
    #[must_use]
    pub fn current(&self) -> Option<&AuditValue> {
        self.entries.last().map(|(_, v)| v)
    }

    /// Returns the most recently recorded value as the working text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] when the trail is empty or its tail
    /// is not a text snapshot; the pipeline always ends a task by recording
    /// one, so this indicates an orchestration bug.
    pub fn current_text(&self) -> Result<&str> {
        match self.current() {
            Some(AuditValue::Text(text)) => Ok(text),
            _ => Err(Error::OperationFailed {
                operation: "audit_current_text".to_string(),
                cause: "trail tail is not a text snapshot".to_string(),
            }),
        }
    }

    /// Returns the value recorded under a key, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AuditValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Returns the record keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes the trail to a pretty JSON object in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::OperationFailed {
            operation: "audit_serialize".to_string(),
            cause: e.to_string(),
        })
    }

    /// Writes the trail to a file as ordered JSON, then clears it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] on serialization or I/O failure.
    pub fn flush(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path.as_ref(), json).map_err(|e| Error::OperationFailed {
            operation: "audit_flush".to_string(),
            cause: format!("{}: {e}", path.as_ref().display()),
        })?;
        self.reset();
        Ok(())
    }
}

// Serialized as a map so consumers see one JSON object; serialize_map keeps
// insertion order, which consumers rely on to reconstruct the edit history.
impl Serialize for AuditTrail {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_current_text() {
        let mut trail = AuditTrail::new();
        trail
            .record("input_text", AuditValue::Text("hello".to_string()))
            .unwrap();
        assert_eq!(trail.current_text().unwrap(), "hello");

        trail
            .record("emails_patterns", AuditValue::Items(vec!["a@b.c".to_string()]))
            .unwrap();
        assert!(trail.current_text().is_err());

        trail
            .record("emails_output_text", AuditValue::Text("redacted".to_string()))
            .unwrap();
        assert_eq!(trail.current_text().unwrap(), "redacted");
    }

    #[test]
    fn test_extend_semantics() {
        let mut trail = AuditTrail::new();
        trail
            .record("names", AuditValue::Items(vec!["Alice".to_string()]))
            .unwrap();
        trail
            .record("names", AuditValue::Items(vec!["Bob".to_string()]))
            .unwrap();

        assert_eq!(
            trail.get("names"),
            Some(&AuditValue::Items(vec![
                "Alice".to_string(),
                "Bob".to_string()
            ]))
        );
        // Still a single record, extended in place.
        assert_eq!(trail.len(), 1);
    }

    #[test]
    fn test_repeated_text_key_is_error() {
        let mut trail = AuditTrail::new();
        trail
            .record("input_text", AuditValue::Text("one".to_string()))
            .unwrap();
        assert!(
            trail
                .record("input_text", AuditValue::Text("two".to_string()))
                .is_err()
        );
    }

    #[test]
    fn test_json_preserves_insertion_order() {
        let mut trail = AuditTrail::new();
        trail
            .record("zebra", AuditValue::Text("z".to_string()))
            .unwrap();
        trail
            .record("alpha", AuditValue::Text("a".to_string()))
            .unwrap();

        let json = trail.to_json().unwrap();
        let zebra = json.find("\"zebra\"").unwrap();
        let alpha = json.find("\"alpha\"").unwrap();
        assert!(zebra < alpha, "insertion order must survive serialization");
    }

    #[test]
    fn test_flush_writes_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.json");

        let mut trail = AuditTrail::new();
        trail
            .record("input_text", AuditValue::Text("hello".to_string()))
            .unwrap();
        trail
            .record(
                "names",
                AuditValue::Records(vec![serde_json::json!({"word": "Alice", "score": 0.99})]),
            )
            .unwrap();
        trail.flush(&path).unwrap();

        assert!(trail.is_empty());
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["input_text"], "hello");
        assert_eq!(written["names"][0]["word"], "Alice");
    }
}
