//! Data model for tasks, detector bindings and entity sets.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The closed set of detector kinds.
///
/// Configuration strings resolve into this enum; anything else is a
/// [`Error::Configuration`]. There is deliberately no free-form
/// string-to-implementation lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Literal regex pattern matching.
    Pattern,
    /// Token-classification model with sub-token merging.
    Classifier,
    /// Span-level sequence tagger.
    Tagger,
    /// Prompted completion model parsed as structured output.
    Generative,
}

impl DetectorKind {
    /// Parses a detector kind from a configuration string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unknown kinds.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pattern" | "regex" => Ok(Self::Pattern),
            "classifier" | "ner" => Ok(Self::Classifier),
            "tagger" => Ok(Self::Tagger),
            "generative" | "llm" => Ok(Self::Generative),
            other => Err(Error::Configuration {
                name: other.to_string(),
                cause: "unknown detector kind (expected pattern, classifier, tagger or generative)"
                    .to_string(),
            }),
        }
    }

    /// Returns the canonical configuration string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Classifier => "classifier",
            Self::Tagger => "tagger",
            Self::Generative => "generative",
        }
    }
}

/// Binding of a task to a detector implementation.
///
/// Tasks sharing the same binding resolve to the same cached detector
/// instance; model construction is expensive and stateless across calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorBinding {
    /// Detector kind.
    pub kind: DetectorKind,
    /// Model identifier (endpoint model name or path). Unused for patterns.
    #[serde(default)]
    pub model_ref: Option<String>,
}

/// Replacement-token specification for one task.
///
/// The shape must match the detector's output shape: a flat entity set takes
/// a single token, a typed label map takes a token per label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplaceSpec {
    /// One token for every detected entity.
    Token(String),
    /// A token per entity-type label.
    ByLabel(BTreeMap<String, String>),
}

/// A worked example embedded in a generative prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptExample {
    /// Example input text.
    pub input: String,
    /// Entities the model is expected to return for the input.
    pub output: Vec<String>,
}

/// One redaction task: what to find and how to redact it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Unique task name within one pipeline. Also the audit record key stem.
    pub name: String,
    /// Detector binding.
    pub model: DetectorBinding,
    /// Replacement-token specification.
    pub replace_token: ReplaceSpec,
    /// Regex pattern (pattern detectors only).
    #[serde(default)]
    pub pattern: Option<String>,
    /// Target entity-type label (classifier/tagger detectors).
    ///
    /// When absent, classifier/tagger tasks emit a typed label map instead of
    /// a flat set and require a [`ReplaceSpec::ByLabel`] token map.
    #[serde(default)]
    pub entity_type: Option<String>,
    /// Static instruction context (generative detectors only).
    #[serde(default)]
    pub context: Option<String>,
    /// Few-shot examples (generative detectors only).
    #[serde(default)]
    pub examples: Vec<PromptExample>,
}

impl TaskConfig {
    /// Creates a pattern task with a single replacement token.
    #[must_use]
    pub fn pattern(
        name: impl Into<String>,
        pattern: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: DetectorBinding {
                kind: DetectorKind::Pattern,
                model_ref: None,
            },
            replace_token: ReplaceSpec::Token(token.into()),
            pattern: Some(pattern.into()),
            entity_type: None,
            context: None,
            examples: Vec::new(),
        }
    }

    /// Creates a classifier task targeting one entity-type label.
    #[must_use]
    pub fn classifier(
        name: impl Into<String>,
        model_ref: impl Into<String>,
        entity_type: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: DetectorBinding {
                kind: DetectorKind::Classifier,
                model_ref: Some(model_ref.into()),
            },
            replace_token: ReplaceSpec::Token(token.into()),
            pattern: None,
            entity_type: Some(entity_type.into()),
            context: None,
            examples: Vec::new(),
        }
    }

    /// Creates a generative task with an instruction context.
    #[must_use]
    pub fn generative(
        name: impl Into<String>,
        context: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: DetectorBinding {
                kind: DetectorKind::Generative,
                model_ref: None,
            },
            replace_token: ReplaceSpec::Token(token.into()),
            pattern: None,
            entity_type: None,
            context: Some(context.into()),
            examples: Vec::new(),
        }
    }

    /// Validates the task configuration against its detector kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for missing detector parameters or a
    /// replace-token shape that does not match the detector's output shape.
    pub fn validate(&self) -> Result<()> {
        let fail = |cause: &str| {
            Err(Error::Configuration {
                name: self.name.clone(),
                cause: cause.to_string(),
            })
        };

        match self.model.kind {
            DetectorKind::Pattern => {
                if self.pattern.is_none() {
                    return fail("pattern detector requires a 'pattern' parameter");
                }
                if !matches!(self.replace_token, ReplaceSpec::Token(_)) {
                    return fail("pattern detector yields a flat set; use a single replace token");
                }
            },
            DetectorKind::Classifier | DetectorKind::Tagger => {
                if self.model.model_ref.is_none() {
                    return fail("classifier/tagger detector requires a 'model_ref'");
                }
                match (&self.entity_type, &self.replace_token) {
                    (Some(_), ReplaceSpec::Token(_)) | (None, ReplaceSpec::ByLabel(_)) => {},
                    (Some(_), ReplaceSpec::ByLabel(_)) => {
                        return fail(
                            "a task filtered to one entity type yields a flat set; \
                             use a single replace token",
                        );
                    },
                    (None, ReplaceSpec::Token(_)) => {
                        return fail(
                            "a task without an entity type yields a typed label map; \
                             use a label-to-token map",
                        );
                    },
                }
            },
            DetectorKind::Generative => {
                if self.context.is_none() {
                    return fail("generative detector requires a 'context' parameter");
                }
                if !matches!(self.replace_token, ReplaceSpec::Token(_)) {
                    return fail(
                        "generative detector yields a flat set; use a single replace token",
                    );
                }
            },
        }
        Ok(())
    }
}

/// A raw sub-token prediction from a token-classification model.
///
/// Mirrors the wire shape of Hugging Face token-classification output
/// (`entity`, `score`, `word`, `start`, `end`) so raw responses can be
/// recorded in the audit trail unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPrediction {
    /// Entity-type label (e.g. `PER`, `LOC`).
    pub entity: String,
    /// Model confidence.
    pub score: f32,
    /// Sub-token text, possibly carrying tokenizer marker characters.
    pub word: String,
    /// Start offset in the scanned unit.
    pub start: usize,
    /// End offset in the scanned unit.
    pub end: usize,
}

/// A scored label on a tagged span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanLabel {
    /// Label value.
    pub value: String,
    /// Model confidence.
    pub score: f32,
}

/// A whole labeled span from a sequence tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedSpan {
    /// The span text.
    pub text: String,
    /// Start offset in the scanned unit.
    pub start: usize,
    /// End offset in the scanned unit.
    pub end: usize,
    /// Labels ordered by confidence, best first.
    pub labels: Vec<SpanLabel>,
}

/// The set of entities one detector pass produced.
///
/// Flat sets pair with a single replace token, typed maps with a per-label
/// token map. `BTree` collections keep iteration deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EntitySet {
    /// Untyped entity strings.
    Flat(BTreeSet<String>),
    /// Entity strings grouped by entity-type label.
    Typed(BTreeMap<String, BTreeSet<String>>),
}

impl EntitySet {
    /// Creates an empty flat set.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Flat(BTreeSet::new())
    }

    /// Creates a flat set from an iterator of entity strings.
    pub fn flat<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Flat(entities.into_iter().map(Into::into).collect())
    }

    /// Returns true if no entities are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Flat(set) => set.is_empty(),
            Self::Typed(map) => map.values().all(BTreeSet::is_empty),
        }
    }

    /// Total number of entity strings.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(set) => set.len(),
            Self::Typed(map) => map.values().map(BTreeSet::len).sum(),
        }
    }

    /// Unions another set of the same shape into this one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] on a shape mismatch; detector
    /// output shape is fixed per task, so this indicates a detector bug.
    pub fn union(&mut self, other: Self) -> Result<()> {
        match (self, other) {
            (Self::Flat(dst), Self::Flat(src)) => {
                dst.extend(src);
                Ok(())
            },
            (Self::Typed(dst), Self::Typed(src)) => {
                for (label, entities) in src {
                    dst.entry(label).or_default().extend(entities);
                }
                Ok(())
            },
            _ => Err(Error::OperationFailed {
                operation: "entity_set_union".to_string(),
                cause: "mixed flat and typed detector output for one task".to_string(),
            }),
        }
    }

    /// Drops every entity string for which the predicate returns false.
    pub fn retain<F: Fn(&str) -> bool>(&mut self, keep: F) {
        match self {
            Self::Flat(set) => set.retain(|e| keep(e)),
            Self::Typed(map) => {
                for set in map.values_mut() {
                    set.retain(|e| keep(e));
                }
                map.retain(|_, set| !set.is_empty());
            },
        }
    }

    /// Flattens to a sorted list of entity strings, for audit records.
    #[must_use]
    pub fn to_sorted_vec(&self) -> Vec<String> {
        match self {
            Self::Flat(set) => set.iter().cloned().collect(),
            Self::Typed(map) => {
                let mut all: Vec<String> = map.values().flatten().cloned().collect();
                all.sort();
                all.dedup();
                all
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("pattern", DetectorKind::Pattern)]
    #[test_case("regex", DetectorKind::Pattern)]
    #[test_case("Classifier", DetectorKind::Classifier)]
    #[test_case("ner", DetectorKind::Classifier)]
    #[test_case("tagger", DetectorKind::Tagger)]
    #[test_case("LLM", DetectorKind::Generative)]
    fn test_kind_parse(input: &str, expected: DetectorKind) {
        assert_eq!(DetectorKind::parse(input).unwrap(), expected);
    }

    #[test]
    fn test_kind_parse_unknown() {
        assert!(DetectorKind::parse("reflection").is_err());
    }

    #[test]
    fn test_validate_pattern_requires_pattern() {
        let mut task = TaskConfig::pattern("emails", r"\S+@\S+", "EMAIL");
        assert!(task.validate().is_ok());

        task.pattern = None;
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_validate_shape_mismatch() {
        let mut task = TaskConfig::classifier("names", "ner-base", "PER", "NAME");
        assert!(task.validate().is_ok());

        // Typed map with a fixed entity type is a shape mismatch.
        task.replace_token = ReplaceSpec::ByLabel(BTreeMap::from([(
            "PER".to_string(),
            "NAME".to_string(),
        )]));
        assert!(task.validate().is_err());

        // Dropping the entity type makes the typed map valid again.
        task.entity_type = None;
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_validate_generative_requires_context() {
        let mut task = TaskConfig::generative("names", "Find all names in:", "NAME");
        assert!(task.validate().is_ok());

        task.context = None;
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_entity_set_union_and_retain() {
        let mut set = EntitySet::flat(["Alice", "FAILED"]);
        set.union(EntitySet::flat(["Bob", ""])).unwrap();
        set.retain(|e| !e.is_empty() && e != "FAILED");

        assert_eq!(set.to_sorted_vec(), vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_entity_set_union_shape_mismatch() {
        let mut set = EntitySet::flat(["Alice"]);
        let typed = EntitySet::Typed(BTreeMap::from([(
            "PER".to_string(),
            BTreeSet::from(["Bob".to_string()]),
        )]));
        assert!(set.union(typed).is_err());
    }

    #[test]
    fn test_task_config_yaml_roundtrip() {
        let yaml = r#"
name: emails
model:
  kind: pattern
replace_token: EMAIL@EMAIL.DE
pattern: '[\w.+-]+@[\w-]+\.[\w.]+'
"#;
        let task: TaskConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(task.name, "emails");
        assert_eq!(task.model.kind, DetectorKind::Pattern);
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_replace_spec_by_label_yaml() {
        let yaml = r#"
name: all-entities
model:
  kind: classifier
  model_ref: ner-base
replace_token:
  PER: "[NAME]"
  LOC: "[PLACE]"
"#;
        let task: TaskConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert!(matches!(task.replace_token, ReplaceSpec::ByLabel(_)));
        assert!(task.validate().is_ok());
    }
}
