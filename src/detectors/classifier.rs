//! Token-classification detector.
//!
//! Token classifiers predict per sub-token, so one name arrives as several
//! fragments (`Chris` + `tian`). Adjacent fragments carrying the same label
//! whose character spans touch or sit at most one character apart (tokenizer
//! boundary artifacts) are merged back into whole entities before filtering.

use super::{EntityDetector, Granularity};
use crate::audit::{AuditTrail, AuditValue};
use crate::backends::TokenClassifier;
use crate::models::{EntitySet, TaskConfig, TokenPrediction};
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Sub-token marker used by sentencepiece tokenizers.
const SUBWORD_MARKER: char = '\u{2581}';

/// Detector backed by a token-classification model.
pub struct ClassifierDetector {
    backend: Arc<dyn TokenClassifier>,
}

impl ClassifierDetector {
    /// Creates a detector over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn TokenClassifier>) -> Self {
        Self { backend }
    }
}

/// Merges consecutive predictions with touching spans and equal labels.
///
/// Two consecutive raw predictions merge when they carry the same label and
/// their spans are contiguous or separated by at most one character.
#[must_use]
pub fn merge_predictions(predictions: Vec<TokenPrediction>) -> Vec<TokenPrediction> {
    let mut merged: Vec<TokenPrediction> = Vec::with_capacity(predictions.len());
    for prediction in predictions {
        match merged.last_mut() {
            Some(last)
                if last.entity == prediction.entity
                    && prediction.start >= last.end
                    && prediction.start - last.end <= 1 =>
            {
                last.word.push_str(&prediction.word);
                last.end = prediction.end;
            },
            _ => merged.push(prediction),
        }
    }
    merged
}

/// Strips sub-word markers and surrounding whitespace from a merged word.
fn clean_word(word: &str) -> String {
    word.replace(SUBWORD_MARKER, " ").trim().to_string()
}

/// Entities of one character or less are tokenizer noise.
fn is_substantial(entity: &str) -> bool {
    entity.chars().count() > 1
}

impl EntityDetector for ClassifierDetector {
    fn granularity(&self) -> Granularity {
        Granularity::Sentence
    }

    fn detect(&self, unit: &str, task: &TaskConfig, audit: &mut AuditTrail) -> Result<EntitySet> {
        let predictions = self.backend.classify(unit)?;
        let merged = merge_predictions(predictions);

        let raw: Vec<serde_json::Value> = merged
            .iter()
            .map(|p| {
                serde_json::to_value(p).map_err(|e| Error::OperationFailed {
                    operation: "classifier_audit".to_string(),
                    cause: e.to_string(),
                })
            })
            .collect::<Result<_>>()?;
        audit.record(task.name.clone(), AuditValue::Records(raw))?;

        tracing::debug!(
            task = %task.name,
            merged = merged.len(),
            "token classifier produced merged entities"
        );

        match &task.entity_type {
            Some(target) => {
                let entities: BTreeSet<String> = merged
                    .iter()
                    .filter(|p| &p.entity == target)
                    .map(|p| clean_word(&p.word))
                    .filter(|e| is_substantial(e))
                    .collect();
                Ok(EntitySet::Flat(entities))
            },
            None => {
                let mut by_label: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
                for prediction in &merged {
                    let entity = clean_word(&prediction.word);
                    if is_substantial(&entity) {
                        by_label
                            .entry(prediction.entity.clone())
                            .or_default()
                            .insert(entity);
                    }
                }
                Ok(EntitySet::Typed(by_label))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(word: &str, entity: &str, start: usize, end: usize) -> TokenPrediction {
        TokenPrediction {
            entity: entity.to_string(),
            score: 0.99,
            word: word.to_string(),
            start,
            end,
        }
    }

    struct FixedClassifier(Vec<TokenPrediction>);

    impl TokenClassifier for FixedClassifier {
        fn classify(&self, _sentence: &str) -> Result<Vec<TokenPrediction>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_merge_contiguous_subtokens() {
        let merged = merge_predictions(vec![
            prediction("Chris", "PER", 0, 5),
            prediction("tian", "PER", 5, 10),
        ]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].word, "Christian");
        assert_eq!(merged[0].end, 10);
    }

    #[test]
    fn test_merge_tolerates_one_char_gap() {
        let merged = merge_predictions(vec![
            prediction("Chris", "PER", 0, 5),
            prediction("tian", "PER", 6, 10),
        ]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_no_merge_across_labels() {
        let merged = merge_predictions(vec![
            prediction("Chris", "PER", 0, 5),
            prediction("tian", "LOC", 5, 10),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_no_merge_across_distance() {
        let merged = merge_predictions(vec![
            prediction("Alice", "PER", 0, 5),
            prediction("Bob", "PER", 10, 13),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_detect_filters_label_and_noise() {
        let backend = Arc::new(FixedClassifier(vec![
            prediction("\u{2581}Alice", "PER", 0, 6),
            prediction("\u{2581}Berlin", "LOC", 10, 17),
            prediction("\u{2581}A", "PER", 20, 22),
        ]));
        let detector = ClassifierDetector::new(backend);
        let task = TaskConfig::classifier("names", "ner-base", "PER", "[NAME]");
        let mut audit = AuditTrail::new();

        let found = detector.detect("irrelevant", &task, &mut audit).unwrap();

        // LOC filtered by label, single-char entity filtered as noise.
        assert_eq!(found.to_sorted_vec(), vec!["Alice"]);
        // Raw merged predictions recorded under the bare task name.
        assert!(matches!(audit.get("names"), Some(AuditValue::Records(r)) if r.len() == 3));
    }

    #[test]
    fn test_detect_typed_output_without_entity_type() {
        let backend = Arc::new(FixedClassifier(vec![
            prediction("\u{2581}Alice", "PER", 0, 6),
            prediction("\u{2581}Berlin", "LOC", 10, 17),
        ]));
        let detector = ClassifierDetector::new(backend);
        let mut task = TaskConfig::classifier("all", "ner-base", "PER", "X");
        task.entity_type = None;
        let mut audit = AuditTrail::new();

        let found = detector.detect("irrelevant", &task, &mut audit).unwrap();
        match found {
            EntitySet::Typed(map) => {
                assert!(map["PER"].contains("Alice"));
                assert!(map["LOC"].contains("Berlin"));
            },
            EntitySet::Flat(_) => panic!("expected typed output"),
        }
    }
}
