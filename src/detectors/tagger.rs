//! Span-level sequence-tagger detector.

use super::{EntityDetector, Granularity};
use crate::audit::{AuditTrail, AuditValue};
use crate::backends::SpanTagger;
use crate::models::{EntitySet, TaggedSpan, TaskConfig};
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Detector backed by a tagger that returns whole labeled spans.
///
/// Unlike the token classifier there is nothing to merge; the tagger already
/// aggregated sub-tokens. Only the top label of each span is considered.
pub struct TaggerDetector {
    backend: Arc<dyn SpanTagger>,
}

impl TaggerDetector {
    /// Creates a detector over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn SpanTagger>) -> Self {
        Self { backend }
    }
}

fn top_label(span: &TaggedSpan) -> Option<&str> {
    span.labels.first().map(|l| l.value.as_str())
}

fn is_substantial(entity: &str) -> bool {
    entity.chars().count() > 1
}

impl EntityDetector for TaggerDetector {
    fn granularity(&self) -> Granularity {
        Granularity::Sentence
    }

    fn detect(&self, unit: &str, task: &TaskConfig, audit: &mut AuditTrail) -> Result<EntitySet> {
        let spans = self.backend.tag(unit)?;

        let raw: Vec<serde_json::Value> = spans
            .iter()
            .map(|s| {
                serde_json::to_value(s).map_err(|e| Error::OperationFailed {
                    operation: "tagger_audit".to_string(),
                    cause: e.to_string(),
                })
            })
            .collect::<Result<_>>()?;
        audit.record(task.name.clone(), AuditValue::Records(raw))?;

        tracing::debug!(task = %task.name, spans = spans.len(), "tagger produced spans");

        match &task.entity_type {
            Some(target) => {
                let entities: BTreeSet<String> = spans
                    .iter()
                    .filter(|s| top_label(s) == Some(target.as_str()))
                    .map(|s| s.text.trim().to_string())
                    .filter(|e| is_substantial(e))
                    .collect();
                Ok(EntitySet::Flat(entities))
            },
            None => {
                let mut by_label: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
                for span in &spans {
                    let Some(label) = top_label(span) else {
                        continue;
                    };
                    let entity = span.text.trim().to_string();
                    if is_substantial(&entity) {
                        by_label
                            .entry(label.to_string())
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
    use crate::models::SpanLabel;

    fn span(text: &str, label: &str, score: f32) -> TaggedSpan {
        TaggedSpan {
            text: text.to_string(),
            start: 0,
            end: text.len(),
            labels: vec![SpanLabel {
                value: label.to_string(),
                score,
            }],
        }
    }

    struct FixedTagger(Vec<TaggedSpan>);

    impl SpanTagger for FixedTagger {
        fn tag(&self, _sentence: &str) -> Result<Vec<TaggedSpan>> {
            Ok(self.0.clone())
        }
    }

    fn task() -> TaskConfig {
        let mut task = TaskConfig::classifier("persons", "flair-ner", "PER", "[NAME]");
        task.model.kind = crate::models::DetectorKind::Tagger;
        task
    }

    #[test]
    fn test_detect_filters_top_label() {
        let backend = Arc::new(FixedTagger(vec![
            span("Christian Mayer", "PER", 0.99),
            span("Hamburg", "LOC", 0.97),
        ]));
        let detector = TaggerDetector::new(backend);
        let mut audit = AuditTrail::new();

        let found = detector.detect("irrelevant", &task(), &mut audit).unwrap();
        assert_eq!(found.to_sorted_vec(), vec!["Christian Mayer"]);
        assert!(matches!(
            audit.get("persons"),
            Some(AuditValue::Records(r)) if r.len() == 2
        ));
    }

    #[test]
    fn test_detect_discards_short_spans() {
        let backend = Arc::new(FixedTagger(vec![span("M", "PER", 0.80)]));
        let detector = TaggerDetector::new(backend);
        let mut audit = AuditTrail::new();

        let found = detector.detect("irrelevant", &task(), &mut audit).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_unlabeled_span_is_ignored_in_typed_mode() {
        let backend = Arc::new(FixedTagger(vec![TaggedSpan {
            text: "orphan".to_string(),
            start: 0,
            end: 6,
            labels: Vec::new(),
        }]));
        let detector = TaggerDetector::new(backend);
        let mut t = task();
        t.entity_type = None;
        let mut audit = AuditTrail::new();

        let found = detector.detect("irrelevant", &t, &mut audit).unwrap();
        assert!(found.is_empty());
    }
}
