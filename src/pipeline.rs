//! Redaction pipeline.
//!
//! Owns the ordered task list, the detector registry and the audit trail,
//! and drives the per-task detect, merge and substitute cycle over
//! progressively redacted text.

use crate::audit::{AuditTrail, AuditValue};
use crate::backends::ModelBackends;
use crate::detectors::{DetectorRegistry, FAILURE_SENTINEL, Granularity, split_sentences};
use crate::models::{EntitySet, TaskConfig};
use crate::substitute::substitute;
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Audit key of the unmodified input text.
pub const INPUT_TEXT_KEY: &str = "input_text";

/// The redaction pipeline.
///
/// The task list and detector cache are immutable for the lifetime of one
/// instance; activating a different task set means constructing a new
/// pipeline. Concurrency exists only across pipelines; one instance
/// processes one text at a time, and each `edit_text` call owns a fresh
/// audit trail.
pub struct RedactionPipeline {
    tasks: Vec<TaskConfig>,
    registry: DetectorRegistry,
    audit: AuditTrail,
}

impl RedactionPipeline {
    /// Builds a pipeline from an ordered task list.
    ///
    /// Every detector is constructed eagerly here: a missing model or bad
    /// pattern fails now, with a clear error, instead of surfacing in the
    /// middle of text processing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty task list and
    /// [`Error::Configuration`] for duplicate task names, invalid task
    /// parameters or detector construction failures.
    pub fn new(tasks: Vec<TaskConfig>, backends: Arc<dyn ModelBackends>) -> Result<Self> {
        if tasks.is_empty() {
            return Err(Error::InvalidInput("no tasks configured".to_string()));
        }

        let mut names = HashSet::new();
        for task in &tasks {
            if !names.insert(task.name.as_str()) {
                return Err(Error::Configuration {
                    name: task.name.clone(),
                    cause: "duplicate task name".to_string(),
                });
            }
            task.validate()?;
        }

        let registry = DetectorRegistry::new(backends);
        for task in &tasks {
            registry.resolve(task)?;
        }

        Ok(Self {
            tasks,
            registry,
            audit: AuditTrail::new(),
        })
    }

    /// The configured tasks, in execution order.
    #[must_use]
    pub fn tasks(&self) -> &[TaskConfig] {
        &self.tasks
    }

    /// The audit trail of the most recent `edit_text` invocation.
    #[must_use]
    pub const fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Writes the audit trail to a file and clears it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] on I/O failure.
    pub fn flush_audit(&mut self, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.audit.flush(path)
    }

    /// Redacts the input text by running every task in configured order.
    ///
    /// Task N+1 operates on task N's output; configuration order determines
    /// what later tasks see. The returned string is the text after the last
    /// task, and the full trail of intermediate values is available through
    /// [`Self::audit`] until the next invocation resets it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for empty input and propagates
    /// detector infrastructure failures unchanged, so the caller never
    /// receives partially redacted text.
    pub fn edit_text(&mut self, input_text: &str) -> Result<String> {
        if input_text.trim().is_empty() {
            return Err(Error::InvalidInput("empty input text".to_string()));
        }

        self.audit.reset();
        self.audit
            .record(INPUT_TEXT_KEY, AuditValue::Text(input_text.to_string()))?;

        // The task list is immutable but detectors borrow the audit trail
        // mutably, so iterate by index.
        for i in 0..self.tasks.len() {
            let task = self.tasks[i].clone();
            let current_text = self.audit.current_text()?.to_string();
            let detector = self.registry.resolve(&task)?;

            let mut found = match detector.granularity() {
                Granularity::Document => detector.detect(&current_text, &task, &mut self.audit)?,
                Granularity::Sentence => {
                    let mut union = EntitySet::empty();
                    let mut first = true;
                    for sentence in split_sentences(&current_text) {
                        let unit_result = detector.detect(sentence, &task, &mut self.audit)?;
                        if first {
                            union = unit_result;
                            first = false;
                        } else {
                            union.union(unit_result)?;
                        }
                    }
                    union
                },
            };

            // Failure sentinels and empty strings must never reach
            // substitution.
            found.retain(|e| !e.is_empty() && e != FAILURE_SENTINEL);

            self.audit.record(
                format!("{}_patterns", task.name),
                AuditValue::Items(found.to_sorted_vec()),
            )?;

            let output_text = substitute(&current_text, &found, &task.replace_token)?;
            tracing::info!(
                task = %task.name,
                entities = found.len(),
                changed = output_text != current_text,
                "task applied"
            );

            self.audit.record(
                format!("{}_output_text", task.name),
                AuditValue::Text(output_text),
            )?;
        }

        Ok(self.audit.current_text()?.to_string())
    }
}
