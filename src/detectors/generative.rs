//! Generative detector.
//!
//! Prompts a completion model with an instruction, optional worked examples
//! and the text unit, and parses the completion as a strict single-key JSON
//! object mapping [`OUTPUT_KEY`] to a list of found entities. This is the
//! only place free-form text is coerced into structured data, and it is
//! inherently unreliable: a completion that does not parse is contained as
//! the [`FAILURE_SENTINEL`] instead of aborting the pipeline.

use super::{EntityDetector, FAILURE_SENTINEL, Granularity};
use crate::audit::{AuditTrail, AuditValue};
use crate::backends::CompletionClient;
use crate::models::{EntitySet, PromptExample, TaskConfig};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Marker the model is instructed to complete after.
pub const OUTPUT_MARKER: &str = "Answer:";

/// Key of the JSON object the model is instructed to emit.
pub const OUTPUT_KEY: &str = "Answer";

/// Detector backed by a prompted completion model.
pub struct GenerativeDetector {
    backend: Arc<dyn CompletionClient>,
}

impl GenerativeDetector {
    /// Creates a detector over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn CompletionClient>) -> Self {
        Self { backend }
    }

    /// The fixed trailing instruction demanding structured output.
    fn static_instruction() -> String {
        format!(r#"Return the {OUTPUT_KEY} as valid JSON {{"{OUTPUT_KEY}": [{OUTPUT_KEY}]}}:"#)
    }

    /// Builds the few-shot prompt for one text unit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the task lacks a context.
    pub fn build_prompt(unit: &str, task: &TaskConfig) -> Result<String> {
        let context = task.context.as_deref().ok_or_else(|| Error::Configuration {
            name: task.name.clone(),
            cause: "generative detector requires a 'context' parameter".to_string(),
        })?;
        let instruction = Self::static_instruction();

        let mut prompt = String::new();
        for example in &task.examples {
            prompt.push_str(&format_example(context, &instruction, example));
        }
        prompt.push_str(&format!("{context} {instruction} {unit}\n{OUTPUT_MARKER}"));
        Ok(prompt)
    }
}

fn format_example(context: &str, instruction: &str, example: &PromptExample) -> String {
    // Output list is serialized through serde_json so quoting is always valid.
    let output = serde_json::json!({ OUTPUT_KEY: example.output });
    format!(
        "{context} {instruction} {input}\n{OUTPUT_MARKER} {output}\n",
        input = example.input
    )
}

/// Extracts the JSON object from a completion that may carry extra text.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| &text[start..=end])
}

/// Parses the completion into entity strings, or `None` when unusable.
fn parse_entities(completion: &str) -> Option<Vec<String>> {
    let json = extract_json(completion)?;
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    let found = value.get(OUTPUT_KEY)?.as_array()?;
    Some(
        found
            .iter()
            .map(|v| {
                v.as_str()
                    .map_or_else(|| v.to_string(), ToString::to_string)
            })
            .collect(),
    )
}

impl EntityDetector for GenerativeDetector {
    fn granularity(&self) -> Granularity {
        Granularity::Sentence
    }

    fn detect(&self, unit: &str, task: &TaskConfig, audit: &mut AuditTrail) -> Result<EntitySet> {
        let prompt = Self::build_prompt(unit, task)?;
        tracing::debug!(task = %task.name, prompt_len = prompt.len(), "prompting completion model");

        let completion = self.backend.complete(&prompt)?;
        // The model tends to echo the few-shot transcript; only the text
        // after the last marker is the completion for this unit.
        let response_text = completion
            .rsplit(OUTPUT_MARKER)
            .next()
            .unwrap_or(completion.as_str())
            .trim()
            .to_string();

        audit.record(
            task.name.clone(),
            AuditValue::Items(vec![response_text.clone()]),
        )?;

        let entities: BTreeSet<String> = match parse_entities(&response_text) {
            Some(found) => found.into_iter().collect(),
            None => {
                tracing::warn!(
                    task = %task.name,
                    response = %response_text,
                    "unparsable completion, substituting failure sentinel"
                );
                BTreeSet::from([FAILURE_SENTINEL.to_string()])
            },
        };

        Ok(EntitySet::Flat(entities))
    }
}
