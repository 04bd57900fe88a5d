//! Configuration loading.
//!
//! Task sets come either from a YAML file or from named entries in the
//! configuration store; backend endpoints ride along in the same file.

use crate::models::TaskConfig;
use crate::store::ConfigStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Backend endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Completion provider: `llama-server` or `ollama`.
    pub completion_provider: String,
    /// Completion endpoint override.
    pub completion_endpoint: Option<String>,
    /// Token-classification inference endpoint override.
    pub inference_endpoint: Option<String>,
    /// Bearer token for the inference endpoint.
    pub inference_api_token: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            completion_provider: "llama-server".to_string(),
            completion_endpoint: None,
            inference_endpoint: None,
            inference_api_token: None,
        }
    }
}

/// Top-level configuration: an ordered task list plus backend settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrubConfig {
    /// Redaction tasks, in execution order.
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
    /// Backend endpoint settings.
    #[serde(default)]
    pub backends: BackendSettings,
}

impl ScrubConfig {
    /// Loads and validates a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] on I/O failure and
    /// [`Error::Configuration`] for malformed YAML or invalid tasks.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_yaml(&raw).map_err(|e| match e {
            Error::Configuration { name, cause } => Error::Configuration {
                name,
                cause: format!("{}: {cause}", path.display()),
            },
            other => other,
        })
    }

    /// Parses and validates a YAML configuration string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for malformed YAML or invalid tasks.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(raw).map_err(|e| Error::Configuration {
            name: "config".to_string(),
            cause: e.to_string(),
        })?;
        for task in &config.tasks {
            task.validate()?;
        }
        Ok(config)
    }
}

/// Resolves named task configurations from the store, in the given order.
///
/// # Errors
///
/// Returns [`Error::Configuration`] when a name is absent or its stored
/// document is not a valid task.
pub fn tasks_from_store(store: &dyn ConfigStore, names: &[String]) -> Result<Vec<TaskConfig>> {
    names
        .iter()
        .map(|name| {
            let value = store.get(name)?;
            let task: TaskConfig =
                serde_json::from_value(value).map_err(|e| Error::Configuration {
                    name: name.clone(),
                    cause: format!("stored document is not a valid task: {e}"),
                })?;
            task.validate()?;
            Ok(task)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DetectorKind;
    use crate::store::SqliteConfigStore;

    const CONFIG_YAML: &str = r#"
backends:
  completion_provider: ollama
  completion_endpoint: http://localhost:11434
tasks:
  - name: emails
    model:
      kind: pattern
    replace_token: EMAIL@EMAIL.DE
    pattern: '[\w.+-]+@[\w-]+\.[\w.]+'
  - name: names
    model:
      kind: generative
      model_ref: em-german-leo
    replace_token: MAX
    context: "Find all person names in the following text:"
    examples:
      - input: "Alice wrote to Bob."
        output: ["Alice", "Bob"]
"#;

    #[test]
    fn test_from_yaml() {
        let config = ScrubConfig::from_yaml(CONFIG_YAML).unwrap();

        assert_eq!(config.backends.completion_provider, "ollama");
        assert_eq!(config.tasks.len(), 2);
        assert_eq!(config.tasks[1].model.kind, DetectorKind::Generative);
        assert_eq!(config.tasks[1].examples.len(), 1);
    }

    #[test]
    fn test_from_yaml_rejects_invalid_task() {
        // Pattern task without a pattern.
        let yaml = r#"
tasks:
  - name: broken
    model:
      kind: pattern
    replace_token: X
"#;
        assert!(matches!(
            ScrubConfig::from_yaml(yaml),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_tasks_from_store() {
        let store = SqliteConfigStore::in_memory().unwrap();
        let task = TaskConfig::pattern("emails", r"\S+@\S+", "[EMAIL]");
        store
            .add(&serde_json::to_value(&task).unwrap(), "emails")
            .unwrap();

        let tasks = tasks_from_store(&store, &["emails".to_string()]).unwrap();
        assert_eq!(tasks, vec![task]);
    }

    #[test]
    fn test_tasks_from_store_missing_name() {
        let store = SqliteConfigStore::in_memory().unwrap();
        assert!(tasks_from_store(&store, &["ghost".to_string()]).is_err());
    }
}
