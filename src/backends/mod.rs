//! Model backend abstraction.
//!
//! Detectors talk to inference backends through three narrow traits:
//! [`CompletionClient`] for text generation, [`TokenClassifier`] for
//! sub-token classification and [`SpanTagger`] for whole-span tagging.
//! [`ModelBackends`] is the factory the detector registry pulls clients
//! from; tests substitute it with mock backends.

mod hf;
mod llama;
mod ollama;

pub use hf::HfInferenceClient;
pub use llama::LlamaServerClient;
pub use ollama::OllamaClient;

use crate::models::{TaggedSpan, TokenPrediction};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Trait for completion-model clients.
pub trait CompletionClient: Send + Sync {
    /// The client name, for logging.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Trait for token-classification model clients.
pub trait TokenClassifier: Send + Sync {
    /// Runs the classifier over one sentence, returning raw sub-token
    /// predictions in document order.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn classify(&self, sentence: &str) -> Result<Vec<TokenPrediction>>;
}

/// Trait for span-level sequence-tagger clients.
pub trait SpanTagger: Send + Sync {
    /// Runs the tagger over one sentence, returning whole labeled spans.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn tag(&self, sentence: &str) -> Result<Vec<TaggedSpan>>;
}

/// Factory for model backend clients.
///
/// The detector registry resolves every client through this trait, so the
/// whole pipeline can run against mock backends in tests.
pub trait ModelBackends: Send + Sync {
    /// Returns a completion client for the given model reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed.
    fn completion(&self, model_ref: Option<&str>) -> Result<Arc<dyn CompletionClient>>;

    /// Returns a token classifier for the given model reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed.
    fn token_classifier(&self, model_ref: &str) -> Result<Arc<dyn TokenClassifier>>;

    /// Returns a span tagger for the given model reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed.
    fn span_tagger(&self, model_ref: &str) -> Result<Arc<dyn SpanTagger>>;
}

/// HTTP client configuration for backend requests.
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 120_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl HttpConfig {
    /// Loads HTTP configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(v) = std::env::var("SCRUB_BACKEND_TIMEOUT_MS") {
            if let Ok(timeout_ms) = v.parse::<u64>() {
                settings.timeout_ms = timeout_ms;
            }
        }
        if let Ok(v) = std::env::var("SCRUB_BACKEND_CONNECT_TIMEOUT_MS") {
            if let Ok(connect_timeout_ms) = v.parse::<u64>() {
                settings.connect_timeout_ms = connect_timeout_ms;
            }
        }
        settings
    }
}

/// Builds a blocking HTTP client with configured timeouts.
#[must_use]
pub fn build_http_client(config: HttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build backend HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Classifies a reqwest error for logging and error messages.
pub(crate) fn error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else if e.is_request() {
        "request"
    } else {
        "unknown"
    }
}

/// HTTP-backed [`ModelBackends`] built from endpoint settings.
pub struct HttpBackends {
    settings: crate::config::BackendSettings,
    http: HttpConfig,
}

impl HttpBackends {
    /// Creates backends from endpoint settings, with env-derived timeouts.
    #[must_use]
    pub fn new(settings: crate::config::BackendSettings) -> Self {
        Self {
            settings,
            http: HttpConfig::from_env(),
        }
    }

    /// Overrides the HTTP timeouts.
    #[must_use]
    pub const fn with_http_config(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }
}

impl ModelBackends for HttpBackends {
    fn completion(&self, model_ref: Option<&str>) -> Result<Arc<dyn CompletionClient>> {
        match self.settings.completion_provider.as_str() {
            "llama-server" => {
                let mut client = LlamaServerClient::new().with_http_config(self.http);
                if let Some(endpoint) = &self.settings.completion_endpoint {
                    client = client.with_endpoint(endpoint);
                }
                Ok(Arc::new(client))
            },
            "ollama" => {
                let mut client = OllamaClient::new().with_http_config(self.http);
                if let Some(endpoint) = &self.settings.completion_endpoint {
                    client = client.with_endpoint(endpoint);
                }
                if let Some(model) = model_ref {
                    client = client.with_model(model);
                }
                Ok(Arc::new(client))
            },
            other => Err(Error::Configuration {
                name: other.to_string(),
                cause: "unknown completion provider (expected llama-server or ollama)".to_string(),
            }),
        }
    }

    fn token_classifier(&self, model_ref: &str) -> Result<Arc<dyn TokenClassifier>> {
        Ok(Arc::new(self.inference_client(model_ref)))
    }

    fn span_tagger(&self, model_ref: &str) -> Result<Arc<dyn SpanTagger>> {
        Ok(Arc::new(self.inference_client(model_ref)))
    }
}

impl HttpBackends {
    fn inference_client(&self, model_ref: &str) -> HfInferenceClient {
        let mut client = HfInferenceClient::new(model_ref).with_http_config(self.http);
        if let Some(endpoint) = &self.settings.inference_endpoint {
            client = client.with_endpoint(endpoint);
        }
        if let Some(token) = &self.settings.inference_api_token {
            client = client.with_api_token(token);
        }
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout_ms, 120_000);
        assert_eq!(config.connect_timeout_ms, 3_000);
    }

    #[test]
    fn test_unknown_completion_provider() {
        let backends = HttpBackends::new(crate::config::BackendSettings {
            completion_provider: "davinci".to_string(),
            ..Default::default()
        });
        assert!(backends.completion(None).is_err());
    }
}
