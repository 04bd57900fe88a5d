//! llama.cpp server client.

use super::{CompletionClient, HttpConfig, build_http_client, error_kind};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Client for the llama.cpp HTTP server `/completion` API.
pub struct LlamaServerClient {
    /// API endpoint.
    endpoint: String,
    /// Upper bound on generated tokens.
    n_predict: u32,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl LlamaServerClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:8080";

    /// Creates a new llama.cpp server client.
    #[must_use]
    pub fn new() -> Self {
        let endpoint = std::env::var("SCRUB_LLAMA_ENDPOINT")
            .unwrap_or_else(|_| Self::DEFAULT_ENDPOINT.to_string());

        Self {
            endpoint,
            n_predict: 256,
            client: build_http_client(HttpConfig::from_env()),
        }
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the generated-token budget.
    #[must_use]
    pub const fn with_n_predict(mut self, n_predict: u32) -> Self {
        self.n_predict = n_predict;
        self
    }

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: HttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    /// Checks if the server is reachable.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/health", self.endpoint))
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

impl Default for LlamaServerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionClient for LlamaServerClient {
    fn name(&self) -> &'static str {
        "llama-server"
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        let request = CompletionRequest {
            prompt: prompt.to_string(),
            n_predict: self.n_predict,
            temperature: 0.0,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/completion", self.endpoint))
            .json(&request)
            .send()
            .map_err(|e| {
                let kind = error_kind(&e);
                tracing::error!(
                    provider = "llama-server",
                    error = %e,
                    error_kind = kind,
                    "completion request failed"
                );
                Error::Backend {
                    operation: "llama_completion".to_string(),
                    cause: format!("{kind} error: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            tracing::error!(
                provider = "llama-server",
                status = %status,
                body = %body,
                "completion API returned error status"
            );
            return Err(Error::Backend {
                operation: "llama_completion".to_string(),
                cause: format!("API returned status: {status} - {body}"),
            });
        }

        let response: CompletionResponse = response.json().map_err(|e| {
            tracing::error!(
                provider = "llama-server",
                error = %e,
                "failed to parse completion response"
            );
            Error::Backend {
                operation: "llama_completion_response".to_string(),
                cause: e.to_string(),
            }
        })?;

        Ok(response.content)
    }
}

/// Request to the `/completion` API.
#[derive(Debug, Serialize)]
struct CompletionRequest {
    prompt: String,
    n_predict: u32,
    temperature: f32,
    stream: bool,
}

/// Response from the `/completion` API.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LlamaServerClient::new().with_endpoint("http://localhost:9999");
        assert_eq!(client.name(), "llama-server");
        assert_eq!(client.endpoint, "http://localhost:9999");
    }

    #[test]
    fn test_default_n_predict() {
        let client = LlamaServerClient {
            endpoint: LlamaServerClient::DEFAULT_ENDPOINT.to_string(),
            n_predict: 256,
            client: reqwest::blocking::Client::new(),
        };
        assert_eq!(client.n_predict, 256);
    }
}
