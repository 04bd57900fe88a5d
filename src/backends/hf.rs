//! Hosted token-classification inference client.
//!
//! Speaks the Hugging Face inference wire protocol: one POST per sentence,
//! raw sub-token predictions without aggregation for [`TokenClassifier`] and
//! server-side aggregated spans for [`SpanTagger`].

use super::{HttpConfig, SpanTagger, TokenClassifier, build_http_client, error_kind};
use crate::models::{SpanLabel, TaggedSpan, TokenPrediction};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Client for a hosted token-classification endpoint.
pub struct HfInferenceClient {
    /// API endpoint.
    endpoint: String,
    /// Model identifier on the endpoint.
    model: String,
    /// Bearer token, if the endpoint requires one.
    api_token: Option<String>,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl HfInferenceClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api-inference.huggingface.co";

    /// Creates a new client for the given model.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        let endpoint = std::env::var("SCRUB_INFERENCE_ENDPOINT")
            .unwrap_or_else(|_| Self::DEFAULT_ENDPOINT.to_string());
        let api_token = std::env::var("SCRUB_INFERENCE_API_TOKEN").ok();

        Self {
            endpoint,
            model: model.into(),
            api_token,
            client: build_http_client(HttpConfig::from_env()),
        }
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: HttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    fn request<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        body: &InferenceRequest,
    ) -> Result<T> {
        let mut request = self
            .client
            .post(format!("{}/models/{}", self.endpoint, self.model))
            .json(body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| {
            let kind = error_kind(&e);
            tracing::error!(
                provider = "hf-inference",
                model = %self.model,
                error = %e,
                error_kind = kind,
                "inference request failed"
            );
            Error::Backend {
                operation: operation.to_string(),
                cause: format!("{kind} error: {e}"),
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            tracing::error!(
                provider = "hf-inference",
                model = %self.model,
                status = %status,
                body = %body,
                "inference API returned error status"
            );
            return Err(Error::Backend {
                operation: operation.to_string(),
                cause: format!("API returned status: {status} - {body}"),
            });
        }

        response.json().map_err(|e| {
            tracing::error!(
                provider = "hf-inference",
                model = %self.model,
                error = %e,
                "failed to parse inference response"
            );
            Error::Backend {
                operation: format!("{operation}_response"),
                cause: e.to_string(),
            }
        })
    }
}

impl TokenClassifier for HfInferenceClient {
    fn classify(&self, sentence: &str) -> Result<Vec<TokenPrediction>> {
        let request = InferenceRequest {
            inputs: sentence.to_string(),
            parameters: InferenceParameters {
                aggregation_strategy: "none".to_string(),
            },
        };
        self.request("token_classification", &request)
    }
}

impl SpanTagger for HfInferenceClient {
    fn tag(&self, sentence: &str) -> Result<Vec<TaggedSpan>> {
        let request = InferenceRequest {
            inputs: sentence.to_string(),
            parameters: InferenceParameters {
                aggregation_strategy: "simple".to_string(),
            },
        };
        let spans: Vec<AggregatedSpan> = self.request("span_tagging", &request)?;
        Ok(spans.into_iter().map(AggregatedSpan::into_span).collect())
    }
}

/// Request to the inference API.
#[derive(Debug, Serialize)]
struct InferenceRequest {
    inputs: String,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    aggregation_strategy: String,
}

/// An aggregated span as returned by the inference API.
#[derive(Debug, Deserialize)]
struct AggregatedSpan {
    entity_group: String,
    score: f32,
    word: String,
    start: usize,
    end: usize,
}

impl AggregatedSpan {
    fn into_span(self) -> TaggedSpan {
        TaggedSpan {
            text: self.word,
            start: self.start,
            end: self.end,
            labels: vec![SpanLabel {
                value: self.entity_group,
                score: self.score,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_configuration() {
        let client = HfInferenceClient::new("xlm-roberta-ner")
            .with_endpoint("http://localhost:8081")
            .with_api_token("hf_test");

        assert_eq!(client.model, "xlm-roberta-ner");
        assert_eq!(client.endpoint, "http://localhost:8081");
        assert_eq!(client.api_token.as_deref(), Some("hf_test"));
    }

    #[test]
    fn test_aggregated_span_conversion() {
        let span = AggregatedSpan {
            entity_group: "PER".to_string(),
            score: 0.98,
            word: "Christian Mayer".to_string(),
            start: 0,
            end: 15,
        };
        let tagged = span.into_span();

        assert_eq!(tagged.text, "Christian Mayer");
        assert_eq!(tagged.labels[0].value, "PER");
    }

    #[test]
    fn test_raw_prediction_wire_shape() {
        // Unknown fields like "index" must not break deserialization.
        let json = r#"[{"entity": "I-PER", "score": 0.99, "index": 1,
                        "word": "Chris", "start": 0, "end": 5}]"#;
        let predictions: Vec<TokenPrediction> = serde_json::from_str(json).unwrap();
        assert_eq!(predictions[0].word, "Chris");
        assert_eq!(predictions[0].entity, "I-PER");
    }
}
