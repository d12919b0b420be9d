//! Minimal client for OpenAI-compatible text embedding APIs.
//!
//! This crate provides a focused client for the `/embeddings` endpoint with:
//! - Single and batch embedding requests
//! - Typed errors (no silent zero vectors on failure)
//! - Builder-style configuration for model and base URL

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Errors that can occur when using the embeddings client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Embeddings API client.
#[derive(Clone)]
pub struct Embeddings {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl Embeddings {
    /// Create a new embeddings client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .connect_timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.into(),
            base_url: API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a client from the OPENAI_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| Error::NoApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set the embedding model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at a different OpenAI-compatible base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The model this client embeds with.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed a batch of inputs, returning one vector per input in order.
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, Error> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = ApiRequest {
            model: &self.model,
            input: inputs,
        };
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        let mut data = api_response.data;
        if data.len() != inputs.len() {
            return Err(Error::Parse(format!(
                "expected {} vectors, got {}",
                inputs.len(),
                data.len()
            )));
        }

        // The API guarantees an index per item; order by it rather than
        // trusting response order.
        data.sort_by_key(|item| item.index);
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }

    /// Embed a single input.
    pub async fn embed_one(&self, input: &str) -> Result<Vec<f32>, Error> {
        let vectors = self.embed(std::slice::from_ref(&input.to_string())).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::Parse("API returned no vectors".to_string()))
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|_| Error::Config("API key contains invalid characters".to_string()))?,
        );
        Ok(headers)
    }
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct ApiResponse {
    data: Vec<ApiEmbedding>,
}

#[derive(Deserialize)]
struct ApiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_configuration() {
        let client = Embeddings::new("sk-test")
            .with_model("text-embedding-3-large")
            .with_base_url("http://localhost:8080/v1");
        assert_eq!(client.model(), "text-embedding-3-large");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_request_shape() {
        let inputs = vec!["a".to_string(), "b".to_string()];
        let request = ApiRequest {
            model: "text-embedding-3-small",
            input: &inputs,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "text-embedding-3-small");
        assert_eq!(json["input"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_response_ordering() {
        let body = r#"{"data":[
            {"index":1,"embedding":[2.0]},
            {"index":0,"embedding":[1.0]}
        ]}"#;
        let mut parsed: ApiResponse = serde_json::from_str(body).unwrap();
        parsed.data.sort_by_key(|item| item.index);
        assert_eq!(parsed.data[0].embedding, vec![1.0]);
        assert_eq!(parsed.data[1].embedding, vec![2.0]);
    }

    #[test]
    fn test_error_display() {
        let err = Error::Api {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "API error (status 429): rate limited");
    }
}
