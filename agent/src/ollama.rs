//! Ollama `/api/generate` backend

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::inference::{InferenceBackend, InferenceError, InferenceRequest};

/// Config for an Ollama-style `POST /api/generate` endpoint
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Full endpoint URL, e.g. `http://127.0.0.1:11434/api/generate`
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub request_timeout: Duration,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a serde_json::Value,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| InferenceError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        let body = OllamaRequest {
            model: &self.config.model,
            system: &request.system,
            prompt: &request.prompt,
            stream: false,
            format: &request.schema,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let decoded = response
            .json::<OllamaResponse>()
            .await
            .map_err(|e| InferenceError::Decode(e.to_string()))?;
        debug!(model = %self.config.model, response = %decoded.response, "Model answered");
        Ok(decoded.response)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
