//! Local fine-tuned model client
//!
//! Talks to a locally served text-generation endpoint (Ollama-compatible
//! `/api/generate`). Decoding is deterministic: sampling disabled, output
//! capped by `max_new_tokens`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::TextGenerator;
use crate::config::LocalModelConfig;
use crate::errors::BoardRagError;
use crate::Result;

pub struct LocalTextModel {
    endpoint: String,
    model: String,
    client: Client,
}

impl LocalTextModel {
    pub fn new(config: &LocalModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| BoardRagError::Http(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            client,
        })
    }

    /// Probe the serving endpoint once at startup. A failed probe means the
    /// local backend stays unavailable; the process keeps running.
    pub async fn probe(&self) -> Result<()> {
        self.client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| BoardRagError::Http(format!("Local model endpoint unreachable: {e}")))?
            .error_for_status()
            .map_err(|e| BoardRagError::Http(format!("Local model endpoint unhealthy: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl TextGenerator for LocalTextModel {
    async fn generate(&self, prompt: &str, max_new_tokens: usize) -> Result<String> {
        #[derive(Serialize)]
        struct GenerateRequest<'a> {
            model: &'a str,
            prompt: &'a str,
            stream: bool,
            options: GenerateOptions,
        }

        #[derive(Serialize)]
        struct GenerateOptions {
            temperature: f32,
            num_predict: usize,
        }

        #[derive(Deserialize)]
        struct GenerateResponse {
            response: String,
        }

        let url = format!("{}/api/generate", self.endpoint);
        debug!("Calling local generation API: {} (prompt: {} chars)", url, prompt.len());

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                // Greedy decoding, matching the fine-tuned model's serving setup
                temperature: 0.0,
                num_predict: max_new_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BoardRagError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BoardRagError::Generation(format!(
                "Local generation error ({status}): {error_text}"
            )));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| BoardRagError::Generation(format!("Failed to parse response: {e}")))?;

        Ok(result.response)
    }
}
