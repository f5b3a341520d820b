/// Ollama `/api/generate` captioning backend

use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{CaptionError, Captioner};
use crate::config::CaptionConfig;

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
    system: &'a str,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Captioner backed by a vision model served through Ollama
pub struct OllamaCaptioner {
    client: Client,
    config: CaptionConfig,
}

impl OllamaCaptioner {
    pub fn new(config: CaptionConfig) -> Result<Self, CaptionError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(OllamaCaptioner {
            client: builder.build()?,
            config,
        })
    }

    fn request_body(&self, image: &[u8]) -> GenerateRequest<'_> {
        GenerateRequest {
            model: &self.config.model,
            prompt: &self.config.prompt,
            images: vec![general_purpose::STANDARD.encode(image)],
            stream: false,
            system: &self.config.system_prompt,
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_predict: self.config.num_predict,
            },
        }
    }
}

impl Captioner for OllamaCaptioner {
    async fn caption(&self, image: &[u8]) -> Result<String, CaptionError> {
        let body = self.request_body(image);
        debug!(
            "POST {} (model {}, {} image bytes)",
            self.config.endpoint,
            self.config.model,
            image.len()
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CaptionError::Status(status));
        }

        // Read as text first so a bad body reports as malformed, not transport
        let text = response.text().await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| CaptionError::Malformed(e.to_string()))?;

        Ok(parsed.response.trim().to_string())
    }
}
