//! Speech-to-text transport over the OpenAI audio transcriptions API.
//!
//! This is transport only: one multipart upload per attempt, with the
//! per-attempt timeout enforced on the request. Retry and fallback policy
//! lives in `core::transcribe`, which needs failures preserved with their
//! status and body to classify them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use thiserror::Error;

use super::SpeechClient;

/// One transcription attempt.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub model: String,
    pub audio: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
    /// Optional prompt hint steering the provider's decoding
    pub prompt_hint: Option<String>,
}

/// Failure of a single transcription attempt.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("transcription attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("speech provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("speech transport error: {0}")]
    Transport(String),
}

/// OpenAI-compatible speech-to-text client.
pub struct OpenAiSpeechClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiSpeechClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com/v1".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }
}

#[async_trait]
impl SpeechClient for OpenAiSpeechClient {
    async fn transcribe(
        &self,
        request: SpeechRequest,
        timeout: Duration,
    ) -> Result<String, SpeechError> {
        let file_part = Part::bytes(request.audio)
            .file_name(request.filename.clone())
            .mime_str(&request.mime_type)
            .map_err(|e| SpeechError::Transport(format!("invalid mime type: {}", e)))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", request.model.clone())
            .text("response_format", "json");

        if let Some(hint) = request.prompt_hint {
            form = form.text("prompt", hint);
        }

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SpeechError::Timeout(timeout)
                } else {
                    SpeechError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                SpeechError::Timeout(timeout)
            } else {
                SpeechError::Transport(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(SpeechError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}
