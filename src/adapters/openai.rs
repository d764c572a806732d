//! OpenAI chat-completions client for report generation.
//!
//! Single-shot: the composer does not retry generation calls, so failures
//! surface immediately with the provider's status and body.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{FieldError, FieldResult};

use super::{GenerationClient, GenerationRequest};

/// Response envelope from the chat completions API.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

pub struct OpenAiGenerationClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiGenerationClient {
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
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl GenerationClient for OpenAiGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> FieldResult<String> {
        let mut body = json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": request.messages,
        });
        if request.json_output {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| FieldError::provider(format!("generation request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FieldError::provider_status(
                status.as_u16(),
                format!("generation provider returned {}: {}", status, body),
            ));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| FieldError::provider(format!("unparsable generation response: {}", e)))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(FieldError::provider("generation provider returned an empty response"));
        }

        Ok(content)
    }
}
