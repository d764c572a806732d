//! Adapter interfaces for external capabilities.
//!
//! Adapters provide a unified interface for the external systems the core
//! depends on: the generation (chat-completions) capability, the
//! speech-to-text capability, the object store, and the local ffmpeg
//! transcoder. Core services hold these behind traits so tests can swap
//! in scripted implementations.

pub mod openai;
pub mod speech;
pub mod storage;
pub mod transcode;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::FieldResult;

// Re-export the concrete clients
pub use openai::OpenAiGenerationClient;
pub use speech::{OpenAiSpeechClient, SpeechError, SpeechRequest};
pub use storage::{FsObjectStore, ObjectStat};
pub use transcode::FfmpegTranscoder;

/// One message in a generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    /// A user message carrying image URLs for multimodal generation.
    pub fn user_images(urls: Vec<String>) -> Self {
        let parts = urls
            .into_iter()
            .map(|url| ContentPart::ImageUrl {
                image_url: ImageUrl { url },
            })
            .collect();
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        }
    }
}

/// Message content: plain text, or structured parts for image-bearing
/// messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Request to the generation capability.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub temperature: f32,
    /// Force JSON-object output mode
    pub json_output: bool,
    pub messages: Vec<ChatMessage>,
}

/// Text-generation capability (chat completions).
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Return the raw text of the single completion.
    async fn generate(&self, request: GenerationRequest) -> FieldResult<String>;
}

/// Speech-to-text capability.
///
/// Returns the provider's raw response body; callers parse it leniently.
/// Failures keep their HTTP status and body so the gateway can classify
/// them as retryable or fatal.
#[async_trait]
pub trait SpeechClient: Send + Sync {
    async fn transcribe(
        &self,
        request: SpeechRequest,
        timeout: Duration,
    ) -> Result<String, SpeechError>;
}

/// Audio transcoding fallback used by the transcription gateway.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Resample audio bytes to mono 16 kHz PCM WAV.
    async fn resample_to_wav(&self, audio: &[u8]) -> anyhow::Result<Vec<u8>>;
}

/// Object store boundary: stores uploaded media, resolves time-limited
/// accessible URLs, and can derive a stable object reference back from a
/// stored URL.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes, returning the object's stable URL.
    async fn put(&self, bytes: &[u8], name: &str, mime: &str) -> FieldResult<String>;

    /// Content type and size of a stored object.
    async fn stat(&self, url: &str) -> FieldResult<ObjectStat>;

    /// Read a stored object fully into memory.
    async fn get(&self, url: &str) -> FieldResult<Vec<u8>>;

    /// Resolve a time-limited accessible URL for a stored object.
    async fn presign(&self, url: &str, ttl_seconds: u64) -> FieldResult<String>;
}
