//! AI context: the ephemeral value object fed to the report composer.
//!
//! Assembled from a visit's accepted entries by `core::context`; never
//! persisted. Shapes here mirror what the prompt template expects under
//! its `{{AI_CONTEXT_JSON}}` placeholder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::Language;

/// Sentinel used when an accepted audio entry has no transcript, so the
/// prompt stays well-formed instead of carrying nulls.
pub const TRANSCRIPTION_UNAVAILABLE: &str = "Transcription unavailable";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitContext {
    pub project_name: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextItem {
    pub content: String,
    pub is_finding: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioItem {
    pub transcription: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoItem {
    /// Time-limited accessible URL; `None` when resolution failed
    pub url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextEntries {
    pub text: Vec<TextItem>,
    pub audio: Vec<AudioItem>,
    pub photos: Vec<PhotoItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub industry: Option<String>,
    pub language: Option<Language>,
    pub country: Option<String>,
}

/// Everything the composer needs to render a prompt for one visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiContext {
    pub visit: VisitContext,
    pub entries: ContextEntries,
    pub metadata: ContextMetadata,
}

impl AiContext {
    /// Pretty-printed JSON for template substitution.
    pub fn to_prompt_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Total number of content items across all buckets.
    pub fn item_count(&self) -> usize {
        self.entries.text.len() + self.entries.audio.len() + self.entries.photos.len()
    }
}
