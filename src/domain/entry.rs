//! Entry model and the review/transcription state machines.
//!
//! An entry is one unit of field evidence (text note, audio recording or
//! photo) attached to a visit. The transition rules here are pure; the
//! orchestration that applies them (and triggers transcription) lives in
//! `core::review`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{FieldError, FieldResult};

/// Kind of evidence an entry carries. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Text,
    Audio,
    Photo,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
            Self::Photo => "photo",
        }
    }
}

impl FromStr for EntryType {
    type Err = FieldError;

    fn from_str(s: &str) -> FieldResult<Self> {
        match s {
            "text" => Ok(Self::Text),
            "audio" => Ok(Self::Audio),
            "photo" => Ok(Self::Photo),
            other => Err(FieldError::usage(format!(
                "invalid entry type '{}' (expected one of: text, audio, photo)",
                other
            ))),
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review status of an entry.
///
/// Audio entries start `pending` and move exactly once to `accepted` or
/// `rejected`; the two outcomes are not reachable from each other. Text
/// and photo entries are always `accepted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ReviewStatus {
    /// Default status at creation time for the given entry type.
    pub fn default_for(entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::Audio => Self::Pending,
            EntryType::Text | EntryType::Photo => Self::Accepted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = FieldError;

    fn from_str(s: &str) -> FieldResult<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(FieldError::usage(format!(
                "invalid status '{}' (expected one of: pending, accepted, rejected)",
                other
            ))),
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transcription pipeline state. Only meaningful for audio entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionStatus {
    Idle,
    Processing,
    Done,
    Error,
}

impl Default for TranscriptionStatus {
    fn default() -> Self {
        Self::Idle
    }
}

/// Normalized transcript/report language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
    Pt,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
            Self::Pt => "pt",
        }
    }

    /// Full language name, used in prompt directives.
    pub fn full_name(&self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Es => "Spanish",
            Self::Pt => "Portuguese",
        }
    }
}

impl FromStr for Language {
    type Err = FieldError;

    fn from_str(s: &str) -> FieldResult<Self> {
        match s {
            "en" => Ok(Self::En),
            "es" => Ok(Self::Es),
            "pt" => Ok(Self::Pt),
            other => Err(FieldError::usage(format!(
                "invalid language '{}' (expected one of: en, es, pt)",
                other
            ))),
        }
    }
}

/// One unit of field evidence attached to a visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,

    /// Owning visit
    pub visit_id: Uuid,

    #[serde(rename = "type")]
    pub entry_type: EntryType,

    /// Object-store URL of the uploaded file (audio/photo only)
    pub file_url: Option<String>,

    /// Text content (text entries; also used as a photo caption)
    pub text: Option<String>,

    /// Transcript text produced by the transcription pipeline
    pub transcription: Option<String>,

    #[serde(default)]
    pub transcription_status: TranscriptionStatus,

    pub transcription_error: Option<String>,

    pub transcription_language: Option<Language>,

    pub transcribed_at: Option<DateTime<Utc>>,

    pub status: ReviewStatus,

    /// Marks the entry as a reportable finding vs. a routine observation
    #[serde(default)]
    pub is_finding: bool,

    /// Set when content was hand-edited after creation
    #[serde(default)]
    pub edited: bool,

    /// Soft-delete flag; deleted entries are excluded from listings and reports
    #[serde(default)]
    pub deleted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    /// Create a new entry with the default review status for its type.
    pub fn new(visit_id: Uuid, entry_type: EntryType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            visit_id,
            entry_type,
            file_url: None,
            text: None,
            transcription: None,
            transcription_status: TranscriptionStatus::Idle,
            transcription_error: None,
            transcription_language: None,
            transcribed_at: None,
            status: ReviewStatus::default_for(entry_type),
            is_finding: false,
            edited: false,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether a requested review-status change is legal.
    ///
    /// Non-audio entries must remain `accepted`. Audio entries may not
    /// cross between `accepted` and `rejected` in either direction;
    /// re-requesting the current status is a no-op and allowed.
    pub fn validate_status_change(&self, requested: ReviewStatus) -> FieldResult<()> {
        if self.entry_type != EntryType::Audio {
            if requested != ReviewStatus::Accepted {
                return Err(FieldError::usage(
                    "text and photo entries must remain accepted",
                ));
            }
            return Ok(());
        }

        match (self.status, requested) {
            (ReviewStatus::Accepted, ReviewStatus::Rejected) => Err(FieldError::usage(
                "cannot reject an accepted audio entry",
            )),
            (ReviewStatus::Rejected, ReviewStatus::Accepted) => Err(FieldError::usage(
                "cannot accept a rejected audio entry",
            )),
            _ => Ok(()),
        }
    }

    /// Whether moving to `requested` should kick off automatic transcription:
    /// an audio entry entering `accepted` from another state, with no
    /// completed transcript yet.
    pub fn triggers_transcription(&self, requested: ReviewStatus) -> bool {
        self.entry_type == EntryType::Audio
            && requested == ReviewStatus::Accepted
            && self.status != ReviewStatus::Accepted
            && self.transcription_status != TranscriptionStatus::Done
    }

    /// Check whether a manual transcription request is legal for this entry.
    pub fn validate_manual_transcription(&self) -> FieldResult<()> {
        if self.entry_type != EntryType::Audio {
            return Err(FieldError::usage(
                "transcription is supported only for audio entries",
            ));
        }
        match self.transcription_status {
            TranscriptionStatus::Processing => Err(FieldError::usage(
                "transcription already in progress",
            )),
            TranscriptionStatus::Done => {
                Err(FieldError::usage("entry is already transcribed"))
            }
            TranscriptionStatus::Idle | TranscriptionStatus::Error => Ok(()),
        }
    }

    /// Best textual content for report building: text first, then transcript.
    pub fn content_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                self.transcription
                    .as_deref()
                    .filter(|t| !t.trim().is_empty())
            })
    }
}

/// Minimum trimmed length for text-entry content.
pub const MIN_TEXT_LEN: usize = 5;

/// Validate text-entry content length.
pub fn validate_text_content(text: &str) -> FieldResult<()> {
    if text.trim().chars().count() < MIN_TEXT_LEN {
        return Err(FieldError::usage(format!(
            "text must be at least {} characters",
            MIN_TEXT_LEN
        )));
    }
    Ok(())
}

/// Mutable-field allow-list for entry updates.
///
/// Deserialization ignores unknown fields, so an update request can only
/// ever touch the fields named here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryUpdate {
    pub status: Option<ReviewStatus>,
    pub text: Option<String>,
    pub transcription: Option<String>,
    pub is_finding: Option<bool>,
    pub edited: Option<bool>,
    pub deleted: Option<bool>,
}

impl EntryUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.text.is_none()
            && self.transcription.is_none()
            && self.is_finding.is_none()
            && self.edited.is_none()
            && self.deleted.is_none()
    }
}
