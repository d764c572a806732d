//! Entry review service: creation validation, the review state machine,
//! and the transcription triggers coupled to it.
//!
//! Acceptance of an audio entry kicks off transcription as a spawned side
//! effect: the accept call returns immediately and a later failure is
//! recorded on the entry (`transcription_status = error`). The manual
//! trigger runs the same underlying transcribe-and-record routine inline
//! and propagates its failure to the caller. That asymmetry is the
//! contract, not an accident.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::adapters::ObjectStore;
use crate::domain::entry::validate_text_content;
use crate::domain::{
    Entry, EntryType, EntryUpdate, FieldError, FieldResult, ReviewStatus, TranscriptionStatus,
};
use crate::store::DocumentStore;

use super::transcribe::TranscriptionGateway;

pub const MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_AUDIO_MIME: &[&str] = &["audio/mpeg", "audio/mp3", "audio/wav", "audio/webm"];
const ALLOWED_PHOTO_MIME: &[&str] = &["image/jpeg", "image/png"];

/// An uploaded file accompanying an audio/photo entry.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

/// Request to create an entry.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub visit_id: Uuid,
    pub entry_type: EntryType,
    pub text: Option<String>,
    pub is_finding: bool,
    pub file: Option<UploadFile>,
}

pub struct ReviewService {
    store: Arc<DocumentStore>,
    storage: Arc<dyn ObjectStore>,
    gateway: Arc<TranscriptionGateway>,
}

impl ReviewService {
    pub fn new(
        store: Arc<DocumentStore>,
        storage: Arc<dyn ObjectStore>,
        gateway: Arc<TranscriptionGateway>,
    ) -> Self {
        Self {
            store,
            storage,
            gateway,
        }
    }

    /// Create an entry, validating content per type and storing the file.
    #[instrument(skip(self, request), fields(visit_id = %request.visit_id, entry_type = %request.entry_type))]
    pub async fn create_entry(&self, request: NewEntry) -> FieldResult<Entry> {
        let visit = self.store.get_visit(request.visit_id).await?;

        let mut entry = Entry::new(visit.id, request.entry_type);
        entry.is_finding = request.is_finding;

        match request.entry_type {
            EntryType::Text => {
                let text = request.text.as_deref().unwrap_or_default();
                validate_text_content(text)?;
                entry.text = Some(text.to_string());
            }
            EntryType::Audio | EntryType::Photo => {
                let file = request.file.as_ref().ok_or_else(|| {
                    FieldError::usage("file is required for audio/photo entries")
                })?;
                validate_upload(request.entry_type, file)?;

                let url = self
                    .storage
                    .put(&file.bytes, &file.filename, &file.mime_type)
                    .await?;
                entry.file_url = Some(url);
                // photo caption
                entry.text = request.text.clone();
            }
        }

        let entry = self.store.insert_entry(entry).await?;
        info!(entry_id = %entry.id, status = %entry.status, "entry created");
        Ok(entry)
    }

    /// Non-deleted entries of a visit, newest first.
    pub async fn list_entries(&self, visit_id: Uuid) -> FieldResult<Vec<Entry>> {
        self.store.get_visit(visit_id).await?;
        Ok(self.store.list_entries(visit_id).await)
    }

    /// Apply an allow-listed update, enforcing the review state machine.
    ///
    /// When the update moves an audio entry into `accepted` and no
    /// transcript exists yet, transcription is spawned in the background;
    /// this call does not wait for it.
    #[instrument(skip(self, update), fields(entry_id = %entry_id))]
    pub async fn update_entry(&self, entry_id: Uuid, update: EntryUpdate) -> FieldResult<Entry> {
        let mut entry = self.store.get_entry(entry_id).await?;

        if let Some(requested) = update.status {
            entry.validate_status_change(requested)?;
        }
        if entry.entry_type == EntryType::Text {
            if let Some(ref text) = update.text {
                validate_text_content(text)?;
            }
        }

        let auto_transcribe = update
            .status
            .map_or(false, |requested| entry.triggers_transcription(requested));

        if let Some(status) = update.status {
            entry.status = status;
        }
        if let Some(text) = update.text {
            entry.text = Some(text);
        }
        if let Some(transcription) = update.transcription {
            entry.transcription = Some(transcription);
        }
        if let Some(is_finding) = update.is_finding {
            entry.is_finding = is_finding;
        }
        if let Some(edited) = update.edited {
            entry.edited = edited;
        }
        if let Some(deleted) = update.deleted {
            entry.deleted = deleted;
        }

        if auto_transcribe {
            entry.transcription_status = TranscriptionStatus::Processing;
            entry.transcription_error = None;
        }
        entry.updated_at = Utc::now();

        let saved = self.store.save_entry(entry).await?;

        if auto_transcribe {
            // Side effect of acceptance: does not block this response, and
            // its failure lands on the entry rather than on this caller.
            let store = self.store.clone();
            let gateway = self.gateway.clone();
            tokio::spawn(async move {
                if let Err(e) = transcribe_and_record(store, gateway, entry_id).await {
                    warn!(entry_id = %entry_id, error = %e, "auto-transcription failed");
                }
            });
        }

        Ok(saved)
    }

    /// Change an entry's review status.
    pub async fn set_status(&self, entry_id: Uuid, status: ReviewStatus) -> FieldResult<Entry> {
        self.update_entry(
            entry_id,
            EntryUpdate {
                status: Some(status),
                ..EntryUpdate::default()
            },
        )
        .await
    }

    /// Manual transcription trigger: runs inline and propagates failure.
    #[instrument(skip(self), fields(entry_id = %entry_id))]
    pub async fn transcribe_entry(&self, entry_id: Uuid) -> FieldResult<Entry> {
        let mut entry = self.store.get_entry(entry_id).await?;
        entry.validate_manual_transcription()?;

        entry.transcription_status = TranscriptionStatus::Processing;
        entry.transcription_error = None;
        entry.updated_at = Utc::now();
        self.store.save_entry(entry).await?;

        transcribe_and_record(self.store.clone(), self.gateway.clone(), entry_id).await
    }
}

fn validate_upload(entry_type: EntryType, file: &UploadFile) -> FieldResult<()> {
    match entry_type {
        EntryType::Audio => {
            if !ALLOWED_AUDIO_MIME.contains(&file.mime_type.as_str()) {
                return Err(FieldError::usage(format!(
                    "invalid audio type '{}' (allowed: {})",
                    file.mime_type,
                    ALLOWED_AUDIO_MIME.join(", ")
                )));
            }
            if file.bytes.len() > MAX_AUDIO_BYTES {
                return Err(FieldError::usage("audio exceeds the 10 MB limit"));
            }
        }
        EntryType::Photo => {
            if !ALLOWED_PHOTO_MIME.contains(&file.mime_type.as_str()) {
                return Err(FieldError::usage(format!(
                    "invalid photo type '{}' (allowed: {})",
                    file.mime_type,
                    ALLOWED_PHOTO_MIME.join(", ")
                )));
            }
            if file.bytes.len() > MAX_PHOTO_BYTES {
                return Err(FieldError::usage("photo exceeds the 5 MB limit"));
            }
        }
        EntryType::Text => {}
    }
    Ok(())
}

/// Shared transcribe-and-record routine behind both trigger paths.
///
/// Runs the gateway against the entry's stored audio and writes the
/// outcome back: transcript fields on success, error state on failure.
/// The caller decides whether the returned error is swallowed (auto
/// trigger) or propagated (manual trigger).
pub(crate) async fn transcribe_and_record(
    store: Arc<DocumentStore>,
    gateway: Arc<TranscriptionGateway>,
    entry_id: Uuid,
) -> FieldResult<Entry> {
    let entry = store.get_entry(entry_id).await?;
    let file_url = entry.file_url.clone().ok_or_else(|| {
        FieldError::usage("audio entry has no stored file to transcribe")
    })?;

    match gateway.transcribe_object(&file_url).await {
        Ok(transcript) => {
            let mut entry = store.get_entry(entry_id).await?;
            entry.transcription = Some(transcript.text);
            entry.transcription_language = transcript.language;
            entry.transcription_status = TranscriptionStatus::Done;
            entry.transcription_error = None;
            entry.transcribed_at = Some(transcript.completed_at);
            entry.updated_at = Utc::now();
            let saved = store.save_entry(entry).await?;
            info!(entry_id = %entry_id, model = %transcript.model, "transcription recorded");
            Ok(saved)
        }
        Err(e) => {
            // Record the failure on the entry; a second failure while
            // saving is only logged.
            match store.get_entry(entry_id).await {
                Ok(mut entry) => {
                    entry.transcription_status = TranscriptionStatus::Error;
                    entry.transcription_error = Some(e.to_string());
                    entry.updated_at = Utc::now();
                    if let Err(save_err) = store.save_entry(entry).await {
                        warn!(entry_id = %entry_id, error = %save_err, "failed to record transcription error");
                    }
                }
                Err(read_err) => {
                    warn!(entry_id = %entry_id, error = %read_err, "entry vanished during transcription");
                }
            }
            Err(e)
        }
    }
}
