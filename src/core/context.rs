//! Context builder: projects a visit's accepted entries into the AI
//! context consumed by the report composer.
//!
//! Entries are processed in creation order. Audio entries without a
//! completed transcript are transcribed first, sequentially and
//! best-effort, so the composer sees as much text as the providers could
//! produce; whatever still has no transcript gets the sentinel string.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::adapters::ObjectStore;
use crate::domain::context::{
    AudioItem, ContextEntries, ContextMetadata, PhotoItem, TextItem, VisitContext,
};
use crate::domain::{
    AiContext, EntryType, FieldError, FieldResult, TranscriptionStatus, TRANSCRIPTION_UNAVAILABLE,
};
use crate::store::DocumentStore;

use super::review::transcribe_and_record;
use super::transcribe::TranscriptionGateway;

const PRESIGN_TTL_SECONDS: u64 = 3600;

pub struct ContextBuilder {
    store: Arc<DocumentStore>,
    storage: Arc<dyn ObjectStore>,
    gateway: Arc<TranscriptionGateway>,
}

impl ContextBuilder {
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

    /// Transcribe every accepted audio entry that has no completed
    /// transcript yet, one at a time in creation order.
    ///
    /// Best-effort: a failed entry keeps its recorded error and processing
    /// continues with the next one. Entries already `processing` are
    /// skipped rather than re-triggered.
    #[instrument(skip(self), fields(visit_id = %visit_id))]
    pub async fn transcribe_pending(&self, visit_id: Uuid) -> FieldResult<()> {
        let entries = self.store.accepted_entries(visit_id).await;

        for entry in entries {
            if entry.entry_type != EntryType::Audio
                || entry.transcription_status == TranscriptionStatus::Done
            {
                continue;
            }
            if entry.transcription_status == TranscriptionStatus::Processing {
                debug!(entry_id = %entry.id, "transcription already in progress, skipping");
                continue;
            }

            let mut pending = entry.clone();
            pending.transcription_status = TranscriptionStatus::Processing;
            pending.transcription_error = None;
            pending.updated_at = Utc::now();
            self.store.save_entry(pending).await?;

            if let Err(e) =
                transcribe_and_record(self.store.clone(), self.gateway.clone(), entry.id).await
            {
                warn!(entry_id = %entry.id, error = %e, "pre-generation transcription failed");
            }
        }

        Ok(())
    }

    /// Build the AI context from the visit's accepted entries.
    #[instrument(skip(self), fields(visit_id = %visit_id))]
    pub async fn build(&self, visit_id: Uuid) -> FieldResult<AiContext> {
        let visit = self.store.get_visit(visit_id).await?;
        let entries = self.store.accepted_entries(visit_id).await;

        if entries.is_empty() {
            return Err(FieldError::usage(
                "cannot generate report: no accepted entries",
            ));
        }

        let mut buckets = ContextEntries::default();

        for entry in &entries {
            match entry.entry_type {
                EntryType::Text => buckets.text.push(TextItem {
                    content: entry.text.clone().unwrap_or_default(),
                    is_finding: entry.is_finding,
                }),
                EntryType::Audio => buckets.audio.push(AudioItem {
                    transcription: entry
                        .transcription
                        .clone()
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| TRANSCRIPTION_UNAVAILABLE.to_string()),
                }),
                EntryType::Photo => {
                    // presign failures degrade to a missing URL, never abort
                    let url = match &entry.file_url {
                        Some(stored) => {
                            match self.storage.presign(stored, PRESIGN_TTL_SECONDS).await {
                                Ok(signed) => Some(signed),
                                Err(e) => {
                                    debug!(entry_id = %entry.id, error = %e, "photo URL resolution failed");
                                    None
                                }
                            }
                        }
                        None => None,
                    };
                    buckets.photos.push(PhotoItem {
                        url,
                        description: entry.text.clone(),
                    });
                }
            }
        }

        Ok(AiContext {
            visit: VisitContext {
                project_name: visit.project_name.clone(),
                location: visit.location.clone(),
                created_at: visit.created_at,
            },
            entries: buckets,
            metadata: ContextMetadata {
                industry: visit.industry.clone(),
                language: visit.language,
                country: visit.country.clone(),
            },
        })
    }
}
