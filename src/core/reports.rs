//! Report operations: generate, fetch, and edit reports for a visit.
//!
//! Reports are keyed by `(visit_id, kind)`; regeneration upsert-replaces
//! the previous document. The AI path runs the full pipeline: bulk
//! pre-transcription, context assembly, composition, strict validation,
//! persistence of the serialized validated output.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{AiReportOutput, FieldError, FieldResult, Report, ReportKind};
use crate::store::DocumentStore;

use super::composer::{ComposeOptions, ReportComposer};
use super::context::ContextBuilder;
use super::markdown;

pub struct ReportService {
    store: Arc<DocumentStore>,
    context: ContextBuilder,
    composer: ReportComposer,
}

impl ReportService {
    pub fn new(store: Arc<DocumentStore>, context: ContextBuilder, composer: ReportComposer) -> Self {
        Self {
            store,
            context,
            composer,
        }
    }

    /// Generate (or regenerate) the deterministic Markdown report.
    #[instrument(skip(self), fields(visit_id = %visit_id))]
    pub async fn generate_deterministic(&self, visit_id: Uuid) -> FieldResult<Report> {
        let visit = self.store.get_visit(visit_id).await?;
        let entries = self.store.accepted_entries(visit_id).await;
        if entries.is_empty() {
            return Err(FieldError::usage(
                "cannot generate report: no accepted entries",
            ));
        }

        let content = markdown::build_report(&visit, &entries);
        let report = self
            .store
            .upsert_report(Report::deterministic(visit_id, content))
            .await?;
        info!(report_id = %report.id, "deterministic report generated");
        Ok(report)
    }

    /// Generate (or regenerate) the AI report.
    ///
    /// Nothing is persisted unless the composed output passed schema
    /// validation; any failure along the pipeline leaves the previous
    /// report (if any) untouched.
    #[instrument(skip(self, options), fields(visit_id = %visit_id))]
    pub async fn generate_ai(
        &self,
        visit_id: Uuid,
        options: &ComposeOptions,
    ) -> FieldResult<Report> {
        // visit existence and the no-accepted-entries guard are enforced
        // by the context builder before any provider call
        self.context.transcribe_pending(visit_id).await?;
        let context = self.context.build(visit_id).await?;

        let composed = self.composer.compose(&context, options).await?;
        let content = composed.output.to_json()?;

        let report = self
            .store
            .upsert_report(Report::ai(
                visit_id,
                content,
                composed.model,
                composed.prompt_version,
            ))
            .await?;
        info!(report_id = %report.id, "AI report generated");
        Ok(report)
    }

    /// Latest report of the given kind for a visit.
    pub async fn latest(&self, visit_id: Uuid, kind: ReportKind) -> FieldResult<Report> {
        self.store.get_visit(visit_id).await?;
        self.store.get_report(visit_id, kind).await
    }

    /// Replace a report's content directly.
    ///
    /// AI content must still satisfy the output contract; hand edits do
    /// not get to relax the schema.
    #[instrument(skip(self, content), fields(visit_id = %visit_id, kind = %kind))]
    pub async fn edit_content(
        &self,
        visit_id: Uuid,
        kind: ReportKind,
        content: String,
    ) -> FieldResult<Report> {
        let mut report = self.store.get_report(visit_id, kind).await?;

        let content = match kind {
            ReportKind::Ai => AiReportOutput::from_json(&content)?.to_json()?,
            ReportKind::Deterministic => content,
        };

        report.content = content;
        self.store.upsert_report(report).await
    }
}
