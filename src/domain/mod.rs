//! Domain types for the field-visit reporting engine.
//!
//! This module contains the core data structures:
//! - Entry: one unit of field evidence and its review/transcription state
//! - Visit: a site-visit record grouping entries
//! - Report: generated artifacts, including the strict AI output contract
//! - AiContext: the ephemeral value object fed to the AI composer

pub mod context;
pub mod entry;
pub mod error;
pub mod report;
pub mod visit;

// Re-export commonly used types
pub use context::{AiContext, ContextEntries, ContextMetadata, TRANSCRIPTION_UNAVAILABLE};
pub use entry::{Entry, EntryType, EntryUpdate, Language, ReviewStatus, TranscriptionStatus};
pub use error::{FieldError, FieldResult};
pub use report::{AiReportOutput, Finding, Report, ReportKind, Severity};
pub use visit::{Visit, VisitStatus};
