//! Core services.
//!
//! This module contains:
//! - Review: entry creation and the review state machine
//! - Transcribe: the candidate-matrix transcription gateway
//! - Context: projection of accepted entries into the AI context
//! - Composer: prompt assembly, generation, strict output validation
//! - Markdown: the deterministic report renderer
//! - Reports: report generation, retrieval, and editing

pub mod composer;
pub mod context;
pub mod markdown;
pub mod reports;
pub mod review;
pub mod transcribe;

// Re-export commonly used types
pub use composer::{is_public_url, ComposeOptions, ComposedReport, ReportComposer};
pub use context::ContextBuilder;
pub use reports::ReportService;
pub use review::{NewEntry, ReviewService, UploadFile};
pub use transcribe::{Transcript, TranscriptionGateway};
