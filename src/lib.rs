//! fieldscribe - Field-visit reporting engine
//!
//! Captures text, audio, and photo entries for site visits, runs them
//! through a review workflow, and turns the accepted material into
//! reports: a deterministic Markdown rendering and an AI-composed
//! structured report.
//!
//! # Architecture
//!
//! The system is built around an entry lifecycle:
//! - Entries are reviewed (accepted/rejected); acceptance of audio
//!   triggers transcription
//! - Transcription retries across model and MIME candidates, with one
//!   transcode-and-retry pass for stubborn containers
//! - Accepted entries are projected into an AI context, composed into a
//!   prompt, and the provider's structured output is strictly validated
//!
//! # Modules
//!
//! - `adapters`: External capabilities (speech, generation, storage, ffmpeg)
//! - `core`: Services (review, transcription, context, composer, reports)
//! - `domain`: Data structures (Visit, Entry, Report, AiContext)
//! - `store`: JSON document store
//! - `prompts`: Prompt template loading
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Create a visit and add a note
//! fieldscribe visit new "Plant check" --location Braga
//! fieldscribe entry add <visit-id> text --text "Crack in slab near bay 3"
//!
//! # Generate reports
//! fieldscribe report generate <visit-id>
//! fieldscribe report ai <visit-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod prompts;
pub mod store;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use core::{
    ComposeOptions, ContextBuilder, ReportComposer, ReportService, ReviewService,
    TranscriptionGateway,
};
pub use domain::{
    AiContext, AiReportOutput, Entry, EntryType, FieldError, FieldResult, Report, ReportKind,
    ReviewStatus, TranscriptionStatus, Visit,
};
pub use store::DocumentStore;
