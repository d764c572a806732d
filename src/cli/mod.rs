//! Command-line interface for fieldscribe.
//!
//! Provides commands for managing visits and entries, driving the review
//! workflow, triggering transcription, and generating reports.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::adapters::{
    FfmpegTranscoder, FsObjectStore, ObjectStore, OpenAiGenerationClient, OpenAiSpeechClient,
};
use crate::config::Config;
use crate::core::{
    ComposeOptions, ContextBuilder, NewEntry, ReportComposer, ReportService, ReviewService,
    TranscriptionGateway, UploadFile,
};
use crate::domain::{EntryType, EntryUpdate, ReportKind, ReviewStatus, TranscriptionStatus};
use crate::prompts::PromptStore;
use crate::store::DocumentStore;

/// fieldscribe - Field-visit reporting engine
#[derive(Parser, Debug)]
#[command(name = "fieldscribe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage visits
    Visit {
        #[command(subcommand)]
        command: VisitCommands,
    },

    /// Manage entries and the review workflow
    Entry {
        #[command(subcommand)]
        command: EntryCommands,
    },

    /// Generate and inspect reports
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum VisitCommands {
    /// Create a new visit
    New {
        /// Project name
        project_name: String,

        /// Site location
        location: String,

        /// Industry tag (selects the AI prompt template)
        #[arg(long)]
        industry: Option<String>,

        /// Report language (en, es, pt)
        #[arg(long)]
        language: Option<String>,

        /// Country
        #[arg(long)]
        country: Option<String>,
    },

    /// List visits
    List,

    /// Show a visit and its entries
    Show {
        /// Visit ID (UUID)
        visit_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum EntryCommands {
    /// Add an entry to a visit
    Add {
        /// Visit ID (UUID)
        visit_id: String,

        /// Entry type: text, audio, or photo
        entry_type: String,

        /// Text content (text entries) or caption (photo entries)
        #[arg(short, long)]
        text: Option<String>,

        /// File to upload (audio/photo entries)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// MIME type of the file (guessed from extension if omitted)
        #[arg(long)]
        mime: Option<String>,

        /// Flag the entry as a finding
        #[arg(long)]
        finding: bool,
    },

    /// List a visit's entries
    List {
        /// Visit ID (UUID)
        visit_id: String,
    },

    /// Update an entry's fields
    Update {
        /// Entry ID (UUID)
        entry_id: String,

        /// New review status (pending, accepted, rejected)
        #[arg(long)]
        status: Option<String>,

        /// Replace the text content
        #[arg(long)]
        text: Option<String>,

        /// Replace the transcription
        #[arg(long)]
        transcription: Option<String>,

        /// Set or clear the finding flag
        #[arg(long)]
        finding: Option<bool>,

        /// Mark the entry as hand-edited
        #[arg(long)]
        edited: Option<bool>,

        /// Soft-delete (or restore) the entry
        #[arg(long)]
        deleted: Option<bool>,
    },

    /// Change an entry's review status
    Status {
        /// Entry ID (UUID)
        entry_id: String,

        /// Target status (pending, accepted, rejected)
        status: String,
    },

    /// Transcribe an audio entry now (inline, failures reported)
    Transcribe {
        /// Entry ID (UUID)
        entry_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    /// Generate the deterministic Markdown report
    Generate {
        /// Visit ID (UUID)
        visit_id: String,
    },

    /// Generate the AI report
    Ai {
        /// Visit ID (UUID)
        visit_id: String,

        /// Override the industry prompt selection
        #[arg(long)]
        industry: Option<String>,

        /// Override the prompt version
        #[arg(long)]
        prompt_version: Option<String>,

        /// Override the sampling temperature
        #[arg(long)]
        temperature: Option<f32>,
    },

    /// Show the latest report of a kind
    Show {
        /// Visit ID (UUID)
        visit_id: String,

        /// Report kind: deterministic or ai
        #[arg(long, default_value = "deterministic")]
        kind: String,
    },

    /// Replace a report's content (from --file or stdin)
    Edit {
        /// Visit ID (UUID)
        visit_id: String,

        /// Report kind: deterministic or ai
        #[arg(long, default_value = "deterministic")]
        kind: String,

        /// File with the new content (reads stdin if omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = Config::load()?;

        match self.command {
            Commands::Visit { command } => execute_visit(&config, command).await,
            Commands::Entry { command } => execute_entry(&config, command).await,
            Commands::Report { command } => execute_report(&config, command).await,
            Commands::Config => show_config(&config),
        }
    }
}

/// Everything the entry and report commands need, wired together.
///
/// Constructing this requires an API key: the review workflow can reach
/// the transcription provider as a side effect of acceptance, so the
/// credential is checked up front rather than mid-command.
struct Services {
    review: ReviewService,
    reports: ReportService,
}

impl Services {
    async fn build(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();

        let store = Arc::new(DocumentStore::open(config.store_dir()).await?);
        let storage: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(
            config.media_dir(),
            config.media_base_url.clone(),
        ));

        let gateway = Arc::new(TranscriptionGateway::new(
            config,
            Arc::new(OpenAiSpeechClient::new(api_key.clone())),
            storage.clone(),
            Arc::new(FfmpegTranscoder),
        ));

        let review = ReviewService::new(store.clone(), storage.clone(), gateway.clone());

        let composer = ReportComposer::new(
            config,
            Arc::new(OpenAiGenerationClient::new(api_key)),
            PromptStore::new(config.prompts_dir.clone()),
        );
        let context = ContextBuilder::new(store.clone(), storage, gateway);
        let reports = ReportService::new(store, context, composer);

        Ok(Self { review, reports })
    }
}

async fn execute_visit(config: &Config, command: VisitCommands) -> Result<()> {
    let store = DocumentStore::open(config.store_dir()).await?;

    match command {
        VisitCommands::New {
            project_name,
            location,
            industry,
            language,
            country,
        } => {
            let mut visit = crate::domain::Visit::new(project_name, location);
            visit.industry = industry;
            visit.language = language.as_deref().map(str::parse).transpose()?;
            visit.country = country;

            let visit = store.insert_visit(visit).await?;
            println!("{}", visit.id);
            eprintln!("Created visit '{}' at {}", visit.project_name, visit.location);
            Ok(())
        }
        VisitCommands::List => {
            let visits = store.list_visits().await;
            if visits.is_empty() {
                println!("No visits found");
                return Ok(());
            }

            println!("{:<38} {:<8} {:<25} {:<20}", "VISIT ID", "STATUS", "PROJECT", "LOCATION");
            println!("{}", "-".repeat(93));
            for visit in visits {
                println!(
                    "{:<38} {:<8} {:<25} {:<20}",
                    visit.id, visit.status, visit.project_name, visit.location
                );
            }
            Ok(())
        }
        VisitCommands::Show { visit_id } => {
            let visit_id = parse_id(&visit_id, "visit")?;
            let visit = store.get_visit(visit_id).await?;

            println!("Visit ID: {}", visit.id);
            println!("Project: {}", visit.project_name);
            println!("Location: {}", visit.location);
            println!("Status: {}", visit.status);
            if let Some(industry) = &visit.industry {
                println!("Industry: {}", industry);
            }
            if let Some(language) = visit.language {
                println!("Language: {}", language.code());
            }
            if let Some(country) = &visit.country {
                println!("Country: {}", country);
            }
            println!("Created: {}", visit.created_at);

            let entries = store.list_entries(visit_id).await;
            println!("\nEntries: {}", entries.len());
            for entry in entries {
                println!(
                    "  {} {:<6} {:<9} {}",
                    entry.id,
                    entry.entry_type,
                    entry.status,
                    entry.content_text().unwrap_or("-")
                );
            }
            Ok(())
        }
    }
}

async fn execute_entry(config: &Config, command: EntryCommands) -> Result<()> {
    let services = Services::build(config).await?;

    match command {
        EntryCommands::Add {
            visit_id,
            entry_type,
            text,
            file,
            mime,
            finding,
        } => {
            let visit_id = parse_id(&visit_id, "visit")?;
            let entry_type: EntryType = entry_type.parse()?;

            let upload = match file {
                Some(path) => Some(read_upload(&path, mime)?),
                None => None,
            };

            let entry = services
                .review
                .create_entry(NewEntry {
                    visit_id,
                    entry_type,
                    text,
                    is_finding: finding,
                    file: upload,
                })
                .await?;

            println!("{}", entry.id);
            eprintln!("Created {} entry (status: {})", entry.entry_type, entry.status);
            Ok(())
        }
        EntryCommands::List { visit_id } => {
            let visit_id = parse_id(&visit_id, "visit")?;
            let entries = services.review.list_entries(visit_id).await?;

            if entries.is_empty() {
                println!("No entries found");
                return Ok(());
            }

            println!(
                "{:<38} {:<6} {:<9} {:<11} {}",
                "ENTRY ID", "TYPE", "STATUS", "TRANSCRIPT", "CONTENT"
            );
            println!("{}", "-".repeat(90));
            for entry in entries {
                let truncated = truncate_cell(entry.content_text().unwrap_or("-"), 40);
                println!(
                    "{:<38} {:<6} {:<9} {:<11} {}",
                    entry.id,
                    entry.entry_type,
                    entry.status,
                    transcription_label(entry.transcription_status),
                    truncated
                );
            }
            Ok(())
        }
        EntryCommands::Update {
            entry_id,
            status,
            text,
            transcription,
            finding,
            edited,
            deleted,
        } => {
            let entry_id = parse_id(&entry_id, "entry")?;
            let update = EntryUpdate {
                status: status.as_deref().map(str::parse).transpose()?,
                text,
                transcription,
                is_finding: finding,
                edited,
                deleted,
            };
            if update.is_empty() {
                anyhow::bail!("No fields to update. Pass at least one --flag");
            }

            let entry = services.review.update_entry(entry_id, update).await?;
            eprintln!("Entry {} updated (status: {})", entry.id, entry.status);
            Ok(())
        }
        EntryCommands::Status { entry_id, status } => {
            let entry_id = parse_id(&entry_id, "entry")?;
            let status: ReviewStatus = status.parse()?;

            let entry = services.review.set_status(entry_id, status).await?;
            eprintln!("Entry {} is now {}", entry.id, entry.status);
            if entry.transcription_status == TranscriptionStatus::Processing {
                eprintln!("Transcription started in the background");
            }
            Ok(())
        }
        EntryCommands::Transcribe { entry_id } => {
            let entry_id = parse_id(&entry_id, "entry")?;
            let entry = services.review.transcribe_entry(entry_id).await?;

            if let Some(transcription) = &entry.transcription {
                println!("{}", transcription);
            }
            if let Some(language) = entry.transcription_language {
                eprintln!("[language: {}]", language.code());
            }
            Ok(())
        }
    }
}

async fn execute_report(config: &Config, command: ReportCommands) -> Result<()> {
    let services = Services::build(config).await?;

    match command {
        ReportCommands::Generate { visit_id } => {
            let visit_id = parse_id(&visit_id, "visit")?;
            let report = services.reports.generate_deterministic(visit_id).await?;
            println!("{}", report.content);
            Ok(())
        }
        ReportCommands::Ai {
            visit_id,
            industry,
            prompt_version,
            temperature,
        } => {
            let visit_id = parse_id(&visit_id, "visit")?;
            let report = services
                .reports
                .generate_ai(
                    visit_id,
                    &ComposeOptions {
                        industry,
                        prompt_version,
                        temperature,
                    },
                )
                .await?;

            println!("{}", report.content);
            if let Some(model) = &report.model {
                eprintln!("\n[model: {}, prompt: {}]", model, report.prompt_version.as_deref().unwrap_or("-"));
            }
            Ok(())
        }
        ReportCommands::Show { visit_id, kind } => {
            let visit_id = parse_id(&visit_id, "visit")?;
            let kind: ReportKind = kind.parse()?;

            let report = services.reports.latest(visit_id, kind).await?;
            println!("{}", report.content);
            eprintln!("\n[generated: {}]", report.generated_at);
            Ok(())
        }
        ReportCommands::Edit { visit_id, kind, file } => {
            let visit_id = parse_id(&visit_id, "visit")?;
            let kind: ReportKind = kind.parse()?;

            let content = if let Some(path) = file {
                std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read content file: {}", path.display()))?
            } else {
                let mut buffer = String::new();
                io::stdin()
                    .read_to_string(&mut buffer)
                    .context("Failed to read from stdin")?;
                buffer
            };
            if content.trim().is_empty() {
                anyhow::bail!("No content provided. Use --file <path> or pipe to stdin");
            }

            let report = services.reports.edit_content(visit_id, kind, content).await?;
            eprintln!("Report {} updated", report.id);
            Ok(())
        }
    }
}

/// Show the resolved configuration (for debugging)
fn show_config(config: &Config) -> Result<()> {
    println!("fieldscribe configuration");
    println!();
    println!("Paths:");
    println!("  Home (engine state): {}", config.home.display());
    println!("  Document store:      {}", config.store_dir().display());
    println!("  Media:               {}", config.media_dir().display());
    println!("  Prompts:             {}", config.prompts_dir.display());
    println!();
    println!("AI:");
    println!("  Report model:        {}", config.report_model);
    println!("  Transcribe model:    {}", config.transcribe_model);
    println!("  Transcribe timeout:  {}s", config.transcribe_timeout.as_secs());
    println!(
        "  API key:             {}",
        if config.api_key.is_some() { "configured" } else { "(not set)" }
    );
    println!();
    println!("Storage:");
    println!("  Media base URL:      {}", config.media_base_url);

    Ok(())
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Invalid {} ID: {}", what, raw))
}

fn transcription_label(status: TranscriptionStatus) -> &'static str {
    match status {
        TranscriptionStatus::Idle => "idle",
        TranscriptionStatus::Processing => "processing",
        TranscriptionStatus::Done => "done",
        TranscriptionStatus::Error => "error",
    }
}

fn read_upload(path: &Path, mime: Option<String>) -> Result<UploadFile> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload.bin".to_string());
    let mime_type = mime.unwrap_or_else(|| guess_mime(&filename));

    Ok(UploadFile {
        bytes,
        filename,
        mime_type,
    })
}

/// Shorten table-cell content to at most `max_chars` characters, cutting
/// on a char boundary so accented content cannot split mid-character.
fn truncate_cell(content: &str, max_chars: usize) -> String {
    if content.chars().count() > max_chars {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        content.to_string()
    }
}

/// Guess a MIME type from the filename extension; upload validation
/// rejects anything outside the allow-lists anyway.
fn guess_mime(filename: &str) -> String {
    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
    .to_string()
}
