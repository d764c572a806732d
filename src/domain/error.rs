//! Error taxonomy shared across the core services.
//!
//! Every failure a caller can see maps onto one of these variants so the
//! CLI (or any other surface) can translate them uniformly: usage errors
//! and not-found errors are the caller's fault, provider errors came from
//! an upstream capability, contract errors mean the AI output violated its
//! schema, config errors are fatal operator mistakes.

use thiserror::Error;

/// Core error type for entry review, transcription and report generation.
#[derive(Debug, Error)]
pub enum FieldError {
    /// The request is structurally or semantically invalid.
    #[error("{0}")]
    Usage(String),

    /// A referenced visit, entry, report or template does not exist.
    #[error("{0}")]
    NotFound(String),

    /// An upstream provider (speech-to-text or generation) failed.
    #[error("{message}")]
    Provider {
        /// HTTP status, when the provider responded at all
        status: Option<u16>,
        message: String,
    },

    /// Generated output violated the report schema.
    #[error("{0}")]
    Contract(String),

    /// Invalid or missing configuration.
    #[error("{0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FieldError {
    /// Shorthand for a usage error with a formatted message.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Shorthand for a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Provider failure without an HTTP status (timeouts, transport).
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            status: None,
            message: message.into(),
        }
    }

    /// Provider failure carrying the HTTP status it responded with.
    pub fn provider_status(status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            status: Some(status),
            message: message.into(),
        }
    }
}

pub type FieldResult<T> = Result<T, FieldError>;
