//! Prompt template store.
//!
//! Templates are Markdown files named `{industry}.{version}.md` inside
//! the configured prompts directory. A missing template is a hard
//! failure; the composer never substitutes a different key silently.

use std::path::PathBuf;

use tokio::fs;

use crate::domain::{FieldError, FieldResult};

/// Placeholder in templates replaced with the serialized AI context.
pub const CONTEXT_PLACEHOLDER: &str = "{{AI_CONTEXT_JSON}}";

/// A loaded template plus its resolved version key.
#[derive(Debug, Clone)]
pub struct LoadedPrompt {
    pub content: String,
    /// Resolved key, e.g. "construction.v1"
    pub prompt_version: String,
}

pub struct PromptStore {
    dir: PathBuf,
}

impl PromptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load the template for `(industry, version)`.
    pub async fn load(&self, industry: &str, version: &str) -> FieldResult<LoadedPrompt> {
        let safe_industry = industry.trim().to_lowercase();
        let safe_version = version.trim().to_lowercase();
        let key = format!("{}.{}", safe_industry, safe_version);
        let path = self.dir.join(format!("{}.md", key));

        let content = fs::read_to_string(&path).await.map_err(|_| {
            FieldError::not_found(format!(
                "prompt template '{}' not found at {}",
                key,
                path.display()
            ))
        })?;

        Ok(LoadedPrompt {
            content,
            prompt_version: key,
        })
    }
}
