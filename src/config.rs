//! Configuration for the reporting engine.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (FIELDSCRIBE_HOME, OPENAI_API_KEY, ...)
//! 2. Config file (.fieldscribe/config.yaml)
//! 3. Defaults (~/.fieldscribe, gpt-4o, gpt-4o-transcribe)
//!
//! Config file discovery searches the current directory and parents for
//! `.fieldscribe/config.yaml`; paths in the file are relative to the
//! config file's parent directory.
//!
//! Model names are checked against the allow-lists at load time: a
//! disallowed model is a fatal configuration error, not a per-request one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::domain::{FieldError, FieldResult};

/// Generation models the composer may be configured with.
pub const ALLOWED_REPORT_MODELS: &[&str] = &["gpt-4o", "gpt-4.1"];

/// Transcription models the gateway may be configured with.
pub const ALLOWED_TRANSCRIBE_MODELS: &[&str] =
    &["gpt-4o-transcribe", "gpt-4o-mini-transcribe", "whisper-1"];

/// Known-good fallback transcription models, tried after the primary.
pub const TRANSCRIBE_FALLBACK_MODELS: &[&str] = &["whisper-1", "gpt-4o-mini-transcribe"];

const DEFAULT_REPORT_MODEL: &str = "gpt-4o";
const DEFAULT_TRANSCRIBE_MODEL: &str = "gpt-4o-transcribe";
const DEFAULT_TRANSCRIBE_TIMEOUT_SECS: u64 = 60;
const MIN_TRANSCRIBE_TIMEOUT_SECS: u64 = 5;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub ai: Option<AiConfigFile>,
    #[serde(default)]
    pub storage: Option<StorageConfigFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to config file)
    pub home: Option<String>,
    /// Prompt templates directory (relative to config file)
    pub prompts: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiConfigFile {
    pub report_model: Option<String>,
    pub transcribe_model: Option<String>,
    pub transcribe_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfigFile {
    pub media_base_url: Option<String>,
}

/// Resolved configuration, constructed once at startup and passed by
/// reference into the gateway/composer constructors.
#[derive(Debug, Clone)]
pub struct Config {
    /// Engine state directory (document store, media)
    pub home: PathBuf,
    /// Prompt templates directory
    pub prompts_dir: PathBuf,
    /// Public base URL for stored media objects
    pub media_base_url: String,
    /// Provider credential (checked at client construction, not here)
    pub api_key: Option<String>,
    /// Generation model for AI reports
    pub report_model: String,
    /// Primary transcription model
    pub transcribe_model: String,
    /// Per-attempt transcription timeout
    pub transcribe_timeout: Duration,
}

impl Config {
    /// Load configuration from all sources and validate model allow-lists.
    pub fn load() -> FieldResult<Self> {
        let config_file = find_config_file();
        let file = match &config_file {
            Some(path) => {
                load_config_file(path).map_err(|e| FieldError::Config(e.to_string()))?
            }
            None => ConfigFile::default(),
        };

        let default_home = dirs::home_dir()
            .map(|h| h.join(".fieldscribe"))
            .unwrap_or_else(|| PathBuf::from(".fieldscribe"));

        let base_dir = config_file
            .as_deref()
            .and_then(Path::parent) // .fieldscribe/
            .and_then(Path::parent) // project root
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let home = if let Ok(env_home) = std::env::var("FIELDSCRIBE_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = file.paths.home {
            resolve_path(&base_dir, home_path)
        } else {
            default_home
        };

        let prompts_dir = if let Ok(env_prompts) = std::env::var("FIELDSCRIBE_PROMPTS_DIR") {
            PathBuf::from(env_prompts)
        } else if let Some(ref prompts_path) = file.paths.prompts {
            resolve_path(&base_dir, prompts_path)
        } else {
            PathBuf::from("prompts")
        };

        let ai = file.ai.unwrap_or_default();

        let report_model = std::env::var("FIELDSCRIBE_REPORT_MODEL")
            .ok()
            .or(ai.report_model)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_REPORT_MODEL.to_string());

        let transcribe_model = std::env::var("FIELDSCRIBE_TRANSCRIBE_MODEL")
            .ok()
            .or(ai.transcribe_model)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_TRANSCRIBE_MODEL.to_string());

        validate_model("report model", &report_model, ALLOWED_REPORT_MODELS)?;
        validate_model(
            "transcription model",
            &transcribe_model,
            ALLOWED_TRANSCRIBE_MODELS,
        )?;

        let timeout_secs = std::env::var("FIELDSCRIBE_TRANSCRIBE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .or(ai.transcribe_timeout_seconds)
            .unwrap_or(DEFAULT_TRANSCRIBE_TIMEOUT_SECS)
            .max(MIN_TRANSCRIBE_TIMEOUT_SECS);

        let media_base_url = std::env::var("FIELDSCRIBE_MEDIA_BASE_URL")
            .ok()
            .or(file.storage.and_then(|s| s.media_base_url))
            .unwrap_or_else(|| "http://localhost:9000/media".to_string());

        Ok(Self {
            home,
            prompts_dir,
            media_base_url,
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            report_model,
            transcribe_model,
            transcribe_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Directory holding the JSON document store.
    pub fn store_dir(&self) -> PathBuf {
        self.home.join("store")
    }

    /// Directory holding stored media objects.
    pub fn media_dir(&self) -> PathBuf {
        self.home.join("media")
    }

    /// Provider credential, required for any outbound AI call.
    pub fn require_api_key(&self) -> FieldResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| FieldError::Config("OPENAI_API_KEY is not configured".into()))
    }
}

fn validate_model(kind: &str, model: &str, allowed: &[&str]) -> FieldResult<()> {
    if !allowed.contains(&model) {
        return Err(FieldError::Config(format!(
            "unsupported {} '{}' (allowed: {})",
            kind,
            model,
            allowed.join(", ")
        )));
    }
    Ok(())
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".fieldscribe").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> anyhow::Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_model_allow_list() {
        assert!(validate_model("report model", "gpt-4o", ALLOWED_REPORT_MODELS).is_ok());
        assert!(validate_model("report model", "gpt-4.1", ALLOWED_REPORT_MODELS).is_ok());

        let err =
            validate_model("report model", "gpt-3.5-turbo", ALLOWED_REPORT_MODELS).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("gpt-3.5-turbo"));
        assert!(msg.contains("gpt-4o"));
    }

    #[test]
    fn test_transcribe_allow_list() {
        assert!(
            validate_model("transcription model", "whisper-1", ALLOWED_TRANSCRIBE_MODELS).is_ok()
        );
        assert!(validate_model(
            "transcription model",
            "whisper-large-v3",
            ALLOWED_TRANSCRIBE_MODELS
        )
        .is_err());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".fieldscribe");
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
paths:
  home: ./
  prompts: ../prompts
ai:
  report_model: gpt-4.1
  transcribe_timeout_seconds: 30
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.paths.home, Some("./".to_string()));
        assert_eq!(config.paths.prompts, Some("../prompts".to_string()));
        let ai = config.ai.unwrap();
        assert_eq!(ai.report_model, Some("gpt-4.1".to_string()));
        assert_eq!(ai.transcribe_timeout_seconds, Some(30));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        // non-existent relative paths fall back to plain join
        assert_eq!(
            resolve_path(&base, "./prompts"),
            PathBuf::from("/home/user/project/./prompts")
        );
    }
}
