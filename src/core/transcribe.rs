//! Transcription gateway: stored audio object in, verbatim text out.
//!
//! The external speech capability is picky about containers and codecs,
//! so a single attempt is not enough. The gateway drives an ordered
//! candidate matrix (model outer loop, MIME type inner loop), classifies
//! each failure as retryable or fatal, and falls back to one ffmpeg
//! resample pass when every candidate failed for format-looking reasons.
//!
//! The gateway never mutates entry state; callers in `core::review` apply
//! the returned transcript.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{ObjectStore, SpeechClient, SpeechError, SpeechRequest, Transcoder};
use crate::config::{Config, TRANSCRIBE_FALLBACK_MODELS};
use crate::domain::{FieldError, FieldResult, Language};

/// Hint passed to the speech provider with every attempt.
const PROMPT_HINT: &str = "Verbatim transcription of a field-visit voice note.";

/// Result of a successful transcription.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    /// Normalized language, `None` when the provider's tag was unrecognized
    pub language: Option<Language>,
    /// Model that actually produced the text
    pub model: String,
    pub completed_at: DateTime<Utc>,
}

/// Lenient view of the provider's JSON response.
#[derive(Debug, Deserialize)]
struct ProviderPayload {
    text: Option<String>,
    language: Option<String>,
    model: Option<String>,
}

/// Outcome of one pass over the candidate matrix.
enum MatrixOutcome {
    Success(Transcript),
    /// Every candidate failed retryably; holds the last such error
    Exhausted(FieldError),
    /// A candidate failed fatally; stop immediately
    Fatal(FieldError),
}

pub struct TranscriptionGateway {
    speech: Arc<dyn SpeechClient>,
    storage: Arc<dyn ObjectStore>,
    transcoder: Arc<dyn Transcoder>,
    primary_model: String,
    attempt_timeout: Duration,
}

impl TranscriptionGateway {
    pub fn new(
        config: &Config,
        speech: Arc<dyn SpeechClient>,
        storage: Arc<dyn ObjectStore>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            speech,
            storage,
            transcoder,
            primary_model: config.transcribe_model.clone(),
            attempt_timeout: config.transcribe_timeout,
        }
    }

    /// Transcribe the audio object behind `file_url`.
    #[instrument(skip(self), fields(url = %file_url))]
    pub async fn transcribe_object(&self, file_url: &str) -> FieldResult<Transcript> {
        let stat = self.storage.stat(file_url).await?;
        let audio = self.storage.get(file_url).await?;

        let filename = derive_filename(file_url, stat.content_type.as_deref());
        let mimes = mime_candidates(stat.content_type.as_deref(), &filename);
        let models = self.model_candidates();

        debug!(?models, ?mimes, "transcription candidate matrix");

        let last_error = match self.run_matrix(&models, &mimes, &audio, &filename).await {
            MatrixOutcome::Success(transcript) => return Ok(transcript),
            MatrixOutcome::Fatal(e) => return Err(e),
            MatrixOutcome::Exhausted(last) => last,
        };

        // All candidates looked like format problems: resample once and
        // run the whole matrix again against the transcoded buffer.
        info!("all transcription candidates failed retryably, attempting transcode");
        let wav = match self.transcoder.resample_to_wav(&audio).await {
            Ok(wav) => wav,
            Err(e) => {
                warn!(error = %e, "audio transcode failed");
                return Err(last_error);
            }
        };

        let wav_name = wav_filename(&filename);
        let wav_mimes = mime_candidates(Some("audio/wav"), &wav_name);
        match self.run_matrix(&models, &wav_mimes, &wav, &wav_name).await {
            MatrixOutcome::Success(transcript) => Ok(transcript),
            MatrixOutcome::Fatal(e) => Err(e),
            MatrixOutcome::Exhausted(last) => Err(last),
        }
    }

    /// Ordered transcription models: configured primary first, then the
    /// known-good fallbacks, de-duplicated.
    fn model_candidates(&self) -> Vec<String> {
        let mut models = vec![self.primary_model.clone()];
        for fallback in TRANSCRIBE_FALLBACK_MODELS {
            if !models.iter().any(|m| m == fallback) {
                models.push((*fallback).to_string());
            }
        }
        models
    }

    async fn run_matrix(
        &self,
        models: &[String],
        mimes: &[String],
        audio: &[u8],
        filename: &str,
    ) -> MatrixOutcome {
        let mut last_error: Option<FieldError> = None;

        for model in models {
            for mime in mimes {
                let request = SpeechRequest {
                    model: model.clone(),
                    audio: audio.to_vec(),
                    mime_type: mime.clone(),
                    filename: filename.to_string(),
                    prompt_hint: Some(PROMPT_HINT.to_string()),
                };

                match self.speech.transcribe(request, self.attempt_timeout).await {
                    Ok(body) => match parse_response(&body, model) {
                        Ok(transcript) => {
                            info!(model = %model, mime = %mime, "transcription succeeded");
                            return MatrixOutcome::Success(transcript);
                        }
                        // empty transcription is a hard failure
                        Err(e) => return MatrixOutcome::Fatal(e),
                    },
                    Err(e) if is_retryable(&e) => {
                        warn!(model = %model, mime = %mime, error = %e, "retryable transcription failure");
                        last_error = Some(to_field_error(e));
                    }
                    Err(e) => {
                        return MatrixOutcome::Fatal(to_field_error(e));
                    }
                }
            }
        }

        MatrixOutcome::Exhausted(last_error.unwrap_or_else(|| {
            FieldError::provider("transcription failed: no candidates attempted")
        }))
    }
}

/// Classify a failed attempt: retryable failures move on to the next
/// candidate, everything else aborts the operation.
fn is_retryable(error: &SpeechError) -> bool {
    match error {
        SpeechError::Timeout(_) => true,
        SpeechError::Status { status, body } => {
            let body_lc = body.to_lowercase();
            let cites_file_param = (400..500).contains(&i32::from(*status))
                && (body_lc.contains(r#""param": "file""#)
                    || body_lc.contains(r#""param":"file""#));
            let format_complaint = body_lc.contains("file might be corrupted or unsupported")
                || body_lc.contains("invalid file format");
            cites_file_param || format_complaint
        }
        SpeechError::Transport(_) => false,
    }
}

fn to_field_error(error: SpeechError) -> FieldError {
    match error {
        SpeechError::Status { status, body } => FieldError::provider_status(
            status,
            format!("speech provider returned {}: {}", status, body),
        ),
        other => FieldError::provider(other.to_string()),
    }
}

/// Parse a provider response body, falling back to the raw body as the
/// transcript when it is not JSON.
fn parse_response(body: &str, requested_model: &str) -> FieldResult<Transcript> {
    let (text, language, model) = match serde_json::from_str::<ProviderPayload>(body) {
        Ok(payload) => (
            payload.text.unwrap_or_default(),
            payload.language,
            payload.model,
        ),
        Err(_) => (body.to_string(), None, None),
    };

    if text.trim().is_empty() {
        return Err(FieldError::provider("empty transcription"));
    }

    Ok(Transcript {
        text: text.trim().to_string(),
        language: language.as_deref().and_then(normalize_language),
        model: model.unwrap_or_else(|| requested_model.to_string()),
        completed_at: Utc::now(),
    })
}

/// Best-effort normalization of the provider's free-form language tag to
/// one of the supported report languages. Unrecognized tags are treated
/// as unspecified, not as errors.
pub fn normalize_language(tag: &str) -> Option<Language> {
    let tag = tag.trim().to_lowercase();
    if tag.is_empty() {
        return None;
    }
    if tag.starts_with("en") || tag.contains("english") {
        Some(Language::En)
    } else if tag.starts_with("es")
        || tag.contains("spanish")
        || tag.contains("español")
        || tag.contains("espanol")
    {
        Some(Language::Es)
    } else if tag.starts_with("pt")
        || tag.contains("portuguese")
        || tag.contains("português")
        || tag.contains("portugues")
    {
        Some(Language::Pt)
    } else {
        None
    }
}

/// Filename the provider sees: the object name, given an extension from
/// the stored content type when it has none.
fn derive_filename(file_url: &str, content_type: Option<&str>) -> String {
    let name = file_url
        .split('?')
        .next()
        .unwrap_or(file_url)
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or("audio")
        .to_string();

    if Path::new(&name).extension().is_some() {
        return name;
    }
    match content_type.and_then(ext_for_mime) {
        Some(ext) => format!("{}.{}", name, ext),
        None => name,
    }
}

fn wav_filename(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) => format!("{}.wav", stem),
        None => format!("{}.wav", filename),
    }
}

fn mime_for_ext(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "mp3" | "mpga" => Some("audio/mpeg"),
        "wav" => Some("audio/wav"),
        "webm" => Some("audio/webm"),
        "m4a" | "mp4" => Some("audio/mp4"),
        "ogg" | "oga" => Some("audio/ogg"),
        "flac" => Some("audio/flac"),
        _ => None,
    }
}

fn ext_for_mime(mime: &str) -> Option<&'static str> {
    match mime.split(';').next().unwrap_or(mime).trim() {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/webm" => Some("webm"),
        "audio/mp4" | "audio/m4a" => Some("m4a"),
        "audio/ogg" => Some("ogg"),
        "audio/flac" => Some("flac"),
        _ => None,
    }
}

/// Ordered MIME candidates for one attempt series.
///
/// Extension guesses lead when the stored content type is missing or
/// `application/octet-stream`; the generic octet-stream fallback is
/// always appended last.
fn mime_candidates(content_type: Option<&str>, filename: &str) -> Vec<String> {
    const OCTET_STREAM: &str = "application/octet-stream";

    let stored = content_type
        .map(|c| c.split(';').next().unwrap_or(c).trim().to_string())
        .filter(|c| !c.is_empty());
    let ambiguous = stored
        .as_deref()
        .map_or(true, |c| c.eq_ignore_ascii_case(OCTET_STREAM));

    let ext_guess = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(mime_for_ext)
        .map(str::to_string);

    let mut candidates = Vec::new();
    let mut push = |mime: Option<String>| {
        if let Some(mime) = mime {
            if !candidates.iter().any(|c: &String| c.eq_ignore_ascii_case(&mime)) {
                candidates.push(mime);
            }
        }
    };

    if ambiguous {
        push(ext_guess);
        push(stored);
    } else {
        push(stored);
        push(ext_guess);
    }
    push(Some(OCTET_STREAM.to_string()));

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_normalization() {
        assert_eq!(normalize_language("en"), Some(Language::En));
        assert_eq!(normalize_language("en-US"), Some(Language::En));
        assert_eq!(normalize_language("English"), Some(Language::En));
        assert_eq!(normalize_language("es-419"), Some(Language::Es));
        assert_eq!(normalize_language("Español"), Some(Language::Es));
        assert_eq!(normalize_language("pt-BR"), Some(Language::Pt));
        assert_eq!(normalize_language("Português"), Some(Language::Pt));
        assert_eq!(normalize_language("fr"), None);
        assert_eq!(normalize_language(""), None);
        assert_eq!(normalize_language("zh-Hans"), None);
    }

    #[test]
    fn test_mime_candidates_trusts_specific_content_type() {
        let candidates = mime_candidates(Some("audio/webm"), "memo.mp3");
        assert_eq!(candidates, vec!["audio/webm", "audio/mpeg", "application/octet-stream"]);
    }

    #[test]
    fn test_mime_candidates_extension_leads_for_octet_stream() {
        let candidates = mime_candidates(Some("application/octet-stream"), "memo.mp3");
        assert_eq!(candidates, vec!["audio/mpeg", "application/octet-stream"]);

        let candidates = mime_candidates(None, "memo.wav");
        assert_eq!(candidates, vec!["audio/wav", "application/octet-stream"]);
    }

    #[test]
    fn test_mime_candidates_fallback_only() {
        let candidates = mime_candidates(None, "memo");
        assert_eq!(candidates, vec!["application/octet-stream"]);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable(&SpeechError::Timeout(Duration::from_secs(5))));
        assert!(is_retryable(&SpeechError::Status {
            status: 400,
            body: r#"{"error": {"message": "Invalid value", "param": "file"}}"#.into(),
        }));
        assert!(is_retryable(&SpeechError::Status {
            status: 400,
            body: "The file might be corrupted or unsupported".into(),
        }));
        assert!(is_retryable(&SpeechError::Status {
            status: 422,
            body: "Invalid file format.".into(),
        }));

        // server errors and unrelated client errors are fatal
        assert!(!is_retryable(&SpeechError::Status {
            status: 500,
            body: "internal error".into(),
        }));
        assert!(!is_retryable(&SpeechError::Status {
            status: 401,
            body: "invalid api key".into(),
        }));
        assert!(!is_retryable(&SpeechError::Transport("dns failure".into())));
    }

    #[test]
    fn test_parse_response_json_and_raw() {
        let t = parse_response(
            r#"{"text": "Crew present on site", "language": "english"}"#,
            "whisper-1",
        )
        .unwrap();
        assert_eq!(t.text, "Crew present on site");
        assert_eq!(t.language, Some(Language::En));
        assert_eq!(t.model, "whisper-1");

        // non-JSON body becomes the transcript itself
        let t = parse_response("plain text transcript", "whisper-1").unwrap();
        assert_eq!(t.text, "plain text transcript");
        assert_eq!(t.language, None);
    }

    #[test]
    fn test_parse_response_empty_is_hard_failure() {
        assert!(parse_response("", "whisper-1").is_err());
        assert!(parse_response(r#"{"text": "   "}"#, "whisper-1").is_err());
    }

    #[test]
    fn test_derive_filename() {
        assert_eq!(
            derive_filename("http://host/media/1700-abc.mp3?expires=1", None),
            "1700-abc.mp3"
        );
        assert_eq!(
            derive_filename("http://host/media/1700-abc", Some("audio/webm")),
            "1700-abc.webm"
        );
        assert_eq!(derive_filename("http://host/media/1700-abc", None), "1700-abc");
    }

    #[test]
    fn test_wav_filename() {
        assert_eq!(wav_filename("memo.mp3"), "memo.wav");
        assert_eq!(wav_filename("memo"), "memo.wav");
    }
}
