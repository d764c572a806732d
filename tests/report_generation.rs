//! Report Generation Integration Tests
//!
//! Exercises both report paths end to end: the deterministic Markdown
//! renderer and the AI pipeline (pre-transcription, context assembly,
//! prompt composition, strict output validation, persistence).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use uuid::Uuid;

use fieldscribe::adapters::{
    FsObjectStore, GenerationClient, GenerationRequest, MessageContent, ObjectStore, SpeechClient,
    SpeechError, SpeechRequest, Transcoder,
};
use fieldscribe::config::Config;
use fieldscribe::core::{
    ComposeOptions, ContextBuilder, NewEntry, ReportComposer, ReportService, ReviewService,
    TranscriptionGateway, UploadFile,
};
use fieldscribe::domain::{
    AiReportOutput, EntryType, FieldError, Language, ReportKind, ReviewStatus, Visit,
    TRANSCRIPTION_UNAVAILABLE,
};
use fieldscribe::prompts::PromptStore;
use fieldscribe::store::DocumentStore;

const PROMPT_TEMPLATE: &str = "Site visit material:\n\n{{AI_CONTEXT_JSON}}\n\nWrite the report.";

/// Generation client that replays scripted completions and records the
/// requests it saw.
struct ScriptedGeneration {
    script: Mutex<Vec<Result<String, ()>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGeneration {
    fn new(script: Vec<Result<String, ()>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn last_request(&self) -> GenerationRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }

    fn system_prompt(&self) -> String {
        match &self.last_request().messages[0].content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(_) => panic!("system message should be plain text"),
        }
    }
}

#[async_trait]
impl GenerationClient for ScriptedGeneration {
    async fn generate(&self, request: GenerationRequest) -> Result<String, FieldError> {
        self.requests.lock().unwrap().push(request);
        let mut script = self.script.lock().unwrap();
        assert!(!script.is_empty(), "unexpected extra generation call");
        script
            .remove(0)
            .map_err(|_| FieldError::provider_status(503, "generation backend unavailable"))
    }
}

/// Speech client with a single fixed behavior for pre-transcription.
struct FixedSpeech {
    response: Option<String>,
}

#[async_trait]
impl SpeechClient for FixedSpeech {
    async fn transcribe(
        &self,
        _request: SpeechRequest,
        _timeout: Duration,
    ) -> Result<String, SpeechError> {
        match &self.response {
            Some(body) => Ok(body.clone()),
            None => Err(SpeechError::Status {
                status: 401,
                body: "invalid api key".to_string(),
            }),
        }
    }
}

struct NoTranscode;

#[async_trait]
impl Transcoder for NoTranscode {
    async fn resample_to_wav(&self, _audio: &[u8]) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("transcoder not available in this test")
    }
}

struct Harness {
    _temp: TempDir,
    store: Arc<DocumentStore>,
    review: ReviewService,
    reports: ReportService,
}

async fn harness(
    generation: Arc<ScriptedGeneration>,
    speech_response: Option<&str>,
    media_base_url: &str,
) -> Harness {
    let temp = TempDir::new().unwrap();
    let config = Config {
        home: temp.path().to_path_buf(),
        prompts_dir: temp.path().join("prompts"),
        media_base_url: media_base_url.to_string(),
        api_key: Some("test-key".to_string()),
        report_model: "gpt-4o".to_string(),
        transcribe_model: "gpt-4o-transcribe".to_string(),
        transcribe_timeout: Duration::from_secs(5),
    };

    std::fs::create_dir_all(&config.prompts_dir).unwrap();
    std::fs::write(config.prompts_dir.join("construction.v1.md"), PROMPT_TEMPLATE).unwrap();

    let store = Arc::new(DocumentStore::open(config.store_dir()).await.unwrap());
    let storage: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(
        config.media_dir(),
        config.media_base_url.clone(),
    ));
    let speech = Arc::new(FixedSpeech {
        response: speech_response.map(str::to_string),
    });
    let gateway = Arc::new(TranscriptionGateway::new(
        &config,
        speech,
        storage.clone(),
        Arc::new(NoTranscode),
    ));

    let review = ReviewService::new(store.clone(), storage.clone(), gateway.clone());
    let composer = ReportComposer::new(
        &config,
        generation,
        PromptStore::new(config.prompts_dir.clone()),
    );
    let context = ContextBuilder::new(store.clone(), storage, gateway);
    let reports = ReportService::new(store.clone(), context, composer);

    Harness {
        _temp: temp,
        store,
        review,
        reports,
    }
}

async fn new_visit(store: &DocumentStore) -> Visit {
    let mut visit = Visit::new("Warehouse extension", "Braga");
    visit.language = Some(Language::Es);
    store.insert_visit(visit).await.unwrap()
}

async fn add_text(h: &Harness, visit_id: Uuid, text: &str, finding: bool) {
    h.review
        .create_entry(NewEntry {
            visit_id,
            entry_type: EntryType::Text,
            text: Some(text.to_string()),
            is_finding: finding,
            file: None,
        })
        .await
        .unwrap();
}

fn valid_output() -> String {
    serde_json::json!({
        "executiveSummary": "Works progressing with one safety issue.",
        "observations": ["Concrete pour completed at bay 4."],
        "findings": [{
            "title": "Unprotected edge",
            "severity": "high",
            "evidence": "Open edge on level 2 without guardrail.",
            "recommendation": "Install edge protection before further work."
        }],
        "limitations": "",
        "conclusion": "Overall acceptable progress."
    })
    .to_string()
}

#[tokio::test]
async fn test_deterministic_report_sections() {
    let h = harness(ScriptedGeneration::new(vec![]), None, "http://localhost:9000/media").await;
    let visit = new_visit(&h.store).await;

    add_text(&h, visit.id, "Concrete pour completed at bay 4", false).await;
    add_text(&h, visit.id, "Guardrail missing on level 2", true).await;

    let report = h.reports.generate_deterministic(visit.id).await.unwrap();
    assert_eq!(report.kind, ReportKind::Deterministic);
    assert!(report.content.contains("# Visit Report"));
    assert!(report.content.contains("- Concrete pour completed at bay 4"));
    assert!(report.content.contains("- Guardrail missing on level 2"));
    assert!(report.content.contains("No annexes."));

    // regeneration replaces the stored report but keeps its identity
    let again = h.reports.generate_deterministic(visit.id).await.unwrap();
    assert_eq!(again.id, report.id);
    assert_eq!(h.store.report_count().await, 1);
}

#[tokio::test]
async fn test_report_requires_accepted_entries() {
    let h = harness(ScriptedGeneration::new(vec![]), None, "http://localhost:9000/media").await;
    let visit = new_visit(&h.store).await;

    let err = h.reports.generate_deterministic(visit.id).await.unwrap_err();
    assert!(err.to_string().contains("no accepted entries"));

    let err = h
        .reports
        .generate_ai(visit.id, &ComposeOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no accepted entries"));
}

#[tokio::test]
async fn test_ai_report_composes_and_persists() {
    let generation = ScriptedGeneration::new(vec![Ok(valid_output())]);
    let h = harness(generation.clone(), None, "http://localhost:9000/media").await;
    let visit = new_visit(&h.store).await;

    add_text(&h, visit.id, "Concrete pour completed at bay 4", false).await;

    let report = h
        .reports
        .generate_ai(visit.id, &ComposeOptions::default())
        .await
        .unwrap();
    assert_eq!(report.kind, ReportKind::Ai);
    assert_eq!(report.model.as_deref(), Some("gpt-4o"));
    assert_eq!(report.prompt_version.as_deref(), Some("construction.v1"));

    // persisted content is the serialized validated output
    let output = AiReportOutput::from_json(&report.content).unwrap();
    assert_eq!(output.findings.len(), 1);

    let prompt = generation.system_prompt();
    assert!(prompt.contains("Concrete pour completed at bay 4"));
    assert!(prompt.contains("Respond entirely in Spanish"));
    assert!(!prompt.contains("{{AI_CONTEXT_JSON}}"));

    let request = generation.last_request();
    assert_eq!(request.model, "gpt-4o");
    assert!(request.json_output);
}

#[tokio::test]
async fn test_ai_regeneration_replaces_under_same_key() {
    let second_output = {
        let mut output = AiReportOutput::from_json(&valid_output()).unwrap();
        output.conclusion = "Second pass conclusion.".to_string();
        output.to_json().unwrap()
    };
    let generation = ScriptedGeneration::new(vec![Ok(valid_output()), Ok(second_output)]);
    let h = harness(generation, None, "http://localhost:9000/media").await;
    let visit = new_visit(&h.store).await;
    add_text(&h, visit.id, "Concrete pour completed at bay 4", false).await;

    let first = h
        .reports
        .generate_ai(visit.id, &ComposeOptions::default())
        .await
        .unwrap();
    let second = h
        .reports
        .generate_ai(visit.id, &ComposeOptions::default())
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(h.store.report_count().await, 1);
    let stored = h.reports.latest(visit.id, ReportKind::Ai).await.unwrap();
    assert!(stored.content.contains("Second pass conclusion."));
}

#[tokio::test]
async fn test_rejected_entries_stay_out_of_the_context() {
    let generation = ScriptedGeneration::new(vec![Ok(valid_output())]);
    let h = harness(
        generation.clone(),
        Some(r#"{"text": "irrelevant"}"#),
        "http://localhost:9000/media",
    )
    .await;
    let visit = new_visit(&h.store).await;

    add_text(&h, visit.id, "Concrete pour completed at bay 4", false).await;

    let rejected = h
        .review
        .create_entry(NewEntry {
            visit_id: visit.id,
            entry_type: EntryType::Audio,
            text: None,
            is_finding: false,
            file: Some(UploadFile {
                bytes: vec![0u8; 64],
                filename: "off-topic.mp3".to_string(),
                mime_type: "audio/mpeg".to_string(),
            }),
        })
        .await
        .unwrap();
    h.review
        .set_status(rejected.id, ReviewStatus::Rejected)
        .await
        .unwrap();

    h.reports
        .generate_ai(visit.id, &ComposeOptions::default())
        .await
        .unwrap();

    let prompt = generation.system_prompt();
    assert!(!prompt.contains("off-topic"));
    assert!(!prompt.contains("irrelevant"));
}

#[tokio::test]
async fn test_failed_transcription_becomes_sentinel() {
    let generation = ScriptedGeneration::new(vec![Ok(valid_output())]);
    // the speech provider rejects everything, so pre-transcription fails
    let h = harness(generation.clone(), None, "http://localhost:9000/media").await;
    let visit = new_visit(&h.store).await;

    let audio = h
        .review
        .create_entry(NewEntry {
            visit_id: visit.id,
            entry_type: EntryType::Audio,
            text: None,
            is_finding: false,
            file: Some(UploadFile {
                bytes: vec![0u8; 64],
                filename: "memo.mp3".to_string(),
                mime_type: "audio/mpeg".to_string(),
            }),
        })
        .await
        .unwrap();
    h.review
        .set_status(audio.id, ReviewStatus::Accepted)
        .await
        .unwrap();
    // let the spawned auto-transcription fail before generating
    for _ in 0..200 {
        let entry = h.store.get_entry(audio.id).await.unwrap();
        if entry.transcription_status != fieldscribe::domain::TranscriptionStatus::Processing {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    h.reports
        .generate_ai(visit.id, &ComposeOptions::default())
        .await
        .unwrap();

    let prompt = generation.system_prompt();
    assert!(prompt.contains(TRANSCRIPTION_UNAVAILABLE));
}

#[tokio::test]
async fn test_invalid_output_persists_nothing() {
    let with_extra_key = serde_json::json!({
        "executiveSummary": "ok",
        "observations": [],
        "findings": [],
        "limitations": "",
        "conclusion": "ok",
        "confidence": 0.9
    })
    .to_string();

    let generation = ScriptedGeneration::new(vec![Ok(valid_output()), Ok(with_extra_key)]);
    let h = harness(generation, None, "http://localhost:9000/media").await;
    let visit = new_visit(&h.store).await;
    add_text(&h, visit.id, "Concrete pour completed at bay 4", false).await;

    let first = h
        .reports
        .generate_ai(visit.id, &ComposeOptions::default())
        .await
        .unwrap();

    // the second generation violates the schema and must not replace
    // the stored report
    let err = h
        .reports
        .generate_ai(visit.id, &ComposeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FieldError::Contract(_)), "got: {}", err);

    let stored = h.reports.latest(visit.id, ReportKind::Ai).await.unwrap();
    assert_eq!(stored.content, first.content);
}

#[tokio::test]
async fn test_provider_failure_persists_nothing() {
    let generation = ScriptedGeneration::new(vec![Err(())]);
    let h = harness(generation, None, "http://localhost:9000/media").await;
    let visit = new_visit(&h.store).await;
    add_text(&h, visit.id, "Concrete pour completed at bay 4", false).await;

    let err = h
        .reports
        .generate_ai(visit.id, &ComposeOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("generation backend unavailable"));
    assert!(h.reports.latest(visit.id, ReportKind::Ai).await.is_err());
}

#[tokio::test]
async fn test_local_photo_urls_are_not_attached() {
    let generation = ScriptedGeneration::new(vec![Ok(valid_output())]);
    let h = harness(generation.clone(), None, "http://localhost:9000/media").await;
    let visit = new_visit(&h.store).await;

    h.review
        .create_entry(NewEntry {
            visit_id: visit.id,
            entry_type: EntryType::Photo,
            text: Some("north facade".to_string()),
            is_finding: false,
            file: Some(UploadFile {
                bytes: vec![0u8; 64],
                filename: "facade.jpg".to_string(),
                mime_type: "image/jpeg".to_string(),
            }),
        })
        .await
        .unwrap();

    h.reports
        .generate_ai(visit.id, &ComposeOptions::default())
        .await
        .unwrap();

    // localhost-backed media is not reachable by the provider, so no
    // image message is attached; the caption still rides in the context
    let request = generation.last_request();
    assert_eq!(request.messages.len(), 1);
    assert!(generation.system_prompt().contains("north facade"));
}

#[tokio::test]
async fn test_public_photo_urls_are_attached() {
    let generation = ScriptedGeneration::new(vec![Ok(valid_output())]);
    let h = harness(generation.clone(), None, "https://cdn.example.com/media").await;
    let visit = new_visit(&h.store).await;

    h.review
        .create_entry(NewEntry {
            visit_id: visit.id,
            entry_type: EntryType::Photo,
            text: None,
            is_finding: false,
            file: Some(UploadFile {
                bytes: vec![0u8; 64],
                filename: "facade.jpg".to_string(),
                mime_type: "image/jpeg".to_string(),
            }),
        })
        .await
        .unwrap();

    h.reports
        .generate_ai(visit.id, &ComposeOptions::default())
        .await
        .unwrap();

    let request = generation.last_request();
    assert_eq!(request.messages.len(), 2);
    match &request.messages[1].content {
        MessageContent::Parts(parts) => assert_eq!(parts.len(), 1),
        MessageContent::Text(_) => panic!("image message should be structured parts"),
    }
}

#[tokio::test]
async fn test_edit_revalidates_ai_content() {
    let generation = ScriptedGeneration::new(vec![Ok(valid_output())]);
    let h = harness(generation, None, "http://localhost:9000/media").await;
    let visit = new_visit(&h.store).await;
    add_text(&h, visit.id, "Concrete pour completed at bay 4", false).await;

    h.reports
        .generate_ai(visit.id, &ComposeOptions::default())
        .await
        .unwrap();

    let err = h
        .reports
        .edit_content(visit.id, ReportKind::Ai, "just some prose".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, FieldError::Contract(_)), "got: {}", err);

    let mut replacement = AiReportOutput::from_json(&valid_output()).unwrap();
    replacement.conclusion = "Revised after site follow-up.".to_string();
    let edited = h
        .reports
        .edit_content(visit.id, ReportKind::Ai, replacement.to_json().unwrap())
        .await
        .unwrap();
    assert!(edited.content.contains("Revised after site follow-up."));
}

#[tokio::test]
async fn test_missing_prompt_template_is_not_found() {
    let generation = ScriptedGeneration::new(vec![]);
    let h = harness(generation, None, "http://localhost:9000/media").await;
    let visit = new_visit(&h.store).await;
    add_text(&h, visit.id, "Concrete pour completed at bay 4", false).await;

    let err = h
        .reports
        .generate_ai(
            visit.id,
            &ComposeOptions {
                industry: Some("mining".to_string()),
                ..ComposeOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FieldError::NotFound(_)), "got: {}", err);
}
