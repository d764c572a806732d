//! AI report composer: assembles a prompt from the visit context, invokes
//! the generation capability, and strictly validates the structured
//! result.
//!
//! Generation is single-shot. There is no candidate fallback here; a
//! provider failure or a schema violation surfaces immediately, and
//! invalid output is never coerced or repaired.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::adapters::{ChatMessage, GenerationClient, GenerationRequest};
use crate::config::Config;
use crate::domain::{AiContext, AiReportOutput, FieldResult, Language};
use crate::prompts::{PromptStore, CONTEXT_PLACEHOLDER};

pub const DEFAULT_INDUSTRY: &str = "construction";
const DEFAULT_PROMPT_VERSION: &str = "v1";
const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Per-request overrides for report composition.
#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    pub industry: Option<String>,
    pub prompt_version: Option<String>,
    pub temperature: Option<f32>,
}

/// A validated composition result, ready for persistence.
#[derive(Debug, Clone)]
pub struct ComposedReport {
    pub output: AiReportOutput,
    pub model: String,
    /// Resolved key, e.g. "construction.v1"
    pub prompt_version: String,
}

pub struct ReportComposer {
    generation: Arc<dyn GenerationClient>,
    prompts: PromptStore,
    model: String,
}

impl ReportComposer {
    /// The configured model has already passed the allow-list check in
    /// `Config::load`.
    pub fn new(config: &Config, generation: Arc<dyn GenerationClient>, prompts: PromptStore) -> Self {
        Self {
            generation,
            prompts,
            model: config.report_model.clone(),
        }
    }

    #[instrument(skip(self, context, options))]
    pub async fn compose(
        &self,
        context: &AiContext,
        options: &ComposeOptions,
    ) -> FieldResult<ComposedReport> {
        let industry = options
            .industry
            .clone()
            .or_else(|| context.metadata.industry.clone())
            .unwrap_or_else(|| DEFAULT_INDUSTRY.to_string());
        let version = options
            .prompt_version
            .clone()
            .unwrap_or_else(|| DEFAULT_PROMPT_VERSION.to_string());

        let prompt = self.prompts.load(&industry, &version).await?;

        let context_json = context.to_prompt_json()?;
        let mut prompt_text = prompt.content.replace(CONTEXT_PLACEHOLDER, &context_json);

        let language = context.metadata.language.unwrap_or(Language::En);
        prompt_text.push_str(&format!(
            "\n\nRespond entirely in {}. Do not mix languages in the output.",
            language.full_name()
        ));

        let mut messages = vec![ChatMessage::system(prompt_text)];

        let image_urls: Vec<String> = context
            .entries
            .photos
            .iter()
            .filter_map(|photo| photo.url.clone())
            .filter(|url| is_public_url(url))
            .collect();
        if !image_urls.is_empty() {
            debug!(count = image_urls.len(), "attaching image message");
            messages.push(ChatMessage::user_images(image_urls));
        }

        let raw = self
            .generation
            .generate(GenerationRequest {
                model: self.model.clone(),
                temperature: options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                json_output: true,
                messages,
            })
            .await?;

        let output = AiReportOutput::from_json(&raw)?;

        info!(
            model = %self.model,
            prompt_version = %prompt.prompt_version,
            findings = output.findings.len(),
            "AI report composed"
        );

        Ok(ComposedReport {
            output,
            model: self.model.clone(),
            prompt_version: prompt.prompt_version,
        })
    }
}

/// Whether a URL is plausibly reachable by an external generation
/// provider: http(s), and not pointing at loopback, link-local, `.local`
/// or private-range hosts. URLs failing this check are dropped from the
/// image set, not treated as errors.
pub fn is_public_url(url: &str) -> bool {
    let parsed = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }

    let host = match parsed.host_str() {
        Some(host) => host.trim_matches(|c| c == '[' || c == ']'),
        None => return false,
    };

    if let Ok(ip) = host.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => {
                !(v4.is_loopback()
                    || v4.is_private()
                    || v4.is_link_local()
                    || v4.is_unspecified())
            }
            IpAddr::V6(v6) => {
                !(v6.is_loopback()
                    || v6.is_unspecified()
                    // link-local fe80::/10 and unique-local fc00::/7
                    || (v6.segments()[0] & 0xffc0) == 0xfe80
                    || (v6.segments()[0] & 0xfe00) == 0xfc00)
            }
        };
    }

    let host_lc = host.to_lowercase();
    host_lc != "localhost" && !host_lc.ends_with(".local")
}
