//! Report artifacts and the strict AI output contract.
//!
//! A visit holds at most one live report per kind; regenerating replaces
//! the previous one. The AI output schema is closed: any key outside the
//! declared property set fails deserialization, so a validated
//! `AiReportOutput` is exactly the contract and nothing more.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{FieldError, FieldResult};

/// Kind of generated report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Deterministic,
    Ai,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::Ai => "ai",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = FieldError;

    fn from_str(s: &str) -> FieldResult<Self> {
        match s {
            "deterministic" => Ok(Self::Deterministic),
            "ai" => Ok(Self::Ai),
            other => Err(FieldError::usage(format!(
                "invalid report kind '{}' (expected one of: deterministic, ai)",
                other
            ))),
        }
    }
}

/// A generated report document, keyed by `(visit_id, kind)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub kind: ReportKind,

    /// Markdown text for deterministic reports; serialized validated
    /// `AiReportOutput` JSON for AI reports.
    pub content: String,

    /// Generation model (AI reports only)
    pub model: Option<String>,

    /// Resolved prompt version, e.g. "construction.v1" (AI reports only)
    pub prompt_version: Option<String>,

    pub generated_at: DateTime<Utc>,
}

impl Report {
    pub fn deterministic(visit_id: Uuid, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            visit_id,
            kind: ReportKind::Deterministic,
            content,
            model: None,
            prompt_version: None,
            generated_at: Utc::now(),
        }
    }

    pub fn ai(
        visit_id: Uuid,
        content: String,
        model: String,
        prompt_version: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            visit_id,
            kind: ReportKind::Ai,
            content,
            model: Some(model),
            prompt_version: Some(prompt_version),
            generated_at: Utc::now(),
        }
    }
}

/// Severity of a reported finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One finding inside a validated AI report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Finding {
    pub title: String,
    pub severity: Severity,
    pub evidence: String,
    pub recommendation: String,
}

/// The validated structured output of AI report generation.
///
/// Deserialization enforces the full contract: every field required and
/// correctly typed, severities within the enum, and no undeclared keys at
/// the top level or inside findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AiReportOutput {
    pub executive_summary: String,
    pub observations: Vec<String>,
    pub findings: Vec<Finding>,
    pub limitations: String,
    pub conclusion: String,
}

impl AiReportOutput {
    /// Parse and validate raw generation output.
    ///
    /// Unparsable JSON and schema violations are both contract errors;
    /// the message names the offending field where serde can identify it.
    pub fn from_json(raw: &str) -> FieldResult<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| FieldError::Contract(format!("AI output is not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Validate an already-parsed JSON value against the contract.
    pub fn from_value(value: serde_json::Value) -> FieldResult<Self> {
        if !value.is_object() {
            return Err(FieldError::Contract("AI output is not an object".into()));
        }
        serde_json::from_value(value)
            .map_err(|e| FieldError::Contract(format!("AI output violates report schema: {}", e)))
    }

    /// Serialize for persistence as report content.
    pub fn to_json(&self) -> FieldResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_output_json() -> serde_json::Value {
        serde_json::json!({
            "executiveSummary": "Site in fair condition.",
            "observations": ["Crew present on site", "Weather dry"],
            "findings": [{
                "title": "Cracked slab",
                "severity": "medium",
                "evidence": "Hairline crack across bay 3",
                "recommendation": "Monitor and seal"
            }],
            "limitations": "Single-day visit.",
            "conclusion": "No immediate action required."
        })
    }

    #[test]
    fn test_valid_output_parses() {
        let output = AiReportOutput::from_value(valid_output_json()).unwrap();
        assert_eq!(output.observations.len(), 2);
        assert_eq!(output.findings[0].severity, Severity::Medium);
    }

    #[test]
    fn test_missing_required_field_rejected() {
        for field in [
            "executiveSummary",
            "observations",
            "findings",
            "limitations",
            "conclusion",
        ] {
            let mut value = valid_output_json();
            value.as_object_mut().unwrap().remove(field);
            let err = AiReportOutput::from_value(value).unwrap_err();
            assert!(matches!(err, FieldError::Contract(_)), "field {}", field);
        }
    }

    #[test]
    fn test_extra_top_level_key_rejected() {
        let mut value = valid_output_json();
        value
            .as_object_mut()
            .unwrap()
            .insert("appendix".into(), serde_json::json!("extra"));
        assert!(AiReportOutput::from_value(value).is_err());
    }

    #[test]
    fn test_extra_finding_key_rejected() {
        let mut value = valid_output_json();
        value["findings"][0]
            .as_object_mut()
            .unwrap()
            .insert("score".into(), serde_json::json!(9));
        assert!(AiReportOutput::from_value(value).is_err());
    }

    #[test]
    fn test_invalid_severity_rejected() {
        let mut value = valid_output_json();
        value["findings"][0]["severity"] = serde_json::json!("critical");
        assert!(AiReportOutput::from_value(value).is_err());
    }

    #[test]
    fn test_wrong_type_rejected() {
        let mut value = valid_output_json();
        value["observations"] = serde_json::json!("not an array");
        assert!(AiReportOutput::from_value(value).is_err());

        let mut value = valid_output_json();
        value["observations"] = serde_json::json!(["ok", 42]);
        assert!(AiReportOutput::from_value(value).is_err());
    }

    #[test]
    fn test_unparsable_json_rejected() {
        assert!(AiReportOutput::from_json("not json at all").is_err());
        assert!(AiReportOutput::from_json("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_serialization_round_trip() {
        let output = AiReportOutput::from_value(valid_output_json()).unwrap();
        let json = output.to_json().unwrap();
        let reparsed = AiReportOutput::from_json(&json).unwrap();
        assert_eq!(output, reparsed);
        // serialization is idempotent
        assert_eq!(json, reparsed.to_json().unwrap());
    }
}
