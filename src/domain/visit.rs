//! Visit model: a site-visit record grouping entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entry::Language;
use super::error::{FieldError, FieldResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Draft,
    Final,
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => f.write_str("draft"),
            Self::Final => f.write_str("final"),
        }
    }
}

impl FromStr for VisitStatus {
    type Err = FieldError;

    fn from_str(s: &str) -> FieldResult<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "final" => Ok(Self::Final),
            other => Err(FieldError::usage(format!(
                "invalid visit status '{}' (expected one of: draft, final)",
                other
            ))),
        }
    }
}

/// A site visit. Owns its entries only as a grouping key; entry lifecycle
/// is governed by the review state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub project_name: String,
    pub location: String,
    pub status: VisitStatus,

    /// Industry tag used to select the AI prompt template
    pub industry: Option<String>,

    /// Target report language
    pub language: Option<Language>,

    pub country: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Visit {
    pub fn new(project_name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_name: project_name.into(),
            location: location.into(),
            status: VisitStatus::Draft,
            industry: None,
            language: None,
            country: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_visit_is_draft() {
        let visit = Visit::new("Bridge A12", "Porto");
        assert_eq!(visit.status, VisitStatus::Draft);
        assert!(visit.industry.is_none());
    }
}
