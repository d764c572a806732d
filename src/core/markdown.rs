//! Deterministic Markdown report: simple string templating over the
//! visit's accepted entries, no AI involved.

use chrono::Utc;

use crate::domain::{Entry, EntryType, Visit};

/// Render the deterministic report for a visit from its accepted,
/// non-deleted entries (in creation order).
pub fn build_report(visit: &Visit, entries: &[Entry]) -> String {
    let header = format!(
        "# Visit Report\nProject: {}\nLocation: {}\nStatus: {}\nGenerated: {}\n",
        visit.project_name,
        visit.location,
        visit.status,
        Utc::now().to_rfc3339(),
    );

    let observations = join_or(
        entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Text && !e.is_finding)
            .map(|e| format!("- {}", e.content_text().unwrap_or("No content"))),
        "No observations recorded.",
    );

    let findings = join_or(
        entries
            .iter()
            .filter(|e| e.is_finding)
            .map(|e| format!("- {}", e.content_text().unwrap_or("Finding noted"))),
        "No findings flagged.",
    );

    let annexes = join_or(
        entries
            .iter()
            .filter(|e| e.entry_type != EntryType::Text)
            .map(|e| {
                format!(
                    "- {}: {}",
                    e.entry_type.as_str().to_uppercase(),
                    e.file_url.as_deref().unwrap_or("N/A")
                )
            }),
        "No annexes.",
    );

    [
        header,
        "## Objective".to_string(),
        "Site visit summary generated from accepted entries.".to_string(),
        "## Observations".to_string(),
        observations,
        "## Findings".to_string(),
        findings,
        "## Annexes".to_string(),
        annexes,
    ]
    .join("\n\n")
}

fn join_or(lines: impl Iterator<Item = String>, fallback: &str) -> String {
    let joined: Vec<String> = lines.collect();
    if joined.is_empty() {
        fallback.to_string()
    } else {
        joined.join("\n")
    }
}
