//! JSON-file document store for visits, entries and reports.
//!
//! Persistence boundary for the engine: collections live in memory behind
//! an async RwLock and are written back as one pretty-printed JSON file
//! after every mutation, via temp file + rename so a crash never leaves a
//! half-written store. An fs2 advisory lock on the store directory keeps
//! a second process out.
//!
//! Concurrency within the process is last-write-wins read-modify-write;
//! every write re-enters through this store, which serializes them.

use std::fs::File;
use std::path::PathBuf;

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Entry, FieldError, FieldResult, Report, ReportKind, Visit};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Collections {
    version: u32,
    visits: Vec<Visit>,
    entries: Vec<Entry>,
    reports: Vec<Report>,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            version: 1,
            visits: Vec::new(),
            entries: Vec::new(),
            reports: Vec::new(),
        }
    }
}

pub struct DocumentStore {
    path: PathBuf,
    inner: RwLock<Collections>,
    /// Held for the lifetime of the store
    _lock_file: File,
}

impl DocumentStore {
    /// Open (or create) the store in the given directory.
    pub async fn open(dir: impl Into<PathBuf>) -> FieldResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let lock_path = dir.join(".lock");
        let lock_file = File::create(&lock_path)?;
        lock_file.try_lock_exclusive().map_err(|_| {
            FieldError::Config(format!(
                "document store at {} is locked by another process",
                dir.display()
            ))
        })?;

        let path = dir.join("documents.json");
        let collections = if path.exists() {
            let content = fs::read_to_string(&path).await?;
            serde_json::from_str(&content)?
        } else {
            Collections::default()
        };

        Ok(Self {
            path,
            inner: RwLock::new(collections),
            _lock_file: lock_file,
        })
    }

    async fn persist(&self, collections: &Collections) -> FieldResult<()> {
        let content = serde_json::to_string_pretty(collections)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Visits
    // ------------------------------------------------------------------

    pub async fn insert_visit(&self, visit: Visit) -> FieldResult<Visit> {
        let mut inner = self.inner.write().await;
        inner.visits.push(visit.clone());
        self.persist(&inner).await?;
        Ok(visit)
    }

    pub async fn get_visit(&self, id: Uuid) -> FieldResult<Visit> {
        let inner = self.inner.read().await;
        inner
            .visits
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .ok_or_else(|| FieldError::not_found(format!("visit {} not found", id)))
    }

    pub async fn list_visits(&self) -> Vec<Visit> {
        let inner = self.inner.read().await;
        let mut visits = inner.visits.clone();
        visits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        visits
    }

    pub async fn save_visit(&self, visit: Visit) -> FieldResult<Visit> {
        let mut inner = self.inner.write().await;
        let slot = inner
            .visits
            .iter_mut()
            .find(|v| v.id == visit.id)
            .ok_or_else(|| FieldError::not_found(format!("visit {} not found", visit.id)))?;
        *slot = visit.clone();
        self.persist(&inner).await?;
        Ok(visit)
    }

    // ------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------

    pub async fn insert_entry(&self, entry: Entry) -> FieldResult<Entry> {
        let mut inner = self.inner.write().await;
        inner.entries.push(entry.clone());
        self.persist(&inner).await?;
        Ok(entry)
    }

    /// Fetch an entry by id. Soft-deleted entries count as missing.
    pub async fn get_entry(&self, id: Uuid) -> FieldResult<Entry> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .find(|e| e.id == id && !e.deleted)
            .cloned()
            .ok_or_else(|| FieldError::not_found(format!("entry {} not found", id)))
    }

    /// Replace a stored entry (matched by id, including soft-deleted ones,
    /// so a delete flag can be persisted).
    pub async fn save_entry(&self, entry: Entry) -> FieldResult<Entry> {
        let mut inner = self.inner.write().await;
        let slot = inner
            .entries
            .iter_mut()
            .find(|e| e.id == entry.id)
            .ok_or_else(|| FieldError::not_found(format!("entry {} not found", entry.id)))?;
        *slot = entry.clone();
        self.persist(&inner).await?;
        Ok(entry)
    }

    /// Non-deleted entries of a visit, newest first (listing order).
    pub async fn list_entries(&self, visit_id: Uuid) -> Vec<Entry> {
        let inner = self.inner.read().await;
        let mut entries: Vec<_> = inner
            .entries
            .iter()
            .filter(|e| e.visit_id == visit_id && !e.deleted)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    /// Accepted, non-deleted entries of a visit in creation order
    /// (report-building order).
    pub async fn accepted_entries(&self, visit_id: Uuid) -> Vec<Entry> {
        let inner = self.inner.read().await;
        let mut entries: Vec<_> = inner
            .entries
            .iter()
            .filter(|e| {
                e.visit_id == visit_id
                    && !e.deleted
                    && e.status == crate::domain::ReviewStatus::Accepted
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        entries
    }

    // ------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------

    /// Upsert a report under its `(visit_id, kind)` key.
    ///
    /// An existing report keeps its document id; content, model, prompt
    /// version and generation time are replaced.
    pub async fn upsert_report(&self, report: Report) -> FieldResult<Report> {
        let mut inner = self.inner.write().await;
        let stored = match inner
            .reports
            .iter_mut()
            .find(|r| r.visit_id == report.visit_id && r.kind == report.kind)
        {
            Some(existing) => {
                let mut replacement = report;
                replacement.id = existing.id;
                *existing = replacement.clone();
                replacement
            }
            None => {
                inner.reports.push(report.clone());
                report
            }
        };
        self.persist(&inner).await?;
        Ok(stored)
    }

    pub async fn get_report(&self, visit_id: Uuid, kind: ReportKind) -> FieldResult<Report> {
        let inner = self.inner.read().await;
        inner
            .reports
            .iter()
            .find(|r| r.visit_id == visit_id && r.kind == kind)
            .cloned()
            .ok_or_else(|| {
                FieldError::not_found(format!("{} report for visit {} not found", kind, visit_id))
            })
    }

    /// Number of stored reports (test support).
    pub async fn report_count(&self) -> usize {
        self.inner.read().await.reports.len()
    }
}
