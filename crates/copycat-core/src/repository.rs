//! Storage abstraction for submission records.
//!
//! The engine never owns persistence. It reads a scope's corpus and appends
//! finished submissions through [`SubmissionRepository`], which the host
//! application implements (the `copycat` crate ships a SQLite one).
//! Implementations must be `Send + Sync` to work with async runtimes.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CorpusEntry, ScopeSummary, SubmissionRecord, VerdictStatus};

/// Abstract store of evaluated submissions.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_corpus`](SubmissionRepository::list_corpus) | Prior documents of a scope, in submission order |
/// | [`record`](SubmissionRepository::record) | Persist a submission with its verdict |
/// | [`get_submission`](SubmissionRepository::get_submission) | Look up one record |
/// | [`scope_summary`](SubmissionRepository::scope_summary) | Accepted/rejected counts |
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Every recorded submission in `scope_id`, oldest first, skipping
    /// those by `exclude_author` when given.
    async fn list_corpus(
        &self,
        scope_id: &str,
        exclude_author: Option<&str>,
    ) -> Result<Vec<CorpusEntry>>;

    /// Append one evaluated submission.
    async fn record(&self, record: &SubmissionRecord) -> Result<()>;

    async fn get_submission(&self, id: &str) -> Result<Option<SubmissionRecord>>;

    async fn scope_summary(&self, scope_id: &str) -> Result<ScopeSummary>;
}

/// In-memory repository for tests and embedding.
///
/// Records live in a `Vec` behind `std::sync::RwLock`; insertion order is
/// submission order.
#[derive(Default)]
pub struct InMemoryRepository {
    records: RwLock<Vec<SubmissionRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SubmissionRepository for InMemoryRepository {
    async fn list_corpus(
        &self,
        scope_id: &str,
        exclude_author: Option<&str>,
    ) -> Result<Vec<CorpusEntry>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .iter()
            .filter(|r| r.scope_id == scope_id)
            .filter(|r| exclude_author != Some(r.author_id.as_str()))
            .map(SubmissionRecord::to_corpus_entry)
            .collect())
    }

    async fn record(&self, record: &SubmissionRecord) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if records.iter().any(|r| r.id() == record.id()) {
            anyhow::bail!("submission already recorded: {}", record.id());
        }
        records.push(record.clone());
        Ok(())
    }

    async fn get_submission(&self, id: &str) -> Result<Option<SubmissionRecord>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.iter().find(|r| r.id() == id).cloned())
    }

    async fn scope_summary(&self, scope_id: &str) -> Result<ScopeSummary> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let mut summary = ScopeSummary {
            scope_id: scope_id.to_string(),
            ..Default::default()
        };
        for r in records.iter().filter(|r| r.scope_id == scope_id) {
            summary.total += 1;
            match r.verdict.status {
                VerdictStatus::Accepted => summary.accepted += 1,
                VerdictStatus::Rejected => summary.rejected += 1,
            }
        }
        Ok(summary)
    }
}
