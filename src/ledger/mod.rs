//! Idempotency ledger: one record per item, keyed by id.
//!
//! The ledger decides skip vs. reprocess and is the only source for run
//! reports. Writes are upserts; new ids keep first-seen order.

mod memory;
mod sqlite;

pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;

use crate::error::{Result, YtsumError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Processing status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Pending,
    TranscriptUnavailable,
    Summarized,
    Failed,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Pending => "pending",
            LedgerStatus::TranscriptUnavailable => "transcript_unavailable",
            LedgerStatus::Summarized => "summarized",
            LedgerStatus::Failed => "failed",
        }
    }

    /// Terminal states that are never retried without `force`.
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            LedgerStatus::Summarized | LedgerStatus::TranscriptUnavailable
        )
    }
}

impl std::fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerStatus {
    type Err = YtsumError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(LedgerStatus::Pending),
            "transcript_unavailable" => Ok(LedgerStatus::TranscriptUnavailable),
            "summarized" => Ok(LedgerStatus::Summarized),
            "failed" => Ok(LedgerStatus::Failed),
            other => Err(YtsumError::Ledger(format!("Unknown status '{}'", other))),
        }
    }
}

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub transcript_chars: usize,
    pub tokens_estimate: usize,
    pub status: LedgerStatus,
    pub error: Option<String>,
}

impl LedgerRecord {
    /// A fresh `pending` record.
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            url: String::new(),
            published_at: None,
            language: None,
            transcript_chars: 0,
            tokens_estimate: 0,
            status: LedgerStatus::Pending,
            error: None,
        }
    }
}

/// Trait for ledger backends.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Fetch the record for an id.
    async fn get(&self, id: &str) -> Result<Option<LedgerRecord>>;

    /// Insert or replace the record for `record.id`.
    async fn upsert(&self, record: &LedgerRecord) -> Result<()>;

    /// All records in first-seen order.
    async fn records(&self) -> Result<Vec<LedgerRecord>>;

    /// True iff the item reached a complete state and `force` is not set.
    async fn has_completed(&self, id: &str, force: bool) -> Result<bool> {
        if force {
            return Ok(false);
        }
        Ok(self
            .get(id)
            .await?
            .is_some_and(|record| record.status.is_complete()))
    }

    /// Number of records per status.
    async fn status_counts(&self) -> Result<BTreeMap<LedgerStatus, usize>> {
        let mut counts = BTreeMap::new();
        for record in self.records().await? {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Build a run report for `ids` from the status column.
    async fn report(&self, ids: &[String]) -> Result<RunReport> {
        let mut report = RunReport::default();
        for id in ids {
            match self.get(id).await? {
                Some(record) => report.count(record.status),
                None => report.pending += 1,
            }
        }
        Ok(report)
    }
}

/// Per-status totals for a set of items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub summarized: usize,
    pub transcript_unavailable: usize,
    pub failed: usize,
    pub pending: usize,
    /// Items skipped because the ledger already had them complete.
    pub skipped: usize,
}

impl RunReport {
    fn count(&mut self, status: LedgerStatus) {
        match status {
            LedgerStatus::Summarized => self.summarized += 1,
            LedgerStatus::TranscriptUnavailable => self.transcript_unavailable += 1,
            LedgerStatus::Failed => self.failed += 1,
            LedgerStatus::Pending => self.pending += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.summarized + self.transcript_unavailable + self.failed + self.pending
    }
}
