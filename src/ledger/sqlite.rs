//! SQLite-backed ledger.

use super::{Ledger, LedgerRecord, LedgerStatus};
use crate::error::{Result, YtsumError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ledger (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    published_at TEXT,
    language TEXT,
    transcript_chars INTEGER NOT NULL DEFAULT 0,
    tokens_estimate INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    error TEXT,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ledger_status ON ledger(status);
"#;

const COLUMNS: &str =
    "id, title, url, published_at, language, transcript_chars, tokens_estimate, status, error";

/// Durable ledger in a single SQLite table.
///
/// Every upsert is its own statement, so a crash loses at most the row
/// being written.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open (or create) the ledger database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened ledger at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory ledger (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| YtsumError::Ledger(format!("Failed to acquire lock: {}", e)))
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<(LedgerRecord, String)> {
        let published_at: Option<String> = row.get(3)?;
        let status: String = row.get(7)?;

        let record = LedgerRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            published_at: published_at
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            language: row.get(4)?,
            transcript_chars: row.get::<_, i64>(5)? as usize,
            tokens_estimate: row.get::<_, i64>(6)? as usize,
            status: LedgerStatus::Pending,
            error: row.get(8)?,
        };
        Ok((record, status))
    }

    fn finish(raw: (LedgerRecord, String)) -> Result<LedgerRecord> {
        let (mut record, status) = raw;
        record.status = status.parse()?;
        Ok(record)
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn get(&self, id: &str) -> Result<Option<LedgerRecord>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM ledger WHERE id = ?1", COLUMNS),
                params![id],
                Self::row_to_record,
            )
            .optional()?;

        raw.map(Self::finish).transpose()
    }

    #[instrument(skip(self, record), fields(video_id = %record.id, status = %record.status))]
    async fn upsert(&self, record: &LedgerRecord) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO ledger
                (id, title, url, published_at, language, transcript_chars,
                 tokens_estimate, status, error, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                url = excluded.url,
                published_at = excluded.published_at,
                language = excluded.language,
                transcript_chars = excluded.transcript_chars,
                tokens_estimate = excluded.tokens_estimate,
                status = excluded.status,
                error = excluded.error,
                updated_at = excluded.updated_at
            "#,
            params![
                record.id,
                record.title,
                record.url,
                record.published_at.map(|dt| dt.to_rfc3339()),
                record.language,
                record.transcript_chars as i64,
                record.tokens_estimate as i64,
                record.status.as_str(),
                record.error,
                Utc::now().to_rfc3339(),
            ],
        )?;

        debug!("Ledger row written");
        Ok(())
    }

    async fn records(&self) -> Result<Vec<LedgerRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM ledger ORDER BY seq", COLUMNS))?;

        let rows = stmt
            .query_map([], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(Self::finish).collect()
    }
}
