//! In-memory ledger.
//!
//! Useful for testing and dry runs.

use super::{Ledger, LedgerRecord};
use crate::error::{Result, YtsumError};
use async_trait::async_trait;
use std::sync::RwLock;

/// In-memory ledger preserving first-seen order.
pub struct MemoryLedger {
    records: RwLock<Vec<LedgerRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> YtsumError {
    YtsumError::Ledger(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get(&self, id: &str) -> Result<Option<LedgerRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn upsert(&self, record: &LedgerRecord) -> Result<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    async fn records(&self) -> Result<Vec<LedgerRecord>> {
        Ok(self.records.read().map_err(poisoned)?.clone())
    }
}
