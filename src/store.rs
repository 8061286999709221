use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::models::Record;

/// Outcome of a conditional create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// A record with the same id already exists; nothing was written
    Conflict,
}

/// Gateway over the key-value backend holding records.
///
/// Errors returned from these methods are unclassified backend failures.
/// Business conditions (conflict, absence) are part of the `Ok` value.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Write `record` only if no record with the same id exists
    async fn create(&self, record: &Record) -> Result<CreateOutcome>;

    /// Look up a record by id, `Ok(None)` when absent
    async fn fetch(&self, id: &str) -> Result<Option<Record>>;

    /// Remove the record at `id` if there is one
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Process-local store, used for local development and tests
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, record: &Record) -> Result<CreateOutcome> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.id) {
            return Ok(CreateOutcome::Conflict);
        }
        records.insert(record.id.clone(), record.content.clone());
        Ok(CreateOutcome::Created)
    }

    async fn fetch(&self, id: &str) -> Result<Option<Record>> {
        let records = self.records.lock().await;
        Ok(records.get(id).map(|content| Record {
            id: id.to_string(),
            content: content.clone(),
        }))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records.lock().await.remove(id);
        Ok(())
    }
}
