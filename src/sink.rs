//! Where accepted records go.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::entities::{Record, RecordId};

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Upsert-by-id record store. A second record with the same id overwrites
/// the first.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordSink: Send + Sync + 'static {
    async fn upsert(&self, record: Record) -> Result<(), SinkError>;

    async fn get_all(&self) -> Result<Vec<Record>, SinkError>;
}

/// In-process sink, keyed by record id.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: DashMap<RecordId, Record>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.records.get(id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn upsert(&self, record: Record) -> Result<(), SinkError> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    /// Sorted by id so output is stable across runs.
    async fn get_all(&self) -> Result<Vec<Record>, SinkError> {
        let mut records: Vec<Record> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}
