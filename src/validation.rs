//! Guards between parsing and the sink.

use scraper::Html;
use std::sync::Arc;
use tracing::warn;

use crate::entities::Record;
use crate::extractor::probe_results;
use crate::normalize::is_valid_id;
use crate::sink::{RecordSink, SinkError};

/// True only when the listing table has a data row. A page with neither rows
/// nor a "no records" phrase counts as empty.
pub fn has_results(document: &Html) -> bool {
    probe_results(document).has_results()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    Upserted,
    Rejected,
}

/// Drops records with invalid ids and forwards the rest to the sink.
#[derive(Clone)]
pub struct RecordGate {
    sink: Arc<dyn RecordSink>,
}

impl RecordGate {
    pub fn new(sink: Arc<dyn RecordSink>) -> Self {
        Self { sink }
    }

    pub async fn submit(&self, record: Record) -> Result<Emission, SinkError> {
        if !is_valid_id(record.id.as_str()) {
            warn!(id = %record.id, url = %record.detail_url, "Dropping record with invalid id");
            return Ok(Emission::Rejected);
        }
        self.sink.upsert(record).await?;
        Ok(Emission::Upserted)
    }
}
