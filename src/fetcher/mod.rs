//! The document-fetching substrate the crawl core runs on.
//!
//! The core only depends on [`Fetcher`]; [`HttpFetcher`] is the production
//! implementation and tests substitute scripted ones.

pub mod backoff;
pub mod client;
pub mod errors;
pub mod pipeline;
pub mod throttle;
pub mod types;

pub use client::{HttpFetcher, get_client};
pub use errors::FetchError;
pub use types::PageResponse;

use async_trait::async_trait;

use crate::frontier::CrawlTask;

/// Resolves a task to a decoded document. Implementations own retries.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, task: &CrawlTask) -> Result<PageResponse, FetchError>;
}

/// Fetcher tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Minimum spacing between requests to one host.
    pub domain_delay_ms: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            domain_delay_ms: 500,
            max_retries: 3,
            base_backoff_ms: 500,
        }
    }
}
