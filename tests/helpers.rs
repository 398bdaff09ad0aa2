#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use nsr_crawler::entities::{EntityTarget, RegionCategory};
use nsr_crawler::fetcher::{FetchError, Fetcher, PageResponse};
use nsr_crawler::frontier::CrawlTask;

pub fn johor() -> Arc<EntityTarget> {
    Arc::new(EntityTarget::new("01", "Johor", RegionCategory::Regular))
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("src/extractor/tests/fixtures/{name}"))
        .expect("Failed to read test fixture")
}

/// Serves canned documents by URL and records every task it was asked for.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, String>,
    failures: HashMap<String, u16>,
    requests: Mutex<Vec<CrawlTask>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), body.into());
        self
    }

    pub fn failing(mut self, url: &str, status: u16) -> Self {
        self.failures.insert(url.to_string(), status);
        self
    }

    pub fn requests(&self) -> Vec<CrawlTask> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_keys(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|task| task.dedup_key)
            .collect()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, task: &CrawlTask) -> Result<PageResponse, FetchError> {
        self.requests.lock().unwrap().push(task.clone());
        // Yield so concurrent tasks interleave.
        tokio::task::yield_now().await;

        let url = task.url.as_str();
        if let Some(status) = self.failures.get(url) {
            let status = reqwest::StatusCode::from_u16(*status).unwrap();
            return Err(FetchError::from_status(status, url));
        }
        match self.pages.get(url) {
            Some(body) => Ok(PageResponse::html(task.url.clone(), body.clone())),
            None => Err(FetchError::from_status(reqwest::StatusCode::NOT_FOUND, url)),
        }
    }
}
