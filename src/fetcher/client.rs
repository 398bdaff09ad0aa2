use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder, header};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{instrument, warn};

use crate::fetcher::{
    FetchConfig, Fetcher, backoff::calculate_backoff_delay, errors::FetchError,
    pipeline::decode_body, throttle::DomainThrottle, types::PageResponse,
};
use crate::frontier::{CrawlTask, RequestMethod};

const MAX_BODY_SIZE: u64 = 5 * 1024 * 1024; // 5MB
const USER_AGENT: &str = "Mozilla/5.0 (compatible; NsrCrawler/0.1)";

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::limited(10))
        .default_headers({
            let mut headers = header::HeaderMap::new();
            headers.insert(
                header::ACCEPT,
                header::HeaderValue::from_static(
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                ),
            );
            headers
        })
        .build()
        .expect("Failed to build HTTP client")
});

pub fn get_client() -> &'static Client {
    &HTTP_CLIENT
}

/// reqwest-backed fetcher with per-domain spacing and bounded retries.
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
    throttle: DomainThrottle,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self::with_client(get_client().clone(), config)
    }

    pub fn with_client(client: Client, config: FetchConfig) -> Self {
        Self {
            client,
            throttle: DomainThrottle::new(Duration::from_millis(config.domain_delay_ms)),
            config,
        }
    }

    #[instrument(skip_all, fields(url = %task.url, key = %task.dedup_key))]
    async fn fetch_once(&self, task: &CrawlTask) -> Result<PageResponse, FetchError> {
        let request = match &task.method {
            RequestMethod::Get => self.client.get(task.url.clone()),
            RequestMethod::FormPost(fields) => {
                self.client.post(task.url.clone()).form(fields.pairs())
            }
        };

        let response = request
            .send()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        // Check content length before downloading
        if let Some(content_length) = response.content_length()
            && content_length > MAX_BODY_SIZE
        {
            return Err(FetchError::BodyTooLarge(content_length));
        }

        let final_url = response.url().clone();
        let status = response.status();

        if !status.is_success() {
            return Err(FetchError::from_status(status, final_url.as_str()));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
            return Err(FetchError::UnsupportedContentType(content_type));
        }

        let body_bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?;

        // Check body size after download (in case Content-Length was missing)
        if body_bytes.len() as u64 > MAX_BODY_SIZE {
            return Err(FetchError::BodyTooLarge(body_bytes.len() as u64));
        }

        let (encoding, body_utf8) = decode_body(&content_type, &body_bytes);

        Ok(PageResponse {
            url_final: final_url,
            status,
            body_utf8,
            charset: encoding.name(),
            fetched_at: Utc::now(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, task: &CrawlTask) -> Result<PageResponse, FetchError> {
        let mut attempt = 0;
        loop {
            self.throttle.wait(&task.url).await;

            let err = match self.fetch_once(task).await {
                Ok(page) => return Ok(page),
                Err(err) => err,
            };

            if !err.should_retry() || attempt >= self.config.max_retries {
                return Err(err);
            }

            let delay = calculate_backoff_delay(attempt, self.config.base_backoff_ms);
            attempt += 1;

            if let FetchError::BotDetected { status, url } = &err {
                warn!(
                    %status,
                    %url,
                    kind = task.kind.label(),
                    attempt,
                    max_retries = self.config.max_retries,
                    "Bot detection triggered, backing off {}ms",
                    delay.as_millis()
                );
            } else {
                warn!(
                    "Retrying {} in {}ms (attempt {}/{}): {}",
                    task.url,
                    delay.as_millis(),
                    attempt,
                    self.config.max_retries,
                    err
                );
            }

            sleep(delay).await;
        }
    }
}
