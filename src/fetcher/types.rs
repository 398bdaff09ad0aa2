use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use url::Url;

/// A fetched document, decoded to UTF-8.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub url_final: Url,
    pub status: StatusCode,
    pub body_utf8: String,
    /// Name of the encoding the body was decoded from.
    pub charset: &'static str,
    pub fetched_at: DateTime<Utc>,
}

impl PageResponse {
    /// An already-decoded HTML document, as produced by scripted fetchers.
    pub fn html(url_final: Url, body: impl Into<String>) -> Self {
        Self {
            url_final,
            status: StatusCode::OK,
            body_utf8: body.into(),
            charset: encoding_rs::UTF_8.name(),
            fetched_at: Utc::now(),
        }
    }
}
