//! Configuration handling for a crawl run.
//!
//! Everything is read from environment variables with development defaults,
//! mirroring how the binary is deployed. `Config::from_env` validates numeric
//! and URL values up front so a typo fails the run before any request is sent.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::crawler::WorkerConfig;
use crate::entities::{EntityTarget, RecordId, RegionCategory};
use crate::fetcher::FetchConfig;
use crate::normalize::{REGIONS, lookup_region};

/// Environment variable names.
pub const ENV_BASE_URL: &str = "CRAWL_BASE_URL";
pub const ENV_FORM_PATH: &str = "CRAWL_FORM_PATH";
pub const ENV_RESULTS_PATH: &str = "CRAWL_RESULTS_PATH";
pub const ENV_DETAIL_PATH: &str = "CRAWL_DETAIL_PATH";
pub const ENV_PAGE_PARAM: &str = "CRAWL_PAGE_PARAM";
pub const ENV_FILTER_PARAM: &str = "CRAWL_FILTER_PARAM";
pub const ENV_ID_PARAM: &str = "CRAWL_ID_PARAM";
pub const ENV_UNFILTERED_THRESHOLD: &str = "CRAWL_UNFILTERED_THRESHOLD";
pub const ENV_PROBE_FORM: &str = "CRAWL_PROBE_FORM";
pub const ENV_PAGINATE: &str = "CRAWL_PAGINATE";
pub const ENV_REGION_PRECEDENCE: &str = "CRAWL_REGION_PRECEDENCE";
pub const ENV_TARGETS: &str = "CRAWL_TARGETS";
pub const ENV_INCLUDE_SPECIAL: &str = "CRAWL_INCLUDE_SPECIAL";
pub const ENV_SEED_URLS: &str = "CRAWL_SEED_URLS";
pub const ENV_CONCURRENCY: &str = "CRAWL_CONCURRENCY";
pub const ENV_MAX_TASKS: &str = "CRAWL_MAX_TASKS";
pub const ENV_DELAY_MS: &str = "CRAWL_DELAY_MS";
pub const ENV_MAX_RETRIES: &str = "CRAWL_MAX_RETRIES";
pub const ENV_BACKOFF_MS: &str = "CRAWL_BACKOFF_MS";

const ALL_ENV_VARS: &[&str] = &[
    ENV_BASE_URL,
    ENV_FORM_PATH,
    ENV_RESULTS_PATH,
    ENV_DETAIL_PATH,
    ENV_PAGE_PARAM,
    ENV_FILTER_PARAM,
    ENV_ID_PARAM,
    ENV_UNFILTERED_THRESHOLD,
    ENV_PROBE_FORM,
    ENV_PAGINATE,
    ENV_REGION_PRECEDENCE,
    ENV_TARGETS,
    ENV_INCLUDE_SPECIAL,
    ENV_SEED_URLS,
    ENV_CONCURRENCY,
    ENV_MAX_TASKS,
    ENV_DELAY_MS,
    ENV_MAX_RETRIES,
    ENV_BACKOFF_MS,
];

/// Default development values used when environment variables are absent.
const DEFAULT_BASE_URL: &str = "https://www.nsr.org.my";
const DEFAULT_FORM_PATH: &str = "/search.asp";
const DEFAULT_RESULTS_PATH: &str = "/results.asp";
const DEFAULT_DETAIL_PATH: &str = "/details.asp";
const DEFAULT_PAGE_PARAM: &str = "page";
const DEFAULT_FILTER_PARAM: &str = "state";
const DEFAULT_ID_PARAM: &str = "id";
const DEFAULT_UNFILTERED_THRESHOLD: u32 = 1000;

/// Shape of the source site: where its documents live and how its URLs are parameterised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub base_url: Url,
    pub form_path: String,
    pub results_path: String,
    pub detail_path: String,
    pub page_param: String,
    pub filter_param: String,
    pub id_param: String,
    /// Page numbers at or above this belong to the unfiltered listing.
    pub unfiltered_threshold: u32,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::for_base(Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"))
    }
}

impl SiteConfig {
    /// Defaults anchored at another origin (tests point this at a mock server).
    pub fn for_base(base_url: Url) -> Self {
        Self {
            base_url,
            form_path: DEFAULT_FORM_PATH.to_string(),
            results_path: DEFAULT_RESULTS_PATH.to_string(),
            detail_path: DEFAULT_DETAIL_PATH.to_string(),
            page_param: DEFAULT_PAGE_PARAM.to_string(),
            filter_param: DEFAULT_FILTER_PARAM.to_string(),
            id_param: DEFAULT_ID_PARAM.to_string(),
            unfiltered_threshold: DEFAULT_UNFILTERED_THRESHOLD,
        }
    }

    fn join(&self, path: &str) -> Url {
        self.base_url
            .join(path)
            .unwrap_or_else(|_| self.base_url.clone())
    }

    pub fn form_url(&self) -> Url {
        self.join(&self.form_path)
    }

    pub fn results_url(&self) -> Url {
        self.join(&self.results_path)
    }

    /// Directly constructed listing query, used when no form is probed.
    pub fn listing_url(&self, filter: Option<&str>, page: u32) -> Url {
        let mut url = self.results_url();
        {
            let mut query = url.query_pairs_mut();
            if let Some(filter) = filter {
                query.append_pair(&self.filter_param, filter);
            }
            query.append_pair(&self.page_param, &page.to_string());
        }
        url
    }

    /// Canonical detail document for an id.
    pub fn detail_url(&self, id: &RecordId) -> Url {
        let mut url = self.join(&self.detail_path);
        url.query_pairs_mut().append_pair(&self.id_param, id.as_str());
        url
    }
}

/// Which region wins when the address and the listing target disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionPrecedence {
    #[default]
    Address,
    Listing,
}

impl FromStr for RegionPrecedence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "address" => Ok(Self::Address),
            "listing" => Ok(Self::Listing),
            other => Err(format!("expected 'address' or 'listing', got '{other}'")),
        }
    }
}

/// Traversal policy choices the source system left ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlPolicy {
    /// Start each target with a FORM task to capture hidden fields.
    pub probe_form: bool,
    /// Follow pagination past page 1.
    pub paginate: bool,
    pub region_precedence: RegionPrecedence,
}

impl Default for CrawlPolicy {
    fn default() -> Self {
        Self {
            probe_form: true,
            paginate: true,
            region_precedence: RegionPrecedence::Address,
        }
    }
}

/// Application runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub site: SiteConfig,
    pub policy: CrawlPolicy,
    pub worker: WorkerConfig,
    pub fetch: FetchConfig,
    /// Region ids or names; empty means every regular region.
    pub targets: Vec<String>,
    pub include_special: bool,
    /// Listing URLs crawled as-is, bypassing target generation.
    pub seed_urls: Vec<Url>,
}

impl Config {
    /// Load from environment variables, falling back to development defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_url(ENV_BASE_URL, &env_or(ENV_BASE_URL, DEFAULT_BASE_URL))?;

        let site = SiteConfig {
            base_url,
            form_path: env_or(ENV_FORM_PATH, DEFAULT_FORM_PATH),
            results_path: env_or(ENV_RESULTS_PATH, DEFAULT_RESULTS_PATH),
            detail_path: env_or(ENV_DETAIL_PATH, DEFAULT_DETAIL_PATH),
            page_param: env_or(ENV_PAGE_PARAM, DEFAULT_PAGE_PARAM),
            filter_param: env_or(ENV_FILTER_PARAM, DEFAULT_FILTER_PARAM),
            id_param: env_or(ENV_ID_PARAM, DEFAULT_ID_PARAM),
            unfiltered_threshold: parse_env(ENV_UNFILTERED_THRESHOLD, DEFAULT_UNFILTERED_THRESHOLD)?,
        };
        if site.unfiltered_threshold < 2 {
            return Err(ConfigError::InvalidValue {
                field: ENV_UNFILTERED_THRESHOLD,
                reason: "must be at least 2".to_string(),
            });
        }

        let policy = CrawlPolicy {
            probe_form: parse_bool(ENV_PROBE_FORM, true)?,
            paginate: parse_bool(ENV_PAGINATE, true)?,
            region_precedence: parse_env(ENV_REGION_PRECEDENCE, RegionPrecedence::Address)?,
        };

        let worker_defaults = WorkerConfig::default();
        let max_tasks: usize = parse_env(ENV_MAX_TASKS, 0)?;
        let worker = WorkerConfig {
            concurrency: parse_env(ENV_CONCURRENCY, worker_defaults.concurrency)?,
            max_tasks: (max_tasks > 0).then_some(max_tasks),
        };
        if worker.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: ENV_CONCURRENCY,
                reason: "must be at least 1".to_string(),
            });
        }

        let fetch_defaults = FetchConfig::default();
        let fetch = FetchConfig {
            domain_delay_ms: parse_env(ENV_DELAY_MS, fetch_defaults.domain_delay_ms)?,
            max_retries: parse_env(ENV_MAX_RETRIES, fetch_defaults.max_retries)?,
            base_backoff_ms: parse_env(ENV_BACKOFF_MS, fetch_defaults.base_backoff_ms)?,
        };

        let seed_urls = split_list(&env_or(ENV_SEED_URLS, ""))
            .iter()
            .map(|raw| parse_url(ENV_SEED_URLS, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            site,
            policy,
            worker,
            fetch,
            targets: split_list(&env_or(ENV_TARGETS, "")),
            include_special: parse_bool(ENV_INCLUDE_SPECIAL, false)?,
            seed_urls,
        })
    }

    /// Development defaults (mirrors `from_env` with no env overrides).
    pub fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            policy: CrawlPolicy::default(),
            worker: WorkerConfig::default(),
            fetch: FetchConfig::default(),
            targets: Vec::new(),
            include_special: false,
            seed_urls: Vec::new(),
        }
    }

    /// The EntityTargets this run crawls.
    ///
    /// Special regions are only included when named explicitly or when
    /// `include_special` is set.
    pub fn resolve_targets(&self) -> Result<Vec<EntityTarget>, ConfigError> {
        let regions = if self.targets.is_empty() {
            REGIONS
                .iter()
                .filter(|region| {
                    region.category == RegionCategory::Regular
                        || (self.include_special && region.category == RegionCategory::Special)
                })
                .collect::<Vec<_>>()
        } else {
            self.targets
                .iter()
                .map(|key| {
                    lookup_region(key).ok_or_else(|| ConfigError::InvalidValue {
                        field: ENV_TARGETS,
                        reason: format!("unknown region '{key}'"),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(regions
            .into_iter()
            .map(|region| EntityTarget::new(region.id, region.name, region.category))
            .collect())
    }
}

/// Errors that can occur while building a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    field: key,
                    reason: e.to_string(),
                })
        }
        _ => Ok(default),
    }
}

fn parse_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                field: key,
                reason: format!("expected a boolean, got '{other}'"),
            }),
        },
        Err(_) => Ok(default),
    }
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidValue {
        field: key,
        reason: e.to_string(),
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
