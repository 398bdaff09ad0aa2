use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::entities::{EntityStub, EntityTarget, RecordId};
use crate::extractor::FormFieldSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    /// urlencoded form submission
    FormPost(FormFieldSet),
}

/// Kind-specific task context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    Form {
        target: Arc<EntityTarget>,
    },
    Listing {
        target: Arc<EntityTarget>,
        /// 1-based.
        page: u32,
    },
    Detail {
        target: Arc<EntityTarget>,
        id: RecordId,
        /// The listing row that scheduled this task, when there was one.
        stub: Option<Box<EntityStub>>,
    },
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Form { .. } => "form",
            Self::Listing { .. } => "listing",
            Self::Detail { .. } => "detail",
        }
    }

    pub fn target(&self) -> &Arc<EntityTarget> {
        match self {
            Self::Form { target } | Self::Listing { target, .. } | Self::Detail { target, .. } => {
                target
            }
        }
    }
}

/// One fetch-and-parse unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: Url,
    pub method: RequestMethod,
    pub kind: TaskKind,
    /// Unique across the run.
    pub dedup_key: String,
}

impl CrawlTask {
    pub fn form(target: Arc<EntityTarget>, url: Url) -> Self {
        Self {
            dedup_key: format!("form:{}", target.key),
            url,
            method: RequestMethod::Get,
            kind: TaskKind::Form { target },
        }
    }

    pub fn listing(target: Arc<EntityTarget>, page: u32, url: Url, method: RequestMethod) -> Self {
        Self {
            dedup_key: format!("listing:{}:{}", target.key, page),
            url,
            method,
            kind: TaskKind::Listing { target, page },
        }
    }

    /// Keyed by id alone so any two routes to the same record collide.
    pub fn detail(target: Arc<EntityTarget>, id: RecordId, url: Url, stub: Option<EntityStub>) -> Self {
        Self {
            dedup_key: format!("detail:{id}"),
            url,
            method: RequestMethod::Get,
            kind: TaskKind::Detail {
                target,
                id,
                stub: stub.map(Box::new),
            },
        }
    }

    pub fn from_stub(target: Arc<EntityTarget>, stub: EntityStub) -> Self {
        let url = stub.detail_url.clone();
        let id = stub.id.clone();
        Self::detail(target, id, url, Some(stub))
    }

    pub fn target(&self) -> &Arc<EntityTarget> {
        self.kind.target()
    }
}

impl fmt::Display for CrawlTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.dedup_key, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::RegionCategory;
    use crate::normalize::parse_id;

    fn johor() -> Arc<EntityTarget> {
        Arc::new(EntityTarget::new("01", "Johor", RegionCategory::Regular))
    }

    #[test]
    fn dedup_keys_follow_kind_target_and_page() {
        let url = Url::parse("https://x.test/results.asp").unwrap();
        assert_eq!(CrawlTask::form(johor(), url.clone()).dedup_key, "form:01");
        assert_eq!(
            CrawlTask::listing(johor(), 2, url, RequestMethod::Get).dedup_key,
            "listing:01:2"
        );
    }

    #[test]
    fn detail_keys_ignore_target_and_url() {
        let id = parse_id("NSR 004821").unwrap();
        let a = CrawlTask::detail(
            johor(),
            id.clone(),
            Url::parse("https://x.test/details.asp?id=004821").unwrap(),
            None,
        );
        let b = CrawlTask::detail(
            Arc::new(EntityTarget::new("02", "Kedah", RegionCategory::Regular)),
            id,
            Url::parse("https://x.test/profile.asp?nsr=4821").unwrap(),
            None,
        );
        assert_eq!(a.dedup_key, b.dedup_key);
        assert_eq!(a.kind.label(), "detail");
    }
}
