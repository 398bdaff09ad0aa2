use scraper::Html;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::task::{CrawlTask, RequestMethod, TaskKind};
use crate::config::{CrawlPolicy, RegionPrecedence, SiteConfig};
use crate::entities::{EntityStub, EntityTarget, Record, RecordId, RegionCategory, RegionRef};
use crate::extractor::{
    ProfileFields, ResultsProbe, ensure_region, extract_form_fields, form_target, parse_listing,
    parse_profile, probe_results,
};
use crate::fetcher::PageResponse;
use crate::normalize::lookup_region;
use crate::pagination::{Continuation, EndReason, PageContext, Paginator, set_query_param};

/// What a completed LISTING task found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingSummary {
    pub page: u32,
    pub probe: ResultsProbe,
    pub stubs: usize,
    /// Rows dropped because their id failed validation.
    pub dropped_rows: usize,
    /// Set when this page ends the target's walk.
    pub end: Option<EndReason>,
}

/// Result of advancing the machine by one fetched document.
#[derive(Debug, Default)]
pub struct Outcome {
    pub follow_ups: Vec<CrawlTask>,
    pub record: Option<Record>,
    pub listing: Option<ListingSummary>,
}

/// Per-task transitions: FORM → LISTING(1) → LISTING(n+1), each listing
/// page fanning out DETAIL tasks.
#[derive(Debug, Clone)]
pub struct CrawlMachine {
    site: SiteConfig,
    policy: CrawlPolicy,
}

impl CrawlMachine {
    pub fn new(site: SiteConfig, policy: CrawlPolicy) -> Self {
        Self { site, policy }
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    /// First task for a target: the search form when probing, otherwise a
    /// directly constructed LISTING(1).
    pub fn initial_task(&self, target: Arc<EntityTarget>) -> CrawlTask {
        if self.policy.probe_form {
            return CrawlTask::form(target, self.site.form_url());
        }
        let url = self.site.listing_url(Some(&target.key), 1);
        CrawlTask::listing(target, 1, url, RequestMethod::Get)
    }

    /// LISTING(1) for a seed URL, under an ad hoc target keyed by the URL.
    pub fn seed_task(&self, url: Url) -> CrawlTask {
        let target = Arc::new(EntityTarget::new(
            url.as_str(),
            url.as_str(),
            RegionCategory::Missing,
        ));
        CrawlTask::listing(target, 1, url, RequestMethod::Get)
    }

    pub fn initial_tasks(&self, targets: &[EntityTarget], seeds: &[Url]) -> Vec<CrawlTask> {
        targets
            .iter()
            .map(|target| self.initial_task(Arc::new(target.clone())))
            .chain(seeds.iter().map(|url| self.seed_task(url.clone())))
            .collect()
    }

    pub fn advance(&self, task: &CrawlTask, page: &PageResponse) -> Outcome {
        let document = Html::parse_document(&page.body_utf8);
        match &task.kind {
            TaskKind::Form { target } => self.after_form(target, &document, page),
            TaskKind::Listing { target, page: index } => {
                self.after_listing(target, *index, &document, page)
            }
            TaskKind::Detail { target, id, stub } => Outcome {
                record: Some(self.after_detail(target, id, stub.as_deref(), &document)),
                ..Outcome::default()
            },
        }
    }

    fn after_form(&self, target: &Arc<EntityTarget>, document: &Html, page: &PageResponse) -> Outcome {
        let Some(form) = form_target(document, &page.url_final) else {
            warn!(target_key = %target.key, "No search form found, constructing the listing query");
            let url = self.site.listing_url(Some(&target.key), 1);
            return Outcome {
                follow_ups: vec![CrawlTask::listing(target.clone(), 1, url, RequestMethod::Get)],
                ..Outcome::default()
            };
        };

        let mut fields = extract_form_fields(document);
        fields.set(&self.site.filter_param, target.key.as_str());
        debug!(target_key = %target.key, fields = fields.len(), "Captured search form");

        let listing = if form.is_post {
            CrawlTask::listing(target.clone(), 1, form.action, RequestMethod::FormPost(fields))
        } else {
            let mut url = form.action;
            for (name, value) in fields.pairs() {
                url = set_query_param(&url, name, value);
            }
            CrawlTask::listing(target.clone(), 1, url, RequestMethod::Get)
        };

        Outcome {
            follow_ups: vec![listing],
            ..Outcome::default()
        }
    }

    fn after_listing(
        &self,
        target: &Arc<EntityTarget>,
        index: u32,
        document: &Html,
        page: &PageResponse,
    ) -> Outcome {
        let probe = probe_results(document);
        if probe == ResultsProbe::Unrecognized {
            warn!(
                target_key = %target.key,
                page = index,
                "No results table and no no-records phrase, treating as empty"
            );
        }

        let stubs = parse_listing(document, &page.url_final, &self.site);
        let dropped_rows = match probe {
            ResultsProbe::Rows(rows) => rows.saturating_sub(stubs.len()),
            _ => 0,
        };
        let stub_count = stubs.len();
        let mut follow_ups: Vec<CrawlTask> = stubs
            .into_iter()
            .map(|stub| CrawlTask::from_stub(target.clone(), stub))
            .collect();

        let end = if !self.policy.paginate {
            Some(EndReason::Disabled)
        } else if !probe.has_results() {
            Some(EndReason::EmptyPage)
        } else {
            let filter = target.region().map(|_| target.key.as_str());
            let discovery = Paginator::new(&self.site).discover(PageContext {
                document,
                url: &page.url_final,
                current_page: index,
                filter,
            });
            match discovery.continuation {
                Continuation::Next(next) => {
                    debug!(
                        target_key = %target.key,
                        page = next.page,
                        strategy = %next.strategy,
                        total_pages = discovery.state.total_pages,
                        "Following next page"
                    );
                    follow_ups.push(CrawlTask::listing(
                        target.clone(),
                        next.page,
                        next.url,
                        RequestMethod::Get,
                    ));
                    None
                }
                Continuation::End(reason) => Some(reason),
            }
        };

        if let Some(reason) = end {
            info!(target_key = %target.key, page = index, ?reason, "Pagination finished");
        }

        Outcome {
            follow_ups,
            record: None,
            listing: Some(ListingSummary {
                page: index,
                probe,
                stubs: stub_count,
                dropped_rows,
                end,
            }),
        }
    }

    fn after_detail(
        &self,
        target: &EntityTarget,
        id: &RecordId,
        stub: Option<&EntityStub>,
        document: &Html,
    ) -> Record {
        let mut record = parse_profile(document, id.clone(), &self.site);
        if let Some(stub) = stub {
            ProfileFields::from_stub(stub).apply_to(&mut record);
        }

        let listing_region = target.region().or_else(|| {
            stub.and_then(|stub| stub.location_text.as_deref())
                .and_then(lookup_region)
                .map(|region| region.to_ref())
        });
        self.reconcile_region(&mut record, listing_region);
        record
    }

    fn reconcile_region(&self, record: &mut Record, listing: Option<RegionRef>) {
        ensure_region(record);
        let Some(listing) = listing else {
            return;
        };

        match self.policy.region_precedence {
            RegionPrecedence::Address => match &record.region {
                Some(derived) if derived.is_known() => {
                    if derived.id != listing.id {
                        debug!(
                            id = %record.id,
                            address = %derived.name,
                            listing = %listing.name,
                            "Address region disagrees with listing, keeping address"
                        );
                    }
                }
                _ => record.region = Some(listing),
            },
            RegionPrecedence::Listing => {
                if record.region.as_ref().is_some_and(|derived| derived.id != listing.id) {
                    debug!(id = %record.id, listing = %listing.name, "Listing region overrides address");
                }
                record.region = Some(listing);
            }
        }
    }
}
