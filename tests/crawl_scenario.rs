mod helpers;

use std::sync::Arc;
use url::Url;

use nsr_crawler::config::{Config, CrawlPolicy, SiteConfig};
use nsr_crawler::crawler::{CrawlReport, WorkerConfig, crawl};
use nsr_crawler::frontier::RequestMethod;
use nsr_crawler::pagination::EndReason;
use nsr_crawler::sink::{MemorySink, RecordSink};

use helpers::{ScriptedFetcher, fixture};

const BASE: &str = "https://nsr.test/";

const SEARCH_FORM: &str = r#"<html><body>
    <form method="post" action="results.asp">
      <input type="hidden" name="token" value="abc">
      <select name="state"><option value="">All</option><option value="01">Johor</option></select>
      <input type="submit" value="Search">
    </form></body></html>"#;

const SIMPLE_PROFILE: &str = r#"<html><body>
    <table border="1"><tr><td>Personal Data</td></tr>
      <tr><td>Name</td><td>Siti Aminah binti Hassan</td></tr>
      <tr><td>Gender</td><td>Female</td></tr></table>
    </body></html>"#;

fn config(probe_form: bool, max_tasks: Option<usize>) -> Config {
    let mut config = Config::default();
    config.site = SiteConfig::for_base(Url::parse(BASE).unwrap());
    config.policy = CrawlPolicy {
        probe_form,
        ..CrawlPolicy::default()
    };
    config.worker = WorkerConfig {
        concurrency: 2,
        max_tasks,
    };
    config.targets = vec!["01".to_string()];
    config
}

fn listing_rows(ids: &[&str], next_page: Option<u32>) -> String {
    let rows: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<tr><td>{id}</td><td><a href="details.asp?id={id}">Dr. {id}</a></td><td>Dr.</td><td>Male</td><td>Johor</td></tr>"#
            )
        })
        .collect();
    let next = next_page
        .map(|page| format!(r#"<a href="results.asp?state=01&amp;page={page}">Next</a>"#))
        .unwrap_or_default();
    format!(
        r#"<html><body><table id="results">
           <tr class="header"><td>NSR No</td><td>Name</td><td>Title</td><td>Gender</td><td>State</td></tr>
           {rows}</table>{next}</body></html>"#
    )
}

async fn run(config: &Config, fetcher: Arc<ScriptedFetcher>) -> (CrawlReport, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let report = crawl(config, fetcher, sink.clone()).await.unwrap();
    (report, sink)
}

#[tokio::test]
async fn form_listing_detail_walk_terminates_after_empty_page() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page("https://nsr.test/search.asp", SEARCH_FORM)
            .page("https://nsr.test/results.asp", fixture("listing_page1.html"))
            .page(
                "https://nsr.test/results.asp?state=01&page=2",
                fixture("listing_empty.html"),
            )
            .page("https://nsr.test/details.asp?id=100001", fixture("profile.html"))
            .page("https://nsr.test/details.asp?id=100002", SIMPLE_PROFILE),
    );

    let (report, sink) = run(&config(true, None), fetcher.clone()).await;

    let keys = fetcher.requested_keys();
    let details: Vec<_> = keys.iter().filter(|k| k.starts_with("detail:")).collect();
    assert_eq!(details.len(), 2);
    assert!(keys.contains(&"form:01".to_string()));
    assert!(keys.contains(&"listing:01:1".to_string()));
    assert!(keys.contains(&"listing:01:2".to_string()));
    assert!(!keys.contains(&"listing:01:3".to_string()));
    assert_eq!(keys.len(), 5);

    // The first listing is the form submission, carrying the hidden token.
    let listing = fetcher
        .requests()
        .into_iter()
        .find(|task| task.dedup_key == "listing:01:1")
        .unwrap();
    let RequestMethod::FormPost(fields) = listing.method else {
        panic!("expected the first listing to be posted");
    };
    assert_eq!(fields.get("token"), Some("abc"));
    assert_eq!(fields.get("state"), Some("01"));

    let records = sink.get_all().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name.as_deref(), Some("Tan Ah Kow"));
    assert_eq!(records[0].city.as_deref(), Some("Johor Bahru"));
    assert_eq!(records[1].name.as_deref(), Some("Siti Aminah binti Hassan"));
    assert_eq!(records[1].region.as_ref().unwrap().name, "Johor");

    let johor = &report.targets["01"];
    assert_eq!(johor.listing_pages, 2);
    assert_eq!(johor.detail_tasks, 2);
    assert_eq!(johor.end, Some(EndReason::EmptyPage));
    assert_eq!(report.stubs_dropped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.records_emitted, 2);
}

#[tokio::test]
async fn overlapping_pages_yield_one_record_per_id() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(
                "https://nsr.test/results.asp?state=01&page=1",
                listing_rows(&["100001", "100002"], Some(2)),
            )
            .page(
                "https://nsr.test/results.asp?state=01&page=2",
                listing_rows(&["100002", "100003"], None),
            )
            .page("https://nsr.test/details.asp?id=100001", SIMPLE_PROFILE)
            .page("https://nsr.test/details.asp?id=100002", SIMPLE_PROFILE)
            .page("https://nsr.test/details.asp?id=100003", SIMPLE_PROFILE),
    );

    let (report, sink) = run(&config(false, None), fetcher.clone()).await;

    let keys = fetcher.requested_keys();
    assert_eq!(keys.iter().filter(|k| *k == "detail:100002").count(), 1);
    assert_eq!(report.duplicates_skipped, 1);
    assert_eq!(sink.len(), 3);
    assert_eq!(report.targets["01"].end, Some(EndReason::NoSignal));
}

#[tokio::test]
async fn failed_detail_does_not_abort_the_run() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(
                "https://nsr.test/results.asp?state=01&page=1",
                listing_rows(&["100001", "100002", "100003"], None),
            )
            .page("https://nsr.test/details.asp?id=100001", SIMPLE_PROFILE)
            .failing("https://nsr.test/details.asp?id=100002", 403)
            .failing("https://nsr.test/details.asp?id=100003", 429),
    );

    let (report, sink) = run(&config(false, None), fetcher).await;

    assert_eq!(report.failed, 2);
    assert_eq!(report.bot_detected, 2);
    assert_eq!(report.targets["01"].failures, 2);
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn task_ceiling_stops_admission() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(
                "https://nsr.test/results.asp?state=01&page=1",
                listing_rows(&["100001", "100002"], Some(2)),
            )
            .page("https://nsr.test/details.asp?id=100001", SIMPLE_PROFILE)
            .page("https://nsr.test/details.asp?id=100002", SIMPLE_PROFILE),
    );

    let (report, sink) = run(&config(false, Some(2)), fetcher.clone()).await;

    assert_eq!(
        fetcher.requested_keys(),
        vec!["listing:01:1".to_string(), "detail:100001".to_string()]
    );
    assert_eq!(report.refused, 2);
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn seed_urls_bypass_targets() {
    let mut config = config(true, None);
    config.targets.clear();
    config.seed_urls = vec![Url::parse("https://nsr.test/results.asp?page=1").unwrap()];

    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(
                "https://nsr.test/results.asp?page=1",
                listing_rows(&["100001"], None),
            )
            .page("https://nsr.test/details.asp?id=100001", SIMPLE_PROFILE),
    );

    let (report, sink) = run(&config, fetcher.clone()).await;

    assert!(!fetcher.requested_keys().iter().any(|k| k.starts_with("form:")));
    assert_eq!(report.records_emitted, 1);
    // The listing row names the state, so the record still gets a region.
    let record = sink.get_all().await.unwrap().remove(0);
    assert_eq!(record.region.unwrap().name, "Johor");
}
