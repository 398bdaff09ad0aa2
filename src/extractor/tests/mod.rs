use chrono::NaiveDate;
use scraper::Html;
use std::fs;
use url::Url;

use crate::config::SiteConfig;
use crate::entities::{Gender, RegionCategory};
use crate::extractor::{
    ResultsProbe, extract_form_fields, form_target, parse_listing, parse_profile, probe_results,
};
use crate::normalize::parse_id;

fn fixture(name: &str) -> Html {
    let html = fs::read_to_string(format!("src/extractor/tests/fixtures/{name}"))
        .expect("Failed to read test fixture");
    Html::parse_document(&html)
}

fn site() -> SiteConfig {
    SiteConfig::default()
}

#[test]
fn test_search_form_fields() {
    let document = fixture("search_form.html");
    let fields = extract_form_fields(&document);

    assert_eq!(fields.get("token"), Some("abc"));
    assert_eq!(fields.get("__VIEWSTATE"), Some(""));
    assert_eq!(fields.get("txtName"), Some(""));
    // No option selected: the first option's value.
    assert_eq!(fields.get("state"), Some(""));
    assert_eq!(fields.get("speciality"), Some("ALL"));
    assert_eq!(fields.get("active"), Some("on"));
    assert_eq!(fields.get("retired"), None);
    assert_eq!(fields.get("sort"), Some("name"));
    assert_eq!(fields.get("btnSearch"), None);

    let names: Vec<_> = fields.pairs().iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec!["token", "__VIEWSTATE", "txtName", "state", "speciality", "active", "sort"]
    );
}

#[test]
fn test_search_form_target() {
    let document = fixture("search_form.html");
    let page = Url::parse("https://www.nsr.org.my/search.asp").unwrap();
    let target = form_target(&document, &page).unwrap();

    assert!(target.is_post);
    assert_eq!(target.action.as_str(), "https://www.nsr.org.my/results.asp");
}

#[test]
fn test_listing_page() {
    let document = fixture("listing_page1.html");
    let page = Url::parse("https://www.nsr.org.my/results.asp?state=01&page=1").unwrap();
    let stubs = parse_listing(&document, &page, &site());

    assert_eq!(probe_results(&document), ResultsProbe::Rows(3));
    assert_eq!(stubs.len(), 2);
    assert_eq!(stubs[0].id.as_str(), "100001");
    assert_eq!(stubs[1].name, "Dr. Siti Aminah binti Hassan");
    assert_eq!(
        stubs[1].detail_url.as_str(),
        "https://www.nsr.org.my/details.asp?id=100002"
    );
}

#[test]
fn test_empty_listing_page() {
    let document = fixture("listing_empty.html");
    let page = Url::parse("https://www.nsr.org.my/results.asp?state=01&page=2").unwrap();

    assert_eq!(probe_results(&document), ResultsProbe::NoRecords);
    assert!(parse_listing(&document, &page, &site()).is_empty());
}

#[test]
fn test_profile_page() {
    let document = fixture("profile.html");
    let record = parse_profile(&document, parse_id("100001").unwrap(), &site());

    assert_eq!(record.id.as_str(), "100001");
    assert_eq!(record.title.as_deref(), Some("Dato' Dr."));
    assert_eq!(record.name.as_deref(), Some("Tan Ah Kow"));
    assert_eq!(record.gender, Some(Gender::Male));
    assert_eq!(record.specialty.as_deref(), Some("Cardiology"));
    assert_eq!(record.renewal_date, NaiveDate::from_ymd_opt(2023, 3, 15));

    assert_eq!(
        record.establishment.as_deref(),
        Some("Hospital Sultanah Aminah")
    );
    assert_eq!(record.sector.as_deref(), Some("Public"));
    assert_eq!(record.city.as_deref(), Some("Johor Bahru"));
    let region = record.region.unwrap();
    assert_eq!(region.name, "Johor");
    assert_eq!(region.id, "01");
    assert_eq!(region.category, RegionCategory::Regular);

    assert_eq!(
        record.qualifications,
        vec![
            "MBBS Universiti Malaya 1998",
            "MRCP Royal College of Physicians, UK 2004"
        ]
    );
    assert_eq!(record.qualification_details[1].year, Some(2004));
}

#[test]
fn test_profile_with_mismatched_id_takes_page_id() {
    let document = fixture("profile.html");
    let record = parse_profile(&document, parse_id("999999").unwrap(), &site());
    assert_eq!(record.id.as_str(), "100001");
}

#[cfg(feature = "fuzz")]
mod fuzz {
    use super::*;
    use crate::normalize::is_valid_id;
    use crate::pagination::{PageContext, Paginator, page_number, query_value};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_id_validity_counts_digits(raw in ".{0,24}") {
            let digits = raw.chars().filter(char::is_ascii_digit).count();
            prop_assert_eq!(is_valid_id(&raw), digits >= 6);
        }

        #[test]
        fn test_parsers_never_panic(html in ".*") {
            let document = Html::parse_document(&html);
            let page = Url::parse("https://www.nsr.org.my/results.asp?state=01&page=1").unwrap();
            let _ = extract_form_fields(&document);
            let _ = parse_listing(&document, &page, &site());
            let _ = parse_profile(&document, parse_id("100001").unwrap(), &site());
        }

        #[test]
        fn test_next_page_is_forward_bounded_and_filtered(
            current in 1u32..1200,
            pages in proptest::collection::vec(0u32..1500, 0..8),
            filters in proptest::collection::vec(prop_oneof!["01", "02", ""], 0..8),
            label_next in any::<bool>(),
        ) {
            let links: String = pages
                .iter()
                .zip(filters.iter().chain(std::iter::repeat(&"01".to_string())))
                .map(|(page, filter)| {
                    let text = if label_next { "Next".to_string() } else { page.to_string() };
                    format!(r#"<a href="results.asp?state={filter}&amp;page={page}">{text}</a>"#)
                })
                .collect();
            let document = Html::parse_document(&format!("<p>Page {current} of 1500</p>{links}"));
            let url = Url::parse(&format!("https://www.nsr.org.my/results.asp?state=01&page={current}")).unwrap();
            let site = site();

            let discovery = Paginator::new(&site).discover(PageContext {
                document: &document,
                url: &url,
                current_page: current,
                filter: Some("01"),
            });

            if let Some(next) = discovery.next() {
                prop_assert!(next.page > current);
                prop_assert!(next.page < site.unfiltered_threshold);
                prop_assert_eq!(page_number(&next.url, "page"), Some(next.page));
                prop_assert_eq!(query_value(&next.url, "state").as_deref(), Some("01"));
            }
        }
    }
}
