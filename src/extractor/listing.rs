use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

use super::html::{
    LINK, attr_mentions, document_text, element_text, has_nested_table, own_rows,
    resolve_href, row_cells,
};
use crate::config::SiteConfig;
use crate::entities::EntityStub;
use crate::normalize::{non_empty, parse_id};

/// Columns a result row needs: id, name, title, gender.
pub const MIN_COLUMNS: usize = 4;

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());

/// Phrases the directory prints instead of an empty table, English and Malay.
static NO_RECORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:no records? (?:were )?found|no matching records|no results found|0 records found|tiada rekod|rekod tidak dijumpai|tiada maklumat|tiada keputusan|carian tidak dijumpai)\b",
    )
    .unwrap()
});

const HEADER_MARKERS: &[&str] = &["header", "head", "section", "title"];

/// What a results document says about its result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsProbe {
    /// The results table has this many non-header data rows.
    Rows(usize),
    /// No data rows, and the page says so.
    NoRecords,
    /// No data rows and no "no records" phrase either.
    Unrecognized,
}

impl ResultsProbe {
    pub fn has_results(&self) -> bool {
        matches!(self, Self::Rows(n) if *n > 0)
    }
}

fn is_header_row(row: ElementRef<'_>, cells: &[ElementRef<'_>]) -> bool {
    let in_thead = row
        .parent()
        .and_then(ElementRef::wrap)
        .is_some_and(|parent| parent.value().name() == "thead");

    in_thead
        || attr_mentions(row, "class", HEADER_MARKERS)
        || attr_mentions(row, "id", HEADER_MARKERS)
        || (!cells.is_empty() && cells.iter().all(|cell| cell.value().name() == "th"))
}

/// Data rows of a table: not header/section rows, wide enough to hold a result.
fn data_rows<'a>(table: ElementRef<'a>) -> Vec<(ElementRef<'a>, Vec<ElementRef<'a>>)> {
    own_rows(table)
        .into_iter()
        .map(|row| (row, row_cells(row)))
        .filter(|(row, cells)| !is_header_row(*row, cells) && cells.len() >= MIN_COLUMNS)
        .collect()
}

/// The results table: among tables that hold no nested tables (layout
/// wrappers do), the one with the most data rows; "result"-named tables win ties.
pub fn find_results_table(document: &Html) -> Option<ElementRef<'_>> {
    let mut best: Option<((usize, bool), ElementRef<'_>)> = None;

    for table in document.select(&TABLE) {
        if has_nested_table(table) {
            continue;
        }
        let named = attr_mentions(table, "id", &["result"])
            || attr_mentions(table, "class", &["result"]);
        let score = (data_rows(table).len(), named);
        if score.0 == 0 && !named {
            continue;
        }
        // Strictly greater: the earliest table wins a tie.
        if best.as_ref().is_none_or(|(top, _)| score > *top) {
            best = Some((score, table));
        }
    }

    best.map(|(_, table)| table)
}

pub fn probe_results(document: &Html) -> ResultsProbe {
    let rows = find_results_table(document)
        .map(|table| data_rows(table).len())
        .unwrap_or(0);
    if rows > 0 {
        return ResultsProbe::Rows(rows);
    }

    if NO_RECORDS.is_match(&document_text(document)) {
        ResultsProbe::NoRecords
    } else {
        ResultsProbe::Unrecognized
    }
}

/// Extract entity stubs from a results document, in row order.
///
/// Rows are independent: a short row or one whose id fails validation is
/// dropped without affecting the rest of the page.
pub fn parse_listing(document: &Html, page_url: &Url, site: &SiteConfig) -> Vec<EntityStub> {
    let Some(table) = find_results_table(document) else {
        return Vec::new();
    };

    data_rows(table)
        .into_iter()
        .enumerate()
        .filter_map(|(index, (_, cells))| parse_row(index, &cells, page_url, site))
        .collect()
}

fn parse_row(
    index: usize,
    cells: &[ElementRef<'_>],
    page_url: &Url,
    site: &SiteConfig,
) -> Option<EntityStub> {
    let raw_id = element_text(cells[0]);
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(err) => {
            warn!("Dropping listing row {}: {}", index, err);
            return None;
        }
    };

    let name_cell = cells[1];
    let link = name_cell.select(&LINK).next();
    let name = link
        .map(element_text)
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| element_text(name_cell));

    let detail_url = link
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| resolve_href(page_url, href))
        .unwrap_or_else(|| {
            debug!("Row {} has no detail link, using canonical url for {}", index, id);
            site.detail_url(&id)
        });

    let text_at = |offset: usize| cells.get(offset).and_then(|cell| non_empty(&element_text(*cell)));

    Some(EntityStub {
        id,
        name,
        title: text_at(2),
        gender_text: text_at(3),
        location_text: text_at(4),
        category_text: text_at(5),
        detail_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://www.nsr.org.my/results.asp?state=01&page=1").unwrap()
    }

    const THREE_ROWS: &str = r#"
        <html><body>
        <table width="100%"><tr><td><img src="logo.gif"></td></tr></table>
        <table class="results">
          <tr class="tableHeader"><td>NSR No</td><td>Name</td><td>Title</td><td>Gender</td><td>State</td><td>Specialty</td></tr>
          <tr><td>NSR 100001</td><td><a href="details.asp?id=100001">Dr. Tan Ah Kow</a></td><td>Dr.</td><td>Male</td><td>Johor</td><td>Cardiology</td></tr>
          <tr><td>100002</td><td><a href="details.asp?id=100002">Dr. Siti Aminah</a></td><td>Dr.</td><td>Female</td><td>Johor</td><td>Paediatrics</td></tr>
          <tr><td colspan="6">Section: Surgical</td></tr>
          <tr><td>100003</td><td>Dr. Raj Kumar</td><td>Dato' Dr.</td><td>Male</td></tr>
          <tr><td>100004</td><td>Too short</td></tr>
        </table>
        </body></html>"#;

    #[test]
    fn header_row_skipped_three_stubs_in_order() {
        let document = Html::parse_document(THREE_ROWS);
        let stubs = parse_listing(&document, &page_url(), &SiteConfig::default());

        let ids: Vec<_> = stubs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["100001", "100002", "100003"]);
    }

    #[test]
    fn link_text_and_href_used_when_present() {
        let document = Html::parse_document(THREE_ROWS);
        let stubs = parse_listing(&document, &page_url(), &SiteConfig::default());

        assert_eq!(stubs[0].name, "Dr. Tan Ah Kow");
        assert_eq!(
            stubs[0].detail_url.as_str(),
            "https://www.nsr.org.my/details.asp?id=100001"
        );
        assert_eq!(stubs[0].gender_text.as_deref(), Some("Male"));
        assert_eq!(stubs[0].location_text.as_deref(), Some("Johor"));
        assert_eq!(stubs[0].category_text.as_deref(), Some("Cardiology"));
    }

    #[test]
    fn missing_link_falls_back_to_cell_text_and_canonical_url() {
        let document = Html::parse_document(THREE_ROWS);
        let stubs = parse_listing(&document, &page_url(), &SiteConfig::default());

        let raj = &stubs[2];
        assert_eq!(raj.name, "Dr. Raj Kumar");
        assert_eq!(raj.title.as_deref(), Some("Dato' Dr."));
        assert_eq!(raj.location_text, None);
        assert_eq!(
            raj.detail_url.as_str(),
            "https://www.nsr.org.my/details.asp?id=100003"
        );
    }

    #[test]
    fn invalid_ids_are_dropped() {
        let document = Html::parse_document(
            r#"<table>
                 <tr><th>No</th><th>Name</th><th>Title</th><th>Gender</th></tr>
                 <tr><td>12345</td><td>Short Id</td><td>Dr.</td><td>Male</td></tr>
                 <tr><td>654321</td><td>Valid</td><td>Dr.</td><td>Female</td></tr>
               </table>"#,
        );
        let stubs = parse_listing(&document, &page_url(), &SiteConfig::default());
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].id.as_str(), "654321");
    }

    #[test]
    fn thead_rows_are_headers() {
        let document = Html::parse_document(
            r#"<table>
                 <thead><tr><td>No</td><td>Name</td><td>Title</td><td>Gender</td></tr></thead>
                 <tbody><tr><td>654321</td><td>Valid</td><td>Dr.</td><td>Female</td></tr></tbody>
               </table>"#,
        );
        assert_eq!(probe_results(&document), ResultsProbe::Rows(1));
    }

    #[test]
    fn probe_recognizes_no_records_phrases() {
        let english = Html::parse_document(
            "<html><body><table class='results'><tr class='header'><td>No</td></tr></table><p>No records found.</p></body></html>",
        );
        assert_eq!(probe_results(&english), ResultsProbe::NoRecords);

        let malay = Html::parse_document("<html><body><p>Tiada rekod dijumpai</p></body></html>");
        assert_eq!(probe_results(&malay), ResultsProbe::NoRecords);
        assert!(!probe_results(&malay).has_results());
    }

    #[test]
    fn record_counts_are_not_mistaken_for_zero() {
        let counted = Html::parse_document("<html><body><p>20 records found</p></body></html>");
        assert_eq!(probe_results(&counted), ResultsProbe::Unrecognized);

        let zero = Html::parse_document("<html><body><p>Search: 0 records found</p></body></html>");
        assert_eq!(probe_results(&zero), ResultsProbe::NoRecords);
    }

    #[test]
    fn probe_without_any_signal_is_unrecognized() {
        let document = Html::parse_document("<html><body><p>Service unavailable</p></body></html>");
        assert_eq!(probe_results(&document), ResultsProbe::Unrecognized);
        assert!(parse_listing(&document, &page_url(), &SiteConfig::default()).is_empty());
    }
}
