//! Table and text helpers shared by the document parsers.

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

use crate::normalize::clean_text;

pub(crate) static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
pub(crate) static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
pub(crate) static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Text of an element with whitespace collapsed. Inline markup does not split words.
pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

/// Text of an element with every text node separated, so adjacent cells stay apart.
pub fn spaced_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Whole-document text, from `<body>` when present.
pub fn document_text(document: &Html) -> String {
    match document.select(&BODY).next() {
        Some(body) => spaced_text(body),
        None => spaced_text(document.root_element()),
    }
}

fn nearest_table_is(row: ElementRef<'_>, table: ElementRef<'_>) -> bool {
    let mut cursor = row.parent();
    while let Some(node) = cursor {
        if let Some(element) = ElementRef::wrap(node)
            && element.value().name() == "table"
        {
            return element.id() == table.id();
        }
        cursor = node.parent();
    }
    false
}

/// Rows that belong to `table` itself, skipping rows of nested tables.
pub fn own_rows<'a>(table: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    table
        .select(&ROW)
        .filter(|row| nearest_table_is(*row, table))
        .collect()
}

/// `td`/`th` children of a row.
pub fn row_cells<'a>(row: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .collect()
}

pub fn has_nested_table(table: ElementRef<'_>) -> bool {
    table
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|element| element.value().name() == "table")
}

/// Resolve an `href` against the page it came from. Script, mail and
/// fragment-only links resolve to nothing.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    let lower = href.to_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
    {
        return None;
    }
    base.join(href).ok()
}

/// True if an attribute value mentions any of `needles`, case-insensitively.
pub fn attr_mentions(element: ElementRef<'_>, attr: &str, needles: &[&str]) -> bool {
    element.value().attr(attr).is_some_and(|value| {
        let value = value.to_lowercase();
        needles.iter().any(|needle| value.contains(needle))
    })
}
