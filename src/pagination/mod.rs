//! Next-page discovery for results documents.
//!
//! Navigation on the directory is inconsistent: some pages carry a "Next"
//! link, some only numbered links, some only a "Page X of Y" summary, and
//! high page numbers leak into an unrelated unfiltered listing. Strategies
//! are tried in order and every candidate passes through [`PageGuard`].

pub mod guard;

pub use guard::{GuardTrip, PageGuard, page_number, query_value, set_query_param};

use regex::Regex;
use scraper::{ElementRef, Html};
use serde::Serialize;
use std::cell::Cell;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use crate::config::SiteConfig;
use crate::extractor::html::{LINK, attr_mentions, document_text, element_text, resolve_href};

/// Link labels meaning "next page", after glyph stripping.
const NEXT_WORDS: &[&str] = &[
    "next",
    "next page",
    "seterusnya",
    "berikutnya",
    "halaman seterusnya",
    "hadapan",
];

const NEXT_GLYPHS: &[&str] = &[">", "›", "»", "→"];

static SUMMARY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:page|halaman|muka\s+surat)\s*(\d{1,5})\s*(?:of|dari|daripada|/)\s*(\d{1,5})\b",
    )
    .unwrap()
});

static BRACKETED_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\[(]?\s*(\d{1,5})\s*[\])]?$").unwrap());

/// Best-effort pagination position of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationState {
    pub current_page: u32,
    /// Defaults to 1 when undetectable.
    pub total_pages: u32,
    pub has_next: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    LabelLink,
    NumberedLink,
    ConstructedUrl,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LabelLink => "label_link",
            Self::NumberedLink => "numbered_link",
            Self::ConstructedUrl => "constructed_url",
        })
    }
}

/// Why a walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The summary control says the current page is the last.
    LastPage,
    /// Candidates existed but the guard refused them all.
    GuardTripped,
    /// Nothing on the page suggests another page.
    NoSignal,
    /// The page had no results, so there is nothing after it.
    EmptyPage,
    /// Pagination is switched off for this run.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPage {
    pub url: Url,
    pub page: u32,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    Next(NextPage),
    End(EndReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub state: PaginationState,
    pub continuation: Continuation,
}

impl Discovery {
    pub fn next(&self) -> Option<&NextPage> {
        match &self.continuation {
            Continuation::Next(next) => Some(next),
            Continuation::End(_) => None,
        }
    }
}

/// One results document and where it sits in its target's walk.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub document: &'a Html,
    pub url: &'a Url,
    pub current_page: u32,
    /// The target's filter value, if the walk is filtered.
    pub filter: Option<&'a str>,
}

/// "Page X of Y", if the document prints one.
pub fn parse_summary(document: &Html) -> Option<(u32, u32)> {
    let text = document_text(document);
    let captures = SUMMARY_REGEX.captures(&text)?;
    let current = captures.get(1)?.as_str().parse().ok()?;
    let total = captures.get(2)?.as_str().parse().ok()?;
    Some((current, total))
}

fn is_disabled(anchor: ElementRef<'_>) -> bool {
    let element = anchor.value();
    if element.attr("disabled").is_some()
        || element
            .attr("aria-disabled")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
        || attr_mentions(anchor, "class", &["disabled"])
    {
        return true;
    }
    anchor
        .parent()
        .and_then(ElementRef::wrap)
        .is_some_and(|parent| attr_mentions(parent, "class", &["disabled"]))
}

fn is_next_label(anchor: ElementRef<'_>) -> bool {
    if anchor
        .value()
        .attr("rel")
        .is_some_and(|rel| rel.eq_ignore_ascii_case("next"))
    {
        return true;
    }

    let text = element_text(anchor).to_lowercase();
    let stripped = NEXT_GLYPHS
        .iter()
        .fold(text.clone(), |acc, glyph| acc.replace(glyph, ""));
    let stripped = stripped.trim();

    if stripped.is_empty() {
        // Glyph-only link: a single glyph is "next", doubled ones mean "last".
        return NEXT_GLYPHS.contains(&text.trim());
    }
    NEXT_WORDS.contains(&stripped)
        || anchor
            .value()
            .attr("title")
            .is_some_and(|title| NEXT_WORDS.contains(&title.trim().to_lowercase().as_str()))
}

fn link_number(anchor: ElementRef<'_>) -> Option<u32> {
    let text = element_text(anchor);
    BRACKETED_NUMBER
        .captures(text.trim())?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Discovers the page after `ctx.current_page`.
pub struct Paginator<'a> {
    site: &'a SiteConfig,
}

impl<'a> Paginator<'a> {
    pub fn new(site: &'a SiteConfig) -> Self {
        Self { site }
    }

    fn guard<'c>(&'c self, ctx: &PageContext<'c>) -> PageGuard<'c> {
        PageGuard {
            current_url: ctx.url,
            current_page: ctx.current_page,
            threshold: self.site.unfiltered_threshold,
            filter_param: &self.site.filter_param,
            target_filter: ctx.filter,
        }
    }

    fn anchors<'d>(&self, ctx: &PageContext<'d>) -> Vec<(ElementRef<'d>, Url)> {
        ctx.document
            .select(&LINK)
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                Some((anchor, resolve_href(ctx.url, href)?))
            })
            .collect()
    }

    pub fn discover(&self, ctx: PageContext<'_>) -> Discovery {
        let guard = self.guard(&ctx);
        let anchors = self.anchors(&ctx);
        let summary = parse_summary(ctx.document);
        let tripped = Cell::new(false);

        let check = |url: &Url, page: Option<u32>, strategy: Strategy| match guard.check(url, page) {
            Ok(page) => Some(page),
            Err(trip) => {
                debug!(%url, %strategy, "Pagination guard rejected candidate: {}", trip);
                tripped.set(true);
                None
            }
        };

        let mut continuation = None;

        for (anchor, url) in &anchors {
            if !is_next_label(*anchor) || is_disabled(*anchor) {
                continue;
            }
            let page = page_number(url, &self.site.page_param);
            if let Some(page) = check(url, page, Strategy::LabelLink) {
                continuation = Some(NextPage {
                    url: url.clone(),
                    page,
                    strategy: Strategy::LabelLink,
                });
                break;
            }
        }

        if continuation.is_none() {
            let mut best: Option<NextPage> = None;
            for (anchor, url) in &anchors {
                if is_disabled(*anchor) {
                    continue;
                }
                let page = page_number(url, &self.site.page_param).or_else(|| link_number(*anchor));
                if page.is_none_or(|page| page <= ctx.current_page) {
                    continue;
                }
                if let Some(page) = check(url, page, Strategy::NumberedLink)
                    && best.as_ref().is_none_or(|top| page < top.page)
                {
                    best = Some(NextPage {
                        url: url.clone(),
                        page,
                        strategy: Strategy::NumberedLink,
                    });
                }
            }
            continuation = best;
        }

        let continuation = match continuation {
            Some(next) => Continuation::Next(next),
            None => match summary {
                // A stale summary (server ignoring the page parameter) must not
                // push the walk past its own stated total.
                Some((current, total)) if ctx.current_page.max(current) >= total => {
                    Continuation::End(EndReason::LastPage)
                }
                Some((_, total)) => {
                    let next_page = ctx.current_page.saturating_add(1).min(total);
                    let mut url = set_query_param(ctx.url, &self.site.page_param, &next_page.to_string());
                    if let Some(filter) = ctx.filter
                        && query_value(&url, &self.site.filter_param).is_none()
                    {
                        url = set_query_param(&url, &self.site.filter_param, filter);
                    }
                    match check(&url, Some(next_page), Strategy::ConstructedUrl) {
                        Some(page) => Continuation::Next(NextPage {
                            url,
                            page,
                            strategy: Strategy::ConstructedUrl,
                        }),
                        None => Continuation::End(EndReason::GuardTripped),
                    }
                }
                None if tripped.get() => Continuation::End(EndReason::GuardTripped),
                None => Continuation::End(EndReason::NoSignal),
            },
        };

        let link_max = anchors
            .iter()
            .filter_map(|(anchor, url)| {
                page_number(url, &self.site.page_param).or_else(|| link_number(*anchor))
            })
            .filter(|page| *page < self.site.unfiltered_threshold)
            .max();
        let state = PaginationState {
            current_page: summary.map_or(ctx.current_page, |(current, _)| current),
            total_pages: summary
                .map(|(_, total)| total)
                .or(link_max)
                .unwrap_or(1)
                .max(1),
            has_next: matches!(continuation, Continuation::Next(_)),
        };

        Discovery {
            state,
            continuation,
        }
    }
}
