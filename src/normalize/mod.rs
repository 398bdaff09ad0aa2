//! Pure text-to-value normalizers shared by the listing and profile parsers.

pub mod region;

pub use region::{REGIONS, Region, derive_city, find_region, lookup_region, resolve_region};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

use crate::entities::{Gender, InvalidId, MIN_ID_DIGITS, Qualification, RecordId};

static GENDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(female|male)\b").unwrap());

static ORDINAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").unwrap());

static EMBEDDED_DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[/.\-]\d{1,2}[/.\-]\d{4}|\d{1,2}[\s\-]+[a-z]{3,9}[\s\-]+\d{4}|[a-z]{3,9}\s+\d{1,2},?\s+\d{4}",
    )
    .unwrap()
});

static QUALIFICATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<degree>[^()]+?)\s*\((?P<body>[^()]*)\)\s*(?P<year>\d{4})?$").unwrap()
});

// Day-first: the directory is Malaysian and never prints month-first numerics.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d-%B-%Y",
    "%B %d %Y",
    "%b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %I:%M:%S %p",
];

/// Collapse runs of whitespace (including non-breaking spaces) and trim.
pub fn clean_text(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// [`clean_text`], mapping an empty result to `None`.
pub fn non_empty(raw: &str) -> Option<String> {
    let cleaned = clean_text(raw);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Validate an id: keep only its digits and require at least [`MIN_ID_DIGITS`].
pub fn parse_id(raw: &str) -> Result<RecordId, InvalidId> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < MIN_ID_DIGITS {
        return Err(InvalidId {
            raw: raw.to_string(),
            digits: digits.len(),
        });
    }
    Ok(RecordId::from_digits(digits))
}

pub fn is_valid_id(raw: &str) -> bool {
    parse_id(raw).is_ok()
}

pub fn normalize_gender(raw: &str) -> Option<Gender> {
    let captures = GENDER_REGEX.captures(raw)?;
    match captures[1].to_lowercase().as_str() {
        "female" => Some(Gender::Female),
        "male" => Some(Gender::Male),
        _ => None,
    }
}

/// Parse any recognizable calendar string into a date, dropping time of day.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = clean_text(raw);
    if cleaned.is_empty() {
        return None;
    }

    if let Some(date) = parse_date_exact(&cleaned) {
        return Some(date);
    }

    // Labels like "Renewed on 12/03/2021 (valid)" wrap the date in prose.
    EMBEDDED_DATE_REGEX
        .find_iter(&cleaned)
        .find_map(|m| parse_date_exact(m.as_str()))
}

fn parse_date_exact(text: &str) -> Option<NaiveDate> {
    let text = ORDINAL_REGEX.replace_all(text, "$1");
    let text = text.replace(',', " ");
    let text = clean_text(&text);

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&text) {
        return Some(parsed.date_naive());
    }
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&text, format).ok())
    {
        return Some(date);
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&text, format).ok())
        .map(|datetime| datetime.date())
}

/// Split free text into `<degree> (<awarding body>)` entries.
///
/// Separators inside parentheses do not split, so an awarding body such as
/// `(Universiti Malaya, Kuala Lumpur)` stays whole.
pub fn parse_qualifications(raw: &str) -> Vec<Qualification> {
    qualification_segments(raw)
        .iter()
        .map(|segment| parse_qualification(segment))
        .collect()
}

/// The cleaned, non-empty entries of a free-text qualification list.
pub fn qualification_segments(raw: &str) -> Vec<String> {
    split_outside_parens(raw)
        .into_iter()
        .filter_map(|segment| non_empty(&segment))
        .collect()
}

pub fn parse_qualification(segment: &str) -> Qualification {
    let segment = clean_text(segment);
    match QUALIFICATION_REGEX.captures(&segment) {
        Some(captures) => Qualification {
            degree: clean_text(&captures["degree"]),
            awarding_body: non_empty(&captures["body"]),
            year: captures
                .name("year")
                .and_then(|year| year.as_str().parse().ok()),
        },
        None => Qualification {
            degree: segment,
            awarding_body: None,
            year: None,
        },
    }
}

fn split_outside_parens(raw: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in raw.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' | ';' | '\n' if depth == 0 => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}
