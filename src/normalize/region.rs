use regex::Regex;
use std::sync::LazyLock;

use super::clean_text;
use crate::entities::{RegionCategory, RegionRef};

pub const UNKNOWN_REGION_ID: &str = "99";
pub const UNKNOWN_REGION_NAME: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub id: &'static str,
    pub name: &'static str,
    pub category: RegionCategory,
    pub aliases: &'static [&'static str],
}

impl Region {
    pub fn to_ref(&self) -> RegionRef {
        RegionRef {
            id: self.id.to_string(),
            name: self.name.to_string(),
            category: self.category,
        }
    }

    fn spellings(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }
}

const fn regular(id: &'static str, name: &'static str, aliases: &'static [&'static str]) -> Region {
    Region {
        id,
        name,
        category: RegionCategory::Regular,
        aliases,
    }
}

pub static REGIONS: &[Region] = &[
    regular("01", "Johor", &["Johore"]),
    regular("02", "Kedah", &[]),
    regular("03", "Kelantan", &[]),
    regular("04", "Melaka", &["Malacca"]),
    regular("05", "Negeri Sembilan", &["Negri Sembilan"]),
    regular("06", "Pahang", &[]),
    regular("07", "Pulau Pinang", &["Penang", "P. Pinang"]),
    regular("08", "Perak", &[]),
    regular("09", "Perlis", &[]),
    regular("10", "Selangor", &[]),
    regular("11", "Terengganu", &["Trengganu"]),
    regular("12", "Sabah", &[]),
    regular("13", "Sarawak", &[]),
    regular(
        "14",
        "Wilayah Persekutuan Kuala Lumpur",
        &["WP Kuala Lumpur", "Kuala Lumpur"],
    ),
    regular("15", "Wilayah Persekutuan Labuan", &["WP Labuan", "Labuan"]),
    regular(
        "16",
        "Wilayah Persekutuan Putrajaya",
        &["WP Putrajaya", "Putrajaya"],
    ),
    Region {
        id: "17",
        name: "Overseas",
        category: RegionCategory::Special,
        aliases: &[],
    },
];

/// Every spelling, longest first so alternation prefers "Wilayah Persekutuan
/// Kuala Lumpur" over its "Kuala Lumpur" suffix.
static SPELLINGS: LazyLock<Vec<(String, &'static Region)>> = LazyLock::new(|| {
    let mut spellings: Vec<(String, &'static Region)> = REGIONS
        .iter()
        .flat_map(|region| region.spellings().map(move |s| (s.to_string(), region)))
        .collect();
    spellings.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    spellings
});

static REGION_ALTERNATION: LazyLock<String> = LazyLock::new(|| {
    SPELLINGS
        .iter()
        .map(|(spelling, _)| {
            spelling
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect::<Vec<_>>()
        .join("|")
});

static REGION_ANYWHERE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", *REGION_ALTERNATION)).unwrap()
});

static REGION_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)^(?:{})$", *REGION_ALTERNATION)).unwrap());

static POSTCODE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{5,}").unwrap());

fn spelling_key(text: &str) -> String {
    clean_text(text).to_lowercase()
}

/// Look a region up by id, canonical name or alias (configuration input).
pub fn lookup_region(key: &str) -> Option<&'static Region> {
    let wanted = spelling_key(key);
    REGIONS.iter().find(|region| {
        region.id == wanted || region.spellings().any(|s| spelling_key(s) == wanted)
    })
}

/// The region named in free text. When several appear, the last one wins:
/// addresses end with the state, street names often borrow one.
pub fn find_region(text: &str) -> Option<&'static Region> {
    let matched = REGION_ANYWHERE.find_iter(text).last()?;
    let key = spelling_key(matched.as_str());
    SPELLINGS
        .iter()
        .find(|(spelling, _)| spelling_key(spelling) == key)
        .map(|(_, region)| *region)
}

/// Region for an address, or the unknown/missing sentinel.
pub fn resolve_region(address: &str) -> RegionRef {
    match find_region(address) {
        Some(region) => region.to_ref(),
        None => RegionRef {
            id: UNKNOWN_REGION_ID.to_string(),
            name: UNKNOWN_REGION_NAME.to_string(),
            category: RegionCategory::Missing,
        },
    }
}

/// City is the second-to-last address part once postcodes are removed,
/// unless that part is itself a region name.
pub fn derive_city(address: &str) -> Option<String> {
    let stripped = POSTCODE_REGEX.replace_all(address, " ");
    let parts: Vec<String> = stripped
        .split([',', '\n'])
        .map(clean_text)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.len() < 2 {
        return None;
    }

    let candidate = &parts[parts.len() - 2];
    if REGION_EXACT.is_match(candidate) {
        return None;
    }
    Some(candidate.clone())
}
