use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Minimum number of digits a registration id must carry to be accepted.
pub const MIN_ID_DIGITS: usize = 6;

/// --- Identifiers ---

/// Canonical registration id: the digit-only form of whatever the source printed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Build from an already-validated digit string.
    pub(crate) fn from_digits(digits: String) -> Self {
        Self(digits)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = InvalidId;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        crate::normalize::parse_id(raw)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid id {raw:?}: {digits} digit(s), need at least {min}", min = MIN_ID_DIGITS)]
pub struct InvalidId {
    pub raw: String,
    pub digits: usize,
}

/// --- Regions and targets ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionCategory {
    Regular,
    Special,
    /// Sentinel for addresses that name no known region.
    Missing,
}

impl fmt::Display for RegionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Regular => "regular",
            Self::Special => "special",
            Self::Missing => "missing",
        })
    }
}

/// Region fields as they land on a [`Record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRef {
    pub id: String,
    pub name: String,
    pub category: RegionCategory,
}

impl RegionRef {
    pub fn is_known(&self) -> bool {
        self.category != RegionCategory::Missing
    }
}

/// One bucket crawled to completion, e.g. a single state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTarget {
    /// Value sent in the filter parameter; also the target's identity.
    pub key: String,
    pub label: String,
    pub category: RegionCategory,
}

impl EntityTarget {
    pub fn new(key: impl Into<String>, label: impl Into<String>, category: RegionCategory) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            category,
        }
    }

    /// The region this target stands for, as carried onto listing-derived records.
    /// Ad hoc targets (seed URLs) carry none.
    pub fn region(&self) -> Option<RegionRef> {
        if self.category == RegionCategory::Missing {
            return None;
        }
        Some(RegionRef {
            id: self.key.clone(),
            name: self.label.clone(),
            category: self.category,
        })
    }
}

/// --- Listing and detail output ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStub {
    pub id: RecordId,
    pub name: String,
    pub title: Option<String>,
    pub gender_text: Option<String>,
    pub location_text: Option<String>,
    pub category_text: Option<String>,
    pub detail_url: Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Male => "Male",
            Self::Female => "Female",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualification {
    pub degree: String,
    pub awarding_body: Option<String>,
    pub year: Option<u16>,
}

/// The canonical extracted entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: Option<String>,
    pub title: Option<String>,
    pub gender: Option<Gender>,
    pub specialty: Option<String>,
    /// Qualifications as printed on the profile.
    pub qualifications: Vec<String>,
    pub qualification_details: Vec<Qualification>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<RegionRef>,
    pub establishment: Option<String>,
    pub sector: Option<String>,
    pub renewal_date: Option<NaiveDate>,
    pub detail_url: Url,
}

impl Record {
    pub fn new(id: RecordId, detail_url: Url) -> Self {
        Self {
            id,
            name: None,
            title: None,
            gender: None,
            specialty: None,
            qualifications: Vec::new(),
            qualification_details: Vec::new(),
            address: None,
            city: None,
            region: None,
            establishment: None,
            sector: None,
            renewal_date: None,
            detail_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_parses_through_from_str() {
        let id: RecordId = "NSR 004821".parse().unwrap();
        assert_eq!(id.as_str(), "004821");
        assert!("12345".parse::<RecordId>().is_err());
    }

    #[test]
    fn serialized_category_is_lowercase() {
        let json = serde_json::to_string(&RegionCategory::Regular).unwrap();
        assert_eq!(json, "\"regular\"");
    }

    #[test]
    fn ad_hoc_targets_carry_no_region() {
        let seed = EntityTarget::new("seed-1", "seed", RegionCategory::Missing);
        assert!(seed.region().is_none());

        let johor = EntityTarget::new("01", "Johor", RegionCategory::Regular);
        assert_eq!(johor.region().unwrap().name, "Johor");
    }
}
