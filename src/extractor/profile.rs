//! Detail-document parsing.
//!
//! The detail page is a stack of bordered tables whose sections are marked
//! only by heading text. Extraction runs as an ordered list of strategies,
//! each producing a partial [`ProfileFields`]; partials are merged so the
//! first strategy to fill a field wins.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::html::{element_text, own_rows, row_cells, spaced_text};
use crate::config::SiteConfig;
use crate::entities::{EntityStub, Gender, Qualification, Record, RecordId};
use crate::normalize::{
    derive_city, non_empty, normalize_date, normalize_gender, parse_id, parse_qualification,
    qualification_segments, resolve_region,
};

static BORDERED_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table[border]").unwrap());
static NAME_ELEMENT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "#name, #doctorName, #doctor_name, #fullname, .doctor-name, .profile-name, [itemprop='name']",
    )
    .unwrap()
});
static SPECIALTY_ELEMENT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "#specialty, #speciality, .specialty, .speciality, [itemprop='medicalSpecialty']",
    )
    .unwrap()
});
static DEFINITION_LIST: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dl").unwrap());
static YEAR_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

/// Column labels of the qualifications table, lower-cased.
const QUALIFICATION_HEADERS: &[&str] = &[
    "degree",
    "qualification",
    "qualifications",
    "awarding body",
    "institution",
    "university",
    "year",
    "year awarded",
    "ijazah",
    "institusi",
    "tahun",
];

/// Section of the detail page the table scan is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Section {
    #[default]
    Unknown,
    PersonalData,
    ClinicalPractice,
    Qualifications,
}

const SECTION_HEADINGS: &[(Section, &[&str])] = &[
    (
        Section::PersonalData,
        &["personal data", "personal details", "personal particulars", "maklumat peribadi"],
    ),
    (
        Section::ClinicalPractice,
        &["clinical practice", "place of practice", "practice details", "tempat amalan"],
    ),
    (Section::Qualifications, &["qualification", "kelayakan"]),
];

impl Section {
    /// The heading that appears first in a table's text, if any.
    fn detect(table_text: &str) -> Option<Section> {
        SECTION_HEADINGS
            .iter()
            .filter_map(|(section, headings)| {
                headings
                    .iter()
                    .filter_map(|heading| table_text.find(heading))
                    .min()
                    .map(|position| (position, *section))
            })
            .min_by_key(|(position, _)| *position)
            .map(|(_, section)| section)
    }
}

/// A partial record produced by one extraction strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    pub id: Option<RecordId>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub gender: Option<Gender>,
    pub specialty: Option<String>,
    pub address: Option<String>,
    pub establishment: Option<String>,
    pub sector: Option<String>,
    pub renewal_date: Option<NaiveDate>,
    /// Raw text alongside its structured form.
    pub qualifications: Vec<(String, Qualification)>,
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

impl ProfileFields {
    /// Merge `later` under `self`: fields already set here are kept.
    pub fn merge(mut self, later: ProfileFields) -> Self {
        fill(&mut self.id, later.id);
        fill(&mut self.name, later.name);
        fill(&mut self.title, later.title);
        fill(&mut self.gender, later.gender);
        fill(&mut self.specialty, later.specialty);
        fill(&mut self.address, later.address);
        fill(&mut self.establishment, later.establishment);
        fill(&mut self.sector, later.sector);
        fill(&mut self.renewal_date, later.renewal_date);
        if self.qualifications.is_empty() {
            self.qualifications = later.qualifications;
        }
        self
    }

    /// Coarse listing attributes as a last-resort partial.
    pub fn from_stub(stub: &EntityStub) -> Self {
        Self {
            name: non_empty(&stub.name),
            title: stub.title.clone(),
            gender: stub.gender_text.as_deref().and_then(normalize_gender),
            specialty: stub.category_text.clone(),
            ..Self::default()
        }
    }

    /// Write the merged fields onto a record, deriving region and city from the address.
    pub fn apply_to(self, record: &mut Record) {
        if let Some(id) = self.id
            && id != record.id
        {
            warn!("Detail page for {} reports id {}, using the page's", record.id, id);
            record.id = id;
        }

        fill(&mut record.name, self.name);
        fill(&mut record.title, self.title);
        fill(&mut record.gender, self.gender);
        fill(&mut record.specialty, self.specialty);
        fill(&mut record.establishment, self.establishment);
        fill(&mut record.sector, self.sector);
        fill(&mut record.renewal_date, self.renewal_date);

        if record.qualifications.is_empty() {
            let (raw, details): (Vec<_>, Vec<_>) = self.qualifications.into_iter().unzip();
            record.qualifications = raw;
            record.qualification_details = details;
        }

        if record.address.is_none()
            && let Some(address) = self.address
        {
            record.region = Some(resolve_region(&address));
            record.city = derive_city(&address);
            record.address = Some(address);
        }
    }
}

type Strategy = fn(&Html) -> ProfileFields;

/// Extraction strategies in priority order.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("bordered-tables", scan_tables),
    ("element-ids", scan_element_ids),
    ("definition-lists", scan_definition_lists),
];

/// Run every strategy over a detail document and merge the partials.
pub fn extract_profile_fields(document: &Html) -> ProfileFields {
    STRATEGIES
        .iter()
        .fold(ProfileFields::default(), |merged, (name, strategy)| {
            let partial = strategy(document);
            debug!(strategy = name, "profile strategy produced {:?}", partial);
            merged.merge(partial)
        })
}

/// Build a record for `id` from its detail document.
///
/// Never fails: a page that matches nothing still yields the id and the
/// canonical detail URL.
pub fn parse_profile(document: &Html, id: RecordId, site: &SiteConfig) -> Record {
    let mut record = Record::new(id.clone(), site.detail_url(&id));
    extract_profile_fields(document).apply_to(&mut record);
    ensure_region(&mut record);
    record
}

/// Derive region fields from the address if nothing set them yet.
pub fn ensure_region(record: &mut Record) {
    if record.region.is_some() {
        return;
    }
    if let Some(address) = &record.address {
        record.region = Some(resolve_region(address));
        if record.city.is_none() {
            record.city = derive_city(address);
        }
    }
}

fn scan_tables(document: &Html) -> ProfileFields {
    let mut fields = ProfileFields::default();
    let mut section = Section::default();

    for table in document.select(&BORDERED_TABLE) {
        let table_text = spaced_text(table).to_lowercase();
        if let Some(detected) = Section::detect(&table_text) {
            section = detected;
        }

        for row in own_rows(table) {
            let cells: Vec<String> = row_cells(row).into_iter().map(element_text).collect();
            match section {
                Section::Qualifications => {
                    if let Some(entry) = qualification_triple(&cells) {
                        fields.qualifications.push(entry);
                    }
                }
                _ => {
                    if let [.., label, value] = cells.as_slice() {
                        route_label(&mut fields, section, label, value);
                    }
                }
            }
        }
    }

    fields
}

/// A `degree | awarding body | year` row, with the row text as its raw form.
fn qualification_triple(cells: &[String]) -> Option<(String, Qualification)> {
    let [degree, body, year] = cells else {
        return None;
    };
    let is_header = cells.iter().any(|cell| {
        let label = cell.trim_end_matches(':').trim().to_lowercase();
        QUALIFICATION_HEADERS.contains(&label.as_str())
    });
    if is_header {
        return None;
    }

    let qualification = Qualification {
        degree: non_empty(degree)?,
        awarding_body: non_empty(body),
        year: YEAR_REGEX
            .find(year)
            .and_then(|found| found.as_str().parse().ok()),
    };
    let raw = cells
        .iter()
        .filter_map(|cell| non_empty(cell))
        .collect::<Vec<_>>()
        .join(" ");
    Some((raw, qualification))
}

fn route_label(fields: &mut ProfileFields, section: Section, label: &str, value: &str) {
    let label = label.to_lowercase();
    let Some(value) = non_empty(value) else {
        return;
    };

    if label.contains("nsr no") {
        fill(&mut fields.id, parse_id(&value).ok());
    } else if label.contains("gender") {
        fill(&mut fields.gender, normalize_gender(&value));
    } else if label.contains("field") && label.contains("practice") {
        fill(&mut fields.specialty, Some(value));
    } else if label.contains("address") {
        fill(&mut fields.address, Some(value));
    } else if label.contains("sector") {
        fill(&mut fields.sector, Some(value));
    } else if label.contains("renewal") || label.contains("last renewed") {
        fill(&mut fields.renewal_date, normalize_date(&value));
    } else if label.contains("qualification") {
        if fields.qualifications.is_empty() {
            fields.qualifications = qualification_segments(&value)
                .into_iter()
                .map(|segment| {
                    let qualification = parse_qualification(&segment);
                    (segment, qualification)
                })
                .collect();
        }
    } else if label.contains("title") && section == Section::PersonalData {
        fill(&mut fields.title, Some(value));
    } else if label.contains("name") {
        match section {
            Section::PersonalData => fill(&mut fields.name, Some(value)),
            Section::ClinicalPractice => fill(&mut fields.establishment, Some(value)),
            _ => {}
        }
    }
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .find_map(|element| non_empty(&element_text(element)))
}

fn scan_element_ids(document: &Html) -> ProfileFields {
    ProfileFields {
        name: first_text(document, &NAME_ELEMENT),
        specialty: first_text(document, &SPECIALTY_ELEMENT),
        ..ProfileFields::default()
    }
}

fn scan_definition_lists(document: &Html) -> ProfileFields {
    let mut fields = ProfileFields::default();

    for list in document.select(&DEFINITION_LIST) {
        let mut label: Option<String> = None;
        for item in list.children().filter_map(ElementRef::wrap) {
            match item.value().name() {
                "dt" => label = Some(element_text(item).to_lowercase()),
                "dd" => {
                    if let Some(label) = label.take() {
                        route_definition(&mut fields, &label, &element_text(item));
                    }
                }
                _ => {}
            }
        }
    }

    fields
}

fn route_definition(fields: &mut ProfileFields, label: &str, value: &str) {
    let value = non_empty(value);
    if label.contains("address") {
        fill(&mut fields.address, value);
    } else if label.contains("special") || (label.contains("field") && label.contains("practice")) {
        fill(&mut fields.specialty, value);
    } else if label.contains("name") {
        fill(&mut fields.name, value);
    }
}
