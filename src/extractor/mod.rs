//! Document parsers: search form, results listing and detail profile.
//!
//! Parsers never fail. Missing structure yields empty or partial output and
//! the caller decides what that means for the crawl.

pub mod form;
pub mod html;
pub mod listing;
pub mod profile;

#[cfg(test)]
mod tests;

pub use form::{FormFieldSet, FormTarget, extract_form_fields, form_target};
pub use listing::{ResultsProbe, find_results_table, parse_listing, probe_results};
pub use profile::{ProfileFields, ensure_region, extract_profile_fields, parse_profile};
