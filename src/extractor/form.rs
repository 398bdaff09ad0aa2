use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

use super::html::{element_text, resolve_href};

static FORM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form").unwrap());
static FIELD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input, select").unwrap());
static OPTION: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());

/// Input types that never contribute a value without a user gesture.
const SKIPPED_INPUT_TYPES: &[&str] = &["submit", "button", "reset", "image", "file"];

/// Ordered name/value pairs captured from a search form.
///
/// Repeated names are kept (checkbox groups submit every checked box);
/// [`FormFieldSet::set`] replaces the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFieldSet {
    fields: Vec<(String, String)>,
}

impl FormFieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// How the captured form wants to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormTarget {
    pub action: Url,
    pub is_post: bool,
}

/// Collect every named field under any `<form>` in document order.
pub fn extract_form_fields(document: &Html) -> FormFieldSet {
    let mut fields = FormFieldSet::new();

    for form in document.select(&FORM) {
        for element in form.select(&FIELD) {
            let Some(name) = element.value().attr("name") else {
                continue;
            };
            if let Some(value) = field_value(element) {
                fields.push(name, value);
            }
        }
    }

    fields
}

fn field_value(element: ElementRef<'_>) -> Option<String> {
    let attrs = element.value();
    if attrs.name() == "select" {
        return selected_option(element);
    }

    let input_type = attrs.attr("type").unwrap_or("text").to_lowercase();
    match input_type.as_str() {
        "checkbox" | "radio" => attrs
            .attr("checked")
            .map(|_| attrs.attr("value").unwrap_or("on").to_string()),
        t if SKIPPED_INPUT_TYPES.contains(&t) => None,
        _ => Some(attrs.attr("value").unwrap_or_default().to_string()),
    }
}

fn selected_option(select: ElementRef<'_>) -> Option<String> {
    let mut options = select.select(&OPTION).peekable();
    let first = *options.peek()?;
    let chosen = options
        .find(|option| option.value().attr("selected").is_some())
        .unwrap_or(first);

    Some(match chosen.value().attr("value") {
        Some(value) => value.to_string(),
        None => element_text(chosen),
    })
}

/// Action URL and method of the first form, resolved against the form page.
pub fn form_target(document: &Html, page_url: &Url) -> Option<FormTarget> {
    let form = document.select(&FORM).next()?;
    let action = form
        .value()
        .attr("action")
        .and_then(|href| resolve_href(page_url, href))
        .unwrap_or_else(|| page_url.clone());
    let is_post = form
        .value()
        .attr("method")
        .is_some_and(|method| method.eq_ignore_ascii_case("post"));
    Some(FormTarget { action, is_post })
}
