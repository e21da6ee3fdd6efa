//! Form scraping. The only place that touches HTML.

use scraper::{Html, Selector};

/// Field values and submission target of one HTML form.
///
/// Fields keep document order. Setting a name that already exists replaces
/// its value in place, so the most recent value always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSnapshot {
    action: String,
    fields: Vec<(String, String)>,
}

impl FormSnapshot {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            fields: Vec::new(),
        }
    }

    /// Raw `action` attribute; empty when the form has none.
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Set a field. Empty names are ignored.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if name.is_empty() {
            return;
        }
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Apply explicit overrides on top of the scraped values.
    pub fn overlay<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in overrides {
            self.set(name, value);
        }
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// Scrape the first `<form>` in `html`.
///
/// Every `<input>` inside it with a non-empty `name` contributes a field;
/// a missing `value` becomes the empty string. Returns `None` when the
/// document has no form at all.
pub fn extract_form(html: &str) -> Option<FormSnapshot> {
    let form_selector = Selector::parse("form").ok()?;
    let input_selector = Selector::parse("input").ok()?;

    let document = Html::parse_document(html);
    let form = document.select(&form_selector).next()?;

    let mut snapshot = FormSnapshot::new(form.value().attr("action").unwrap_or_default());
    for input in form.select(&input_selector) {
        let name = input.value().attr("name").unwrap_or_default();
        let value = input.value().attr("value").unwrap_or_default();
        snapshot.set(name, value);
    }
    Some(snapshot)
}
