//! Method-record extractor for dating report pages
//!
//! A report holds one `<div class="dating-method KEY">` container per method,
//! each with `data-row` children pairing a `data-label` span and a
//! `data-value` span. Classification of container keys and row labels is
//! driven entirely by the tables below.

use crate::age::parse_age;
use crate::html::{find_by_class, Element};
use crate::record::{DatingMethod, DatingRecord};
use tracing::debug;

/// Container class key -> dating method
///
/// C14 is absent on purpose: radiocarbon dates come from the lab-sample
/// datasets, not from report pages.
pub const METHOD_LABELS: &[(&str, DatingMethod)] = &[
    ("osl", DatingMethod::Osl),
    ("tl", DatingMethod::Tl),
    ("uranium", DatingMethod::USeries),
    ("useries", DatingMethod::USeries),
    ("esr", DatingMethod::Esr),
    ("paleomag", DatingMethod::Paleomagnetic),
    ("aar", DatingMethod::Aar),
];

/// Semantic category of a row label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    Age,
    Reference,
    Material,
    Laboratory,
    Samples,
    Species,
}

/// Label substring (lowercase) -> category, first entry wins
pub const FIELD_LABELS: &[(&str, FieldCategory)] = &[
    ("age", FieldCategory::Age),
    ("reference", FieldCategory::Reference),
    ("material", FieldCategory::Material),
    ("laboratory", FieldCategory::Laboratory),
    ("samples", FieldCategory::Samples),
    ("species", FieldCategory::Species),
];

/// Age labels in order of preference; only the first populated one is read
pub const AGE_PREFERENCE: &[&str] = &[
    "Primary Age",
    "Mean Age",
    "Preferred Age",
    "Age Estimates",
    "Age Range",
    "Effective Age Range",
];

const CONTAINER_CLASS: &str = "dating-method";

/// One per-method container as it appears in the document
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBlock {
    /// Class tokens other than the container class
    pub keys: Vec<String>,
    /// (label, value) rows in document order, labels without trailing ':'
    pub rows: Vec<(String, String)>,
}

/// Look up the method for a container key
pub fn classify_method(key: &str) -> Option<DatingMethod> {
    let key = key.to_ascii_lowercase();
    METHOD_LABELS
        .iter()
        .find(|(label, _)| *label == key)
        .map(|(_, method)| *method)
}

/// Look up the semantic category of a row label
pub fn classify_field(label: &str) -> Option<FieldCategory> {
    let label = label.to_lowercase();
    FIELD_LABELS
        .iter()
        .find(|(needle, _)| label.contains(needle))
        .map(|(_, category)| *category)
}

/// Pick the age text following [`AGE_PREFERENCE`]
///
/// Empty values do not count as populated.
pub fn select_age_text<'a>(age_fields: &[(&str, &'a str)]) -> Option<&'a str> {
    AGE_PREFERENCE.iter().find_map(|preferred| {
        age_fields
            .iter()
            .find(|(label, value)| label.eq_ignore_ascii_case(preferred) && !value.is_empty())
            .map(|(_, value)| *value)
    })
}

/// Locate every method container in a document
pub fn method_blocks(html: &str) -> Vec<MethodBlock> {
    find_by_class(html, "div", CONTAINER_CLASS)
        .iter()
        .map(|container| MethodBlock {
            keys: container
                .classes
                .iter()
                .filter(|c| c.as_str() != CONTAINER_CLASS)
                .cloned()
                .collect(),
            rows: data_rows(container),
        })
        .collect()
}

fn data_rows(container: &Element<'_>) -> Vec<(String, String)> {
    find_by_class(container.inner, "div", "data-row")
        .iter()
        .filter_map(|row| {
            let label = find_by_class(row.inner, "span", "data-label").into_iter().next()?;
            let value = find_by_class(row.inner, "span", "data-value").into_iter().next()?;
            let label = label.text().replace(':', "").trim().to_string();
            Some((label, value.text()))
        })
        .collect()
}

/// Build a record from one block
///
/// Returns `None` when the block's method is not in [`METHOD_LABELS`] or when
/// no age can be read from it.
pub fn record_from_block(block: &MethodBlock) -> Option<DatingRecord> {
    let Some(method) = block.keys.iter().find_map(|k| classify_method(k)) else {
        debug!(keys = ?block.keys, "skipping block with unrecognised method");
        return None;
    };

    let mut age_fields: Vec<(&str, &str)> = Vec::new();
    let mut reference = None;
    let mut material = None;
    let mut laboratory = None;
    let mut samples = None;
    let mut species = None;

    for (label, value) in &block.rows {
        let slot = match classify_field(label) {
            Some(FieldCategory::Age) => {
                age_fields.push((label.as_str(), value.as_str()));
                continue;
            }
            Some(FieldCategory::Reference) => &mut reference,
            Some(FieldCategory::Material) => &mut material,
            Some(FieldCategory::Laboratory) => &mut laboratory,
            Some(FieldCategory::Samples) => &mut samples,
            Some(FieldCategory::Species) => &mut species,
            None => continue,
        };
        if slot.is_none() && !value.is_empty() {
            *slot = Some(value.clone());
        }
    }

    let Some(estimate) = select_age_text(&age_fields).and_then(parse_age) else {
        debug!(%method, "dropping block without a usable age");
        return None;
    };

    let mut record = DatingRecord::new(method, estimate.age, Some(estimate.error));
    record.reference = reference;
    record.material = material;
    record.laboratory = laboratory;
    record.samples = samples;
    record.species = species;
    Some(record)
}

/// Extract every usable dating record from a report page
pub fn extract(html: &str) -> Vec<DatingRecord> {
    method_blocks(html)
        .iter()
        .filter_map(record_from_block)
        .collect()
}
