//! Migration of legacy radiocarbon-only properties into the `dates` array
//!
//! Legacy features carry a flat `bp`/`std` pair (plus calibrated companions).
//! Normalisation folds the pair into one C14 entry of `dates` and removes the
//! flat keys. Running it on an already normalised collection changes nothing.

use crate::age::parse_age;
use crate::geojson::{FeatureCollection, Properties};
use crate::record::{DatingMethod, DatingRecord};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// Flat keys removed once their content lives in `dates`
pub const LEGACY_KEYS: &[&str] = &["bp", "std", "cal_bp", "cal_std"];

/// Outcome of a normalisation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    /// Features visited
    pub features: usize,
    /// C14 entries appended to `dates`
    pub migrated: usize,
    /// Features whose legacy keys were removed
    pub cleaned: usize,
}

/// What happened to one feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    /// No legacy keys present
    Untouched,
    /// Legacy keys removed, a date appended
    Migrated,
    /// Legacy keys removed; no date to add or an identical one existed
    Cleaned,
    /// `bp` could not be read; properties left as they were
    Unreadable,
}

/// Normalise every feature of a collection in place
pub fn normalize(collection: &mut FeatureCollection) -> NormalizeReport {
    let mut report = NormalizeReport {
        features: collection.features.len(),
        ..Default::default()
    };

    for feature in &mut collection.features {
        match normalize_properties(&mut feature.properties) {
            Migration::Migrated => {
                report.migrated += 1;
                report.cleaned += 1;
            }
            Migration::Cleaned => report.cleaned += 1,
            Migration::Unreadable => {
                warn!(
                    labnr = ?feature.labnr(),
                    site = ?feature.site_name(),
                    "legacy bp value is not an age; left in place"
                );
            }
            Migration::Untouched => {}
        }
    }

    info!(
        features = report.features,
        migrated = report.migrated,
        cleaned = report.cleaned,
        "normalised store"
    );
    report
}

/// Normalise one feature's properties
pub fn normalize_properties(properties: &mut Properties) -> Migration {
    if !properties.get("dates").is_some_and(Value::is_array) {
        properties.insert("dates".into(), Value::Array(Vec::new()));
    }

    if !LEGACY_KEYS.iter().any(|k| properties.contains_key(*k)) {
        return Migration::Untouched;
    }

    let record = match properties.get("bp").map(read_number) {
        None | Some(Reading::Absent) => None,
        Some(Reading::Unreadable) => return Migration::Unreadable,
        Some(Reading::Value(age)) => {
            let error = match properties.get("std").map(read_number) {
                Some(Reading::Value(std)) => Some(std),
                _ => None,
            };
            Some(DatingRecord::new(DatingMethod::C14, age, error))
        }
    };

    for key in LEGACY_KEYS {
        properties.remove(*key);
    }

    let Some(record) = record else {
        return Migration::Cleaned;
    };

    let Some(Value::Array(dates)) = properties.get_mut("dates") else {
        return Migration::Cleaned;
    };
    let already_present = dates
        .iter()
        .filter_map(|d| serde_json::from_value::<DatingRecord>(d.clone()).ok())
        .any(|d| {
            d.dating_method == DatingMethod::C14 && d.age == record.age && d.error == record.error
        });
    if already_present {
        return Migration::Cleaned;
    }

    match serde_json::to_value(&record) {
        Ok(value) => {
            dates.push(value);
            Migration::Migrated
        }
        // a finite f64 record always serializes
        Err(_) => Migration::Cleaned,
    }
}

enum Reading {
    Absent,
    Value(f64),
    Unreadable,
}

fn read_number(value: &Value) -> Reading {
    match value {
        Value::Null => Reading::Absent,
        Value::Number(n) => n.as_f64().map_or(Reading::Unreadable, Reading::Value),
        Value::String(s) if s.trim().is_empty() => Reading::Absent,
        Value::String(s) => parse_age(s).map_or(Reading::Unreadable, |e| Reading::Value(e.age)),
        _ => Reading::Unreadable,
    }
}
