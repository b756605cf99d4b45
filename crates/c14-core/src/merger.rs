//! Merge engine for folding new samples and sites into the store
//!
//! Lab samples are reconciled through the `labnr` index: a known identifier
//! only ever fills gaps in its feature, an unknown one appends a feature.
//! Whole sites are appended as-is, without consulting the index.

use crate::config::FieldMap;
use crate::geojson::{Feature, FeatureCollection, Geometry, Properties};
use crate::normalize::LEGACY_KEYS;
use crate::record::DatingMethod;
use crate::site::Site;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// A lab sample from an external dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    /// Laboratory identifier, compared exactly
    pub lab_id: String,
    /// Raw source columns, by source column name
    pub columns: BTreeMap<String, String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

impl Sample {
    pub fn new(lab_id: impl Into<String>) -> Self {
        Self {
            lab_id: lab_id.into(),
            ..Default::default()
        }
    }

    /// Set a source column
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    /// Set the sample location
    pub fn at(mut self, longitude: f64, latitude: f64) -> Self {
        self.longitude = Some(longitude);
        self.latitude = Some(latitude);
        self
    }

    /// Point geometry when both coordinates are known
    pub fn geometry(&self) -> Option<Geometry> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) => Some(Geometry::point(lon, lat)),
            _ => None,
        }
    }

    /// Destination properties produced by the mapping table
    ///
    /// Empty or non-convertible cells produce no candidate.
    pub fn mapped(&self, field_map: &FieldMap) -> Properties {
        field_map
            .iter()
            .filter_map(|m| {
                let raw = self.columns.get(&m.source)?;
                m.kind.coerce(raw).map(|v| (m.dest.clone(), v))
            })
            .collect()
    }
}

/// An item to merge
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Sample(Sample),
    Site(Site),
}

/// Outcome of a merge run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Sample features appended
    pub inserted: usize,
    /// Existing features that gained at least one field
    pub updated: usize,
    /// Known samples that brought nothing new
    pub unchanged: usize,
    /// Samples without a lab identifier
    pub skipped: usize,
    /// Whole sites appended
    pub sites_inserted: usize,
    /// Site names of inserted samples not present in the store before
    pub new_site_names: BTreeSet<String>,
}

impl MergeReport {
    /// Whether the run changed the collection
    pub fn changed(&self) -> bool {
        self.inserted + self.updated + self.sites_inserted > 0
    }
}

/// Result of a gap fill
#[derive(Debug, Clone, PartialEq)]
pub struct Filled {
    pub properties: Properties,
    /// Destination keys that were written, in update order
    pub filled: Vec<String>,
}

/// Whether a destination value counts as missing
pub fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

/// Fill-gaps-only update of a property set
///
/// A key is written only when it is absent, null or an empty string in
/// `existing`; populated values are never replaced. Missing candidates are
/// ignored. Applying the same updates twice gives the same result as once.
pub fn fill_gaps(existing: &Properties, updates: &Properties) -> Filled {
    let mut properties = existing.clone();
    let mut filled = Vec::new();

    for (key, value) in updates {
        if is_missing(Some(value)) || !is_missing(properties.get(key)) {
            continue;
        }
        properties.insert(key.clone(), value.clone());
        filled.push(key.clone());
    }

    Filled { properties, filled }
}

/// Index of features by lab identifier
///
/// The first feature carrying an identifier wins; later duplicates are
/// reported and left out of the index.
pub fn labnr_index(collection: &FeatureCollection) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (i, feature) in collection.features.iter().enumerate() {
        if let Some(labnr) = feature.labnr() {
            if index.contains_key(labnr) {
                warn!(labnr, "duplicate lab identifier in store; first feature is used");
                continue;
            }
            index.insert(labnr.to_string(), i);
        }
    }
    index
}

/// Merge incoming samples and sites into the collection
///
/// Existing features are never removed. Samples inserted during the run join
/// the index immediately, so a repeated identifier within one batch updates
/// the feature inserted for its first occurrence.
pub fn merge(
    collection: &mut FeatureCollection,
    incoming: impl IntoIterator<Item = Incoming>,
    field_map: &FieldMap,
) -> MergeReport {
    let mut index = labnr_index(collection);
    let known_sites: BTreeSet<String> = collection
        .features
        .iter()
        .filter_map(|f| f.site_name().map(str::to_string))
        .collect();
    let mut report = MergeReport::default();

    for item in incoming {
        match item {
            Incoming::Site(site) => {
                insert_site(collection, &site);
                report.sites_inserted += 1;
            }
            Incoming::Sample(sample) => {
                merge_sample(collection, &mut index, &known_sites, &sample, field_map, &mut report)
            }
        }
    }

    info!(
        inserted = report.inserted,
        updated = report.updated,
        unchanged = report.unchanged,
        skipped = report.skipped,
        sites = report.sites_inserted,
        "merge complete"
    );
    report
}

fn merge_sample(
    collection: &mut FeatureCollection,
    index: &mut HashMap<String, usize>,
    known_sites: &BTreeSet<String>,
    sample: &Sample,
    field_map: &FieldMap,
    report: &mut MergeReport,
) {
    if sample.lab_id.is_empty() {
        report.skipped += 1;
        return;
    }

    let mut updates = sample.mapped(field_map);

    if let Some(&i) = index.get(&sample.lab_id) {
        let feature = &mut collection.features[i];
        let dated = fill_c14_date(&mut feature.properties, &mut updates);
        let Filled {
            properties,
            mut filled,
        } = fill_gaps(&feature.properties, &updates);
        if dated {
            filled.push("dates".to_string());
        }
        if filled.is_empty() {
            report.unchanged += 1;
        } else {
            debug!(labnr = %sample.lab_id, fields = ?filled, "filled missing fields");
            feature.properties = properties;
            report.updated += 1;
        }
        return;
    }

    let feature = sample_feature(sample, updates);
    if let Some(site) = feature.site_name() {
        if !known_sites.contains(site) {
            report.new_site_names.insert(site.to_string());
        }
    }
    debug!(labnr = %sample.lab_id, located = feature.geometry.is_some(), "inserting sample");

    index.insert(sample.lab_id.clone(), collection.features.len());
    collection.features.push(feature);
    report.inserted += 1;
}

/// Route radiocarbon candidates into an existing C14 entry of `dates`
///
/// A feature that already records a C14 date never regains the flat
/// `bp`/`std` keys. The only gap filled is a missing error on the date whose
/// age equals the `bp` candidate. Returns whether that date changed.
fn fill_c14_date(properties: &mut Properties, updates: &mut Properties) -> bool {
    let Some(Value::Array(dates)) = properties.get_mut("dates") else {
        return false;
    };
    let c14: Vec<usize> = dates
        .iter()
        .enumerate()
        .filter(|(_, d)| {
            d.get("dating_method").and_then(Value::as_str) == Some(DatingMethod::C14.as_str())
        })
        .map(|(i, _)| i)
        .collect();
    if c14.is_empty() {
        return false;
    }

    let age = updates.get("bp").and_then(Value::as_f64);
    let error = updates.get("std").filter(|v| !is_missing(Some(*v))).cloned();
    for key in LEGACY_KEYS {
        updates.remove(*key);
    }
    let (Some(age), Some(error)) = (age, error) else {
        return false;
    };

    for i in c14 {
        let date = &mut dates[i];
        if date.get("age").and_then(Value::as_f64) != Some(age) || !is_missing(date.get("error")) {
            continue;
        }
        if let Some(date) = date.as_object_mut() {
            date.insert("error".into(), error);
            return true;
        }
    }
    false
}

fn sample_feature(sample: &Sample, updates: Properties) -> Feature {
    let mut properties = Properties::new();
    properties.insert("labnr".into(), Value::String(sample.lab_id.clone()));
    for (key, value) in updates {
        properties.entry(key).or_insert(value);
    }
    properties.insert("dates".into(), Value::Array(Vec::new()));
    Feature::new(sample.geometry(), properties)
}

/// Append a whole site as one feature
///
/// The lab identifier index is not consulted. A feature with the same site
/// name is reported but not merged: names are matched exactly and may
/// differ between sources.
pub fn insert_site(collection: &mut FeatureCollection, site: &Site) {
    let same_name = collection.find_by_site(&site.name).count();
    if same_name > 0 {
        warn!(
            site = %site.name,
            existing = same_name,
            "store already has features with this site name; appending anyway"
        );
    }
    info!(site = %site.name, dates = site.dates.len(), "inserting site");
    collection.features.push(site.to_feature());
}
