//! GeoJSON store: the canonical feature collection read by the map viewer
//!
//! Feature properties stay an open JSON object so curated fields this crate
//! knows nothing about survive a load/save round trip.

use crate::error::{Error, Result};
use crate::record::DatingRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Open JSON object used for feature properties
pub type Properties = Map<String, Value>;

/// The persisted store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: CollectionKind,
    pub features: Vec<Feature>,
    /// Any other top-level members (name, crs, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionKind {
    FeatureCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Feature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
}

/// A point location, `[longitude, latitude]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    pub coordinates: Vec<f64>,
}

impl Geometry {
    pub fn point(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: GeometryKind::Point,
            coordinates: vec![longitude, latitude],
        }
    }

    pub fn longitude(&self) -> Option<f64> {
        self.coordinates.first().copied()
    }

    pub fn latitude(&self) -> Option<f64> {
        self.coordinates.get(1).copied()
    }
}

/// One site or lab sample in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    /// `None` when the location is unknown; written as `null`
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Properties,
    /// Other feature members (id, bbox, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// GeoJSON allows `"properties": null`
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Properties, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Properties>::deserialize(deserializer)?.unwrap_or_default())
}

impl Feature {
    pub fn new(geometry: Option<Geometry>, properties: Properties) -> Self {
        Self {
            kind: FeatureKind::Feature,
            geometry,
            properties,
            extra: Map::new(),
        }
    }

    /// Lab identifier, when present as a non-empty string
    pub fn labnr(&self) -> Option<&str> {
        self.properties
            .get("labnr")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Site name, when present
    pub fn site_name(&self) -> Option<&str> {
        self.properties.get("site").and_then(Value::as_str)
    }

    /// Number of entries in the `dates` array
    pub fn date_count(&self) -> usize {
        self.properties
            .get("dates")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    /// Decode the `dates` array, skipping entries that are not valid records
    pub fn dates(&self) -> Vec<DatingRecord> {
        let Some(dates) = self.properties.get("dates").and_then(Value::as_array) else {
            return Vec::new();
        };
        dates
            .iter()
            .filter_map(|d| match serde_json::from_value(d.clone()) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!(site = ?self.site_name(), "undecodable date entry: {}", e);
                    None
                }
            })
            .collect()
    }
}

impl FeatureCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self {
            kind: CollectionKind::FeatureCollection,
            features: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Total number of dating records across all features
    pub fn date_count(&self) -> usize {
        self.features.iter().map(Feature::date_count).sum()
    }

    /// Features whose site name matches exactly
    pub fn find_by_site<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Feature> + 'a {
        self.features
            .iter()
            .filter(move |f| f.site_name() == Some(name))
    }

    /// Parse a collection from JSON text
    pub fn from_json(content: &str, source: &Path) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::MalformedStore {
            path: source.to_path_buf(),
            source: e,
        })
    }

    /// Load a store file
    ///
    /// A store that is not a valid FeatureCollection is an error; nothing is
    /// repaired.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let collection = Self::from_json(&content, path)?;
        debug!(path = %path.display(), features = collection.features.len(), "loaded store");
        Ok(collection)
    }

    /// Write the whole collection, replacing the file atomically
    ///
    /// The JSON goes to a sibling temporary file first and is renamed over
    /// the target, so a failed write leaves the previous store intact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store.geojson".to_string());
        let tmp = path.with_file_name(format!(".{}.tmp", file_name));

        fs::write(&tmp, content)?;
        if let Err(e) = fs::rename(&tmp, path) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                warn!(tmp = %tmp.display(), "could not remove temporary file: {}", cleanup);
            }
            return Err(e.into());
        }
        Ok(())
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new()
    }
}
