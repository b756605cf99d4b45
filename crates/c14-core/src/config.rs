//! Enrichment configuration: source, country preselection and field mapping

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Archive fetched when no local tables are given
pub const DEFAULT_SOURCE_URL: &str = "https://zenodo.org/records/3689716/files/data_v1.0.3.zip";

/// How a source cell is typed in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    /// Whole number; "3400.0" is accepted and truncated
    Integer,
    Number,
}

impl FieldKind {
    /// Convert cell text to a JSON value, `None` when empty or not convertible
    pub fn coerce(&self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match self {
            FieldKind::Text => Some(Value::String(raw.to_string())),
            FieldKind::Integer => raw
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| Value::from(f.trunc() as i64)),
            FieldKind::Number => raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
        }
    }
}

/// One source column -> destination property rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source: String,
    pub dest: String,
    #[serde(default = "default_kind")]
    pub kind: FieldKind,
}

fn default_kind() -> FieldKind {
    FieldKind::Text
}

impl FieldMapping {
    pub fn new(source: impl Into<String>, dest: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            kind,
        }
    }
}

/// Ordered mapping table; columns it does not name are ignored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(pub Vec<FieldMapping>);

impl FieldMap {
    pub fn iter(&self) -> impl Iterator<Item = &FieldMapping> {
        self.0.iter()
    }

    /// Source column names, in table order
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|m| m.source.as_str())
    }
}

impl Default for FieldMap {
    fn default() -> Self {
        Self(vec![
            FieldMapping::new("CRA", "bp", FieldKind::Integer),
            FieldMapping::new("Error", "std", FieldKind::Integer),
            FieldMapping::new("Material", "material", FieldKind::Text),
            FieldMapping::new("Species", "species", FieldKind::Text),
            FieldMapping::new("Site_Name", "site", FieldKind::Text),
            FieldMapping::new("Country", "country", FieldKind::Text),
        ])
    }
}

/// Settings for an enrichment run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Zip archive holding `siteTable.csv` and `dateTable.csv`
    pub source_url: String,
    /// Country codes kept from the site table; empty keeps all
    pub countries: Vec<String>,
    pub field_map: FieldMap,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            countries: vec!["MA".to_string(), "EH".to_string()],
            field_map: FieldMap::default(),
        }
    }
}

impl EnrichConfig {
    /// Load a config file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the config file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce() {
        assert_eq!(FieldKind::Integer.coerce("3400.0"), Some(json!(3400)));
        assert_eq!(FieldKind::Integer.coerce(" 45 "), Some(json!(45)));
        assert_eq!(FieldKind::Integer.coerce("n.d."), None);
        assert_eq!(FieldKind::Number.coerce("31.85"), Some(json!(31.85)));
        assert_eq!(FieldKind::Text.coerce("bone"), Some(json!("bone")));
        assert_eq!(FieldKind::Text.coerce("   "), None);
    }

    #[test]
    fn test_default_field_map() {
        let map = FieldMap::default();
        let pairs: Vec<(&str, &str)> = map
            .iter()
            .map(|m| (m.source.as_str(), m.dest.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("CRA", "bp"),
                ("Error", "std"),
                ("Material", "material"),
                ("Species", "species"),
                ("Site_Name", "site"),
                ("Country", "country"),
            ]
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = EnrichConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let loaded: EnrichConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{
            "countries": ["DZ"],
            "field_map": [{"source": "Lab_Material", "dest": "material"}]
        }"#;
        let config: EnrichConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.source_url, DEFAULT_SOURCE_URL);
        assert_eq!(config.countries, vec!["DZ"]);
        assert_eq!(config.field_map.0[0].kind, FieldKind::Text);
    }

    #[test]
    fn test_load_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrich.json");

        let mut config = EnrichConfig::default();
        config.countries.clear();
        config.save(&path).unwrap();

        assert_eq!(EnrichConfig::load(&path).unwrap(), config);
    }
}
