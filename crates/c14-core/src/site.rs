//! Sites assembled from one or more report extractions

use crate::error::{Error, Result};
use crate::geojson::{Feature, Geometry, Properties};
use crate::record::DatingRecord;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

/// A site with every dating record gathered for it
///
/// Identity within a store is the exact `name`; two sources spelling a site
/// differently produce two sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    #[serde(rename = "site")]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default)]
    pub dates: Vec<DatingRecord>,
}

impl Site {
    /// Load a hand-curated site definition
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        let site: Site = serde_json::from_str(&content)?;
        site.validate()?;
        Ok(site)
    }

    /// Save the site definition to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check that the site can be placed in the store
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidSite("site name is empty".to_string()));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidSite(format!(
                "latitude {} out of range for '{}'",
                self.latitude, self.name
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidSite(format!(
                "longitude {} out of range for '{}'",
                self.longitude, self.name
            )));
        }
        Ok(())
    }

    /// Render the site as a store feature
    pub fn to_feature(&self) -> Feature {
        let mut properties = Properties::new();
        properties.insert("site".into(), Value::String(self.name.clone()));
        if let Some(country) = &self.country {
            properties.insert("country".into(), Value::String(country.clone()));
        }
        if let Some(site_type) = &self.site_type {
            properties.insert("site_type".into(), Value::String(site_type.clone()));
        }
        if let Some(elevation) = self.elevation {
            properties.insert("elevation".into(), json!(elevation));
        }
        properties.insert("dates".into(), json!(self.dates));

        Feature::new(
            Some(Geometry::point(self.longitude, self.latitude)),
            properties,
        )
    }
}

/// Incrementally assembles a [`Site`]
#[derive(Debug, Clone)]
pub struct SiteBuilder {
    site: Site,
}

impl SiteBuilder {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            site: Site {
                name: name.into(),
                latitude,
                longitude,
                elevation: None,
                site_type: None,
                country: None,
                dates: Vec::new(),
            },
        }
    }

    pub fn elevation(mut self, elevation: f64) -> Self {
        self.site.elevation = Some(elevation);
        self
    }

    pub fn site_type(mut self, site_type: impl Into<String>) -> Self {
        self.site.site_type = Some(site_type.into());
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.site.country = Some(country.into());
        self
    }

    /// Add the records extracted from one source
    ///
    /// A determination already contributed by an earlier source is not
    /// added twice.
    pub fn add_extraction(mut self, records: impl IntoIterator<Item = DatingRecord>) -> Self {
        for record in records {
            if !self
                .site
                .dates
                .iter()
                .any(|existing| existing.same_determination(&record))
            {
                self.site.dates.push(record);
            }
        }
        self
    }

    /// Finish the site
    pub fn build(self) -> Result<Site> {
        self.site.validate()?;
        Ok(self.site)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DatingMethod;

    fn osl() -> DatingRecord {
        let mut r = DatingRecord::new(DatingMethod::Osl, 300.0, Some(30.0));
        r.reference = Some("Hublin et al. 2017 (Nature)".to_string());
        r
    }

    #[test]
    fn test_builder_merges_sources() {
        let tl = DatingRecord::new(DatingMethod::Tl, 255.0, Some(45.0));

        let site = SiteBuilder::new("Jebel Irhoud", 31.85, -8.883333)
            .site_type("Cave")
            .country("Morocco")
            .add_extraction(vec![osl()])
            .add_extraction(vec![osl(), tl])
            .build()
            .unwrap();

        assert_eq!(site.dates.len(), 2);
        assert_eq!(site.dates[0].dating_method, DatingMethod::Osl);
        assert_eq!(site.dates[1].dating_method, DatingMethod::Tl);
    }

    #[test]
    fn test_builder_rejects_bad_coordinates() {
        let err = SiteBuilder::new("Nowhere", 131.0, 0.0).build().unwrap_err();
        assert!(matches!(err, Error::InvalidSite(_)));

        assert!(SiteBuilder::new("  ", 0.0, 0.0).build().is_err());
    }

    #[test]
    fn test_to_feature() {
        let site = SiteBuilder::new("Jebel Irhoud", 31.483, -8.867)
            .elevation(585.0)
            .add_extraction(vec![osl()])
            .build()
            .unwrap();

        let feature = site.to_feature();
        let geometry = feature.geometry.as_ref().unwrap();
        assert_eq!(geometry.longitude(), Some(-8.867));
        assert_eq!(geometry.latitude(), Some(31.483));
        assert_eq!(feature.site_name(), Some("Jebel Irhoud"));
        assert_eq!(feature.properties["elevation"], 585.0);
        assert!(!feature.properties.contains_key("country"));
        assert_eq!(feature.dates(), site.dates);
    }

    #[test]
    fn test_site_json_uses_site_key() {
        let json = r#"{
            "site": "Jebel Irhoud",
            "latitude": 31.85,
            "longitude": -8.883333,
            "site_type": "Cave",
            "dates": [{"dating_method": "AAR", "age": 100.0, "error": 50.0, "unit": "ka"}]
        }"#;

        let site: Site = serde_json::from_str(json).unwrap();
        assert_eq!(site.name, "Jebel Irhoud");
        assert_eq!(site.country, None);
        assert_eq!(site.dates[0].dating_method, DatingMethod::Aar);
    }
}
