//! Dating record types shared by the extractor, the site builder and the store

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A chronometric technique
///
/// The serialized names are the vocabulary the map viewer renders; a new
/// variant has to be added there as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatingMethod {
    #[serde(rename = "C14")]
    C14,
    #[serde(rename = "OSL")]
    Osl,
    #[serde(rename = "TL")]
    Tl,
    #[serde(rename = "U-Series")]
    USeries,
    #[serde(rename = "ESR")]
    Esr,
    #[serde(rename = "Paleomagnetic")]
    Paleomagnetic,
    #[serde(rename = "AAR")]
    Aar,
}

impl DatingMethod {
    /// All known methods, in display order
    pub const ALL: [DatingMethod; 7] = [
        DatingMethod::C14,
        DatingMethod::Osl,
        DatingMethod::Tl,
        DatingMethod::USeries,
        DatingMethod::Esr,
        DatingMethod::Paleomagnetic,
        DatingMethod::Aar,
    ];

    /// The canonical name written to the store
    pub fn as_str(&self) -> &'static str {
        match self {
            DatingMethod::C14 => "C14",
            DatingMethod::Osl => "OSL",
            DatingMethod::Tl => "TL",
            DatingMethod::USeries => "U-Series",
            DatingMethod::Esr => "ESR",
            DatingMethod::Paleomagnetic => "Paleomagnetic",
            DatingMethod::Aar => "AAR",
        }
    }

    /// Unit ages of this method family are reported in
    pub fn default_unit(&self) -> Unit {
        match self {
            DatingMethod::C14 => Unit::Bp,
            _ => Unit::Ka,
        }
    }
}

impl fmt::Display for DatingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatingMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown dating method '{}'", s))
    }
}

/// Unit of an age estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    /// Thousands of years
    #[serde(rename = "ka")]
    Ka,
    /// Radiocarbon years before present
    #[serde(rename = "BP")]
    Bp,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Ka => f.write_str("ka"),
            Unit::Bp => f.write_str("BP"),
        }
    }
}

/// One age determination for a site
///
/// `age` is not optional: a block or row without a usable age never becomes
/// a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatingRecord {
    pub dating_method: DatingMethod,
    pub age: f64,
    pub error: Option<f64>,
    pub unit: Unit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub laboratory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_id: Option<String>,
}

impl DatingRecord {
    /// Create a record in the method's default unit
    pub fn new(dating_method: DatingMethod, age: f64, error: Option<f64>) -> Self {
        Self {
            dating_method,
            age,
            error,
            unit: dating_method.default_unit(),
            reference: None,
            laboratory: None,
            material: None,
            samples: None,
            species: None,
            lab_id: None,
        }
    }

    /// Whether two records describe the same determination
    ///
    /// Used to collapse the same date reported by several sources.
    pub fn same_determination(&self, other: &DatingRecord) -> bool {
        self.dating_method == other.dating_method
            && self.age == other.age
            && self.error == other.error
            && self.unit == other.unit
            && self.reference == other.reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_wire_names() {
        let json = serde_json::to_string(&DatingMethod::USeries).unwrap();
        assert_eq!(json, "\"U-Series\"");

        let method: DatingMethod = serde_json::from_str("\"Paleomagnetic\"").unwrap();
        assert_eq!(method, DatingMethod::Paleomagnetic);
    }

    #[test]
    fn test_method_from_str_matches_wire_names() {
        for method in DatingMethod::ALL {
            assert_eq!(method.as_str().parse::<DatingMethod>().unwrap(), method);
        }
        assert!("Carbon".parse::<DatingMethod>().is_err());
    }

    #[test]
    fn test_default_units() {
        assert_eq!(DatingMethod::C14.default_unit(), Unit::Bp);
        assert_eq!(DatingMethod::Osl.default_unit(), Unit::Ka);
        assert_eq!(DatingMethod::Aar.default_unit(), Unit::Ka);
    }

    #[test]
    fn test_record_omits_absent_fields() {
        let mut record = DatingRecord::new(DatingMethod::Tl, 255.0, Some(45.0));
        record.laboratory = Some("Wollongong University, Australia".to_string());

        let value = serde_json::to_value(&record).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj["dating_method"], "TL");
        assert_eq!(obj["unit"], "ka");
        assert_eq!(obj["laboratory"], "Wollongong University, Australia");
        assert!(!obj.contains_key("reference"));
        assert!(!obj.contains_key("lab_id"));
    }

    #[test]
    fn test_record_requires_age() {
        let json = r#"{"dating_method":"OSL","age":null,"error":null,"unit":"ka"}"#;
        assert!(serde_json::from_str::<DatingRecord>(json).is_err());
    }
}
