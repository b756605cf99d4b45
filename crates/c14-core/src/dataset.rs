//! External radiocarbon dataset: a site table and a date table joined on `Site_ID`
//!
//! The column layout is fixed. A missing column is a hard failure rather than
//! a silently emptier merge.

use crate::config::FieldMap;
use crate::error::Result;
use crate::merger::Sample;
use crate::table::{parse_csv, Row, Table};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

pub const SITE_TABLE: &str = "siteTable.csv";
pub const DATE_TABLE: &str = "dateTable.csv";

pub const JOIN_KEY: &str = "Site_ID";
pub const LAB_ID: &str = "Lab_ID";
pub const COUNTRY: &str = "Country";
pub const LATITUDE: &str = "Decimal_Degrees_Lat";
pub const LONGITUDE: &str = "Decimal_Degrees_Long";

/// Columns the site table must carry
pub const SITE_COLUMNS: &[&str] = &[JOIN_KEY, "Site_Name", COUNTRY, LATITUDE, LONGITUDE];
/// Columns the date table must carry
pub const DATE_COLUMNS: &[&str] = &[JOIN_KEY, LAB_ID];

/// The two tables of one dataset release
#[derive(Debug, Clone)]
pub struct Dataset {
    pub sites: Table,
    pub dates: Table,
}

/// Samples produced by a join, with the rows that fell out
#[derive(Debug, Clone, Default)]
pub struct Join {
    pub samples: Vec<Sample>,
    /// Sites kept by the country preselection
    pub sites_selected: usize,
    /// Date rows whose site lies outside the selected countries
    pub outside_selection: usize,
    /// Date rows whose `Site_ID` has no site row at all
    pub unmatched: usize,
}

impl Dataset {
    /// Wrap two tables after checking their layout
    ///
    /// Besides the fixed columns, every source column named by `field_map`
    /// must exist in one of the two tables.
    pub fn new(sites: Table, dates: Table, field_map: &FieldMap) -> Result<Self> {
        sites.require_columns(SITE_COLUMNS)?;
        dates.require_columns(DATE_COLUMNS)?;

        if let Some(missing) = field_map
            .sources()
            .find(|s| !sites.has_column(s) && !dates.has_column(s))
        {
            return Err(crate::Error::SchemaMismatch {
                table: format!("{} + {}", sites.source_name, dates.source_name),
                column: missing.to_string(),
            });
        }

        Ok(Self { sites, dates })
    }

    /// Read both tables from local CSV files
    pub fn load<P: AsRef<Path>>(site_table: P, date_table: P, field_map: &FieldMap) -> Result<Self> {
        Self::new(parse_csv(site_table)?, parse_csv(date_table)?, field_map)
    }

    /// Join date rows to their sites, keeping only the selected countries
    ///
    /// An empty `countries` list keeps every site. Rows that do not join are
    /// counted and left out; they are not errors.
    pub fn join(&self, countries: &[String]) -> Join {
        let mut all_sites: HashMap<&str, &Row> = HashMap::new();
        for row in &self.sites.rows {
            if let Some(id) = self.sites.get(row, JOIN_KEY) {
                all_sites.entry(id).or_insert(row);
            }
        }

        let selected: HashMap<&str, &Row> = all_sites
            .iter()
            .filter(|(_, row)| {
                countries.is_empty()
                    || self
                        .sites
                        .get(row, COUNTRY)
                        .is_some_and(|c| countries.iter().any(|wanted| wanted == c))
            })
            .map(|(id, row)| (*id, *row))
            .collect();

        let mut join = Join {
            sites_selected: selected.len(),
            ..Default::default()
        };

        for date_row in &self.dates.rows {
            let site_id = self.dates.get(date_row, JOIN_KEY).unwrap_or_default();
            let Some(site_row) = selected.get(site_id) else {
                if all_sites.contains_key(site_id) {
                    join.outside_selection += 1;
                } else {
                    debug!(site_id, "date row has no site row");
                    join.unmatched += 1;
                }
                continue;
            };
            join.samples.push(self.sample(site_row, date_row));
        }

        info!(
            sites = join.sites_selected,
            samples = join.samples.len(),
            outside = join.outside_selection,
            unmatched = join.unmatched,
            "joined dataset"
        );
        join
    }

    fn sample(&self, site_row: &Row, date_row: &Row) -> Sample {
        let mut columns = BTreeMap::new();
        collect_cells(&self.sites, site_row, &mut columns);
        collect_cells(&self.dates, date_row, &mut columns);

        let coordinate = |name: &str| {
            self.sites
                .get(site_row, name)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };

        Sample {
            lab_id: self.dates.get(date_row, LAB_ID).unwrap_or_default().to_string(),
            longitude: coordinate(LONGITUDE),
            latitude: coordinate(LATITUDE),
            columns,
        }
    }
}

// later tables overwrite earlier ones on a column name clash
fn collect_cells(table: &Table, row: &Row, into: &mut BTreeMap<String, String>) {
    for (name, cell) in table.columns.iter().zip(&row.cells) {
        if let Some(value) = cell {
            into.insert(name.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldKind, FieldMapping};
    use crate::table::parse_csv_str;
    use crate::Error;

    const SITES: &str = "\
Site_ID,Site_Name,Country,Decimal_Degrees_Lat,Decimal_Degrees_Long
1,Taforalt,MA,34.81,-2.41
2,Haua Fteah,LY,32.9,22.05
3,Foum Arguin,EH,,
";

    const DATES: &str = "\
Date_ID,Site_ID,Lab_ID,CRA,Error,Material,Species,Country
10,1,OxA-1,12600,50,bone,Ovis,XX
11,2,OxA-2,40000,900,charcoal,,
12,3,OxA-3,5100.0,60,shell,,
13,9,OxA-4,3000,30,bone,,
";

    fn dataset() -> Dataset {
        Dataset::new(
            parse_csv_str(SITES, SITE_TABLE).unwrap(),
            parse_csv_str(DATES, DATE_TABLE).unwrap(),
            &FieldMap::default(),
        )
        .unwrap()
    }

    fn countries(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_join_with_country_selection() {
        let join = dataset().join(&countries(&["MA", "EH"]));

        assert_eq!(join.sites_selected, 2);
        assert_eq!(join.outside_selection, 1);
        assert_eq!(join.unmatched, 1);

        let ids: Vec<&str> = join.samples.iter().map(|s| s.lab_id.as_str()).collect();
        assert_eq!(ids, vec!["OxA-1", "OxA-3"]);
    }

    #[test]
    fn test_join_builds_samples() {
        let join = dataset().join(&countries(&["MA", "EH"]));

        let taforalt = &join.samples[0];
        assert_eq!(taforalt.longitude, Some(-2.41));
        assert_eq!(taforalt.latitude, Some(34.81));
        assert_eq!(taforalt.columns["Site_Name"], "Taforalt");
        assert_eq!(taforalt.columns["Material"], "bone");
        // date table wins the clash
        assert_eq!(taforalt.columns["Country"], "XX");

        let foum = &join.samples[1];
        assert_eq!(foum.geometry(), None);
        assert_eq!(foum.mapped(&FieldMap::default())["bp"], 5100);
    }

    #[test]
    fn test_empty_selection_keeps_all() {
        let join = dataset().join(&[]);
        assert_eq!(join.samples.len(), 3);
        assert_eq!(join.unmatched, 1);
    }

    #[test]
    fn test_missing_fixed_column_fails() {
        let sites = parse_csv_str("Site_ID,Site_Name,Country\n", SITE_TABLE).unwrap();
        let dates = parse_csv_str(DATES, DATE_TABLE).unwrap();

        let err = Dataset::new(sites, dates, &FieldMap::default()).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { ref column, .. } if column == LATITUDE));
    }

    #[test]
    fn test_missing_mapped_column_fails() {
        let mut field_map = FieldMap::default();
        field_map
            .0
            .push(FieldMapping::new("Delta13C", "d13c", FieldKind::Number));

        let err = Dataset::new(
            parse_csv_str(SITES, SITE_TABLE).unwrap(),
            parse_csv_str(DATES, DATE_TABLE).unwrap(),
            &field_map,
        )
        .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { ref column, .. } if column == "Delta13C"));
    }
}
