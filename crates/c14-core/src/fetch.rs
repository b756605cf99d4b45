//! Retrieval of the external dataset archive
//!
//! One blocking request, no retries: a failed download ends the run before
//! anything is merged.

use crate::config::FieldMap;
use crate::dataset::{Dataset, DATE_TABLE, SITE_TABLE};
use crate::error::{Error, Result};
use crate::table::{parse_csv_reader, Table};
use std::io::{Cursor, Read, Seek};
use tracing::info;
use zip::ZipArchive;

/// Download the archive at `url`
pub fn fetch_archive(url: &str) -> Result<Vec<u8>> {
    info!(url, "downloading dataset archive");
    let fetch_err = |e| Error::Fetch {
        url: url.to_string(),
        source: e,
    };

    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(fetch_err)?;
    let bytes = response.bytes().map_err(fetch_err)?;

    info!(bytes = bytes.len(), "archive downloaded");
    Ok(bytes.to_vec())
}

/// Read the site and date tables out of an archive
pub fn read_archive(bytes: &[u8], field_map: &FieldMap) -> Result<Dataset> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let sites = read_entry(&mut archive, SITE_TABLE)?;
    let dates = read_entry(&mut archive, DATE_TABLE)?;
    Dataset::new(sites, dates, field_map)
}

/// Download and read a dataset release
pub fn fetch_dataset(url: &str, field_map: &FieldMap) -> Result<Dataset> {
    let bytes = fetch_archive(url)?;
    read_archive(&bytes, field_map)
}

/// Parse the CSV entry whose file name is `name`, in any folder of the archive
fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Table> {
    let entry_name = archive
        .file_names()
        .find(|entry| entry.rsplit('/').next() == Some(name))
        .map(str::to_string)
        .ok_or_else(|| Error::ArchiveEntryMissing(name.to_string()))?;

    let entry = archive.by_name(&entry_name)?;
    parse_csv_reader(entry, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const SITES: &str = "Site_ID,Site_Name,Country,Decimal_Degrees_Lat,Decimal_Degrees_Long\n1,Taforalt,MA,34.81,-2.41\n";
    const DATES: &str = "Site_ID,Lab_ID,CRA,Error,Material,Species\n1,OxA-1,12600,50,bone,\n";

    #[test]
    fn test_read_archive_in_subfolder() {
        let bytes = archive(&[
            ("data_v1.0.3/siteTable.csv", SITES),
            ("data_v1.0.3/dateTable.csv", DATES),
            ("data_v1.0.3/README.md", "readme"),
        ]);

        let dataset = read_archive(&bytes, &FieldMap::default()).unwrap();
        assert_eq!(dataset.sites.row_count(), 1);
        assert_eq!(dataset.dates.row_count(), 1);
    }

    #[test]
    fn test_missing_entry() {
        let bytes = archive(&[("siteTable.csv", SITES)]);

        let err = read_archive(&bytes, &FieldMap::default()).unwrap_err();
        assert!(matches!(err, Error::ArchiveEntryMissing(ref n) if n == DATE_TABLE));
    }

    #[test]
    fn test_not_a_zip() {
        let err = read_archive(b"<html>404</html>", &FieldMap::default()).unwrap_err();
        assert!(matches!(err, Error::Archive(_)));
    }
}
