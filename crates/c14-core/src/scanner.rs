//! Directory scanner for discovering dating report pages

use crate::error::{Error, Result};
use crate::extractor::extract;
use crate::record::DatingRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// File extensions treated as report pages
const REPORT_EXTENSIONS: &[&str] = &["html", "htm"];

/// Records extracted from one report file
#[derive(Debug, Clone)]
pub struct ReportExtraction {
    pub path: PathBuf,
    pub records: Vec<DatingRecord>,
}

/// Find report pages under one or more roots, sorted by path
///
/// A root that is itself a file is returned as-is.
pub fn scan_reports<P: AsRef<Path>>(roots: &[P]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for root in roots {
        let root = root.as_ref();

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry?;
            let path = entry.path();

            if entry.file_type().is_file() && is_report(path) {
                found.push(path.to_path_buf());
            }
        }
    }

    found.sort();
    found.dedup();
    Ok(found)
}

fn is_report(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            REPORT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Read and extract one report file
pub fn extract_file<P: AsRef<Path>>(path: P) -> Result<ReportExtraction> {
    let path = path.as_ref();
    let html = fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let records = extract(&html);
    debug!(path = %path.display(), records = records.len(), "extracted report");
    Ok(ReportExtraction {
        path: path.to_path_buf(),
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"
        <div class="dating-method tl">
          <div class="data-row"><span class="data-label">Mean Age:</span><span class="data-value">255 ± 45 ka</span></div>
        </div>"#;

    #[test]
    fn test_scan_finds_reports_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("sites").join("morocco");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("v2.html"), REPORT).unwrap();
        fs::write(dir.path().join("index.HTM"), "").unwrap();
        fs::write(dir.path().join("data.json"), "{}").unwrap();

        let found = scan_reports(&[dir.path()]).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| is_report(p)));
    }

    #[test]
    fn test_scan_accepts_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("v2.html");
        fs::write(&file, REPORT).unwrap();

        let found = scan_reports(&[&file, &file]).unwrap();
        assert_eq!(found, vec![file]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_reports(&[dir.path().join("absent")]).is_err());
    }

    #[test]
    fn test_extract_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("v2.html");
        fs::write(&file, REPORT).unwrap();

        let extraction = extract_file(&file).unwrap();
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].age, 255.0);
    }

    #[test]
    fn test_is_report() {
        assert!(is_report(Path::new("a/b/report.html")));
        assert!(!is_report(Path::new("a/b/report.html.bak")));
        assert!(!is_report(Path::new("README")));
    }
}
