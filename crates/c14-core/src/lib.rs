//! c14-core: Core library for aggregating absolute-dating evidence
//!
//! This library provides functionality to:
//! - Parse free-text age descriptions into (age, error) estimates
//! - Extract per-method dating records from hand-authored report pages
//! - Assemble sites from one or more report extractions
//! - Migrate legacy radiocarbon-only features into the `dates` array
//! - Merge external lab-sample datasets into the GeoJSON store without
//!   overwriting curated fields

pub mod age;
pub mod config;
pub mod dataset;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod geojson;
pub mod history;
pub mod html;
pub mod merger;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod scanner;
pub mod site;
pub mod table;

pub use age::{parse_age, AgeEstimate};
pub use config::{EnrichConfig, FieldKind, FieldMap, FieldMapping};
pub use dataset::{Dataset, Join};
pub use error::{Error, Result};
pub use extractor::{extract, method_blocks, record_from_block, MethodBlock};
pub use geojson::{Feature, FeatureCollection, Geometry, Properties};
pub use history::{create_run_entry, RunEntry, RunLog};
pub use merger::{fill_gaps, insert_site, merge, Filled, Incoming, MergeReport, Sample};
pub use normalize::{normalize, NormalizeReport};
pub use pipeline::{DatasetSource, RunOutcome};
pub use record::{DatingMethod, DatingRecord, Unit};
pub use scanner::{extract_file, scan_reports, ReportExtraction};
pub use site::{Site, SiteBuilder};
pub use table::{parse_csv, parse_csv_str, Table};
