//! Whole-store runs: read the store, transform in memory, write it back once
//!
//! Every fallible step happens before the single save, so a failed run
//! leaves the store file as it was. Runs against the same store must not
//! overlap; nothing here locks the file.

use crate::config::EnrichConfig;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::fetch::fetch_dataset;
use crate::geojson::FeatureCollection;
use crate::merger::{merge, Incoming, MergeReport};
use crate::normalize::{normalize, NormalizeReport};
use crate::site::Site;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where an enrichment run reads the external dataset from
#[derive(Debug, Clone)]
pub enum DatasetSource {
    /// Zip archive fetched over HTTP
    Remote(String),
    /// Site and date tables on disk
    Local { site_table: PathBuf, date_table: PathBuf },
}

impl DatasetSource {
    /// Human-readable origin for logs and the run log
    pub fn describe(&self) -> String {
        match self {
            DatasetSource::Remote(url) => url.clone(),
            DatasetSource::Local {
                site_table,
                date_table,
            } => format!("{} + {}", site_table.display(), date_table.display()),
        }
    }

    fn load(&self, config: &EnrichConfig) -> Result<Dataset> {
        match self {
            DatasetSource::Remote(url) => fetch_dataset(url, &config.field_map),
            DatasetSource::Local {
                site_table,
                date_table,
            } => Dataset::load(site_table, date_table, &config.field_map),
        }
    }
}

/// Outcome of a run that may or may not have written the store
#[derive(Debug, Clone)]
pub struct RunOutcome<R> {
    pub report: R,
    /// Whether the output file was written
    pub written: bool,
    /// Feature count of the resulting collection
    pub features: usize,
}

/// Enrich a store with lab samples from an external dataset
///
/// Nothing is written when the country preselection leaves no site or when
/// the merge changes nothing.
pub fn enrich(
    store: &Path,
    output: &Path,
    source: &DatasetSource,
    config: &EnrichConfig,
) -> Result<RunOutcome<MergeReport>> {
    let mut collection = FeatureCollection::load(store)?;
    let dataset = source.load(config)?;
    let join = dataset.join(&config.countries);

    if join.sites_selected == 0 {
        info!(countries = ?config.countries, "no site matches the country selection");
        return Ok(RunOutcome {
            report: MergeReport::default(),
            written: false,
            features: collection.features.len(),
        });
    }

    let incoming = join.samples.into_iter().map(Incoming::Sample);
    let report = merge(&mut collection, incoming, &config.field_map);
    let written = write_if(report.changed() || store != output, &collection, output)?;

    Ok(RunOutcome {
        report,
        written,
        features: collection.features.len(),
    })
}

/// Append a hand-curated site to a store
pub fn add_site(store: &Path, output: &Path, site: Site) -> Result<RunOutcome<MergeReport>> {
    site.validate()?;
    let mut collection = FeatureCollection::load(store)?;
    let report = merge(
        &mut collection,
        [Incoming::Site(site)],
        &Default::default(),
    );
    collection.save(output)?;

    Ok(RunOutcome {
        report,
        written: true,
        features: collection.features.len(),
    })
}

/// Migrate legacy radiocarbon properties of a store
pub fn normalize_store(store: &Path, output: &Path) -> Result<RunOutcome<NormalizeReport>> {
    let mut collection = FeatureCollection::load(store)?;
    let before = collection.clone();
    let report = normalize(&mut collection);
    let written = write_if(collection != before || store != output, &collection, output)?;

    Ok(RunOutcome {
        report,
        written,
        features: collection.features.len(),
    })
}

fn write_if(condition: bool, collection: &FeatureCollection, output: &Path) -> Result<bool> {
    if condition {
        collection.save(output)?;
        info!(path = %output.display(), features = collection.features.len(), "store written");
    }
    Ok(condition)
}
