//! c14 CLI
//!
//! Command-line tool for extracting dating evidence from reports and merging
//! it into the GeoJSON store read by the map viewer.

use c14_core::pipeline::{self, DatasetSource, RunOutcome};
use c14_core::{
    create_run_entry, extract_file, parse_age, scan_reports, DatingMethod, EnrichConfig,
    FeatureCollection, MergeReport, RunLog, Site, SiteBuilder,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "c14")]
#[command(about = "Dating evidence extraction and GeoJSON store maintenance", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Report pages to read, as files or directories
#[derive(Args)]
struct ReportArgs {
    /// Report files
    #[arg(short, long)]
    file: Vec<PathBuf>,

    /// Directories scanned recursively for .html/.htm reports
    #[arg(short, long)]
    root: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a free-text age description
    ParseAge {
        /// Text such as "300 ± 30 ka" or "190 - 320"
        text: String,
    },

    /// Extract dating records from report pages and print them as JSON
    Extract {
        #[command(flatten)]
        reports: ReportArgs,

        /// Only print records of this method (C14, OSL, TL, U-Series, ...)
        #[arg(short, long)]
        method: Option<DatingMethod>,
    },

    /// Build a site definition from report pages
    BuildSite {
        /// Site name, matched exactly against the store
        #[arg(short, long)]
        name: String,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Elevation in metres
        #[arg(long)]
        elevation: Option<f64>,

        /// Site type (e.g. Cave, Open-air)
        #[arg(long)]
        site_type: Option<String>,

        #[arg(long)]
        country: Option<String>,

        #[command(flatten)]
        reports: ReportArgs,

        /// Output path for the site JSON
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Append a hand-curated site to the store
    AddSite {
        /// GeoJSON store
        #[arg(short, long)]
        store: PathBuf,

        /// Site JSON (see build-site)
        #[arg(long)]
        site: PathBuf,

        /// Write here instead of replacing the store
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run log to append to
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Fold legacy bp/std properties into the dates array
    Normalize {
        /// GeoJSON store
        #[arg(short, long)]
        store: PathBuf,

        /// Write here instead of replacing the store
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge an external radiocarbon dataset into the store
    Enrich {
        /// GeoJSON store
        #[arg(short, long)]
        store: PathBuf,

        /// Enrichment config (JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Local site table instead of downloading the archive
        #[arg(long, requires = "date_table")]
        site_table: Option<PathBuf>,

        /// Local date table instead of downloading the archive
        #[arg(long, requires = "site_table")]
        date_table: Option<PathBuf>,

        /// Write here instead of replacing the store
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run log to append to
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Check that the store loads and show its size
    Verify {
        /// GeoJSON store
        #[arg(short, long)]
        store: PathBuf,

        /// Run log to report the last run from
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Write the default enrichment config
    InitConfig {
        /// Output path for the config file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> c14_core::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::ParseAge { text } => cmd_parse_age(&text),
        Commands::Extract { reports, method } => cmd_extract(&reports, method),
        Commands::BuildSite {
            name,
            lat,
            lon,
            elevation,
            site_type,
            country,
            reports,
            output,
        } => {
            let mut builder = SiteBuilder::new(name, lat, lon);
            if let Some(elevation) = elevation {
                builder = builder.elevation(elevation);
            }
            if let Some(site_type) = site_type {
                builder = builder.site_type(site_type);
            }
            if let Some(country) = country {
                builder = builder.country(country);
            }
            cmd_build_site(builder, &reports, &output)
        }
        Commands::AddSite {
            store,
            site,
            output,
            history,
        } => cmd_add_site(&store, &site, output.as_deref(), history.as_deref()),
        Commands::Normalize { store, output } => cmd_normalize(&store, output.as_deref()),
        Commands::Enrich {
            store,
            config,
            site_table,
            date_table,
            output,
            history,
        } => {
            let config = match config {
                Some(path) => EnrichConfig::load(path)?,
                None => EnrichConfig::default(),
            };
            let source = match (site_table, date_table) {
                (Some(site_table), Some(date_table)) => DatasetSource::Local {
                    site_table,
                    date_table,
                },
                _ => DatasetSource::Remote(config.source_url.clone()),
            };
            cmd_enrich(&store, &config, &source, output.as_deref(), history.as_deref())
        }
        Commands::Verify { store, history } => cmd_verify(&store, history.as_deref()),
        Commands::InitConfig { output } => cmd_init_config(&output),
    }
}

fn cmd_parse_age(text: &str) -> c14_core::Result<()> {
    match parse_age(text) {
        Some(estimate) => {
            println!("age:   {}", estimate.age);
            println!("error: {}", estimate.error);
        }
        None => println!("No age found in '{}'", text),
    }
    Ok(())
}

fn report_paths(reports: &ReportArgs) -> c14_core::Result<Vec<PathBuf>> {
    let mut paths = reports.file.clone();
    if !reports.root.is_empty() {
        paths.extend(scan_reports(reports.root.as_slice())?);
    }
    Ok(paths)
}

fn cmd_extract(reports: &ReportArgs, method: Option<DatingMethod>) -> c14_core::Result<()> {
    let paths = report_paths(reports)?;
    if paths.is_empty() {
        println!("No report files given.");
        return Ok(());
    }

    let mut all = serde_json::Map::new();
    for path in &paths {
        let mut extraction = extract_file(path)?;
        if let Some(method) = method {
            extraction.records.retain(|r| r.dating_method == method);
        }
        eprintln!(
            "{}: {} record(s)",
            extraction.path.display(),
            extraction.records.len()
        );
        all.insert(
            extraction.path.display().to_string(),
            serde_json::to_value(&extraction.records)?,
        );
    }

    println!("{}", serde_json::to_string_pretty(&all)?);
    Ok(())
}

fn cmd_build_site(
    mut builder: SiteBuilder,
    reports: &ReportArgs,
    output: &Path,
) -> c14_core::Result<()> {
    for path in report_paths(reports)? {
        let extraction = extract_file(&path)?;
        println!(
            "  {} ({} records)",
            extraction.path.display(),
            extraction.records.len()
        );
        builder = builder.add_extraction(extraction.records);
    }

    let site = builder.build()?;
    site.save(output)?;

    println!("Created site file: {}", output.display());
    println!("Site: {}", site.name);
    println!("Dates: {}", site.dates.len());
    for record in &site.dates {
        println!(
            "  {:<14} {} ± {} {}",
            record.dating_method.as_str(),
            record.age,
            record.error.map_or_else(|| "?".to_string(), |e| e.to_string()),
            record.unit
        );
    }
    println!();
    println!("Review the file, then run:");
    println!("  c14 add-site --store <store> --site {}", output.display());

    Ok(())
}

fn cmd_add_site(
    store: &Path,
    site_path: &Path,
    output: Option<&Path>,
    history: Option<&Path>,
) -> c14_core::Result<()> {
    let site = Site::load(site_path)?;
    let name = site.name.clone();
    let output = output.unwrap_or(store);

    let outcome = pipeline::add_site(store, output, site)?;

    println!("Added site '{}' to {}", name, output.display());
    println!("Features: {}", outcome.features);

    record_run(history, "add-site", output, &site_path.display().to_string(), &outcome)
}

fn cmd_normalize(store: &Path, output: Option<&Path>) -> c14_core::Result<()> {
    let output = output.unwrap_or(store);
    let outcome = pipeline::normalize_store(store, output)?;
    let report = &outcome.report;

    println!("Normalization report:");
    println!("  {} features", report.features);
    println!("  {} C14 dates migrated", report.migrated);
    println!("  {} features cleaned of legacy fields", report.cleaned);

    if outcome.written {
        println!("Wrote {}", output.display());
    } else {
        println!("Store already normalized; nothing written.");
    }
    Ok(())
}

fn cmd_enrich(
    store: &Path,
    config: &EnrichConfig,
    source: &DatasetSource,
    output: Option<&Path>,
    history: Option<&Path>,
) -> c14_core::Result<()> {
    let output = output.unwrap_or(store);
    println!("Enriching {} from {}", store.display(), source.describe());

    let outcome = pipeline::enrich(store, output, source, config)?;
    let report = &outcome.report;

    println!();
    println!("--- Enrichment Report ---");
    println!("New sites added:          {}", report.new_site_names.len());
    println!("New samples added:        {}", report.inserted);
    println!("Existing samples updated: {}", report.updated);
    println!("Samples unchanged:        {}", report.unchanged);
    println!("Rows without lab id:      {}", report.skipped);
    println!("-------------------------");

    if !outcome.written {
        println!("Nothing to write.");
        return Ok(());
    }
    println!("Wrote {} features to {}", outcome.features, output.display());

    record_run(history, "enrich", output, &source.describe(), &outcome)
}

fn record_run(
    history: Option<&Path>,
    command: &str,
    store: &Path,
    source: &str,
    outcome: &RunOutcome<MergeReport>,
) -> c14_core::Result<()> {
    let Some(history) = history else {
        return Ok(());
    };
    let entry = create_run_entry(command, store, source, &outcome.report, outcome.features);
    RunLog::append(history, entry)?;
    println!("Logged run to {}", history.display());
    Ok(())
}

fn cmd_verify(store: &Path, history: Option<&Path>) -> c14_core::Result<()> {
    let collection = FeatureCollection::load(store)?;

    let located = collection
        .features
        .iter()
        .filter(|f| f.geometry.is_some())
        .count();
    let with_labnr = collection
        .features
        .iter()
        .filter(|f| f.labnr().is_some())
        .count();
    let off_map = collection
        .features
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .filter(|g| {
            let lon = g.longitude().filter(|lon| (-180.0..=180.0).contains(lon));
            let lat = g.latitude().filter(|lat| (-90.0..=90.0).contains(lat));
            lon.is_none() || lat.is_none()
        })
        .count();
    let legacy = collection
        .features
        .iter()
        .filter(|f| f.properties.contains_key("bp"))
        .count();

    println!("Successfully loaded {}", store.display());
    println!("Total features: {}", collection.features.len());
    println!("  with location:  {}", located);
    println!("  bad coordinates: {}", off_map);
    println!("  with lab id:    {}", with_labnr);
    println!("  legacy bp/std:  {}", legacy);
    println!("Total dates: {}", collection.date_count());

    if let Some(history) = history {
        match RunLog::load(history)?.last_for_store(store) {
            Some(last) => println!(
                "Last run: {} {} from {} (+{} inserted, {} updated)",
                last.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                last.command,
                last.source,
                last.counts.inserted,
                last.counts.updated
            ),
            None => println!("No recorded run for this store."),
        }
    }

    Ok(())
}

fn cmd_init_config(output: &Path) -> c14_core::Result<()> {
    let config = EnrichConfig::default();
    config.save(output)?;

    println!("Created config file: {}", output.display());
    println!("Source: {}", config.source_url);
    println!("Countries: {}", config.countries.join(", "));
    println!("Field map:");
    for mapping in config.field_map.iter() {
        println!("  {} -> {} ({:?})", mapping.source, mapping.dest, mapping.kind);
    }
    println!();
    println!("Edit the file, then run:");
    println!("  c14 enrich --store <store> --config {}", output.display());

    Ok(())
}
