use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use linkage_lib::geocoding::{CachedGeocoder, GazetteerProvider};
use linkage_lib::matching::manager::{run_resolution, ResolverServices, RunStats};
use linkage_lib::models::{CadastralRecord, ListingRecord, MatchResult, MatchedRow};
use linkage_lib::normalization::LocalityAliasTable;
use linkage_lib::quality::QualityReport;
use linkage_lib::utils::config::ResolverConfig;
use linkage_lib::utils::env::{load_env, load_env_from};
use linkage_lib::utils::progress_config::ProgressConfig;

#[derive(Parser)]
#[command(author, version, about = "Links market listings to cadastral records", long_about = None)]
struct Args {
    /// JSON array of listing records
    #[arg(long)]
    listings: PathBuf,

    /// JSON array of cadastral records
    #[arg(long)]
    cadastre: PathBuf,

    /// Where to write the matched table
    #[arg(long, default_value = "matched.json")]
    output: PathBuf,

    /// Where to write the quality report and run summary
    #[arg(long, default_value = "quality_report.json")]
    report: PathBuf,

    /// Locality alias table (JSON); overrides LOCALITY_ALIAS_PATH
    #[arg(long)]
    aliases: Option<PathBuf>,

    /// Offline gazetteer used to geocode records without coordinates
    #[arg(long)]
    gazetteer: Option<PathBuf>,

    /// Extra env file loaded before configuration is read
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[derive(Serialize)]
struct MatchedTable<'a> {
    rows: &'a [MatchedRow],
    results: &'a [MatchResult],
}

#[derive(Serialize)]
struct RunReport<'a> {
    report: &'a QualityReport,
    stats: &'a RunStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("Starting listing ↔ cadastre resolution");
    load_env();

    let args = Args::parse();
    if let Some(path) = &args.env_file {
        load_env_from(path)?;
    }

    let config = ResolverConfig::from_env().context("Invalid resolver configuration")?;
    config.log_config();

    let alias_path = args
        .aliases
        .clone()
        .or_else(|| std::env::var("LOCALITY_ALIAS_PATH").ok().map(PathBuf::from));
    let aliases = match alias_path {
        Some(path) => LocalityAliasTable::from_json_file(&path)?,
        None => {
            info!("No alias table given, using the built-in Barcelona table");
            LocalityAliasTable::barcelona()
        }
    };

    let progress = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, detailed={}",
        progress.enabled, progress.detailed
    );
    let mut services = ResolverServices::new(Arc::new(aliases)).with_progress(progress);

    if let Some(path) = &args.gazetteer {
        let gazetteer = GazetteerProvider::from_json_file(path)?;
        services = services.with_geocoder(Arc::new(CachedGeocoder::new(
            Arc::new(gazetteer),
            config.geocoder.clone(),
        )));
    } else if config.wants_coordinates() {
        warn!("Configuration needs coordinates but no gazetteer was given; only supplied coordinates will be used");
    }

    let start = Instant::now();
    let listings: Vec<ListingRecord> = read_json_array(&args.listings)?;
    let cadastre: Vec<CadastralRecord> = read_json_array(&args.cadastre)?;
    info!(
        "Loaded {} listings and {} cadastral records",
        listings.len(),
        cadastre.len()
    );

    let output = run_resolution(&listings, &cadastre, &config, &services)
        .await
        .context("Resolution run failed")?;

    write_json(
        &args.output,
        &MatchedTable {
            rows: &output.rows,
            results: &output.results,
        },
    )?;
    write_json(
        &args.report,
        &RunReport {
            report: &output.report,
            stats: &output.stats,
        },
    )?;

    info!(
        "Run {} finished in {:.2?}: {}/{} listings matched ({:.1}%)",
        output.stats.run_id,
        start.elapsed(),
        output.report.matched,
        output.report.total_listings,
        output.report.match_rate * 100.0
    );
    for warning in &output.report.warnings {
        warn!("Quality: {}", warning);
    }
    Ok(())
}

fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}
