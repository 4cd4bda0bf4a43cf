// src/matching/manager.rs - Resolution pipeline coordination
use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::candidate_generation::{generate_candidates, CandidateBlocks};
use crate::geocoding::{CachedGeocoder, GeocoderStats};
use crate::matching::aggregate::aggregate_buildings;
use crate::matching::matcher::{assign, Assignment};
use crate::matching::scorer::{BlockScores, ScoringPlan};
use crate::models::{
    CadastralRecord, Granularity, ListingRecord, MatchReason, MatchResult, MatchStrategy,
    MatchedRow, PreparedCadastral, PreparedListing,
};
use crate::normalization::{prepare_cadastral, prepare_listing, LocalityAliasTable, MalformedTally};
use crate::quality::{build_report, QualityReport};
use crate::utils::config::ResolverConfig;
use crate::utils::errors::ResolverError;
use crate::utils::logging::MatchingLogger;
use crate::utils::progress_config::ProgressConfig;
use crate::utils::signature::run_signature;

/// Listings handed to one blocking scoring task, at minimum.
const MIN_LISTINGS_PER_CHUNK: usize = 64;

/// Collaborators injected into a run. Built once, shared by reference.
#[derive(Clone)]
pub struct ResolverServices {
    pub aliases: Arc<LocalityAliasTable>,
    pub geocoder: Option<Arc<CachedGeocoder>>,
    pub progress: ProgressConfig,
}

impl ResolverServices {
    pub fn new(aliases: Arc<LocalityAliasTable>) -> Self {
        Self {
            aliases,
            geocoder: None,
            progress: ProgressConfig::disabled(),
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<CachedGeocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_progress(mut self, progress: ProgressConfig) -> Self {
        self.progress = progress;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseTimings {
    pub normalization_secs: f64,
    pub geocoding_secs: f64,
    pub blocking_secs: f64,
    pub scoring_secs: f64,
    pub assignment_secs: f64,
    pub building_fallback_secs: f64,
    pub report_secs: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// SHA-256 over both input tables and the configuration.
    pub input_signature: String,
    pub strategy: MatchStrategy,
    pub listings: usize,
    pub cadastral_records: usize,
    pub targets: usize,
    pub candidate_pairs: usize,
    pub listings_without_candidates: usize,
    pub discarded_beyond_distance: usize,
    pub unresolved_localities: usize,
    pub malformed_fields: usize,
    pub building_fallback_matches: usize,
    pub geocoder: Option<GeocoderStats>,
    pub timings: PhaseTimings,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionOutput {
    /// One row per input listing, in input order.
    pub rows: Vec<MatchedRow>,
    pub results: Vec<MatchResult>,
    pub report: QualityReport,
    pub stats: RunStats,
}

struct PassOutcome {
    blocks: Arc<CandidateBlocks>,
    assignments: Vec<Assignment>,
    beyond_distance: usize,
    blocking_secs: f64,
    scoring_secs: f64,
    assignment_secs: f64,
}

/// Where a listing's final assignment came from.
struct Resolution<'a> {
    assignment: Assignment,
    targets: &'a [PreparedCadastral],
    reason: MatchReason,
    candidate_count: usize,
}

/// Runs the whole resolution: normalize, geocode (when needed), block,
/// score, assign, optionally retry against buildings, report.
///
/// Only an invalid configuration or an empty input table is fatal; every
/// other problem ends up as a per-listing reason in the output.
pub async fn run_resolution(
    listings: &[ListingRecord],
    cadastre: &[CadastralRecord],
    config: &ResolverConfig,
    services: &ResolverServices,
) -> Result<ResolutionOutput, ResolverError> {
    config.validate()?;
    if listings.is_empty() {
        return Err(ResolverError::InputUnavailable("listing table is empty".to_string()));
    }
    if cadastre.is_empty() {
        return Err(ResolverError::InputUnavailable("cadastral table is empty".to_string()));
    }

    let run_id = Uuid::new_v4().to_string();
    let started_at = Utc::now();
    let input_signature = run_signature(listings, cadastre, config);
    let logger = MatchingLogger::new(config.strategy_tag());
    let progress = &services.progress;
    let mut timings = PhaseTimings::default();

    logger.log_start(&run_id, listings.len(), cadastre.len());
    debug!("Input signature: {}", input_signature);

    // Normalization
    logger.log_phase("Normalization", Some("canonical localities and numeric fields"));
    let phase = Instant::now();
    let mut tally = MalformedTally::default();
    let mut prepared: Vec<PreparedListing> = listings
        .iter()
        .enumerate()
        .map(|(i, l)| prepare_listing(i, l, &services.aliases, &mut tally))
        .collect();
    let mut units: Vec<PreparedCadastral> = cadastre
        .iter()
        .map(|c| prepare_cadastral(c, &services.aliases, &mut tally))
        .collect();
    let unresolved_localities = prepared.iter().filter(|l| !l.key.locality_resolved).count();
    logger.log_normalization(unresolved_localities, tally.fields);
    timings.normalization_secs = phase.elapsed().as_secs_f64();

    // Geocoding
    if config.wants_coordinates() {
        let phase = Instant::now();
        match &services.geocoder {
            Some(geocoder) => {
                logger.log_phase("Geocoding", Some("records without coordinates"));
                geocode_missing(&mut prepared, listings, &mut units, geocoder, &logger, progress).await;
            }
            None => logger.log_warning(
                "Strategy uses coordinates but no geocoder was provided; only supplied coordinates are used",
            ),
        }
        timings.geocoding_secs = phase.elapsed().as_secs_f64();
    }

    let prepared = Arc::new(prepared);
    let units = Arc::new(units);
    let targets = match config.granularity() {
        Granularity::Unit => units.clone(),
        Granularity::Building => {
            let buildings = aggregate_buildings(&units);
            logger.log_debug(&format!(
                "Aggregated {} units into {} buildings",
                units.len(),
                buildings.len()
            ));
            Arc::new(buildings)
        }
    };

    // Primary pass
    logger.log_phase("Matching", Some(config.strategy_tag().as_str()));
    let plan = ScoringPlan::new(config.base_strategy(), config.strategy_tag(), config);
    let exclusive = config.granularity() == Granularity::Unit;
    let primary = run_pass(
        prepared.clone(),
        targets.clone(),
        plan,
        exclusive,
        config,
        &logger,
        progress,
    )
    .await?;
    timings.blocking_secs = primary.blocking_secs;
    timings.scoring_secs = primary.scoring_secs;
    timings.assignment_secs = primary.assignment_secs;

    let mut discarded_beyond_distance = primary.beyond_distance;
    let candidate_pairs = primary.blocks.total_candidates();
    let listings_without_candidates = primary.blocks.empty_blocks();

    let buildings: Arc<Vec<PreparedCadastral>>;
    let mut resolutions: Vec<Resolution> = primary
        .assignments
        .into_iter()
        .map(|assignment| {
            let candidate_count = primary.blocks.per_listing[assignment.listing_index].candidates.len();
            Resolution {
                reason: assignment.reason,
                assignment,
                targets: targets.as_slice(),
                candidate_count,
            }
        })
        .collect();

    // Building fallback pass
    let mut building_fallback_matches = 0;
    if config.building_fallback && config.granularity() == Granularity::Unit {
        let retry: Vec<usize> = resolutions
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                matches!(
                    r.reason,
                    MatchReason::NoCandidates | MatchReason::BelowThreshold | MatchReason::CandidatesClaimed
                )
            })
            .map(|(i, _)| i)
            .collect();

        if !retry.is_empty() {
            let phase = Instant::now();
            let fallback_logger = MatchingLogger::new(MatchStrategy::BuildingAggregate);
            fallback_logger.log_phase(
                "Building fallback",
                Some(&format!("{} unmatched listings", retry.len())),
            );

            // re-indexed so the pass sees a dense listing slice
            let subset: Vec<PreparedListing> = retry
                .iter()
                .enumerate()
                .map(|(pos, &original)| {
                    let mut listing = prepared[original].clone();
                    listing.index = pos;
                    listing
                })
                .collect();
            buildings = Arc::new(aggregate_buildings(&units));
            let plan = ScoringPlan::new(config.aggregate_base, MatchStrategy::BuildingAggregate, config);
            let fallback = run_pass(
                Arc::new(subset),
                buildings.clone(),
                plan,
                false,
                config,
                &fallback_logger,
                progress,
            )
            .await?;
            discarded_beyond_distance += fallback.beyond_distance;

            for (pos, mut assignment) in fallback.assignments.into_iter().enumerate() {
                if assignment.accepted.is_none() {
                    continue;
                }
                let original = retry[pos];
                assignment.listing_index = original;
                resolutions[original] = Resolution {
                    reason: MatchReason::MatchedBuildingFallback,
                    candidate_count: fallback.blocks.per_listing[pos].candidates.len(),
                    assignment,
                    targets: buildings.as_slice(),
                };
                building_fallback_matches += 1;
            }
            info!(
                "[BUILDING] 🏢 Building fallback matched {} of {} listings",
                building_fallback_matches,
                retry.len()
            );
            timings.building_fallback_secs = phase.elapsed().as_secs_f64();
        }
    }

    let mut outcomes: BTreeMap<MatchReason, usize> = BTreeMap::new();
    for r in &resolutions {
        *outcomes.entry(r.reason).or_insert(0) += 1;
    }
    logger.log_assignment_results(&outcomes, resolutions.len());

    let (results, rows): (Vec<MatchResult>, Vec<MatchedRow>) = resolutions
        .iter()
        .map(|r| finalize(&prepared[r.assignment.listing_index], r, config.strategy_tag()))
        .unzip();

    // Quality report
    let phase = Instant::now();
    let report = build_report(&rows, tally.fields, &config.quality);
    for warning in &report.warnings {
        logger.log_quality_warning(&warning.to_string());
    }
    timings.report_secs = phase.elapsed().as_secs_f64();

    let geocoder_stats = match &services.geocoder {
        Some(geocoder) => {
            let stats = geocoder.stats().await;
            if progress.should_show_cache_stats() {
                info!(
                    "🌍 Geocoder '{}': {} requests, {} cache hits, {} provider calls ({} retries), {} cached entries",
                    geocoder.provider_name(),
                    stats.requests,
                    stats.cache_hits,
                    stats.provider_calls,
                    stats.retries,
                    stats.cached_entries
                );
            }
            Some(stats)
        }
        None => None,
    };

    logger.log_completion(report.matched, report.total_listings);

    let stats = RunStats {
        run_id,
        started_at,
        input_signature,
        strategy: config.strategy_tag(),
        listings: listings.len(),
        cadastral_records: cadastre.len(),
        targets: targets.len(),
        candidate_pairs,
        listings_without_candidates,
        discarded_beyond_distance,
        unresolved_localities,
        malformed_fields: tally.fields,
        building_fallback_matches,
        geocoder: geocoder_stats,
        timings,
    };

    Ok(ResolutionOutput {
        rows,
        results,
        report,
        stats,
    })
}

async fn run_pass(
    listings: Arc<Vec<PreparedListing>>,
    targets: Arc<Vec<PreparedCadastral>>,
    plan: ScoringPlan,
    exclusive: bool,
    config: &ResolverConfig,
    logger: &MatchingLogger,
    progress: &ProgressConfig,
) -> Result<PassOutcome, ResolverError> {
    let phase = Instant::now();
    let blocks = Arc::new(generate_candidates(&listings, &targets, config));
    logger.log_blocking_results(blocks.block_count, blocks.total_candidates(), blocks.empty_blocks());
    let blocking_secs = phase.elapsed().as_secs_f64();

    let phase = Instant::now();
    let scores = score_in_parallel(
        listings.clone(),
        targets.clone(),
        blocks.clone(),
        plan,
        config.workers,
        progress,
    )
    .await?;
    let beyond_distance: usize = scores.iter().map(|s| s.beyond_distance).sum();
    let missing_target_coordinate: usize = scores.iter().map(|s| s.missing_target_coordinate).sum();
    logger.log_distance_filtering(beyond_distance, config.max_distance_m);
    if missing_target_coordinate > 0 {
        logger.log_debug(&format!(
            "Skipped {} candidates without coordinates",
            missing_target_coordinate
        ));
    }
    let scoring_secs = phase.elapsed().as_secs_f64();

    let phase = Instant::now();
    let assignments = assign(&scores, config.min_score, exclusive);
    let assignment_secs = phase.elapsed().as_secs_f64();

    Ok(PassOutcome {
        blocks,
        assignments,
        beyond_distance,
        blocking_secs,
        scoring_secs,
        assignment_secs,
    })
}

/// Scores every listing's block on the blocking thread pool. Chunks are
/// contiguous and joined in order, so the output lines up with `listings`.
async fn score_in_parallel(
    listings: Arc<Vec<PreparedListing>>,
    targets: Arc<Vec<PreparedCadastral>>,
    blocks: Arc<CandidateBlocks>,
    plan: ScoringPlan,
    workers: usize,
    progress: &ProgressConfig,
) -> Result<Vec<BlockScores>, ResolverError> {
    let total = listings.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    let chunk_size = total.div_ceil(workers.max(1)).max(MIN_LISTINGS_PER_CHUNK);
    let pb = progress.phase_bar(total as u64, "listings scored");
    let plan = Arc::new(plan);

    let tasks = (0..total).step_by(chunk_size).map(|start| {
        let end = (start + chunk_size).min(total);
        let listings = listings.clone();
        let targets = targets.clone();
        let blocks = blocks.clone();
        let plan = plan.clone();
        let pb = pb.clone();
        tokio::task::spawn_blocking(move || {
            (start..end)
                .map(|i| {
                    let scores = plan.score_block(&listings[i], &blocks.per_listing[i], &targets);
                    pb.inc(1);
                    scores
                })
                .collect::<Vec<_>>()
        })
    });

    let joined = join_all(tasks).await;
    pb.finish_and_clear();

    let mut scores = Vec::with_capacity(total);
    for chunk in joined {
        scores.extend(chunk.map_err(|e| ResolverError::Worker(e.to_string()))?);
    }
    Ok(scores)
}

/// Looks up coordinates for listings and units that lack them. Failures
/// leave the coordinate empty; the scoring plan decides what that means.
async fn geocode_missing(
    prepared: &mut [PreparedListing],
    raw_listings: &[ListingRecord],
    units: &mut [PreparedCadastral],
    geocoder: &CachedGeocoder,
    logger: &MatchingLogger,
    progress: &ProgressConfig,
) {
    let listing_queries: Vec<(usize, &str)> = prepared
        .iter()
        .filter(|l| l.coordinate.is_none())
        .map(|l| (l.index, raw_listings[l.index].locality_text.as_str()))
        .filter(|(_, q)| !q.trim().is_empty())
        .collect();
    let unit_queries: Vec<(usize, String)> = units
        .iter()
        .enumerate()
        .filter(|(_, u)| u.coordinate.is_none() && !u.address.is_empty())
        .map(|(i, u)| (i, u.address.clone()))
        .collect();

    let requested = listing_queries.len() + unit_queries.len();
    if requested == 0 {
        return;
    }
    let pb = progress.phase_bar(requested as u64, "addresses geocoded");

    let listing_lookups = listing_queries.iter().map(|(_, q)| async {
        let outcome = geocoder.geocode(q).await;
        pb.inc(1);
        outcome
    });
    let listing_results = join_all(listing_lookups).await;

    let unit_lookups = unit_queries.iter().map(|(_, q)| async {
        let outcome = geocoder.geocode(q).await;
        pb.inc(1);
        outcome
    });
    let unit_results = join_all(unit_lookups).await;
    pb.finish_and_clear();

    let mut resolved = 0;
    for ((index, _), outcome) in listing_queries.iter().zip(listing_results) {
        if let Ok(coordinate) = outcome {
            prepared[*index].coordinate = Some(coordinate);
            resolved += 1;
        }
    }
    for ((index, _), outcome) in unit_queries.iter().zip(unit_results) {
        if let Ok(coordinate) = outcome {
            units[*index].coordinate = Some(coordinate);
            resolved += 1;
        }
    }
    logger.log_geocoding(requested, resolved, requested - resolved);
}

fn finalize(
    listing: &PreparedListing,
    resolution: &Resolution,
    default_strategy: MatchStrategy,
) -> (MatchResult, MatchedRow) {
    let assignment = &resolution.assignment;
    let target = assignment
        .accepted
        .as_ref()
        .map(|c| &resolution.targets[c.candidate.target_index]);
    let reported = assignment.accepted.as_ref().or(assignment.best_rejected.as_ref());

    let result = MatchResult {
        listing_id: listing.id.clone(),
        cadastral_reference: target.map(|t| t.reference.clone()),
        score: assignment.score(),
        strategy: reported
            .map(|c| c.candidate.strategy)
            .unwrap_or(default_strategy),
        reason: resolution.reason,
        distance_m: reported.and_then(|c| c.candidate.distance_m),
        candidate_count: resolution.candidate_count,
        breakdown: reported.map(|c| c.breakdown),
    };

    let row = MatchedRow {
        listing_id: listing.id.clone(),
        cadastral_reference: result.cadastral_reference.clone(),
        match_score: result.score,
        match_strategy: result.strategy,
        match_reason: result.reason,
        price: listing.price,
        price_per_m2: listing.price_per_m2(),
        listing_surface_m2: listing.key.surface_m2,
        listing_rooms: listing.key.rooms,
        cadastral_surface_m2: target.and_then(|t| t.key.surface_m2),
        construction_year: target.and_then(|t| t.construction_year),
        floors: target.and_then(|t| t.floors),
        cadastral_address: target.map(|t| t.address.clone()).filter(|a| !a.is_empty()),
        neighborhood: target
            .map(|t| t.key.locality.clone())
            .or_else(|| Some(listing.key.locality.clone()))
            .filter(|n| !n.is_empty()),
        lat: target.and_then(|t| t.coordinate).map(|c| c.lat),
        lon: target.and_then(|t| t.coordinate).map(|c| c.lon),
        unit_count: target.map(|t| t.unit_count),
    };

    (result, row)
}
