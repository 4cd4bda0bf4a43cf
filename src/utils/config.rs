// src/utils/config.rs
//! Resolver configuration.
//!
//! Every knob the resolver understands lives in [`ResolverConfig`]. Values are
//! validated once at construction; the pipeline re-validates before it starts
//! so a hand-assembled struct cannot slip through.

use log::{debug, info};
use serde::Serialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::{Granularity, MatchStrategy};
use crate::utils::errors::ConfigError;

const WEIGHT_SUM_EPSILON: f64 = 1e-6;
/// Widest spatial search ring, in cells on each side of the listing's cell.
pub const MAX_GRID_RING: usize = 50;

/// Strategy selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Heuristic,
    Geographic,
    Combined,
    BuildingAggregate,
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heuristic" => Ok(StrategyKind::Heuristic),
            "geographic" => Ok(StrategyKind::Geographic),
            "combined" => Ok(StrategyKind::Combined),
            "building-aggregate" | "building_aggregate" => Ok(StrategyKind::BuildingAggregate),
            _ => Err(ConfigError::UnknownVariant {
                variable: "MATCH_STRATEGY",
                value: s.to_string(),
            }),
        }
    }
}

/// Per-pair scorer. Building-aggregate runs delegate to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaseStrategy {
    Heuristic,
    Geographic,
    Combined,
}

impl FromStr for BaseStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heuristic" => Ok(BaseStrategy::Heuristic),
            "geographic" => Ok(BaseStrategy::Geographic),
            "combined" => Ok(BaseStrategy::Combined),
            _ => Err(ConfigError::UnknownVariant {
                variable: "AGGREGATE_BASE_STRATEGY",
                value: s.to_string(),
            }),
        }
    }
}

impl BaseStrategy {
    pub fn tag(&self) -> MatchStrategy {
        match self {
            BaseStrategy::Heuristic => MatchStrategy::Heuristic,
            BaseStrategy::Geographic => MatchStrategy::Geographic,
            BaseStrategy::Combined => MatchStrategy::Combined,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockingKind {
    Neighborhood,
    Spatial,
}

impl FromStr for BlockingKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "neighborhood" | "attribute" => Ok(BlockingKind::Neighborhood),
            "spatial" | "grid" => Ok(BlockingKind::Spatial),
            _ => Err(ConfigError::UnknownVariant {
                variable: "BLOCKING_STRATEGY",
                value: s.to_string(),
            }),
        }
    }
}

/// What to do with a listing whose coordinates cannot be obtained when the
/// scorer needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeoFallback {
    Heuristic,
    Unmatched,
}

impl FromStr for GeoFallback {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heuristic" => Ok(GeoFallback::Heuristic),
            "unmatched" => Ok(GeoFallback::Unmatched),
            _ => Err(ConfigError::UnknownVariant {
                variable: "GEOCODING_FALLBACK",
                value: s.to_string(),
            }),
        }
    }
}

/// Relative surface tolerance applying up to `upper_m2` (inclusive of the
/// band below, exclusive above). `None` marks the open-ended last band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToleranceBand {
    pub upper_m2: Option<f64>,
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceToleranceTable {
    bands: Vec<ToleranceBand>,
}

impl Default for SurfaceToleranceTable {
    fn default() -> Self {
        Self {
            bands: vec![
                ToleranceBand { upper_m2: Some(50.0), tolerance: 0.10 },
                ToleranceBand { upper_m2: Some(100.0), tolerance: 0.15 },
                ToleranceBand { upper_m2: Some(150.0), tolerance: 0.20 },
                ToleranceBand { upper_m2: None, tolerance: 0.25 },
            ],
        }
    }
}

impl SurfaceToleranceTable {
    pub fn new(bands: Vec<ToleranceBand>) -> Result<Self, ConfigError> {
        let table = Self { bands };
        table.validate()?;
        Ok(table)
    }

    /// Parses `"50:0.10,100:0.15,150:0.20,inf:0.25"`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut bands = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (bound, tolerance) = part.split_once(':').ok_or_else(|| ConfigError::Unparseable {
                variable: "SURFACE_TOLERANCE_BANDS",
                value: part.to_string(),
            })?;
            let unparseable = || ConfigError::Unparseable {
                variable: "SURFACE_TOLERANCE_BANDS",
                value: part.to_string(),
            };
            let upper_m2 = match bound.trim().to_lowercase().as_str() {
                "inf" | "*" | "" => None,
                b => Some(b.parse::<f64>().map_err(|_| unparseable())?),
            };
            let tolerance = tolerance.trim().parse::<f64>().map_err(|_| unparseable())?;
            bands.push(ToleranceBand { upper_m2, tolerance });
        }
        Self::new(bands)
    }

    pub fn bands(&self) -> &[ToleranceBand] {
        &self.bands
    }

    /// Tolerance for a surface magnitude. Widens as the surface grows.
    pub fn tolerance_for(&self, surface_m2: f64) -> f64 {
        for band in &self.bands {
            match band.upper_m2 {
                Some(upper) if surface_m2 < upper => return band.tolerance,
                Some(_) => continue,
                None => return band.tolerance,
            }
        }
        // validate() guarantees an open-ended last band
        self.bands.last().map(|b| b.tolerance).unwrap_or(0.25)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bands.is_empty() {
            return Err(ConfigError::ToleranceTable("no bands".to_string()));
        }
        let mut previous: Option<f64> = None;
        for (i, band) in self.bands.iter().enumerate() {
            if !(band.tolerance > 0.0 && band.tolerance <= 1.0) {
                return Err(ConfigError::ToleranceTable(format!(
                    "tolerance {} outside (0, 1]",
                    band.tolerance
                )));
            }
            let is_last = i + 1 == self.bands.len();
            match (band.upper_m2, is_last) {
                (None, true) => {}
                (None, false) => {
                    return Err(ConfigError::ToleranceTable(
                        "only the last band may be open-ended".to_string(),
                    ))
                }
                (Some(_), true) => {
                    return Err(ConfigError::ToleranceTable(
                        "last band must be open-ended".to_string(),
                    ))
                }
                (Some(upper), false) => {
                    if !(upper > 0.0) || previous.map_or(false, |p| upper <= p) {
                        return Err(ConfigError::ToleranceTable(format!(
                            "band bounds must be positive and strictly increasing (at {})",
                            upper
                        )));
                    }
                    previous = Some(upper);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeuristicWeights {
    pub locality: f64,
    pub surface: f64,
    pub rooms: f64,
    pub features: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            locality: 0.30,
            surface: 0.40,
            rooms: 0.20,
            features: 0.10,
        }
    }
}

impl HeuristicWeights {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("locality", self.locality),
            ("surface", self.surface),
            ("rooms", self.rooms),
            ("features", self.features),
        ] {
            if !(value >= 0.0) {
                return Err(ConfigError::NegativeWeight { name, value });
            }
        }
        let sum = self.locality + self.surface + self.rooms + self.features;
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ConfigError::WeightsDoNotSum(sum));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocoderSettings {
    /// Minimum spacing between two outbound provider calls.
    pub min_delay: Duration,
    /// Attempts per address before giving up for the rest of the run.
    pub max_attempts: u32,
    /// First retry delay; doubles on each further attempt.
    pub backoff_base: Duration,
    /// Appended to free-text localities before lookup (", Barcelona").
    pub region_suffix: Option<String>,
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(1000),
            max_attempts: 3,
            backoff_base: Duration::from_millis(2000),
            region_suffix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySettings {
    /// |r| below this counts as "no relationship".
    pub near_zero_correlation: f64,
    /// Pairs needed before a correlation is judged at all.
    pub min_correlation_sample: usize,
    /// Match rates under this are flagged.
    pub min_match_rate: f64,
    /// Relative listing/cadastral surface difference counted as disagreement.
    pub surface_disagreement_ratio: f64,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            near_zero_correlation: 0.05,
            min_correlation_sample: 5,
            min_match_rate: 0.30,
            surface_disagreement_ratio: 0.50,
        }
    }
}

impl QualitySettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.near_zero_correlation) {
            return Err(ConfigError::QualitySetting {
                name: "near_zero_correlation",
                value: self.near_zero_correlation,
            });
        }
        if self.min_correlation_sample < 3 {
            return Err(ConfigError::QualitySetting {
                name: "min_correlation_sample",
                value: self.min_correlation_sample as f64,
            });
        }
        if !(0.0..=1.0).contains(&self.min_match_rate) {
            return Err(ConfigError::QualitySetting {
                name: "min_match_rate",
                value: self.min_match_rate,
            });
        }
        if !(self.surface_disagreement_ratio > 0.0) {
            return Err(ConfigError::QualitySetting {
                name: "surface_disagreement_ratio",
                value: self.surface_disagreement_ratio,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolverConfig {
    pub strategy: StrategyKind,
    /// Scorer used against building aggregates (strategy or fallback pass).
    pub aggregate_base: BaseStrategy,
    pub blocking: BlockingKind,
    pub min_score: f64,
    pub max_distance_m: f64,
    /// `w` in `w·geo + (1-w)·heuristic`.
    pub geo_weight: f64,
    pub tolerance_table: SurfaceToleranceTable,
    pub weights: HeuristicWeights,
    /// Share of a term's weight granted when one side lacks the data.
    pub missing_data_credit: f64,
    pub grid_cell_m: f64,
    pub max_candidates_per_listing: usize,
    pub geo_fallback: GeoFallback,
    pub building_fallback: bool,
    pub workers: usize,
    pub geocoder: GeocoderSettings,
    pub quality: QualitySettings,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Heuristic,
            aggregate_base: BaseStrategy::Heuristic,
            blocking: BlockingKind::Neighborhood,
            min_score: 0.5,
            max_distance_m: 300.0,
            geo_weight: 0.55,
            tolerance_table: SurfaceToleranceTable::default(),
            weights: HeuristicWeights::default(),
            missing_data_credit: 0.5,
            grid_cell_m: 100.0,
            max_candidates_per_listing: 50,
            geo_fallback: GeoFallback::Unmatched,
            building_fallback: false,
            workers: num_cpus::get().max(1),
            geocoder: GeocoderSettings::default(),
            quality: QualitySettings::default(),
        }
    }
}

impl ResolverConfig {
    pub fn builder() -> ResolverConfigBuilder {
        ResolverConfigBuilder::default()
    }

    /// Reads the configuration from the environment. Unset variables take
    /// their defaults; set but unparseable ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::builder();

        if let Some(v) = env_var("MATCH_STRATEGY") {
            builder = builder.strategy(v.parse()?);
        }
        if let Some(v) = env_var("AGGREGATE_BASE_STRATEGY") {
            builder = builder.aggregate_base(v.parse()?);
        }
        if let Some(v) = env_var("BLOCKING_STRATEGY") {
            builder = builder.blocking(v.parse()?);
        }
        if let Some(v) = parse_env::<f64>("MIN_MATCH_SCORE")? {
            builder = builder.min_score(v);
        }
        if let Some(v) = parse_env::<f64>("MAX_DISTANCE_METERS")? {
            builder = builder.max_distance_m(v);
        }
        if let Some(v) = parse_env::<f64>("GEO_BLEND_WEIGHT")? {
            builder = builder.geo_weight(v);
        }
        if let Some(v) = env_var("SURFACE_TOLERANCE_BANDS") {
            builder = builder.tolerance_table(SurfaceToleranceTable::parse(&v)?);
        }
        if let Some(v) = parse_env::<f64>("GRID_CELL_METERS")? {
            builder = builder.grid_cell_m(v);
        }
        if let Some(v) = parse_env::<usize>("MAX_CANDIDATES_PER_LISTING")? {
            builder = builder.max_candidates_per_listing(v);
        }
        if let Some(v) = parse_env::<f64>("MISSING_DATA_CREDIT")? {
            builder = builder.missing_data_credit(v);
        }
        if let Some(v) = env_var("GEOCODING_FALLBACK") {
            builder = builder.geo_fallback(v.parse()?);
        }
        if let Some(v) = parse_env::<bool>("BUILDING_FALLBACK_ENABLED")? {
            builder = builder.building_fallback(v);
        }
        if let Some(v) = parse_env::<usize>("SCORING_WORKERS")? {
            builder = builder.workers(v);
        }

        let mut geocoder = GeocoderSettings::default();
        if let Some(ms) = parse_env::<u64>("GEOCODER_MIN_DELAY_MS")? {
            geocoder.min_delay = Duration::from_millis(ms);
        }
        if let Some(n) = parse_env::<u32>("GEOCODER_MAX_ATTEMPTS")? {
            geocoder.max_attempts = n;
        }
        if let Some(ms) = parse_env::<u64>("GEOCODER_BACKOFF_MS")? {
            geocoder.backoff_base = Duration::from_millis(ms);
        }
        geocoder.region_suffix = env_var("GEOCODE_REGION_SUFFIX");
        builder = builder.geocoder(geocoder);

        builder.build()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(ConfigError::ThresholdOutOfRange(self.min_score));
        }
        if !(self.max_distance_m > 0.0 && self.max_distance_m.is_finite()) {
            return Err(ConfigError::NonPositiveDistance(self.max_distance_m));
        }
        if !(0.0..=1.0).contains(&self.geo_weight) {
            return Err(ConfigError::BlendWeightOutOfRange(self.geo_weight));
        }
        if !(0.0..=1.0).contains(&self.missing_data_credit) {
            return Err(ConfigError::MissingDataCreditOutOfRange(
                self.missing_data_credit,
            ));
        }
        self.weights.validate()?;
        self.tolerance_table.validate()?;
        if !(self.grid_cell_m > 0.0 && self.grid_cell_m.is_finite()) {
            return Err(ConfigError::NonPositiveCellSize(self.grid_cell_m));
        }
        if (self.max_distance_m / self.grid_cell_m).ceil() > MAX_GRID_RING as f64 {
            return Err(ConfigError::CellTooSmall {
                cell_m: self.grid_cell_m,
                max_distance_m: self.max_distance_m,
                max_ring: MAX_GRID_RING,
            });
        }
        if self.max_candidates_per_listing == 0 {
            return Err(ConfigError::ZeroCandidateCap);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.geocoder.max_attempts == 0 {
            return Err(ConfigError::ZeroGeocoderAttempts);
        }
        self.quality.validate()?;
        Ok(())
    }

    /// Scorer applied to each (listing, target) pair.
    pub fn base_strategy(&self) -> BaseStrategy {
        match self.strategy {
            StrategyKind::Heuristic => BaseStrategy::Heuristic,
            StrategyKind::Geographic => BaseStrategy::Geographic,
            StrategyKind::Combined => BaseStrategy::Combined,
            StrategyKind::BuildingAggregate => self.aggregate_base,
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self.strategy {
            StrategyKind::BuildingAggregate => Granularity::Building,
            _ => Granularity::Unit,
        }
    }

    /// Tag stamped on results of the primary pass.
    pub fn strategy_tag(&self) -> MatchStrategy {
        match self.strategy {
            StrategyKind::BuildingAggregate => MatchStrategy::BuildingAggregate,
            _ => self.base_strategy().tag(),
        }
    }

    /// Whether coordinates are worth fetching for this run.
    pub fn wants_coordinates(&self) -> bool {
        self.blocking == BlockingKind::Spatial
            || matches!(
                self.base_strategy(),
                BaseStrategy::Geographic | BaseStrategy::Combined
            )
            || (self.building_fallback
                && matches!(
                    self.aggregate_base,
                    BaseStrategy::Geographic | BaseStrategy::Combined
                ))
    }

    pub fn log_config(&self) {
        info!("🏠 Resolver configuration:");
        info!(
            "   • strategy: {:?} (pair scorer: {:?}, granularity: {:?})",
            self.strategy,
            self.base_strategy(),
            self.granularity()
        );
        info!("   • blocking: {:?}, grid cell {}m", self.blocking, self.grid_cell_m);
        info!(
            "   • min score {:.2}, max distance {}m, geo weight {:.2}",
            self.min_score, self.max_distance_m, self.geo_weight
        );
        info!(
            "   • weights: locality {:.2}, surface {:.2}, rooms {:.2}, features {:.2} (missing-data credit {:.2})",
            self.weights.locality,
            self.weights.surface,
            self.weights.rooms,
            self.weights.features,
            self.missing_data_credit
        );
        info!(
            "   • max {} candidates per listing, {} scoring workers",
            self.max_candidates_per_listing, self.workers
        );
        info!(
            "   • geocoding fallback: {:?}, building fallback: {}",
            self.geo_fallback,
            if self.building_fallback { "ENABLED" } else { "disabled" }
        );
        debug!("Tolerance bands: {:?}", self.tolerance_table.bands());
    }
}

/// Assembles a [`ResolverConfig`]; `build()` is the only way out and it
/// validates.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfigBuilder {
    strategy: Option<StrategyKind>,
    aggregate_base: Option<BaseStrategy>,
    blocking: Option<BlockingKind>,
    min_score: Option<f64>,
    max_distance_m: Option<f64>,
    geo_weight: Option<f64>,
    tolerance_table: Option<SurfaceToleranceTable>,
    weights: Option<HeuristicWeights>,
    missing_data_credit: Option<f64>,
    grid_cell_m: Option<f64>,
    max_candidates_per_listing: Option<usize>,
    geo_fallback: Option<GeoFallback>,
    building_fallback: Option<bool>,
    workers: Option<usize>,
    geocoder: Option<GeocoderSettings>,
    quality: Option<QualitySettings>,
}

impl ResolverConfigBuilder {
    pub fn strategy(mut self, v: StrategyKind) -> Self {
        self.strategy = Some(v);
        self
    }
    pub fn aggregate_base(mut self, v: BaseStrategy) -> Self {
        self.aggregate_base = Some(v);
        self
    }
    pub fn blocking(mut self, v: BlockingKind) -> Self {
        self.blocking = Some(v);
        self
    }
    pub fn min_score(mut self, v: f64) -> Self {
        self.min_score = Some(v);
        self
    }
    pub fn max_distance_m(mut self, v: f64) -> Self {
        self.max_distance_m = Some(v);
        self
    }
    pub fn geo_weight(mut self, v: f64) -> Self {
        self.geo_weight = Some(v);
        self
    }
    pub fn tolerance_table(mut self, v: SurfaceToleranceTable) -> Self {
        self.tolerance_table = Some(v);
        self
    }
    pub fn weights(mut self, v: HeuristicWeights) -> Self {
        self.weights = Some(v);
        self
    }
    pub fn missing_data_credit(mut self, v: f64) -> Self {
        self.missing_data_credit = Some(v);
        self
    }
    pub fn grid_cell_m(mut self, v: f64) -> Self {
        self.grid_cell_m = Some(v);
        self
    }
    pub fn max_candidates_per_listing(mut self, v: usize) -> Self {
        self.max_candidates_per_listing = Some(v);
        self
    }
    pub fn geo_fallback(mut self, v: GeoFallback) -> Self {
        self.geo_fallback = Some(v);
        self
    }
    pub fn building_fallback(mut self, v: bool) -> Self {
        self.building_fallback = Some(v);
        self
    }
    pub fn workers(mut self, v: usize) -> Self {
        self.workers = Some(v);
        self
    }
    pub fn geocoder(mut self, v: GeocoderSettings) -> Self {
        self.geocoder = Some(v);
        self
    }
    pub fn quality(mut self, v: QualitySettings) -> Self {
        self.quality = Some(v);
        self
    }

    pub fn build(self) -> Result<ResolverConfig, ConfigError> {
        let defaults = ResolverConfig::default();
        let strategy = self.strategy.unwrap_or(defaults.strategy);
        let aggregate_base = self.aggregate_base.unwrap_or(defaults.aggregate_base);

        // Geographic scoring defaults to grid blocking; everything else blocks
        // on the neighbourhood.
        let blocking = self.blocking.unwrap_or_else(|| {
            let base = match strategy {
                StrategyKind::BuildingAggregate => aggregate_base,
                StrategyKind::Geographic => BaseStrategy::Geographic,
                _ => BaseStrategy::Heuristic,
            };
            if base == BaseStrategy::Geographic {
                BlockingKind::Spatial
            } else {
                BlockingKind::Neighborhood
            }
        });

        let config = ResolverConfig {
            strategy,
            aggregate_base,
            blocking,
            min_score: self.min_score.unwrap_or(defaults.min_score),
            max_distance_m: self.max_distance_m.unwrap_or(defaults.max_distance_m),
            geo_weight: self.geo_weight.unwrap_or(defaults.geo_weight),
            tolerance_table: self.tolerance_table.unwrap_or(defaults.tolerance_table),
            weights: self.weights.unwrap_or(defaults.weights),
            missing_data_credit: self
                .missing_data_credit
                .unwrap_or(defaults.missing_data_credit),
            grid_cell_m: self.grid_cell_m.unwrap_or(defaults.grid_cell_m),
            max_candidates_per_listing: self
                .max_candidates_per_listing
                .unwrap_or(defaults.max_candidates_per_listing),
            geo_fallback: self.geo_fallback.unwrap_or(defaults.geo_fallback),
            building_fallback: self.building_fallback.unwrap_or(defaults.building_fallback),
            workers: self.workers.unwrap_or(defaults.workers),
            geocoder: self.geocoder.unwrap_or(defaults.geocoder),
            quality: self.quality.unwrap_or(defaults.quality),
        };
        config.validate()?;
        Ok(config)
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env_var(name) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| ConfigError::Unparseable {
            variable: name,
            value: raw,
        }),
    }
}
