// src/utils/errors.rs
use thiserror::Error;

/// Rejected configuration. Always fatal, raised before any record is touched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("minimum score must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),
    #[error("maximum distance must be a positive number of meters, got {0}")]
    NonPositiveDistance(f64),
    #[error("geographic blend weight must be within [0, 1], got {0}")]
    BlendWeightOutOfRange(f64),
    #[error("heuristic weight '{name}' must be non-negative, got {value}")]
    NegativeWeight { name: &'static str, value: f64 },
    #[error("heuristic weights must sum to 1.0, got {0}")]
    WeightsDoNotSum(f64),
    #[error("missing-data credit must be within [0, 1], got {0}")]
    MissingDataCreditOutOfRange(f64),
    #[error("surface tolerance table is invalid: {0}")]
    ToleranceTable(String),
    #[error("grid cell size must be a positive number of meters, got {0}")]
    NonPositiveCellSize(f64),
    #[error("grid cell of {cell_m}m is too small for a {max_distance_m}m search radius (at most {max_ring} cells per side)")]
    CellTooSmall {
        cell_m: f64,
        max_distance_m: f64,
        max_ring: usize,
    },
    #[error("candidate cap per listing must be at least 1")]
    ZeroCandidateCap,
    #[error("scoring worker count must be at least 1")]
    ZeroWorkers,
    #[error("geocoder max attempts must be at least 1")]
    ZeroGeocoderAttempts,
    #[error("quality setting '{name}' is out of range: {value}")]
    QualitySetting { name: &'static str, value: f64 },
    #[error("unknown value '{value}' for {variable}")]
    UnknownVariant { variable: &'static str, value: String },
    #[error("could not parse {variable}='{value}'")]
    Unparseable { variable: &'static str, value: String },
}

/// Outcome of a failed geocoding lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeocodeError {
    #[error("address not found: {0}")]
    NotFound(String),
    #[error("geocoding provider rate limit reached")]
    RateLimited,
    #[error("geocoding provider unavailable: {0}")]
    Unavailable(String),
}

impl GeocodeError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, GeocodeError::RateLimited | GeocodeError::Unavailable(_))
    }
}

/// Run-fatal failures. Anything record-level becomes a `MatchReason` instead.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("input unavailable: {0}")]
    InputUnavailable(String),
    #[error("scoring worker failed: {0}")]
    Worker(String),
}
