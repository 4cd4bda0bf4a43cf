// src/models/matching.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::models::records::{Coordinate, ListingId};

/// Scoring strategy recorded on every candidate and result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    Heuristic,
    Geographic,
    Combined,
    BuildingAggregate,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Heuristic => "heuristic",
            MatchStrategy::Geographic => "geographic",
            MatchStrategy::Combined => "combined",
            MatchStrategy::BuildingAggregate => "building-aggregate",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable outcome tag for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    Matched,
    /// Matched against a building aggregate after the unit-level pass failed.
    MatchedBuildingFallback,
    NoCandidates,
    BelowThreshold,
    /// Every candidate above threshold was taken by a better-scoring listing.
    CandidatesClaimed,
    GeocodingFailed,
}

impl MatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchReason::Matched => "matched",
            MatchReason::MatchedBuildingFallback => "matched_building_fallback",
            MatchReason::NoCandidates => "no_candidates",
            MatchReason::BelowThreshold => "below_threshold",
            MatchReason::CandidatesClaimed => "candidates_claimed",
            MatchReason::GeocodingFailed => "geocoding_failed",
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(
            self,
            MatchReason::Matched | MatchReason::MatchedBuildingFallback
        )
    }
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amenities mentioned in free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingFeature {
    Elevator,
    Terrace,
    Balcony,
    Parking,
    Pool,
    AirConditioning,
}

/// Comparable view of a record. Derived only through the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedKey {
    /// Canonical neighbourhood key, or the cleaned text when no alias matched.
    pub locality: String,
    /// True when `locality` came from the alias table.
    pub locality_resolved: bool,
    pub surface_m2: Option<f64>,
    pub rooms: Option<f64>,
    pub features: BTreeSet<BuildingFeature>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Unit,
    Building,
}

#[derive(Debug, Clone)]
pub struct PreparedListing {
    /// Position in the input table; the deterministic tie-break order.
    pub index: usize,
    pub id: ListingId,
    pub key: NormalizedKey,
    pub price: Option<f64>,
    pub coordinate: Option<Coordinate>,
}

impl PreparedListing {
    pub fn price_per_m2(&self) -> Option<f64> {
        match (self.price, self.key.surface_m2) {
            (Some(price), Some(surface)) if surface > 0.0 => Some(price / surface),
            _ => None,
        }
    }
}

/// A cadastral unit, or a synthetic building produced by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedCadastral {
    pub reference: String,
    pub granularity: Granularity,
    pub key: NormalizedKey,
    pub construction_year: Option<f64>,
    pub floors: Option<f64>,
    pub address: String,
    pub coordinate: Option<Coordinate>,
    /// Units folded into this record; 1 for plain units.
    pub unit_count: usize,
}

/// Raw per-term similarities; `None` means the term had no data on one side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SimilarityComponents {
    pub locality: Option<f64>,
    pub surface: Option<f64>,
    pub rooms: Option<f64>,
    pub features: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub listing_index: usize,
    pub target_index: usize,
    /// Rank in the generator's output; used as the last tie-breaker.
    pub rank: usize,
    pub strategy: MatchStrategy,
    pub components: SimilarityComponents,
    pub distance_m: Option<f64>,
}

/// Weighted contributions that add up to the final score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub locality: f64,
    pub surface: f64,
    pub rooms: f64,
    pub features: f64,
    pub heuristic: Option<f64>,
    pub geographic: Option<f64>,
    pub geo_weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub candidate: MatchCandidate,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub listing_id: ListingId,
    pub cadastral_reference: Option<String>,
    /// Accepted score when matched; best rejected score otherwise (if any).
    pub score: Option<f64>,
    pub strategy: MatchStrategy,
    pub reason: MatchReason,
    pub distance_m: Option<f64>,
    pub candidate_count: usize,
    pub breakdown: Option<ScoreBreakdown>,
}

/// One row of the output table. Every listing gets exactly one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedRow {
    pub listing_id: ListingId,
    pub cadastral_reference: Option<String>,
    pub match_score: Option<f64>,
    pub match_strategy: MatchStrategy,
    pub match_reason: MatchReason,
    pub price: Option<f64>,
    pub price_per_m2: Option<f64>,
    pub listing_surface_m2: Option<f64>,
    pub listing_rooms: Option<f64>,
    pub cadastral_surface_m2: Option<f64>,
    pub construction_year: Option<f64>,
    pub floors: Option<f64>,
    pub cadastral_address: Option<String>,
    pub neighborhood: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub unit_count: Option<usize>,
}
