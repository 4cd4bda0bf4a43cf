// src/matching/scorer.rs
//! Pair scoring.
//!
//! Three scorers share one contract: a (listing, target) pair in, a score in
//! [0, 1] out, or nothing when the pair cannot be scored (too far away, no
//! coordinates). The set is closed; callers pick one from the configuration.

use strsim::jaro_winkler;

use crate::candidate_generation::{CandidatePair, ListingBlock};
use crate::models::{
    MatchCandidate, MatchStrategy, NormalizedKey, PreparedCadastral, PreparedListing,
    ScoreBreakdown, ScoredCandidate, SimilarityComponents,
};
use crate::utils::config::{
    BaseStrategy, GeoFallback, HeuristicWeights, ResolverConfig, SurfaceToleranceTable,
};

/// Credit when one locality key contains the other as whole words
/// ("gracia" vs "vila de gracia" when neither came from the alias table).
const CONTAINED_LOCALITY_SIMILARITY: f64 = 0.7;
const MIN_FUZZY_LOCALITY_SIMILARITY: f64 = 0.85;
/// Fuzzy locality matches never earn more than this share of the term.
const FUZZY_LOCALITY_SCALE: f64 = 0.6;
const ONE_ROOM_OFF_SIMILARITY: f64 = 0.5;

/// Attribute heuristic: weighted locality, surface, rooms and features.
#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    weights: HeuristicWeights,
    tolerance_table: SurfaceToleranceTable,
    missing_data_credit: f64,
}

impl HeuristicScorer {
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            weights: config.weights,
            tolerance_table: config.tolerance_table.clone(),
            missing_data_credit: config.missing_data_credit,
        }
    }

    pub fn components(&self, listing: &NormalizedKey, target: &NormalizedKey) -> SimilarityComponents {
        SimilarityComponents {
            locality: locality_similarity(listing, target),
            surface: self.surface_similarity(listing.surface_m2, target.surface_m2),
            rooms: rooms_similarity(listing.rooms, target.rooms),
            features: features_similarity(listing, target),
        }
    }

    /// Weighted sum of the components. A missing component earns
    /// `missing_data_credit` of its weight.
    pub fn score(&self, components: &SimilarityComponents) -> (f64, ScoreBreakdown) {
        let term = |similarity: Option<f64>, weight: f64| match similarity {
            Some(s) => weight * s.clamp(0.0, 1.0),
            None => weight * self.missing_data_credit,
        };
        let breakdown = ScoreBreakdown {
            locality: term(components.locality, self.weights.locality),
            surface: term(components.surface, self.weights.surface),
            rooms: term(components.rooms, self.weights.rooms),
            features: term(components.features, self.weights.features),
            ..ScoreBreakdown::default()
        };
        let total = breakdown.locality + breakdown.surface + breakdown.rooms + breakdown.features;
        let score = total.clamp(0.0, 1.0);
        (
            score,
            ScoreBreakdown {
                heuristic: Some(score),
                ..breakdown
            },
        )
    }

    /// Linear falloff from 1 at equal surfaces to 0 at the band's tolerance.
    /// The band is picked by the mean of the two surfaces, so the result is
    /// symmetric.
    pub fn surface_similarity(&self, a: Option<f64>, b: Option<f64>) -> Option<f64> {
        let (a, b) = (a?, b?);
        let mean = (a + b) / 2.0;
        if mean <= 0.0 {
            return None;
        }
        let relative_diff = (a - b).abs() / mean;
        let tolerance = self.tolerance_table.tolerance_for(mean);
        Some((1.0 - relative_diff / tolerance).max(0.0))
    }
}

fn locality_similarity(a: &NormalizedKey, b: &NormalizedKey) -> Option<f64> {
    if a.locality.is_empty() || b.locality.is_empty() {
        return None;
    }
    if a.locality == b.locality {
        return Some(1.0);
    }
    // two different canonical neighbourhoods are simply different places
    if a.locality_resolved && b.locality_resolved {
        return Some(0.0);
    }
    if contains_words(&a.locality, &b.locality) || contains_words(&b.locality, &a.locality) {
        return Some(CONTAINED_LOCALITY_SIMILARITY);
    }
    let fuzzy = jaro_winkler(&a.locality, &b.locality);
    if fuzzy >= MIN_FUZZY_LOCALITY_SIMILARITY {
        Some(fuzzy * FUZZY_LOCALITY_SCALE)
    } else {
        Some(0.0)
    }
}

fn contains_words(haystack: &str, needle: &str) -> bool {
    format!(" {} ", haystack).contains(&format!(" {} ", needle))
}

fn rooms_similarity(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    let diff = (a? - b?).abs().round();
    Some(if diff == 0.0 {
        1.0
    } else if diff <= 1.0 {
        ONE_ROOM_OFF_SIMILARITY
    } else {
        0.0
    })
}

/// Jaccard overlap. No features on either side counts as missing data, not
/// as a mismatch.
fn features_similarity(a: &NormalizedKey, b: &NormalizedKey) -> Option<f64> {
    if a.features.is_empty() || b.features.is_empty() {
        return None;
    }
    let shared = a.features.intersection(&b.features).count() as f64;
    let union = a.features.union(&b.features).count() as f64;
    Some(shared / union)
}

/// `max(0, 1 - d/max)`, or `None` beyond the cutoff.
pub fn geographic_score(distance_m: f64, max_distance_m: f64) -> Option<f64> {
    if !distance_m.is_finite() || distance_m > max_distance_m {
        return None;
    }
    Some((1.0 - distance_m / max_distance_m).clamp(0.0, 1.0))
}

#[derive(Debug, Clone)]
pub enum PairScorer {
    Heuristic(HeuristicScorer),
    Geographic {
        max_distance_m: f64,
    },
    Combined {
        heuristic: HeuristicScorer,
        max_distance_m: f64,
        geo_weight: f64,
    },
}

/// Why a pair produced no score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unscorable {
    BeyondDistance,
    MissingCoordinate,
}

impl PairScorer {
    pub fn for_strategy(base: BaseStrategy, config: &ResolverConfig) -> Self {
        match base {
            BaseStrategy::Heuristic => PairScorer::Heuristic(HeuristicScorer::from_config(config)),
            BaseStrategy::Geographic => PairScorer::Geographic {
                max_distance_m: config.max_distance_m,
            },
            BaseStrategy::Combined => PairScorer::Combined {
                heuristic: HeuristicScorer::from_config(config),
                max_distance_m: config.max_distance_m,
                geo_weight: config.geo_weight,
            },
        }
    }

    /// Only the purely geographic scorer is useless without a listing
    /// coordinate; the combined one scores such pairs on attributes alone.
    pub fn needs_listing_coordinate(&self) -> bool {
        matches!(self, PairScorer::Geographic { .. })
    }

    pub fn score(
        &self,
        listing: &PreparedListing,
        target: &PreparedCadastral,
        pair: &CandidatePair,
        strategy: MatchStrategy,
    ) -> Result<ScoredCandidate, Unscorable> {
        let (components, score, breakdown) = match self {
            PairScorer::Heuristic(heuristic) => {
                let components = heuristic.components(&listing.key, &target.key);
                let (score, breakdown) = heuristic.score(&components);
                (components, score, breakdown)
            }
            PairScorer::Geographic { max_distance_m } => {
                let distance = pair.distance_m.ok_or(Unscorable::MissingCoordinate)?;
                let geo = geographic_score(distance, *max_distance_m).ok_or(Unscorable::BeyondDistance)?;
                let breakdown = ScoreBreakdown {
                    geographic: Some(geo),
                    geo_weight: Some(1.0),
                    ..ScoreBreakdown::default()
                };
                (SimilarityComponents::default(), geo, breakdown)
            }
            PairScorer::Combined {
                heuristic,
                max_distance_m,
                geo_weight,
            } => {
                let components = heuristic.components(&listing.key, &target.key);
                let (h, breakdown) = heuristic.score(&components);
                match pair.distance_m {
                    Some(distance) => {
                        let geo = geographic_score(distance, *max_distance_m)
                            .ok_or(Unscorable::BeyondDistance)?;
                        let w = *geo_weight;
                        let blended = (w * geo + (1.0 - w) * h).clamp(0.0, 1.0);
                        let breakdown = ScoreBreakdown {
                            locality: breakdown.locality * (1.0 - w),
                            surface: breakdown.surface * (1.0 - w),
                            rooms: breakdown.rooms * (1.0 - w),
                            features: breakdown.features * (1.0 - w),
                            heuristic: Some(h),
                            geographic: Some(geo),
                            geo_weight: Some(w),
                        };
                        (components, blended, breakdown)
                    }
                    // no distance: heuristic alone
                    None => (components, h, breakdown),
                }
            }
        };

        Ok(ScoredCandidate {
            candidate: MatchCandidate {
                listing_index: pair.listing_index,
                target_index: pair.target_index,
                rank: pair.rank,
                strategy,
                components,
                distance_m: pair.distance_m,
            },
            score,
            breakdown,
        })
    }
}

/// Scores of one listing's block.
#[derive(Debug, Clone, Default)]
pub struct BlockScores {
    pub scored: Vec<ScoredCandidate>,
    pub beyond_distance: usize,
    pub missing_target_coordinate: usize,
    /// The scorer needed the listing's coordinate and there was none.
    pub listing_coordinate_missing: bool,
}

/// Scorer selection for one pass: the configured scorer plus the heuristic
/// it degrades to when a listing has no coordinate.
#[derive(Debug, Clone)]
pub struct ScoringPlan {
    scorer: PairScorer,
    strategy: MatchStrategy,
    degraded: Option<HeuristicScorer>,
}

impl ScoringPlan {
    pub fn new(base: BaseStrategy, strategy: MatchStrategy, config: &ResolverConfig) -> Self {
        let scorer = PairScorer::for_strategy(base, config);
        let degraded = (scorer.needs_listing_coordinate()
            && config.geo_fallback == GeoFallback::Heuristic)
            .then(|| HeuristicScorer::from_config(config));
        Self {
            scorer,
            strategy,
            degraded,
        }
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    pub fn score_block(
        &self,
        listing: &PreparedListing,
        block: &ListingBlock,
        targets: &[PreparedCadastral],
    ) -> BlockScores {
        let mut out = BlockScores::default();
        if block.lacks_listing_coordinate() {
            out.listing_coordinate_missing = true;
            return out;
        }

        let (scorer, strategy) = if self.scorer.needs_listing_coordinate() && listing.coordinate.is_none() {
            match &self.degraded {
                Some(heuristic) => (PairScorer::Heuristic(heuristic.clone()), MatchStrategy::Heuristic),
                None => {
                    out.listing_coordinate_missing = true;
                    return out;
                }
            }
        } else {
            (self.scorer.clone(), self.strategy)
        };

        for pair in &block.candidates {
            match scorer.score(listing, &targets[pair.target_index], pair, strategy) {
                Ok(scored) => out.scored.push(scored),
                Err(Unscorable::BeyondDistance) => out.beyond_distance += 1,
                Err(Unscorable::MissingCoordinate) => out.missing_target_coordinate += 1,
            }
        }
        out
    }
}
