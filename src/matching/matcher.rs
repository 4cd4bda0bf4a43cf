// src/matching/matcher.rs
//! Assignment of scored candidates to listings.
//!
//! Runs after all scoring, on one thread. Every candidate at or above the
//! threshold goes into one global queue ordered by score (then distance,
//! listing order, candidate rank) and is accepted greedily. With exclusive
//! targets a consumed unit is skipped for every later listing.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::matching::scorer::BlockScores;
use crate::models::{MatchReason, ScoredCandidate};

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub listing_index: usize,
    pub reason: MatchReason,
    pub accepted: Option<ScoredCandidate>,
    /// Best candidate that was not accepted, kept for reporting.
    pub best_rejected: Option<ScoredCandidate>,
    pub candidate_count: usize,
}

impl Assignment {
    fn unmatched(listing_index: usize, reason: MatchReason, best: Option<&ScoredCandidate>, count: usize) -> Self {
        Self {
            listing_index,
            reason,
            accepted: None,
            best_rejected: best.cloned(),
            candidate_count: count,
        }
    }

    /// Score reported for the listing: accepted, else best rejected.
    pub fn score(&self) -> Option<f64> {
        self.accepted
            .as_ref()
            .or(self.best_rejected.as_ref())
            .map(|c| c.score)
    }
}

/// Preference order between two candidates; `Less` means better.
pub fn candidate_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| match (a.candidate.distance_m, b.candidate.distance_m) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.candidate.listing_index.cmp(&b.candidate.listing_index))
        .then_with(|| a.candidate.rank.cmp(&b.candidate.rank))
}

fn best_of(candidates: &[ScoredCandidate]) -> Option<&ScoredCandidate> {
    candidates.iter().min_by(|a, b| candidate_order(a, b))
}

/// Assigns at most one target per listing. `per_listing[i]` holds the scores
/// of listing `i`; the returned vector is indexed the same way.
pub fn assign(per_listing: &[BlockScores], min_score: f64, exclusive_targets: bool) -> Vec<Assignment> {
    let mut assignments: Vec<Option<Assignment>> = vec![None; per_listing.len()];
    let mut queue: Vec<&ScoredCandidate> = Vec::new();

    for (i, scores) in per_listing.iter().enumerate() {
        let count = scores.scored.len();
        if scores.listing_coordinate_missing {
            assignments[i] = Some(Assignment::unmatched(i, MatchReason::GeocodingFailed, None, count));
            continue;
        }
        let best = match best_of(&scores.scored) {
            Some(best) => best,
            None => {
                assignments[i] = Some(Assignment::unmatched(i, MatchReason::NoCandidates, None, 0));
                continue;
            }
        };
        if best.score < min_score {
            assignments[i] = Some(Assignment::unmatched(i, MatchReason::BelowThreshold, Some(best), count));
            continue;
        }
        queue.extend(scores.scored.iter().filter(|c| c.score >= min_score));
    }

    queue.sort_by(|a, b| candidate_order(a, b));

    let mut consumed: HashSet<usize> = HashSet::new();
    for candidate in queue {
        let i = candidate.candidate.listing_index;
        if assignments[i].is_some() {
            continue;
        }
        if exclusive_targets && !consumed.insert(candidate.candidate.target_index) {
            continue;
        }
        assignments[i] = Some(Assignment {
            listing_index: i,
            reason: MatchReason::Matched,
            accepted: Some(candidate.clone()),
            best_rejected: None,
            candidate_count: per_listing[i].scored.len(),
        });
    }

    assignments
        .into_iter()
        .enumerate()
        .map(|(i, assignment)| {
            assignment.unwrap_or_else(|| {
                let scores = &per_listing[i].scored;
                Assignment::unmatched(i, MatchReason::CandidatesClaimed, best_of(scores), scores.len())
            })
        })
        .collect()
}
