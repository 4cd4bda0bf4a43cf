// src/candidate_generation/neighborhood.rs
use std::collections::HashMap;

use super::CandidatePair;
use crate::models::{PreparedCadastral, PreparedListing};
use crate::utils::geo::haversine_distance;

/// Attribute blocking: targets grouped by canonical neighbourhood key.
pub struct NeighborhoodBlocker {
    blocks: HashMap<String, Vec<usize>>,
}

impl NeighborhoodBlocker {
    pub fn new(targets: &[PreparedCadastral]) -> Self {
        let mut blocks: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, target) in targets.iter().enumerate() {
            if target.key.locality.is_empty() {
                continue;
            }
            blocks.entry(target.key.locality.clone()).or_default().push(idx);
        }
        Self { blocks }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Targets sharing the listing's neighbourhood. Over the cap, the ones
    /// with the closest surface are kept; targets without a surface go last.
    pub fn candidates_for(
        &self,
        listing: &PreparedListing,
        targets: &[PreparedCadastral],
        cap: usize,
    ) -> Vec<CandidatePair> {
        let block = match self.blocks.get(&listing.key.locality) {
            Some(block) if !listing.key.locality.is_empty() => block,
            _ => return Vec::new(),
        };

        let mut members: Vec<usize> = block.clone();
        if members.len() > cap {
            let surface_gap = |idx: &usize| -> Option<f64> {
                match (listing.key.surface_m2, targets[*idx].key.surface_m2) {
                    (Some(a), Some(b)) => Some((a - b).abs()),
                    _ => None,
                }
            };
            // sort_by is stable, so equal gaps keep registry order
            members.sort_by(|a, b| match (surface_gap(a), surface_gap(b)) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
            members.truncate(cap);
        }

        members
            .into_iter()
            .enumerate()
            .map(|(rank, target_index)| CandidatePair {
                listing_index: listing.index,
                target_index,
                rank,
                distance_m: match (listing.coordinate, targets[target_index].coordinate) {
                    (Some(a), Some(b)) => Some(haversine_distance(&a, &b)),
                    _ => None,
                },
            })
            .collect()
    }
}
