// src/candidate_generation/mod.rs
//! Blocking: for each listing, a bounded set of cadastral targets worth
//! scoring. An empty set is a normal outcome.

pub mod neighborhood;
pub mod spatial;

use log::debug;

use crate::models::{PreparedCadastral, PreparedListing};
use crate::utils::config::{BlockingKind, GeoFallback, ResolverConfig};

pub use neighborhood::NeighborhoodBlocker;
pub use spatial::SpatialGrid;

/// A (listing, target) pair produced by a blocker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidatePair {
    pub listing_index: usize,
    pub target_index: usize,
    pub rank: usize,
    pub distance_m: Option<f64>,
}

/// Candidates of a single listing and the blocking that produced them.
#[derive(Debug, Clone, Default)]
pub struct ListingBlock {
    pub candidates: Vec<CandidatePair>,
    /// `None` when no blocker could be applied (spatial blocking without a
    /// listing coordinate and no heuristic fallback).
    pub blocking: Option<BlockingKind>,
}

impl ListingBlock {
    /// The blocker needed the listing's coordinate and there was none.
    pub fn lacks_listing_coordinate(&self) -> bool {
        self.blocking.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CandidateBlocks {
    /// Indexed like the listing slice passed to [`generate_candidates`].
    pub per_listing: Vec<ListingBlock>,
    pub block_count: usize,
}

impl CandidateBlocks {
    pub fn total_candidates(&self) -> usize {
        self.per_listing.iter().map(|b| b.candidates.len()).sum()
    }

    pub fn empty_blocks(&self) -> usize {
        self.per_listing.iter().filter(|b| b.candidates.is_empty()).count()
    }
}

/// Runs the configured blocker over every listing.
///
/// Under spatial blocking a listing without a coordinate falls back to its
/// neighbourhood block when `geo_fallback` is `Heuristic`, and gets no
/// candidates otherwise.
pub fn generate_candidates(
    listings: &[PreparedListing],
    targets: &[PreparedCadastral],
    config: &ResolverConfig,
) -> CandidateBlocks {
    let cap = config.max_candidates_per_listing;
    let neighborhood = NeighborhoodBlocker::new(targets);
    let grid = match config.blocking {
        BlockingKind::Spatial => Some(SpatialGrid::new(
            targets,
            config.grid_cell_m,
            config.max_distance_m,
        )),
        BlockingKind::Neighborhood => None,
    };

    let per_listing = listings
        .iter()
        .map(|listing| match (&grid, listing.coordinate) {
            (Some(grid), Some(_)) => ListingBlock {
                candidates: grid.candidates_for(listing, targets, cap),
                blocking: Some(BlockingKind::Spatial),
            },
            (Some(_), None) if config.geo_fallback == GeoFallback::Unmatched => {
                ListingBlock::default()
            }
            _ => ListingBlock {
                candidates: neighborhood.candidates_for(listing, targets, cap),
                blocking: Some(BlockingKind::Neighborhood),
            },
        })
        .collect();

    let block_count = match &grid {
        Some(grid) => {
            debug!(
                "Spatial grid: {} occupied cells, scanning {} ring(s) of {}m cells",
                grid.occupied_cells(),
                grid.ring(),
                config.grid_cell_m
            );
            grid.occupied_cells()
        }
        None => neighborhood.block_count(),
    };

    CandidateBlocks {
        per_listing,
        block_count,
    }
}
