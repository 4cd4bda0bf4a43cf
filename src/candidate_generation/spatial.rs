// src/candidate_generation/spatial.rs
//! Uniform grid over cadastral coordinates.
//!
//! Coordinates are projected onto a local plane (equirectangular, relative to
//! the south-west corner of the data) and bucketed into square cells. A query
//! scans the listing's cell plus a ring of neighbours wide enough to cover
//! the maximum match distance: `ceil(max_distance_m / grid_cell_m)` cells on
//! each side. With a cell at least as large as the distance this is exactly
//! the 8 direct neighbours; smaller cells trade more lookups for tighter
//! buckets. Configuration caps the ring at `MAX_GRID_RING`.

use std::collections::HashMap;

use super::CandidatePair;
use crate::models::{Coordinate, PreparedCadastral, PreparedListing};
use crate::utils::geo::{haversine_distance, METERS_PER_DEGREE};

pub struct SpatialGrid {
    origin: Coordinate,
    lon_scale: f64,
    cell_m: f64,
    ring: i64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    pub fn new(targets: &[PreparedCadastral], cell_m: f64, max_distance_m: f64) -> Self {
        let located: Vec<(usize, Coordinate)> = targets
            .iter()
            .enumerate()
            .filter_map(|(idx, t)| t.coordinate.map(|c| (idx, c)))
            .collect();

        let origin = located
            .iter()
            .map(|(_, c)| *c)
            .reduce(|a, b| Coordinate::new(a.lat.min(b.lat), a.lon.min(b.lon)))
            .unwrap_or(Coordinate::new(0.0, 0.0));

        let mut grid = Self {
            origin,
            lon_scale: origin.lat.to_radians().cos(),
            cell_m,
            ring: ((max_distance_m / cell_m).ceil() as i64).max(1),
            cells: HashMap::new(),
        };
        for (idx, coordinate) in located {
            let cell = grid.cell_of(&coordinate);
            grid.cells.entry(cell).or_default().push(idx);
        }
        grid
    }

    pub fn cell_of(&self, c: &Coordinate) -> (i64, i64) {
        let north = (c.lat - self.origin.lat) * METERS_PER_DEGREE;
        let east = (c.lon - self.origin.lon) * METERS_PER_DEGREE * self.lon_scale;
        (
            (north / self.cell_m).floor() as i64,
            (east / self.cell_m).floor() as i64,
        )
    }

    /// Cells scanned in each direction around the listing's own cell.
    pub fn ring(&self) -> i64 {
        self.ring
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Nearest-first candidates from the surrounding cells, capped.
    pub fn candidates_for(
        &self,
        listing: &PreparedListing,
        targets: &[PreparedCadastral],
        cap: usize,
    ) -> Vec<CandidatePair> {
        let origin = match listing.coordinate {
            Some(c) => c,
            None => return Vec::new(),
        };
        let (row, col) = self.cell_of(&origin);

        let mut found: Vec<(usize, f64)> = Vec::new();
        for dr in -self.ring..=self.ring {
            for dc in -self.ring..=self.ring {
                if let Some(members) = self.cells.get(&(row + dr, col + dc)) {
                    for &idx in members {
                        if let Some(c) = targets[idx].coordinate {
                            found.push((idx, haversine_distance(&origin, &c)));
                        }
                    }
                }
            }
        }

        found.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        found.truncate(cap);
        found
            .into_iter()
            .enumerate()
            .map(|(rank, (target_index, distance))| CandidatePair {
                listing_index: listing.index,
                target_index,
                rank,
                distance_m: Some(distance),
            })
            .collect()
    }
}
