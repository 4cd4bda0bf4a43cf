// src/models/fixtures.rs
//! Prepared-record builders shared by unit tests.

use std::collections::BTreeSet;

use super::{Coordinate, Granularity, ListingId, NormalizedKey, PreparedCadastral, PreparedListing};

pub fn key(locality: &str, surface: Option<f64>, rooms: Option<f64>) -> NormalizedKey {
    NormalizedKey {
        locality: locality.to_string(),
        locality_resolved: !locality.is_empty(),
        surface_m2: surface,
        rooms,
        features: BTreeSet::new(),
    }
}

pub fn listing(index: usize, locality: &str, surface: Option<f64>, rooms: Option<f64>) -> PreparedListing {
    PreparedListing {
        index,
        id: ListingId(format!("L{}", index)),
        key: key(locality, surface, rooms),
        price: surface.map(|s| s * 4_000.0),
        coordinate: None,
    }
}

pub fn unit(reference: &str, locality: &str, surface: Option<f64>, rooms: Option<f64>) -> PreparedCadastral {
    PreparedCadastral {
        reference: reference.to_string(),
        granularity: Granularity::Unit,
        key: key(locality, surface, rooms),
        construction_year: Some(1960.0),
        floors: Some(6.0),
        address: format!("CL TEST {}", reference),
        coordinate: None,
        unit_count: 1,
    }
}

pub fn located<T: Locate>(mut record: T, coordinate: Coordinate) -> T {
    record.set_coordinate(coordinate);
    record
}

pub trait Locate {
    fn set_coordinate(&mut self, coordinate: Coordinate);
}

impl Locate for PreparedListing {
    fn set_coordinate(&mut self, coordinate: Coordinate) {
        self.coordinate = Some(coordinate);
    }
}

impl Locate for PreparedCadastral {
    fn set_coordinate(&mut self, coordinate: Coordinate) {
        self.coordinate = Some(coordinate);
    }
}
