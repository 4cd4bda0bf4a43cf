// src/normalization/prepare.rs
//! Turns raw records into their comparable form.
//!
//! Malformed numeric fields degrade to `None` and are counted; they never stop
//! the run.

use crate::models::{
    CadastralRecord, Granularity, ListingRecord, NormalizedKey, PreparedCadastral,
    PreparedListing, RawNumber,
};

use super::locality::LocalityAliasTable;
use super::text::{extract_features, normalize_numeric};

const MAX_PLAUSIBLE_SURFACE_M2: f64 = 100_000.0;
const MAX_PLAUSIBLE_ROOMS: f64 = 50.0;
const MAX_PLAUSIBLE_FLOORS: f64 = 200.0;
const MIN_PLAUSIBLE_YEAR: f64 = 1000.0;
const MAX_PLAUSIBLE_YEAR: f64 = 2100.0;

/// Running count of malformed input fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MalformedTally {
    pub fields: usize,
}

impl MalformedTally {
    /// Parses `raw` and keeps it only if `accept` holds. A present value that
    /// fails either step is counted.
    fn numeric(&mut self, raw: Option<&RawNumber>, accept: impl Fn(f64) -> bool) -> Option<f64> {
        let raw = raw?;
        match normalize_numeric(raw).filter(|v| accept(*v)) {
            Some(v) => Some(v),
            None => {
                self.fields += 1;
                None
            }
        }
    }
}

fn plausible_surface(v: f64) -> bool {
    v > 0.0 && v <= MAX_PLAUSIBLE_SURFACE_M2
}

fn plausible_rooms(v: f64) -> bool {
    (0.0..=MAX_PLAUSIBLE_ROOMS).contains(&v)
}

pub fn prepare_listing(
    index: usize,
    record: &ListingRecord,
    aliases: &LocalityAliasTable,
    tally: &mut MalformedTally,
) -> PreparedListing {
    let locality = aliases.resolve(&record.locality_text);
    let surface_m2 = tally.numeric(record.surface_m2.as_ref(), plausible_surface);
    let rooms = tally.numeric(record.rooms.as_ref(), plausible_rooms);
    let price = tally.numeric(record.price.as_ref(), |v| v > 0.0);
    // bathrooms are parsed only to flag malformed input
    let _ = tally.numeric(record.bathrooms.as_ref(), plausible_rooms);

    let features = record
        .description
        .as_deref()
        .map(extract_features)
        .unwrap_or_default();

    PreparedListing {
        index,
        id: record.id.clone(),
        key: NormalizedKey {
            locality: locality.key,
            locality_resolved: locality.resolved,
            surface_m2,
            rooms,
            features,
        },
        price,
        coordinate: record.coordinate.filter(|c| c.is_valid()),
    }
}

pub fn prepare_cadastral(
    record: &CadastralRecord,
    aliases: &LocalityAliasTable,
    tally: &mut MalformedTally,
) -> PreparedCadastral {
    // The registry's neighbourhood id is authoritative; the address is a
    // fallback for rows that lack one.
    let locality = match record.neighborhood_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => aliases.resolve(id),
        _ => aliases.resolve(&record.address),
    };

    let surface_m2 = tally.numeric(record.surface_m2.as_ref(), plausible_surface);
    let rooms = tally.numeric(record.rooms.as_ref(), plausible_rooms);
    let construction_year = tally.numeric(record.construction_year.as_ref(), |v| {
        (MIN_PLAUSIBLE_YEAR..=MAX_PLAUSIBLE_YEAR).contains(&v)
    });
    let floors = tally.numeric(record.floors.as_ref(), |v| {
        (0.0..=MAX_PLAUSIBLE_FLOORS).contains(&v)
    });

    let features = record
        .usage_notes
        .as_deref()
        .map(extract_features)
        .unwrap_or_default();

    if record.lat.is_some() != record.lon.is_some() || (record.lat.is_some() && record.coordinate().is_none()) {
        tally.fields += 1;
    }

    PreparedCadastral {
        reference: normalize_reference(&record.reference),
        granularity: Granularity::Unit,
        key: NormalizedKey {
            locality: locality.key,
            locality_resolved: locality.resolved,
            surface_m2,
            rooms,
            features,
        },
        construction_year,
        floors,
        address: record.address.trim().to_string(),
        coordinate: record.coordinate(),
        unit_count: 1,
    }
}

/// Upper-cases and drops whitespace from a cadastral reference.
pub fn normalize_reference(reference: &str) -> String {
    reference
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuildingFeature, ListingId};

    fn raw_listing() -> ListingRecord {
        ListingRecord {
            id: ListingId("L-1".to_string()),
            price: Some(RawNumber::Text("320.000 €".to_string())),
            surface_m2: Some(RawNumber::Text("80 m²".to_string())),
            rooms: Some(RawNumber::Number(2.0)),
            bathrooms: Some(RawNumber::Text("uno".to_string())),
            locality_text: "Calle Verdi, Gràcia".to_string(),
            description: Some("Con ascensor".to_string()),
            url: "https://example.org/l-1".to_string(),
            property_type: None,
            coordinate: None,
        }
    }

    #[test]
    fn test_prepare_listing() {
        let aliases = LocalityAliasTable::barcelona();
        let mut tally = MalformedTally::default();
        let listing = prepare_listing(0, &raw_listing(), &aliases, &mut tally);

        assert_eq!(listing.key.locality, "vila de gracia");
        assert!(listing.key.locality_resolved);
        assert_eq!(listing.key.surface_m2, Some(80.0));
        assert_eq!(listing.key.rooms, Some(2.0));
        assert_eq!(listing.price, Some(320_000.0));
        assert_eq!(listing.price_per_m2(), Some(4_000.0));
        assert!(listing.key.features.contains(&BuildingFeature::Elevator));
        // "uno" bathrooms
        assert_eq!(tally.fields, 1);
    }

    #[test]
    fn test_implausible_values_degrade_to_none() {
        let aliases = LocalityAliasTable::new();
        let mut tally = MalformedTally::default();
        let mut raw = raw_listing();
        raw.surface_m2 = Some(RawNumber::Number(-5.0));
        raw.rooms = Some(RawNumber::Text("muchas".to_string()));
        raw.bathrooms = None;
        let listing = prepare_listing(3, &raw, &aliases, &mut tally);
        assert_eq!(listing.key.surface_m2, None);
        assert_eq!(listing.key.rooms, None);
        assert_eq!(listing.price_per_m2(), None);
        assert_eq!(tally.fields, 2);
        assert!(!listing.key.locality_resolved);
    }

    #[test]
    fn test_prepare_cadastral_uses_neighbourhood_then_address() {
        let aliases = LocalityAliasTable::barcelona();
        let mut tally = MalformedTally::default();
        let mut record = CadastralRecord {
            reference: "9028401 df2892h 0001 ab".to_string(),
            surface_m2: Some(RawNumber::Number(82.0)),
            construction_year: Some(RawNumber::Text("1920".to_string())),
            floors: Some(RawNumber::Number(5.0)),
            address: "CL VERDI 12, Gràcia".to_string(),
            neighborhood_id: None,
            lat: Some(41.40),
            lon: None,
            rooms: None,
            usage_notes: None,
        };
        let unit = prepare_cadastral(&record, &aliases, &mut tally);
        assert_eq!(unit.reference, "9028401DF2892H0001AB");
        assert_eq!(unit.key.locality, "vila de gracia");
        assert_eq!(unit.construction_year, Some(1920.0));
        assert!(unit.coordinate.is_none());
        // half a coordinate pair
        assert_eq!(tally.fields, 1);

        record.neighborhood_id = Some("Sagrada Família".to_string());
        let unit = prepare_cadastral(&record, &aliases, &mut tally);
        assert_eq!(unit.key.locality, "la sagrada familia");
    }
}
