// src/matching/aggregate.rs
//! Collapses cadastral units into synthetic building records.
//!
//! Units share a building when the first 14 characters of their reference
//! (the parcel part) agree. The output depends only on the set of input
//! units: members are put in a canonical order before any arithmetic, and
//! buildings come out sorted by key.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{Coordinate, Granularity, NormalizedKey, PreparedCadastral};
use crate::utils::geo::centroid;

pub const BUILDING_KEY_LEN: usize = 14;

/// Parcel part of a cadastral reference.
pub fn building_key(reference: &str) -> String {
    reference
        .trim()
        .to_uppercase()
        .chars()
        .take(BUILDING_KEY_LEN)
        .collect()
}

pub fn aggregate_buildings(units: &[PreparedCadastral]) -> Vec<PreparedCadastral> {
    let mut groups: BTreeMap<String, Vec<&PreparedCadastral>> = BTreeMap::new();
    for unit in units {
        let key = building_key(&unit.reference);
        if key.is_empty() {
            continue;
        }
        groups.entry(key).or_default().push(unit);
    }

    groups
        .into_iter()
        .map(|(key, mut members)| {
            members.sort_by(|a, b| canonical_order(a, b));
            merge(key, &members)
        })
        .collect()
}

fn canonical_order(a: &PreparedCadastral, b: &PreparedCadastral) -> Ordering {
    let opt = |x: Option<f64>, y: Option<f64>| match (x, y) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (x, y) => x.is_some().cmp(&y.is_some()),
    };
    a.reference
        .cmp(&b.reference)
        .then_with(|| a.address.cmp(&b.address))
        .then_with(|| a.key.locality.cmp(&b.key.locality))
        .then_with(|| opt(a.key.surface_m2, b.key.surface_m2))
        .then_with(|| opt(a.key.rooms, b.key.rooms))
        .then_with(|| opt(a.construction_year, b.construction_year))
        .then_with(|| opt(a.floors, b.floors))
        .then_with(|| a.unit_count.cmp(&b.unit_count))
}

fn merge(key: String, members: &[&PreparedCadastral]) -> PreparedCadastral {
    let (locality, locality_resolved) = dominant_locality(members);
    let coordinates: Vec<Coordinate> = members.iter().filter_map(|m| m.coordinate).collect();
    let features: BTreeSet<_> = members
        .iter()
        .flat_map(|m| m.key.features.iter().copied())
        .collect();

    PreparedCadastral {
        reference: key,
        granularity: Granularity::Building,
        key: NormalizedKey {
            locality,
            locality_resolved,
            surface_m2: mean(members.iter().map(|m| m.key.surface_m2)),
            rooms: mean(members.iter().map(|m| m.key.rooms)),
            features,
        },
        construction_year: mean(members.iter().map(|m| m.construction_year)),
        floors: mean(members.iter().map(|m| m.floors)),
        address: members
            .iter()
            .map(|m| m.address.as_str())
            .find(|a| !a.is_empty())
            .unwrap_or_default()
            .to_string(),
        coordinate: centroid(&coordinates),
        unit_count: members.iter().map(|m| m.unit_count).sum(),
    }
}

fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let present: Vec<f64> = values.flatten().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

/// Most frequent non-empty locality; ties go to the smallest key.
fn dominant_locality(members: &[&PreparedCadastral]) -> (String, bool) {
    let mut counts: BTreeMap<&str, (usize, bool)> = BTreeMap::new();
    for m in members.iter().filter(|m| !m.key.locality.is_empty()) {
        let entry = counts.entry(m.key.locality.as_str()).or_insert((0, false));
        entry.0 += 1;
        entry.1 |= m.key.locality_resolved;
    }
    let mut best: Option<(&str, usize, bool)> = None;
    for (locality, (count, resolved)) in counts {
        if best.map_or(true, |(_, c, _)| count > c) {
            best = Some((locality, count, resolved));
        }
    }
    best.map(|(l, _, r)| (l.to_string(), r))
        .unwrap_or((String::new(), false))
}
