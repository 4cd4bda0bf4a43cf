// tests/resolution_scenarios.rs
//! End-to-end runs through the public pipeline API.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use linkage_lib::geocoding::{CachedGeocoder, GazetteerProvider};
use linkage_lib::matching::{run_resolution, ResolverServices};
use linkage_lib::models::{
    CadastralRecord, Coordinate, ListingId, ListingRecord, MatchReason, MatchStrategy, RawNumber,
};
use linkage_lib::normalization::LocalityAliasTable;
use linkage_lib::utils::config::{BlockingKind, GeocoderSettings, ResolverConfig, StrategyKind};
use linkage_lib::utils::errors::ResolverError;
use linkage_lib::utils::geo::offset_meters;

fn listing(id: &str, surface: f64, rooms: f64, locality: &str) -> ListingRecord {
    ListingRecord {
        id: ListingId(id.to_string()),
        price: Some(RawNumber::Number(surface * 4_500.0)),
        surface_m2: Some(RawNumber::Number(surface)),
        rooms: Some(RawNumber::Number(rooms)),
        bathrooms: Some(RawNumber::Number(1.0)),
        locality_text: locality.to_string(),
        description: None,
        url: format!("https://portal.example/{}", id),
        property_type: None,
        coordinate: None,
    }
}

fn unit(reference: &str, surface: f64, rooms: f64, neighbourhood: &str) -> CadastralRecord {
    CadastralRecord {
        reference: reference.to_string(),
        surface_m2: Some(RawNumber::Number(surface)),
        construction_year: Some(RawNumber::Number(1965.0)),
        floors: Some(RawNumber::Number(6.0)),
        address: format!("CL SANTS {}", &reference[..4]),
        neighborhood_id: Some(neighbourhood.to_string()),
        lat: None,
        lon: None,
        rooms: Some(RawNumber::Number(rooms)),
        usage_notes: None,
    }
}

fn place(mut record: CadastralRecord, at: Coordinate) -> CadastralRecord {
    record.lat = Some(at.lat);
    record.lon = Some(at.lon);
    record
}

fn services() -> ResolverServices {
    ResolverServices::new(Arc::new(LocalityAliasTable::barcelona()))
}

fn origin() -> Coordinate {
    Coordinate::new(41.3750, 2.1350)
}

#[tokio::test]
async fn test_close_attributes_in_same_neighbourhood_match() {
    let listings = vec![listing("A", 80.0, 2.0, "Vila de Gràcia")];
    let cadastre = vec![
        unit("9028401DF2892H0001AB", 82.0, 2.0, "Vila de Gràcia"),
        unit("9028401DF2892H0002BC", 140.0, 5.0, "Vila de Gràcia"),
    ];
    let config = ResolverConfig::default();
    let out = run_resolution(&listings, &cadastre, &config, &services())
        .await
        .unwrap();

    let row = &out.rows[0];
    assert_eq!(row.match_reason, MatchReason::Matched);
    assert_eq!(row.match_strategy, MatchStrategy::Heuristic);
    assert_eq!(row.cadastral_reference.as_deref(), Some("9028401DF2892H0001AB"));
    assert!(row.match_score.unwrap() >= 0.85);
    assert_eq!(row.cadastral_surface_m2, Some(82.0));
    assert_eq!(row.construction_year, Some(1965.0));
}

#[tokio::test]
async fn test_unknown_locality_has_no_candidates() {
    let listings = vec![listing("B", 60.0, 1.0, "Unknown Place")];
    let cadastre = vec![unit("9028401DF2892H0001AB", 60.0, 1.0, "Vila de Gràcia")];
    let out = run_resolution(&listings, &cadastre, &ResolverConfig::default(), &services())
        .await
        .unwrap();

    let row = &out.rows[0];
    assert_eq!(row.cadastral_reference, None);
    assert_eq!(row.match_reason, MatchReason::NoCandidates);
    assert_eq!(row.match_score, None);
    assert_eq!(row.cadastral_surface_m2, None);
    assert_eq!(out.results[0].candidate_count, 0);
}

#[tokio::test]
async fn test_better_listing_keeps_contested_unit() {
    let listings = vec![
        listing("weaker", 90.0, 2.0, "Sants"),
        listing("stronger", 80.0, 2.0, "Sants"),
    ];
    let cadastre = vec![
        unit("1111111AA1111A0001XY", 80.0, 2.0, "Sants"),
        unit("2222222BB2222B0001XY", 96.0, 3.0, "Sants"),
    ];
    let out = run_resolution(&listings, &cadastre, &ResolverConfig::default(), &services())
        .await
        .unwrap();

    assert_eq!(
        out.rows[1].cadastral_reference.as_deref(),
        Some("1111111AA1111A0001XY")
    );
    assert_ne!(
        out.rows[0].cadastral_reference.as_deref(),
        Some("1111111AA1111A0001XY")
    );
    // the larger unit is still close enough for the weaker listing
    assert_eq!(out.rows[0].match_reason, MatchReason::Matched);
    assert_eq!(
        out.rows[0].cadastral_reference.as_deref(),
        Some("2222222BB2222B0001XY")
    );
}

#[tokio::test]
async fn test_combined_matches_listing_without_coordinate() {
    let listings = vec![listing("A", 80.0, 2.0, "Vila de Gràcia")];
    let cadastre = vec![place(
        unit("9028401DF2892H0001AB", 82.0, 2.0, "Vila de Gràcia"),
        origin(),
    )];
    let config = ResolverConfig::builder()
        .strategy(StrategyKind::Combined)
        .build()
        .unwrap();
    let out = run_resolution(&listings, &cadastre, &config, &services())
        .await
        .unwrap();

    let row = &out.rows[0];
    assert_eq!(row.match_reason, MatchReason::Matched);
    assert_eq!(row.match_strategy, MatchStrategy::Combined);
    assert_eq!(row.cadastral_reference.as_deref(), Some("9028401DF2892H0001AB"));
}

#[tokio::test]
async fn test_spatial_blocking_without_listing_coordinate_reports_geocoding_failure() {
    let listings = vec![listing("A", 80.0, 2.0, "Sants")];
    let cadastre = vec![place(unit("1111111AA1111A0001XY", 80.0, 2.0, "Sants"), origin())];
    let config = ResolverConfig::builder()
        .strategy(StrategyKind::Heuristic)
        .blocking(BlockingKind::Spatial)
        .build()
        .unwrap();
    let out = run_resolution(&listings, &cadastre, &config, &services())
        .await
        .unwrap();

    let row = &out.rows[0];
    assert_eq!(row.match_reason, MatchReason::GeocodingFailed);
    assert_eq!(row.cadastral_reference, None);
    assert_eq!(row.match_score, None);
}

#[tokio::test]
async fn test_candidate_beyond_max_distance_is_never_scored() {
    let far_origin = offset_meters(&origin(), 5_000.0, 0.0);
    let mut near = listing("near", 80.0, 2.0, "Sants");
    near.coordinate = Some(far_origin);
    let mut remote = listing("remote", 80.0, 2.0, "Sants");
    remote.coordinate = Some(origin());

    let cadastre = vec![
        place(
            unit("1111111AA1111A0001XY", 80.0, 2.0, "Sants"),
            offset_meters(&origin(), 350.0, 0.0),
        ),
        place(
            unit("2222222BB2222B0001XY", 80.0, 2.0, "Sants"),
            offset_meters(&far_origin, 100.0, 0.0),
        ),
    ];
    let config = ResolverConfig::builder()
        .strategy(StrategyKind::Geographic)
        .max_distance_m(300.0)
        .build()
        .unwrap();
    let out = run_resolution(&[near, remote], &cadastre, &config, &services())
        .await
        .unwrap();

    let near_row = &out.rows[0];
    assert_eq!(near_row.match_reason, MatchReason::Matched);
    assert_eq!(near_row.match_strategy, MatchStrategy::Geographic);
    assert_eq!(near_row.cadastral_reference.as_deref(), Some("2222222BB2222B0001XY"));
    let score = near_row.match_score.unwrap();
    assert!((score - (1.0 - 100.0 / 300.0)).abs() < 1e-3);

    let remote_row = &out.rows[1];
    assert_eq!(remote_row.match_reason, MatchReason::NoCandidates);
    assert_eq!(remote_row.cadastral_reference, None);
    assert_eq!(remote_row.match_score, None);
}

#[tokio::test]
async fn test_units_are_never_shared_and_scores_are_bounded() {
    let localities = ["Sants", "El Raval", "Vila de Gràcia"];
    let listings: Vec<ListingRecord> = (0..30)
        .map(|i| {
            listing(
                &format!("L{}", i),
                45.0 + (i % 7) as f64 * 12.0,
                1.0 + (i % 4) as f64,
                localities[i % 3],
            )
        })
        .collect();
    let cadastre: Vec<CadastralRecord> = (0..12)
        .map(|i| {
            unit(
                &format!("{:07}AA1111A{:04}XY", 1000 + i, i),
                50.0 + (i % 5) as f64 * 15.0,
                1.0 + (i % 3) as f64,
                localities[i % 3],
            )
        })
        .collect();
    let config = ResolverConfig::builder().workers(3).build().unwrap();
    let out = run_resolution(&listings, &cadastre, &config, &services())
        .await
        .unwrap();

    assert_eq!(out.rows.len(), listings.len());
    let assigned: Vec<&str> = out
        .rows
        .iter()
        .filter_map(|r| r.cadastral_reference.as_deref())
        .collect();
    let unique: HashSet<&str> = assigned.iter().copied().collect();
    assert_eq!(assigned.len(), unique.len());
    assert!(assigned.len() <= cadastre.len());

    for row in &out.rows {
        if let Some(score) = row.match_score {
            assert!((0.0..=1.0).contains(&score));
        }
        if row.match_reason == MatchReason::Matched {
            assert!(row.match_score.unwrap() >= config.min_score);
        }
    }
    assert_eq!(out.report.matched, assigned.len());
}

#[tokio::test]
async fn test_building_aggregate_matches_share_one_building() {
    let listings = vec![
        listing("a", 70.0, 2.0, "Sants"),
        listing("b", 75.0, 2.0, "Sants"),
        listing("c", 72.0, 2.0, "Sants"),
    ];
    let cadastre = vec![
        unit("3333333CC3333C0001XY", 70.0, 2.0, "Sants"),
        unit("3333333CC3333C0002XY", 74.0, 2.0, "Sants"),
    ];
    let config = ResolverConfig::builder()
        .strategy(StrategyKind::BuildingAggregate)
        .build()
        .unwrap();
    let out = run_resolution(&listings, &cadastre, &config, &services())
        .await
        .unwrap();

    assert_eq!(out.stats.targets, 1);
    for row in &out.rows {
        assert_eq!(row.cadastral_reference.as_deref(), Some("3333333CC3333C"));
        assert_eq!(row.cadastral_surface_m2, Some(72.0));
        assert_eq!(row.unit_count, Some(2));
    }
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected() {
    assert!(ResolverConfig::builder().geo_weight(1.2).build().is_err());
    assert!(ResolverConfig::builder().max_distance_m(0.0).build().is_err());

    let mut config = ResolverConfig::default();
    config.weights.locality = 0.9;
    let err = run_resolution(
        &[listing("a", 80.0, 2.0, "Sants")],
        &[unit("1111111AA1111A0001XY", 80.0, 2.0, "Sants")],
        &config,
        &services(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ResolverError::Config(_)));
}

#[tokio::test]
async fn test_price_falling_with_surface_is_flagged() {
    let surfaces = [50.0, 70.0, 90.0, 110.0, 130.0, 150.0];
    let listings: Vec<ListingRecord> = surfaces
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let mut l = listing(&format!("L{}", i), s, 2.0, "Sants");
            l.price = Some(RawNumber::Number(s * (6_000.0 - 20.0 * s)));
            l
        })
        .collect();
    let cadastre: Vec<CadastralRecord> = surfaces
        .iter()
        .enumerate()
        .map(|(i, &s)| unit(&format!("{}444444DD4444D0001XY", i), s, 2.0, "Sants"))
        .collect();
    let out = run_resolution(&listings, &cadastre, &ResolverConfig::default(), &services())
        .await
        .unwrap();

    assert_eq!(out.report.matched, surfaces.len());
    assert!(out.report.has_warning("unexpected_sign: surface_m2"));
    let surface = out
        .report
        .correlations
        .iter()
        .find(|c| c.attribute == "surface_m2")
        .unwrap();
    assert!(surface.r.unwrap() < 0.0);
}

#[tokio::test]
async fn test_geocoded_listings_and_failed_lookups() {
    let mut places = BTreeMap::new();
    places.insert("Sants".to_string(), origin());
    let geocoder = CachedGeocoder::new(
        Arc::new(GazetteerProvider::from_map(&places)),
        GeocoderSettings {
            min_delay: Duration::ZERO,
            max_attempts: 2,
            backoff_base: Duration::from_millis(1),
            region_suffix: Some("Barcelona".to_string()),
        },
    );
    let services = services().with_geocoder(Arc::new(geocoder));

    let listings = vec![
        listing("pinned", 80.0, 2.0, "Sants"),
        listing("lost", 80.0, 2.0, "Atlantis"),
    ];
    let cadastre = vec![place(
        unit("1111111AA1111A0001XY", 80.0, 2.0, "Sants"),
        offset_meters(&origin(), 60.0, 0.0),
    )];
    let config = ResolverConfig::builder()
        .strategy(StrategyKind::Geographic)
        .build()
        .unwrap();
    let out = run_resolution(&listings, &cadastre, &config, &services)
        .await
        .unwrap();

    assert_eq!(out.rows[0].match_reason, MatchReason::Matched);
    assert_eq!(out.rows[0].cadastral_reference.as_deref(), Some("1111111AA1111A0001XY"));
    assert_eq!(out.rows[1].match_reason, MatchReason::GeocodingFailed);

    let stats = out.stats.geocoder.unwrap();
    assert_eq!(stats.provider_calls, 2);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.failed, 1);
}

#[test]
fn test_records_parse_from_portal_json() {
    let raw = r#"[
        {"id": "L1", "price": "325.000 €", "surface_m2": "80,5 m²", "rooms": 2,
         "locality_text": "Gràcia", "url": "https://portal.example/L1"},
        {"id": "L2", "locality_text": "Sants"}
    ]"#;
    let listings: Vec<ListingRecord> = serde_json::from_str(raw).unwrap();
    assert_eq!(listings.len(), 2);
    assert_eq!(listings[0].surface_m2, Some(RawNumber::Text("80,5 m²".to_string())));
    assert_eq!(listings[0].rooms, Some(RawNumber::Number(2.0)));
    assert_eq!(listings[1].price, None);

    let cadastre: Vec<CadastralRecord> = serde_json::from_str(
        r#"[{"reference": "9028401DF2892H0001AB", "surface_m2": 82, "lat": 41.40, "lon": 2.15}]"#,
    )
    .unwrap();
    assert_eq!(cadastre[0].coordinate(), Some(Coordinate::new(41.40, 2.15)));
}
