// src/geocoding/provider.rs
use async_trait::async_trait;

use crate::models::Coordinate;
use crate::utils::errors::GeocodeError;

/// Anything that can turn a free-text address into a coordinate.
///
/// The resolver never talks to a concrete service; callers inject an
/// implementation (an HTTP client, a local gazetteer, a test fake).
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<Coordinate, GeocodeError>;

    fn name(&self) -> &str {
        "geocoder"
    }
}
