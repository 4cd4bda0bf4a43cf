// src/geocoding/gazetteer.rs
//! Offline lookup table of known places, usable wherever a provider is.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::provider::GeocodingProvider;
use crate::models::Coordinate;
use crate::normalization::normalize_text;
use crate::utils::errors::GeocodeError;

#[derive(Debug, Clone, Default)]
pub struct GazetteerProvider {
    places: HashMap<String, Coordinate>,
}

impl GazetteerProvider {
    pub fn from_map(entries: &BTreeMap<String, Coordinate>) -> Self {
        let places = entries
            .iter()
            .filter(|(_, c)| c.is_valid())
            .map(|(name, c)| (normalize_text(name), *c))
            .filter(|(name, _)| !name.is_empty())
            .collect();
        Self { places }
    }

    /// Reads `{"place name": {"lat": .., "lon": ..}, ...}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read gazetteer {}", path.display()))?;
        let entries: BTreeMap<String, Coordinate> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse gazetteer {}", path.display()))?;
        let gazetteer = Self::from_map(&entries);
        info!(
            "Loaded gazetteer with {} places from {}",
            gazetteer.len(),
            path.display()
        );
        Ok(gazetteer)
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

#[async_trait]
impl GeocodingProvider for GazetteerProvider {
    async fn lookup(&self, query: &str) -> Result<Coordinate, GeocodeError> {
        // Whole query first, then the head before any ", region" suffix.
        let head = query.split(',').next().unwrap_or_default();
        [normalize_text(query), normalize_text(head)]
            .iter()
            .find_map(|key| self.places.get(key).copied())
            .ok_or_else(|| GeocodeError::NotFound(query.to_string()))
    }

    fn name(&self) -> &str {
        "gazetteer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_ignores_case_accents_and_region() {
        let mut entries = BTreeMap::new();
        entries.insert("Vila de Gràcia".to_string(), Coordinate::new(41.4036, 2.1589));
        entries.insert("Nowhere".to_string(), Coordinate::new(123.0, 0.0));
        let gazetteer = GazetteerProvider::from_map(&entries);
        assert_eq!(gazetteer.len(), 1);

        let c = gazetteer.lookup("VILA DE GRACIA, Barcelona").await.unwrap();
        assert_eq!(c, Coordinate::new(41.4036, 2.1589));
        assert!(matches!(
            gazetteer.lookup("El Born").await,
            Err(GeocodeError::NotFound(_))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places.json");
        std::fs::write(&path, r#"{"El Raval": {"lat": 41.3800, "lon": 2.1700}}"#).unwrap();
        let gazetteer = GazetteerProvider::from_json_file(&path).unwrap();
        assert_eq!(gazetteer.len(), 1);
        assert!(GazetteerProvider::from_json_file(&dir.path().join("missing.json")).is_err());
    }
}
