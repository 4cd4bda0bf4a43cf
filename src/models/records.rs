// src/models/records.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Latitude/longitude pair in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// A numeric field exactly as the acquisition layer delivered it.
/// Portals hand out numbers, strings like "80,5 m²", or nothing at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

impl From<f64> for RawNumber {
    fn from(value: f64) -> Self {
        RawNumber::Number(value)
    }
}

impl From<&str> for RawNumber {
    fn from(value: &str) -> Self {
        RawNumber::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Residential,
    Studio,
    Duplex,
    Penthouse,
    Commercial,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(pub String);

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A market advertisement as ingested. Never mutated by the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: ListingId,
    #[serde(default)]
    pub price: Option<RawNumber>,
    #[serde(default)]
    pub surface_m2: Option<RawNumber>,
    #[serde(default)]
    pub rooms: Option<RawNumber>,
    #[serde(default)]
    pub bathrooms: Option<RawNumber>,
    #[serde(default)]
    pub locality_text: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub property_type: Option<PropertyType>,
    /// Map pin published by the portal, when there is one.
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
}

/// A cadastral registry entry, unit-level (20 char reference) or
/// building-level (14 char parcel reference).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadastralRecord {
    pub reference: String,
    #[serde(default)]
    pub surface_m2: Option<RawNumber>,
    #[serde(default)]
    pub construction_year: Option<RawNumber>,
    #[serde(default)]
    pub floors: Option<RawNumber>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub neighborhood_id: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub rooms: Option<RawNumber>,
    /// Usage notes attached to the registry entry (e.g. "vivienda con ascensor").
    #[serde(default)]
    pub usage_notes: Option<String>,
}

impl CadastralRecord {
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                let c = Coordinate::new(lat, lon);
                c.is_valid().then_some(c)
            }
            _ => None,
        }
    }
}
