pub mod cached;
pub mod gazetteer;
pub mod provider;

pub use cached::{CachedGeocoder, GeocoderStats};
pub use gazetteer::GazetteerProvider;
pub use provider::GeocodingProvider;
