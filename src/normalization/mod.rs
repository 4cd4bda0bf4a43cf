pub mod locality;
pub mod prepare;
pub mod text;

pub use locality::{LocalityAliasTable, LocalityMatch};
pub use prepare::{normalize_reference, prepare_cadastral, prepare_listing, MalformedTally};
pub use text::{extract_features, normalize_numeric, normalize_text, parse_numeric_text};

/// Canonical locality key for free text. Shorthand for
/// `aliases.resolve(raw).key`.
pub fn normalize_locality(raw: &str, aliases: &LocalityAliasTable) -> String {
    aliases.resolve(raw).key
}
