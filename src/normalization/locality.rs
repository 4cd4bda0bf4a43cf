// src/normalization/locality.rs
//! Neighbourhood alias resolution.
//!
//! Listing portals write the same neighbourhood many ways ("Gràcia", "Vila de
//! Gracia", "C/ Verdi 12, Gràcia, Barcelona"). The alias table maps every known
//! variant to one canonical key. Resolution never fails: text that matches no
//! alias is returned cleaned, flagged as unresolved.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::text::normalize_text;

const SEGMENT_SEPARATORS: [char; 6] = [',', ';', '/', '(', ')', '|'];

/// Outcome of resolving a locality string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalityMatch {
    pub key: String,
    pub resolved: bool,
}

#[derive(Debug, Clone)]
struct AliasEntry {
    alias: String,
    canonical: String,
}

/// Injected alias service. Build once per run and share by reference.
#[derive(Debug, Clone, Default)]
pub struct LocalityAliasTable {
    exact: HashMap<String, String>,
    /// Longest alias first, so "gracia nova" wins over "gracia".
    by_length: Vec<AliasEntry>,
}

impl LocalityAliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `canonical -> [aliases]`. Each canonical name is
    /// also an alias of itself.
    pub fn from_map(map: &BTreeMap<String, Vec<String>>) -> Self {
        let mut table = Self::new();
        for (canonical, aliases) in map {
            table.insert(canonical, canonical);
            for alias in aliases {
                table.insert(canonical, alias);
            }
        }
        table
    }

    /// Parses `{"Vila de Gràcia": ["Gràcia", "Gracia Vila"], ...}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let map: BTreeMap<String, Vec<String>> =
            serde_json::from_str(json).context("Alias table is not a canonical -> aliases map")?;
        Ok(Self::from_map(&map))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read alias table {}", path.display()))?;
        let table = Self::from_json_str(&raw)
            .with_context(|| format!("Failed to parse alias table {}", path.display()))?;
        info!(
            "Loaded {} locality aliases for {} neighbourhoods from {}",
            table.len(),
            table.canonical_count(),
            path.display()
        );
        Ok(table)
    }

    /// Barcelona neighbourhoods with the spellings seen on Spanish portals.
    pub fn barcelona() -> Self {
        let entries: &[(&str, &[&str])] = &[
            ("Vila de Gràcia", &["Gràcia", "La Vila de Gràcia", "Gracia Vila", "Villa de Gracia"]),
            ("Camp d'en Grassot i Gràcia Nova", &["Camp d'en Grassot", "Gràcia Nova"]),
            ("La Salut", &[]),
            ("Vallcarca i els Penitents", &["Vallcarca"]),
            ("La Dreta de l'Eixample", &["Dreta de l'Eixample", "Eixample Dreta", "Derecha del Ensanche"]),
            ("L'Antiga Esquerra de l'Eixample", &["Antiga Esquerra de l'Eixample", "Eixample Esquerra", "Izquierda del Ensanche"]),
            ("La Nova Esquerra de l'Eixample", &["Nova Esquerra de l'Eixample", "Nueva Izquierda del Ensanche"]),
            ("Sant Antoni", &[]),
            ("La Sagrada Família", &["Sagrada Família"]),
            ("El Fort Pienc", &["Fort Pienc"]),
            ("El Raval", &["Raval"]),
            ("El Barri Gòtic", &["Barri Gòtic", "Gòtic", "Barrio Gótico", "Gothic Quarter"]),
            ("La Barceloneta", &["Barceloneta"]),
            ("Sant Pere, Santa Caterina i la Ribera", &["El Born", "Born", "La Ribera", "Santa Caterina", "Sant Pere"]),
            ("El Poblenou", &["Poblenou", "Pueblo Nuevo"]),
            ("La Vila Olímpica del Poblenou", &["Vila Olímpica", "Villa Olímpica"]),
            ("Diagonal Mar i el Front Marítim del Poblenou", &["Diagonal Mar"]),
            ("El Clot", &["Clot"]),
            ("El Camp de l'Arpa del Clot", &["Camp de l'Arpa"]),
            ("Sant Martí de Provençals", &["Sant Martí"]),
            ("Sants", &[]),
            ("Les Corts", &[]),
            ("Pedralbes", &[]),
            ("Sarrià", &[]),
            ("Sant Gervasi - Galvany", &["Galvany"]),
            ("Sant Gervasi - la Bonanova", &["La Bonanova", "Bonanova"]),
            ("El Putxet i el Farró", &["Putxet", "El Farró"]),
            ("El Baix Guinardó", &["Baix Guinardó"]),
            ("El Guinardó", &["Guinardó"]),
            ("Horta", &[]),
            ("Sant Andreu", &["Sant Andreu de Palomar"]),
        ];

        let map: BTreeMap<String, Vec<String>> = entries
            .iter()
            .map(|(canonical, aliases)| {
                (
                    canonical.to_string(),
                    aliases.iter().map(|a| a.to_string()).collect(),
                )
            })
            .collect();
        Self::from_map(&map)
    }

    pub fn insert(&mut self, canonical: &str, alias: &str) {
        let canonical_key = normalize_text(canonical);
        let alias_key = normalize_text(alias);
        if canonical_key.is_empty() || alias_key.is_empty() {
            return;
        }
        // first writer wins so a later table entry cannot hijack an alias
        if self.exact.contains_key(&alias_key) {
            debug!("Alias '{}' already registered; ignoring duplicate for '{}'", alias_key, canonical_key);
            return;
        }
        self.exact.insert(alias_key.clone(), canonical_key.clone());
        self.by_length.push(AliasEntry {
            alias: alias_key,
            canonical: canonical_key,
        });
        self.by_length.sort_by(|a, b| {
            b.alias
                .len()
                .cmp(&a.alias.len())
                .then_with(|| a.alias.cmp(&b.alias))
        });
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    pub fn canonical_count(&self) -> usize {
        let mut keys: Vec<&String> = self.exact.values().collect();
        keys.sort();
        keys.dedup();
        keys.len()
    }

    /// Resolves free text to a canonical neighbourhood key.
    ///
    /// Order: whole-string alias, then comma-separated segments from the end
    /// ("Calle X, Gràcia"), then an alias embedded anywhere as whole words.
    pub fn resolve(&self, raw: &str) -> LocalityMatch {
        let text = normalize_text(raw);
        if text.is_empty() {
            return LocalityMatch {
                key: String::new(),
                resolved: false,
            };
        }

        if let Some(canonical) = self.exact.get(&text) {
            return LocalityMatch {
                key: canonical.clone(),
                resolved: true,
            };
        }

        for segment in raw.rsplit(|c| SEGMENT_SEPARATORS.contains(&c)) {
            let segment_key = normalize_text(segment);
            if let Some(canonical) = self.exact.get(&segment_key) {
                return LocalityMatch {
                    key: canonical.clone(),
                    resolved: true,
                };
            }
        }

        let padded = format!(" {} ", text);
        for entry in &self.by_length {
            if padded.contains(&format!(" {} ", entry.alias)) {
                return LocalityMatch {
                    key: entry.canonical.clone(),
                    resolved: true,
                };
            }
        }

        LocalityMatch {
            key: text,
            resolved: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_accent_insensitive_alias() {
        let table = LocalityAliasTable::barcelona();
        let m = table.resolve("Vila de Gràcia");
        assert_eq!(m.key, "vila de gracia");
        assert!(m.resolved);
        assert_eq!(table.resolve("GRACIA").key, "vila de gracia");
        assert_eq!(table.resolve("barrio gotico").key, "el barri gotic");
    }

    #[test]
    fn test_embedded_neighbourhood_in_address() {
        let table = LocalityAliasTable::barcelona();
        assert_eq!(
            table.resolve("Carrer de Verdi 12, Gràcia, Barcelona").key,
            "vila de gracia"
        );
        assert_eq!(
            table.resolve("Piso en calle Pujades en Poblenou").key,
            "el poblenou"
        );
        // longer alias wins over the shorter one it contains
        assert_eq!(
            table.resolve("Ático en Gràcia Nova").key,
            "camp d en grassot i gracia nova"
        );
    }

    #[test]
    fn test_unmatched_fails_soft() {
        let table = LocalityAliasTable::barcelona();
        let m = table.resolve("Unknown Place");
        assert_eq!(m.key, "unknown place");
        assert!(!m.resolved);

        let empty = table.resolve("  ,, ");
        assert_eq!(empty.key, "");
        assert!(!empty.resolved);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let table = LocalityAliasTable::barcelona();
        for raw in [
            "Vila de Gràcia",
            "C/ Mallorca 401, Sagrada Família",
            "Unknown Place",
            "Eixample",
            "",
        ] {
            let once = table.resolve(raw);
            let twice = table.resolve(&once.key);
            assert_eq!(once, twice, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_from_json_str() {
        let table = LocalityAliasTable::from_json_str(r#"{"Malasaña": ["Universidad", "Maravillas"]}"#)
            .unwrap();
        assert_eq!(table.resolve("Barrio de Maravillas").key, "malasana");
        assert_eq!(table.canonical_count(), 1);
        assert!(LocalityAliasTable::from_json_str("[1, 2]").is_err());
    }
}
