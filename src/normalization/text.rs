// src/normalization/text.rs
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::{BuildingFeature, RawNumber};

static NUMBER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?\d(?:[\d.,]*\d)?").expect("valid number regex"));

const NEGATIONS: &str = r"(?:sin|sense|no|without)";

static FEATURE_PATTERNS: Lazy<Vec<(BuildingFeature, Regex, Regex)>> = Lazy::new(|| {
    let table: [(BuildingFeature, &str); 6] = [
        (BuildingFeature::Elevator, r"ascensor|ascensores|elevator|lift"),
        (BuildingFeature::Terrace, r"terraza|terrazas|terrassa|terrasses|terrace"),
        (BuildingFeature::Balcony, r"balcon|balcones|balco|balcons|balcony"),
        (
            BuildingFeature::Parking,
            r"parking|garaje|garatge|garage|aparcamiento|plaza de aparcamiento",
        ),
        (BuildingFeature::Pool, r"piscina|pool"),
        (
            BuildingFeature::AirConditioning,
            r"aire acondicionado|aire condicionat|air conditioning|climatizacion",
        ),
    ];
    table
        .iter()
        .map(|(feature, alternatives)| {
            let positive = Regex::new(&format!(r"\b(?:{})\b", alternatives))
                .expect("valid feature regex");
            let negative = Regex::new(&format!(r"\b{}\s+(?:{})\b", NEGATIONS, alternatives))
                .expect("valid negated feature regex");
            (*feature, positive, negative)
        })
        .collect()
});

/// Lower-cases, strips diacritics and punctuation, collapses whitespace.
/// Idempotent: feeding the output back in returns it unchanged.
pub fn normalize_text(raw: &str) -> String {
    let folded: String = raw
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| c.to_lowercase())
        .collect::<String>()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let stripped: String = folded
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a raw numeric field. Returns `None` on anything unparseable.
pub fn normalize_numeric(raw: &RawNumber) -> Option<f64> {
    match raw {
        RawNumber::Number(n) => n.is_finite().then_some(*n),
        RawNumber::Text(text) => parse_numeric_text(text),
    }
}

/// Extracts the first number in `text`, accepting both "1.234,56" and
/// "1,234.56" conventions. A lone separator followed by exactly three digits
/// is read as a thousands separator ("250.000 €"), otherwise as decimal.
pub fn parse_numeric_text(text: &str) -> Option<f64> {
    let token = NUMBER_TOKEN.find(text)?.as_str();
    let negative = token.starts_with('-');
    let body = token.trim_start_matches(['-', '+']);

    let cleaned = match (body.rfind('.'), body.rfind(',')) {
        (Some(dot), Some(comma)) => {
            let (decimal, thousands) = if dot > comma { ('.', ',') } else { (',', '.') };
            let without_thousands = body.replace(thousands, "");
            if without_thousands.matches(decimal).count() > 1 {
                return None;
            }
            without_thousands.replace(decimal, ".")
        }
        (Some(_), None) => single_separator(body, '.')?,
        (None, Some(_)) => single_separator(body, ',')?,
        (None, None) => body.to_string(),
    };

    let value = cleaned.parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(if negative { -value } else { value })
}

fn single_separator(body: &str, sep: char) -> Option<String> {
    let parts: Vec<&str> = body.split(sep).collect();
    if parts.len() > 2 {
        // repeated separator can only be grouping
        if parts[1..].iter().all(|p| p.len() == 3) {
            return Some(parts.concat());
        }
        return None;
    }
    let (int_part, frac_part) = (parts[0], parts[1]);
    if frac_part.len() == 3 && int_part.len() <= 3 && int_part != "0" {
        Some(format!("{}{}", int_part, frac_part))
    } else {
        Some(format!("{}.{}", int_part, frac_part))
    }
}

/// Amenity keywords mentioned (and not negated) in free text.
pub fn extract_features(text: &str) -> BTreeSet<BuildingFeature> {
    let normalized = normalize_text(text);
    let mut features = BTreeSet::new();
    if normalized.is_empty() {
        return features;
    }
    for (feature, positive, negative) in FEATURE_PATTERNS.iter() {
        let mentions = positive.find_iter(&normalized).count();
        let negated = negative.find_iter(&normalized).count();
        if mentions > negated {
            features.insert(*feature);
        }
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_strips_diacritics_and_punctuation() {
        assert_eq!(normalize_text("Vila de Gràcia"), "vila de gracia");
        assert_eq!(normalize_text("  L'Antiga   Esquerra de l'Eixample "), "l antiga esquerra de l eixample");
        assert_eq!(normalize_text("Sants-Montjuïc"), "sants montjuic");
        assert_eq!(normalize_text("Carrer de Còrsega, 301 (Gràcia)"), "carrer de corsega 301 gracia");
        assert_eq!(normalize_text("!!!"), "");
    }

    #[test]
    fn test_normalize_text_is_idempotent() {
        for raw in [
            "Vila de Gràcia",
            "İstanbul Çarşı",
            "ＡＢＣ ｆｕｌｌ",
            "Sant Martí de Provençals",
            "col·legi",
            "",
        ] {
            let once = normalize_text(raw);
            assert_eq!(normalize_text(&once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_parse_numeric_mixed_separators() {
        assert_eq!(parse_numeric_text("80"), Some(80.0));
        assert_eq!(parse_numeric_text("80,5 m²"), Some(80.5));
        assert_eq!(parse_numeric_text("1.234,56 €"), Some(1234.56));
        assert_eq!(parse_numeric_text("1,234.56"), Some(1234.56));
        assert_eq!(parse_numeric_text("250.000 €"), Some(250_000.0));
        assert_eq!(parse_numeric_text("1.250.000"), Some(1_250_000.0));
        assert_eq!(parse_numeric_text("0.750"), Some(0.75));
        assert_eq!(parse_numeric_text("3 hab."), Some(3.0));
        assert_eq!(parse_numeric_text("-12,5"), Some(-12.5));
    }

    #[test]
    fn test_parse_numeric_unparseable_returns_none() {
        assert_eq!(parse_numeric_text(""), None);
        assert_eq!(parse_numeric_text("a consultar"), None);
        assert_eq!(parse_numeric_text("1.23.4"), None);
        assert_eq!(normalize_numeric(&RawNumber::Number(f64::NAN)), None);
        assert_eq!(normalize_numeric(&RawNumber::Number(72.0)), Some(72.0));
        assert_eq!(normalize_numeric(&RawNumber::Text("72 m2".into())), Some(72.0));
    }

    #[test]
    fn test_extract_features() {
        let features = extract_features("Piso luminoso con ascensor y terraza de 10 m². Sin parking.");
        assert!(features.contains(&BuildingFeature::Elevator));
        assert!(features.contains(&BuildingFeature::Terrace));
        assert!(!features.contains(&BuildingFeature::Parking));

        let catalan = extract_features("Pis amb balcó i aire condicionat, sense ascensor");
        assert!(catalan.contains(&BuildingFeature::Balcony));
        assert!(catalan.contains(&BuildingFeature::AirConditioning));
        assert!(!catalan.contains(&BuildingFeature::Elevator));

        assert!(extract_features("").is_empty());
    }
}
