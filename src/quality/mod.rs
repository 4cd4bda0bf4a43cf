// src/quality/mod.rs
//! Match quality report.
//!
//! Computed over the final output table. Suspicious findings are listed as
//! warnings; nothing here changes a match.

pub mod stats;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::models::{MatchReason, MatchStrategy, MatchedRow};
use crate::utils::config::QualitySettings;
use stats::{pearson, quantile_sorted, sorted};

const HISTOGRAM_BINS: usize = 10;
const TUKEY_FENCE: f64 = 1.5;
const MIN_OUTLIER_SAMPLE: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreQuantiles {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeCorrelation {
    pub attribute: &'static str,
    pub sample_size: usize,
    /// Pearson r against price per m²; `None` when undefined.
    pub r: Option<f64>,
    pub expected_positive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutlierSummary {
    pub lower_fence: f64,
    pub upper_fence: f64,
    pub below: usize,
    pub above: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityWarning {
    /// Correlation has the opposite sign to the expected one.
    UnexpectedSign { attribute: &'static str, r: f64 },
    /// |r| too small to mean anything.
    WeakCorrelation { attribute: &'static str, r: f64 },
    /// Too few matched pairs (or no variance) to judge.
    InsufficientSample { attribute: &'static str, sample_size: usize },
    LowMatchRate { rate: f64, minimum: f64 },
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityWarning::UnexpectedSign { attribute, r } => {
                write!(f, "unexpected_sign: {} (r={:.3})", attribute, r)
            }
            QualityWarning::WeakCorrelation { attribute, r } => {
                write!(f, "weak_correlation: {} (r={:.3})", attribute, r)
            }
            QualityWarning::InsufficientSample { attribute, sample_size } => {
                write!(f, "insufficient_sample: {} (n={})", attribute, sample_size)
            }
            QualityWarning::LowMatchRate { rate, minimum } => {
                write!(f, "low_match_rate: {:.3} < {:.3}", rate, minimum)
            }
        }
    }
}

impl QualityWarning {
    /// Short machine tag, e.g. `unexpected_sign: surface_m2`.
    pub fn tag(&self) -> String {
        match self {
            QualityWarning::UnexpectedSign { attribute, .. } => format!("unexpected_sign: {}", attribute),
            QualityWarning::WeakCorrelation { attribute, .. } => format!("weak_correlation: {}", attribute),
            QualityWarning::InsufficientSample { attribute, .. } => {
                format!("insufficient_sample: {}", attribute)
            }
            QualityWarning::LowMatchRate { .. } => "low_match_rate".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub total_listings: usize,
    pub matched: usize,
    pub match_rate: f64,
    pub matched_by_strategy: BTreeMap<MatchStrategy, usize>,
    pub unmatched_by_reason: BTreeMap<MatchReason, usize>,
    pub score_histogram: Vec<HistogramBin>,
    pub score_quantiles: Option<ScoreQuantiles>,
    pub correlations: Vec<AttributeCorrelation>,
    pub price_per_m2_outliers: Option<OutlierSummary>,
    pub surface_disagreements: usize,
    pub malformed_fields: usize,
    pub warnings: Vec<QualityWarning>,
}

impl QualityReport {
    pub fn has_warning(&self, tag: &str) -> bool {
        self.warnings.iter().any(|w| w.tag() == tag)
    }
}

type AttributeGetter = fn(&MatchedRow) -> Option<f64>;

/// Numeric attributes checked against price per m². All are expected to
/// correlate positively.
const CHECKED_ATTRIBUTES: [(&str, AttributeGetter); 5] = [
    ("surface_m2", |r: &MatchedRow| r.listing_surface_m2),
    ("rooms", |r: &MatchedRow| r.listing_rooms),
    ("cadastral_surface_m2", |r: &MatchedRow| r.cadastral_surface_m2),
    ("construction_year", |r: &MatchedRow| r.construction_year),
    ("floors", |r: &MatchedRow| r.floors),
];

pub fn build_report(rows: &[MatchedRow], malformed_fields: usize, settings: &QualitySettings) -> QualityReport {
    let matched_rows: Vec<&MatchedRow> = rows.iter().filter(|r| r.match_reason.is_matched()).collect();
    let total_listings = rows.len();
    let matched = matched_rows.len();
    let match_rate = if total_listings > 0 {
        matched as f64 / total_listings as f64
    } else {
        0.0
    };

    let mut matched_by_strategy: BTreeMap<MatchStrategy, usize> = BTreeMap::new();
    for row in &matched_rows {
        *matched_by_strategy.entry(row.match_strategy).or_insert(0) += 1;
    }
    let mut unmatched_by_reason: BTreeMap<MatchReason, usize> = BTreeMap::new();
    for row in rows.iter().filter(|r| !r.match_reason.is_matched()) {
        *unmatched_by_reason.entry(row.match_reason).or_insert(0) += 1;
    }

    let scores = sorted(matched_rows.iter().filter_map(|r| r.match_score));
    let score_quantiles = score_quantiles(&scores);
    let score_histogram = histogram(&scores);

    let mut warnings = Vec::new();
    if total_listings > 0 && match_rate < settings.min_match_rate {
        warnings.push(QualityWarning::LowMatchRate {
            rate: match_rate,
            minimum: settings.min_match_rate,
        });
    }

    let mut correlations = Vec::with_capacity(CHECKED_ATTRIBUTES.len());
    for (attribute, getter) in CHECKED_ATTRIBUTES {
        let pairs: Vec<(f64, f64)> = matched_rows
            .iter()
            .filter_map(|row| Some((getter(row)?, row.price_per_m2?)))
            .collect();
        let correlation = AttributeCorrelation {
            attribute,
            sample_size: pairs.len(),
            r: if pairs.len() >= settings.min_correlation_sample {
                pearson(&pairs)
            } else {
                None
            },
            expected_positive: true,
        };
        if let Some(w) = judge_correlation(&correlation, settings) {
            warnings.push(w);
        }
        correlations.push(correlation);
    }

    let price_per_m2_outliers = tukey_outliers(&sorted(matched_rows.iter().filter_map(|r| r.price_per_m2)));

    let surface_disagreements = matched_rows
        .iter()
        .filter(|row| match (row.listing_surface_m2, row.cadastral_surface_m2) {
            (Some(listing), Some(cadastral)) if cadastral > 0.0 => {
                (listing - cadastral).abs() / cadastral > settings.surface_disagreement_ratio
            }
            _ => false,
        })
        .count();

    QualityReport {
        total_listings,
        matched,
        match_rate,
        matched_by_strategy,
        unmatched_by_reason,
        score_histogram,
        score_quantiles,
        correlations,
        price_per_m2_outliers,
        surface_disagreements,
        malformed_fields,
        warnings,
    }
}

fn judge_correlation(c: &AttributeCorrelation, settings: &QualitySettings) -> Option<QualityWarning> {
    let r = match c.r {
        Some(r) => r,
        None => {
            return Some(QualityWarning::InsufficientSample {
                attribute: c.attribute,
                sample_size: c.sample_size,
            })
        }
    };
    if r.abs() < settings.near_zero_correlation {
        return Some(QualityWarning::WeakCorrelation {
            attribute: c.attribute,
            r,
        });
    }
    let sign_ok = if c.expected_positive { r > 0.0 } else { r < 0.0 };
    (!sign_ok).then_some(QualityWarning::UnexpectedSign {
        attribute: c.attribute,
        r,
    })
}

fn score_quantiles(sorted_scores: &[f64]) -> Option<ScoreQuantiles> {
    Some(ScoreQuantiles {
        p10: quantile_sorted(sorted_scores, 0.10)?,
        p25: quantile_sorted(sorted_scores, 0.25)?,
        p50: quantile_sorted(sorted_scores, 0.50)?,
        p75: quantile_sorted(sorted_scores, 0.75)?,
        p90: quantile_sorted(sorted_scores, 0.90)?,
    })
}

/// Ten equal bins over [0, 1]; a score of exactly 1.0 lands in the last bin.
fn histogram(scores: &[f64]) -> Vec<HistogramBin> {
    let bins_f = HISTOGRAM_BINS as f64;
    let mut bins: Vec<HistogramBin> = (0..HISTOGRAM_BINS)
        .map(|i| HistogramBin {
            lower: i as f64 / bins_f,
            upper: (i + 1) as f64 / bins_f,
            count: 0,
        })
        .collect();
    for score in scores {
        let idx = ((score.clamp(0.0, 1.0) * bins_f).floor() as usize).min(HISTOGRAM_BINS - 1);
        bins[idx].count += 1;
    }
    bins
}

fn tukey_outliers(sorted_values: &[f64]) -> Option<OutlierSummary> {
    if sorted_values.len() < MIN_OUTLIER_SAMPLE {
        return None;
    }
    let q1 = quantile_sorted(sorted_values, 0.25)?;
    let q3 = quantile_sorted(sorted_values, 0.75)?;
    let iqr = q3 - q1;
    let lower_fence = q1 - TUKEY_FENCE * iqr;
    let upper_fence = q3 + TUKEY_FENCE * iqr;
    Some(OutlierSummary {
        lower_fence,
        upper_fence,
        below: sorted_values.iter().filter(|v| **v < lower_fence).count(),
        above: sorted_values.iter().filter(|v| **v > upper_fence).count(),
    })
}
