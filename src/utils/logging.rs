// src/utils/logging.rs - Logging helpers for resolution runs
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::models::{MatchReason, MatchStrategy};

#[derive(Clone)]
pub struct MatchingLogger {
    method_name: &'static str,
    method_emoji: &'static str,
    start_time: Instant,
}

impl MatchingLogger {
    pub fn new(strategy: MatchStrategy) -> Self {
        let (method_name, method_emoji) = match strategy {
            MatchStrategy::Heuristic => ("HEURISTIC", "🧮"),
            MatchStrategy::Geographic => ("GEOGRAPHIC", "📍"),
            MatchStrategy::Combined => ("COMBINED", "🔀"),
            MatchStrategy::BuildingAggregate => ("BUILDING", "🏢"),
        };

        Self {
            method_name,
            method_emoji,
            start_time: Instant::now(),
        }
    }

    fn elapsed_secs(&self) -> f32 {
        self.start_time.elapsed().as_secs_f32()
    }

    pub fn log_start(&self, run_id: &str, listings: usize, cadastral: usize) {
        info!(
            "[{}] {} 🚀 Starting {} resolution (run ID: {}) for {} listings against {} cadastral records",
            self.method_name,
            self.method_emoji,
            self.method_name.to_lowercase(),
            run_id,
            listings,
            cadastral
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let msg = if let Some(details) = details {
            format!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.method_name, self.method_emoji, phase, details, self.elapsed_secs()
            )
        } else {
            format!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.method_name, self.method_emoji, phase, self.elapsed_secs()
            )
        };
        info!("{}", msg);
    }

    pub fn log_normalization(&self, unresolved_localities: usize, malformed_fields: usize) {
        info!(
            "[{}] {} 🧹 Normalization complete: {} localities without alias match, {} malformed numeric fields",
            self.method_name, self.method_emoji, unresolved_localities, malformed_fields
        );
    }

    pub fn log_geocoding(&self, requested: usize, resolved: usize, failed: usize) {
        info!(
            "[{}] {} 🌍 Geocoding: {} lookups requested, {} resolved, {} failed",
            self.method_name, self.method_emoji, requested, resolved, failed
        );
    }

    pub fn log_blocking_results(&self, blocks: usize, total_candidates: usize, empty_blocks: usize) {
        info!(
            "[{}] {} 🧱 Blocking: {} blocks, {} candidate pairs, {} listings with no candidates",
            self.method_name, self.method_emoji, blocks, total_candidates, empty_blocks
        );
    }

    pub fn log_distance_filtering(&self, discarded: usize, max_distance_m: f64) {
        if discarded > 0 {
            info!(
                "[{}] {} 🚫 Discarded {} candidates beyond {}m before scoring",
                self.method_name, self.method_emoji, discarded, max_distance_m
            );
        }
    }

    pub fn log_assignment_results(&self, outcomes: &BTreeMap<MatchReason, usize>, total: usize) {
        let matched: usize = outcomes
            .iter()
            .filter(|(reason, _)| reason.is_matched())
            .map(|(_, count)| *count)
            .sum();
        let percent = if total > 0 {
            (matched as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        info!(
            "[{}] {} 🎯 Assignment: {}/{} listings matched ({:.1}%)",
            self.method_name, self.method_emoji, matched, total, percent
        );
        for (reason, count) in outcomes.iter().filter(|(r, _)| !r.is_matched()) {
            info!(
                "[{}] {}    • unmatched ({}): {}",
                self.method_name, self.method_emoji, reason, count
            );
        }
    }

    pub fn log_quality_warning(&self, warning: &str) {
        warn!(
            "[{}] {} ⚠️  Quality gate: {}",
            self.method_name, self.method_emoji, warning
        );
    }

    pub fn log_completion(&self, matched: usize, total: usize) {
        info!(
            "[{}] {} ✅ Resolution complete in {:.2}s: {} of {} listings linked",
            self.method_name,
            self.method_emoji,
            self.elapsed_secs(),
            matched,
            total
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.method_name, self.method_emoji, message);
    }

    pub fn log_debug(&self, message: &str) {
        debug!("[{}] {} {}", self.method_name, self.method_emoji, message);
    }
}
