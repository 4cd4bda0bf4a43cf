// src/utils/progress_config.rs

use indicatif::{ProgressBar, ProgressStyle};
use std::env;

/// Configuration for progress tracking during a resolution run
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Whether to show per-phase bars (scoring, geocoding)
    pub detailed: bool,
    /// Whether to show geocoder cache statistics in the run summary
    pub show_cache_stats: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: true,
            show_cache_stats: true,
        }
    }
}

impl ProgressConfig {
    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            enabled: env::var("PROGRESS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            detailed: env::var("PROGRESS_DETAILED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            show_cache_stats: env::var("PROGRESS_SHOW_CACHE_STATS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        }
    }

    /// Silent configuration for tests and library callers
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            detailed: false,
            show_cache_stats: false,
        }
    }

    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }

    pub fn should_show_cache_stats(&self) -> bool {
        self.enabled && self.show_cache_stats
    }

    /// A styled bar when detailed progress is on, a hidden one otherwise.
    pub fn phase_bar(&self, len: u64, label: &str) -> ProgressBar {
        if !self.should_show_detailed() {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        let template = format!(
            "  🏠 [{{elapsed_precise}}] {{bar:30.cyan/blue}} {{pos}}/{{len}} {}",
            label
        );
        if let Ok(style) = ProgressStyle::default_bar().template(&template) {
            pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = ProgressConfig::default();
        assert!(config.enabled);
        assert!(config.detailed);
        assert!(config.show_cache_stats);
    }

    #[test]
    fn test_env_config() {
        env::set_var("PROGRESS_ENABLED", "false");
        env::set_var("PROGRESS_DETAILED", "false");
        env::set_var("PROGRESS_SHOW_CACHE_STATS", "false");

        let config = ProgressConfig::from_env();
        assert!(!config.enabled);
        assert!(!config.detailed);
        assert!(!config.show_cache_stats);

        // Clean up
        env::remove_var("PROGRESS_ENABLED");
        env::remove_var("PROGRESS_DETAILED");
        env::remove_var("PROGRESS_SHOW_CACHE_STATS");
    }

    #[test]
    fn test_should_show_methods() {
        let mut config = ProgressConfig::default();
        assert!(config.should_show_detailed());
        assert!(config.should_show_cache_stats());

        config.enabled = false;
        assert!(!config.should_show_detailed());
        assert!(!config.should_show_cache_stats());
        assert!(config.phase_bar(10, "Scoring...").is_hidden());
    }
}
