// src/geocoding/cached.rs
//! Caching, rate-limited front for a [`GeocodingProvider`].
//!
//! Lookups are keyed by the normalized address, and failures are cached too,
//! so one run never asks the provider the same question twice. Outbound calls
//! go through a single gate: at most one request in flight, spaced by
//! `min_delay`, with bounded exponential backoff on transient errors.

use log::{debug, warn};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::provider::GeocodingProvider;
use crate::models::Coordinate;
use crate::normalization::normalize_text;
use crate::utils::config::GeocoderSettings;
use crate::utils::errors::GeocodeError;

type CachedOutcome = Result<Coordinate, GeocodeError>;

/// Snapshot of geocoder activity for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GeocoderStats {
    pub requests: usize,
    pub cache_hits: usize,
    pub provider_calls: usize,
    pub retries: usize,
    pub resolved: usize,
    pub failed: usize,
    pub cached_entries: usize,
}

#[derive(Default)]
struct Counters {
    requests: AtomicUsize,
    cache_hits: AtomicUsize,
    provider_calls: AtomicUsize,
    retries: AtomicUsize,
    resolved: AtomicUsize,
    failed: AtomicUsize,
}

pub struct CachedGeocoder {
    provider: Arc<dyn GeocodingProvider>,
    settings: GeocoderSettings,
    cache: RwLock<HashMap<String, CachedOutcome>>,
    /// Held for the whole provider exchange; stores when the last call went out.
    gate: Mutex<Option<Instant>>,
    counters: Counters,
}

impl CachedGeocoder {
    pub fn new(provider: Arc<dyn GeocodingProvider>, settings: GeocoderSettings) -> Self {
        Self {
            provider,
            settings,
            cache: RwLock::new(HashMap::new()),
            gate: Mutex::new(None),
            counters: Counters::default(),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Resolves `address`, appending the configured region suffix to the
    /// outbound query.
    pub async fn geocode(&self, address: &str) -> Result<Coordinate, GeocodeError> {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        let key = normalize_text(address);
        if key.is_empty() {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            return Err(GeocodeError::NotFound(address.to_string()));
        }

        if let Some(outcome) = self.cached(&key).await {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return self.tally(outcome);
        }

        let mut last_call = self.gate.lock().await;
        // Another task may have resolved the same key while we waited.
        if let Some(outcome) = self.cached(&key).await {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return self.tally(outcome);
        }

        let query = self.query_for(address);
        let outcome = self.call_with_retries(&query, &mut last_call).await;
        self.cache.write().await.insert(key, outcome.clone());
        self.tally(outcome)
    }

    pub async fn stats(&self) -> GeocoderStats {
        GeocoderStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            provider_calls: self.counters.provider_calls.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            resolved: self.counters.resolved.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            cached_entries: self.cache.read().await.len(),
        }
    }

    async fn cached(&self, key: &str) -> Option<CachedOutcome> {
        self.cache.read().await.get(key).cloned()
    }

    fn tally(&self, outcome: CachedOutcome) -> CachedOutcome {
        match &outcome {
            Ok(_) => self.counters.resolved.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.counters.failed.fetch_add(1, Ordering::Relaxed),
        };
        outcome
    }

    fn query_for(&self, address: &str) -> String {
        let address = address.trim();
        match self.settings.region_suffix.as_deref().map(str::trim) {
            Some(suffix) if !suffix.is_empty() => {
                let normalized_suffix = normalize_text(suffix);
                if normalize_text(address).ends_with(&normalized_suffix) {
                    address.to_string()
                } else {
                    format!("{}, {}", address, suffix)
                }
            }
            _ => address.to_string(),
        }
    }

    async fn call_with_retries(&self, query: &str, last_call: &mut Option<Instant>) -> CachedOutcome {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            if let Some(previous) = *last_call {
                tokio::time::sleep_until(previous + self.settings.min_delay).await;
            }
            *last_call = Some(Instant::now());
            self.counters.provider_calls.fetch_add(1, Ordering::Relaxed);

            match self.provider.lookup(query).await {
                Ok(coordinate) if coordinate.is_valid() => {
                    debug!("Geocoded '{}' -> ({:.6}, {:.6})", query, coordinate.lat, coordinate.lon);
                    return Ok(coordinate);
                }
                Ok(coordinate) => {
                    warn!(
                        "Geocoder returned an invalid coordinate ({}, {}) for '{}'",
                        coordinate.lat, coordinate.lon, query
                    );
                    return Err(GeocodeError::NotFound(query.to_string()));
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "Geocoding '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                        query, attempt, max_attempts, e, delay
                    );
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!("Geocoding '{}' gave up after {} attempt(s): {}", query, attempt, e);
                    return Err(e);
                }
            }
        }
    }

    /// `backoff_base * 2^(attempt-1)` plus up to 25% jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.settings.backoff_base.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << (attempt - 1).min(16));
        let jitter = rand::thread_rng().gen_range(0..=exp / 4);
        Duration::from_millis(exp + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Replays scripted answers per query; unknown queries are `NotFound`.
    #[derive(Default)]
    struct ScriptedProvider {
        script: StdMutex<HashMap<String, VecDeque<CachedOutcome>>>,
        seen: StdMutex<Vec<String>>,
        called_at: StdMutex<Vec<Instant>>,
    }

    impl ScriptedProvider {
        fn answer(self, query: &str, outcomes: Vec<CachedOutcome>) -> Self {
            self.script
                .lock()
                .unwrap()
                .insert(query.to_string(), outcomes.into_iter().collect());
            self
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }

        fn gaps(&self) -> Vec<Duration> {
            let calls = self.called_at.lock().unwrap();
            calls.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    #[async_trait]
    impl GeocodingProvider for ScriptedProvider {
        async fn lookup(&self, query: &str) -> Result<Coordinate, GeocodeError> {
            self.seen.lock().unwrap().push(query.to_string());
            self.called_at.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .get_mut(query)
                .and_then(|q| q.pop_front())
                .unwrap_or_else(|| Err(GeocodeError::NotFound(query.to_string())))
        }
    }

    fn fast_settings() -> GeocoderSettings {
        GeocoderSettings {
            min_delay: Duration::ZERO,
            max_attempts: 3,
            backoff_base: Duration::ZERO,
            region_suffix: None,
        }
    }

    fn gracia() -> Coordinate {
        Coordinate::new(41.4025, 2.1566)
    }

    #[tokio::test]
    async fn test_success_is_cached_by_normalized_address() {
        let provider = Arc::new(ScriptedProvider::default().answer("Vila de Gràcia", vec![Ok(gracia())]));
        let geocoder = CachedGeocoder::new(provider.clone(), fast_settings());

        assert_eq!(geocoder.geocode("Vila de Gràcia").await, Ok(gracia()));
        assert_eq!(geocoder.geocode("  VILA DE GRACIA ").await, Ok(gracia()));

        assert_eq!(provider.seen().len(), 1);
        let stats = geocoder.stats().await;
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.resolved, 2);
        assert_eq!(stats.cached_entries, 1);
    }

    #[tokio::test]
    async fn test_failures_are_cached_too() {
        let provider = Arc::new(ScriptedProvider::default());
        let geocoder = CachedGeocoder::new(provider.clone(), fast_settings());

        assert!(matches!(geocoder.geocode("Nowhere").await, Err(GeocodeError::NotFound(_))));
        assert!(matches!(geocoder.geocode("nowhere").await, Err(GeocodeError::NotFound(_))));
        // NotFound is permanent: one call, no retries
        assert_eq!(provider.seen().len(), 1);
        assert_eq!(geocoder.stats().await.retries, 0);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let provider = Arc::new(ScriptedProvider::default().answer(
            "Sants",
            vec![Err(GeocodeError::RateLimited), Ok(Coordinate::new(41.375, 2.135))],
        ));
        let geocoder = CachedGeocoder::new(provider.clone(), fast_settings());

        assert!(geocoder.geocode("Sants").await.is_ok());
        let stats = geocoder.stats().await;
        assert_eq!(stats.provider_calls, 2);
        assert_eq!(stats.retries, 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let provider = Arc::new(ScriptedProvider::default().answer(
            "Horta",
            vec![
                Err(GeocodeError::Unavailable("503".into())),
                Err(GeocodeError::Unavailable("503".into())),
                Err(GeocodeError::Unavailable("503".into())),
                Ok(Coordinate::new(41.43, 2.16)),
            ],
        ));
        let geocoder = CachedGeocoder::new(provider.clone(), fast_settings());

        assert!(matches!(geocoder.geocode("Horta").await, Err(GeocodeError::Unavailable(_))));
        assert_eq!(provider.seen().len(), 3);
        // the exhausted failure is cached for the rest of the run
        assert!(geocoder.geocode("Horta").await.is_err());
        assert_eq!(provider.seen().len(), 3);
    }

    #[tokio::test]
    async fn test_region_suffix_and_empty_address() {
        let provider = Arc::new(
            ScriptedProvider::default().answer("Poblenou, Barcelona", vec![Ok(Coordinate::new(41.40, 2.20))]),
        );
        let settings = GeocoderSettings {
            region_suffix: Some("Barcelona".to_string()),
            ..fast_settings()
        };
        let geocoder = CachedGeocoder::new(provider.clone(), settings);

        assert!(geocoder.geocode("Poblenou").await.is_ok());
        assert!(geocoder.geocode("   ").await.is_err());
        assert_eq!(provider.seen(), vec!["Poblenou, Barcelona".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_call() {
        let provider = Arc::new(ScriptedProvider::default().answer("Raval", vec![Ok(Coordinate::new(41.38, 2.17))]));
        let geocoder = Arc::new(CachedGeocoder::new(provider.clone(), fast_settings()));

        let lookups = (0..8).map(|_| {
            let geocoder = geocoder.clone();
            async move { geocoder.geocode("Raval").await }
        });
        let results = futures::future::join_all(lookups).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(provider.seen().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_calls_are_spaced_by_min_delay() {
        let provider = Arc::new(
            ScriptedProvider::default()
                .answer("Sants", vec![Ok(Coordinate::new(41.375, 2.135))])
                .answer("Horta", vec![Ok(Coordinate::new(41.43, 2.16))])
                .answer("Raval", vec![Ok(Coordinate::new(41.38, 2.17))]),
        );
        let settings = GeocoderSettings {
            min_delay: Duration::from_secs(1),
            ..fast_settings()
        };
        let geocoder = Arc::new(CachedGeocoder::new(provider.clone(), settings));

        let started = Instant::now();
        assert!(geocoder.geocode("Sants").await.is_ok());
        assert!(geocoder.geocode("Horta").await.is_ok());
        // concurrent callers queue behind the same gate
        let lookups = ["Raval", "Nowhere"].map(|q| {
            let geocoder = geocoder.clone();
            async move { geocoder.geocode(q).await }
        });
        futures::future::join_all(lookups).await;

        let gaps = provider.gaps();
        assert_eq!(gaps.len(), 3);
        assert!(gaps.iter().all(|g| *g >= Duration::from_secs(1)), "gaps were {:?}", gaps);
        assert!(started.elapsed() >= Duration::from_secs(3));
        // a cache hit never waits for the gate
        let before = Instant::now();
        assert!(geocoder.geocode("sants").await.is_ok());
        assert_eq!(before.elapsed(), Duration::ZERO);
    }
}
