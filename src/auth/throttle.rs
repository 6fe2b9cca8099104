use std::time::{Duration, Instant};

use moka::sync::Cache;

use crate::config::ThrottleConfig;

/// Distinct e-mails tracked at once; the least recently used drop out first.
pub const MAX_TRACKED_KEYS: u64 = 100_000;

/// Counts failed logins per e-mail inside a sliding window. Entries expire
/// one window after their last failure.
pub struct LoginThrottle {
    max_failures: usize,
    window: Duration,
    failures: Cache<String, Vec<Instant>>,
}

impl LoginThrottle {
    pub fn new(max_failures: usize, window: Duration) -> Self {
        Self {
            max_failures,
            window,
            failures: Cache::builder()
                .max_capacity(MAX_TRACKED_KEYS)
                .time_to_live(window)
                .build(),
        }
    }

    pub fn from_config(cfg: &ThrottleConfig) -> Self {
        Self::new(cfg.max_failures, Duration::from_secs(cfg.window_minutes * 60))
    }

    /// `Err` carries how long until the oldest failure leaves the window.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let Some(list) = self.failures.get(key) else {
            return Ok(());
        };
        let recent: Vec<Instant> = list
            .into_iter()
            .filter(|t| now.duration_since(*t) < self.window)
            .collect();
        if recent.len() < self.max_failures {
            return Ok(());
        }
        let oldest = recent.iter().min().copied().unwrap_or(now);
        Err(self.window.saturating_sub(now.duration_since(oldest)))
    }

    pub fn record_failure(&self, key: &str) {
        self.record_failure_at(key, Instant::now());
    }

    fn record_failure_at(&self, key: &str, at: Instant) {
        let window = self.window;
        self.failures
            .entry(key.to_string())
            .and_upsert_with(|existing| {
                let mut list = existing.map(|e| e.into_value()).unwrap_or_default();
                list.retain(|t| at.duration_since(*t) < window);
                list.push(at);
                list
            });
    }

    pub fn reset(&self, key: &str) {
        self.failures.invalidate(key);
    }

    /// Keys currently held, after pending evictions have run.
    #[cfg(test)]
    fn tracked_keys(&self) -> u64 {
        self.failures.run_pending_tasks();
        self.failures.entry_count()
    }
}
