// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use url::Url;

type HostSlot = Arc<Mutex<Option<Instant>>>;

/// Per-host rate limiter for upstream API calls.
///
/// Each host keeps the instant of its last issued request. A caller that comes
/// too early is delayed, never rejected. The per-host slot stays locked while
/// the caller sleeps, so calls to one host are issued one interval apart while
/// calls to other hosts proceed independently.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    hosts: Arc<StdMutex<HashMap<String, HostSlot>>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the specified minimum interval between requests.
    ///
    /// # Arguments
    /// * `min_interval` - Minimum duration between requests to the same host.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            hosts: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// One request per second, the MusicBrainz guideline and the default for every host.
    pub fn one_per_second() -> Self {
        Self::new(Duration::from_secs(1))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Key used to group requests, `host` or `host:port`.
    pub fn host_key(url: &Url) -> String {
        match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => url.as_str().to_string(),
        }
    }

    /// Wait until a request to `host_key` may be issued, then record it as issued.
    pub async fn throttle(&self, host_key: &str) {
        let slot = self.slot(host_key);
        let mut last = slot.lock().await;

        if let Some(last_instant) = *last {
            let elapsed = last_instant.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::trace!(
                    target: "rate_limiter",
                    host = host_key,
                    "rate limiting: waiting {:?}",
                    wait_time
                );
                sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }

    fn slot(&self, host_key: &str) -> HostSlot {
        let mut hosts = self
            .hosts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        hosts
            .entry(host_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::one_per_second()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_rate_limiter_enforces_delay() {
        let limiter = RateLimiter::new(Duration::from_millis(100));

        let start = Instant::now();

        // First request should be immediate
        limiter.throttle("api.example").await;
        let first_elapsed = start.elapsed();
        assert!(first_elapsed < Duration::from_millis(50));

        // Second request should wait ~100ms
        limiter.throttle("api.example").await;
        let second_elapsed = start.elapsed();
        assert!(
            second_elapsed >= Duration::from_millis(100),
            "expected >= 100ms, got {:?}",
            second_elapsed
        );
    }

    #[tokio::test]
    async fn test_rate_limiter_multiple_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let start = Instant::now();

        for _ in 0..4 {
            limiter.throttle("api.example").await;
        }

        let elapsed = start.elapsed();
        // (N - 1) intervals between N requests
        assert!(
            elapsed >= Duration::from_millis(150),
            "expected >= 150ms, got {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_hosts_do_not_block_each_other() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        let start = Instant::now();

        limiter.throttle("a.example").await;
        limiter.throttle("b.example").await;
        limiter.throttle("c.example").await;

        assert!(
            start.elapsed() < Duration::from_millis(100),
            "independent hosts should not wait, took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(60));
        let start = Instant::now();

        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.throttle("shared.example").await;
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert!(
            start.elapsed() >= Duration::from_millis(120),
            "expected >= 120ms, got {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn test_host_key() {
        let url = Url::parse("https://api.spotify.com/v1/search?q=x").unwrap();
        assert_eq!(RateLimiter::host_key(&url), "api.spotify.com");

        let url = Url::parse("http://127.0.0.1:4321/artist").unwrap();
        assert_eq!(RateLimiter::host_key(&url), "127.0.0.1:4321");
    }
}
