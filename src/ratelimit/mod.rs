//! Pre-auth, per-IP leaky-bucket rate limiting — keeps the O(active-keys)
//! bcrypt scan in the authenticator from ever being reached by a flood of
//! requests from a single source.
//!
//! Purely local per instance: no distributed/shared bucket state, no token
//! bucket burst variant, no sliding window or GCRA — just one draining
//! counter per IP.

use crate::config::RateLimitConfig;
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// A single IP's leaky bucket: `level` drains linearly to zero over
/// `window`, each request adds one unit, and the request is denied once the
/// level would exceed `max`.
struct Bucket {
    level: AtomicI64,
    last_drain: parking_lot::Mutex<Instant>,
}

/// Per-IP leaky-bucket limiter with a bounded backing cache — unbounded
/// per-IP state is itself a denial-of-service surface, so the cache evicts
/// the oldest entries once `cache_capacity` is exceeded.
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<IpAddr, Bucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, buckets: DashMap::new() }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn is_allowlisted(&self, ip: &IpAddr) -> bool {
        self.config.allowlist.iter().any(|entry| entry == &ip.to_string())
    }

    /// Check and consume one unit of capacity for `ip`, draining elapsed
    /// time first so the bucket never remembers load from long ago.
    pub fn check(&self, ip: IpAddr) -> Decision {
        if !self.config.enabled || self.is_allowlisted(&ip) {
            return Decision::Allowed;
        }

        if self.buckets.len() >= self.config.cache_capacity && !self.buckets.contains_key(&ip) {
            self.evict_oldest();
        }

        let bucket = self
            .buckets
            .entry(ip)
            .or_insert_with(|| Bucket { level: AtomicI64::new(0), last_drain: parking_lot::Mutex::new(Instant::now()) });

        let drain_rate = self.config.max as f64 / self.config.window.as_secs_f64();

        let mut last_drain = bucket.last_drain.lock();
        let elapsed = last_drain.elapsed();
        *last_drain = Instant::now();
        drop(last_drain);

        let drained = (elapsed.as_secs_f64() * drain_rate) as i64;
        if drained > 0 {
            bucket
                .level
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |level| Some((level - drained).max(0)))
                .ok();
        }

        let level = bucket.level.fetch_add(1, Ordering::AcqRel) + 1;
        if level as u64 > self.config.max {
            bucket.level.fetch_sub(1, Ordering::AcqRel);
            let retry_after = Duration::from_secs_f64(1.0 / drain_rate.max(f64::MIN_POSITIVE));
            Decision::Denied { retry_after }
        } else {
            Decision::Allowed
        }
    }

    /// Crude bounded-memory guard: drop one arbitrary entry. Called rarely
    /// (only once the cache is at capacity and a genuinely new IP shows up),
    /// so exactness doesn't matter — only that memory stays bounded.
    fn evict_oldest(&self) {
        if let Some(entry) = self.buckets.iter().next() {
            let key = *entry.key();
            drop(entry);
            self.buckets.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn config(max: u64, window_secs: u64) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            max,
            window: Duration::from_secs(window_secs),
            cache_capacity: 10,
            allowlist: vec![],
        }
    }

    #[test]
    fn allows_requests_up_to_the_configured_max() {
        let limiter = RateLimiter::new(config(3, 60));
        let ip = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

        assert!(limiter.check(ip).is_allowed());
        assert!(limiter.check(ip).is_allowed());
        assert!(limiter.check(ip).is_allowed());
        assert!(!limiter.check(ip).is_allowed());
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let mut cfg = config(1, 60);
        cfg.enabled = false;
        let limiter = RateLimiter::new(cfg);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

        for _ in 0..10 {
            assert!(limiter.check(ip).is_allowed());
        }
    }

    #[test]
    fn allowlisted_ip_bypasses_the_bucket() {
        let mut cfg = config(1, 60);
        cfg.allowlist = vec!["10.0.0.2".to_string()];
        let limiter = RateLimiter::new(cfg);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        for _ in 0..10 {
            assert!(limiter.check(ip).is_allowed());
        }
    }

    #[test]
    fn distinct_ips_have_independent_buckets() {
        let limiter = RateLimiter::new(config(1, 60));
        let a = IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1));
        let b = IpAddr::V4(Ipv4Addr::new(2, 2, 2, 2));

        assert!(limiter.check(a).is_allowed());
        assert!(!limiter.check(a).is_allowed());
        assert!(limiter.check(b).is_allowed());
    }
}
