//! Exercises the pre-auth leaky-bucket limiter from outside the crate, the
//! way a client of the public API would.

use logvault::config::RateLimitConfig;
use logvault::ratelimit::RateLimiter;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

fn config(max: u64, window_secs: u64, allowlist: Vec<String>) -> RateLimitConfig {
    RateLimitConfig { enabled: true, max, window: Duration::from_secs(window_secs), cache_capacity: 1000, allowlist }
}

#[test]
fn a_burst_beyond_max_is_denied_then_recovers_is_not_assumed_without_elapsed_time() {
    let limiter = RateLimiter::new(config(5, 60, vec![]));
    let ip = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));

    for _ in 0..5 {
        assert!(limiter.check(ip).is_allowed());
    }
    assert!(!limiter.check(ip).is_allowed(), "6th request within the window must be denied");
}

#[test]
fn independent_ips_never_interfere_with_each_others_budget() {
    let limiter = RateLimiter::new(config(1, 60, vec![]));
    let first = IpAddr::V4(Ipv4Addr::new(10, 1, 1, 1));
    let second = IpAddr::V4(Ipv4Addr::new(10, 1, 1, 2));

    assert!(limiter.check(first).is_allowed());
    assert!(!limiter.check(first).is_allowed());
    assert!(limiter.check(second).is_allowed(), "a fresh IP must start with a full bucket");
}

#[test]
fn allowlisted_ips_are_never_throttled() {
    let ip = IpAddr::V4(Ipv4Addr::new(172, 16, 0, 9));
    let limiter = RateLimiter::new(config(1, 60, vec![ip.to_string()]));

    for _ in 0..50 {
        assert!(limiter.check(ip).is_allowed());
    }
}
