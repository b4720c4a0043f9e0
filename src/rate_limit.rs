//! Fixed-window rate limiting keyed by caller-supplied strings.
//! A window resets wholesale when its deadline passes; bursts straddling a
//! window boundary can admit up to 2x the limit. That characteristic is part
//! of the contract, not a bug to smooth over.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

/// Outcome of a limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    /// When the current window ends and the counter starts over.
    pub reset_at: Instant,
}

impl RateDecision {
    /// How long a blocked caller has to wait before the window resets.
    pub fn retry_after(&self, now: Instant) -> Duration {
        self.reset_at.saturating_duration_since(now)
    }
}

struct WindowCounter {
    count: u32,
    reset_at: Instant,
}

/// Per-key fixed-window request counter.
///
/// Instances are constructed explicitly and shared via `Arc`; there is no
/// process-global limiter, so tests get isolated state.
pub struct RateLimiter {
    counters: Mutex<HashMap<String, WindowCounter>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Check (and on success consume) one request for `key`.
    ///
    /// An absent or lapsed window starts over with count 1 and is always
    /// allowed. Within a live window, requests are allowed while the count is
    /// below `limit`; blocked requests do not advance the count.
    pub fn check(&self, key: &str, limit: u32, window: Duration) -> RateDecision {
        self.check_at(key, limit, window, Instant::now())
    }

    fn check_at(&self, key: &str, limit: u32, window: Duration, now: Instant) -> RateDecision {
        let mut counters = self.counters.lock();
        if let Some(counter) = counters.get_mut(key) {
            if now < counter.reset_at {
                if counter.count < limit {
                    counter.count += 1;
                    return RateDecision {
                        allowed: true,
                        reset_at: counter.reset_at,
                    };
                }
                return RateDecision {
                    allowed: false,
                    reset_at: counter.reset_at,
                };
            }
        }
        // New key or lapsed window: the triggering request counts as 1.
        let reset_at = now + window;
        counters.insert(key.to_string(), WindowCounter { count: 1, reset_at });
        RateDecision {
            allowed: true,
            reset_at,
        }
    }

    /// Drop the record for one key.
    pub fn reset(&self, key: &str) {
        self.counters.lock().remove(key);
    }

    /// Drop every record whose window has passed. Safe to interleave with
    /// `check`; a swept key simply starts a fresh window on its next request.
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&self, now: Instant) {
        let mut counters = self.counters.lock();
        let before = counters.len();
        counters.retain(|_, counter| now < counter.reset_at);
        let removed = before - counters.len();
        if removed > 0 {
            debug!(removed, "rate limiter cleanup");
        }
    }

    /// Start a background sweep loop on a dedicated thread.
    pub fn start_cleanup_loop(limiter: Arc<Self>, interval: Duration) {
        std::thread::Builder::new()
            .name("rate-limit-cleanup".into())
            .spawn(move || loop {
                std::thread::sleep(interval);
                limiter.cleanup();
            })
            .expect("failed to spawn rate limiter cleanup thread");
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(1000);

    #[test]
    fn window_resets_and_count_restarts_at_one() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();

        assert!(limiter.check_at("k", 1, WINDOW, t0).allowed);
        assert!(!limiter.check_at("k", 1, WINDOW, t0 + Duration::from_millis(500)).allowed);

        // Past the deadline the window starts over.
        let late = t0 + Duration::from_millis(1001);
        assert!(limiter.check_at("k", 1, WINDOW, late).allowed);
        // The reset consumed one slot, so the next call in-window is blocked.
        assert!(!limiter.check_at("k", 1, WINDOW, late + Duration::from_millis(1)).allowed);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();

        assert!(limiter.check_at("a", 1, WINDOW, t0).allowed);
        assert!(!limiter.check_at("a", 1, WINDOW, t0 + Duration::from_millis(1)).allowed);
        // Exhausting "a" never touches "b".
        assert!(limiter.check_at("b", 1, WINDOW, t0 + Duration::from_millis(2)).allowed);
    }

    #[test]
    fn blocked_requests_do_not_advance_the_count() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();

        for i in 0..2 {
            assert!(limiter.check_at("k", 2, WINDOW, t0 + Duration::from_millis(i)).allowed);
        }
        for i in 2..5 {
            assert!(!limiter.check_at("k", 2, WINDOW, t0 + Duration::from_millis(i)).allowed);
        }
        let counters = limiter.counters.lock();
        assert_eq!(counters.get("k").map(|c| c.count), Some(2));
    }

    #[test]
    fn boundary_burst_admits_up_to_double_limit() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();

        // Open the window, then spend the remaining budget just before the
        // deadline...
        assert!(limiter.check_at("k", 3, WINDOW, t0).allowed);
        assert!(limiter.check_at("k", 3, WINDOW, t0 + Duration::from_millis(998)).allowed);
        assert!(limiter.check_at("k", 3, WINDOW, t0 + Duration::from_millis(999)).allowed);
        // ...and a full fresh budget is available right after it.
        for i in 0..3 {
            assert!(limiter.check_at("k", 3, WINDOW, t0 + Duration::from_millis(1000 + i)).allowed);
        }
        assert!(!limiter.check_at("k", 3, WINDOW, t0 + Duration::from_millis(1004)).allowed);
    }

    #[test]
    fn blocked_decision_reports_wait_time() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();

        limiter.check_at("k", 1, WINDOW, t0);
        let blocked = limiter.check_at("k", 1, WINDOW, t0 + Duration::from_millis(400));
        assert!(!blocked.allowed);
        assert_eq!(
            blocked.retry_after(t0 + Duration::from_millis(400)),
            Duration::from_millis(600)
        );
    }

    #[test]
    fn cleanup_drops_only_lapsed_windows() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();

        limiter.check_at("old", 5, Duration::from_millis(100), t0);
        limiter.check_at("live", 5, Duration::from_millis(10_000), t0);
        limiter.cleanup_at(t0 + Duration::from_millis(200));

        let counters = limiter.counters.lock();
        assert!(!counters.contains_key("old"));
        assert!(counters.contains_key("live"));
    }

    #[test]
    fn reset_clears_a_single_key() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();

        limiter.check_at("k", 1, WINDOW, t0);
        assert!(!limiter.check_at("k", 1, WINDOW, t0 + Duration::from_millis(1)).allowed);
        limiter.reset("k");
        assert!(limiter.check_at("k", 1, WINDOW, t0 + Duration::from_millis(2)).allowed);
    }
}
