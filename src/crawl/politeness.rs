// src/crawl/politeness.rs
// =============================================================================
// Delays between requests.
//
// - RateLimiter: a random pause before every request, drawn uniformly from
//   [min_delay, max_delay]. Each worker sleeps on its own schedule; there is
//   no global request clock.
// - Backoff: the extra pause before a retry, base * 2^(retry - 1) capped at
//   max. It stacks with the rate limiter pause rather than replacing it.
// =============================================================================

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_delay: Duration,
    max_delay: Duration,
}

impl RateLimiter {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        // An inverted window is rejected by config validation; order it anyway
        let (min_delay, max_delay) = if min_delay <= max_delay {
            (min_delay, max_delay)
        } else {
            (max_delay, min_delay)
        };
        Self { min_delay, max_delay }
    }

    pub fn next_delay(&self) -> Duration {
        if self.min_delay == self.max_delay {
            return self.min_delay;
        }
        let secs = rand::thread_rng()
            .gen_range(self.min_delay.as_secs_f64()..=self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    // Sleeps the calling worker. Never fails.
    pub async fn wait(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    // Delay before retry number `retry` (1 for the first retry)
    pub fn delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow((retry - 1).min(20));
        self.base.saturating_mul(factor).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_stays_in_window() {
        let limiter = RateLimiter::new(Duration::from_millis(100), Duration::from_millis(300));
        for _ in 0..500 {
            let delay = limiter.next_delay();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(300));
        }
    }

    #[test]
    fn test_fixed_window() {
        let limiter = RateLimiter::new(Duration::from_millis(50), Duration::from_millis(50));
        assert_eq!(limiter.next_delay(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_at_least_min() {
        let limiter = RateLimiter::new(Duration::from_secs(1), Duration::from_secs(2));
        let start = tokio::time::Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_growth() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
        assert_eq!(backoff.delay(0), Duration::ZERO);
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
    }

    #[test]
    fn test_max_cap() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(backoff.delay(10), Duration::from_secs(1));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(1));
    }
}
