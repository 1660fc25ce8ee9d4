//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Computes the delay before each retry.
///
/// The delay before retry `n` (0-indexed) is `min(base * 2^n, max)` plus a
/// random jitter of `0..=jitter * delay`. `max` caps the exponential part
/// only, so the longest delay is `max * (1 + jitter)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: f64,
}

impl Backoff {
    /// Creates a backoff. `jitter` is clamped to `0.0..=1.0`.
    #[must_use]
    pub fn new(base: Duration, max: Duration, jitter: f64) -> Self {
        Self {
            base,
            max,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// Returns the delay before retry `retry` (0-indexed).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let exp = 2u64.saturating_pow(retry);
        let base_ms = self.base.as_millis() as u64;
        let capped_ms = base_ms
            .saturating_mul(exp)
            .min(self.max.as_millis() as u64);

        let jitter_max_ms = (capped_ms as f64 * self.jitter) as u64;
        let jitter_ms = if jitter_max_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_max_ms)
        } else {
            0
        };

        Duration::from_millis(capped_ms + jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_without_jitter() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(20), 0.0);
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_capped() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(500), 0.0);
        assert_eq!(backoff.delay(10), Duration::from_millis(500));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_bounds() {
        let backoff = Backoff::new(Duration::from_millis(1000), Duration::from_secs(20), 0.5);
        for _ in 0..100 {
            let d = backoff.delay(0);
            assert!(d >= Duration::from_millis(1000));
            assert!(d <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_jitter_is_clamped() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1), 7.0);
        assert!(backoff.delay(0) <= Duration::from_millis(200));
    }

    #[test]
    fn test_jitter_applies_after_cap() {
        let max = Duration::from_millis(500);
        let backoff = Backoff::new(Duration::from_millis(100), max, 1.0);
        for retry in [5, 10, u32::MAX] {
            for _ in 0..50 {
                let d = backoff.delay(retry);
                assert!(d >= max);
                assert!(d <= max * 2);
            }
        }
    }
}
