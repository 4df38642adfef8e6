//! Retry backoff policies.

use std::fmt::Debug;
use std::time::Duration;

use rand::Rng;

// == Backoff Trait ==
/// Delay to wait before the next attempt.
///
/// `attempt` is the 1-based number of the attempt that just failed.
pub trait Backoff: Debug + Send + Sync + 'static {
    fn delay(&self, attempt: u32) -> Duration;
}

// == Fixed ==
/// Same delay before every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff(pub Duration);

impl Default for FixedBackoff {
    fn default() -> Self {
        FixedBackoff(Duration::from_secs(1))
    }
}

impl Backoff for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

// == Exponential ==
/// Doubling delay capped at `max`, plus 0-10% jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        let exponential = 2u64.saturating_pow(attempt - 1);
        let capped = base_ms.saturating_mul(exponential).min(max_ms);

        let jitter_range = capped / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_backoff_is_constant() {
        let backoff = FixedBackoff::default();
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(7), Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_backoff_growth() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_millis(1000));

        let d1 = backoff.delay(1).as_millis();
        assert!((100..110).contains(&d1));

        let d2 = backoff.delay(2).as_millis();
        assert!((200..220).contains(&d2));

        let capped = backoff.delay(10).as_millis();
        assert!((1000..1100).contains(&capped));
    }

    #[test]
    fn test_exponential_backoff_zero_attempt() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(backoff.delay(0), Duration::ZERO);
    }
}
