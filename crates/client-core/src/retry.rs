use std::time::Duration;

/// Exponential backoff policy used by the snapshot listener loops when a
/// poll against the backend fails.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay before the given retry attempt (0-based).
    ///
    /// Doubles per attempt, honors a server-provided retry hint when it is
    /// larger, and never exceeds the configured maximum.
    pub fn delay_for_attempt(&self, attempt: u32, retry_after_hint_ms: Option<u64>) -> Duration {
        let shift = attempt.min(20);
        let multiplier = 1_u64 << shift;
        let calculated = self.base_delay_ms.saturating_mul(multiplier);
        let hinted = retry_after_hint_ms.unwrap_or(0);
        let bounded = calculated.max(hinted).min(self.max_delay_ms);
        Duration::from_millis(bounded)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(500, 30_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_base_delay_and_doubles() {
        let policy = RetryPolicy::new(200, 60_000);
        assert_eq!(policy.delay_for_attempt(0, None), Duration::from_millis(200));
        assert_eq!(
            policy.delay_for_attempt(4, None),
            Duration::from_millis(3_200)
        );
    }

    #[test]
    fn caps_delay_at_max() {
        let policy = RetryPolicy::new(1_000, 5_000);
        assert_eq!(
            policy.delay_for_attempt(6, None),
            Duration::from_millis(5_000)
        );
    }

    #[test]
    fn honors_retry_after_hint_when_larger() {
        let policy = RetryPolicy::new(500, 20_000);
        assert_eq!(
            policy.delay_for_attempt(0, Some(7_500)),
            Duration::from_millis(7_500)
        );
    }

    #[test]
    fn ignores_hint_smaller_than_calculated_delay() {
        let policy = RetryPolicy::new(500, 20_000);
        assert_eq!(
            policy.delay_for_attempt(3, Some(100)),
            Duration::from_millis(4_000)
        );
    }
}
