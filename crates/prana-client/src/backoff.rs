//! Reconnect scheduling.

use std::time::Duration;

/// First retry delay.
pub const BASE_DELAY: Duration = Duration::from_secs(1);

/// Ceiling for the retry delay.
pub const MAX_DELAY: Duration = Duration::from_secs(30);

/// Attempts before the client gives up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Delay before reconnect attempt `attempt` (zero-based): the base delay
/// grown by 1.5x per prior attempt, capped at [`MAX_DELAY`].
pub fn reconnect_delay(attempt: u32) -> Duration {
    reconnect_delay_with(BASE_DELAY, MAX_DELAY, attempt)
}

/// [`reconnect_delay`] under an explicit policy.
pub fn reconnect_delay_with(base: Duration, max: Duration, attempt: u32) -> Duration {
    let secs = base.as_secs_f64() * 1.5_f64.powi(i32::try_from(attempt.min(64)).unwrap_or(64));
    Duration::from_secs_f64(secs.min(max.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_by_half_each_attempt() {
        assert_eq!(reconnect_delay(0), Duration::from_secs(1));
        assert_eq!(reconnect_delay(1), Duration::from_secs_f64(1.5));
        assert_eq!(reconnect_delay(2), Duration::from_secs_f64(2.25));
        assert_eq!(reconnect_delay(3), Duration::from_secs_f64(3.375));
    }

    #[test]
    fn caps_at_thirty_seconds() {
        // 1.5^9 ≈ 38.4, past the cap.
        assert_eq!(reconnect_delay(9), MAX_DELAY);
        assert_eq!(reconnect_delay(100), MAX_DELAY);
    }

    #[test]
    fn monotonic_until_cap() {
        let mut last = Duration::ZERO;
        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            let d = reconnect_delay(attempt);
            assert!(d >= last);
            last = d;
        }
    }
}
