use std::time::Duration;

use rand::Rng;

/// Upper bound for any single retry wait, computed or server-requested.
pub const MAX_BACKOFF: Duration = Duration::from_secs(64);

/// Default exponential back‑off schedule: 200ms → 400ms → 800ms → 1600ms,
/// never longer than [`MAX_BACKOFF`].
pub fn backoff(attempt: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let base_delay_ms = 200u64 * (1u64 << exponent);
    let jitter = rand::rng().random_range(0.8..1.2);
    let delay_ms = (base_delay_ms as f64 * jitter) as u64;
    Duration::from_millis(delay_ms).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_within_jitter() {
        for (attempt, base) in [(1u64, 200u64), (2, 400), (3, 800), (4, 1600)] {
            let delay = backoff(attempt).as_millis() as u64;
            assert!(delay >= base * 8 / 10 && delay <= base * 12 / 10, "{attempt}: {delay}");
        }
    }

    #[test]
    fn backoff_tolerates_attempt_zero() {
        assert!(backoff(0) <= Duration::from_millis(240));
    }

    #[test]
    fn backoff_is_capped() {
        for attempt in [9u64, 12, 17, 1_000] {
            assert!(backoff(attempt) <= MAX_BACKOFF, "{attempt}");
        }
        assert!(backoff(12) >= MAX_BACKOFF * 8 / 10);
    }
}
