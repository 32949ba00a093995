//! Reconnect backoff with jitter.

use rand::Rng;
use std::time::Duration;

const BASE_DELAY_MS: u64 = 1_000;
const MAX_EXPONENT: u32 = 8;

/// Delay before reconnect attempt `attempt` (1-based).
///
/// Exponential `base * 2^(attempt-1)` with ±25% jitter so a fleet of devices
/// does not reconnect in lockstep after a relay restart.
pub fn reconnect_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(MAX_EXPONENT);
    let base = BASE_DELAY_MS.saturating_mul(1_u64 << exp);
    let span = (base / 4).max(1);
    let jittered = rand::thread_rng().gen_range(base.saturating_sub(span)..=base.saturating_add(span));
    Duration::from_millis(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_exponentially_within_jitter_bounds() {
        for attempt in 1..=10u32 {
            let exp = attempt.saturating_sub(1).min(MAX_EXPONENT);
            let base = BASE_DELAY_MS * (1 << exp);
            let delay = reconnect_delay(attempt).as_millis() as u64;
            assert!(delay >= base - base / 4 - 1, "attempt {attempt}: {delay} < lower bound");
            assert!(delay <= base + base / 4 + 1, "attempt {attempt}: {delay} > upper bound");
        }
    }

    #[test]
    fn caps_the_exponent() {
        let capped = reconnect_delay(50).as_millis() as u64;
        let max_base = BASE_DELAY_MS * (1 << MAX_EXPONENT);
        assert!(capped <= max_base + max_base / 4 + 1);
    }
}
