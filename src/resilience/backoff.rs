//! Exponential backoff with jitter between broadcast attempts.

use rand::Rng;
use std::time::Duration;

/// Delay before broadcast attempt number `attempt + 1`.
///
/// Attempt 0 has no delay. After that the delay doubles from `base_ms`, is
/// capped at `max_ms`, and gets up to 10% jitter on top so that competing
/// relays do not retry in lockstep.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 || base_ms == 0 {
        return Duration::ZERO;
    }

    let exponent = (attempt - 1).min(32);
    let capped = base_ms.saturating_mul(1u64 << exponent).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}
