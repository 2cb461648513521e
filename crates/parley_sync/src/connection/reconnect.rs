#![forbid(unsafe_code)]

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

/// Backoff delay for `attempt` (1-based): exponential from `base`, capped at
/// `max`, with +/-10% jitter.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
	let base_ms = base.as_millis().min(u128::from(u64::MAX)) as u64;
	let max_ms = max.as_millis().min(u128::from(u64::MAX)) as u64;
	let pow = 2u64.saturating_pow(attempt.saturating_sub(1).min(6));
	let delay_ms = base_ms.saturating_mul(pow).min(max_ms);
	let jitter_window = (delay_ms / 10).max(1);
	let jitter_offset = rand::rng().random_range(0..=(jitter_window * 2));
	Duration::from_millis(delay_ms.saturating_sub(jitter_window).saturating_add(jitter_offset))
}

pub fn schedule_reconnect(attempt: u32, base: Duration, max: Duration) -> (Instant, u64) {
	let delay = backoff_delay(attempt, base, max);
	(Instant::now() + delay, delay.as_millis() as u64)
}
