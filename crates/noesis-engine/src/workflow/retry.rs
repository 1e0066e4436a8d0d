// crates/noesis-engine/src/workflow/retry.rs
// Retry policy (§4.E.4): backoff computation with jitter. Scheduling
// re-entry into `ready` after the delay is the scheduler's job; this module
// only decides *whether* and *how long*.

use std::time::Duration;

use noesis_types::{ErrorKind, RetryPolicy};
use rand::Rng;

/// Whether a node that just failed with `kind` on `attempt` (1-based) should
/// be retried under `policy`, and if so, after what backoff.
pub fn next_attempt_delay(policy: &RetryPolicy, kind: ErrorKind, attempt: u32) -> Option<Duration> {
    if !kind.is_ever_retryable() {
        return None;
    }
    if !policy.retryable_kinds.contains(&kind) {
        return None;
    }
    if attempt >= policy.max_attempts {
        return None;
    }

    Some(backoff_for_attempt(policy, attempt))
}

/// `min(initial * multiplier^(attempt-1), maxBackoff)`, with up to ±20%
/// jitter (§4.E.4).
pub fn backoff_for_attempt(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base = policy.initial_backoff_millis as f64
        * policy.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
    let capped = base.min(policy.max_backoff_millis as f64);

    let jitter_fraction = rand::rng().random_range(-0.2..=0.2);
    let jittered = (capped * (1.0 + jitter_fraction)).max(0.0);

    Duration::from_millis(jittered.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff_millis: 200,
            backoff_multiplier: 2.0,
            max_backoff_millis: 5000,
            retryable_kinds: vec![ErrorKind::Timeout, ErrorKind::HandlerError, ErrorKind::StoreUnavailable],
        }
    }

    #[test]
    fn never_retryable_kinds_are_never_retried() {
        for kind in [ErrorKind::ValidationError, ErrorKind::ReferenceError, ErrorKind::Cancelled, ErrorKind::UnknownTool] {
            assert!(next_attempt_delay(&policy(), kind, 1).is_none());
        }
    }

    #[test]
    fn exhausted_attempts_stop_retrying() {
        assert!(next_attempt_delay(&policy(), ErrorKind::HandlerError, 3).is_none());
    }

    #[test]
    fn backoff_grows_by_multiplier_and_caps_at_max() {
        let p = RetryPolicy {
            max_attempts: 10,
            initial_backoff_millis: 100,
            backoff_multiplier: 2.0,
            max_backoff_millis: 300,
            retryable_kinds: vec![ErrorKind::HandlerError],
        };
        // attempt 1 -> base 100 (±20%), attempt 2 -> base 200, attempt 3 -> base 300 (capped)
        let d1 = backoff_for_attempt(&p, 1).as_millis();
        let d3 = backoff_for_attempt(&p, 10).as_millis();
        assert!(d1 <= 120);
        assert!(d3 <= 360);
    }

    #[test]
    fn kind_not_in_retryable_list_is_not_retried() {
        let p = RetryPolicy {
            max_attempts: 5,
            initial_backoff_millis: 10,
            backoff_multiplier: 2.0,
            max_backoff_millis: 100,
            retryable_kinds: vec![ErrorKind::Timeout],
        };
        assert!(next_attempt_delay(&p, ErrorKind::HandlerError, 1).is_none());
        assert!(next_attempt_delay(&p, ErrorKind::Timeout, 1).is_some());
    }
}
