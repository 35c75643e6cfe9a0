use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Exponential backoff parameters.
///
/// This is a plain value shared by every call on a client. The mutable side
/// of a retry loop lives in [`BackoffState`], which is created per call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay before the first retry, in milliseconds.
    pub initial_interval_ms: u64,
    /// Jitter applied to every delay, clamped to `[0, 1]`.
    pub randomization_factor: f64,
    /// Growth factor applied to the interval after each retry.
    pub multiplier: f64,
    /// Upper bound for a single delay, in milliseconds.
    pub max_interval_ms: u64,
    /// Total time budget for one call's retry loop, in milliseconds.
    pub max_elapsed_time_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval_ms: 100,
            randomization_factor: 0.75,
            multiplier: 2.0,
            max_interval_ms: 3_000,
            max_elapsed_time_ms: 5_000,
        }
    }
}

impl BackoffPolicy {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn max_elapsed_time(&self) -> Duration {
        Duration::from_millis(self.max_elapsed_time_ms)
    }

    /// Randomization factor clamped to `[0, 1]`. NaN counts as no jitter.
    pub fn clamped_randomization_factor(&self) -> f64 {
        if self.randomization_factor.is_nan() {
            0.0
        } else {
            self.randomization_factor.clamp(0.0, 1.0)
        }
    }

    /// Applies jitter to `interval`.
    ///
    /// `draw` is a sample from `[-1, 1]`; the result lies in
    /// `interval * (1 ± factor)` and never exceeds the max interval.
    pub fn randomized_interval(&self, interval: Duration, draw: f64) -> Duration {
        let factor = self.clamped_randomization_factor();
        let draw = draw.clamp(-1.0, 1.0);
        let scaled = interval.as_secs_f64() * (1.0 + factor * draw);
        Duration::try_from_secs_f64(scaled)
            .unwrap_or(self.max_interval())
            .min(self.max_interval())
    }

    /// Interval that follows `interval`, capped at the max interval.
    pub fn next_interval(&self, interval: Duration) -> Duration {
        let multiplier = if self.multiplier.is_finite() {
            self.multiplier.max(1.0)
        } else {
            1.0
        };
        Duration::try_from_secs_f64(interval.as_secs_f64() * multiplier)
            .unwrap_or(self.max_interval())
            .min(self.max_interval())
    }
}

/// Retry bookkeeping for exactly one call.
#[derive(Debug)]
pub struct BackoffState<R = StdRng> {
    policy: BackoffPolicy,
    current: Duration,
    started: Instant,
    retries: usize,
    rng: R,
}

impl BackoffState<StdRng> {
    /// Starts a retry loop with a freshly seeded random source.
    pub fn new(policy: &BackoffPolicy) -> Self {
        Self::with_rng(policy, StdRng::from_entropy())
    }
}

impl<R: Rng> BackoffState<R> {
    /// Starts a retry loop drawing jitter from `rng`.
    pub fn with_rng(policy: &BackoffPolicy, rng: R) -> Self {
        Self {
            current: policy.initial_interval().min(policy.max_interval()),
            policy: policy.clone(),
            started: Instant::now(),
            retries: 0,
            rng,
        }
    }

    /// Returns the delay before the next attempt, or `None` once sleeping it
    /// would exceed the elapsed-time budget.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let draw = self.rng.gen_range(-1.0..=1.0);
        let delay = self.policy.randomized_interval(self.current, draw);
        self.current = self.policy.next_interval(self.current);

        if self.elapsed() + delay > self.policy.max_elapsed_time() {
            return None;
        }
        self.retries += 1;
        Some(delay)
    }

    /// Time since this state was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Number of delays handed out so far.
    pub fn retries(&self) -> usize {
        self.retries
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{rngs::StdRng, SeedableRng};

    use super::{BackoffPolicy, BackoffState};

    fn policy(factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            initial_interval_ms: 100,
            randomization_factor: factor,
            multiplier: 2.0,
            max_interval_ms: 1_000,
            max_elapsed_time_ms: 5_000,
        }
    }

    #[test]
    fn randomized_interval_stays_within_jitter_bounds() {
        let policy = policy(0.5);
        let base = Duration::from_millis(200);

        assert_eq!(
            policy.randomized_interval(base, -1.0),
            Duration::from_millis(100)
        );
        assert_eq!(policy.randomized_interval(base, 0.0), base);
        assert_eq!(
            policy.randomized_interval(base, 1.0),
            Duration::from_millis(300)
        );
    }

    #[test]
    fn randomized_interval_is_capped_at_max_interval() {
        let policy = policy(1.0);
        assert_eq!(
            policy.randomized_interval(Duration::from_millis(900), 1.0),
            Duration::from_millis(1_000)
        );
    }

    #[test]
    fn randomization_factor_is_clamped() {
        assert_eq!(policy(3.0).clamped_randomization_factor(), 1.0);
        assert_eq!(policy(-0.2).clamped_randomization_factor(), 0.0);
        assert_eq!(policy(f64::NAN).clamped_randomization_factor(), 0.0);
    }

    #[test]
    fn interval_grows_by_multiplier_up_to_max() {
        let policy = policy(0.0);
        let mut interval = policy.initial_interval();
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(interval.as_millis());
            interval = policy.next_interval(interval);
        }
        assert_eq!(seen, vec![100, 200, 400, 800, 1_000, 1_000]);
    }

    #[test]
    fn seeded_states_produce_identical_delays() {
        let policy = BackoffPolicy::default();
        let mut a = BackoffState::with_rng(&policy, StdRng::seed_from_u64(7));
        let mut b = BackoffState::with_rng(&policy, StdRng::seed_from_u64(7));
        for _ in 0..3 {
            assert_eq!(a.next_delay(), b.next_delay());
        }
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let policy: BackoffPolicy =
            serde_json::from_str(r#"{"max_elapsed_time_ms": 750}"#).expect("must parse");
        assert_eq!(policy.max_elapsed_time(), Duration::from_millis(750));
        assert_eq!(policy.initial_interval_ms, 100);
        assert_eq!(policy.multiplier, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_loop_stops_within_elapsed_budget() {
        let policy = BackoffPolicy {
            initial_interval_ms: 100,
            randomization_factor: 0.75,
            multiplier: 2.0,
            max_interval_ms: 3_000,
            max_elapsed_time_ms: 5_000,
        };
        let mut state = BackoffState::with_rng(&policy, StdRng::seed_from_u64(42));
        let started = tokio::time::Instant::now();

        while let Some(delay) = state.next_delay() {
            tokio::time::sleep(delay).await;
        }

        assert!(state.retries() > 1);
        assert!(started.elapsed() < Duration::from_millis(5_100));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_never_retries() {
        let policy = BackoffPolicy {
            max_elapsed_time_ms: 0,
            ..BackoffPolicy::default()
        };
        let mut state = BackoffState::with_rng(&policy, StdRng::seed_from_u64(1));
        assert_eq!(state.next_delay(), None);
        assert_eq!(state.retries(), 0);
    }
}
