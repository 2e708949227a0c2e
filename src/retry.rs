//! Bounded exponential-backoff retry for upstream throttling.
//!
//! The loop is an explicit state machine: [`RetryState::on_failure`] classifies
//! each error and either schedules the next attempt or ends the run. Only
//! quota/rate-limit failures are retried; everything else fails fast.

use std::future::Future;
use std::time::Duration;

use log::warn;

use crate::error::{ErrorClass, RagError, Result};

/// Attempt budget and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Builds a policy; at least one attempt is always made.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the failure of zero-based attempt `attempt`: `base * 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_secs(4))
    }
}

/// What to do after a failed attempt.
#[derive(Debug)]
pub enum RetryDecision {
    /// Sleep for the given delay, then try again.
    RetryAfter(Duration),
    /// Stop and surface this error.
    GiveUp(RagError),
}

/// Progress through one retry run.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Zero-based index of the attempt about to run (or that just failed).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Records a failure of the current attempt and decides the next step.
    pub fn on_failure(&mut self, err: RagError) -> RetryDecision {
        if err.class() == ErrorClass::Fatal {
            return RetryDecision::GiveUp(err);
        }
        let failed = self.attempt;
        self.attempt += 1;
        if self.attempt >= self.policy.max_attempts {
            return RetryDecision::GiveUp(RagError::MaxRetriesReached {
                attempts: self.attempt,
                last: err.to_string(),
            });
        }
        RetryDecision::RetryAfter(self.policy.backoff(failed))
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent on throttling errors.
pub async fn invoke_with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut state = RetryState::new(policy);
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        match state.on_failure(err) {
            RetryDecision::RetryAfter(delay) => {
                warn!("quota error, retrying in {}ms...", delay.as_millis());
                tokio::time::sleep(delay).await;
            }
            RetryDecision::GiveUp(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn quota() -> RagError {
        RagError::Upstream {
            provider: "OpenAI",
            status: StatusCode::FORBIDDEN,
            message: "Resource has been exhausted (e.g. check quota).".to_string(),
        }
    }

    fn auth() -> RagError {
        RagError::Upstream {
            provider: "OpenAI",
            status: StatusCode::UNAUTHORIZED,
            message: "API key not valid".to_string(),
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        let delays: Vec<u128> = (0..4).map(|i| policy.backoff(i).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800]);
    }

    #[test]
    fn state_machine_branches_on_error_class() {
        let mut state = RetryState::new(RetryPolicy::new(3, Duration::from_secs(1)));
        assert!(matches!(
            state.on_failure(quota()),
            RetryDecision::RetryAfter(d) if d == Duration::from_secs(1)
        ));
        assert!(matches!(
            state.on_failure(quota()),
            RetryDecision::RetryAfter(d) if d == Duration::from_secs(2)
        ));
        assert!(matches!(
            state.on_failure(quota()),
            RetryDecision::GiveUp(RagError::MaxRetriesReached { attempts: 3, .. })
        ));

        let mut state = RetryState::new(RetryPolicy::default());
        assert!(matches!(
            state.on_failure(auth()),
            RetryDecision::GiveUp(RagError::Upstream { .. })
        ));
        assert_eq!(state.attempt(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_two_quota_failures() {
        let base = Duration::from_secs(4);
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let started = Instant::now();
        let answer = invoke_with_retry(RetryPolicy::new(4, base), move || async move {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(quota()),
                _ => Ok("answer"),
            }
        })
        .await
        .unwrap();

        assert_eq!(answer, "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two sleeps: base then 2 * base.
        let waited = started.elapsed();
        assert!(waited >= base * 3 && waited < base * 4, "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn non_quota_errors_fail_without_sleeping() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let started = Instant::now();
        let err = invoke_with_retry(RetryPolicy::default(), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(auth())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, RagError::Upstream { status, .. } if status == StatusCode::UNAUTHORIZED));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_reports_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = invoke_with_retry(RetryPolicy::new(4, Duration::from_millis(10)), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(quota())
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(matches!(err, RagError::MaxRetriesReached { attempts: 4, .. }));
        assert!(err.to_string().starts_with("Max retries reached"));
    }
}
