//! Exponential backoff for rate-limited calls.
//!
//! The delay sequence is owned by [`RetryPolicy`]; the act of waiting is
//! owned by a [`Delay`]. Production code waits on a [`CancelToken`] so a
//! sleeping retry can be interrupted; tests swap in [`RecordingDelay`].

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, warn};

use crate::api::ApiError;

// ── Policy ──────────────────────────────────────────────────────────

/// Retry policy for HTTP 429 responses.
///
/// Delay before retry `n` (0-based) is `base_delay * multiplier^n`. No jitter
/// and no cap beyond the sum of the fixed delays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first 429 (0 = no retries).
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, multiplier: u32) -> Self {
        Self { max_retries, base_delay, multiplier }
    }

    /// A policy that surfaces the first 429 as exhausted.
    pub fn no_retry() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(self.multiplier.saturating_pow(retry))
    }

    /// The full delay sequence, one entry per retry.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|n| self.delay_for(n))
    }

    /// Total time spent waiting if every retry is used.
    pub fn total_delay(&self) -> Duration {
        self.delays().fold(Duration::ZERO, |acc, d| acc.saturating_add(d))
    }

    /// Run `attempt` until it succeeds, fails for a reason other than rate
    /// limiting, or the retry budget is spent.
    ///
    /// Waits happen on the calling thread through `delay`.
    pub fn execute<T>(
        &self,
        delay: &dyn Delay,
        operation: &str,
        mut attempt: impl FnMut() -> Result<T, AttemptError>,
    ) -> Result<T, ApiError> {
        let mut retry: u32 = 0;
        loop {
            match attempt() {
                Ok(value) => {
                    if retry > 0 {
                        debug!(operation, attempt = retry + 1, "succeeded after rate-limit retry");
                    }
                    return Ok(value);
                }
                Err(AttemptError::Fatal(err)) => {
                    if retry > 0 {
                        debug!(operation, attempt = retry + 1, error = %err, "retry failed, not retrying");
                    }
                    return Err(err);
                }
                Err(AttemptError::RateLimited) => {
                    if retry >= self.max_retries {
                        warn!(operation, attempts = retry + 1, "rate limit retries exhausted");
                        return Err(ApiError::RateLimitExhausted { attempts: retry + 1 });
                    }
                    let wait = self.delay_for(retry);
                    debug!(
                        operation,
                        retry = retry + 1,
                        max_retries = self.max_retries,
                        delay_ms = wait.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    delay.wait(wait).map_err(|Cancelled| ApiError::Cancelled)?;
                    retry += 1;
                }
            }
        }
    }
}

/// Outcome of a single attempt as seen by the retry loop.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptError {
    /// HTTP 429: eligible for another attempt.
    RateLimited,
    /// Anything else: surfaced as-is.
    Fatal(ApiError),
}

impl From<ApiError> for AttemptError {
    fn from(err: ApiError) -> Self {
        Self::Fatal(err)
    }
}

// ── Delays ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cancelled")]
pub struct Cancelled;

/// Something that can wait for a duration.
pub trait Delay: Send + Sync {
    fn wait(&self, duration: Duration) -> Result<(), Cancelled>;
}

/// Shared cancellation flag. Cancelling wakes every thread blocked in
/// [`CancelToken::wait_timeout`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let mut flag = self.lock();
        *flag = true;
        self.inner.cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.lock()
    }

    /// Block for up to `duration`. Returns `Err(Cancelled)` if the token is
    /// (or becomes) cancelled before the time is up.
    pub fn wait_timeout(&self, duration: Duration) -> Result<(), Cancelled> {
        let guard = self.lock();
        let (guard, _) = self
            .inner
            .cond
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *guard {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.inner
            .cancelled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Production delay: a timed wait that a [`CancelToken`] can cut short.
#[derive(Debug, Clone, Default)]
pub struct CancellableDelay {
    token: CancelToken,
}

impl CancellableDelay {
    pub fn new(token: CancelToken) -> Self {
        Self { token }
    }
}

impl Delay for CancellableDelay {
    fn wait(&self, duration: Duration) -> Result<(), Cancelled> {
        self.token.wait_timeout(duration)
    }
}

/// Test delay: records each requested duration and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Delay for RecordingDelay {
    fn wait(&self, duration: Duration) -> Result<(), Cancelled> {
        self.waits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(duration);
        Ok(())
    }
}

impl<D: Delay + ?Sized> Delay for Arc<D> {
    fn wait(&self, duration: Duration) -> Result<(), Cancelled> {
        (**self).wait(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::time::Instant;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Feed a scripted sequence of status codes through the retry loop.
    fn run_script(policy: &RetryPolicy, statuses: &[u16]) -> (Result<u16, ApiError>, Vec<Duration>, usize) {
        let delay = RecordingDelay::new();
        let calls = RefCell::new(0usize);
        let result = policy.execute(&delay, "lookup", || {
            let idx = {
                let mut c = calls.borrow_mut();
                *c += 1;
                *c - 1
            };
            match statuses.get(idx).copied().unwrap_or(200) {
                429 => Err(AttemptError::RateLimited),
                s if (200..300).contains(&s) => Ok(s),
                s => Err(AttemptError::Fatal(ApiError::UnexpectedStatus { status: s, body: String::new() })),
            }
        });
        let n = *calls.borrow();
        (result, delay.waits(), n)
    }

    #[test]
    fn test_default_policy_sequence() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delays().collect::<Vec<_>>(), vec![ms(100), ms(200), ms(400)]);
        assert_eq!(policy.total_delay(), ms(700));
    }

    #[test]
    fn test_success_after_two_rate_limits() {
        let (result, waits, attempts) = run_script(&RetryPolicy::default(), &[429, 429, 200]);
        assert_eq!(result.unwrap(), 200);
        assert_eq!(waits, vec![ms(100), ms(200)]);
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_exhausted_after_three_retries() {
        let (result, waits, attempts) = run_script(&RetryPolicy::default(), &[429, 429, 429, 429]);
        assert_eq!(result.unwrap_err(), ApiError::RateLimitExhausted { attempts: 4 });
        assert_eq!(waits, vec![ms(100), ms(200), ms(400)]);
        assert_eq!(attempts, 4);
    }

    #[test]
    fn test_other_failure_during_retry_is_surfaced_immediately() {
        let (result, waits, attempts) = run_script(&RetryPolicy::default(), &[429, 500, 200]);
        assert_eq!(result.unwrap_err().status(), Some(500));
        assert_eq!(waits, vec![ms(100)]);
        assert_eq!(attempts, 2);
    }

    #[test]
    fn test_first_attempt_success_never_waits() {
        let (result, waits, attempts) = run_script(&RetryPolicy::default(), &[201]);
        assert_eq!(result.unwrap(), 201);
        assert!(waits.is_empty());
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_no_retry_policy() {
        let (result, waits, _) = run_script(&RetryPolicy::no_retry(), &[429, 200]);
        assert_eq!(result.unwrap_err(), ApiError::RateLimitExhausted { attempts: 1 });
        assert!(waits.is_empty());
    }

    #[test]
    fn test_custom_policy() {
        let policy = RetryPolicy::new(2, ms(10), 3);
        assert_eq!(policy.delays().collect::<Vec<_>>(), vec![ms(10), ms(30)]);
    }

    #[test]
    fn test_cancellable_delay_waits_full_duration() {
        let delay = CancellableDelay::default();
        let start = Instant::now();
        delay.wait(ms(30)).unwrap();
        assert!(start.elapsed() >= ms(30));
    }

    #[test]
    fn test_cancel_wakes_waiter_early() {
        let token = CancelToken::new();
        let delay = CancellableDelay::new(token.clone());

        let handle = std::thread::spawn(move || {
            let start = Instant::now();
            let result = delay.wait(Duration::from_secs(10));
            (result, start.elapsed())
        });

        std::thread::sleep(ms(20));
        token.cancel();

        let (result, elapsed) = handle.join().unwrap();
        assert_eq!(result, Err(Cancelled));
        assert!(elapsed < Duration::from_secs(5));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancelled_token_turns_backoff_into_error() {
        let token = CancelToken::new();
        token.cancel();
        let delay = CancellableDelay::new(token);
        let result: Result<(), ApiError> =
            RetryPolicy::default().execute(&delay, "create", || Err(AttemptError::RateLimited));
        assert_eq!(result.unwrap_err(), ApiError::Cancelled);
    }
}
