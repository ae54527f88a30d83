//! Sliding-window rate limiting with exponential backoff on HTTP 429.
//!
//! Each external API gets its own limiter. Before a call, timestamps older
//! than the window are pruned; if the window is full the caller waits until
//! the oldest call leaves it. A call that fails with `Error::RateLimited` is
//! retried after `min(base * 2^attempt + jitter, max)`; attempt counters are
//! keyed by a hash of the call's arguments so unrelated calls do not share
//! backoff state. Any other error is returned immediately.
//!
//! `RateLimiter` is the async flavour used by the resolvers. It never holds
//! its lock across an `.await`. `BlockingRateLimiter` has the same semantics
//! for synchronous callers and sleeps the current thread.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use linkwise_core::config::{RateLimitConfig, MAX_RATE_SECS};
use linkwise_core::{Error, Result};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Share of the exponential term added as random jitter.
const JITTER_FRACTION: f64 = 0.1;

/// Limits and backoff parameters for one API.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitPolicy {
    pub max_calls: usize,
    pub period: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub max_retries: u32,
}

impl RateLimitPolicy {
    pub fn new(max_calls: usize, period: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            period,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            max_retries: 5,
        }
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max.max(base);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before retry number `attempt` (zero-based).
    ///
    /// `jitter` is a sample from `[0, 1)`. The jitter is proportional to the
    /// exponential term, so delays never decrease as `attempt` grows.
    pub fn backoff_delay(&self, attempt: u32, jitter: f64) -> Duration {
        let exp = self.backoff_base.as_secs_f64() * 2f64.powi(attempt.min(30) as i32);
        let jitter = exp * JITTER_FRACTION * jitter.clamp(0.0, 1.0);
        let secs = (exp + jitter).min(self.backoff_max.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.backoff_max)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::from(&RateLimitConfig::default())
    }
}

impl From<&RateLimitConfig> for RateLimitPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self::new(config.max_calls, seconds(config.period_secs))
            .with_backoff(
                seconds(config.backoff_base_secs),
                seconds(config.backoff_max_secs),
            )
            .with_max_retries(config.max_retries)
    }
}

/// Clamp a configured number of seconds into `[0, MAX_RATE_SECS]`.
fn seconds(value: f64) -> Duration {
    let value = if value.is_nan() { 0.0 } else { value };
    Duration::try_from_secs_f64(value.clamp(0.0, MAX_RATE_SECS)).unwrap_or(Duration::ZERO)
}

/// Timestamps of calls still inside the window.
#[derive(Debug, Default)]
struct CallWindow {
    calls: VecDeque<Instant>,
}

impl CallWindow {
    /// Record a call at `now` if the window has room, else return how long
    /// to wait for the oldest call to leave it.
    fn try_acquire(&mut self, policy: &RateLimitPolicy, now: Instant) -> Option<Duration> {
        while let Some(&oldest) = self.calls.front() {
            if now.saturating_duration_since(oldest) >= policy.period {
                self.calls.pop_front();
            } else {
                break;
            }
        }
        if self.calls.len() < policy.max_calls {
            self.calls.push_back(now);
            return None;
        }
        let oldest = self.calls.front().copied().unwrap_or(now);
        Some(policy.period.saturating_sub(now.saturating_duration_since(oldest)))
    }
}

/// State shared by both limiter flavours.
#[derive(Debug)]
struct LimiterState {
    name: String,
    policy: RateLimitPolicy,
    window: Mutex<CallWindow>,
    attempts: Mutex<HashMap<u64, u32>>,
}

/// What to do after a call returned `RateLimited`.
enum Backoff {
    Retry(Duration),
    GiveUp,
}

impl LimiterState {
    fn new(name: impl Into<String>, policy: RateLimitPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            window: Mutex::new(CallWindow::default()),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn try_acquire(&self, now: Instant) -> Option<Duration> {
        self.window.lock().try_acquire(&self.policy, now)
    }

    fn on_rate_limited(&self, key: u64, message: &str) -> Backoff {
        let attempt = {
            let mut attempts = self.attempts.lock();
            let counter = attempts.entry(key).or_insert(0);
            *counter += 1;
            *counter
        };
        if attempt > self.policy.max_retries {
            self.attempts.lock().remove(&key);
            warn!(
                "Rate limit retries exhausted api={} attempts={} reason={}",
                self.name, attempt, message
            );
            return Backoff::GiveUp;
        }
        let delay = self.policy.backoff_delay(attempt - 1, rand::random::<f64>());
        warn!(
            "Rate limited, backing off api={} attempt={} delay_ms={}",
            self.name,
            attempt,
            delay.as_millis()
        );
        Backoff::Retry(delay)
    }

    fn reset(&self, key: u64) {
        self.attempts.lock().remove(&key);
    }

    fn pending_attempts(&self, key: u64) -> u32 {
        self.attempts.lock().get(&key).copied().unwrap_or(0)
    }
}

fn hash_key<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

// ---------------------------------------------------------------
// Async
// ---------------------------------------------------------------

/// Async rate limiter shared by every call to one API.
#[derive(Debug)]
pub struct RateLimiter {
    state: LimiterState,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, policy: RateLimitPolicy) -> Self {
        Self {
            state: LimiterState::new(name, policy),
        }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.state.policy
    }

    /// Wait until the window has room, then record the call.
    pub async fn acquire(&self) {
        loop {
            let now = tokio::time::Instant::now().into_std();
            match self.state.try_acquire(now) {
                None => return,
                Some(wait) => {
                    debug!(
                        "Rate window full api={} wait_ms={}",
                        self.state.name,
                        wait.as_millis()
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Run `call` under the limiter, retrying it on `Error::RateLimited`.
    ///
    /// `key` identifies the call site (typically the URL and parameters).
    pub async fn execute<K, T, F, Fut>(&self, key: &K, mut call: F) -> Result<T>
    where
        K: Hash + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = hash_key(key);
        loop {
            self.acquire().await;
            match call().await {
                Err(Error::RateLimited(message)) => match self.state.on_rate_limited(key, &message) {
                    Backoff::Retry(delay) => tokio::time::sleep(delay).await,
                    Backoff::GiveUp => return Err(Error::RateLimited(message)),
                },
                other => {
                    self.state.reset(key);
                    return other;
                }
            }
        }
    }

    /// Consecutive 429s currently recorded for a call site.
    pub fn pending_attempts<K: Hash + ?Sized>(&self, key: &K) -> u32 {
        self.state.pending_attempts(hash_key(key))
    }
}

// ---------------------------------------------------------------
// Blocking
// ---------------------------------------------------------------

/// Thread-safe rate limiter for synchronous callers.
#[derive(Debug)]
pub struct BlockingRateLimiter {
    state: LimiterState,
}

impl BlockingRateLimiter {
    pub fn new(name: impl Into<String>, policy: RateLimitPolicy) -> Self {
        Self {
            state: LimiterState::new(name, policy),
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.state.policy
    }

    pub fn acquire(&self) {
        while let Some(wait) = self.state.try_acquire(Instant::now()) {
            debug!(
                "Rate window full api={} wait_ms={}",
                self.state.name,
                wait.as_millis()
            );
            std::thread::sleep(wait);
        }
    }

    pub fn execute<K, T, F>(&self, key: &K, mut call: F) -> Result<T>
    where
        K: Hash + ?Sized,
        F: FnMut() -> Result<T>,
    {
        let key = hash_key(key);
        loop {
            self.acquire();
            match call() {
                Err(Error::RateLimited(message)) => match self.state.on_rate_limited(key, &message) {
                    Backoff::Retry(delay) => std::thread::sleep(delay),
                    Backoff::GiveUp => return Err(Error::RateLimited(message)),
                },
                other => {
                    self.state.reset(key);
                    return other;
                }
            }
        }
    }

    pub fn pending_attempts<K: Hash + ?Sized>(&self, key: &K) -> u32 {
        self.state.pending_attempts(hash_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RateLimitPolicy {
        RateLimitPolicy::new(100, Duration::from_secs(1))
            .with_backoff(Duration::from_millis(100), Duration::from_secs(2))
            .with_max_retries(10)
    }

    #[test]
    fn test_backoff_is_monotone_and_capped() {
        let policy = policy();
        let mut previous = Duration::ZERO;
        for attempt in 0..12 {
            let delay = policy.backoff_delay(attempt, rand::random::<f64>());
            assert!(delay >= previous, "attempt {} went down", attempt);
            assert!(delay <= policy.backoff_max);
            previous = delay;
        }
        assert_eq!(previous, policy.backoff_max);
    }

    #[test]
    fn test_backoff_worst_case_jitter_is_still_monotone() {
        let policy = policy();
        for attempt in 0..10 {
            let high = policy.backoff_delay(attempt, 0.999);
            let low_next = policy.backoff_delay(attempt + 1, 0.0);
            assert!(low_next >= high);
        }
    }

    #[test]
    fn test_window_blocks_when_full() {
        let policy = RateLimitPolicy::new(2, Duration::from_secs(1));
        let mut window = CallWindow::default();
        let start = Instant::now();

        assert!(window.try_acquire(&policy, start).is_none());
        assert!(window.try_acquire(&policy, start + Duration::from_millis(100)).is_none());
        let wait = window
            .try_acquire(&policy, start + Duration::from_millis(400))
            .unwrap();
        assert_eq!(wait, Duration::from_millis(600));

        // oldest call has left the window
        assert!(window.try_acquire(&policy, start + Duration::from_secs(1)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_acquire_waits_for_window() {
        let limiter = RateLimiter::new("test", RateLimitPolicy::new(2, Duration::from_secs(1)));
        let start = tokio::time::Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_retries_on_429() {
        let limiter = RateLimiter::new("test", policy());
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let start = tokio::time::Instant::now();

        let result = limiter
            .execute("Zugspitze", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(Error::RateLimited("429".into()))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 0.1 + 0.2 + 0.4 seconds plus at most 10% jitter each
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(700));
        assert!(elapsed <= 3 * policy().backoff_max);
        assert_eq!(limiter.pending_attempts("Zugspitze"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_gives_up_after_max_retries() {
        let limiter = RateLimiter::new("test", policy().with_max_retries(2));
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = limiter
            .execute("k", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::RateLimited("429".into()))
            })
            .await;
        assert!(matches!(result, Err(Error::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(limiter.pending_attempts("k"), 0);
    }

    #[tokio::test]
    async fn test_execute_propagates_other_errors() {
        let limiter = RateLimiter::new("test", policy());
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = limiter
            .execute("k", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Timeout("slow".into()))
            })
            .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_counters_are_per_key() {
        let limiter = RateLimiter::new("test", policy());
        let _: Result<()> = limiter
            .execute("a", || async { Err(Error::Timeout("x".into())) })
            .await;

        let counter = AtomicU32::new(0);
        let calls = &counter;
        let _ = limiter
            .execute("b", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::RateLimited("429".into()))
                } else {
                    Ok(())
                }
            })
            .await;
        assert_eq!(limiter.pending_attempts("a"), 0);
        assert_eq!(limiter.pending_attempts("b"), 0);
    }

    #[test]
    fn test_blocking_execute_retries() {
        let limiter = BlockingRateLimiter::new(
            "test",
            RateLimitPolicy::new(10, Duration::from_secs(1))
                .with_backoff(Duration::from_millis(1), Duration::from_millis(5)),
        );
        let mut calls = 0;
        let result = limiter.execute("k", || {
            calls += 1;
            if calls < 3 {
                Err(Error::RateLimited("429".into()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);

        let result: Result<()> = limiter.execute("k", || Err(Error::Http("500".into())));
        assert!(matches!(result, Err(Error::Http(_))));
    }

    #[test]
    fn test_policy_from_config() {
        let config = RateLimitConfig {
            max_calls: 3,
            period_secs: 2.0,
            backoff_base_secs: 0.5,
            backoff_max_secs: 8.0,
            max_retries: 4,
        };
        let policy = RateLimitPolicy::from(&config);
        assert_eq!(policy.max_calls, 3);
        assert_eq!(policy.period, Duration::from_secs(2));
        assert_eq!(policy.backoff_base, Duration::from_millis(500));
        assert_eq!(policy.max_retries, 4);
    }

    #[test]
    fn test_policy_from_out_of_range_config() {
        let config = RateLimitConfig {
            max_calls: 3,
            period_secs: f64::INFINITY,
            backoff_base_secs: f64::NAN,
            backoff_max_secs: 1e30,
            max_retries: 4,
        };
        let policy = RateLimitPolicy::from(&config);
        let cap = Duration::from_secs_f64(MAX_RATE_SECS);
        assert_eq!(policy.period, cap);
        assert_eq!(policy.backoff_base, Duration::ZERO);
        assert_eq!(policy.backoff_max, cap);
        assert!(policy.backoff_delay(40, 0.5) <= cap);
    }
}
