use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Mutex,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::time::{sleep_until, Instant};

use crate::{ClientError, Result};

/// Wake-up used when the next window lies beyond what `Instant` can hold.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Future returned by [`RateLimiter::enter`].
pub type EnterFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Admission gate consulted once per [`crate::Client::execute`] call.
///
/// `enter` resolves once the caller may proceed. It must only fail on
/// misconfiguration; running out of capacity means waiting, not erroring.
pub trait RateLimiter: Send + Sync + fmt::Debug {
    fn enter(&self) -> EnterFuture<'_>;
}

/// Rate limit parameters.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Identifies the limited target in logs.
    pub token: String,
    /// Admissions allowed per window.
    pub max_requests: u32,
    /// Window length in milliseconds.
    pub interval_ms: u64,
}

impl RateLimitConfig {
    pub fn new(token: impl Into<String>, max_requests: u32, interval: Duration) -> Self {
        Self {
            token: token.into(),
            max_requests,
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(ClientError::Config(format!(
                "rate limiter '{}': max_requests must be greater than zero",
                self.token
            )));
        }
        if self.interval_ms == 0 {
            return Err(ClientError::Config(format!(
                "rate limiter '{}': interval must be greater than zero",
                self.token
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Window {
    start: Instant,
    admitted: u32,
}

/// Fixed-window limiter: at most `max_requests` admissions per window.
///
/// Windows are aligned to the moment the limiter was built. Callers that find
/// the current window full sleep until the next one opens and try again.
pub struct FixedWindowLimiter {
    config: RateLimitConfig,
    interval: Duration,
    window: Mutex<Window>,
}

impl fmt::Debug for FixedWindowLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedWindowLimiter")
            .field("config", &self.config)
            .finish()
    }
}

impl FixedWindowLimiter {
    /// Builds a limiter, rejecting a zero request count or zero interval.
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            interval: config.interval(),
            config,
            window: Mutex::new(Window {
                start: Instant::now(),
                admitted: 0,
            }),
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admits the caller now, or returns the instant the next window opens.
    fn try_admit(&self, now: Instant) -> std::result::Result<(), Instant> {
        let mut window = self
            .window
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let since_start = now.saturating_duration_since(window.start);
        if since_start >= self.interval {
            let skipped = since_start.as_nanos() / self.interval.as_nanos();
            let advance = self.interval.as_nanos() * skipped;
            window.start += Duration::from_nanos(u64::try_from(advance).unwrap_or(u64::MAX));
            window.admitted = 0;
        }

        if window.admitted < self.config.max_requests {
            window.admitted += 1;
            Ok(())
        } else {
            // An interval too large for `Instant` never reopens.
            Err(window
                .start
                .checked_add(self.interval)
                .unwrap_or_else(|| now + FAR_FUTURE))
        }
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn enter(&self) -> EnterFuture<'_> {
        Box::pin(async move {
            loop {
                match self.try_admit(Instant::now()) {
                    Ok(()) => return Ok(()),
                    Err(next_window) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            token = %self.config.token,
                            "rate limit window full, waiting for next window"
                        );
                        sleep_until(next_window).await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use super::{FixedWindowLimiter, RateLimitConfig, RateLimiter};
    use crate::ClientError;

    #[test]
    fn rejects_zero_max_requests() {
        let err = FixedWindowLimiter::new(RateLimitConfig::new("api", 0, Duration::from_secs(1)))
            .expect_err("must fail");
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn rejects_zero_interval() {
        let err = FixedWindowLimiter::new(RateLimitConfig::new("api", 5, Duration::ZERO))
            .expect_err("must fail");
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn admits_max_requests_per_window() {
        let limiter = Arc::new(
            FixedWindowLimiter::new(RateLimitConfig::new(
                "api",
                10,
                Duration::from_millis(1_000),
            ))
            .expect("valid config"),
        );
        let completed = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let limiter = Arc::clone(&limiter);
            let completed = Arc::clone(&completed);
            tokio::spawn(async move {
                limiter.enter().await.expect("admission must not fail");
                completed.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 10);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_windows_are_skipped() {
        let limiter =
            FixedWindowLimiter::new(RateLimitConfig::new("api", 1, Duration::from_millis(100)))
                .expect("valid config");

        limiter.enter().await.expect("first admission");
        tokio::time::sleep(Duration::from_millis(350)).await;

        let before = tokio::time::Instant::now();
        limiter.enter().await.expect("second admission");
        assert!(before.elapsed() < Duration::from_millis(1));

        limiter.enter().await.expect("third admission");
        let waited = before.elapsed();
        assert!(waited >= Duration::from_millis(50));
        assert!(waited < Duration::from_millis(60));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_interval_waits_instead_of_overflowing() {
        let limiter = FixedWindowLimiter::new(RateLimitConfig::new("api", 1, Duration::MAX))
            .expect("valid config");

        limiter.enter().await.expect("first admission");
        let second = tokio::time::timeout(Duration::from_millis(10), limiter.enter()).await;
        assert!(second.is_err(), "second caller must still be waiting");
    }
}
