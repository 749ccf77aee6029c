//! Shared HTTP plumbing for the network providers.
//!
//! Every upstream gets one `HttpClient`: a blocking reqwest client with a
//! request timeout, a retry budget with exponential backoff and jitter, a
//! circuit breaker, and a rate-limit throttle shared by all worker threads.

use super::circuit_breaker::CircuitBreaker;
use super::provider::FetchError;
use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use rand::Rng;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Network settings, loadable from the `[fetch]` table of a run config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub jitter: bool,
    pub breaker_threshold: u32,
    pub breaker_cooldown_secs: u64,
    /// SEC fair-access policy allows at most 10 requests per second.
    pub sec_requests_per_second: u32,
    pub yahoo_requests_per_second: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
            jitter: true,
            breaker_threshold: 3,
            breaker_cooldown_secs: 30 * 60,
            sec_requests_per_second: 10,
            yahoo_requests_per_second: 2,
        }
    }
}

impl FetchSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base: Duration::from_millis(self.backoff_base_ms),
            max: Duration::from_millis(self.backoff_max_ms.max(self.backoff_base_ms)),
            jitter: self.jitter,
        }
    }

    pub fn circuit_breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new(
            Duration::from_secs(self.breaker_cooldown_secs),
            self.breaker_threshold,
        )
    }
}

/// Exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub base: Duration,
    pub max: Duration,
    /// Randomize each delay by +/- 50%.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let scale = 2f64.powi(attempt.min(30) as i32);
        let capped = (self.base.as_secs_f64() * scale).min(self.max.as_secs_f64());
        if !self.jitter || capped <= 0.0 {
            return Duration::from_secs_f64(capped);
        }
        let factor = rand::thread_rng().gen_range(0.5..=1.5);
        Duration::from_secs_f64(capped * factor)
    }

    /// Backoff for retry `attempt`, stretched to the server's `Retry-After`
    /// when it was rate limited.
    pub fn delay_after(&self, attempt: u32, err: &FetchError) -> Duration {
        let backoff = self.delay(attempt);
        match err {
            FetchError::RateLimited { retry_after_secs } => {
                backoff.max(Duration::from_secs(*retry_after_secs))
            }
            _ => backoff,
        }
    }
}

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Blocking rate-limit gate shared across threads.
pub struct Throttle {
    limiter: DirectRateLimiter,
    clock: DefaultClock,
}

impl Throttle {
    pub fn per_second(requests: u32) -> Self {
        let rate = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_second(rate)),
            clock: DefaultClock::default(),
        }
    }

    /// Take one cell without waiting.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Block the calling thread until a cell is available.
    pub fn acquire(&self) {
        while let Err(not_until) = self.limiter.check() {
            std::thread::sleep(not_until.wait_time_from(self.clock.now()));
        }
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle").finish_non_exhaustive()
    }
}

/// HTTP client for one upstream.
#[derive(Debug)]
pub struct HttpClient {
    upstream: &'static str,
    client: reqwest::blocking::Client,
    breaker: Arc<CircuitBreaker>,
    throttle: Arc<Throttle>,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(
        upstream: &'static str,
        user_agent: &str,
        settings: &FetchSettings,
        requests_per_second: u32,
    ) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::ClientSetup(e.to_string()))?;
        Ok(Self {
            upstream,
            client,
            breaker: Arc::new(settings.circuit_breaker()),
            throttle: Arc::new(Throttle::per_second(requests_per_second)),
            retry: settings.retry_policy(),
        })
    }

    /// GET `url` and decode the JSON body, retrying transient failures.
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let mut attempt = 0;
        loop {
            if !self.breaker.is_allowed() {
                return Err(FetchError::CircuitBreakerTripped);
            }
            self.throttle.acquire();

            match self.get_once(url) {
                Ok(value) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_after(attempt, &err);
                    tracing::debug!(
                        upstream = self.upstream,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying request"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn get_once<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let resp = match self.client.get(url).send() {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_connect() || e.is_timeout() {
                    self.breaker.record_failure();
                }
                return Err(FetchError::NetworkUnreachable(e.to_string()));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let err = status_error(status, url, retry_after);
            match err {
                FetchError::CircuitBreakerTripped => self.breaker.trip(),
                _ if err.is_transient() => self.breaker.record_failure(),
                _ => {}
            }
            return Err(err);
        }

        resp.json::<T>().map_err(|e| {
            FetchError::ResponseFormatChanged(format!("{}: failed to decode {url}: {e}", self.upstream))
        })
    }
}

/// Map a non-success status to a fetch error.
fn status_error(status: StatusCode, url: &str, retry_after: Option<u64>) -> FetchError {
    match status {
        StatusCode::FORBIDDEN => FetchError::CircuitBreakerTripped,
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(60),
        },
        StatusCode::UNAUTHORIZED => {
            FetchError::AuthenticationRequired(format!("{url} requires authentication"))
        }
        _ => FetchError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: bool) -> RetryPolicy {
        RetryPolicy {
            max_retries: 4,
            base: Duration::from_millis(100),
            max: Duration::from_millis(500),
            jitter,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy(false);
        assert_eq!(p.delay(0), Duration::from_millis(100));
        assert_eq!(p.delay(1), Duration::from_millis(200));
        assert_eq!(p.delay(2), Duration::from_millis(400));
        assert_eq!(p.delay(3), Duration::from_millis(500));
        assert_eq!(p.delay(40), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_half_either_side() {
        let p = policy(true);
        for _ in 0..100 {
            let d = p.delay(1);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(300));
        }
    }

    #[test]
    fn rate_limit_waits_at_least_retry_after() {
        let p = policy(false);
        let limited = FetchError::RateLimited { retry_after_secs: 60 };
        assert_eq!(p.delay_after(0, &limited), Duration::from_secs(60));

        let short = FetchError::RateLimited { retry_after_secs: 0 };
        assert_eq!(p.delay_after(2, &short), Duration::from_millis(400));

        let reset = FetchError::NetworkUnreachable("reset".into());
        assert_eq!(p.delay_after(1, &reset), Duration::from_millis(200));
    }

    #[test]
    fn throttle_limits_burst() {
        let throttle = Throttle::per_second(2);
        assert!(throttle.try_acquire());
        assert!(throttle.try_acquire());
        assert!(!throttle.try_acquire());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_error(StatusCode::FORBIDDEN, "u", None),
            FetchError::CircuitBreakerTripped
        );
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "u", Some(5)),
            FetchError::RateLimited { retry_after_secs: 5 }
        );
        let server = status_error(StatusCode::BAD_GATEWAY, "u", None);
        assert!(server.is_transient());
        let missing = status_error(StatusCode::NOT_FOUND, "u", None);
        assert!(!missing.is_transient());
    }

    #[test]
    fn default_settings_respect_sec_limit() {
        let settings = FetchSettings::default();
        assert!(settings.sec_requests_per_second <= 10);
        assert_eq!(settings.retry_policy().max_retries, 3);
    }
}
