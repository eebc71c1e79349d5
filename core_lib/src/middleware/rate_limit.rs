//! Rate limiting middleware

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

use crate::config::RateLimitConfig;
use crate::error::AppError;

pub const RATE_LIMIT_MESSAGE: &str = "Terlalu banyak percobaan, coba lagi nanti.";

/// Expired entries are swept once the table grows past this many clients,
/// at most once per window.
const SWEEP_THRESHOLD: usize = 10_000;

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock()
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

struct Windows {
    entries: HashMap<IpAddr, Window>,
    last_sweep: Instant,
}

impl Windows {
    fn sweep(&mut self, now: Instant, window: Duration) {
        self.entries
            .retain(|_, entry| now.duration_since(entry.started) < window);
        self.last_sweep = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
}

#[derive(Error, Debug, Clone, Copy)]
#[error("rate limit of {limit} attempts exceeded")]
pub struct RateLimitError {
    pub limit: u32,
    pub retry_after: Duration,
}

/// Per-client attempt counter over a fixed-length window that starts at the
/// client's first attempt and resets once it has fully elapsed.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<Windows>>,
    max_attempts: u32,
    window: Duration,
    sweep_threshold: usize,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let last_sweep = clock.now();
        Self {
            windows: Arc::new(Mutex::new(Windows {
                entries: HashMap::new(),
                last_sweep,
            })),
            max_attempts: config.max_attempts,
            window: Duration::from_secs(config.window_seconds),
            sweep_threshold: SWEEP_THRESHOLD,
            clock,
        }
    }

    /// Overrides the table size above which expired entries are swept.
    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold;
        self
    }

    /// Records one attempt for `client`, or refuses it if the window's
    /// budget is spent.
    pub fn check(&self, client: IpAddr) -> Result<RateLimitStatus, RateLimitError> {
        let now = self.clock.now();
        let mut windows = self.windows.lock();

        // At most one full scan per window.
        if windows.entries.len() > self.sweep_threshold
            && now.duration_since(windows.last_sweep) >= self.window
        {
            windows.sweep(now, self.window);
        }

        let entry = windows.entries.entry(client).or_insert(Window {
            count: 0,
            started: now,
        });

        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                count: 0,
                started: now,
            };
        }

        if entry.count >= self.max_attempts {
            return Err(RateLimitError {
                limit: self.max_attempts,
                retry_after: self.window.saturating_sub(now.duration_since(entry.started)),
            });
        }

        entry.count += 1;

        Ok(RateLimitStatus {
            limit: self.max_attempts,
            remaining: self.max_attempts - entry.count,
        })
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().entries.len()
    }
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE).into_response();

        let retry_after_secs = self.retry_after.as_secs() + u64::from(self.retry_after.subsec_nanos() > 0);
        let headers = response.headers_mut();
        headers.insert("X-RateLimit-Limit", HeaderValue::from(self.limit));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from(0_u32));
        headers.insert("Retry-After", HeaderValue::from(retry_after_secs));

        response
    }
}

/// Client identity is the peer IP. Without connect info (e.g. the router is
/// driven directly in tests) every caller shares one bucket.
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_ip(&request);

    let status = limiter.check(client).map_err(|err| {
        warn!(client = %client, retry_after_secs = err.retry_after.as_secs(), "Rate limit exceeded");
        err
    })?;

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(status.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(status.remaining));

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(clock: &ManualClock) -> RateLimiter {
        RateLimiter::with_clock(
            &RateLimitConfig {
                max_attempts: 5,
                window_seconds: 15 * 60,
            },
            Arc::new(clock.clone()),
        )
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_five_attempts_then_rejection() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock);

        for expected_remaining in (0..5).rev() {
            let status = limiter.check(ip(1)).unwrap();
            assert_eq!(status.remaining, expected_remaining);
        }

        let err = limiter.check(ip(1)).unwrap_err();
        assert_eq!(err.limit, 5);
        assert_eq!(err.retry_after, Duration::from_secs(900));
        assert!(limiter.check(ip(1)).is_err());
    }

    #[test]
    fn test_clients_are_counted_separately() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock);

        for _ in 0..5 {
            limiter.check(ip(1)).unwrap();
        }
        assert!(limiter.check(ip(1)).is_err());
        assert!(limiter.check(ip(2)).is_ok());
    }

    #[test]
    fn test_window_expiry_resets_budget() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock);

        for _ in 0..5 {
            limiter.check(ip(1)).unwrap();
        }

        clock.advance(Duration::from_secs(14 * 60 + 59));
        let err = limiter.check(ip(1)).unwrap_err();
        assert_eq!(err.retry_after, Duration::from_secs(1));

        clock.advance(Duration::from_secs(1));
        let status = limiter.check(ip(1)).unwrap();
        assert_eq!(status.remaining, 4);
    }

    #[test]
    fn test_expired_clients_are_swept() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock).with_sweep_threshold(2);

        for last in 1..=3 {
            limiter.check(ip(last)).unwrap();
        }
        assert_eq!(limiter.tracked_clients(), 3);

        clock.advance(Duration::from_secs(15 * 60));
        limiter.check(ip(4)).unwrap();

        assert_eq!(limiter.tracked_clients(), 1);
        assert_eq!(limiter.check(ip(4)).unwrap().remaining, 3);
    }

    #[test]
    fn test_sweep_runs_at_most_once_per_window() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock).with_sweep_threshold(2);

        for last in 1..=3 {
            limiter.check(ip(last)).unwrap();
        }

        // Nothing has expired yet, so the table keeps growing.
        clock.advance(Duration::from_secs(60));
        for last in 4..=6 {
            limiter.check(ip(last)).unwrap();
        }
        assert_eq!(limiter.tracked_clients(), 6);

        // The first three expire here and are swept; 4..=6 are still live.
        clock.advance(Duration::from_secs(14 * 60));
        limiter.check(ip(7)).unwrap();
        assert_eq!(limiter.tracked_clients(), 4);

        // 4..=6 expire a minute later, but the next sweep is a window away.
        clock.advance(Duration::from_secs(60));
        limiter.check(ip(8)).unwrap();
        assert_eq!(limiter.tracked_clients(), 5);

        // 7 has expired by now; 8 has another minute to go.
        clock.advance(Duration::from_secs(14 * 60));
        limiter.check(ip(9)).unwrap();
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_small_table_is_not_swept() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock);

        limiter.check(ip(1)).unwrap();
        clock.advance(Duration::from_secs(15 * 60));
        limiter.check(ip(2)).unwrap();

        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_rejection_response() {
        let err = RateLimitError {
            limit: 5,
            retry_after: Duration::from_millis(1500),
        };
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "2");
        assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "5");
        assert_eq!(response.headers().get("X-RateLimit-Remaining").unwrap(), "0");
    }

    #[test]
    fn test_concurrent_checks_never_exceed_budget() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.check(ip(9)).is_ok())
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(accepted, 5);
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
