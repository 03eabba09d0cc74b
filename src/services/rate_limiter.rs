use std::collections::HashMap;
use std::net::IpAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::config::AppState;

struct Window {
    count: u32,
    window_start: DateTime<Utc>,
}

/// Fixed-window, in-memory rate limiter keyed by client IP (§4.I).
///
/// A background sweeper evicts stale entries so the map doesn't grow
/// unbounded under a long-running process.
pub struct RateLimiter {
    windows: RwLock<HashMap<IpAddr, Window>>,
    limit_per_minute: u32,
}

impl RateLimiter {
    pub fn new(limit_per_minute: u32) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            limit_per_minute,
        }
    }

    /// Check and record one request from `ip`. Returns `false` if the
    /// per-minute quota is exceeded.
    pub async fn check(&self, ip: IpAddr) -> bool {
        let now = Utc::now();
        let mut windows = self.windows.write().await;

        let entry = windows.entry(ip).or_insert_with(|| Window {
            count: 0,
            window_start: now,
        });

        if now - entry.window_start >= Duration::minutes(1) {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        entry.count <= self.limit_per_minute
    }

    /// Evict windows untouched for more than a minute. Intended to run every
    /// 60 seconds from a background task spawned at startup.
    pub async fn sweep(&self) {
        let now = Utc::now();
        let mut windows = self.windows.write().await;
        windows.retain(|_, w| now - w.window_start < Duration::minutes(1));
    }
}

/// Axum middleware enforcing the rate limiter ahead of the `auth`/`oauth`
/// route groups (§4.I, §9 Open Question e).
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if state.rate_limiter.check(addr.ip()).await {
        next.run(request).await
    } else {
        (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response()
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn never_allows_more_than_the_limit_within_one_window(limit in 1u32..20, attempts in 1u32..40) {
            let limiter = RateLimiter::new(limit);
            let ip: IpAddr = "127.0.0.1".parse().unwrap();
            let rt = tokio::runtime::Runtime::new().unwrap();

            let allowed = rt.block_on(async {
                let mut allowed = 0u32;
                for _ in 0..attempts {
                    if limiter.check(ip).await {
                        allowed += 1;
                    }
                }
                allowed
            });

            prop_assert!(allowed <= limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_under_limit() {
        let limiter = RateLimiter::new(3);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(limiter.check(ip).await);
        assert!(limiter.check(ip).await);
        assert!(limiter.check(ip).await);
    }

    #[tokio::test]
    async fn test_blocks_over_limit() {
        let limiter = RateLimiter::new(2);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(limiter.check(ip).await);
        assert!(limiter.check(ip).await);
        assert!(!limiter.check(ip).await);
    }

    #[tokio::test]
    async fn test_separate_ips_tracked_independently() {
        let limiter = RateLimiter::new(1);
        let a: IpAddr = "127.0.0.1".parse().unwrap();
        let b: IpAddr = "127.0.0.2".parse().unwrap();
        assert!(limiter.check(a).await);
        assert!(limiter.check(b).await);
    }

    #[tokio::test]
    async fn test_sweep_evicts_stale_entries() {
        let limiter = RateLimiter::new(1);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        limiter.check(ip).await;
        {
            let mut windows = limiter.windows.write().await;
            windows.get_mut(&ip).unwrap().window_start = Utc::now() - Duration::minutes(2);
        }
        limiter.sweep().await;
        assert!(limiter.windows.read().await.is_empty());
    }
}
