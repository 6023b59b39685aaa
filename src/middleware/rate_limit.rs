//! Per-client-IP request limit for the API routes.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ApiError;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";

/// Tracked keys before stale entries are pruned
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    limit: u32,
}

impl RateLimit {
    /// `requests` per `window` for each client address. Cells refill
    /// evenly across the window and a full window's worth may burst.
    pub fn new(requests: u32, window: Duration) -> Option<Self> {
        let burst = NonZeroU32::new(requests)?;
        let quota = Quota::with_period(window / requests)?.allow_burst(burst);
        Some(Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            limit: requests,
        })
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        if self.limiter.len() > PRUNE_THRESHOLD {
            self.limiter.retain_recent();
        }
        self.limiter
            .check_key(&ip)
            .map_err(|not_until| not_until.wait_time_from(DefaultClock::default().now()))
    }
}

/// Client address from the connection; requests without one (in-process
/// callers) share a single bucket
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit(State(limit): State<RateLimit>, request: Request, next: Next) -> Response {
    let ip = client_ip(&request);
    match limit.check(ip) {
        Ok(()) => {
            let mut response = next.run(request).await;
            response.headers_mut().insert(LIMIT_HEADER, HeaderValue::from(limit.limit));
            response
        }
        Err(wait) => {
            tracing::warn!(%ip, retry_after_secs = wait.as_secs(), "Rate limit exceeded");
            let mut response =
                ApiError::too_many_requests("Too many requests from this IP, please try again in an hour!")
                    .into_response();
            let headers = response.headers_mut();
            headers.insert(LIMIT_HEADER, HeaderValue::from(limit.limit));
            headers.insert(RETRY_AFTER, HeaderValue::from(wait.as_secs().max(1)));
            response
        }
    }
}
