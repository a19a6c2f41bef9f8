use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::HashMapStateStore;
use governor::{Quota, RateLimiter};
use serde::Serialize;

pub const RATE_LIMIT_HEADER: &str = "x-ratelimit-limit";

/// A limit such as `15/minute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: NonZeroU32,
    pub window: Duration,
    descriptor: String,
}

impl RateLimit {
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// `max_requests` may arrive at once; capacity then comes back evenly across `window`.
    pub fn quota(&self) -> Quota {
        let replenish_every = self.window / self.max_requests.get();
        Quota::with_period(replenish_every)
            .unwrap_or_else(|| Quota::per_second(self.max_requests))
            .allow_burst(self.max_requests)
    }
}

impl FromStr for RateLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (count, period) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("Invalid rate limit: {}. Expected <n>/<period>", s))?;

        let max_requests: u32 = count
            .trim()
            .parse()
            .map_err(|_| format!("Invalid rate limit count: {}", count))?;
        let max_requests = NonZeroU32::new(max_requests)
            .ok_or_else(|| format!("Rate limit count must be positive: {}", s))?;

        let window = match period.trim().to_ascii_lowercase().as_str() {
            "second" | "s" => Duration::from_secs(1),
            "minute" | "m" => Duration::from_secs(60),
            "hour" | "h" => Duration::from_secs(60 * 60),
            "day" | "d" => Duration::from_secs(24 * 60 * 60),
            other => return Err(format!("Invalid rate limit period: {}", other)),
        };

        Ok(Self {
            max_requests,
            window,
            descriptor: format!("{} per 1 {}", max_requests, period.trim()),
        })
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor)
    }
}

/// Per-client limiter keyed by address.
pub struct ClientRateLimiter<C: Clock = DefaultClock> {
    limit: RateLimit,
    limiter: RateLimiter<IpAddr, HashMapStateStore<IpAddr>, C, NoOpMiddleware<C::Instant>>,
}

impl ClientRateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self::with_clock(limit, DefaultClock::default())
    }
}

impl<C: Clock> ClientRateLimiter<C> {
    pub fn with_clock(limit: RateLimit, clock: C) -> Self {
        let limiter = RateLimiter::hashmap_with_clock(limit.quota(), clock);
        Self { limit, limiter }
    }

    pub fn limit(&self) -> &RateLimit {
        &self.limit
    }

    pub fn allow_request(&self, client: IpAddr) -> bool {
        self.limiter.check_key(&client).is_ok()
    }

    /// Drops clients whose quota has fully replenished.
    pub fn forget_idle_clients(&self) {
        self.limiter.retain_recent();
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

#[derive(Serialize)]
struct RateLimitedResponse {
    error: String,
    limit: String,
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<ClientRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_address(&request);

    if limiter.allow_request(client) {
        return next.run(request).await;
    }

    let limit = limiter.limit().descriptor().to_string();
    tracing::warn!(client = %client, limit = %limit, "Rate limit exceeded");

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitedResponse {
            error: format!("Rate limit exceeded: {}", limit),
            limit: limit.clone(),
        }),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&limit) {
        response.headers_mut().insert(RATE_LIMIT_HEADER, value);
    }
    response
}

fn client_address(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

#[cfg(test)]
mod tests {
    use governor::clock::FakeRelativeClock;

    use super::*;

    fn client(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn parses_count_and_period() {
        let limit: RateLimit = "15/minute".parse().unwrap();
        assert_eq!(limit.max_requests.get(), 15);
        assert_eq!(limit.window, Duration::from_secs(60));
        assert_eq!(limit.descriptor(), "15 per 1 minute");
    }

    #[test]
    fn rejects_malformed_descriptors() {
        assert!("15".parse::<RateLimit>().is_err());
        assert!("x/minute".parse::<RateLimit>().is_err());
        assert!("0/minute".parse::<RateLimit>().is_err());
        assert!("5/fortnight".parse::<RateLimit>().is_err());
    }

    #[test]
    fn denies_requests_over_the_limit_per_client() {
        let limiter =
            ClientRateLimiter::with_clock("2/minute".parse().unwrap(), FakeRelativeClock::default());

        assert!(limiter.allow_request(client(1)));
        assert!(limiter.allow_request(client(1)));
        assert!(!limiter.allow_request(client(1)));
        assert!(limiter.allow_request(client(2)));
    }

    #[test]
    fn allows_again_once_the_window_passes() {
        let clock = FakeRelativeClock::default();
        let limiter = ClientRateLimiter::with_clock("1/second".parse().unwrap(), clock.clone());

        assert!(limiter.allow_request(client(1)));
        assert!(!limiter.allow_request(client(1)));

        clock.advance(Duration::from_millis(1001));
        assert!(limiter.allow_request(client(1)));
    }

    #[test]
    fn forgets_clients_once_their_quota_is_replenished() {
        let clock = FakeRelativeClock::default();
        let limiter = ClientRateLimiter::with_clock("3/second".parse().unwrap(), clock.clone());
        limiter.allow_request(client(1));
        limiter.allow_request(client(2));
        assert_eq!(limiter.tracked_clients(), 2);

        clock.advance(Duration::from_secs(2));
        limiter.forget_idle_clients();
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
