use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Extensions, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter as GovernorRateLimiter,
};
use log::warn;
use serde_json::json;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};

use crate::core::config::RateLimitSettings;

pub type IpRateLimiter = GovernorRateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

pub const LOGIN_PATH_SUFFIX: &str = "/auth/login";

#[derive(Debug, Clone)]
pub struct HttpRateLimitConfig {
    pub requests_per_minute: u32,
    pub login_requests_per_minute: u32,
}

impl Default for HttpRateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 100,
            login_requests_per_minute: 5,
        }
    }
}

impl From<&RateLimitSettings> for HttpRateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            requests_per_minute: settings.requests_per_minute,
            login_requests_per_minute: settings.login_per_minute,
        }
    }
}

/// Per-client-IP limits: one bucket for the whole API and a tighter one for
/// the login endpoint.
pub struct ClinicRateLimiter {
    general: Arc<IpRateLimiter>,
    login: Arc<IpRateLimiter>,
    clock: DefaultClock,
}

fn per_minute(n: u32) -> Quota {
    const FALLBACK: NonZeroU32 = match NonZeroU32::new(1) {
        Some(v) => v,
        None => unreachable!(),
    };
    Quota::per_minute(NonZeroU32::new(n).unwrap_or(FALLBACK))
}

impl ClinicRateLimiter {
    pub fn new(config: &HttpRateLimitConfig) -> Self {
        Self {
            general: Arc::new(GovernorRateLimiter::keyed(per_minute(
                config.requests_per_minute,
            ))),
            login: Arc::new(GovernorRateLimiter::keyed(per_minute(
                config.login_requests_per_minute,
            ))),
            clock: DefaultClock::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&HttpRateLimitConfig::default())
    }

    /// `Err(retry_after_secs)` when `ip` is over its quota for `path`.
    pub fn check(&self, ip: IpAddr, path: &str) -> Result<(), u64> {
        if path.ends_with(LOGIN_PATH_SUFFIX) {
            self.check_with(&self.login, ip)?;
        }
        self.check_with(&self.general, ip)
    }

    fn check_with(&self, limiter: &IpRateLimiter, ip: IpAddr) -> Result<(), u64> {
        limiter.check_key(&ip).map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            wait.as_secs().max(1)
        })
    }

    /// Drops buckets for clients that have been idle long enough to be full.
    pub fn cleanup(&self) {
        self.general.retain_recent();
        self.login.retain_recent();
    }
}

impl std::fmt::Debug for ClinicRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClinicRateLimiter")
            .field("tracked_clients", &self.general.len())
            .finish()
    }
}

/// Client address for audit records: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the socket peer when the server was started with
/// connect info. Headers are client-controlled, so this is never used as a
/// rate-limit key.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return Some(ip.to_string());
    }
    peer_ip(extensions).map(|ip| ip.to_string())
}

/// Socket peer of the connection.
pub fn peer_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

pub async fn rate_limit_middleware(
    axum::Extension(limiter): axum::Extension<Arc<ClinicRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = peer_ip(request.extensions()).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match limiter.check(ip, request.uri().path()) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            warn!("Rate limit exceeded for {ip} on {}", request.uri().path());
            http_rate_limit_response(retry_after)
        }
    }
}

fn http_rate_limit_response(retry_after: u64) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": "Rate limit exceeded. Muitas requisições, tente novamente em alguns segundos.",
            "retry_after_secs": retry_after
        })),
    )
        .into_response();

    if let Ok(value) = retry_after.to_string().parse() {
        response.headers_mut().insert("Retry-After", value);
    }

    response
}

pub fn create_rate_limit_layer(
    config: &HttpRateLimitConfig,
) -> (
    axum::Extension<Arc<ClinicRateLimiter>>,
    Arc<ClinicRateLimiter>,
) {
    let limiter = Arc::new(ClinicRateLimiter::new(config));
    (axum::Extension(Arc::clone(&limiter)), limiter)
}
