use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::AppError;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of a single `check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

/// RateLimiter
///
/// Fixed-window request counter keyed by an arbitrary string (client IP plus
/// route group). Windows older than the window length are pruned lazily.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    trust_proxy_headers: bool,
    windows: Mutex<HashMap<String, Window>>,
}

pub type RateLimiterState = Arc<RateLimiter>;

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            trust_proxy_headers: false,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Keys on the forwarded client address instead of the socket peer.
    pub fn trust_proxy_headers(mut self, trusted: bool) -> Self {
        self.trust_proxy_headers = trusted;
        self
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Drop expired windows once the map grows, so unique IPs cannot pile up.
        if windows.len() > 1024 {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            let elapsed = now.duration_since(entry.started);
            let retry_after = self.window.saturating_sub(elapsed);
            // Round up so clients never retry a fraction of a second too early.
            let retry_after_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            return Decision::Limited {
                retry_after_secs: retry_after_secs.max(1),
            };
        }

        entry.count += 1;
        Decision::Allowed {
            remaining: self.max_requests - entry.count,
        }
    }
}

/// client_ip
///
/// The socket peer's address. Only with `trust_proxy_headers` set are the
/// first `x-forwarded-for` hop and then `x-real-ip` consulted first, since a
/// client talking to the service directly can put anything in them.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> Option<String> {
    let peer_ip = peer.map(|addr| addr.ip().to_string());
    if !trust_proxy_headers {
        return peer_ip;
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded.or(real_ip).map(str::to_string).or(peer_ip)
}

/// rate_limit
///
/// Route-layer middleware for the public auth endpoints. The whole group shares
/// one window per client. Rejects with 429 and a `Retry-After` header once the
/// caller exhausts it.
pub async fn rate_limit(
    State(limiter): State<RateLimiterState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer, limiter.trust_proxy_headers)
        .unwrap_or_else(|| "unknown".to_string());
    let key = format!("auth:{ip}");

    match limiter.check(&key) {
        Decision::Limited { retry_after_secs } => {
            tracing::warn!(%key, retry_after_secs, "rate limit exceeded");
            Err(AppError::RateLimited { retry_after_secs })
        }
        Decision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limiter.max_requests()));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            Ok(response)
        }
    }
}
