//! Cross-cutting HTTP concerns: request identification, security headers,
//! content-type enforcement, per-route rate limiting, and a database
//! health gate for the read/write endpoints.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use qcd_core::ErrorCode;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reads the inbound `x-request-id` header if present, otherwise mints a
/// fresh one, and stamps it onto both the request extensions (for handlers)
/// and the response headers (for callers).
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    #[must_use]
    pub fn from_request(req: &Request) -> String {
        req.extensions()
            .get::<RequestId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

/// Rejects non-JSON request bodies on write methods. GET/HEAD carry no body
/// and are exempt, as is any write request with an empty body (e.g. the
/// cache-invalidation endpoint, which takes its argument from the path).
pub async fn require_json_content_type(req: Request, next: Next) -> Result<Response, ApiError> {
    let request_id = RequestId::from_request(&req);
    let needs_body = matches!(req.method(), &Method::POST | &Method::PUT | &Method::PATCH);

    let has_body = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .is_some_and(|len| len > 0);

    if needs_body && has_body {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if !content_type.starts_with("application/json") {
            return Err(ApiError::new(
                ErrorCode::UnsupportedMediaType,
                "request body must be application/json",
                request_id,
            ));
        }
    }

    Ok(next.run(req).await)
}

/// Fails closed when the database is unreachable, rather than letting every
/// handler discover it independently via a failed query.
pub async fn require_healthy_database(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let request_id = RequestId::from_request(&req);
    if qcd_db::health_check(&state.pool).await.is_err() {
        return Err(ApiError::new(
            ErrorCode::DatabaseError,
            "the database is currently unavailable",
            request_id,
        )
        .with_suggestions(vec!["try again shortly".to_string()]));
    }
    Ok(next.run(req).await)
}

/// A fixed-window, in-memory token bucket keyed by client address. One
/// instance is shared across a route group; each route group's layer
/// supplies its own per-minute limit via [`RateLimitState`].
pub struct RateLimiter {
    windows: Mutex<HashMap<IpAddr, Window>>,
}

struct Window {
    count: u32,
    started_at: Instant,
}

const WINDOW: Duration = Duration::from_secs(60);

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        RateLimiter { windows: Mutex::new(HashMap::new()) }
    }

    /// Returns `true` if the caller is still within `limit_per_minute`,
    /// incrementing the counter as a side effect. Resets the window once a
    /// minute has elapsed since it started.
    fn allow(&self, addr: IpAddr, limit_per_minute: u32) -> bool {
        let mut windows = self.windows.lock().unwrap();
        let now = Instant::now();
        let entry = windows.entry(addr).or_insert_with(|| Window { count: 0, started_at: now });

        if now.duration_since(entry.started_at) >= WINDOW {
            entry.count = 0;
            entry.started_at = now;
        }

        if entry.count >= limit_per_minute {
            false
        } else {
            entry.count += 1;
            true
        }
    }
}

#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: std::sync::Arc<RateLimiter>,
    pub limit_per_minute: u32,
}

/// Per-route rate-limit middleware. Attach with a distinct [`RateLimitState`]
/// per route group via `.route_layer(middleware::from_fn_with_state(...))`
/// so each group enforces its own spec-mandated ceiling.
pub async fn enforce_rate_limit(
    State(limit_state): State<RateLimitState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let request_id = RequestId::from_request(&req);
    if limit_state.limiter.allow(addr.ip(), limit_state.limit_per_minute) {
        Ok(next.run(req).await)
    } else {
        Err(ApiError::new(
            ErrorCode::RateLimitError,
            format!("rate limit of {} requests/minute exceeded", limit_state.limit_per_minute),
            request_id,
        )
        .with_suggestions(vec!["wait a minute before retrying".to_string()]))
    }
}

/// Builds the shared security-header layer applied to every response:
/// a conservative default-deny content security policy, clickjacking and
/// MIME-sniffing protections.
#[must_use]
pub fn security_headers() -> tower_http::set_header::SetResponseHeaderLayer<HeaderValue> {
    tower_http::set_header::SetResponseHeaderLayer::if_not_present(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    )
}

#[must_use]
pub fn frame_options_header() -> tower_http::set_header::SetResponseHeaderLayer<HeaderValue> {
    tower_http::set_header::SetResponseHeaderLayer::if_not_present(
        header::HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    )
}

#[must_use]
pub fn content_security_policy_header() -> tower_http::set_header::SetResponseHeaderLayer<HeaderValue> {
    tower_http::set_header::SetResponseHeaderLayer::if_not_present(
        header::HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'none'"),
    )
}

pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
