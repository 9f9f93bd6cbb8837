//! Per-user fixed-window rate limiter middleware.
//!
//! Each authenticated user gets `max_per_sec` requests per wall-clock
//! second. Requests without an [`AuthenticatedUser`] share one bucket.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Extension, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use tanya_core::types::AuthenticatedUser;

#[derive(Debug, Clone, Copy)]
struct Window {
    second: u64,
    count: u64,
}

/// Shared state for the rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    max_per_sec: u64,
    windows: Arc<Mutex<HashMap<Option<Uuid>, Window>>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_per_sec` requests per second per user.
    /// Zero disables limiting.
    pub fn new(max_per_sec: u64) -> Self {
        Self {
            max_per_sec,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Try to take a permit for `user` at epoch second `now`.
    pub fn try_acquire_at(&self, user: Option<Uuid>, now: u64) -> bool {
        if self.max_per_sec == 0 {
            return true;
        }
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        // Stale windows can never block again.
        windows.retain(|_, w| w.second == now);

        let window = windows.entry(user).or_insert(Window {
            second: now,
            count: 0,
        });
        if window.count >= self.max_per_sec {
            return false;
        }
        window.count += 1;
        true
    }

    fn try_acquire(&self, user: Option<Uuid>) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.try_acquire_at(user, now)
    }
}

/// Axum middleware that enforces the rate limit.
pub async fn rate_limit_middleware(
    Extension(limiter): Extension<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let user = req
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| u.user_id);

    if limiter.try_acquire(user) {
        next.run(req).await
    } else {
        tracing::warn!(user_id = ?user, "Rate limit exceeded");
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "too_many_requests",
                "message": "Rate limit exceeded"
            })),
        )
            .into_response()
    }
}
