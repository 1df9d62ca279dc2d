// src/rate_limit.rs

use actix_web::HttpRequest;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        RateLimitConfig { max_requests, window }
    }
}

/// Plugin API: 100 requests per minute per client.
pub const PLUGIN_LIMIT: RateLimitConfig = RateLimitConfig::new(100, Duration::from_secs(60));

/// Password reset / verification resend: 5 requests per 15 minutes.
pub const AUTH_EMAIL_LIMIT: RateLimitConfig = RateLimitConfig::new(5, Duration::from_secs(15 * 60));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix milliseconds at which the current window ends.
    pub reset_at_ms: i64,
}

struct Window {
    count: u32,
    started_at: Instant,
    reset_at_ms: i64,
}

/// Fixed-window counter keyed by client identifier.
#[derive(Clone, Default)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, identifier: &str, config: RateLimitConfig) -> RateLimitDecision {
        let mut windows = self.windows.lock();
        let now = Instant::now();

        let window = windows
            .entry(identifier.to_string())
            .or_insert_with(|| fresh_window(now, config.window));
        if now.duration_since(window.started_at) >= config.window {
            *window = fresh_window(now, config.window);
        }

        if window.count >= config.max_requests {
            return RateLimitDecision {
                allowed: false,
                limit: config.max_requests,
                remaining: 0,
                reset_at_ms: window.reset_at_ms,
            };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            limit: config.max_requests,
            remaining: config.max_requests - window.count,
            reset_at_ms: window.reset_at_ms,
        }
    }

    /// Drops windows that ended more than `max_window` ago.
    pub fn purge_expired(&self, max_window: Duration) {
        let now = Instant::now();
        self.windows
            .lock()
            .retain(|_, w| now.duration_since(w.started_at) < max_window);
    }
}

fn fresh_window(now: Instant, length: Duration) -> Window {
    let epoch_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default();
    Window {
        count: 0,
        started_at: now,
        reset_at_ms: epoch_ms + length.as_millis() as i64,
    }
}

/// First `X-Forwarded-For` hop, else `X-Real-IP`, else `"unknown"`.
pub fn client_identifier(req: &HttpRequest) -> String {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    header("x-real-ip")
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}
