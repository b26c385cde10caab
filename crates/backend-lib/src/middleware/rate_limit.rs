// ============================
// crates/backend-lib/src/middleware/rate_limit.rs
// ============================
//! Per-address sliding-window limiter for the login route.
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use metrics::counter;

use crate::audit::SecurityEventType;
use crate::client::ClientInfo;
use crate::clock::Clock;
use crate::error::AppError;
use crate::metrics::LOGIN_RATE_LIMITED;
use crate::AppState;

/// Allows at most `max_requests` per address in any trailing `window`
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    hits: DashMap<IpAddr, VecDeque<DateTime<Utc>>>,
    max_requests: u32,
    window: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: u32, window: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            hits: DashMap::new(),
            max_requests,
            window,
            clock,
        }
    }

    /// `max_requests` per minute
    pub fn per_minute(max_requests: u32, clock: Arc<dyn Clock>) -> Self {
        Self::new(max_requests, TimeDelta::minutes(1), clock)
    }

    /// Count a request; `false` when the address is over its budget.
    /// Rejected requests do not consume budget.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = self.clock.now();
        let mut hits = self.hits.entry(ip).or_default();

        while hits.front().is_some_and(|t| now - *t >= self.window) {
            hits.pop_front();
        }

        if hits.len() >= self.max_requests as usize {
            return false;
        }
        hits.push_back(now);
        true
    }

    /// Drop addresses with no hits inside the window
    pub fn cleanup(&self) {
        let now = self.clock.now();
        let window = self.window;
        self.hits
            .retain(|_, hits| hits.back().is_some_and(|t| now - *t < window));
    }
}

/// Middleware applying the login limiter
pub async fn login_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = request
        .extensions()
        .get::<ClientInfo>()
        .cloned()
        .unwrap_or_else(|| ClientInfo::from_request(&request, state.settings.trust_proxy_headers));

    if !state.login_limiter.check(client.ip) {
        counter!(LOGIN_RATE_LIMITED).increment(1);
        state.audit.record(
            SecurityEventType::LoginRateLimited,
            format!("Login rate limit exceeded for {}", client.ip),
            &client,
        );
        return Err(AppError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}
