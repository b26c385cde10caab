// ============================
// basecamp-backend-lib/src/lib.rs
// ============================
//! Session, authentication and rate-limiting core of the Basecamp back office.

pub mod audit;
pub mod auth;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;

use std::sync::Arc;

use crate::audit::AuditLog;
use crate::auth::{AuthService, DefaultAuth, LoginTracker, SessionManager, UserDirectory};
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::middleware::SlidingWindowLimiter;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Login/logout flow
    pub auth: Arc<dyn AuthService>,
    /// Session store
    pub sessions: SessionManager,
    /// Failed-login tracker and IP block list
    pub tracker: LoginTracker,
    /// Per-minute limiter for the login route
    pub login_limiter: Arc<SlidingWindowLimiter>,
    /// Staff accounts
    pub users: Arc<dyn UserDirectory>,
    /// Security event log
    pub audit: AuditLog,
    /// Settings the state was built from
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Create a new application state on the wall clock
    pub fn new(settings: Settings, users: Arc<dyn UserDirectory>, audit: AuditLog) -> Self {
        Self::with_clock(settings, users, audit, Arc::new(SystemClock))
    }

    /// Create a new application state on an explicit time source
    pub fn with_clock(
        settings: Settings,
        users: Arc<dyn UserDirectory>,
        audit: AuditLog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions = SessionManager::new(settings.session_timeout(), clock.clone());
        let tracker = LoginTracker::new(settings.tracker_policy(), clock.clone());
        let login_limiter = Arc::new(SlidingWindowLimiter::per_minute(
            settings.login_rate_limit_per_minute,
            clock,
        ));
        let auth = Arc::new(DefaultAuth::new(
            users.clone(),
            sessions.clone(),
            tracker.clone(),
            audit.clone(),
            settings.password_hash_log_n,
        ));

        Self {
            auth,
            sessions,
            tracker,
            login_limiter,
            users,
            audit,
            settings: Arc::new(settings),
        }
    }
}
