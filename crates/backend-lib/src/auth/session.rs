// ============================
// basecamp-backend-lib/src/auth/session.rs
// ============================
//! Server-side sessions with a sliding idle timeout.
use basecamp_common::Role;
use chrono::{DateTime, TimeDelta, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::info;

use super::token::generate_secure_token;
use crate::clock::{Clock, SystemClock};
use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_EXPIRED};

/// Default idle timeout (30 minutes)
pub const DEFAULT_SESSION_TIMEOUT_SECS: i64 = 30 * 60;

/// An authenticated back office session
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    #[serde(skip_serializing)]
    pub token: String,
    pub username: String,
    pub role: Role,
    pub login_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Session store. Expiry is measured from the last validated request, not
/// from login.
#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    timeout: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(
            TimeDelta::seconds(DEFAULT_SESSION_TIMEOUT_SECS),
            Arc::new(SystemClock),
        )
    }
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(timeout: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            timeout,
            clock,
        }
    }

    pub fn timeout(&self) -> TimeDelta {
        self.timeout
    }

    /// Create a session for a freshly authenticated user
    pub async fn create_session(&self, username: &str, role: Role) -> Session {
        let now = self.clock.now();
        let session = Session {
            token: generate_secure_token(),
            username: username.to_string(),
            role,
            login_time: now,
            last_activity: now,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.token.clone(), session.clone());

        counter!(SESSION_CREATED).increment(1);
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
        info!(target: "security", username, %role, "session created");

        session
    }

    /// Validate a token and refresh its activity timestamp.
    ///
    /// Returns `None` for unknown tokens and for sessions idle longer than the
    /// timeout; the latter are destroyed.
    pub async fn validate(&self, token: &str) -> Option<Session> {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;

        let expired = now - sessions.get(token)?.last_activity > self.timeout;
        if expired {
            let session = sessions.remove(token)?;
            gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
            drop(sessions);

            counter!(SESSION_EXPIRED).increment(1);
            info!(target: "security", username = %session.username, "session expired");
            return None;
        }

        let session = sessions.get_mut(token)?;
        session.last_activity = now;
        Some(session.clone())
    }

    /// Whether the token names a live session (refreshes it)
    pub async fn is_valid(&self, token: &str) -> bool {
        self.validate(token).await.is_some()
    }

    /// Look up a session without touching its activity timestamp
    pub async fn get(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(token).cloned()
    }

    /// Destroy a session
    pub async fn destroy(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(token);
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
        drop(sessions);

        let username = removed
            .as_ref()
            .map_or("unknown", |session| session.username.as_str());
        info!(target: "security", username, "session destroyed");
        removed
    }

    /// Seconds left before the session idles out
    pub fn time_remaining(&self, session: &Session) -> u64 {
        let remaining = self.timeout - (self.clock.now() - session.last_activity);
        u64::try_from(remaining.num_seconds()).unwrap_or(0)
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove every session past its idle timeout
    pub async fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let timeout = self.timeout;

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| now - session.last_activity <= timeout);
        let removed = before - sessions.len();

        if removed > 0 {
            counter!(SESSION_EXPIRED).increment(removed as u64);
            gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const TIMEOUT: i64 = DEFAULT_SESSION_TIMEOUT_SECS;

    fn manager() -> (SessionManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let manager = SessionManager::new(TimeDelta::seconds(TIMEOUT), clock.clone());
        (manager, clock)
    }

    #[tokio::test]
    async fn test_create_and_validate() {
        let (manager, _clock) = manager();
        let session = manager.create_session("raju", Role::Admin).await;

        assert_eq!(session.login_time, session.last_activity);
        let validated = manager.validate(&session.token).await.unwrap();
        assert_eq!(validated.username, "raju");
        assert_eq!(validated.role, Role::Admin);

        assert!(manager.validate("not-a-token").await.is_none());
    }

    #[tokio::test]
    async fn test_session_idles_out() {
        let (manager, clock) = manager();
        let session = manager.create_session("rohan", Role::Staff).await;

        clock.advance_secs(TIMEOUT + 1);
        assert!(!manager.is_valid(&session.token).await);
        // Expired sessions are destroyed, not just rejected.
        assert!(manager.get(&session.token).await.is_none());
        assert_eq!(manager.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_valid_just_before_timeout() {
        let (manager, clock) = manager();
        let session = manager.create_session("rohan", Role::Staff).await;

        clock.advance_secs(TIMEOUT - 1);
        assert!(manager.is_valid(&session.token).await);
    }

    #[tokio::test]
    async fn test_activity_slides_the_window() {
        let (manager, clock) = manager();
        let session = manager.create_session("bobby", Role::Staff).await;

        clock.advance_secs(TIMEOUT - 1);
        assert!(manager.is_valid(&session.token).await);

        // T0 + 2 * timeout - 2
        clock.advance_secs(TIMEOUT - 1);
        assert!(manager.is_valid(&session.token).await);

        let refreshed = manager.get(&session.token).await.unwrap();
        assert_eq!(refreshed.login_time, session.login_time);
        assert!(refreshed.last_activity > session.last_activity);
    }

    #[tokio::test]
    async fn test_destroy() {
        let (manager, _clock) = manager();
        let session = manager.create_session("raju", Role::Admin).await;

        let destroyed = manager.destroy(&session.token).await.unwrap();
        assert_eq!(destroyed.username, "raju");
        assert!(!manager.is_valid(&session.token).await);
        assert!(manager.destroy(&session.token).await.is_none());
    }

    #[tokio::test]
    async fn test_time_remaining() {
        let (manager, clock) = manager();
        let session = manager.create_session("raju", Role::Admin).await;
        assert_eq!(manager.time_remaining(&session), TIMEOUT as u64);

        clock.advance_secs(600);
        assert_eq!(manager.time_remaining(&session), (TIMEOUT - 600) as u64);

        clock.advance_secs(TIMEOUT);
        assert_eq!(manager.time_remaining(&session), 0);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let (manager, clock) = manager();
        let stale = manager.create_session("stale", Role::Staff).await;
        clock.advance_secs(TIMEOUT - 10);
        let fresh = manager.create_session("fresh", Role::Staff).await;

        clock.advance_secs(20);
        assert_eq!(manager.cleanup_expired().await, 1);
        assert!(manager.get(&stale.token).await.is_none());
        assert!(manager.get(&fresh.token).await.is_some());
    }
}
