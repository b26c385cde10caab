// =============
// crates/backend-lib/src/auth/service.rs
// =============
//! Login and logout flow on top of the tracker, directory and session store.
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use tracing::{error, info};
use zeroize::Zeroizing;

use super::{
    password::{hash_password_with_cost, verify_password},
    LoginTracker, Session, SessionManager, UserDirectory,
};
use crate::audit::{AuditLog, SecurityEventType};
use crate::client::ClientInfo;
use crate::error::AppError;
use crate::metrics::LOGIN_SUCCEEDED;

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Check credentials and open a session
    async fn login(
        &self,
        username: &str,
        password: Zeroizing<String>,
        client: &ClientInfo,
    ) -> Result<Session, AppError>;

    /// Close the session behind `token`, if any
    async fn logout(&self, token: &str, client: &ClientInfo) -> Option<Session>;
}

pub struct DefaultAuth {
    users: Arc<dyn UserDirectory>,
    sessions: SessionManager,
    tracker: LoginTracker,
    audit: AuditLog,
    /// scrypt cost spent on unknown usernames
    hash_cost: u8,
}

impl DefaultAuth {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sessions: SessionManager,
        tracker: LoginTracker,
        audit: AuditLog,
        hash_cost: u8,
    ) -> Self {
        Self {
            users,
            sessions,
            tracker,
            audit,
            hash_cost,
        }
    }

    async fn check_credentials(&self, username: &str, password: Zeroizing<String>) -> Option<super::StaffAccount> {
        let Some(account) = self.users.find(username).await.filter(|a| a.active) else {
            // Same scrypt work as a real check so timing does not reveal the username.
            let log_n = self.hash_cost;
            if let Err(e) = tokio::task::spawn_blocking(move || hash_password_with_cost(&password, log_n)).await {
                error!(error = %e, "password hashing task failed");
            }
            return None;
        };
        let hash = account.password_hash.clone();

        // scrypt is deliberately expensive; keep it off the async workers.
        let verified = tokio::task::spawn_blocking(move || verify_password(&hash, &password))
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "password verification task failed");
                false
            });

        verified.then_some(account)
    }

    fn reject(&self, username: &str, client: &ClientInfo) -> AppError {
        let outcome = self.tracker.record_failed_login(client.ip, username);
        self.audit.record(
            SecurityEventType::FailedLogin,
            format!("Failed login attempt for username {username}"),
            client,
        );
        if outcome.blocked_until.is_some() {
            self.audit.record(
                SecurityEventType::IpBlocked,
                format!(
                    "IP {} blocked for {} failed login attempts",
                    client.ip, outcome.attempts
                ),
                client,
            );
        }

        AppError::InvalidCredentials {
            remaining_attempts: self
                .tracker
                .policy()
                .max_attempts
                .saturating_sub(outcome.attempts),
        }
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    async fn login(
        &self,
        username: &str,
        password: Zeroizing<String>,
        client: &ClientInfo,
    ) -> Result<Session, AppError> {
        if self.tracker.is_blocked(client.ip) {
            self.audit.record(
                SecurityEventType::BlockedLoginAttempt,
                format!("Blocked IP {} tried to login", client.ip),
                client,
            );
            return Err(AppError::IpBlocked);
        }

        let Some(account) = self.check_credentials(username, password).await else {
            return Err(self.reject(username, client));
        };

        self.tracker.clear_failed_attempts(client.ip);
        let session = self
            .sessions
            .create_session(&account.username, account.role)
            .await;
        self.users
            .record_login(&account.username, session.login_time)
            .await;

        counter!(LOGIN_SUCCEEDED).increment(1);
        self.audit.record(
            SecurityEventType::SuccessfulLogin,
            format!("User {} logged in successfully", account.username),
            client,
        );
        Ok(session)
    }

    async fn logout(&self, token: &str, client: &ClientInfo) -> Option<Session> {
        let session = self.sessions.destroy(token).await?;
        info!(username = %session.username, "logged out");
        self.audit.record(
            SecurityEventType::Logout,
            format!("User {} logged out", session.username),
            client,
        );
        Some(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemorySink;
    use crate::auth::{hash_password_with_cost, InMemoryDirectory, StaffAccount, TrackerPolicy};
    use crate::clock::ManualClock;
    use basecamp_common::Role;
    use chrono::TimeDelta;
    use std::net::{IpAddr, Ipv4Addr};

    const TEST_LOG_N: u8 = 4;

    struct Fixture {
        auth: DefaultAuth,
        tracker: LoginTracker,
        sink: Arc<MemorySink>,
        audit: AuditLog,
    }

    async fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::starting_now());
        let directory = InMemoryDirectory::new();
        directory
            .insert(StaffAccount::new(
                "admin",
                hash_password_with_cost("Basecamp2024xyz", TEST_LOG_N).unwrap(),
                Role::Admin,
            ))
            .await;
        let mut retired = StaffAccount::new(
            "retired",
            hash_password_with_cost("Basecamp2024xyz", TEST_LOG_N).unwrap(),
            Role::Staff,
        );
        retired.active = false;
        directory.insert(retired).await;

        let sink = Arc::new(MemorySink::new());
        let (audit, _writer) = AuditLog::spawn(sink.clone(), 1000);
        let tracker = LoginTracker::new(TrackerPolicy::default(), clock.clone());
        let sessions = SessionManager::new(TimeDelta::seconds(1800), clock);
        let auth = DefaultAuth::new(
            Arc::new(directory),
            sessions,
            tracker.clone(),
            audit.clone(),
            TEST_LOG_N,
        );

        Fixture {
            auth,
            tracker,
            sink,
            audit,
        }
    }

    fn client() -> ClientInfo {
        ClientInfo::new(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), "test")
    }

    fn pwd(p: &str) -> Zeroizing<String> {
        Zeroizing::new(p.to_string())
    }

    #[tokio::test]
    async fn test_successful_login_clears_failures() {
        let f = fixture().await;
        let err = f.auth.login("admin", pwd("wrong"), &client()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials { remaining_attempts: 4 }));

        let session = f.auth.login("admin", pwd("Basecamp2024xyz"), &client()).await.unwrap();
        assert_eq!(session.username, "admin");
        assert_eq!(session.role, Role::Admin);
        assert_eq!(f.tracker.failed_attempt_count(client().ip), 0);

        f.audit.flush().await;
        assert_eq!(f.sink.count(SecurityEventType::FailedLogin), 1);
        assert_eq!(f.sink.count(SecurityEventType::SuccessfulLogin), 1);
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_users_fail() {
        let f = fixture().await;
        assert!(f.auth.login("nobody", pwd("Basecamp2024xyz"), &client()).await.is_err());
        assert!(f.auth.login("retired", pwd("Basecamp2024xyz"), &client()).await.is_err());
        assert_eq!(f.tracker.failed_attempt_count(client().ip), 2);
    }

    #[tokio::test]
    async fn test_unknown_user_costs_a_hash() {
        const SLOW_LOG_N: u8 = 12;
        let clock = Arc::new(ManualClock::starting_now());
        let directory = InMemoryDirectory::new();
        directory
            .insert(StaffAccount::new(
                "admin",
                hash_password_with_cost("Basecamp2024xyz", SLOW_LOG_N).unwrap(),
                Role::Admin,
            ))
            .await;
        let (audit, _writer) = AuditLog::spawn(Arc::new(MemorySink::new()), 1000);
        let auth = DefaultAuth::new(
            Arc::new(directory),
            SessionManager::new(TimeDelta::seconds(1800), clock.clone()),
            LoginTracker::new(TrackerPolicy::default(), clock),
            audit,
            SLOW_LOG_N,
        );

        let started = std::time::Instant::now();
        assert!(auth.login("admin", pwd("wrong"), &client()).await.is_err());
        let known = started.elapsed();

        let started = std::time::Instant::now();
        assert!(auth.login("nobody", pwd("wrong"), &client()).await.is_err());
        let unknown = started.elapsed();

        assert!(unknown * 4 >= known, "unknown {unknown:?} vs known {known:?}");
    }

    #[tokio::test]
    async fn test_blocked_address_cannot_login() {
        let f = fixture().await;
        for remaining in (0..5).rev() {
            let err = f.auth.login("admin", pwd("guess"), &client()).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidCredentials { remaining_attempts } if remaining_attempts == remaining));
        }

        let err = f
            .auth
            .login("admin", pwd("Basecamp2024xyz"), &client())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IpBlocked));

        f.audit.flush().await;
        assert_eq!(f.sink.count(SecurityEventType::IpBlocked), 1);
        assert_eq!(f.sink.count(SecurityEventType::BlockedLoginAttempt), 1);
    }

    #[tokio::test]
    async fn test_logout() {
        let f = fixture().await;
        let session = f.auth.login("admin", pwd("Basecamp2024xyz"), &client()).await.unwrap();

        let closed = f.auth.logout(&session.token, &client()).await.unwrap();
        assert_eq!(closed.username, "admin");
        assert!(f.auth.logout(&session.token, &client()).await.is_none());
    }
}
