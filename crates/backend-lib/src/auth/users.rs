//! Staff account lookup used by the login flow.
use async_trait::async_trait;
use basecamp_common::{Role, StaffSummary};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::password::{
    generate_secure_password, hash_password_with_cost, validate_password_strength,
    PasswordRequirements,
};
use crate::config::Settings;

/// A back office account
#[derive(Debug, Clone)]
pub struct StaffAccount {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl StaffAccount {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            role,
            active: true,
            last_login: None,
        }
    }

    pub fn summary(&self) -> StaffSummary {
        StaffSummary {
            username: self.username.clone(),
            role: self.role,
            active: self.active,
            last_login: self.last_login,
        }
    }
}

/// Source of staff credentials. The relational store behind the storefront
/// implements this; the server ships with an in-memory directory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find(&self, username: &str) -> Option<StaffAccount>;
    async fn record_login(&self, username: &str, at: DateTime<Utc>);
    async fn list(&self) -> Vec<StaffAccount>;
}

/// In-memory [`UserDirectory`]
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    accounts: RwLock<HashMap<String, StaffAccount>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, account: StaffAccount) {
        self.accounts
            .write()
            .await
            .insert(account.username.clone(), account);
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find(&self, username: &str) -> Option<StaffAccount> {
        self.accounts.read().await.get(username).cloned()
    }

    async fn record_login(&self, username: &str, at: DateTime<Utc>) {
        if let Some(account) = self.accounts.write().await.get_mut(username) {
            account.last_login = Some(at);
        }
    }

    async fn list(&self) -> Vec<StaffAccount> {
        let mut accounts: Vec<_> = self.accounts.read().await.values().cloned().collect();
        accounts.sort_by(|a, b| a.username.cmp(&b.username));
        accounts
    }
}

/// Create the bootstrap admin account from settings.
///
/// A missing password is replaced by a generated one, which is logged once so
/// the operator can sign in.
pub async fn seed_admin(settings: &Settings, directory: &InMemoryDirectory) -> anyhow::Result<()> {
    let password = match settings.admin_password.clone() {
        Some(password) => {
            if !validate_password_strength(&password, &PasswordRequirements::default()) {
                warn!(
                    username = %settings.admin_username,
                    "configured admin password does not meet strength requirements"
                );
            }
            password
        }
        None => {
            let generated = generate_secure_password(16);
            warn!(
                username = %settings.admin_username,
                password = %generated,
                "no admin password configured, generated one"
            );
            generated
        }
    };

    let log_n = settings.password_hash_log_n;
    let hash = tokio::task::spawn_blocking(move || hash_password_with_cost(&password, log_n))
        .await??;

    directory
        .insert(StaffAccount::new(settings.admin_username.clone(), hash, Role::Admin))
        .await;
    info!(username = %settings.admin_username, "admin account ready");
    Ok(())
}
