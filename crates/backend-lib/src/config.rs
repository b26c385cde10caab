// ============================
// basecamp-backend-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Sources, lowest precedence first: built-in defaults, a TOML file, the
//! legacy environment names (`MAX_LOGIN_ATTEMPTS`, `BLOCK_DURATION`,
//! `SESSION_TIMEOUT`, `RATE_LIMIT_PER_MINUTE`, `ADMIN_USERNAME`,
//! `ADMIN_PASSWORD`), then `BASECAMP_*` variables named after the fields.
use anyhow::{bail, Result};
use chrono::TimeDelta;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::auth::tracker::TrackerPolicy;

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Upper bound for the block duration and the session timeout (one year)
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Output format of the process log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
    pub log_format: LogFormat,
    /// Take the client address from `x-real-ip` / `x-forwarded-for`
    pub trust_proxy_headers: bool,
    /// Mark the session cookie `Secure`
    pub secure_cookies: bool,
    /// Failed logins inside the window before an address is blocked
    pub max_login_attempts: u32,
    /// How long a blocked address stays blocked
    pub block_duration_secs: u64,
    /// Idle timeout of a back office session
    pub session_timeout_secs: u64,
    /// Requests per minute per address accepted by the login route
    pub login_rate_limit_per_minute: u32,
    /// Security event log file
    pub audit_log_path: PathBuf,
    /// Events retained by the security event log
    pub audit_log_capacity: usize,
    pub admin_username: String,
    /// Bootstrap admin password; generated at startup when unset
    pub admin_password: Option<String>,
    /// scrypt cost (log2 of N) for new password hashes
    pub password_hash_log_n: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            trust_proxy_headers: false,
            secure_cookies: false,
            max_login_attempts: 5,
            block_duration_secs: 30 * 60,
            session_timeout_secs: 30 * 60,
            login_rate_limit_per_minute: 20,
            audit_log_path: PathBuf::from("logs/security_events.json"),
            audit_log_capacity: 1000,
            admin_username: "admin".to_string(),
            admin_password: None,
            password_hash_log_n: scrypt::Params::RECOMMENDED_LOG_N,
        }
    }
}

impl Settings {
    /// Load settings from a specific config file. A missing file is not an
    /// error; the other sources still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings: Settings = Self::figment(path.as_ref()).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(legacy_env())
            .merge(Env::prefixed("BASECAMP_"))
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            bail!("invalid log level `{}`", self.log_level);
        }
        if self.max_login_attempts == 0 {
            bail!("max_login_attempts must be at least 1");
        }
        if self.block_duration_secs == 0 || self.block_duration_secs > MAX_DURATION_SECS {
            bail!("block_duration_secs must be between 1 and {MAX_DURATION_SECS}");
        }
        if self.session_timeout_secs == 0 || self.session_timeout_secs > MAX_DURATION_SECS {
            bail!("session_timeout_secs must be between 1 and {MAX_DURATION_SECS}");
        }
        if self.login_rate_limit_per_minute == 0 {
            bail!("login_rate_limit_per_minute must be at least 1");
        }
        if self.audit_log_capacity == 0 {
            bail!("audit_log_capacity must be at least 1");
        }
        if self.admin_username.trim().is_empty() {
            bail!("admin_username must not be empty");
        }
        if self.password_hash_log_n == 0 || self.password_hash_log_n >= 64 {
            bail!("password_hash_log_n must be between 1 and 63");
        }
        Ok(())
    }

    pub fn session_timeout(&self) -> TimeDelta {
        seconds(self.session_timeout_secs)
    }

    pub fn tracker_policy(&self) -> TrackerPolicy {
        TrackerPolicy {
            max_attempts: self.max_login_attempts,
            block_duration: seconds(self.block_duration_secs),
            ..TrackerPolicy::default()
        }
    }
}

fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// Environment names used by earlier deployments, mapped onto field names
fn legacy_env() -> Env {
    Env::raw()
        .only(&[
            "MAX_LOGIN_ATTEMPTS",
            "BLOCK_DURATION",
            "SESSION_TIMEOUT",
            "RATE_LIMIT_PER_MINUTE",
            "ADMIN_USERNAME",
            "ADMIN_PASSWORD",
        ])
        .map(|key| {
            if key == "BLOCK_DURATION" {
                "block_duration_secs".into()
            } else if key == "SESSION_TIMEOUT" {
                "session_timeout_secs".into()
            } else if key == "RATE_LIMIT_PER_MINUTE" {
                "login_rate_limit_per_minute".into()
            } else {
                key.as_str().to_ascii_lowercase().into()
            }
        })
}
