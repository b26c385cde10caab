// ================
// common/src/lib.rs
// ================
//! Common types shared between the Basecamp back office server and its
//! clients. These are the JSON/form payloads of the admin login flow.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Back office roles. The set is closed; every access decision matches on it
/// exhaustively.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored role string is not one of the known roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role `{}`", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Login form submitted to `POST /admin/login`
#[derive(Deserialize, Serialize, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// Keep the password out of debug output.
impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body returned on a successful login
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub status: String,
    pub username: String,
    pub role: Role,
}

/// Body returned by `GET /admin/session-check`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionCheckResponse {
    pub status: String,
    /// Seconds until the session expires without further activity
    pub time_remaining: u64,
}

/// Body returned by `GET /admin/dashboard`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub username: String,
    pub role: Role,
    pub login_time: DateTime<Utc>,
    pub active_sessions: usize,
}

/// One row of `GET /admin/staff`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StaffSummary {
    pub username: String,
    pub role: Role,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
}
