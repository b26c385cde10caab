// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const LOGIN_SUCCEEDED: &str = "login.succeeded";
pub const LOGIN_FAILED: &str = "login.failed";
pub const LOGIN_RATE_LIMITED: &str = "login.rate_limited";
pub const IP_BLOCKED: &str = "ip.blocked";
pub const BLOCKED_REQUEST: &str = "ip.blocked_request";
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const SESSION_ACTIVE: &str = "session.active";
pub const AUDIT_DROPPED: &str = "audit.dropped";
pub const AUDIT_WRITE_FAILED: &str = "audit.write_failed";
