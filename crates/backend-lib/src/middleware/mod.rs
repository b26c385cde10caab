// crates/backend-lib/src/middleware/mod.rs

//! Middleware for the Basecamp back office server.

pub mod rate_limit;
pub mod security;

pub use rate_limit::{login_rate_limit, SlidingWindowLimiter};
pub use security::{evaluate, security_gate, Access, GateDecision, RouteClass, SESSION_COOKIE};
