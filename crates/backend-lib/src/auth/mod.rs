// ============================
// basecamp-backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.
pub mod password;
pub mod service;
pub mod session;
pub mod token;
pub mod tracker;
pub mod users;

pub use password::{
    generate_secure_password, hash_password, hash_password_with_cost, validate_password_strength,
    verify_password, PasswordRequirements, MIN_PASSWORD_LENGTH,
};
pub use service::{AuthService, DefaultAuth};
pub use session::{Session, SessionManager};
pub use token::generate_secure_token;
pub use tracker::{FailureOutcome, LoginTracker, TrackerPolicy};
pub use users::{seed_admin, InMemoryDirectory, StaffAccount, UserDirectory};
