//! HTTP handlers.
pub mod admin;
pub mod login;

/// Public landing page; the storefront proper is rendered elsewhere
pub async fn home() -> &'static str {
    "Bullet Basecamp"
}

/// Health check endpoint
pub async fn health() -> &'static str {
    "Healthy"
}
