// ============================
// crates/backend-lib/src/router.rs
// ============================
//! HTTP router for the back office.
use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::{self, admin, login};
use crate::middleware::{login_rate_limit, security_gate};
use crate::AppState;

/// Create the application router. The security gate wraps every route; the
/// login route additionally carries the per-minute limiter.
pub fn create_router(state: Arc<AppState>) -> Router {
    let login_routes = get(login::login_page)
        .post(login::login)
        .layer(from_fn_with_state(state.clone(), login_rate_limit));

    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health))
        .route("/admin", get(admin::admin_index))
        .route("/admin/login", login_routes)
        .route("/admin/logout", get(login::logout))
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/session-check", get(admin::session_check))
        .route("/admin/staff", get(admin::staff))
        .layer(from_fn_with_state(state.clone(), security_gate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
