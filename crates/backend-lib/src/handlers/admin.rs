//! Protected back office endpoints. The security gate has already validated
//! the session and attached it to the request.
use std::sync::Arc;

use axum::{
    extract::State,
    response::Redirect,
    Extension, Json,
};
use basecamp_common::{DashboardView, SessionCheckResponse, StaffSummary};

use crate::auth::Session;
use crate::middleware::security::DASHBOARD_PATH;
use crate::AppState;

pub async fn admin_index() -> Redirect {
    Redirect::to(DASHBOARD_PATH)
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Json<DashboardView> {
    Json(DashboardView {
        username: session.username,
        role: session.role,
        login_time: session.login_time,
        active_sessions: state.sessions.active_count().await,
    })
}

/// Lets the admin UI warn before the idle timeout hits
pub async fn session_check(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Json<SessionCheckResponse> {
    Json(SessionCheckResponse {
        status: "valid".to_string(),
        time_remaining: state.sessions.time_remaining(&session),
    })
}

pub async fn staff(State(state): State<Arc<AppState>>) -> Json<Vec<StaffSummary>> {
    let accounts = state.users.list().await;
    Json(accounts.iter().map(|a| a.summary()).collect())
}
