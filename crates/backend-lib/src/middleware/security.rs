// ============================
// crates/backend-lib/src/middleware/security.rs
// ============================
//! Per-request security gate.
//!
//! Every request first has its client address checked against the block
//! list. Requests for the back office (everything under `/admin` except the
//! login route) then need a valid session, and admin-only sections need the
//! admin role. [`evaluate`] makes the decision; [`security_gate`] turns it
//! into a response.
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use basecamp_common::Role;
use metrics::counter;

use crate::audit::SecurityEventType;
use crate::auth::Session;
use crate::client::ClientInfo;
use crate::error::AppError;
use crate::metrics::BLOCKED_REQUEST;
use crate::AppState;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "basecamp_session";

pub const LOGIN_PATH: &str = "/admin/login";
pub const DASHBOARD_PATH: &str = "/admin/dashboard";

const ADMIN_PREFIX: &str = "/admin";
const STAFF_MANAGEMENT_PREFIX: &str = "/admin/staff";

/// Who may use a protected route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any signed-in back office user
    AnyStaff,
    /// Only `Role::Admin`
    AdminOnly,
}

impl Access {
    pub fn admits(self, role: Role) -> bool {
        match (self, role) {
            (Access::AnyStaff, Role::Admin | Role::Staff) => true,
            (Access::AdminOnly, Role::Admin) => true,
            (Access::AdminOnly, Role::Staff) => false,
        }
    }
}

/// How the gate treats a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Login,
    Protected(Access),
}

impl RouteClass {
    pub fn classify(path: &str) -> Self {
        if path == LOGIN_PATH {
            return RouteClass::Login;
        }
        if !is_under(path, ADMIN_PREFIX) {
            return RouteClass::Public;
        }
        if is_under(path, STAFF_MANAGEMENT_PREFIX) {
            RouteClass::Protected(Access::AdminOnly)
        } else {
            RouteClass::Protected(Access::AnyStaff)
        }
    }
}

fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Outcome of the gate for one request
#[derive(Debug)]
pub enum GateDecision {
    /// Continue to the handler; carries the session for protected routes
    Allow(Option<Session>),
    /// Send the client elsewhere (not signed in)
    Redirect(&'static str),
    /// Refuse outright
    Reject(AppError),
}

/// Decide what happens to a request for `path` from `client`
pub async fn evaluate(
    state: &AppState,
    path: &str,
    client: &ClientInfo,
    session_token: Option<&str>,
) -> GateDecision {
    if state.tracker.is_blocked(client.ip) {
        counter!(BLOCKED_REQUEST).increment(1);
        state.audit.record(
            SecurityEventType::BlockedIpAccess,
            format!("Blocked IP {} attempted access", client.ip),
            client,
        );
        return GateDecision::Reject(AppError::IpBlocked);
    }

    let access = match RouteClass::classify(path) {
        RouteClass::Public | RouteClass::Login => return GateDecision::Allow(None),
        RouteClass::Protected(access) => access,
    };

    state.audit.record(
        SecurityEventType::AdminAreaAccess,
        format!("Access to {path}"),
        client,
    );

    let session = match session_token {
        Some(token) => state.sessions.validate(token).await,
        None => None,
    };
    let Some(session) = session else {
        state.audit.record(
            SecurityEventType::UnauthorizedAdminAccess,
            format!("Unauthorized access to {path}"),
            client,
        );
        return GateDecision::Redirect(LOGIN_PATH);
    };

    if !access.admits(session.role) {
        state.audit.record(
            SecurityEventType::InsufficientPrivileges,
            format!("User {} tried to access {path}", session.username),
            client,
        );
        return GateDecision::Reject(AppError::Forbidden(format!(
            "{} role cannot access {path}",
            session.role
        )));
    }

    GateDecision::Allow(Some(session))
}

/// Middleware running [`evaluate`] before every handler
pub async fn security_gate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let client = ClientInfo::from_request(&request, state.settings.trust_proxy_headers);
    let jar = CookieJar::from_headers(request.headers());
    let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let path = request.uri().path().to_string();

    match evaluate(&state, &path, &client, token.as_deref()).await {
        GateDecision::Allow(session) => {
            request.extensions_mut().insert(client);
            if let Some(session) = session {
                request.extensions_mut().insert(session);
            }
            next.run(request).await
        }
        GateDecision::Redirect(to) => Redirect::to(to).into_response(),
        GateDecision::Reject(err) => err.into_response(),
    }
}
