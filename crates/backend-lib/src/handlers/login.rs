//! Sign-in and sign-out.
use std::sync::Arc;

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use basecamp_common::{LoginRequest, LoginResponse};
use zeroize::Zeroizing;

use crate::auth::Session;
use crate::client::ClientInfo;
use crate::error::AppError;
use crate::middleware::security::{DASHBOARD_PATH, SESSION_COOKIE};
use crate::AppState;

const MAX_USERNAME_LEN: usize = 80;
const MAX_PASSWORD_LEN: usize = 256;

/// `GET /admin/login`
pub async fn login_page(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if state.sessions.is_valid(cookie.value()).await {
            return Redirect::to(DASHBOARD_PATH).into_response();
        }
    }
    "Please log in to access the back office.".into_response()
}

/// `POST /admin/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    Extension(client): Extension<ClientInfo>,
    jar: CookieJar,
    Form(form): Form<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let LoginRequest { username, password } = form;
    let password = Zeroizing::new(password);
    let username = username.trim();

    if username.is_empty() || password.is_empty() {
        return Err(AppError::InvalidInput(
            "username and password are required".to_string(),
        ));
    }
    if username.len() > MAX_USERNAME_LEN || password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::InvalidInput("credentials too long".to_string()));
    }

    let session = state.auth.login(username, password, &client).await?;
    let cookie = Cookie::build((SESSION_COOKIE, session.token.clone()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(state.settings.secure_cookies)
        .path("/");

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            status: "ok".to_string(),
            username: session.username,
            role: session.role,
        }),
    ))
}

/// `GET /admin/logout`
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(client): Extension<ClientInfo>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    state.auth.logout(&session.token, &client).await;
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::to("/"),
    )
}
