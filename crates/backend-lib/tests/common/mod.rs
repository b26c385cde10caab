//! Test utilities for the back office integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    Router,
};
use basecamp_backend_lib::{
    audit::{AuditLog, MemorySink},
    auth::{hash_password_with_cost, InMemoryDirectory, StaffAccount},
    clock::ManualClock,
    config::Settings,
    router::create_router,
    AppState,
};
use basecamp_common::Role;
use tower::ServiceExt;

pub const ADMIN_PASSWORD: &str = "Basecamp2024xyz";
pub const STAFF_PASSWORD: &str = "Guide2024rides";

/// Everything a test needs to drive the router and inspect side effects
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<MemorySink>,
}

/// Build an app trusting `x-real-ip`, with one admin and one staff account
pub async fn setup_test_app() -> TestApp {
    let settings = Settings {
        trust_proxy_headers: true,
        password_hash_log_n: 4,
        ..Settings::default()
    };

    let directory = InMemoryDirectory::new();
    directory
        .insert(StaffAccount::new(
            "admin",
            hash_password_with_cost(ADMIN_PASSWORD, 4).unwrap(),
            Role::Admin,
        ))
        .await;
    directory
        .insert(StaffAccount::new(
            "rohan",
            hash_password_with_cost(STAFF_PASSWORD, 4).unwrap(),
            Role::Staff,
        ))
        .await;

    let clock = Arc::new(ManualClock::starting_now());
    let sink = Arc::new(MemorySink::new());
    let (audit, _writer) = AuditLog::spawn(sink.clone(), settings.audit_log_capacity);
    let state = Arc::new(AppState::with_clock(
        settings,
        Arc::new(directory),
        audit,
        clock.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        clock,
        sink,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// POST the login form from `ip`
    pub async fn login(&self, ip: &str, username: &str, password: &str) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri("/admin/login")
            .header("x-real-ip", ip)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("username={username}&password={password}")))
            .unwrap();
        self.send(request).await
    }

    /// GET `uri` from `ip`, optionally with a session cookie
    pub async fn get(&self, ip: &str, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri).header("x-real-ip", ip);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }
}

/// `name=value` of the session cookie set by a response
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("basecamp_session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
