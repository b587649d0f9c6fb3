//! Common test utilities for HTTP tests
//!
//! This module provides shared infrastructure for the route tests:
//! - App wired against an in-memory store, recording mailer and manual clock
//! - Request helpers that drive the router through `tower::Service`
//! - User registration and login helpers

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use projectcamp_api::app::{build_router, AppState};
use projectcamp_api::config::Config;
use projectcamp_shared::auth::password::PasswordParams;
use projectcamp_shared::clock::ManualClock;
use projectcamp_shared::mail::{token_from_link, MemoryMailer};
use projectcamp_shared::service::verification::RESET_PASSWORD_SUBJECT;
use projectcamp_shared::store::memory::MemoryStore;
use serde_json::{json, Value};
use tower::Service;
use uuid::Uuid;

pub const PASSWORD: &str = "Secret#123";

/// Test context containing the app and its collaborators
pub struct TestContext {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<MemoryMailer>,
    pub clock: Arc<ManualClock>,
}

/// Response with the parsed JSON body (`Null` when empty)
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `Set-Cookie` header values
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    /// Value of a cookie set by this response
    pub fn cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        self.set_cookies().into_iter().find_map(|cookie| {
            cookie
                .strip_prefix(&prefix)
                .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
        })
    }
}

/// Session of a logged-in test user
pub struct Session {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

/// How a request carries its access token
#[derive(Clone, Copy)]
pub enum Auth<'a> {
    None,
    Bearer(&'a str),
    Cookie(&'a str),
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(MemoryMailer::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
        ));

        let config = Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some("http-test-jwt-secret-that-is-long-enough".to_string()),
            "TOKEN_PEPPER" => Some("http-test-token-pepper-that-is-long-enough".to_string()),
            "PUBLIC_URL" => Some("https://camp.test".to_string()),
            _ => None,
        })
        .expect("test configuration should load");

        let mut settings = config.auth_settings();
        settings.password = PasswordParams::low_cost();

        let state = AppState::with_settings(
            config,
            settings,
            store.clone(),
            store.clone(),
            mailer.clone(),
            clock.clone(),
        );

        Self {
            app: build_router(state),
            store,
            mailer,
            clock,
        }
    }

    /// Sends a request, with an optional JSON body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        auth: Auth<'_>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        builder = match auth {
            Auth::None => builder,
            Auth::Bearer(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            Auth::Cookie(token) => builder.header(header::COOKIE, format!("accessToken={token}")),
        };

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request should build");

        self.send_request(request).await
    }

    /// Sends a prebuilt request
    pub async fn send_request(&self, request: Request<Body>) -> TestResponse {
        let mut app = self.app.clone();
        let response = app.call(request).await.expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, auth: Auth<'_>) -> TestResponse {
        self.send(Method::GET, uri, auth, None).await
    }

    pub async fn post(&self, uri: &str, auth: Auth<'_>, body: Value) -> TestResponse {
        self.send(Method::POST, uri, auth, Some(body)).await
    }

    /// Registers `{username}@x.com` with [`PASSWORD`] and returns the user id
    pub async fn register(&self, username: &str) -> Uuid {
        let response = self
            .post(
                "/v1/users/register",
                Auth::None,
                json!({
                    "email": format!("{username}@x.com"),
                    "username": username,
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        user_id(&response.body["user"])
    }

    pub async fn login(&self, login: &str, password: &str) -> TestResponse {
        self.post(
            "/v1/users/login",
            Auth::None,
            json!({ "login": login, "password": password }),
        )
        .await
    }

    /// Registers and logs in `username`
    pub async fn sign_up(&self, username: &str) -> Session {
        let user_id = self.register(username).await;
        let response = self.login(username, PASSWORD).await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);

        Session {
            user_id,
            access_token: response.body["access_token"]
                .as_str()
                .expect("access token")
                .to_string(),
            refresh_token: response.body["refresh_token"]
                .as_str()
                .expect("refresh token")
                .to_string(),
        }
    }

    /// Token from the most recent email sent to `to`
    pub async fn last_token_for(&self, to: &str) -> String {
        let email = self
            .mailer
            .last_to(to)
            .await
            .expect("an email should have been sent");
        token_from_link(&email.body)
            .expect("email should contain a link")
            .to_string()
    }
}

impl TestContext {
    /// Token from the reset email to `to`, yielding until the background
    /// delivery has run
    pub async fn reset_token_for(&self, to: &str) -> String {
        for _ in 0..100 {
            let reset = self
                .mailer
                .last_to(to)
                .await
                .filter(|email| email.subject == RESET_PASSWORD_SUBJECT);
            if let Some(email) = reset {
                return token_from_link(&email.body)
                    .expect("email should contain a link")
                    .to_string();
            }
            tokio::task::yield_now().await;
        }
        panic!("no password reset email sent to {to}");
    }
}

pub fn user_id(user: &Value) -> Uuid {
    user["id"]
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
        .expect("user id")
}
