//! Common test utilities for service tests
//!
//! Wires the auth services against an in-memory store, a recording mailer
//! and a manual clock, with cheap password hashing.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use projectcamp_shared::auth::password::PasswordParams;
use projectcamp_shared::clock::ManualClock;
use projectcamp_shared::mail::{token_from_link, MemoryMailer};
use projectcamp_shared::service::{AuthServices, AuthSettings, RegisterInput, Registration};
use projectcamp_shared::store::memory::MemoryStore;

pub const PASSWORD: &str = "Secret#123";
pub const TOKEN_PEPPER: &str = "service-test-token-pepper-that-is-long";

/// Test context containing the wired services and their collaborators
pub struct TestContext {
    pub services: AuthServices,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<MemoryMailer>,
    pub clock: Arc<ManualClock>,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(MemoryMailer::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
        ));

        let mut settings = AuthSettings::new(
            "service-test-jwt-secret-that-is-long",
            TOKEN_PEPPER,
            "https://camp.test",
        );
        settings.password = PasswordParams::low_cost();

        let services = AuthServices::new(
            settings,
            store.clone(),
            store.clone(),
            mailer.clone(),
            clock.clone(),
        );

        Self {
            services,
            store,
            mailer,
            clock,
        }
    }

    /// Registers `{username}@x.com` with [`PASSWORD`]
    pub async fn register(&self, username: &str) -> Registration {
        self.services
            .sessions
            .register(register_input(username))
            .await
            .expect("registration should succeed")
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

pub fn register_input(username: &str) -> RegisterInput {
    RegisterInput {
        email: format!("{username}@x.com"),
        username: username.to_string(),
        password: PASSWORD.to_string(),
        role: None,
        full_name: None,
    }
}
