/// Transport-independent auth services
///
/// [`AuthServices::new`] wires the token codecs, stores, mailer and clock into
/// three cooperating services:
///
/// - [`session::SessionService`]: register, login, logout, refresh, current user, change password
/// - [`verification::VerificationService`]: email verification and password reset
/// - [`crate::auth::gate::AccessGate`]: authentication and project authorization
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use projectcamp_shared::clock::SystemClock;
/// use projectcamp_shared::mail::LogMailer;
/// use projectcamp_shared::service::{AuthServices, AuthSettings};
/// use projectcamp_shared::store::memory::MemoryStore;
///
/// let store = Arc::new(MemoryStore::new());
/// let services = AuthServices::new(
///     AuthSettings::new(
///         "jwt-secret-that-is-at-least-32-bytes",
///         "token-pepper-that-is-at-least-32-byte",
///         "http://localhost:8080",
///     ),
///     store.clone(),
///     store,
///     Arc::new(LogMailer),
///     Arc::new(SystemClock),
/// );
/// # let _ = services;
/// ```

use std::sync::Arc;

use chrono::Duration;

use crate::auth::gate::AccessGate;
use crate::auth::jwt::TokenCodec;
use crate::auth::one_time::OneTimeTokenIssuer;
use crate::auth::password::PasswordParams;
use crate::clock::Clock;
use crate::mail::Mailer;
use crate::store::{MembershipStore, UserStore};

pub mod session;
pub mod verification;

pub use session::{LoginOutcome, RegisterInput, Registration, SessionService};
pub use verification::VerificationService;

/// Secrets, lifetimes and cost parameters for the auth services
#[derive(Clone)]
pub struct AuthSettings {
    /// HS256 signing secret for session tokens
    pub jwt_secret: String,

    /// HMAC key for one-time token digests
    pub token_pepper: String,

    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub one_time_ttl: Duration,

    /// Base URL for links sent by email, without a trailing slash
    pub public_url: String,

    pub password: PasswordParams,
}

impl AuthSettings {
    /// Settings with the default lifetimes: 15 minutes, 10 days, 20 minutes
    pub fn new(
        jwt_secret: impl Into<String>,
        token_pepper: impl Into<String>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_pepper: token_pepper.into(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(10),
            one_time_ttl: Duration::minutes(20),
            public_url: public_url.into().trim_end_matches('/').to_string(),
            password: PasswordParams::default(),
        }
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"***")
            .field("token_pepper", &"***")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("one_time_ttl", &self.one_time_ttl)
            .field("public_url", &self.public_url)
            .field("password", &self.password)
            .finish()
    }
}

/// The wired auth core
#[derive(Clone)]
pub struct AuthServices {
    pub sessions: SessionService,
    pub verification: VerificationService,
    pub gate: AccessGate,
}

impl AuthServices {
    pub fn new(
        settings: AuthSettings,
        users: Arc<dyn UserStore>,
        memberships: Arc<dyn MembershipStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = Arc::new(TokenCodec::new(
            &settings.jwt_secret,
            settings.access_ttl,
            settings.refresh_ttl,
            clock.clone(),
        ));
        let one_time = Arc::new(OneTimeTokenIssuer::new(
            &settings.token_pepper,
            settings.one_time_ttl,
            clock.clone(),
        ));

        let verification = VerificationService::new(
            users.clone(),
            one_time,
            mailer,
            clock,
            settings.public_url.clone(),
            settings.password,
        );
        let sessions = SessionService::new(
            users.clone(),
            tokens.clone(),
            verification.clone(),
            settings.password,
        );
        let gate = AccessGate::new(tokens, users, memberships);

        Self {
            sessions,
            verification,
            gate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = AuthSettings::new("s", "p", "http://localhost:8080/");
        assert_eq!(settings.access_ttl, Duration::minutes(15));
        assert_eq!(settings.refresh_ttl, Duration::days(10));
        assert_eq!(settings.one_time_ttl, Duration::minutes(20));
        assert_eq!(settings.public_url, "http://localhost:8080");
    }

    #[test]
    fn test_settings_debug_hides_secrets() {
        let settings = AuthSettings::new("jwt-secret-value", "pepper-value", "http://x");
        let debug = format!("{settings:?}");
        assert!(!debug.contains("jwt-secret-value"));
        assert!(!debug.contains("pepper-value"));
    }
}
