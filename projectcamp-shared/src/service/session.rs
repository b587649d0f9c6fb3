/// Session management
///
/// ```text
/// Anonymous --login--> Authenticated --refresh--> Refreshed
///                            |
///                            +--logout / password change / reset--> LoggedOut
/// ```
///
/// A user has at most one live refresh token. Login overwrites it, refresh
/// rotates it with a compare-and-swap on the stored digest, and logout or any
/// password change clears it.

use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::{Validate, ValidateEmail, ValidationError};

use super::verification::VerificationService;
use crate::auth::jwt::{hash_refresh_token, IssuedSession, TokenCodec, TokenPair};
use crate::auth::one_time::compare_token_hash;
use crate::auth::password::{
    hash_password, validate_password_strength, verify_password, PasswordParams,
};
use crate::error::{field_errors, AuthError, AuthResult, FieldError};
use crate::models::user::{NewUser, PublicUser, User, UserRole};
use crate::store::UserStore;

/// Registration input
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(
        length(min = 5, max = 64, message = "Username must be between 5 and 64 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(custom(function = "validate_password"))]
    pub password: String,

    /// Global role; defaults to `member`
    #[serde(default)]
    pub role: Option<String>,

    #[validate(length(max = 255, message = "Full name must be at most 255 characters"))]
    #[serde(default)]
    pub full_name: Option<String>,
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c);
    if username.chars().all(allowed) {
        return Ok(());
    }

    let mut err = ValidationError::new("username");
    err.message = Some(Cow::Borrowed(
        "Username must be lowercase and contain only letters, digits, '.', '_' or '-'",
    ));
    Err(err)
}

fn validate_password(password: &str) -> Result<(), ValidationError> {
    validate_password_strength(password).map_err(|msg| {
        let mut err = ValidationError::new("password");
        err.message = Some(Cow::Owned(msg));
        err
    })
}

/// Outcome of a registration
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub user: PublicUser,

    /// False when the account exists but the verification mail could not be sent
    pub verification_email_sent: bool,
}

/// Outcome of a login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

/// Password checked against [`SessionService`]'s placeholder hash
const PLACEHOLDER_PASSWORD: &str = "placeholder-password-for-unknown-accounts";

/// Register, login, logout, refresh, current user and password change
#[derive(Clone)]
pub struct SessionService {
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenCodec>,
    verification: VerificationService,
    password: PasswordParams,

    /// Hash with the live parameters, verified when no account matches a
    /// login so both outcomes cost one Argon2 run
    placeholder_hash: Option<Arc<str>>,
}

impl SessionService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<TokenCodec>,
        verification: VerificationService,
        password: PasswordParams,
    ) -> Self {
        let placeholder_hash = match hash_password(PLACEHOLDER_PASSWORD, &password) {
            Ok(hash) => Some(Arc::from(hash)),
            Err(e) => {
                warn!(error = %e, "Could not hash the placeholder password");
                None
            }
        };

        Self {
            users,
            tokens,
            verification,
            password,
            placeholder_hash,
        }
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    /// Creates an unverified account and sends its verification email
    ///
    /// A failed mail does not undo the registration; it is reported through
    /// [`Registration::verification_email_sent`].
    pub async fn register(&self, mut input: RegisterInput) -> AuthResult<Registration> {
        input.email = input.email.trim().to_lowercase();
        input.username = input.username.trim().to_string();

        let mut fields = input
            .validate()
            .err()
            .map(|errors| field_errors(&errors))
            .unwrap_or_default();

        let role = match input.role.as_deref().map(str::parse::<UserRole>) {
            None => UserRole::default(),
            Some(Ok(role)) => role,
            Some(Err(_)) => {
                fields.push(FieldError::new(
                    "role",
                    "Role must be one of: admin, project_admin, member",
                ));
                UserRole::default()
            }
        };

        if !fields.is_empty() {
            fields.sort_by(|a, b| a.field.cmp(&b.field));
            return Err(AuthError::Validation(fields));
        }

        if self.users.find_user_by_email(&input.email).await?.is_some()
            || self
                .users
                .find_user_by_username(&input.username)
                .await?
                .is_some()
        {
            return Err(AuthError::Conflict(
                "User with this email or username already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password, &self.password)?;

        let user = self
            .users
            .insert_user(NewUser {
                email: input.email,
                username: input.username,
                full_name: input.full_name,
                password_hash,
                role,
            })
            .await?;

        info!(user_id = %user.id, role = %user.role, "User registered");

        let verification_email_sent = match self.verification.request_verification(&user).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Verification email not sent at registration");
                false
            }
        };

        Ok(Registration {
            user: user.to_public(),
            verification_email_sent,
        })
    }

    /// Authenticates by email or username and opens a new session
    ///
    /// `login_id` is treated as an email when it parses as one.
    pub async fn login(&self, login_id: &str, password: &str) -> AuthResult<LoginOutcome> {
        let login_id = login_id.trim();

        let user = if login_id.validate_email() {
            self.users
                .find_user_by_email(&login_id.to_lowercase())
                .await?
        } else {
            self.users.find_user_by_username(login_id).await?
        };

        let valid = match self.password_hash_for(user.as_ref()) {
            Some(hash) => verify_password(password, hash)?,
            None => false,
        };

        let user = match user {
            Some(user) if valid => user,
            Some(user) => {
                debug!(user_id = %user.id, "Login with wrong password");
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                debug!("Login for unknown account");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let session = self.issue(&user)?;
        if !self
            .users
            .set_refresh_token_hash(user.id, Some(&session.refresh_token_hash))
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %user.id, "User logged in");
        Ok(LoginOutcome {
            user: user.to_public(),
            tokens: session.pair,
        })
    }

    /// Revokes the user's refresh token
    pub async fn logout(&self, user_id: Uuid) -> AuthResult<()> {
        self.users.set_refresh_token_hash(user_id, None).await?;
        info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Exchanges a refresh token for a new pair, retiring the old one
    ///
    /// Every rejection is [`AuthError::InvalidToken`].
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let refresh_token = refresh_token.trim();

        let claims = self.tokens.verify_refresh_token(refresh_token).map_err(|e| {
            debug!(error = %e, "Refresh token rejected");
            AuthError::InvalidToken
        })?;

        let user = self
            .users
            .find_user_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let presented = hash_refresh_token(refresh_token);
        let matches = user
            .refresh_token_hash
            .as_deref()
            .is_some_and(|stored| compare_token_hash(&presented, stored));
        if !matches {
            warn!(user_id = %user.id, "Refresh token is not the current one");
            return Err(AuthError::InvalidToken);
        }

        let session = self.issue(&user)?;
        if !self
            .users
            .rotate_refresh_token_hash(user.id, &presented, &session.refresh_token_hash)
            .await?
        {
            warn!(user_id = %user.id, "Refresh token rotated concurrently");
            return Err(AuthError::InvalidToken);
        }

        debug!(user_id = %user.id, "Session refreshed");
        Ok(session.pair)
    }

    pub async fn current_user(&self, user_id: Uuid) -> AuthResult<PublicUser> {
        self.users
            .find_user_by_id(user_id)
            .await?
            .map(|user| user.to_public())
            .ok_or_else(|| AuthError::Unauthorized("Invalid access token".to_string()))
    }

    /// Replaces the password after checking the old one
    ///
    /// Revokes the refresh token, so every session has to log in again once
    /// its access token runs out.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        let user = self
            .users
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized("Invalid access token".to_string()))?;

        if !verify_password(old_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        validate_password_strength(new_password)
            .map_err(|msg| AuthError::invalid_field("new_password", msg))?;

        let new_hash = hash_password(new_password, &self.password)?;
        if !self
            .users
            .update_password_hash(user.id, &user.password_hash, &new_hash)
            .await?
        {
            // Changed by a concurrent request since it was read
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Hash a login password is checked against: the account's own, or the
    /// placeholder when there is no account
    fn password_hash_for<'a>(&'a self, user: Option<&'a User>) -> Option<&'a str> {
        match user {
            Some(user) => Some(user.password_hash.as_str()),
            None => self.placeholder_hash.as_deref(),
        }
    }

    fn issue(&self, user: &User) -> AuthResult<IssuedSession> {
        self.tokens.issue_session_tokens(user.id).map_err(|e| {
            error!(user_id = %user.id, error = %e, "Failed to issue session tokens");
            AuthError::internal()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::mail::MemoryMailer;
    use crate::service::{AuthServices, AuthSettings};
    use crate::store::memory::MemoryStore;

    fn sessions(params: PasswordParams) -> SessionService {
        let store = Arc::new(MemoryStore::new());
        let mut settings = AuthSettings::new(
            "unit-test-jwt-secret-that-is-long-enough",
            "unit-test-token-pepper-that-is-long-enough",
            "https://camp.test",
        );
        settings.password = params;

        AuthServices::new(
            settings,
            store.clone(),
            store,
            Arc::new(MemoryMailer::new()),
            Arc::new(SystemClock),
        )
        .sessions
    }

    #[test]
    fn test_unknown_account_is_checked_against_placeholder_hash() {
        let params = PasswordParams::low_cost();
        let service = sessions(params);

        let hash = service
            .password_hash_for(None)
            .expect("placeholder hash should exist");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains(&format!(
            "m={},t={},p={}",
            params.memory_kib, params.iterations, params.parallelism
        )));
        assert!(verify_password(PLACEHOLDER_PASSWORD, hash).unwrap());
        assert!(!verify_password("Wrong#1234", hash).unwrap());
    }

    #[tokio::test]
    async fn test_login_unknown_account_is_invalid_credentials() {
        let service = sessions(PasswordParams::low_cost());

        assert!(matches!(
            service.login("nobody", "Wrong#1234").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("nobody", PLACEHOLDER_PASSWORD).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    fn input(username: &str, role: Option<&str>) -> RegisterInput {
        RegisterInput {
            email: "alice@x.com".to_string(),
            username: username.to_string(),
            password: "Secret#123".to_string(),
            role: role.map(str::to_string),
            full_name: None,
        }
    }

    #[test]
    fn test_register_input_validation() {
        assert!(input("alice", None).validate().is_ok());
        assert!(input("al.ice_-9", None).validate().is_ok());

        let errors = input("ali", None).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));

        let errors = input("Alice", None).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));

        let mut bad = input("alice", None);
        bad.email = "not-an-email".to_string();
        bad.password = "weak".to_string();
        let fields = field_errors(&bad.validate().unwrap_err());
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["email", "password"]);
    }

    #[test]
    fn test_register_input_deserializes_without_optionals() {
        let input: RegisterInput = serde_json::from_str(
            r#"{"email":"a@x.com","username":"alice","password":"Secret#123"}"#,
        )
        .unwrap();
        assert!(input.role.is_none());
        assert!(input.full_name.is_none());
    }
}
