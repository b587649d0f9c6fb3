/// Email verification and password reset flows
///
/// Both flows follow the same shape: issue a one-time token, persist its
/// digest and expiry on the user, mail the plaintext inside a link, and later
/// consume it with a single conditional store update keyed on the digest.
///
/// # Links
///
/// - `{public_url}/v1/users/verify-email/{token}`
/// - `{public_url}/v1/users/reset-password/{token}`

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::auth::one_time::OneTimeTokenIssuer;
use crate::auth::password::{hash_password, validate_password_strength, PasswordParams};
use crate::clock::Clock;
use crate::error::{AuthError, AuthResult};
use crate::mail::{Email, Mailer};
use crate::models::user::{PublicUser, User};
use crate::store::UserStore;

pub const VERIFY_EMAIL_SUBJECT: &str = "Please verify your email";
pub const RESET_PASSWORD_SUBJECT: &str = "Reset your password";

/// Issues, delivers and consumes one-time tokens
#[derive(Clone)]
pub struct VerificationService {
    users: Arc<dyn UserStore>,
    tokens: Arc<OneTimeTokenIssuer>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    public_url: Arc<str>,
    password: PasswordParams,
}

impl VerificationService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<OneTimeTokenIssuer>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        public_url: String,
        password: PasswordParams,
    ) -> Self {
        Self {
            users,
            tokens,
            mailer,
            clock,
            public_url: public_url.into(),
            password,
        }
    }

    /// Issues a verification token for `user`, replacing any pending one, and
    /// mails the link
    ///
    /// # Errors
    ///
    /// `NotFound` if the user vanished, `Internal` if the mail was not sent.
    pub async fn request_verification(&self, user: &User) -> AuthResult<()> {
        let token = self.tokens.issue();

        if !self
            .users
            .set_email_verification_token(user.id, &token.stored)
            .await?
        {
            return Err(AuthError::NotFound("User not found".to_string()));
        }

        let link = format!("{}/v1/users/verify-email/{}", self.public_url, token.plaintext);
        let body = format!(
            "Hi {},\n\nPlease verify your email address by opening this link:\n\n{}\n\n\
             The link expires in {} minutes.\n",
            user.username,
            link,
            self.tokens.ttl().num_minutes()
        );

        self.mailer
            .send(Email {
                to: user.email.clone(),
                subject: VERIFY_EMAIL_SUBJECT.to_string(),
                body,
            })
            .await?;

        info!(user_id = %user.id, "Verification email sent");
        Ok(())
    }

    /// Consumes a verification token and marks its owner verified
    pub async fn verify_email(&self, plaintext: &str) -> AuthResult<PublicUser> {
        let plaintext = plaintext.trim();
        if plaintext.is_empty() {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let hash = self.tokens.hash_one_time_token(plaintext);
        let user = self
            .users
            .consume_email_verification_token(&hash, self.clock.now())
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        info!(user_id = %user.id, "Email verified");
        Ok(user.to_public())
    }

    /// Re-issues the verification email for an unverified user
    ///
    /// The previous token stops matching as soon as the new one is stored.
    pub async fn resend_verification(&self, user_id: Uuid) -> AuthResult<()> {
        let user = self
            .users
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized("Invalid access token".to_string()))?;

        if user.is_email_verified {
            return Err(AuthError::Conflict("Email already verified".to_string()));
        }

        self.request_verification(&user).await
    }

    /// Runs [`Self::request_password_reset`] on a background task
    ///
    /// The caller returns at the same point whether or not the address has an
    /// account, so response timing does not depend on the lookup or delivery.
    pub fn spawn_password_reset(&self, email: &str) -> JoinHandle<()> {
        let service = self.clone();
        let email = email.to_string();
        tokio::spawn(async move { service.request_password_reset(&email).await })
    }

    /// Starts a password reset
    ///
    /// Never reports whether the address belongs to an account, and never
    /// fails: problems are logged and the caller sees the same outcome.
    pub async fn request_password_reset(&self, email: &str) {
        let email = email.trim().to_lowercase();

        let user = match self.users.find_user_by_email(&email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("Password reset requested for unknown email");
                return;
            }
            Err(e) => {
                error!(error = %e, "Password reset lookup failed");
                return;
            }
        };

        if let Err(e) = self.send_password_reset(&user).await {
            error!(user_id = %user.id, error = %e, "Password reset email not sent");
        }
    }

    async fn send_password_reset(&self, user: &User) -> AuthResult<()> {
        let token = self.tokens.issue();

        if !self
            .users
            .set_password_reset_token(user.id, &token.stored)
            .await?
        {
            return Err(AuthError::NotFound("User not found".to_string()));
        }

        let link = format!(
            "{}/v1/users/reset-password/{}",
            self.public_url, token.plaintext
        );
        let body = format!(
            "Hi {},\n\nA password reset was requested for your account. \
             To choose a new password, open this link:\n\n{}\n\n\
             The link expires in {} minutes. If you did not ask for this, ignore this email.\n",
            user.username,
            link,
            self.tokens.ttl().num_minutes()
        );

        self.mailer
            .send(Email {
                to: user.email.clone(),
                subject: RESET_PASSWORD_SUBJECT.to_string(),
                body,
            })
            .await?;

        info!(user_id = %user.id, "Password reset email sent");
        Ok(())
    }

    /// Consumes a reset token and sets a new password
    ///
    /// Also revokes the user's refresh token.
    pub async fn reset_password(&self, plaintext: &str, new_password: &str) -> AuthResult<()> {
        validate_password_strength(new_password)
            .map_err(|msg| AuthError::invalid_field("new_password", msg))?;

        let plaintext = plaintext.trim();
        if plaintext.is_empty() {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let new_hash = hash_password(new_password, &self.password)?;
        let hash = self.tokens.hash_one_time_token(plaintext);

        let user = self
            .users
            .consume_password_reset_token(&hash, self.clock.now(), &new_hash)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }
}
