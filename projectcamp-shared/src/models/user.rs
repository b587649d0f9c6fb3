/// User model
///
/// A user owns its credentials and all token state: the current refresh-token
/// digest, and the hashed one-time tokens for email verification and password
/// reset. Plaintext tokens and passwords never reach this struct.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('admin', 'project_admin', 'member');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     username VARCHAR(64) NOT NULL UNIQUE,
///     full_name VARCHAR(255),
///     password_hash VARCHAR(255) NOT NULL,
///     role user_role NOT NULL DEFAULT 'member',
///     is_email_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     email_verification_token_hash VARCHAR(128),
///     email_verification_expiry TIMESTAMPTZ,
///     refresh_token_hash VARCHAR(128),
///     password_reset_token_hash VARCHAR(128),
///     password_reset_expiry TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```
/// use projectcamp_shared::models::user::{NewUser, UserRole};
///
/// let new_user = NewUser {
///     email: "alice@x.com".to_string(),
///     username: "alice".to_string(),
///     full_name: None,
///     password_hash: "$argon2id$...".to_string(),
///     role: UserRole::Member,
/// };
/// assert_eq!(new_user.role.as_str(), "member");
/// ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Global role of a user
///
/// This is the account-wide default role. Project access is decided by
/// [`crate::models::membership::ProjectRole`] only.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    ProjectAdmin,
    #[default]
    Member,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::Admin, UserRole::ProjectAdmin, UserRole::Member];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::ProjectAdmin => "project_admin",
            UserRole::Member => "member",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("Unknown role: {}", s))
    }
}

/// Hash and expiry of an issued one-time token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    /// Keyed digest of the plaintext token
    pub hash: String,

    /// Token is rejected at or after this instant
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Full user record, including credential state
///
/// Not serializable on purpose: callers only ever see [`PublicUser`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Lowercased email address, unique across users
    pub email: String,

    /// Lowercase username, unique across users
    pub username: String,

    pub full_name: Option<String>,

    /// Argon2id PHC string
    pub password_hash: String,

    pub role: UserRole,

    pub is_email_verified: bool,

    pub email_verification_token_hash: Option<String>,

    pub email_verification_expiry: Option<DateTime<Utc>>,

    /// SHA-256 digest of the single live refresh token
    pub refresh_token_hash: Option<String>,

    pub password_reset_token_hash: Option<String>,

    pub password_reset_expiry: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Pending email verification token, if any
    pub fn email_verification(&self) -> Option<StoredToken> {
        stored_token(
            &self.email_verification_token_hash,
            self.email_verification_expiry,
        )
    }

    /// Pending password reset token, if any
    pub fn password_reset(&self) -> Option<StoredToken> {
        stored_token(&self.password_reset_token_hash, self.password_reset_expiry)
    }

    /// Sanitized projection without credentials or token state
    pub fn to_public(&self) -> PublicUser {
        PublicUser::from(self)
    }
}

fn stored_token(hash: &Option<String>, expiry: Option<DateTime<Utc>>) -> Option<StoredToken> {
    match (hash, expiry) {
        (Some(hash), Some(expires_at)) => Some(StoredToken {
            hash: hash.clone(),
            expires_at,
        }),
        _ => None,
    }
}

/// User as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            is_email_verified: user.is_email_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        PublicUser::from(&user)
    }
}

/// Input for inserting a new user
///
/// Email and username are expected to be normalized already.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    pub role: UserRole,
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("project_admin".parse::<UserRole>().unwrap(), UserRole::ProjectAdmin);
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert!("root".parse::<UserRole>().is_err());
        assert_eq!(UserRole::default(), UserRole::Member);
    }

    #[test]
    fn test_public_user_has_no_secrets() {
        let mut user = fixtures::user("alice@x.com", "alice");
        user.refresh_token_hash = Some("refresh-digest".to_string());
        user.email_verification_token_hash = Some("verify-digest".to_string());

        let json = serde_json::to_string(&user.to_public()).unwrap();
        assert!(json.contains("alice@x.com"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("refresh-digest"));
        assert!(!json.contains("verify-digest"));
    }

    #[test]
    fn test_stored_token_requires_hash_and_expiry() {
        let mut user = fixtures::user("alice@x.com", "alice");
        assert!(user.email_verification().is_none());

        user.email_verification_token_hash = Some("h".to_string());
        assert!(user.email_verification().is_none());

        let expiry = Utc::now() + Duration::minutes(20);
        user.email_verification_expiry = Some(expiry);
        let token = user.email_verification().unwrap();
        assert!(token.is_live(expiry - Duration::seconds(1)));
        assert!(!token.is_live(expiry));
    }
}
