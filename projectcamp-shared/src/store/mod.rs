/// Credential and membership stores
///
/// The auth core never talks to a database directly. It depends on two async
/// traits, [`UserStore`] and [`MembershipStore`], and every state transition
/// guarded by a token goes through a single conditional operation on the
/// store, so two concurrent requests cannot both consume the same token.
///
/// # Backends
///
/// - [`memory::MemoryStore`]: `tokio::sync::RwLock` maps, used by tests and by
///   the server when no `DATABASE_URL` is configured
/// - [`postgres::PgStore`]: sqlx/PostgreSQL with conditional `UPDATE ... RETURNING`
///
/// # Example
///
/// ```
/// use projectcamp_shared::models::user::{NewUser, UserRole};
/// use projectcamp_shared::store::{memory::MemoryStore, UserStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let user = store
///     .insert_user(NewUser {
///         email: "alice@x.com".to_string(),
///         username: "alice".to_string(),
///         full_name: None,
///         password_hash: "$argon2id$...".to_string(),
///         role: UserRole::Member,
///     })
///     .await?;
/// assert!(store.find_user_by_email("alice@x.com").await?.is_some());
/// # let _ = user;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::membership::{ProjectMembership, ProjectRole};
use crate::models::user::{NewUser, StoredToken, User};

pub mod memory;
pub mod postgres;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unique constraint violated
    #[error("{0}")]
    Conflict(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend cannot serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Owner of user records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user; fails with [`StoreError::Conflict`] on a duplicate email or username
    async fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Overwrites (or clears) the refresh-token digest unconditionally
    ///
    /// Returns false if the user does not exist.
    async fn set_refresh_token_hash(
        &self,
        id: Uuid,
        hash: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Replaces the refresh-token digest only if it still equals `current`
    ///
    /// Returns false when the digest no longer matches (rotated, logged out).
    async fn rotate_refresh_token_hash(
        &self,
        id: Uuid,
        current: &str,
        next: &str,
    ) -> Result<bool, StoreError>;

    /// Stores a new email verification token, replacing any previous one
    async fn set_email_verification_token(
        &self,
        id: Uuid,
        token: &StoredToken,
    ) -> Result<bool, StoreError>;

    /// Marks the matching user verified and clears the token, in one step
    ///
    /// Matches only a user whose stored digest equals `hash` and whose expiry
    /// is after `now`.
    async fn consume_email_verification_token(
        &self,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    /// Stores a new password reset token, replacing any previous one
    async fn set_password_reset_token(
        &self,
        id: Uuid,
        token: &StoredToken,
    ) -> Result<bool, StoreError>;

    /// Sets the new password hash, clears the reset token and the refresh-token
    /// digest, in one step
    async fn consume_password_reset_token(
        &self,
        hash: &str,
        now: DateTime<Utc>,
        new_password_hash: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Replaces the password hash if it still equals `current_hash` and clears
    /// the refresh-token digest
    async fn update_password_hash(
        &self,
        id: Uuid,
        current_hash: &str,
        new_hash: &str,
    ) -> Result<bool, StoreError>;

    /// Connectivity check
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Owner of project memberships
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn find_membership(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ProjectMembership>, StoreError>;

    /// Inserts the membership or replaces the role of an existing one
    async fn upsert_membership(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<ProjectMembership, StoreError>;

    async fn update_membership_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<Option<ProjectMembership>, StoreError>;

    async fn delete_membership(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    /// Members of a project, oldest first
    async fn list_project_members(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ProjectMembership>, StoreError>;
}
