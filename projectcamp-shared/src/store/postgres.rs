/// PostgreSQL store backend
///
/// Every token-guarded transition is one `UPDATE ... WHERE ... RETURNING`
/// statement, so the database serializes concurrent consumers.
///
/// # Example
///
/// ```no_run
/// use projectcamp_shared::db::pool::{create_pool, DatabaseConfig};
/// use projectcamp_shared::store::{postgres::PgStore, UserStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
/// let store = PgStore::new(pool);
/// store.ping().await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{MembershipStore, StoreError, UserStore};
use crate::models::membership::{ProjectMembership, ProjectRole};
use crate::models::user::{NewUser, StoredToken, User};

const USER_COLUMNS: &str = "id, email, username, full_name, password_hash, role, \
     is_email_verified, email_verification_token_hash, email_verification_expiry, \
     refresh_token_hash, password_reset_token_hash, password_reset_expiry, \
     created_at, updated_at";

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a unique violation on `users` to a conflict naming the field
fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let message = match db_err.constraint() {
                Some("users_username_key") => "Username already exists",
                _ => "Email already exists",
            };
            return StoreError::Conflict(message.to_string());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, username, full_name, password_hash, role)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.full_name)
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_refresh_token_hash(
        &self,
        id: Uuid,
        hash: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn rotate_refresh_token_hash(
        &self,
        id: Uuid,
        current: &str,
        next: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $3, updated_at = NOW()
             WHERE id = $1 AND refresh_token_hash = $2",
        )
        .bind(id)
        .bind(current)
        .bind(next)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_email_verification_token(
        &self,
        id: Uuid,
        token: &StoredToken,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users
             SET email_verification_token_hash = $2,
                 email_verification_expiry = $3,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&token.hash)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn consume_email_verification_token(
        &self,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET is_email_verified = TRUE,
                 email_verification_token_hash = NULL,
                 email_verification_expiry = NULL,
                 updated_at = NOW()
             WHERE email_verification_token_hash = $1
               AND email_verification_expiry > $2
             RETURNING {USER_COLUMNS}"
        ))
        .bind(hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_password_reset_token(
        &self,
        id: Uuid,
        token: &StoredToken,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users
             SET password_reset_token_hash = $2,
                 password_reset_expiry = $3,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&token.hash)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn consume_password_reset_token(
        &self,
        hash: &str,
        now: DateTime<Utc>,
        new_password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET password_hash = $3,
                 password_reset_token_hash = NULL,
                 password_reset_expiry = NULL,
                 refresh_token_hash = NULL,
                 updated_at = NOW()
             WHERE password_reset_token_hash = $1
               AND password_reset_expiry > $2
             RETURNING {USER_COLUMNS}"
        ))
        .bind(hash)
        .bind(now)
        .bind(new_password_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        current_hash: &str,
        new_hash: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users
             SET password_hash = $3, refresh_token_hash = NULL, updated_at = NOW()
             WHERE id = $1 AND password_hash = $2",
        )
        .bind(id)
        .bind(current_hash)
        .bind(new_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for PgStore {
    async fn find_membership(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ProjectMembership>, StoreError> {
        let membership = sqlx::query_as::<_, ProjectMembership>(
            "SELECT project_id, user_id, role, created_at, updated_at
             FROM project_memberships
             WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(membership)
    }

    async fn upsert_membership(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<ProjectMembership, StoreError> {
        let membership = sqlx::query_as::<_, ProjectMembership>(
            "INSERT INTO project_memberships (project_id, user_id, role)
             VALUES ($1, $2, $3)
             ON CONFLICT (project_id, user_id)
             DO UPDATE SET role = EXCLUDED.role, updated_at = NOW()
             RETURNING project_id, user_id, role, created_at, updated_at",
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        Ok(membership)
    }

    async fn update_membership_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<Option<ProjectMembership>, StoreError> {
        let membership = sqlx::query_as::<_, ProjectMembership>(
            "UPDATE project_memberships
             SET role = $3, updated_at = NOW()
             WHERE project_id = $1 AND user_id = $2
             RETURNING project_id, user_id, role, created_at, updated_at",
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;

        Ok(membership)
    }

    async fn delete_membership(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM project_memberships WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_project_members(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ProjectMembership>, StoreError> {
        let members = sqlx::query_as::<_, ProjectMembership>(
            "SELECT project_id, user_id, role, created_at, updated_at
             FROM project_memberships
             WHERE project_id = $1
             ORDER BY created_at ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }
}
