/// In-memory store backend
///
/// Holds users and memberships in `tokio::sync::RwLock` maps. Every
/// compound operation (uniqueness check plus insert, match plus clear) runs
/// under one write guard, and no guard is held across an `.await`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MembershipStore, StoreError, UserStore};
use crate::auth::one_time::compare_token_hash;
use crate::models::membership::{ProjectMembership, ProjectRole};
use crate::models::user::{NewUser, StoredToken, User};

/// Store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    memberships: RwLock<HashMap<(Uuid, Uuid), ProjectMembership>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict("Email already exists".to_string()));
        }
        if users.values().any(|u| u.username == new_user.username) {
            return Err(StoreError::Conflict("Username already exists".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            username: new_user.username,
            full_name: new_user.full_name,
            password_hash: new_user.password_hash,
            role: new_user.role,
            is_email_verified: false,
            email_verification_token_hash: None,
            email_verification_expiry: None,
            refresh_token_hash: None,
            password_reset_token_hash: None,
            password_reset_expiry: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn set_refresh_token_hash(
        &self,
        id: Uuid,
        hash: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        user.refresh_token_hash = hash.map(str::to_string);
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn rotate_refresh_token_hash(
        &self,
        id: Uuid,
        current: &str,
        next: &str,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) if user.refresh_token_hash.as_deref() == Some(current) => {
                user.refresh_token_hash = Some(next.to_string());
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_email_verification_token(
        &self,
        id: Uuid,
        token: &StoredToken,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        user.email_verification_token_hash = Some(token.hash.clone());
        user.email_verification_expiry = Some(token.expires_at);
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn consume_email_verification_token(
        &self,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.values_mut().find(|u| {
            u.email_verification()
                .is_some_and(|t| t.is_live(now) && compare_token_hash(&t.hash, hash))
        }) else {
            return Ok(None);
        };

        user.is_email_verified = true;
        user.email_verification_token_hash = None;
        user.email_verification_expiry = None;
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_password_reset_token(
        &self,
        id: Uuid,
        token: &StoredToken,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        user.password_reset_token_hash = Some(token.hash.clone());
        user.password_reset_expiry = Some(token.expires_at);
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn consume_password_reset_token(
        &self,
        hash: &str,
        now: DateTime<Utc>,
        new_password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.values_mut().find(|u| {
            u.password_reset()
                .is_some_and(|t| t.is_live(now) && compare_token_hash(&t.hash, hash))
        }) else {
            return Ok(None);
        };

        user.password_hash = new_password_hash.to_string();
        user.password_reset_token_hash = None;
        user.password_reset_expiry = None;
        user.refresh_token_hash = None;
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        current_hash: &str,
        new_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) if user.password_hash == current_hash => {
                user.password_hash = new_hash.to_string();
                user.refresh_token_hash = None;
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn find_membership(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ProjectMembership>, StoreError> {
        let memberships = self.memberships.read().await;
        Ok(memberships.get(&(project_id, user_id)).cloned())
    }

    async fn upsert_membership(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<ProjectMembership, StoreError> {
        // Mirrors the foreign key on project_memberships.user_id
        if !self.users.read().await.contains_key(&user_id) {
            return Err(StoreError::Unavailable(format!(
                "membership references unknown user {}",
                user_id
            )));
        }

        let now = Utc::now();
        let mut memberships = self.memberships.write().await;
        let membership = memberships
            .entry((project_id, user_id))
            .and_modify(|m| {
                m.role = role;
                m.updated_at = now;
            })
            .or_insert_with(|| ProjectMembership {
                project_id,
                user_id,
                role,
                created_at: now,
                updated_at: now,
            });
        Ok(membership.clone())
    }

    async fn update_membership_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<Option<ProjectMembership>, StoreError> {
        let mut memberships = self.memberships.write().await;
        Ok(memberships.get_mut(&(project_id, user_id)).map(|m| {
            m.role = role;
            m.updated_at = Utc::now();
            m.clone()
        }))
    }

    async fn delete_membership(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let mut memberships = self.memberships.write().await;
        Ok(memberships.remove(&(project_id, user_id)).is_some())
    }

    async fn list_project_members(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ProjectMembership>, StoreError> {
        let memberships = self.memberships.read().await;
        let mut members: Vec<ProjectMembership> = memberships
            .values()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.created_at);
        Ok(members)
    }
}
