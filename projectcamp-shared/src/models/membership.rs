/// Project membership model
///
/// A membership assigns one role to one user within one project. The access
/// gate reads it to authorize project-scoped operations; it is independent of
/// the user's global [`crate::models::user::UserRole`].
///
/// # Schema
///
/// ```sql
/// CREATE TYPE project_role AS ENUM ('admin', 'project_admin', 'member');
///
/// CREATE TABLE project_memberships (
///     project_id UUID NOT NULL,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role project_role NOT NULL DEFAULT 'member',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (project_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **admin**: Full control of the project and its members
/// - **project_admin**: Manages project content
/// - **member**: Works within the project

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a user within a single project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    Admin,
    ProjectAdmin,
    Member,
}

impl ProjectRole {
    /// Every role; use as the allowed set for read-only project routes
    pub const ALL: [ProjectRole; 3] = [
        ProjectRole::Admin,
        ProjectRole::ProjectAdmin,
        ProjectRole::Member,
    ];

    /// Allowed set for member management
    pub const ADMIN_ONLY: [ProjectRole; 1] = [ProjectRole::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Admin => "admin",
            ProjectRole::ProjectAdmin => "project_admin",
            ProjectRole::Member => "member",
        }
    }

    /// Checks membership of this role in an allowed set
    pub fn is_allowed(&self, allowed: &[ProjectRole]) -> bool {
        allowed.contains(self)
    }
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("Unknown role: {}", s))
    }
}

/// Membership of a user in a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectMembership {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: ProjectRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_sets() {
        assert!(ProjectRole::Admin.is_allowed(&ProjectRole::ADMIN_ONLY));
        assert!(!ProjectRole::Member.is_allowed(&ProjectRole::ADMIN_ONLY));
        assert!(!ProjectRole::ProjectAdmin.is_allowed(&ProjectRole::ADMIN_ONLY));
        assert!(ProjectRole::ALL.iter().all(|r| r.is_allowed(&ProjectRole::ALL)));
        assert!(!ProjectRole::Admin.is_allowed(&[]));
    }

    #[test]
    fn test_role_serde_names() {
        assert_eq!(
            serde_json::to_string(&ProjectRole::ProjectAdmin).unwrap(),
            "\"project_admin\""
        );
        let role: ProjectRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, ProjectRole::Admin);
        assert_eq!("member".parse::<ProjectRole>().unwrap(), ProjectRole::Member);
    }
}
