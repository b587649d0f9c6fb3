/// Access-control gate
///
/// Two stages guard every protected operation:
///
/// 1. [`AccessGate::authenticate`] turns an access token into an [`Identity`]
/// 2. [`AccessGate::authorize_project`] checks the identity's membership role
///    in the addressed project against an allowed set
///
/// The gate only answers questions. Transports (the axum layers in the api
/// crate) decide where the token and project id come from and attach the
/// results to the request.
///
/// # Example
///
/// ```no_run
/// use projectcamp_shared::auth::gate::AccessGate;
/// use projectcamp_shared::models::membership::ProjectRole;
///
/// # async fn example(gate: AccessGate, token: &str, project_id: &str)
/// #     -> projectcamp_shared::error::AuthResult<()> {
/// let identity = gate.authenticate(Some(token)).await?;
/// let access = gate
///     .authorize_project(&identity, Some(project_id), &ProjectRole::ADMIN_ONLY)
///     .await?;
/// assert_eq!(access.user_id, identity.user.id);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::jwt::TokenCodec;
use crate::error::{AuthError, AuthResult};
use crate::models::membership::ProjectRole;
use crate::models::user::PublicUser;
use crate::store::{MembershipStore, UserStore};

/// Authenticated caller
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub user: PublicUser,
}

impl Identity {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

/// Result of a successful project authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProjectAccess {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: ProjectRole,
}

/// Authenticates callers and authorizes project access
#[derive(Clone)]
pub struct AccessGate {
    tokens: Arc<TokenCodec>,
    users: Arc<dyn UserStore>,
    memberships: Arc<dyn MembershipStore>,
}

impl AccessGate {
    pub fn new(
        tokens: Arc<TokenCodec>,
        users: Arc<dyn UserStore>,
        memberships: Arc<dyn MembershipStore>,
    ) -> Self {
        Self {
            tokens,
            users,
            memberships,
        }
    }

    /// Resolves an access token to the user it was issued for
    ///
    /// A missing token is `Unauthorized("Unauthorized access")`. Every other
    /// failure, including a user deleted after issuance, is
    /// `Unauthorized("Invalid access token")`.
    pub async fn authenticate(&self, token: Option<&str>) -> AuthResult<Identity> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Unauthorized("Unauthorized access".to_string()))?;

        let user_id = self.tokens.verify_access_token(token).map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            invalid_access_token()
        })?;

        let user = self
            .users
            .find_user_by_id(user_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, user_id = %user_id, "User lookup failed");
                invalid_access_token()
            })?
            .ok_or_else(|| {
                tracing::debug!(user_id = %user_id, "Access token for unknown user");
                invalid_access_token()
            })?;

        Ok(Identity {
            user: user.to_public(),
        })
    }

    /// Checks the caller's role in a project against `allowed`
    ///
    /// `project_id` is the raw path parameter; missing or unparseable is
    /// `BadRequest`, no membership or a role outside `allowed` is `Forbidden`.
    pub async fn authorize_project(
        &self,
        identity: &Identity,
        project_id: Option<&str>,
        allowed: &[ProjectRole],
    ) -> AuthResult<ProjectAccess> {
        let raw = project_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AuthError::BadRequest("Project id is missing".to_string()))?;
        let project_id = Uuid::parse_str(raw)
            .map_err(|_| AuthError::BadRequest("Project id is invalid".to_string()))?;

        let membership = self
            .memberships
            .find_membership(project_id, identity.user_id())
            .await?
            .ok_or_else(|| AuthError::Forbidden("Not a member of this project".to_string()))?;

        if !membership.role.is_allowed(allowed) {
            tracing::debug!(
                user_id = %identity.user_id(),
                project_id = %project_id,
                role = %membership.role,
                "Project role not allowed"
            );
            return Err(AuthError::Forbidden(
                "You do not have permission to perform this action".to_string(),
            ));
        }

        Ok(ProjectAccess {
            project_id,
            user_id: identity.user_id(),
            role: membership.role,
        })
    }
}

fn invalid_access_token() -> AuthError {
    AuthError::Unauthorized("Invalid access token".to_string())
}
