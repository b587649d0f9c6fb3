/// Project membership endpoints
///
/// # Endpoints
///
/// - `POST   /v1/projects` - Create a project id; caller becomes its admin
/// - `GET    /v1/projects/:project_id/members` - List members (any role)
/// - `POST   /v1/projects/:project_id/members` - Add or re-role a member (admin)
/// - `PUT    /v1/projects/:project_id/members/:user_id` - Change a role (admin)
/// - `DELETE /v1/projects/:project_id/members/:user_id` - Remove a member (admin)
///
/// Everything under `:project_id` runs behind the project authorization
/// layer, so handlers receive a [`ProjectAccess`] for the caller.

use std::collections::HashMap;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{JsonBody, ValidJson},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use projectcamp_shared::{
    auth::gate::{Identity, ProjectAccess},
    models::{
        membership::{ProjectMembership, ProjectRole},
        user::PublicUser,
    },
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Create project response
#[derive(Debug, Serialize)]
pub struct CreateProjectResponse {
    pub project_id: Uuid,
    pub role: ProjectRole,
}

/// Project member with public user info
#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub user: PublicUser,
    pub role: ProjectRole,
    pub joined_at: DateTime<Utc>,
}

/// Add member request
#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub role: ProjectRole,
}

/// Update role request
#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: ProjectRole,
}

/// Creates a project and makes the caller its admin
pub async fn create_project(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<(StatusCode, Json<CreateProjectResponse>)> {
    let project_id = Uuid::new_v4();
    let membership = state
        .memberships
        .upsert_membership(project_id, identity.user_id(), ProjectRole::Admin)
        .await?;

    info!(project_id = %project_id, user_id = %identity.user_id(), "Project created");

    Ok((
        StatusCode::CREATED,
        Json(CreateProjectResponse {
            project_id: membership.project_id,
            role: membership.role,
        }),
    ))
}

/// Lists project members, oldest first
pub async fn list_members(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
) -> ApiResult<Json<Vec<MemberResponse>>> {
    let memberships = state
        .memberships
        .list_project_members(access.project_id)
        .await?;

    let mut members = Vec::with_capacity(memberships.len());
    for membership in memberships {
        // Users deleted mid-listing are skipped
        if let Some(user) = state.users.find_user_by_id(membership.user_id).await? {
            members.push(member_response(user.to_public(), &membership));
        }
    }

    Ok(Json(members))
}

/// Adds the user with `email` to the project, or replaces their role
///
/// # Errors
///
/// - `404 Not Found`: No user with that email
pub async fn add_member(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    ValidJson(req): ValidJson<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<MemberResponse>)> {
    let user = state
        .users
        .find_user_by_email(&req.email.trim().to_lowercase())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let membership = state
        .memberships
        .upsert_membership(access.project_id, user.id, req.role)
        .await?;

    info!(
        project_id = %access.project_id,
        user_id = %user.id,
        role = %membership.role,
        by = %access.user_id,
        "Project member added"
    );

    Ok((
        StatusCode::CREATED,
        Json(member_response(user.to_public(), &membership)),
    ))
}

/// Changes the role of an existing member
///
/// # Errors
///
/// - `404 Not Found`: User is not a member of the project
pub async fn update_member_role(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(params): Path<HashMap<String, String>>,
    JsonBody(req): JsonBody<UpdateRoleRequest>,
) -> ApiResult<Json<MemberResponse>> {
    let user_id = member_id(&params)?;

    let membership = state
        .memberships
        .update_membership_role(access.project_id, user_id, req.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project member not found".to_string()))?;

    let user = state
        .users
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project member not found".to_string()))?;

    info!(
        project_id = %access.project_id,
        user_id = %user_id,
        role = %membership.role,
        by = %access.user_id,
        "Project member role updated"
    );

    Ok(Json(member_response(user.to_public(), &membership)))
}

/// Removes a member from the project
///
/// # Errors
///
/// - `404 Not Found`: User is not a member of the project
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(access): Extension<ProjectAccess>,
    Path(params): Path<HashMap<String, String>>,
) -> ApiResult<StatusCode> {
    let user_id = member_id(&params)?;

    if !state
        .memberships
        .delete_membership(access.project_id, user_id)
        .await?
    {
        return Err(ApiError::NotFound("Project member not found".to_string()));
    }

    info!(
        project_id = %access.project_id,
        user_id = %user_id,
        by = %access.user_id,
        "Project member removed"
    );

    Ok(StatusCode::NO_CONTENT)
}

fn member_id(params: &HashMap<String, String>) -> ApiResult<Uuid> {
    params
        .get("user_id")
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| ApiError::BadRequest("User id is invalid".to_string()))
}

fn member_response(user: PublicUser, membership: &ProjectMembership) -> MemberResponse {
    MemberResponse {
        user,
        role: membership.role,
        joined_at: membership.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_id_parsing() {
        let id = Uuid::new_v4();
        let mut params = HashMap::new();
        params.insert("user_id".to_string(), id.to_string());
        assert_eq!(member_id(&params).unwrap(), id);

        params.insert("user_id".to_string(), "not-a-uuid".to_string());
        assert!(matches!(member_id(&params), Err(ApiError::BadRequest(_))));
        assert!(member_id(&HashMap::new()).is_err());
    }

    #[test]
    fn test_add_member_request_rejects_unknown_role() {
        let result: Result<AddMemberRequest, _> =
            serde_json::from_str(r#"{"email":"a@x.com","role":"owner"}"#);
        assert!(result.is_err());
    }
}
