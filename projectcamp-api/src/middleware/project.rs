/// Project authorization
///
/// Project-scoped routes are registered through [`ProjectRoutes`], which
/// wraps every handler in [`require_project_role`] with the roles allowed
/// for that route, and wraps the whole router in authentication. There is
/// no way to add a route to it without an allowed-role set.
///
/// # Example
///
/// ```no_run
/// use axum::routing::get;
/// use projectcamp_api::app::AppState;
/// use projectcamp_api::middleware::project::ProjectRoutes;
/// use projectcamp_shared::models::membership::ProjectRole;
///
/// # fn example(state: AppState) {
/// let router = ProjectRoutes::new(state)
///     .route("/:project_id/members", &ProjectRole::ALL, get(|| async { "members" }))
///     .into_router();
/// # let _ = router;
/// # }
/// ```

use std::collections::HashMap;

use axum::{
    extract::{Path, Request, State},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::MethodRouter,
    Extension, Router,
};
use projectcamp_shared::auth::gate::Identity;
use projectcamp_shared::models::membership::ProjectRole;

use super::auth::authenticate;
use crate::{app::AppState, error::ApiError};

/// Path parameter naming the project
pub const PROJECT_ID_PARAM: &str = "project_id";

/// State for one project route: the app plus its allowed roles
#[derive(Clone)]
pub struct ProjectGate {
    state: AppState,
    allowed: &'static [ProjectRole],
}

/// Resolves the caller's membership and rejects roles outside the allowed set
///
/// Inserts [`projectcamp_shared::auth::gate::ProjectAccess`] into the request
/// extensions.
pub async fn require_project_role(
    State(gate): State<ProjectGate>,
    identity: Option<Extension<Identity>>,
    params: Option<Path<HashMap<String, String>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(Extension(identity)) = identity else {
        return Err(ApiError::Unauthorized("Unauthorized access".to_string()));
    };

    let project_id = params
        .as_ref()
        .and_then(|Path(params)| params.get(PROJECT_ID_PARAM))
        .map(String::as_str);

    let access = gate
        .state
        .auth
        .gate
        .authorize_project(&identity, project_id, gate.allowed)
        .await?;

    req.extensions_mut().insert(access);

    Ok(next.run(req).await)
}

/// Builder for routes that require project membership
pub struct ProjectRoutes {
    state: AppState,
    router: Router<AppState>,
}

impl ProjectRoutes {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            router: Router::new(),
        }
    }

    /// Adds a route reachable only by members holding one of `allowed`
    pub fn route(
        mut self,
        path: &str,
        allowed: &'static [ProjectRole],
        method_router: MethodRouter<AppState>,
    ) -> Self {
        let gate = ProjectGate {
            state: self.state.clone(),
            allowed,
        };
        self.router = self.router.route(
            path,
            method_router.route_layer(from_fn_with_state(gate, require_project_role)),
        );
        self
    }

    /// Finishes the router, wrapping every route in authentication
    pub fn into_router(self) -> Router<AppState> {
        self.router
            .route_layer(from_fn_with_state(self.state, authenticate))
    }
}
