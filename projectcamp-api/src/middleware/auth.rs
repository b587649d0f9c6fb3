/// Authentication middleware
///
/// Reads the access token from the `accessToken` cookie, falling back to an
/// `Authorization: Bearer` header, and resolves it through the access gate.
/// On success the [`Identity`] is inserted into the request extensions for
/// handlers to pick up with `Extension<Identity>`.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware::from_fn_with_state, routing::get, Router};
/// use projectcamp_api::app::AppState;
/// use projectcamp_api::middleware::auth::authenticate;
///
/// # fn example(state: AppState) -> Router<AppState> {
/// Router::new()
///     .route("/me", get(|| async { "me" }))
///     .route_layer(from_fn_with_state(state, authenticate))
/// # }
/// ```

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use projectcamp_shared::auth::gate::Identity;

use crate::{app::AppState, error::ApiError};

/// Cookie carrying the access token
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Cookie carrying the refresh token
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Rejects the request with 401 unless it carries a valid access token
pub async fn authenticate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = access_token(&jar, req.headers());
    let identity: Identity = state.auth.gate.authenticate(token.as_deref()).await?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Cookie first, then bearer header; an empty cookie counts as absent
fn access_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    let cookie = jar
        .get(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().trim())
        .filter(|value| !value.is_empty());
    if let Some(value) = cookie {
        return Some(value.to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}
