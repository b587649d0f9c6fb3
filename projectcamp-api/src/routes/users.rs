/// Account endpoints
///
/// # Endpoints
///
/// - `POST /v1/users/register` - Register new user
/// - `POST /v1/users/login` - Login and get tokens
/// - `POST /v1/users/logout` - Revoke the refresh token and clear cookies
/// - `GET  /v1/users/current-user` - Authenticated user
/// - `GET  /v1/users/verify-email/:token` - Consume a verification token
/// - `POST /v1/users/resend-email-verification` - Send a fresh verification email
/// - `POST /v1/users/refresh-token` - Rotate the session tokens
/// - `POST /v1/users/forgot-password` - Send a password reset email
/// - `POST /v1/users/reset-password/:token` - Consume a reset token
/// - `POST /v1/users/change-password` - Change password with the old one
///
/// Login and refresh set the `accessToken` and `refreshToken` cookies as well
/// as returning the tokens in the body.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{JsonBody, ValidJson},
    middleware::auth::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use projectcamp_shared::{
    auth::{gate::Identity, jwt::TokenPair},
    models::user::PublicUser,
    service::{RegisterInput, Registration},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address or username
    #[serde(alias = "email", alias = "username")]
    #[validate(length(min = 1, message = "Email or username is required"))]
    pub login: String,

    /// Password
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: PublicUser,

    /// Access token (15m by default)
    pub access_token: String,

    /// Refresh token (10d by default)
    pub refresh_token: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token; the `refreshToken` cookie is used when absent
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Forgot password request
#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Reset password request
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

/// Change password request
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Verify email response
#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub is_email_verified: bool,
}

/// Plain acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// Register a new user
///
/// The account starts unverified and a verification email is sent. A mail
/// failure does not fail the request; `verification_email_sent` is false.
///
/// # Endpoint
///
/// ```text
/// POST /v1/users/register
/// Content-Type: application/json
///
/// {
///   "email": "alice@example.com",
///   "username": "alice",
///   "password": "Secret#123",
///   "full_name": "Alice Doe"
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Email or username already exists
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterInput>,
) -> ApiResult<(StatusCode, Json<Registration>)> {
    let registration = state.auth.sessions.register(input).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

/// Login with email or username
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<(CookieJar, Json<LoginResponse>)> {
    let outcome = state
        .auth
        .sessions
        .login(&req.login, &req.password)
        .await?;

    let jar = set_session_cookies(jar, &state, &outcome.tokens);

    Ok((
        jar,
        Json(LoginResponse {
            user: outcome.user,
            access_token: outcome.tokens.access_token,
            refresh_token: outcome.tokens.refresh_token,
        }),
    ))
}

/// Logout: revokes the refresh token and clears both cookies
pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<MessageResponse>)> {
    state.auth.sessions.logout(identity.user_id()).await?;

    let jar = jar
        .add(removal_cookie(ACCESS_TOKEN_COOKIE))
        .add(removal_cookie(REFRESH_TOKEN_COOKIE));

    Ok((jar, MessageResponse::new("User logged out")))
}

/// Currently authenticated user
pub async fn current_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<PublicUser>> {
    let user = state.auth.sessions.current_user(identity.user_id()).await?;
    Ok(Json(user))
}

/// Consumes an email verification token
///
/// # Errors
///
/// - `400 Bad Request`: Token unknown, used or expired
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<VerifyEmailResponse>> {
    let user = state.auth.verification.verify_email(&token).await?;
    Ok(Json(VerifyEmailResponse {
        is_email_verified: user.is_email_verified,
    }))
}

/// Re-sends the verification email, invalidating the previous link
///
/// # Errors
///
/// - `409 Conflict`: Email already verified
pub async fn resend_email_verification(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .auth
        .verification
        .resend_verification(identity.user_id())
        .await?;
    Ok(MessageResponse::new("Verification email sent"))
}

/// Rotates the session tokens
///
/// The refresh token is read from the body, then the `refreshToken` cookie.
///
/// # Errors
///
/// - `401 Unauthorized`: Missing, invalid, expired or already rotated token
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult<(CookieJar, Json<TokenPair>)> {
    let token = body
        .and_then(|Json(req)| req.refresh_token)
        .filter(|token| !token.trim().is_empty())
        .or_else(|| {
            jar.get(REFRESH_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_string())
        })
        .ok_or(ApiError::InvalidToken)?;

    let pair = state.auth.sessions.refresh(&token).await?;
    let jar = set_session_cookies(jar, &state, &pair);

    Ok((jar, Json(pair)))
}

/// Sends a password reset email if the account exists
///
/// Always answers the same way so callers cannot probe for accounts.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Malformed email
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    // Delivery runs detached; the response does not wait on it
    state.auth.verification.spawn_password_reset(&req.email);
    Ok(MessageResponse::new(
        "If an account exists for this email, a password reset link has been sent",
    ))
}

/// Consumes a reset token and sets a new password
///
/// # Errors
///
/// - `400 Bad Request`: Token unknown, used or expired
/// - `422 Unprocessable Entity`: Weak password
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .auth
        .verification
        .reset_password(&token, &req.new_password)
        .await?;
    Ok(MessageResponse::new("Password reset successfully"))
}

/// Changes the password of the authenticated user
///
/// # Errors
///
/// - `401 Unauthorized`: Old password is wrong
/// - `422 Unprocessable Entity`: Weak new password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .auth
        .sessions
        .change_password(identity.user_id(), &req.old_password, &req.new_password)
        .await?;
    Ok(MessageResponse::new("Password changed successfully"))
}

fn set_session_cookies(jar: CookieJar, state: &AppState, pair: &TokenPair) -> CookieJar {
    let tokens = state.auth.sessions.tokens();
    jar.add(session_cookie(
        ACCESS_TOKEN_COOKIE,
        pair.access_token.clone(),
        tokens.access_ttl(),
    ))
    .add(session_cookie(
        REFRESH_TOKEN_COOKIE,
        pair.refresh_token.clone(),
        tokens.refresh_ttl(),
    ))
}

fn session_cookie(name: &'static str, value: String, ttl: chrono::Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(ttl.num_seconds()))
        .build()
}

// Sent whether or not the request carried the cookie
fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, ""))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    cookie.make_removal();
    cookie
}
