/// Core error taxonomy
///
/// Every auth operation returns a single [`AuthError`]. Each variant maps to a
/// stable [`ErrorKind`] that transports can match on, plus a human-readable
/// message that is safe to show to callers.
///
/// Internal failures (store, mailer, hashing) are logged where they are
/// converted and surface only as [`AuthError::Internal`] with a generic message.
///
/// # Example
///
/// ```
/// use projectcamp_shared::error::{AuthError, ErrorKind};
///
/// let err = AuthError::InvalidCredentials;
/// assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
/// assert_eq!(err.kind().as_str(), "invalid_credentials");
/// ```

use serde::{Deserialize, Serialize};

use crate::auth::password::PasswordError;
use crate::mail::MailError;
use crate::store::StoreError;

/// Result alias for core operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Message used for every internal failure surfaced to a caller
const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// A single field validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Stable, machine-checkable error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Conflict,
    Validation,
    InvalidCredentials,
    InvalidOrExpiredToken,
    InvalidToken,
    Unauthorized,
    Forbidden,
    BadRequest,
    NotFound,
    Internal,
}

impl ErrorKind {
    /// Gets the kind as a snake_case code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation_error",
            ErrorKind::InvalidCredentials => "invalid_credentials",
            ErrorKind::InvalidOrExpiredToken => "invalid_or_expired_token",
            ErrorKind::InvalidToken => "invalid_token",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Internal => "internal_error",
        }
    }
}

/// Error type for all auth core operations
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Uniqueness violation (duplicate email or username)
    #[error("{0}")]
    Conflict(String),

    /// Malformed input, one entry per offending field
    #[error("Validation failed: {} errors", .0.len())]
    Validation(Vec<FieldError>),

    /// Bad login; does not say whether the user exists
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// One-time token could not be consumed; does not say why
    #[error("Token is invalid or expired")]
    InvalidOrExpiredToken,

    /// Refresh token rejected
    #[error("Invalid refresh token")]
    InvalidToken,

    /// Missing or invalid session
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    /// Request is missing required context
    #[error("{0}")]
    BadRequest(String),

    /// Referenced entity is absent
    #[error("{0}")]
    NotFound(String),

    /// Store, mailer or hashing failure
    #[error("{0}")]
    Internal(String),
}

impl AuthError {
    /// Gets the stable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Conflict(_) => ErrorKind::Conflict,
            AuthError::Validation(_) => ErrorKind::Validation,
            AuthError::InvalidCredentials => ErrorKind::InvalidCredentials,
            AuthError::InvalidOrExpiredToken => ErrorKind::InvalidOrExpiredToken,
            AuthError::InvalidToken => ErrorKind::InvalidToken,
            AuthError::Unauthorized(_) => ErrorKind::Unauthorized,
            AuthError::Forbidden(_) => ErrorKind::Forbidden,
            AuthError::BadRequest(_) => ErrorKind::BadRequest,
            AuthError::NotFound(_) => ErrorKind::NotFound,
            AuthError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Builds a validation error for a single field
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        AuthError::Validation(vec![FieldError::new(field, message)])
    }

    pub(crate) fn internal() -> Self {
        AuthError::Internal(INTERNAL_MESSAGE.to_string())
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AuthError::Conflict(msg),
            other => {
                tracing::error!(error = %other, "Store operation failed");
                AuthError::internal()
            }
        }
    }
}

impl From<MailError> for AuthError {
    fn from(err: MailError) -> Self {
        tracing::error!(error = %err, "Mail delivery failed");
        AuthError::internal()
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        tracing::error!(error = %err, "Password operation failed");
        AuthError::internal()
    }
}

/// Flattens validator output into field/message pairs, sorted by field
pub fn field_errors(errors: &validator::ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| FieldError {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string()),
            })
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AuthError::Validation(field_errors(&errors))
    }
}
