/// Request body extractors
///
/// Wrap `axum::Json` so malformed bodies produce the same error envelope as
/// every other failure instead of axum's plain-text rejection.
///
/// - [`JsonBody`]: deserialization only
/// - [`ValidJson`]: deserialization plus `validator` rules on the DTO

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use projectcamp_shared::error::FieldError;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

/// JSON body whose rejection is an [`ApiError`]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejection_to_error(rejection)),
        }
    }
}

/// JSON body that also passes its `validator` rules
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let JsonBody(value) = JsonBody::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    match rejection {
        // Well-formed JSON with missing or mistyped fields
        JsonRejection::JsonDataError(err) => {
            ApiError::ValidationError(vec![FieldError::new("body", err.body_text())])
        }
        other => ApiError::BadRequest(other.body_text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::header};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Probe {
        #[validate(email)]
        email: String,
    }

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body() {
        let ValidJson(probe) =
            ValidJson::<Probe>::from_request(json_request(r#"{"email":"a@x.com"}"#), &())
                .await
                .unwrap();
        assert_eq!(probe.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_rule_violation_is_validation_error() {
        let err = ValidJson::<Probe>::from_request(json_request(r#"{"email":"nope"}"#), &())
            .await
            .unwrap_err();
        match err {
            ApiError::ValidationError(fields) => assert_eq!(fields[0].field, "email"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_field_is_validation_error() {
        let err = JsonBody::<Probe>::from_request(json_request("{}"), &())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_syntax_error_is_bad_request() {
        let err = JsonBody::<Probe>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
