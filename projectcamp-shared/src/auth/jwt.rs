/// Session token codec
///
/// Access and refresh tokens are HS256 JWTs signed with the server secret.
/// Both carry a random `jti`, so two tokens issued in the same second are
/// still distinct. Expiry and not-before are checked against the injected
/// [`Clock`] rather than the wall clock.
///
/// Only the SHA-256 digest of a refresh token is persisted
/// ([`hash_refresh_token`]).
///
/// # Token Types
///
/// - **Access Token**: short-lived (15 minutes by default), sent on every request
/// - **Refresh Token**: long-lived (10 days by default), exchanged for a new pair
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use chrono::Duration;
/// use projectcamp_shared::auth::jwt::TokenCodec;
/// use projectcamp_shared::clock::SystemClock;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let codec = TokenCodec::new(
///     "a-secret-that-is-at-least-32-bytes!!",
///     Duration::minutes(15),
///     Duration::days(10),
///     Arc::new(SystemClock),
/// );
/// let user_id = Uuid::new_v4();
/// let session = codec.issue_session_tokens(user_id)?;
/// assert_eq!(codec.verify_access_token(&session.pair.access_token)?, user_id);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::clock::Clock;

/// Issuer embedded in and required of every session token
pub const ISSUER: &str = "projectcamp";

/// Error type for session token operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Token is past its expiry (or not yet valid)
    #[error("Token has expired")]
    Expired,

    /// Token could not be decoded or has the wrong shape
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Signature does not match the server secret
    #[error("Invalid token signature")]
    BadSignature,
}

/// Kind of session token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Unique token ID
    pub jti: Uuid,

    pub token_type: TokenType,
}

/// Access and refresh token as handed to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Freshly issued session; the caller persists `refresh_token_hash`
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub pair: TokenPair,
    pub refresh_token_hash: String,
}

/// Signs and verifies session tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(
        secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
            clock,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issues a new access/refresh pair for a user
    pub fn issue_session_tokens(&self, user_id: Uuid) -> Result<IssuedSession, JwtError> {
        let access_token = self.create_token(user_id, TokenType::Access, self.access_ttl)?;
        let refresh_token = self.create_token(user_id, TokenType::Refresh, self.refresh_ttl)?;
        let refresh_token_hash = hash_refresh_token(&refresh_token);

        Ok(IssuedSession {
            pair: TokenPair {
                access_token,
                refresh_token,
            },
            refresh_token_hash,
        })
    }

    /// Verifies an access token and returns its subject
    ///
    /// A refresh token presented here is [`JwtError::Malformed`].
    pub fn verify_access_token(&self, token: &str) -> Result<Uuid, JwtError> {
        let claims = self.verify(token, TokenType::Access)?;
        Ok(claims.sub)
    }

    /// Verifies a refresh token and returns its claims
    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.verify(token, TokenType::Refresh)
    }

    fn create_token(
        &self,
        user_id: Uuid,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<String, JwtError> {
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| JwtError::CreateError("Token lifetime out of range".to_string()))?;
        let claims = Claims {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4(),
            token_type,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
    }

    fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);
        // Time checks run against the injected clock below
        validation.validate_exp = false;
        validation.validate_nbf = false;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::BadSignature,
                _ => JwtError::Malformed(e.to_string()),
            })?
            .claims;

        let now = self.clock.now().timestamp();
        if now >= claims.exp || now < claims.nbf {
            return Err(JwtError::Expired);
        }

        if claims.token_type != expected {
            return Err(JwtError::Malformed(format!(
                "Expected {} token, got {} token",
                expected.as_str(),
                claims.token_type.as_str()
            )));
        }

        Ok(claims)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

/// SHA-256 hex digest of a refresh token, as persisted on the user
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
