/// One-time tokens for email verification and password reset
///
/// A token is 20 random bytes, hex-encoded (40 characters), handed to the user
/// exactly once through a link. The store only ever sees a keyed digest:
/// hex HMAC-SHA256 of the token's UTF-8 bytes under the server's token pepper.
/// Issuance and lookup both go through [`OneTimeTokenIssuer::hash_one_time_token`], so a
/// freshly issued token always matches its own stored digest.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use chrono::Duration;
/// use projectcamp_shared::auth::one_time::OneTimeTokenIssuer;
/// use projectcamp_shared::clock::SystemClock;
///
/// let issuer = OneTimeTokenIssuer::new(
///     "pepper-that-is-at-least-32-bytes-long",
///     Duration::minutes(20),
///     Arc::new(SystemClock),
/// );
/// let token = issuer.issue();
/// assert_eq!(token.plaintext.len(), 40);
/// assert!(issuer.matches(&token.plaintext, &token.stored.hash));
/// ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::clock::Clock;
use crate::models::user::StoredToken;

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes in a token
pub const TOKEN_BYTES: usize = 20;

/// Plaintext token plus what gets persisted for it
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Sent to the user; never stored or logged
    pub plaintext: String,

    pub stored: StoredToken,
}

/// Issues and hashes one-time tokens
#[derive(Clone)]
pub struct OneTimeTokenIssuer {
    mac: HmacSha256,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl OneTimeTokenIssuer {
    pub fn new(pepper: &str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let mac = HmacSha256::new_from_slice(pepper.as_bytes()).expect("HMAC accepts any key length");
        Self { mac, ttl, clock }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generates a fresh token expiring `ttl` from now
    ///
    /// An expiry past the representable range is clamped to the maximum.
    pub fn issue(&self) -> IssuedToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let plaintext = hex::encode(bytes);

        let stored = StoredToken {
            hash: self.hash_one_time_token(&plaintext),
            expires_at: self
                .clock
                .now()
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        IssuedToken { plaintext, stored }
    }

    /// Keyed digest of a plaintext token
    pub fn hash_one_time_token(&self, plaintext: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(plaintext.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time comparison of a plaintext token against a stored digest
    pub fn matches(&self, plaintext: &str, stored_hash: &str) -> bool {
        compare_token_hash(&self.hash_one_time_token(plaintext), stored_hash)
    }
}

impl std::fmt::Debug for OneTimeTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneTimeTokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Constant-time equality for token digests
pub fn compare_token_hash(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const PEPPER: &str = "test-pepper-that-is-long-enough-00";

    fn issuer(clock: Arc<ManualClock>) -> OneTimeTokenIssuer {
        OneTimeTokenIssuer::new(PEPPER, Duration::minutes(20), clock)
    }

    #[test]
    fn test_issue_shape_and_expiry() {
        let clock = Arc::new(ManualClock::default());
        let issuer = issuer(clock.clone());
        let token = issuer.issue();

        assert_eq!(token.plaintext.len(), 40);
        assert!(token.plaintext.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token.stored.hash.len(), 64);
        assert_eq!(token.stored.expires_at, clock.now() + Duration::minutes(20));
        assert_ne!(token.stored.hash, token.plaintext);
    }

    #[test]
    fn test_expiry_past_range_is_clamped() {
        let issuer = OneTimeTokenIssuer::new(
            PEPPER,
            Duration::days(100_000_000),
            Arc::new(ManualClock::default()),
        );
        assert_eq!(issuer.issue().stored.expires_at, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_issued_token_matches_own_hash() {
        let issuer = issuer(Arc::new(ManualClock::default()));
        let token = issuer.issue();

        assert_eq!(issuer.hash_one_time_token(&token.plaintext), token.stored.hash);
        assert!(issuer.matches(&token.plaintext, &token.stored.hash));
        assert!(!issuer.matches(&issuer.issue().plaintext, &token.stored.hash));
    }

    #[test]
    fn test_hash_depends_on_pepper() {
        let clock = Arc::new(ManualClock::default());
        let other = OneTimeTokenIssuer::new(
            "different-pepper-that-is-long-enough",
            Duration::minutes(20),
            clock.clone(),
        );
        let token = issuer(clock).issue();
        assert_ne!(other.hash_one_time_token(&token.plaintext), token.stored.hash);
    }

    #[test]
    fn test_compare_token_hash() {
        assert!(compare_token_hash("abc", "abc"));
        assert!(!compare_token_hash("abc", "abd"));
        assert!(!compare_token_hash("abc", "abcd"));
    }
}
