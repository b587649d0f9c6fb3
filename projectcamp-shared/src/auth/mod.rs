/// Authentication and authorization primitives
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength policy
/// - [`jwt`]: Session token codec (HS256 access and refresh tokens)
/// - [`one_time`]: Email verification and password reset tokens
/// - [`gate`]: Access-control gate (authentication, project authorization)
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations
/// - **Session Tokens**: HS256, expiry checked against an injected clock
/// - **Refresh Tokens**: single live token per user, stored as a SHA-256 digest
/// - **One-time Tokens**: stored as HMAC-SHA256 under a server-side pepper
/// - **Constant-time Comparison**: every digest comparison uses `subtle`
///
/// # Example
///
/// ```
/// use projectcamp_shared::auth::password::{hash_password, verify_password, PasswordParams};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Secret#123", &PasswordParams::low_cost())?;
/// assert!(verify_password("Secret#123", &hash)?);
/// # Ok(())
/// # }
/// ```

pub mod gate;
pub mod jwt;
pub mod one_time;
pub mod password;
