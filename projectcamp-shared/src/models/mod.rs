/// Records owned by the auth core
///
/// # Models
///
/// - `user`: User accounts, credentials and token state
/// - `membership`: Per-project role assignments consumed by the access gate
///
/// The global [`user::UserRole`] and the per-project
/// [`membership::ProjectRole`] are separate types on separate records and are
/// always resolved by separate lookups.

pub mod membership;
pub mod user;
