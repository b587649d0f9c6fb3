/// Database layer for ProjectCamp
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: Schema migration runner
///
/// Queries live in [`crate::store::postgres`].

pub mod migrations;
pub mod pool;
