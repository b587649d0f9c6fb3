//! # ProjectCamp Shared Library
//!
//! This crate contains the authentication and authorization core used by the
//! ProjectCamp API server.
//!
//! ## Module Organization
//!
//! - `models`: User and project membership records
//! - `store`: Credential and membership store traits with in-memory and PostgreSQL backends
//! - `db`: PostgreSQL pool and migrations
//! - `auth`: Password hashing, session tokens, one-time tokens and the access gate
//! - `service`: Session management and email verification / password reset flows
//! - `mail`: Outbound mail collaborator
//! - `clock`: Injectable time source
//! - `error`: Core error taxonomy

pub mod auth;
pub mod clock;
pub mod db;
pub mod error;
pub mod mail;
pub mod models;
pub mod service;
pub mod store;

/// Current version of the ProjectCamp shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
