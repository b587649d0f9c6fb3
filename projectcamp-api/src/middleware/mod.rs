/// Middleware modules for the API server
///
/// This module contains custom middleware for:
/// - Authentication from cookie or bearer token
/// - Project membership authorization
/// - Security headers

pub mod auth;
pub mod project;
pub mod security;
