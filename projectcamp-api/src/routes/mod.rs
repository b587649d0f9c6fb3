/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `users`: Account, session, verification and password endpoints
/// - `projects`: Project creation and membership management

pub mod health;
pub mod projects;
pub mod users;
