//! # ProjectCamp API Server Library
//!
//! HTTP surface for the ProjectCamp authentication core.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: JSON body extractors with API error rejections
//! - `middleware`: Authentication, project authorization and security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
