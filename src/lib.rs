//! Gatekeeper Backend Library
//!
//! Token-based authentication service: JWT access tokens, rotating
//! refresh tokens, and SQLite-backed credential storage.

pub mod auth;
pub mod middleware;
pub mod models;
