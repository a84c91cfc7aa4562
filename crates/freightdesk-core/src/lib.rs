//! freightdesk-core — client library for the Freightdesk logistics backend
//!
//! # Module layout
//! - `session`    — session manager: initialize / login / logout, observable state
//! - `auth`       — remote login collaborator, user and login result types
//! - `storage`    — durable key-value stores for session data
//! - `diff`       — normalization, equality and minimal partial-update payloads
//! - `resources`  — CRUD client for freights, farms and drivers
//! - `format`     — plate and name formatting
//! - `sort`       — record sorting
//! - `settings`   — client configuration
//! - `paths`      — data directory resolution
//! - `error`      — error types

pub mod auth;
pub mod diff;
pub mod error;
pub mod format;
pub mod paths;
pub mod resources;
pub mod session;
pub mod settings;
pub mod sort;
pub mod storage;

#[cfg(test)]
mod test_server;

pub use auth::{AuthApi, HttpAuthApi, LoginResult, User};
pub use error::{ApiError, ConfigError, DiffError, StoreError};
pub use session::{Navigator, SessionManager, SessionState};
pub use storage::{FileStore, MemoryStore, SessionStore};
