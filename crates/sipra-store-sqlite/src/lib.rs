//! SQLite backend for the SIPRA console.
//!
//! Implements both collaborator traits ([`AuthService`] and [`DataService`])
//! over a single SQLite file, so the console can run against a local
//! database during development and in tests. Table rows are stored as JSON
//! documents; filters are evaluated with `json_extract`.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.
//!
//! [`AuthService`]: sipra_core::auth::AuthService
//! [`DataService`]: sipra_core::data::DataService

mod auth;
mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteBackend;

#[cfg(test)]
mod tests;
