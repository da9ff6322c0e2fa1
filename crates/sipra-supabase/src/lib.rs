//! Remote backend for the SIPRA console.
//!
//! [`SupabaseClient`] implements both collaborator traits against a
//! Supabase-style service: the GoTrue auth endpoint (`/auth/v1`) for
//! [`AuthService`] and the PostgREST table API (`/rest/v1`) for
//! [`DataService`]. Row-level security is enforced by the service; this
//! crate only carries the caller's token.
//!
//! [`AuthService`]: sipra_core::auth::AuthService
//! [`DataService`]: sipra_core::data::DataService

mod auth;
mod client;
mod config;
mod persist;
mod rest;

pub mod error;

pub use client::SupabaseClient;
pub use config::{DEFAULT_TIMEOUT, SupabaseConfig};
pub use error::{Error, Result};
pub use rest::{encode_predicate, select_params};
