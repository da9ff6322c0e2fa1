//! Core types and trait definitions for the SIPRA console.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! describes the two collaborators every other crate talks to (the auth
//! service and the table-oriented data service) and the domain rows that
//! flow through them.

pub mod area;
pub mod auth;
pub mod data;
pub mod error;
pub mod query;
pub mod record;
pub mod role;

pub use error::{AuthError, Error, Result};
