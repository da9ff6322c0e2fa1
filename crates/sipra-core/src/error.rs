//! Error types for `sipra-core`.

use thiserror::Error;

/// Failure of an authentication call (sign-in, sign-out, session restore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
  #[error("invalid login credentials")]
  InvalidCredentials,

  #[error("network error: {0}")]
  Network(String),

  #[error("auth service error ({status}): {message}")]
  Remote { status: u16, message: String },

  #[error("session storage error: {0}")]
  Storage(String),
}

/// Failure of a data-service call or of decoding its rows.
#[derive(Debug, Error)]
pub enum Error {
  #[error("network error: {0}")]
  Network(String),

  /// The service refused the operation for the current session.
  #[error("permission denied: {0}")]
  PermissionDenied(String),

  #[error("{message}")]
  Remote {
    status:  u16,
    code:    Option<String>,
    message: String,
  },

  #[error("expected at most one row, got {0}")]
  MultipleRows(usize),

  #[error("invalid column or table name: {0:?}")]
  InvalidIdentifier(String),

  #[error("row is not a JSON object")]
  NotAnObject,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("auth error: {0}")]
  Auth(#[from] AuthError),

  #[error("storage error: {0}")]
  Storage(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
