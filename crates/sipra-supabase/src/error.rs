//! Error type for `sipra-supabase`.

use sipra_core::AuthError;
use thiserror::Error;

/// PostgREST reports row-level security violations with this SQLSTATE.
const INSUFFICIENT_PRIVILEGE: &str = "42501";

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// A non-success response, with whatever the service said about it.
  #[error("service error ({status}): {message}")]
  Status {
    status:  u16,
    code:    Option<String>,
    message: String,
  },

  #[error("invalid login credentials")]
  InvalidCredentials,

  #[error("the service returned no row")]
  NoRowReturned,

  #[error("session file error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("core error: {0}")]
  Core(#[from] sipra_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Whether the service answered and refused, as opposed to being
  /// unreachable.
  pub fn is_rejection(&self) -> bool { matches!(self, Self::Status { .. } | Self::InvalidCredentials) }
}

impl From<Error> for sipra_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(e) => e,
      Error::Json(e) => Self::Serialization(e),
      Error::Http(e) => Self::Network(e.to_string()),
      Error::Status {
        status, message, ..
      } if status == 401 || status == 403 => Self::PermissionDenied(message),
      Error::Status {
        code: Some(code),
        message,
        ..
      } if code == INSUFFICIENT_PRIVILEGE => Self::PermissionDenied(message),
      Error::Status {
        status,
        code,
        message,
      } => Self::Remote {
        status,
        code,
        message,
      },
      Error::InvalidCredentials => Self::Auth(AuthError::InvalidCredentials),
      other => Self::Storage(other.to_string()),
    }
  }
}

impl From<Error> for AuthError {
  fn from(err: Error) -> Self {
    match err {
      Error::InvalidCredentials => Self::InvalidCredentials,
      Error::Http(e) => Self::Network(e.to_string()),
      Error::Status {
        status, message, ..
      } => Self::Remote { status, message },
      other => Self::Storage(other.to_string()),
    }
  }
}
