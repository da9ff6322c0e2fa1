//! Error type for `sipra-store-sqlite`.

use sipra_core::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] sipra_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("password hash error: {0}")]
  PasswordHash(String),

  #[error("a user with email {0:?} already exists")]
  DuplicateEmail(String),

  #[error("invalid login credentials")]
  InvalidCredentials,

  /// Writes are refused without a signed-in session.
  #[error("sign in required")]
  NotSignedIn,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for sipra_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(e) => e,
      Error::Json(e) => Self::Serialization(e),
      Error::NotSignedIn => Self::PermissionDenied(err.to_string()),
      other => Self::Storage(other.to_string()),
    }
  }
}

impl From<Error> for AuthError {
  fn from(err: Error) -> Self {
    match err {
      Error::InvalidCredentials => Self::InvalidCredentials,
      other => Self::Storage(other.to_string()),
    }
  }
}
