//! The session file: one JSON-encoded [`Session`], restored at boot.

use std::{io::ErrorKind, path::Path};

use sipra_core::auth::Session;

use crate::Result;

/// Read the stored session. A missing file is no session; an unreadable one
/// is logged and treated the same.
pub async fn load(path: &Path) -> Result<Option<Session>> {
  let bytes = match tokio::fs::read(path).await {
    Ok(bytes) => bytes,
    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(e.into()),
  };
  match serde_json::from_slice(&bytes) {
    Ok(session) => Ok(Some(session)),
    Err(e) => {
      tracing::warn!(path = %path.display(), error = %e, "ignoring malformed session file");
      Ok(None)
    }
  }
}

pub async fn save(path: &Path, session: &Session) -> Result<()> {
  if let Some(dir) = path.parent() {
    tokio::fs::create_dir_all(dir).await?;
  }
  tokio::fs::write(path, serde_json::to_vec_pretty(session)?).await?;
  Ok(())
}

pub async fn clear(path: &Path) -> Result<()> {
  match tokio::fs::remove_file(path).await {
    Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
    _ => Ok(()),
  }
}
