use std::{path::PathBuf, time::Duration};

/// Request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for a Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
  /// Project base URL, e.g. `https://xyz.supabase.co`.
  pub url:          String,
  /// The public anon key. Sent as `apikey` on every request, and as the
  /// bearer token while signed out.
  pub anon_key:     String,
  pub timeout:      Duration,
  /// Where the session is persisted between runs. `None` keeps it in memory.
  pub session_file: Option<PathBuf>,
}

impl SupabaseConfig {
  pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
    Self {
      url:          url.into(),
      anon_key:     anon_key.into(),
      timeout:      DEFAULT_TIMEOUT,
      session_file: None,
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
    self.session_file = Some(path.into());
    self
  }
}
