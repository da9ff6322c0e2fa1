//! The shared HTTP client and response checking.

use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use sipra_core::auth::SessionCell;
use tokio::sync::Mutex;

use crate::{Error, Result, SupabaseConfig};

/// Async client for one Supabase project.
///
/// Cheap to clone; clones share the HTTP connection pool and the session.
#[derive(Clone)]
pub struct SupabaseClient {
  pub(crate) http:    Client,
  pub(crate) config:  Arc<SupabaseConfig>,
  pub(crate) session: Arc<SessionCell>,
  /// Serialises token refreshes so concurrent callers share one.
  pub(crate) refresh: Arc<Mutex<()>>,
}

impl SupabaseClient {
  pub fn new(config: SupabaseConfig) -> Result<Self> {
    let http = Client::builder().timeout(config.timeout).build()?;
    Ok(Self {
      http,
      config: Arc::new(config),
      session: Arc::new(SessionCell::new()),
      refresh: Arc::new(Mutex::new(())),
    })
  }

  pub fn config(&self) -> &SupabaseConfig { &self.config }

  fn base(&self) -> &str { self.config.url.trim_end_matches('/') }

  pub(crate) fn auth_url(&self, path: &str) -> String { format!("{}/auth/v1{path}", self.base()) }

  pub(crate) fn rest_url(&self, table: &str) -> String { format!("{}/rest/v1/{table}", self.base()) }

  /// A request carrying the project key and `bearer` as the caller's token.
  pub(crate) fn request(&self, method: Method, url: String, bearer: &str) -> RequestBuilder {
    self
      .http
      .request(method, url)
      .header("apikey", &self.config.anon_key)
      .bearer_auth(bearer)
  }
}

// ─── Responses ───────────────────────────────────────────────────────────────

/// The union of GoTrue and PostgREST error bodies.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
  code:              Option<Value>,
  error_code:        Option<String>,
  error:             Option<String>,
  error_description: Option<String>,
  msg:               Option<String>,
  message:           Option<String>,
}

impl ErrorBody {
  fn code(&self) -> Option<String> {
    self
      .error_code
      .clone()
      .or_else(|| self.error.clone())
      .or_else(|| match &self.code {
        Some(Value::String(code)) => Some(code.clone()),
        _ => None,
      })
  }

  fn message(self) -> Option<String> {
    self
      .message
      .or(self.msg)
      .or(self.error_description)
      .or(self.error)
  }
}

/// Pass successful responses through; turn everything else into
/// [`Error::Status`].
pub(crate) async fn check(resp: Response) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }

  let text = resp.text().await.unwrap_or_default();
  let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
  let code = body.code();
  let message = body
    .message()
    .or_else(|| status.canonical_reason().map(str::to_owned))
    .unwrap_or_else(|| status.to_string());

  tracing::debug!(status = status.as_u16(), ?code, %message, "request rejected");
  Err(Error::Status {
    status: status.as_u16(),
    code,
    message,
  })
}
