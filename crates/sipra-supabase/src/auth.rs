//! GoTrue session handling: password grant, refresh, logout and the session
//! file.

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use sipra_core::{
  AuthError,
  auth::{AuthChange, AuthService, AuthSubscription, Session, UserIdentity},
};

use crate::{
  Error, Result, SupabaseClient,
  client::check,
  persist,
};

/// Token lifetime assumed when the service reports none.
const DEFAULT_EXPIRES_IN: i64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token:  String,
  refresh_token: String,
  #[serde(default)]
  expires_in:    Option<i64>,
  /// Unix seconds.
  #[serde(default)]
  expires_at:    Option<i64>,
  user:          TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
  id:    Uuid,
  #[serde(default)]
  email: Option<String>,
}

impl TokenResponse {
  fn into_session(self, now: DateTime<Utc>) -> Session {
    let expires_at = self
      .expires_at
      .and_then(|secs| DateTime::from_timestamp(secs, 0))
      .unwrap_or_else(|| now + Duration::seconds(self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN)));
    Session {
      access_token: self.access_token,
      refresh_token: self.refresh_token,
      expires_at,
      user: UserIdentity {
        id:    self.user.id,
        email: self.user.email,
      },
    }
  }
}

fn is_bad_credentials(code: Option<&str>) -> bool {
  matches!(code, Some("invalid_grant" | "invalid_credentials"))
}

impl SupabaseClient {
  /// `POST /auth/v1/token?grant_type=<grant>`
  async fn token_grant(&self, grant: &str, body: serde_json::Value) -> Result<Session> {
    tracing::debug!(grant, "token request");
    let resp = self
      .request(Method::POST, self.auth_url("/token"), &self.config.anon_key)
      .query(&[("grant_type", grant)])
      .json(&body)
      .send()
      .await?;

    let resp = match check(resp).await {
      Err(Error::Status {
        status: 400,
        code,
        ..
      }) if is_bad_credentials(code.as_deref()) => return Err(Error::InvalidCredentials),
      other => other?,
    };
    let token: TokenResponse = resp.json().await?;
    Ok(token.into_session(Utc::now()))
  }

  async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
    self
      .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
      .await
  }

  /// Mirror `session` into the session file, if one is configured. Failures
  /// are logged; the in-memory session stays authoritative.
  async fn persist(&self, session: Option<&Session>) {
    let Some(path) = &self.config.session_file else {
      return;
    };
    let result = match session {
      Some(session) => persist::save(path, session).await,
      None => persist::clear(path).await,
    };
    if let Err(e) = result {
      tracing::warn!(path = %path.display(), error = %e, "could not update session file");
    }
  }

  /// The cached session, refreshed first when it has expired. A refresh
  /// token the service rejects ends the session.
  pub(crate) async fn fresh_session(&self) -> Result<Option<Session>> {
    let Some(session) = self.session.get() else {
      return Ok(None);
    };
    if !session.is_expired_at(Utc::now()) {
      return Ok(Some(session));
    }

    let _refreshing = self.refresh.lock().await;
    match self.session.get() {
      None => return Ok(None),
      // Someone else refreshed while we waited.
      Some(current) if current.refresh_token != session.refresh_token => return Ok(Some(current)),
      Some(_) => {}
    }

    match self.refresh_session(&session.refresh_token).await {
      Ok(fresh) => {
        tracing::info!(user = %fresh.user.id, "session refreshed");
        self.persist(Some(&fresh)).await;
        self.session.set(AuthChange::TokenRefreshed, Some(fresh.clone()));
        Ok(Some(fresh))
      }
      Err(e) if e.is_rejection() => {
        tracing::info!(error = %e, "refresh token rejected, signing out");
        self.persist(None).await;
        self.session.set(AuthChange::SignedOut, None);
        Ok(None)
      }
      Err(e) => Err(e),
    }
  }

  /// Bearer token for table requests: the session's, or the anon key.
  pub(crate) async fn bearer(&self) -> Result<String> {
    Ok(match self.fresh_session().await? {
      Some(session) => session.access_token,
      None => self.config.anon_key.clone(),
    })
  }

  /// Read the session file at boot, refreshing a stored session that has
  /// expired. Restoration does not notify subscribers.
  async fn restore_from_file(&self) -> Result<Option<Session>> {
    let Some(path) = &self.config.session_file else {
      return Ok(None);
    };
    let Some(stored) = persist::load(path).await? else {
      return Ok(None);
    };
    if !stored.is_expired_at(Utc::now()) {
      return Ok(Some(self.session.restore_if_vacant(stored)));
    }

    match self.refresh_session(&stored.refresh_token).await {
      Ok(fresh) => {
        self.persist(Some(&fresh)).await;
        Ok(Some(self.session.restore_if_vacant(fresh)))
      }
      Err(e) if e.is_rejection() => {
        tracing::info!(error = %e, "stored session could not be refreshed");
        self.persist(None).await;
        Ok(None)
      }
      Err(e) => Err(e),
    }
  }
}

// ─── AuthService impl ────────────────────────────────────────────────────────

impl AuthService for SupabaseClient {
  async fn get_session(&self) -> Result<Option<Session>, AuthError> {
    if self.session.get().is_some() {
      return Ok(self.fresh_session().await?);
    }
    Ok(self.restore_from_file().await?)
  }

  fn subscribe(&self) -> AuthSubscription { self.session.subscribe() }

  async fn sign_in_with_password<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> Result<Session, AuthError> {
    let session = self
      .token_grant("password", json!({ "email": email.trim(), "password": password }))
      .await?;
    tracing::info!(user = %session.user.id, "signed in");
    self.persist(Some(&session)).await;
    self.session.set(AuthChange::SignedIn, Some(session.clone()));
    Ok(session)
  }

  /// A logout the service answers with 401/403/404 means the session is
  /// already gone there; any other failure keeps the local session.
  async fn sign_out(&self) -> Result<(), AuthError> {
    let Some(session) = self.session.get() else {
      return Ok(());
    };
    let resp = self
      .request(Method::POST, self.auth_url("/logout"), &session.access_token)
      .send()
      .await
      .map_err(Error::from)?;
    match check(resp).await {
      Ok(_) => {}
      Err(Error::Status {
        status: 401 | 403 | 404,
        ..
      }) => tracing::info!("session already ended on the server"),
      Err(e) => return Err(e.into()),
    }

    tracing::info!(user = %session.user.id, "signed out");
    self.persist(None).await;
    self.session.set(AuthChange::SignedOut, None);
    Ok(())
  }

  fn current_user(&self) -> Option<UserIdentity> { self.session.user() }
}
