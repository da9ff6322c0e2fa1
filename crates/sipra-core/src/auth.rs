//! Sessions, user identity and the [`AuthService`] trait.
//!
//! The auth collaborator owns the session. Consumers observe it through a
//! broadcast subscription ([`AuthService::subscribe`]) and never mutate it
//! directly.

use std::{
  future::Future,
  sync::{PoisonError, RwLock},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::AuthError;

// ─── Identity & session ──────────────────────────────────────────────────────

/// The signed-in user. Derived from a [`Session`]; has no lifecycle of its
/// own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
  pub id:    Uuid,
  #[serde(default)]
  pub email: Option<String>,
}

/// An authenticated session as handed out by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub access_token:  String,
  pub refresh_token: String,
  pub expires_at:    DateTime<Utc>,
  pub user:          UserIdentity,
}

impl Session {
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool { now >= self.expires_at }
}

// ─── Change notifications ────────────────────────────────────────────────────

/// Why the auth collaborator's session changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChange {
  SignedIn,
  SignedOut,
  TokenRefreshed,
}

/// A single session change pushed to subscribers.
#[derive(Debug, Clone)]
pub struct AuthEvent {
  pub change:  AuthChange,
  pub session: Option<Session>,
}

/// Receiving end of an auth subscription. Dropping it unsubscribes.
pub type AuthSubscription = broadcast::Receiver<AuthEvent>;

/// Shared session slot plus change fan-out, used by auth backends.
///
/// `set` publishes an [`AuthEvent`]; `restore` updates the slot silently
/// (boot-time restoration is reported through `get_session`, not as an
/// event).
#[derive(Debug)]
pub struct SessionCell {
  current: RwLock<Option<Session>>,
  events:  broadcast::Sender<AuthEvent>,
}

impl Default for SessionCell {
  fn default() -> Self { Self::new() }
}

impl SessionCell {
  pub fn new() -> Self {
    let (events, _) = broadcast::channel(32);
    Self {
      current: RwLock::new(None),
      events,
    }
  }

  pub fn get(&self) -> Option<Session> {
    self
      .current
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn user(&self) -> Option<UserIdentity> { self.get().map(|s| s.user) }

  pub fn restore(&self, session: Option<Session>) {
    *self.current.write().unwrap_or_else(PoisonError::into_inner) = session;
  }

  /// Fill an empty slot without notifying anyone. Returns whatever the slot
  /// holds afterwards, so a session set concurrently by a sign-in wins over
  /// one read back from storage.
  pub fn restore_if_vacant(&self, session: Session) -> Session {
    let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
    slot.get_or_insert(session).clone()
  }

  /// Replace the session and notify subscribers. The slot is updated before
  /// the event is sent, so a subscriber reacting to it reads the new value.
  pub fn set(&self, change: AuthChange, session: Option<Session>) {
    self.restore(session.clone());
    tracing::debug!(%change, "auth state changed");
    // No subscribers is not an error.
    let _ = self.events.send(AuthEvent { change, session });
  }

  pub fn subscribe(&self) -> AuthSubscription { self.events.subscribe() }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the remote authentication endpoint.
///
/// Implementations must publish the [`AuthEvent`] for a successful sign-in or
/// sign-out *before* the corresponding future resolves.
pub trait AuthService: Send + Sync {
  /// Restore the current session, if any (from memory or persisted storage).
  fn get_session(
    &self,
  ) -> impl Future<Output = Result<Option<Session>, AuthError>> + Send + '_;

  /// Subscribe to session changes.
  fn subscribe(&self) -> AuthSubscription;

  fn sign_in_with_password<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<Session, AuthError>> + Send + 'a;

  fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send + '_;

  /// Synchronous read of the cached session's user.
  fn current_user(&self) -> Option<UserIdentity>;
}
