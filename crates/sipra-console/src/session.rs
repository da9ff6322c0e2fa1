//! The session store: boot-time restoration, sign-in/out and change fan-out.
//!
//! One background task owns every state transition. It subscribes to the
//! auth collaborator *before* asking for the boot session, so no change can
//! slip between the two, and it is the only writer of the published state,
//! so subscribers see transitions in the order they happened.

use std::{
  pin::pin,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use sipra_core::{
  AuthError,
  auth::{AuthService, AuthSubscription, Session, UserIdentity},
};
use tokio::{
  sync::{
    Notify,
    broadcast::{self, error::RecvError, error::TryRecvError},
    watch,
  },
  task::JoinHandle,
};
use uuid::Uuid;

/// What the rest of the console knows about authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
  /// True until the boot-time session lookup has settled.
  pub booting: bool,
  pub session: Option<Session>,
}

impl Default for SessionState {
  fn default() -> Self {
    Self {
      booting: true,
      session: None,
    }
  }
}

impl SessionState {
  fn settled(session: Option<Session>) -> Self {
    Self {
      booting: false,
      session,
    }
  }

  pub fn user(&self) -> Option<&UserIdentity> { self.session.as_ref().map(|s| &s.user) }

  pub fn user_id(&self) -> Option<Uuid> { self.user().map(|u| u.id) }
}

// ─── Shared state ────────────────────────────────────────────────────────────

struct Shared {
  state:       watch::Sender<SessionState>,
  transitions: broadcast::Sender<SessionState>,
  /// Sign-in calls that have not settled yet.
  sign_ins:    AtomicUsize,
  settled:     Notify,
}

impl Shared {
  /// Publish `next` unless it equals the current state.
  fn publish(&self, next: SessionState) {
    let changed = self.state.send_if_modified(|current| {
      if *current == next {
        return false;
      }
      *current = next.clone();
      true
    });
    if changed {
      tracing::info!(
        booting = next.booting,
        user = ?next.user_id(),
        "session state changed"
      );
      let _ = self.transitions.send(next);
    }
  }
}

/// Counts a sign-in as in flight until dropped, including on cancellation.
struct InFlight<'a>(&'a Shared);

impl<'a> InFlight<'a> {
  fn enter(shared: &'a Shared) -> Self {
    shared.sign_ins.fetch_add(1, Ordering::SeqCst);
    Self(shared)
  }
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    self.0.sign_ins.fetch_sub(1, Ordering::SeqCst);
    self.0.settled.notify_waiters();
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Holds the current session and notifies dependents when it changes.
///
/// State is exposed two ways: [`watch`](Self::watch) for the latest value
/// and [`transitions`](Self::transitions) for every change, each published
/// exactly once.
pub struct SessionStore<A> {
  auth:   Arc<A>,
  shared: Arc<Shared>,
  task:   JoinHandle<()>,
}

impl<A: AuthService + 'static> SessionStore<A> {
  /// Subscribe to `auth`, then restore the boot session in the background.
  pub fn start(auth: Arc<A>) -> Self {
    let events = auth.subscribe();
    let (state, _) = watch::channel(SessionState::default());
    let (transitions, _) = broadcast::channel(64);
    let shared = Arc::new(Shared {
      state,
      transitions,
      sign_ins: AtomicUsize::new(0),
      settled: Notify::new(),
    });
    let task = tokio::spawn(drive(auth.clone(), shared.clone(), events));
    Self { auth, shared, task }
  }

  /// Forward credentials to the auth collaborator. The resulting state
  /// change arrives through the subscription, not from this call.
  pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
    let _in_flight = InFlight::enter(&self.shared);
    match self.auth.sign_in_with_password(email, password).await {
      Ok(_) => Ok(()),
      Err(e) => {
        tracing::info!(error = %e, "sign-in failed");
        Err(e)
      }
    }
  }

  /// Ask the auth collaborator to end the session. State is cleared when
  /// the sign-out event arrives.
  pub async fn sign_out(&self) -> Result<(), AuthError> {
    self.auth.sign_out().await.inspect_err(|e| {
      tracing::warn!(error = %e, "sign-out failed");
    })
  }
}

impl<A> SessionStore<A> {
  pub fn watch(&self) -> watch::Receiver<SessionState> { self.shared.state.subscribe() }

  pub fn transitions(&self) -> broadcast::Receiver<SessionState> { self.shared.transitions.subscribe() }

  pub fn snapshot(&self) -> SessionState { self.shared.state.borrow().clone() }

  /// Wait until boot has settled and return the state at that point.
  pub async fn booted(&self) -> SessionState {
    let mut rx = self.watch();
    match rx.wait_for(|s| !s.booting).await {
      Ok(state) => state.clone(),
      Err(_) => self.snapshot(),
    }
  }

  /// Stop listening to the auth collaborator. The last state stays readable.
  pub fn dispose(&self) { self.task.abort(); }
}

impl<A> Drop for SessionStore<A> {
  fn drop(&mut self) { self.task.abort(); }
}

// ─── Driver ──────────────────────────────────────────────────────────────────

async fn drive<A: AuthService>(auth: Arc<A>, shared: Arc<Shared>, mut events: AuthSubscription) {
  let mut session = boot(&*auth, &shared, &mut events).await;

  // Anything that arrived while boot was settling is newer than boot.
  loop {
    match events.try_recv() {
      Ok(event) => session = event.session,
      Err(TryRecvError::Lagged(missed)) => {
        tracing::warn!(missed, "auth events dropped during boot");
        session = resync(&*auth).await;
      }
      Err(TryRecvError::Empty | TryRecvError::Closed) => break,
    }
  }
  shared.publish(SessionState::settled(session));

  loop {
    match events.recv().await {
      Ok(event) => {
        tracing::debug!(change = %event.change, "auth event");
        shared.publish(SessionState::settled(event.session));
      }
      Err(RecvError::Lagged(missed)) => {
        tracing::warn!(missed, "auth events dropped, resyncing");
        shared.publish(SessionState::settled(resync(&*auth).await));
      }
      Err(RecvError::Closed) => break,
    }
  }
}

/// Resolve the boot session. An auth event that lands first wins over the
/// lookup. A boot that finds no session while a sign-in is in flight waits
/// for that sign-in, so the state never passes through signed-out on its
/// way to signed-in.
async fn boot<A: AuthService>(
  auth: &A,
  shared: &Shared,
  events: &mut AuthSubscription,
) -> Option<Session> {
  let mut lookup = pin!(auth.get_session());
  let booted = tokio::select! {
    result = &mut lookup => match result {
      Ok(session) => session,
      Err(e) => {
        tracing::warn!(error = %e, "boot session lookup failed");
        None
      }
    },
    event = events.recv() => match event {
      Ok(event) => return event.session,
      Err(_) => return resync(auth).await,
    },
  };

  if booted.is_some() {
    return booted;
  }
  loop {
    let settled = shared.settled.notified();
    if shared.sign_ins.load(Ordering::SeqCst) == 0 {
      return None;
    }
    tokio::select! {
      _ = settled => {}
      event = events.recv() => match event {
        Ok(event) => return event.session,
        Err(_) => return resync(auth).await,
      },
    }
  }
}

async fn resync<A: AuthService>(auth: &A) -> Option<Session> {
  auth.get_session().await.unwrap_or_else(|e| {
    tracing::warn!(error = %e, "session resync failed");
    None
  })
}
