//! The process-wide pipeline: session store plus both resolvers, wired so
//! that every user change re-resolves profile and area.

use std::sync::Arc;

use sipra_core::{area::DEFAULT_AREA_CODE, auth::AuthService, data::DataService};
use tokio::{sync::watch, task::JoinSet};
use uuid::Uuid;

use crate::{
  area::{AreaResolver, AreaState},
  profile::{ProfileResolver, ProfileState},
  session::{SessionState, SessionStore},
  view::Access,
};

#[derive(Debug, Clone)]
pub struct ContextConfig {
  /// Code of the area every screen is scoped to.
  pub area_code: String,
}

impl Default for ContextConfig {
  fn default() -> Self {
    Self {
      area_code: DEFAULT_AREA_CODE.to_owned(),
    }
  }
}

/// A consistent read of the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
  pub session: SessionState,
  pub profile: ProfileState,
  pub area:    AreaState,
}

impl Snapshot {
  /// True once boot is over and both resolvers have finished for the
  /// current user.
  pub fn is_settled(&self) -> bool {
    let user_id = self.session.user_id();
    !self.session.booting
      && self.profile.user_id == user_id
      && !self.profile.loading
      && self.area.user_id == user_id
      && !self.area.loading
  }

  /// Events are gated by the global profile role.
  pub fn events_access(&self) -> Access {
    Access {
      role:    self.profile.role().cloned(),
      user_id: self.session.user_id(),
      area_id: self.area.area_id(),
    }
  }

  /// Registros are gated by the role within the active area.
  pub fn registros_access(&self) -> Access {
    Access {
      role:    self.area.role().cloned(),
      user_id: self.session.user_id(),
      area_id: self.area.area_id(),
    }
  }
}

/// Owns the session store and the resolvers for the life of the process.
pub struct AppContext<A, D> {
  session: Arc<SessionStore<A>>,
  profile: Arc<ProfileResolver<D>>,
  area:    Arc<AreaResolver<D>>,
  tasks:   JoinSet<()>,
}

impl<A, D> AppContext<A, D>
where
  A: AuthService + 'static,
  D: DataService + 'static,
{
  pub fn start(auth: Arc<A>, data: Arc<D>, config: ContextConfig) -> Self {
    let session = Arc::new(SessionStore::start(auth));
    let profile = Arc::new(ProfileResolver::new(data.clone()));
    let area = Arc::new(AreaResolver::new(data, config.area_code));

    let mut tasks = JoinSet::new();
    tasks.spawn(follow_user(session.watch(), profile.clone(), area.clone()));

    Self {
      session,
      profile,
      area,
      tasks,
    }
  }
}

impl<A, D> AppContext<A, D> {
  pub fn session(&self) -> &SessionStore<A> { &self.session }

  pub fn profile(&self) -> &ProfileResolver<D> { &self.profile }

  pub fn area(&self) -> &AreaResolver<D> { &self.area }

  pub fn snapshot(&self) -> Snapshot {
    Snapshot {
      session: self.session.snapshot(),
      profile: self.profile.snapshot(),
      area:    self.area.snapshot(),
    }
  }

  /// Wait until [`Snapshot::is_settled`] holds.
  pub async fn settled(&self) -> Snapshot {
    let mut session = self.session.watch();
    let mut profile = self.profile.watch();
    let mut area = self.area.watch();
    loop {
      let snapshot = self.snapshot();
      if snapshot.is_settled() {
        return snapshot;
      }
      let closed = tokio::select! {
        r = session.changed() => r.is_err(),
        r = profile.changed() => r.is_err(),
        r = area.changed() => r.is_err(),
      };
      if closed {
        return self.snapshot();
      }
    }
  }

  /// Stop the subscription and the wiring task.
  pub async fn shutdown(mut self) {
    self.session.dispose();
    self.tasks.shutdown().await;
  }
}

/// Re-resolve profile and area every time the settled user id changes.
/// Resolutions may overlap; the resolvers keep only the newest.
async fn follow_user<D: DataService + 'static>(
  mut session: watch::Receiver<SessionState>,
  profile: Arc<ProfileResolver<D>>,
  area: Arc<AreaResolver<D>>,
) {
  let mut resolved: Option<Option<Uuid>> = None;
  let mut in_flight = JoinSet::new();

  loop {
    let state = session.borrow_and_update().clone();
    if !state.booting {
      let user_id = state.user_id();
      if resolved != Some(user_id) {
        resolved = Some(user_id);
        tracing::debug!(user = ?user_id, "resolving profile and area");
        let (profile, area) = (profile.clone(), area.clone());
        in_flight.spawn(async move {
          tokio::join!(profile.resolve(user_id), area.resolve(user_id));
        });
      }
    }
    while in_flight.try_join_next().is_some() {}

    if session.changed().await.is_err() {
      break;
    }
  }
}
