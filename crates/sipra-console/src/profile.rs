//! Resolves the signed-in user's global profile.

use std::sync::Arc;

use sipra_core::{
  data::{DataService, fetch_maybe_single},
  query::Select,
  role::{PROFILE_COLUMNS, PROFILES_TABLE, Profile, Role},
};
use tokio::sync::watch;
use uuid::Uuid;

use crate::stage::{Sequencer, Stage, Ticket};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileState {
  /// The user the state belongs to; `None` once signed out.
  pub user_id: Option<Uuid>,
  pub loading: bool,
  pub profile: Stage<Profile>,
}

impl ProfileState {
  /// The profile, or `None` when absent, failed or not yet loaded.
  pub fn profile(&self) -> Option<&Profile> { self.profile.ready() }

  pub fn role(&self) -> Option<&Role> { self.profile().and_then(|p| p.role.as_ref()) }
}

/// Fetches the `profiles` row for a user. The most recently issued
/// [`resolve`](Self::resolve) wins; older completions are dropped.
pub struct ProfileResolver<D> {
  data:  Arc<D>,
  seq:   Sequencer,
  state: watch::Sender<ProfileState>,
}

impl<D> ProfileResolver<D> {
  pub fn watch(&self) -> watch::Receiver<ProfileState> { self.state.subscribe() }

  pub fn snapshot(&self) -> ProfileState { self.state.borrow().clone() }
}

impl<D: DataService> ProfileResolver<D> {
  pub fn new(data: Arc<D>) -> Self {
    Self {
      data,
      seq: Sequencer::new(),
      state: watch::Sender::new(ProfileState::default()),
    }
  }

  pub async fn resolve(&self, user_id: Option<Uuid>) {
    let ticket = self.seq.issue();
    let Some(user_id) = user_id else {
      self.commit(ticket, |_| ProfileState::default());
      return;
    };

    self.commit(ticket, |current| ProfileState {
      user_id: Some(user_id),
      loading: true,
      // Keep showing what we had for the same user while reloading.
      profile: if current.user_id == Some(user_id) {
        current.profile.clone()
      } else {
        Stage::Pending
      },
    });

    let query = Select::from(PROFILES_TABLE)
      .columns(PROFILE_COLUMNS)
      .eq("id", user_id.to_string());
    let result = fetch_maybe_single::<_, Profile>(&*self.data, &query).await;
    if let Err(e) = &result {
      tracing::warn!(user = %user_id, error = %e, "profile fetch failed");
    }

    self.commit(ticket, |_| ProfileState {
      user_id: Some(user_id),
      loading: false,
      profile: result.into(),
    });
  }

  /// Re-resolve the last requested user.
  pub async fn refresh(&self) {
    let user_id = self.state.borrow().user_id;
    self.resolve(user_id).await;
  }

  /// Apply `next` if `ticket` is still the newest request.
  fn commit(&self, ticket: Ticket, next: impl FnOnce(&ProfileState) -> ProfileState) {
    self.state.send_if_modified(|current| {
      if !self.seq.is_current(ticket) {
        return false;
      }
      let next = next(current);
      if *current == next {
        return false;
      }
      *current = next;
      true
    });
  }
}
