//! Resolves the active area and the signed-in user's role within it.

use std::sync::Arc;

use sipra_core::{
  area::{AREA_COLUMNS, AREA_ROLE_COLUMNS, AREA_ROLES_TABLE, AREAS_TABLE, Area, AreaRole},
  data::{DataService, fetch_maybe_single},
  query::Select,
  role::Role,
};
use tokio::sync::watch;
use uuid::Uuid;

use crate::stage::{Sequencer, Stage, Ticket};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaState {
  pub user_id: Option<Uuid>,
  pub loading: bool,
  pub area:    Stage<Area>,
  /// [`Stage::Empty`] without a lookup when there is no area.
  pub role:    Stage<AreaRole>,
}

impl AreaState {
  pub fn area(&self) -> Option<&Area> { self.area.ready() }

  pub fn area_id(&self) -> Option<Uuid> { self.area().map(|a| a.id) }

  pub fn role(&self) -> Option<&Role> { self.role.ready().map(|r| &r.role) }
}

/// Looks up the area with a fixed code, then the `(user, area)` role grant.
///
/// Both lookups finish before anything is published, so readers never see
/// a new area paired with the previous role.
pub struct AreaResolver<D> {
  data:      Arc<D>,
  area_code: String,
  seq:       Sequencer,
  state:     watch::Sender<AreaState>,
}

impl<D> AreaResolver<D> {
  pub fn watch(&self) -> watch::Receiver<AreaState> { self.state.subscribe() }

  pub fn snapshot(&self) -> AreaState { self.state.borrow().clone() }
}

impl<D: DataService> AreaResolver<D> {
  pub fn new(data: Arc<D>, area_code: impl Into<String>) -> Self {
    Self {
      data,
      area_code: area_code.into(),
      seq: Sequencer::new(),
      state: watch::Sender::new(AreaState::default()),
    }
  }

  pub fn area_code(&self) -> &str { &self.area_code }

  pub async fn resolve(&self, user_id: Option<Uuid>) {
    let ticket = self.seq.issue();
    let Some(user_id) = user_id else {
      self.commit(ticket, |_| AreaState::default());
      return;
    };

    self.commit(ticket, |current| {
      if current.user_id == Some(user_id) {
        AreaState {
          loading: true,
          ..current.clone()
        }
      } else {
        AreaState {
          user_id: Some(user_id),
          loading: true,
          ..AreaState::default()
        }
      }
    });

    let area = self.lookup_area().await;
    if !self.seq.is_current(ticket) {
      return;
    }
    let role = match area.ready() {
      Some(area) => self.lookup_role(user_id, area.id).await,
      None => Stage::Empty,
    };

    self.commit(ticket, |_| AreaState {
      user_id: Some(user_id),
      loading: false,
      area,
      role,
    });
  }

  /// Re-resolve the last requested user.
  pub async fn refresh(&self) {
    let user_id = self.state.borrow().user_id;
    self.resolve(user_id).await;
  }

  async fn lookup_area(&self) -> Stage<Area> {
    let query = Select::from(AREAS_TABLE)
      .columns(AREA_COLUMNS)
      .eq("codigo", self.area_code.as_str());
    let result = fetch_maybe_single::<_, Area>(&*self.data, &query).await;
    match &result {
      Err(e) => tracing::warn!(code = %self.area_code, error = %e, "area fetch failed"),
      Ok(None) => tracing::info!(code = %self.area_code, "no area with this code"),
      Ok(Some(_)) => {}
    }
    result.into()
  }

  async fn lookup_role(&self, user_id: Uuid, area_id: Uuid) -> Stage<AreaRole> {
    let query = Select::from(AREA_ROLES_TABLE)
      .columns(AREA_ROLE_COLUMNS)
      .eq("user_id", user_id.to_string())
      .eq("area_id", area_id.to_string());
    let result = fetch_maybe_single::<_, AreaRole>(&*self.data, &query).await;
    if let Err(e) = &result {
      tracing::warn!(user = %user_id, area = %area_id, error = %e, "area role fetch failed");
    }
    result.into()
  }

  fn commit(&self, ticket: Ticket, next: impl FnOnce(&AreaState) -> AreaState) {
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
