//! Record views: the list, filters and mutations behind the events and
//! registros screens.
//!
//! Permission checks here only spare the user a doomed request; the data
//! service makes the real decision and its refusals surface as messages.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use sipra_core::{
  data::{DataService, fetch_all},
  query::{RowMatch, timestamp_value},
  record::{Events, RecordFilter, RecordKind, Registros, Scope, list_query, status_value},
  role::{self, Role},
};
use thiserror::Error;
use uuid::Uuid;

/// Who is looking at a view, and with which role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Access {
  pub role:    Option<Role>,
  pub user_id: Option<Uuid>,
  pub area_id: Option<Uuid>,
}

impl Access {
  pub fn can_write(&self) -> bool { role::can_write(self.role.as_ref()) }

  fn scope(&self) -> Scope {
    Scope {
      user_id: self.user_id,
      area_id: self.area_id,
    }
  }
}

/// How a role is shown to the user; no role is distinct from any role.
pub fn role_label(role: Option<&Role>) -> &str { role.map_or("—", Role::as_str) }

#[derive(Debug, Error)]
pub enum ViewError {
  #[error("read-only access (role: {})", role_label(.0.as_ref()))]
  ReadOnly(Option<Role>),

  #[error("a title is required")]
  EmptyTitle,

  #[error("records of this kind cannot be deleted")]
  NotDeletable,

  #[error("record is already closed")]
  AlreadyClosed,

  #[error("record {0} is not in the list")]
  NotListed(Uuid),

  /// The service accepted the request but changed nothing, usually because
  /// row-level security filtered the target out.
  #[error("no record was changed")]
  NothingChanged,

  #[error("{0}")]
  Data(#[from] sipra_core::Error),
}

/// First half of a delete; pass it back to
/// [`confirm_delete`](RecordView::confirm_delete) once the user agrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePrompt {
  pub id:    Uuid,
  pub title: String,
}

impl DeletePrompt {
  pub fn question(&self) -> String { format!("Delete \"{}\"? This cannot be undone.", self.title) }
}

// ─── View ────────────────────────────────────────────────────────────────────

/// List and form state for one record kind.
pub struct RecordView<K: RecordKind, D> {
  data:    Arc<D>,
  access:  Access,
  filter:  RecordFilter<K::Status>,
  items:   Vec<K::Row>,
  loading: bool,
  message: Option<String>,
}

pub type EventsView<D> = RecordView<Events, D>;
pub type RegistrosView<D> = RecordView<Registros, D>;

impl<K: RecordKind, D: DataService> RecordView<K, D> {
  pub fn new(data: Arc<D>) -> Self {
    Self {
      data,
      access: Access::default(),
      filter: RecordFilter::default(),
      items: Vec::new(),
      loading: false,
      message: None,
    }
  }

  pub fn items(&self) -> &[K::Row] { &self.items }

  pub fn message(&self) -> Option<&str> { self.message.as_deref() }

  pub fn loading(&self) -> bool { self.loading }

  pub fn access(&self) -> &Access { &self.access }

  pub fn filter(&self) -> &RecordFilter<K::Status> { &self.filter }

  pub fn can_write(&self) -> bool { self.access.can_write() }

  pub fn item(&self, id: Uuid) -> Option<&K::Row> { self.items.iter().find(|row| K::id(row) == id) }

  /// Returns whether anything changed; callers reload when it did. A new
  /// user or area drops the rows listed for the previous one.
  pub fn set_access(&mut self, access: Access) -> bool {
    if self.access == access {
      return false;
    }
    if self.access.scope() != access.scope() {
      self.items.clear();
      self.message = None;
    }
    self.access = access;
    true
  }

  pub fn set_filter(&mut self, filter: RecordFilter<K::Status>) { self.filter = filter; }

  /// Area-scoped kinds need a user and an area before they can list.
  pub fn is_ready(&self) -> bool {
    K::AREA_COLUMN.is_none() || (self.access.user_id.is_some() && self.access.area_id.is_some())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Re-fetch the list with the current filters. Until
  /// [`is_ready`](Self::is_ready) the list stays empty.
  pub async fn load(&mut self) -> Result<(), ViewError> {
    if !self.is_ready() {
      self.items.clear();
      return Ok(());
    }
    self.loading = true;
    let query = list_query::<K>(&self.filter, self.access.area_id);
    let result = fetch_all::<_, K::Row>(&*self.data, &query).await;
    self.loading = false;

    match result {
      Ok(items) => {
        tracing::debug!(table = K::TABLE, count = items.len(), "list loaded");
        self.items = items;
        Ok(())
      }
      Err(e) => {
        tracing::warn!(table = K::TABLE, error = %e, "list load failed");
        self.items.clear();
        self.fail(e.into())
      }
    }
  }

  // ── Mutations ─────────────────────────────────────────────────────────────

  pub async fn create(&mut self, draft: &K::Draft) -> Result<(), ViewError> {
    self.check_write()?;
    self.check_title(K::draft_title(draft))?;

    let row = K::new_row(draft, &self.access.scope());
    if let Err(e) = self.data.insert(K::TABLE, row).await {
      return self.fail(e.into());
    }
    tracing::info!(table = K::TABLE, "record created");
    self.reload_after("Record created.").await
  }

  /// Replace the mutable fields of `id`. Moving a listed record into the
  /// closed status stamps the closure time; moving out of it clears the
  /// stamp. An unlisted record keeps whatever stamp it has.
  pub async fn update(&mut self, id: Uuid, draft: &K::Draft) -> Result<(), ViewError> {
    self.check_write()?;
    self.check_title(K::draft_title(draft))?;

    let was_closed = self.item(id).map(|row| K::status(row) == K::CLOSED);
    let closing = K::draft_status(draft) == K::CLOSED;
    let mut patch = K::edit_row(draft);
    match (was_closed, closing) {
      (Some(false), true) => {
        patch.insert(K::CLOSED_AT_COLUMN.into(), timestamp_value(Utc::now()));
      }
      (Some(true), false) => {
        patch.insert(K::CLOSED_AT_COLUMN.into(), Value::Null);
      }
      _ => {}
    }

    self.apply(id, patch).await?;
    tracing::info!(table = K::TABLE, %id, "record updated");
    self.reload_after("Record updated.").await
  }

  pub async fn close(&mut self, id: Uuid) -> Result<(), ViewError> {
    self.check_write()?;
    if self.item(id).is_some_and(|row| K::status(row) == K::CLOSED) {
      return self.fail(ViewError::AlreadyClosed);
    }

    let mut patch = sipra_core::query::Row::new();
    patch.insert(K::STATUS_COLUMN.into(), status_value(K::CLOSED));
    patch.insert(K::CLOSED_AT_COLUMN.into(), timestamp_value(Utc::now()));

    self.apply(id, patch).await?;
    tracing::info!(table = K::TABLE, %id, "record closed");
    self.reload_after("Record closed.").await
  }

  /// Start deleting `id`. Nothing is sent until the prompt is confirmed.
  pub fn begin_delete(&mut self, id: Uuid) -> Result<DeletePrompt, ViewError> {
    if !K::DELETABLE {
      return self.fail(ViewError::NotDeletable);
    }
    self.check_write()?;
    match self.item(id) {
      Some(row) => Ok(DeletePrompt {
        id,
        title: K::title(row).to_owned(),
      }),
      None => self.fail(ViewError::NotListed(id)),
    }
  }

  pub async fn confirm_delete(&mut self, prompt: DeletePrompt) -> Result<(), ViewError> {
    if !K::DELETABLE {
      return self.fail(ViewError::NotDeletable);
    }
    self.check_write()?;

    match self.data.delete(K::TABLE, &RowMatch::id(prompt.id)).await {
      Ok(rows) if rows.is_empty() => return self.fail(ViewError::NothingChanged),
      Ok(_) => {}
      Err(e) => return self.fail(e.into()),
    }
    tracing::info!(table = K::TABLE, id = %prompt.id, "record deleted");
    self.reload_after("Record deleted.").await
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  async fn apply(&mut self, id: Uuid, patch: sipra_core::query::Row) -> Result<(), ViewError> {
    match self.data.update(K::TABLE, &RowMatch::id(id), patch).await {
      Ok(rows) if rows.is_empty() => self.fail(ViewError::NothingChanged),
      Ok(_) => Ok(()),
      Err(e) => self.fail(e.into()),
    }
  }

  async fn reload_after(&mut self, done: &str) -> Result<(), ViewError> {
    self.load().await?;
    self.message = Some(done.to_owned());
    Ok(())
  }

  fn check_write(&mut self) -> Result<(), ViewError> {
    if self.access.can_write() {
      return Ok(());
    }
    let role = self.access.role.clone();
    self.fail(ViewError::ReadOnly(role))
  }

  fn check_title(&mut self, title: &str) -> Result<(), ViewError> {
    if title.trim().is_empty() {
      return self.fail(ViewError::EmptyTitle);
    }
    Ok(())
  }

  fn fail<T>(&mut self, err: ViewError) -> Result<T, ViewError> {
    self.message = Some(err.to_string());
    Err(err)
  }
}
