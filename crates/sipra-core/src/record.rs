//! Records: the business entities tracked by the console.
//!
//! Two kinds exist: [`Events`] (table `events`) and [`Registros`] (table
//! `registros`). Both are described by [`RecordKind`], which lets the list,
//! create, edit, close and delete logic be written once.

use std::fmt;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::query::{Direction, Row, Select, timestamp_value};

// ─── Kind description ────────────────────────────────────────────────────────

/// Who is creating a record and in which area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scope {
  pub user_id: Option<Uuid>,
  pub area_id: Option<Uuid>,
}

/// Static description of a record table and its form draft.
pub trait RecordKind: Send + Sync + 'static {
  type Row: DeserializeOwned + Clone + fmt::Debug + Send + Sync;
  type Status: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static;
  type Draft: fmt::Debug + Send + Sync;

  const TABLE: &'static str;
  const COLUMNS: &'static [&'static str];
  const STATUS_COLUMN: &'static str;
  /// Column matched by the case-insensitive type/category filter.
  const KIND_COLUMN: &'static str;
  /// Column the date range applies to; lists are ordered by it, newest first.
  const TIMESTAMP_COLUMN: &'static str;
  const CLOSED_AT_COLUMN: &'static str;
  /// When set, lists are restricted to the active area.
  const AREA_COLUMN: Option<&'static str>;
  const LIMIT: Option<usize>;
  const DELETABLE: bool;
  const CLOSED: Self::Status;

  fn id(row: &Self::Row) -> Uuid;
  fn title(row: &Self::Row) -> &str;
  fn status(row: &Self::Row) -> Self::Status;

  fn draft_title(draft: &Self::Draft) -> &str;
  fn draft_status(draft: &Self::Draft) -> Self::Status;

  /// Full row for an insert. Never sets the closure timestamp.
  fn new_row(draft: &Self::Draft, scope: &Scope) -> Row;
  /// Mutable columns replaced by an edit.
  fn edit_row(draft: &Self::Draft) -> Row;
}

pub fn status_value<S: fmt::Display>(status: S) -> Value { Value::String(status.to_string()) }

fn text_or_null(raw: &str) -> Value {
  match raw.trim() {
    "" => Value::Null,
    s => Value::String(s.to_owned()),
  }
}

// ─── Filters ─────────────────────────────────────────────────────────────────

/// Inclusive timestamp range. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
  pub from: Option<DateTime<Utc>>,
  pub to:   Option<DateTime<Utc>>,
}

impl DateRange {
  /// Widen calendar dates to the whole day in the local time zone.
  pub fn from_local_dates(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
    Self::from_dates_in(&Local, from, to)
  }

  pub fn from_dates_in<Tz: TimeZone>(
    tz: &Tz,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
  ) -> Self {
    let start = from
      .and_then(|d| d.and_hms_opt(0, 0, 0))
      .and_then(|dt| tz.from_local_datetime(&dt).earliest())
      .map(|dt| dt.with_timezone(&Utc));
    let end = to
      .and_then(|d| d.and_hms_micro_opt(23, 59, 59, 999_999))
      .and_then(|dt| tz.from_local_datetime(&dt).latest())
      .map(|dt| dt.with_timezone(&Utc));
    Self { from: start, to: end }
  }

  pub fn contains(&self, at: DateTime<Utc>) -> bool {
    self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
  }
}

/// List filters. Every field is optional; an absent field adds no predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter<S> {
  pub status:        Option<S>,
  pub kind_contains: Option<String>,
  pub range:         DateRange,
}

impl<S> Default for RecordFilter<S> {
  fn default() -> Self {
    Self {
      status:        None,
      kind_contains: None,
      range:         DateRange::default(),
    }
  }
}

/// Compose the list query for `K` under `filter`, scoped to `area_id` when
/// the kind is area-scoped.
pub fn list_query<K: RecordKind>(filter: &RecordFilter<K::Status>, area_id: Option<Uuid>) -> Select {
  let mut q = Select::from(K::TABLE)
    .columns(K::COLUMNS)
    .order(K::TIMESTAMP_COLUMN, Direction::Descending);

  if let (Some(column), Some(area_id)) = (K::AREA_COLUMN, area_id) {
    q = q.eq(column, area_id.to_string());
  }
  if let Some(status) = filter.status {
    q = q.eq(K::STATUS_COLUMN, status_value(status));
  }
  if let Some(text) = filter.kind_contains.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
    q = q.ilike(K::KIND_COLUMN, text);
  }
  if let Some(from) = filter.range.from {
    q = q.gte(K::TIMESTAMP_COLUMN, timestamp_value(from));
  }
  if let Some(to) = filter.range.to {
    q = q.lte(K::TIMESTAMP_COLUMN, timestamp_value(to));
  }
  if let Some(limit) = K::LIMIT {
    q = q.limit(limit);
  }
  q
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventStatus {
  #[default]
  Open,
  Closed,
}

/// A row of the `events` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
  pub id:          Uuid,
  pub title:       String,
  #[serde(default)]
  pub description: Option<String>,
  pub event_type:  String,
  pub event_date:  DateTime<Utc>,
  pub status:      EventStatus,
  #[serde(default)]
  pub closed_at:   Option<DateTime<Utc>>,
  #[serde(default)]
  pub created_by:  Option<Uuid>,
  #[serde(default)]
  pub created_at:  Option<DateTime<Utc>>,
}

/// Form values for creating or editing an [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
  pub title:       String,
  pub description: String,
  pub event_type:  String,
  pub event_date:  DateTime<Utc>,
  pub status:      EventStatus,
}

pub const DEFAULT_EVENT_TYPE: &str = "operativo";

impl EventDraft {
  pub fn new(title: impl Into<String>, event_date: DateTime<Utc>) -> Self {
    Self {
      title: title.into(),
      description: String::new(),
      event_type: DEFAULT_EVENT_TYPE.to_owned(),
      event_date,
      status: EventStatus::Open,
    }
  }

  pub fn from_event(event: &Event) -> Self {
    Self {
      title:       event.title.clone(),
      description: event.description.clone().unwrap_or_default(),
      event_type:  event.event_type.clone(),
      event_date:  event.event_date,
      status:      event.status,
    }
  }
}

/// Marker for the `events` table.
#[derive(Debug, Clone, Copy)]
pub struct Events;

impl RecordKind for Events {
  type Draft = EventDraft;
  type Row = Event;
  type Status = EventStatus;

  const AREA_COLUMN: Option<&'static str> = None;
  const CLOSED: EventStatus = EventStatus::Closed;
  const CLOSED_AT_COLUMN: &'static str = "closed_at";
  const COLUMNS: &'static [&'static str] = &[
    "id",
    "title",
    "description",
    "event_type",
    "event_date",
    "status",
    "closed_at",
    "created_by",
    "created_at",
  ];
  const DELETABLE: bool = true;
  const KIND_COLUMN: &'static str = "event_type";
  const LIMIT: Option<usize> = None;
  const STATUS_COLUMN: &'static str = "status";
  const TABLE: &'static str = "events";
  const TIMESTAMP_COLUMN: &'static str = "event_date";

  fn id(row: &Event) -> Uuid { row.id }

  fn title(row: &Event) -> &str { &row.title }

  fn status(row: &Event) -> EventStatus { row.status }

  fn draft_title(draft: &EventDraft) -> &str { &draft.title }

  fn draft_status(draft: &EventDraft) -> EventStatus { draft.status }

  fn new_row(draft: &EventDraft, _scope: &Scope) -> Row { Self::edit_row(draft) }

  fn edit_row(draft: &EventDraft) -> Row {
    let event_type = match draft.event_type.trim() {
      "" => DEFAULT_EVENT_TYPE,
      t => t,
    };
    let mut row = Row::new();
    row.insert("title".into(), Value::String(draft.title.trim().to_owned()));
    row.insert("description".into(), text_or_null(&draft.description));
    row.insert("event_type".into(), Value::String(event_type.to_owned()));
    row.insert("event_date".into(), timestamp_value(draft.event_date));
    row.insert("status".into(), status_value(draft.status));
    row
  }
}

// ─── Registros ───────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
)]
pub enum RegistroStatus {
  #[default]
  #[serde(rename = "abierto")]
  #[strum(serialize = "abierto")]
  Open,
  #[serde(rename = "en_proceso")]
  #[strum(serialize = "en_proceso")]
  InProgress,
  #[serde(rename = "cerrado")]
  #[strum(serialize = "cerrado")]
  Closed,
  #[serde(rename = "archivado")]
  #[strum(serialize = "archivado")]
  Archived,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
)]
pub enum Category {
  #[default]
  #[serde(rename = "operativo")]
  #[strum(serialize = "operativo")]
  Operational,
  #[serde(rename = "monitoreo")]
  #[strum(serialize = "monitoreo")]
  Monitoring,
  #[serde(rename = "incidente")]
  #[strum(serialize = "incidente")]
  Incident,
  #[serde(rename = "educacion")]
  #[strum(serialize = "educacion")]
  Education,
  #[serde(rename = "control")]
  #[strum(serialize = "control")]
  Enforcement,
  #[serde(rename = "rescate")]
  #[strum(serialize = "rescate")]
  Rescue,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
)]
pub enum Priority {
  #[serde(rename = "baja")]
  #[strum(serialize = "baja")]
  Low,
  #[default]
  #[serde(rename = "media")]
  #[strum(serialize = "media")]
  Medium,
  #[serde(rename = "alta")]
  #[strum(serialize = "alta")]
  High,
  #[serde(rename = "critica")]
  #[strum(serialize = "critica")]
  Critical,
}

/// A row of the `registros` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registro {
  pub id:          Uuid,
  #[serde(rename = "titulo")]
  pub title:       String,
  #[serde(rename = "descripcion", default)]
  pub description: Option<String>,
  #[serde(rename = "categoria")]
  pub category:    Category,
  #[serde(rename = "estado")]
  pub status:      RegistroStatus,
  #[serde(rename = "prioridad", default)]
  pub priority:    Priority,
  #[serde(default)]
  pub area_id:     Option<Uuid>,
  #[serde(default)]
  pub created_by:  Option<Uuid>,
  #[serde(default)]
  pub created_at:  Option<DateTime<Utc>>,
  #[serde(rename = "fecha_cierre", default)]
  pub closed_at:   Option<DateTime<Utc>>,
}

/// Form values for creating or editing a [`Registro`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistroDraft {
  pub title:       String,
  pub description: String,
  pub category:    Category,
  pub status:      RegistroStatus,
  pub priority:    Priority,
}

impl RegistroDraft {
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      ..Self::default()
    }
  }

  pub fn from_registro(registro: &Registro) -> Self {
    Self {
      title:       registro.title.clone(),
      description: registro.description.clone().unwrap_or_default(),
      category:    registro.category,
      status:      registro.status,
      priority:    registro.priority,
    }
  }
}

/// Marker for the `registros` table.
#[derive(Debug, Clone, Copy)]
pub struct Registros;

impl RecordKind for Registros {
  type Draft = RegistroDraft;
  type Row = Registro;
  type Status = RegistroStatus;

  const AREA_COLUMN: Option<&'static str> = Some("area_id");
  const CLOSED: RegistroStatus = RegistroStatus::Closed;
  const CLOSED_AT_COLUMN: &'static str = "fecha_cierre";
  const COLUMNS: &'static [&'static str] = &[
    "id",
    "titulo",
    "descripcion",
    "categoria",
    "estado",
    "prioridad",
    "area_id",
    "created_by",
    "created_at",
    "fecha_cierre",
  ];
  const DELETABLE: bool = false;
  const KIND_COLUMN: &'static str = "categoria";
  const LIMIT: Option<usize> = Some(200);
  const STATUS_COLUMN: &'static str = "estado";
  const TABLE: &'static str = "registros";
  const TIMESTAMP_COLUMN: &'static str = "created_at";

  fn id(row: &Registro) -> Uuid { row.id }

  fn title(row: &Registro) -> &str { &row.title }

  fn status(row: &Registro) -> RegistroStatus { row.status }

  fn draft_title(draft: &RegistroDraft) -> &str { &draft.title }

  fn draft_status(draft: &RegistroDraft) -> RegistroStatus { draft.status }

  fn new_row(draft: &RegistroDraft, scope: &Scope) -> Row {
    let mut row = Self::edit_row(draft);
    if let Some(user_id) = scope.user_id {
      row.insert("created_by".into(), Value::String(user_id.to_string()));
    }
    if let Some(area_id) = scope.area_id {
      row.insert("area_id".into(), Value::String(area_id.to_string()));
    }
    row.insert("fuente".into(), Value::String("app".into()));
    row.insert("nivel_validacion".into(), Value::String("pendiente".into()));
    row
  }

  fn edit_row(draft: &RegistroDraft) -> Row {
    let mut row = Row::new();
    row.insert("titulo".into(), Value::String(draft.title.trim().to_owned()));
    row.insert("descripcion".into(), text_or_null(&draft.description));
    row.insert("categoria".into(), status_value(draft.category));
    row.insert("estado".into(), status_value(draft.status));
    row.insert("prioridad".into(), status_value(draft.priority));
    row
  }
}
