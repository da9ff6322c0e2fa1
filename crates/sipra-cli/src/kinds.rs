//! How each record kind is shown and edited in the terminal.

use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sipra_core::record::{
  Category, DateRange, Event, EventDraft, EventStatus, Events, Priority, RecordFilter, RecordKind,
  Registro, RegistroDraft, RegistroStatus, Registros,
};
use strum::IntoEnumIterator;

use crate::form::{Field, Form};

const ANY: &str = "any";
const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Columns, forms and parsing for one record kind.
pub trait ConsoleKind: RecordKind<Status: FromStr + IntoEnumIterator> {
  const LABEL: &'static str;
  /// Label of [`RecordKind::KIND_COLUMN`] in filters.
  const KIND_LABEL: &'static str;
  const HEADERS: &'static [&'static str];

  fn cells(row: &Self::Row) -> Vec<String>;
  fn blank_draft() -> Self::Draft;
  fn draft_of(row: &Self::Row) -> Self::Draft;
  fn draft_fields(draft: &Self::Draft) -> Vec<Field>;
  /// Read a submitted form built from `base`. Fields the form shows at
  /// reduced precision keep `base`'s value while their text is unchanged.
  fn parse_draft(form: &Form, base: &Self::Draft) -> Result<Self::Draft, String>;
}

// ─── Shared helpers ──────────────────────────────────────────────────────────

fn options<T: IntoEnumIterator + ToString>() -> Vec<String> { T::iter().map(|t| t.to_string()).collect() }

fn parse_choice<T: FromStr>(label: &str, raw: &str) -> Result<T, String> {
  T::from_str(raw).map_err(|_| format!("{label}: unknown value {raw:?}"))
}

fn parse_date(label: &str, raw: &str) -> Result<Option<NaiveDate>, String> {
  match raw.trim() {
    "" => Ok(None),
    s => NaiveDate::parse_from_str(s, DATE_FORMAT)
      .map(Some)
      .map_err(|_| format!("{label}: expected YYYY-MM-DD")),
  }
}

/// `raw`, unless it still reads as `base` does.
fn parse_when_from(label: &str, raw: &str, base: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
  if raw.trim() == format_when(base) {
    return Ok(base);
  }
  parse_when(label, raw)
}

/// Local `YYYY-MM-DD HH:MM`, or a bare date meaning local midnight.
fn parse_when(label: &str, raw: &str) -> Result<DateTime<Utc>, String> {
  let raw = raw.trim();
  let naive = NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT)
    .ok()
    .or_else(|| {
      NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
    .ok_or_else(|| format!("{label}: expected YYYY-MM-DD HH:MM"))?;
  Local
    .from_local_datetime(&naive)
    .earliest()
    .map(|dt| dt.with_timezone(&Utc))
    .ok_or_else(|| format!("{label}: no such local time"))
}

pub fn format_when(at: DateTime<Utc>) -> String { at.with_timezone(&Local).format(DATE_TIME_FORMAT).to_string() }

fn format_maybe(at: Option<DateTime<Utc>>) -> String { at.map(format_when).unwrap_or_default() }

// ─── Filters ─────────────────────────────────────────────────────────────────

/// The filter form with everything unset.
pub fn filter_form<K: ConsoleKind>() -> Form {
  let mut statuses = vec![ANY.to_owned()];
  statuses.extend(options::<K::Status>());
  Form::new(
    format!("Filter {}", K::LABEL.to_lowercase()),
    vec![
      Field::choice("Status", statuses, ANY),
      Field::text(K::KIND_LABEL, ""),
      Field::text("From", ""),
      Field::text("To", ""),
    ],
  )
}

pub fn parse_filter<K: ConsoleKind>(form: &Form) -> Result<RecordFilter<K::Status>, String> {
  let status = match form.value("Status") {
    ANY => None,
    raw => Some(parse_choice::<K::Status>("Status", raw)?),
  };
  let kind_contains = Some(form.value(K::KIND_LABEL).trim())
    .filter(|s| !s.is_empty())
    .map(str::to_owned);
  let from = parse_date("From", form.value("From"))?;
  let to = parse_date("To", form.value("To"))?;
  if let (Some(from), Some(to)) = (from, to)
    && from > to
  {
    return Err("From is after To".into());
  }
  Ok(RecordFilter {
    status,
    kind_contains,
    range: DateRange::from_local_dates(from, to),
  })
}

// ─── Events ──────────────────────────────────────────────────────────────────

impl ConsoleKind for Events {
  const HEADERS: &'static [&'static str] = &["Date", "Title", "Type", "Status", "Closed"];
  const KIND_LABEL: &'static str = "Type";
  const LABEL: &'static str = "Events";

  fn cells(row: &Event) -> Vec<String> {
    vec![
      format_when(row.event_date),
      row.title.clone(),
      row.event_type.clone(),
      row.status.to_string(),
      format_maybe(row.closed_at),
    ]
  }

  fn blank_draft() -> EventDraft { EventDraft::new("", Utc::now()) }

  fn draft_of(row: &Event) -> EventDraft { EventDraft::from_event(row) }

  fn draft_fields(draft: &EventDraft) -> Vec<Field> {
    vec![
      Field::text("Title", draft.title.as_str()),
      Field::text("Description", draft.description.as_str()),
      Field::text("Type", draft.event_type.as_str()),
      Field::text("Date", format_when(draft.event_date)),
      Field::choice("Status", options::<EventStatus>(), &draft.status.to_string()),
    ]
  }

  fn parse_draft(form: &Form, base: &EventDraft) -> Result<EventDraft, String> {
    Ok(EventDraft {
      title:       form.value("Title").to_owned(),
      description: form.value("Description").to_owned(),
      event_type:  form.value("Type").to_owned(),
      event_date:  parse_when_from("Date", form.value("Date"), base.event_date)?,
      status:      parse_choice("Status", form.value("Status"))?,
    })
  }
}

// ─── Registros ───────────────────────────────────────────────────────────────

impl ConsoleKind for Registros {
  const HEADERS: &'static [&'static str] = &["Created", "Title", "Category", "Priority", "Status", "Closed"];
  const KIND_LABEL: &'static str = "Category";
  const LABEL: &'static str = "Registros";

  fn cells(row: &Registro) -> Vec<String> {
    vec![
      format_maybe(row.created_at),
      row.title.clone(),
      row.category.to_string(),
      row.priority.to_string(),
      row.status.to_string(),
      format_maybe(row.closed_at),
    ]
  }

  fn blank_draft() -> RegistroDraft { RegistroDraft::default() }

  fn draft_of(row: &Registro) -> RegistroDraft { RegistroDraft::from_registro(row) }

  fn draft_fields(draft: &RegistroDraft) -> Vec<Field> {
    vec![
      Field::text("Title", draft.title.as_str()),
      Field::text("Description", draft.description.as_str()),
      Field::choice("Category", options::<Category>(), &draft.category.to_string()),
      Field::choice("Priority", options::<Priority>(), &draft.priority.to_string()),
      Field::choice("Status", options::<RegistroStatus>(), &draft.status.to_string()),
    ]
  }

  fn parse_draft(form: &Form, _base: &RegistroDraft) -> Result<RegistroDraft, String> {
    Ok(RegistroDraft {
      title:       form.value("Title").to_owned(),
      description: form.value("Description").to_owned(),
      category:    parse_choice("Category", form.value("Category"))?,
      priority:    parse_choice("Priority", form.value("Priority"))?,
      status:      parse_choice("Status", form.value("Status"))?,
    })
  }
}
