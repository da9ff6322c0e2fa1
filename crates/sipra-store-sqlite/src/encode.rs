//! Encoding helpers between JSON rows, query predicates and SQLite values.
//!
//! Rows live in `table_rows.data` as compact JSON. Timestamps inside rows are
//! normalised to one fixed-precision RFC 3339 form so that text comparison
//! in SQL agrees with chronological order. UUIDs are stored as hyphenated
//! lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{
  Connection,
  functions::FunctionFlags,
  types::{Value as SqlValue, ValueRef},
};
use serde_json::Value;
use sipra_core::query::{Direction, Predicate, Row, Select};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ──────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Rewrite RFC 3339 strings into the stored timestamp form; everything else
/// passes through.
pub fn normalize(value: Value) -> Value {
  match value {
    Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
      Ok(dt) => Value::String(encode_dt(dt.with_timezone(&Utc))),
      Err(_) => Value::String(s),
    },
    other => other,
  }
}

pub fn normalize_row(row: Row) -> Row {
  row.into_iter().map(|(k, v)| (k, normalize(v))).collect()
}

/// What `json_extract` yields for the same JSON value.
pub fn sql_param(value: &Value) -> SqlValue {
  match normalize(value.clone()) {
    Value::Null => SqlValue::Null,
    Value::Bool(b) => SqlValue::Integer(i64::from(b)),
    Value::Number(n) => match n.as_i64() {
      Some(i) => SqlValue::Integer(i),
      None => SqlValue::Real(n.as_f64().unwrap_or_default()),
    },
    Value::String(s) => SqlValue::Text(s),
    nested => SqlValue::Text(nested.to_string()),
  }
}

pub fn json_path(column: &str) -> String { format!("$.{column}") }

/// SQL name of [`fold_case`]. SQLite's own `lower()` only folds ASCII.
pub const FOLD_CASE_FN: &str = "sipra_fold_case";

pub fn fold_case(text: &str) -> String { text.to_lowercase() }

/// Register [`FOLD_CASE_FN`] on `conn`. Text is folded, numbers are folded
/// as their text form and anything else reads as `NULL`.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    FOLD_CASE_FN,
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| {
      Ok(match ctx.get_raw(0) {
        ValueRef::Text(bytes) => Some(fold_case(&String::from_utf8_lossy(bytes))),
        ValueRef::Integer(n) => Some(n.to_string()),
        ValueRef::Real(x) => Some(x.to_string()),
        ValueRef::Null | ValueRef::Blob(_) => None,
      })
    },
  )
}

/// `%text%` case-folded, with LIKE metacharacters escaped by `\`.
pub fn contains_pattern(text: &str) -> String {
  let mut pattern = String::with_capacity(text.len() + 2);
  pattern.push('%');
  for c in fold_case(text).chars() {
    if matches!(c, '%' | '_' | '\\') {
      pattern.push('\\');
    }
    pattern.push(c);
  }
  pattern.push('%');
  pattern
}

// ─── Queries ──────────────────────────────────────────────────────────────────

/// A compiled statement and its positional parameters.
#[derive(Debug)]
pub struct SqlQuery {
  pub sql:    String,
  pub params: Vec<SqlValue>,
}

/// Compile a [`Select`] into SQL over `table_rows`. Identifiers are validated
/// first and then only ever bound as parameters.
pub fn compile_select(query: &Select) -> Result<SqlQuery> {
  query.validate()?;

  let mut sql = String::from("SELECT data FROM table_rows WHERE tbl = ?");
  let mut params = vec![SqlValue::Text(query.table.clone())];

  for predicate in &query.predicates {
    params.push(SqlValue::Text(json_path(predicate.column())));
    match predicate {
      Predicate::Eq {
        value: Value::Null, ..
      } => sql.push_str(" AND json_extract(data, ?) IS NULL"),
      Predicate::Eq { value, .. } => {
        sql.push_str(" AND json_extract(data, ?) = ?");
        params.push(sql_param(value));
      }
      Predicate::ILike { contains, .. } => {
        sql.push_str(&format!(" AND {FOLD_CASE_FN}(json_extract(data, ?)) LIKE ? ESCAPE '\\'"));
        params.push(SqlValue::Text(contains_pattern(contains)));
      }
      Predicate::Gte { value, .. } => {
        sql.push_str(" AND json_extract(data, ?) >= ?");
        params.push(sql_param(value));
      }
      Predicate::Lte { value, .. } => {
        sql.push_str(" AND json_extract(data, ?) <= ?");
        params.push(sql_param(value));
      }
    }
  }

  match &query.order {
    Some(order) => {
      let dir = match order.direction {
        Direction::Ascending => "ASC",
        Direction::Descending => "DESC",
      };
      sql.push_str(&format!(" ORDER BY json_extract(data, ?) {dir}, rowid {dir}"));
      params.push(SqlValue::Text(json_path(&order.column)));
    }
    None => sql.push_str(" ORDER BY rowid"),
  }

  if let Some(limit) = query.limit {
    sql.push_str(" LIMIT ?");
    params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
  }

  Ok(SqlQuery { sql, params })
}

/// Keep only `columns` (all of them when empty); missing columns read as
/// `null`, like a nullable column would.
pub fn project(mut row: Row, columns: &[String]) -> Row {
  if columns.is_empty() {
    return row;
  }
  columns
    .iter()
    .map(|c| (c.clone(), row.remove(c).unwrap_or(Value::Null)))
    .collect()
}

pub fn decode_row(raw: &str) -> Result<Row> {
  match serde_json::from_str(raw)? {
    Value::Object(row) => Ok(row),
    _ => Err(sipra_core::Error::NotAnObject.into()),
  }
}
