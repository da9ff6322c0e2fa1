//! The query model understood by every [`DataService`](crate::data::DataService).
//!
//! A [`Select`] names a table, the columns to return, a conjunction of
//! [`Predicate`]s, an optional ordering and an optional row limit. Backends
//! translate it into their own wire or SQL form.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::{Error, Result};

/// A table row as exchanged with the data service.
pub type Row = serde_json::Map<String, Value>;

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Table and column names are plain lowercase identifiers. Backends splice
/// them into URLs and JSON paths, so nothing else is accepted.
pub fn is_identifier(name: &str) -> bool {
  let mut chars = name.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
    && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

pub fn check_identifier(name: &str) -> Result<()> {
  if is_identifier(name) {
    Ok(())
  } else {
    Err(Error::InvalidIdentifier(name.to_owned()))
  }
}

/// Canonical text form for timestamps sent as filter values or stored.
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
  Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

// ─── Predicates ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
  /// Exact match. A `Null` value matches SQL `NULL`.
  Eq { column: String, value: Value },
  /// Case-insensitive "contains".
  ILike { column: String, contains: String },
  /// Inclusive lower bound.
  Gte { column: String, value: Value },
  /// Inclusive upper bound.
  Lte { column: String, value: Value },
}

impl Predicate {
  pub fn column(&self) -> &str {
    match self {
      Self::Eq { column, .. }
      | Self::ILike { column, .. }
      | Self::Gte { column, .. }
      | Self::Lte { column, .. } => column,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Ascending,
  Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
  pub column:    String,
  pub direction: Direction,
}

// ─── Select ──────────────────────────────────────────────────────────────────

/// A read query. Built with the chaining methods below:
///
/// ```
/// use sipra_core::query::{Direction, Select};
///
/// let q = Select::from("events")
///   .columns(&["id", "title"])
///   .eq("status", "open")
///   .order("event_date", Direction::Descending)
///   .limit(50);
/// assert_eq!(q.predicates.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
  pub table:      String,
  /// Empty means every column.
  pub columns:    Vec<String>,
  pub predicates: Vec<Predicate>,
  pub order:      Option<Order>,
  pub limit:      Option<usize>,
}

impl Select {
  pub fn from(table: impl Into<String>) -> Self {
    Self {
      table:      table.into(),
      columns:    Vec::new(),
      predicates: Vec::new(),
      order:      None,
      limit:      None,
    }
  }

  pub fn columns(mut self, columns: &[&str]) -> Self {
    self.columns = columns.iter().map(|c| (*c).to_owned()).collect();
    self
  }

  pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
    self.predicates.push(Predicate::Eq {
      column: column.into(),
      value:  value.into(),
    });
    self
  }

  pub fn ilike(mut self, column: impl Into<String>, contains: impl Into<String>) -> Self {
    self.predicates.push(Predicate::ILike {
      column:   column.into(),
      contains: contains.into(),
    });
    self
  }

  pub fn gte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
    self.predicates.push(Predicate::Gte {
      column: column.into(),
      value:  value.into(),
    });
    self
  }

  pub fn lte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
    self.predicates.push(Predicate::Lte {
      column: column.into(),
      value:  value.into(),
    });
    self
  }

  pub fn order(mut self, column: impl Into<String>, direction: Direction) -> Self {
    self.order = Some(Order {
      column: column.into(),
      direction,
    });
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  /// Reject any table, column, predicate or order name that is not a plain
  /// identifier.
  pub fn validate(&self) -> Result<()> {
    check_identifier(&self.table)?;
    for column in &self.columns {
      check_identifier(column)?;
    }
    for predicate in &self.predicates {
      check_identifier(predicate.column())?;
    }
    if let Some(order) = &self.order {
      check_identifier(&order.column)?;
    }
    Ok(())
  }
}

// ─── Mutation target ─────────────────────────────────────────────────────────

/// Equality match selecting the rows an update or delete applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct RowMatch {
  pub column: String,
  pub value:  Value,
}

impl RowMatch {
  pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
    Self {
      column: column.into(),
      value:  value.into(),
    }
  }

  pub fn id(id: uuid::Uuid) -> Self { Self::new("id", id.to_string()) }
}
