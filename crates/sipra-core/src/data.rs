//! The [`DataService`] trait and typed fetch helpers.

use std::future::Future;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
  Error, Result,
  query::{Row, RowMatch, Select},
};

/// Abstraction over the remote table API.
///
/// Row-level permission enforcement is the implementation's job; callers may
/// pre-check for UX but must expect [`Error::PermissionDenied`].
pub trait DataService: Send + Sync {
  /// Return the rows matching `query`, in the requested order.
  fn select<'a>(
    &'a self,
    query: &'a Select,
  ) -> impl Future<Output = Result<Vec<Row>>> + Send + 'a;

  /// Insert one row and return it as stored.
  fn insert<'a>(
    &'a self,
    table: &'a str,
    row: Row,
  ) -> impl Future<Output = Result<Row>> + Send + 'a;

  /// Apply `patch` to every row matching `filter`; returns the updated rows.
  fn update<'a>(
    &'a self,
    table: &'a str,
    filter: &'a RowMatch,
    patch: Row,
  ) -> impl Future<Output = Result<Vec<Row>>> + Send + 'a;

  /// Delete every row matching `filter`; returns the deleted rows.
  fn delete<'a>(
    &'a self,
    table: &'a str,
    filter: &'a RowMatch,
  ) -> impl Future<Output = Result<Vec<Row>>> + Send + 'a;
}

// ─── Typed helpers ───────────────────────────────────────────────────────────

pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>> {
  rows
    .into_iter()
    .map(|row| serde_json::from_value(Value::Object(row)).map_err(Error::from))
    .collect()
}

/// Serialize a value that must become a JSON object.
pub fn to_row<T: Serialize>(value: &T) -> Result<Row> {
  match serde_json::to_value(value)? {
    Value::Object(row) => Ok(row),
    _ => Err(Error::NotAnObject),
  }
}

pub async fn fetch_all<D, T>(data: &D, query: &Select) -> Result<Vec<T>>
where
  D: DataService,
  T: DeserializeOwned,
{
  decode_rows(data.select(query).await?)
}

/// Zero or one row; more than one is an error.
pub async fn fetch_maybe_single<D, T>(data: &D, query: &Select) -> Result<Option<T>>
where
  D: DataService,
  T: DeserializeOwned,
{
  let mut rows = data.select(query).await?;
  match rows.len() {
    0 => Ok(None),
    1 => {
      let row = rows.remove(0);
      Ok(Some(serde_json::from_value(Value::Object(row))?))
    }
    n => Err(Error::MultipleRows(n)),
  }
}
