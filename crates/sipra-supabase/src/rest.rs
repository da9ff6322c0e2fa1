//! PostgREST encoding and the [`DataService`] implementation.
//!
//! Filters travel as query parameters of the form `column=op.value`:
//!
//! | Predicate | Parameter               |
//! |-----------|-------------------------|
//! | `Eq`      | `col=eq.v` (`is.null`)  |
//! | `ILike`   | `col=ilike.*v*`         |
//! | `Gte`     | `col=gte.v`             |
//! | `Lte`     | `col=lte.v`             |

use reqwest::Method;
use serde_json::Value;

use sipra_core::{
  data::DataService,
  query::{Direction, Predicate, Row, RowMatch, Select, check_identifier},
};

use crate::{Error, Result, SupabaseClient, client::check};

fn filter_value(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// Encode one predicate as a `(column, "op.value")` query pair.
pub fn encode_predicate(predicate: &Predicate) -> (String, String) {
  let encoded = match predicate {
    Predicate::Eq {
      value: Value::Null, ..
    } => "is.null".to_owned(),
    Predicate::Eq { value, .. } => format!("eq.{}", filter_value(value)),
    Predicate::ILike { contains, .. } => format!("ilike.*{contains}*"),
    Predicate::Gte { value, .. } => format!("gte.{}", filter_value(value)),
    Predicate::Lte { value, .. } => format!("lte.{}", filter_value(value)),
  };
  (predicate.column().to_owned(), encoded)
}

/// The full query string for a [`Select`].
pub fn select_params(query: &Select) -> sipra_core::Result<Vec<(String, String)>> {
  query.validate()?;

  let columns = if query.columns.is_empty() {
    "*".to_owned()
  } else {
    query.columns.join(",")
  };
  let mut params = vec![("select".to_owned(), columns)];
  params.extend(query.predicates.iter().map(encode_predicate));
  if let Some(order) = &query.order {
    let dir = match order.direction {
      Direction::Ascending => "asc",
      Direction::Descending => "desc",
    };
    params.push(("order".to_owned(), format!("{}.{dir}", order.column)));
  }
  if let Some(limit) = query.limit {
    params.push(("limit".to_owned(), limit.to_string()));
  }
  Ok(params)
}

fn match_params(filter: &RowMatch) -> sipra_core::Result<Vec<(String, String)>> {
  check_identifier(&filter.column)?;
  Ok(vec![encode_predicate(&Predicate::Eq {
    column: filter.column.clone(),
    value:  filter.value.clone(),
  })])
}

impl SupabaseClient {
  /// `GET /rest/v1/{table}?select=..`
  async fn select_rows(&self, query: &Select) -> Result<Vec<Row>> {
    let params = select_params(query)?;
    tracing::debug!(table = %query.table, ?params, "select");
    let token = self.bearer().await?;
    let resp = self
      .request(Method::GET, self.rest_url(&query.table), &token)
      .query(&params)
      .send()
      .await?;
    Ok(check(resp).await?.json().await?)
  }

  /// `POST`, `PATCH` or `DELETE` on `/rest/v1/{table}`, returning the
  /// affected rows.
  async fn write_rows(
    &self,
    method: Method,
    table: &str,
    params: Vec<(String, String)>,
    body: Option<Row>,
  ) -> Result<Vec<Row>> {
    check_identifier(table)?;
    tracing::debug!(%method, table, ?params, "write");
    let token = self.bearer().await?;
    let mut req = self
      .request(method, self.rest_url(table), &token)
      .header("Prefer", "return=representation")
      .query(&params);
    if let Some(body) = &body {
      req = req.json(body);
    }
    let resp = req.send().await?;
    Ok(check(resp).await?.json().await?)
  }
}

// ─── DataService impl ────────────────────────────────────────────────────────

impl DataService for SupabaseClient {
  async fn select<'a>(&'a self, query: &'a Select) -> sipra_core::Result<Vec<Row>> {
    Ok(self.select_rows(query).await?)
  }

  async fn insert<'a>(&'a self, table: &'a str, row: Row) -> sipra_core::Result<Row> {
    let rows = self
      .write_rows(Method::POST, table, Vec::new(), Some(row))
      .await?;
    Ok(rows.into_iter().next().ok_or(Error::NoRowReturned)?)
  }

  async fn update<'a>(
    &'a self,
    table: &'a str,
    filter: &'a RowMatch,
    patch: Row,
  ) -> sipra_core::Result<Vec<Row>> {
    let params = match_params(filter)?;
    Ok(self.write_rows(Method::PATCH, table, params, Some(patch)).await?)
  }

  async fn delete<'a>(&'a self, table: &'a str, filter: &'a RowMatch) -> sipra_core::Result<Vec<Row>> {
    let params = match_params(filter)?;
    Ok(self.write_rows(Method::DELETE, table, params, None).await?)
  }
}
