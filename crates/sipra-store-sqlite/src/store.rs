//! [`SqliteBackend`]: the SQLite implementation of [`DataService`].

use std::{path::Path, sync::Arc};

use chrono::{Duration, Utc};
use rusqlite::OptionalExtension as _;
use serde_json::Value;
use uuid::Uuid;

use sipra_core::{
  auth::SessionCell,
  data::DataService,
  query::{Row, RowMatch, Select, check_identifier},
};

use crate::{
  Error, Result,
  encode::{
    compile_select, decode_row, encode_dt, json_path, normalize_row, project, register_functions, sql_param,
  },
  schema::SCHEMA,
};

/// Default lifetime of a locally issued session, in seconds.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 8 * 60 * 60;

// ─── Backend ─────────────────────────────────────────────────────────────────

/// A SIPRA backend living in a single SQLite file.
///
/// Cloning is cheap; the connection and the session slot are shared.
#[derive(Clone)]
pub struct SqliteBackend {
  pub(crate) conn:        tokio_rusqlite::Connection,
  pub(crate) session:     Arc<SessionCell>,
  pub(crate) session_ttl: Duration,
}

impl SqliteBackend {
  /// Open (or create) a backend at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory backend, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        register_functions(conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self {
      conn,
      session: Arc::new(SessionCell::new()),
      session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
    })
  }

  pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
    self.session_ttl = ttl;
    self
  }

  /// Insert a row without a signed-in session, the way a service-role key
  /// would. Used to provision profiles, areas and role grants.
  pub async fn seed(&self, table: &str, row: Row) -> Result<Row> { self.insert_row(table, row).await }

  fn require_session(&self) -> Result<()> {
    match self.session.get() {
      Some(s) if !s.is_expired_at(Utc::now()) => Ok(()),
      _ => Err(Error::NotSignedIn),
    }
  }

  // ── Row operations ────────────────────────────────────────────────────────

  async fn select_rows(&self, query: &Select) -> Result<Vec<Row>> {
    let compiled = compile_select(query)?;
    tracing::debug!(table = %query.table, sql = %compiled.sql, "select");

    let raws: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&compiled.sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(compiled.params), |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .iter()
      .map(|raw| decode_row(raw).map(|row| project(row, &query.columns)))
      .collect()
  }

  async fn insert_row(&self, table: &str, row: Row) -> Result<Row> {
    check_identifier(table)?;
    for column in row.keys() {
      check_identifier(column)?;
    }

    let mut row = normalize_row(row);
    let id = match row.get("id").and_then(Value::as_str) {
      Some(id) => id.to_owned(),
      None => {
        let id = Uuid::new_v4().to_string();
        row.insert("id".into(), Value::String(id.clone()));
        id
      }
    };
    row
      .entry("created_at")
      .or_insert_with(|| Value::String(encode_dt(Utc::now())));

    let table = table.to_owned();
    let data = serde_json::to_string(&row)?;
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO table_rows (tbl, row_id, data) VALUES (?1, ?2, ?3)",
          rusqlite::params![table, id, data],
        )?;
        Ok(())
      })
      .await?;
    Ok(row)
  }

  /// Read-modify-write every row matching `filter` inside one transaction.
  /// `patch == None` deletes instead.
  async fn rewrite_rows(&self, table: &str, filter: &RowMatch, patch: Option<Row>) -> Result<Vec<Row>> {
    check_identifier(table)?;
    check_identifier(&filter.column)?;
    if let Some(patch) = &patch {
      for column in patch.keys() {
        check_identifier(column)?;
      }
    }

    let table = table.to_owned();
    let path = json_path(&filter.column);
    let value = sql_param(&filter.value);
    let patch = patch.map(normalize_row);

    let raws: Vec<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let matched = {
          let mut stmt = tx.prepare(
            "SELECT row_id, data FROM table_rows WHERE tbl = ?1 AND json_extract(data, ?2) = ?3",
          )?;
          stmt
            .query_map(rusqlite::params![table, path, value], |row| {
              Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut out = Vec::with_capacity(matched.len());
        for (row_id, raw) in matched {
          match &patch {
            Some(patch) => {
              let mut doc: serde_json::Map<String, Value> = serde_json::from_str(&raw)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
              doc.extend(patch.clone());
              let updated = Value::Object(doc).to_string();
              tx.execute(
                "UPDATE table_rows SET data = ?1 WHERE tbl = ?2 AND row_id = ?3",
                rusqlite::params![updated, table, row_id],
              )?;
              out.push(updated);
            }
            None => {
              tx.execute(
                "DELETE FROM table_rows WHERE tbl = ?1 AND row_id = ?2",
                rusqlite::params![table, row_id],
              )?;
              out.push(raw);
            }
          }
        }
        tx.commit()?;
        Ok(out)
      })
      .await?;

    raws.iter().map(|raw| decode_row(raw)).collect()
  }

  /// Fetch one row by id, regardless of session.
  pub async fn get(&self, table: &str, id: Uuid) -> Result<Option<Row>> {
    check_identifier(table)?;
    let table = table.to_owned();
    let id = id.to_string();
    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT data FROM table_rows WHERE tbl = ?1 AND row_id = ?2",
              rusqlite::params![table, id],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    raw.as_deref().map(decode_row).transpose()
  }
}

// ─── DataService impl ────────────────────────────────────────────────────────

impl DataService for SqliteBackend {
  async fn select<'a>(&'a self, query: &'a Select) -> sipra_core::Result<Vec<Row>> {
    Ok(self.select_rows(query).await?)
  }

  async fn insert<'a>(&'a self, table: &'a str, row: Row) -> sipra_core::Result<Row> {
    self.require_session()?;
    Ok(self.insert_row(table, row).await?)
  }

  async fn update<'a>(
    &'a self,
    table: &'a str,
    filter: &'a RowMatch,
    patch: Row,
  ) -> sipra_core::Result<Vec<Row>> {
    self.require_session()?;
    Ok(self.rewrite_rows(table, filter, Some(patch)).await?)
  }

  async fn delete<'a>(&'a self, table: &'a str, filter: &'a RowMatch) -> sipra_core::Result<Vec<Row>> {
    self.require_session()?;
    Ok(self.rewrite_rows(table, filter, None).await?)
  }
}
