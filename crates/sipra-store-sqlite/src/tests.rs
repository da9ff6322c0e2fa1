//! Integration tests for `SqliteBackend` against an in-memory database.

use chrono::{Duration, TimeZone, Utc};
use serde_json::{Value, json};
use sipra_core::{
  AuthError,
  auth::{AuthChange, AuthService},
  data::DataService,
  query::{Direction, Row, RowMatch, Select, timestamp_value},
};
use uuid::Uuid;

use crate::{Error, SqliteBackend};

async fn backend() -> SqliteBackend {
  SqliteBackend::open_in_memory()
    .await
    .expect("in-memory backend")
}

fn row(value: Value) -> Row { value.as_object().cloned().expect("object literal") }

async fn signed_in() -> SqliteBackend {
  let b = backend().await;
  b.create_user("ana@example.com", "secreto").await.unwrap();
  b.sign_in_with_password("ana@example.com", "secreto")
    .await
    .unwrap();
  b
}

// ─── Users & sign-in ─────────────────────────────────────────────────────────

#[tokio::test]
async fn sign_in_with_valid_password() {
  let b = backend().await;
  let user = b.create_user("ana@example.com", "secreto").await.unwrap();
  let mut rx = b.subscribe();

  let session = b
    .sign_in_with_password("ANA@example.com", "secreto")
    .await
    .unwrap();
  assert_eq!(session.user.id, user.id);
  assert_eq!(b.current_user().map(|u| u.id), Some(user.id));

  let event = rx.try_recv().expect("event published before sign-in resolves");
  assert_eq!(event.change, AuthChange::SignedIn);
  assert_eq!(event.session, Some(session));
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
  let b = backend().await;
  b.create_user("ana@example.com", "secreto").await.unwrap();
  let mut rx = b.subscribe();

  let err = b
    .sign_in_with_password("ana@example.com", "otro")
    .await
    .unwrap_err();
  assert_eq!(err, AuthError::InvalidCredentials);
  assert!(b.current_user().is_none());
  assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn unknown_email_is_invalid_credentials() {
  let b = backend().await;
  let err = b
    .sign_in_with_password("nadie@example.com", "x")
    .await
    .unwrap_err();
  assert_eq!(err, AuthError::InvalidCredentials);
}

#[tokio::test]
async fn duplicate_email_rejected() {
  let b = backend().await;
  b.create_user("ana@example.com", "a").await.unwrap();
  let err = b.create_user("Ana@Example.com", "b").await.unwrap_err();
  assert!(matches!(err, Error::DuplicateEmail(_)));
}

#[tokio::test]
async fn sign_out_publishes_and_clears() {
  let b = signed_in().await;
  let mut rx = b.subscribe();

  b.sign_out().await.unwrap();

  let event = rx.try_recv().unwrap();
  assert_eq!(event.change, AuthChange::SignedOut);
  assert!(event.session.is_none());
  assert!(b.current_user().is_none());
  assert!(b.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn sign_out_without_session_is_a_no_op() {
  let b = backend().await;
  let mut rx = b.subscribe();
  b.sign_out().await.unwrap();
  assert!(rx.try_recv().is_err());
}

// ─── Session restore ─────────────────────────────────────────────────────────

#[tokio::test]
async fn session_restored_after_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("sipra.db");

  let session = {
    let b = SqliteBackend::open(&path).await.unwrap();
    b.create_user("ana@example.com", "secreto").await.unwrap();
    b.sign_in_with_password("ana@example.com", "secreto")
      .await
      .unwrap()
  };

  let b = SqliteBackend::open(&path).await.unwrap();
  assert!(b.current_user().is_none());
  let mut rx = b.subscribe();

  let restored = b.get_session().await.unwrap().expect("restored session");
  assert_eq!(restored.user, session.user);
  assert_eq!(restored.access_token, session.access_token);
  assert_eq!(b.current_user(), Some(session.user));
  // Restoration is reported through the return value only.
  assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn expired_session_not_restored() {
  let b = backend().await.with_session_ttl(Duration::zero());
  b.create_user("ana@example.com", "secreto").await.unwrap();
  b.sign_in_with_password("ana@example.com", "secreto")
    .await
    .unwrap();

  assert!(b.get_session().await.unwrap().is_none());
  assert!(b.current_user().is_none());
}

#[tokio::test]
async fn signed_out_session_not_restored_after_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("sipra.db");
  {
    let b = SqliteBackend::open(&path).await.unwrap();
    b.create_user("ana@example.com", "secreto").await.unwrap();
    b.sign_in_with_password("ana@example.com", "secreto")
      .await
      .unwrap();
    b.sign_out().await.unwrap();
  }
  let b = SqliteBackend::open(&path).await.unwrap();
  assert!(b.get_session().await.unwrap().is_none());
}

// ─── Data service ────────────────────────────────────────────────────────────

#[tokio::test]
async fn writes_require_a_session() {
  let b = backend().await;
  let err = b
    .insert("events", row(json!({"title": "x"})))
    .await
    .unwrap_err();
  assert!(matches!(err, sipra_core::Error::PermissionDenied(_)));

  // Seeding bypasses the check; reads never need one.
  b.seed("areas", row(json!({"nombre": "Plo", "codigo": "RN-ANP-PLO"})))
    .await
    .unwrap();
  let rows = b.select(&Select::from("areas")).await.unwrap();
  assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn insert_assigns_id_and_created_at() {
  let b = signed_in().await;
  let stored = b
    .insert("events", row(json!({"title": "Ronda"})))
    .await
    .unwrap();
  let id: Uuid = stored["id"].as_str().unwrap().parse().unwrap();
  assert!(stored.contains_key("created_at"));

  let fetched = b.get("events", id).await.unwrap().unwrap();
  assert_eq!(fetched, stored);
}

#[tokio::test]
async fn eq_and_inclusive_range() {
  let b = signed_in().await;
  let day = |d| Utc.with_ymd_and_hms(2025, 3, d, 12, 0, 0).unwrap();
  for (d, status) in [(1, "open"), (2, "closed"), (3, "open"), (4, "open")] {
    b.insert(
      "events",
      row(json!({"title": format!("e{d}"), "status": status, "event_date": timestamp_value(day(d))})),
    )
    .await
    .unwrap();
  }

  let q = Select::from("events")
    .columns(&["title"])
    .eq("status", "open")
    .gte("event_date", timestamp_value(day(1)))
    .lte("event_date", timestamp_value(day(3)))
    .order("event_date", Direction::Ascending);
  let titles: Vec<_> = b
    .select(&q)
    .await
    .unwrap()
    .into_iter()
    .map(|r| r["title"].clone())
    .collect();
  assert_eq!(titles, vec![json!("e1"), json!("e3")]);
}

#[tokio::test]
async fn range_compares_instants_not_offsets() {
  let b = signed_in().await;
  b.insert(
    "events",
    row(json!({"title": "x", "event_date": "2025-03-01T23:30:00-03:00"})),
  )
  .await
  .unwrap();

  // 02:30 UTC on the 2nd.
  let q = Select::from("events").gte("event_date", "2025-03-02T00:00:00Z");
  assert_eq!(b.select(&q).await.unwrap().len(), 1);
}

#[tokio::test]
async fn ilike_is_case_insensitive_contains() {
  let b = signed_in().await;
  for kind in ["Operativo", "monitoreo", "patrullaje OPERATIVO"] {
    b.insert("events", row(json!({"event_type": kind})))
      .await
      .unwrap();
  }
  let q = Select::from("events").ilike("event_type", "operat");
  assert_eq!(b.select(&q).await.unwrap().len(), 2);

  let q = Select::from("events").ilike("event_type", "%");
  assert!(b.select(&q).await.unwrap().is_empty());
}

#[tokio::test]
async fn ilike_folds_accented_capitals() {
  let b = signed_in().await;
  for kind in ["EDUCACIÓN AMBIENTAL", "Educación vial", "monitoreo"] {
    b.insert("events", row(json!({"event_type": kind})))
      .await
      .unwrap();
  }
  let q = Select::from("events").ilike("event_type", "educación");
  assert_eq!(b.select(&q).await.unwrap().len(), 2);

  let q = Select::from("events").ilike("event_type", "EDUCACIÓN AMB");
  assert_eq!(b.select(&q).await.unwrap().len(), 1);
}

#[tokio::test]
async fn order_desc_and_limit() {
  let b = signed_in().await;
  for n in 1..=5 {
    b.insert("registros", row(json!({"titulo": format!("r{n}"), "n": n})))
      .await
      .unwrap();
  }
  let q = Select::from("registros")
    .order("n", Direction::Descending)
    .limit(2);
  let ns: Vec<_> = b
    .select(&q)
    .await
    .unwrap()
    .into_iter()
    .map(|r| r["n"].clone())
    .collect();
  assert_eq!(ns, vec![json!(5), json!(4)]);
}

#[tokio::test]
async fn null_eq_matches_missing_and_null() {
  let b = signed_in().await;
  b.insert("events", row(json!({"closed_at": null}))).await.unwrap();
  b.insert("events", row(json!({"title": "sin cierre"}))).await.unwrap();
  b.insert("events", row(json!({"closed_at": "2025-01-01T00:00:00Z"})))
    .await
    .unwrap();
  let q = Select::from("events").eq("closed_at", Value::Null);
  assert_eq!(b.select(&q).await.unwrap().len(), 2);
}

#[tokio::test]
async fn update_merges_and_returns_rows() {
  let b = signed_in().await;
  let stored = b
    .insert("events", row(json!({"title": "a", "status": "open"})))
    .await
    .unwrap();
  let id: Uuid = stored["id"].as_str().unwrap().parse().unwrap();

  let updated = b
    .update("events", &RowMatch::id(id), row(json!({"status": "closed"})))
    .await
    .unwrap();
  assert_eq!(updated.len(), 1);
  assert_eq!(updated[0]["title"], json!("a"));
  assert_eq!(updated[0]["status"], json!("closed"));

  let none = b
    .update("events", &RowMatch::id(Uuid::new_v4()), row(json!({"status": "x"})))
    .await
    .unwrap();
  assert!(none.is_empty());
}

#[tokio::test]
async fn delete_returns_deleted_rows() {
  let b = signed_in().await;
  let stored = b.insert("events", row(json!({"title": "a"}))).await.unwrap();
  let id: Uuid = stored["id"].as_str().unwrap().parse().unwrap();

  let deleted = b.delete("events", &RowMatch::id(id)).await.unwrap();
  assert_eq!(deleted, vec![stored]);
  assert!(b.get("events", id).await.unwrap().is_none());
}

#[tokio::test]
async fn tables_are_isolated() {
  let b = signed_in().await;
  b.insert("events", row(json!({"title": "a"}))).await.unwrap();
  assert!(b.select(&Select::from("registros")).await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_identifier_rejected() {
  let b = signed_in().await;
  let err = b
    .select(&Select::from("events; drop"))
    .await
    .unwrap_err();
  assert!(matches!(err, sipra_core::Error::InvalidIdentifier(_)));

  let err = b
    .insert("events", row(json!({"Bad Column": 1})))
    .await
    .unwrap_err();
  assert!(matches!(err, sipra_core::Error::InvalidIdentifier(_)));
}
