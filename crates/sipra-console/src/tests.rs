//! Pipeline and view tests against the SQLite backend.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex},
  time::Duration,
};

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{Value, json};
use sipra_core::{
  AuthError,
  auth::{AuthService, AuthSubscription, Session, UserIdentity},
  data::DataService,
  query::{Predicate, Row, RowMatch, Select},
  record::{DateRange, EventDraft, EventStatus, RecordFilter, RegistroDraft, RegistroStatus},
  role::Role,
};
use sipra_store_sqlite::SqliteBackend;
use tokio::{sync::broadcast, time::timeout};
use uuid::Uuid;

use crate::{
  AppContext, AreaResolver, ContextConfig, EventsView, GuardState, ProfileResolver,
  RegistrosView, SessionState, SessionStore, Snapshot, Stage, ViewError, view::Access,
};

const WAIT: Duration = Duration::from_secs(5);
const EMAIL: &str = "ana@example.com";
const PASSWORD: &str = "secreto";
const AREA_CODE: &str = "RN-ANP-PLO";

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn row(value: Value) -> Row { value.as_object().cloned().expect("object literal") }

async fn backend() -> SqliteBackend { SqliteBackend::open_in_memory().await.expect("backend") }

/// A backend with one user; returns the user too.
async fn backend_with_user() -> (SqliteBackend, UserIdentity) {
  let b = backend().await;
  let user = b.create_user(EMAIL, PASSWORD).await.unwrap();
  (b, user)
}

async fn seed_profile(b: &SqliteBackend, user: Uuid, role: &str) {
  b.seed("profiles", row(json!({"id": user, "full_name": "Ana", "role": role})))
    .await
    .unwrap();
}

async fn seed_area(b: &SqliteBackend) -> Uuid {
  let id = Uuid::new_v4();
  b.seed("areas", row(json!({"id": id, "nombre": "Punta Loma", "codigo": AREA_CODE})))
    .await
    .unwrap();
  id
}

async fn seed_area_role(b: &SqliteBackend, user: Uuid, area: Uuid, role: &str) {
  b.seed("roles_area", row(json!({"user_id": user, "area_id": area, "rol": role})))
    .await
    .unwrap();
}

/// Data service wrapper that records calls, can fail tables and can slow
/// down queries mentioning a value.
struct Recorder {
  inner:   SqliteBackend,
  calls:   Mutex<Vec<(&'static str, String)>>,
  failing: Mutex<HashSet<String>>,
  slow:    Mutex<Option<String>>,
}

impl Recorder {
  fn new(inner: SqliteBackend) -> Arc<Self> {
    Arc::new(Self {
      inner,
      calls: Mutex::new(Vec::new()),
      failing: Mutex::new(HashSet::new()),
      slow: Mutex::new(None),
    })
  }

  fn count(&self, op: &str, table: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|(o, t)| *o == op && t == table)
      .count()
  }

  fn total(&self) -> usize { self.calls.lock().unwrap().len() }

  fn writes(&self) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|(o, _)| *o != "select")
      .count()
  }

  fn fail_table(&self, table: &str) { self.failing.lock().unwrap().insert(table.to_owned()); }

  fn slow_down(&self, value: Uuid) { *self.slow.lock().unwrap() = Some(value.to_string()); }

  fn enter(&self, op: &'static str, table: &str) -> sipra_core::Result<()> {
    self.calls.lock().unwrap().push((op, table.to_owned()));
    if self.failing.lock().unwrap().contains(table) {
      return Err(sipra_core::Error::Network("connection reset".into()));
    }
    Ok(())
  }

  fn is_slow(&self, query: &Select) -> bool {
    let slow = self.slow.lock().unwrap().clone();
    slow.is_some_and(|slow| {
      query.predicates.iter().any(|p| {
        matches!(p, Predicate::Eq { value: Value::String(v), .. } if *v == slow)
      })
    })
  }
}

impl DataService for Recorder {
  async fn select<'a>(&'a self, query: &'a Select) -> sipra_core::Result<Vec<Row>> {
    self.enter("select", &query.table)?;
    if self.is_slow(query) {
      tokio::time::sleep(Duration::from_millis(150)).await;
    }
    self.inner.select(query).await
  }

  async fn insert<'a>(&'a self, table: &'a str, row: Row) -> sipra_core::Result<Row> {
    self.enter("insert", table)?;
    self.inner.insert(table, row).await
  }

  async fn update<'a>(
    &'a self,
    table: &'a str,
    filter: &'a RowMatch,
    patch: Row,
  ) -> sipra_core::Result<Vec<Row>> {
    self.enter("update", table)?;
    self.inner.update(table, filter, patch).await
  }

  async fn delete<'a>(&'a self, table: &'a str, filter: &'a RowMatch) -> sipra_core::Result<Vec<Row>> {
    self.enter("delete", table)?;
    self.inner.delete(table, filter).await
  }
}

/// Auth wrapper whose boot lookup and sign-in take a while.
struct SlowAuth {
  inner:   SqliteBackend,
  boot:    Duration,
  sign_in: Duration,
}

impl AuthService for SlowAuth {
  async fn get_session(&self) -> Result<Option<Session>, AuthError> {
    let result = self.inner.get_session().await;
    tokio::time::sleep(self.boot).await;
    result
  }

  fn subscribe(&self) -> AuthSubscription { self.inner.subscribe() }

  async fn sign_in_with_password<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> Result<Session, AuthError> {
    tokio::time::sleep(self.sign_in).await;
    self.inner.sign_in_with_password(email, password).await
  }

  async fn sign_out(&self) -> Result<(), AuthError> { self.inner.sign_out().await }

  fn current_user(&self) -> Option<UserIdentity> { self.inner.current_user() }
}

async fn next_guard(rx: &mut broadcast::Receiver<SessionState>) -> GuardState {
  let state = timeout(WAIT, rx.recv()).await.expect("transition").unwrap();
  GuardState::of(&state)
}

async fn settle_on<A, D>(ctx: &AppContext<A, D>, user: Option<Uuid>) -> Snapshot
where
  A: AuthService + 'static,
  D: DataService + 'static,
{
  let mut rx = ctx.session().watch();
  let _ = timeout(WAIT, rx.wait_for(|s| !s.booting && s.user_id() == user))
    .await
    .expect("session state")
    .unwrap();
  timeout(WAIT, ctx.settled()).await.expect("pipeline settled")
}

// ─── Session store ───────────────────────────────────────────────────────────

#[tokio::test]
async fn sign_in_then_sign_out_guard_sequence() {
  let (b, _) = backend_with_user().await;
  let store = SessionStore::start(Arc::new(b));
  let mut rx = store.transitions();
  assert_eq!(GuardState::of(&store.snapshot()), GuardState::Booting);

  assert_eq!(next_guard(&mut rx).await, GuardState::Unauthenticated);

  store.sign_in(EMAIL, PASSWORD).await.unwrap();
  assert_eq!(next_guard(&mut rx).await, GuardState::Authenticated);

  store.sign_out().await.unwrap();
  assert_eq!(next_guard(&mut rx).await, GuardState::Unauthenticated);
  assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn boot_restores_existing_session() {
  let (b, user) = backend_with_user().await;
  b.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();

  let store = SessionStore::start(Arc::new(b));
  let mut rx = store.transitions();
  assert_eq!(next_guard(&mut rx).await, GuardState::Authenticated);
  assert_eq!(store.snapshot().user_id(), Some(user.id));
}

#[tokio::test]
async fn failed_sign_in_reports_and_keeps_state() {
  let (b, _) = backend_with_user().await;
  let store = SessionStore::start(Arc::new(b));
  let booted = timeout(WAIT, store.booted()).await.unwrap();
  let mut rx = store.transitions();

  let err = store.sign_in(EMAIL, "wrong").await.unwrap_err();
  assert_eq!(err, AuthError::InvalidCredentials);
  assert_eq!(store.snapshot(), booted);
  assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn sign_in_during_boot_never_flashes_unauthenticated() {
  let (b, user) = backend_with_user().await;
  let auth = SlowAuth {
    inner:   b,
    boot:    Duration::from_millis(50),
    sign_in: Duration::from_millis(150),
  };
  let store = SessionStore::start(Arc::new(auth));
  let mut rx = store.transitions();

  store.sign_in(EMAIL, PASSWORD).await.unwrap();

  assert_eq!(next_guard(&mut rx).await, GuardState::Authenticated);
  assert_eq!(store.snapshot().user_id(), Some(user.id));
  assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn duplicate_states_are_not_republished() {
  let (b, _) = backend_with_user().await;
  let store = SessionStore::start(Arc::new(b));
  timeout(WAIT, store.booted()).await.unwrap();
  let mut rx = store.transitions();

  // Signing out while signed out changes nothing.
  store.sign_out().await.unwrap();
  store.sign_in(EMAIL, PASSWORD).await.unwrap();
  assert_eq!(next_guard(&mut rx).await, GuardState::Authenticated);
  assert!(rx.try_recv().is_err());
}

// ─── Profile resolver ────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_profile_is_absent_not_error() {
  let recorder = Recorder::new(backend().await);
  let resolver = ProfileResolver::new(recorder.clone());
  let user = Uuid::new_v4();

  resolver.resolve(Some(user)).await;

  let state = resolver.snapshot();
  assert_eq!(state.user_id, Some(user));
  assert!(!state.loading);
  assert_eq!(state.profile, Stage::Empty);
  assert!(state.profile().is_none());
  assert_eq!(recorder.count("select", "profiles"), 1);
}

#[tokio::test]
async fn profile_role_resolved() {
  let b = backend().await;
  let user = Uuid::new_v4();
  seed_profile(&b, user, "operador").await;
  let resolver = ProfileResolver::new(Arc::new(b));

  resolver.resolve(Some(user)).await;
  assert_eq!(resolver.snapshot().role(), Some(&Role::Operator));
}

#[tokio::test]
async fn failed_profile_fetch_reads_as_absent() {
  let recorder = Recorder::new(backend().await);
  recorder.fail_table("profiles");
  let resolver = ProfileResolver::new(recorder.clone());

  resolver.resolve(Some(Uuid::new_v4())).await;

  let state = resolver.snapshot();
  assert!(!state.loading);
  assert!(matches!(state.profile, Stage::Failed(_)));
  assert!(state.role().is_none());
}

#[tokio::test]
async fn clearing_profile_makes_no_call() {
  let recorder = Recorder::new(backend().await);
  let resolver = ProfileResolver::new(recorder.clone());

  resolver.resolve(None).await;
  assert_eq!(recorder.total(), 0);
  assert_eq!(resolver.snapshot(), Default::default());
}

#[tokio::test]
async fn later_profile_resolve_wins() {
  let b = backend().await;
  let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
  seed_profile(&b, first, "admin").await;
  seed_profile(&b, second, "consultor").await;
  let recorder = Recorder::new(b);
  recorder.slow_down(first);
  let resolver = ProfileResolver::new(recorder.clone());

  tokio::join!(resolver.resolve(Some(first)), async {
    tokio::time::sleep(Duration::from_millis(10)).await;
    resolver.resolve(Some(second)).await;
  });

  let state = resolver.snapshot();
  assert_eq!(state.user_id, Some(second));
  assert_eq!(state.role(), Some(&Role::Consultant));
  assert!(!state.loading);
}

#[tokio::test]
async fn refresh_rereads_profile() {
  let b = backend().await;
  let user = Uuid::new_v4();
  let recorder = Recorder::new(b.clone());
  let resolver = ProfileResolver::new(recorder.clone());
  resolver.resolve(Some(user)).await;
  assert!(resolver.snapshot().profile().is_none());

  seed_profile(&b, user, "admin").await;
  resolver.refresh().await;
  assert_eq!(resolver.snapshot().role(), Some(&Role::Admin));
  assert_eq!(recorder.count("select", "profiles"), 2);
}

// ─── Area resolver ───────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_area_skips_role_lookup() {
  let recorder = Recorder::new(backend().await);
  let resolver = AreaResolver::new(recorder.clone(), AREA_CODE);

  resolver.resolve(Some(Uuid::new_v4())).await;

  let state = resolver.snapshot();
  assert!(state.area().is_none());
  assert!(state.role().is_none());
  assert!(!state.loading);
  assert_eq!(recorder.count("select", "areas"), 1);
  assert_eq!(recorder.count("select", "roles_area"), 0);
}

#[tokio::test]
async fn area_and_role_resolved() {
  let b = backend().await;
  let user = Uuid::new_v4();
  let area = seed_area(&b).await;
  seed_area_role(&b, user, area, "operador").await;
  // A grant in another area must not leak in.
  seed_area_role(&b, user, Uuid::new_v4(), "admin").await;
  let resolver = AreaResolver::new(Arc::new(b), AREA_CODE);

  resolver.resolve(Some(user)).await;

  let state = resolver.snapshot();
  assert_eq!(state.area_id(), Some(area));
  assert_eq!(state.area().map(|a| a.code.as_str()), Some(AREA_CODE));
  assert_eq!(state.role(), Some(&Role::Operator));
}

#[tokio::test]
async fn area_without_grant_has_no_role() {
  let b = backend().await;
  seed_area(&b).await;
  let resolver = AreaResolver::new(Arc::new(b), AREA_CODE);

  resolver.resolve(Some(Uuid::new_v4())).await;

  let state = resolver.snapshot();
  assert!(state.area().is_some());
  assert_eq!(state.role, Stage::Empty);
}

#[tokio::test]
async fn clearing_area_makes_no_call() {
  let recorder = Recorder::new(backend().await);
  let resolver = AreaResolver::new(recorder.clone(), AREA_CODE);
  resolver.resolve(None).await;
  assert_eq!(recorder.total(), 0);
  assert!(resolver.snapshot().area().is_none());
}

#[tokio::test]
async fn later_area_resolve_wins() {
  let b = backend().await;
  let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
  let area = seed_area(&b).await;
  seed_area_role(&b, first, area, "admin").await;
  seed_area_role(&b, second, area, "consultor").await;
  let recorder = Recorder::new(b);
  recorder.slow_down(first);
  let resolver = AreaResolver::new(recorder.clone(), AREA_CODE);

  tokio::join!(resolver.resolve(Some(first)), async {
    tokio::time::sleep(Duration::from_millis(10)).await;
    resolver.resolve(Some(second)).await;
  });

  let state = resolver.snapshot();
  assert_eq!(state.user_id, Some(second));
  assert_eq!(state.role(), Some(&Role::Consultant));
}

// ─── Context ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn context_follows_the_signed_in_user() {
  let (b, user) = backend_with_user().await;
  seed_profile(&b, user.id, "admin").await;
  let area = seed_area(&b).await;
  seed_area_role(&b, user.id, area, "consultor").await;
  let recorder = Recorder::new(b.clone());
  let ctx = AppContext::start(Arc::new(b), recorder.clone(), ContextConfig::default());

  let snap = settle_on(&ctx, None).await;
  assert!(snap.profile.profile().is_none());
  assert_eq!(recorder.total(), 0);

  ctx.session().sign_in(EMAIL, PASSWORD).await.unwrap();
  let snap = settle_on(&ctx, Some(user.id)).await;
  assert_eq!(snap.profile.role(), Some(&Role::Admin));
  assert_eq!(snap.area.area_id(), Some(area));
  assert_eq!(snap.area.role(), Some(&Role::Consultant));
  assert!(snap.events_access().can_write());
  assert!(!snap.registros_access().can_write());

  ctx.session().sign_out().await.unwrap();
  let snap = settle_on(&ctx, None).await;
  assert!(snap.profile.profile().is_none());
  assert!(snap.area.area().is_none());

  ctx.shutdown().await;
}

// ─── Record views ────────────────────────────────────────────────────────────

/// A signed-in backend, a recorder over it and writer access for events.
async fn events_fixture(role: &str) -> (Arc<Recorder>, EventsView<Recorder>) {
  let (b, user) = backend_with_user().await;
  b.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();
  let recorder = Recorder::new(b);
  let mut view = EventsView::new(recorder.clone());
  view.set_access(Access {
    role:    Some(Role::from(role)),
    user_id: Some(user.id),
    area_id: None,
  });
  (recorder, view)
}

fn day(d: u32) -> chrono::DateTime<Utc> { Utc.with_ymd_and_hms(2025, 3, d, 12, 0, 0).unwrap() }

#[tokio::test]
async fn list_filters_by_status_and_inclusive_range() {
  let (_recorder, mut view) = events_fixture("admin").await;
  for d in 1..=5 {
    let mut draft = EventDraft::new(format!("e{d}"), day(d));
    draft.status = if d == 3 { EventStatus::Open } else { EventStatus::Closed };
    view.create(&draft).await.unwrap();
  }

  view.set_filter(RecordFilter {
    status:        Some(EventStatus::Closed),
    kind_contains: None,
    range:         DateRange::from_dates_in(
      &Utc,
      NaiveDate::from_ymd_opt(2025, 3, 2),
      NaiveDate::from_ymd_opt(2025, 3, 4),
    ),
  });
  view.load().await.unwrap();
  let titles: Vec<_> = view.items().iter().map(|e| e.title.as_str()).collect();
  assert_eq!(titles, vec!["e4", "e2"]);

  view.set_filter(RecordFilter {
    status: Some(EventStatus::Closed),
    ..RecordFilter::default()
  });
  view.load().await.unwrap();
  assert_eq!(view.items().len(), 4);
}

#[tokio::test]
async fn type_filter_is_case_insensitive_contains() {
  let (_recorder, mut view) = events_fixture("operador").await;
  for kind in ["Patrullaje", "monitoreo", "patrullaje nocturno"] {
    let mut draft = EventDraft::new("x", day(1));
    draft.event_type = kind.into();
    view.create(&draft).await.unwrap();
  }
  view.set_filter(RecordFilter {
    kind_contains: Some("  PATRULL ".into()),
    ..RecordFilter::default()
  });
  view.load().await.unwrap();
  assert_eq!(view.items().len(), 2);
}

#[tokio::test]
async fn empty_title_rejected_before_any_call() {
  let (recorder, mut view) = events_fixture("admin").await;
  let err = view.create(&EventDraft::new("   ", day(1))).await.unwrap_err();
  assert!(matches!(err, ViewError::EmptyTitle));
  assert_eq!(recorder.total(), 0);
  assert_eq!(view.message(), Some("a title is required"));
}

#[tokio::test]
async fn consultant_cannot_mutate() {
  let (recorder, mut view) = events_fixture("consultor").await;
  let id = Uuid::new_v4();
  let draft = EventDraft::new("Ronda", day(1));

  assert!(matches!(view.create(&draft).await, Err(ViewError::ReadOnly(_))));
  assert!(matches!(view.update(id, &draft).await, Err(ViewError::ReadOnly(_))));
  assert!(matches!(view.close(id).await, Err(ViewError::ReadOnly(_))));
  assert!(matches!(view.begin_delete(id), Err(ViewError::ReadOnly(_))));
  assert_eq!(recorder.writes(), 0);
  assert_eq!(recorder.total(), 0);
}

#[tokio::test]
async fn no_role_cannot_mutate() {
  let (recorder, mut view) = events_fixture("admin").await;
  view.set_access(Access::default());
  let err = view.create(&EventDraft::new("Ronda", day(1))).await.unwrap_err();
  assert!(matches!(err, ViewError::ReadOnly(None)));
  assert_eq!(view.message(), Some("read-only access (role: —)"));
  assert_eq!(recorder.total(), 0);
}

#[tokio::test]
async fn close_stamps_closure_time() {
  let (_recorder, mut view) = events_fixture("admin").await;
  view.create(&EventDraft::new("Ronda", day(1))).await.unwrap();
  let id = view.items()[0].id;
  assert!(view.items()[0].closed_at.is_none());

  view.close(id).await.unwrap();
  let event = view.item(id).unwrap();
  assert_eq!(event.status, EventStatus::Closed);
  assert!(event.closed_at.is_some());

  assert!(matches!(view.close(id).await, Err(ViewError::AlreadyClosed)));
}

#[tokio::test]
async fn edit_into_and_out_of_closed() {
  let (_recorder, mut view) = events_fixture("admin").await;
  view.create(&EventDraft::new("Ronda", day(1))).await.unwrap();
  let id = view.items()[0].id;

  let mut draft = EventDraft::from_event(view.item(id).unwrap());
  draft.status = EventStatus::Closed;
  draft.title = "Ronda nocturna".into();
  view.update(id, &draft).await.unwrap();
  let event = view.item(id).unwrap();
  assert_eq!(event.title, "Ronda nocturna");
  assert!(event.closed_at.is_some());

  draft.status = EventStatus::Open;
  view.update(id, &draft).await.unwrap();
  assert!(view.item(id).unwrap().closed_at.is_none());
}

#[tokio::test]
async fn editing_unlisted_record_keeps_closure_time() {
  let (_recorder, mut view) = events_fixture("admin").await;
  view.create(&EventDraft::new("Ronda", day(1))).await.unwrap();
  let id = view.items()[0].id;
  view.close(id).await.unwrap();
  let closed_at = view.item(id).unwrap().closed_at;
  assert!(closed_at.is_some());

  view.set_filter(RecordFilter {
    status: Some(EventStatus::Open),
    ..RecordFilter::default()
  });
  view.load().await.unwrap();
  assert!(view.item(id).is_none());

  let mut draft = EventDraft::new("Ronda corregida", day(1));
  draft.status = EventStatus::Closed;
  view.update(id, &draft).await.unwrap();

  view.set_filter(RecordFilter::default());
  view.load().await.unwrap();
  let event = view.item(id).unwrap();
  assert_eq!(event.title, "Ronda corregida");
  assert_eq!(event.closed_at, closed_at);
}

#[tokio::test]
async fn delete_needs_confirmation() {
  let (recorder, mut view) = events_fixture("admin").await;
  view.create(&EventDraft::new("Ronda", day(1))).await.unwrap();
  let id = view.items()[0].id;

  let prompt = view.begin_delete(id).unwrap();
  assert_eq!(prompt.title, "Ronda");
  assert_eq!(recorder.count("delete", "events"), 0);

  view.confirm_delete(prompt).await.unwrap();
  assert_eq!(recorder.count("delete", "events"), 1);
  assert!(view.items().is_empty());
}

#[tokio::test]
async fn mutations_reload_the_list() {
  let (recorder, mut view) = events_fixture("admin").await;
  view.create(&EventDraft::new("Ronda", day(1))).await.unwrap();
  assert_eq!(recorder.count("select", "events"), 1);
  view.close(view.items()[0].id).await.unwrap();
  assert_eq!(recorder.count("select", "events"), 2);
}

#[tokio::test]
async fn service_refusal_becomes_message() {
  let (b, user) = backend_with_user().await;
  // Writer role in the client, but no session at the service.
  let mut view = EventsView::new(Arc::new(b));
  view.set_access(Access {
    role:    Some(Role::Admin),
    user_id: Some(user.id),
    area_id: None,
  });
  let err = view.create(&EventDraft::new("Ronda", day(1))).await.unwrap_err();
  assert!(matches!(
    err,
    ViewError::Data(sipra_core::Error::PermissionDenied(_))
  ));
  assert!(view.message().is_some_and(|m| m.contains("permission denied")));
}

#[tokio::test]
async fn failed_load_clears_list() {
  let (recorder, mut view) = events_fixture("admin").await;
  view.create(&EventDraft::new("Ronda", day(1))).await.unwrap();
  assert_eq!(view.items().len(), 1);

  recorder.fail_table("events");
  assert!(view.load().await.is_err());
  assert!(view.items().is_empty());
  assert!(view.message().is_some_and(|m| m.contains("connection reset")));
}

#[tokio::test]
async fn registros_wait_for_user_and_area() {
  let (b, user) = backend_with_user().await;
  b.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();
  let area = seed_area(&b).await;
  let recorder = Recorder::new(b.clone());
  let mut view = RegistrosView::new(recorder.clone());

  view.set_access(Access {
    role:    Some(Role::Operator),
    user_id: Some(user.id),
    area_id: None,
  });
  view.load().await.unwrap();
  assert_eq!(recorder.total(), 0);

  view.set_access(Access {
    role:    Some(Role::Operator),
    user_id: Some(user.id),
    area_id: Some(area),
  });
  view.create(&RegistroDraft::new("Lobo marino varado")).await.unwrap();
  // Someone else's area.
  b.insert(
    "registros",
    row(json!({"titulo": "otro", "categoria": "operativo", "estado": "abierto", "area_id": Uuid::new_v4()})),
  )
  .await
  .unwrap();
  view.load().await.unwrap();

  assert_eq!(view.items().len(), 1);
  let registro = &view.items()[0];
  assert_eq!(registro.area_id, Some(area));
  assert_eq!(registro.created_by, Some(user.id));
  assert_eq!(registro.status, RegistroStatus::Open);

  let stored = b.get("registros", registro.id).await.unwrap().unwrap();
  assert_eq!(stored["fuente"], json!("app"));
  assert_eq!(stored["nivel_validacion"], json!("pendiente"));
}

#[tokio::test]
async fn registros_drop_rows_when_the_user_changes() {
  let (b, user) = backend_with_user().await;
  b.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();
  let area = seed_area(&b).await;
  let recorder = Recorder::new(b);
  let mut view = RegistrosView::new(recorder.clone());
  view.set_access(Access {
    role:    Some(Role::Admin),
    user_id: Some(user.id),
    area_id: Some(area),
  });
  view.create(&RegistroDraft::new("Censo")).await.unwrap();
  assert_eq!(view.items().len(), 1);
  let selects = recorder.count("select", "registros");

  // Another user whose area is not known yet.
  assert!(view.set_access(Access {
    role:    None,
    user_id: Some(Uuid::new_v4()),
    area_id: None,
  }));
  assert!(view.items().is_empty());
  assert_eq!(view.message(), None);

  view.load().await.unwrap();
  assert!(view.items().is_empty());
  assert_eq!(recorder.count("select", "registros"), selects);
}

#[tokio::test]
async fn role_change_keeps_the_listed_rows() {
  let (_recorder, mut view) = events_fixture("admin").await;
  view.create(&EventDraft::new("Ronda", day(1))).await.unwrap();
  let access = view.access().clone();
  assert!(view.set_access(Access {
    role: Some(Role::Consultant),
    ..access
  }));
  assert_eq!(view.items().len(), 1);
}

#[tokio::test]
async fn registros_close_sets_fecha_cierre_and_cannot_delete() {
  let (b, user) = backend_with_user().await;
  b.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();
  let area = seed_area(&b).await;
  let mut view = RegistrosView::new(Arc::new(b));
  view.set_access(Access {
    role:    Some(Role::Admin),
    user_id: Some(user.id),
    area_id: Some(area),
  });
  view.create(&RegistroDraft::new("Censo")).await.unwrap();
  let id = view.items()[0].id;

  view.close(id).await.unwrap();
  let registro = view.item(id).unwrap();
  assert_eq!(registro.status, RegistroStatus::Closed);
  assert!(registro.closed_at.is_some());

  assert!(matches!(view.begin_delete(id), Err(ViewError::NotDeletable)));
}
