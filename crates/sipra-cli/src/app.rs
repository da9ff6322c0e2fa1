//! Application state machine and event dispatcher.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use sipra_console::{
  Access, AppContext, ContextConfig, DeletePrompt, GuardDecision, GuardState, RecordView, Route,
  Snapshot, ViewError, guard,
};
use sipra_core::{
  auth::AuthService,
  data::DataService,
  record::{Events, Registros},
};
use uuid::Uuid;

use crate::{
  form::{Field, Form, FormAction},
  kinds::{self, ConsoleKind},
};

// ─── List screens ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
  Filter,
  Create,
  Edit(Uuid),
}

/// Something drawn over a list that takes every key until dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
  Form { form: Form, purpose: Purpose },
  Confirm(DeletePrompt),
}

/// A record list plus its cursor and modal.
pub struct ListScreen<K: ConsoleKind, B> {
  pub view:    RecordView<K, B>,
  pub cursor:  usize,
  pub modal:   Option<Modal>,
  /// Local notice shown instead of the view message until the next key.
  pub notice:  Option<String>,
  last_filter: Form,
  stale:       bool,
}

impl<K: ConsoleKind, B: DataService> ListScreen<K, B> {
  fn new(data: Arc<B>) -> Self {
    Self {
      view:        RecordView::new(data),
      cursor:      0,
      modal:       None,
      notice:      None,
      last_filter: kinds::filter_form::<K>(),
      stale:       true,
    }
  }

  pub fn selected(&self) -> Option<&K::Row> { self.view.items().get(self.cursor) }

  /// The message for the status bar, if any.
  pub fn message(&self) -> Option<&str> { self.notice.as_deref().or(self.view.message()) }

  fn set_access(&mut self, access: Access) {
    if self.view.set_access(access) {
      self.stale = true;
    }
  }

  async fn refresh(&mut self) {
    // A failed load leaves its error in the view message.
    let _ = self.view.load().await;
    self.stale = false;
    self.cursor = self.cursor.min(self.view.items().len().saturating_sub(1));
  }

  async fn refresh_if_stale(&mut self) {
    if self.stale && self.view.is_ready() {
      self.refresh().await;
    }
  }

  fn read_only(&mut self) {
    self.notice = Some(ViewError::ReadOnly(self.view.access().role.clone()).to_string());
  }

  async fn handle_key(&mut self, key: KeyEvent) {
    self.notice = None;
    match self.modal.take() {
      Some(Modal::Form { mut form, purpose }) => {
        match form.handle_key(key) {
          FormAction::Continue => self.modal = Some(Modal::Form { form, purpose }),
          FormAction::Cancel => {}
          FormAction::Submit => self.submit(form, purpose).await,
        }
        return;
      }
      Some(Modal::Confirm(prompt)) => {
        match key.code {
          KeyCode::Char('y') | KeyCode::Enter => {
            let _ = self.view.confirm_delete(prompt).await;
            self.cursor = self.cursor.min(self.view.items().len().saturating_sub(1));
          }
          KeyCode::Char('n') | KeyCode::Esc => {}
          _ => self.modal = Some(Modal::Confirm(prompt)),
        }
        return;
      }
      None => {}
    }

    let len = self.view.items().len();
    match key.code {
      KeyCode::Down | KeyCode::Char('j') => {
        if self.cursor + 1 < len {
          self.cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
      KeyCode::Char('r') => self.refresh().await,
      KeyCode::Char('/') => {
        self.modal = Some(Modal::Form {
          form:    self.last_filter.clone(),
          purpose: Purpose::Filter,
        });
      }
      KeyCode::Char('n') => {
        if !self.view.can_write() {
          self.read_only();
        } else {
          let form = Form::new(
            format!("New {}", K::LABEL.to_lowercase()),
            K::draft_fields(&K::blank_draft()),
          );
          self.modal = Some(Modal::Form {
            form,
            purpose: Purpose::Create,
          });
        }
      }
      KeyCode::Char('e') => {
        if !self.view.can_write() {
          self.read_only();
        } else if let Some(row) = self.selected() {
          let id = K::id(row);
          let form = Form::new(format!("Edit \"{}\"", K::title(row)), K::draft_fields(&K::draft_of(row)));
          self.modal = Some(Modal::Form {
            form,
            purpose: Purpose::Edit(id),
          });
        }
      }
      KeyCode::Char('c') => {
        if let Some(id) = self.selected().map(K::id) {
          let _ = self.view.close(id).await;
        }
      }
      KeyCode::Char('d') => {
        if let Some(id) = self.selected().map(K::id)
          && let Ok(prompt) = self.view.begin_delete(id)
        {
          self.modal = Some(Modal::Confirm(prompt));
        }
      }
      _ => {}
    }
  }

  /// The draft an edit form of `id` was built from.
  fn edit_base(&self, id: Uuid) -> K::Draft { self.view.item(id).map_or_else(K::blank_draft, K::draft_of) }

  /// Apply a submitted form. Refused forms stay open with the reason.
  async fn submit(&mut self, mut form: Form, purpose: Purpose) {
    let outcome = match purpose {
      Purpose::Filter => match kinds::parse_filter::<K>(&form) {
        Ok(filter) => {
          self.view.set_filter(filter);
          self.last_filter = Form {
            error: None,
            ..form.clone()
          };
          self.refresh().await;
          Ok(())
        }
        Err(e) => Err(e),
      },
      Purpose::Create => match K::parse_draft(&form, &K::blank_draft()) {
        Ok(draft) => self.view.create(&draft).await.map_err(|e| e.to_string()),
        Err(e) => Err(e),
      },
      Purpose::Edit(id) => match K::parse_draft(&form, &self.edit_base(id)) {
        Ok(draft) => self.view.update(id, &draft).await.map_err(|e| e.to_string()),
        Err(e) => Err(e),
      },
    };
    if let Err(e) = outcome {
      form.error = Some(e);
      self.modal = Some(Modal::Form { form, purpose });
    }
  }
}

// ─── App ──────────────────────────────────────────────────────────────────────

pub fn login_form() -> Form { Form::new("Sign in", vec![Field::text("Email", ""), Field::secret("Password")]) }

/// Top-level application state.
pub struct App<B> {
  pub ctx:       AppContext<B, B>,
  /// The screen the user asked for; the guard may show something else.
  pub route:     Route,
  /// Where to go after signing in.
  pub return_to: Option<Route>,
  /// Pipeline state as of the last tick.
  pub snapshot:  Snapshot,
  pub login:     Form,
  pub events:    ListScreen<Events, B>,
  pub registros: ListScreen<Registros, B>,
  /// One-line status message shown in the status bar.
  pub status:    String,
}

impl<B> App<B>
where
  B: AuthService + DataService + 'static,
{
  pub fn new(backend: Arc<B>, config: ContextConfig, start: Route) -> Self {
    let ctx = AppContext::start(backend.clone(), backend.clone(), config);
    let snapshot = ctx.snapshot();
    Self {
      ctx,
      route: start,
      return_to: None,
      snapshot,
      login: login_form(),
      events: ListScreen::new(backend.clone()),
      registros: ListScreen::new(backend),
      status: String::new(),
    }
  }

  pub fn decision(&self) -> GuardDecision {
    guard::decide(GuardState::of(&self.snapshot.session), self.route, self.return_to)
  }

  /// Pull the latest pipeline state, follow guard redirects and reload
  /// lists whose access changed.
  pub async fn tick(&mut self) {
    self.snapshot = self.ctx.snapshot();

    if let GuardDecision::Redirect { to, return_to } = self.decision() {
      tracing::debug!(from = %self.route, %to, "guard redirect");
      if to == Route::Login {
        self.login = login_form();
      }
      self.route = to;
      self.return_to = return_to;
    }

    self.events.set_access(self.snapshot.events_access());
    self.registros.set_access(self.snapshot.registros_access());

    if self.decision() == GuardDecision::Render {
      match self.route {
        Route::Events => self.events.refresh_if_stale().await,
        Route::Registros => self.registros.refresh_if_stale().await,
        _ => {}
      }
    }
  }

  fn navigate(&mut self, route: Route) {
    if self.route == route {
      return;
    }
    self.route = route;
    self.status.clear();
    match route {
      Route::Events => self.events.stale = true,
      Route::Registros => self.registros.stale = true,
      _ => {}
    }
  }

  /// Whether a list modal is capturing keys.
  fn modal_open(&self) -> bool {
    match self.route {
      Route::Events => self.events.modal.is_some(),
      Route::Registros => self.registros.modal.is_some(),
      _ => false,
    }
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    // Global: Ctrl-C quits from anywhere.
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return Ok(false);
    }

    if self.route == Route::Login {
      self.handle_login_key(key).await;
      return Ok(true);
    }
    if self.decision() != GuardDecision::Render {
      return Ok(key.code != KeyCode::Char('q'));
    }

    if !self.modal_open() {
      match key.code {
        KeyCode::Char('q') => return Ok(false),
        KeyCode::Char('1') => self.navigate(Route::Home),
        KeyCode::Char('2') => self.navigate(Route::Events),
        KeyCode::Char('3') => self.navigate(Route::Registros),
        KeyCode::Char('o') => self.sign_out().await,
        _ => self.handle_screen_key(key).await,
      }
      return Ok(true);
    }
    self.handle_screen_key(key).await;
    Ok(true)
  }

  async fn handle_screen_key(&mut self, key: KeyEvent) {
    match self.route {
      Route::Events => self.events.handle_key(key).await,
      Route::Registros => self.registros.handle_key(key).await,
      Route::Home if key.code == KeyCode::Char('r') => {
        tokio::join!(self.ctx.profile().refresh(), self.ctx.area().refresh());
      }
      _ => {}
    }
  }

  async fn handle_login_key(&mut self, key: KeyEvent) {
    match self.login.handle_key(key) {
      FormAction::Continue => {}
      FormAction::Cancel => self.login = login_form(),
      FormAction::Submit => {
        let email = self.login.value("Email").trim().to_owned();
        let password = self.login.value("Password").to_owned();
        if email.is_empty() || password.is_empty() {
          self.login.error = Some("email and password are required".into());
          return;
        }
        self.login.error = None;
        self.status = "Signing in…".into();
        match self.ctx.session().sign_in(&email, &password).await {
          Ok(()) => self.status.clear(),
          Err(e) => {
            self.status.clear();
            self.login.error = Some(e.to_string());
          }
        }
      }
    }
  }

  async fn sign_out(&mut self) {
    match self.ctx.session().sign_out().await {
      Ok(()) => self.status = "Signed out.".into(),
      Err(e) => self.status = format!("Sign-out failed: {e}"),
    }
  }

  pub async fn shutdown(self) { self.ctx.shutdown().await; }
}
