//! Route gating from session state.

use crate::session::SessionState;

/// Screens of the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Route {
  Home,
  Events,
  Registros,
  Login,
  NotFound,
}

impl Route {
  pub fn path(self) -> &'static str {
    match self {
      Self::Home => "/",
      Self::Events => "/events",
      Self::Registros => "/registros",
      Self::Login => "/login",
      Self::NotFound => "/404",
    }
  }

  pub fn from_path(path: &str) -> Self {
    match path.trim_end_matches('/') {
      "" => Self::Home,
      "/events" => Self::Events,
      "/registros" => Self::Registros,
      "/login" => Self::Login,
      _ => Self::NotFound,
    }
  }

  /// Whether the route requires a signed-in user.
  pub fn is_guarded(self) -> bool { matches!(self, Self::Home | Self::Events | Self::Registros) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
  Booting,
  Unauthenticated,
  Authenticated,
}

impl GuardState {
  pub fn of(state: &SessionState) -> Self {
    match (state.booting, &state.session) {
      (true, _) => Self::Booting,
      (false, None) => Self::Unauthenticated,
      (false, Some(_)) => Self::Authenticated,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
  /// Session not settled yet; show a placeholder.
  Loading,
  Redirect {
    to:        Route,
    /// Where to go once the redirect target is done (after sign-in).
    return_to: Option<Route>,
  },
  Render,
}

/// Decide what to show for `requested`. `return_to` is the route remembered
/// by an earlier redirect to the login screen.
///
/// Never redirects while booting.
pub fn decide(state: GuardState, requested: Route, return_to: Option<Route>) -> GuardDecision {
  match (state, requested) {
    (_, Route::NotFound) => GuardDecision::Render,
    (GuardState::Booting, _) => GuardDecision::Loading,
    (GuardState::Authenticated, Route::Login) => GuardDecision::Redirect {
      to:        return_to.filter(|r| r.is_guarded()).unwrap_or(Route::Home),
      return_to: None,
    },
    (GuardState::Unauthenticated, route) if route.is_guarded() => GuardDecision::Redirect {
      to:        Route::Login,
      return_to: Some(route),
    },
    _ => GuardDecision::Render,
  }
}
