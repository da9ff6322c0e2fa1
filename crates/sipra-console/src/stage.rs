//! Resolution stages and sequence stamps shared by the resolvers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage<T> {
  /// Not resolved yet, or cleared.
  Pending,
  Ready(T),
  /// Looked up; nothing there.
  Empty,
  /// The lookup failed. Consumers treat this like [`Stage::Empty`].
  Failed(String),
}

impl<T> Default for Stage<T> {
  fn default() -> Self { Self::Pending }
}

impl<T> Stage<T> {
  pub fn ready(&self) -> Option<&T> {
    match self {
      Self::Ready(value) => Some(value),
      _ => None,
    }
  }

  pub fn into_ready(self) -> Option<T> {
    match self {
      Self::Ready(value) => Some(value),
      _ => None,
    }
  }

  pub fn is_pending(&self) -> bool { matches!(self, Self::Pending) }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Stage<U> {
    match self {
      Self::Pending => Stage::Pending,
      Self::Ready(value) => Stage::Ready(f(value)),
      Self::Empty => Stage::Empty,
      Self::Failed(message) => Stage::Failed(message),
    }
  }
}

impl<T, E: std::fmt::Display> From<Result<Option<T>, E>> for Stage<T> {
  fn from(result: Result<Option<T>, E>) -> Self {
    match result {
      Ok(Some(value)) => Self::Ready(value),
      Ok(None) => Self::Empty,
      Err(e) => Self::Failed(e.to_string()),
    }
  }
}

/// Hands out monotonically increasing tickets; only the newest is current.
#[derive(Debug, Default)]
pub struct Sequencer {
  latest: AtomicU64,
}

/// Stamp of one resolution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Sequencer {
  pub fn new() -> Self { Self::default() }

  /// Issue a ticket that supersedes every earlier one.
  pub fn issue(&self) -> Ticket { Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1) }

  pub fn is_current(&self, ticket: Ticket) -> bool { self.latest.load(Ordering::SeqCst) == ticket.0 }
}
