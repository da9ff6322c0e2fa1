//! The SIPRA console pipeline and record views.
//!
//! Data flows leaves-first: the [`SessionStore`] resolves the signed-in user,
//! the [`ProfileResolver`] and [`AreaResolver`] react to user changes, the
//! [`guard`] turns session state into navigation decisions, and the
//! [`RecordView`]s consume the resolved role and area. [`AppContext`] owns
//! the whole chain and its lifecycle.
//!
//! Nothing here talks to the network directly; every call goes through the
//! [`AuthService`](sipra_core::auth::AuthService) and
//! [`DataService`](sipra_core::data::DataService) collaborators.

pub mod area;
pub mod context;
pub mod guard;
pub mod profile;
pub mod session;
pub mod stage;
pub mod view;

pub use area::{AreaResolver, AreaState};
pub use context::{AppContext, ContextConfig, Snapshot};
pub use guard::{GuardDecision, GuardState, Route};
pub use profile::{ProfileResolver, ProfileState};
pub use session::{SessionState, SessionStore};
pub use stage::Stage;
pub use view::{Access, DeletePrompt, EventsView, RecordView, RegistrosView, ViewError};

#[cfg(test)]
mod tests;
