//! Roles and the global user profile.
//!
//! Write permission is a function of the role string alone. The check is a
//! UX convenience; the data service enforces access on its own.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PROFILES_TABLE: &str = "profiles";
pub const PROFILE_COLUMNS: &[&str] = &["id", "full_name", "role", "created_at"];

/// A role label, either global (on a [`Profile`]) or per area.
///
/// Stored values are Spanish (`operador`, `consultor`); English spellings
/// are accepted on input. Anything else is kept verbatim and grants nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
  Admin,
  Operator,
  Consultant,
  Other(String),
}

impl Role {
  pub fn can_write(&self) -> bool { matches!(self, Self::Admin | Self::Operator) }

  pub fn as_str(&self) -> &str {
    match self {
      Self::Admin => "admin",
      Self::Operator => "operador",
      Self::Consultant => "consultor",
      Self::Other(s) => s,
    }
  }
}

impl From<String> for Role {
  fn from(raw: String) -> Self {
    match raw.trim().to_ascii_lowercase().as_str() {
      "admin" => Self::Admin,
      "operador" | "operator" => Self::Operator,
      "consultor" | "consultant" => Self::Consultant,
      _ => Self::Other(raw),
    }
  }
}

impl From<&str> for Role {
  fn from(raw: &str) -> Self { Self::from(raw.to_owned()) }
}

impl From<Role> for String {
  fn from(role: Role) -> Self {
    match role {
      Role::Other(s) => s,
      other => other.as_str().to_owned(),
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Whether an optionally-resolved role may write. No role means no.
pub fn can_write(role: Option<&Role>) -> bool { role.is_some_and(Role::can_write) }

/// Global, user-level role record (`profiles` row). Read-only to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub id:         Uuid,
  #[serde(default)]
  pub full_name:  Option<String>,
  #[serde(default)]
  pub role:       Option<Role>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_spanish_and_english_labels() {
    assert_eq!(Role::from("operador"), Role::Operator);
    assert_eq!(Role::from("Operator"), Role::Operator);
    assert_eq!(Role::from("consultor"), Role::Consultant);
    assert_eq!(Role::from(" ADMIN "), Role::Admin);
    assert_eq!(Role::from("auditor"), Role::Other("auditor".into()));
  }

  #[test]
  fn only_admin_and_operator_write() {
    assert!(can_write(Some(&Role::Admin)));
    assert!(can_write(Some(&Role::Operator)));
    assert!(!can_write(Some(&Role::Consultant)));
    assert!(!can_write(Some(&Role::Other("superuser".into()))));
    assert!(!can_write(None));
  }

  #[test]
  fn profile_with_null_role_decodes() {
    let json = serde_json::json!({
      "id": "6f1c1a52-3a43-4d8e-9f57-3b7b2a8f5b10",
      "full_name": null,
      "role": null,
      "created_at": "2025-03-01T12:00:00Z",
    });
    let profile: Profile = serde_json::from_value(json).unwrap();
    assert!(profile.role.is_none());
  }

  #[test]
  fn role_round_trips_through_string() {
    let value = serde_json::to_value(Role::Operator).unwrap();
    assert_eq!(value, serde_json::json!("operador"));
  }
}
