//! Organizational areas and per-area roles.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::Role;

pub const AREAS_TABLE: &str = "areas";
pub const AREA_COLUMNS: &[&str] = &["id", "nombre", "codigo"];

pub const AREA_ROLES_TABLE: &str = "roles_area";
pub const AREA_ROLE_COLUMNS: &[&str] = &["user_id", "area_id", "rol"];

/// Code of the single active area until area selection exists.
pub const DEFAULT_AREA_CODE: &str = "RN-ANP-PLO";

/// An organizational scoping unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
  pub id:   Uuid,
  #[serde(rename = "nombre")]
  pub name: String,
  #[serde(rename = "codigo")]
  pub code: String,
}

/// The join row granting a user a role within one area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaRole {
  pub user_id: Uuid,
  pub area_id: Uuid,
  #[serde(rename = "rol")]
  pub role:    Role,
}
