//! SQLite schema applied on every open.

/// `table_rows` holds every data-service table as JSON documents keyed by
/// `(tbl, row_id)`. The auth tables are ordinary relational tables; only
/// token hashes are stored in `sessions`, while `current_session` keeps the
/// raw tokens of the session to restore at the next boot.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS table_rows (
  tbl    TEXT NOT NULL,
  row_id TEXT NOT NULL,
  data   TEXT NOT NULL,
  PRIMARY KEY (tbl, row_id)
);

CREATE TABLE IF NOT EXISTS users (
  user_id       TEXT PRIMARY KEY,
  email         TEXT NOT NULL UNIQUE COLLATE NOCASE,
  password_hash TEXT NOT NULL,
  created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
  token_hash   TEXT PRIMARY KEY,
  refresh_hash TEXT NOT NULL UNIQUE,
  user_id      TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
  expires_at   TEXT NOT NULL,
  created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS current_session (
  slot          INTEGER PRIMARY KEY CHECK (slot = 1),
  access_token  TEXT NOT NULL,
  refresh_token TEXT NOT NULL
);
";
