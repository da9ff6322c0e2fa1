//! Password authentication for [`SqliteBackend`].
//!
//! Passwords are stored as argon2 PHC strings. Issued tokens are random
//! 32-byte hex strings; only their SHA-256 digests are kept in `sessions`.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use chrono::Utc;
use rand_core::{OsRng, RngCore};
use rusqlite::OptionalExtension as _;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use sipra_core::{
  AuthError,
  auth::{AuthChange, AuthService, AuthSubscription, Session, UserIdentity},
};

use crate::{
  Error, Result, SqliteBackend,
  encode::{decode_dt, decode_uuid, encode_dt, encode_uuid},
};

fn random_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

fn token_hash(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| Error::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, phc: &str) -> Result<()> {
  let parsed = PasswordHash::new(phc).map_err(|e| Error::PasswordHash(e.to_string()))?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .map_err(|_| Error::InvalidCredentials)
}

impl SqliteBackend {
  /// Register a user that can sign in with `email` / `password`.
  pub async fn create_user(&self, email: &str, password: &str) -> Result<UserIdentity> {
    let email = email.trim().to_owned();
    let user = UserIdentity {
      id:    Uuid::new_v4(),
      email: Some(email.clone()),
    };
    let hash = hash_password(password)?;
    let id_str = encode_uuid(user.id);
    let at_str = encode_dt(Utc::now());

    let inserted = self
      .conn
      .call(move |conn| {
        let taken: bool = conn
          .query_row(
            "SELECT 1 FROM users WHERE email = ?1",
            rusqlite::params![email],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if taken {
          return Ok(false);
        }
        conn.execute(
          "INSERT INTO users (user_id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, email, hash, at_str],
        )?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::DuplicateEmail(user.email.unwrap_or_default()));
    }
    tracing::info!(user = %user.id, "local user created");
    Ok(user)
  }

  async fn password_sign_in(&self, email: &str, password: &str) -> Result<Session> {
    let email = email.trim().to_owned();
    let found: Option<(String, String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, email, password_hash FROM users WHERE email = ?1",
              rusqlite::params![email],
              |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?,
        )
      })
      .await?;

    let Some((user_id, email, phc)) = found else {
      return Err(Error::InvalidCredentials);
    };
    verify_password(password, &phc)?;

    let user = UserIdentity {
      id:    decode_uuid(&user_id)?,
      email: Some(email),
    };
    let session = self.issue_session(user).await?;
    self.session.set(AuthChange::SignedIn, Some(session.clone()));
    Ok(session)
  }

  /// Mint tokens for `user` and remember them as the session to restore.
  async fn issue_session(&self, user: UserIdentity) -> Result<Session> {
    let session = Session {
      access_token: random_token(),
      refresh_token: random_token(),
      expires_at: Utc::now() + self.session_ttl,
      user,
    };

    let token_hash_str = token_hash(&session.access_token);
    let refresh_hash_str = token_hash(&session.refresh_token);
    let user_id_str = encode_uuid(session.user.id);
    let expires_str = encode_dt(session.expires_at);
    let created_str = encode_dt(Utc::now());
    let access = session.access_token.clone();
    let refresh = session.refresh_token.clone();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO sessions (token_hash, refresh_hash, user_id, expires_at, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![token_hash_str, refresh_hash_str, user_id_str, expires_str, created_str],
        )?;
        tx.execute(
          "INSERT INTO current_session (slot, access_token, refresh_token) VALUES (1, ?1, ?2)
           ON CONFLICT(slot) DO UPDATE SET access_token = excluded.access_token,
                                           refresh_token = excluded.refresh_token",
          rusqlite::params![access, refresh],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(session)
  }

  /// Look up the persisted session, dropping it when it has expired or no
  /// longer matches a `sessions` row.
  async fn restore_session(&self) -> Result<Option<Session>> {
    let stored: Option<(String, String)> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT access_token, refresh_token FROM current_session WHERE slot = 1",
              [],
              |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;
    let Some((access_token, refresh_token)) = stored else {
      return Ok(None);
    };

    let hash = token_hash(&access_token);
    let found: Option<(String, String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT s.user_id, u.email, s.expires_at
               FROM sessions s JOIN users u ON u.user_id = s.user_id
               WHERE s.token_hash = ?1",
              rusqlite::params![hash],
              |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?,
        )
      })
      .await?;

    let session = match found {
      Some((user_id, email, expires_at)) => Some(Session {
        access_token,
        refresh_token,
        expires_at: decode_dt(&expires_at)?,
        user: UserIdentity {
          id:    decode_uuid(&user_id)?,
          email: Some(email),
        },
      }),
      None => None,
    };

    match session {
      Some(s) if !s.is_expired_at(Utc::now()) => Ok(Some(s)),
      stale => {
        if stale.is_some() {
          tracing::info!("stored session expired");
        }
        self.forget_session(None).await?;
        Ok(None)
      }
    }
  }

  /// Remove the restorable session and, when given, its `sessions` row.
  async fn forget_session(&self, access_token: Option<&str>) -> Result<()> {
    let hash = access_token.map(token_hash);
    self
      .conn
      .call(move |conn| {
        if let Some(hash) = hash {
          conn.execute("DELETE FROM sessions WHERE token_hash = ?1", rusqlite::params![hash])?;
        }
        conn.execute("DELETE FROM current_session WHERE slot = 1", [])?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── AuthService impl ────────────────────────────────────────────────────────

impl AuthService for SqliteBackend {
  async fn get_session(&self) -> Result<Option<Session>, AuthError> {
    if let Some(session) = self.session.get() {
      if !session.is_expired_at(Utc::now()) {
        return Ok(Some(session));
      }
      self.forget_session(Some(&session.access_token)).await?;
      self.session.set(AuthChange::SignedOut, None);
      return Ok(None);
    }

    Ok(
      self
        .restore_session()
        .await?
        .map(|stored| self.session.restore_if_vacant(stored)),
    )
  }

  fn subscribe(&self) -> AuthSubscription { self.session.subscribe() }

  async fn sign_in_with_password<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> Result<Session, AuthError> {
    Ok(self.password_sign_in(email, password).await?)
  }

  async fn sign_out(&self) -> Result<(), AuthError> {
    let Some(session) = self.session.get() else {
      return Ok(());
    };
    self.forget_session(Some(&session.access_token)).await?;
    self.session.set(AuthChange::SignedOut, None);
    Ok(())
  }

  fn current_user(&self) -> Option<UserIdentity> { self.session.user() }
}
