//! [`SqliteStore`], the SQLite implementation of the storage traits.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use pharmacy_core::{
  medicine::{Medicine, MedicineInput},
  store::{CredentialStore, MedicineStore},
  user::{NewUser, User},
};

use crate::{
  encode::{RawMedicine, RawUser, encode_dt},
  error::is_unique_violation,
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A pharmacy store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store. Used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Count every user row. Used by tests to check uniqueness enforcement.
  pub async fn count_users(&self) -> Result<i64> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
      })
      .await?;
    Ok(count)
  }

  async fn find_user_where(
    &self,
    clause: &'static str,
    param: rusqlite::types::Value,
  ) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {} FROM users WHERE {clause}", RawUser::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![param], RawUser::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }
}

// ─── CredentialStore impl ────────────────────────────────────────────────────

impl CredentialStore for SqliteStore {
  type Error = Error;

  async fn find_by_name(&self, username: &str) -> Result<Option<User>> {
    self
      .find_user_where("username = ?1", username.to_owned().into())
      .await
  }

  async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
    self.find_user_where("id = ?1", id.into()).await
  }

  async fn insert(&self, user: NewUser) -> Result<User> {
    let created_at = Utc::now();
    let username   = user.username.clone();
    let hash       = user.password_hash.clone();
    let at_str     = encode_dt(created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![username, hash, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await;

    let id = match inserted {
      Ok(id) => id,
      Err(e) if is_unique_violation(&e) => {
        return Err(pharmacy_core::Error::DuplicateUsername(user.username).into());
      }
      Err(e) => return Err(e.into()),
    };

    Ok(User {
      id,
      username: user.username,
      password_hash: user.password_hash,
      created_at,
    })
  }
}

// ─── MedicineStore impl ──────────────────────────────────────────────────────

impl MedicineStore for SqliteStore {
  type Error = Error;

  async fn create(&self, input: MedicineInput) -> Result<Medicine> {
    let now    = Utc::now();
    let at_str = encode_dt(now);
    let row    = input.clone();

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO medicines (name, description, price, quantity, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![row.name, row.description, row.price, row.quantity, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Medicine {
      id,
      name: input.name,
      description: input.description,
      price: input.price,
      quantity: input.quantity,
      created_at: now,
      updated_at: now,
    })
  }

  async fn get(&self, id: i64) -> Result<Option<Medicine>> {
    let raw: Option<RawMedicine> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM medicines WHERE id = ?1 AND deleted_at IS NULL",
          RawMedicine::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id], RawMedicine::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMedicine::into_medicine).transpose()
  }

  async fn list(&self) -> Result<Vec<Medicine>> {
    let raws: Vec<RawMedicine> = self
      .conn
      .call(|conn| {
        let sql = format!(
          "SELECT {} FROM medicines WHERE deleted_at IS NULL ORDER BY id",
          RawMedicine::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawMedicine::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMedicine::into_medicine).collect()
  }

  async fn update(&self, id: i64, input: MedicineInput) -> Result<Option<Medicine>> {
    let at_str = encode_dt(Utc::now());

    let raw: Option<RawMedicine> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE medicines
             SET name = ?1, description = ?2, price = ?3, quantity = ?4, updated_at = ?5
           WHERE id = ?6 AND deleted_at IS NULL",
          rusqlite::params![
            input.name,
            input.description,
            input.price,
            input.quantity,
            at_str,
            id,
          ],
        )?;
        if changed == 0 {
          return Ok(None);
        }

        let sql = format!("SELECT {} FROM medicines WHERE id = ?1", RawMedicine::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id], RawMedicine::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMedicine::into_medicine).transpose()
  }

  async fn delete(&self, id: i64) -> Result<bool> {
    let at_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE medicines SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
          rusqlite::params![at_str, id],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }
}
