//! SQLite-backed credential store.
//!
//! Single table:
//! - `users`: id, username, password_hash, name, role, karma
//!
//! The store exclusively owns user records. Everything else in the crate
//! holds transient copies and routes mutations back through here; karma in
//! particular only moves via [`UserStore::adjust_karma`].

use crate::auth::Role;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::Path;

/// A registered user.
///
/// `password_hash` stays out of serialized output; handlers return the rest
/// verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: Option<String>,
    pub role: Role,
    pub karma: f64,
}

/// SQLite-backed user store.
pub struct UserStore {
    conn: Mutex<rusqlite::Connection>,
}

impl UserStore {
    /// Open (or create) the user database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open(db_path)?;
        Self::init(conn)
    }

    /// Open an in-memory store. Test fixture and demo mode.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self> {
        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        // Usernames are case-sensitively unique (BINARY collation, the
        // SQLite default): 'Alice' and 'alice' are distinct accounts.
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                name TEXT,
                role INTEGER NOT NULL DEFAULT 2,
                karma REAL NOT NULL DEFAULT 0
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new user. Fails with [`Error::DuplicateUsername`] if the
    /// username is already taken.
    pub fn create(
        &self,
        username: &str,
        password_hash: &str,
        name: Option<&str>,
        role: Role,
    ) -> Result<User> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (username, password_hash, name, role, karma)
             VALUES (?1, ?2, ?3, ?4, 0)",
            rusqlite::params![username, password_hash, name, u8::from(role)],
        );

        match result {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                Ok(User {
                    id,
                    username: username.to_string(),
                    password_hash: password_hash.to_string(),
                    name: name.map(str::to_string),
                    role,
                    karma: 0.0,
                })
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::DuplicateUsername(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a user by username.
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        Self::query_user(&conn, "username = ?1", rusqlite::params![username])
    }

    /// Look up a user by id.
    pub fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock();
        Self::query_user(&conn, "id = ?1", rusqlite::params![id])
    }

    /// Apply a karma delta and return the updated record.
    ///
    /// The relative `SET karma = karma + ?` runs as one statement under the
    /// connection lock, so concurrent adjustments for the same user all
    /// land — no read-modify-write to lose. Fails with
    /// [`Error::UserVanished`] if the username no longer resolves.
    pub fn adjust_karma(&self, username: &str, delta: f64) -> Result<User> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE users SET karma = karma + ?1 WHERE username = ?2",
            rusqlite::params![delta, username],
        )?;
        if updated == 0 {
            return Err(Error::UserVanished(username.to_string()));
        }
        Self::query_user(&conn, "username = ?1", rusqlite::params![username])?
            .ok_or_else(|| Error::UserVanished(username.to_string()))
    }

    /// Count registered users.
    pub fn user_count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn query_user(
        conn: &rusqlite::Connection,
        predicate: &str,
        params: impl rusqlite::Params,
    ) -> Result<Option<User>> {
        let sql = format!(
            "SELECT id, username, password_hash, name, role, karma
             FROM users WHERE {predicate}"
        );
        let row = conn.query_row(&sql, params, |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, u8>(4)?,
                row.get::<_, f64>(5)?,
            ))
        });

        match row {
            Ok((id, username, password_hash, name, role, karma)) => {
                let role = Role::try_from(role).map_err(Error::Invalid)?;
                Ok(Some(User {
                    id,
                    username,
                    password_hash,
                    name,
                    role,
                    karma,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
