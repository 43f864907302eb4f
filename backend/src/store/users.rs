use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::user::{User, UserUpsert};

/// SQLite-backed user store.
///
/// Holds exclusive write access to user records. The upsert is a single
/// `ON CONFLICT` statement on the `external_id` unique index, so two
/// concurrent deliveries for the same subject cannot create duplicates.
pub struct UserStore {
    conn: Mutex<Connection>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("No user with external id: {0}")]
    NotFound(String),
}

const USER_COLUMNS: &str = "id, external_id, email, first_name, last_name, username, \
                            profile_picture, is_admin, created_at, updated_at";

impl UserStore {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        // Parse sqlite: prefix if present
        let path = if database_url.starts_with("sqlite:") {
            &database_url[7..]
        } else {
            database_url
        };

        // Create parent directories if needed
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }

        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL DEFAULT '',
                username TEXT UNIQUE,
                profile_picture TEXT NOT NULL DEFAULT '',
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!("User store initialized with database: {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create or update the record for a subject. Every mutable field is
    /// overwritten from the payload; `id`, `is_admin` and `created_at`
    /// survive updates. Returns the stored record.
    pub fn upsert_user(&self, input: &UserUpsert) -> Result<User, StoreError> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        conn.query_row(
            &format!(
                "INSERT INTO users ({USER_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)
                 ON CONFLICT(external_id) DO UPDATE SET
                     email = excluded.email,
                     first_name = excluded.first_name,
                     last_name = excluded.last_name,
                     username = excluded.username,
                     profile_picture = excluded.profile_picture,
                     updated_at = excluded.updated_at
                 RETURNING {USER_COLUMNS}"
            ),
            params![
                Uuid::new_v4().to_string(),
                input.external_id,
                input.email,
                input.first_name,
                input.last_name,
                input.username,
                input.profile_picture,
                now,
            ],
            row_to_user,
        )
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Delete the record for a subject. Deleting a subject that was never
    /// synced is not an error; returns whether a record existed.
    pub fn delete_user(&self, external_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;

        let deleted = conn
            .execute("DELETE FROM users WHERE external_id = ?1", params![external_id])
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(deleted > 0)
    }

    pub fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;

        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE external_id = ?1"),
            params![external_id],
            row_to_user,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    pub fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, external_id ASC"
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let users = stmt
            .query_map([], row_to_user)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(users)
    }

    /// Set the admin flag. This is the only write path for `is_admin`.
    pub fn set_admin(&self, external_id: &str, is_admin: bool) -> Result<User, StoreError> {
        let conn = self.lock()?;

        conn.query_row(
            &format!(
                "UPDATE users SET is_admin = ?1, updated_at = ?2 WHERE external_id = ?3
                 RETURNING {USER_COLUMNS}"
            ),
            params![is_admin, Utc::now().to_rfc3339(), external_id],
            row_to_user,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))?
        .ok_or_else(|| StoreError::NotFound(external_id.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) {
        self.conn.lock().unwrap().execute_batch(sql).unwrap();
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(User {
        id: row.get(0)?,
        external_id: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        username: row.get(5)?,
        profile_picture: row.get(6)?,
        is_admin: row.get::<_, i64>(7)? != 0,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
