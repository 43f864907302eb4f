use chrono::{DateTime, Utc};
use serde::Serialize;

/// User record mirrored from the identity provider.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Internal record ID, assigned on first insert and stable afterwards.
    pub id: String,
    /// Identity-provider subject ID; immutable join key.
    pub external_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
    pub profile_picture: String,
    /// Server-owned; never taken from webhook payloads.
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by a create/update sync. Every field is written on each
/// sync, defaults included, so a record always mirrors the latest event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpsert {
    pub external_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
    pub profile_picture: String,
}
