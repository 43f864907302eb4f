use serde::Deserialize;

use crate::models::user::UserUpsert;

/// Verified webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// User object carried by created/updated events.
#[derive(Debug, Deserialize)]
struct UserData {
    #[serde(default)]
    id: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    #[serde(default)]
    email_address: String,
}

/// Identifier carried by deleted events.
#[derive(Debug, Deserialize)]
struct DeletedData {
    #[serde(default)]
    id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    #[error("Malformed event data: {0}")]
    Malformed(String),
}

/// Normalized user-lifecycle event.
#[derive(Debug)]
pub enum UserEvent {
    Created(UserUpsert),
    Updated(UserUpsert),
    Deleted { external_id: String },
    /// Unhandled kinds pass through without touching the database.
    Ignored { kind: String },
}

/// Extract a typed event from a verified envelope.
pub fn normalize(event: WebhookEvent) -> Result<UserEvent, ValidationError> {
    match event.kind.as_str() {
        "user.created" => Ok(UserEvent::Created(upsert_payload(event.data)?)),
        "user.updated" => Ok(UserEvent::Updated(upsert_payload(event.data)?)),
        "user.deleted" => {
            let data: DeletedData = serde_json::from_value(event.data)
                .map_err(|e| ValidationError::Malformed(e.to_string()))?;
            if data.id.is_empty() {
                return Err(ValidationError::MissingField("id"));
            }
            Ok(UserEvent::Deleted { external_id: data.id })
        }
        _ => Ok(UserEvent::Ignored { kind: event.kind }),
    }
}

fn upsert_payload(data: serde_json::Value) -> Result<UserUpsert, ValidationError> {
    let data: UserData =
        serde_json::from_value(data).map_err(|e| ValidationError::Malformed(e.to_string()))?;

    if data.id.is_empty() {
        return Err(ValidationError::MissingField("id"));
    }

    let first_name = data.first_name.unwrap_or_default();
    if first_name.is_empty() {
        return Err(ValidationError::MissingField("first_name"));
    }

    // The provider sends a list; the first entry is the primary address.
    let email = data
        .email_addresses
        .into_iter()
        .next()
        .map(|e| e.email_address)
        .unwrap_or_default();
    if email.is_empty() {
        return Err(ValidationError::MissingField("email_addresses"));
    }
    if !email.contains('@') {
        return Err(ValidationError::InvalidEmail(email));
    }

    Ok(UserUpsert {
        external_id: data.id,
        email,
        first_name,
        last_name: data.last_name.unwrap_or_default(),
        username: data.username.filter(|u| !u.is_empty()),
        profile_picture: data.image_url.unwrap_or_default(),
    })
}
