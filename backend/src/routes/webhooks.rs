//! Webhook receiver for identity-provider user events.
//!
//! Each delivery runs one sequential pass: verify signature, normalize
//! the event, sync the user record, write metadata back to the provider
//! (create events only), respond. Upsert failures surface as 500 so the
//! provider redelivers; delete and metadata failures are logged and the
//! delivery is acknowledged anyway.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};

use crate::webhook::event::{normalize, UserEvent};
use crate::AppState;

/// POST /api/webhooks - receive a signed user-lifecycle event.
async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let (svix_id, svix_timestamp, svix_signature) = match svix_headers(&headers) {
        Some(values) => values,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                "Error occurred -- missing svix headers",
            )
        }
    };

    let event = match state
        .verifier
        .verify(&body, svix_id, svix_timestamp, svix_signature)
    {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Error verifying webhook: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid signature");
        }
    };

    tracing::info!(id = %svix_id, kind = %event.kind, "Received webhook");

    let action = match normalize(event) {
        Ok(action) => action,
        Err(e) => {
            tracing::warn!("Invalid webhook payload: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid event payload");
        }
    };

    match action {
        UserEvent::Created(payload) => {
            let user = match state.users.upsert_user(&payload) {
                Ok(user) => user,
                Err(e) => {
                    tracing::error!("Error syncing created user {}: {}", payload.external_id, e);
                    return (StatusCode::INTERNAL_SERVER_ERROR, "Error occurred");
                }
            };

            tracing::info!("User created with ID: {}", user.external_id);

            // The record is durable at this point; a failed write-back only
            // leaves the provider's copy stale.
            if let Err(e) = state
                .clerk
                .set_user_metadata(&user.external_id, &user.id, user.is_admin)
                .await
            {
                tracing::warn!("Error updating user metadata for {}: {}", user.external_id, e);
            }
        }
        UserEvent::Updated(payload) => {
            if let Err(e) = state.users.upsert_user(&payload) {
                tracing::error!("Error syncing updated user {}: {}", payload.external_id, e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Error occurred");
            }
        }
        UserEvent::Deleted { external_id } => match state.users.delete_user(&external_id) {
            Ok(true) => tracing::info!("User deleted with ID: {}", external_id),
            Ok(false) => tracing::info!("Delete for unknown user {}", external_id),
            Err(e) => tracing::error!("Error deleting user {}: {}", external_id, e),
        },
        UserEvent::Ignored { kind } => {
            tracing::debug!("Ignoring unhandled webhook event {}", kind);
        }
    }

    (StatusCode::OK, "Webhook received")
}

fn svix_headers(headers: &HeaderMap) -> Option<(&str, &str, &str)> {
    let id = headers.get("svix-id")?.to_str().ok()?;
    let timestamp = headers.get("svix-timestamp")?.to_str().ok()?;
    let signature = headers.get("svix-signature")?.to_str().ok()?;

    if id.is_empty() || timestamp.is_empty() || signature.is_empty() {
        return None;
    }

    Some((id, timestamp, signature))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/webhooks", post(receive_webhook))
        .with_state(state)
}
