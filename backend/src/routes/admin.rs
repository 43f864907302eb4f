//! Admin API routes.
//!
//! JSON endpoints for the dashboard, gated on a valid provider session
//! whose synced record carries the admin flag:
//! - Users list (`/admin/users`)
//! - Admin flag updates (`/admin/users/:external_id/admin`)

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::models::user::User;
use crate::store::StoreError;
use crate::AppState;

/// Middleware that requires a session belonging to a synced admin user.
///
/// The synced record, not the token, is the authority on `is_admin`; the
/// provider's public metadata only mirrors it.
async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let auth_user = match state.jwks_client.authenticate(request.headers()).await {
        Ok(user) => user,
        Err(e) => {
            tracing::debug!("Rejected admin request: {}", e);
            return (
                StatusCode::UNAUTHORIZED,
                "Please provide a valid session token",
            )
                .into_response();
        }
    };

    let record = match state.users.find_by_external_id(&auth_user.sub) {
        Ok(record) => record,
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    match record {
        Some(user) if user.is_admin => next.run(request).await,
        _ => (StatusCode::FORBIDDEN, "Admin access required").into_response(),
    }
}

/// Response for /admin/users.
#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
    pub total: usize,
}

/// GET /admin/users - list synced users.
async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UsersResponse>, (StatusCode, String)> {
    let users = state
        .users
        .list_users()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let total = users.len();
    Ok(Json(UsersResponse { users, total }))
}

#[derive(Debug, Deserialize)]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

/// PUT /admin/users/:external_id/admin - set the admin flag.
async fn set_admin(
    State(state): State<Arc<AppState>>,
    Path(external_id): Path<String>,
    Json(request): Json<SetAdminRequest>,
) -> Result<Json<User>, (StatusCode, String)> {
    let user = match state.users.set_admin(&external_id, request.is_admin) {
        Ok(user) => user,
        Err(StoreError::NotFound(id)) => {
            return Err((StatusCode::NOT_FOUND, format!("No user with external id: {}", id)));
        }
        Err(e) => return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    };

    // Best-effort: the provider's public metadata mirrors this flag.
    if let Err(e) = state
        .clerk
        .set_user_metadata(&user.external_id, &user.id, user.is_admin)
        .await
    {
        tracing::warn!("Error updating user metadata for {}: {}", user.external_id, e);
    }

    Ok(Json(user))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:external_id/admin", put(set_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .with_state(state)
}
