pub mod auth;
pub mod config;
pub mod identity;
pub mod logging;
pub mod models;
pub mod routes;
pub mod store;
pub mod webhook;

pub use auth::{AuthError, AuthUser, JwksClient};
pub use config::{Config, ConfigError};
pub use identity::{ClerkClient, PropagationError};
pub use models::user::{User, UserUpsert};
pub use store::{StoreError, UserStore};
pub use webhook::{SignatureError, WebhookVerifier};

/// Shared application state.
///
/// Owned by the composition root and injected into every router; nothing
/// in the crate reads process-global handles.
pub struct AppState {
    pub config: Config,
    pub jwks_client: JwksClient,
    pub clerk: ClerkClient,
    pub users: UserStore,
    pub verifier: WebhookVerifier,
}
