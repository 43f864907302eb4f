use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quill_backend::{
    logging, routes, AppState, ClerkClient, Config, JwksClient, UserStore, WebhookVerifier,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Quill backend");

    // Initialize components. An unusable signing secret or database must
    // abort here, before the listener binds.
    let verifier = WebhookVerifier::new(&config.webhook.signing_secret)?;
    let users = UserStore::new(&config.database.url)?;
    let clerk = ClerkClient::new(&config.clerk.api_base, &config.clerk.secret_key);
    let jwks_client = JwksClient::new(&config.clerk.issuer).await?;

    let state = Arc::new(AppState {
        config: config.clone(),
        jwks_client,
        clerk,
        users,
        verifier,
    });

    // Build CORS layer
    let cors = if config.cors.origins.trim() == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors
            .origins
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Build router
    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::webhooks::router(state.clone()))
        .nest("/admin", routes::admin::router(state.clone()))
        .layer(middleware::from_fn(logging::request_logger))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
