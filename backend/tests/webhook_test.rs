use std::sync::Arc;

use axum::Router;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use chrono::Utc;
use hmac::{Hmac, Mac};
use http::StatusCode;
use serde_json::json;
use sha2::Sha256;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quill_backend::config::{
    ClerkConfig, Config, CorsConfig, DatabaseConfig, LoggingConfig, WebhookConfig,
};
use quill_backend::{routes, AppState, ClerkClient, JwksClient, UserStore, WebhookVerifier};

const SIGNING_KEY: &[u8] = b"integration-test-signing-key";

fn signing_secret() -> String {
    format!("whsec_{}", BASE64.encode(SIGNING_KEY))
}

/// Build a state wired against a mock identity provider that serves the
/// OIDC discovery document, an empty JWKS, and the metadata API.
async fn create_test_state(provider: &MockServer) -> Arc<AppState> {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jwks_uri": format!("{}/.well-known/jwks.json", provider.uri()),
        })))
        .mount(provider)
        .await;

    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [] })))
        .mount(provider)
        .await;

    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 8080,
        database: DatabaseConfig {
            url: ":memory:".to_string(),
        },
        clerk: ClerkConfig {
            api_base: provider.uri(),
            secret_key: "sk_test".to_string(),
            issuer: provider.uri(),
        },
        webhook: WebhookConfig {
            signing_secret: signing_secret(),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        cors: CorsConfig {
            origins: "*".to_string(),
        },
    };

    let verifier = WebhookVerifier::new(&config.webhook.signing_secret).unwrap();
    let users = UserStore::new(&config.database.url).unwrap();
    let clerk = ClerkClient::new(&config.clerk.api_base, &config.clerk.secret_key);
    let jwks_client = JwksClient::new(&config.clerk.issuer).await.unwrap();

    Arc::new(AppState {
        config,
        jwks_client,
        clerk,
        users,
        verifier,
    })
}

fn sign(id: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(SIGNING_KEY).unwrap();
    mac.update(id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    format!("v1,{}", BASE64.encode(mac.finalize().into_bytes()))
}

async fn deliver_signed(app: &Router, event: &serde_json::Value) -> StatusCode {
    let body = serde_json::to_vec(event).unwrap();
    let timestamp = Utc::now().timestamp().to_string();
    let signature = sign("msg_1", &timestamp, &body);

    deliver(
        app,
        &[
            ("svix-id", "msg_1"),
            ("svix-timestamp", &timestamp),
            ("svix-signature", &signature),
        ],
        Bytes::from(body),
    )
    .await
}

async fn deliver(app: &Router, headers: &[(&str, &str)], body: Bytes) -> StatusCode {
    let mut builder = http::Request::builder()
        .method(http::Method::POST)
        .uri("/api/webhooks")
        .header("content-type", "application/json");

    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }

    let request = builder.body(axum::body::Body::from(body)).unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

fn created_event(external_id: &str) -> serde_json::Value {
    json!({
        "type": "user.created",
        "data": {
            "id": external_id,
            "first_name": "Ada",
            "last_name": "Lovelace",
            "image_url": "https://img.example.com/ada.png",
            "email_addresses": [{"email_address": format!("{}@example.com", external_id)}],
            "username": external_id,
        }
    })
}

fn metadata_endpoint(external_id: &str) -> wiremock::MockBuilder {
    Mock::given(method("PATCH")).and(path(format!("/v1/users/{}/metadata", external_id)))
}

#[tokio::test]
async fn test_missing_headers_rejected_before_any_sync() {
    let provider = MockServer::start().await;
    let state = create_test_state(&provider).await;
    let app = routes::webhooks::router(state.clone());

    let body = serde_json::to_vec(&created_event("user_1")).unwrap();
    let status = deliver(&app, &[], Bytes::from(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(state.users.list_users().unwrap().is_empty());
}

#[tokio::test]
async fn test_partial_headers_rejected() {
    let provider = MockServer::start().await;
    let state = create_test_state(&provider).await;
    let app = routes::webhooks::router(state.clone());

    let body = serde_json::to_vec(&created_event("user_1")).unwrap();
    let timestamp = Utc::now().timestamp().to_string();
    let status = deliver(
        &app,
        &[("svix-id", "msg_1"), ("svix-timestamp", &timestamp)],
        Bytes::from(body),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(state.users.list_users().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_signature_rejected_before_any_sync() {
    let provider = MockServer::start().await;
    let state = create_test_state(&provider).await;
    let app = routes::webhooks::router(state.clone());

    let body = serde_json::to_vec(&created_event("user_1")).unwrap();
    let timestamp = Utc::now().timestamp().to_string();
    let status = deliver(
        &app,
        &[
            ("svix-id", "msg_1"),
            ("svix-timestamp", &timestamp),
            ("svix-signature", "v1,AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="),
        ],
        Bytes::from(body),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(state.users.list_users().unwrap().is_empty());
}

#[tokio::test]
async fn test_created_event_syncs_and_propagates_metadata() {
    let provider = MockServer::start().await;
    let state = create_test_state(&provider).await;

    metadata_endpoint("user_1")
        .and(body_partial_json(json!({
            "public_metadata": {"isAdmin": false}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "user_1"})))
        .expect(1)
        .mount(&provider)
        .await;

    let app = routes::webhooks::router(state.clone());
    let status = deliver_signed(&app, &created_event("user_1")).await;

    assert_eq!(status, StatusCode::OK);

    let user = state.users.find_by_external_id("user_1").unwrap().unwrap();
    assert_eq!(user.email, "user_1@example.com");
    assert_eq!(user.first_name, "Ada");
    assert_eq!(user.last_name, "Lovelace");
    assert_eq!(user.username.as_deref(), Some("user_1"));
    assert_eq!(user.profile_picture, "https://img.example.com/ada.png");
    assert!(!user.is_admin);
}

#[tokio::test]
async fn test_update_after_create_keeps_one_record_and_admin_flag() {
    let provider = MockServer::start().await;
    let state = create_test_state(&provider).await;

    // Only the create event may touch the metadata API.
    metadata_endpoint("user_1")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "user_1"})))
        .expect(1)
        .mount(&provider)
        .await;

    let app = routes::webhooks::router(state.clone());
    assert_eq!(deliver_signed(&app, &created_event("user_1")).await, StatusCode::OK);

    let created = state.users.find_by_external_id("user_1").unwrap().unwrap();
    state.users.set_admin("user_1", true).unwrap();

    let mut update = created_event("user_1");
    update["type"] = json!("user.updated");
    update["data"]["first_name"] = json!("Augusta");
    assert_eq!(deliver_signed(&app, &update).await, StatusCode::OK);

    let users = state.users.list_users().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, created.id);
    assert_eq!(users[0].first_name, "Augusta");
    assert!(users[0].is_admin);
}

#[tokio::test]
async fn test_metadata_failure_does_not_fail_delivery() {
    let provider = MockServer::start().await;
    let state = create_test_state(&provider).await;

    Mock::given(method("PATCH"))
        .and(path("/v1/users/user_1/metadata"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&provider)
        .await;

    let app = routes::webhooks::router(state.clone());
    let status = deliver_signed(&app, &created_event("user_1")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(state.users.find_by_external_id("user_1").unwrap().is_some());
}

#[tokio::test]
async fn test_delete_event_removes_record() {
    let provider = MockServer::start().await;
    let state = create_test_state(&provider).await;

    metadata_endpoint("user_1")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "user_1"})))
        .mount(&provider)
        .await;

    let app = routes::webhooks::router(state.clone());
    assert_eq!(deliver_signed(&app, &created_event("user_1")).await, StatusCode::OK);

    let event = json!({"type": "user.deleted", "data": {"id": "user_1"}});
    assert_eq!(deliver_signed(&app, &event).await, StatusCode::OK);

    assert!(state.users.find_by_external_id("user_1").unwrap().is_none());
}

#[tokio::test]
async fn test_delete_of_unknown_user_acknowledged() {
    let provider = MockServer::start().await;
    let state = create_test_state(&provider).await;
    let app = routes::webhooks::router(state.clone());

    let event = json!({"type": "user.deleted", "data": {"id": "user_missing"}});
    assert_eq!(deliver_signed(&app, &event).await, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_event_kind_is_a_no_op() {
    let provider = MockServer::start().await;
    let state = create_test_state(&provider).await;
    let app = routes::webhooks::router(state.clone());

    let event = json!({"type": "session.created", "data": {"id": "sess_1"}});
    assert_eq!(deliver_signed(&app, &event).await, StatusCode::OK);
    assert!(state.users.list_users().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_required_fields_rejected() {
    let provider = MockServer::start().await;
    let state = create_test_state(&provider).await;
    let app = routes::webhooks::router(state.clone());

    let event = json!({"type": "user.created", "data": {"id": "user_1"}});
    assert_eq!(deliver_signed(&app, &event).await, StatusCode::BAD_REQUEST);
    assert!(state.users.list_users().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_routes_require_session_token() {
    let provider = MockServer::start().await;
    let state = create_test_state(&provider).await;
    let app = routes::admin::router(state);

    let request = http::Request::builder()
        .method(http::Method::GET)
        .uri("/users")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_reject_garbage_token() {
    let provider = MockServer::start().await;
    let state = create_test_state(&provider).await;
    let app = routes::admin::router(state);

    let request = http::Request::builder()
        .method(http::Method::GET)
        .uri("/users")
        .header("authorization", "Bearer not-a-jwt")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
