mod common;

use common::{json, text, Backend};
use edu_admin::api_client::ApiClient;
use edu_admin::api_error::ApiErrorType;
use edu_admin::config::ClientConfig;
use edu_admin::token_store::{MemoryTokenStore, TokenStore};
use hyper::StatusCode;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn login_sends_form_fields_and_stores_token() {
    let backend = Backend::start(|_| {
        json(
            StatusCode::OK,
            json!({ "access_token": "eyJhbGciOi.payload.sig", "token_type": "bearer" }),
        )
    })
    .await;
    let store = Arc::new(MemoryTokenStore::new());
    let api = backend.client(store.clone());

    let reply = api.login("user@x.com", "pw").await.unwrap();
    assert_eq!(reply.body["token_type"], "bearer");

    let sent = backend.last();
    assert_eq!(sent.method, "POST");
    assert_eq!(sent.uri, "/token");
    let content_type = sent.header("content-type").unwrap();
    assert!(content_type.starts_with("multipart/form-data"), "{content_type}");
    assert_eq!(sent.header("authorization"), None);
    let body = sent.body_text();
    assert!(body.contains("name=\"username\"\r\n\r\nuser@x.com\r\n"), "{body}");
    assert!(body.contains("name=\"password\"\r\n\r\npw\r\n"), "{body}");
    assert!(serde_json::from_slice::<serde_json::Value>(&sent.body).is_err());

    assert_eq!(api.token().as_deref(), Some("eyJhbGciOi.payload.sig"));
    assert_eq!(
        store.get("access_token").unwrap().as_deref(),
        Some("eyJhbGciOi.payload.sig")
    );
}

#[tokio::test]
async fn token_is_used_after_login() {
    let backend = Backend::start(|req| {
        if req.uri == "/token" {
            json(StatusCode::OK, json!({ "access_token": "fresh", "token_type": "bearer" }))
        } else {
            json(StatusCode::OK, json!({ "id": "u1", "email": "user@x.com", "role": "admin" }))
        }
    })
    .await;
    let api = backend.client(Arc::new(MemoryTokenStore::new()));

    api.login("user@x.com", "pw").await.unwrap();
    let me = api.get_current_user().await.unwrap();
    assert_eq!(me.json().unwrap()["email"], "user@x.com");

    let sent = backend.last();
    assert_eq!(sent.uri, "/users/me");
    assert_eq!(sent.header("authorization").as_deref(), Some("Bearer fresh"));
}

#[tokio::test]
async fn refused_login_is_a_login_error() {
    let backend = Backend::start(|_| {
        json(
            StatusCode::UNAUTHORIZED,
            json!({ "detail": "Incorrect email or password" }),
        )
    })
    .await;
    let expired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&expired);
    let store = Arc::new(MemoryTokenStore::with_token("access_token", "previous"));
    let api = backend.client(store.clone()).on_session_expired(move || {
        flag.store(true, Ordering::SeqCst);
    });

    let err = api.login("user@x.com", "wrong").await.unwrap_err();
    match err.error_type {
        ApiErrorType::Login(msg) => assert_eq!(msg, "Incorrect email or password"),
        other => panic!("Expected Login, got {other:?}"),
    }
    // The token endpoint is not part of the expiry cascade
    assert!(!expired.load(Ordering::SeqCst));
    assert_eq!(
        store.get("access_token").unwrap().as_deref(),
        Some("previous")
    );
}

#[tokio::test]
async fn refused_login_without_detail_uses_wording() {
    let backend = Backend::start(|_| text(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "boom")).await;
    let api = backend.client(Arc::new(MemoryTokenStore::new()));

    let err = api.login("user@x.com", "pw").await.unwrap_err();
    match err.error_type {
        ApiErrorType::Login(msg) => assert_eq!(msg, "Login failed"),
        other => panic!("Expected Login, got {other:?}"),
    }
    assert!(!api.is_authenticated());
}

#[tokio::test]
async fn login_without_access_token_is_bad_json() {
    let backend = Backend::start(|_| json(StatusCode::OK, json!({ "token_type": "bearer" }))).await;
    let api = backend.client(Arc::new(MemoryTokenStore::new()));

    let err = api.login("user@x.com", "pw").await.unwrap_err();
    assert!(matches!(err.error_type, ApiErrorType::BadJson(_)));
    assert!(!api.is_authenticated());
}

#[tokio::test]
async fn logout_forgets_token() {
    let backend = Backend::start(|_| json(StatusCode::OK, json!({ "access_token": "t", "token_type": "bearer" }))).await;
    let store = Arc::new(MemoryTokenStore::new());
    let api = backend.client(store.clone());

    api.login("user@x.com", "pw").await.unwrap();
    api.logout().unwrap();
    assert!(!api.is_authenticated());
    assert_eq!(store.get("access_token").unwrap(), None);

    let err = api.get_current_user().await.unwrap_err();
    assert!(matches!(err.error_type, ApiErrorType::NoToken(_)));
    // Only the login reached the backend
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn login_that_cannot_persist_is_not_taken_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let backend = Backend::start(|_| json(StatusCode::OK, json!({ "access_token": "fresh", "token_type": "bearer" }))).await;
    let mut config = ClientConfig::new(backend.url().as_str());
    config.token_file = Some(path.clone());
    let api = ApiClient::with_file_store(&config).unwrap();

    std::fs::write(&path, "garbage").unwrap();
    let err = api.login("user@x.com", "pw").await.unwrap_err();
    assert!(matches!(err.error_type, ApiErrorType::Storage(_)), "{err}");
    assert_eq!(api.token(), None);
    assert!(!api.is_authenticated());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "garbage");
}
