//! Router helpers shared by the handler tests.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use crate::auth::create_token;
use crate::config::Config;
use crate::store::DocumentStore;
use crate::{build_app, AppState};

pub const TEST_USER: &str = "tester";

pub fn token_for(uid: &str) -> String {
    create_token(uid, "Tester", &Config::default().jwt_secret, 3600).unwrap()
}

/// App over an empty document store plus a token for [`TEST_USER`].
pub fn test_app() -> (Router, String) {
    let state = AppState::new(Arc::new(DocumentStore::new()), Config::default());
    (build_app(state), token_for(TEST_USER))
}

async fn dispatch(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();
    dispatch(app, request).await
}

pub async fn send_bytes(app: &Router, uri: &str, token: Option<&str>, bytes: Vec<u8>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/octet-stream");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    dispatch(app, builder.body(Body::from(bytes)).unwrap()).await
}
