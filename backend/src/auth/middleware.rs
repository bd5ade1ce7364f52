use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{validate_jwt, AuthError};
use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Bearer header first; browsers cannot set headers on a WebSocket
/// handshake, so a `token` query parameter is accepted as well.
fn request_token(request: &Request<Body>) -> Option<String> {
    bearer_token(request.headers()).or_else(|| {
        request.uri().query().and_then(|query| {
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == "token")
                .map(|(_, value)| value.to_string())
        })
    })
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = request_token(&request) else {
        return AuthError::MissingToken.into_response();
    };

    match validate_jwt(&token, &state.config.jwt_secret) {
        Ok(user_id) => {
            request.extensions_mut().insert(UserId(user_id));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
