use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use shared::meal_record::{AuthProvider, User};
use shared::validation::validate_label;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::middleware::bearer_token;
use super::{create_token, validate_jwt, AuthError};
use crate::error::AppError;
use crate::AppState;

/// Profile handed over by the external identity provider.
#[derive(Debug, Deserialize, Validate)]
pub struct SessionRequest {
    /// Reuse an existing id so a returning user sees their data. Only honored
    /// together with a still valid token for the same id.
    pub user_id: Option<String>,
    #[validate(custom = "validate_label")]
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub provider: Option<AuthProvider>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/session", post(create_session))
}

/// A fresh id unless the caller proves ownership of the requested one.
fn session_user_id(
    requested: Option<String>,
    headers: &HeaderMap,
    secret: &str,
) -> Result<String, AppError> {
    let Some(id) = requested else {
        return Ok(Uuid::new_v4().to_string());
    };
    crate::store::check_key(&id)?;

    let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
    if validate_jwt(&token, secret)? != id {
        return Err(AuthError::WrongUser.into());
    }
    Ok(id)
}

async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    request.validate()?;

    let id = session_user_id(request.user_id, &headers, &state.config.jwt_secret)?;
    let user = User {
        id,
        name: request.name.trim().to_string(),
        avatar: request.avatar.unwrap_or_default(),
        email: request.email,
        provider: request.provider,
    };

    let token = create_token(
        &user.id,
        &user.name,
        &state.config.jwt_secret,
        state.config.access_token_duration,
    )?;
    info!("🔑 Session issued for {} ({})", user.name, user.id);

    Ok(Json(SessionResponse { token, user }))
}

#[cfg(test)]
mod tests {
    use crate::testing::{send, test_app, token_for, TEST_USER};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_existing_user_needs_own_token() {
        let (app, token) = test_app();
        let record = json!({
            "date": "2024-05-01",
            "category": "dinner",
            "shop_name": "Secret Place",
            "meal_name": "Omakase",
            "price": 900,
        });
        let (status, _) = send(&app, "POST", "/api/records", Some(&token), Some(record)).await;
        assert_eq!(status, StatusCode::CREATED);

        let takeover = json!({ "name": "Mallory", "user_id": TEST_USER });
        let (status, body) = send(&app, "POST", "/api/auth/session", None, Some(takeover.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.get("token").is_none());

        let other = token_for("mallory");
        let (status, _) = send(&app, "POST", "/api/auth/session", Some(&other), Some(takeover)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let renew = json!({ "name": "Tester", "user_id": TEST_USER });
        let (status, body) = send(&app, "POST", "/api/auth/session", Some(&token), Some(renew)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], TEST_USER);
    }

    #[tokio::test]
    async fn test_anonymous_session_gets_fresh_id() {
        let (app, _) = test_app();
        let (_, first) = send(&app, "POST", "/api/auth/session", None, Some(json!({ "name": "Mei" }))).await;
        let (_, second) = send(&app, "POST", "/api/auth/session", None, Some(json!({ "name": "Mei" }))).await;
        assert_ne!(first["user"]["id"], second["user"]["id"]);

        let token = first["token"].as_str().unwrap();
        let (status, records) = send(&app, "GET", "/api/records", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(records, json!([]));
    }
}
