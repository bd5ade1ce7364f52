use std::fmt;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub mod middleware;
pub mod session;

#[derive(Debug)]
pub enum AuthError {
    JWT(jsonwebtoken::errors::Error),
    MissingToken,
    InvalidToken,
    TokenExpired,
    InvalidSignature,
    WrongUser,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JWT(e) => write!(f, "JWT error: {}", e),
            Self::MissingToken => write!(f, "Missing token"),
            Self::InvalidToken => write!(f, "Invalid token"),
            Self::TokenExpired => write!(f, "Token expired"),
            Self::InvalidSignature => write!(f, "Invalid signature"),
            Self::WrongUser => write!(f, "Token belongs to another user"),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::JWT(e) => Some(e),
            _ => None,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::JWT(err)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            Self::JWT(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Token creation failed"),
            Self::MissingToken => (StatusCode::UNAUTHORIZED, "Missing token"),
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            Self::TokenExpired => (StatusCode::UNAUTHORIZED, "Token has expired"),
            Self::InvalidSignature => (StatusCode::UNAUTHORIZED, "Invalid signature"),
            Self::WrongUser => (StatusCode::FORBIDDEN, "Token belongs to another user"),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub name: String,
}

pub fn create_token(user_id: &str, name: &str, secret: &str, duration_secs: i64) -> Result<String, AuthError> {
    let exp = chrono::Utc::now().timestamp() + duration_secs;
    let token = encode(
        &Header::default(),
        &Claims {
            sub: user_id.to_string(),
            exp: exp.max(0) as usize,
            name: name.to_string(),
        },
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Returns the user id carried in `sub`.
pub fn validate_jwt(token: &str, secret: &str) -> Result<String, AuthError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            _ => AuthError::InvalidToken,
        })?;

    crate::store::check_key(&token_data.claims.sub).map_err(|_| AuthError::InvalidToken)?;
    Ok(token_data.claims.sub)
}
