use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Extension, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::middleware::UserId;
use crate::error::AppError;
use crate::imaging::{compress_bytes, CompressError};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CompressResponse {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
    pub quality: f32,
    pub bytes: usize,
    pub attempts: u32,
}

pub fn create_router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/compress", post(compress_upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// Raw image bytes in, a JPEG data URL that fits a record document out.
async fn compress_upload(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    body: Bytes,
) -> Result<Json<CompressResponse>, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("Empty image upload".to_string()));
    }

    let upload_bytes = body.len();
    let codec = state.codec.clone();
    let config = state.config.compress;
    let result = tokio::task::spawn_blocking(move || compress_bytes(codec.as_ref(), &body, &config))
        .await
        .map_err(|e| AppError::Internal(format!("Compression task failed: {}", e)))?;

    let image = match result {
        Ok(image) => image,
        Err(e @ CompressError::TooLarge { .. }) => {
            warn!("Upload from {} could not be compressed enough: {}", user_id.0, e);
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        "🖼️ Compressed {} bytes to {} bytes ({}x{}, q={:.2}, {} attempts)",
        upload_bytes,
        image.byte_len(),
        image.width,
        image.height,
        image.quality,
        image.attempts
    );

    Ok(Json(CompressResponse {
        data_url: image.to_data_url(),
        width: image.width,
        height: image.height,
        quality: image.quality,
        bytes: image.byte_len(),
        attempts: image.attempts,
    }))
}
