use std::sync::Arc;

use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::middleware::require_auth;
use crate::config::{Config, StoreBackend};
use crate::imaging::{ImageCodec, JpegCodec};
use crate::services::wheel_service::WheelSessions;
use crate::services::{image_service, record_service, wheel_service};
use crate::store::{DocumentStore, LocalFileStore, RecordStore};

mod auth;
mod config;
mod error;
mod handlers;
mod imaging;
mod logging;
mod services;
mod store;
#[cfg(test)]
mod testing;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub wheels: WheelSessions,
    pub codec: Arc<dyn ImageCodec>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, config: Config) -> Self {
        Self {
            store,
            wheels: WheelSessions::new(),
            codec: Arc::new(JpegCodec),
            config: Arc::new(config),
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(vec![
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
        ])
        .allow_credentials(true)
}

pub fn build_app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .nest("/records", record_service::create_router())
        .route("/stats", get(record_service::stats))
        .nest("/wheel", wheel_service::create_router())
        .nest("/images", image_service::create_router(state.config.max_upload_bytes))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api_routes = Router::new()
        .route("/health_check", get(handlers::health_check))
        .nest("/auth", auth::session::create_router())
        .merge(protected_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .with_state(state)
}

async fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>, store::StoreError> {
    Ok(match config.store_backend {
        StoreBackend::Document => {
            info!("Using the document store");
            Arc::new(DocumentStore::new())
        }
        StoreBackend::Local => {
            info!("Using the local file store at {:?}", config.data_dir);
            Arc::new(LocalFileStore::open(&config.data_dir, config.local_store_quota_bytes).await?)
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    logging::setup();

    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;
    let store = open_store(&config).await?;
    let addr = config.bind_addr;

    let app = build_app(AppState::new(store, config));

    info!("listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{send, test_app, token_for};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_health_check_is_public() {
        let (app, _) = test_app();
        let response = tower::ServiceExt::oneshot(
            app,
            axum::http::Request::builder()
                .uri("/api/health_check")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_session_issues_working_token() {
        let (app, _) = test_app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/session",
            None,
            Some(json!({ "name": "Mei", "provider": "line" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["provider"], "line");

        let token = body["token"].as_str().unwrap();
        let (status, _) = send(&app, "GET", "/api/records", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_session_validation() {
        let (app, _) = test_app();
        let (status, _) = send(&app, "POST", "/api/auth/session", None, Some(json!({ "name": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/api/auth/session",
            None,
            Some(json!({ "name": "Mei", "user_id": "../../etc" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "POST", "/api/auth/session", None, Some(json!({ "name": "Mei" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body["user"]["id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_store_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            store_backend: StoreBackend::Local,
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let store = open_store(&config).await.unwrap();
        let app = build_app(AppState::new(store, config));

        let token = token_for("local-user");
        let (status, _) = send(
            &app,
            "POST",
            "/api/records",
            Some(&token),
            Some(json!({
                "date": "2024-05-01",
                "category": "snacks",
                "shop_name": "Bubble Tea",
                "meal_name": "Oolong latte",
                "price": 65,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(dir.path().join("local-user.json").exists());
    }
}
