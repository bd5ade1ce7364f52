use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::imaging::CompressConfig;

const DEV_JWT_SECRET: &str = "default_mealwheel_secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Per-user documents held by the service
    Document,
    /// Fallback that keeps each user's data in a JSON file on disk
    Local,
}

impl FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "local" => Ok(Self::Local),
            _ => Err(()),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { key, value } => write!(f, "Invalid value for {}: {:?}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub store_backend: StoreBackend,
    pub data_dir: PathBuf,
    pub local_store_quota_bytes: usize,
    pub jwt_secret: String,
    pub access_token_duration: i64,
    pub compress: CompressConfig,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            store_backend: StoreBackend::Document,
            data_dir: PathBuf::from("data"),
            local_store_quota_bytes: 5 * 1024 * 1024,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_token_duration: 86400,
            compress: CompressConfig::default(),
            max_upload_bytes: 20 * 1024 * 1024,
            cors_origins: vec![
                "http://127.0.0.1:8080".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        _ => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let compress_defaults = defaults.compress;

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("JWT_SECRET is not set, using the development secret");
                defaults.jwt_secret
            }
        };

        let compress = CompressConfig {
            max_width: parse_or(&lookup, "IMAGE_MAX_WIDTH", compress_defaults.max_width)?,
            max_height: parse_or(&lookup, "IMAGE_MAX_HEIGHT", compress_defaults.max_height)?,
            quality: parse_or(&lookup, "IMAGE_QUALITY", compress_defaults.quality)?,
            target_bytes: parse_or(&lookup, "IMAGE_TARGET_BYTES", compress_defaults.target_bytes)?,
            max_iterations: parse_or(&lookup, "IMAGE_MAX_ITERATIONS", compress_defaults.max_iterations)?,
        };
        if !(compress.quality > 0.0 && compress.quality <= 1.0) {
            return Err(ConfigError::Invalid {
                key: "IMAGE_QUALITY",
                value: compress.quality.to_string(),
            });
        }

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.cors_origins,
        };

        Ok(Self {
            bind_addr: parse_or(&lookup, "BIND_ADDR", defaults.bind_addr)?,
            store_backend: parse_or(&lookup, "STORE_BACKEND", defaults.store_backend)?,
            data_dir: lookup("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            local_store_quota_bytes: parse_or(
                &lookup,
                "LOCAL_STORE_QUOTA_BYTES",
                defaults.local_store_quota_bytes,
            )?,
            jwt_secret,
            access_token_duration: parse_or(
                &lookup,
                "ACCESS_TOKEN_DURATION",
                defaults.access_token_duration,
            )?,
            compress,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            cors_origins,
        })
    }
}
