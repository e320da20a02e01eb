//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use bite_core::draft::DEFAULT_MAX_STEP_IMAGES;
use bite_core::upload::{DEFAULT_BUCKET, DEFAULT_CONCURRENCY, DEFAULT_FOLDER};
use bite_core::{CompressOptions, ImageFormat, UploadOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub cors_origin: String,
    pub storage_path: PathBuf,
    pub public_base_url: String,
    pub storage_bucket: String,
    pub storage_folder: String,
    pub upload_concurrency: usize,
    pub image_max_width: u32,
    pub image_max_height: u32,
    pub image_quality: f32,
    pub max_step_images: usize,
    pub session_ttl_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            log_level: Level::INFO,
            cors_origin: "http://localhost:8081".to_string(),
            storage_path: PathBuf::from("./storage"),
            public_base_url: "http://localhost:3000".to_string(),
            storage_bucket: DEFAULT_BUCKET.to_string(),
            storage_folder: DEFAULT_FOLDER.to_string(),
            upload_concurrency: DEFAULT_CONCURRENCY,
            image_max_width: 1280,
            image_max_height: 1024,
            image_quality: 0.85,
            max_step_images: DEFAULT_MAX_STEP_IMAGES,
            session_ttl_days: 30,
        }
    }
}

/// Reads `name` and parses it, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn string_var(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Self::default();

        // --- Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", defaults.bind_address)?;
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;
        let cors_origin = string_var("CORS_ORIGIN", defaults.cors_origin);
        let session_ttl_days = parse_var("SESSION_TTL_DAYS", defaults.session_ttl_days)?;
        if session_ttl_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_DAYS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        // --- Object Storage ---
        let storage_path = std::env::var("STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_path);
        let public_base_url = string_var("PUBLIC_BASE_URL", defaults.public_base_url)
            .trim_end_matches('/')
            .to_string();
        let storage_bucket = string_var("STORAGE_BUCKET", defaults.storage_bucket);
        let storage_folder = string_var("STORAGE_FOLDER", defaults.storage_folder);

        // --- Upload Pipeline ---
        let upload_concurrency = parse_var("UPLOAD_CONCURRENCY", defaults.upload_concurrency)?;
        if upload_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "UPLOAD_CONCURRENCY".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let image_max_width = parse_var("IMAGE_MAX_WIDTH", defaults.image_max_width)?;
        let image_max_height = parse_var("IMAGE_MAX_HEIGHT", defaults.image_max_height)?;
        let image_quality = parse_var("IMAGE_QUALITY", defaults.image_quality)?;
        if !(image_quality > 0.0 && image_quality <= 1.0) {
            return Err(ConfigError::InvalidValue(
                "IMAGE_QUALITY".to_string(),
                format!("{} is not within (0, 1]", image_quality),
            ));
        }
        let max_step_images = parse_var("MAX_STEP_IMAGES", defaults.max_step_images)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            storage_path,
            public_base_url,
            storage_bucket,
            storage_folder,
            upload_concurrency,
            image_max_width,
            image_max_height,
            image_quality,
            max_step_images,
            session_ttl_days,
        })
    }

    /// The upload pipeline settings derived from this configuration.
    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            bucket: self.storage_bucket.clone(),
            folder: self.storage_folder.clone(),
            compress: CompressOptions {
                max_width: self.image_max_width,
                max_height: self.image_max_height,
                quality: self.image_quality,
                format: ImageFormat::Jpeg,
            },
        }
    }
}
