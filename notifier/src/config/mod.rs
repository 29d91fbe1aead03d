//! Configuration: `.env` loading, environment lookup and validation.

pub mod app_config;
pub mod validation;

pub use app_config::{AccountCredentials, AppConfig};

/// Load .env from multiple candidate paths.
pub fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}
