//! Environment-driven configuration, loaded once at startup via `dotenvy`.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    /// Directory archives are written to by the upload endpoint.
    pub uploads_dir: PathBuf,
    /// Hard ceiling on an uploaded archive's size, bytes.
    pub max_upload_bytes: u64,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let host = env_or("ABS_IMPORT_HOST", "0.0.0.0");
        let port = env_or("ABS_IMPORT_PORT", "8089")
            .parse::<u16>()
            .context("ABS_IMPORT_PORT must be a valid port number")?;
        let uploads_dir = PathBuf::from(env_or("ABS_IMPORT_UPLOADS_DIR", "./uploads"));
        let max_upload_bytes = env_or("ABS_IMPORT_MAX_UPLOAD_BYTES", &(1u64 << 30).to_string())
            .parse::<u64>()
            .context("ABS_IMPORT_MAX_UPLOAD_BYTES must be an integer")?;
        let dev_mode = parse_bool(&env_or("ABS_IMPORT_DEV_MODE", "false"));

        Ok(Self {
            server: ServerConfig { host, port },
            uploads_dir,
            max_upload_bytes,
            dev_mode,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
