//! Runtime configuration, read from the environment.
//!
//! A `.env` file in the working directory is loaded first if present.

use std::path::PathBuf;

use calbridge_core::ConfigError;
use calbridge_core::store::DEFAULT_TOKEN_PATH;
use calbridge_google::DEFAULT_CALENDAR_ID;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// FileBacking location (`GOOGLE_TOKEN_PATH`).
    pub token_path: PathBuf,
    /// Inline bootstrap key material (`GOOGLE_CREDS_JSON`).
    pub creds_json: Option<String>,
    /// Bootstrap key file (`GOOGLE_CLIENT_SECRETS`).
    pub client_secrets_path: Option<PathBuf>,
    pub calendar_id: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // No error if absent
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Config {
            port,
            token_path: get("GOOGLE_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH)),
            creds_json: get("GOOGLE_CREDS_JSON"),
            client_secrets_path: get("GOOGLE_CLIENT_SECRETS").map(PathBuf::from),
            calendar_id: get("GOOGLE_CALENDAR_ID")
                .unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}
