//! Bootstrap key material: service-account keys and OAuth client secrets,
//! in the JSON formats the Google Cloud console downloads.

use std::fmt;
use std::path::Path;

use calbridge_core::ConfigError;
use calbridge_core::credential::DEFAULT_TOKEN_URI;
use serde::Deserialize;
use serde_json::Value;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// The `installed` / `web` block of a client secrets file.
#[derive(Clone, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum BootstrapKey {
    ServiceAccount(ServiceAccountKey),
    OAuthClient(OAuthClient),
}

impl BootstrapKey {
    /// `source_name` only shows up in error messages.
    pub fn from_json(json: &str, source_name: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidKeyMaterial {
            source_name: source_name.to_string(),
            reason,
        };

        let value: Value = serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;

        if value.get("type").and_then(Value::as_str) == Some("service_account") {
            let key: ServiceAccountKey =
                serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
            return Ok(BootstrapKey::ServiceAccount(key));
        }

        let client = value
            .get("installed")
            .or_else(|| value.get("web"))
            .cloned()
            .ok_or_else(|| {
                invalid(
                    "expected a service-account key or a client secrets file \
                     with an \"installed\" or \"web\" section"
                        .to_string(),
                )
            })?;
        let client: OAuthClient =
            serde_json::from_value(client).map_err(|e| invalid(e.to_string()))?;

        Ok(BootstrapKey::OAuthClient(client))
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidKeyMaterial {
                source_name: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Self::from_json(&contents, &path.display().to_string())
    }

    pub fn service_account(&self) -> Option<&ServiceAccountKey> {
        match self {
            BootstrapKey::ServiceAccount(key) => Some(key),
            BootstrapKey::OAuthClient(_) => None,
        }
    }

    pub fn oauth_client(&self) -> Option<&OAuthClient> {
        match self {
            BootstrapKey::OAuthClient(client) => Some(client),
            BootstrapKey::ServiceAccount(_) => None,
        }
    }
}
