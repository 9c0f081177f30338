//! Startup wiring for credentials: pick the first backing that holds a
//! record, fill in client details from the bootstrap key, and build the
//! manager that owns the record from then on.

use std::sync::Arc;

use calbridge_core::store::{TOKEN_ENV_VAR, load_first};
use calbridge_core::{
    Backing, ConfigError, CredentialManager, CredentialRecord, CredentialStore, EnvStore,
    FileStore, GrantKind,
};
use calbridge_google::{BootstrapKey, GoogleTokenSource};

use crate::config::Config;

/// `GOOGLE_CREDS_JSON` wins over `GOOGLE_CLIENT_SECRETS`.
pub fn bootstrap_key(config: &Config) -> Result<Option<BootstrapKey>, ConfigError> {
    if let Some(json) = &config.creds_json {
        return BootstrapKey::from_json(json, "GOOGLE_CREDS_JSON").map(Some);
    }
    if let Some(path) = &config.client_secrets_path {
        return BootstrapKey::from_path(path).map(Some);
    }
    Ok(None)
}

/// Stores in priority order: environment, then file.
pub fn default_stores(config: &Config) -> Vec<Arc<dyn CredentialStore>> {
    vec![
        Arc::new(EnvStore::from_env(TOKEN_ENV_VAR)),
        Arc::new(FileStore::new(&config.token_path)),
    ]
}

pub fn credential_manager(
    config: &Config,
    http: reqwest::Client,
) -> Result<CredentialManager, ConfigError> {
    let key = bootstrap_key(config)?;
    build_manager(&default_stores(config), key, http)
}

pub fn build_manager(
    stores: &[Arc<dyn CredentialStore>],
    key: Option<BootstrapKey>,
    http: reqwest::Client,
) -> Result<CredentialManager, ConfigError> {
    let service_account = key.as_ref().and_then(BootstrapKey::service_account).cloned();

    let (record, store) = match load_first(stores)? {
        Some((mut record, store)) => {
            if let Some(client) = key.as_ref().and_then(BootstrapKey::oauth_client) {
                if record.client_id.is_empty() {
                    record.client_id = client.client_id.clone();
                }
                if record.client_secret.is_empty() {
                    record.client_secret = client.client_secret.clone();
                }
            }
            if record.kind == GrantKind::ServiceAccount && service_account.is_none() {
                return Err(ConfigError::MissingServiceAccountKey);
            }
            (record, store)
        }
        None => {
            let sa = service_account
                .as_ref()
                .ok_or(ConfigError::NoCredentialSource)?;
            let store = stores
                .iter()
                .find(|s| s.backing() == Backing::File)
                .cloned()
                .ok_or(ConfigError::NoCredentialSource)?;

            tracing::info!(
                client_email = %sa.client_email,
                "No stored credential, using service account"
            );
            (
                CredentialRecord::unminted_service_account(sa.token_uri.clone(), Backing::File),
                store,
            )
        }
    };

    tracing::debug!(kind = ?record.kind, "Credential manager ready");

    let tokens = Arc::new(GoogleTokenSource::new(http, service_account));
    Ok(CredentialManager::new(record, store, tokens)?)
}
