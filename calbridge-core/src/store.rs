//! Credential backings: an environment variable and a local file.
//!
//! Stores are tried in a fixed priority order (environment first). The store
//! that yields a record becomes its origin, and every later save for that
//! record goes back to the same store.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::credential::{Backing, CredentialRecord};
use crate::error::StoreError;

pub const TOKEN_ENV_VAR: &str = "GOOGLE_TOKEN_JSON";
pub const DEFAULT_TOKEN_PATH: &str = "token.json";

pub trait CredentialStore: Send + Sync {
    fn backing(&self) -> Backing;

    /// `Ok(None)` when this backing holds no credential.
    fn load(&self) -> Result<Option<CredentialRecord>, StoreError>;

    fn save(&self, record: &CredentialRecord) -> Result<(), StoreError>;
}

/// Credential serialized as one JSON object in an environment variable.
///
/// Saves land in a process-local overlay that later loads on this store
/// observe. They do not survive a restart.
pub struct EnvStore {
    var: String,
    initial: Option<String>,
    overlay: RwLock<Option<String>>,
}

impl EnvStore {
    /// Snapshot `var` from the process environment.
    pub fn from_env(var: impl Into<String>) -> Self {
        let var = var.into();
        let initial = std::env::var(&var).ok();
        Self::with_value(var, initial)
    }

    pub fn with_value(var: impl Into<String>, value: Option<String>) -> Self {
        EnvStore {
            var: var.into(),
            initial: value.filter(|v| !v.trim().is_empty()),
            overlay: RwLock::new(None),
        }
    }

    fn current_value(&self) -> Option<String> {
        let overlay = self
            .overlay
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        overlay.clone().or_else(|| self.initial.clone())
    }
}

impl CredentialStore for EnvStore {
    fn backing(&self) -> Backing {
        Backing::Environment
    }

    fn load(&self) -> Result<Option<CredentialRecord>, StoreError> {
        self.current_value()
            .map(|json| CredentialRecord::from_json(&json, Backing::Environment))
            .transpose()
    }

    fn save(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let json = record.to_json()?;
        let mut overlay = self
            .overlay
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *overlay = Some(json);
        tracing::debug!(var = %self.var, "Saved credential to process-local overlay");
        Ok(())
    }
}

/// Credential serialized as JSON in a local file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "token.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
        let path = path.to_path_buf();
        move |source| StoreError::Io { path, source }
    }
}

impl CredentialStore for FileStore {
    fn backing(&self) -> Backing {
        Backing::File
    }

    fn load(&self) -> Result<Option<CredentialRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path).map_err(self.io_err(&self.path))?;
        CredentialRecord::from_json(&contents, Backing::File).map(Some)
    }

    /// Write to a sibling temp file, then rename over the target so a
    /// concurrent reader never sees a truncated file.
    fn save(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let contents = record.to_json_pretty()?;
        let temp = self.temp_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(self.io_err(parent))?;
        }

        {
            let mut file = fs::File::create(&temp).map_err(self.io_err(&temp))?;
            file.write_all(contents.as_bytes())
                .map_err(self.io_err(&temp))?;
            file.sync_all().map_err(self.io_err(&temp))?;
        }

        // Owner-only, the file holds OAuth tokens
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp, fs::Permissions::from_mode(0o600))
                .map_err(self.io_err(&temp))?;
        }

        fs::rename(&temp, &self.path).map_err(self.io_err(&self.path))
    }
}

/// Try `stores` in order and return the first record found, together with
/// the store that produced it.
pub fn load_first(
    stores: &[Arc<dyn CredentialStore>],
) -> Result<Option<(CredentialRecord, Arc<dyn CredentialStore>)>, StoreError> {
    for store in stores {
        if let Some(record) = store.load()? {
            tracing::info!(backing = %store.backing(), "Loaded credential");
            return Ok(Some((record, Arc::clone(store))));
        }
        tracing::debug!(backing = %store.backing(), "No credential in backing");
    }
    Ok(None)
}
