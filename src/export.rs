//! `calbridge export-token`: turn a token file into a single line suitable
//! for `GOOGLE_TOKEN_JSON`.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use calbridge_core::{CredentialStore, FileStore};

pub fn run(path: &Path) -> Result<()> {
    println!("{}", export_line(path)?);
    Ok(())
}

/// Validates the file the same way the server would before printing it.
pub fn export_line(path: &Path) -> Result<String> {
    let record = FileStore::new(path)
        .load()
        .with_context(|| format!("Failed to read token file {}", path.display()))?
        .ok_or_else(|| {
            anyhow!(
                "No token file at {}. Complete the OAuth consent flow first.",
                path.display()
            )
        })?;

    Ok(record.to_json()?)
}
