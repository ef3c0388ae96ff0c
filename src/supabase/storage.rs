//! On-disk persistence for the current session.
//!
//! The file holds the provider's session JSON as-is so a later run can resume
//! (and refresh) it without signing in again.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::provider::ProviderError;
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted session. A missing file is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Storage`] if the file cannot be read or parsed.
    pub async fn load(&self) -> Result<Option<Session>, ProviderError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error(&self.path, &e)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| storage_error(&self.path, &e))
    }

    /// Write `session`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Storage`] on any I/O or encoding failure.
    pub async fn save(&self, session: &Session) -> Result<(), ProviderError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(parent, &e))?;
        }
        let json = serde_json::to_string_pretty(session).map_err(|e| storage_error(&self.path, &e))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| storage_error(&self.path, &e))
    }

    /// Delete the persisted session. Already-missing is fine.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Storage`] if the file exists but cannot be removed.
    pub async fn remove(&self) -> Result<(), ProviderError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(&self.path, &e)),
        }
    }
}

fn storage_error(path: &Path, err: &dyn std::fmt::Display) -> ProviderError {
    ProviderError::Storage(format!("{}: {err}", path.display()))
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
