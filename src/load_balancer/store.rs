//! Durable backend list.
//!
//! The file holds identities only; counters and health are rebuilt in memory
//! on every start.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Error type for registry file writes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("registry file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry file encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    backends: Vec<String>,
}

/// JSON file holding the ordered list of backend identities.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted identities.
    ///
    /// A missing or malformed file yields an empty list.
    pub async fn load(&self) -> Vec<String> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Could not read registry file, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<RegistryFile>(&content) {
            Ok(file) => {
                let mut seen = std::collections::HashSet::new();
                file.backends
                    .into_iter()
                    .filter(|url| seen.insert(url.clone()))
                    .collect()
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Malformed registry file, starting empty");
                Vec::new()
            }
        }
    }

    /// Replace the file with `backends`.
    ///
    /// Writes a sibling temp file first and renames it over the target.
    pub async fn save(&self, backends: &[String]) -> Result<(), StoreError> {
        let file = RegistryFile {
            backends: backends.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &self.path).await?;

        tracing::info!(path = %self.path.display(), count = backends.len(), "Persisted backends");
        Ok(())
    }
}
