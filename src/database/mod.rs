pub mod models;

use self::models::LinkedAccounts;
use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};
use tokio::fs;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Flat JSON file holding every link record.
///
/// Reads never fail: a missing file is the initial state and an unreadable or
/// corrupt one is treated as empty (with a warning). A single malformed record
/// is skipped without discarding the others. Writes replace the whole file.
/// There is no locking across processes.
#[derive(Debug, Clone)]
pub struct LinkStore {
    path: PathBuf,
}

impl LinkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> LinkedAccounts {
        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No linked accounts file at {}", self.path.display());
                return LinkedAccounts::new();
            }
            Err(e) => {
                tracing::warn!(
                    "Could not read linked accounts from {}, treating as empty: {}",
                    self.path.display(),
                    e
                );
                return LinkedAccounts::new();
            }
        };

        let entries: BTreeMap<String, serde_json::Value> = match serde_json::from_str(&data) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    "Linked accounts file {} is corrupt, treating as empty: {}",
                    self.path.display(),
                    e
                );
                return LinkedAccounts::new();
            }
        };

        entries
            .into_iter()
            .filter_map(|(account_id, value)| match serde_json::from_value(value) {
                Ok(record) => Some((account_id, record)),
                Err(e) => {
                    tracing::warn!(
                        "Skipping malformed link record for {} in {}: {}",
                        account_id,
                        self.path.display(),
                        e
                    );
                    None
                }
            })
            .collect()
    }

    pub async fn save(&self, accounts: &LinkedAccounts) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(accounts)?;

        // Written next to the target so the rename stays on one filesystem
        let temp_path = self.temp_path();
        fs::write(&temp_path, contents).await?;
        fs::rename(&temp_path, &self.path).await?;

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }
}
