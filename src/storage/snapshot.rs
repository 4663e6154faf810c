use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::SnapshotError;
use crate::models::{AccountSnapshot, SnapshotCollection};

/// Flat JSON file holding the last-known account snapshot
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored snapshot.
    ///
    /// A missing file is `NotFound` and a file that does not decode is
    /// `Parse`, so callers can tell a first run from bad data.
    pub fn load(&self) -> Result<SnapshotCollection, SnapshotError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SnapshotError::NotFound(self.path.clone()));
            }
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| SnapshotError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Previous accounts for change detection. Every failure degrades to
    /// "no prior state", but a corrupt file is logged loudly.
    pub fn load_previous(&self) -> Vec<AccountSnapshot> {
        match self.load() {
            Ok(collection) => collection.data,
            Err(SnapshotError::NotFound(path)) => {
                tracing::info!(
                    "No previous snapshot at {:?}, treating every account as new",
                    path
                );
                Vec::new()
            }
            Err(e @ SnapshotError::Parse { .. }) => {
                tracing::error!(
                    "CORRUPT SNAPSHOT: {}. Falling back to empty previous state; every account will be re-notified",
                    e
                );
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Failed to read previous snapshot: {}", e);
                Vec::new()
            }
        }
    }

    /// Overwrite the stored snapshot.
    ///
    /// Writes a sibling temp file and renames it over the target, so a
    /// concurrent `load` sees either the old or the new document in full.
    pub fn save(&self, collection: &SnapshotCollection) -> Result<(), SnapshotError> {
        let io_err = |source: std::io::Error| SnapshotError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json =
            serde_json::to_string_pretty(collection).map_err(|source| SnapshotError::Serialize {
                path: self.path.clone(),
                source,
            })?;

        let tmp_path = self.temp_path();
        let write_result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(io_err(e));
        }

        tracing::debug!(
            "Snapshot saved: {:?} ({} accounts)",
            self.path,
            collection.data.len()
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot.json".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
    }
}
