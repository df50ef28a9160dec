//! Local mirror of the store, kept as a single JSON file.

use crate::model::Snapshot;
use crate::traits::{CapError, CapResult, FilesystemOps};
use std::path::{Path, PathBuf};

pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot, falling back to an empty one when the file is
    /// missing or unreadable.
    pub fn load(&self, fs: &dyn FilesystemOps) -> Snapshot {
        if !fs.exists(&self.path) {
            tracing::debug!(path = %self.path.display(), "no local data file, starting empty");
            return Snapshot::default();
        }
        match self.try_load(fs) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "ignoring unreadable local data file"
                );
                Snapshot::default()
            }
        }
    }

    pub fn try_load(&self, fs: &dyn FilesystemOps) -> CapResult<Snapshot> {
        let data = fs.read_file(&self.path)?;
        serde_json::from_slice(&data)
            .map_err(|e| CapError::InvalidData(format!("{}: {}", self.path.display(), e)))
    }

    pub fn save(&self, fs: &dyn FilesystemOps, snapshot: &Snapshot) -> CapResult<()> {
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| CapError::InvalidData(e.to_string()))?;
        fs.write_file(&self.path, &json)
    }
}
