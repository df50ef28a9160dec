use crate::model::{PartialSnapshot, Snapshot};
use chrono::NaiveDate;
use std::path::Path;

/// Result type for capability operations.
pub type CapResult<T> = Result<T, CapError>;

#[derive(Debug, thiserror::Error)]
pub enum CapError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("remote rejected request: HTTP {0}")]
    Rejected(u16),

    #[error("timeout")]
    Timeout,
}

// ---------------------------------------------------------------------------
// Filesystem operations
// ---------------------------------------------------------------------------

pub trait FilesystemOps: Send + Sync {
    fn read_file(&self, path: &Path) -> CapResult<Vec<u8>>;
    /// Write the whole file, creating parent directories as needed.
    fn write_file(&self, path: &Path, data: &[u8]) -> CapResult<()>;
    fn exists(&self, path: &Path) -> bool;
}

// ---------------------------------------------------------------------------
// Remote sync
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait SyncTransport: Send + Sync {
    /// Fetch the remote state. `Ok(None)` when the remote has nothing yet.
    async fn fetch(&self) -> CapResult<Option<PartialSnapshot>>;

    /// Replace the remote state with `snapshot`.
    async fn push(&self, snapshot: &Snapshot) -> CapResult<()>;

    /// Human-readable location, for logs and diagnostics.
    fn endpoint(&self) -> String;
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}
