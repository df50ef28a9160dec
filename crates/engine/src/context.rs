//! Application context – holds the store, capability trait objects and the
//! optional local file / remote sync wiring.

use crate::persistence::SnapshotFile;
use crate::platform::{StdFilesystem, SystemClock};
use crate::store::Store;
use crate::sync::SyncScheduler;
use crate::traits::*;
use chrono::NaiveDate;
use std::path::PathBuf;

/// Central context passed to all engine operations.
///
/// Callers (CLI / daemon / tests) swap capability implementations, e.g. a
/// fixed clock for reproducible status output.
pub struct AppContext {
    fs: Box<dyn FilesystemOps>,
    clock: Box<dyn Clock>,
    store: Store,
    data_file: Option<SnapshotFile>,
    sync: Option<SyncScheduler>,
}

impl AppContext {
    pub fn new(fs: Box<dyn FilesystemOps>, clock: Box<dyn Clock>) -> Self {
        Self {
            fs,
            clock,
            store: Store::default(),
            data_file: None,
            sync: None,
        }
    }

    /// Empty store, nothing written to disk.
    pub fn in_memory() -> Self {
        Self::new(Box::new(StdFilesystem), Box::new(SystemClock))
    }

    /// Load state from the local data file and mirror every change back
    /// to it.
    pub fn open(data_path: impl Into<PathBuf>) -> Self {
        let mut ctx = Self::in_memory();
        let file = SnapshotFile::new(data_path);
        ctx.store.replace(file.load(ctx.fs.as_ref()));
        ctx.data_file = Some(file);
        ctx
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sync(mut self, sync: SyncScheduler) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn fs(&self) -> &dyn FilesystemOps {
        self.fs.as_ref()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn data_file(&self) -> Option<&SnapshotFile> {
        self.data_file.as_ref()
    }

    pub fn sync(&self) -> Option<&SyncScheduler> {
        self.sync.as_ref()
    }

    /// Record the current state: write the local file and queue a remote
    /// sync. A local write failure is returned after the sync is queued.
    pub fn persist(&self) -> CapResult<()> {
        let snapshot = self.store.snapshot();
        let saved = match &self.data_file {
            Some(file) => file.save(self.fs(), &snapshot),
            None => Ok(()),
        };
        if let Some(sync) = &self.sync {
            sync.schedule(snapshot);
        }
        saved
    }

    /// Initial pull: adopt every collection the remote has. Does not queue
    /// a push. Returns whether anything was fetched.
    pub async fn pull_remote(&self) -> CapResult<bool> {
        let Some(sync) = &self.sync else {
            return Ok(false);
        };
        let Some(remote) = sync.transport().fetch().await? else {
            return Ok(false);
        };

        let merged = remote.merge_into(&self.store.snapshot());
        self.store.replace(merged);
        if let Some(file) = &self.data_file {
            file.save(self.fs(), &self.store.snapshot())?;
        }
        tracing::info!(endpoint = %sync.transport().endpoint(), "state synced from remote");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PartialSnapshot, VehicleDraft};
    use crate::platform::FixedClock;
    use crate::sync::tests::RecordingTransport;
    use crate::sync::DEFAULT_DEBOUNCE;
    use std::sync::Arc;

    fn temp_data_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("engine_ctx_{}", uuid::Uuid::new_v4()))
            .join("db.json")
    }

    #[test]
    fn test_open_persist_reopen() {
        let path = temp_data_path();
        let ctx = AppContext::open(&path);
        ctx.store()
            .add_vehicle(VehicleDraft {
                name: "Civic".into(),
                ..Default::default()
            })
            .unwrap();
        ctx.persist().unwrap();

        let reopened = AppContext::open(&path);
        assert_eq!(reopened.store().snapshot().vehicles[0].name, "Civic");
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_clock_override() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let ctx = AppContext::in_memory().with_clock(Box::new(FixedClock(day)));
        assert_eq!(ctx.today(), day);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pull_replaces_present_collections_without_push() {
        let transport = Arc::new(RecordingTransport::default());
        *transport.remote.lock().unwrap() = Some(
            serde_json::from_str::<PartialSnapshot>(
                r#"{"vehicles": [{"id": "v9", "name": "Van", "currentKm": 5000}]}"#,
            )
            .unwrap(),
        );
        let ctx = AppContext::in_memory()
            .with_sync(SyncScheduler::new(transport.clone(), DEFAULT_DEBOUNCE));

        assert!(ctx.pull_remote().await.unwrap());
        assert_eq!(ctx.store().snapshot().vehicles[0].id, "v9");

        tokio::time::sleep(DEFAULT_DEBOUNCE * 2).await;
        assert!(transport.pushed.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_queues_sync() {
        let transport = Arc::new(RecordingTransport::default());
        let ctx = AppContext::in_memory()
            .with_sync(SyncScheduler::new(transport.clone(), DEFAULT_DEBOUNCE));
        ctx.store()
            .add_vehicle(VehicleDraft {
                name: "Civic".into(),
                ..Default::default()
            })
            .unwrap();
        ctx.persist().unwrap();

        tokio::time::sleep(DEFAULT_DEBOUNCE * 2).await;
        let pushed = transport.pushed.lock().unwrap();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].vehicles[0].name, "Civic");
    }
}
