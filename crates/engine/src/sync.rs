//! Debounced background sync of the full snapshot to a remote endpoint.
//!
//! Every mutation calls [`SyncScheduler::schedule`] with the new snapshot.
//! A push happens once no further mutation arrived for the debounce
//! window, and always sends the latest snapshot. Pushes are serialised,
//! so an older snapshot can never land after a newer one.

use crate::model::Snapshot;
use crate::traits::{CapResult, SyncTransport};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    pub endpoint: String,
    pub pushes: u64,
    pub failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

pub struct SyncScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn SyncTransport>,
    delay: Duration,
    generation: AtomicU64,
    syncing: AtomicBool,
    latest: Mutex<Option<Arc<Snapshot>>>,
    push_lock: tokio::sync::Mutex<()>,
    pushes: AtomicU64,
    failures: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl SyncScheduler {
    pub fn new(transport: Arc<dyn SyncTransport>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                delay,
                generation: AtomicU64::new(0),
                syncing: AtomicBool::new(false),
                latest: Mutex::new(None),
                push_lock: tokio::sync::Mutex::new(()),
                pushes: AtomicU64::new(0),
                failures: AtomicU64::new(0),
                last_error: Mutex::new(None),
            }),
        }
    }

    /// Queue `snapshot` for upload, superseding anything still waiting.
    pub fn schedule(&self, snapshot: Arc<Snapshot>) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                tracing::warn!("no async runtime, skipping remote sync");
                return;
            }
        };

        *lock(&self.inner.latest) = Some(snapshot);
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);

        runtime.spawn(async move {
            tokio::time::sleep(inner.delay).await;
            if inner.generation.load(Ordering::SeqCst) != generation {
                tracing::trace!(generation, "sync superseded");
                return;
            }
            inner.push_latest().await;
        });
    }

    /// Push whatever is queued right now, skipping the remaining delay.
    pub async fn flush(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.push_latest().await;
    }

    /// Upload `snapshot` immediately and report the outcome.
    pub async fn push_now(&self, snapshot: &Snapshot) -> CapResult<()> {
        let _guard = self.inner.push_lock.lock().await;
        self.inner.syncing.store(true, Ordering::SeqCst);
        let result = self.inner.transport.push(snapshot).await;
        self.inner.syncing.store(false, Ordering::SeqCst);
        self.inner.record(&result);
        result
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::SeqCst)
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.inner.latest).is_some()
    }

    pub fn transport(&self) -> &dyn SyncTransport {
        self.inner.transport.as_ref()
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            endpoint: self.inner.transport.endpoint(),
            pushes: self.inner.pushes.load(Ordering::SeqCst),
            failures: self.inner.failures.load(Ordering::SeqCst),
            last_error: lock(&self.inner.last_error).clone(),
        }
    }
}

impl Inner {
    async fn push_latest(&self) {
        let _guard = self.push_lock.lock().await;
        let queued = lock(&self.latest).take();
        let Some(snapshot) = queued else {
            return;
        };

        self.syncing.store(true, Ordering::SeqCst);
        let result = self.transport.push(&snapshot).await;
        self.syncing.store(false, Ordering::SeqCst);
        self.record(&result);
    }

    fn record(&self, result: &CapResult<()>) {
        match result {
            Ok(()) => {
                self.pushes.fetch_add(1, Ordering::SeqCst);
                *lock(&self.last_error) = None;
                tracing::debug!(endpoint = %self.transport.endpoint(), "snapshot synced");
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                *lock(&self.last_error) = Some(e.to_string());
                tracing::warn!(
                    endpoint = %self.transport.endpoint(),
                    error = %e,
                    "failed to sync snapshot"
                );
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
