//! HTTP routes. `/api/data` is the sync endpoint the clients pull from and
//! push to; the other routes are read-only views over the stored state.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use engine::model::Snapshot;
use engine::persistence::SnapshotFile;
use engine::platform::StdFilesystem;
use engine::status::{self, Dashboard, StatusRecord};
use engine::traits::{CapError, Clock, FilesystemOps};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid JSON")]
    InvalidJson(#[source] serde_json::Error),

    #[error("No data")]
    NoData,

    #[error("Failed to read data")]
    Read(#[source] CapError),

    #[error("Failed to write data")]
    Write(#[source] CapError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidJson(e) => {
                tracing::warn!(error = %e, "rejected data upload");
                StatusCode::BAD_REQUEST
            }
            ApiError::NoData => StatusCode::NOT_FOUND,
            ApiError::Read(e) | ApiError::Write(e) => {
                tracing::error!(error = %e, "{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// The shared data file. Reads and writes are serialised so a GET never
/// sees a half-written upload.
pub struct DataStore {
    file: SnapshotFile,
    fs: Box<dyn FilesystemOps>,
    lock: Mutex<()>,
}

impl DataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: SnapshotFile::new(path),
            fs: Box::new(StdFilesystem),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }

    async fn read_raw(&self) -> ApiResult<Vec<u8>> {
        let _guard = self.lock.lock().await;
        if !self.fs.exists(self.file.path()) {
            return Err(ApiError::NoData);
        }
        self.fs.read_file(self.file.path()).map_err(ApiError::Read)
    }

    async fn snapshot(&self) -> ApiResult<Snapshot> {
        let _guard = self.lock.lock().await;
        if !self.fs.exists(self.file.path()) {
            return Ok(Snapshot::default());
        }
        self.file.try_load(self.fs.as_ref()).map_err(ApiError::Read)
    }

    /// Store the body verbatim once it parses as a snapshot.
    async fn replace(&self, body: &[u8]) -> ApiResult<Snapshot> {
        let snapshot: Snapshot = serde_json::from_slice(body).map_err(ApiError::InvalidJson)?;
        let _guard = self.lock.lock().await;
        self.fs
            .write_file(self.file.path(), body)
            .map_err(ApiError::Write)?;
        Ok(snapshot)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub data: Arc<DataStore>,
    pub clock: Arc<dyn Clock>,
}

pub fn router(state: AppState, cors_allow_any: bool) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/data", get(get_data).post(post_data))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/vehicles/:id/status", get(get_vehicle_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_allow_any {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn get_data(State(state): State<AppState>) -> ApiResult<Response> {
    let body = state.data.read_raw().await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

async fn post_data(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let snapshot = state.data.replace(&body).await?;
    tracing::info!(
        vehicles = snapshot.vehicles.len(),
        logs = snapshot.logs.len(),
        custom_items = snapshot.custom_items.len(),
        "data replaced"
    );
    Ok(Json(json!({ "success": true })))
}

async fn get_dashboard(State(state): State<AppState>) -> ApiResult<Json<Dashboard>> {
    let snapshot = state.data.snapshot().await?;
    Ok(Json(status::dashboard(&snapshot, state.clock.today())))
}

async fn get_vehicle_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<StatusRecord>>> {
    let snapshot = state.data.snapshot().await?;
    Ok(Json(status::status_for_vehicle(&snapshot, &id, state.clock.today())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::NaiveDate;
    use engine::platform::FixedClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const SAMPLE: &str = r#"{
        "vehicles": [{"id": "v1", "name": "Civic", "currentKm": 19000}],
        "logs": [{"id": "l1", "vehicleId": "v1", "itemId": "engine-oil-filter",
                  "date": "2025-01-10", "kmAtService": 10000}],
        "customItems": []
    }"#;

    static NEXT: AtomicUsize = AtomicUsize::new(0);

    struct TempData(PathBuf);
    impl TempData {
        fn new() -> Self {
            let n = NEXT.fetch_add(1, Ordering::SeqCst);
            let name = format!("autocare_api_{}_{}", std::process::id(), n);
            let dir = std::env::temp_dir().join(name);
            Self(dir.join("db.json"))
        }
    }
    impl Drop for TempData {
        fn drop(&mut self) {
            if let Some(dir) = self.0.parent() {
                let _ = std::fs::remove_dir_all(dir);
            }
        }
    }

    fn app(path: &std::path::Path) -> Router {
        let state = AppState {
            data: Arc::new(DataStore::new(path)),
            clock: Arc::new(FixedClock(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap())),
        };
        router(state, true)
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    fn post(body: &str) -> Request<Body> {
        Request::post("/api/data")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_post_then_get_returns_same_document() {
        let tmp = TempData::new();
        let app = app(&tmp.0);

        let (status, body) = send(&app, post(SAMPLE)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));

        let (status, body) = send(&app, get("/api/data")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vehicles"][0]["name"], "Civic");
        assert_eq!(body["logs"][0]["kmAtService"], 10000);
    }

    #[tokio::test]
    async fn test_invalid_upload_is_rejected_and_file_untouched() {
        let tmp = TempData::new();
        let app = app(&tmp.0);

        let (status, body) = send(&app, post("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid JSON" }));

        let (status, _) = send(&app, post(r#"{"vehicles": "nope"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!tmp.0.exists());
    }

    #[tokio::test]
    async fn test_get_without_data_is_not_found() {
        let tmp = TempData::new();
        let (status, body) = send(&app(&tmp.0), get("/api/data")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "No data" }));
    }

    #[tokio::test]
    async fn test_unreadable_data_is_server_error() {
        let tmp = TempData::new();
        // A directory where the file should be cannot be read as one.
        std::fs::create_dir_all(&tmp.0).unwrap();
        let (status, body) = send(&app(&tmp.0), get("/api/data")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Failed to read data" }));
    }

    #[tokio::test]
    async fn test_status_views() {
        let tmp = TempData::new();
        let app = app(&tmp.0);
        send(&app, post(SAMPLE)).await;

        let (status, records) = send(&app, get("/api/vehicles/v1/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(records[0]["item"]["id"], "engine-oil-filter");
        assert_eq!(records[0]["status"], "warning");
        assert_eq!(records[0]["kmRemaining"], 1000);

        let (_, unknown) = send(&app, get("/api/vehicles/ghost/status")).await;
        assert_eq!(unknown, json!([]));

        let (status, dash) = send(&app, get("/api/dashboard")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dash["counts"]["warning"], 1);
        assert_eq!(dash["warning"][0]["vehicleName"], "Civic");
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = TempData::new();
        let (status, body) = send(&app(&tmp.0), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
