//! Concrete implementations of the capability traits.
//!
//! - [`StdFilesystem`]: real std::fs operations
//! - [`ReqwestSync`]: HTTP sync against a `/api/data` endpoint
//! - [`SystemClock`] / [`FixedClock`]: local calendar date

use crate::model::{PartialSnapshot, Snapshot};
use crate::traits::*;
use chrono::NaiveDate;
use std::path::Path;
use std::time::Duration;

// ===========================================================================
// Filesystem – wraps std::fs
// ===========================================================================

pub struct StdFilesystem;

impl FilesystemOps for StdFilesystem {
    fn read_file(&self, path: &Path) -> CapResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                CapError::PermissionDenied(format!("cannot read {}: {}", path.display(), e))
            }
            _ => CapError::Io(e),
        })
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> CapResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, data).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                CapError::PermissionDenied(format!("cannot write {}: {}", path.display(), e))
            }
            _ => CapError::Io(e),
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

// ===========================================================================
// Sync – wraps reqwest
// ===========================================================================

pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to a server exposing `GET`/`POST {base}/api/data`.
pub struct ReqwestSync {
    client: reqwest::Client,
    url: String,
}

impl ReqwestSync {
    pub fn new(base_url: &str, timeout: Duration) -> CapResult<Self> {
        // reqwest is built without a bundled crypto provider.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CapError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: format!("{}/api/data", base_url.trim_end_matches('/')),
        })
    }
}

fn map_reqwest(url: &str, e: reqwest::Error) -> CapError {
    if e.is_timeout() {
        CapError::Timeout
    } else {
        CapError::Network(format!("{}: {}", url, e))
    }
}

#[async_trait::async_trait]
impl SyncTransport for ReqwestSync {
    async fn fetch(&self) -> CapResult<Option<PartialSnapshot>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| map_reqwest(&self.url, e))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(CapError::Rejected(resp.status().as_u16()));
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| map_reqwest(&self.url, e))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| CapError::InvalidData(format!("remote snapshot: {}", e)))
    }

    async fn push(&self, snapshot: &Snapshot) -> CapResult<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(snapshot)
            .send()
            .await
            .map_err(|e| map_reqwest(&self.url, e))?;
        if !resp.status().is_success() {
            return Err(CapError::Rejected(resp.status().as_u16()));
        }
        Ok(())
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

// ===========================================================================
// Clock
// ===========================================================================

/// Today's date in the local time zone.
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Always reports the same date. Used by tests and scenario replays.
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_write_creates_parent() {
        let dir = std::env::temp_dir().join(format!("engine_fs_{}", uuid::Uuid::new_v4()));
        let file = dir.join("nested").join("db.json");
        StdFilesystem.write_file(&file, b"{}").unwrap();
        assert!(StdFilesystem.exists(&file));
        assert_eq!(StdFilesystem.read_file(&file).unwrap(), b"{}");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_sync_url_normalised() {
        let sync = ReqwestSync::new("http://localhost:5174/", DEFAULT_SYNC_TIMEOUT).unwrap();
        assert_eq!(sync.endpoint(), "http://localhost:5174/api/data");
    }

    /// Answers a single HTTP request with a canned response and hands back
    /// the raw request it received.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (ReqwestSync, tokio::task::JoinHandle<String>) {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let request = read_request(&mut sock).await;
            let response = format!(
                concat!(
                    "HTTP/1.1 {}\r\n",
                    "Content-Type: application/json\r\n",
                    "Content-Length: {}\r\n",
                    "Connection: close\r\n\r\n{}",
                ),
                status,
                body.len(),
                body
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            let _ = sock.shutdown().await;
            request
        });
        let sync = ReqwestSync::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        (sync, handle)
    }

    async fn read_request(sock: &mut tokio::net::TcpStream) -> String {
        use tokio::io::AsyncReadExt;

        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn test_fetch_parses_remote_snapshot() {
        let (sync, server) = serve_once(
            "200 OK",
            r#"{"vehicles": [{"id": "v1", "name": "Civic", "currentKm": 19000}]}"#,
        )
        .await;
        let remote = sync.fetch().await.unwrap().unwrap();
        let vehicles = remote.vehicles.unwrap();
        assert_eq!(vehicles[0].current_km, 19_000);
        assert!(remote.logs.is_none());

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/data HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_empty() {
        let (sync, _server) = serve_once("404 Not Found", r#"{"error": "No data"}"#).await;
        assert!(sync.fetch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_blank_body_is_empty() {
        let (sync, _server) = serve_once("200 OK", "  \n ").await;
        assert!(sync.fetch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_rejected() {
        let (sync, _server) = serve_once("500 Internal Server Error", "{}").await;
        let err = sync.fetch().await.unwrap_err();
        assert!(matches!(err, CapError::Rejected(500)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_fetch_invalid_json_is_invalid_data() {
        let (sync, _server) = serve_once("200 OK", "{not json").await;
        let err = sync.fetch().await.unwrap_err();
        assert!(matches!(err, CapError::InvalidData(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_push_posts_full_snapshot() {
        let (sync, server) = serve_once("200 OK", r#"{"success": true}"#).await;
        let snapshot = Snapshot {
            vehicles: vec![crate::model::Vehicle {
                id: "v1".into(),
                name: "Civic".into(),
                make: String::new(),
                model: String::new(),
                year: None,
                current_km: 19_000,
            }],
            ..Snapshot::default()
        };
        sync.push(&snapshot).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/data HTTP/1.1"));
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        let sent: Snapshot = serde_json::from_str(body).unwrap();
        assert_eq!(sent.vehicles[0].id, "v1");
        assert_eq!(sent.vehicles[0].current_km, 19_000);
    }

    #[tokio::test]
    async fn test_push_rejected_status() {
        let (sync, _server) = serve_once("400 Bad Request", r#"{"error": "Invalid JSON"}"#).await;
        let err = sync.push(&Snapshot::default()).await.unwrap_err();
        assert!(matches!(err, CapError::Rejected(400)), "got {:?}", err);
    }
}
