//! Common test utilities for E2E tests
//!
//! `FakePhotoServer` stands in for the photo API: it serves
//! `/photos/list`, accepts multipart uploads on `/photos/upload` and
//! serves full-resolution files under `/files/:name`.

#![allow(dead_code)]

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use photosync::{AppState, config};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// One multipart part as the fake server received it
#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Behaviour switches and recorded traffic of the fake server
#[derive(Debug)]
pub struct FakeState {
    pub photos: Vec<Value>,
    pub list_success: bool,
    pub list_calls: usize,
    pub last_list_body: Option<Value>,
    pub upload_success: bool,
    pub upload_msg: Option<String>,
    pub uploads: Vec<ReceivedUpload>,
    pub files: HashMap<String, Vec<u8>>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            photos: Vec::new(),
            list_success: true,
            list_calls: 0,
            last_list_body: None,
            upload_success: true,
            upload_msg: None,
            uploads: Vec::new(),
            files: HashMap::new(),
        }
    }
}

type Shared = Arc<Mutex<FakeState>>;

/// Fake photo API bound to a random local port
pub struct FakePhotoServer {
    pub addr: String,
    pub state: Shared,
}

impl FakePhotoServer {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));

        let app = Router::new()
            .route("/photos/list", post(list_photos))
            .route("/photos/upload", post(upload_photo))
            .route("/files/:name", get(serve_file))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to be ready
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self { addr, state }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Add a photo to the listing and serve `bytes` as its file
    pub fn add_photo(
        &self,
        id: &str,
        filename: &str,
        uploaded_at: &str,
        capture_date: Option<&str>,
        bytes: &[u8],
    ) {
        let mut photo = json!({
            "id": id,
            "photo_url": self.url(&format!("/files/{}", filename)),
            "thumbnail_url": self.url(&format!("/files/thumb_{}", filename)),
            "filename": filename,
            "uploaded_at": uploaded_at,
        });
        if let Some(capture_date) = capture_date {
            photo["capture_date"] = json!(capture_date);
        }

        let mut state = self.state.lock().unwrap();
        state.photos.push(photo);
        state.files.insert(filename.to_string(), bytes.to_vec());
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

async fn list_photos(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.list_calls += 1;
    state.last_list_body = Some(body);

    if state.list_success {
        Json(json!({ "success": true, "photos": state.photos }))
    } else {
        Json(json!({ "success": false, "msg": "Folder not found" }))
    }
}

async fn upload_photo(State(state): State<Shared>, mut multipart: Multipart) -> Json<Value> {
    let mut received = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.unwrap().to_vec();
        received.push(ReceivedUpload {
            field_name,
            file_name,
            content_type,
            bytes,
        });
    }

    let mut state = state.lock().unwrap();
    state.uploads.extend(received);

    let mut response = json!({ "success": state.upload_success });
    if let Some(msg) = &state.upload_msg {
        response["msg"] = json!(msg);
    }
    Json(response)
}

async fn serve_file(
    State(state): State<Shared>,
    Path(name): Path<String>,
) -> Result<Vec<u8>, StatusCode> {
    state
        .lock()
        .unwrap()
        .files
        .get(&name)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)
}

/// Application wired against a fake server with its own database
pub struct TestApp {
    pub state: AppState,
    pub server: FakePhotoServer,
    pub temp_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let server = FakePhotoServer::start().await;
        let base_url = server.url("");
        Self::with_base_url(server, base_url).await
    }

    /// App whose API base URL points at a port nothing listens on
    pub async fn unreachable() -> Self {
        let server = FakePhotoServer::start().await;
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let closed = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        Self::with_base_url(server, closed).await
    }

    async fn with_base_url(server: FakePhotoServer, base_url: String) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(base_url, temp_dir.path().to_path_buf());
        config.validate().unwrap();

        let state = AppState::new(config).await.unwrap();
        Self {
            state,
            server,
            temp_dir,
        }
    }

    /// Write a local image file and return its path
    pub fn write_photo(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join("media").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, bytes).unwrap();
        path
    }
}

fn test_config(base_url: String, root: PathBuf) -> config::AppConfig {
    config::AppConfig {
        api: config::ApiConfig {
            base_url,
            timeout_seconds: 5,
            user_agent: "PhotoSync/test".to_string(),
        },
        storage: config::StorageConfig {
            database_path: root.join("test.db"),
            download_dir: root.join("downloads"),
        },
        cache: config::CacheConfig {
            listing_ttl_seconds: 172_800,
            visible_window_size: 20,
        },
        queue: config::QueueConfig {
            max_retries: 3,
            sweep_interval_seconds: 60,
        },
        monitor: config::MonitorConfig {
            notification_throttle_ms: 2000,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}
