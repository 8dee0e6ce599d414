use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        DefaultBodyLimit, Multipart, Request, State,
    },
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc as StdArc;
use tokio::io::AsyncWriteExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::GalleryConfig;
use crate::constants::MULTIPART_OVERHEAD_BYTES;
use crate::media::MediaFile;
use crate::store::{MetadataStore, StoreError};
use crate::validation::{
    check_size, file_extension, resolve_content_type, validate_content_type, UploadError,
};

/// Name of the multipart field carrying the uploaded file
const FILE_FIELD: &str = "file";

// State shared by the gallery handlers
pub struct AppState {
    pub public_dir: PathBuf,
    pub store: MetadataStore,
    pub upload_enabled: bool,
    pub max_upload_bytes: u64,
}

impl AppState {
    pub fn from_config(config: &GalleryConfig) -> Self {
        Self {
            public_dir: config.public_dir.clone(),
            store: MetadataStore::new(&config.public_dir),
            upload_enabled: config.upload_enabled,
            max_upload_bytes: config.max_upload_bytes(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MediaListResponse {
    pub files: Vec<MediaFile>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
}

/// Build the gallery router: JSON API, health check, and the public directory for everything else
pub fn build_router(state: StdArc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = usize::try_from(state.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let static_files = ServeDir::new(&state.public_dir);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/media", get(media_list_handler))
        .route("/api/upload", post(upload_handler))
        .fallback_service(static_files)
        .layer(middleware::from_fn(hide_dot_files))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Run the gallery server until it fails
pub fn serve_gallery(config: GalleryConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    println!("Starting memorial gallery server");
    println!("Public directory: {}", config.public_dir.display());
    if config.upload_enabled {
        println!("Uploads: ENABLED (max {}MB)", config.max_upload_mb);
    } else {
        println!("Uploads: DISABLED");
    }
    println!("Listening on: http://[::]:{} (IPv4 + IPv6)", config.port);
    println!("Endpoints:");
    println!("  GET /health  - Health check");
    println!("  GET /api/media  - List media records");
    println!("  POST /api/upload  - Upload an image or video (multipart field 'file')");
    println!("  GET /*  - Static files from the public directory");

    let port = config.port;
    let app_state = StdArc::new(AppState::from_config(&config));

    // Create tokio runtime and run server
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let app = build_router(app_state);

        let listener = tokio::net::TcpListener::bind(format!("[::]:{}", port))
            .await
            .map_err(|e| format!("Failed to bind to port {}: {}", port, e))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| format!("Server error: {}", e))?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

// Health check endpoint - returns 200 OK if server is running
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// The lock file and in-flight uploads live next to the media; never serve dot files
async fn hide_dot_files(request: Request, next: Next) -> Response {
    let hidden = request.uri().path().split('/').any(|segment| {
        let segment = segment.to_ascii_lowercase();
        segment.starts_with('.') || segment.starts_with("%2e")
    });
    if hidden {
        return StatusCode::NOT_FOUND.into_response();
    }

    next.run(request).await
}

// Always 200: an unreadable document is reported as an empty gallery
async fn media_list_handler(State(state): State<StdArc<AppState>>) -> impl IntoResponse {
    let files = match tokio::task::spawn_blocking(move || state.store.list_or_empty()).await {
        Ok(files) => files,
        Err(e) => {
            error!("Media listing task failed: {}", e);
            Vec::new()
        }
    };

    Json(MediaListResponse { files })
}

async fn upload_handler(
    State(state): State<StdArc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    if !state.upload_enabled {
        return error_response(&UploadError::Disabled);
    }

    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            return error_response(&UploadError::InvalidRequest(rejection.body_text()));
        }
    };

    match receive_upload(&state, multipart).await {
        Ok(record) => {
            info!("Upload stored as {}", record.url);
            Json(UploadResponse {
                success: true,
                url: record.url,
            })
            .into_response()
        }
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &UploadError) -> Response {
    let status = err.status_code();
    if matches!(err, UploadError::Disabled) {
        info!("Upload attempted while uploads are disabled");
    } else if status.is_server_error() {
        error!("Upload failed: {}", err);
    } else {
        warn!("Upload rejected ({}): {}", status.as_u16(), err);
    }

    (status, Json(serde_json::json!({ "error": err.client_message() }))).into_response()
}

async fn receive_upload(
    state: &StdArc<AppState>,
    mut multipart: Multipart,
) -> Result<MediaFile, UploadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::InvalidRequest(e.body_text()))?
    {
        if field.name() == Some(FILE_FIELD) {
            return store_field(state, field).await;
        }
    }

    Err(UploadError::NoFile)
}

/// Stream one file field to disk and commit it to the store
///
/// Type is checked before anything is written; size is checked as chunks
/// arrive, so an oversized upload is aborted without buffering it. The
/// temporary file is removed on every error path when `temp_path` drops.
async fn store_field(
    state: &StdArc<AppState>,
    mut field: Field<'_>,
) -> Result<MediaFile, UploadError> {
    let file_name = field
        .file_name()
        .map(str::to_string)
        .filter(|name| !name.is_empty())
        .ok_or(UploadError::NoFile)?;

    let content_type = resolve_content_type(field.content_type(), Some(file_name.as_str()));
    let media_type = validate_content_type(&content_type)?;
    let extension = file_extension(Some(file_name.as_str()), &content_type);

    let (std_file, temp_path) = state.store.new_upload_temp()?.into_parts();
    let mut file = tokio::fs::File::from_std(std_file);

    let mut size: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| UploadError::InvalidRequest(e.body_text()))?
    {
        size += chunk.len() as u64;
        check_size(size, state.max_upload_bytes)?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    info!("Received '{}' ({}, {} bytes)", file_name, content_type, size);

    let commit_state = state.clone();
    tokio::task::spawn_blocking(move || {
        commit_state
            .store
            .commit_upload(temp_path, &extension, media_type)
    })
    .await
    .map_err(|e| StoreError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?
    .map_err(UploadError::from)
}
