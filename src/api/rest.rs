//! Axum REST API handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post},
    extract::{multipart::MultipartError, Path, State, Multipart, Query, DefaultBodyLimit},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::{parse_flag, ServerConfig};
use crate::encoding::Rejection;
use crate::service::{ImageService, ServiceError, Upload};
use crate::storage::ImageStore;

use super::dto::*;

type ApiError = (StatusCode, Json<ErrorResponse>);

const DEFAULT_FILENAME: &str = "upload";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Application state shared across handlers
pub struct AppState<S: ImageStore> {
    pub service: Arc<ImageService<S>>,
    pub start_time: Instant,
}

impl<S: ImageStore> AppState<S> {
    pub fn new(service: Arc<ImageService<S>>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}

/// Create the REST API router
pub fn create_rest_router<S: ImageStore>(state: Arc<AppState<S>>, server: &ServerConfig) -> Router {
    let router = Router::new()
        // Image operations
        .route("/images/upload-image/", post(upload_handler::<S>))
        .route("/images/upload-image", post(upload_handler::<S>))
        .route("/images/", get(list_handler::<S>))
        .route("/images", get(list_handler::<S>))
        .route(
            "/images/:image_id",
            get(get_handler::<S>).put(update_handler::<S>).delete(delete_handler::<S>),
        )
        // System endpoints
        .route("/health", get(health_handler::<S>))
        // Middleware
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if server.cors_enabled {
        router.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    } else {
        router
    }
}

fn api_error(status: StatusCode, message: &str, code: &str) -> ApiError {
    (status, Json(ErrorResponse::new(message, code)))
}

fn rejection_code(rejection: &Rejection) -> &'static str {
    match rejection {
        Rejection::TranscodeDisabled => "TOO_LARGE",
        Rejection::StillTooLarge => "STILL_TOO_LARGE",
        Rejection::Unreadable => "UNREADABLE_IMAGE",
    }
}

/// Map a service error on upload/update. Unexpected failures carry their message.
fn write_error(e: ServiceError, code: &str) -> ApiError {
    let message = e.to_string();
    match e {
        ServiceError::Rejected(rejection) => {
            api_error(StatusCode::BAD_REQUEST, &message, rejection_code(&rejection))
        }
        ServiceError::NotFound => api_error(StatusCode::NOT_FOUND, &message, "NOT_FOUND"),
        ServiceError::IncompleteData => {
            api_error(StatusCode::NOT_FOUND, &message, "INCOMPLETE_DATA")
        }
        ServiceError::Unexpected(err) => {
            error!("{} failed: {:#}", code, err);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, &message, code)
        }
    }
}

/// Map a service error on read/list/delete. Unexpected failures get a fixed message.
fn read_error(e: ServiceError, message: &str, code: &str) -> ApiError {
    match e {
        ServiceError::Unexpected(err) => {
            error!("{} failed: {:#}", code, err);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, message, code)
        }
        other => write_error(other, code),
    }
}

/// A body over the upload limit surfaces as a multipart error; keep its 413
fn multipart_error(e: MultipartError, code: &str) -> ApiError {
    let status = e.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "PAYLOAD_TOO_LARGE"
    } else {
        code
    };
    api_error(status, &e.body_text(), code)
}

/// Pull the `file` part and the optional `convert_webp` flag out of the request
async fn read_upload(query: UploadQuery, mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut file: Option<(Vec<u8>, Option<String>, Option<String>)> = None;
    let mut convert_webp = query.convert_webp;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "MULTIPART_ERROR"))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, "READ_ERROR"))?;
                file = Some((bytes.to_vec(), filename, content_type));
            }
            "convert_webp" => {
                let text = field.text().await.map_err(|e| multipart_error(e, "READ_ERROR"))?;
                convert_webp = Some(text);
            }
            _ => {}
        }
    }

    let (bytes, filename, content_type) = file.ok_or_else(|| {
        api_error(StatusCode::BAD_REQUEST, "Missing file field", "MISSING_FILE")
    })?;

    let convert_webp = match convert_webp {
        Some(raw) => parse_flag(&raw).ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                &format!("Invalid convert_webp value: {}", raw),
                "INVALID_FLAG",
            )
        })?,
        None => true,
    };

    Ok(Upload {
        bytes,
        filename: filename
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string()),
        content_type: content_type
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        convert_webp,
    })
}

/// `inline; filename="..."` with characters that cannot appear in a quoted
/// header value replaced
fn content_disposition(filename: &str) -> HeaderValue {
    let safe: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();

    HeaderValue::from_str(&format!("inline; filename=\"{}\"", safe))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"))
}

/// Upload a new image
async fn upload_handler<S: ImageStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let upload = read_upload(query, multipart).await?;

    let result = state
        .service
        .create(upload)
        .await
        .map_err(|e| write_error(e, "UPLOAD_FAILED"))?;

    Ok(Json(UploadResponse {
        id: result.id,
        filename: result.filename,
        size_b64: result.size_b64,
    }))
}

/// List image metadata
async fn list_handler<S: ImageStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ImageSummaryDto>>, ApiError> {
    let images = state
        .service
        .list()
        .await
        .map_err(|e| read_error(e, "Could not list images", "LIST_FAILED"))?;

    Ok(Json(
        images
            .into_iter()
            .map(|i| ImageSummaryDto {
                id: i.id,
                filename: i.filename,
                content_type: i.content_type,
                size_b64: i.size_b64,
            })
            .collect(),
    ))
}

/// Download the raw image
async fn get_handler<S: ImageStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(image_id): Path<String>,
) -> Result<Response, ApiError> {
    let content = state
        .service
        .get(&image_id)
        .await
        .map_err(|e| read_error(e, "Could not retrieve image", "GET_FAILED"))?;

    let content_type = HeaderValue::from_str(&content.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, content_disposition(&content.filename)),
        ],
        content.bytes,
    )
        .into_response())
}

/// Replace an existing image
async fn update_handler<S: ImageStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(image_id): Path<String>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    // A missing record wins over a malformed body
    state
        .service
        .ensure_exists(&image_id)
        .await
        .map_err(|e| write_error(e, "UPDATE_FAILED"))?;

    let upload = read_upload(query, multipart).await?;

    let result = state
        .service
        .update(&image_id, upload)
        .await
        .map_err(|e| write_error(e, "UPDATE_FAILED"))?;

    Ok(Json(UploadResponse {
        id: result.id,
        filename: result.filename,
        size_b64: result.size_b64,
    }))
}

/// Delete an image
async fn delete_handler<S: ImageStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(image_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let result = state
        .service
        .delete(&image_id)
        .await
        .map_err(|e| read_error(e, "Could not delete image", "DELETE_FAILED"))?;

    Ok(Json(DeleteResponse {
        id: result.id,
        deleted: result.deleted,
    }))
}

/// Health check
async fn health_handler<S: ImageStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    let health = state.service.health();

    Json(HealthResponse {
        healthy: health.healthy,
        version: health.version,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
