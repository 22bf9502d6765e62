//! HTTP surface: wire types, request validation, handlers and the router.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, ConnectInfo, DefaultBodyLimit, Multipart, Request, State},
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::{debug, error, info, Level};

use crate::analyzer::Analyzer;
use crate::config::{check_origin, Config, ServerConfig};
use crate::error::Result;
use crate::extractor::extract_errors;
use crate::rate_limiter::{self, RateLimiter};
use crate::response::AnalysisResult;
use crate::upload;

/// Multipart field carrying the uploaded log file
pub const UPLOAD_FIELD: &str = "logfile";

/// Body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// What went wrong
    pub message: String,
}

/// Successful upload response
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Status message
    pub message: String,
    /// Extracted error messages in document order
    pub errors: Vec<String>,
}

/// Request body of `/api/process_errors`
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessErrorsRequest {
    /// Error messages to analyze
    pub errors: Vec<String>,
}

/// Successful analysis response
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessErrorsResponse {
    /// Status message
    pub message: String,
    /// One result per input message, in input order
    pub errors: Vec<AnalysisResult>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current status
    pub status: String,
}

/// Request failures reported to the client as `{ "message": ... }`
#[derive(Debug)]
pub enum ApiError {
    /// Invalid input (400)
    BadRequest(String),
    /// Client exceeded a rate limit (429)
    TooManyRequests(String),
    /// Server-side failure (500)
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::BadRequest(message) | Self::TooManyRequests(message) | Self::Internal(message) => message,
        };
        (status, Json(MessageResponse { message })).into_response()
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Service configuration
    pub config: Arc<Config>,
    /// Per-error analyzer
    pub analyzer: Arc<Analyzer>,
    /// Per-client request limits
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Creates the state, deriving the rate limiter from the configuration
    pub fn new(config: Config, analyzer: Analyzer) -> Self {
        let rate_limiter = RateLimiter::from_config(&config.rate_limits);
        Self {
            config: Arc::new(config),
            analyzer: Arc::new(analyzer),
            rate_limiter: Arc::new(rate_limiter),
        }
    }
}

/// Create the main application with all routes
pub fn create_app(state: AppState) -> Result<Router> {
    let server = &state.config.server;

    let api = Router::new()
        .route("/upload", post(upload_file))
        .route("/process_errors", post(process_errors))
        .layer(middleware::from_fn_with_state(state.clone(), enforce_rate_limits))
        .layer(cors_layer(server)?)
        .layer(DefaultBodyLimit::max(server.max_upload_bytes));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api);

    if let Some(frontend_dir) = &server.frontend_dir {
        app = app.nest_service("/frontend", ServeDir::new(frontend_dir));
    }

    Ok(app
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .with_state(state))
}

fn cors_layer(server: &ServerConfig) -> Result<CorsLayer> {
    let allow_origin = if server.allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let origins = server.allowed_origins
            .iter()
            .map(|origin| check_origin(origin))
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]))
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Internal server error: {}", detail);
    ApiError::Internal("Internal server error".to_string()).into_response()
}

async fn enforce_rate_limits(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.config.rate_limits.enabled {
        return next.run(request).await;
    }

    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let path = request.uri().path();
    let mut buckets = vec![rate_limiter::HOURLY, rate_limiter::DAILY];
    if path.ends_with("/upload") {
        buckets.push(rate_limiter::UPLOAD);
    } else if path.ends_with("/process_errors") {
        buckets.push(rate_limiter::PROCESS_ERRORS);
    }

    if state.rate_limiter.try_acquire(&buckets, &client).await {
        next.run(request).await
    } else {
        ApiError::TooManyRequests("Rate limit exceeded, please try again later".to_string()).into_response()
    }
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "healthy".to_string(),
    })
}

/// Accepts a log file upload and returns the extracted error messages
async fn upload_file(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        error!("No file part in request: {}", e);
        ApiError::BadRequest("No file part".to_string())
    })?;

    let (original_name, contents) = loop {
        let field = multipart.next_field().await.map_err(|e| {
            error!("Failed to read multipart body: {}", e);
            ApiError::BadRequest(format!("Malformed multipart body: {}", e))
        })?;
        let Some(field) = field else {
            error!("No file part in request");
            return Err(ApiError::BadRequest("No file part".to_string()));
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            error!("Field {} is not a file", UPLOAD_FIELD);
            return Err(ApiError::BadRequest("No file part".to_string()));
        };
        let contents = field.bytes().await.map_err(|e| {
            error!("Failed to read uploaded file {}: {}", file_name, e);
            ApiError::BadRequest(format!("Malformed multipart body: {}", e))
        })?;
        break (file_name, contents);
    };

    if original_name.is_empty() {
        error!("No file selected");
        return Err(ApiError::BadRequest("No selected file".to_string()));
    }
    if !upload::has_allowed_extension(&original_name) {
        error!("Invalid file type: {}", original_name);
        return Err(ApiError::BadRequest("Invalid file type".to_string()));
    }
    let filename = upload::sanitize_filename(&original_name);
    if !upload::has_allowed_extension(&filename) {
        error!("Filename {:?} is unusable after sanitizing: {:?}", original_name, filename);
        return Err(ApiError::BadRequest("Invalid file name".to_string()));
    }

    let path = upload::save_upload(&state.config.upload_dir, &filename, &contents)
        .await
        .map_err(|e| {
            error!("Failed to save file {}: {}", filename, e);
            ApiError::Internal(format!("Failed to save file: {}", e))
        })?;

    let log_content = upload::read_upload(&path).await.map_err(|e| {
        error!("Failed to read file {}: {}", filename, e);
        ApiError::Internal(format!("Failed to read file: {}", e))
    })?;

    let errors = extract_errors(&log_content);
    info!("Found {} errors in log file", errors.len());
    debug!("Extracted errors: {:?}", errors);

    Ok(Json(UploadResponse {
        message: "Errors extracted, ready for processing".to_string(),
        errors,
    }))
}

/// Checks that `payload` is `{ "errors": [string, ...] }` with at least one entry
pub fn validate_error_list(payload: &Value) -> std::result::Result<Vec<String>, ApiError> {
    if payload.get("errors").is_none() {
        error!("No errors provided in request");
        return Err(ApiError::BadRequest("No errors provided".to_string()));
    }

    match serde_json::from_value::<ProcessErrorsRequest>(payload.clone()) {
        Ok(request) if !request.errors.is_empty() => Ok(request.errors),
        _ => {
            error!("Invalid error list format");
            Err(ApiError::BadRequest("Invalid error list format".to_string()))
        }
    }
}

/// Analyzes each submitted error message in order
async fn process_errors(
    State(state): State<AppState>,
    body: Bytes,
) -> std::result::Result<Json<ProcessErrorsResponse>, ApiError> {
    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        error!("Request body is not JSON: {}", e);
        ApiError::BadRequest(format!("Invalid JSON body: {}", e))
    })?;
    let error_messages = validate_error_list(&payload)?;

    // The batch runs to completion even if the client goes away.
    let analyzer = Arc::clone(&state.analyzer);
    let results = tokio::spawn(async move { analyzer.analyze_all(&error_messages).await })
        .await
        .map_err(|e| {
            error!("Failed to process errors: {}", e);
            ApiError::Internal(format!("Failed to process errors: {}", e))
        })?;

    info!("Processed {} errors with Gemini API", results.len());
    debug!("Response: {:?}", results);

    Ok(Json(ProcessErrorsResponse {
        message: "Error analysis complete".to_string(),
        errors: results,
    }))
}
