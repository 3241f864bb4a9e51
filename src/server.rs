//! HTTP front end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/convert` | Download a URL and return `{mime_type, markdown}` |
//! | `GET`  | `/health` | Liveness check, no downstream calls |
//!
//! # Error Contract
//!
//! Every error response carries a JSON body with a single `detail` string:
//!
//! ```json
//! { "detail": "download failed: status 404" }
//! ```
//!
//! Status codes: `400` invalid body/URL, disallowed extension, non-200
//! upstream; `413` payload over the size limit; `500` conversion failure or
//! internal error; `502` upstream unreachable. A panic inside a handler is
//! caught and reported as `500 {"detail": "internal error"}`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::ConvertError;
use crate::models::{ConversionRequest, ConversionResult, ErrorBody, HealthResponse};
use crate::pipeline::ConversionService;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    service: ConversionService,
}

/// Builds the router with all routes and layers. Used by [`run_server`] and
/// by tests that bind their own listener.
pub fn build_router(service: ConversionService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    Router::new()
        .route("/convert", post(handle_convert))
        .route("/health", get(handle_health))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { service })
}

/// Starts the HTTP server on `[server].bind` and runs until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = ConversionService::new(config.download.clone())?;
    let app = build_router(service);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(
        bind = %config.server.bind,
        max_file_size_bytes = config.download.max_file_size_bytes,
        chunk_size_bytes = config.download.chunk_size_bytes,
        temp_dir = %config.download.temp_dir.display(),
        "fetch2md listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

/// Error that renders as `{"detail": ...}` with the matching status code.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    detail: String,
}

impl From<ConvertError> for AppError {
    fn from(err: ConvertError) -> Self {
        AppError {
            status: StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            detail: err.detail(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = message, "handler panicked");
    AppError::from(ConvertError::Internal(message.to_string())).into_response()
}

/// JSON body extractor whose rejection uses the `detail` error contract
/// (400) instead of axum's plain-text 415/422 responses.
struct JsonBody<T>(T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(inner)) => Ok(JsonBody(inner)),
            Err(rejection) => {
                debug!(error = %rejection.body_text(), "rejected request body");
                Err(ConvertError::InvalidRequest(rejection.body_text()).into())
            }
        }
    }
}

// ============ POST /convert ============

/// Handler for `POST /convert`.
///
/// Dropping this future (client disconnect) drops the in-flight download
/// and its temporary file with it.
async fn handle_convert(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ConversionRequest>,
) -> Result<Json<ConversionResult>, AppError> {
    let result = state.service.convert_url(&req.url).await?;
    Ok(Json(result))
}

// ============ GET /health ============

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
