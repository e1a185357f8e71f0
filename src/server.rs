// HTTP surface: read-only JSON endpoints over the stat store.
//
// Handlers validate nothing themselves beyond extracting parameters; the
// service layer owns validation and the error mapping here owns status
// codes. Storage work runs on the blocking pool under the configured
// timeout so a stalled store turns into a 500 instead of a hung request.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::db::Database;
use crate::normalize::PlayerRecord;
use crate::service::{self, ServiceError};

/// Shared per-request context: the store handle and the storage timeout.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Database>,
    pub request_timeout: Duration,
}

/// The JSON failure body: `{error, message}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// An error ready to leave the service: status code plus failure body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            error,
            message: message.into(),
        }
    }

    fn validation(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::UnknownPosition(e) => ApiError::validation(e.to_string()),
            ServiceError::BadQuery(e) => ApiError::validation(e.to_string()),
            ServiceError::NoMatches => {
                ApiError::not_found("no players matched the requested filter")
            }
            ServiceError::SchemaDrift(e) => {
                // Registry/table drift is a deployment fault, not a caller
                // problem; the detail goes to the log, not the response.
                error!("schema drift detected: {e}");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal consistency fault",
                )
            }
            ServiceError::Storage(e) => {
                error!("storage failure: {e:#}");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "storage backend unavailable",
                )
            }
        }
    }
}

/// Run one synchronous store operation on the blocking pool, bounded by
/// the configured timeout.
async fn run_blocking<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> Result<T, ServiceError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    let work = tokio::task::spawn_blocking(move || op(&store));

    match tokio::time::timeout(state.request_timeout, work).await {
        Ok(Ok(result)) => result.map_err(ApiError::from),
        Ok(Err(join_err)) => {
            error!("storage task failed to complete: {join_err}");
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "request processing failed",
            ))
        }
        Err(_) => Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_timeout",
            "storage backend did not respond in time",
        )),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn players_by_position(
    State(state): State<AppState>,
    Path(position): Path<String>,
) -> Result<Json<Vec<PlayerRecord>>, ApiError> {
    let records = run_blocking(&state, move |store| {
        service::players_by_position(store, &position)
    })
    .await?;
    Ok(Json(records))
}

async fn players_by_team(
    State(state): State<AppState>,
    Path(team_code): Path<String>,
) -> Result<Json<Vec<PlayerRecord>>, ApiError> {
    let records = run_blocking(&state, move |store| {
        service::players_by_team(store, &team_code)
    })
    .await?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    name: Option<String>,
    position: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<PlayerRecord>>, ApiError> {
    let Some(name) = params.name else {
        return Err(ApiError::validation("query parameter `name` is required"));
    };
    let position = params.position;
    let records = run_blocking(&state, move |store| {
        service::search_players(store, &name, position.as_deref())
    })
    .await?;
    Ok(Json(records))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    checked_at: DateTime<Utc>,
}

async fn health(State(state): State<AppState>) -> Response {
    let outcome = run_blocking(&state, |store| service::check_health(store)).await;
    let checked_at = Utc::now();
    match outcome {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                checked_at,
            }),
        )
            .into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthResponse {
                status: "unhealthy",
                checked_at,
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// Router / server
// ---------------------------------------------------------------------------

/// Build the API router. Routes are GET-only, so other methods answer 405.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/players/{position}", get(players_by_position))
        .route("/api/teams/{team_code}/players", get(players_by_team))
        .route("/api/search", get(search))
        .route("/api/health", get(health))
        .with_state(state)
}

/// Bind and run the HTTP server until the process exits.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    let local_addr = listener.local_addr()?;
    info!("HTTP API listening on {local_addr}");

    axum::serve(listener, router(state))
        .await
        .context("HTTP server terminated")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
