//! Liveness endpoints.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tabula_persistence::schema::tables;
use tracing::{debug, warn};

use crate::error::RestResult;
use crate::state::{AppState, StorageBackend};

/// `GET /ping`
pub async fn ping_handler() -> &'static str {
    "pong"
}

/// Handler for the health check endpoint.
///
/// Verifies the database answers before reporting healthy.
///
/// # HTTP Request
///
/// `GET /health`
///
/// # Response
///
/// - `200 OK` - Server is healthy
/// - `503 Service Unavailable` - The database did not answer
pub async fn health_handler<S>(State(state): State<AppState<S>>) -> RestResult<Response>
where
    S: StorageBackend,
{
    debug!("Processing health check request");

    let backend_name = state.storage().backend_name();
    let usergroup = state.table(tables::USERGROUP)?;
    let (status, label) = match state.storage().count(usergroup).await {
        Ok(_) => (StatusCode::OK, "healthy"),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };

    let body = serde_json::json!({
        "status": label,
        "backend": backend_name,
        "tables": state.registry().len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    Ok((status, Json(body)).into_response())
}
