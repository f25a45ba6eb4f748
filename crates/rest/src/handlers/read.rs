//! Read handler.
//!
//! `GET /api/{table}/{reference_id}`

use axum::{
    Json,
    extract::{Path, State},
    http::Method,
};
use serde_json::Value;
use tracing::debug;

use crate::error::{RestError, RestResult};
use crate::extractors::CurrentActor;
use crate::middleware::object_access::AccessInterceptor;
use crate::responses::ResponseDocument;
use crate::state::{AppState, StorageBackend};

use super::rows::present_filtered;

/// Reads one row together with the rows its foreign keys point at.
///
/// # Response
///
/// - `200 OK` - `{"data": {...}, "included": [...]}`
/// - `401 Unauthorized` - Guest without access
/// - `403 Forbidden` - Authenticated actor without access
/// - `404 Not Found` - Unknown table or row
pub async fn read_handler<S>(
    State(state): State<AppState<S>>,
    Path((table, reference_id)): Path<(String, String)>,
    CurrentActor(actor): CurrentActor,
) -> RestResult<Json<Value>>
where
    S: StorageBackend,
{
    debug!(table = %table, reference_id = %reference_id, "Processing read request");

    let definition = state.table(&table)?;
    let row = state.storage().get(definition, &reference_id).await?;

    let mut interceptor = AccessInterceptor::new(state.resolver(), &actor);
    let rows = interceptor.intercept_before(&Method::GET, vec![row]);
    let (mut data, included) = present_filtered(&state, &mut interceptor, &Method::GET, rows);

    let Some(data) = data.pop() else {
        return Err(RestError::denied(actor.is_guest(), &table, &reference_id));
    };
    Ok(Json(
        ResponseDocument::single(Some(data))
            .with_included(included)
            .build(),
    ))
}
