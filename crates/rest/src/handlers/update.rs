//! Update handler.
//!
//! `PATCH /api/{table}/{reference_id}` and `PUT /api/{table}/{reference_id}`

use axum::{
    Json,
    extract::{Path, State},
    http::Method,
};
use serde_json::Value;
use tabula_persistence::schema::columns;
use tracing::{debug, info, warn};

use crate::error::{RestError, RestResult};
use crate::extractors::CurrentActor;
use crate::middleware::object_access::AccessInterceptor;
use crate::responses::ResponseDocument;
use crate::state::{AppState, StorageBackend};

use super::rows::{RowPayload, present_filtered};

/// Columns only the row's owner may change.
const OWNERSHIP_COLUMNS: [&str; 2] = [columns::OWNER, columns::PERMISSION];

/// Updates the given columns of one row.
///
/// PUT and PATCH behave the same: columns absent from the payload keep their
/// values. The stored row is answered if the actor may peek at it. Changing
/// the owner or the permission of a row additionally requires owning it.
///
/// # Response
///
/// - `200 OK` - `{"data": {...}, "included": [...]}`
/// - `400 Bad Request` - Unknown column or failed validation
/// - `401 Unauthorized` / `403 Forbidden` - Actor may not update the row
/// - `404 Not Found` - Unknown table or row
pub async fn update_handler<S>(
    State(state): State<AppState<S>>,
    Path((table, reference_id)): Path<(String, String)>,
    method: Method,
    CurrentActor(actor): CurrentActor,
    Json(payload): Json<RowPayload>,
) -> RestResult<Json<Value>>
where
    S: StorageBackend,
{
    debug!(table = %table, reference_id = %reference_id, method = %method, "Processing update request");

    let definition = state.table(&table)?;
    let existing = state.storage().get(definition, &reference_id).await?;

    if OWNERSHIP_COLUMNS.iter().any(|c| payload.data.contains_key(*c))
        && !state.resolver().resolve_row(&existing).is_owned_by(&actor)
    {
        warn!(
            table = %table,
            reference_id = %reference_id,
            actor = %actor.reference_id,
            "Ownership change by non-owner rejected"
        );
        return Err(RestError::denied(actor.is_guest(), &table, &reference_id));
    }

    let mut interceptor = AccessInterceptor::new(state.resolver(), &actor);
    if interceptor.intercept_before(&method, vec![existing]).is_empty() {
        return Err(RestError::denied(actor.is_guest(), &table, &reference_id));
    }

    let updated = state
        .storage()
        .update(definition, &reference_id, payload.data)
        .await?;
    info!(table = %table, reference_id = %reference_id, actor = %actor.reference_id, "Row updated");

    let (mut data, included) = present_filtered(&state, &mut interceptor, &method, vec![updated]);
    Ok(Json(
        ResponseDocument::single(data.pop())
            .with_included(included)
            .build(),
    ))
}
