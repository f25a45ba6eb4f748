//! Delete handler.
//!
//! `DELETE /api/{table}/{reference_id}`

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
};
use tracing::{debug, info};

use crate::error::{RestError, RestResult};
use crate::extractors::CurrentActor;
use crate::middleware::object_access::AccessInterceptor;
use crate::state::{AppState, StorageBackend};

/// Deletes one row and its group memberships.
///
/// # Response
///
/// - `204 No Content` - Row deleted
/// - `401 Unauthorized` / `403 Forbidden` - Actor may not delete the row
/// - `404 Not Found` - Unknown table or row
pub async fn delete_handler<S>(
    State(state): State<AppState<S>>,
    Path((table, reference_id)): Path<(String, String)>,
    CurrentActor(actor): CurrentActor,
) -> RestResult<StatusCode>
where
    S: StorageBackend,
{
    debug!(table = %table, reference_id = %reference_id, "Processing delete request");

    let definition = state.table(&table)?;
    let existing = state.storage().get(definition, &reference_id).await?;

    let allowed = {
        let mut interceptor = AccessInterceptor::new(state.resolver(), &actor);
        !interceptor
            .intercept_before(&Method::DELETE, vec![existing])
            .is_empty()
    };
    if !allowed {
        return Err(RestError::denied(actor.is_guest(), &table, &reference_id));
    }

    state.storage().delete(definition, &reference_id).await?;
    info!(table = %table, reference_id = %reference_id, actor = %actor.reference_id, "Row deleted");

    Ok(StatusCode::NO_CONTENT)
}
