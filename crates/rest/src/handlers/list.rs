//! List handler.
//!
//! `GET /api/{table}?page=&size=`

use axum::{
    Json,
    extract::{Path, State},
    http::Method,
};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::RestResult;
use crate::extractors::{CurrentActor, Pagination};
use crate::middleware::object_access::AccessInterceptor;
use crate::responses::ResponseDocument;
use crate::state::{AppState, StorageBackend};

use super::rows::present_filtered;

/// Lists one page of a table.
///
/// Rows the actor may not peek at are dropped before presentation, rows it
/// may not read afterwards. A page can therefore hold fewer rows than
/// requested; denial never fails the request.
///
/// # Response
///
/// - `200 OK` - `{"data": [...], "included": [...], "meta": {"page", "size"}}`
/// - `404 Not Found` - Unknown table
pub async fn list_handler<S>(
    State(state): State<AppState<S>>,
    Path(table): Path<String>,
    CurrentActor(actor): CurrentActor,
    pagination: Pagination,
) -> RestResult<Json<Value>>
where
    S: StorageBackend,
{
    let definition = state.table(&table)?;
    let query = pagination.list_query(state.config());
    debug!(table = %table, page = query.page, size = query.size, "Processing list request");

    let rows = state.storage().list(definition, query).await?;
    let fetched = rows.len();

    let mut interceptor = AccessInterceptor::new(state.resolver(), &actor);
    let rows = interceptor.intercept_before(&Method::GET, rows);
    let (data, included) = present_filtered(&state, &mut interceptor, &Method::GET, rows);

    debug!(table = %table, fetched, returned = data.len(), "Listed rows");

    let document = ResponseDocument::list(data)
        .with_included(included)
        .with_meta(json!({"page": query.page, "size": query.size}));
    Ok(Json(document.build()))
}
