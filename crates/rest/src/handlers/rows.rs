//! Shared steps of the row handlers.

use axum::http::Method;
use serde::Deserialize;
use serde_json::{Map, Value};
use tabula_persistence::core::Row;

use crate::middleware::object_access::AccessInterceptor;
use crate::responses::RowPresenter;
use crate::state::{AppState, StorageBackend};

/// Request body of create and update: `{"data": {"column": value, ...}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RowPayload {
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Runs the after phase over `rows` and the rows their foreign keys include,
/// then presents what survived.
///
/// Included rows are gathered from the rows that passed the check only.
pub(crate) fn present_filtered<S: StorageBackend>(
    state: &AppState<S>,
    interceptor: &mut AccessInterceptor<'_>,
    method: &Method,
    rows: Vec<Row>,
) -> (Vec<Value>, Vec<Value>) {
    let rows = interceptor.intercept_after(method, rows);

    let mut presenter = RowPresenter::new(state.registry(), state.storage());
    let included = presenter.included(&rows);
    let included = interceptor.intercept_after(method, included);

    let data = rows.iter().map(|r| presenter.present(r)).collect();
    let included = included.iter().map(|r| presenter.present(r)).collect();
    (data, included)
}
