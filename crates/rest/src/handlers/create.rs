//! Create handler.
//!
//! `POST /api/{table}`

use axum::{
    Json,
    extract::{Path, State},
    http::{Method, StatusCode},
};
use serde_json::{Map, Value};
use tabula_persistence::core::ObjectStore;
use tabula_persistence::permission::{Actor, Capability, PermissionInstance, PermissionResolver};
use tabula_persistence::schema::{RelationKind, TableDefinition, tables};
use tracing::{debug, info};

use crate::error::{RestError, RestResult};
use crate::extractors::CurrentActor;
use crate::middleware::object_access::AccessInterceptor;
use crate::responses::ResponseDocument;
use crate::state::{AppState, StorageBackend};

use super::rows::{RowPayload, present_filtered};

/// Creates a row owned by the requesting actor.
///
/// Guests cannot create rows. A row of a join table links two existing rows,
/// so the actor must be able to update the parent row, and to update the
/// group when the parent is a user account.
///
/// # Response
///
/// - `201 Created` - `{"data": {...}, "included": [...]}`
/// - `400 Bad Request` - Unknown column or failed validation
/// - `401 Unauthorized` - Guest actor
/// - `403 Forbidden` - Actor may not link the referenced rows
/// - `409 Conflict` - Unique constraint violated
pub async fn create_handler<S>(
    State(state): State<AppState<S>>,
    Path(table): Path<String>,
    CurrentActor(actor): CurrentActor,
    Json(payload): Json<RowPayload>,
) -> RestResult<(StatusCode, Json<Value>)>
where
    S: StorageBackend,
{
    debug!(table = %table, "Processing create request");

    let definition = state.table(&table)?;
    if actor.is_guest() {
        return Err(RestError::Unauthorized {
            message: format!("Authentication required to create {} rows", table),
        });
    }
    authorize_link(state.storage(), &state.resolver(), definition, &actor, &payload.data)?;

    let created = state
        .storage()
        .insert(definition, Some(&actor.reference_id), payload.data)
        .await?;
    info!(
        table = %table,
        reference_id = created.reference_id().unwrap_or_default(),
        actor = %actor.reference_id,
        "Row created"
    );

    let mut interceptor = AccessInterceptor::new(state.resolver(), &actor);
    let (mut data, included) = present_filtered(&state, &mut interceptor, &Method::POST, vec![created]);
    Ok((
        StatusCode::CREATED,
        Json(
            ResponseDocument::single(data.pop())
                .with_included(included)
                .build(),
        ),
    ))
}

/// Checks the rows a new join row would link.
fn authorize_link(
    store: &dyn ObjectStore,
    resolver: &PermissionResolver<'_>,
    definition: &TableDefinition,
    actor: &Actor,
    values: &Map<String, Value>,
) -> RestResult<()> {
    let RelationKind::JoinRow {
        parent_table,
        parent_column,
    } = &definition.relation_kind
    else {
        return Ok(());
    };

    let mut required = vec![(parent_table.as_str(), parent_column.as_str())];
    if parent_table == tables::USER_ACCOUNT {
        if let Some((column, fk)) = definition
            .foreign_key_columns()
            .find(|(_, fk)| fk.namespace == tables::USERGROUP)
        {
            required.push((fk.namespace.as_str(), column.column_name.as_str()));
        }
    }

    for (table, column) in required {
        let instance = values
            .get(column)
            .map(|value| referenced_instance(store, resolver, table, value))
            .unwrap_or_else(PermissionInstance::denied);
        if !instance.allows(actor, Capability::UPDATE) {
            debug!(
                table = %definition.table_name,
                target = %table,
                actor = %actor.reference_id,
                "Link denied"
            );
            return Err(RestError::Forbidden {
                message: format!("Not allowed to link {} rows through {}", table, column),
            });
        }
    }
    Ok(())
}

/// The permission of the row a payload value refers to, by reference id or
/// numeric id.
fn referenced_instance(
    store: &dyn ObjectStore,
    resolver: &PermissionResolver<'_>,
    table: &str,
    value: &Value,
) -> PermissionInstance {
    match value {
        Value::String(reference_id) => resolver.resolve_reference(table, reference_id),
        Value::Number(n) => match n.as_i64().map(|id| store.resolve_by_id(table, id)) {
            Some(Ok(row)) => resolver.resolve_row(&row),
            _ => PermissionInstance::denied(),
        },
        _ => PermissionInstance::denied(),
    }
}
