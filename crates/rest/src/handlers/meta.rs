//! Table metadata.
//!
//! - `GET /meta` - every governed table with its API columns
//! - `GET /jsmodel/{table}` - the column model of one table

use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::{Value, json};
use tabula_persistence::schema::{ColumnDefinition, RelationKind, TableDefinition};

use crate::error::RestResult;
use crate::state::{AppState, StorageBackend};

/// `GET /meta`
pub async fn meta_handler<S>(State(state): State<AppState<S>>) -> Json<Value>
where
    S: StorageBackend,
{
    let tables: Vec<Value> = state
        .registry()
        .tables()
        .iter()
        .map(|table| {
            json!({
                "table_name": table.table_name,
                "is_join_table": table.is_join_table,
                "columns": table.api_columns().map(column_model).collect::<Vec<_>>(),
            })
        })
        .collect();
    Json(json!({ "data": tables }))
}

/// `GET /jsmodel/{table}`
pub async fn jsmodel_handler<S>(
    State(state): State<AppState<S>>,
    Path(table): Path<String>,
) -> RestResult<Json<Value>>
where
    S: StorageBackend,
{
    let definition = state.table(&table)?;
    Ok(Json(table_model(definition)))
}

fn table_model(table: &TableDefinition) -> Value {
    let relations: Vec<Value> = table
        .relations
        .iter()
        .map(|r| {
            json!({
                "subject": r.subject,
                "relation": r.relation,
                "object": r.object,
                "object_name": r.object_name,
            })
        })
        .collect();

    json!({
        "table_name": table.table_name,
        "columns": table.api_columns().map(column_model).collect::<Vec<_>>(),
        "relations": relations,
        "default_permission": table.default_permission.to_i64(),
        "default_groups": table.default_groups,
        "relation_kind": relation_kind_name(&table.relation_kind),
    })
}

fn column_model(column: &ColumnDefinition) -> Value {
    json!({
        "name": column.name,
        "column_name": column.column_name,
        "column_type": column.column_type,
        "is_nullable": column.is_nullable,
        "is_unique": column.is_unique,
        "default_value": column.default_value,
        "options": column.options,
        "foreign_key": column.foreign_key,
    })
}

fn relation_kind_name(kind: &RelationKind) -> &'static str {
    match kind {
        RelationKind::Direct => "direct",
        RelationKind::BelongsToGroup => "belongs_to_group",
        RelationKind::JoinRow { .. } => "join_row",
        RelationKind::GroupObject => "group_object",
    }
}
