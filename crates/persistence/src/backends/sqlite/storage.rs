//! [`RowStorage`] implementation for SQLite.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::{ListQuery, Row, RowStorage};
use crate::error::{LookupError, StorageResult, ValidationError};
use crate::permission::PermissionCode;
use crate::schema::{
    ColumnDefinition, RelationDefinition, TableDefinition, columns, conform, tables, validate,
};

use super::SqliteBackend;
use super::schema::reflect_tables;
use super::sql::{query_rows, quoted, to_sql};
use super::store::{fetch_by_id, fetch_by_reference, id_for_reference};

/// Columns the backend maintains itself. Payload values for them are ignored.
const MANAGED_COLUMNS: [&str; 4] = [
    columns::ID,
    columns::REFERENCE_ID,
    columns::CREATED_AT,
    columns::UPDATED_AT,
];

/// Converts a row count for LIMIT/OFFSET, clamping at the SQLite maximum.
fn sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn invalid(table: &TableDefinition, column: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidField {
        table: table.table_name.clone(),
        column: column.to_string(),
        message: message.into(),
    }
}

/// Turns a foreign-key payload value into the numeric id it refers to.
fn foreign_key_value(
    conn: &Connection,
    table: &TableDefinition,
    column: &ColumnDefinition,
    target: &str,
    value: Value,
) -> StorageResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Number(n) if n.is_i64() => Ok(Value::Number(n)),
        Value::String(reference_id) => match id_for_reference(conn, target, &reference_id)? {
            Some(id) => Ok(Value::from(id)),
            None => Err(invalid(
                table,
                &column.column_name,
                format!("no {} row with reference id {}", target, reference_id),
            )
            .into()),
        },
        _ => Err(invalid(table, &column.column_name, "expected a reference id").into()),
    }
}

/// Applies rules and converts a payload into storable column values.
fn prepare_values(
    conn: &Connection,
    table: &TableDefinition,
    values: Map<String, Value>,
    is_create: bool,
) -> StorageResult<Map<String, Value>> {
    let mut values = values;
    conform(&table.conformations, &mut values);
    validate(&table.table_name, &table.validations, &values, is_create)?;

    let mut prepared = Map::with_capacity(values.len());
    for (name, value) in values {
        if MANAGED_COLUMNS.contains(&name.as_str()) {
            continue;
        }
        let column = match table.column(&name) {
            Some(column) if !column.exclude_from_api => column,
            _ => {
                return Err(ValidationError::UnknownColumn {
                    table: table.table_name.clone(),
                    column: name,
                }
                .into());
            }
        };

        let value = if name == columns::PERMISSION {
            match PermissionCode::from_value(&value) {
                Some(code) => Value::from(code.to_i64()),
                None => return Err(invalid(table, &name, "not a permission code").into()),
            }
        } else if let Some(fk) = &column.foreign_key {
            foreign_key_value(conn, table, column, &fk.namespace, value)?
        } else {
            value
        };
        prepared.insert(name, value);
    }
    Ok(prepared)
}

fn check_required(table: &TableDefinition, values: &Map<String, Value>) -> Result<(), ValidationError> {
    let missing = table.columns.iter().find(|c| {
        !c.is_nullable
            && !c.is_primary_key
            && c.default_value.is_none()
            && !MANAGED_COLUMNS.contains(&c.column_name.as_str())
            && c.column_name != columns::PERMISSION
            && values.get(&c.column_name).is_none_or(Value::is_null)
    });
    match missing {
        Some(column) => Err(invalid(table, &column.column_name, "value is required")),
        None => Ok(()),
    }
}

fn insert_values(conn: &Connection, table: &str, values: &Map<String, Value>) -> StorageResult<i64> {
    let names = values
        .keys()
        .map(|name| quoted(name))
        .collect::<StorageResult<Vec<String>>>()?;
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted(table)?,
        names.join(", "),
        placeholders.join(", ")
    );
    conn.execute(&sql, params_from_iter(values.values().map(to_sql)))?;
    Ok(conn.last_insert_rowid())
}

/// Shares a new row with its table's default groups.
fn link_default_groups(
    conn: &Connection,
    table: &TableDefinition,
    row_id: i64,
) -> StorageResult<()> {
    if table.default_groups.is_empty() || !table.has_many_usergroups() {
        return Ok(());
    }

    let relation =
        RelationDefinition::has_many_and_belongs_to_many(table.table_name.as_str(), tables::USERGROUP);
    let sql = format!(
        "INSERT INTO {} ({}, {}, reference_id, permission, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        quoted(&relation.join_table_name())?,
        quoted(&relation.subject_name)?,
        quoted(&relation.object_name)?,
    );

    for group_name in &table.default_groups {
        let group_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM usergroup WHERE name = ?1 ORDER BY id LIMIT 1",
                [group_name],
                |row| row.get(0),
            )
            .optional()?;

        let Some(group_id) = group_id else {
            warn!(
                table = %table.table_name,
                group = %group_name,
                "Default group does not exist, skipping"
            );
            continue;
        };

        conn.execute(
            &sql,
            params![
                row_id,
                group_id,
                Uuid::new_v4().to_string(),
                PermissionCode::DEFAULT_ROW.to_i64(),
                now()
            ],
        )?;
    }
    Ok(())
}

/// Removes every join row pointing at the deleted row.
fn unlink_memberships(conn: &Connection, table: &TableDefinition, row_id: i64) -> StorageResult<()> {
    for join in reflect_tables(conn)?.iter().filter(|t| t.is_join_table) {
        for (column, fk) in join.foreign_key_columns() {
            if fk.namespace != table.table_name {
                continue;
            }
            let sql = format!(
                "DELETE FROM {} WHERE {} = ?1",
                quoted(&join.table_name)?,
                quoted(&column.column_name)?
            );
            let removed = conn.execute(&sql, [row_id])?;
            if removed > 0 {
                debug!(join = %join.table_name, removed, "Removed memberships");
            }
        }
    }
    Ok(())
}

#[async_trait]
impl RowStorage for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn list(&self, table: &TableDefinition, query: ListQuery) -> StorageResult<Vec<Row>> {
        let conn = self.get_connection()?;
        let sql = format!(
            "SELECT * FROM {} ORDER BY id LIMIT ?1 OFFSET ?2",
            quoted(&table.table_name)?
        );
        query_rows(
            &conn,
            &table.table_name,
            &sql,
            params![sql_count(query.size), sql_count(query.offset())],
        )
    }

    async fn list_all(&self, table: &TableDefinition) -> StorageResult<Vec<Row>> {
        let conn = self.get_connection()?;
        let sql = format!("SELECT * FROM {} ORDER BY id", quoted(&table.table_name)?);
        query_rows(&conn, &table.table_name, &sql, [])
    }

    async fn count(&self, table: &TableDefinition) -> StorageResult<u64> {
        let conn = self.get_connection()?;
        let sql = format!("SELECT COUNT(*) FROM {}", quoted(&table.table_name)?);
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    async fn get(&self, table: &TableDefinition, reference_id: &str) -> StorageResult<Row> {
        let conn = self.get_connection()?;
        fetch_by_reference(&conn, &table.table_name, reference_id)
    }

    async fn insert(
        &self,
        table: &TableDefinition,
        owner_reference_id: Option<&str>,
        values: Map<String, Value>,
    ) -> StorageResult<Row> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;

        let mut values = prepare_values(&tx, table, values, true)?;

        let owner_id = match owner_reference_id.filter(|o| !o.is_empty()) {
            Some(owner) if table.has_column(columns::OWNER) => {
                id_for_reference(&tx, tables::USER_ACCOUNT, owner)?
            }
            _ => None,
        };
        if let Some(owner_id) = owner_id {
            if values.get(columns::OWNER).is_none_or(Value::is_null) {
                values.insert(columns::OWNER.to_string(), Value::from(owner_id));
            }
        }

        if !values.contains_key(columns::PERMISSION) {
            values.insert(
                columns::PERMISSION.to_string(),
                Value::from(table.default_permission.to_i64()),
            );
        }
        check_required(table, &values)?;

        let reference_id = Uuid::new_v4().to_string();
        let timestamp = now();
        values.insert(columns::REFERENCE_ID.to_string(), Value::String(reference_id.clone()));
        values.insert(columns::CREATED_AT.to_string(), Value::String(timestamp.clone()));
        values.insert(columns::UPDATED_AT.to_string(), Value::String(timestamp));

        let row_id = insert_values(&tx, &table.table_name, &values)?;
        link_default_groups(&tx, table, row_id)?;
        let row = fetch_by_id(&tx, &table.table_name, row_id)?;
        tx.commit()?;

        debug!(table = %table.table_name, reference_id = %reference_id, "Inserted row");
        Ok(row)
    }

    async fn update(
        &self,
        table: &TableDefinition,
        reference_id: &str,
        values: Map<String, Value>,
    ) -> StorageResult<Row> {
        let conn = self.get_connection()?;
        let mut values = prepare_values(&conn, table, values, false)?;
        values.insert(columns::UPDATED_AT.to_string(), Value::String(now()));

        let assignments = values
            .keys()
            .enumerate()
            .map(|(i, name)| -> StorageResult<String> {
                Ok(format!("{} = ?{}", quoted(name)?, i + 1))
            })
            .collect::<StorageResult<Vec<String>>>()?;
        let sql = format!(
            "UPDATE {} SET {} WHERE reference_id = ?{}",
            quoted(&table.table_name)?,
            assignments.join(", "),
            values.len() + 1
        );

        let mut bound: Vec<SqlValue> = values.values().map(to_sql).collect();
        bound.push(SqlValue::Text(reference_id.to_string()));
        let changed = conn.execute(&sql, params_from_iter(bound))?;
        if changed == 0 {
            return Err(LookupError::NotFound {
                table: table.table_name.clone(),
                reference_id: reference_id.to_string(),
            }
            .into());
        }

        debug!(table = %table.table_name, reference_id = %reference_id, "Updated row");
        fetch_by_reference(&conn, &table.table_name, reference_id)
    }

    async fn delete(&self, table: &TableDefinition, reference_id: &str) -> StorageResult<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;

        let Some(row_id) = id_for_reference(&tx, &table.table_name, reference_id)? else {
            return Err(LookupError::NotFound {
                table: table.table_name.clone(),
                reference_id: reference_id.to_string(),
            }
            .into());
        };

        unlink_memberships(&tx, table, row_id)?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", quoted(&table.table_name)?);
        tx.execute(&sql, [row_id])?;
        tx.commit()?;

        debug!(table = %table.table_name, reference_id = %reference_id, "Deleted row");
        Ok(())
    }
}
