//! SQLite schema reconciliation.
//!
//! Governed tables are created and extended from their
//! [`TableDefinition`]s. Existing columns are never dropped, renamed or
//! retyped: SQLite cannot alter a column in place, and rows must survive every
//! configuration change.

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::{debug, info, warn};

use crate::error::{BackendError, SchemaError, StorageError, StorageResult};
use crate::schema::{ColumnDefinition, TableDefinition, columns};

use super::sql::{check_identifier, literal, quoted};

/// Name of the table holding one definition per governed table.
pub const WORLD_TABLE: &str = "world";

/// Create the `world` table.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS world (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            table_name TEXT NOT NULL UNIQUE,
            definition TEXT NOT NULL,
            created_at TEXT,
            updated_at TEXT
        )",
    )
    .map_err(|e| migration_error(format!("Failed to create world table: {}", e)))?;
    Ok(())
}

/// Read every recorded definition back.
pub fn reflect_tables(conn: &Connection) -> StorageResult<Vec<TableDefinition>> {
    let mut stmt = conn.prepare("SELECT table_name, definition FROM world ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<(String, String)>>>()?;

    let mut tables = Vec::with_capacity(rows.len());
    for (table_name, definition) in rows {
        let table: TableDefinition = serde_json::from_str(&definition).map_err(|e| {
            StorageError::Schema(SchemaError::Conflict {
                table: table_name.clone(),
                message: format!("stored definition is unreadable: {}", e),
            })
        })?;
        tables.push(table);
    }

    debug!(tables = tables.len(), "Reflected stored tables");
    Ok(tables)
}

/// Bring the database in line with `tables` in one transaction.
pub fn apply_schema(conn: &mut Connection, tables: &[TableDefinition]) -> StorageResult<()> {
    for table in tables {
        check_table_identifiers(table)?;
    }

    let tx = conn.transaction()?;
    let mut created = 0usize;
    let mut added = 0usize;

    for table in tables {
        if create_table(&tx, table)? {
            created += 1;
        } else {
            added += add_missing_columns(&tx, table)?;
        }
    }
    for table in tables {
        create_indexes(&tx, table)?;
        record_definition(&tx, table)?;
    }

    tx.commit()
        .map_err(|e| migration_error(format!("Failed to commit schema changes: {}", e)))?;

    info!(
        tables = tables.len(),
        created,
        columns_added = added,
        "Schema reconciled"
    );
    Ok(())
}

fn check_table_identifiers(table: &TableDefinition) -> Result<(), SchemaError> {
    check_identifier(&table.table_name)?;
    let mut seen = HashSet::new();
    for column in &table.columns {
        check_identifier(&column.column_name)?;
        if !seen.insert(column.column_name.as_str()) {
            return Err(SchemaError::Conflict {
                table: table.table_name.clone(),
                message: format!("column {} is defined twice", column.column_name),
            });
        }
    }
    if !table.has_column(columns::ID) || !table.has_column(columns::REFERENCE_ID) {
        return Err(SchemaError::Conflict {
            table: table.table_name.clone(),
            message: "table is missing its standard columns".to_string(),
        });
    }
    Ok(())
}

fn table_exists(tx: &Transaction<'_>, table: &str) -> StorageResult<bool> {
    let found = tx
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn column_sql(column: &ColumnDefinition, for_alter: bool) -> StorageResult<String> {
    let mut sql = format!("{} {}", quoted(&column.column_name)?, column.sql_type());

    if column.is_primary_key {
        sql.push_str(" PRIMARY KEY AUTOINCREMENT");
        return Ok(sql);
    }

    // SQLite only adds a NOT NULL column if it also has a default.
    let not_null = !column.is_nullable && (!for_alter || column.default_value.is_some());
    if not_null {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default_value {
        sql.push_str(" DEFAULT ");
        sql.push_str(&literal(default));
    }
    Ok(sql)
}

/// Returns true if the table was created.
fn create_table(tx: &Transaction<'_>, table: &TableDefinition) -> StorageResult<bool> {
    if table_exists(tx, &table.table_name)? {
        return Ok(false);
    }

    let column_defs = table
        .columns
        .iter()
        .map(|c| column_sql(c, false))
        .collect::<StorageResult<Vec<String>>>()?;
    let sql = format!(
        "CREATE TABLE {} ({})",
        quoted(&table.table_name)?,
        column_defs.join(", ")
    );

    tx.execute_batch(&sql).map_err(|e| {
        migration_error(format!("Failed to create table {}: {}", table.table_name, e))
    })?;
    debug!(table = %table.table_name, columns = table.columns.len(), "Created table");
    Ok(true)
}

fn existing_columns(tx: &Transaction<'_>, table: &str) -> StorageResult<HashSet<String>> {
    let mut stmt = tx.prepare(&format!("PRAGMA table_info({})", quoted(table)?))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<HashSet<String>>>()?;
    Ok(names)
}

fn add_missing_columns(tx: &Transaction<'_>, table: &TableDefinition) -> StorageResult<usize> {
    let existing = existing_columns(tx, &table.table_name)?;
    let mut added = 0;

    for column in &table.columns {
        if existing.contains(&column.column_name) {
            continue;
        }
        if column.is_primary_key {
            return Err(StorageError::Schema(SchemaError::Conflict {
                table: table.table_name.clone(),
                message: format!("cannot add primary key column {}", column.column_name),
            }));
        }
        if !column.is_nullable && column.default_value.is_none() {
            warn!(
                table = %table.table_name,
                column = %column.column_name,
                "Adding required column without a default as nullable"
            );
        }

        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quoted(&table.table_name)?,
            column_sql(column, true)?
        );
        tx.execute_batch(&sql).map_err(|e| {
            migration_error(format!(
                "Failed to add column {}.{}: {}",
                table.table_name, column.column_name, e
            ))
        })?;
        debug!(table = %table.table_name, column = %column.column_name, "Added column");
        added += 1;
    }

    Ok(added)
}

fn create_indexes(tx: &Transaction<'_>, table: &TableDefinition) -> StorageResult<()> {
    for column in table.columns.iter().filter(|c| !c.is_primary_key) {
        let (kind, prefix) = if column.is_unique {
            ("UNIQUE INDEX", "uq")
        } else if column.is_indexed {
            ("INDEX", "idx")
        } else {
            continue;
        };

        let index_name = format!("{}_{}_{}", prefix, table.table_name, column.column_name);
        let sql = format!(
            "CREATE {} IF NOT EXISTS \"{}\" ON {} ({})",
            kind,
            index_name,
            quoted(&table.table_name)?,
            quoted(&column.column_name)?
        );
        tx.execute_batch(&sql).map_err(|e| {
            migration_error(format!("Failed to create index {}: {}", index_name, e))
        })?;
    }
    Ok(())
}

fn record_definition(tx: &Transaction<'_>, table: &TableDefinition) -> StorageResult<()> {
    let definition = serde_json::to_string(table)?;
    let now = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO world (table_name, definition, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(table_name) DO UPDATE SET
            definition = excluded.definition,
            updated_at = excluded.updated_at",
        params![table.table_name, definition, now],
    )?;
    Ok(())
}

fn migration_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::MigrationError { message })
}
