//! Reconciliation of configured tables with the tables already persisted.
//!
//! [`merge_tables`] runs once at boot, before any relation, index or
//! constraint is created from its output. It never removes a table or a
//! column: dropping either is a manual operation.
//!
//! | Input | Result |
//! |-------|--------|
//! | existing table, not configured | carried over unchanged |
//! | existing table, configured | columns merged, relations added by hash, rules replaced |
//! | configured table, not existing | appended as-is |

use std::collections::HashSet;

use tracing::{debug, warn};

use super::table::{ColumnDefinition, TableDefinition};

/// Merges `configured` into `existing`.
///
/// The output holds one entry per distinct table name, existing tables first
/// in their original order followed by the new configured tables. Running the
/// merge again with the same configuration returns the same tables.
pub fn merge_tables(
    existing: Vec<TableDefinition>,
    configured: Vec<TableDefinition>,
) -> Vec<TableDefinition> {
    let configured = dedup_configured(configured);
    let mut merged = Vec::with_capacity(existing.len() + configured.len());
    let mut seen: HashSet<String> = HashSet::new();

    for mut table in existing {
        if !seen.insert(table.table_name.clone()) {
            warn!(
                table = %table.table_name,
                "Existing schema lists table twice, keeping the first definition"
            );
            continue;
        }
        if let Some(update) = configured.iter().find(|c| c.table_name == table.table_name) {
            debug!(table = %table.table_name, "Table is being modified");
            merge_into(&mut table, update);
        }
        merged.push(table);
    }

    for table in configured {
        if seen.insert(table.table_name.clone()) {
            debug!(table = %table.table_name, "Adding new table");
            merged.push(table);
        }
    }

    merged
}

fn merge_into(table: &mut TableDefinition, update: &TableDefinition) {
    for column in &update.columns {
        match find_matching_column(&mut table.columns, column) {
            Some(existing) => overwrite_mutable(existing, column),
            None => table.columns.push(column.clone()),
        }
    }

    for relation in &update.relations {
        if !table.contains_relation(relation) {
            table.relations.push(relation.clone());
        }
    }

    table.default_groups = update.default_groups.clone();
    table.conformations = update.conformations.clone();
    table.validations = update.validations.clone();
}

/// Finds the column `wanted` refers to: by column name first, then by
/// non-empty display name.
fn find_matching_column<'a>(
    columns: &'a mut [ColumnDefinition],
    wanted: &ColumnDefinition,
) -> Option<&'a mut ColumnDefinition> {
    let by_column_name = (!wanted.column_name.is_empty())
        .then(|| columns.iter().position(|c| c.column_name == wanted.column_name))
        .flatten();
    let index = by_column_name.or_else(|| {
        (!wanted.name.is_empty())
            .then(|| columns.iter().position(|c| c.name == wanted.name))
            .flatten()
    })?;
    columns.get_mut(index)
}

/// Only these attributes may change on an existing column; the physical
/// column and the data stored in it stay in place.
fn overwrite_mutable(existing: &mut ColumnDefinition, configured: &ColumnDefinition) {
    existing.default_value = configured.default_value.clone();
    existing.exclude_from_api = configured.exclude_from_api;
    existing.is_indexed = configured.is_indexed;
    existing.is_nullable = configured.is_nullable;
    existing.column_type = configured.column_type.clone();
    existing.options = configured.options.clone();
}

/// Resolves conflicts inside the configuration itself. The earlier
/// definition of a table or column wins and the later one is logged.
fn dedup_configured(configured: Vec<TableDefinition>) -> Vec<TableDefinition> {
    let mut out: Vec<TableDefinition> = Vec::with_capacity(configured.len());

    for mut table in configured {
        if out.iter().any(|t| t.table_name == table.table_name) {
            warn!(
                table = %table.table_name,
                "Table configured more than once, keeping the first definition"
            );
            continue;
        }

        let mut columns: Vec<ColumnDefinition> = Vec::with_capacity(table.columns.len());
        for column in table.columns.drain(..) {
            if columns.iter().any(|c| c.same_column(&column)) {
                warn!(
                    table = %table.table_name,
                    column = %column.column_name,
                    "Column configured more than once, keeping the first definition"
                );
                continue;
            }
            columns.push(column);
        }
        table.columns = columns;

        let mut hashes = HashSet::new();
        table.relations.retain(|r| hashes.insert(r.content_hash()));

        out.push(table);
    }

    out
}
