//! [`ObjectStore`] implementation for SQLite.

use rusqlite::{Connection, OptionalExtension};

use crate::core::{ObjectStore, Row};
use crate::error::{LookupError, StorageResult};
use crate::permission::{GroupPermission, PermissionCode};
use crate::schema::{RelationDefinition, tables};

use super::SqliteBackend;
use super::sql::{query_rows, quoted};

pub(super) fn find_by_reference(
    conn: &Connection,
    table: &str,
    reference_id: &str,
) -> StorageResult<Option<Row>> {
    let sql = format!("SELECT * FROM {} WHERE reference_id = ?1", quoted(table)?);
    Ok(query_rows(conn, table, &sql, [reference_id])?.into_iter().next())
}

pub(super) fn fetch_by_reference(
    conn: &Connection,
    table: &str,
    reference_id: &str,
) -> StorageResult<Row> {
    find_by_reference(conn, table, reference_id)?.ok_or_else(|| {
        LookupError::NotFound {
            table: table.to_string(),
            reference_id: reference_id.to_string(),
        }
        .into()
    })
}

pub(super) fn fetch_by_id(conn: &Connection, table: &str, id: i64) -> StorageResult<Row> {
    let sql = format!("SELECT * FROM {} WHERE id = ?1", quoted(table)?);
    query_rows(conn, table, &sql, [id])?
        .into_iter()
        .next()
        .ok_or_else(|| {
            LookupError::NotFoundById {
                table: table.to_string(),
                id,
            }
            .into()
        })
}

/// Numeric id of the row of `table` with the given reference id.
pub(super) fn id_for_reference(
    conn: &Connection,
    table: &str,
    reference_id: &str,
) -> StorageResult<Option<i64>> {
    let sql = format!("SELECT id FROM {} WHERE reference_id = ?1", quoted(table)?);
    Ok(conn
        .query_row(&sql, [reference_id], |row| row.get(0))
        .optional()?)
}

/// Reference id of the row of `table` with the given numeric id.
pub(super) fn reference_for_id(
    conn: &Connection,
    table: &str,
    id: i64,
) -> StorageResult<Option<String>> {
    let sql = format!("SELECT reference_id FROM {} WHERE id = ?1", quoted(table)?);
    Ok(conn.query_row(&sql, [id], |row| row.get(0)).optional()?)
}

fn groups_for_object(
    conn: &Connection,
    table: &str,
    object_reference_id: &str,
) -> StorageResult<Vec<GroupPermission>> {
    let relation = RelationDefinition::has_many_and_belongs_to_many(table, tables::USERGROUP);
    let sql = format!(
        "SELECT g.reference_id, j.reference_id, j.permission
         FROM {join} j
         JOIN usergroup g ON g.id = j.{group_column}
         JOIN {object} o ON o.id = j.{object_column}
         WHERE o.reference_id = ?1
         ORDER BY j.id",
        join = quoted(&relation.join_table_name())?,
        group_column = quoted(&relation.object_name)?,
        object = quoted(table)?,
        object_column = quoted(&relation.subject_name)?,
    );

    let mut stmt = conn.prepare(&sql)?;
    let groups = stmt
        .query_map([object_reference_id], |row| {
            Ok(GroupPermission {
                group_reference_id: row.get(0)?,
                object_reference_id: object_reference_id.to_string(),
                relation_reference_id: row.get(1)?,
                permission: PermissionCode::from_i64(row.get::<_, Option<i64>>(2)?.unwrap_or(0)),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(groups)
}

impl ObjectStore for SqliteBackend {
    fn resolve_by_id(&self, table: &str, id: i64) -> StorageResult<Row> {
        let conn = self.get_connection()?;
        fetch_by_id(&conn, table, id)
    }

    fn resolve_by_reference(&self, table: &str, reference_id: &str) -> StorageResult<Row> {
        let conn = self.get_connection()?;
        fetch_by_reference(&conn, table, reference_id)
    }

    fn query_groups_for_object(
        &self,
        table: &str,
        object_reference_id: &str,
    ) -> StorageResult<Vec<GroupPermission>> {
        let conn = self.get_connection()?;
        groups_for_object(&conn, table, object_reference_id)
    }

    fn query_groups_for_group_object(
        &self,
        group_reference_id: &str,
        permission: PermissionCode,
    ) -> StorageResult<Vec<GroupPermission>> {
        let conn = self.get_connection()?;
        if id_for_reference(&conn, tables::USERGROUP, group_reference_id)?.is_none() {
            return Ok(Vec::new());
        }
        Ok(vec![GroupPermission {
            group_reference_id: group_reference_id.to_string(),
            object_reference_id: group_reference_id.to_string(),
            relation_reference_id: group_reference_id.to_string(),
            permission,
        }])
    }
}
