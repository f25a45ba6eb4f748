//! Resolution of a row's [`PermissionInstance`].
//!
//! The resolver dispatches on the [`RelationKind`] recorded for the row's
//! table:
//!
//! | Kind | Owner | Groups |
//! |------|-------|--------|
//! | `Direct` | `user_id` | none |
//! | `BelongsToGroup` | `user_id` | membership rows of the object |
//! | `JoinRow` | owner of the parent row | groups of the parent row |
//! | `GroupObject` | `user_id` | the group itself, with the group default permission |
//!
//! The permission code is the row's `permission` column, or the table default
//! when the row carries none. A join row without its own code inherits its
//! parent's.
//!
//! Any lookup failure resolves to [`PermissionInstance::denied`] and is
//! logged; resolution never fails a request.

use serde_json::Value;
use tracing::{trace, warn};

use crate::core::{ObjectStore, Row, TableDefaults};
use crate::error::{LookupError, StorageResult};
use crate::schema::{RelationKind, columns, tables};

use super::code::PermissionCode;
use super::instance::PermissionInstance;

/// Computes permission instances from rows, borrowing its collaborators for
/// the duration of one request.
#[derive(Clone, Copy)]
pub struct PermissionResolver<'a> {
    store: &'a dyn ObjectStore,
    defaults: &'a dyn TableDefaults,
}

impl<'a> PermissionResolver<'a> {
    pub fn new(store: &'a dyn ObjectStore, defaults: &'a dyn TableDefaults) -> Self {
        Self { store, defaults }
    }

    /// Resolves the instance protecting `row`.
    ///
    /// `row` may be a complete row or a minimal envelope; missing owner or
    /// permission columns are loaded by reference id.
    pub fn resolve_row(&self, row: &Row) -> PermissionInstance {
        match self.try_resolve(row) {
            Ok(instance) => {
                trace!(
                    table = %row.table(),
                    reference_id = row.reference_id().unwrap_or_default(),
                    ?instance,
                    "Resolved permission"
                );
                instance
            }
            Err(e) => {
                warn!(
                    table = %row.table(),
                    reference_id = row.reference_id().unwrap_or_default(),
                    error = %e,
                    "Permission lookup failed, denying access"
                );
                PermissionInstance::denied()
            }
        }
    }

    /// Resolves the instance protecting the row `table`/`reference_id`.
    pub fn resolve_reference(&self, table: &str, reference_id: &str) -> PermissionInstance {
        self.resolve_row(&Row::envelope(table, reference_id, None))
    }

    fn try_resolve(&self, row: &Row) -> StorageResult<PermissionInstance> {
        let table = row.table();
        let kind = self
            .defaults
            .relation_kind(table)
            .ok_or_else(|| LookupError::UnknownTable {
                table: table.to_string(),
            })?;
        let reference_id = row.reference_id()?;

        let loaded;
        let row = if needs_full_row(row, kind) {
            loaded = self.store.resolve_by_reference(table, reference_id)?;
            &loaded
        } else {
            row
        };

        let explicit = explicit_permission(row);

        match kind {
            RelationKind::JoinRow {
                parent_table,
                parent_column,
            } => {
                if let Some(RelationKind::JoinRow { .. }) = self.defaults.relation_kind(parent_table)
                {
                    warn!(
                        table = %table,
                        reference_id = %reference_id,
                        parent_table = %parent_table,
                        "Join row refers to another join row, denying access"
                    );
                    return Ok(PermissionInstance::denied());
                }
                let parent = self.parent_row(row, parent_table, parent_column)?;
                let inherited = self.try_resolve(&parent)?;
                Ok(PermissionInstance::new(
                    inherited.owner_reference_id,
                    inherited.groups,
                    explicit.unwrap_or(inherited.permission),
                ))
            }
            RelationKind::Direct => Ok(PermissionInstance::new(
                self.owner_reference(row)?,
                Vec::new(),
                self.permission_or_default(explicit, table),
            )),
            RelationKind::BelongsToGroup => Ok(PermissionInstance::new(
                self.owner_reference(row)?,
                self.store.query_groups_for_object(table, reference_id)?,
                self.permission_or_default(explicit, table),
            )),
            RelationKind::GroupObject => {
                let group_default = self
                    .defaults
                    .default_permission(tables::USERGROUP)
                    .unwrap_or(PermissionCode::DEFAULT_GROUP);
                Ok(PermissionInstance::new(
                    self.owner_reference(row)?,
                    self.store
                        .query_groups_for_group_object(reference_id, group_default)?,
                    self.permission_or_default(explicit, table),
                ))
            }
        }
    }

    fn permission_or_default(&self, explicit: Option<PermissionCode>, table: &str) -> PermissionCode {
        explicit
            .or_else(|| self.defaults.default_permission(table))
            .unwrap_or(PermissionCode::DEFAULT_ROW)
    }

    /// The owner's reference id. Stored owners are either reference ids or
    /// numeric `user_account` ids.
    fn owner_reference(&self, row: &Row) -> StorageResult<Option<String>> {
        match row.get(columns::OWNER) {
            Err(_) => Ok(None),
            Ok(Value::String(owner)) => Ok(Some(owner.clone())),
            Ok(_) => {
                let id = row.integer(columns::OWNER)?;
                let owner = self.store.resolve_by_id(tables::USER_ACCOUNT, id)?;
                Ok(Some(owner.reference_id()?.to_string()))
            }
        }
    }

    fn parent_row(&self, row: &Row, parent_table: &str, parent_column: &str) -> StorageResult<Row> {
        match row.get(parent_column)? {
            Value::String(reference_id) => {
                self.store.resolve_by_reference(parent_table, reference_id)
            }
            _ => {
                let id = row.integer(parent_column)?;
                self.store.resolve_by_id(parent_table, id)
            }
        }
    }
}

/// A row needs loading when it lacks the columns its kind resolves from.
fn needs_full_row(row: &Row, kind: &RelationKind) -> bool {
    let key_column = match kind {
        RelationKind::JoinRow { parent_column, .. } => parent_column.as_str(),
        _ => columns::OWNER,
    };
    !row.contains(columns::PERMISSION) || !row.contains(key_column)
}

/// The row's own permission code. A present but undecodable value is a
/// malformed permission and grants nothing.
fn explicit_permission(row: &Row) -> Option<PermissionCode> {
    let value = row.get(columns::PERMISSION).ok()?;
    match PermissionCode::from_value(value) {
        Some(code) => Some(code),
        None => {
            warn!(
                table = %row.table(),
                reference_id = row.reference_id().unwrap_or_default(),
                value = %value,
                "Malformed permission value, treating as none"
            );
            Some(PermissionCode::NONE)
        }
    }
}
