//! Read-only collaborators of the permission resolver.

use crate::error::StorageResult;
use crate::permission::{GroupPermission, PermissionCode};
use crate::schema::RelationKind;

use super::row::Row;

/// Synchronous object lookups used while resolving permissions.
///
/// Every method either returns plain rows or an explicit not-found
/// [`LookupError`](crate::error::LookupError); none of them applies any
/// authorization.
pub trait ObjectStore: Send + Sync {
    /// Loads the row of `table` whose numeric id is `id`.
    fn resolve_by_id(&self, table: &str, id: i64) -> StorageResult<Row>;

    /// Loads the row of `table` whose reference id is `reference_id`.
    fn resolve_by_reference(&self, table: &str, reference_id: &str) -> StorageResult<Row>;

    /// Returns every group the object is shared with, each carrying the
    /// permission of its membership row.
    fn query_groups_for_object(
        &self,
        table: &str,
        object_reference_id: &str,
    ) -> StorageResult<Vec<GroupPermission>>;

    /// Returns the single membership synthesized for a group object, or
    /// nothing if the group no longer exists.
    fn query_groups_for_group_object(
        &self,
        group_reference_id: &str,
        permission: PermissionCode,
    ) -> StorageResult<Vec<GroupPermission>>;
}

/// Per-table defaults consulted when a row does not carry its own value.
pub trait TableDefaults: Send + Sync {
    /// Permission applied to rows without a decodable `permission` column.
    fn default_permission(&self, table: &str) -> Option<PermissionCode>;

    /// How rows of `table` resolve their permission.
    fn relation_kind(&self, table: &str) -> Option<&RelationKind>;

    /// Names of the groups new rows of `table` are shared with.
    fn default_groups(&self, table: &str) -> &[String];
}
