//! Test data fixtures.

use serde_json::{Map, Value};
use tabula_persistence::backends::sqlite::SqliteBackend;
use tabula_persistence::core::RowStorage;
use tabula_persistence::schema::{
    ColumnDefinition, RelationDefinition, TableDefinition, TableRegistry, tables,
};

pub const OWNER_TOKEN: &str = "owner-token";
pub const MEMBER_TOKEN: &str = "member-token";
pub const STRANGER_TOKEN: &str = "stranger-token";

/// Join table sharing notes with groups.
pub const NOTE_GROUPS: &str = "note_note_id_has_usergroup_usergroup_id";

/// Join table holding group memberships of accounts.
pub const ACCOUNT_GROUPS: &str = "user_account_user_account_id_has_usergroup_usergroup_id";

/// Tables configured on top of the system tables.
pub fn configured_tables() -> Vec<TableDefinition> {
    let category = TableDefinition::new("category")
        .with_column(ColumnDefinition::new("label", "label").nullable(false));

    let note = TableDefinition::new("note")
        .with_column(ColumnDefinition::new("title", "label").nullable(false))
        .with_column(ColumnDefinition::new("slug", "label").unique())
        .with_column(ColumnDefinition::new("secret", "label").excluded_from_api())
        .with_relation(RelationDefinition::belongs_to("note", "category", "category_id"));

    vec![category, note]
}

/// Converts a JSON object literal into a payload.
pub fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// Inserts a row as `owner` and returns its reference id.
pub async fn seed(
    backend: &SqliteBackend,
    registry: &TableRegistry,
    table: &str,
    owner: Option<&str>,
    values: Value,
) -> String {
    let definition = registry
        .get(table)
        .unwrap_or_else(|| panic!("table {} not configured", table));
    let row = backend
        .insert(definition, owner, payload(values))
        .await
        .unwrap_or_else(|e| panic!("Failed to seed {}: {}", table, e));
    row.reference_id()
        .expect("Seeded row has no reference id")
        .to_string()
}

/// Creates a group owned by `owner` and makes `member` part of it.
pub async fn seed_group(
    backend: &SqliteBackend,
    registry: &TableRegistry,
    owner: &str,
    member: &str,
    name: &str,
) -> String {
    let group = seed(
        backend,
        registry,
        tables::USERGROUP,
        Some(owner),
        serde_json::json!({"name": name}),
    )
    .await;
    seed(
        backend,
        registry,
        ACCOUNT_GROUPS,
        None,
        serde_json::json!({"user_account_id": member, "usergroup_id": group}),
    )
    .await;
    group
}
