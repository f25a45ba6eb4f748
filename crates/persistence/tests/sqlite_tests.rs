//! SQLite backend integration tests.
//!
//! These tests run schema reconciliation, row storage and permission
//! resolution together against real SQLite databases.

use serde_json::{Map, Value, json};

use tabula_persistence::backends::sqlite::SqliteBackend;
use tabula_persistence::core::{CredentialStore, ObjectStore, RowStorage, hash_token};
use tabula_persistence::permission::{
    Actor, Capability, PermissionCode, PermissionInstance, PermissionResolver, Scope,
};
use tabula_persistence::schema::{ColumnDefinition, RelationKind, TableDefinition, TableRegistry};

fn invoice_v1() -> TableDefinition {
    TableDefinition::new("invoice")
        .with_column(ColumnDefinition::new("total", "measurement"))
        .with_column(ColumnDefinition::new("currency", "label"))
}

fn invoice_v2() -> TableDefinition {
    let mut invoice = TableDefinition::new("invoice")
        .with_column(ColumnDefinition::new("total", "measurement").nullable(false))
        .with_column(ColumnDefinition::new("due_date", "date"));
    invoice.default_groups = vec!["accounting".to_string()];
    invoice
}

/// Boots a backend the way the server does: reflect, merge, prepare, apply.
fn boot(backend: &SqliteBackend, configured: Vec<TableDefinition>) -> TableRegistry {
    backend.reconcile(configured).expect("Failed to reconcile schema")
}

fn create_backend(configured: Vec<TableDefinition>) -> (SqliteBackend, TableRegistry) {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    let registry = boot(&backend, configured);
    (backend, registry)
}

fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

async fn insert(
    backend: &SqliteBackend,
    registry: &TableRegistry,
    table: &str,
    owner: Option<&str>,
    value: Value,
) -> String {
    let table = registry.get(table).unwrap();
    backend
        .insert(table, owner, payload(value))
        .await
        .unwrap()
        .reference_id()
        .unwrap()
        .to_string()
}

// ============================================================================
// Schema Reconciliation Tests
// ============================================================================

#[tokio::test]
async fn test_reboot_merges_configuration_without_data_loss() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tabula.db");

    let first_ref = {
        let backend = SqliteBackend::open(&path).unwrap();
        let registry = boot(&backend, vec![invoice_v1()]);
        insert(
            &backend,
            &registry,
            "invoice",
            None,
            json!({"total": 10, "currency": "EUR"}),
        )
        .await
    };

    let backend = SqliteBackend::open(&path).unwrap();
    let registry = boot(&backend, vec![invoice_v2()]);
    let invoice = registry.get("invoice").unwrap();

    let names: Vec<&str> = invoice
        .columns
        .iter()
        .map(|c| c.column_name.as_str())
        .collect();
    assert!(names.contains(&"currency"));
    assert!(names.contains(&"due_date"));
    assert!(!invoice.column("total").unwrap().is_nullable);
    assert_eq!(invoice.default_groups, vec!["accounting".to_string()]);

    let row = backend.get(invoice, &first_ref).await.unwrap();
    assert_eq!(row.integer("total").unwrap(), 10);
    assert_eq!(row.text("currency").unwrap(), "EUR");

    let reflected = backend.reflect_tables().unwrap();
    assert_eq!(reflected, registry.tables().to_vec());
}

#[tokio::test]
async fn test_reboot_with_same_configuration_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tabula.db");

    let first = {
        let backend = SqliteBackend::open(&path).unwrap();
        boot(&backend, vec![invoice_v1()]).tables().to_vec()
    };
    let backend = SqliteBackend::open(&path).unwrap();
    let second = boot(&backend, vec![invoice_v1()]).tables().to_vec();
    assert_eq!(first, second);
}

#[test]
fn test_relation_kinds_after_boot() {
    let (_backend, registry) = create_backend(vec![invoice_v1()]);
    assert_eq!(
        registry.get("invoice").unwrap().relation_kind,
        RelationKind::BelongsToGroup
    );
    assert_eq!(
        registry.get("usergroup").unwrap().relation_kind,
        RelationKind::GroupObject
    );
    assert!(matches!(
        registry
            .get("invoice_invoice_id_has_usergroup_usergroup_id")
            .unwrap()
            .relation_kind,
        RelationKind::JoinRow { .. }
    ));
}

// ============================================================================
// Permission Resolution Tests
// ============================================================================

#[tokio::test]
async fn test_owner_and_group_access_over_sqlite() {
    let (backend, registry) = create_backend(vec![invoice_v2()]);

    let u1 = insert(&backend, &registry, "user_account", None, json!({"email": "u1@x.io"})).await;
    let u2 = insert(&backend, &registry, "user_account", None, json!({"email": "u2@x.io"})).await;
    let u3 = insert(&backend, &registry, "user_account", None, json!({"email": "u3@x.io"})).await;
    let group = insert(&backend, &registry, "usergroup", Some(&u1), json!({"name": "accounting"})).await;

    insert(
        &backend,
        &registry,
        "user_account_user_account_id_has_usergroup_usergroup_id",
        None,
        json!({"user_account_id": u2.clone(), "usergroup_id": group.clone()}),
    )
    .await;

    let invoice = insert(&backend, &registry, "invoice", Some(&u1), json!({"total": 5})).await;

    let resolver = PermissionResolver::new(&backend, &registry);
    let instance = resolver.resolve_reference("invoice", &invoice);
    assert_eq!(instance.owner_reference_id.as_deref(), Some(u1.as_str()));
    assert_eq!(instance.groups.len(), 1);
    assert_eq!(instance.groups[0].group_reference_id, group);

    let actor_groups = |user: &str| backend.query_groups_for_object("user_account", user).unwrap();

    let owner = Actor::new(u1.clone(), actor_groups(&u1));
    let member = Actor::new(u2.clone(), actor_groups(&u2));
    let outsider = Actor::new(u3.clone(), actor_groups(&u3));

    assert!(instance.allows(&owner, Capability::DELETE));
    assert!(instance.allows(&member, Capability::READ));
    assert!(!instance.allows(&member, Capability::UPDATE));
    assert!(!instance.allows(&outsider, Capability::PEEK));
    assert!(!instance.allows(&Actor::guest(), Capability::PEEK));
}

#[tokio::test]
async fn test_membership_rows_resolve_through_their_parent() {
    let (backend, registry) = create_backend(vec![invoice_v2()]);

    let u1 = insert(&backend, &registry, "user_account", None, json!({"email": "u1@x.io"})).await;
    insert(&backend, &registry, "usergroup", Some(&u1), json!({"name": "accounting"})).await;
    let invoice = insert(&backend, &registry, "invoice", Some(&u1), json!({"total": 5})).await;

    let resolver = PermissionResolver::new(&backend, &registry);
    let parent = resolver.resolve_reference("invoice", &invoice);
    let membership = &parent.groups[0];

    let join = resolver.resolve_reference(
        "invoice_invoice_id_has_usergroup_usergroup_id",
        &membership.relation_reference_id,
    );
    assert_eq!(join.owner_reference_id, parent.owner_reference_id);
    assert_eq!(join.groups, parent.groups);
    assert_eq!(join.permission, PermissionCode::DEFAULT_ROW);
}

#[tokio::test]
async fn test_group_object_is_reachable_by_its_members() {
    let (backend, registry) = create_backend(vec![]);

    let u1 = insert(&backend, &registry, "user_account", None, json!({"email": "u1@x.io"})).await;
    let u2 = insert(&backend, &registry, "user_account", None, json!({"email": "u2@x.io"})).await;
    let group = insert(&backend, &registry, "usergroup", Some(&u1), json!({"name": "ops"})).await;
    insert(
        &backend,
        &registry,
        "user_account_user_account_id_has_usergroup_usergroup_id",
        None,
        json!({"user_account_id": u2.clone(), "usergroup_id": group.clone()}),
    )
    .await;

    let resolver = PermissionResolver::new(&backend, &registry);
    let instance = resolver.resolve_reference("usergroup", &group);
    assert_eq!(instance.groups.len(), 1);
    assert_eq!(instance.groups[0].group_reference_id, group);
    assert_eq!(instance.groups[0].permission, PermissionCode::DEFAULT_GROUP);

    let member = Actor::new(
        u2.clone(),
        backend.query_groups_for_object("user_account", &u2).unwrap(),
    );
    assert!(instance.allows(&member, Capability::READ));
}

#[tokio::test]
async fn test_guest_readable_row() {
    let (backend, registry) = create_backend(vec![invoice_v1()]);
    let public = PermissionCode::DEFAULT_ROW.with(Scope::Guest, Capability::PEEK | Capability::READ);
    let reference = insert(
        &backend,
        &registry,
        "invoice",
        None,
        json!({"total": 1, "permission": public.to_i64()}),
    )
    .await;

    let resolver = PermissionResolver::new(&backend, &registry);
    let instance = resolver.resolve_reference("invoice", &reference);
    assert!(instance.allows(&Actor::guest(), Capability::READ));
    assert!(!instance.allows(&Actor::guest(), Capability::UPDATE));
}

#[tokio::test]
async fn test_deleted_row_resolves_to_denied() {
    let (backend, registry) = create_backend(vec![invoice_v1()]);
    let reference = insert(&backend, &registry, "invoice", None, json!({"total": 1})).await;
    backend
        .delete(registry.get("invoice").unwrap(), &reference)
        .await
        .unwrap();

    let resolver = PermissionResolver::new(&backend, &registry);
    assert_eq!(
        resolver.resolve_reference("invoice", &reference),
        PermissionInstance::denied()
    );
}

// ============================================================================
// Credential Tests
// ============================================================================

#[tokio::test]
async fn test_api_token_round_trip() {
    let (backend, registry) = create_backend(vec![]);
    let user = insert(&backend, &registry, "user_account", None, json!({"email": "a@x.io"})).await;
    backend.set_api_token(&user, "t0ken").unwrap();

    let found = backend
        .find_user_by_token_hash(&hash_token("t0ken"))
        .unwrap()
        .unwrap();
    assert_eq!(found.reference_id().unwrap(), user);
}
