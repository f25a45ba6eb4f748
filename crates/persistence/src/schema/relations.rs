//! Standard columns, standard relations, join-table generation and
//! [`RelationKind`] classification.
//!
//! After [`merge_tables`](super::merge_tables) produced the authoritative
//! table set, [`prepare_tables`] completes it:
//!
//! 1. every table receives `id`, `reference_id`, `permission`, `created_at`
//!    and `updated_at`;
//! 2. every non-join table belongs to a `user_account` through `user_id`, and
//!    every non-join table other than `usergroup` is shared with usergroups;
//! 3. `belongs_to`/`has_one` relations become foreign-key columns, `has_many`
//!    relations become join tables;
//! 4. each table is tagged with the [`RelationKind`] the permission resolver
//!    dispatches on.

use tracing::{debug, warn};

use crate::permission::PermissionCode;

use super::rules::{ConformationRule, ValidationRule};
use super::table::{
    ColumnDefinition, RelationDefinition, RelationKind, RelationType, TableDefinition, columns,
    tables,
};

/// The tables every deployment carries. Configuration may extend them.
pub fn system_tables() -> Vec<TableDefinition> {
    let mut user_account = TableDefinition::new(tables::USER_ACCOUNT)
        .with_column(ColumnDefinition::new("name", "label"))
        .with_column(ColumnDefinition::new("email", "email").unique().indexed())
        .with_column(
            ColumnDefinition::new("api_token_hash", "label")
                .excluded_from_api()
                .indexed(),
        );
    user_account.conformations = vec![ConformationRule {
        column_name: "email".to_string(),
        tags: "trim,lowercase".to_string(),
    }];
    user_account.validations = vec![ValidationRule {
        column_name: "email".to_string(),
        tags: "email".to_string(),
    }];

    let mut usergroup = TableDefinition::new(tables::USERGROUP)
        .with_column(ColumnDefinition::new("name", "label").nullable(false))
        .with_default_permission(PermissionCode::DEFAULT_GROUP);
    usergroup.validations = vec![ValidationRule {
        column_name: "name".to_string(),
        tags: "required".to_string(),
    }];

    let cloud_store = TableDefinition::new(tables::CLOUD_STORE)
        .with_column(ColumnDefinition::new("name", "label").nullable(false))
        .with_column(ColumnDefinition::new("store_provider", "label").with_default("local"))
        .with_column(ColumnDefinition::new("root_path", "label"));

    let site = TableDefinition::new(tables::SITE)
        .with_column(ColumnDefinition::new("name", "label").nullable(false))
        .with_column(ColumnDefinition::new("hostname", "hostname").indexed())
        .with_column(ColumnDefinition::new("path", "label"))
        .with_column(ColumnDefinition::new("storage_root", "label"))
        .with_relation(RelationDefinition::belongs_to(
            tables::SITE,
            tables::CLOUD_STORE,
            "cloud_store_id",
        ))
        .with_default_permission(PermissionCode::DEFAULT_SITE);

    vec![user_account, usergroup, cloud_store, site]
}

/// Runs the post-merge steps in order and returns the completed table set.
pub fn prepare_tables(tables: Vec<TableDefinition>) -> Vec<TableDefinition> {
    let mut tables = tables;
    for table in tables.iter_mut() {
        ensure_standard_relations(table);
    }
    let mut tables = expand_relations(tables);
    for table in tables.iter_mut() {
        ensure_standard_columns(table);
    }
    classify(&mut tables);
    tables
}

/// Adds the bookkeeping columns a table is missing, ahead of its own columns.
pub fn ensure_standard_columns(table: &mut TableDefinition) {
    let standard = [
        ColumnDefinition::new(columns::ID, "id").primary_key(),
        ColumnDefinition::new(columns::REFERENCE_ID, "label")
            .nullable(false)
            .unique()
            .indexed(),
        ColumnDefinition::new(columns::PERMISSION, "integer").nullable(false),
        ColumnDefinition::new(columns::CREATED_AT, "datetime"),
        ColumnDefinition::new(columns::UPDATED_AT, "datetime"),
    ];

    let missing: Vec<ColumnDefinition> = standard
        .into_iter()
        .filter(|c| !table.has_column(&c.column_name))
        .collect();
    if !missing.is_empty() {
        table.columns.splice(0..0, missing);
    }
}

/// Adds ownership and group sharing to user tables.
pub fn ensure_standard_relations(table: &mut TableDefinition) {
    if table.is_join_table {
        return;
    }

    let owner = RelationDefinition::belongs_to(
        table.table_name.as_str(),
        tables::USER_ACCOUNT,
        columns::OWNER,
    );
    if !table.contains_relation(&owner) {
        table.relations.push(owner);
    }

    if table.table_name != tables::USERGROUP {
        let shared = RelationDefinition::has_many_and_belongs_to_many(
            table.table_name.as_str(),
            tables::USERGROUP,
        );
        if !table.contains_relation(&shared) {
            table.relations.push(shared);
        }
    }
}

/// Materializes relations: foreign-key columns on the subject table for
/// single-row relations, join tables for multi-row relations.
///
/// Relations naming a table that does not exist are skipped with a warning.
pub fn expand_relations(tables: Vec<TableDefinition>) -> Vec<TableDefinition> {
    let mut tables = tables;
    let known: Vec<String> = tables.iter().map(|t| t.table_name.clone()).collect();

    let relations: Vec<RelationDefinition> = tables
        .iter()
        .flat_map(|t| {
            t.relations
                .iter()
                .filter(|r| r.subject == t.table_name)
                .cloned()
        })
        .collect();

    for relation in relations {
        if !known.contains(&relation.object) {
            warn!(
                subject = %relation.subject,
                object = %relation.object,
                "Relation refers to an unknown table, skipping"
            );
            continue;
        }

        match relation.relation {
            RelationType::BelongsTo | RelationType::HasOne => {
                let Some(subject) = tables.iter_mut().find(|t| t.table_name == relation.subject)
                else {
                    continue;
                };
                if !subject.has_column(&relation.object_name) {
                    let mut column = ColumnDefinition::new(relation.object_name.as_str(), "alias")
                        .references(relation.object.as_str())
                        .indexed();
                    if relation.relation == RelationType::HasOne {
                        column = column.unique();
                    }
                    subject.columns.push(column);
                }
            }
            RelationType::HasMany | RelationType::HasManyAndBelongsToMany => {
                let join_name = relation.join_table_name();
                let join_columns = [
                    ColumnDefinition::new(relation.subject_name.as_str(), "alias")
                        .references(relation.subject.as_str())
                        .nullable(false)
                        .indexed(),
                    ColumnDefinition::new(relation.object_name.as_str(), "alias")
                        .references(relation.object.as_str())
                        .nullable(false)
                        .indexed(),
                ];

                match tables.iter_mut().find(|t| t.table_name == join_name) {
                    Some(join) => {
                        join.is_join_table = true;
                        for column in join_columns {
                            if !join.has_column(&column.column_name) {
                                join.columns.push(column);
                            }
                        }
                    }
                    None => {
                        debug!(table = %join_name, "Creating join table");
                        let mut join = TableDefinition::new(join_name);
                        join.is_join_table = true;
                        join.columns.extend(join_columns);
                        tables.push(join);
                    }
                }
            }
        }
    }

    tables
}

/// Tags every table with how its rows' permissions are resolved.
pub fn classify(tables: &mut [TableDefinition]) {
    for table in tables.iter_mut() {
        table.relation_kind = classify_one(table);
    }
}

fn classify_one(table: &TableDefinition) -> RelationKind {
    if table.table_name == tables::USERGROUP {
        return RelationKind::GroupObject;
    }

    if table.is_join_table {
        let parent = table.foreign_key_columns().find(|(c, fk)| {
            c.column_name != columns::REFERENCE_ID && fk.namespace != tables::USERGROUP
        });
        return match parent {
            Some((column, fk)) => RelationKind::JoinRow {
                parent_table: fk.namespace.clone(),
                parent_column: column.column_name.clone(),
            },
            None => {
                warn!(
                    table = %table.table_name,
                    "Join table has no parent column, treating rows as direct"
                );
                RelationKind::Direct
            }
        };
    }

    if table.has_many_usergroups() {
        RelationKind::BelongsToGroup
    } else {
        RelationKind::Direct
    }
}
