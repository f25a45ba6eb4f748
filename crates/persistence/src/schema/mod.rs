//! Table definitions and their reconciliation with the persisted schema.
//!
//! The boot sequence is:
//!
//! 1. reflect the tables already persisted by the backend;
//! 2. [`load_schema_dir`] reads the configured tables, on top of
//!    [`system_tables`];
//! 3. [`merge_tables`] reconciles both sets;
//! 4. [`prepare_tables`] adds standard columns and relations, generates join
//!    tables and classifies every table;
//! 5. the backend applies the result in one migration transaction;
//! 6. [`TableRegistry`] indexes the final set for request handling.

mod config;
mod merge;
mod registry;
mod relations;
mod rules;
mod table;

pub use config::{SchemaFile, load_schema_dir, load_schema_file};
pub use merge::merge_tables;
pub use registry::TableRegistry;
pub use relations::{
    classify, ensure_standard_columns, ensure_standard_relations, expand_relations,
    prepare_tables, system_tables,
};
pub use rules::{ConformationRule, ValidationRule, check_rules, conform, validate};
pub use table::{
    ColumnDefinition, ColumnOption, ForeignKey, RelationDefinition, RelationKind, RelationType,
    TableDefinition, columns, tables,
};
