//! Immutable lookup of the reconciled table set.

use std::collections::HashMap;

use crate::core::TableDefaults;
use crate::permission::PermissionCode;

use super::table::{RelationKind, TableDefinition};

/// The table definitions produced at boot, indexed by name.
///
/// Built once after reconciliation and never mutated; a restart builds a new
/// registry.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: Vec<TableDefinition>,
    index: HashMap<String, usize>,
}

impl TableRegistry {
    /// Indexes `tables`. A repeated table name keeps its first definition.
    pub fn new(tables: Vec<TableDefinition>) -> Self {
        let mut kept = Vec::with_capacity(tables.len());
        let mut index = HashMap::with_capacity(tables.len());
        for table in tables {
            if index.contains_key(&table.table_name) {
                continue;
            }
            index.insert(table.table_name.clone(), kept.len());
            kept.push(table);
        }
        Self {
            tables: kept,
            index,
        }
    }

    pub fn get(&self, table: &str) -> Option<&TableDefinition> {
        self.index.get(table).and_then(|&i| self.tables.get(i))
    }

    pub fn contains(&self, table: &str) -> bool {
        self.index.contains_key(table)
    }

    /// All tables in reconciliation order.
    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl TableDefaults for TableRegistry {
    fn default_permission(&self, table: &str) -> Option<PermissionCode> {
        self.get(table).map(|t| t.default_permission)
    }

    fn relation_kind(&self, table: &str) -> Option<&RelationKind> {
        self.get(table).map(|t| &t.relation_kind)
    }

    fn default_groups(&self, table: &str) -> &[String] {
        self.get(table)
            .map(|t| t.default_groups.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_definition_wins() {
        let registry = TableRegistry::new(vec![
            TableDefinition::new("invoice").with_default_permission(PermissionCode::ALLOW_ALL),
            TableDefinition::new("invoice"),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.default_permission("invoice"),
            Some(PermissionCode::ALLOW_ALL)
        );
    }

    #[test]
    fn test_unknown_table() {
        let registry = TableRegistry::default();
        assert!(registry.get("invoice").is_none());
        assert!(registry.relation_kind("invoice").is_none());
        assert!(registry.default_groups("invoice").is_empty());
    }
}
