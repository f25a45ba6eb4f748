//! Loading configured tables from JSON schema files.
//!
//! A schema directory holds any number of `schema_*.json` files, read in file
//! name order. Each file has the shape:
//!
//! ```json
//! {
//!   "tables": [
//!     {
//!       "table_name": "invoice",
//!       "columns": [
//!         {"column_name": "total", "column_type": "measurement", "is_nullable": false}
//!       ],
//!       "default_groups": ["accounting"]
//!     }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SchemaError;

use super::merge::merge_tables;
use super::relations::system_tables;
use super::rules::check_rules;
use super::table::TableDefinition;

/// Contents of one schema file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub tables: Vec<TableDefinition>,
}

/// Reads and checks the tables of one schema file.
pub fn load_schema_file(path: &Path) -> Result<Vec<TableDefinition>, SchemaError> {
    let config_error = |message: String| SchemaError::ConfigFile {
        path: path.display().to_string(),
        message,
    };

    let contents = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
    let file: SchemaFile =
        serde_json::from_str(&contents).map_err(|e| config_error(e.to_string()))?;

    let mut tables = file.tables;
    for table in tables.iter_mut() {
        if table.table_name.trim().is_empty() {
            return Err(config_error("table without a table_name".to_string()));
        }
        for column in table.columns.iter_mut() {
            if column.column_name.is_empty() {
                column.column_name = column.name.clone();
            }
            if column.name.is_empty() {
                column.name = column.column_name.clone();
            }
        }
        check_rules(&table.table_name, &table.conformations, &table.validations)?;
    }

    debug!(path = %path.display(), tables = tables.len(), "Loaded schema file");
    Ok(tables)
}

/// Returns the configured table set: the system tables extended by every
/// `schema_*.json` file in `dir`.
pub fn load_schema_dir(dir: Option<&Path>) -> Result<Vec<TableDefinition>, SchemaError> {
    let Some(dir) = dir else {
        return Ok(system_tables());
    };

    let entries = fs::read_dir(dir).map_err(|e| SchemaError::ConfigFile {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_schema_file(path))
        .collect();
    files.sort();

    let mut configured = Vec::new();
    for file in &files {
        configured.extend(load_schema_file(file)?);
    }

    info!(
        dir = %dir.display(),
        files = files.len(),
        tables = configured.len(),
        "Loaded table configuration"
    );

    Ok(merge_tables(system_tables(), configured))
}

fn is_schema_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("schema_") && n.ends_with(".json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tables;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_without_directory_returns_system_tables() {
        let loaded = load_schema_dir(None).unwrap();
        let names: Vec<&str> = loaded.iter().map(|t| t.table_name.as_str()).collect();
        assert_eq!(
            names,
            vec![tables::USER_ACCOUNT, tables::USERGROUP, tables::CLOUD_STORE, tables::SITE]
        );
    }

    #[test]
    fn test_loads_schema_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "schema_b.json",
            r#"{"tables": [{"table_name": "invoice", "columns": [{"column_name": "tax", "column_type": "measurement"}]}]}"#,
        );
        write(
            dir.path(),
            "schema_a.json",
            r#"{"tables": [{"table_name": "invoice", "columns": [{"name": "total", "column_type": "measurement"}]}]}"#,
        );
        write(dir.path(), "notes.json", r#"{"tables": [{"table_name": "ignored"}]}"#);

        let loaded = load_schema_dir(Some(dir.path())).unwrap();
        let invoice = loaded.iter().find(|t| t.table_name == "invoice").unwrap();
        assert_eq!(invoice.columns.len(), 1);
        assert_eq!(invoice.columns[0].column_name, "total");
        assert!(!loaded.iter().any(|t| t.table_name == "ignored"));
    }

    #[test]
    fn test_configuration_extends_system_tables() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "schema_users.json",
            r#"{"tables": [{"table_name": "user_account", "columns": [{"column_name": "phone"}]}]}"#,
        );
        let loaded = load_schema_dir(Some(dir.path())).unwrap();
        let users = loaded
            .iter()
            .find(|t| t.table_name == tables::USER_ACCOUNT)
            .unwrap();
        assert!(users.has_column("email"));
        assert!(users.has_column("phone"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "schema_bad.json", "{ not json");
        let err = load_schema_dir(Some(dir.path())).unwrap_err();
        assert!(matches!(err, SchemaError::ConfigFile { .. }));
    }

    #[test]
    fn test_unknown_rule_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "schema_rules.json",
            r#"{"tables": [{"table_name": "note", "validations": [{"column_name": "title", "tags": "shiny"}]}]}"#,
        );
        let err = load_schema_dir(Some(dir.path())).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownRule { .. }));
    }
}
