//! Response documents.
//!
//! Every successful API response is a document of the form:
//!
//! ```json
//! {
//!   "data": {"__type": "invoice", "reference_id": "...", "total": 10, "user_id": "<owner ref>"},
//!   "included": [{"__type": "user_account", "reference_id": "<owner ref>", "email": "..."}]
//! }
//! ```
//!
//! Presented rows never carry the numeric `id`, columns excluded from the API
//! or the internal relation reference. Foreign keys are rewritten from
//! numeric ids to the reference ids of their targets, and the target rows are
//! offered as `included` rows. Whether any row reaches the document is
//! decided by the access interceptor, not here.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tabula_persistence::core::{ObjectStore, Row};
use tabula_persistence::schema::{TableRegistry, columns};
use tracing::warn;

/// Key under which a presented row names its table.
pub const TYPE_KEY: &str = "__type";

/// Builds the JSON document returned by the API.
#[derive(Debug, Clone, Default)]
pub struct ResponseDocument {
    data: Value,
    included: Vec<Value>,
    meta: Option<Value>,
}

impl ResponseDocument {
    /// A document around a single presented row or `null`.
    pub fn single(data: Option<Value>) -> Self {
        Self {
            data: data.unwrap_or(Value::Null),
            ..Default::default()
        }
    }

    /// A document around a list of presented rows.
    pub fn list(data: Vec<Value>) -> Self {
        Self {
            data: Value::Array(data),
            ..Default::default()
        }
    }

    pub fn with_included(mut self, included: Vec<Value>) -> Self {
        self.included = included;
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn build(self) -> Value {
        let mut document = Map::new();
        document.insert("data".to_string(), self.data);
        document.insert("included".to_string(), Value::Array(self.included));
        if let Some(meta) = self.meta {
            document.insert("meta".to_string(), meta);
        }
        Value::Object(document)
    }
}

/// Turns stored rows into their API representation.
///
/// Reference lookups are cached for the lifetime of the presenter, which is
/// one request.
pub struct RowPresenter<'a> {
    registry: &'a TableRegistry,
    store: &'a dyn ObjectStore,
    references: HashMap<(String, i64), Option<Row>>,
}

impl<'a> RowPresenter<'a> {
    pub fn new(registry: &'a TableRegistry, store: &'a dyn ObjectStore) -> Self {
        Self {
            registry,
            store,
            references: HashMap::new(),
        }
    }

    /// Rows referenced by the foreign keys of `rows`, each returned once and
    /// never one of `rows` itself.
    pub fn included(&mut self, rows: &[Row]) -> Vec<Row> {
        let mut seen: HashSet<String> = rows
            .iter()
            .filter_map(|r| r.reference_id().ok().map(str::to_string))
            .collect();
        let mut included = Vec::new();

        for row in rows {
            for (namespace, id) in self.foreign_keys(row) {
                if !self.registry.contains(&namespace) {
                    continue;
                }
                let Some(target) = self.target(&namespace, id) else {
                    continue;
                };
                let Ok(reference_id) = target.reference_id() else {
                    continue;
                };
                if seen.insert(reference_id.to_string()) {
                    included.push(target.clone());
                }
            }
        }
        included
    }

    /// The API representation of one row.
    pub fn present(&mut self, row: &Row) -> Value {
        let registry = self.registry;
        let definition = registry.get(row.table());
        let mut values = Map::new();
        values.insert(TYPE_KEY.to_string(), Value::String(row.table().to_string()));

        for (name, value) in row.values() {
            if name == columns::ID || name == columns::RELATION_REFERENCE_ID {
                continue;
            }
            let column = definition.and_then(|d| d.column(name));
            if column.is_some_and(|c| c.exclude_from_api) {
                continue;
            }

            let foreign = column
                .and_then(|c| c.foreign_key.as_ref())
                .filter(|fk| fk.key_name == columns::ID);
            let presented = match (foreign, value.as_i64()) {
                (Some(fk), Some(id)) => self
                    .target(&fk.namespace, id)
                    .and_then(|t| t.reference_id().ok().map(|r| Value::String(r.to_string())))
                    .unwrap_or(Value::Null),
                _ => value.clone(),
            };
            values.insert(name.clone(), presented);
        }
        Value::Object(values)
    }

    /// `(namespace, id)` of every numeric foreign key set on `row`.
    fn foreign_keys(&self, row: &Row) -> Vec<(String, i64)> {
        let Some(definition) = self.registry.get(row.table()) else {
            return Vec::new();
        };
        definition
            .foreign_key_columns()
            .filter(|(_, fk)| fk.key_name == columns::ID)
            .filter_map(|(column, fk)| {
                let id = row.values().get(&column.column_name)?.as_i64()?;
                Some((fk.namespace.clone(), id))
            })
            .collect()
    }

    fn target(&mut self, namespace: &str, id: i64) -> Option<&Row> {
        let store = self.store;
        self.references
            .entry((namespace.to_string(), id))
            .or_insert_with(|| match store.resolve_by_id(namespace, id) {
                Ok(row) => Some(row),
                Err(e) => {
                    warn!(table = %namespace, id, error = %e, "Foreign key target missing");
                    None
                }
            })
            .as_ref()
    }
}
