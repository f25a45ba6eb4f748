//! Typed access to a single table row.

use serde_json::{Map, Value};

use crate::error::LookupError;
use crate::schema::columns;

/// One row of a governed table.
///
/// Column values are plain JSON values. Accessors return
/// [`LookupError::MissingColumn`] instead of silently yielding a default when a
/// column is absent or null.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    table: String,
    values: Map<String, Value>,
}

impl Row {
    pub fn new(table: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            table: table.into(),
            values,
        }
    }

    /// The minimal permission envelope of a row: its table, reference id and,
    /// when known, the membership row it was reached through.
    pub fn envelope(
        table: impl Into<String>,
        reference_id: impl Into<String>,
        relation_reference_id: Option<String>,
    ) -> Self {
        let mut values = Map::new();
        values.insert(
            columns::REFERENCE_ID.to_string(),
            Value::String(reference_id.into()),
        );
        if let Some(relation) = relation_reference_id {
            values.insert(
                columns::RELATION_REFERENCE_ID.to_string(),
                Value::String(relation),
            );
        }
        Self::new(table, values)
    }

    /// Name of the table the row belongs to.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.values
    }

    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }

    /// Returns true if the column is present and not null.
    pub fn contains(&self, column: &str) -> bool {
        self.values.get(column).is_some_and(|v| !v.is_null())
    }

    /// Returns the column value, treating null as absent.
    pub fn get(&self, column: &str) -> Result<&Value, LookupError> {
        self.values
            .get(column)
            .filter(|v| !v.is_null())
            .ok_or_else(|| self.missing(column))
    }

    pub fn text(&self, column: &str) -> Result<&str, LookupError> {
        self.get(column)?
            .as_str()
            .ok_or_else(|| self.wrong_type(column, "text"))
    }

    pub fn integer(&self, column: &str) -> Result<i64, LookupError> {
        let value = self.get(column)?;
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| self.wrong_type(column, "an integer"))
    }

    /// The row's non-empty reference id.
    pub fn reference_id(&self) -> Result<&str, LookupError> {
        let reference_id = self.text(columns::REFERENCE_ID)?;
        if reference_id.is_empty() {
            return Err(self.missing(columns::REFERENCE_ID));
        }
        Ok(reference_id)
    }

    pub fn relation_reference_id(&self) -> Option<&str> {
        self.text(columns::RELATION_REFERENCE_ID).ok()
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    fn missing(&self, column: &str) -> LookupError {
        LookupError::MissingColumn {
            table: self.table.clone(),
            column: column.to_string(),
        }
    }

    fn wrong_type(&self, column: &str, expected: &'static str) -> LookupError {
        LookupError::WrongType {
            table: self.table.clone(),
            column: column.to_string(),
            expected,
        }
    }
}
