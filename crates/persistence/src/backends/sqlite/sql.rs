//! SQL text and value conversion helpers.

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Number, Value};

use crate::core::Row;
use crate::error::{SchemaError, StorageResult};

const MAX_IDENTIFIER_LEN: usize = 128;

/// Checks that a table or column name is a plain SQL identifier.
pub(crate) fn check_identifier(identifier: &str) -> Result<(), SchemaError> {
    let mut chars = identifier.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && identifier.len() <= MAX_IDENTIFIER_LEN {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

/// Validates and double-quotes an identifier.
pub(crate) fn quoted(identifier: &str) -> StorageResult<String> {
    check_identifier(identifier)?;
    Ok(format!("\"{}\"", identifier))
}

/// Renders a default value as a SQL string literal.
pub(crate) fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Converts a JSON value into a bindable SQLite value.
pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(hex::encode(b)),
    }
}

/// Reads the current result row into a [`Row`] of `table`.
pub(crate) fn read_row(
    table: &str,
    column_names: &[String],
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<Row> {
    let mut values = Map::with_capacity(column_names.len());
    for (index, name) in column_names.iter().enumerate() {
        values.insert(name.clone(), to_json(row.get_ref(index)?));
    }
    Ok(Row::new(table, values))
}

/// Runs a query and collects every result row.
pub(crate) fn query_rows(
    conn: &rusqlite::Connection,
    table: &str,
    sql: &str,
    params: impl rusqlite::Params,
) -> StorageResult<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let column_names: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let rows = stmt
        .query_map(params, |row| read_row(table, &column_names, row))?
        .collect::<rusqlite::Result<Vec<Row>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifiers() {
        assert!(check_identifier("invoice").is_ok());
        assert!(check_identifier("_private_2").is_ok());
        assert!(check_identifier("invoice_invoice_id_has_usergroup_usergroup_id").is_ok());
        assert!(check_identifier("").is_err());
        assert!(check_identifier("2fast").is_err());
        assert!(check_identifier("name\"; DROP TABLE x; --").is_err());
        assert!(check_identifier("white space").is_err());
        assert!(check_identifier(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_literal_escapes_quotes() {
        assert_eq!(literal("it's"), "'it''s'");
    }

    #[test]
    fn test_to_sql() {
        assert_eq!(to_sql(&json!(true)), SqlValue::Integer(1));
        assert_eq!(to_sql(&json!(12)), SqlValue::Integer(12));
        assert_eq!(to_sql(&json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(to_sql(&json!("x")), SqlValue::Text("x".to_string()));
        assert_eq!(to_sql(&json!({"a": 1})), SqlValue::Text("{\"a\":1}".to_string()));
    }
}
