//! Conformation and validation rules applied to row payloads before writes.
//!
//! Both rule kinds name a column and carry a comma separated tag list, e.g.
//! `{"column_name": "email", "tags": "trim,lowercase"}`.
//!
//! | Conformation | Effect |
//! |--------------|--------|
//! | `trim` | strip surrounding whitespace |
//! | `lowercase` | lowercase the value |
//! | `uppercase` | uppercase the value |
//!
//! | Validation | Check |
//! |------------|-------|
//! | `required` | present and not empty (create only) |
//! | `email` | looks like an email address |
//! | `min=N` | at least N characters |
//! | `max=N` | at most N characters |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SchemaError, ValidationError};

/// Normalizes a column value before it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConformationRule {
    pub column_name: String,
    pub tags: String,
}

/// Rejects a payload whose column value violates a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub column_name: String,
    pub tags: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conform {
    Trim,
    Lowercase,
    Uppercase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    Required,
    Email,
    Min(usize),
    Max(usize),
}

fn split_tags(tags: &str) -> impl Iterator<Item = &str> {
    tags.split(',').map(str::trim).filter(|t| !t.is_empty())
}

fn parse_conform(tag: &str) -> Option<Conform> {
    match tag {
        "trim" => Some(Conform::Trim),
        "lowercase" => Some(Conform::Lowercase),
        "uppercase" => Some(Conform::Uppercase),
        _ => None,
    }
}

fn parse_check(tag: &str) -> Option<Check> {
    match tag.split_once('=') {
        Some(("min", n)) => n.trim().parse().ok().map(Check::Min),
        Some(("max", n)) => n.trim().parse().ok().map(Check::Max),
        Some(_) => None,
        None => match tag {
            "required" => Some(Check::Required),
            "email" => Some(Check::Email),
            _ => None,
        },
    }
}

/// Verifies that every tag of every rule is known.
pub fn check_rules(
    table: &str,
    conformations: &[ConformationRule],
    validations: &[ValidationRule],
) -> Result<(), SchemaError> {
    let unknown = |column: &str, tag: &str| SchemaError::UnknownRule {
        table: table.to_string(),
        column: column.to_string(),
        tag: tag.to_string(),
    };

    for rule in conformations {
        if let Some(tag) = split_tags(&rule.tags).find(|t| parse_conform(t).is_none()) {
            return Err(unknown(&rule.column_name, tag));
        }
    }
    for rule in validations {
        if let Some(tag) = split_tags(&rule.tags).find(|t| parse_check(t).is_none()) {
            return Err(unknown(&rule.column_name, tag));
        }
    }
    Ok(())
}

/// Applies conformation rules to string values in place.
pub fn conform(rules: &[ConformationRule], values: &mut Map<String, Value>) {
    for rule in rules {
        let Some(Value::String(s)) = values.get_mut(&rule.column_name) else {
            continue;
        };
        for tag in split_tags(&rule.tags).filter_map(parse_conform) {
            *s = match tag {
                Conform::Trim => s.trim().to_string(),
                Conform::Lowercase => s.to_lowercase(),
                Conform::Uppercase => s.to_uppercase(),
            };
        }
    }
}

/// Checks `values` against validation rules.
///
/// `required` only applies when `is_create` is true; updates may omit columns.
pub fn validate(
    table: &str,
    rules: &[ValidationRule],
    values: &Map<String, Value>,
    is_create: bool,
) -> Result<(), ValidationError> {
    for rule in rules {
        let value = values.get(&rule.column_name).filter(|v| !v.is_null());
        let text = value.map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        let invalid = |message: String| ValidationError::InvalidField {
            table: table.to_string(),
            column: rule.column_name.clone(),
            message,
        };

        for check in split_tags(&rule.tags).filter_map(parse_check) {
            match (check, text.as_deref()) {
                (Check::Required, None) | (Check::Required, Some("")) if is_create => {
                    return Err(invalid("value is required".to_string()));
                }
                (Check::Email, Some(s)) if !looks_like_email(s) => {
                    return Err(invalid(format!("'{}' is not an email address", s)));
                }
                (Check::Min(n), Some(s)) if s.chars().count() < n => {
                    return Err(invalid(format!("must be at least {} characters", n)));
                }
                (Check::Max(n), Some(s)) if s.chars().count() > n => {
                    return Err(invalid(format!("must be at most {} characters", n)));
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !s.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_conform_chains_tags() {
        let rules = vec![ConformationRule {
            column_name: "email".to_string(),
            tags: "trim, lowercase".to_string(),
        }];
        let mut values = payload(json!({"email": "  Ada@Example.COM ", "name": " x "}));
        conform(&rules, &mut values);
        assert_eq!(values["email"], "ada@example.com");
        assert_eq!(values["name"], " x ");
    }

    #[test]
    fn test_required_only_on_create() {
        let rules = vec![ValidationRule {
            column_name: "name".to_string(),
            tags: "required".to_string(),
        }];
        let empty = payload(json!({}));
        assert!(validate("usergroup", &rules, &empty, true).is_err());
        assert!(validate("usergroup", &rules, &empty, false).is_ok());
        assert!(validate("usergroup", &rules, &payload(json!({"name": ""})), true).is_err());
    }

    #[test]
    fn test_email_and_length() {
        let rules = vec![ValidationRule {
            column_name: "email".to_string(),
            tags: "email,max=20".to_string(),
        }];
        assert!(validate("user_account", &rules, &payload(json!({"email": "a@b.io"})), true).is_ok());
        assert!(validate("user_account", &rules, &payload(json!({"email": "nope"})), true).is_err());
        assert!(
            validate(
                "user_account",
                &rules,
                &payload(json!({"email": "someone.long@example.com"})),
                true
            )
            .is_err()
        );
    }

    #[test]
    fn test_check_rules_rejects_unknown_tags() {
        let conformations = vec![ConformationRule {
            column_name: "name".to_string(),
            tags: "trim,reverse".to_string(),
        }];
        let err = check_rules("usergroup", &conformations, &[]).unwrap_err();
        assert!(err.to_string().contains("reverse"));

        let validations = vec![ValidationRule {
            column_name: "name".to_string(),
            tags: "min=abc".to_string(),
        }];
        assert!(check_rules("usergroup", &[], &validations).is_err());
    }
}
