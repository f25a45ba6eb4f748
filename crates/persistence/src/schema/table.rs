//! Table, column and relation definitions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::permission::PermissionCode;

use super::rules::{ConformationRule, ValidationRule};

/// Column names shared by every governed table.
pub mod columns {
    /// Internal numeric primary key.
    pub const ID: &str = "id";
    /// Opaque external identifier.
    pub const REFERENCE_ID: &str = "reference_id";
    /// Packed [`PermissionCode`](crate::permission::PermissionCode).
    pub const PERMISSION: &str = "permission";
    /// Owning user account.
    pub const OWNER: &str = "user_id";
    /// Creation timestamp.
    pub const CREATED_AT: &str = "created_at";
    /// Last update timestamp.
    pub const UPDATED_AT: &str = "updated_at";
    /// Reference id of the membership row through which a row was reached.
    pub const RELATION_REFERENCE_ID: &str = "relation_reference_id";
}

/// Names of the tables every deployment carries.
pub mod tables {
    /// Actors that can authenticate.
    pub const USER_ACCOUNT: &str = "user_account";
    /// Groups of actors.
    pub const USERGROUP: &str = "usergroup";
    /// Tenant sites.
    pub const SITE: &str = "site";
    /// Storage locations backing sites.
    pub const CLOUD_STORE: &str = "cloud_store";
}

/// Target of a foreign-key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Where the referenced rows live; `self` for this database.
    #[serde(default = "default_data_source")]
    pub data_source: String,
    /// Referenced table.
    pub namespace: String,
    /// Referenced column.
    #[serde(default = "default_key_name")]
    pub key_name: String,
}

fn default_data_source() -> String {
    "self".to_string()
}

fn default_key_name() -> String {
    columns::ID.to_string()
}

impl ForeignKey {
    /// A reference to the numeric id of `table` in this database.
    pub fn to_table(table: impl Into<String>) -> Self {
        Self {
            data_source: default_data_source(),
            namespace: table.into(),
            key_name: default_key_name(),
        }
    }
}

/// A selectable value for enumerated columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOption {
    pub label: String,
    pub value: String,
}

/// One column of a table.
///
/// `column_name` is the physical name and the primary identity when merging.
/// `name` is a display name that also acts as a secondary identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_name: String,
    /// Semantic type such as `label`, `email`, `measurement` or `datetime`.
    pub column_type: String,
    pub is_nullable: bool,
    pub is_indexed: bool,
    pub is_unique: bool,
    pub is_primary_key: bool,
    pub exclude_from_api: bool,
    pub default_value: Option<String>,
    pub options: Vec<ColumnOption>,
    pub foreign_key: Option<ForeignKey>,
}

impl Default for ColumnDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            column_name: String::new(),
            column_type: "label".to_string(),
            is_nullable: true,
            is_indexed: false,
            is_unique: false,
            is_primary_key: false,
            exclude_from_api: false,
            default_value: None,
            options: Vec::new(),
            foreign_key: None,
        }
    }
}

impl ColumnDefinition {
    /// Creates a nullable column whose display name equals its column name.
    pub fn new(column_name: impl Into<String>, column_type: impl Into<String>) -> Self {
        let column_name = column_name.into();
        Self {
            name: column_name.clone(),
            column_name,
            column_type: column_type.into(),
            ..Default::default()
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.is_indexed = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    pub fn excluded_from_api(mut self) -> Self {
        self.exclude_from_api = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey::to_table(table));
        self
    }

    /// Returns true if `other` names the same column.
    ///
    /// Column names are compared first; non-empty display names are the
    /// fallback identity.
    pub fn same_column(&self, other: &ColumnDefinition) -> bool {
        if !self.column_name.is_empty() && self.column_name == other.column_name {
            return true;
        }
        !self.name.is_empty() && self.name == other.name
    }

    /// SQLite storage class for the semantic type.
    pub fn sql_type(&self) -> &'static str {
        if self.foreign_key.is_some() {
            return "INTEGER";
        }
        match self.column_type.as_str() {
            "id" | "integer" | "measurement" | "truefalse" | "timestamp" => "INTEGER",
            "value" | "float" | "money" => "REAL",
            "content" | "json" | "file" => "TEXT",
            _ => "TEXT",
        }
    }
}

/// Kind of association between two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// The subject holds a foreign key to one object row.
    BelongsTo,
    /// The subject holds a unique foreign key to one object row.
    HasOne,
    /// Many object rows, linked through a join table.
    HasMany,
    /// Many-to-many, linked through a join table.
    HasManyAndBelongsToMany,
}

impl RelationType {
    fn as_str(self) -> &'static str {
        match self {
            RelationType::BelongsTo => "belongs_to",
            RelationType::HasOne => "has_one",
            RelationType::HasMany => "has_many",
            RelationType::HasManyAndBelongsToMany => "has_many_and_belongs_to_many",
        }
    }

    /// Returns true if rows are linked through a generated join table.
    pub fn uses_join_table(self) -> bool {
        matches!(
            self,
            RelationType::HasMany | RelationType::HasManyAndBelongsToMany
        )
    }
}

/// An association from a subject table to an object table.
///
/// For `belongs_to` and `has_one`, `object_name` is the foreign-key column on
/// the subject table. For join-table relations, `subject_name` and
/// `object_name` are the two foreign-key columns of the join table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDefinition {
    pub subject: String,
    pub subject_name: String,
    pub object: String,
    pub object_name: String,
    pub relation: RelationType,
}

impl RelationDefinition {
    /// `subject.<column>` references one `object` row.
    pub fn belongs_to(
        subject: impl Into<String>,
        object: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        let subject = subject.into();
        Self {
            subject_name: format!("{}_id", subject),
            subject,
            object: object.into(),
            object_name: column.into(),
            relation: RelationType::BelongsTo,
        }
    }

    /// Many-to-many association through a join table.
    pub fn has_many_and_belongs_to_many(
        subject: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        let subject = subject.into();
        let object = object.into();
        Self {
            subject_name: format!("{}_id", subject),
            object_name: format!("{}_id", object),
            subject,
            object,
            relation: RelationType::HasManyAndBelongsToMany,
        }
    }

    /// SHA-256 over every field, hex encoded. Two relations with the same hash
    /// are the same relation.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.subject.as_str(),
            self.subject_name.as_str(),
            self.object.as_str(),
            self.object_name.as_str(),
            self.relation.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// Name of the generated join table.
    pub fn join_table_name(&self) -> String {
        format!(
            "{}_{}_has_{}_{}",
            self.subject, self.subject_name, self.object, self.object_name
        )
    }
}

/// How the permission of a table's rows is resolved, decided once when the
/// schema is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationKind {
    /// Owner and permission column only.
    #[default]
    Direct,
    /// Rows are additionally shared with groups through a membership table.
    BelongsToGroup,
    /// Rows of a join table; ownership comes from the parent row named by
    /// `parent_column`.
    JoinRow {
        parent_table: String,
        parent_column: String,
    },
    /// Rows of the group table itself.
    GroupObject,
}

/// A table as configured and as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub relations: Vec<RelationDefinition>,
    /// Applied to newly created rows.
    #[serde(default = "default_row_permission")]
    pub default_permission: PermissionCode,
    /// Names of the groups new rows are shared with.
    #[serde(default)]
    pub default_groups: Vec<String>,
    #[serde(default)]
    pub conformations: Vec<ConformationRule>,
    #[serde(default)]
    pub validations: Vec<ValidationRule>,
    #[serde(default)]
    pub relation_kind: RelationKind,
    #[serde(default)]
    pub is_join_table: bool,
}

fn default_row_permission() -> PermissionCode {
    PermissionCode::DEFAULT_ROW
}

impl TableDefinition {
    /// Creates an empty table with the default row permission.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            relations: Vec::new(),
            default_permission: PermissionCode::DEFAULT_ROW,
            default_groups: Vec::new(),
            conformations: Vec::new(),
            validations: Vec::new(),
            relation_kind: RelationKind::Direct,
            is_join_table: false,
        }
    }

    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_relation(mut self, relation: RelationDefinition) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn with_default_permission(mut self, permission: PermissionCode) -> Self {
        self.default_permission = permission;
        self
    }

    /// Looks up a column by its physical name.
    pub fn column(&self, column_name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.column_name == column_name)
    }

    pub fn has_column(&self, column_name: &str) -> bool {
        self.column(column_name).is_some()
    }

    /// Columns exposed through the HTTP API.
    pub fn api_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns
            .iter()
            .filter(|c| !c.exclude_from_api && c.column_name != columns::ID)
    }

    /// Columns holding foreign keys.
    pub fn foreign_key_columns(&self) -> impl Iterator<Item = (&ColumnDefinition, &ForeignKey)> {
        self.columns
            .iter()
            .filter_map(|c| c.foreign_key.as_ref().map(|fk| (c, fk)))
    }

    /// Returns true if rows of this table are shared with usergroups.
    pub fn has_many_usergroups(&self) -> bool {
        self.relations.iter().any(|r| {
            r.subject == self.table_name
                && r.object == tables::USERGROUP
                && r.relation.uses_join_table()
        })
    }

    /// Relations identified by content hash.
    pub fn contains_relation(&self, relation: &RelationDefinition) -> bool {
        let hash = relation.content_hash();
        self.relations.iter().any(|r| r.content_hash() == hash)
    }
}
