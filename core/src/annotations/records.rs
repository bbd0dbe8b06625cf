//! Typed annotation records and their defaults.

use serde::Serialize;

use super::constants::{Collate, ForeignKeyAction, IndexOrder, OnConflictStrategy, TypeAffinity};
use super::{AnnotationRecord, Arguments};
use crate::TypeRef;
use crate::error::ValidationError;

/// Marks a struct as a persisted table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Entity {
    /// Table name; empty means the struct's simple name.
    pub table_name: String,
    pub indices: Vec<Index>,
    /// Property names excluded from the table.
    pub ignored_columns: Vec<String>,
    /// Composite primary key column names, in key order.
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl AnnotationRecord for Entity {
    const NAME: &'static str = "Entity";

    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            table_name: arguments.string("tableName")?.unwrap_or_default(),
            indices: arguments.nested_list("indices")?,
            ignored_columns: arguments.strings("ignoredColumns")?,
            primary_keys: arguments.strings("primaryKeys")?,
            foreign_keys: arguments.nested_list("foreignKeys")?,
        })
    }
}

/// Column overrides for a property.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnInfo {
    /// Column name; empty means the property name.
    pub name: String,
    pub type_affinity: TypeAffinity,
    /// Creates a single-column index.
    pub index: bool,
    pub collate: Collate,
    /// SQL literal used as the column default.
    pub default_value: Option<String>,
}

impl AnnotationRecord for ColumnInfo {
    const NAME: &'static str = "ColumnInfo";

    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            name: arguments.string("name")?.unwrap_or_default(),
            type_affinity: arguments.constant("typeAffinity")?.unwrap_or_default(),
            index: arguments.bool("index")?.unwrap_or(false),
            collate: arguments.constant("collate")?.unwrap_or_default(),
            default_value: arguments.literal("defaultValue")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrimaryKey {
    pub auto_generate: bool,
    pub on_conflict: OnConflictStrategy,
}

impl AnnotationRecord for PrimaryKey {
    const NAME: &'static str = "PrimaryKey";

    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            auto_generate: arguments.bool("autoGenerate")?.unwrap_or(false),
            on_conflict: arguments.constant("onConflict")?.unwrap_or_default(),
        })
    }
}

/// Table-level foreign key, declared inside `Entity.foreignKeys`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignKey {
    pub entity: TypeRef,
    pub parent_columns: Vec<String>,
    pub child_columns: Vec<String>,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
    pub deferred: bool,
}

impl AnnotationRecord for ForeignKey {
    const NAME: &'static str = "ForeignKey";

    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        let entity = arguments.class("entity")?;
        let entity = arguments.required("entity", entity)?;
        let parent_columns = arguments.strings("parentColumns")?;
        let child_columns = arguments.strings("childColumns")?;
        if parent_columns.is_empty() || parent_columns.len() != child_columns.len() {
            return Err(ValidationError::ForeignKeyColumnMismatch(entity.name));
        }
        Ok(Self {
            entity,
            parent_columns,
            child_columns,
            on_delete: arguments.constant("onDelete")?.unwrap_or_default(),
            on_update: arguments.constant("onUpdate")?.unwrap_or_default(),
            deferred: arguments.bool("deferred")?.unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Index {
    /// Index name; empty derives `index_<table>_<columns>`.
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
    /// Per-column orders; empty means unspecified for every column.
    pub orders: Vec<IndexOrder>,
}

impl AnnotationRecord for Index {
    const NAME: &'static str = "Index";

    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        let name = arguments.string("name")?.unwrap_or_default();
        let unique = arguments.bool("unique")?.unwrap_or(false);
        let columns = arguments.strings("columns")?;
        if columns.is_empty() {
            return Err(ValidationError::EmptyIndexColumns);
        }
        let orders = arguments.constants("orders")?;
        if !orders.is_empty() && orders.len() != columns.len() {
            return Err(ValidationError::IndexOrderMismatch {
                index: name,
                columns: columns.len(),
                orders: orders.len(),
            });
        }
        Ok(Self {
            name,
            unique,
            columns,
            orders,
        })
    }
}

/// Flattens another struct's columns into the owning table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Embedded {
    pub prefix: String,
}

impl AnnotationRecord for Embedded {
    const NAME: &'static str = "Embedded";

    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            prefix: arguments.string("prefix")?.unwrap_or_default(),
        })
    }
}

/// A derived association loaded by matching column values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relation {
    /// Target entity; absent means the property's element type.
    pub entity: Option<TypeRef>,
    pub parent_column: String,
    pub entity_column: String,
    pub projection: Vec<String>,
    pub associate_by: Option<Junction>,
}

impl AnnotationRecord for Relation {
    const NAME: &'static str = "Relation";

    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        let entity = arguments.class("entity")?;
        let parent_column = arguments.string("parentColumn")?;
        let entity_column = arguments.string("entityColumn")?;
        Ok(Self {
            entity,
            parent_column: arguments.required("parentColumn", parent_column)?,
            entity_column: arguments.required("entityColumn", entity_column)?,
            projection: arguments.strings("projection")?,
            associate_by: arguments.nested("associateBy")?,
        })
    }
}

/// Many-to-many link table used by a [`Relation`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Junction {
    pub value: TypeRef,
    /// Junction column matching the relation's parent column; empty reuses
    /// the relation's `parentColumn`.
    pub parent_column: String,
    /// Junction column matching the relation's entity column; empty reuses
    /// the relation's `entityColumn`.
    pub entity_column: String,
}

impl AnnotationRecord for Junction {
    const NAME: &'static str = "Junction";

    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        let value = arguments.class("value")?;
        Ok(Self {
            value: arguments.required("value", value)?,
            parent_column: arguments.string("parentColumn")?.unwrap_or_default(),
            entity_column: arguments.string("entityColumn")?.unwrap_or_default(),
        })
    }
}

/// Excludes a property from its table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ignore;

impl AnnotationRecord for Ignore {
    const NAME: &'static str = "Ignore";

    fn parse(_arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        Ok(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Database {
    pub entities: Vec<TypeRef>,
    pub version: i64,
}

impl AnnotationRecord for Database {
    const NAME: &'static str = "Database";

    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        let entities = arguments.classes("entities")?;
        if entities.is_empty() {
            return Err(ValidationError::EmptyDatabaseEntities);
        }
        let version = arguments.integer("version")?;
        let version = arguments.required("version", version)?;
        if version < 1 {
            return Err(ValidationError::InvalidDatabaseVersion(version));
        }
        Ok(Self { entities, version })
    }
}

/// Converter types a database may instantiate for non-native columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeConverters {
    pub value: Vec<TypeRef>,
}

impl AnnotationRecord for TypeConverters {
    const NAME: &'static str = "TypeConverters";

    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            value: arguments.classes("value")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dao;

impl AnnotationRecord for Dao {
    const NAME: &'static str = "Dao";

    fn parse(_arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        Ok(Self)
    }
}

/// Raw SQL bound to a DAO function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub value: String,
}

impl AnnotationRecord for Query {
    const NAME: &'static str = "Query";

    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        let value = match arguments.string("value")? {
            Some(value) => Some(value),
            None => arguments.string("sql")?,
        };
        Ok(Self {
            value: arguments.required("value", value)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Insert {
    pub entity: Option<TypeRef>,
    pub on_conflict: OnConflictStrategy,
}

impl AnnotationRecord for Insert {
    const NAME: &'static str = "Insert";

    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            entity: arguments.class("entity")?,
            on_conflict: arguments.constant("onConflict")?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Update {
    pub entity: Option<TypeRef>,
    pub on_conflict: OnConflictStrategy,
}

impl AnnotationRecord for Update {
    const NAME: &'static str = "Update";

    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            entity: arguments.class("entity")?,
            on_conflict: arguments.constant("onConflict")?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Delete {
    pub entity: Option<TypeRef>,
}

impl AnnotationRecord for Delete {
    const NAME: &'static str = "Delete";

    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            entity: arguments.class("entity")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnnotationDeclaration, AnnotationValue};

    #[test]
    fn test_entity_defaults() {
        let entity = Entity::from_declaration(&AnnotationDeclaration::new("Entity")).unwrap();
        assert_eq!(entity, Entity::default());
    }

    #[test]
    fn test_entity_with_nested_indices_and_foreign_keys() {
        let raw = AnnotationDeclaration::new("Entity")
            .with_argument("tableName", "pets")
            .with_argument(
                "indices",
                AnnotationValue::Array(vec![AnnotationValue::Annotation(
                    AnnotationDeclaration::new("Index")
                        .with_argument("unique", true)
                        .with_argument("columns", AnnotationValue::Array(vec!["owner_id".into()])),
                )]),
            )
            .with_argument(
                "foreignKeys",
                AnnotationValue::Annotation(
                    AnnotationDeclaration::new("ForeignKey")
                        .with_argument("entity", AnnotationValue::class(TypeRef::new("crate::User")))
                        .with_argument("parentColumns", "id")
                        .with_argument("childColumns", "owner_id")
                        .with_argument("onDelete", AnnotationValue::constant("CASCADE")),
                ),
            );

        let entity = Entity::from_declaration(&raw).unwrap();
        assert_eq!(entity.table_name, "pets");
        assert!(entity.indices[0].unique);
        assert_eq!(entity.foreign_keys[0].on_delete, ForeignKeyAction::Cascade);
        assert_eq!(entity.foreign_keys[0].on_update, ForeignKeyAction::NoAction);
        assert_eq!(entity.foreign_keys[0].child_columns, vec!["owner_id".to_string()]);
    }

    #[test]
    fn test_foreign_key_column_counts_must_match() {
        let raw = AnnotationDeclaration::new("ForeignKey")
            .with_argument("entity", AnnotationValue::class(TypeRef::new("crate::User")))
            .with_argument("parentColumns", AnnotationValue::Array(vec!["id".into(), "name".into()]))
            .with_argument("childColumns", "owner_id");
        assert_eq!(
            ForeignKey::from_declaration(&raw),
            Err(ValidationError::ForeignKeyColumnMismatch("crate::User".to_string()))
        );
    }

    #[test]
    fn test_database_requires_positive_version() {
        let raw = AnnotationDeclaration::new("Database")
            .with_argument("entities", AnnotationValue::class(TypeRef::new("crate::User")))
            .with_argument("version", 0i64);
        assert_eq!(
            Database::from_declaration(&raw),
            Err(ValidationError::InvalidDatabaseVersion(0))
        );

        let missing = AnnotationDeclaration::new("Database")
            .with_argument("entities", AnnotationValue::class(TypeRef::new("crate::User")));
        assert_eq!(
            Database::from_declaration(&missing),
            Err(ValidationError::MissingAttribute {
                annotation: "Database".to_string(),
                attribute: "version".to_string(),
            })
        );
    }

    #[test]
    fn test_query_accepts_sql_alias() {
        let raw = AnnotationDeclaration::new("Query").with_argument("sql", "SELECT 1");
        assert_eq!(Query::from_declaration(&raw).unwrap().value, "SELECT 1");

        let empty = AnnotationDeclaration::new("Query");
        assert!(matches!(
            Query::from_declaration(&empty),
            Err(ValidationError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn test_delete_has_no_conflict_strategy() {
        let raw = AnnotationDeclaration::new("Delete")
            .with_argument("onConflict", AnnotationValue::constant("REPLACE"));
        assert!(matches!(
            Delete::from_declaration(&raw),
            Err(ValidationError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_column_info_default_value_literals() {
        let raw = AnnotationDeclaration::new("ColumnInfo").with_argument("defaultValue", 42i64);
        let column = ColumnInfo::from_declaration(&raw).unwrap();
        assert_eq!(column.default_value.as_deref(), Some("42"));
        assert_eq!(column.type_affinity, TypeAffinity::Undefined);
    }
}
