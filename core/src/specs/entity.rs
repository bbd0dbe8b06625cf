//! Entity, column and key specs.

use indexmap::IndexSet;
use serde::Serialize;

use super::adapter::{ColumnAdapterReference, ValueMapping};
use super::Declared;
use crate::annotations::{Collate, ForeignKeyAction, IndexOrder, OnConflictStrategy, TypeAffinity};
use crate::{TypeRef, simple_name};

/// A resolved `@Entity`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySpec {
    pub declaration: String,
    pub table_name: String,
    /// Properties in declaration order; embedded structs nest.
    pub members: Vec<EntityMember>,
    pub primary_key: PrimaryKeySpec,
    pub foreign_keys: Vec<ForeignKeySpec>,
    pub indices: Vec<IndexSpec>,
    pub constructor: ConstructorSpec,
}

impl EntitySpec {
    pub fn simple_name(&self) -> &str {
        simple_name(&self.declaration)
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(self.declaration.clone())
    }

    /// Every column, including ignored ones, flattened in declaration order.
    pub fn columns(&self) -> Vec<&ColumnSpec> {
        let mut columns = Vec::new();
        collect_columns(&self.members, &mut columns);
        columns
    }

    /// Columns that exist in the table.
    pub fn stored_columns(&self) -> Vec<&ColumnSpec> {
        self.columns()
            .into_iter()
            .filter(|column| column.is_stored())
            .collect()
    }

    /// Looks a stored column up by its column name.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns()
            .into_iter()
            .find(|column| column.is_stored() && column.name == name)
    }

    pub fn primary_key_columns(&self) -> Vec<&ColumnSpec> {
        self.primary_key
            .columns
            .iter()
            .filter_map(|name| self.column(name))
            .collect()
    }

    /// Adapters the entity's stored columns need, in first-use order.
    pub fn adapters(&self) -> IndexSet<ColumnAdapterReference> {
        self.stored_columns()
            .into_iter()
            .filter_map(|column| column.adapter().cloned())
            .collect()
    }
}

impl Declared for EntitySpec {
    fn declaration(&self) -> &str {
        &self.declaration
    }
}

fn collect_columns<'a>(members: &'a [EntityMember], columns: &mut Vec<&'a ColumnSpec>) {
    for member in members {
        match member {
            EntityMember::Column(column) => columns.push(column),
            EntityMember::Embedded(embedded) => collect_columns(&embedded.members, columns),
        }
    }
}

/// One property of an entity or embedded struct.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityMember {
    Column(ColumnSpec),
    Embedded(EmbeddedSpec),
}

impl EntityMember {
    pub fn property(&self) -> &str {
        match self {
            Self::Column(column) => &column.property,
            Self::Embedded(embedded) => &embedded.property,
        }
    }

    pub fn is_stored(&self) -> bool {
        match self {
            Self::Column(column) => column.is_stored(),
            Self::Embedded(_) => true,
        }
    }
}

/// An `@Embedded` property flattened into the owning table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddedSpec {
    pub property: String,
    pub ty: TypeRef,
    /// Effective prefix, including the prefixes of enclosing embeddings.
    pub prefix: String,
    pub is_nullable: bool,
    pub members: Vec<EntityMember>,
    pub constructor: ConstructorSpec,
}

impl EmbeddedSpec {
    pub fn columns(&self) -> Vec<&ColumnSpec> {
        let mut columns = Vec::new();
        collect_columns(&self.members, &mut columns);
        columns
    }
}

/// A resolved column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    /// Property name on the declaring struct.
    pub property: String,
    pub ty: TypeRef,
    /// Column name, prefix included.
    pub name: String,
    /// Storage mapping; `None` for ignored columns.
    pub mapping: Option<ValueMapping>,
    pub is_nullable: bool,
    pub default_value: Option<String>,
    pub collate: Collate,
    pub index: bool,
    pub ignore: Option<IgnoreSpec>,
    pub is_primary_key: bool,
    /// Property path of the enclosing embedding (`address.geo`).
    pub embedded_in: Option<String>,
}

impl ColumnSpec {
    pub fn is_stored(&self) -> bool {
        self.ignore.is_none()
    }

    pub fn affinity(&self) -> Option<TypeAffinity> {
        self.mapping.as_ref().map(ValueMapping::affinity)
    }

    pub fn adapter(&self) -> Option<&ColumnAdapterReference> {
        self.mapping.as_ref().and_then(ValueMapping::adapter)
    }
}

/// Why a column is left out of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreSpec {
    /// `@Ignore` on the property.
    Annotation,
    /// Listed in `Entity.ignoredColumns`.
    IgnoredColumns,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryKeySpec {
    /// Column names in key order.
    pub columns: Vec<String>,
    pub auto_generate: bool,
    pub on_conflict: OnConflictStrategy,
}

impl PrimaryKeySpec {
    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeySpec {
    /// Qualified name of the referenced entity.
    pub entity: String,
    pub table: String,
    pub parent_columns: Vec<String>,
    pub child_columns: Vec<String>,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
    pub deferred: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSpec {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
    /// Empty, or one order per column.
    pub orders: Vec<IndexOrder>,
}

/// How the mapper constructs a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstructorSpec {
    /// Associated function name; `None` means a struct literal.
    pub function: Option<String>,
    /// Property names in argument order.
    pub parameters: Vec<String>,
}

impl ConstructorSpec {
    pub fn struct_literal(parameters: Vec<String>) -> Self {
        Self {
            function: None,
            parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(property: &str, name: &str, mapping: Option<ValueMapping>) -> ColumnSpec {
        ColumnSpec {
            property: property.to_string(),
            ty: TypeRef::new("i32"),
            name: name.to_string(),
            mapping,
            is_nullable: false,
            default_value: None,
            collate: Collate::Unspecified,
            index: false,
            ignore: None,
            is_primary_key: false,
            embedded_in: None,
        }
    }

    fn sample() -> EntitySpec {
        let adapted = ValueMapping::resolve(&TypeRef::new("i32"), TypeAffinity::Undefined);
        let mut ignored = column("cache", "cache", None);
        ignored.ignore = Some(IgnoreSpec::Annotation);
        EntitySpec {
            declaration: "crate::User".to_string(),
            table_name: "User".to_string(),
            members: vec![
                EntityMember::Column(column("id", "id", adapted.clone())),
                EntityMember::Embedded(EmbeddedSpec {
                    property: "address".to_string(),
                    ty: TypeRef::new("crate::Address"),
                    prefix: "address_".to_string(),
                    is_nullable: false,
                    members: vec![EntityMember::Column(column("zip", "address_zip", adapted))],
                    constructor: ConstructorSpec::struct_literal(vec!["zip".to_string()]),
                }),
                EntityMember::Column(ignored),
            ],
            primary_key: PrimaryKeySpec {
                columns: vec!["id".to_string()],
                auto_generate: false,
                on_conflict: OnConflictStrategy::Abort,
            },
            foreign_keys: Vec::new(),
            indices: Vec::new(),
            constructor: ConstructorSpec::struct_literal(vec![
                "id".to_string(),
                "address".to_string(),
                "cache".to_string(),
            ]),
        }
    }

    #[test]
    fn test_columns_flatten_embedded_members() {
        let entity = sample();
        let names: Vec<&str> = entity.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "address_zip", "cache"]);
        assert_eq!(entity.stored_columns().len(), 2);
        assert!(entity.column("cache").is_none());
    }

    #[test]
    fn test_adapters_are_deduplicated() {
        let entity = sample();
        let adapters = entity.adapters();
        assert_eq!(adapters.len(), 1);
        assert_eq!(adapters[0].source_type, TypeRef::new("i32"));
    }

    #[test]
    fn test_primary_key_columns_resolve() {
        let entity = sample();
        assert_eq!(entity.primary_key_columns()[0].property, "id");
        assert!(!entity.primary_key.is_composite());
    }
}
