//! DAO and query specs.

use std::sync::Arc;

use indexmap::IndexSet;
use serde::Serialize;

use super::adapter::{ColumnAdapterReference, ValueMapping};
use super::entity::EntitySpec;
use super::relation::{CompoundSpec, RelationElement};
use super::{Declared, serialize_declaration};
use crate::annotations::OnConflictStrategy;
use crate::{TypeRef, simple_name};

/// A resolved `@Dao` trait.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaoSpec {
    pub declaration: String,
    /// One query per abstract function, in declaration order.
    pub queries: Vec<QuerySpec>,
}

impl DaoSpec {
    pub fn simple_name(&self) -> &str {
        simple_name(&self.declaration)
    }

    /// Entities whose mapper the queries read rows through, in first-use
    /// order. Compound relations and operation targets are included.
    pub fn entities(&self) -> Vec<&Arc<EntitySpec>> {
        let mut seen = IndexSet::new();
        let mut entities = Vec::new();
        for query in &self.queries {
            for entity in query.entities() {
                if seen.insert(entity.declaration.as_str()) {
                    entities.push(entity);
                }
            }
        }
        entities
    }

    /// Compound row types, deduplicated by declaration.
    pub fn compounds(&self) -> Vec<&Arc<CompoundSpec>> {
        let mut seen = IndexSet::new();
        self.queries
            .iter()
            .filter_map(|query| match query.returns.shape.row_type() {
                Some(RowType::Compound(compound)) => Some(compound),
                _ => None,
            })
            .filter(|compound| seen.insert(compound.declaration.clone()))
            .collect()
    }

    /// Adapters used directly by queries for parameters and scalar results.
    /// Adapters used inside mappers are reported by the entities instead.
    pub fn binding_adapters(&self) -> IndexSet<ColumnAdapterReference> {
        let mut adapters = IndexSet::new();
        for query in &self.queries {
            for parameter in &query.parameters {
                if let Some(adapter) = parameter.binding.mapping().and_then(ValueMapping::adapter) {
                    adapters.insert(adapter.clone());
                }
            }
            if let Some(RowType::Scalar { mapping, .. }) = query.returns.shape.row_type() {
                if let Some(adapter) = mapping.adapter() {
                    adapters.insert(adapter.clone());
                }
            }
            if let Some(compound) = query.returns.shape.row_type().and_then(RowType::compound) {
                for relation in &compound.relations {
                    if let RelationElement::Scalar { mapping, .. } = &relation.relation.element {
                        if let Some(adapter) = mapping.adapter() {
                            adapters.insert(adapter.clone());
                        }
                    }
                }
            }
        }
        adapters
    }
}

impl Declared for DaoSpec {
    fn declaration(&self) -> &str {
        &self.declaration
    }
}

/// One DAO function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySpec {
    pub function: String,
    pub parameters: Vec<ParameterSpec>,
    pub returns: ReturnSpec,
    pub kind: QueryKind,
}

impl QuerySpec {
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }

    /// Entities this query reads or writes.
    pub fn entities(&self) -> Vec<&Arc<EntitySpec>> {
        let mut entities = Vec::new();
        match &self.kind {
            QueryKind::Insert(operation) | QueryKind::Update(operation) | QueryKind::Delete(operation) => {
                entities.push(&operation.entity);
            }
            QueryKind::Raw(_) => {}
        }
        match self.returns.shape.row_type() {
            Some(RowType::Entity(entity)) => entities.push(entity),
            Some(RowType::Compound(compound)) => entities.extend(compound.entities()),
            _ => {}
        }
        entities
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub name: String,
    pub ty: TypeRef,
    pub binding: ParameterBinding,
}

/// How an argument reaches the statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterBinding {
    /// One placeholder, one value.
    Value(ValueMapping),
    /// A `Vec<T>` expanded to one placeholder per element.
    List(ValueMapping),
    /// The entity operated on by insert/update/delete.
    #[serde(serialize_with = "serialize_declaration")]
    Entity(Arc<EntitySpec>),
    /// A list of entities, written in one transaction.
    #[serde(serialize_with = "serialize_declaration")]
    EntityList(Arc<EntitySpec>),
}

impl ParameterBinding {
    pub fn mapping(&self) -> Option<&ValueMapping> {
        match self {
            Self::Value(mapping) | Self::List(mapping) => Some(mapping),
            Self::Entity(_) | Self::EntityList(_) => None,
        }
    }
}

/// The operation a function performs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Raw(RawQuerySpec),
    Insert(EntityOperationSpec),
    Update(EntityOperationSpec),
    Delete(EntityOperationSpec),
}

impl QueryKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Raw(_) => "query",
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }
}

/// Parsed `@Query` SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawQuerySpec {
    /// SQL as written.
    pub sql: String,
    /// The SQL split at every `:name` placeholder.
    pub segments: Vec<SqlSegment>,
    /// Parameter names in placeholder order; repeats allowed.
    pub bindings: Vec<String>,
    pub statement: StatementKind,
}

impl RawQuerySpec {
    /// The SQL with every placeholder replaced by `?`.
    ///
    /// List parameters need a placeholder per element and are expanded at
    /// run time instead.
    pub fn positional_sql(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                SqlSegment::Text(text) => text.as_str(),
                SqlSegment::Parameter(_) => "?",
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlSegment {
    Text(String),
    Parameter(String),
}

/// Statement family, from the leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    pub fn returns_rows(self) -> bool {
        self == Self::Select
    }
}

/// Target of an insert, update or delete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityOperationSpec {
    #[serde(serialize_with = "serialize_declaration")]
    pub entity: Arc<EntitySpec>,
    /// Name of the function parameter carrying the entity.
    pub parameter: String,
    pub is_list: bool,
    /// Always `ABORT` for deletes.
    pub on_conflict: OnConflictStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnSpec {
    /// The type as declared on the trait.
    pub declared: TypeRef,
    pub wrapping: ReturnWrapping,
    pub shape: ReturnShape,
}

/// Whether the declared return type wraps the value in a `Result`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnWrapping {
    /// Errors panic.
    Plain,
    /// `Result<T>` from the runtime.
    Result,
    /// `Result<T, E>` with `E: From<KabinError>`.
    ResultWith(TypeRef),
}

/// What a query returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnShape {
    Unit,
    /// Number of changed rows, converted to the given integer type.
    AffectedRows(TypeRef),
    /// Exactly one row.
    Single(RowType),
    /// Zero or one row.
    Optional(RowType),
    List(RowType),
}

impl ReturnShape {
    pub fn row_type(&self) -> Option<&RowType> {
        match self {
            Self::Single(row) | Self::Optional(row) | Self::List(row) => Some(row),
            Self::Unit | Self::AffectedRows(_) => None,
        }
    }

    pub fn returns_rows(&self) -> bool {
        self.row_type().is_some()
    }
}

/// What a single row becomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowType {
    #[serde(serialize_with = "serialize_declaration")]
    Entity(Arc<EntitySpec>),
    #[serde(serialize_with = "serialize_declaration")]
    Compound(Arc<CompoundSpec>),
    /// First column of the row.
    Scalar { ty: TypeRef, mapping: ValueMapping },
}

impl RowType {
    pub fn compound(&self) -> Option<&Arc<CompoundSpec>> {
        match self {
            Self::Compound(compound) => Some(compound),
            _ => None,
        }
    }

    /// Rust type of one row.
    pub fn ty(&self) -> TypeRef {
        match self {
            Self::Entity(entity) => entity.type_ref(),
            Self::Compound(compound) => TypeRef::new(compound.declaration.clone()),
            Self::Scalar { ty, .. } => ty.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_sql_replaces_placeholders() {
        let raw = RawQuerySpec {
            sql: "SELECT * FROM User WHERE id = :id AND name = :name".to_string(),
            segments: vec![
                SqlSegment::Text("SELECT * FROM User WHERE id = ".to_string()),
                SqlSegment::Parameter("id".to_string()),
                SqlSegment::Text(" AND name = ".to_string()),
                SqlSegment::Parameter("name".to_string()),
            ],
            bindings: vec!["id".to_string(), "name".to_string()],
            statement: StatementKind::Select,
        };
        assert_eq!(
            raw.positional_sql(),
            "SELECT * FROM User WHERE id = ? AND name = ?"
        );
    }

    fn entity(name: &str) -> Arc<EntitySpec> {
        Arc::new(EntitySpec {
            declaration: format!("crate::{name}"),
            table_name: name.to_string(),
            members: Vec::new(),
            primary_key: crate::PrimaryKeySpec {
                columns: vec!["id".to_string()],
                auto_generate: false,
                on_conflict: OnConflictStrategy::Abort,
            },
            foreign_keys: Vec::new(),
            indices: Vec::new(),
            constructor: crate::ConstructorSpec::struct_literal(Vec::new()),
        })
    }

    #[test]
    fn test_binding_adapters_include_projected_relations() {
        let note = entity("Note");
        let flags = crate::CompoundRelationSpec {
            property: "flags".to_string(),
            relation: crate::RelationSpec {
                parent_column: "id".to_string(),
                entity: Arc::clone(&note),
                entity_table: "Note".to_string(),
                entity_column: "author_id".to_string(),
                cardinality: crate::RelationCardinality::Many,
                junction: None,
                projection: vec!["pinned".to_string()],
                element: RelationElement::Scalar {
                    column: "pinned".to_string(),
                    ty: TypeRef::new("bool"),
                    mapping: ValueMapping::resolve(&TypeRef::new("bool"), crate::TypeAffinity::Undefined).unwrap(),
                },
            },
        };
        let compound = Arc::new(CompoundSpec {
            declaration: "crate::UserWithFlags".to_string(),
            main_property: "user".to_string(),
            main: entity("User"),
            relations: vec![flags],
            constructor: crate::ConstructorSpec::struct_literal(Vec::new()),
        });
        let dao = DaoSpec {
            declaration: "crate::UserDao".to_string(),
            queries: vec![QuerySpec {
                function: "with_flags".to_string(),
                parameters: Vec::new(),
                returns: ReturnSpec {
                    declared: TypeRef::new("Vec").with_argument(TypeRef::new("crate::UserWithFlags")),
                    wrapping: ReturnWrapping::Plain,
                    shape: ReturnShape::List(RowType::Compound(compound)),
                },
                kind: QueryKind::Raw(RawQuerySpec {
                    sql: "SELECT * FROM User".to_string(),
                    segments: vec![SqlSegment::Text("SELECT * FROM User".to_string())],
                    bindings: Vec::new(),
                    statement: StatementKind::Select,
                }),
            }],
        };

        let adapters: Vec<String> = dao
            .binding_adapters()
            .iter()
            .map(|adapter| adapter.source_type.to_rust())
            .collect();
        assert_eq!(adapters, vec!["bool"]);
        assert_eq!(dao.compounds().len(), 1);
    }

    #[test]
    fn test_return_shape_row_type() {
        let scalar = RowType::Scalar {
            ty: TypeRef::new("i64"),
            mapping: ValueMapping::Native(crate::TypeAffinity::Integer),
        };
        assert!(ReturnShape::List(scalar.clone()).returns_rows());
        assert!(!ReturnShape::AffectedRows(TypeRef::new("u64")).returns_rows());
        assert_eq!(scalar.ty(), TypeRef::new("i64"));
    }
}
