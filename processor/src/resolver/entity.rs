//! Entity resolution: columns, embedded structs, keys, indices and
//! constructors.

use std::collections::HashSet;
use std::sync::Arc;

use kabin_core::annotations::{self, ColumnInfo, Embedded, Entity, Ignore, PrimaryKey};
use kabin_core::{
    ClassDeclaration, ColumnSpec, ConstructorSpec, Diagnostic, EmbeddedSpec, EntityMember,
    EntitySpec, ForeignKeySpec, GenerationError, IgnoreSpec, IndexSpec, OnConflictStrategy,
    PrimaryKeySpec, PropertyDeclaration, ResolutionError, TypeAffinity, ValidationError,
    ValueMapping,
};
use tracing::{debug, instrument};

use super::{Resolved, Resolver, parse};

/// Where a member list sits inside its entity.
struct MemberScope<'a> {
    /// Qualified name of the entity; diagnostics are anchored under it.
    entity: &'a str,
    prefix: String,
    /// Set inside an `Option<Embedded>`.
    nullable: bool,
    /// Property path of the enclosing embedding.
    path: Option<String>,
    ignored: &'a [String],
    /// Qualified names from the entity down to the current struct.
    stack: Vec<String>,
}

/// A `@PrimaryKey` found on a property.
struct KeyCandidate {
    anchor: String,
    columns: Vec<String>,
    record: PrimaryKey,
}

impl<'d> Resolver<'d> {
    #[instrument(skip_all, fields(entity = %declaration.qualified_name))]
    pub(super) fn resolve_entity(&mut self, declaration: &'d ClassDeclaration) -> Resolved<Arc<EntitySpec>> {
        let shape = self.entity_shape(declaration)?;
        let record = annotations::find::<Entity>(&declaration.annotations)
            .ok()
            .flatten()
            .unwrap_or_default();
        let owner = declaration.qualified_name.as_str();
        let mut diagnostics = Vec::new();
        let mut foreign_keys = Vec::new();

        for foreign_key in record.foreign_keys {
            let target = self
                .declarations
                .resolve(&foreign_key.entity)
                .filter(|target| annotations::is_present::<Entity>(&target.annotations));
            let Some(target) = target else {
                diagnostics.push(Diagnostic::new(
                    owner,
                    ResolutionError::UnresolvedForeignKeyTarget(foreign_key.entity.to_rust()),
                ));
                continue;
            };
            let Ok(parent) = self.entity_shape(target) else {
                diagnostics.push(Diagnostic::new(
                    owner,
                    ResolutionError::DependencyFailed(target.qualified_name.clone()),
                ));
                continue;
            };
            for column in &foreign_key.parent_columns {
                if parent.column(column).is_none() {
                    diagnostics.push(Diagnostic::new(
                        owner,
                        ResolutionError::UnresolvedColumn {
                            table: parent.table_name.clone(),
                            column: column.clone(),
                        },
                    ));
                }
            }
            for column in &foreign_key.child_columns {
                if shape.column(column).is_none() {
                    diagnostics.push(Diagnostic::new(
                        owner,
                        ResolutionError::UnresolvedColumn {
                            table: shape.table_name.clone(),
                            column: column.clone(),
                        },
                    ));
                }
            }
            foreign_keys.push(ForeignKeySpec {
                entity: target.qualified_name.clone(),
                table: parent.table_name.clone(),
                parent_columns: foreign_key.parent_columns,
                child_columns: foreign_key.child_columns,
                on_delete: foreign_key.on_delete,
                on_update: foreign_key.on_update,
                deferred: foreign_key.deferred,
            });
        }

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }
        let mut entity = (*shape).clone();
        entity.foreign_keys = foreign_keys;
        debug!(
            table = %entity.table_name,
            columns = entity.stored_columns().len(),
            "resolved entity"
        );
        Ok(Arc::new(entity))
    }

    /// Everything but the foreign keys, which need other entities.
    pub(super) fn resolve_shape(&mut self, declaration: &'d ClassDeclaration) -> Resolved<EntitySpec> {
        let owner = declaration.qualified_name.as_str();
        if declaration.is_trait() {
            return Err(vec![Diagnostic::new(
                owner,
                ValidationError::NotAStruct(owner.to_string()),
            )]);
        }
        let record = match annotations::find::<Entity>(&declaration.annotations) {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(vec![Diagnostic::new(
                    owner,
                    ValidationError::MissingAnnotation(owner.to_string(), "Entity"),
                )]);
            }
            Err(error) => return Err(vec![Diagnostic::new(owner, error)]),
        };

        let mut diagnostics = Vec::new();
        for ignored in &record.ignored_columns {
            if declaration.property(ignored).is_none() {
                diagnostics.push(Diagnostic::new(
                    owner,
                    ValidationError::UnknownIgnoredColumn(ignored.clone()),
                ));
            }
        }

        let table_name = if record.table_name.is_empty() {
            declaration.simple_name().to_string()
        } else {
            record.table_name.clone()
        };
        let scope = MemberScope {
            entity: owner,
            prefix: String::new(),
            nullable: false,
            path: None,
            ignored: &record.ignored_columns,
            stack: vec![owner.to_string()],
        };
        let mut keys = Vec::new();
        let members = self.members(declaration, &scope, &mut keys, &mut diagnostics);
        let constructor = constructor(declaration, &members, owner, &mut diagnostics);

        let mut entity = EntitySpec {
            declaration: owner.to_string(),
            table_name,
            members,
            primary_key: PrimaryKeySpec {
                columns: Vec::new(),
                auto_generate: false,
                on_conflict: OnConflictStrategy::Abort,
            },
            foreign_keys: Vec::new(),
            indices: Vec::new(),
            constructor,
        };

        let mut seen = HashSet::new();
        for column in entity.stored_columns() {
            if !seen.insert(column.name.as_str()) {
                diagnostics.push(Diagnostic::new(
                    owner,
                    ResolutionError::DuplicateColumn(column.name.clone()),
                ));
            }
        }

        if let Some(primary_key) = primary_key(&entity, &record, keys, &mut diagnostics) {
            mark_primary_key(&mut entity.members, &primary_key.columns);
            entity.primary_key = primary_key;
        }
        entity.indices = indices(&entity, &record, &mut diagnostics);

        if diagnostics.is_empty() {
            Ok(entity)
        } else {
            Err(diagnostics)
        }
    }

    fn members(
        &mut self,
        owner: &'d ClassDeclaration,
        scope: &MemberScope<'_>,
        keys: &mut Vec<KeyCandidate>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<EntityMember> {
        let mut members = Vec::new();
        for property in &owner.properties {
            let path = match &scope.path {
                Some(parent) => format!("{parent}.{}", property.name),
                None => property.name.clone(),
            };
            let anchor = format!("{}::{path}", scope.entity);
            let reported = diagnostics.len();
            let info: Option<ColumnInfo> = parse(&anchor, &property.annotations, diagnostics);
            let key: Option<PrimaryKey> = parse(&anchor, &property.annotations, diagnostics);
            let embedded: Option<Embedded> = parse(&anchor, &property.annotations, diagnostics);
            if diagnostics.len() > reported {
                continue;
            }

            let ignore = if annotations::is_present::<Ignore>(&property.annotations) {
                Some(IgnoreSpec::Annotation)
            } else if scope.path.is_none() && scope.ignored.contains(&property.name) {
                Some(IgnoreSpec::IgnoredColumns)
            } else {
                None
            };
            let info = info.unwrap_or_default();
            let name = if info.name.is_empty() {
                format!("{}{}", scope.prefix, property.name)
            } else {
                format!("{}{}", scope.prefix, info.name)
            };

            if let Some(ignore) = ignore {
                if key.is_some() {
                    diagnostics.push(Diagnostic::new(
                        anchor,
                        ValidationError::IgnoredPrimaryKey(path),
                    ));
                    continue;
                }
                members.push(EntityMember::Column(ColumnSpec {
                    property: property.name.clone(),
                    ty: property.ty.clone(),
                    name,
                    mapping: None,
                    is_nullable: property.ty.nullable || scope.nullable,
                    default_value: None,
                    collate: info.collate,
                    index: false,
                    ignore: Some(ignore),
                    is_primary_key: false,
                    embedded_in: scope.path.clone(),
                }));
                continue;
            }

            if let Some(embedded) = embedded {
                let Some(member) =
                    self.embedded(property, &embedded, scope, path, &anchor, keys, diagnostics)
                else {
                    continue;
                };
                if let Some(record) = key {
                    keys.push(KeyCandidate {
                        anchor,
                        columns: member
                            .columns()
                            .into_iter()
                            .filter(|column| column.is_stored())
                            .map(|column| column.name.clone())
                            .collect(),
                        record,
                    });
                }
                members.push(EntityMember::Embedded(member));
                continue;
            }

            let Some(mapping) = ValueMapping::resolve(&property.ty, info.type_affinity) else {
                diagnostics.push(Diagnostic::new(
                    anchor,
                    ResolutionError::UnresolvedAffinity {
                        property: path,
                        ty: property.ty.to_rust(),
                    },
                ));
                continue;
            };
            if let Some(record) = key {
                keys.push(KeyCandidate {
                    anchor,
                    columns: vec![name.clone()],
                    record,
                });
            }
            members.push(EntityMember::Column(ColumnSpec {
                property: property.name.clone(),
                ty: property.ty.clone(),
                name,
                mapping: Some(mapping),
                is_nullable: property.ty.nullable || scope.nullable,
                default_value: info.default_value,
                collate: info.collate,
                index: info.index,
                ignore: None,
                is_primary_key: false,
                embedded_in: scope.path.clone(),
            }));
        }
        members
    }

    #[allow(clippy::too_many_arguments)]
    fn embedded(
        &mut self,
        property: &PropertyDeclaration,
        embedded: &Embedded,
        scope: &MemberScope<'_>,
        path: String,
        anchor: &str,
        keys: &mut Vec<KeyCandidate>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<EmbeddedSpec> {
        let Some(target) = self.declarations.resolve(&property.ty) else {
            diagnostics.push(Diagnostic::new(
                anchor,
                ResolutionError::UnresolvedType(property.ty.to_rust()),
            ));
            return None;
        };
        if scope.stack.contains(&target.qualified_name) {
            let mut chain = scope.stack.clone();
            chain.push(target.qualified_name.clone());
            diagnostics.push(Diagnostic::new(
                anchor,
                ResolutionError::CyclicEmbedding(chain.join(" -> ")),
            ));
            return None;
        }
        if target.is_trait() {
            diagnostics.push(Diagnostic::new(
                anchor,
                ValidationError::NotAStruct(target.qualified_name.clone()),
            ));
            return None;
        }

        let mut stack = scope.stack.clone();
        stack.push(target.qualified_name.clone());
        let nested = MemberScope {
            entity: scope.entity,
            prefix: format!("{}{}", scope.prefix, embedded.prefix),
            nullable: scope.nullable || property.ty.nullable,
            path: Some(path),
            ignored: &[],
            stack,
        };
        let members = self.members(target, &nested, keys, diagnostics);
        let constructor = constructor(target, &members, anchor, diagnostics);
        Some(EmbeddedSpec {
            property: property.name.clone(),
            ty: property.ty.clone(),
            prefix: nested.prefix,
            is_nullable: property.ty.nullable,
            members,
            constructor,
        })
    }
}

/// Checks a declared constructor against the stored members, or falls back
/// to a struct literal over every property.
fn constructor(
    owner: &ClassDeclaration,
    members: &[EntityMember],
    anchor: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> ConstructorSpec {
    let stored: Vec<&str> = members
        .iter()
        .filter(|member| member.is_stored())
        .map(EntityMember::property)
        .collect();
    declared_constructor(owner, &stored, anchor, diagnostics)
}

/// Shared with compound resolution, whose members are not entity members.
pub(super) fn declared_constructor(
    owner: &ClassDeclaration,
    required: &[&str],
    anchor: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> ConstructorSpec {
    let Some(declared) = &owner.constructor else {
        return ConstructorSpec::struct_literal(
            owner
                .properties
                .iter()
                .map(|property| property.name.clone())
                .collect(),
        );
    };
    let parameters: Vec<String> = declared
        .parameters
        .iter()
        .map(|parameter| parameter.name.clone())
        .collect();
    for parameter in &parameters {
        if !required.contains(&parameter.as_str()) {
            diagnostics.push(Diagnostic::new(
                anchor,
                GenerationError::UnmatchedConstructorParameter {
                    owner: owner.qualified_name.clone(),
                    parameter: parameter.clone(),
                },
            ));
        }
    }
    for member in required {
        if !parameters.iter().any(|parameter| parameter == member) {
            diagnostics.push(Diagnostic::new(
                anchor,
                GenerationError::UncoveredMember {
                    owner: owner.qualified_name.clone(),
                    member: member.to_string(),
                },
            ));
        }
    }
    ConstructorSpec {
        function: Some(declared.name.clone()),
        parameters,
    }
}

fn primary_key(
    entity: &EntitySpec,
    record: &Entity,
    keys: Vec<KeyCandidate>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<PrimaryKeySpec> {
    let owner = entity.declaration.as_str();
    let found = keys.len() + usize::from(!record.primary_keys.is_empty());
    if found != 1 {
        diagnostics.push(Diagnostic::new(
            owner,
            ResolutionError::AmbiguousOrMissingPrimaryKey {
                entity: owner.to_string(),
                found,
            },
        ));
        return None;
    }

    if !record.primary_keys.is_empty() {
        let mut resolved = true;
        for column in &record.primary_keys {
            if entity.column(column).is_none() {
                diagnostics.push(Diagnostic::new(
                    owner,
                    ResolutionError::UnresolvedPrimaryKeyColumn(column.clone()),
                ));
                resolved = false;
            }
        }
        return resolved.then(|| PrimaryKeySpec {
            columns: record.primary_keys.clone(),
            auto_generate: false,
            on_conflict: OnConflictStrategy::Abort,
        });
    }

    let key = keys.into_iter().next()?;
    if key.record.auto_generate {
        let integer = match key.columns.as_slice() {
            [column] => entity
                .column(column)
                .and_then(ColumnSpec::affinity)
                .is_some_and(|affinity| affinity == TypeAffinity::Integer),
            _ => false,
        };
        if !integer {
            diagnostics.push(Diagnostic::new(
                key.anchor,
                ValidationError::InvalidAutoGenerate(key.columns.join(", ")),
            ));
            return None;
        }
    }
    Some(PrimaryKeySpec {
        columns: key.columns,
        auto_generate: key.record.auto_generate,
        on_conflict: key.record.on_conflict,
    })
}

fn mark_primary_key(members: &mut [EntityMember], columns: &[String]) {
    for member in members {
        match member {
            EntityMember::Column(column) => {
                if column.is_stored() && columns.contains(&column.name) {
                    column.is_primary_key = true;
                }
            }
            EntityMember::Embedded(embedded) => mark_primary_key(&mut embedded.members, columns),
        }
    }
}

fn indices(entity: &EntitySpec, record: &Entity, diagnostics: &mut Vec<Diagnostic>) -> Vec<IndexSpec> {
    let mut indices = Vec::new();
    for index in &record.indices {
        let name = if index.name.is_empty() {
            default_index_name(&entity.table_name, &index.columns)
        } else {
            index.name.clone()
        };
        let mut resolved = true;
        for column in &index.columns {
            if entity.column(column).is_none() {
                diagnostics.push(Diagnostic::new(
                    entity.declaration.as_str(),
                    ResolutionError::UnresolvedIndexColumn {
                        index: name.clone(),
                        column: column.clone(),
                    },
                ));
                resolved = false;
            }
        }
        if resolved {
            add_index(
                entity,
                &mut indices,
                IndexSpec {
                    name,
                    unique: index.unique,
                    columns: index.columns.clone(),
                    orders: index.orders.clone(),
                },
                diagnostics,
            );
        }
    }
    for column in entity.stored_columns() {
        if column.index {
            let columns = vec![column.name.clone()];
            add_index(
                entity,
                &mut indices,
                IndexSpec {
                    name: default_index_name(&entity.table_name, &columns),
                    unique: false,
                    columns,
                    orders: Vec::new(),
                },
                diagnostics,
            );
        }
    }
    indices
}

/// Index names are unique per schema: an identical repeat is dropped, a
/// differing one is reported.
fn add_index(
    entity: &EntitySpec,
    indices: &mut Vec<IndexSpec>,
    index: IndexSpec,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match indices.iter().find(|existing| existing.name == index.name) {
        None => indices.push(index),
        Some(existing) if *existing == index => {}
        Some(_) => diagnostics.push(Diagnostic::new(
            entity.declaration.as_str(),
            ResolutionError::DuplicateIndex(index.name),
        )),
    }
}

fn default_index_name(table: &str, columns: &[String]) -> String {
    format!("index_{table}_{}", columns.join("_"))
}

#[cfg(test)]
mod tests {
    use kabin_core::{
        AnnotationDeclaration, AnnotationValue, DeclarationSet, ForeignKeyAction, PropertyDeclaration,
        SpecError, TypeRef,
    };

    use super::*;

    fn primary_key() -> AnnotationDeclaration {
        AnnotationDeclaration::new("PrimaryKey")
    }

    fn entity(name: &str) -> ClassDeclaration {
        ClassDeclaration::new(name).with_annotation(AnnotationDeclaration::new("Entity"))
    }

    fn property(name: &str, ty: &str) -> PropertyDeclaration {
        PropertyDeclaration::new(name, TypeRef::new(ty))
    }

    fn resolve(declarations: Vec<ClassDeclaration>, name: &str) -> Resolved<Arc<EntitySpec>> {
        let set = DeclarationSet::new(declarations).unwrap();
        Resolver::new(&set).entity(name)
    }

    fn errors(result: Resolved<Arc<EntitySpec>>) -> Vec<SpecError> {
        result
            .unwrap_err()
            .into_iter()
            .map(|diagnostic| diagnostic.error)
            .collect()
    }

    #[test]
    fn test_column_names_and_affinities() {
        let user = entity("crate::User")
            .with_property(property("id", "i64").with_annotation(primary_key()))
            .with_property(
                property("name", "String").with_annotation(
                    AnnotationDeclaration::new("ColumnInfo")
                        .with_argument("name", "user_name")
                        .with_argument("index", true),
                ),
            )
            .with_property(PropertyDeclaration::new("age", TypeRef::new("i32").into_nullable()));

        let spec = resolve(vec![user], "crate::User").unwrap();
        let names: Vec<&str> = spec.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "user_name", "age"]);
        assert_eq!(spec.column("id").unwrap().affinity(), Some(TypeAffinity::Integer));
        assert!(spec.column("id").unwrap().is_primary_key);
        assert!(spec.column("age").unwrap().is_nullable);
        assert_eq!(spec.column("age").unwrap().adapter().unwrap().source_type, TypeRef::new("i32"));
        assert_eq!(spec.indices[0].name, "index_User_user_name");
        assert_eq!(
            spec.constructor,
            ConstructorSpec::struct_literal(vec!["id".into(), "name".into(), "age".into()])
        );
    }

    fn indexed_user(unique: bool) -> ClassDeclaration {
        let index = AnnotationDeclaration::new("Index")
            .with_argument("unique", unique)
            .with_argument("columns", AnnotationValue::Array(vec!["name".into()]));
        ClassDeclaration::new("crate::User")
            .with_annotation(
                AnnotationDeclaration::new("Entity")
                    .with_argument("indices", AnnotationValue::Array(vec![AnnotationValue::Annotation(index)])),
            )
            .with_property(property("id", "i64").with_annotation(primary_key()))
            .with_property(
                property("name", "String")
                    .with_annotation(AnnotationDeclaration::new("ColumnInfo").with_argument("index", true)),
            )
    }

    #[test]
    fn test_repeated_index_is_kept_once() {
        let spec = resolve(vec![indexed_user(false)], "crate::User").unwrap();
        assert_eq!(spec.indices.len(), 1);
        assert_eq!(spec.indices[0].name, "index_User_name");
    }

    #[test]
    fn test_conflicting_index_names_fail() {
        assert_eq!(
            errors(resolve(vec![indexed_user(true)], "crate::User")),
            vec![SpecError::Resolution(ResolutionError::DuplicateIndex(
                "index_User_name".to_string()
            ))]
        );
    }

    #[test]
    fn test_unknown_type_without_affinity_fails() {
        let user = entity("crate::User")
            .with_property(property("id", "i64").with_annotation(primary_key()))
            .with_property(property("uuid", "uuid::Uuid"));
        let errors = errors(resolve(vec![user], "crate::User"));
        assert!(matches!(
            &errors[..],
            [SpecError::Resolution(ResolutionError::UnresolvedAffinity { property, .. })] if property == "uuid"
        ));
    }

    #[test]
    fn test_primary_key_must_exist_exactly_once() {
        let none = entity("crate::A").with_property(property("id", "i64"));
        assert_eq!(
            errors(resolve(vec![none], "crate::A")),
            vec![SpecError::Resolution(ResolutionError::AmbiguousOrMissingPrimaryKey {
                entity: "crate::A".to_string(),
                found: 0,
            })]
        );

        let two = entity("crate::B")
            .with_property(property("id", "i64").with_annotation(primary_key()))
            .with_property(property("other", "i64").with_annotation(primary_key()));
        assert!(matches!(
            &errors(resolve(vec![two], "crate::B"))[..],
            [SpecError::Resolution(ResolutionError::AmbiguousOrMissingPrimaryKey { found: 2, .. })]
        ));
    }

    #[test]
    fn test_composite_primary_key() {
        let pair = ClassDeclaration::new("crate::Pair")
            .with_annotation(AnnotationDeclaration::new("Entity").with_argument(
                "primaryKeys",
                AnnotationValue::Array(vec!["left".into(), "right".into()]),
            ))
            .with_property(property("left", "i64"))
            .with_property(property("right", "i64"));
        let spec = resolve(vec![pair], "crate::Pair").unwrap();
        assert!(spec.primary_key.is_composite());
        assert!(spec.columns().iter().all(|column| column.is_primary_key));
    }

    #[test]
    fn test_auto_generate_requires_integer() {
        let note = entity("crate::Note").with_property(
            property("id", "String")
                .with_annotation(primary_key().with_argument("autoGenerate", true)),
        );
        assert_eq!(
            errors(resolve(vec![note], "crate::Note")),
            vec![SpecError::Validation(ValidationError::InvalidAutoGenerate("id".to_string()))]
        );
    }

    #[test]
    fn test_duplicate_column_names_fail() {
        let user = entity("crate::User")
            .with_property(property("id", "i64").with_annotation(primary_key()))
            .with_property(property("name", "String"))
            .with_property(property("alias", "String").with_annotation(
                AnnotationDeclaration::new("ColumnInfo").with_argument("name", "name"),
            ));
        assert_eq!(
            errors(resolve(vec![user], "crate::User")),
            vec![SpecError::Resolution(ResolutionError::DuplicateColumn("name".to_string()))]
        );
    }

    #[test]
    fn test_embedded_prefixes_accumulate() {
        let geo = ClassDeclaration::new("crate::Geo")
            .with_property(property("lat", "f64"))
            .with_property(property("lng", "f64"));
        let address = ClassDeclaration::new("crate::Address")
            .with_property(property("street", "String"))
            .with_property(
                property("geo", "crate::Geo")
                    .with_annotation(AnnotationDeclaration::new("Embedded").with_argument("prefix", "geo_")),
            );
        let user = entity("crate::User")
            .with_property(property("id", "i64").with_annotation(primary_key()))
            .with_property(
                PropertyDeclaration::new("address", TypeRef::new("crate::Address").into_nullable())
                    .with_annotation(AnnotationDeclaration::new("Embedded").with_argument("prefix", "home_")),
            );

        let spec = resolve(vec![geo, address, user], "crate::User").unwrap();
        let names: Vec<&str> = spec.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "home_street", "home_geo_lat", "home_geo_lng"]);
        let lat = spec.column("home_geo_lat").unwrap();
        assert!(lat.is_nullable);
        assert_eq!(lat.embedded_in.as_deref(), Some("address.geo"));
    }

    #[test]
    fn test_cyclic_embedding_fails() {
        let a = entity("crate::A")
            .with_property(property("id", "i64").with_annotation(primary_key()))
            .with_property(property("b", "crate::B").with_annotation(AnnotationDeclaration::new("Embedded")));
        let b = ClassDeclaration::new("crate::B")
            .with_property(property("a", "crate::A").with_annotation(AnnotationDeclaration::new("Embedded")));

        let errors = errors(resolve(vec![a, b], "crate::A"));
        assert_eq!(
            errors,
            vec![SpecError::Resolution(ResolutionError::CyclicEmbedding(
                "crate::A -> crate::B -> crate::A".to_string()
            ))]
        );
    }

    #[test]
    fn test_ignored_columns() {
        let user = ClassDeclaration::new("crate::User")
            .with_annotation(AnnotationDeclaration::new("Entity").with_argument("ignoredColumns", "cache"))
            .with_property(property("id", "i64").with_annotation(primary_key()))
            .with_property(property("cache", "std::collections::HashMap"))
            .with_property(property("scratch", "Vec").with_annotation(AnnotationDeclaration::new("Ignore")));
        let spec = resolve(vec![user], "crate::User").unwrap();
        assert_eq!(spec.stored_columns().len(), 1);
        assert_eq!(spec.columns()[1].ignore, Some(IgnoreSpec::IgnoredColumns));
        assert_eq!(spec.columns()[2].ignore, Some(IgnoreSpec::Annotation));

        let unknown = ClassDeclaration::new("crate::Bad")
            .with_annotation(AnnotationDeclaration::new("Entity").with_argument("ignoredColumns", "nope"))
            .with_property(property("id", "i64").with_annotation(primary_key()));
        assert_eq!(
            errors(resolve(vec![unknown], "crate::Bad")),
            vec![SpecError::Validation(ValidationError::UnknownIgnoredColumn("nope".to_string()))]
        );
    }

    #[test]
    fn test_declared_constructor_must_cover_members() {
        let user = entity("crate::User")
            .with_property(property("id", "i64").with_annotation(primary_key()))
            .with_property(property("name", "String"))
            .with_constructor("new", &["name", "id"]);
        let spec = resolve(vec![user.clone()], "crate::User").unwrap();
        assert_eq!(spec.constructor.function.as_deref(), Some("new"));
        assert_eq!(spec.constructor.parameters, vec!["name".to_string(), "id".to_string()]);

        let partial = user.with_constructor("new", &["id"]);
        assert_eq!(
            errors(resolve(vec![partial], "crate::User")),
            vec![SpecError::Generation(GenerationError::UncoveredMember {
                owner: "crate::User".to_string(),
                member: "name".to_string(),
            })]
        );
    }

    #[test]
    fn test_self_referencing_foreign_key() {
        let user = ClassDeclaration::new("crate::User")
            .with_annotation(AnnotationDeclaration::new("Entity").with_argument(
                "foreignKeys",
                AnnotationValue::Annotation(
                    AnnotationDeclaration::new("ForeignKey")
                        .with_argument("entity", AnnotationValue::class(TypeRef::new("crate::User")))
                        .with_argument("parentColumns", "id")
                        .with_argument("childColumns", "spouse_id")
                        .with_argument("onDelete", AnnotationValue::constant("SET_NULL")),
                ),
            ))
            .with_property(property("id", "i64").with_annotation(primary_key()))
            .with_property(PropertyDeclaration::new("spouse_id", TypeRef::new("i64").into_nullable()));

        let spec = resolve(vec![user], "crate::User").unwrap();
        assert_eq!(spec.foreign_keys[0].table, "User");
        assert_eq!(spec.foreign_keys[0].on_delete, ForeignKeyAction::SetNull);
    }

    #[test]
    fn test_foreign_key_columns_must_exist() {
        let owner = entity("crate::Owner").with_property(property("id", "i64").with_annotation(primary_key()));
        let pet = ClassDeclaration::new("crate::Pet")
            .with_annotation(AnnotationDeclaration::new("Entity").with_argument(
                "foreignKeys",
                AnnotationValue::Annotation(
                    AnnotationDeclaration::new("ForeignKey")
                        .with_argument("entity", AnnotationValue::class(TypeRef::new("crate::Owner")))
                        .with_argument("parentColumns", "owner_key")
                        .with_argument("childColumns", "owner_id"),
                ),
            ))
            .with_property(property("id", "i64").with_annotation(primary_key()))
            .with_property(property("owner_id", "i64"));

        assert_eq!(
            errors(resolve(vec![owner, pet], "crate::Pet")),
            vec![SpecError::Resolution(ResolutionError::UnresolvedColumn {
                table: "Owner".to_string(),
                column: "owner_key".to_string(),
            })]
        );
    }
}
