//! Database resolution: entities, DAO getters and adapter requirements.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use kabin_core::annotations::{self, Dao, Database, TypeConverters};
use kabin_core::{
    ClassDeclaration, ColumnAdapterReference, DaoGetterSpec, DatabaseSpec, Diagnostic, EntitySpec,
    ResolutionError, TypeConverterSpec, TypeRef, ValidationError,
};
use tracing::{debug, instrument};

use super::{Resolved, Resolver, column_adapter_supertype, converter_signature, same_type};

impl<'d> Resolver<'d> {
    #[instrument(skip_all, fields(database = %declaration.qualified_name))]
    pub(super) fn resolve_database(&mut self, declaration: &'d ClassDeclaration) -> Resolved<DatabaseSpec> {
        let owner = declaration.qualified_name.as_str();
        if !declaration.is_trait() {
            return Err(vec![Diagnostic::new(
                owner,
                ValidationError::NotATrait(owner.to_string()),
            )]);
        }
        let record = match annotations::find::<Database>(&declaration.annotations) {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(vec![Diagnostic::new(
                    owner,
                    ValidationError::MissingAnnotation(owner.to_string(), "Database"),
                )]);
            }
            Err(error) => return Err(vec![Diagnostic::new(owner, error)]),
        };
        let mut diagnostics = Vec::new();
        let converters = match annotations::find::<TypeConverters>(&declaration.annotations) {
            Ok(converters) => converters.unwrap_or_default(),
            Err(error) => {
                diagnostics.push(Diagnostic::new(owner, error));
                TypeConverters::default()
            }
        };

        let mut entities: IndexMap<String, Arc<EntitySpec>> = IndexMap::new();
        for ty in &record.entities {
            if let Some(entity) = self.dependent_entity(owner, ty, &mut diagnostics) {
                entities
                    .entry(entity.declaration.clone())
                    .or_insert(entity);
            }
        }

        let mut type_converters = self.type_converters(owner, &converters.value, &mut diagnostics);
        let dao_getters = self.dao_getters(declaration, &mut diagnostics);

        let mut required: IndexSet<String> = IndexSet::new();
        for entity in entities.values() {
            required.extend(entity.foreign_keys.iter().map(|key| key.entity.clone()));
        }
        for getter in &dao_getters {
            required.extend(
                getter
                    .dao
                    .entities()
                    .into_iter()
                    .map(|entity| entity.declaration.clone()),
            );
        }
        for entity in &required {
            if !entities.contains_key(entity) {
                diagnostics.push(Diagnostic::new(
                    owner,
                    ResolutionError::EntityNotInDatabase(entity.clone()),
                ));
            }
        }

        let mut adapters: IndexSet<ColumnAdapterReference> = IndexSet::new();
        for entity in entities.values() {
            adapters.extend(entity.adapters());
        }
        for getter in &dao_getters {
            adapters.extend(getter.dao.binding_adapters());
        }
        for adapter in &adapters {
            if adapter.builtin().is_some() {
                continue;
            }
            if type_converters.iter().any(|converter| &converter.reference == adapter) {
                continue;
            }
            let provider = type_converters
                .iter()
                .find(|converter| {
                    converter.reference.affinity == adapter.affinity
                        && same_type(&converter.reference.source_type, &adapter.source_type)
                })
                .map(|converter| converter.converter.clone());
            match provider {
                Some(converter) => type_converters.push(TypeConverterSpec {
                    converter,
                    reference: adapter.clone(),
                }),
                None => diagnostics.push(Diagnostic::new(
                    owner,
                    ResolutionError::MissingTypeConverter {
                        source_type: adapter.source_type.to_rust(),
                        affinity: adapter.affinity.to_string(),
                    },
                )),
            }
        }

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }
        debug!(
            version = record.version,
            entities = entities.len(),
            daos = dao_getters.len(),
            adapters = adapters.len(),
            "resolved database"
        );
        Ok(DatabaseSpec {
            declaration: owner.to_string(),
            version: record.version,
            entities: entities.into_values().collect(),
            dao_getters,
            type_converters,
            adapters: adapters.into_iter().collect(),
        })
    }

    fn type_converters(
        &self,
        owner: &str,
        listed: &[TypeRef],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<TypeConverterSpec> {
        let mut converters: Vec<TypeConverterSpec> = Vec::new();
        for ty in listed {
            let Some(declaration) = self.declarations.resolve(ty) else {
                diagnostics.push(Diagnostic::new(owner, ResolutionError::UnresolvedType(ty.to_rust())));
                continue;
            };
            let invalid = |reason: String| {
                Diagnostic::new(
                    owner,
                    ResolutionError::InvalidTypeConverter {
                        converter: declaration.qualified_name.clone(),
                        reason,
                    },
                )
            };
            if declaration.is_trait() {
                diagnostics.push(invalid("a converter must be a struct".to_string()));
                continue;
            }
            if column_adapter_supertype(declaration).is_none() {
                diagnostics.push(invalid("it does not implement ColumnAdapter<T, S>".to_string()));
                continue;
            }
            let Some((source, affinity)) = converter_signature(declaration) else {
                diagnostics.push(invalid(
                    "ColumnAdapter<T, S> needs S to be one of i64, f64, String or Vec<u8>".to_string(),
                ));
                continue;
            };
            let reference = ColumnAdapterReference::new(&source, affinity);
            if let Some(existing) = converters.iter().find(|existing| existing.reference == reference) {
                diagnostics.push(invalid(format!(
                    "`{}` already converts {reference}",
                    existing.converter
                )));
                continue;
            }
            converters.push(TypeConverterSpec {
                converter: declaration.type_ref(),
                reference,
            });
        }
        converters
    }

    fn dao_getters(&mut self, declaration: &'d ClassDeclaration, diagnostics: &mut Vec<Diagnostic>) -> Vec<DaoGetterSpec> {
        let owner = declaration.qualified_name.as_str();
        let mut getters = Vec::new();
        for function in declaration.functions.iter().filter(|function| function.is_abstract) {
            let anchor = format!("{owner}::{}", function.name);
            if !function.parameters.is_empty() {
                diagnostics.push(Diagnostic::new(
                    anchor,
                    ValidationError::GetterWithParameters(function.name.clone()),
                ));
                continue;
            }
            let returns = dao_type(&function.return_type_or_unit());
            let dao = self
                .declarations
                .resolve(&returns)
                .filter(|dao| annotations::is_present::<Dao>(&dao.annotations));
            let Some(dao) = dao else {
                diagnostics.push(Diagnostic::new(
                    anchor,
                    ResolutionError::NotADao(returns.to_rust()),
                ));
                continue;
            };
            match self.dao(&dao.qualified_name) {
                Ok(dao) => getters.push(DaoGetterSpec {
                    function: function.name.clone(),
                    dao,
                }),
                Err(errors) => {
                    diagnostics.extend(self.unreported(&dao.qualified_name, errors));
                    diagnostics.push(Diagnostic::new(
                        anchor,
                        ResolutionError::DependencyFailed(dao.qualified_name.clone()),
                    ));
                }
            }
        }
        getters
    }
}

/// Strips the reference and `dyn` from a getter's return type
/// (`&dyn crate::UserDao`).
fn dao_type(returns: &TypeRef) -> TypeRef {
    let name = returns.name.trim_start_matches('&').trim_start();
    let name = name.strip_prefix("dyn ").unwrap_or(name).trim();
    TypeRef {
        name: name.to_string(),
        ..returns.clone()
    }
}

#[cfg(test)]
mod tests {
    use kabin_core::{
        AnnotationDeclaration, AnnotationValue, DeclarationSet, FunctionDeclaration, PropertyDeclaration,
        SpecError, TypeAffinity,
    };

    use super::*;

    fn user() -> ClassDeclaration {
        ClassDeclaration::new("crate::User")
            .with_annotation(AnnotationDeclaration::new("Entity"))
            .with_property(
                PropertyDeclaration::new("id", TypeRef::new("i64"))
                    .with_annotation(AnnotationDeclaration::new("PrimaryKey")),
            )
            .with_property(PropertyDeclaration::new("active", TypeRef::new("bool")))
            .with_property(
                PropertyDeclaration::new("token", TypeRef::new("uuid::Uuid")).with_annotation(
                    AnnotationDeclaration::new("ColumnInfo")
                        .with_argument("typeAffinity", AnnotationValue::constant("TEXT")),
                ),
            )
    }

    fn note() -> ClassDeclaration {
        ClassDeclaration::new("crate::Note")
            .with_annotation(AnnotationDeclaration::new("Entity"))
            .with_property(
                PropertyDeclaration::new("id", TypeRef::new("i64"))
                    .with_annotation(AnnotationDeclaration::new("PrimaryKey")),
            )
    }

    fn uuid_converter() -> ClassDeclaration {
        ClassDeclaration::new("crate::UuidConverter").with_supertype(
            TypeRef::new("kabin_runtime::ColumnAdapter")
                .with_argument(TypeRef::new("uuid::Uuid"))
                .with_argument(TypeRef::new("String")),
        )
    }

    fn note_dao() -> ClassDeclaration {
        ClassDeclaration::new_trait("crate::NoteDao")
            .with_annotation(AnnotationDeclaration::new("Dao"))
            .with_function(
                FunctionDeclaration::new("all")
                    .returning(TypeRef::new("Vec").with_argument(TypeRef::new("crate::Note")))
                    .with_annotation(AnnotationDeclaration::new("Query").with_argument("value", "SELECT * FROM Note")),
            )
    }

    fn database(entities: &[&str], converters: &[&str]) -> ClassDeclaration {
        let classes = |names: &[&str]| {
            AnnotationValue::Array(
                names
                    .iter()
                    .map(|name| AnnotationValue::class(TypeRef::new(*name)))
                    .collect(),
            )
        };
        ClassDeclaration::new_trait("crate::AppDatabase")
            .with_annotation(
                AnnotationDeclaration::new("Database")
                    .with_argument("entities", classes(entities))
                    .with_argument("version", 2i64),
            )
            .with_annotation(AnnotationDeclaration::new("TypeConverters").with_argument("value", classes(converters)))
            .with_function(FunctionDeclaration::new("note_dao").returning(TypeRef::new("&dyn crate::NoteDao")))
    }

    fn resolve(declarations: Vec<ClassDeclaration>) -> Resolved<DatabaseSpec> {
        let set = DeclarationSet::new(declarations).unwrap();
        Resolver::new(&set).database("crate::AppDatabase")
    }

    #[test]
    fn test_database_collects_adapters_once() {
        let spec = resolve(vec![
            user(),
            note(),
            uuid_converter(),
            note_dao(),
            database(&["crate::User", "crate::Note", "crate::User"], &["crate::UuidConverter"]),
        ])
        .unwrap();

        assert_eq!(spec.version, 2);
        assert_eq!(spec.entities.len(), 2);
        assert_eq!(spec.dao_getters[0].function, "note_dao");
        let sources: Vec<String> = spec.adapters.iter().map(|a| a.source_type.to_rust()).collect();
        assert_eq!(sources, vec!["bool", "uuid::Uuid"]);
        let token = &spec.adapters[1];
        assert_eq!(token.affinity, TypeAffinity::Text);
        assert_eq!(
            spec.converter_for(token).unwrap().converter,
            TypeRef::new("crate::UuidConverter")
        );
    }

    #[test]
    fn test_missing_converter_fails() {
        let errors = resolve(vec![user(), note(), note_dao(), database(&["crate::User", "crate::Note"], &[])])
            .unwrap_err();
        assert_eq!(
            errors[0].error,
            SpecError::Resolution(ResolutionError::MissingTypeConverter {
                source_type: "uuid::Uuid".to_string(),
                affinity: "TEXT".to_string(),
            })
        );
    }

    #[test]
    fn test_dao_entities_must_be_listed() {
        let errors = resolve(vec![
            user(),
            note(),
            uuid_converter(),
            note_dao(),
            database(&["crate::User"], &["crate::UuidConverter"]),
        ])
        .unwrap_err();
        assert_eq!(
            errors[0].error,
            SpecError::Resolution(ResolutionError::EntityNotInDatabase("crate::Note".to_string()))
        );
    }

    #[test]
    fn test_getter_must_return_a_dao() {
        let database = database(&["crate::Note"], &[]).with_function(
            FunctionDeclaration::new("notes").returning(TypeRef::new("crate::Note")),
        );
        let errors = resolve(vec![note(), note_dao(), database]).unwrap_err();
        assert_eq!(errors[0].declaration, "crate::AppDatabase::notes");
        assert_eq!(
            errors[0].error,
            SpecError::Resolution(ResolutionError::NotADao("crate::Note".to_string()))
        );
    }

    #[test]
    fn test_broken_entity_is_a_dependency_failure() {
        let broken = ClassDeclaration::new("crate::Broken")
            .with_annotation(AnnotationDeclaration::new("Entity"))
            .with_property(PropertyDeclaration::new("id", TypeRef::new("i64")));
        let errors = resolve(vec![note(), broken, note_dao(), database(&["crate::Note", "crate::Broken"], &[])])
            .unwrap_err();
        assert_eq!(
            errors[0].error,
            SpecError::Resolution(ResolutionError::DependencyFailed("crate::Broken".to_string()))
        );
    }

    #[test]
    fn test_shared_broken_dao_is_reported_once() {
        let broken_dao = note_dao().with_function(
            FunctionDeclaration::new("unannotated").returning(TypeRef::new("i64")),
        );
        let mut other = database(&["crate::Note"], &[]);
        other.qualified_name = "crate::OtherDatabase".to_string();
        let set = DeclarationSet::new(vec![note(), broken_dao, database(&["crate::Note"], &[]), other]).unwrap();

        let mut resolver = Resolver::new(&set);
        let mut errors = resolver.database("crate::AppDatabase").unwrap_err();
        errors.extend(resolver.database("crate::OtherDatabase").unwrap_err());

        let own: Vec<&Diagnostic> = errors
            .iter()
            .filter(|diagnostic| diagnostic.declaration.starts_with("crate::NoteDao"))
            .collect();
        assert_eq!(own.len(), 1);
        let failed: Vec<&str> = errors
            .iter()
            .filter(|diagnostic| {
                diagnostic.error
                    == SpecError::Resolution(ResolutionError::DependencyFailed("crate::NoteDao".to_string()))
            })
            .map(|diagnostic| diagnostic.declaration.as_str())
            .collect();
        assert_eq!(failed, vec!["crate::AppDatabase::note_dao", "crate::OtherDatabase::note_dao"]);
    }

    #[test]
    fn test_dao_type_strips_reference() {
        assert_eq!(dao_type(&TypeRef::new("&dyn crate::NoteDao")).name, "crate::NoteDao");
        assert_eq!(dao_type(&TypeRef::new("crate::NoteDao")).name, "crate::NoteDao");
    }
}
