//! Resolves annotated declarations into entity, DAO and database trees.
//!
//! [`Resolver`] turns annotated declarations into the immutable spec tree.
//! Every top-level lookup is cached by qualified name, successes and
//! failures alike, so a declaration reached from several places (an entity
//! used by three DAOs) is resolved exactly once per run and the resulting
//! `Arc` is shared.
//!
//! Failures are lists of [`Diagnostic`]s anchored at the declaration (or
//! `Owner::member`) that caused them. A declaration that depends on a failed
//! entity, compound or DAO reports a single
//! [`ResolutionError::DependencyFailed`]; the dependency's own diagnostics
//! are reported once however many declarations reach it.

mod compound;
mod dao;
mod database;
mod entity;
mod query;

pub use query::{parse_query, statement_kind};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kabin_core::annotations::{self, AnnotationRecord};
use kabin_core::{
    ClassDeclaration, CompoundSpec, DaoSpec, DatabaseSpec, DeclarationSet, Diagnostic, EntitySpec,
    ResolutionError, TypeAffinity, TypeRef, ValueMapping, native_affinity,
};

/// Result of resolving one declaration.
pub type Resolved<T> = Result<T, Vec<Diagnostic>>;

/// Resolves declarations of one [`DeclarationSet`] into specs.
///
/// # Examples
///
/// ```
/// use kabin_core::*;
/// use kabin_processor::Resolver;
///
/// let user = ClassDeclaration::new("crate::User")
///     .with_annotation(AnnotationDeclaration::new("Entity"))
///     .with_property(
///         PropertyDeclaration::new("id", TypeRef::new("i64"))
///             .with_annotation(AnnotationDeclaration::new("PrimaryKey")),
///     )
///     .with_property(PropertyDeclaration::new("name", TypeRef::new("String")));
/// let declarations = DeclarationSet::new(vec![user]).unwrap();
///
/// let mut resolver = Resolver::new(&declarations);
/// let entity = resolver.entity("crate::User").unwrap();
/// assert_eq!(entity.table_name, "User");
/// assert_eq!(entity.primary_key.columns, vec!["id".to_string()]);
/// ```
#[derive(Debug)]
pub struct Resolver<'d> {
    declarations: &'d DeclarationSet,
    /// Entities without their foreign keys; enough to check references.
    shapes: HashMap<String, Resolved<Arc<EntitySpec>>>,
    entities: HashMap<String, Resolved<Arc<EntitySpec>>>,
    compounds: HashMap<String, Resolved<Arc<CompoundSpec>>>,
    daos: HashMap<String, Resolved<Arc<DaoSpec>>>,
    /// Failed compounds and DAOs whose diagnostics were already handed out.
    reported: HashSet<String>,
}

impl<'d> Resolver<'d> {
    pub fn new(declarations: &'d DeclarationSet) -> Self {
        Self {
            declarations,
            shapes: HashMap::new(),
            entities: HashMap::new(),
            compounds: HashMap::new(),
            daos: HashMap::new(),
            reported: HashSet::new(),
        }
    }

    pub fn declarations(&self) -> &'d DeclarationSet {
        self.declarations
    }

    /// Resolves the `@Entity` named `name` (qualified or unique simple name).
    pub fn entity(&mut self, name: &str) -> Resolved<Arc<EntitySpec>> {
        let declaration = self.lookup(name)?;
        if let Some(cached) = self.entities.get(&declaration.qualified_name) {
            return cached.clone();
        }
        let resolved = self.resolve_entity(declaration);
        self.entities
            .insert(declaration.qualified_name.clone(), resolved.clone());
        resolved
    }

    /// Resolves the `@Dao` trait named `name`.
    pub fn dao(&mut self, name: &str) -> Resolved<Arc<DaoSpec>> {
        let declaration = self.lookup(name)?;
        if let Some(cached) = self.daos.get(&declaration.qualified_name) {
            return cached.clone();
        }
        let resolved = self.resolve_dao(declaration);
        self.daos
            .insert(declaration.qualified_name.clone(), resolved.clone());
        resolved
    }

    /// Resolves the compound struct named `name`.
    pub fn compound(&mut self, name: &str) -> Resolved<Arc<CompoundSpec>> {
        let declaration = self.lookup(name)?;
        if let Some(cached) = self.compounds.get(&declaration.qualified_name) {
            return cached.clone();
        }
        let resolved = self.resolve_compound(declaration);
        self.compounds
            .insert(declaration.qualified_name.clone(), resolved.clone());
        resolved
    }

    /// Resolves the `@Database` trait named `name`. Databases are not
    /// cached: each is resolved once by the processor.
    pub fn database(&mut self, name: &str) -> Resolved<DatabaseSpec> {
        let declaration = self.lookup(name)?;
        self.resolve_database(declaration)
    }

    fn entity_shape(&mut self, declaration: &'d ClassDeclaration) -> Resolved<Arc<EntitySpec>> {
        if let Some(cached) = self.shapes.get(&declaration.qualified_name) {
            return cached.clone();
        }
        let resolved = self.resolve_shape(declaration).map(Arc::new);
        self.shapes
            .insert(declaration.qualified_name.clone(), resolved.clone());
        resolved
    }

    fn lookup(&self, name: &str) -> Resolved<&'d ClassDeclaration> {
        self.declarations
            .get(name)
            .ok_or_else(|| vec![Diagnostic::new(name, ResolutionError::UnresolvedType(name.to_string()))])
    }

    /// Resolves an entity reached from `owner`, reporting problems as
    /// diagnostics of `owner`.
    fn dependent_entity(
        &mut self,
        owner: &str,
        ty: &TypeRef,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Arc<EntitySpec>> {
        let Some(declaration) = self.declarations.resolve(ty) else {
            diagnostics.push(Diagnostic::new(owner, ResolutionError::UnresolvedType(ty.to_rust())));
            return None;
        };
        if !annotations::is_present::<annotations::Entity>(&declaration.annotations) {
            diagnostics.push(Diagnostic::new(
                owner,
                ResolutionError::NotAnEntity(declaration.qualified_name.clone()),
            ));
            return None;
        }
        match self.entity(&declaration.qualified_name) {
            Ok(entity) => Some(entity),
            Err(_) => {
                diagnostics.push(Diagnostic::new(
                    owner,
                    ResolutionError::DependencyFailed(declaration.qualified_name.clone()),
                ));
                None
            }
        }
    }

    /// Diagnostics of the failed dependency `declaration`: all of them the
    /// first time it is reached, none afterwards.
    fn unreported(&mut self, declaration: &str, errors: Vec<Diagnostic>) -> Vec<Diagnostic> {
        if self.reported.insert(declaration.to_string()) {
            errors
        } else {
            Vec::new()
        }
    }

    /// Storage mapping for a query parameter or scalar result: native and
    /// built-in types first, then any declared `ColumnAdapter<T, S>`
    /// implementation for `T`.
    fn value_mapping(&self, ty: &TypeRef) -> Option<ValueMapping> {
        if let Some(mapping) = ValueMapping::resolve(ty, TypeAffinity::Undefined) {
            return Some(mapping);
        }
        let source = ty.non_null();
        self.declarations
            .iter()
            .filter_map(converter_signature)
            .find(|(converted, _)| same_type(converted, &source))
            .map(|(_, affinity)| {
                ValueMapping::Adapted(kabin_core::ColumnAdapterReference::new(&source, affinity))
            })
    }
}

/// Parses the annotation `R` of `annotated`, reporting a malformed one.
fn parse<R: AnnotationRecord>(
    anchor: &str,
    annotations: &[kabin_core::AnnotationDeclaration],
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<R> {
    match annotations::find::<R>(annotations) {
        Ok(record) => record,
        Err(error) => {
            diagnostics.push(Diagnostic::new(anchor, error));
            None
        }
    }
}

/// `(T, affinity of S)` for a declaration implementing `ColumnAdapter<T, S>`
/// with a native storage type `S`.
fn converter_signature(declaration: &ClassDeclaration) -> Option<(TypeRef, TypeAffinity)> {
    let adapter = column_adapter_supertype(declaration)?;
    let [source, storage] = adapter.arguments.as_slice() else {
        return None;
    };
    let affinity = native_affinity(storage)?;
    Some((source.non_null(), affinity))
}

fn column_adapter_supertype(declaration: &ClassDeclaration) -> Option<&TypeRef> {
    declaration
        .supertypes
        .iter()
        .find(|supertype| supertype.simple_name() == "ColumnAdapter")
}

/// Type equality that tolerates one side being written with a shorter
/// path (`Uuid` against `uuid::Uuid`).
fn same_type(left: &TypeRef, right: &TypeRef) -> bool {
    let shortened = !left.name.contains("::") || !right.name.contains("::");
    let names_match =
        left.name == right.name || (shortened && left.simple_name() == right.simple_name());
    names_match
        && left.nullable == right.nullable
        && left.arguments.len() == right.arguments.len()
        && left
            .arguments
            .iter()
            .zip(&right.arguments)
            .all(|(left, right)| same_type(left, right))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_type_tolerates_short_paths() {
        assert!(same_type(&TypeRef::new("uuid::Uuid"), &TypeRef::new("Uuid")));
        assert!(!same_type(&TypeRef::new("uuid::Uuid"), &TypeRef::new("other::Uuid")));
        assert!(!same_type(
            &TypeRef::new("Uuid"),
            &TypeRef::new("Uuid").into_nullable()
        ));
    }

    #[test]
    fn test_converter_signature_requires_native_storage() {
        let converter = ClassDeclaration::new("crate::UuidAdapter").with_supertype(
            TypeRef::new("kabin_runtime::ColumnAdapter")
                .with_argument(TypeRef::new("uuid::Uuid"))
                .with_argument(TypeRef::new("String")),
        );
        assert_eq!(
            converter_signature(&converter),
            Some((TypeRef::new("uuid::Uuid"), TypeAffinity::Text))
        );

        let bad = ClassDeclaration::new("crate::Bad").with_supertype(
            TypeRef::new("ColumnAdapter")
                .with_argument(TypeRef::new("uuid::Uuid"))
                .with_argument(TypeRef::new("u128")),
        );
        assert_eq!(converter_signature(&bad), None);
    }
}
