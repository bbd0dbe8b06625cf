//! The processing pass over a whole declaration set.
//!
//! [`Processor`] resolves every `@Entity` and every `@Database` in a
//! [`DeclarationSet`] and hands each success to a [`SpecHandler`]. A failing
//! declaration contributes diagnostics and is skipped; the remaining
//! declarations are still processed, so one run reports every problem.

use std::sync::Arc;

use kabin_core::{DatabaseSpec, DeclarationSet, Diagnostic, EntitySpec};
use serde::Serialize;
use tracing::{info, instrument};

use crate::diagnostics::Diagnostics;
use crate::resolver::Resolver;

/// Receives resolved specs, typically to generate code for them.
///
/// Returned diagnostics are merged into the run's report; `Err` aborts the
/// run (an I/O failure, not a problem with the declarations).
pub trait SpecHandler {
    type Error;

    fn handle_entity(&mut self, entity: &Arc<EntitySpec>) -> Result<Vec<Diagnostic>, Self::Error>;

    fn handle_database(&mut self, database: &DatabaseSpec) -> Result<Vec<Diagnostic>, Self::Error>;
}

/// Every spec resolved from one declaration set, plus the diagnostics of the
/// declarations that failed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedSchema {
    pub entities: Vec<Arc<EntitySpec>>,
    pub databases: Vec<DatabaseSpec>,
    #[serde(skip)]
    pub diagnostics: Diagnostics,
}

impl ResolvedSchema {
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn database(&self, name: &str) -> Option<&DatabaseSpec> {
        self.databases
            .iter()
            .find(|database| database.declaration == name || database.simple_name() == name)
    }
}

/// Summary of a [`Processor::process`] run.
#[derive(Debug, Clone, Default)]
pub struct ProcessReport {
    /// Entities handed to the handler.
    pub entities: usize,
    /// Databases handed to the handler.
    pub databases: usize,
    pub diagnostics: Diagnostics,
}

impl ProcessReport {
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Drives resolution over a declaration set.
///
/// # Examples
///
/// ```
/// use kabin_core::*;
/// use kabin_processor::Processor;
///
/// let user = ClassDeclaration::new("crate::User")
///     .with_annotation(AnnotationDeclaration::new("Entity"))
///     .with_property(PropertyDeclaration::new("name", TypeRef::new("String")));
/// let declarations = DeclarationSet::new(vec![user]).unwrap();
///
/// let schema = Processor::new(&declarations).resolve();
/// assert!(schema.entities.is_empty());
/// assert_eq!(schema.diagnostics.len(), 1);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Processor<'d> {
    declarations: &'d DeclarationSet,
}

impl<'d> Processor<'d> {
    pub fn new(declarations: &'d DeclarationSet) -> Self {
        Self { declarations }
    }

    /// Resolves every entity and database without generating anything.
    #[instrument(skip_all, fields(declarations = self.declarations.len()))]
    pub fn resolve(&self) -> ResolvedSchema {
        let mut resolver = Resolver::new(self.declarations);
        let mut schema = ResolvedSchema::default();

        for declaration in self.declarations.annotated_with("Entity") {
            match resolver.entity(&declaration.qualified_name) {
                Ok(entity) => schema.entities.push(entity),
                Err(errors) => schema.diagnostics.extend(errors),
            }
        }
        for declaration in self.declarations.annotated_with("Database") {
            match resolver.database(&declaration.qualified_name) {
                Ok(database) => schema.databases.push(database),
                Err(errors) => schema.diagnostics.extend(errors),
            }
        }

        info!(
            entities = schema.entities.len(),
            databases = schema.databases.len(),
            diagnostics = schema.diagnostics.len(),
            "resolved declarations"
        );
        schema
    }

    /// Resolves the declaration set and feeds each resolved spec to
    /// `handler`: entities first, then databases.
    pub fn process<H: SpecHandler>(&self, handler: &mut H) -> Result<ProcessReport, H::Error> {
        let schema = self.resolve();
        let mut report = ProcessReport {
            diagnostics: schema.diagnostics,
            ..ProcessReport::default()
        };

        for entity in &schema.entities {
            report.diagnostics.extend(handler.handle_entity(entity)?);
            report.entities += 1;
        }
        for database in &schema.databases {
            report.diagnostics.extend(handler.handle_database(database)?);
            report.databases += 1;
        }

        if report.is_success() {
            info!(
                entities = report.entities,
                databases = report.databases,
                "processing finished"
            );
        } else {
            info!(
                entities = report.entities,
                databases = report.databases,
                diagnostics = report.diagnostics.len(),
                "processing finished with errors"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use kabin_core::{AnnotationDeclaration, ClassDeclaration, PropertyDeclaration, TypeRef};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        entities: Vec<String>,
        databases: Vec<String>,
    }

    impl SpecHandler for Recorder {
        type Error = std::convert::Infallible;

        fn handle_entity(&mut self, entity: &Arc<EntitySpec>) -> Result<Vec<Diagnostic>, Self::Error> {
            self.entities.push(entity.table_name.clone());
            Ok(Vec::new())
        }

        fn handle_database(&mut self, database: &DatabaseSpec) -> Result<Vec<Diagnostic>, Self::Error> {
            self.databases.push(database.declaration.clone());
            Ok(Vec::new())
        }
    }

    fn entity(name: &str, with_key: bool) -> ClassDeclaration {
        let mut id = PropertyDeclaration::new("id", TypeRef::new("i64"));
        if with_key {
            id = id.with_annotation(AnnotationDeclaration::new("PrimaryKey"));
        }
        ClassDeclaration::new(name)
            .with_annotation(AnnotationDeclaration::new("Entity"))
            .with_property(id)
    }

    #[test]
    fn test_broken_entity_does_not_stop_others() {
        let declarations = DeclarationSet::new(vec![
            entity("crate::Broken", false),
            entity("crate::Note", true),
            entity("crate::User", true),
        ])
        .unwrap();

        let mut recorder = Recorder::default();
        let report = Processor::new(&declarations).process(&mut recorder).unwrap();

        assert_eq!(recorder.entities, vec!["Note", "User"]);
        assert_eq!(report.entities, 2);
        assert!(!report.is_success());
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics.iter().next().unwrap().declaration, "crate::Broken");
    }

    #[test]
    fn test_handler_diagnostics_are_reported() {
        struct Rejecting;

        impl SpecHandler for Rejecting {
            type Error = String;

            fn handle_entity(&mut self, entity: &Arc<EntitySpec>) -> Result<Vec<Diagnostic>, String> {
                Ok(vec![Diagnostic::new(
                    entity.declaration.clone(),
                    kabin_core::GenerationError::MissingMapper(entity.declaration.clone()),
                )])
            }

            fn handle_database(&mut self, _database: &DatabaseSpec) -> Result<Vec<Diagnostic>, String> {
                Err("unreachable".to_string())
            }
        }

        let declarations = DeclarationSet::new(vec![entity("crate::Note", true)]).unwrap();
        let report = Processor::new(&declarations).process(&mut Rejecting).unwrap();
        assert_eq!(report.entities, 1);
        assert_eq!(report.diagnostics.len(), 1);
    }

    #[test]
    fn test_schema_lookup_by_simple_name() {
        let declarations = DeclarationSet::new(vec![entity("crate::Note", true)]).unwrap();
        let schema = Processor::new(&declarations).resolve();
        assert!(schema.is_success());
        assert!(schema.database("Missing").is_none());
    }
}
