//! Drives the generators over a declaration set.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use kabin_core::{
    ColumnAdapterReference, DaoSpec, DatabaseSpec, DeclarationSet, Diagnostic, EntitySpec,
    ResolutionError, SpecError,
};
use kabin_processor::{ConfigError, KabinOptions, ProcessReport, Processor, SpecHandler};
use proc_macro2::TokenStream;
use tracing::{debug, info};

use crate::emit::CodeSink;
use crate::error::{EmitError, Result};
use crate::formatter::Formatter;
use crate::generators::database::{MapperWiring, QueriesWiring};
use crate::generators;
use crate::naming::{Naming, module_name};
use crate::unit::{GENERATED_HEADER, GeneratedUnit, UnitKind};

/// Output of [`Compiler::compile`].
#[derive(Debug)]
pub struct Compilation<S> {
    /// Resolution summary, including every diagnostic of the run.
    pub report: ProcessReport,
    /// Qualified names of the emitted units, in emission order.
    pub units: Vec<String>,
    /// The sink, finished.
    pub sink: S,
}

impl<S> Compilation<S> {
    pub fn is_success(&self) -> bool {
        self.report.is_success()
    }
}

/// Constructor arguments of a generated queries holder.
#[derive(Debug, Clone)]
struct QueriesWires {
    adapters: Vec<ColumnAdapterReference>,
    mappers: Vec<Arc<EntitySpec>>,
}

/// Generates every unit for a declaration set into a [`CodeSink`].
///
/// Entities and DAOs shared by several databases are generated once.
/// A declaration whose units cannot be generated is reported as a
/// diagnostic and the run continues with the next one.
///
/// # Examples
///
/// ```
/// use kabin_compiler::{Compiler, MemorySink};
/// use kabin_core::*;
/// use kabin_processor::KabinOptions;
///
/// let note = ClassDeclaration::new("crate::Note")
///     .with_annotation(AnnotationDeclaration::new("Entity"))
///     .with_property(
///         PropertyDeclaration::new("id", TypeRef::new("i64"))
///             .with_annotation(AnnotationDeclaration::new("PrimaryKey")),
///     );
/// let declarations = DeclarationSet::new(vec![note]).unwrap();
///
/// let options = KabinOptions { format: false, ..KabinOptions::default() };
/// let compilation = Compiler::new(&options, MemorySink::new())
///     .unwrap()
///     .compile(&declarations)
///     .unwrap();
///
/// assert!(compilation.is_success());
/// assert!(compilation.sink.get("NoteTable").is_some());
/// assert!(compilation.sink.get("NoteMapper").is_some());
/// ```
pub struct Compiler<S: CodeSink> {
    naming: Naming,
    formatter: Formatter,
    sink: S,
    mappers: IndexMap<String, Vec<ColumnAdapterReference>>,
    queries: IndexMap<String, QueriesWires>,
    failed: IndexSet<String>,
    units: Vec<String>,
}

impl<S: CodeSink> Compiler<S> {
    /// # Errors
    ///
    /// Returns [`EmitError::ConfigError`] for unusable options, or
    /// [`EmitError::ShellError`] when formatting is enabled and no shell can
    /// be set up.
    pub fn new(options: &KabinOptions, sink: S) -> Result<Self> {
        options.validate()?;
        let naming = Naming::new(options).map_err(|err| ConfigError::InvalidOption {
            option: "runtime_crate",
            reason: err.to_string(),
        })?;
        Ok(Self {
            naming,
            formatter: Formatter::new(options.format)?,
            sink,
            mappers: IndexMap::new(),
            queries: IndexMap::new(),
            failed: IndexSet::new(),
            units: Vec::new(),
        })
    }

    /// Resolves `declarations`, emits every unit and finishes the sink.
    pub fn compile(mut self, declarations: &DeclarationSet) -> Result<Compilation<S>> {
        let report = Processor::new(declarations).process(&mut self)?;
        self.sink.finish()?;
        info!(
            units = self.units.len(),
            diagnostics = report.diagnostics.len(),
            "compilation finished"
        );
        Ok(Compilation {
            report,
            units: self.units,
            sink: self.sink,
        })
    }

    fn emit_unit(&mut self, name: String, kind: UnitKind, tokens: TokenStream) -> Result<()> {
        let qualified_name = self.naming.qualified(&name);
        let mut source = format!("{GENERATED_HEADER}\n\n{}", self.formatter.format(tokens));
        if !source.ends_with('\n') {
            source.push('\n');
        }
        debug!(unit = %qualified_name, %kind, "generated unit");
        self.units.push(qualified_name.clone());
        self.sink.emit(GeneratedUnit {
            module: module_name(&name),
            name,
            qualified_name,
            kind,
            source,
        })
    }

    /// Emits the table and mapper of `entity` unless already done.
    fn ensure_entity(&mut self, entity: &Arc<EntitySpec>) -> Result<Vec<Diagnostic>> {
        if self.mappers.contains_key(&entity.declaration) {
            return Ok(Vec::new());
        }
        if self.failed.contains(&entity.declaration) {
            return Ok(vec![dependency_failed(entity.declaration.clone())]);
        }

        let generated = generators::table::generate(entity, &self.naming)
            .and_then(|table| Ok((table, generators::mapper::generate(entity, &self.naming)?)));
        let (table, mapper) = match generated {
            Ok(units) => units,
            Err(err) => {
                self.failed.insert(entity.declaration.clone());
                return Ok(vec![Diagnostic::new(entity.declaration.clone(), err)]);
            }
        };

        self.emit_unit(self.naming.table(entity), UnitKind::Table, table)?;
        self.emit_unit(self.naming.mapper(entity), UnitKind::Mapper, mapper.tokens)?;
        self.mappers.insert(entity.declaration.clone(), mapper.adapters);
        Ok(Vec::new())
    }

    /// Emits the queries holder and implementation of `dao` unless already
    /// done.
    fn ensure_dao(&mut self, dao: &DaoSpec) -> Result<Vec<Diagnostic>> {
        if self.queries.contains_key(&dao.declaration) {
            return Ok(Vec::new());
        }
        if self.failed.contains(&dao.declaration) {
            return Ok(vec![dependency_failed(dao.declaration.clone())]);
        }

        let generated = generators::queries::generate(dao, &self.naming)
            .and_then(|queries| Ok((queries, generators::dao::generate(dao, &self.naming)?)));
        let (queries, implementation) = match generated {
            Ok(units) => units,
            Err(err) => {
                self.failed.insert(dao.declaration.clone());
                return Ok(vec![Diagnostic::new(dao.declaration.clone(), err)]);
            }
        };

        self.emit_unit(self.naming.queries(dao), UnitKind::Queries, queries.tokens)?;
        self.emit_unit(self.naming.dao(dao), UnitKind::Dao, implementation)?;
        self.queries.insert(
            dao.declaration.clone(),
            QueriesWires {
                adapters: queries.adapters,
                mappers: queries.mappers,
            },
        );
        Ok(Vec::new())
    }

    fn database_units(&self, database: &DatabaseSpec) -> std::result::Result<(TokenStream, TokenStream), Diagnostic> {
        let anchor = |err: SpecError| Diagnostic::new(database.declaration.clone(), err);

        let mut mappers = Vec::new();
        for entity in &database.entities {
            let adapters = self
                .mappers
                .get(&entity.declaration)
                .ok_or_else(|| anchor(dependency_error(&entity.declaration)))?;
            mappers.push(MapperWiring { entity, adapters });
        }

        let mut daos: IndexMap<&str, &DaoSpec> = IndexMap::new();
        for getter in &database.dao_getters {
            daos.entry(getter.dao.declaration.as_str()).or_insert(&getter.dao);
        }
        let mut queries = Vec::new();
        for dao in daos.into_values() {
            let wires = self
                .queries
                .get(&dao.declaration)
                .ok_or_else(|| anchor(dependency_error(&dao.declaration)))?;
            queries.push(QueriesWiring {
                dao,
                adapters: &wires.adapters,
                mappers: &wires.mappers,
            });
        }

        let schema = generators::database::schema(database, &self.naming).map_err(|err| anchor(err.into()))?;
        let implementation =
            generators::database::generate(database, &self.naming, &mappers, &queries).map_err(anchor)?;
        Ok((schema, implementation))
    }
}

impl<S: CodeSink> SpecHandler for Compiler<S> {
    type Error = EmitError;

    fn handle_entity(&mut self, entity: &Arc<EntitySpec>) -> Result<Vec<Diagnostic>> {
        self.ensure_entity(entity)
    }

    fn handle_database(&mut self, database: &DatabaseSpec) -> Result<Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();
        for entity in &database.entities {
            diagnostics.extend(self.ensure_entity(entity)?);
        }
        for getter in &database.dao_getters {
            diagnostics.extend(self.ensure_dao(&getter.dao)?);
        }
        if !diagnostics.is_empty() {
            debug!(database = %database.declaration, "skipping database with failed dependencies");
            return Ok(diagnostics);
        }

        match self.database_units(database) {
            Ok((schema, implementation)) => {
                self.emit_unit(self.naming.schema(database), UnitKind::Schema, schema)?;
                self.emit_unit(self.naming.database(database), UnitKind::Database, implementation)?;
                Ok(Vec::new())
            }
            Err(diagnostic) => Ok(vec![diagnostic]),
        }
    }
}

fn dependency_error(declaration: &str) -> SpecError {
    ResolutionError::DependencyFailed(declaration.to_string()).into()
}

fn dependency_failed(declaration: String) -> Diagnostic {
    let error = dependency_error(&declaration);
    Diagnostic::new(declaration, error)
}
