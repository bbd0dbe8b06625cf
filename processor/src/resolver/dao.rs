//! DAO resolution: one query spec per abstract function.

use std::collections::HashSet;
use std::sync::Arc;

use kabin_core::annotations::{self, Dao, Delete, Entity, Insert, Query, Update};
use kabin_core::{
    BindingError, ClassDeclaration, DaoSpec, Diagnostic, EntityOperationSpec, FunctionDeclaration,
    OnConflictStrategy, ParameterBinding, ParameterSpec, QueryKind, QuerySpec, ResolutionError,
    ReturnShape, ReturnSpec, ReturnWrapping, RowType, TypeRef, ValidationError, list_element,
};
use tracing::{debug, instrument};

use super::query::parse_query;
use super::{Resolved, Resolver, parse};

/// Integer types an affected-row count can be returned as.
const ROW_COUNT_TYPES: &[&str] = &["i32", "i64", "u32", "u64", "usize", "isize"];

/// The annotation that selects a function's operation.
enum Operation {
    Query(Query),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl<'d> Resolver<'d> {
    #[instrument(skip_all, fields(dao = %declaration.qualified_name))]
    pub(super) fn resolve_dao(&mut self, declaration: &'d ClassDeclaration) -> Resolved<Arc<DaoSpec>> {
        let owner = declaration.qualified_name.as_str();
        if !annotations::is_present::<Dao>(&declaration.annotations) {
            return Err(vec![Diagnostic::new(
                owner,
                ResolutionError::NotADao(owner.to_string()),
            )]);
        }
        if !declaration.is_trait() {
            return Err(vec![Diagnostic::new(
                owner,
                ValidationError::NotATrait(owner.to_string()),
            )]);
        }
        let mut diagnostics = Vec::new();
        parse::<Dao>(owner, &declaration.annotations, &mut diagnostics);

        let mut queries = Vec::new();
        for function in declaration.functions.iter().filter(|function| function.is_abstract) {
            let anchor = format!("{owner}::{}", function.name);
            if let Some(query) = self.query(function, &anchor, &mut diagnostics) {
                queries.push(query);
            }
        }

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }
        debug!(queries = queries.len(), "resolved dao");
        Ok(Arc::new(DaoSpec {
            declaration: owner.to_string(),
            queries,
        }))
    }

    fn query(
        &mut self,
        function: &FunctionDeclaration,
        anchor: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<QuerySpec> {
        let operation = operation(function, anchor, diagnostics)?;
        let declared = function.return_type_or_unit();
        let (wrapping, inner) = split_result(&declared);
        let reported = diagnostics.len();

        let (parameters, kind, shape) = match operation {
            Operation::Query(query) => self.raw_query(function, &query, &inner, anchor, diagnostics)?,
            Operation::Insert(insert) => {
                let (parameter, target) =
                    self.operation_target(function, insert.entity.as_ref(), anchor, diagnostics)?;
                let shape = write_shape(function, &inner, anchor, diagnostics)?;
                let target = EntityOperationSpec {
                    on_conflict: insert.on_conflict,
                    ..target
                };
                (vec![parameter], QueryKind::Insert(target), shape)
            }
            Operation::Update(update) => {
                let (parameter, target) =
                    self.operation_target(function, update.entity.as_ref(), anchor, diagnostics)?;
                let shape = write_shape(function, &inner, anchor, diagnostics)?;
                let target = EntityOperationSpec {
                    on_conflict: update.on_conflict,
                    ..target
                };
                (vec![parameter], QueryKind::Update(target), shape)
            }
            Operation::Delete(delete) => {
                let (parameter, target) =
                    self.operation_target(function, delete.entity.as_ref(), anchor, diagnostics)?;
                let shape = write_shape(function, &inner, anchor, diagnostics)?;
                (vec![parameter], QueryKind::Delete(target), shape)
            }
        };
        if diagnostics.len() > reported {
            return None;
        }
        Some(QuerySpec {
            function: function.name.clone(),
            parameters,
            returns: ReturnSpec {
                declared,
                wrapping,
                shape,
            },
            kind,
        })
    }

    fn raw_query(
        &mut self,
        function: &FunctionDeclaration,
        query: &Query,
        returns: &TypeRef,
        anchor: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<(Vec<ParameterSpec>, QueryKind, ReturnShape)> {
        if query.value.trim().is_empty() {
            diagnostics.push(Diagnostic::new(
                anchor,
                ValidationError::EmptyQuery(function.name.clone()),
            ));
            return None;
        }
        let raw = match parse_query(&query.value) {
            Ok(raw) => raw,
            Err(error) => {
                diagnostics.push(Diagnostic::new(anchor, error));
                return None;
            }
        };

        let mut parameters = Vec::new();
        for parameter in &function.parameters {
            let binding = match list_element(&parameter.ty) {
                Some(element) => self.value_mapping(element).map(ParameterBinding::List),
                None => self.value_mapping(&parameter.ty).map(ParameterBinding::Value),
            };
            match binding {
                Some(binding) => parameters.push(ParameterSpec {
                    name: parameter.name.clone(),
                    ty: parameter.ty.clone(),
                    binding,
                }),
                None => diagnostics.push(Diagnostic::new(
                    anchor,
                    ResolutionError::UnsupportedParameterType {
                        parameter: parameter.name.clone(),
                        ty: parameter.ty.to_rust(),
                    },
                )),
            }
        }

        let declared: HashSet<&str> = function
            .parameters
            .iter()
            .map(|parameter| parameter.name.as_str())
            .collect();
        let mut unbound = HashSet::new();
        for placeholder in &raw.bindings {
            if !declared.contains(placeholder.as_str()) && unbound.insert(placeholder.as_str()) {
                diagnostics.push(Diagnostic::new(
                    anchor,
                    BindingError::UnboundQueryParameter(placeholder.clone()),
                ));
            }
        }
        for parameter in &function.parameters {
            if !raw.bindings.contains(&parameter.name) {
                diagnostics.push(Diagnostic::new(
                    anchor,
                    BindingError::UnusedQueryParameter(parameter.name.clone()),
                ));
            }
        }

        let shape = if raw.statement.returns_rows() {
            self.read_shape(function, returns, anchor, diagnostics)?
        } else {
            write_shape(function, returns, anchor, diagnostics)?
        };
        Some((parameters, QueryKind::Raw(raw), shape))
    }

    fn read_shape(
        &mut self,
        function: &FunctionDeclaration,
        returns: &TypeRef,
        anchor: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<ReturnShape> {
        if returns.is_unit() {
            diagnostics.push(Diagnostic::new(
                anchor,
                ValidationError::ReturnTypeMismatch {
                    function: function.name.clone(),
                    expected: "a query returning rows needs a row, Option or Vec return type",
                    found: returns.to_rust(),
                },
            ));
            return None;
        }
        if let Some(element) = list_element(returns) {
            return self.row_type(element, anchor, diagnostics).map(ReturnShape::List);
        }
        if returns.nullable {
            return self
                .row_type(&returns.non_null(), anchor, diagnostics)
                .map(ReturnShape::Optional);
        }
        self.row_type(returns, anchor, diagnostics).map(ReturnShape::Single)
    }

    fn row_type(&mut self, ty: &TypeRef, anchor: &str, diagnostics: &mut Vec<Diagnostic>) -> Option<RowType> {
        if let Some(declaration) = self.declarations.resolve(ty) {
            if annotations::is_present::<Entity>(&declaration.annotations) {
                return self
                    .dependent_entity(anchor, ty, diagnostics)
                    .map(RowType::Entity);
            }
            if self.is_compound(declaration) {
                return self.compound_row(ty, anchor, diagnostics).map(RowType::Compound);
            }
        }
        match self.value_mapping(ty) {
            Some(mapping) => Some(RowType::Scalar {
                ty: ty.clone(),
                mapping,
            }),
            None => {
                diagnostics.push(Diagnostic::new(
                    anchor,
                    ResolutionError::UnsupportedReturnType(ty.to_rust()),
                ));
                None
            }
        }
    }

    /// The single entity parameter of an insert, update or delete.
    fn operation_target(
        &mut self,
        function: &FunctionDeclaration,
        declared_entity: Option<&TypeRef>,
        anchor: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<(ParameterSpec, EntityOperationSpec)> {
        let [parameter] = function.parameters.as_slice() else {
            diagnostics.push(Diagnostic::new(
                anchor,
                ValidationError::EntityParameterCount(function.name.clone()),
            ));
            return None;
        };
        let (entity_type, is_list) = match list_element(&parameter.ty) {
            Some(element) => (element.clone(), true),
            None => (parameter.ty.clone(), false),
        };

        if let Some(expected) = declared_entity {
            let matches = match (
                self.declarations.resolve(expected),
                self.declarations.resolve(&entity_type),
            ) {
                (Some(expected), Some(found)) => expected.qualified_name == found.qualified_name,
                _ => false,
            };
            if !matches || entity_type.nullable {
                diagnostics.push(Diagnostic::new(
                    anchor,
                    BindingError::EntityParameterMismatch {
                        parameter: parameter.name.clone(),
                        expected: expected.to_rust(),
                        found: parameter.ty.to_rust(),
                    },
                ));
                return None;
            }
        } else if entity_type.nullable {
            diagnostics.push(Diagnostic::new(
                anchor,
                BindingError::EntityParameterMismatch {
                    parameter: parameter.name.clone(),
                    expected: entity_type.non_null().to_rust(),
                    found: parameter.ty.to_rust(),
                },
            ));
            return None;
        }

        let entity = self.dependent_entity(anchor, &entity_type, diagnostics)?;
        let binding = if is_list {
            ParameterBinding::EntityList(Arc::clone(&entity))
        } else {
            ParameterBinding::Entity(Arc::clone(&entity))
        };
        Some((
            ParameterSpec {
                name: parameter.name.clone(),
                ty: parameter.ty.clone(),
                binding,
            },
            EntityOperationSpec {
                entity,
                parameter: parameter.name.clone(),
                is_list,
                on_conflict: OnConflictStrategy::Abort,
            },
        ))
    }
}

/// Picks the single operation annotation of `function`.
fn operation(function: &FunctionDeclaration, anchor: &str, diagnostics: &mut Vec<Diagnostic>) -> Option<Operation> {
    let present: Vec<&str> = ["Query", "Insert", "Update", "Delete"]
        .into_iter()
        .filter(|name| function.annotations.iter().any(|annotation| annotation.is(name)))
        .collect();
    match present.as_slice() {
        [] => {
            diagnostics.push(Diagnostic::new(
                anchor,
                ValidationError::MissingQueryAnnotation(function.name.clone()),
            ));
            None
        }
        [_] => {
            let annotations = &function.annotations;
            let operation = if let Some(query) = parse::<Query>(anchor, annotations, diagnostics) {
                Operation::Query(query)
            } else if let Some(insert) = parse::<Insert>(anchor, annotations, diagnostics) {
                Operation::Insert(insert)
            } else if let Some(update) = parse::<Update>(anchor, annotations, diagnostics) {
                Operation::Update(update)
            } else {
                Operation::Delete(parse::<Delete>(anchor, annotations, diagnostics)?)
            };
            Some(operation)
        }
        _ => {
            let annotations: Vec<String> = present.iter().map(|name| format!("@{name}")).collect();
            diagnostics.push(Diagnostic::new(
                anchor,
                ValidationError::ConflictingQueryAnnotations {
                    function: function.name.clone(),
                    annotations: annotations.join(", "),
                },
            ));
            None
        }
    }
}

/// Splits `Result<T>` / `Result<T, E>` into its wrapping and `T`.
fn split_result(declared: &TypeRef) -> (ReturnWrapping, TypeRef) {
    if declared.nullable || declared.simple_name() != "Result" {
        return (ReturnWrapping::Plain, declared.clone());
    }
    match declared.arguments.as_slice() {
        [value] => (ReturnWrapping::Result, value.clone()),
        [value, error] => (ReturnWrapping::ResultWith(error.clone()), value.clone()),
        _ => (ReturnWrapping::Plain, declared.clone()),
    }
}

/// Return shape of a statement that produces no rows.
fn write_shape(
    function: &FunctionDeclaration,
    returns: &TypeRef,
    anchor: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<ReturnShape> {
    if returns.is_unit() {
        return Some(ReturnShape::Unit);
    }
    if !returns.nullable && returns.arguments.is_empty() && ROW_COUNT_TYPES.contains(&returns.name.as_str()) {
        return Some(ReturnShape::AffectedRows(returns.clone()));
    }
    diagnostics.push(Diagnostic::new(
        anchor,
        ValidationError::ReturnTypeMismatch {
            function: function.name.clone(),
            expected: "statements without rows return () or an integer row count",
            found: returns.to_rust(),
        },
    ));
    None
}

#[cfg(test)]
mod tests {
    use kabin_core::{AnnotationDeclaration, AnnotationValue, DeclarationSet, PropertyDeclaration, SpecError};

    use super::*;

    fn user() -> ClassDeclaration {
        ClassDeclaration::new("crate::User")
            .with_annotation(AnnotationDeclaration::new("Entity"))
            .with_property(
                PropertyDeclaration::new("id", TypeRef::new("i32"))
                    .with_annotation(AnnotationDeclaration::new("PrimaryKey")),
            )
            .with_property(PropertyDeclaration::new("name", TypeRef::new("String")))
    }

    fn dao(function: FunctionDeclaration) -> ClassDeclaration {
        ClassDeclaration::new_trait("crate::UserDao")
            .with_annotation(AnnotationDeclaration::new("Dao"))
            .with_function(function)
    }

    fn query(sql: &str) -> AnnotationDeclaration {
        AnnotationDeclaration::new("Query").with_argument("value", sql)
    }

    fn resolve(function: FunctionDeclaration) -> Resolved<Arc<DaoSpec>> {
        let set = DeclarationSet::new(vec![user(), dao(function)]).unwrap();
        Resolver::new(&set).dao("crate::UserDao")
    }

    fn errors(function: FunctionDeclaration) -> Vec<SpecError> {
        resolve(function)
            .unwrap_err()
            .into_iter()
            .map(|diagnostic| diagnostic.error)
            .collect()
    }

    const BY_ID_AND_NAME: &str = "SELECT * FROM User WHERE id = :id AND name = :name";

    #[test]
    fn test_query_binds_every_placeholder() {
        let function = FunctionDeclaration::new("find")
            .with_parameter("id", TypeRef::new("i32"))
            .with_parameter("name", TypeRef::new("String"))
            .returning(TypeRef::new("crate::User").into_nullable())
            .with_annotation(query(BY_ID_AND_NAME));
        let spec = resolve(function).unwrap();
        let find = &spec.queries[0];
        let QueryKind::Raw(raw) = &find.kind else {
            panic!("expected a raw query");
        };
        assert_eq!(raw.bindings, vec!["id".to_string(), "name".to_string()]);
        assert!(matches!(find.returns.shape, ReturnShape::Optional(RowType::Entity(_))));
        assert!(find.parameter("id").unwrap().binding.mapping().unwrap().adapter().is_some());
    }

    #[test]
    fn test_missing_parameter_is_unbound() {
        let function = FunctionDeclaration::new("find")
            .with_parameter("id", TypeRef::new("i32"))
            .returning(TypeRef::new("crate::User").into_nullable())
            .with_annotation(query(BY_ID_AND_NAME));
        assert_eq!(
            errors(function),
            vec![SpecError::Binding(BindingError::UnboundQueryParameter("name".to_string()))]
        );
    }

    #[test]
    fn test_extra_parameter_is_unused() {
        let function = FunctionDeclaration::new("all")
            .with_parameter("limit", TypeRef::new("i64"))
            .returning(TypeRef::new("Vec").with_argument(TypeRef::new("crate::User")))
            .with_annotation(query("SELECT * FROM User"));
        assert_eq!(
            errors(function),
            vec![SpecError::Binding(BindingError::UnusedQueryParameter("limit".to_string()))]
        );
    }

    #[test]
    fn test_list_parameter_and_scalar_rows() {
        let function = FunctionDeclaration::new("names")
            .with_parameter("ids", TypeRef::new("Vec").with_argument(TypeRef::new("i64")))
            .returning(
                TypeRef::new("Result")
                    .with_argument(TypeRef::new("Vec").with_argument(TypeRef::new("String"))),
            )
            .with_annotation(query("SELECT name FROM User WHERE id IN (:ids)"));
        let spec = resolve(function).unwrap();
        let names = &spec.queries[0];
        assert!(matches!(names.parameters[0].binding, ParameterBinding::List(_)));
        assert_eq!(names.returns.wrapping, ReturnWrapping::Result);
        assert!(matches!(names.returns.shape, ReturnShape::List(RowType::Scalar { .. })));
    }

    #[test]
    fn test_insert_with_replace() {
        let function = FunctionDeclaration::new("upsert")
            .with_parameter("user", TypeRef::new("crate::User"))
            .with_annotation(
                AnnotationDeclaration::new("Insert").with_argument("onConflict", AnnotationValue::constant("REPLACE")),
            );
        let spec = resolve(function).unwrap();
        let QueryKind::Insert(insert) = &spec.queries[0].kind else {
            panic!("expected an insert");
        };
        assert_eq!(insert.on_conflict, OnConflictStrategy::Replace);
        assert!(!insert.is_list);
        assert_eq!(spec.queries[0].returns.shape, ReturnShape::Unit);
    }

    #[test]
    fn test_delete_of_declared_entity_must_match_parameter() {
        let function = FunctionDeclaration::new("remove")
            .with_parameter("name", TypeRef::new("String"))
            .with_annotation(
                AnnotationDeclaration::new("Delete").with_argument("entity", AnnotationValue::class(TypeRef::new("crate::User"))),
            );
        assert!(matches!(
            &errors(function)[..],
            [SpecError::Binding(BindingError::EntityParameterMismatch { parameter, .. })] if parameter == "name"
        ));
    }

    #[test]
    fn test_select_needs_row_type_and_update_needs_count() {
        let select = FunctionDeclaration::new("touch").with_annotation(query("SELECT 1"));
        assert!(matches!(
            &errors(select)[..],
            [SpecError::Validation(ValidationError::ReturnTypeMismatch { .. })]
        ));

        let update = FunctionDeclaration::new("rename")
            .returning(TypeRef::new("String"))
            .with_annotation(query("UPDATE User SET name = 'x'"));
        assert!(matches!(
            &errors(update)[..],
            [SpecError::Validation(ValidationError::ReturnTypeMismatch { .. })]
        ));
    }

    #[test]
    fn test_conflicting_and_missing_annotations() {
        let both = FunctionDeclaration::new("both")
            .with_parameter("user", TypeRef::new("crate::User"))
            .with_annotation(AnnotationDeclaration::new("Insert"))
            .with_annotation(AnnotationDeclaration::new("Update"));
        assert_eq!(
            errors(both),
            vec![SpecError::Validation(ValidationError::ConflictingQueryAnnotations {
                function: "both".to_string(),
                annotations: "@Insert, @Update".to_string(),
            })]
        );

        let none = FunctionDeclaration::new("none");
        assert_eq!(
            errors(none),
            vec![SpecError::Validation(ValidationError::MissingQueryAnnotation("none".to_string()))]
        );
    }

    #[test]
    fn test_default_functions_are_skipped() {
        let mut helper = FunctionDeclaration::new("helper");
        helper.is_abstract = false;
        let spec = resolve(helper).unwrap();
        assert!(spec.queries.is_empty());
    }
}
