//! `<Dao>Queries`: one method per DAO function, returning the runtime's
//! `Result`.
//!
//! Rows of a compound type are loaded in two steps. The main statement maps
//! the embedded entity and keeps the parent key of every relation; a private
//! `load_<compound>` method then runs one statement per relation and
//! constructs the compound.

use std::sync::Arc;

use heck::ToSnakeCase;
use indexmap::{IndexMap, IndexSet};
use kabin_core::{
    ColumnAdapterReference, CompoundSpec, DaoSpec, EntityOperationSpec, EntitySpec,
    GenerationError, ParameterBinding, QueryKind, QuerySpec, RawQuerySpec, RelationCardinality,
    RelationElement, ReturnShape, RowType, SqlSegment, ValueMapping, list_element,
};
use proc_macro2::{Ident, Literal, TokenStream};
use quote::{format_ident, quote};

use super::mapper::construct;
use super::{Source, adapter_ident, adapter_type, bind_expr, column_value, read_expr};
use crate::naming::{Naming, ident, mapper_field, path, rust_type};
use crate::sql;

type Result<T> = std::result::Result<T, GenerationError>;

pub(crate) struct Queries {
    pub(crate) tokens: TokenStream,
    /// Adapters passed to `new`, in parameter order.
    pub(crate) adapters: Vec<ColumnAdapterReference>,
    /// Entities whose mapper is passed to `new`, in parameter order.
    pub(crate) mappers: Vec<Arc<EntitySpec>>,
}

pub(crate) fn generate(dao: &DaoSpec, naming: &Naming) -> Result<Queries> {
    let runtime = naming.runtime();
    let name = ident(&naming.queries(dao))?;
    let doc = format!(" Statements behind [`{}`].", dao.declaration);

    let adapters = adapters(dao);
    let mappers = mappers(dao);

    let mut fields = vec![quote! { driver }];
    let mut types = vec![quote! { ::std::sync::Arc<dyn #runtime::SqlDriver> }];
    for adapter in &adapters {
        let field = adapter_ident(adapter)?;
        fields.push(quote! { #field });
        types.push(adapter_type(runtime, adapter)?);
    }
    for entity in mappers.values() {
        let mapper = ident(&naming.mapper(entity))?;
        let field = ident(&mapper_field(entity))?;
        fields.push(quote! { #field });
        types.push(quote! { ::std::sync::Arc<super::#mapper> });
    }

    let methods = dao
        .queries
        .iter()
        .map(|query| method(runtime, query))
        .collect::<Result<Vec<_>>>()?;
    let loaders = dao
        .compounds()
        .into_iter()
        .map(|compound| loader(runtime, compound))
        .collect::<Result<Vec<_>>>()?;

    let tokens = quote! {
        #[doc = #doc]
        pub struct #name {
            #(#fields: #types,)*
        }

        impl #name {
            #[allow(clippy::too_many_arguments)]
            pub fn new(#(#fields: #types),*) -> Self {
                Self { #(#fields),* }
            }

            #(#methods)*

            #(#loaders)*
        }
    };
    Ok(Queries {
        tokens,
        adapters: adapters.into_iter().collect(),
        mappers: mappers.into_values().collect(),
    })
}

/// Adapters for bound arguments, scalar rows and written entities.
fn adapters(dao: &DaoSpec) -> IndexSet<ColumnAdapterReference> {
    let mut adapters = dao.binding_adapters();
    for query in &dao.queries {
        if let Some(operation) = operation(&query.kind) {
            adapters.extend(operation.entity.adapters());
        }
    }
    adapters
}

/// Entities read through a mapper, keyed by declaration.
fn mappers(dao: &DaoSpec) -> IndexMap<String, Arc<EntitySpec>> {
    let mut mappers = IndexMap::new();
    let mut add = |entity: &Arc<EntitySpec>| {
        mappers
            .entry(entity.declaration.clone())
            .or_insert_with(|| Arc::clone(entity));
    };
    for query in &dao.queries {
        match query.returns.shape.row_type() {
            Some(RowType::Entity(entity)) => add(entity),
            Some(RowType::Compound(compound)) => {
                add(&compound.main);
                for relation in &compound.relations {
                    if relation.relation.element == RelationElement::Entity {
                        add(&relation.relation.entity);
                    }
                }
            }
            _ => {}
        }
    }
    mappers
}

fn operation(kind: &QueryKind) -> Option<&EntityOperationSpec> {
    match kind {
        QueryKind::Insert(operation) | QueryKind::Update(operation) | QueryKind::Delete(operation) => {
            Some(operation)
        }
        QueryKind::Raw(_) => None,
    }
}

fn output_type(shape: &ReturnShape) -> Result<TokenStream> {
    Ok(match shape {
        ReturnShape::Unit => quote! { () },
        ReturnShape::AffectedRows(ty) => rust_type(ty)?,
        ReturnShape::Single(row) => rust_type(&row.ty())?,
        ReturnShape::Optional(row) => {
            let row = rust_type(&row.ty())?;
            quote! { Option<#row> }
        }
        ReturnShape::List(row) => {
            let row = rust_type(&row.ty())?;
            quote! { Vec<#row> }
        }
    })
}

fn method(runtime: &TokenStream, query: &QuerySpec) -> Result<TokenStream> {
    let function = ident(&query.function)?;
    let mut parameters = Vec::new();
    for parameter in &query.parameters {
        let name = ident(&parameter.name)?;
        let ty = rust_type(&parameter.ty)?;
        parameters.push(quote! { #name: #ty });
    }
    let output = output_type(&query.returns.shape)?;
    let body = match &query.kind {
        QueryKind::Raw(raw) => raw_body(runtime, query, raw)?,
        QueryKind::Insert(operation) => {
            let statement = sql::insert(&operation.entity, operation.on_conflict);
            let columns = operation.entity.stored_columns();
            write_body(runtime, query, operation, &statement, &columns)?
        }
        QueryKind::Update(operation) => {
            let statement = sql::update(&operation.entity, operation.on_conflict);
            let mut columns = sql::update_columns(&operation.entity);
            columns.extend(operation.entity.primary_key_columns());
            write_body(runtime, query, operation, &statement, &columns)?
        }
        QueryKind::Delete(operation) => {
            let statement = sql::delete(&operation.entity);
            let columns = operation.entity.primary_key_columns();
            write_body(runtime, query, operation, &statement, &columns)?
        }
    };
    Ok(quote! {
        pub fn #function(&self, #(#parameters),*) -> #runtime::Result<#output> {
            #body
        }
    })
}

fn raw_body(runtime: &TokenStream, query: &QuerySpec, raw: &RawQuerySpec) -> Result<TokenStream> {
    let is_list = |name: &str| {
        query
            .parameter(name)
            .is_some_and(|parameter| matches!(parameter.binding, ParameterBinding::List(_)))
    };

    let (sql_setup, sql) = if raw.bindings.iter().any(|name| is_list(name)) {
        let mut pushes = Vec::new();
        for segment in &raw.segments {
            pushes.push(match segment {
                SqlSegment::Text(text) => quote! { sql.push_str(#text); },
                SqlSegment::Parameter(name) if is_list(name) => {
                    let name = ident(name)?;
                    quote! { #runtime::push_placeholders(&mut sql, #name.len()); }
                }
                SqlSegment::Parameter(_) => quote! { sql.push('?'); },
            });
        }
        (quote! { let mut sql = String::new(); #(#pushes)* }, quote! { &sql })
    } else {
        let text = raw.positional_sql();
        (quote! { let sql = #text; }, quote! { sql })
    };

    let mut pushes = Vec::new();
    for name in &raw.bindings {
        let Some(parameter) = query.parameter(name) else {
            continue;
        };
        let value = ident(name)?;
        pushes.push(match &parameter.binding {
            ParameterBinding::Value(mapping) => {
                let bound = bind_expr(runtime, quote! { #value }, &parameter.ty, mapping)?;
                quote! { params.push(#bound); }
            }
            ParameterBinding::List(mapping) => {
                let nullable = list_element(&parameter.ty).is_some_and(|element| element.nullable);
                list_binding(runtime, &value, mapping, nullable)?
            }
            // Entity arguments only belong to insert, update and delete.
            ParameterBinding::Entity(_) | ParameterBinding::EntityList(_) => continue,
        });
    }
    let params = if pushes.is_empty() {
        quote! { let params: Vec<#runtime::SqlValue> = Vec::new(); }
    } else {
        quote! { let mut params: Vec<#runtime::SqlValue> = Vec::new(); #(#pushes)* }
    };

    let run = match &query.returns.shape {
        ReturnShape::Unit => quote! {
            self.driver.execute(#sql, &params)?;
            Ok(())
        },
        ReturnShape::AffectedRows(_) => quote! {
            let count = self.driver.execute(#sql, &params)?;
            #runtime::affected_rows(count)
        },
        ReturnShape::Single(row) | ReturnShape::Optional(row) | ReturnShape::List(row) => {
            read_rows(runtime, &query.returns.shape, row, &sql)?
        }
    };
    Ok(quote! {
        #sql_setup
        #params
        #run
    })
}

fn list_binding(runtime: &TokenStream, value: &Ident, mapping: &ValueMapping, nullable: bool) -> Result<TokenStream> {
    Ok(match mapping {
        ValueMapping::Native(_) => quote! {
            params.extend(#value.iter().map(#runtime::ToSqlValue::to_sql_value));
        },
        ValueMapping::Adapted(adapter) => {
            let field = adapter_ident(adapter)?;
            if nullable {
                quote! {
                    params.extend(#value.iter().map(|value| {
                        #runtime::SqlValue::from(value.as_ref().map(|value| self.#field.encode(value)))
                    }));
                }
            } else {
                quote! {
                    params.extend(#value.iter().map(|value| #runtime::SqlValue::from(self.#field.encode(value))));
                }
            }
        }
    })
}

fn read_rows(runtime: &TokenStream, shape: &ReturnShape, row: &RowType, sql: &TokenStream) -> Result<TokenStream> {
    let helper = match shape {
        ReturnShape::List(_) => quote! { query_list },
        ReturnShape::Optional(_) => quote! { query_optional },
        _ => quote! { query_single },
    };
    let query = |map: TokenStream| {
        quote! { #runtime::#helper(&*self.driver, #sql, &params, |cursor| #map) }
    };

    match row {
        RowType::Entity(entity) => {
            let mapper = ident(&mapper_field(entity))?;
            Ok(query(quote! { #runtime::EntityMapper::map(&*self.#mapper, cursor) }))
        }
        RowType::Scalar { ty, mapping } => {
            let value = read_expr(runtime, Source::First, ty, mapping)?;
            Ok(query(quote! { Ok(#value) }))
        }
        RowType::Compound(compound) => {
            let mapper = ident(&mapper_field(&compound.main))?;
            let loader = loader_ident(compound)?;
            let keys: Vec<&str> = compound
                .relations
                .iter()
                .map(|relation| relation.relation.parent_column.as_str())
                .collect();
            let rows = query(quote! {
                Ok((
                    #runtime::EntityMapper::map(&*self.#mapper, cursor)?,
                    [#(#runtime::read_value(cursor, #keys)?),*],
                ))
            });
            Ok(match shape {
                ReturnShape::List(_) => quote! {
                    let rows = #rows?;
                    rows.into_iter().map(|(main, keys)| self.#loader(main, keys)).collect()
                },
                ReturnShape::Optional(_) => quote! {
                    let row = #rows?;
                    row.map(|(main, keys)| self.#loader(main, keys)).transpose()
                },
                _ => quote! {
                    let (main, keys) = #rows?;
                    self.#loader(main, keys)
                },
            })
        }
    }
}

fn write_body(
    runtime: &TokenStream,
    query: &QuerySpec,
    operation: &EntityOperationSpec,
    statement: &str,
    columns: &[&kabin_core::ColumnSpec],
) -> Result<TokenStream> {
    let parameter = ident(&operation.parameter)?;
    let values = columns
        .iter()
        .map(|column| column_value(runtime, &operation.entity.members, column))
        .collect::<Result<Vec<_>>>()?;
    let counting = matches!(query.returns.shape, ReturnShape::AffectedRows(_));
    let tail = if counting {
        quote! { #runtime::affected_rows(count) }
    } else {
        quote! { Ok(()) }
    };

    if operation.is_list {
        let execute = if counting {
            quote! { count += self.driver.execute(sql, &params)?; }
        } else {
            quote! { self.driver.execute(sql, &params)?; }
        };
        let counter = counting.then(|| quote! { let mut count: u64 = 0; });
        Ok(quote! {
            let sql = #statement;
            #counter
            self.driver.transaction(&mut || {
                for entity in #parameter.iter() {
                    let params = vec![#(#values),*];
                    #execute
                }
                Ok(())
            })?;
            #tail
        })
    } else {
        let execute = if counting {
            quote! { let count = self.driver.execute(#statement, &params)?; }
        } else {
            quote! { self.driver.execute(#statement, &params)?; }
        };
        Ok(quote! {
            let entity = &#parameter;
            let params = vec![#(#values),*];
            #execute
            #tail
        })
    }
}

fn loader_ident(compound: &CompoundSpec) -> Result<Ident> {
    ident(&format!("load_{}", compound.simple_name().to_snake_case()))
}

fn loader(runtime: &TokenStream, compound: &CompoundSpec) -> Result<TokenStream> {
    let loader = loader_ident(compound)?;
    let main_type = rust_type(&compound.main.type_ref())?;
    let compound_type = path(&compound.declaration)?;
    let count = Literal::usize_unsuffixed(compound.relations.len());
    let keys: Vec<Ident> = (0..compound.relations.len())
        .map(|index| format_ident!("key_{}", index))
        .collect();

    let mut loads = Vec::new();
    for (relation, key) in compound.relations.iter().zip(&keys) {
        let property = ident(&relation.property)?;
        let relation = &relation.relation;
        let statement = sql::relation_select(relation);
        let map = match &relation.element {
            RelationElement::Entity => {
                let mapper = ident(&mapper_field(&relation.entity))?;
                quote! { #runtime::EntityMapper::map(&*self.#mapper, cursor) }
            }
            RelationElement::Scalar { ty, mapping, .. } => {
                let value = read_expr(runtime, Source::First, ty, mapping)?;
                quote! { Ok(#value) }
            }
        };
        let helper = match relation.cardinality {
            RelationCardinality::One => quote! { query_optional },
            RelationCardinality::Many => quote! { query_list },
        };
        loads.push(quote! {
            let #property = #runtime::#helper(&*self.driver, #statement, &[#key], |cursor| #map)?;
        });
    }

    let value = construct(&compound.declaration, &compound.constructor, |parameter| {
        if parameter == compound.main_property {
            return Ok(Some(quote! { main }));
        }
        match compound.relations.iter().find(|relation| relation.property == parameter) {
            Some(relation) => {
                let property = ident(&relation.property)?;
                Ok(Some(quote! { #property }))
            }
            None => Ok(None),
        }
    })?;

    Ok(quote! {
        fn #loader(&self, main: #main_type, keys: [#runtime::SqlValue; #count]) -> #runtime::Result<#compound_type> {
            let [#(#keys),*] = keys;
            #(#loads)*
            Ok(#value)
        }
    })
}
