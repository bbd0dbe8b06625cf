//! Token generators for each kind of unit, plus the value plumbing they
//! share: reading a column into a property type and binding a property
//! value as a statement argument.

pub(crate) mod dao;
pub(crate) mod database;
pub(crate) mod mapper;
pub(crate) mod queries;
pub(crate) mod table;

use kabin_core::{
    ColumnAdapterReference, ColumnSpec, EmbeddedSpec, EntityMember, GenerationError, TypeRef,
    ValueMapping,
};
use proc_macro2::{Ident, TokenStream};
use quote::quote;

use crate::naming::{adapter_field, ident, rust_type};

type Result<T> = std::result::Result<T, GenerationError>;

/// `Arc<dyn ColumnAdapter<T, S>>` for an adapter field.
pub(crate) fn adapter_type(runtime: &TokenStream, adapter: &ColumnAdapterReference) -> Result<TokenStream> {
    let source = rust_type(&adapter.source_type)?;
    let storage = rust_type(&adapter.storage_type())?;
    Ok(quote! { ::std::sync::Arc<dyn #runtime::ColumnAdapter<#source, #storage>> })
}

pub(crate) fn adapter_ident(adapter: &ColumnAdapterReference) -> Result<Ident> {
    ident(&adapter_field(adapter))
}

/// Where a value is read from in the current row.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Source<'a> {
    Column(&'a str),
    /// The first column, for scalar rows.
    First,
}

/// Expression reading a value of type `ty` from `cursor`, `?` included.
pub(crate) fn read_expr(
    runtime: &TokenStream,
    source: Source<'_>,
    ty: &TypeRef,
    mapping: &ValueMapping,
) -> Result<TokenStream> {
    let read = |storage: TokenStream| match source {
        Source::Column(name) => quote! { #runtime::read::<#storage>(cursor, #name)? },
        Source::First => quote! { #runtime::read_at::<#storage>(cursor, 0)? },
    };
    match mapping {
        ValueMapping::Native(_) => Ok(read(rust_type(ty)?)),
        ValueMapping::Adapted(adapter) => {
            let field = adapter_ident(adapter)?;
            let storage = rust_type(&adapter.storage_type())?;
            if ty.nullable {
                let read = read(quote! { Option<#storage> });
                Ok(quote! { #read.map(|value| self.#field.decode(value)).transpose()? })
            } else {
                let read = read(storage);
                Ok(quote! { self.#field.decode(#read)? })
            }
        }
    }
}

/// Expression converting the place `value` (of type `ty`) into a
/// `SqlValue`.
pub(crate) fn bind_expr(
    runtime: &TokenStream,
    value: TokenStream,
    ty: &TypeRef,
    mapping: &ValueMapping,
) -> Result<TokenStream> {
    match mapping {
        ValueMapping::Native(_) => Ok(quote! { #runtime::ToSqlValue::to_sql_value(&#value) }),
        ValueMapping::Adapted(adapter) => {
            let field = adapter_ident(adapter)?;
            if ty.nullable {
                Ok(quote! {
                    #runtime::SqlValue::from(#value.as_ref().map(|value| self.#field.encode(value)))
                })
            } else {
                Ok(quote! { #runtime::SqlValue::from(self.#field.encode(&#value)) })
            }
        }
    }
}

/// Expression reading a stored column of `entity` (a `&Entity` binding
/// named `entity`) as a `SqlValue`, through any embedded structs.
pub(crate) fn column_value(
    runtime: &TokenStream,
    members: &[EntityMember],
    column: &ColumnSpec,
) -> Result<TokenStream> {
    let mapping = column
        .mapping
        .as_ref()
        .ok_or_else(|| GenerationError::UncoveredMember {
            owner: column.embedded_in.clone().unwrap_or_default(),
            member: column.property.clone(),
        })?;
    let mut chain = Vec::new();
    embedding_chain(members, &column.name, &mut chain);

    let mut access = Access::Direct(quote! { entity });
    for embedded in chain {
        let property = ident(&embedded.property)?;
        access = match (access, embedded.is_nullable) {
            (Access::Direct(place), false) => Access::Direct(quote! { #place.#property }),
            (Access::Direct(place), true) => Access::Optional(quote! { #place.#property.as_ref() }),
            (Access::Optional(option), false) => {
                Access::Optional(quote! { #option.map(|value| &value.#property) })
            }
            (Access::Optional(option), true) => {
                Access::Optional(quote! { #option.and_then(|value| value.#property.as_ref()) })
            }
        };
    }

    let property = ident(&column.property)?;
    match access {
        Access::Direct(place) => bind_expr(runtime, quote! { #place.#property }, &column.ty, mapping),
        Access::Optional(option) => {
            let option = if column.ty.nullable {
                quote! { #option.and_then(|value| value.#property.as_ref()) }
            } else {
                quote! { #option.map(|value| &value.#property) }
            };
            match mapping {
                ValueMapping::Native(_) => Ok(quote! { #runtime::ToSqlValue::to_sql_value(&#option) }),
                ValueMapping::Adapted(adapter) => {
                    let field = adapter_ident(adapter)?;
                    Ok(quote! { #runtime::SqlValue::from(#option.map(|value| self.#field.encode(value))) })
                }
            }
        }
    }
}

enum Access {
    /// A place expression of the embedded value.
    Direct(TokenStream),
    /// An `Option<&Embedded>` expression.
    Optional(TokenStream),
}

/// Collects the embedded structs enclosing the column `name`, outermost
/// first. Returns whether the column was found.
fn embedding_chain<'a>(members: &'a [EntityMember], name: &str, chain: &mut Vec<&'a EmbeddedSpec>) -> bool {
    for member in members {
        match member {
            EntityMember::Column(column) if column.name == name && column.is_stored() => return true,
            EntityMember::Column(_) => {}
            EntityMember::Embedded(embedded) => {
                chain.push(embedded);
                if embedding_chain(&embedded.members, name, chain) {
                    return true;
                }
                chain.pop();
            }
        }
    }
    false
}
