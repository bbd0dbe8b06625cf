//! Names and paths of generated items.

use heck::ToSnakeCase;
use kabin_core::{
    ColumnAdapterReference, DaoSpec, DatabaseSpec, EntitySpec, GenerationError, TypeRef,
};
use kabin_processor::KabinOptions;
use proc_macro2::{Ident, Span, TokenStream};
use quote::quote;

/// Naming rules for one run, derived from [`KabinOptions`].
#[derive(Debug, Clone)]
pub(crate) struct Naming {
    runtime: TokenStream,
    options: KabinOptions,
}

impl Naming {
    pub(crate) fn new(options: &KabinOptions) -> Result<Self, GenerationError> {
        let runtime = options
            .runtime_crate
            .strip_prefix("::")
            .unwrap_or(&options.runtime_crate);
        let runtime = path(runtime)?;
        Ok(Self {
            runtime: quote! { :: #runtime },
            options: options.clone(),
        })
    }

    /// Absolute path of the runtime crate, `::kabin_runtime` by default.
    pub(crate) fn runtime(&self) -> &TokenStream {
        &self.runtime
    }

    pub(crate) fn table(&self, entity: &EntitySpec) -> String {
        format!("{}{}", entity.simple_name(), self.options.suffixes.table)
    }

    pub(crate) fn mapper(&self, entity: &EntitySpec) -> String {
        format!("{}{}", entity.simple_name(), self.options.suffixes.mapper)
    }

    pub(crate) fn queries(&self, dao: &DaoSpec) -> String {
        format!("{}{}", dao.simple_name(), self.options.suffixes.queries)
    }

    pub(crate) fn dao(&self, dao: &DaoSpec) -> String {
        format!("{}{}", dao.simple_name(), self.options.suffixes.dao)
    }

    pub(crate) fn database(&self, database: &DatabaseSpec) -> String {
        format!("{}{}", database.simple_name(), self.options.suffixes.database)
    }

    pub(crate) fn schema(&self, database: &DatabaseSpec) -> String {
        format!("{}{}", database.simple_name(), self.options.suffixes.schema)
    }

    /// Qualified name of a unit inside the output module.
    pub(crate) fn qualified(&self, name: &str) -> String {
        format!("{}::{name}", self.options.output_module)
    }
}

/// An identifier token for `name`, raw when `name` is a keyword.
///
/// # Errors
///
/// [`GenerationError::InvalidIdentifier`] when `name` cannot be spelled as
/// an identifier at all (`self`, `crate`, `_`, `1st`, ...).
pub(crate) fn ident(name: &str) -> Result<Ident, GenerationError> {
    let invalid = || GenerationError::InvalidIdentifier(name.to_string());
    let mut chars = name.chars();
    let well_formed = match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !well_formed || name == "_" {
        return Err(invalid());
    }
    if syn::parse_str::<syn::Ident>(name).is_ok() {
        return Ok(Ident::new(name, Span::call_site()));
    }
    match name {
        "self" | "Self" | "super" | "crate" => Err(invalid()),
        keyword => Ok(Ident::new_raw(keyword, Span::call_site())),
    }
}

/// Parses a type as written in a declaration.
pub(crate) fn rust_type(ty: &TypeRef) -> Result<TokenStream, GenerationError> {
    let rendered = ty.to_rust();
    let parsed: syn::Type =
        syn::parse_str(&rendered).map_err(|_| GenerationError::InvalidTypePath(rendered))?;
    Ok(quote! { #parsed })
}

/// Parses a path such as a declaration's qualified name.
pub(crate) fn path(path: &str) -> Result<TokenStream, GenerationError> {
    let parsed: syn::Path =
        syn::parse_str(path).map_err(|_| GenerationError::InvalidTypePath(path.to_string()))?;
    Ok(quote! { #parsed })
}

/// File a unit is written to: `UserTable` -> `user_table.rs`.
pub(crate) fn module_name(unit: &str) -> String {
    unit.to_snake_case()
}

/// Field holding the adapter instance: `bool_i64_adapter`.
pub(crate) fn adapter_field(adapter: &ColumnAdapterReference) -> String {
    format!(
        "{}_{}_adapter",
        adapter.source_type.to_rust().to_snake_case(),
        adapter.storage_type().to_rust().to_snake_case()
    )
}

pub(crate) fn mapper_field(entity: &EntitySpec) -> String {
    format!("{}_mapper", entity.simple_name().to_snake_case())
}

pub(crate) fn queries_field(dao: &DaoSpec) -> String {
    format!("{}_queries", dao.simple_name().to_snake_case())
}
