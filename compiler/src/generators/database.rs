//! `<Database>Schema` and `<Database>Impl`.
//!
//! The database implementation owns one instance per adapter, mapper,
//! queries holder and DAO implementation, created once in `new` and shared
//! through `Arc`.

use std::sync::Arc;

use indexmap::IndexSet;
use kabin_core::{
    BuiltinAdapter, ColumnAdapterReference, DaoSpec, DatabaseSpec, EntitySpec, GenerationError,
    ResolutionError, SpecError,
};
use proc_macro2::TokenStream;
use quote::quote;

use super::{adapter_ident, adapter_type};
use crate::naming::{Naming, ident, mapper_field, path, queries_field, rust_type};

/// The adapters a generated mapper is constructed with.
pub(crate) struct MapperWiring<'a> {
    pub(crate) entity: &'a Arc<EntitySpec>,
    pub(crate) adapters: &'a [ColumnAdapterReference],
}

/// The adapters and mappers a generated queries holder is constructed with.
pub(crate) struct QueriesWiring<'a> {
    pub(crate) dao: &'a DaoSpec,
    pub(crate) adapters: &'a [ColumnAdapterReference],
    pub(crate) mappers: &'a [Arc<EntitySpec>],
}

pub(crate) fn schema(database: &DatabaseSpec, naming: &Naming) -> Result<TokenStream, GenerationError> {
    let runtime = naming.runtime();
    let name = ident(&naming.schema(database))?;
    let doc = format!(" Schema of [`{}`].", database.declaration);
    let version = database.version;
    let tables = database
        .entities
        .iter()
        .map(|entity| ident(&naming.table(entity)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(quote! {
        #[doc = #doc]
        #[derive(Debug, Clone, Copy, Default)]
        pub struct #name;

        impl #name {
            pub const VERSION: i64 = #version;
        }

        impl #runtime::SqlSchema for #name {
            fn version(&self) -> i64 {
                Self::VERSION
            }

            fn create(&self, driver: &dyn #runtime::SqlDriver) -> #runtime::Result<()> {
                driver.transaction(&mut || {
                    #(super::#tables::create(driver)?;)*
                    Ok(())
                })
            }

            fn migrate(
                &self,
                _driver: &dyn #runtime::SqlDriver,
                old_version: i64,
                new_version: i64,
            ) -> #runtime::Result<()> {
                Err(#runtime::KabinError::MigrationUnsupported {
                    from: old_version,
                    to: new_version,
                })
            }
        }
    })
}

pub(crate) fn generate(
    database: &DatabaseSpec,
    naming: &Naming,
    mappers: &[MapperWiring<'_>],
    queries: &[QueriesWiring<'_>],
) -> Result<TokenStream, SpecError> {
    let runtime = naming.runtime();
    let name = ident(&naming.database(database))?;
    let schema = ident(&naming.schema(database))?;
    let database_trait = path(&database.declaration)?;
    let doc = format!(" Generated implementation of [`{}`].", database.declaration);

    let mut adapters = IndexSet::new();
    for wiring in mappers {
        adapters.extend(wiring.adapters.iter());
    }
    for wiring in queries {
        adapters.extend(wiring.adapters.iter());
    }

    let mut fields = Vec::new();
    let mut setup = Vec::new();
    let mut names = Vec::new();

    for adapter in &adapters {
        let field = adapter_ident(adapter)?;
        let ty = adapter_type(runtime, adapter)?;
        let instance = adapter_instance(runtime, database, adapter)?;
        fields.push(quote! { #field: #ty });
        setup.push(quote! { let #field: #ty = ::std::sync::Arc::new(#instance); });
        names.push(field);
    }

    for wiring in mappers {
        let mapper = ident(&naming.mapper(wiring.entity))?;
        let field = ident(&mapper_field(wiring.entity))?;
        let arguments = wiring
            .adapters
            .iter()
            .map(adapter_ident)
            .collect::<Result<Vec<_>, _>>()?;
        fields.push(quote! { #field: ::std::sync::Arc<super::#mapper> });
        setup.push(quote! {
            let #field = ::std::sync::Arc::new(super::#mapper::new(
                #(::std::sync::Arc::clone(&#arguments)),*
            ));
        });
        names.push(field);
    }

    for wiring in queries {
        let holder = ident(&naming.queries(wiring.dao))?;
        let field = ident(&queries_field(wiring.dao))?;
        let mut arguments = vec![quote! { ::std::sync::Arc::clone(&driver) }];
        for adapter in wiring.adapters {
            let adapter = adapter_ident(adapter)?;
            arguments.push(quote! { ::std::sync::Arc::clone(&#adapter) });
        }
        for entity in wiring.mappers {
            if !mappers.iter().any(|mapper| mapper.entity.declaration == entity.declaration) {
                return Err(GenerationError::MissingMapper(entity.declaration.clone()).into());
            }
            let mapper = ident(&mapper_field(entity))?;
            arguments.push(quote! { ::std::sync::Arc::clone(&#mapper) });
        }
        fields.push(quote! { #field: ::std::sync::Arc<super::#holder> });
        setup.push(quote! {
            let #field = ::std::sync::Arc::new(super::#holder::new(#(#arguments),*));
        });
        names.push(field);
    }

    let mut getters = Vec::new();
    for getter in &database.dao_getters {
        let function = ident(&getter.function)?;
        let implementation = ident(&naming.dao(&getter.dao))?;
        let holder = ident(&queries_field(&getter.dao))?;
        let dao_trait = path(&getter.dao.declaration)?;
        fields.push(quote! { #function: super::#implementation });
        setup.push(quote! {
            let #function = super::#implementation::new(::std::sync::Arc::clone(&#holder));
        });
        names.push(function.clone());
        getters.push(quote! {
            fn #function(&self) -> &dyn #dao_trait {
                &self.#function
            }
        });
    }

    Ok(quote! {
        #[doc = #doc]
        #[allow(dead_code)]
        pub struct #name {
            driver: ::std::sync::Arc<dyn #runtime::SqlDriver>,
            schema: super::#schema,
            #(#fields,)*
        }

        impl #name {
            pub fn new(driver: ::std::sync::Arc<dyn #runtime::SqlDriver>) -> Self {
                #(#setup)*
                Self {
                    driver,
                    schema: super::#schema,
                    #(#names,)*
                }
            }
        }

        impl #runtime::KabinDatabase for #name {
            type Schema = super::#schema;

            fn driver(&self) -> &::std::sync::Arc<dyn #runtime::SqlDriver> {
                &self.driver
            }

            fn schema(&self) -> &Self::Schema {
                &self.schema
            }
        }

        impl #database_trait for #name {
            #(#getters)*
        }
    })
}

/// A listed converter wins over the built-in adapter for the same pair.
fn adapter_instance(
    runtime: &TokenStream,
    database: &DatabaseSpec,
    adapter: &ColumnAdapterReference,
) -> Result<TokenStream, SpecError> {
    if let Some(converter) = database.converter_for(adapter) {
        let converter = rust_type(&converter.converter)?;
        return Ok(quote! { <#converter as ::core::default::Default>::default() });
    }
    match adapter.builtin() {
        Some(BuiltinAdapter::Integer) => {
            let source = rust_type(&adapter.source_type)?;
            Ok(quote! { #runtime::IntegerAdapter::<#source>::new() })
        }
        Some(BuiltinAdapter::Boolean) => Ok(quote! { #runtime::BooleanAdapter }),
        Some(BuiltinAdapter::Float) => Ok(quote! { #runtime::FloatAdapter }),
        None => Err(ResolutionError::MissingTypeConverter {
            source_type: adapter.source_type.to_rust(),
            affinity: adapter.affinity.to_string(),
        }
        .into()),
    }
}
