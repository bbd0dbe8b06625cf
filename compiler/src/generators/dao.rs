//! `<Dao>Impl`: implements the user's DAO trait on top of the generated
//! queries, adapting each result to the declared return type.

use kabin_core::{DaoSpec, GenerationError, QuerySpec, ReturnWrapping};
use proc_macro2::TokenStream;
use quote::quote;

use crate::naming::{Naming, ident, path, rust_type};

type Result<T> = std::result::Result<T, GenerationError>;

pub(crate) fn generate(dao: &DaoSpec, naming: &Naming) -> Result<TokenStream> {
    let runtime = naming.runtime();
    let name = ident(&naming.dao(dao))?;
    let queries = ident(&naming.queries(dao))?;
    let dao_trait = path(&dao.declaration)?;
    let doc = format!(" Generated implementation of [`{}`].", dao.declaration);

    let functions = dao
        .queries
        .iter()
        .map(|query| function(runtime, dao, query))
        .collect::<Result<Vec<_>>>()?;

    Ok(quote! {
        #[doc = #doc]
        pub struct #name {
            queries: ::std::sync::Arc<super::#queries>,
        }

        impl #name {
            pub fn new(queries: ::std::sync::Arc<super::#queries>) -> Self {
                Self { queries }
            }
        }

        impl #dao_trait for #name {
            #(#functions)*
        }
    })
}

fn function(runtime: &TokenStream, dao: &DaoSpec, query: &QuerySpec) -> Result<TokenStream> {
    let function = ident(&query.function)?;
    let mut parameters = Vec::new();
    let mut arguments = Vec::new();
    for parameter in &query.parameters {
        let name = ident(&parameter.name)?;
        let ty = rust_type(&parameter.ty)?;
        parameters.push(quote! { #name: #ty });
        arguments.push(name);
    }

    let output = if query.returns.declared.is_unit() {
        None
    } else {
        let declared = rust_type(&query.returns.declared)?;
        Some(quote! { -> #declared })
    };

    let call = quote! { self.queries.#function(#(#arguments),*) };
    let body = match &query.returns.wrapping {
        ReturnWrapping::Plain => {
            let label = format!("{}::{}", dao.simple_name(), query.function);
            quote! { #runtime::unwrap_or_panic(#call, #label) }
        }
        ReturnWrapping::Result => call,
        ReturnWrapping::ResultWith(_) => quote! { #call.map_err(::core::convert::Into::into) },
    };

    Ok(quote! {
        fn #function(&self, #(#parameters),*) #output {
            #body
        }
    })
}
