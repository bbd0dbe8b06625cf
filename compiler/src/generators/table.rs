//! `<Entity>Table`: DDL constants plus `create` / `drop_table`.

use kabin_core::{EntitySpec, GenerationError};
use proc_macro2::TokenStream;
use quote::quote;

use crate::naming::{Naming, ident};
use crate::sql;

pub(crate) fn generate(entity: &EntitySpec, naming: &Naming) -> Result<TokenStream, GenerationError> {
    let runtime = naming.runtime();
    let name = ident(&naming.table(entity))?;
    let doc = format!(" Table of [`{}`].", entity.declaration);
    let table_name = &entity.table_name;
    let create = sql::create_table(entity);
    let indices = sql::create_indices(entity);
    let drop = sql::drop_table(entity);

    Ok(quote! {
        #[doc = #doc]
        pub struct #name;

        impl #name {
            pub const TABLE_NAME: &'static str = #table_name;
            pub const CREATE_STATEMENT: &'static str = #create;
            pub const INDEX_STATEMENTS: &'static [&'static str] = &[#(#indices),*];
            pub const DROP_STATEMENT: &'static str = #drop;

            /// Creates the table and its indices unless they exist.
            pub fn create(driver: &dyn #runtime::SqlDriver) -> #runtime::Result<()> {
                driver.execute(Self::CREATE_STATEMENT, &[])?;
                for statement in Self::INDEX_STATEMENTS {
                    driver.execute(statement, &[])?;
                }
                Ok(())
            }

            pub fn drop_table(driver: &dyn #runtime::SqlDriver) -> #runtime::Result<()> {
                driver.execute(Self::DROP_STATEMENT, &[])?;
                Ok(())
            }
        }
    })
}
