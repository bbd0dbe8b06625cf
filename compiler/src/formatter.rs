use proc_macro2::TokenStream;
use tracing::warn;

use crate::error::Result;

/// Renders generated token streams as source text.
///
/// With formatting enabled the text is piped through `rustfmt`; when
/// `rustfmt` is missing or rejects the input, the unformatted tokens are
/// kept and a warning is logged.
pub(crate) struct Formatter {
    shell: Option<xshell::Shell>,
}

impl Formatter {
    pub(crate) fn new(enabled: bool) -> Result<Self> {
        let shell = if enabled {
            Some(xshell::Shell::new()?)
        } else {
            None
        };
        Ok(Self { shell })
    }

    pub(crate) fn format(&self, tokens: TokenStream) -> String {
        let code = tokens.to_string();
        let Some(shell) = &self.shell else {
            return code;
        };
        match xshell::cmd!(shell, "rustfmt --edition 2021")
            .stdin(code.as_str())
            .quiet()
            .read()
        {
            Ok(formatted) => formatted,
            Err(err) => {
                warn!("rustfmt failed, keeping unformatted output: {err}");
                code
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use quote::quote;

    use super::*;

    #[test]
    fn test_disabled_formatter_keeps_tokens() {
        let formatter = Formatter::new(false).unwrap();
        let code = formatter.format(quote! { pub struct UserTable; });
        assert_eq!(code, "pub struct UserTable ;");
    }
}
