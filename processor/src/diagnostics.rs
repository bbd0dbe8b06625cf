//! Diagnostic collection.

use kabin_core::{Diagnostic, SpecError};
use tracing::error;

/// Ordered, duplicate-free list of diagnostics for one run.
///
/// Every diagnostic is logged at `error` level the first time it is added;
/// a diagnostic reached again through a second path (two databases sharing
/// a broken DAO) is neither stored nor logged twice.
///
/// # Examples
///
/// ```
/// use kabin_core::{Diagnostic, ResolutionError};
/// use kabin_processor::Diagnostics;
///
/// let mut diagnostics = Diagnostics::new();
/// let missing = ResolutionError::NotAnEntity("crate::Note".to_string());
/// diagnostics.report("crate::AppDatabase", missing.clone());
/// diagnostics.report("crate::AppDatabase", missing);
/// assert_eq!(diagnostics.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if self.items.contains(&diagnostic) {
            return;
        }
        error!(
            declaration = %diagnostic.declaration,
            kind = diagnostic.error.family(),
            "{}",
            diagnostic.error
        );
        self.items.push(diagnostic);
    }

    pub fn report(&mut self, declaration: &str, error: impl Into<SpecError>) {
        self.push(Diagnostic::new(declaration, error));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, diagnostics: I) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
