//! Error types for loading declarations and options.
//!
//! Resolution problems are not errors in this sense: they are reported as
//! [`Diagnostic`](kabin_core::Diagnostic)s and never abort a run. The types
//! here cover the surrounding I/O.

use std::path::PathBuf;

use kabin_core::DeclarationSetError;
use thiserror::Error;

/// Errors that can occur while loading declaration files.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File I/O failure.
    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing failure.
    #[error("JSON error in {path}: {source}")]
    JsonError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// YAML parsing failure.
    #[error("YAML error in {path}: {source}")]
    YamlError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The file extension is not `.json`, `.yaml` or `.yml`.
    #[error("unsupported declaration file: {0}")]
    UnsupportedFile(PathBuf),

    /// Two files declare the same qualified name.
    #[error(transparent)]
    Declarations(#[from] DeclarationSetError),
}

/// Errors that can occur while loading or saving [`KabinOptions`](crate::KabinOptions).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// An option holds a value that cannot be used in generated code.
    #[error("invalid option `{option}`: {reason}")]
    InvalidOption { option: &'static str, reason: String },
}

/// Convenience alias for results with [`LoadError`].
pub type Result<T> = std::result::Result<T, LoadError>;
