//! Error types for code emission.
//!
//! Problems with the declarations never surface here: they are reported as
//! [`Diagnostic`](kabin_core::Diagnostic)s. [`EmitError`] covers the
//! environment the generator writes into.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while writing generated units.
#[derive(Debug, Error)]
pub enum EmitError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The checksum manifest could not be read or written.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The formatter shell could not be set up.
    #[error("formatter error: {0}")]
    ShellError(#[from] xshell::Error),

    /// The generator options are unusable.
    #[error("configuration error: {0}")]
    ConfigError(#[from] kabin_processor::ConfigError),

    /// The output path exists and is not a directory.
    #[error("output path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

/// Convenience alias for results with [`EmitError`].
pub type Result<T> = std::result::Result<T, EmitError>;
