//! Generator options.
//!
//! Loaded from a YAML file (typically `kabin.yml` next to the declaration
//! files). Every field has a default, so an empty file is valid.
//!
//! # Example YAML
//!
//! ```yaml
//! runtime_crate: kabin_runtime
//! output_module: crate::generated
//! suffixes:
//!   table: Table
//!   mapper: Mapper
//!   queries: Queries
//!   dao: Impl
//!   database: Impl
//!   schema: Schema
//! format: true
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name suffixes appended to generated types.
///
/// # Examples
///
/// ```
/// # use kabin_processor::Suffixes;
/// let suffixes = Suffixes::default();
/// assert_eq!(suffixes.table, "Table");
/// assert_eq!(suffixes.dao, "Impl");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Suffixes {
    pub table: String,
    pub mapper: String,
    pub queries: String,
    pub dao: String,
    pub database: String,
    pub schema: String,
}

impl Default for Suffixes {
    fn default() -> Self {
        Self {
            table: "Table".to_string(),
            mapper: "Mapper".to_string(),
            queries: "Queries".to_string(),
            dao: "Impl".to_string(),
            database: "Impl".to_string(),
            schema: "Schema".to_string(),
        }
    }
}

/// Options controlling generated code.
///
/// # Examples
///
/// ```
/// # use kabin_processor::KabinOptions;
/// let options: KabinOptions = serde_yaml::from_str("format: false").unwrap();
/// assert!(!options.format);
/// assert_eq!(options.output_module, "crate::generated");
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KabinOptions {
    /// Crate (or re-export path) generated code imports the runtime from.
    pub runtime_crate: String,
    /// Module path the generated units live in; prefixes their qualified
    /// names.
    pub output_module: String,
    pub suffixes: Suffixes,
    /// Pipe generated units through `rustfmt`.
    pub format: bool,
}

impl Default for KabinOptions {
    fn default() -> Self {
        Self {
            runtime_crate: "kabin_runtime".to_string(),
            output_module: "crate::generated".to_string(),
            suffixes: Suffixes::default(),
            format: true,
        }
    }
}

impl KabinOptions {
    /// Loads options from a YAML file and validates them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IoError`] if the file cannot be read,
    /// [`ConfigError::YamlError`] if parsing fails, or
    /// [`ConfigError::InvalidOption`] if a value is unusable.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let options: Self = serde_yaml::from_reader(reader)?;
        options.validate()?;
        Ok(options)
    }

    /// Saves the options as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IoError`] if the file cannot be written, or
    /// [`ConfigError::YamlError`] if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Checks that every name ends up as valid Rust.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_path("runtime_crate", &self.runtime_crate)?;
        validate_path("output_module", &self.output_module)?;
        let suffixes = [
            ("suffixes.table", &self.suffixes.table),
            ("suffixes.mapper", &self.suffixes.mapper),
            ("suffixes.queries", &self.suffixes.queries),
            ("suffixes.dao", &self.suffixes.dao),
            ("suffixes.database", &self.suffixes.database),
            ("suffixes.schema", &self.suffixes.schema),
        ];
        for (option, suffix) in suffixes {
            if !is_identifier(suffix) {
                return Err(ConfigError::InvalidOption {
                    option,
                    reason: format!("'{suffix}' must be a non-empty identifier"),
                });
            }
        }
        if self.suffixes.mapper == self.suffixes.table || self.suffixes.queries == self.suffixes.dao {
            return Err(ConfigError::InvalidOption {
                option: "suffixes",
                reason: "table/mapper and queries/dao suffixes must differ".to_string(),
            });
        }
        Ok(())
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn validate_path(option: &'static str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.strip_prefix("::").unwrap_or(value);
    if trimmed.split("::").all(is_identifier) {
        Ok(())
    } else {
        Err(ConfigError::InvalidOption {
            option,
            reason: format!("'{value}' is not a Rust path"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let options: KabinOptions = serde_yaml::from_str("{}").unwrap();
        assert_eq!(options, KabinOptions::default());
    }

    #[test]
    fn test_partial_suffixes_keep_other_defaults() {
        let yaml = r#"
suffixes:
  dao: DaoImpl
"#;
        let options: KabinOptions = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(options.suffixes.dao, "DaoImpl");
        assert_eq!(options.suffixes.queries, "Queries");
    }

    #[test]
    fn test_validate_rejects_bad_suffix() {
        let mut options = KabinOptions::default();
        options.suffixes.table = "Ta-ble".to_string();
        assert!(matches!(
            options.validate(),
            Err(ConfigError::InvalidOption { option: "suffixes.table", .. })
        ));

        options.suffixes.table = String::new();
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_paths() {
        let mut options = KabinOptions::default();
        options.output_module = "crate::".to_string();
        assert!(options.validate().is_err());

        options.output_module = "::my_app::db".to_string();
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kabin.yml");

        let mut original = KabinOptions::default();
        original.output_module = "crate::db::generated".to_string();
        original.format = false;
        original.save(&path).unwrap();

        let loaded = KabinOptions::load(&path).unwrap();
        assert_eq!(loaded, original);
    }
}
