//! Checksum manifest of the units written to an output directory.
//!
//! [`FileSink`](crate::FileSink) keeps `kabin-manifest.json` next to the
//! generated files. A unit is rewritten only when its SHA-256 checksum
//! differs from the recorded one (or its file went missing), and files
//! recorded by a previous run but not produced by the current one are
//! removed.
//!
//! # Examples
//!
//! ```no_run
//! use kabin_compiler::{Manifest, UnitRecord};
//!
//! let mut manifest = Manifest::new();
//! manifest.update_entry("crate::generated::UserTable".into(), UnitRecord {
//!     file: "user_table.rs".into(),
//!     kind: "table".into(),
//!     checksum: Manifest::checksum("// @generated by kabin"),
//! });
//!
//! manifest.save("kabin-manifest.json").unwrap();
//! let loaded = Manifest::load("kabin-manifest.json").unwrap();
//! assert!(loaded.contains("crate::generated::UserTable"));
//! ```

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// File name of the manifest inside the output directory.
pub const MANIFEST_FILE: &str = "kabin-manifest.json";

/// One written unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    /// File name relative to the output directory.
    pub file: String,
    /// Unit kind (`table`, `mapper`, ...).
    pub kind: String,
    /// SHA-256 hex digest of the file contents.
    pub checksum: String,
}

/// Every unit written by the last run, keyed by qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Version of the generator that wrote the manifest.
    pub tool_version: String,
    pub units: BTreeMap<String, UnitRecord>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            units: BTreeMap::new(),
        }
    }

    /// Loads a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::EmitError::IoError) if the file cannot be
    /// read, or [`JsonError`](crate::EmitError::JsonError) if the content is
    /// not valid manifest JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let manifest = serde_json::from_reader(reader)?;
        Ok(manifest)
    }

    /// Loads the manifest of `directory`, or an empty one when it has none
    /// or it cannot be parsed.
    pub fn load_or_default(directory: impl AsRef<Path>) -> Self {
        let path = directory.as_ref().join(MANIFEST_FILE);
        match Self::load(&path) {
            Ok(manifest) => manifest,
            Err(err) => {
                if path.exists() {
                    tracing::warn!(path = %path.display(), "ignoring unreadable manifest: {err}");
                }
                Self::new()
            }
        }
    }

    /// Saves the manifest as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn update_entry(&mut self, unit: String, record: UnitRecord) {
        self.units.insert(unit, record);
    }

    /// SHA-256 hex digest of generated source.
    pub fn checksum(source: &str) -> String {
        format!("{:x}", Sha256::digest(source.as_bytes()))
    }

    pub fn get(&self, unit: &str) -> Option<&UnitRecord> {
        self.units.get(unit)
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.units.contains_key(unit)
    }

    /// Records in `self` whose file `current` no longer produces.
    pub fn stale<'a>(&'a self, current: &Manifest) -> Vec<&'a UnitRecord> {
        self.units
            .iter()
            .filter(|(name, record)| {
                current
                    .get(name)
                    .is_none_or(|produced| produced.file != record.file)
            })
            .map(|(_, record)| record)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(file: &str, checksum: &str) -> UnitRecord {
        UnitRecord {
            file: file.to_string(),
            kind: "table".to_string(),
            checksum: checksum.to_string(),
        }
    }

    #[test]
    fn test_checksum_calculation() {
        // SHA-256 of "hello world"
        assert_eq!(
            Manifest::checksum("hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);

        let mut manifest = Manifest::new();
        manifest.update_entry("crate::generated::UserTable".into(), record("user_table.rs", "abc"));
        manifest.save(&path).unwrap();

        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.get("crate::generated::UserTable").unwrap().checksum, "abc");
    }

    #[test]
    fn test_stale_units() {
        let mut previous = Manifest::new();
        previous.update_entry("crate::generated::UserTable".into(), record("user_table.rs", "a"));
        previous.update_entry("crate::generated::NoteTable".into(), record("note_table.rs", "b"));

        let mut current = Manifest::new();
        current.update_entry("crate::generated::UserTable".into(), record("user_table.rs", "c"));

        let stale: Vec<&str> = previous.stale(&current).iter().map(|r| r.file.as_str()).collect();
        assert_eq!(stale, vec!["note_table.rs"]);
    }

    #[test]
    fn test_missing_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::load_or_default(dir.path());
        assert!(manifest.units.is_empty());

        std::fs::write(dir.path().join(MANIFEST_FILE), "not json").unwrap();
        assert!(Manifest::load_or_default(dir.path()).units.is_empty());
    }
}
