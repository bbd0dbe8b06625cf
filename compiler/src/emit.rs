//! Destinations for generated units.
//!
//! Generators hand every [`GeneratedUnit`] to a [`CodeSink`]. A qualified
//! name is emitted at most once per run: sinks ignore a unit whose name they
//! have already seen.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::{EmitError, Result};
use crate::manifest::{MANIFEST_FILE, Manifest, UnitRecord};
use crate::unit::{GENERATED_HEADER, GeneratedUnit};

/// Receives generated units.
pub trait CodeSink {
    /// Accepts one unit. Re-emitting a qualified name is a no-op.
    fn emit(&mut self, unit: GeneratedUnit) -> Result<()>;

    /// Called once after the last unit.
    fn finish(&mut self) -> Result<()>;
}

/// Keeps units in memory, in emission order.
///
/// # Examples
///
/// ```
/// use kabin_compiler::{CodeSink, GeneratedUnit, MemorySink, UnitKind};
///
/// let unit = GeneratedUnit {
///     name: "UserTable".into(),
///     qualified_name: "crate::generated::UserTable".into(),
///     module: "user_table".into(),
///     kind: UnitKind::Table,
///     source: "// @generated by kabin\n".into(),
/// };
///
/// let mut sink = MemorySink::new();
/// sink.emit(unit.clone()).unwrap();
/// sink.emit(unit).unwrap();
/// assert_eq!(sink.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    units: IndexMap<String, GeneratedUnit>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a unit up by qualified or unit name.
    pub fn get(&self, name: &str) -> Option<&GeneratedUnit> {
        self.units
            .get(name)
            .or_else(|| self.units.values().find(|unit| unit.name == name))
    }

    pub fn units(&self) -> impl Iterator<Item = &GeneratedUnit> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn into_units(self) -> Vec<GeneratedUnit> {
        self.units.into_values().collect()
    }
}

impl CodeSink for MemorySink {
    fn emit(&mut self, unit: GeneratedUnit) -> Result<()> {
        if !self.units.contains_key(&unit.qualified_name) {
            self.units.insert(unit.qualified_name.clone(), unit);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes each unit to `<module>.rs` inside an output directory.
///
/// Unchanged units are left untouched, units of a previous run that are no
/// longer produced are deleted, and `finish` writes `mod.rs` plus the
/// checksum manifest.
#[derive(Debug)]
pub struct FileSink {
    directory: PathBuf,
    previous: Manifest,
    current: Manifest,
    modules: Vec<(String, String)>,
    written: usize,
    unchanged: usize,
    removed: usize,
}

impl FileSink {
    /// Opens `directory`, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::NotADirectory`] if the path exists as a file, or
    /// [`EmitError::IoError`] if it cannot be created.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        if directory.exists() && !directory.is_dir() {
            return Err(EmitError::NotADirectory(directory));
        }
        std::fs::create_dir_all(&directory)?;
        let previous = Manifest::load_or_default(&directory);
        Ok(Self {
            directory,
            previous,
            current: Manifest::new(),
            modules: Vec::new(),
            written: 0,
            unchanged: 0,
            removed: 0,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Units whose file was (re)written.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Units whose file already had the generated contents.
    pub fn unchanged(&self) -> usize {
        self.unchanged
    }

    /// Files of a previous run deleted by [`CodeSink::finish`].
    pub fn removed(&self) -> usize {
        self.removed
    }

    fn mod_file(&self) -> String {
        let mut contents = format!("{GENERATED_HEADER}\n\n");
        for (module, _) in &self.modules {
            contents.push_str(&format!("mod {module};\n"));
        }
        contents.push('\n');
        for (module, name) in &self.modules {
            contents.push_str(&format!("pub use {module}::{name};\n"));
        }
        contents
    }
}

impl CodeSink for FileSink {
    fn emit(&mut self, unit: GeneratedUnit) -> Result<()> {
        if self.current.contains(&unit.qualified_name) {
            debug!(unit = %unit.qualified_name, "unit already emitted");
            return Ok(());
        }

        let file = unit.file_name();
        let path = self.directory.join(&file);
        let checksum = Manifest::checksum(&unit.source);
        let up_to_date = self
            .previous
            .get(&unit.qualified_name)
            .is_some_and(|record| record.file == file && record.checksum == checksum)
            && path.is_file();
        if up_to_date {
            self.unchanged += 1;
        } else {
            write_file(&path, &unit.source)?;
            self.written += 1;
            debug!(path = %path.display(), kind = %unit.kind, "wrote unit");
        }

        self.modules.push((unit.module.clone(), unit.name.clone()));
        self.current.update_entry(
            unit.qualified_name,
            UnitRecord {
                file,
                kind: unit.kind.to_string(),
                checksum,
            },
        );
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for record in self.previous.stale(&self.current) {
            let path = self.directory.join(&record.file);
            if path.is_file() {
                std::fs::remove_file(&path)?;
                self.removed += 1;
                debug!(path = %path.display(), "removed stale unit");
            }
        }

        let mod_path = self.directory.join("mod.rs");
        let contents = self.mod_file();
        if std::fs::read_to_string(&mod_path).ok().as_deref() != Some(contents.as_str()) {
            write_file(&mod_path, &contents)?;
        }
        self.current.save(self.directory.join(MANIFEST_FILE))?;
        self.previous = self.current.clone();

        info!(
            directory = %self.directory.display(),
            written = self.written,
            unchanged = self.unchanged,
            removed = self.removed,
            "emitted units"
        );
        Ok(())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(contents.as_bytes())?;
    writer.flush()?;
    Ok(())
}
