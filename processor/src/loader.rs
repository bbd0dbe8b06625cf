//! Declaration loading.
//!
//! Declarations are read from `.json`, `.yaml` or `.yml` files. A file holds
//! a single [`ClassDeclaration`], an array of them, or a document with a
//! `declarations` array:
//!
//! ```yaml
//! declarations:
//!   - qualified_name: crate::User
//!     annotations:
//!       - name: Entity
//!     properties:
//!       - name: id
//!         type: { name: i64 }
//!         annotations: [{ name: PrimaryKey }]
//! ```
//!
//! Directories are walked recursively and their files loaded in name order,
//! so the resulting [`DeclarationSet`] does not depend on the file system's
//! listing order.
//!
//! # Examples
//!
//! ```
//! use kabin_processor::load_declarations;
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::write(
//!     dir.path().join("user.json"),
//!     r#"{"qualified_name": "crate::User", "annotations": [{"name": "Entity"}]}"#,
//! ).unwrap();
//!
//! let declarations = load_declarations(&[dir.path()]).unwrap();
//! assert!(declarations.get("User").is_some());
//! ```

use std::io::BufReader;
use std::path::{Path, PathBuf};

use kabin_core::{ClassDeclaration, DeclarationSet};
use serde::Deserialize;
use tracing::debug;

use crate::error::{LoadError, Result};

/// Accepted layouts of one declaration file.
#[derive(Deserialize)]
#[serde(untagged)]
enum DeclarationFile {
    Document { declarations: Vec<ClassDeclaration> },
    Many(Vec<ClassDeclaration>),
    One(Box<ClassDeclaration>),
}

impl DeclarationFile {
    fn into_declarations(self) -> Vec<ClassDeclaration> {
        match self {
            Self::Document { declarations } | Self::Many(declarations) => declarations,
            Self::One(declaration) => vec![*declaration],
        }
    }
}

/// Loads every declaration under `paths` into one set.
///
/// Paths may be files or directories. Inside a directory, files with other
/// extensions are skipped; a file named explicitly must have a supported
/// extension.
///
/// # Errors
///
/// Returns [`LoadError::IoError`], [`LoadError::JsonError`] or
/// [`LoadError::YamlError`] for unreadable files,
/// [`LoadError::UnsupportedFile`] for an explicit file with another
/// extension, and [`LoadError::Declarations`] when two declarations share a
/// qualified name.
pub fn load_declarations<P: AsRef<Path>>(paths: &[P]) -> Result<DeclarationSet> {
    let mut set = DeclarationSet::default();
    for path in paths {
        let path = path.as_ref();
        let files = if path.is_dir() {
            declaration_files(path)?
        } else if is_declaration_file(path) {
            vec![path.to_path_buf()]
        } else {
            return Err(LoadError::UnsupportedFile(path.to_path_buf()));
        };
        for file in files {
            let declarations = load_file(&file)?;
            debug!(path = %file.display(), count = declarations.len(), "loaded declarations");
            for declaration in declarations {
                set.insert(declaration)?;
            }
        }
    }
    Ok(set)
}

/// Parses one declaration file.
pub fn load_file(path: &Path) -> Result<Vec<ClassDeclaration>> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let parsed: DeclarationFile = match extension(path) {
        Some("json") => serde_json::from_reader(reader).map_err(|source| LoadError::JsonError {
            path: path.to_path_buf(),
            source,
        })?,
        Some("yaml" | "yml") => {
            serde_yaml::from_reader(reader).map_err(|source| LoadError::YamlError {
                path: path.to_path_buf(),
                source,
            })?
        }
        _ => return Err(LoadError::UnsupportedFile(path.to_path_buf())),
    };
    Ok(parsed.into_declarations())
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|extension| extension.to_str())
}

fn is_declaration_file(path: &Path) -> bool {
    matches!(extension(path), Some("json" | "yaml" | "yml"))
}

fn declaration_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let io_error = |source| LoadError::IoError {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            files.extend(declaration_files(&path)?);
        } else if is_declaration_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kabin_core::DeclarationSetError;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_all_file_layouts() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.json",
            r#"{"qualified_name": "crate::A"}"#,
        );
        write(
            dir.path(),
            "b.json",
            r#"[{"qualified_name": "crate::B"}, {"qualified_name": "crate::C", "kind": "trait"}]"#,
        );
        write(
            dir.path(),
            "d.yaml",
            "declarations:\n  - qualified_name: crate::D\n",
        );
        write(dir.path(), "notes.txt", "ignored");

        let set = load_declarations(&[dir.path()]).unwrap();
        let names: Vec<&str> = set.iter().map(|d| d.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["crate::A", "crate::B", "crate::C", "crate::D"]);
        assert!(set.get("crate::C").unwrap().is_trait());
    }

    #[test]
    fn test_load_orders_files_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "z.yml", "qualified_name: crate::Z\n");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        write(&dir.path().join("nested"), "m.json", r#"{"qualified_name": "crate::M"}"#);
        write(dir.path(), "a.yml", "qualified_name: crate::A\n");

        let set = load_declarations(&[dir.path()]).unwrap();
        let names: Vec<&str> = set.iter().map(|d| d.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["crate::A", "crate::M", "crate::Z"]);
    }

    #[test]
    fn test_duplicate_declarations_fail() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(dir.path(), "one.json", r#"{"qualified_name": "crate::User"}"#);
        let second = write(dir.path(), "two.json", r#"{"qualified_name": "crate::User"}"#);

        let error = load_declarations(&[first, second]).unwrap_err();
        assert!(matches!(
            error,
            LoadError::Declarations(DeclarationSetError::Duplicate(name)) if name == "crate::User"
        ));
    }

    #[test]
    fn test_invalid_json_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "broken.json", "{");
        let error = load_declarations(&[&path]).unwrap_err();
        assert!(matches!(error, LoadError::JsonError { path: p, .. } if p == path));
    }

    #[test]
    fn test_explicit_unsupported_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "schema.toml", "");
        assert!(matches!(
            load_declarations(&[&path]),
            Err(LoadError::UnsupportedFile(_))
        ));
    }
}
