//! Generates the library schema's units into `OUT_DIR` and writes
//! `kabin_units.rs`, which `src/lib.rs` includes as the `generated` module.

use std::error::Error;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use kabin_compiler::{Compiler, MemorySink};
use kabin_processor::{KabinOptions, load_declarations};

fn main() -> Result<(), Box<dyn Error>> {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    let declarations_file = manifest_dir
        .join("..")
        .join("compiler")
        .join("tests")
        .join("fixtures")
        .join("library.yaml");
    println!("cargo:rerun-if-changed={}", declarations_file.display());

    let declarations = load_declarations(&[&declarations_file])?;
    let options = KabinOptions {
        format: false,
        ..KabinOptions::default()
    };
    let compilation = Compiler::new(&options, MemorySink::new())?.compile(&declarations)?;
    if !compilation.is_success() {
        let messages: Vec<String> = compilation
            .report
            .diagnostics
            .iter()
            .map(ToString::to_string)
            .collect();
        return Err(format!("library schema failed to generate:\n{}", messages.join("\n")).into());
    }

    let units_dir = out_dir.join("kabin");
    fs::create_dir_all(&units_dir)?;
    let mut modules = String::new();
    for unit in compilation.sink.units() {
        let file_name = unit.file_name();
        fs::write(units_dir.join(&file_name), &unit.source)?;
        writeln!(
            modules,
            "pub mod {} {{ include!(concat!(env!(\"OUT_DIR\"), \"/kabin/{file_name}\")); }}",
            unit.module
        )?;
        writeln!(modules, "pub use {}::{};", unit.module, unit.name)?;
    }
    fs::write(out_dir.join("kabin_units.rs"), modules)?;
    Ok(())
}
