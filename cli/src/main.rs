use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kabin_compiler::{Compiler, FileSink, MemorySink, sql};
use kabin_core::Diagnostic;
use kabin_processor::{KabinOptions, Processor, load_declarations};
use tracing_subscriber::EnvFilter;

/// Default log filter. Diagnostics are printed by the CLI itself, so their
/// log events are silenced unless `RUST_LOG` or `--verbose` asks for them.
const DEFAULT_FILTER: &str = "warn,kabin_processor::diagnostics=off";

/// CLI-specific output format for resolved specs.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum SpecFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "kabin")]
#[command(about = "Generate SQLite persistence code from annotated declarations", version)]
struct Cli {
    /// Log debug events to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve declarations and write the generated units.
    Generate(GenerateArgs),
    /// Resolve declarations and generate in memory, reporting diagnostics only.
    Check(InputArgs),
    /// Print the resolved spec trees.
    Specs(SpecsArgs),
    /// Print the statements a database schema runs on creation.
    Schema(SchemaArgs),
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Declaration files (.json, .yaml, .yml) and/or directories containing them.
    #[arg(long = "input", short, required = true)]
    inputs: Vec<PathBuf>,
    /// Generator options file (kabin.yml).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Output directory for the generated units.
    #[arg(long, short)]
    output: PathBuf,
    /// Keep generated units unformatted instead of running rustfmt.
    #[arg(long)]
    no_format: bool,
}

#[derive(Debug, Args)]
struct SpecsArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: SpecFormat,
}

#[derive(Debug, Args)]
struct SchemaArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Database to print, by qualified or simple name.
    #[arg(long)]
    database: String,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Check(args) => run_check(args),
        Command::Specs(args) => run_specs(args),
        Command::Schema(args) => run_schema(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_generate(args: GenerateArgs) -> Result<(), String> {
    let declarations = load_declarations(&args.input.inputs).map_err(|e| e.to_string())?;
    let mut options = load_options(args.input.config.as_ref())?;
    if args.no_format {
        options.format = false;
    }

    let sink = FileSink::new(&args.output).map_err(|e| e.to_string())?;
    let compilation = Compiler::new(&options, sink)
        .and_then(|compiler| compiler.compile(&declarations))
        .map_err(|e| e.to_string())?;

    println!(
        "Generated {} unit(s) into '{}' ({} written, {} unchanged, {} removed).",
        compilation.units.len(),
        args.output.display(),
        compilation.sink.written(),
        compilation.sink.unchanged(),
        compilation.sink.removed()
    );
    report_diagnostics(compilation.report.diagnostics.iter())
}

fn run_check(args: InputArgs) -> Result<(), String> {
    let declarations = load_declarations(&args.inputs).map_err(|e| e.to_string())?;
    let mut options = load_options(args.config.as_ref())?;
    options.format = false;

    let compilation = Compiler::new(&options, MemorySink::new())
        .and_then(|compiler| compiler.compile(&declarations))
        .map_err(|e| e.to_string())?;

    println!(
        "Checked {} declaration(s): {} entit{}, {} database(s), {} unit(s).",
        declarations.len(),
        compilation.report.entities,
        if compilation.report.entities == 1 { "y" } else { "ies" },
        compilation.report.databases,
        compilation.units.len()
    );
    report_diagnostics(compilation.report.diagnostics.iter())
}

fn run_specs(args: SpecsArgs) -> Result<(), String> {
    let declarations = load_declarations(&args.input.inputs).map_err(|e| e.to_string())?;
    let schema = Processor::new(&declarations).resolve();

    let rendered = match args.format {
        SpecFormat::Json => serde_json::to_string_pretty(&schema)
            .map_err(|err| format!("Failed to serialize specs: {err}"))?,
        SpecFormat::Yaml => serde_yaml::to_string(&schema)
            .map_err(|err| format!("Failed to serialize specs: {err}"))?,
    };
    println!("{}", rendered.trim_end());
    report_diagnostics(schema.diagnostics.iter())
}

fn run_schema(args: SchemaArgs) -> Result<(), String> {
    let declarations = load_declarations(&args.input.inputs).map_err(|e| e.to_string())?;
    let schema = Processor::new(&declarations).resolve();

    let Some(database) = schema.database(&args.database) else {
        report_diagnostics(schema.diagnostics.iter())?;
        return Err(format!("Database '{}' not found", args.database));
    };
    println!("-- {} (version {})", database.declaration, database.version);
    for statement in sql::schema_statements(database) {
        println!("{statement};");
    }
    Ok(())
}

fn load_options(config: Option<&PathBuf>) -> Result<KabinOptions, String> {
    match config {
        Some(path) => KabinOptions::load(path)
            .map_err(|err| format!("Failed to load options '{}': {err}", path.display())),
        None => Ok(KabinOptions::default()),
    }
}

/// Prints every diagnostic and fails when there is at least one.
fn report_diagnostics<'a>(diagnostics: impl Iterator<Item = &'a Diagnostic>) -> Result<(), String> {
    let diagnostics: Vec<&Diagnostic> = diagnostics.collect();
    if diagnostics.is_empty() {
        return Ok(());
    }
    eprintln!("\nDiagnostics:");
    for diagnostic in &diagnostics {
        eprintln!("  {diagnostic}");
    }
    Err(format!("{} diagnostic(s) reported", diagnostics.len()))
}
