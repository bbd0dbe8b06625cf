use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn kabin(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kabin"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run kabin")
}

fn library() -> String {
    fixture("library.yaml").to_str().unwrap().to_string()
}

/// A declaration file whose only entity has no primary key.
fn write_broken(dir: &Path) -> PathBuf {
    let yaml = r#"declarations:
  - qualified_name: crate::Orphan
    annotations: [{ name: Entity }]
    properties:
      - name: name
        type: { name: String }
"#;
    let path = dir.join("broken.yaml");
    fs::write(&path, yaml).expect("failed to write declarations");
    path
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

#[test]
fn generate_writes_units_and_skips_them_on_rerun() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("generated");
    let output_arg = output.to_str().unwrap();
    let input = library();

    let out = kabin(&["generate", "--input", &input, "--output", output_arg, "--no-format"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "generate should succeed. stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout.contains("Generated 10 unit(s)"), "stdout: {stdout}");
    assert!(stdout.contains("10 written"), "stdout: {stdout}");

    let module = fs::read_to_string(output.join("mod.rs")).unwrap();
    assert!(module.contains("pub use app_database_impl::AppDatabaseImpl;"));
    let table = fs::read_to_string(output.join("user_table.rs")).unwrap();
    assert!(table.starts_with("// @generated by kabin"));

    let out = kabin(&["generate", "--input", &input, "--output", output_arg, "--no-format"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success());
    assert!(stdout.contains("0 written, 10 unchanged"), "stdout: {stdout}");
}

#[test]
fn generate_honours_config_suffixes() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("kabin.yml");
    fs::write(&config, "format: false\nsuffixes:\n  dao: Generated\n").unwrap();
    let output = dir.path().join("out");

    let out = kabin(&[
        "generate",
        "--input",
        &library(),
        "--output",
        output.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(output.join("user_dao_generated.rs").is_file());
    assert!(!output.join("user_dao_impl.rs").exists());
}

#[test]
fn generate_fails_on_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("kabin.yml");
    fs::write(&config, "suffixes:\n  table: \"not valid\"\n").unwrap();

    let out = kabin(&[
        "generate",
        "--input",
        &library(),
        "--output",
        dir.path().join("out").to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("suffixes.table"), "stderr: {stderr}");
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_reports_success() {
    let out = kabin(&["check", "--input", &library()]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout.contains("2 entities, 1 database(s), 10 unit(s)"), "stdout: {stdout}");
}

#[test]
fn check_fails_with_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let broken = write_broken(dir.path());

    let out = kabin(&["check", "--input", broken.to_str().unwrap()]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("crate::Orphan"), "stderr: {stderr}");
    assert!(stderr.contains("primary key"), "stderr: {stderr}");
    assert!(stderr.contains("1 diagnostic(s) reported"), "stderr: {stderr}");
}

#[test]
fn check_rejects_unknown_file_types() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("declarations.toml");
    fs::write(&path, "").unwrap();

    let out = kabin(&["check", "--input", path.to_str().unwrap()]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("unsupported declaration file"));
}

// ---------------------------------------------------------------------------
// specs / schema
// ---------------------------------------------------------------------------

#[test]
fn specs_prints_json() {
    let out = kabin(&["specs", "--input", &library()]);
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).expect("specs output is JSON");
    assert_eq!(value["entities"].as_array().unwrap().len(), 2);
    assert_eq!(value["databases"][0]["version"], 1);
}

#[test]
fn specs_prints_yaml() {
    let out = kabin(&["specs", "--input", &library(), "--format", "yaml"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("table_name: notes"), "stdout: {stdout}");
}

#[test]
fn schema_prints_executable_ddl() {
    let out = kabin(&["schema", "--input", &library(), "--database", "AppDatabase"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("-- crate::db::AppDatabase (version 1)"));

    let connection = rusqlite::Connection::open_in_memory().unwrap();
    connection.execute_batch(&stdout).expect("printed schema should execute");
    let tables: i64 = connection
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('User', 'notes')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 2);
}

#[test]
fn schema_fails_for_unknown_database() {
    let out = kabin(&["schema", "--input", &library(), "--database", "Missing"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Database 'Missing' not found"));
}
