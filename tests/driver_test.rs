//! In-place file handling of the driver and the `decodegen` binary.

use decodegen::driver::{format_file, generate_file, Pipeline};
use decodegen::{CodegenConfig, DecodegenError};
use std::fs;
use std::process::Command;
use tempfile::tempdir;

const MESSY_TABLE: &str = "\
je(Jump_Equal)|01110100|ip_inc8
   jne(Jump_NotEqual) | 01110101 |   ip_inc8
";

const CANONICAL_TABLE: &str = "\
je(Jump_Equal)     | 01110100 | ip_inc8
jne(Jump_NotEqual) | 01110101 | ip_inc8
";

const TARGET: &str = "\
pub enum InstrKind {
}

pub fn decode_at(input: &[u8], start: usize) -> Result<Instruction, DecodeError> {
    let mut offset = start;
    // @codegen
    // @end
}
";

#[test]
fn test_format_rewrites_in_place() {
    let dir = tempdir().unwrap();
    let table = dir.path().join("jumps.table");
    fs::write(&table, MESSY_TABLE).unwrap();

    assert!(format_file(&table, true).unwrap());
    assert_eq!(fs::read_to_string(&table).unwrap(), MESSY_TABLE);

    assert!(format_file(&table, false).unwrap());
    assert_eq!(fs::read_to_string(&table).unwrap(), CANONICAL_TABLE);
    assert!(!format_file(&table, false).unwrap());
}

#[test]
fn test_pipeline_formats_and_splices() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    let table = dir.path().join("jumps.table");
    let target = dir.path().join("decode.rs");
    fs::write(&table, MESSY_TABLE).unwrap();
    fs::write(&target, TARGET).unwrap();

    let report = Pipeline::new(&table, &target).run().unwrap();
    assert!(report.table_changed);
    assert!(report.target_changed);
    assert_eq!(report.stats.leaves, 2);
    assert_eq!(report.stats.branches, 1);

    assert_eq!(fs::read_to_string(&table).unwrap(), CANONICAL_TABLE);
    let spliced = fs::read_to_string(&target).unwrap();
    assert!(spliced.starts_with("pub enum InstrKind {\n    je_Jump_Equal,\n    jne_Jump_NotEqual,\n}\n"));
    assert!(spliced.contains("    // @codegen\n    let first8 = read_u8(input, start)?;\n"));

    let again = Pipeline::new(&table, &target).run().unwrap();
    assert!(!again.table_changed);
    assert!(!again.target_changed);
    assert_eq!(fs::read_to_string(&target).unwrap(), spliced);
}

#[test]
fn test_failed_pipeline_leaves_files_untouched() {
    let dir = tempdir().unwrap();
    let table = dir.path().join("jumps.table");
    let target = dir.path().join("decode.rs");
    fs::write(&table, MESSY_TABLE).unwrap();
    let broken_target = TARGET.replace("// @end", "");
    fs::write(&target, &broken_target).unwrap();

    let err = Pipeline::new(&table, &target).run().unwrap_err();
    assert!(matches!(err, DecodegenError::AnchorNotFound { ref anchor } if anchor == "// @end"));
    assert_eq!(fs::read_to_string(&table).unwrap(), MESSY_TABLE);
    assert_eq!(fs::read_to_string(&target).unwrap(), broken_target);
}

#[test]
fn test_then_command_status_is_reported() {
    let dir = tempdir().unwrap();
    let table = dir.path().join("jumps.table");
    let target = dir.path().join("decode.rs");
    fs::write(&table, CANONICAL_TABLE).unwrap();
    fs::write(&target, TARGET).unwrap();

    let mut pipeline = Pipeline::new(&table, &target);
    pipeline.then = Some("exit 3".to_string());
    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, DecodegenError::Command { ref command, .. } if command == "exit 3"));
    // The command runs after the writes.
    assert_ne!(fs::read_to_string(&target).unwrap(), TARGET);

    pipeline.then = Some("true".to_string());
    assert!(pipeline.run().is_ok());
}

#[test]
fn test_missing_table_names_the_path() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.table");
    let err = generate_file(&missing, None, &CodegenConfig::default()).unwrap_err();
    match err {
        DecodegenError::Io { path, .. } => assert!(path.ends_with("missing.table")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_cli_gen_and_check() {
    let dir = tempdir().unwrap();
    let table = dir.path().join("jumps.table");
    let output = dir.path().join("decoder.rs");
    fs::write(&table, CANONICAL_TABLE).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_decodegen"))
        .arg("gen")
        .arg("--runtime-path")
        .arg("my_runtime")
        .arg("-o")
        .arg(&output)
        .env("DECODEGEN_TABLE", &table)
        .status()
        .unwrap();
    assert!(status.success());
    let module = fs::read_to_string(&output).unwrap();
    assert!(module.starts_with("// GENERATED CODE - DO NOT EDIT\n"));
    assert!(module.contains("use my_runtime::{"));

    let out = Command::new(env!("CARGO_BIN_EXE_decodegen"))
        .args(["check", "--table"])
        .arg(&table)
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("Leaves: 2"));
}

#[test]
fn test_cli_reports_errors() {
    let dir = tempdir().unwrap();
    let table = dir.path().join("bad.table");
    fs::write(&table, "mov(A) | 100010 d w | mod reg\n").unwrap();

    let out = Command::new(env!("CARGO_BIN_EXE_decodegen"))
        .args(["fmt", "--table"])
        .arg(&table)
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("mov(A): byte 1 has 5 bits, expected 8"), "{stderr}");
    assert_eq!(fs::read_to_string(&table).unwrap(), "mov(A) | 100010 d w | mod reg\n");

    fs::write(&table, MESSY_TABLE).unwrap();
    let out = Command::new(env!("CARGO_BIN_EXE_decodegen"))
        .args(["fmt", "--check", "--table"])
        .arg(&table)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
}
