mod common;

use std::fs;
use std::process::Command;

use recswitch::codegen::attribute::AttributeInfo;
use recswitch::{compile_file, compile_to_dir, Config};
use tempfile::TempDir;

fn recswitch() -> Command {
    Command::new(env!("CARGO_BIN_EXE_recswitch"))
}

#[test]
fn compile_to_dir_writes_package_directories() {
    common::init_logger();
    let out_dir = TempDir::new().unwrap();
    let src = "package geo.shapes; record Point(int x, int y) { record Unit() {} }";
    let out = compile_to_dir(src, out_dir.path(), &Config::default()).unwrap();
    assert!(!out.has_errors());
    for name in ["geo/shapes/Point.class", "geo/shapes/Point$Unit.class"] {
        let bytes = fs::read(out_dir.path().join(name)).unwrap();
        assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE], "{name}");
    }
}

#[test]
fn compile_file_records_the_source_file_name() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("Shape.java");
    fs::write(&input, "record Shape(double area) {}").unwrap();
    let config = Config { debug: true, ..Config::default() };
    let out = compile_file(&input, dir.path(), &config).unwrap();
    let shape = &out.class("Shape").unwrap().class_file;
    match shape.attribute("SourceFile") {
        Some(AttributeInfo::SourceFile(index)) => {
            assert_eq!(shape.constant_pool.utf8(*index).unwrap(), "Shape.java");
        }
        other => panic!("no SourceFile: {other:?}"),
    }
    assert!(dir.path().join("Shape.class").exists());
}

#[test]
fn compile_file_leaves_no_classes_on_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("Bad.java");
    fs::write(&input, "record Bad(int hashCode) {}").unwrap();
    let out = compile_file(&input, dir.path(), &Config::default()).unwrap();
    assert!(out.has_errors());
    assert!(!dir.path().join("Bad.class").exists());
}

#[test]
fn cli_compiles_a_directory() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::create_dir_all(src.path().join("a")).unwrap();
    fs::write(src.path().join("a/One.java"), "record One(int v) {}").unwrap();
    fs::write(src.path().join("Two.java"), "class Two { int m(int i) { return switch (i) { default -> i; }; } }").unwrap();
    fs::write(src.path().join("notes.txt"), "not java").unwrap();

    let status = recswitch()
        .arg("compile")
        .arg(src.path())
        .arg("-o")
        .arg(out.path())
        .status()
        .unwrap();
    assert!(status.success());
    assert!(out.path().join("One.class").exists());
    assert!(out.path().join("Two.class").exists());
}

#[test]
fn cli_check_prints_diagnostics_and_fails() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("X.java");
    fs::write(&input, "record X(int myInt, int finalize){}").unwrap();

    let output = recswitch().arg("check").arg(&input).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: Illegal component name finalize in record X"), "{stderr}");
    assert!(stderr.contains("X.java:1:"), "{stderr}");
}

#[test]
fn cli_rejects_unknown_targets() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("R.java");
    fs::write(&input, "record R() {}").unwrap();
    let status = recswitch().arg("compile").arg(&input).arg("--target").arg("nine").status().unwrap();
    assert!(!status.success());
}
