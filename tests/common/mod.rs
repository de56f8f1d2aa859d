// Common test utilities
#![allow(dead_code)]

pub mod jvm;

use recswitch::{compile, CompileOutput, Config};

pub use jvm::{Jvm, Thrown, Value};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Compiles `src`, panicking on any error diagnostic.
pub fn compile_ok(src: &str) -> CompileOutput {
    init_logger();
    let out = compile(src, &Config::default()).expect("compilation failed");
    let errors: Vec<String> = out.errors().map(|d| d.to_string()).collect();
    assert!(errors.is_empty(), "unexpected errors: {errors:#?}");
    out
}

/// Every diagnostic of `src` as `message` text, errors and warnings alike.
pub fn messages(src: &str) -> Vec<String> {
    init_logger();
    recswitch::check(src).iter().map(|d| d.message()).collect()
}

pub fn error_messages(src: &str) -> Vec<String> {
    init_logger();
    recswitch::check(src).iter().filter(|d| d.is_error()).map(|d| d.message()).collect()
}

pub fn ok(src: &str) {
    let errors = error_messages(src);
    assert!(errors.is_empty(), "unexpected errors: {errors:#?}");
}

pub fn err_contains(src: &str, needle: &str) {
    let all = messages(src);
    assert!(all.iter().any(|m| m.contains(needle)), "no {needle:?} in {all:#?}");
}

/// Compiles `src` and loads every generated class.
pub fn load(src: &str) -> Jvm {
    Jvm::new(&compile_ok(src).classes)
}

/// Runs `static int name()` of `class`.
pub fn run_int(src: &str, class: &str, name: &str) -> i32 {
    let mut jvm = load(src);
    match jvm.call_static(class, name, "()I", Vec::new()) {
        Ok(v) => v.int(),
        Err(t) => panic!("{}.{} threw {}", class, name, t.class()),
    }
}

/// Runs `static String name()` of `class`.
pub fn run_string(src: &str, class: &str, name: &str) -> Option<String> {
    let mut jvm = load(src);
    match jvm.call_static(class, name, "()Ljava/lang/String;", Vec::new()) {
        Ok(v) => jvm.as_string(&v),
        Err(t) => panic!("{}.{} threw {}", class, name, t.class()),
    }
}
