//! recswitch: records and switch expressions for a Java-family compiler.
//!
//! ## Architecture
//!
//! - **parser**: lexing and recursive-descent parsing into the arena AST
//! - **review**: declaration checks that run before lowering (record
//!   headers, components, canonical constructors, annotations)
//! - **wash**: lowering of records, class table, attribution of
//!   expressions and switches, flow analysis
//! - **codegen**: class files from the analyzed unit
//! - **verify**: class-file level checks on every generated class
//!
//! ## Compilation Flow
//!
//! ```text
//! source → parse → review → wash (lower → attr → flow) → codegen → verify
//! ```
//!
//! Problems in the program are collected as [`Diagnostic`]s; an
//! [`Error`] means the unit could not be processed at all.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod consts;
pub mod diagnostics;
pub mod error;
pub mod parser;
pub mod review;
pub mod verify;
pub mod wash;

use std::path::Path;

pub use codegen::GeneratedClass;
pub use config::Config;
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Severity};
pub use error::{Error, Result};

/// Diagnostics and classes of one compilation unit.
#[derive(Debug, Default)]
pub struct CompileOutput {
    /// Ordered by position.
    pub diagnostics: Vec<Diagnostic>,
    pub classes: Vec<GeneratedClass>,
}

impl CompileOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn class(&self, name: &str) -> Option<&GeneratedClass> {
        self.classes.iter().find(|c| c.name == name)
    }
}

/// Runs every check without generating code.
pub fn check(source: &str) -> Vec<Diagnostic> {
    let mut sink = DiagnosticSink::new();
    let mut unit = parser::parse(source, &mut sink);
    let skip = review::review(&unit, &mut sink);
    wash::analyze(&mut unit, &skip, &mut sink);
    sink.into_sorted()
}

/// Compiles one source file in memory.
///
/// Classes are generated only when the unit has no errors, unless
/// [`Config::generate_on_error`] is set; declarations rejected by review
/// are never generated.
pub fn compile(source: &str, config: &Config) -> Result<CompileOutput> {
    let mut sink = DiagnosticSink::new();
    let mut unit = parser::parse(source, &mut sink);
    let skip = review::review(&unit, &mut sink);
    let analysis = wash::analyze(&mut unit, &skip, &mut sink);

    let classes = if sink.has_errors() && !config.generate_on_error {
        log::debug!("{} error(s); no classes generated", sink.error_count());
        Vec::new()
    } else {
        let classes = codegen::generate(&unit, &analysis, config, &skip)?;
        for class in &classes {
            verify::verify(&class.class_file)
                .map_err(|source| Error::Verify { class: class.name.clone(), source })?;
        }
        classes
    };
    Ok(CompileOutput { diagnostics: sink.into_sorted(), classes })
}

/// Compiles `source` and writes its classes under `output_dir`, one
/// directory level per package segment.
pub fn compile_to_dir(source: &str, output_dir: &Path, config: &Config) -> Result<CompileOutput> {
    let output = compile(source, config)?;
    for class in &output.classes {
        let path = output_dir.join(class.relative_path());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &class.bytes)?;
        log::debug!("wrote {}", path.display());
    }
    Ok(output)
}

/// Reads and compiles one `.java` file. The file name becomes the
/// `SourceFile` attribute unless the configuration names one.
pub fn compile_file(input: &Path, output_dir: &Path, config: &Config) -> Result<CompileOutput> {
    let source = std::fs::read_to_string(input)?;
    let mut config = config.clone();
    if config.source_file.is_none() {
        config.source_file = input.file_name().map(|n| n.to_string_lossy().into_owned());
    }
    compile_to_dir(&source, output_dir, &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_suppress_generation() {
        let out = compile("record R(int wait) {}", &Config::default()).unwrap();
        assert!(out.has_errors());
        assert!(out.classes.is_empty());
    }

    #[test]
    fn clean_units_generate_verified_classes() {
        let out = compile("record R(int a) {}", &Config::default()).unwrap();
        assert!(!out.has_errors());
        assert!(out.class("R").is_some());
    }

    #[test]
    fn check_reports_without_generating() {
        let diagnostics = check("record X(int finalize) {}");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message(), "Illegal component name finalize in record X");
    }
}
