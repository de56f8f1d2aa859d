//! Code generation: analyzed declarations to class files.
//!
//! Each top-level declaration is written with its nested declarations,
//! innermost first so that the `$SwitchMap$` holder of the nest is
//! complete before the outermost class lists its nest members.

pub mod annotation;
pub mod attribute;
pub mod class;
pub mod class_writer;
pub mod code;
pub mod constpool;
pub mod defs;
pub mod error;
pub mod field;
pub mod frame;
pub mod gen;
pub mod gen_expr;
pub mod gen_switch;
pub mod lambda;
pub mod method;
pub mod opcodes;
pub mod records;
pub mod signature;
pub mod switch_map;
pub mod switch_optimizer;
pub mod writer;

use std::collections::HashSet;

pub use class::ClassFile;
pub use class_writer::ClassWriter;
pub use constpool::{Constant, ConstantPool};
pub use error::{ClassGenerationError, CodeGenResult};
pub use writer::ClassfileWritable;

use crate::ast::{CompilationUnit, DeclId};
use crate::config::Config;
use crate::wash::Analysis;
use switch_map::SwitchMaps;

/// One generated class.
#[derive(Debug, Clone)]
pub struct GeneratedClass {
    /// Internal name, such as `p/Outer$Inner`.
    pub name: String,
    pub class_file: ClassFile,
    pub bytes: Vec<u8>,
}

impl GeneratedClass {
    fn new(class_file: ClassFile) -> Self {
        let name = class_file.name().to_string();
        let bytes = class_file.to_classfile_bytes();
        Self { name, class_file, bytes }
    }

    /// Path of the class file relative to the output directory.
    pub fn relative_path(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(format!("{}.class", self.name))
    }
}

/// Class files for every declaration of `unit` not in `skip`. A skipped
/// declaration takes its nested declarations with it.
pub fn generate(
    unit: &CompilationUnit,
    analysis: &Analysis,
    config: &Config,
    skip: &HashSet<DeclId>,
) -> CodeGenResult<Vec<GeneratedClass>> {
    let writer = ClassWriter::new(unit, analysis, config);
    let mut out = Vec::new();
    for top in unit.decls.top_level() {
        if skip.contains(&top.id) {
            continue;
        }
        let outermost = unit.binary_name(top.id);
        let mut maps = SwitchMaps::new(&outermost);
        let nested: Vec<DeclId> = class_writer::descendants(unit, top.id)
            .into_iter()
            .filter(|id| !is_skipped(unit, *id, skip))
            .collect();
        let mut classes = Vec::with_capacity(nested.len() + 1);
        for id in nested.iter().rev() {
            classes.push(writer.write_class(*id, &mut maps)?);
        }
        classes.reverse();
        let outer = writer.write_class(top.id, &mut maps)?;
        out.push(GeneratedClass::new(outer));
        out.extend(classes.into_iter().map(GeneratedClass::new));
        if !maps.is_empty() {
            out.push(GeneratedClass::new(maps.generate(&outermost, config)?));
        }
    }
    log::debug!("generated {} classes", out.len());
    Ok(out)
}

fn is_skipped(unit: &CompilationUnit, mut id: DeclId, skip: &HashSet<DeclId>) -> bool {
    loop {
        if skip.contains(&id) {
            return true;
        }
        match unit.decls[id].enclosing {
            Some(outer) => id = outer,
            None => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticSink;
    use crate::parser::parse;

    fn compile(src: &str) -> Vec<GeneratedClass> {
        let mut sink = DiagnosticSink::new();
        let mut unit = parse(src, &mut sink);
        let skip = crate::review::review(&unit, &mut sink);
        let analysis = crate::wash::analyze(&mut unit, &skip, &mut sink);
        assert!(!sink.has_errors(), "{:?}", sink);
        generate(&unit, &analysis, &Config::default(), &skip).unwrap()
    }

    #[test]
    fn outermost_first_then_nested_then_holder() {
        let classes = compile(
            "class Outer { enum E { A, B } record R(int x) {} int f(E e) { switch (e) { case A: return 1; default: return 2; } } }",
        );
        let names: Vec<&str> = classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Outer", "Outer$E", "Outer$R", "Outer$1"]);
        match classes[0].class_file.attribute("NestMembers") {
            Some(attribute::AttributeInfo::NestMembers(m)) => assert_eq!(m.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(classes[1].relative_path(), std::path::PathBuf::from("Outer$E.class"));
    }

    #[test]
    fn no_holder_without_enum_switches() {
        let classes = compile("record P(int a) {}");
        assert_eq!(classes.len(), 1);
        assert_eq!(&classes[0].bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    }
}
