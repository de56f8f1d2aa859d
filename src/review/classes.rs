//! Checks that apply to every type declaration: duplicate members, final
//! superclasses, unsupported inner classes.

use std::collections::HashSet;

use crate::ast::*;
use crate::diagnostics::{DiagnosticKind, DiagnosticSink};

pub(crate) fn review_type(unit: &CompilationUnit, decl: &TypeDecl, sink: &mut DiagnosticSink) {
    if decl.kind == TypeKind::Class && decl.enclosing.is_some() && !decl.is_static() {
        sink.report(DiagnosticKind::InnerClassUnsupported(decl.name.clone()), decl.name_span);
    }
    review_superclass(unit, decl, sink);
    review_duplicate_fields(decl, sink);
    review_duplicate_methods(decl, sink);
}

/// A class may not extend a record or enum of this unit, nor a final class.
fn review_superclass(unit: &CompilationUnit, decl: &TypeDecl, sink: &mut DiagnosticSink) {
    let Some(ext) = &decl.extends else { return };
    let simple = ext.name.rsplit('.').next().unwrap_or(&ext.name);
    let target = unit.decls.iter().find(|d| d.name == simple);
    let is_final = match target {
        Some(t) => matches!(t.kind, TypeKind::Record | TypeKind::Enum) || t.modifiers.has(Modifier::Final),
        None => matches!(
            simple,
            "String" | "Integer" | "Long" | "Double" | "Float" | "Short" | "Byte" | "Character" | "Boolean" | "Class"
                | "StringBuilder" | "System" | "Math"
        ),
    };
    if is_final {
        sink.report(DiagnosticKind::SubclassFinal(decl.name.clone(), simple.to_string()), ext.span);
    }
}

fn review_duplicate_fields(decl: &TypeDecl, sink: &mut DiagnosticSink) {
    let mut seen: HashSet<&str> = decl.components.iter().map(|c| c.name.as_str()).collect();
    seen.extend(decl.enum_constants.iter().map(|c| c.name.as_str()));
    for f in decl.fields().filter(|f| f.origin == Origin::Source) {
        for d in &f.declarators {
            if !seen.insert(d.name.as_str()) {
                sink.report(DiagnosticKind::DuplicateField(decl.name.clone(), d.name.clone()), d.name_span);
            }
        }
    }
}

fn erased_params(params: &[Parameter]) -> String {
    let types: Vec<String> = params
        .iter()
        .map(|p| {
            let t = p.effective_type();
            format!("{}{}", t.name.rsplit('.').next().unwrap_or(&t.name), "[]".repeat(t.array_dims))
        })
        .collect();
    types.join(", ")
}

fn review_duplicate_methods(decl: &TypeDecl, sink: &mut DiagnosticSink) {
    let mut seen = HashSet::new();
    for m in decl.methods() {
        let sig = format!("{}({})", m.name, erased_params(&m.params));
        if !seen.insert(sig.clone()) {
            sink.report(DiagnosticKind::DuplicateMethod(sig, decl.name.clone()), m.name_span);
        }
    }
    let mut ctors = HashSet::new();
    for c in decl.constructors().filter(|c| !c.compact) {
        let sig = format!("{}({})", decl.name, erased_params(&c.params));
        if !ctors.insert(sig.clone()) {
            sink.report(DiagnosticKind::DuplicateMethod(sig, decl.name.clone()), c.name_span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn kinds(src: &str) -> Vec<DiagnosticKind> {
        let mut sink = DiagnosticSink::new();
        let unit = parse(src, &mut sink);
        for decl in unit.decls.iter() {
            review_type(&unit, decl, &mut sink);
        }
        sink.iter().map(|d| d.kind.clone()).collect()
    }

    #[test]
    fn records_cannot_be_subclassed() {
        assert_eq!(
            kinds("record R() {} class C extends R {}"),
            vec![DiagnosticKind::SubclassFinal("C".into(), "R".into())]
        );
    }

    #[test]
    fn duplicates() {
        assert_eq!(
            kinds("class A { int x; String x; void m(int a) {} void m(int b) {} void m(long c) {} }"),
            vec![
                DiagnosticKind::DuplicateField("A".into(), "x".into()),
                DiagnosticKind::DuplicateMethod("m(int)".into(), "A".into()),
            ]
        );
    }

    #[test]
    fn inner_classes_must_be_static() {
        assert_eq!(
            kinds("class A { class B {} static class C {} record D() {} }"),
            vec![DiagnosticKind::InnerClassUnsupported("B".into())]
        );
    }
}
