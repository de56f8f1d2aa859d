//! Structural rules of a record declaration: modifiers, components, members
//! and accessor-shaped methods.

use std::collections::{HashMap, HashSet};

use super::annotations::review_component_annotations;
use super::record_ctors::review_record_constructors;
use crate::ast::*;
use crate::consts::ILLEGAL_COMPONENT_NAMES;
use crate::diagnostics::{DiagnosticKind, DiagnosticSink};
use crate::wash::lower::same_type;

const TOP_LEVEL_MODIFIERS: &[Modifier] = &[Modifier::Public, Modifier::Final, Modifier::Strictfp];
const NESTED_MODIFIERS: &[Modifier] = &[
    Modifier::Public,
    Modifier::Private,
    Modifier::Protected,
    Modifier::Static,
    Modifier::Final,
    Modifier::Strictfp,
];

pub(crate) fn review_record(unit: &CompilationUnit, decl: &TypeDecl, sink: &mut DiagnosticSink) {
    log::trace!("review record {}", decl.name);
    review_modifiers(decl, sink);
    review_components(decl, sink);
    review_members(decl, sink);
    review_accessors(decl, sink);
    review_record_constructors(decl, sink);
    review_component_annotations(unit, decl, sink);
}

fn review_modifiers(decl: &TypeDecl, sink: &mut DiagnosticSink) {
    let allowed = if decl.enclosing.is_some() { NESTED_MODIFIERS } else { TOP_LEVEL_MODIFIERS };
    let mut seen = HashSet::new();
    for (m, span) in &decl.modifiers.entries {
        if !seen.insert(*m) {
            sink.report(DiagnosticKind::DuplicateModifier(decl.name.clone()), *span);
            continue;
        }
        match m {
            Modifier::Sealed | Modifier::NonSealed => {
                sink.report(DiagnosticKind::SealedRecord(m.to_string(), decl.name.clone()), *span)
            }
            m if allowed.contains(m) => {}
            _ if decl.enclosing.is_some() => {
                sink.report(DiagnosticKind::IllegalNestedRecordModifier(decl.name.clone()), *span)
            }
            _ => sink.report(DiagnosticKind::IllegalTopLevelRecordModifier(decl.name.clone()), *span),
        }
    }
}

fn review_components(decl: &TypeDecl, sink: &mut DiagnosticSink) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for c in &decl.components {
        *counts.entry(c.name.as_str()).or_default() += 1;
    }
    let last = decl.components.len().saturating_sub(1);
    for (i, c) in decl.components.iter().enumerate() {
        if c.ty.is_void() {
            sink.report(DiagnosticKind::VoidComponent(c.name.clone()), c.ty.span);
        }
        if let Some((_, span)) = c.modifiers.entries.first() {
            sink.report(DiagnosticKind::ComponentModifiers(c.name.clone()), *span);
        }
        if c.extra_dims > 0 {
            sink.report(DiagnosticKind::ComponentExtendedDimensions, c.name_span);
        }
        if counts.get(c.name.as_str()).copied().unwrap_or(0) > 1 {
            sink.report(DiagnosticKind::DuplicateComponent(c.name.clone()), c.name_span);
            sink.report(DiagnosticKind::DuplicateParameter(c.name.clone()), c.name_span);
        }
        if c.varargs && i != last {
            sink.report(DiagnosticKind::RecordVarargsNotLast(c.ty.to_string(), decl.name.clone()), c.name_span);
            sink.report(DiagnosticKind::MethodVarargsNotLast(c.ty.to_string(), decl.name.clone()), c.name_span);
        }
        if ILLEGAL_COMPONENT_NAMES.contains(c.name.as_str()) {
            sink.report(DiagnosticKind::IllegalComponentName(c.name.clone(), decl.name.clone()), c.name_span);
        }
    }
}

fn review_members(decl: &TypeDecl, sink: &mut DiagnosticSink) {
    for member in &decl.members {
        match member {
            Member::Initializer(init) if !init.is_static => {
                sink.report(DiagnosticKind::RecordInstanceInitializer, init.span);
            }
            Member::Field(f) if !f.modifiers.has(Modifier::Static) && f.origin == Origin::Source => {
                let names: Vec<&str> = f.declarators.iter().map(|d| d.name.as_str()).collect();
                let span = f.declarators.first().map(|d| d.name_span).unwrap_or(f.span);
                sink.report(DiagnosticKind::RecordInstanceField(names.join(", ")), span);
            }
            Member::Method(m) => {
                if let Some(span) = m.modifiers.span_of(Modifier::Native) {
                    sink.report(DiagnosticKind::RecordNativeMethod(m.name.clone()), span);
                }
            }
            _ => {}
        }
    }
}

fn review_accessors(decl: &TypeDecl, sink: &mut DiagnosticSink) {
    for c in &decl.components {
        let Some(m) = decl.methods().find(|m| m.name == c.name && m.params.is_empty() && m.origin == Origin::Source)
        else {
            continue;
        };
        if m.modifiers.visibility() != Visibility::Public {
            sink.report(DiagnosticKind::AccessorNotPublic, m.name_span);
        }
        if let Some(span) = m.modifiers.span_of(Modifier::Static) {
            sink.report(DiagnosticKind::AccessorStatic, span);
        }
        if let Some(p) = m.type_params.first() {
            sink.report(DiagnosticKind::AccessorGeneric, p.span);
        }
        if let Some(t) = m.throws.first() {
            sink.report(DiagnosticKind::AccessorThrows, t.span);
        }
        let component_type = c.effective_type();
        if !same_type(&m.return_type, &component_type) {
            sink.report(DiagnosticKind::AccessorReturnType(component_type.to_string()), m.return_type.span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn review_kinds(src: &str) -> Vec<DiagnosticKind> {
        let mut sink = DiagnosticSink::new();
        let unit = parse(src, &mut sink);
        assert!(sink.is_empty(), "syntax errors: {:?}", sink.iter().collect::<Vec<_>>());
        for decl in unit.decls.iter().filter(|d| d.is_record()) {
            review_record(&unit, decl, &mut sink);
        }
        sink.iter().map(|d| d.kind.clone()).collect()
    }

    #[test]
    fn illegal_component_name() {
        assert_eq!(
            review_kinds("record X(int myInt, int finalize) {}"),
            vec![DiagnosticKind::IllegalComponentName("finalize".into(), "X".into())]
        );
    }

    #[test]
    fn top_level_and_nested_modifiers() {
        assert_eq!(
            review_kinds("private record R() {}"),
            vec![DiagnosticKind::IllegalTopLevelRecordModifier("R".into())]
        );
        assert!(review_kinds("class O { private static record R() {} }").is_empty());
        assert_eq!(
            review_kinds("class O { abstract record R() {} }"),
            vec![DiagnosticKind::IllegalNestedRecordModifier("R".into())]
        );
        assert_eq!(
            review_kinds("final final record R() {}"),
            vec![DiagnosticKind::DuplicateModifier("R".into())]
        );
        assert_eq!(
            review_kinds("sealed record R() {}"),
            vec![DiagnosticKind::SealedRecord("sealed".into(), "R".into())]
        );
    }

    #[test]
    fn component_shapes() {
        let kinds = review_kinds("record R(final int a, int b[], int... c) {}");
        assert_eq!(
            kinds,
            vec![DiagnosticKind::ComponentModifiers("a".into()), DiagnosticKind::ComponentExtendedDimensions]
        );
        let kinds = review_kinds("record R(int... a, int b) {}");
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::RecordVarargsNotLast("int".into(), "R".into()),
                DiagnosticKind::MethodVarargsNotLast("int".into(), "R".into()),
            ]
        );
    }

    #[test]
    fn duplicate_components_reported_per_occurrence() {
        let kinds = review_kinds("record R(int a, String a) {}");
        assert_eq!(kinds.iter().filter(|k| **k == DiagnosticKind::DuplicateComponent("a".into())).count(), 2);
        assert_eq!(kinds.iter().filter(|k| **k == DiagnosticKind::DuplicateParameter("a".into())).count(), 2);
    }

    #[test]
    fn member_restrictions() {
        let kinds = review_kinds(
            "record R(int a) { { } static { } int x; static int y; native void n(); }",
        );
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::RecordInstanceInitializer,
                DiagnosticKind::RecordInstanceField("x".into()),
                DiagnosticKind::RecordNativeMethod("n".into()),
            ]
        );
    }

    #[test]
    fn accessor_shape() {
        let kinds = review_kinds(
            "record R(int a, String b, int c) { int a() { return a; } public long c() { return c; } public String b() throws Exception { return b; } }",
        );
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::AccessorNotPublic,
                DiagnosticKind::AccessorThrows,
                DiagnosticKind::AccessorReturnType("int".into()),
            ]
        );
        assert_eq!(
            review_kinds("record R(int a) { public static int a() { return 0; } }"),
            vec![DiagnosticKind::AccessorStatic]
        );
    }
}
