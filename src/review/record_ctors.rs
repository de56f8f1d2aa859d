//! Constructor rules of records: canonical (normal and compact) forms,
//! non-canonical delegation, and `@SafeVarargs` placement.

use std::collections::HashSet;

use crate::ast::*;
use crate::diagnostics::{DiagnosticKind, DiagnosticSink};
use crate::wash::lower::is_canonical;

fn type_label(ty: &TypeRef, varargs: bool) -> String {
    if varargs {
        format!("{}...", ty)
    } else {
        ty.to_string()
    }
}

/// `Name(int, String...)`, for messages.
fn signature(decl: &TypeDecl, ctor: &ConstructorDecl) -> String {
    let types: Vec<String> = if ctor.compact {
        decl.components.iter().map(|c| type_label(&c.ty.with_extra_dims(c.extra_dims), c.varargs)).collect()
    } else {
        ctor.params.iter().map(|p| type_label(&p.ty.with_extra_dims(p.extra_dims), p.varargs)).collect()
    };
    format!("{}({})", decl.name, types.join(", "))
}

fn has_safe_varargs(anns: &[Annotation]) -> Option<&Annotation> {
    anns.iter().find(|a| a.simple_name() == "SafeVarargs")
}

fn for_each_stmt<'a>(stmts: &'a [Stmt], conditional: bool, f: &mut dyn FnMut(&'a Stmt, bool)) {
    for s in stmts {
        f(s, conditional);
        let nested = conditional
            || matches!(s, Stmt::If(_) | Stmt::While(_) | Stmt::DoWhile(_) | Stmt::For(_) | Stmt::Switch(_));
        match s {
            Stmt::Try(t) => {
                for_each_stmt(&t.body.stmts, conditional, f);
                for c in &t.catches {
                    for_each_stmt(&c.body.stmts, true, f);
                }
                if let Some(fin) = &t.finally {
                    for_each_stmt(&fin.stmts, conditional, f);
                }
            }
            _ => {
                for child in s.children() {
                    for_each_stmt(std::slice::from_ref(child), nested, f);
                }
            }
        }
    }
}

pub(crate) fn review_record_constructors(decl: &TypeDecl, sink: &mut DiagnosticSink) {
    let mut canonical_seen = false;
    let mut explicit_canonical = None;
    for ctor in decl.constructors().filter(|c| c.origin == Origin::Source) {
        if is_canonical(decl, ctor) {
            if canonical_seen {
                sink.report(DiagnosticKind::DuplicateCanonical(decl.name.clone()), ctor.name_span);
                continue;
            }
            canonical_seen = true;
            explicit_canonical = Some(ctor);
            review_canonical(decl, ctor, sink);
        } else {
            review_non_canonical(decl, ctor, sink);
        }
    }
    review_recursion(decl, sink);
    review_safe_varargs(decl, explicit_canonical, sink);
}

fn review_canonical(decl: &TypeDecl, ctor: &ConstructorDecl, sink: &mut DiagnosticSink) {
    let sig = signature(decl, ctor);
    if ctor.modifiers.visibility() < decl.modifiers.visibility() {
        sink.report(DiagnosticKind::CanonicalVisibility(sig.clone()), ctor.name_span);
    }
    if let Some(p) = ctor.type_params.first() {
        sink.report(DiagnosticKind::CanonicalGeneric(sig.clone()), p.span);
    }
    if let Some(t) = ctor.throws.first() {
        sink.report(DiagnosticKind::CanonicalThrows(sig), t.span);
    }
    if !ctor.compact {
        for (p, c) in ctor.params.iter().zip(&decl.components) {
            if p.name != c.name {
                sink.report(DiagnosticKind::CanonicalParameterName(p.name.clone(), c.name.clone()), p.name_span);
            }
        }
    }

    let components: HashSet<&str> = decl.components.iter().map(|c| c.name.as_str()).collect();
    let mut conditional_fields: Vec<String> = Vec::new();
    for_each_stmt(&ctor.body.stmts, false, &mut |stmt, conditional| {
        match stmt {
            Stmt::ExplicitCtorCall(call) => sink.report(DiagnosticKind::CanonicalExplicitCall, call.span),
            Stmt::Return(r) if ctor.compact => sink.report(DiagnosticKind::CompactReturn, r.span),
            _ => {}
        }
        if !ctor.compact {
            return;
        }
        for e in stmt.exprs() {
            e.walk(&mut |e| {
                let target = match &e.kind {
                    ExprKind::Assign { target, .. } => target,
                    ExprKind::IncDec { target, .. } => target,
                    _ => return,
                };
                if let ExprKind::FieldAccess { target: this, name, name_span } = &target.unparenthesized().kind {
                    if matches!(this.kind, ExprKind::This) && components.contains(name.as_str()) {
                        sink.report(DiagnosticKind::CompactFieldAssignment(name.clone()), *name_span);
                        if conditional && !conditional_fields.contains(name) {
                            conditional_fields.push(name.clone());
                        }
                    }
                }
            });
        }
    });
    for name in conditional_fields {
        sink.report(DiagnosticKind::FieldMayNotBeInitialized(name), ctor.name_span);
    }
}

fn review_non_canonical(decl: &TypeDecl, ctor: &ConstructorDecl, sink: &mut DiagnosticSink) {
    match ctor.explicit_call() {
        Some(call) if call.kind == CtorCallKind::This => {}
        _ => sink.report(DiagnosticKind::NonCanonicalWithoutThisCall, ctor.name_span),
    }
    if let Some(ann) = has_safe_varargs(&ctor.annotations) {
        sink.report(DiagnosticKind::SafeVarargsNonCanonical(signature(decl, ctor)), ann.span);
    }
}

/// Constructor delegated to by `this(args)`, matched on arity. A call with
/// the component count goes to the canonical constructor, which never
/// delegates.
fn delegate_target(ctors: &[&ConstructorDecl], decl: &TypeDecl, arity: usize) -> Option<usize> {
    if arity == decl.components.len() {
        return None;
    }
    ctors.iter().position(|c| !is_canonical(decl, c) && c.params.len() == arity)
}

fn review_recursion(decl: &TypeDecl, sink: &mut DiagnosticSink) {
    let ctors: Vec<&ConstructorDecl> = decl.constructors().collect();
    let edges: Vec<Option<usize>> = ctors
        .iter()
        .map(|c| match c.explicit_call() {
            Some(call) if call.kind == CtorCallKind::This && !is_canonical(decl, c) => {
                delegate_target(&ctors, decl, call.args.len())
            }
            _ => None,
        })
        .collect();
    for (start, ctor) in ctors.iter().enumerate() {
        let mut cur = edges[start];
        let mut steps = 0;
        while let Some(next) = cur {
            if next == start {
                if let Some(call) = ctor.explicit_call() {
                    sink.report(DiagnosticKind::RecursiveConstructorInvocation(signature(decl, ctor)), call.span);
                }
                break;
            }
            steps += 1;
            if steps > ctors.len() {
                break;
            }
            cur = edges[next];
        }
    }
}

/// Varargs element types whose erasure loses information.
fn is_non_reifiable(decl: &TypeDecl, c: &RecordComponent) -> bool {
    c.extra_dims == 0
        && (c.ty.type_args.iter().any(|a| a.name != "?") || decl.type_params.iter().any(|p| p.name == c.ty.name))
}

fn review_safe_varargs(decl: &TypeDecl, canonical: Option<&ConstructorDecl>, sink: &mut DiagnosticSink) {
    for c in &decl.components {
        let has_accessor = decl.methods().any(|m| m.name == c.name && m.params.is_empty() && m.origin == Origin::Source);
        if let Some(ann) = has_safe_varargs(&c.annotations) {
            if !has_accessor {
                sink.report(DiagnosticKind::SafeVarargsComponent(c.name.clone()), ann.span);
            }
        }
    }
    let Some(last) = decl.components.last() else { return };
    if !last.varargs || !is_non_reifiable(decl, last) {
        return;
    }
    match canonical {
        Some(ctor) if has_safe_varargs(&ctor.annotations).is_some() => {}
        Some(ctor) => sink.report(DiagnosticKind::HeapPollution(last.name.clone()), ctor.name_span),
        None => sink.report(DiagnosticKind::HeapPollution(last.name.clone()), decl.name_span),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::parser::parse;

    fn diagnostics(src: &str) -> Vec<(DiagnosticKind, usize)> {
        let mut sink = DiagnosticSink::new();
        let unit = parse(src, &mut sink);
        assert!(sink.is_empty(), "syntax errors: {:?}", sink.iter().collect::<Vec<_>>());
        for decl in unit.decls.iter().filter(|d| d.is_record()) {
            review_record_constructors(decl, &mut sink);
        }
        sink.iter().map(|d| (d.kind.clone(), d.span.start.line)).collect()
    }

    fn kinds(src: &str) -> Vec<DiagnosticKind> {
        diagnostics(src).into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn canonical_constraints() {
        assert_eq!(
            kinds("public record R(int a) { R(int a) { this.a = a; } }"),
            vec![DiagnosticKind::CanonicalVisibility("R(int)".into())]
        );
        assert_eq!(
            kinds("record R(int a) { <T> R(int a) { this.a = a; } }"),
            vec![DiagnosticKind::CanonicalGeneric("R(int)".into())]
        );
        assert_eq!(
            kinds("record R(int a) { R(int a) throws Exception { this.a = a; } }"),
            vec![DiagnosticKind::CanonicalThrows("R(int)".into())]
        );
        assert_eq!(
            kinds("record R(int a) { R(int b) { this.a = b; } }"),
            vec![DiagnosticKind::CanonicalParameterName("b".into(), "a".into())]
        );
        assert_eq!(
            kinds("record R(int a) { R(int a) { super(); this.a = a; } }"),
            vec![DiagnosticKind::CanonicalExplicitCall]
        );
    }

    #[test]
    fn return_is_only_rejected_in_compact_form() {
        assert_eq!(kinds("record R(int a) { R { if (a > 0) return; } }"), vec![DiagnosticKind::CompactReturn]);
        assert!(kinds("record R(int a) { R(int a) { this.a = a; return; } }").is_empty());
    }

    #[test]
    fn compact_field_assignment() {
        assert_eq!(
            kinds("record R(int a) { R { this.a = 1; } }"),
            vec![DiagnosticKind::CompactFieldAssignment("a".into())]
        );
        assert_eq!(
            kinds("record R(int a) { R { if (a > 0) this.a = 1; } }"),
            vec![
                DiagnosticKind::CompactFieldAssignment("a".into()),
                DiagnosticKind::FieldMayNotBeInitialized("a".into()),
            ]
        );
        assert!(kinds("record R(int a) { R { a = a / 2; } }").is_empty());
    }

    #[test]
    fn non_canonical_constructors_delegate() {
        assert_eq!(
            kinds("record R(int a) { R() { } }"),
            vec![DiagnosticKind::NonCanonicalWithoutThisCall]
        );
        assert!(kinds("record R(int a) { R() { this(0); } }").is_empty());
        let k = kinds("record R(int a) { R() { this(\"x\", 1); } R(String s, int b) { this(); } }");
        assert_eq!(
            k,
            vec![
                DiagnosticKind::RecursiveConstructorInvocation("R()".into()),
                DiagnosticKind::RecursiveConstructorInvocation("R(String, int)".into()),
            ]
        );
    }

    #[test]
    fn duplicate_canonical() {
        assert_eq!(
            kinds("record R(int a) { R { } R(int a) { this.a = a; } }"),
            vec![DiagnosticKind::DuplicateCanonical("R".into())]
        );
    }

    #[test]
    fn safe_varargs_and_heap_pollution() {
        // implicit canonical constructor: warning on the record header
        let d = diagnostics("record R<T>(T... items) {\n}");
        assert_eq!(d, vec![(DiagnosticKind::HeapPollution("items".into()), 1)]);
        assert_eq!(DiagnosticKind::HeapPollution("items".into()).severity(), Severity::Warning);

        // annotated canonical constructor silences it
        assert!(kinds("record R<T>(T... items) {\n @SafeVarargs R { }\n}").is_empty());

        // unannotated explicit constructor carries the warning
        let d = diagnostics("record R<T>(T... items) {\n R { }\n}");
        assert_eq!(d, vec![(DiagnosticKind::HeapPollution("items".into()), 2)]);

        assert_eq!(
            kinds("record R(@SafeVarargs int... a) { }"),
            vec![DiagnosticKind::SafeVarargsComponent("a".into())]
        );
        assert!(kinds("record R(@SafeVarargs int... a) { public int[] a() { return a; } }").is_empty());
        assert_eq!(
            kinds("record R(int a) { @SafeVarargs R(String... s) { this(0); } }"),
            vec![DiagnosticKind::SafeVarargsNonCanonical("R(String...)".into())]
        );
    }
}
