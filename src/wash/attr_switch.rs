//! Switch analysis: selector kinds, case labels, exhaustiveness and the
//! result type of switch expressions.

use std::collections::{HashMap, HashSet};

use super::attr::{Attr, CaseValue, SelectorKind, SwitchFrame, SwitchInfo};
use super::symtab::ClassKind;
use super::types::{int_constant_fits, ConstValue, JType};
use crate::ast::*;
use crate::diagnostics::DiagnosticKind;

/// Dotted source text of a qualified name, `a.b.C`.
fn dotted(e: &Expr) -> Option<String> {
    match &e.kind {
        ExprKind::Name(n) => Some(n.clone()),
        ExprKind::FieldAccess { target, name, .. } => Some(format!("{}.{}", dotted(target)?, name)),
        _ => None,
    }
}

impl<'a> Attr<'a> {
    pub(super) fn switch_stmt(&mut self, sw: &SwitchStmt) {
        let mark = self.sink.len();
        let selector_type = self.expr(&sw.selector, None);
        let kind = self.selector_kind(&sw.selector, &selector_type);
        let (has_default, covered) = self.case_labels(&sw.cases, &kind);
        self.case_bodies(&sw.cases, false);

        let missing = self.missing_constants(&kind, &covered);
        let exhaustive = has_default || (matches!(kind, SelectorKind::Enum(_)) && missing.is_empty());
        if !has_default {
            if let SelectorKind::Enum(name) = &kind {
                let enum_name = JType::class(name).java_name();
                for c in &missing {
                    self.report(DiagnosticKind::MissingEnumConstant(c.clone(), enum_name.clone()), sw.selector.span);
                }
            }
        }
        let erroneous = self.sink.has_errors_since(mark);
        self.out.switches.insert(
            sw.selector.id,
            SwitchInfo { result_type: None, selector_type, selector_kind: kind, has_default, exhaustive, erroneous },
        );
    }

    pub(super) fn switch_expr(&mut self, e: &Expr, sw: &SwitchExpr, expected: Option<&JType>) -> JType {
        let mark = self.sink.len();
        let expected = expected.filter(|t| !t.is_error() && **t != JType::Void).cloned();
        let selector_type = self.expr(&sw.selector, None);
        let kind = self.selector_kind(&sw.selector, &selector_type);
        let (has_default, covered) = self.case_labels(&sw.cases, &kind);

        self.frames.push(SwitchFrame { expected: expected.clone(), arms: Vec::new() });
        self.case_bodies(&sw.cases, true);
        let frame = self.frames.pop().unwrap_or_default();

        if sw.cases.is_empty() {
            self.report(DiagnosticKind::EmptySwitchExpression, e.span);
        } else if frame.arms.is_empty() {
            self.report(DiagnosticKind::NoResultExpressions, e.span);
        }

        let missing = self.missing_constants(&kind, &covered);
        let exhaustive = has_default || (matches!(kind, SelectorKind::Enum(_)) && missing.is_empty());
        match &kind {
            _ if exhaustive => {}
            SelectorKind::Invalid => {}
            SelectorKind::Enum(_) => self.report(DiagnosticKind::SwitchExpressionNotExhaustive, sw.selector.span),
            _ => self.report(DiagnosticKind::SwitchExpressionNoDefault, sw.selector.span),
        }

        let result = match &expected {
            Some(target) => {
                for (id, span, ty) in &frame.arms {
                    let constant = self.out.constants.get(id);
                    if !ty.is_error() && !self.table.is_assignable(ty, target, constant) {
                        self.report(DiagnosticKind::TypeMismatch(ty.java_name(), target.java_name()), *span);
                    }
                }
                target.clone()
            }
            None => self.standalone_type(&frame.arms),
        };

        let erroneous = self.sink.has_errors_since(mark);
        log::trace!("switch expression at {:?}: {} arm(s), type {}", e.span, frame.arms.len(), result.java_name());
        self.out.switches.insert(
            sw.selector.id,
            SwitchInfo {
                result_type: Some(result.clone()),
                selector_type,
                selector_kind: kind,
                has_default,
                exhaustive,
                erroneous,
            },
        );
        self.out.types.insert(e.id, result.clone());
        result
    }

    fn selector_kind(&mut self, selector: &Expr, ty: &JType) -> SelectorKind {
        if ty.is_error() {
            return SelectorKind::Invalid;
        }
        let unboxed = ty.unboxed_or_self();
        match &unboxed {
            JType::Byte | JType::Short | JType::Char | JType::Int => return SelectorKind::Int(unboxed),
            _ if ty.is_string() => return SelectorKind::String,
            JType::Class(name) if self.table.get(name).map(|s| s.kind == ClassKind::Enum).unwrap_or(false) => {
                return SelectorKind::Enum(name.clone())
            }
            _ => {}
        }
        self.report(DiagnosticKind::IllegalSelectorType(ty.java_name()), selector.span);
        SelectorKind::Invalid
    }

    fn missing_constants(&self, kind: &SelectorKind, covered: &HashSet<String>) -> Vec<String> {
        let SelectorKind::Enum(name) = kind else { return Vec::new() };
        let Some(sym) = self.table.get(name) else { return Vec::new() };
        sym.enum_constants.iter().filter(|c| !covered.contains(*c)).cloned().collect()
    }

    /// Checks every label; returns whether a default exists and the enum
    /// constants named by labels.
    fn case_labels(&mut self, cases: &[SwitchCase], kind: &SelectorKind) -> (bool, HashSet<String>) {
        let arrow = |c: &SwitchCase| matches!(c.body, CaseBody::Arrow(_));
        if let Some(first) = cases.first() {
            if let Some(other) = cases.iter().find(|c| arrow(c) != arrow(first)) {
                self.report(DiagnosticKind::MixedCaseKinds, other.span);
            }
        }

        let mut has_default = false;
        let mut values: Vec<(CaseValue, Span)> = Vec::new();
        for case in cases {
            for label in &case.labels {
                match label {
                    CaseLabel::Default(span) => {
                        if has_default {
                            self.report(DiagnosticKind::DuplicateDefault, *span);
                        }
                        has_default = true;
                    }
                    CaseLabel::Expr(e) => {
                        if let Some(v) = self.case_label(e, kind) {
                            self.out.case_labels.insert(e.id, v.clone());
                            values.push((v, e.span));
                        }
                    }
                }
            }
        }

        let mut counts: HashMap<&CaseValue, usize> = HashMap::new();
        for (v, _) in &values {
            *counts.entry(v).or_default() += 1;
        }
        let duplicates: Vec<Span> =
            values.iter().filter(|(v, _)| counts.get(v).copied().unwrap_or(0) > 1).map(|(_, s)| *s).collect();
        for span in duplicates {
            self.report(DiagnosticKind::DuplicateCase, span);
        }

        let covered = values
            .into_iter()
            .filter_map(|(v, _)| match v {
                CaseValue::EnumConst { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        (has_default, covered)
    }

    fn case_label(&mut self, e: &Expr, kind: &SelectorKind) -> Option<CaseValue> {
        match kind {
            SelectorKind::Invalid => {
                self.expr(e, None);
                None
            }
            SelectorKind::Enum(enum_name) => self.enum_label(e, enum_name),
            SelectorKind::Int(selector) => {
                let t = self.expr(e, Some(selector));
                if t.is_error() {
                    return None;
                }
                let Some(c) = self.out.constants.get(&e.id).cloned() else {
                    self.report(DiagnosticKind::NonConstantCase, e.span);
                    return None;
                };
                if !self.table.is_assignable(&t, selector, Some(&c)) {
                    self.report(DiagnosticKind::TypeMismatch(t.java_name(), selector.java_name()), e.span);
                    return None;
                }
                match c {
                    ConstValue::Int(v) if int_constant_fits(v, selector) => Some(CaseValue::Int(v)),
                    _ => None,
                }
            }
            SelectorKind::String => {
                let t = self.expr(e, Some(&JType::string()));
                if t.is_error() {
                    return None;
                }
                if !t.is_string() {
                    self.report(DiagnosticKind::TypeMismatch(t.java_name(), JType::string().java_name()), e.span);
                    return None;
                }
                match self.out.constants.get(&e.id) {
                    Some(ConstValue::Str(s)) => Some(CaseValue::Str(s.clone())),
                    _ => {
                        self.report(DiagnosticKind::NonConstantCase, e.span);
                        None
                    }
                }
            }
        }
    }

    fn enum_label(&mut self, e: &Expr, enum_name: &str) -> Option<CaseValue> {
        let constants = self.table.get(enum_name).map(|s| s.enum_constants.clone()).unwrap_or_default();
        let java_name = JType::class(enum_name).java_name();
        let (name, span) = match &e.unparenthesized().kind {
            ExprKind::Name(n) => (n.clone(), e.span),
            ExprKind::FieldAccess { target, name, name_span } => {
                let qualified = dotted(target).map(|q| format!("{}.{}", q, name)).unwrap_or_else(|| name.clone());
                self.report(DiagnosticKind::QualifiedEnumLabel(qualified, name.clone()), e.span);
                (name.clone(), *name_span)
            }
            _ => {
                let t = self.expr(e, None);
                if !t.is_error() {
                    self.report(DiagnosticKind::TypeMismatch(t.java_name(), java_name), e.span);
                }
                return None;
            }
        };
        match constants.iter().position(|c| *c == name) {
            Some(ordinal) => {
                self.out.types.insert(e.id, JType::class(enum_name));
                Some(CaseValue::EnumConst { name, ordinal: ordinal as i32 })
            }
            None => {
                self.report(DiagnosticKind::UnknownEnumConstant(name, java_name), span);
                None
            }
        }
    }

    /// Attributes case bodies. Colon groups share one scope; arrow arms get
    /// their own.
    fn case_bodies(&mut self, cases: &[SwitchCase], expression: bool) {
        self.push_scope();
        for case in cases {
            match &case.body {
                CaseBody::Colon(stmts) => {
                    for s in stmts {
                        self.stmt(s);
                    }
                }
                CaseBody::Arrow(ArrowBody::Expr(arm)) => {
                    if expression {
                        let expected = self.frames.last().and_then(|f| f.expected.clone());
                        let t = self.expr(arm, expected.as_ref());
                        if let Some(frame) = self.frames.last_mut() {
                            frame.arms.push((arm.id, arm.span, t));
                        }
                    } else {
                        self.expr(arm, None);
                    }
                }
                CaseBody::Arrow(ArrowBody::Block(b)) => self.block(b),
                CaseBody::Arrow(ArrowBody::Throw(t)) => self.throw_expr(&t.expr),
            }
        }
        self.pop_scope();
    }

    /// Type of a switch expression with no target type, from its arms.
    fn standalone_type(&mut self, arms: &[(ExprId, Span, JType)]) -> JType {
        let typed: Vec<(ExprId, &JType)> =
            arms.iter().filter(|(_, _, t)| !t.is_error()).map(|(id, _, t)| (*id, t)).collect();
        let Some((_, first)) = typed.first() else { return JType::Error };
        if typed.iter().all(|(_, t)| t == first) {
            return (*first).clone();
        }
        if typed.iter().all(|(_, t)| t.unboxed_or_self() == JType::Boolean) {
            return JType::Boolean;
        }
        if typed.iter().all(|(_, t)| t.unboxed_or_self().is_numeric()) {
            return self.numeric_choice(&typed);
        }
        let boxed: Vec<JType> =
            typed.iter().map(|(_, t)| t.boxed().unwrap_or_else(|| (*t).clone())).collect();
        self.table.lub(&boxed)
    }

    /// Numeric promotion in a choice context: wide types win, then the
    /// narrowest type every int constant fits.
    fn numeric_choice(&self, typed: &[(ExprId, &JType)]) -> JType {
        let unboxed: Vec<(ExprId, JType)> = typed.iter().map(|(id, t)| (*id, t.unboxed_or_self())).collect();
        for wide in [JType::Double, JType::Float, JType::Long] {
            if unboxed.iter().any(|(_, t)| *t == wide) {
                return wide;
            }
        }
        let int_constant = |id: &ExprId| match self.out.constants.get(id) {
            Some(ConstValue::Int(v)) => Some(*v),
            _ => None,
        };
        let non_constant_int = unboxed.iter().any(|(id, t)| *t == JType::Int && int_constant(id).is_none());
        if non_constant_int {
            return JType::Int;
        }
        let fits = |narrow: &JType, also: &[JType]| {
            unboxed.iter().any(|(_, t)| t == narrow)
                && unboxed.iter().all(|(id, t)| {
                    t == narrow
                        || also.contains(t)
                        || (*t == JType::Int && int_constant(id).map(|v| int_constant_fits(v, narrow)).unwrap_or(false))
                })
        };
        if fits(&JType::Short, &[JType::Byte]) {
            JType::Short
        } else if fits(&JType::Byte, &[]) {
            JType::Byte
        } else if fits(&JType::Char, &[]) {
            JType::Char
        } else {
            JType::Int
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::attr::tests::attributed;
    use super::*;

    fn kinds(src: &str) -> Vec<DiagnosticKind> {
        attributed(src).2
    }

    fn only_switch(src: &str) -> SwitchInfo {
        let (_, attr, kinds) = attributed(src);
        assert!(kinds.iter().all(|k| !matches!(k, DiagnosticKind::TypeMismatch(..))), "{:?}", kinds);
        assert_eq!(attr.switches.len(), 1);
        attr.switches.into_values().next().unwrap()
    }

    #[test]
    fn target_typed_result() {
        let info = only_switch("class A { double m(int i) { double d = switch (i) { case 1 -> 1; default -> 2.5f; }; return d; } }");
        assert_eq!(info.result_type, Some(JType::Double));
        assert!(info.exhaustive && !info.erroneous);
    }

    #[test]
    fn standalone_numeric_promotion() {
        let info = only_switch("class A { Object m(int i) { var d = switch (i) { case 1 -> 1.0; default -> 0; }; return d; } }");
        assert_eq!(info.result_type, Some(JType::Double));
        let info = only_switch("class A { void m(int i, short s) { var d = switch (i) { case 1 -> s; default -> 7; }; } }");
        assert_eq!(info.result_type, Some(JType::Short));
    }

    #[test]
    fn standalone_boxing_and_lub() {
        let info = only_switch(
            "class A { void m(int i) { var o = switch (i) { case 1 -> \"one\"; default -> Integer.valueOf(2); }; } }",
        );
        assert_eq!(info.result_type, Some(JType::object()));
        let info = only_switch("class A { void m(int i, Boolean b) { var o = switch (i) { case 1 -> true; default -> b; }; } }");
        assert_eq!(info.result_type, Some(JType::Boolean));
    }

    #[test]
    fn argument_position_takes_parameter_type() {
        let info = only_switch(
            "class A { static void take(Object o) {} void m(int i) { take(switch (i) { case 1 -> 1; default -> 2; }); } }",
        );
        assert_eq!(info.result_type, Some(JType::object()));
    }

    #[test]
    fn duplicate_enum_labels_reported_at_both() {
        let kinds = kinds(
            "enum E { A, B, C } class T { int m(E e) { return switch (e) { case A, B -> 1; case C, A -> 2; }; } }",
        );
        assert_eq!(kinds, vec![DiagnosticKind::DuplicateCase, DiagnosticKind::DuplicateCase]);
    }

    #[test]
    fn enum_expression_exhaustive_without_default() {
        let info = only_switch("enum E { A, B } class T { int m(E e) { return switch (e) { case A -> 1; case B -> 2; }; } }");
        assert!(info.exhaustive && !info.has_default);
        assert_eq!(info.selector_kind, SelectorKind::Enum("E".into()));
    }

    #[test]
    fn missing_default() {
        assert_eq!(
            kinds("class T { int m(int i) { return switch (i) { case 1 -> 1; }; } }"),
            vec![DiagnosticKind::SwitchExpressionNoDefault]
        );
        assert_eq!(
            kinds("enum E { A, B } class T { void m(E e) { switch (e) { case A: break; } } }"),
            vec![DiagnosticKind::MissingEnumConstant("B".into(), "E".into())]
        );
        assert_eq!(
            kinds("enum E { A, B } class T { int m(E e) { return switch (e) { case A -> 1; }; } }"),
            vec![DiagnosticKind::SwitchExpressionNotExhaustive]
        );
    }

    #[test]
    fn label_type_checks() {
        assert_eq!(
            kinds("class T { int m(int i) { return switch (i) { case 1, \"x\" -> 1; default -> 0; }; } }"),
            vec![DiagnosticKind::TypeMismatch("String".into(), "int".into())]
        );
        assert_eq!(
            kinds("enum E { A } class T { int m(E e) { return switch (e) { case E.A -> 1; default -> 0; }; } }"),
            vec![DiagnosticKind::QualifiedEnumLabel("E.A".into(), "A".into())]
        );
        assert_eq!(
            kinds("class T { int m(int i, int k) { return switch (i) { case k -> 1; default -> 0; }; } }"),
            vec![DiagnosticKind::NonConstantCase]
        );
    }

    #[test]
    fn selector_and_shape_errors() {
        assert_eq!(
            kinds("class T { int m(long l) { return switch (l) { default -> 0; }; } }"),
            vec![DiagnosticKind::IllegalSelectorType("long".into())]
        );
        assert_eq!(
            kinds("class T { int m(int i) { return switch (i) { }; } }"),
            vec![DiagnosticKind::EmptySwitchExpression, DiagnosticKind::SwitchExpressionNoDefault]
        );
        assert_eq!(
            kinds("class T { int m(int i) { return switch (i) { case 1 -> 1; default: yield 2; }; } }"),
            vec![DiagnosticKind::MixedCaseKinds]
        );
        assert_eq!(
            kinds("class T { void m(int i) { switch (i) { default: break; default: break; } } }"),
            vec![DiagnosticKind::DuplicateDefault]
        );
    }

    #[test]
    fn yield_skips_nested_statements() {
        let (_, attr, kinds) = attributed(
            "class T { int m(int i) { return switch (i) { default -> { switch (i) { default: yield 4; } } }; } }",
        );
        assert!(kinds.is_empty(), "{:?}", kinds);
        assert_eq!(attr.switches.len(), 2);
    }

    #[test]
    fn string_labels() {
        let (_, attr, kinds) =
            attributed("class T { int m(String s) { return switch (s) { case \"Aa\", \"BB\" -> 1; default -> 0; }; } }");
        assert!(kinds.is_empty(), "{:?}", kinds);
        assert_eq!(attr.case_labels.len(), 2);
    }

    #[test]
    fn literal_labels_are_constants() {
        assert!(kinds("class T { int m(int i) { return switch (i) { case 1 -> 10; case 2, 3 -> 20; default -> 0; }; } }").is_empty());
        assert!(kinds("class T { int m(char c) { switch (c) { case 'a': return 1; default: return 0; } } }").is_empty());
        let (_, attr, kinds) = attributed("class T { int m(String s) { switch (s) { case \"a\": return 1; default: return 0; } } }");
        assert!(kinds.is_empty(), "{:?}", kinds);
        assert_eq!(attr.case_labels.len(), 1);
    }
}
