//! Annotation targets and retention, as declared by `@Target` and
//! `@Retention` on annotation types of the unit or known for `java.lang`.

use std::ops::BitOr;

use crate::ast::*;
use crate::diagnostics::{DiagnosticKind, DiagnosticSink};

/// Set of `java.lang.annotation.ElementType` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Targets(u16);

impl Targets {
    pub const TYPE: Targets = Targets(1);
    pub const FIELD: Targets = Targets(1 << 1);
    pub const METHOD: Targets = Targets(1 << 2);
    pub const PARAMETER: Targets = Targets(1 << 3);
    pub const CONSTRUCTOR: Targets = Targets(1 << 4);
    pub const LOCAL_VARIABLE: Targets = Targets(1 << 5);
    pub const ANNOTATION_TYPE: Targets = Targets(1 << 6);
    pub const PACKAGE: Targets = Targets(1 << 7);
    pub const TYPE_PARAMETER: Targets = Targets(1 << 8);
    pub const TYPE_USE: Targets = Targets(1 << 9);
    pub const MODULE: Targets = Targets(1 << 10);
    pub const RECORD_COMPONENT: Targets = Targets(1 << 11);

    pub const NONE: Targets = Targets(0);

    /// Applicability of an annotation type without `@Target`.
    pub const DECLARATION_CONTEXTS: Targets = Targets(
        Self::TYPE.0
            | Self::FIELD.0
            | Self::METHOD.0
            | Self::PARAMETER.0
            | Self::CONSTRUCTOR.0
            | Self::LOCAL_VARIABLE.0
            | Self::ANNOTATION_TYPE.0
            | Self::PACKAGE.0
            | Self::TYPE_PARAMETER.0
            | Self::MODULE.0
            | Self::RECORD_COMPONENT.0,
    );

    /// Targets through which an annotation on a record component reaches a
    /// generated member.
    pub const COMPONENT_CONTEXTS: Targets = Targets(
        Self::FIELD.0 | Self::METHOD.0 | Self::PARAMETER.0 | Self::RECORD_COMPONENT.0 | Self::TYPE_USE.0,
    );

    pub fn from_element_type(name: &str) -> Option<Targets> {
        let t = match name {
            "TYPE" => Self::TYPE,
            "FIELD" => Self::FIELD,
            "METHOD" => Self::METHOD,
            "PARAMETER" => Self::PARAMETER,
            "CONSTRUCTOR" => Self::CONSTRUCTOR,
            "LOCAL_VARIABLE" => Self::LOCAL_VARIABLE,
            "ANNOTATION_TYPE" => Self::ANNOTATION_TYPE,
            "PACKAGE" => Self::PACKAGE,
            "TYPE_PARAMETER" => Self::TYPE_PARAMETER,
            "TYPE_USE" => Self::TYPE_USE,
            "MODULE" => Self::MODULE,
            "RECORD_COMPONENT" => Self::RECORD_COMPONENT,
            _ => return None,
        };
        Some(t)
    }

    pub fn contains(self, other: Targets) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn intersects(self, other: Targets) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for Targets {
    type Output = Targets;

    fn bitor(self, rhs: Targets) -> Targets {
        Targets(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Retention {
    Source,
    Class,
    Runtime,
}

fn builtin_targets(name: &str) -> Option<Targets> {
    let t = match name {
        "Deprecated" => {
            Targets::CONSTRUCTOR
                | Targets::FIELD
                | Targets::LOCAL_VARIABLE
                | Targets::METHOD
                | Targets::PACKAGE
                | Targets::MODULE
                | Targets::PARAMETER
                | Targets::TYPE
        }
        "SafeVarargs" => Targets::CONSTRUCTOR | Targets::METHOD,
        "Override" => Targets::METHOD,
        "FunctionalInterface" => Targets::TYPE,
        "SuppressWarnings" => {
            Targets::TYPE
                | Targets::FIELD
                | Targets::METHOD
                | Targets::PARAMETER
                | Targets::CONSTRUCTOR
                | Targets::LOCAL_VARIABLE
                | Targets::MODULE
        }
        "Target" | "Retention" | "Documented" | "Inherited" => Targets::ANNOTATION_TYPE,
        _ => return None,
    };
    Some(t)
}

fn builtin_retention(name: &str) -> Option<Retention> {
    match name {
        "Deprecated" | "SafeVarargs" | "FunctionalInterface" | "Target" | "Retention" | "Documented" => {
            Some(Retention::Runtime)
        }
        "Override" | "SuppressWarnings" => Some(Retention::Source),
        _ => None,
    }
}

/// Annotation type declared in this unit under the annotation's simple name.
pub fn declaration_of<'u>(unit: &'u CompilationUnit, ann: &Annotation) -> Option<&'u TypeDecl> {
    let simple = ann.simple_name();
    unit.decls.iter().find(|d| d.kind == TypeKind::Annotation && d.name == simple)
}

fn meta_value<'a>(decl: &'a TypeDecl, meta: &str) -> Option<&'a ElementValue> {
    decl.annotations
        .iter()
        .find(|a| a.simple_name() == meta)
        .and_then(|a| a.elements.iter().find(|(k, _)| k == "value").map(|(_, v)| v))
}

/// Last segment of `ElementType.FIELD` or `FIELD`.
fn constant_name(expr: &Expr) -> Option<&str> {
    match &expr.unparenthesized().kind {
        ExprKind::Name(n) => n.rsplit('.').next(),
        ExprKind::FieldAccess { name, .. } => Some(name),
        _ => None,
    }
}

pub fn targets_of(unit: &CompilationUnit, ann: &Annotation) -> Targets {
    if let Some(decl) = declaration_of(unit, ann) {
        return match meta_value(decl, "Target") {
            Some(value) => element_targets(value),
            None => Targets::DECLARATION_CONTEXTS,
        };
    }
    builtin_targets(ann.simple_name()).unwrap_or(Targets::DECLARATION_CONTEXTS)
}

fn element_targets(value: &ElementValue) -> Targets {
    match value {
        ElementValue::Expr(e) => constant_name(e).and_then(Targets::from_element_type).unwrap_or(Targets::NONE),
        ElementValue::Array(values, _) => values.iter().fold(Targets::NONE, |acc, v| acc | element_targets(v)),
        ElementValue::Annotation(_) => Targets::NONE,
    }
}

pub fn retention_of(unit: &CompilationUnit, ann: &Annotation) -> Retention {
    if let Some(decl) = declaration_of(unit, ann) {
        return match meta_value(decl, "Retention") {
            Some(ElementValue::Expr(e)) => match constant_name(e) {
                Some("RUNTIME") => Retention::Runtime,
                Some("SOURCE") => Retention::Source,
                _ => Retention::Class,
            },
            _ => Retention::Class,
        };
    }
    builtin_retention(ann.simple_name()).unwrap_or(Retention::Class)
}

/// Annotations of `anns` applicable through any of `wanted`.
pub fn select(unit: &CompilationUnit, anns: &[Annotation], wanted: Targets) -> Vec<Annotation> {
    anns.iter().filter(|a| targets_of(unit, a).intersects(wanted)).cloned().collect()
}

/// Reports component annotations that apply to none of the generated members.
pub(crate) fn review_component_annotations(unit: &CompilationUnit, decl: &TypeDecl, sink: &mut DiagnosticSink) {
    for c in &decl.components {
        for ann in c.annotations.iter().chain(&c.ty.annotations) {
            if !targets_of(unit, ann).intersects(Targets::COMPONENT_CONTEXTS) {
                log::trace!("annotation @{} disallowed on component {}", ann.name, c.name);
                sink.report(DiagnosticKind::AnnotationDisallowed(ann.simple_name().to_string()), ann.span);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn unit(src: &str) -> CompilationUnit {
        let mut sink = DiagnosticSink::new();
        let unit = parse(src, &mut sink);
        assert!(sink.is_empty());
        unit
    }

    #[test]
    fn target_lists_are_read_from_the_unit() {
        let u = unit(
            "import java.lang.annotation.*;\n\
             @Target({ElementType.FIELD, ElementType.TYPE_USE}) @Retention(RetentionPolicy.RUNTIME) @interface A {}\n\
             @interface B {}\n\
             record R(@A @B @FunctionalInterface int x) {}",
        );
        let r = u.decls.iter().find(|d| d.is_record()).unwrap();
        let anns = &r.components[0].annotations;
        let a = targets_of(&u, &anns[0]);
        assert!(a.contains(Targets::FIELD) && a.contains(Targets::TYPE_USE));
        assert!(!a.contains(Targets::METHOD));
        assert_eq!(retention_of(&u, &anns[0]), Retention::Runtime);
        assert!(targets_of(&u, &anns[1]).contains(Targets::RECORD_COMPONENT));
        assert_eq!(retention_of(&u, &anns[1]), Retention::Class);

        let mut sink = DiagnosticSink::new();
        review_component_annotations(&u, r, &mut sink);
        let kinds: Vec<_> = sink.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(kinds, vec![DiagnosticKind::AnnotationDisallowed("FunctionalInterface".into())]);
    }

    #[test]
    fn builtin_retention() {
        let u = unit("class A { @Override public String toString() { return \"\"; } @Deprecated void m() {} }");
        let decl = u.decls.top_level().next().unwrap();
        let mut methods = decl.methods();
        let over = &methods.next().unwrap().annotations[0];
        let dep = &methods.next().unwrap().annotations[0];
        assert_eq!(retention_of(&u, over), Retention::Source);
        assert_eq!(retention_of(&u, dep), Retention::Runtime);
    }
}
