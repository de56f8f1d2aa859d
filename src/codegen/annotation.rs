//! Annotation attributes.
//!
//! Declaration annotations become `Runtime(In)VisibleAnnotations` by
//! retention (`SOURCE` ones are dropped), parameter annotations the
//! `...ParameterAnnotations` pair and `TYPE_USE` annotations written on a
//! type the `...TypeAnnotations` pair.

use super::attribute::{
    AnnotationInfo, AttributeInfo, ElementValueInfo, NamedAttribute, TypeAnnotationInfo, TypeAnnotationTarget,
    Visibility,
};
use super::constpool::ConstantPool;
use super::error::{ClassGenerationError, CodeGenResult};
use super::gen::ClassContext;
use crate::ast::*;
use crate::review::annotations::{declaration_of, retention_of, targets_of, Retention, Targets};
use crate::wash::symtab::{coerce_constant, fold_constant};
use crate::wash::types::{ConstValue, JType};

fn visibility(retention: Retention) -> Option<Visibility> {
    match retention {
        Retention::Source => None,
        Retention::Class => Some(Visibility::Invisible),
        Retention::Runtime => Some(Visibility::Visible),
    }
}

fn annotation_class(cx: &ClassContext<'_>, ann: &Annotation) -> String {
    cx.table()
        .lookup_type_name(cx.unit, Some(cx.decl.id), &ann.name)
        .unwrap_or_else(|| ann.name.replace('.', "/"))
}

/// Declared type of element `name` when the annotation type is in the unit.
fn element_type(cx: &ClassContext<'_>, ann: &Annotation, name: &str) -> Option<JType> {
    let decl = declaration_of(cx.unit, ann)?;
    let method = decl.methods().find(|m| m.name == name)?;
    let scope = crate::wash::symtab::TypeScope { decl: Some(decl.id), method_tparams: &[] };
    cx.table().resolve_type_ref(cx.unit, scope, &method.return_type).ok()
}

fn const_tag(ty: &JType) -> u8 {
    match ty {
        JType::Boolean => b'Z',
        JType::Byte => b'B',
        JType::Char => b'C',
        JType::Short => b'S',
        JType::Int => b'I',
        JType::Long => b'J',
        JType::Float => b'F',
        JType::Double => b'D',
        _ => b's',
    }
}

fn unsupported(what: String) -> ClassGenerationError {
    ClassGenerationError::Unsupported { what }
}

pub(crate) fn encode(cx: &ClassContext<'_>, pool: &mut ConstantPool, ann: &Annotation) -> CodeGenResult<AnnotationInfo> {
    let class = annotation_class(cx, ann);
    let type_index = pool.try_add_utf8(&JType::Class(class).descriptor())?;
    let mut elements = Vec::new();
    for (name, value) in &ann.elements {
        let expected = element_type(cx, ann, name);
        let name_index = pool.try_add_utf8(name)?;
        elements.push((name_index, element_value(cx, pool, value, expected.as_ref())?));
    }
    Ok(AnnotationInfo { type_index, elements })
}

fn element_value(
    cx: &ClassContext<'_>,
    pool: &mut ConstantPool,
    value: &ElementValue,
    expected: Option<&JType>,
) -> CodeGenResult<ElementValueInfo> {
    match value {
        ElementValue::Annotation(a) => Ok(ElementValueInfo::Annotation(encode(cx, pool, a)?)),
        ElementValue::Array(values, _) => {
            let elem = expected.and_then(JType::element);
            let items = values.iter().map(|v| element_value(cx, pool, v, elem)).collect::<CodeGenResult<Vec<_>>>()?;
            Ok(ElementValueInfo::Array(items))
        }
        ElementValue::Expr(e) => {
            let info = expr_value(cx, pool, e, expected.map(|t| t.element().unwrap_or(t)))?;
            // a single value where an array is declared
            Ok(match expected {
                Some(JType::Array(_)) => ElementValueInfo::Array(vec![info]),
                _ => info,
            })
        }
    }
}

fn expr_value(
    cx: &ClassContext<'_>,
    pool: &mut ConstantPool,
    e: &Expr,
    expected: Option<&JType>,
) -> CodeGenResult<ElementValueInfo> {
    if let ExprKind::ClassLit(ty) = &e.kind {
        let t = cx.resolve(ty, &[]);
        let desc = if ty.is_void() { "V".to_string() } else { t.descriptor() };
        return Ok(ElementValueInfo::Class(pool.try_add_utf8(&desc)?));
    }
    if let Some((enum_type, constant)) = enum_constant(cx, e) {
        let type_name = pool.try_add_utf8(&JType::Class(enum_type).descriptor())?;
        let const_name = pool.try_add_utf8(&constant)?;
        return Ok(ElementValueInfo::Enum { type_name, const_name });
    }
    let names = |n: &Expr| static_constant(cx, n);
    let (ty, value) = fold_constant(e, &names).ok_or_else(|| unsupported(format!("annotation value at line {}", e.span.line())))?;
    let ty = expected.cloned().filter(|t| t.is_primitive() || t.is_string()).unwrap_or(ty);
    let value = coerce_constant(&value, &ty).unwrap_or(value);
    let index = match &value {
        ConstValue::Int(v) => pool.try_add_integer(*v)?,
        ConstValue::Bool(b) => pool.try_add_integer(i32::from(*b))?,
        ConstValue::Long(v) => pool.try_add_long(*v)?,
        ConstValue::Float(v) => pool.try_add_float(*v)?,
        ConstValue::Double(v) => pool.try_add_double(*v)?,
        ConstValue::Str(s) => pool.try_add_utf8(s)?,
    };
    Ok(ElementValueInfo::Const(const_tag(&ty), index))
}

/// `E.C` or `C` naming a constant of an enum.
fn enum_constant(cx: &ClassContext<'_>, e: &Expr) -> Option<(String, String)> {
    let (qualifier, name) = match &e.unparenthesized().kind {
        ExprKind::FieldAccess { target, name, .. } => match &target.kind {
            ExprKind::Name(q) => (q.as_str(), name.as_str()),
            _ => return None,
        },
        ExprKind::Name(n) => n.rsplit_once('.')?,
        _ => return None,
    };
    let class = cx.table().lookup_type_name(cx.unit, Some(cx.decl.id), qualifier)?;
    let is_enum_constant = match cx.table().get(&class) {
        Some(sym) => sym.enum_constants.iter().any(|c| c == name),
        // library enums such as ElementType are taken on trust
        None => name.chars().all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit()),
    };
    is_enum_constant.then(|| (class, name.to_string()))
}

fn static_constant(cx: &ClassContext<'_>, e: &Expr) -> Option<(JType, ConstValue)> {
    let (class, name) = match &e.kind {
        ExprKind::Name(n) => match n.rsplit_once('.') {
            Some((q, f)) => (cx.table().lookup_type_name(cx.unit, Some(cx.decl.id), q)?, f.to_string()),
            None => (cx.class.to_string(), n.clone()),
        },
        ExprKind::FieldAccess { target, name, .. } => match &target.kind {
            ExprKind::Name(q) => (cx.table().lookup_type_name(cx.unit, Some(cx.decl.id), q)?, name.clone()),
            _ => return None,
        },
        _ => return None,
    };
    let field = cx.table().find_field(&class, &name)?;
    field.constant.clone().map(|c| (field.ty.clone(), c))
}

/// Declaration annotations of a class, field or method.
pub(crate) fn declaration_attributes(
    cx: &ClassContext<'_>,
    pool: &mut ConstantPool,
    anns: &[Annotation],
) -> CodeGenResult<Vec<NamedAttribute>> {
    let mut visible = Vec::new();
    let mut invisible = Vec::new();
    for ann in anns {
        if !targets_of(cx.unit, ann).intersects(Targets::DECLARATION_CONTEXTS) {
            continue;
        }
        match visibility(retention_of(cx.unit, ann)) {
            Some(Visibility::Visible) => visible.push(encode(cx, pool, ann)?),
            Some(Visibility::Invisible) => invisible.push(encode(cx, pool, ann)?),
            None => {}
        }
    }
    let mut out = Vec::new();
    if !visible.is_empty() {
        out.push(NamedAttribute::new(pool, AttributeInfo::Annotations(Visibility::Visible, visible))?);
    }
    if !invisible.is_empty() {
        out.push(NamedAttribute::new(pool, AttributeInfo::Annotations(Visibility::Invisible, invisible))?);
    }
    Ok(out)
}

/// Parameter annotations, one list per parameter.
pub(crate) fn parameter_attributes(
    cx: &ClassContext<'_>,
    pool: &mut ConstantPool,
    params: &[Parameter],
) -> CodeGenResult<Vec<NamedAttribute>> {
    let mut out = Vec::new();
    for wanted in [Visibility::Visible, Visibility::Invisible] {
        let mut lists = Vec::with_capacity(params.len());
        let mut any = false;
        for p in params {
            let mut list = Vec::new();
            for ann in &p.annotations {
                if visibility(retention_of(cx.unit, ann)) == Some(wanted)
                    && targets_of(cx.unit, ann).intersects(Targets::PARAMETER)
                {
                    list.push(encode(cx, pool, ann)?);
                }
            }
            any |= !list.is_empty();
            lists.push(list);
        }
        if any {
            out.push(NamedAttribute::new(pool, AttributeInfo::ParameterAnnotations(wanted, lists))?);
        }
    }
    Ok(out)
}

/// `TYPE_USE` annotations written on the given types. An annotation on an
/// array type applies to its element type, reached through one array step
/// per dimension.
pub(crate) fn type_attributes(
    cx: &ClassContext<'_>,
    pool: &mut ConstantPool,
    uses: &[(TypeAnnotationTarget, &TypeRef)],
) -> CodeGenResult<Vec<NamedAttribute>> {
    let mut visible = Vec::new();
    let mut invisible = Vec::new();
    for (target, ty) in uses {
        for ann in &ty.annotations {
            if !targets_of(cx.unit, ann).contains(Targets::TYPE_USE) {
                continue;
            }
            let Some(vis) = visibility(retention_of(cx.unit, ann)) else { continue };
            let info = TypeAnnotationInfo {
                target: *target,
                path: vec![(0, 0); ty.array_dims],
                annotation: encode(cx, pool, ann)?,
            };
            match vis {
                Visibility::Visible => visible.push(info),
                Visibility::Invisible => invisible.push(info),
            }
        }
    }
    let mut out = Vec::new();
    if !visible.is_empty() {
        out.push(NamedAttribute::new(pool, AttributeInfo::TypeAnnotations(Visibility::Visible, visible))?);
    }
    if !invisible.is_empty() {
        out.push(NamedAttribute::new(pool, AttributeInfo::TypeAnnotations(Visibility::Invisible, invisible))?);
    }
    Ok(out)
}

/// `AnnotationDefault` of an annotation type element.
pub(crate) fn default_value(
    cx: &ClassContext<'_>,
    pool: &mut ConstantPool,
    method: &MethodDecl,
    value: &ElementValue,
) -> CodeGenResult<NamedAttribute> {
    let expected = cx.resolve(&method.return_type, &[]);
    let info = element_value(cx, pool, value, Some(&expected))?;
    Ok(NamedAttribute::new(pool, AttributeInfo::AnnotationDefault(info))?)
}
