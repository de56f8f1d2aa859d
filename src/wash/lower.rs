//! Lower phase: members the language adds to a declaration.
//!
//! Records get their backing fields, canonical constructor (implicit, or the
//! trailing assignments of a compact one), accessors and the
//! `equals`/`hashCode`/`toString` members bound to `ObjectMethods`. Classes
//! and enums without a constructor get a default one. Component annotations
//! are copied onto each generated member according to their `@Target`.

use std::collections::HashSet;

use crate::ast::*;
use crate::review::annotations::{select, Targets};

/// Adds implicit members to every declaration not listed in `skip`.
pub fn lower_unit(unit: &mut CompilationUnit, skip: &HashSet<DeclId>) {
    let ids: Vec<DeclId> = unit.decls.ids().filter(|id| !skip.contains(id)).collect();
    for id in ids {
        match unit.decls[id].kind {
            TypeKind::Record => synthesize_record(unit, id),
            TypeKind::Class | TypeKind::Enum => add_default_constructor(unit, id),
            TypeKind::Interface | TypeKind::Annotation => {}
        }
    }
}

/// Per-component annotations split by the member they land on.
struct Retargeted {
    field: Vec<Annotation>,
    accessor: Vec<Annotation>,
    param: Vec<Annotation>,
    type_use: Vec<Annotation>,
}

fn retarget(unit: &CompilationUnit, c: &RecordComponent) -> Retargeted {
    let anns: Vec<Annotation> = c.annotations.iter().chain(&c.ty.annotations).cloned().collect();
    Retargeted {
        field: select(unit, &anns, Targets::FIELD),
        accessor: select(unit, &anns, Targets::METHOD),
        param: select(unit, &anns, Targets::PARAMETER),
        type_use: select(unit, &anns, Targets::TYPE_USE),
    }
}

fn typed(c: &RecordComponent, type_use: &[Annotation]) -> TypeRef {
    let mut ty = c.effective_type();
    ty.annotations = type_use.to_vec();
    ty
}

fn this_field(unit: &mut CompilationUnit, name: &str, span: Span) -> Expr {
    let this = Expr::new(unit.fresh_expr_id(), ExprKind::This, span);
    Expr::new(
        unit.fresh_expr_id(),
        ExprKind::FieldAccess { target: Box::new(this), name: name.to_string(), name_span: span },
        span,
    )
}

/// `this.name = name;`
fn assign_from_param(unit: &mut CompilationUnit, name: &str, span: Span) -> Stmt {
    let target = this_field(unit, name, span);
    let value = Expr::new(unit.fresh_expr_id(), ExprKind::Name(name.to_string()), span);
    let assign = Expr::new(
        unit.fresh_expr_id(),
        ExprKind::Assign { op: None, target: Box::new(target), value: Box::new(value) },
        span,
    );
    Stmt::Expression(ExprStmt { expr: assign, span })
}

fn component_params(c: &[RecordComponent], anns: &[Retargeted]) -> Vec<Parameter> {
    c.iter()
        .zip(anns)
        .map(|(c, a)| {
            let mut ty = c.ty.clone();
            ty.annotations = a.type_use.clone();
            Parameter {
                annotations: a.param.clone(),
                modifiers: Modifiers::default(),
                ty,
                varargs: c.varargs,
                name: c.name.clone(),
                name_span: c.name_span,
                extra_dims: c.extra_dims,
                span: c.span,
            }
        })
        .collect()
}

/// Same erased shape as written: simple name, type arguments and dimensions.
pub(crate) fn same_type(a: &TypeRef, b: &TypeRef) -> bool {
    let simple = |t: &TypeRef| t.name.rsplit('.').next().map(str::to_string).unwrap_or_default();
    a.array_dims == b.array_dims
        && simple(a) == simple(b)
        && a.type_args.len() == b.type_args.len()
        && a.type_args.iter().zip(&b.type_args).all(|(x, y)| same_type(x, y))
}

/// Whether `ctor` has the canonical signature of `decl`.
pub(crate) fn is_canonical(decl: &TypeDecl, ctor: &ConstructorDecl) -> bool {
    ctor.compact
        || (ctor.params.len() == decl.components.len()
            && ctor.params.iter().zip(&decl.components).all(|(p, c)| same_type(&p.effective_type(), &c.effective_type())))
}

fn synthesize_record(unit: &mut CompilationUnit, id: DeclId) {
    let decl = &unit.decls[id];
    let components = decl.components.clone();
    let visibility = decl.modifiers.visibility();
    let record_name = decl.name.clone();
    let span = decl.name_span;
    let anns: Vec<Retargeted> = components.iter().map(|c| retarget(unit, c)).collect();
    let canonical = decl
        .members
        .iter()
        .position(|m| matches!(m, Member::Constructor(c) if is_canonical(decl, c)));
    let missing_accessors: Vec<usize> = components
        .iter()
        .enumerate()
        .filter(|(_, c)| !decl.has_user_method(&c.name, 0))
        .map(|(i, _)| i)
        .collect();
    let missing_object_methods: Vec<ObjectMethodKind> =
        [ObjectMethodKind::ToString, ObjectMethodKind::HashCode, ObjectMethodKind::Equals]
            .into_iter()
            .filter(|k| !decl.has_user_method(k.name(), usize::from(*k == ObjectMethodKind::Equals)))
            .collect();

    let mut fields = Vec::new();
    for (c, a) in components.iter().zip(&anns) {
        let mut modifiers = Modifiers::default();
        modifiers.push(Modifier::Private, c.span);
        modifiers.push(Modifier::Final, c.span);
        fields.push(Member::Field(FieldDecl {
            modifiers,
            annotations: a.field.clone(),
            ty: typed(c, &a.type_use),
            declarators: vec![VarDeclarator {
                name: c.name.clone(),
                name_span: c.name_span,
                extra_dims: 0,
                init: None,
                span: c.span,
            }],
            origin: Origin::Synthesized,
            span: c.span,
        }));
    }

    let assignments: Vec<Stmt> = components.iter().map(|c| assign_from_param(unit, &c.name, c.name_span)).collect();
    let mut new_ctor = None;
    match canonical {
        Some(index) => {
            if let Member::Constructor(ctor) = &mut unit.decls[id].members[index] {
                if ctor.compact {
                    ctor.params = component_params(&components, &anns);
                    ctor.body.stmts.extend(assignments);
                }
            }
        }
        None => {
            log::trace!("implicit canonical constructor for record {}", record_name);
            new_ctor = Some(Member::Constructor(ConstructorDecl {
                modifiers: Modifiers::of_visibility(visibility, span),
                annotations: Vec::new(),
                type_params: Vec::new(),
                name: record_name.clone(),
                name_span: span,
                params: component_params(&components, &anns),
                compact: false,
                throws: Vec::new(),
                body: Block { stmts: assignments, span },
                origin: Origin::Mandated,
                span,
            }));
        }
    }

    let mut methods = Vec::new();
    for i in missing_accessors {
        let c = &components[i];
        let value = this_field(unit, &c.name, c.name_span);
        let ret = Stmt::Return(ReturnStmt { value: Some(value), span: c.name_span });
        methods.push(Member::Method(MethodDecl {
            modifiers: Modifiers::of_visibility(Visibility::Public, c.span),
            annotations: anns[i].accessor.clone(),
            type_params: Vec::new(),
            return_type: typed(c, &anns[i].type_use),
            name: c.name.clone(),
            name_span: c.name_span,
            params: Vec::new(),
            throws: Vec::new(),
            body: Some(Block { stmts: vec![ret], span: c.span }),
            default_value: None,
            origin: Origin::Synthesized,
            object_method: None,
            span: c.span,
        }));
    }
    for kind in missing_object_methods {
        methods.push(Member::Method(object_method(kind, span)));
    }

    let decl = &mut unit.decls[id];
    let mut members = fields;
    members.append(&mut decl.members);
    members.extend(new_ctor);
    members.extend(methods);
    decl.members = members;
    log::debug!("lowered record {}: {} member(s)", record_name, decl.members.len());
}

fn object_method(kind: ObjectMethodKind, span: Span) -> MethodDecl {
    let mut modifiers = Modifiers::of_visibility(Visibility::Public, span);
    modifiers.push(Modifier::Final, span);
    let (ret, params) = match kind {
        ObjectMethodKind::ToString => ("String", Vec::new()),
        ObjectMethodKind::HashCode => ("int", Vec::new()),
        ObjectMethodKind::Equals => (
            "boolean",
            vec![Parameter {
                annotations: Vec::new(),
                modifiers: Modifiers::default(),
                ty: TypeRef::named("Object", span),
                varargs: false,
                name: "o".into(),
                name_span: span,
                extra_dims: 0,
                span,
            }],
        ),
    };
    MethodDecl {
        modifiers,
        annotations: Vec::new(),
        type_params: Vec::new(),
        return_type: TypeRef::named(ret, span),
        name: kind.name().to_string(),
        name_span: span,
        params,
        throws: Vec::new(),
        body: None,
        default_value: None,
        origin: Origin::Synthesized,
        object_method: Some(kind),
        span,
    }
}

fn add_default_constructor(unit: &mut CompilationUnit, id: DeclId) {
    let decl = &mut unit.decls[id];
    if decl.constructors().next().is_some() {
        return;
    }
    let span = decl.name_span;
    let visibility = if decl.kind == TypeKind::Enum { Visibility::Private } else { decl.modifiers.visibility() };
    decl.members.push(Member::Constructor(ConstructorDecl {
        modifiers: Modifiers::of_visibility(visibility, span),
        annotations: Vec::new(),
        type_params: Vec::new(),
        name: decl.name.clone(),
        name_span: span,
        params: Vec::new(),
        compact: false,
        throws: Vec::new(),
        body: Block { stmts: Vec::new(), span },
        origin: Origin::Synthesized,
        span,
    }));
}
