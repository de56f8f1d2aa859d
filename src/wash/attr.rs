//! Attr phase: name resolution, type checking and constant folding.
//!
//! Results are side tables keyed by [`ExprId`], so the tree stays
//! immutable after lowering. Switch expressions are typed here (see
//! [`super::attr_switch`]); control-flow rules are left to
//! [`super::flow`].

use std::collections::{HashMap, HashSet};

use super::symtab::{fold_constant, ClassKind, ClassTable, MethodLookup, MethodSym, TypeScope};
use super::types::{binary_promotion, ConstValue, JType};
use crate::ast::*;
use crate::consts::{JAVA_LANG_OBJECT, JAVA_LANG_THROWABLE};
use crate::diagnostics::{DiagnosticKind, DiagnosticSink};

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
    pub ty: JType,
    pub is_static: bool,
    pub is_final: bool,
}

/// What a name or field access denotes.
#[derive(Debug, Clone, PartialEq)]
pub enum NameRes {
    Local(JType),
    Field(FieldRef),
    /// A type used as a qualifier, by internal name.
    Type(String),
    ArrayLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Static,
    Virtual,
    Interface,
    Special,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    pub params: Vec<JType>,
    pub ret: JType,
    pub kind: InvokeKind,
    /// Owner is an interface (for the constant pool entry kind).
    pub interface: bool,
    /// Trailing arguments are packed into the varargs array.
    pub pack_varargs: bool,
}

impl MethodRef {
    pub fn descriptor(&self) -> String {
        super::types::method_descriptor(&self.params, &self.ret)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorKind {
    /// byte, short, char or int (boxes included), after unboxing.
    Int(JType),
    String,
    /// Enum by internal name.
    Enum(String),
    /// The selector did not type check.
    Invalid,
}

/// Verdict of the analyzer for one switch, keyed by the selector's id.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchInfo {
    /// Result type of a switch expression; `None` for statements.
    pub result_type: Option<JType>,
    pub selector_type: JType,
    pub selector_kind: SelectorKind,
    pub has_default: bool,
    pub exhaustive: bool,
    /// An error was reported inside this switch.
    pub erroneous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CaseValue {
    Int(i32),
    Str(String),
    EnumConst { name: String, ordinal: i32 },
}

/// An enclosing local read inside a lambda body.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub name: String,
    pub ty: JType,
}

/// Verdict for one lambda expression.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaInfo {
    /// Functional interface, by internal name.
    pub interface: String,
    /// Its single abstract method.
    pub method: MethodRef,
    /// In order of first use.
    pub captures: Vec<Capture>,
    /// The body uses `this`, `super` or an instance member.
    pub captures_this: bool,
}

/// Side tables produced by attribution.
#[derive(Debug, Default)]
pub struct Attribution {
    pub types: HashMap<ExprId, JType>,
    pub names: HashMap<ExprId, NameRes>,
    pub calls: HashMap<ExprId, MethodRef>,
    /// Constructors of `new` expressions and explicit constructor calls.
    pub ctors: HashMap<ExprId, MethodRef>,
    /// Constructors of enum constants, by declaration and constant index.
    pub enum_ctors: HashMap<(DeclId, usize), MethodRef>,
    pub switches: HashMap<ExprId, SwitchInfo>,
    pub case_labels: HashMap<ExprId, CaseValue>,
    pub constants: HashMap<ExprId, ConstValue>,
    /// Types of locals and parameters, by offset of the declaring name.
    pub local_types: HashMap<usize, JType>,
    /// Type operand of `instanceof` and class literals.
    pub type_operands: HashMap<ExprId, JType>,
    pub lambdas: HashMap<ExprId, LambdaInfo>,
}

impl Attribution {
    pub fn type_of(&self, id: ExprId) -> JType {
        self.types.get(&id).cloned().unwrap_or(JType::Error)
    }

    pub fn constant(&self, id: ExprId) -> Option<&ConstValue> {
        self.constants.get(&id)
    }

    pub fn local_type(&self, name_span: Span) -> JType {
        self.local_types.get(&name_span.start.offset).cloned().unwrap_or(JType::Error)
    }
}

#[derive(Debug, Clone)]
pub(super) struct Local {
    pub(super) name: String,
    pub(super) ty: JType,
    pub(super) constant: Option<ConstValue>,
    /// Offset of the declaring name.
    pub(super) offset: usize,
}

/// A lambda body being attributed; scopes from `base` up belong to it.
#[derive(Debug, Default)]
struct LambdaFrame {
    base: usize,
    captures: Vec<Capture>,
    captures_this: bool,
}

/// Arms collected for the innermost switch expression.
#[derive(Debug, Default)]
pub(super) struct SwitchFrame {
    pub(super) expected: Option<JType>,
    pub(super) arms: Vec<(ExprId, Span, JType)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Method,
    Constructor,
    StaticInit,
    InstanceInit,
}

pub(super) struct Attr<'a> {
    pub(super) unit: &'a CompilationUnit,
    pub(super) table: &'a ClassTable,
    pub(super) sink: &'a mut DiagnosticSink,
    pub(super) out: Attribution,
    decl: DeclId,
    class: String,
    is_static: bool,
    body: BodyKind,
    return_type: JType,
    tparams: Vec<TypeParam>,
    pub(super) scopes: Vec<Vec<Local>>,
    pub(super) frames: Vec<SwitchFrame>,
    lambdas: Vec<LambdaFrame>,
    /// Assignments after the declaration, by local offset.
    writes: HashMap<usize, usize>,
    /// Locals declared without an initializer.
    blank_locals: HashSet<usize>,
    /// Locals read from a lambda body, with the first such use.
    captured: Vec<(usize, String, Span)>,
}

/// Attributes every declaration of `unit` not listed in `skip`.
pub fn attribute(
    unit: &CompilationUnit,
    table: &ClassTable,
    skip: &HashSet<DeclId>,
    sink: &mut DiagnosticSink,
) -> Attribution {
    let mut attr = Attr {
        unit,
        table,
        sink,
        out: Attribution::default(),
        decl: DeclId(0),
        class: String::new(),
        is_static: true,
        body: BodyKind::Method,
        return_type: JType::Void,
        tparams: Vec::new(),
        scopes: Vec::new(),
        frames: Vec::new(),
        lambdas: Vec::new(),
        writes: HashMap::new(),
        blank_locals: HashSet::new(),
        captured: Vec::new(),
    };
    for id in unit.decls.ids().filter(|id| !skip.contains(id)) {
        attr.attribute_decl(id);
    }
    attr.check_captures();
    log::debug!(
        "attr: {} typed expression(s), {} switch(es)",
        attr.out.types.len(),
        attr.out.switches.len()
    );
    attr.out
}

fn arg_list(types: &[JType]) -> String {
    types.iter().map(JType::java_name).collect::<Vec<_>>().join(", ")
}

impl<'a> Attr<'a> {
    // ----- reporting and scopes -----

    pub(super) fn report(&mut self, kind: DiagnosticKind, span: Span) {
        self.sink.report(kind, span);
    }

    fn mismatch(&mut self, from: &JType, to: &JType, span: Span) {
        if !from.is_error() && !to.is_error() {
            self.report(DiagnosticKind::TypeMismatch(from.java_name(), to.java_name()), span);
        }
    }

    /// Reports unless `e` (already attributed as `ty`) converts to `to` by
    /// assignment conversion.
    pub(super) fn check_assignable(&mut self, e: &Expr, ty: &JType, to: &JType) {
        if !self.table.is_assignable(ty, to, self.out.constants.get(&e.id)) {
            self.mismatch(ty, to, e.span);
        }
    }

    fn scope(&self) -> TypeScope<'_> {
        TypeScope { decl: Some(self.decl), method_tparams: &self.tparams }
    }

    pub(super) fn resolve_type(&mut self, t: &TypeRef) -> JType {
        match self.table.resolve_type_ref(self.unit, self.scope(), t) {
            Ok(ty) => ty,
            Err(name) => {
                self.report(DiagnosticKind::UnknownType(name), t.span);
                JType::Error
            }
        }
    }

    fn resolve_silently(&self, t: &TypeRef) -> JType {
        self.table.resolve_type_ref(self.unit, self.scope(), t).unwrap_or(JType::Error)
    }

    pub(super) fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub(super) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn find_local(&self, name: &str) -> Option<&Local> {
        self.find_local_at(name).map(|(_, l)| l)
    }

    /// The local `name` with the index of its scope.
    fn find_local_at(&self, name: &str) -> Option<(usize, &Local)> {
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, s)| s.iter().rev().find(|l| l.name == name).map(|l| (i, l)))
    }

    pub(super) fn declare_local(&mut self, name: &str, name_span: Span, ty: JType, constant: Option<ConstValue>) {
        if self.find_local(name).is_some() {
            self.report(DiagnosticKind::DuplicateLocal(name.to_string()), name_span);
        }
        self.out.local_types.insert(name_span.start.offset, ty.clone());
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(Local { name: name.to_string(), ty, constant, offset: name_span.start.offset });
        }
    }

    fn set(&mut self, e: &Expr, ty: JType) -> JType {
        self.out.types.insert(e.id, ty.clone());
        ty
    }

    fn fold(&mut self, e: &Expr) {
        let out = &self.out;
        let lookup = |sub: &Expr| -> Option<(JType, ConstValue)> {
            let c = out.constants.get(&sub.id)?;
            Some((out.types.get(&sub.id)?.clone(), c.clone()))
        };
        if let Some((_, v)) = fold_constant(e, &lookup) {
            self.out.constants.insert(e.id, v);
        }
    }

    // ----- declarations -----

    fn enter_body(&mut self, kind: BodyKind, is_static: bool, return_type: JType, tparams: Vec<TypeParam>) {
        self.body = kind;
        self.is_static = is_static;
        self.return_type = return_type;
        self.tparams = tparams;
        self.scopes = vec![Vec::new()];
        self.frames.clear();
        self.lambdas.clear();
    }

    fn attribute_decl(&mut self, id: DeclId) {
        let unit = self.unit;
        let decl = &unit.decls[id];
        self.decl = id;
        self.class = unit.binary_name(id);
        self.tparams = Vec::new();
        log::trace!("attr {}", self.class);

        for c in &decl.components {
            self.resolve_type(&c.effective_type());
        }
        if let Some(ext) = &decl.extends {
            self.resolve_type(ext);
        }
        for t in &decl.implements {
            self.resolve_type(t);
        }

        let interface = decl.is_interface_like();
        for (index, constant) in decl.enum_constants.iter().enumerate() {
            self.enter_body(BodyKind::StaticInit, true, JType::Void, Vec::new());
            let args = self.call_args(&constant.args);
            match self.table.resolve_ctor(&self.class, &args) {
                Some(m) => {
                    let r = self.method_ref(&m, InvokeKind::Special, &args);
                    self.retarget_args(&constant.args, &r);
                    self.out.enum_ctors.insert((id, index), r);
                }
                None if args.iter().any(JType::is_error) => {}
                None => self.report(
                    DiagnosticKind::UnknownConstructor(decl.name.clone(), arg_list(&args)),
                    constant.name_span,
                ),
            }
        }

        for member in &decl.members {
            match member {
                Member::Field(f) => {
                    let is_static = interface || f.modifiers.has(Modifier::Static);
                    for d in &f.declarators {
                        let ty_ref = f.ty.with_extra_dims(d.extra_dims);
                        let ty = if f.origin == Origin::Source {
                            self.resolve_type(&ty_ref)
                        } else {
                            self.resolve_silently(&ty_ref)
                        };
                        if let Some(init) = &d.init {
                            let kind = if is_static { BodyKind::StaticInit } else { BodyKind::InstanceInit };
                            self.enter_body(kind, is_static, JType::Void, Vec::new());
                            let t = self.expr(init, Some(&ty));
                            self.check_assignable(init, &t, &ty);
                        }
                    }
                }
                Member::Method(m) => self.attribute_method(m),
                Member::Constructor(c) => self.attribute_ctor(decl, c),
                Member::Initializer(init) => {
                    let kind = if init.is_static { BodyKind::StaticInit } else { BodyKind::InstanceInit };
                    self.enter_body(kind, init.is_static, JType::Void, Vec::new());
                    self.block(&init.body);
                }
            }
        }
    }

    fn declare_params(&mut self, params: &[Parameter], report: bool) {
        for p in params {
            let t = p.effective_type();
            let ty = if report { self.resolve_type(&t) } else { self.resolve_silently(&t) };
            self.declare_local(&p.name, p.name_span, ty, None);
        }
    }

    fn attribute_method(&mut self, m: &MethodDecl) {
        let report = m.origin == Origin::Source;
        let tparams = m.type_params.clone();
        self.tparams = tparams.clone();
        let ret = if report { self.resolve_type(&m.return_type) } else { self.resolve_silently(&m.return_type) };
        self.enter_body(BodyKind::Method, m.is_static(), ret, tparams);
        self.declare_params(&m.params, report);
        for t in &m.throws {
            self.resolve_type(t);
        }
        if let Some(body) = &m.body {
            self.block(body);
        }
    }

    fn attribute_ctor(&mut self, decl: &TypeDecl, c: &ConstructorDecl) {
        let tparams = c.type_params.clone();
        self.tparams = tparams.clone();
        self.enter_body(BodyKind::Constructor, false, JType::Void, tparams);
        self.declare_params(&c.params, c.origin == Origin::Source && !c.compact);
        for t in &c.throws {
            self.resolve_type(t);
        }
        if c.explicit_call().is_none() && decl.kind == TypeKind::Class {
            self.check_implicit_super(c);
        }
        self.block(&c.body);
    }

    fn check_implicit_super(&mut self, c: &ConstructorDecl) {
        let Some(sup) = self.table.get(&self.class).and_then(|s| s.super_class.clone()) else { return };
        if self.table.get(&sup).is_some() && self.table.resolve_ctor(&sup, &[]).is_none() {
            let simple = JType::class(&sup).java_name();
            self.report(DiagnosticKind::UnknownConstructor(simple, String::new()), c.name_span);
        }
    }

    // ----- statements -----

    pub(super) fn block(&mut self, b: &Block) {
        self.push_scope();
        for s in &b.stmts {
            self.stmt(s);
        }
        self.pop_scope();
    }

    fn condition(&mut self, e: &Expr) {
        let t = self.expr(e, Some(&JType::Boolean));
        if t.unboxed_or_self() != JType::Boolean {
            self.mismatch(&t, &JType::Boolean, e.span);
        }
    }

    pub(super) fn stmt(&mut self, s: &Stmt) {
        match s {
            Stmt::LocalVar(v) => self.local_var(v),
            Stmt::Expression(es) => {
                self.expr(&es.expr, None);
            }
            Stmt::Block(b) => self.block(b),
            Stmt::If(i) => {
                self.condition(&i.cond);
                self.nested_stmt(&i.then_branch);
                if let Some(e) = &i.else_branch {
                    self.nested_stmt(e);
                }
            }
            Stmt::While(w) => {
                self.condition(&w.cond);
                self.nested_stmt(&w.body);
            }
            Stmt::DoWhile(d) => {
                self.nested_stmt(&d.body);
                self.condition(&d.cond);
            }
            Stmt::For(f) => {
                self.push_scope();
                for s in &f.init {
                    self.stmt(s);
                }
                if let Some(c) = &f.cond {
                    self.condition(c);
                }
                for u in &f.update {
                    self.expr(u, None);
                }
                self.nested_stmt(&f.body);
                self.pop_scope();
            }
            Stmt::Labeled(l) => self.stmt(&l.body),
            Stmt::Return(r) => self.return_stmt(r),
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty(_) => {}
            Stmt::Yield(y) => self.yield_stmt(y),
            Stmt::Throw(t) => self.throw_expr(&t.expr),
            Stmt::Try(t) => {
                self.block(&t.body);
                for c in &t.catches {
                    self.push_scope();
                    let types: Vec<JType> = c.types.iter().map(|t| self.resolve_type(t)).collect();
                    for (t, r) in types.iter().zip(&c.types) {
                        if !t.is_error() && !self.table.is_subtype(t, &JType::class(JAVA_LANG_THROWABLE)) {
                            self.mismatch(t, &JType::class(JAVA_LANG_THROWABLE), r.span);
                        }
                    }
                    let ty = if types.len() == 1 { types[0].clone() } else { self.table.lub(&types) };
                    self.declare_local(&c.name, c.name_span, ty, None);
                    self.block(&c.body);
                    self.pop_scope();
                }
                if let Some(f) = &t.finally {
                    self.block(f);
                }
            }
            Stmt::Synchronized(s) => {
                let t = self.expr(&s.lock, None);
                if t.is_primitive() {
                    self.mismatch(&t, &JType::object(), s.lock.span);
                }
                self.block(&s.body);
            }
            Stmt::Switch(sw) => self.switch_stmt(sw),
            Stmt::ExplicitCtorCall(call) => self.explicit_ctor_call(call),
        }
    }

    /// Statement in its own scope (a branch or loop body).
    fn nested_stmt(&mut self, s: &Stmt) {
        self.push_scope();
        self.stmt(s);
        self.pop_scope();
    }

    pub(super) fn throw_expr(&mut self, e: &Expr) {
        let t = self.expr(e, None);
        let throwable = JType::class(JAVA_LANG_THROWABLE);
        if !t.is_error() && !self.table.is_subtype(&t, &throwable) {
            self.mismatch(&t, &throwable, e.span);
        }
    }

    fn local_var(&mut self, v: &LocalVarStmt) {
        let is_final = v.modifiers.has(Modifier::Final);
        let inferred = v.ty.name == "var" && v.ty.array_dims == 0 && self.resolve_silently(&v.ty).is_error();
        for d in &v.declarators {
            let declared = if inferred { None } else { Some(self.resolve_type(&v.ty.with_extra_dims(d.extra_dims))) };
            let ty = match (&declared, &d.init) {
                (Some(ty), Some(init)) => {
                    let t = self.expr(init, Some(ty));
                    self.check_assignable(init, &t, ty);
                    ty.clone()
                }
                (Some(ty), None) => ty.clone(),
                (None, Some(init)) => match self.expr(init, None) {
                    JType::Null => {
                        self.mismatch(&JType::Null, &JType::object(), init.span);
                        JType::Error
                    }
                    t => t,
                },
                (None, None) => {
                    self.report(DiagnosticKind::UnknownType("var".into()), v.ty.span);
                    JType::Error
                }
            };
            let constant = match &d.init {
                Some(init) if is_final && (ty.is_primitive() || ty.is_string()) => self
                    .out
                    .constants
                    .get(&init.id)
                    .and_then(|c| super::symtab::coerce_constant(c, &ty)),
                _ => None,
            };
            if d.init.is_none() {
                self.blank_locals.insert(d.name_span.start.offset);
            }
            self.declare_local(&d.name, d.name_span, ty, constant);
        }
    }

    fn return_stmt(&mut self, r: &ReturnStmt) {
        let ret = if self.body == BodyKind::Method { self.return_type.clone() } else { JType::Void };
        match &r.value {
            Some(v) => {
                if ret == JType::Void {
                    self.expr(v, None);
                    self.report(DiagnosticKind::VoidReturnValue, v.span);
                } else {
                    let t = self.expr(v, Some(&ret));
                    self.check_assignable(v, &t, &ret);
                }
            }
            None if ret != JType::Void && !ret.is_error() => {
                self.report(DiagnosticKind::MissingReturn(ret.java_name()), r.span);
            }
            None => {}
        }
    }

    fn yield_stmt(&mut self, y: &YieldStmt) {
        if self.frames.is_empty() {
            if matches!(y.value.kind, ExprKind::Parenthesized(_)) {
                // `yield(x);` read as a call to a method named yield
                self.report(DiagnosticKind::RestrictedYield, Span::new(y.span.start, y.value.span.start));
            } else {
                self.report(DiagnosticKind::YieldOutsideSwitchExpression, y.span);
            }
            self.expr(&y.value, None);
            return;
        }
        let expected = self.frames.last().and_then(|f| f.expected.clone());
        let t = self.expr(&y.value, expected.as_ref());
        if let Some(frame) = self.frames.last_mut() {
            frame.arms.push((y.value.id, y.value.span, t));
        }
    }

    fn explicit_ctor_call(&mut self, call: &ExplicitCtorCall) {
        let saved = self.is_static;
        // arguments cannot refer to the object under construction
        self.is_static = true;
        let args = self.call_args(&call.args);
        self.is_static = saved;
        if self.body != BodyKind::Constructor {
            return;
        }
        let owner = match call.kind {
            CtorCallKind::This => Some(self.class.clone()),
            CtorCallKind::Super => self.table.get(&self.class).and_then(|s| s.super_class.clone()),
        };
        let Some(owner) = owner else { return };
        match self.table.resolve_ctor(&owner, &args) {
            Some(m) => {
                let r = self.method_ref(&m, InvokeKind::Special, &args);
                self.retarget_args(&call.args, &r);
                self.out.ctors.insert(call.id, r);
            }
            None if args.iter().any(JType::is_error) => {}
            None => {
                let name = JType::class(&owner).java_name();
                self.report(DiagnosticKind::UnknownConstructor(name, arg_list(&args)), call.span);
            }
        }
    }

    // ----- names -----

    fn enclosing_classes(&self) -> Vec<(DeclId, String)> {
        let mut out = Vec::new();
        let mut cur = Some(self.decl);
        while let Some(id) = cur {
            out.push((id, self.unit.binary_name(id)));
            cur = self.unit.decls[id].enclosing;
        }
        out
    }

    /// Field visible under a simple name, with whether it belongs to an
    /// enclosing class rather than the current one.
    fn find_visible_field(&self, name: &str) -> Option<(FieldRef, bool)> {
        for (i, (_, class)) in self.enclosing_classes().iter().enumerate() {
            if let Some(f) = self.table.find_field(class, name) {
                let r = FieldRef {
                    owner: f.owner.clone(),
                    name: f.name.clone(),
                    ty: f.ty.clone(),
                    is_static: f.is_static,
                    is_final: f.is_final,
                };
                return Some((r, i > 0));
            }
        }
        None
    }

    fn field_constant(&self, f: &FieldRef) -> Option<ConstValue> {
        self.table.find_field(&f.owner, &f.name).and_then(|s| s.constant.clone())
    }

    /// Internal name when `e` names a type rather than a value.
    fn type_qualifier(&self, e: &Expr) -> Option<String> {
        match &e.kind {
            ExprKind::Name(n) => {
                if self.find_local(n).is_some() || self.find_visible_field(n).is_some() {
                    return None;
                }
                self.table
                    .lookup_type_name(self.unit, Some(self.decl), n)
                    .filter(|t| self.table.contains(t))
            }
            ExprKind::FieldAccess { target, name, .. } => {
                let outer = self.type_qualifier(target)?;
                let nested = format!("{}${}", outer, name);
                self.table.contains(&nested).then_some(nested)
            }
            _ => None,
        }
    }

    fn name(&mut self, e: &Expr, n: &str) -> JType {
        if let Some((depth, local)) = self.find_local_at(n) {
            let (ty, constant, offset) = (local.ty.clone(), local.constant.clone(), local.offset);
            self.out.names.insert(e.id, NameRes::Local(ty.clone()));
            match constant {
                Some(c) => {
                    self.out.constants.insert(e.id, c);
                }
                None => self.capture(depth, n, &ty, offset, e.span),
            }
            return self.set(e, ty);
        }
        if let Some((f, outer)) = self.find_visible_field(n) {
            if !f.is_static && (self.is_static || outer) {
                self.report(DiagnosticKind::StaticReference(format!("field {}", n)), e.span);
            }
            if !f.is_static {
                self.capture_this();
            }
            if let Some(c) = self.field_constant(&f) {
                self.out.constants.insert(e.id, c);
            }
            let ty = f.ty.clone();
            self.out.names.insert(e.id, NameRes::Field(f));
            return self.set(e, ty);
        }
        if let Some(t) = self.type_qualifier(e) {
            self.out.names.insert(e.id, NameRes::Type(t.clone()));
            return self.set(e, JType::Class(t));
        }
        self.report(DiagnosticKind::UnknownVariable(n.to_string()), e.span);
        self.set(e, JType::Error)
    }

    fn field_access(&mut self, e: &Expr, target: &Expr, name: &str, name_span: Span) -> JType {
        if let Some(owner) = self.type_qualifier(target) {
            self.out.names.insert(target.id, NameRes::Type(owner.clone()));
            self.out.types.insert(target.id, JType::Class(owner.clone()));
            let nested = format!("{}${}", owner, name);
            if self.table.contains(&nested) {
                self.out.names.insert(e.id, NameRes::Type(nested.clone()));
                return self.set(e, JType::Class(nested));
            }
            return self.member_field(e, &owner, name, name_span, true);
        }
        let t = self.expr(target, None);
        match &t {
            JType::Error => self.set(e, JType::Error),
            JType::Array(_) if name == "length" => {
                self.out.names.insert(e.id, NameRes::ArrayLength);
                self.set(e, JType::Int)
            }
            JType::Class(owner) => {
                let owner = owner.clone();
                self.member_field(e, &owner, name, name_span, false)
            }
            _ => {
                self.report(DiagnosticKind::PrimitiveReceiver(name.to_string(), t.java_name()), name_span);
                self.set(e, JType::Error)
            }
        }
    }

    fn member_field(&mut self, e: &Expr, owner: &str, name: &str, name_span: Span, static_only: bool) -> JType {
        let Some(f) = self.table.find_field(owner, name) else {
            let kind = match self.table.get(owner) {
                Some(sym) if sym.kind == ClassKind::Enum && static_only => {
                    DiagnosticKind::UnknownEnumConstant(name.to_string(), JType::class(owner).java_name())
                }
                _ => DiagnosticKind::UnknownField(name.to_string()),
            };
            self.report(kind, name_span);
            return self.set(e, JType::Error);
        };
        let r = FieldRef {
            owner: f.owner.clone(),
            name: f.name.clone(),
            ty: f.ty.clone(),
            is_static: f.is_static,
            is_final: f.is_final,
        };
        if static_only && !r.is_static {
            self.report(DiagnosticKind::StaticReference(format!("field {}", name)), name_span);
        }
        if let Some(c) = f.constant.clone() {
            self.out.constants.insert(e.id, c);
        }
        let ty = r.ty.clone();
        self.out.names.insert(e.id, NameRes::Field(r));
        self.set(e, ty)
    }

    // ----- calls -----

    pub(super) fn method_ref(&self, m: &MethodSym, kind: InvokeKind, args: &[JType]) -> MethodRef {
        let pack_varargs = m.varargs
            && !(args.len() == m.params.len()
                && args.last().zip(m.params.last()).map(|(a, p)| self.table.is_convertible(a, p, true)).unwrap_or(false));
        let interface = self.table.is_interface(&m.owner);
        MethodRef {
            owner: m.owner.clone(),
            name: m.name.clone(),
            params: m.params.clone(),
            ret: m.ret.clone(),
            kind,
            interface,
            pack_varargs,
        }
    }

    /// Parameter type the argument at `i` is converted to.
    fn param_for(r: &MethodRef, i: usize) -> Option<JType> {
        if r.pack_varargs && i + 1 >= r.params.len() {
            return r.params.last().and_then(|p| p.element().cloned());
        }
        r.params.get(i).cloned()
    }

    /// Attributes call arguments. Lambdas wait for the parameter type and
    /// stand in as `null`, which converts to any interface.
    fn call_args(&mut self, args: &[Expr]) -> Vec<JType> {
        args.iter()
            .map(|a| match a.kind {
                ExprKind::Lambda(_) => JType::Null,
                _ => self.expr(a, None),
            })
            .collect()
    }

    /// Switch expressions and lambdas in argument position take the
    /// parameter type.
    fn retarget_args(&mut self, args: &[Expr], r: &MethodRef) {
        for (i, a) in args.iter().enumerate() {
            if let ExprKind::Lambda(l) = &a.kind {
                let p = Self::param_for(r, i);
                self.lambda(a, l, p.as_ref());
                continue;
            }
            let ExprKind::Switch(sw) = &a.unparenthesized().kind else { continue };
            let Some(p) = Self::param_for(r, i) else { continue };
            let current = self.out.type_of(a.id);
            if current == p || current.is_error() || !self.table.is_convertible(&current, &p, true) {
                continue;
            }
            if let Some(info) = self.out.switches.get_mut(&sw.selector.id) {
                info.result_type = Some(p.clone());
            }
            let mut cur = a;
            loop {
                self.out.types.insert(cur.id, p.clone());
                match &cur.kind {
                    ExprKind::Parenthesized(inner) => cur = inner.as_ref(),
                    _ => break,
                }
            }
        }
    }

    fn method_call(&mut self, e: &Expr, target: Option<&Expr>, name: &str, name_span: Span, args: &[Expr]) -> JType {
        if target.is_none() && name == "yield" {
            self.report(DiagnosticKind::RestrictedYield, name_span);
            for a in args {
                self.expr(a, None);
            }
            return self.set(e, JType::Error);
        }

        // receiver: (owner, static-only, super call)
        let receiver: Option<(String, bool, bool)> = match target {
            None => None,
            Some(t) => {
                if let Some(owner) = self.type_qualifier(t) {
                    self.out.names.insert(t.id, NameRes::Type(owner.clone()));
                    self.out.types.insert(t.id, JType::Class(owner.clone()));
                    Some((owner, true, false))
                } else {
                    let tt = self.expr(t, None);
                    match tt {
                        JType::Error => {
                            for a in args {
                                self.expr(a, None);
                            }
                            return self.set(e, JType::Error);
                        }
                        JType::Class(owner) => Some((owner, false, matches!(t.kind, ExprKind::Super))),
                        JType::Array(_) => Some((JAVA_LANG_OBJECT.to_string(), false, false)),
                        other => {
                            self.report(DiagnosticKind::PrimitiveReceiver(name.to_string(), other.java_name()), name_span);
                            for a in args {
                                self.expr(a, None);
                            }
                            return self.set(e, JType::Error);
                        }
                    }
                }
            }
        };

        let arg_types = self.call_args(args);
        if arg_types.iter().any(JType::is_error) {
            return self.set(e, JType::Error);
        }

        let (owner, found, from_outer) = match &receiver {
            Some((owner, _, _)) => (owner.clone(), self.table.resolve_method(owner, name, &arg_types), false),
            None => {
                let mut result = (self.class.clone(), MethodLookup::NotFound, false);
                for (i, (_, class)) in self.enclosing_classes().into_iter().enumerate() {
                    match self.table.resolve_method(&class, name, &arg_types) {
                        MethodLookup::NotFound => continue,
                        other => {
                            result = (class, other, i > 0);
                            break;
                        }
                    }
                }
                result
            }
        };
        let m = match found {
            MethodLookup::Found(m) => m,
            MethodLookup::NotFound | MethodLookup::Inapplicable => {
                let shown = receiver.as_ref().map(|(o, _, _)| o.clone()).unwrap_or_else(|| self.class.clone());
                self.report(
                    DiagnosticKind::UnknownMethod(name.to_string(), arg_list(&arg_types), JType::class(&shown).java_name()),
                    name_span,
                );
                return self.set(e, JType::Error);
            }
        };

        let static_only = receiver.as_ref().map(|r| r.1).unwrap_or(false);
        let is_super = receiver.as_ref().map(|r| r.2).unwrap_or(false);
        if !m.is_static && (static_only || (receiver.is_none() && (self.is_static || from_outer))) {
            self.report(
                DiagnosticKind::StaticReference(format!("method {}({})", name, arg_list(&m.params))),
                name_span,
            );
        }
        if !m.is_static && receiver.is_none() {
            self.capture_this();
        }
        let kind = if m.is_static {
            InvokeKind::Static
        } else if is_super || (m.is_private && m.owner == self.class) {
            InvokeKind::Special
        } else if self.table.is_interface(&owner) && m.owner != JAVA_LANG_OBJECT {
            InvokeKind::Interface
        } else {
            InvokeKind::Virtual
        };
        let mut r = self.method_ref(&m, kind, &arg_types);
        if !m.is_static && !is_super && m.owner != JAVA_LANG_OBJECT {
            // invoke through the static type of the receiver
            r.owner = owner.clone();
            r.interface = self.table.is_interface(&owner);
        }
        self.retarget_args(args, &r);
        let ret = r.ret.clone();
        self.out.calls.insert(e.id, r);
        self.set(e, ret)
    }

    fn new_object(&mut self, e: &Expr, ty: &TypeRef, args: &[Expr]) -> JType {
        let t = self.resolve_type(ty);
        let arg_types = self.call_args(args);
        let JType::Class(class) = &t else {
            if !t.is_error() {
                self.mismatch(&t, &JType::object(), ty.span);
            }
            return self.set(e, JType::Error);
        };
        if arg_types.iter().any(JType::is_error) {
            return self.set(e, t.clone());
        }
        match self.table.resolve_ctor(class, &arg_types) {
            Some(m) => {
                let r = self.method_ref(&m, InvokeKind::Special, &arg_types);
                self.retarget_args(args, &r);
                self.out.ctors.insert(e.id, r);
            }
            None => {
                let simple = t.java_name();
                self.report(DiagnosticKind::UnknownConstructor(simple, arg_list(&arg_types)), ty.span);
            }
        }
        self.set(e, t.clone())
    }

    // ----- lambdas -----

    /// Types a lambda from its target, which must be a functional
    /// interface, and attributes the body against the interface method.
    /// Yields inside the body cannot reach an enclosing switch.
    fn lambda(&mut self, e: &Expr, l: &LambdaExpr, expected: Option<&JType>) -> JType {
        let target = match expected {
            Some(JType::Class(name)) => self.table.functional_method(name).map(|m| (name.clone(), m)),
            _ => None,
        };
        let Some((interface, sam)) = target else {
            if !expected.is_some_and(JType::is_error) {
                self.report(DiagnosticKind::LambdaTargetNotFunctional, e.span);
            }
            return self.set(e, JType::Error);
        };
        let shape = format!("{}({})", sam.name, arg_list(&sam.params));
        if sam.params.len() != l.params.len() {
            self.report(DiagnosticKind::LambdaShape(shape), e.span);
            return self.set(e, JType::Error);
        }

        let frames = std::mem::take(&mut self.frames);
        let return_type = std::mem::replace(&mut self.return_type, sam.ret.clone());
        let body = std::mem::replace(&mut self.body, BodyKind::Method);
        self.lambdas.push(LambdaFrame { base: self.scopes.len(), ..LambdaFrame::default() });
        self.push_scope();
        for (p, ty) in l.params.iter().zip(&sam.params) {
            if let Some(written) = &p.ty {
                let declared = self.resolve_type(written);
                if !declared.is_error() && declared != *ty {
                    self.report(DiagnosticKind::LambdaShape(shape.clone()), written.span);
                }
            }
            self.declare_local(&p.name, p.name_span, ty.clone(), None);
        }
        match &l.body {
            LambdaBody::Expr(value) if sam.ret == JType::Void => {
                self.expr(value, None);
                let statement = matches!(
                    value.kind,
                    ExprKind::MethodCall { .. } | ExprKind::Assign { .. } | ExprKind::IncDec { .. } | ExprKind::New { .. }
                );
                if !statement {
                    self.report(DiagnosticKind::VoidReturnValue, value.span);
                }
            }
            LambdaBody::Expr(value) => {
                let t = self.expr(value, Some(&sam.ret));
                if !t.is_error() {
                    self.check_assignable(value, &t, &sam.ret);
                }
            }
            LambdaBody::Block(b) => self.block(b),
        }
        self.pop_scope();
        let frame = self.lambdas.pop().unwrap_or_default();
        self.body = body;
        self.return_type = return_type;
        self.frames = frames;

        let method = self.method_ref(&sam, InvokeKind::Interface, &sam.params);
        let info = LambdaInfo {
            interface: interface.clone(),
            method,
            captures: frame.captures,
            captures_this: frame.captures_this,
        };
        self.out.lambdas.insert(e.id, info);
        self.set(e, JType::Class(interface))
    }

    /// Records a read of the local declared in scope `depth` by every
    /// lambda body it lies outside of.
    fn capture(&mut self, depth: usize, name: &str, ty: &JType, offset: usize, span: Span) {
        let mut captured = false;
        for frame in self.lambdas.iter_mut().filter(|f| f.base > depth) {
            captured = true;
            if !frame.captures.iter().any(|c| c.name == name) {
                frame.captures.push(Capture { name: name.to_string(), ty: ty.clone() });
            }
        }
        if captured && !self.captured.iter().any(|(o, _, _)| *o == offset) {
            self.captured.push((offset, name.to_string(), span));
        }
    }

    fn capture_this(&mut self) {
        if self.is_static {
            return;
        }
        for frame in &mut self.lambdas {
            frame.captures_this = true;
        }
    }

    fn note_write(&mut self, target: &Expr) {
        let target = target.unparenthesized();
        let ExprKind::Name(n) = &target.kind else { return };
        if !matches!(self.out.names.get(&target.id), Some(NameRes::Local(_))) {
            return;
        }
        if let Some(offset) = self.find_local(n).map(|l| l.offset) {
            *self.writes.entry(offset).or_default() += 1;
        }
    }

    /// Captured locals must be assigned once: by their initializer, or by
    /// a single assignment when declared without one.
    fn check_captures(&mut self) {
        let captured = std::mem::take(&mut self.captured);
        for (offset, name, span) in captured {
            let writes = self.writes.get(&offset).copied().unwrap_or(0);
            let allowed = if self.blank_locals.contains(&offset) { 1 } else { 0 };
            if writes > allowed {
                self.report(DiagnosticKind::CapturedNotEffectivelyFinal(name), span);
            }
        }
    }

    // ----- expressions -----

    /// Attributes `e`; `expected` is the target type of an assignment,
    /// return or yield context, used by poly expressions.
    pub(super) fn expr(&mut self, e: &Expr, expected: Option<&JType>) -> JType {
        let ty = match &e.kind {
            ExprKind::Literal(lit) => {
                let t = match lit {
                    Literal::Int(_) => JType::Int,
                    Literal::Long(_) => JType::Long,
                    Literal::Float(_) => JType::Float,
                    Literal::Double(_) => JType::Double,
                    Literal::Char(_) => JType::Char,
                    Literal::String(_) => JType::string(),
                    Literal::Bool(_) => JType::Boolean,
                    Literal::Null => JType::Null,
                };
                self.set(e, t)
            }
            ExprKind::Name(n) => self.name(e, n),
            ExprKind::This | ExprKind::Super => {
                if self.is_static {
                    let what = if matches!(e.kind, ExprKind::This) { "this" } else { "super" };
                    self.report(DiagnosticKind::StaticReference(what.to_string()), e.span);
                }
                self.capture_this();
                let t = if matches!(e.kind, ExprKind::This) {
                    JType::Class(self.class.clone())
                } else {
                    self.table
                        .get(&self.class)
                        .and_then(|s| s.super_class.clone())
                        .map(JType::Class)
                        .unwrap_or_else(JType::object)
                };
                self.set(e, t)
            }
            ExprKind::FieldAccess { target, name, name_span } => self.field_access(e, target, name, *name_span),
            ExprKind::MethodCall { target, name, name_span, args } => {
                self.method_call(e, target.as_deref(), name, *name_span, args)
            }
            ExprKind::New { ty, args } => self.new_object(e, ty, args),
            ExprKind::NewArray { elem, dims, extra_dims, init } => {
                let mut t = self.resolve_type(elem);
                for d in dims {
                    let dt = self.expr(d, None);
                    if !dt.is_error() && dt.unboxed_or_self().promoted() != JType::Int {
                        self.mismatch(&dt, &JType::Int, d.span);
                    }
                }
                for _ in 0..dims.len() + extra_dims {
                    t = JType::array_of(t);
                }
                if let Some(items) = init {
                    self.array_items(items, &t);
                }
                self.set(e, t)
            }
            ExprKind::ArrayInit(items) => match expected {
                Some(t @ JType::Array(_)) => {
                    let t = t.clone();
                    self.array_items(items, &t);
                    self.set(e, t)
                }
                _ => {
                    for i in items {
                        self.expr(i, None);
                    }
                    self.report(DiagnosticKind::InvalidSyntax("array initializer without an array type".into()), e.span);
                    self.set(e, JType::Error)
                }
            },
            ExprKind::ArrayAccess { array, index } => {
                let at = self.expr(array, None);
                let it = self.expr(index, None);
                if !it.is_error() && it.promoted() != JType::Int {
                    self.mismatch(&it, &JType::Int, index.span);
                }
                let t = match at {
                    JType::Array(elem) => *elem,
                    JType::Error => JType::Error,
                    other => {
                        self.mismatch(&other, &JType::array_of(JType::object()), array.span);
                        JType::Error
                    }
                };
                self.set(e, t)
            }
            ExprKind::Unary { op, operand } => {
                let t = self.expr(operand, None);
                let u = t.unboxed_or_self();
                let r = match op {
                    _ if t.is_error() => JType::Error,
                    UnaryOp::Neg | UnaryOp::Plus if u.is_numeric() => u.promoted(),
                    UnaryOp::BitNot if u.is_integral() => u.promoted(),
                    UnaryOp::Not if u == JType::Boolean => JType::Boolean,
                    _ => {
                        let sym = match op {
                            UnaryOp::Neg => "-",
                            UnaryOp::Plus => "+",
                            UnaryOp::Not => "!",
                            UnaryOp::BitNot => "~",
                        };
                        self.report(DiagnosticKind::BadOperand(sym.into(), t.java_name()), e.span);
                        JType::Error
                    }
                };
                self.set(e, r)
            }
            ExprKind::IncDec { target, .. } => {
                let t = self.expr(target, None);
                self.check_final_assignment(target);
                self.note_write(target);
                if !t.is_error() && !t.unboxed_or_self().is_numeric() {
                    let sym = if matches!(e.kind, ExprKind::IncDec { increment: true, .. }) { "++" } else { "--" };
                    self.report(DiagnosticKind::BadOperand(sym.into(), t.java_name()), e.span);
                }
                self.set(e, t)
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.expr(left, None);
                let r = self.expr(right, None);
                let t = self.binary_type(*op, &l, &r, e.span);
                self.set(e, t)
            }
            ExprKind::Assign { op, target, value } => {
                let t = self.expr(target, None);
                self.check_final_assignment(target);
                self.note_write(target);
                match op {
                    None => {
                        let v = self.expr(value, Some(&t));
                        if !t.is_error() {
                            self.check_assignable(value, &v, &t);
                        }
                    }
                    Some(op) => {
                        let v = self.expr(value, None);
                        let ok = (*op == BinaryOp::Add && t.is_string())
                            || t.is_error()
                            || v.is_error()
                            || !self.binary_type(*op, &t, &v, e.span).is_error();
                        if !ok {
                            self.mismatch(&v, &t, value.span);
                        }
                    }
                }
                self.set(e, t)
            }
            ExprKind::Conditional { cond, then_expr, else_expr } => {
                self.condition(cond);
                let a = self.expr(then_expr, expected);
                let b = self.expr(else_expr, expected);
                let t = self.conditional_type(then_expr, &a, else_expr, &b, expected);
                self.set(e, t)
            }
            ExprKind::Cast { ty, expr } => {
                let target = self.resolve_type(ty);
                let lambda = matches!(expr.unparenthesized().kind, ExprKind::Lambda(_));
                let t = self.expr(expr, lambda.then_some(&target));
                if !self.table.is_castable(&t, &target) {
                    self.mismatch(&t, &target, e.span);
                }
                self.set(e, target)
            }
            ExprKind::InstanceOf { expr, ty } => {
                let t = self.expr(expr, None);
                let target = self.resolve_type(ty);
                if t.is_primitive() {
                    self.mismatch(&t, &target, expr.span);
                }
                self.out.type_operands.insert(e.id, target);
                self.set(e, JType::Boolean)
            }
            ExprKind::ClassLit(ty) => {
                let operand = self.resolve_type(ty);
                self.out.type_operands.insert(e.id, operand);
                self.set(e, JType::class(crate::consts::JAVA_LANG_CLASS))
            }
            ExprKind::Switch(sw) => self.switch_expr(e, sw, expected),
            ExprKind::Lambda(l) => self.lambda(e, l, expected),
            ExprKind::Parenthesized(inner) => {
                let t = self.expr(inner, expected);
                if let Some(c) = self.out.constants.get(&inner.id).cloned() {
                    self.out.constants.insert(e.id, c);
                }
                self.set(e, t)
            }
        };
        if matches!(
            e.kind,
            ExprKind::Literal(_)
                | ExprKind::Unary { .. }
                | ExprKind::Binary { .. }
                | ExprKind::Cast { .. }
                | ExprKind::Conditional { .. }
        ) && !ty.is_error()
        {
            self.fold(e);
        }
        ty
    }

    fn array_items(&mut self, items: &[Expr], array: &JType) {
        let Some(elem) = array.element().cloned() else { return };
        for item in items {
            let t = self.expr(item, Some(&elem));
            self.check_assignable(item, &t, &elem);
        }
    }

    /// Assignments to final fields are allowed only while the object (or
    /// class, for statics) is being initialized.
    fn check_final_assignment(&mut self, target: &Expr) {
        let target = target.unparenthesized();
        let Some(NameRes::Field(f)) = self.out.names.get(&target.id).cloned() else { return };
        if !f.is_final {
            return;
        }
        let simple = match &target.kind {
            ExprKind::Name(_) => true,
            ExprKind::FieldAccess { target: t, .. } => matches!(t.kind, ExprKind::This),
            _ => false,
        };
        let initializing = f.owner == self.class
            && simple
            && match self.body {
                BodyKind::Constructor | BodyKind::InstanceInit => !f.is_static,
                BodyKind::StaticInit => f.is_static,
                BodyKind::Method => false,
            };
        let blank = self.table.find_field(&f.owner, &f.name).map(|s| s.blank).unwrap_or(false);
        if !initializing || !blank {
            self.report(DiagnosticKind::FinalFieldAssignment(f.name.clone()), target.span);
        }
    }

    fn binary_type(&mut self, op: BinaryOp, l: &JType, r: &JType, span: Span) -> JType {
        if l.is_error() || r.is_error() {
            return JType::Error;
        }
        let (lu, ru) = (l.unboxed_or_self(), r.unboxed_or_self());
        let t = match op {
            BinaryOp::Add if (l.is_string() || r.is_string()) && *l != JType::Void && *r != JType::Void => {
                Some(JType::string())
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => binary_promotion(l, r),
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => {
                (lu.is_integral() && ru.is_integral()).then(|| lu.promoted())
            }
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                if lu == JType::Boolean && ru == JType::Boolean {
                    Some(JType::Boolean)
                } else if lu.is_integral() && ru.is_integral() {
                    binary_promotion(l, r)
                } else {
                    None
                }
            }
            BinaryOp::And | BinaryOp::Or => (lu == JType::Boolean && ru == JType::Boolean).then_some(JType::Boolean),
            BinaryOp::Eq | BinaryOp::Ne => {
                let numeric = lu.is_numeric() && ru.is_numeric() && (l.is_primitive() || r.is_primitive());
                let boolean = lu == JType::Boolean && ru == JType::Boolean;
                let reference = l.is_reference() && r.is_reference() && self.table.is_castable(l, r);
                (numeric || boolean || reference).then_some(JType::Boolean)
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                (lu.is_numeric() && ru.is_numeric()).then_some(JType::Boolean)
            }
        };
        match t {
            Some(t) => t,
            None => {
                self.report(
                    DiagnosticKind::BadOperand(op.symbol().into(), format!("{}, {}", l.java_name(), r.java_name())),
                    span,
                );
                JType::Error
            }
        }
    }

    fn conditional_type(&mut self, a_expr: &Expr, a: &JType, b_expr: &Expr, b: &JType, expected: Option<&JType>) -> JType {
        if a.is_error() || b.is_error() {
            return JType::Error;
        }
        if a == b {
            return a.clone();
        }
        let (au, bu) = (a.unboxed_or_self(), b.unboxed_or_self());
        if au == JType::Boolean && bu == JType::Boolean {
            return JType::Boolean;
        }
        if au.is_numeric() && bu.is_numeric() {
            for (x, y, y_expr) in [(&au, &bu, b_expr), (&bu, &au, a_expr)] {
                if matches!(x, JType::Byte | JType::Short | JType::Char) && *y == JType::Int {
                    if let Some(ConstValue::Int(v)) = self.out.constants.get(&y_expr.id) {
                        if super::types::int_constant_fits(*v, x) {
                            return x.clone();
                        }
                    }
                }
            }
            if (au == JType::Byte && bu == JType::Short) || (au == JType::Short && bu == JType::Byte) {
                return JType::Short;
            }
            return binary_promotion(&au, &bu).unwrap_or(JType::Error);
        }
        match expected {
            Some(t) if t.is_reference() => t.clone(),
            _ => {
                let boxed = |t: &JType| t.boxed().unwrap_or_else(|| t.clone());
                self.table.lub(&[boxed(a), boxed(b)])
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::wash::lower::lower_unit;

    pub(crate) fn attributed(src: &str) -> (CompilationUnit, Attribution, Vec<DiagnosticKind>) {
        let mut sink = DiagnosticSink::new();
        let mut unit = parse(src, &mut sink);
        assert!(sink.is_empty(), "syntax errors: {:?}", sink.iter().collect::<Vec<_>>());
        lower_unit(&mut unit, &HashSet::new());
        let table = ClassTable::build(&unit);
        let attr = attribute(&unit, &table, &HashSet::new(), &mut sink);
        let kinds = sink.iter().map(|d| d.kind.clone()).collect();
        (unit, attr, kinds)
    }

    fn kinds(src: &str) -> Vec<DiagnosticKind> {
        attributed(src).2
    }

    #[test]
    fn names_fields_and_calls() {
        let (_, attr, kinds) = attributed(
            "class A { static final int K = 3; int f; int m(int p) { int l = p + K + f; System.out.println(l); return l; } }",
        );
        assert!(kinds.is_empty(), "{:?}", kinds);
        let call = attr.calls.values().find(|c| c.name == "println").unwrap();
        assert_eq!(call.descriptor(), "(I)V");
        assert_eq!(call.kind, InvokeKind::Virtual);
        assert!(attr.names.values().any(|n| matches!(n, NameRes::Field(f) if f.name == "out" && f.is_static)));
        assert!(attr.constants.values().any(|c| *c == ConstValue::Int(3)));
    }

    #[test]
    fn unknown_names_are_reported() {
        assert_eq!(
            kinds("class A { void m() { int x = y; Foo f = null; bar(1); } }"),
            vec![
                DiagnosticKind::UnknownVariable("y".into()),
                DiagnosticKind::UnknownType("Foo".into()),
                DiagnosticKind::UnknownMethod("bar".into(), "int".into(), "A".into()),
            ]
        );
    }

    #[test]
    fn static_context() {
        assert_eq!(
            kinds("class A { int f; static int m() { return f; } }"),
            vec![DiagnosticKind::StaticReference("field f".into())]
        );
    }

    #[test]
    fn restricted_yield() {
        assert_eq!(
            kinds("class A { void yield(int x) {} void m() { yield(1); this.yield(2); } }"),
            vec![DiagnosticKind::RestrictedYield]
        );
        assert_eq!(kinds("class A { void m() { yield (1 + 2); } }"), vec![DiagnosticKind::RestrictedYield]);
        assert_eq!(kinds("class A { void m() { yield 1; } }"), vec![DiagnosticKind::YieldOutsideSwitchExpression]);
    }

    #[test]
    fn yield_outside_switch_expression() {
        assert_eq!(
            kinds("class A { void m(int k) { switch (k) { default: yield 1; } } }"),
            vec![DiagnosticKind::YieldOutsideSwitchExpression]
        );
    }

    #[test]
    fn record_members_resolve() {
        let (_, attr, kinds) =
            attributed("record P(int x, String s) { static int sum(P p) { return p.x() + p.s().length(); } }");
        assert!(kinds.is_empty(), "{:?}", kinds);
        assert!(attr.calls.values().any(|c| c.name == "x" && c.descriptor() == "()I" && c.owner == "P"));
    }

    #[test]
    fn type_mismatch_and_constant_narrowing() {
        assert_eq!(
            kinds("class A { void m() { byte b = 10; byte c = 300; String s = 1; } }"),
            vec![
                DiagnosticKind::TypeMismatch("int".into(), "byte".into()),
                DiagnosticKind::TypeMismatch("int".into(), "String".into()),
            ]
        );
    }

    #[test]
    fn final_field_assignment() {
        assert_eq!(
            kinds("class A { final int x; A() { x = 1; } void m() { x = 2; } }"),
            vec![DiagnosticKind::FinalFieldAssignment("x".into())]
        );
    }

    #[test]
    fn duplicate_local() {
        assert_eq!(
            kinds("class A { void m(int a) { int a = 1; } }"),
            vec![DiagnosticKind::DuplicateLocal("a".into())]
        );
    }

    #[test]
    fn var_is_inferred() {
        let (_, attr, kinds) = attributed("class A { void m() { var s = \"x\"; int n = s.length(); } }");
        assert!(kinds.is_empty(), "{:?}", kinds);
        assert!(attr.local_types.values().any(|t| t.is_string()));
    }
}
