//! Bytecode generation for method bodies, after javac's `Gen`.
//!
//! One [`Gen`] lowers one method, constructor or initializer into a
//! [`Code`] buffer. Statements live here, expressions in
//! [`super::gen_expr`] and switches in [`super::gen_switch`].
//!
//! Jumps that leave nested constructs go through `env`, a stack of
//! [`GenContext`]s like javac's `Env<GenContext>`: a `break`, `continue`,
//! `return` or `yield` first inlines every finalizer (and monitor exit)
//! between itself and its target, and the inlined code is recorded as a
//! gap that the enclosing handlers do not cover.

use super::code::{Code, Label};
use super::constpool::ConstantPool;
use super::error::{BytecodeError, BytecodeResult};
use super::frame::VType;
use super::lambda::ClassSynthetics;
use super::opcodes::*;
use super::switch_map::SwitchMaps;
use crate::ast::*;
use crate::config::Config;
use crate::consts::{JAVA_LANG_ENUM, JAVA_LANG_OBJECT, JAVA_LANG_RECORD, JAVA_LANG_THROWABLE};
use crate::wash::attr::{Attribution, MethodRef};
use crate::wash::symtab::{ClassTable, TypeScope};
use crate::wash::types::JType;
use crate::wash::Analysis;

/// Descriptor prefix of the two synthetic enum constructor parameters.
pub(crate) const ENUM_CTOR_PREFIX: [&str; 2] = ["Ljava/lang/String;", "I"];

/// The class a method body belongs to.
#[derive(Clone, Copy)]
pub(crate) struct ClassContext<'a> {
    pub unit: &'a CompilationUnit,
    pub analysis: &'a Analysis,
    pub config: &'a Config,
    pub decl: &'a TypeDecl,
    pub class: &'a str,
}

impl<'a> ClassContext<'a> {
    pub fn attr(&self) -> &'a Attribution {
        &self.analysis.attr
    }

    pub fn table(&self) -> &'a ClassTable {
        &self.analysis.table
    }

    pub fn is_enum(&self) -> bool {
        self.decl.kind == TypeKind::Enum
    }

    /// Resolves a type written in this class, erased.
    pub fn resolve(&self, ty: &TypeRef, method_tparams: &[TypeParam]) -> JType {
        let scope = TypeScope { decl: Some(self.decl.id), method_tparams };
        self.table().resolve_type_ref(self.unit, scope, ty).unwrap_or(JType::Error)
    }

    pub fn super_class(&self) -> String {
        self.table()
            .get(self.class)
            .and_then(|s| s.super_class.clone())
            .unwrap_or_else(|| JAVA_LANG_OBJECT.to_string())
    }
}

/// Kind of body being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyKind {
    Method,
    Constructor,
    Initializer,
}

/// Where a jump out of nested code lands, innermost last.
enum GenContext<'a> {
    Loop { label: Option<&'a str>, exit: Label, cont: Label },
    Labeled { label: &'a str, exit: Label },
    Switch { exit: Label },
    SwitchExpr(SwitchExprContext),
    Finally { body: &'a Block, gaps: Vec<(u16, u16)> },
    Monitor { lock: u16, gaps: Vec<(u16, u16)> },
}

/// A switch expression being generated.
#[derive(Clone)]
pub(super) struct SwitchExprContext {
    pub exit: Label,
    pub result: JType,
    /// Slots holding the operand stack beneath the switch, bottom first,
    /// when an arm contains `try` or `synchronized`.
    pub spilled: Vec<u16>,
    pub result_slot: Option<u16>,
}

pub(crate) struct Gen<'a, 'p> {
    pub(super) cx: ClassContext<'a>,
    pub(super) pool: &'p mut ConstantPool,
    pub(super) maps: &'p mut SwitchMaps,
    pub(super) synthetics: &'p mut ClassSynthetics<'a>,
    pub(super) code: Code,
    scopes: Vec<Vec<(&'a str, u16, JType)>>,
    env: Vec<GenContext<'a>>,
    return_type: JType,
}

impl<'a, 'p> Gen<'a, 'p> {
    /// A generator whose locals start with `this` (unless static), then
    /// `synthetic` unnamed parameters, then the named `params`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        cx: ClassContext<'a>,
        pool: &'p mut ConstantPool,
        maps: &'p mut SwitchMaps,
        synthetics: &'p mut ClassSynthetics<'a>,
        kind: BodyKind,
        is_static: bool,
        synthetic: &[JType],
        params: &[(&'a str, JType)],
        return_type: JType,
    ) -> Self {
        let all: Vec<JType> = synthetic.iter().cloned().chain(params.iter().map(|(_, t)| t.clone())).collect();
        let code = Code::new(cx.class, is_static, kind == BodyKind::Constructor, &all);
        let mut slot: u16 = if is_static { 0 } else { 1 };
        slot += synthetic.iter().map(JType::size).sum::<u16>();
        let mut scope = Vec::new();
        for (name, ty) in params {
            scope.push((*name, slot, ty.clone()));
            slot += ty.size();
        }
        Self { cx, pool, maps, synthetics, code, scopes: vec![scope], env: Vec::new(), return_type }
    }

    pub(crate) fn into_code(self) -> Code {
        self.code
    }

    pub(super) fn attr(&self) -> &'a Attribution {
        self.cx.attr()
    }

    pub(super) fn table(&self) -> &'a ClassTable {
        self.cx.table()
    }

    pub(super) fn config(&self) -> &'a Config {
        self.cx.config
    }

    // ----- locals -----

    pub(super) fn open_scope(&mut self) -> u16 {
        self.scopes.push(Vec::new());
        self.code.begin_scope()
    }

    pub(super) fn close_scope(&mut self, mark: u16) {
        self.scopes.pop();
        self.code.end_scope(mark);
    }

    pub(super) fn declare(&mut self, name: &'a str, ty: &JType) -> u16 {
        let slot = self.code.alloc_local(ty);
        if let Some(scope) = self.scopes.last_mut() {
            scope.push((name, slot, ty.clone()));
        }
        slot
    }

    pub(super) fn local(&self, name: &str) -> BytecodeResult<(u16, JType)> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|s| s.iter().rev())
            .find(|(n, _, _)| *n == name)
            .map(|(_, slot, ty)| (*slot, ty.clone()))
            .ok_or_else(|| BytecodeError::missing(format!("local variable {}", name)))
    }

    // ----- bodies -----

    /// Method body; a fall-through end of a `void` method returns.
    pub(crate) fn gen_method_body(&mut self, body: &'a Block) -> BytecodeResult<()> {
        self.gen_stats(&body.stmts)?;
        self.code.ret(&JType::Void)
    }

    /// Body of the synthetic method behind a lambda.
    pub(crate) fn gen_lambda_body(&mut self, l: &'a LambdaExpr) -> BytecodeResult<()> {
        match &l.body {
            LambdaBody::Block(b) => self.gen_method_body(b),
            LambdaBody::Expr(value) if self.return_type == JType::Void => {
                self.gen_effect(value)?;
                self.code.ret(&JType::Void)
            }
            LambdaBody::Expr(value) => {
                let ret = self.return_type.clone();
                self.gen_expr_to(value, &ret)?;
                self.code.ret(&ret)
            }
        }
    }

    /// Constructor body: the `this(...)`/`super(...)` call, then (unless
    /// it delegated to `this`) the instance initializers in member order.
    pub(crate) fn gen_constructor_body(&mut self, ctor: &'a ConstructorDecl) -> BytecodeResult<()> {
        let mut stmts = &ctor.body.stmts[..];
        match ctor.explicit_call() {
            Some(call) => {
                if self.config().debug {
                    self.code.line(call.span.line());
                }
                self.gen_ctor_call(call)?;
                if call.kind == CtorCallKind::Super {
                    self.gen_instance_inits()?;
                }
                stmts = &stmts[1..];
            }
            None => {
                if self.config().debug {
                    self.code.line(ctor.span.line());
                }
                self.gen_implicit_super()?;
                self.gen_instance_inits()?;
            }
        }
        self.gen_stats(stmts)?;
        self.code.ret(&JType::Void)
    }

    fn gen_implicit_super(&mut self) -> BytecodeResult<()> {
        self.code.load(&JType::object(), 0);
        let (owner, params) = if self.cx.is_enum() {
            self.code.load(&JType::string(), 1);
            self.code.load(&JType::Int, 2);
            (JAVA_LANG_ENUM.to_string(), vec![JType::string(), JType::Int])
        } else if self.cx.decl.is_record() {
            (JAVA_LANG_RECORD.to_string(), Vec::new())
        } else {
            (self.cx.super_class(), Vec::new())
        };
        let desc = crate::wash::types::method_descriptor(&params, &JType::Void);
        let index = self.pool.try_add_method_ref(&owner, super::defs::CONSTRUCTOR_METHOD_NAME, &desc)?;
        self.code.invoke_init(index, &params)
    }

    fn gen_ctor_call(&mut self, call: &'a ExplicitCtorCall) -> BytecodeResult<()> {
        let r = self
            .attr()
            .ctors
            .get(&call.id)
            .cloned()
            .ok_or_else(|| BytecodeError::missing("constructor call"))?;
        self.code.load(&JType::object(), 0);
        let mut params = Vec::new();
        if self.cx.is_enum() {
            self.code.load(&JType::string(), 1);
            self.code.load(&JType::Int, 2);
            params.extend([JType::string(), JType::Int]);
        }
        self.gen_args(&call.args, &r)?;
        params.extend(r.params.iter().cloned());
        let desc = crate::wash::types::method_descriptor(&params, &JType::Void);
        let index = self.pool.try_add_method_ref(&r.owner, super::defs::CONSTRUCTOR_METHOD_NAME, &desc)?;
        self.code.invoke_init(index, &params)
    }

    /// Instance field initializers and initializer blocks.
    fn gen_instance_inits(&mut self) -> BytecodeResult<()> {
        let decl = self.cx.decl;
        for member in &decl.members {
            match member {
                Member::Field(f) if !f.modifiers.has(Modifier::Static) && !decl.is_interface_like() => {
                    for d in &f.declarators {
                        let Some(init) = &d.init else { continue };
                        let ty = self.field_type(&d.name)?;
                        if self.config().debug {
                            self.code.line(d.span.line());
                        }
                        self.code.load(&JType::object(), 0);
                        self.gen_expr_to(init, &ty)?;
                        let index = self.pool.try_add_field_ref(self.cx.class, &d.name, &ty.descriptor())?;
                        self.code.field(PUTFIELD, index, &ty)?;
                    }
                }
                Member::Initializer(i) if !i.is_static => self.gen_block(&i.body)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Static initializers in member order; constant fields are left to
    /// their `ConstantValue` attribute.
    pub(crate) fn gen_static_inits(&mut self) -> BytecodeResult<()> {
        let decl = self.cx.decl;
        for member in &decl.members {
            match member {
                Member::Field(f) if f.modifiers.has(Modifier::Static) || decl.is_interface_like() => {
                    for d in &f.declarators {
                        let Some(init) = &d.init else { continue };
                        let sym = self
                            .table()
                            .find_field(self.cx.class, &d.name)
                            .ok_or_else(|| BytecodeError::missing(format!("field {}", d.name)))?;
                        if sym.is_final && sym.constant.is_some() {
                            continue;
                        }
                        let ty = sym.ty.clone();
                        if self.config().debug {
                            self.code.line(d.span.line());
                        }
                        self.gen_expr_to(init, &ty)?;
                        let index = self.pool.try_add_field_ref(self.cx.class, &d.name, &ty.descriptor())?;
                        self.code.field(PUTSTATIC, index, &ty)?;
                    }
                }
                Member::Initializer(i) if i.is_static => self.gen_block(&i.body)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Creates every enum constant and the `$VALUES` array.
    pub(crate) fn gen_enum_constants(&mut self) -> BytecodeResult<()> {
        let decl = self.cx.decl;
        let class = self.cx.class;
        let this = JType::class(class);
        for (i, constant) in decl.enum_constants.iter().enumerate() {
            if self.config().debug {
                self.code.line(constant.span.line());
            }
            let r = self
                .attr()
                .enum_ctors
                .get(&(decl.id, i))
                .cloned()
                .ok_or_else(|| BytecodeError::missing(format!("constructor of {}", constant.name)))?;
            self.code.new_object(class, self.pool)?;
            self.code.dup(DUP)?;
            let name = self.pool.try_add_string(&constant.name)?;
            self.code.ldc(name, VType::object(crate::consts::JAVA_LANG_STRING))?;
            self.code.iconst(i as i32, self.pool)?;
            self.gen_args(&constant.args, &r)?;
            let mut params = vec![JType::string(), JType::Int];
            params.extend(r.params.iter().cloned());
            let desc = crate::wash::types::method_descriptor(&params, &JType::Void);
            let index = self.pool.try_add_method_ref(class, super::defs::CONSTRUCTOR_METHOD_NAME, &desc)?;
            self.code.invoke_init(index, &params)?;
            let field = self.pool.try_add_field_ref(class, &constant.name, &this.descriptor())?;
            self.code.field(PUTSTATIC, field, &this)?;
        }
        let values_type = JType::array_of(this.clone());
        let values = self.pool.try_add_method_ref(class, "$values", &format!("(){}", values_type.descriptor()))?;
        self.code.invoke(INVOKESTATIC, values, &[], &values_type)?;
        let field = self.pool.try_add_field_ref(class, "$VALUES", &values_type.descriptor())?;
        self.code.field(PUTSTATIC, field, &values_type)
    }

    fn field_type(&self, name: &str) -> BytecodeResult<JType> {
        self.table()
            .find_field(self.cx.class, name)
            .map(|f| f.ty.clone())
            .ok_or_else(|| BytecodeError::missing(format!("field {}", name)))
    }

    // ----- statements -----

    pub(super) fn gen_stats(&mut self, stmts: &'a [Stmt]) -> BytecodeResult<()> {
        for s in stmts {
            self.gen_stat(s)?;
        }
        Ok(())
    }

    pub(super) fn gen_block(&mut self, b: &'a Block) -> BytecodeResult<()> {
        let mark = self.open_scope();
        self.gen_stats(&b.stmts)?;
        self.close_scope(mark);
        Ok(())
    }

    /// A statement in its own scope (the branch of an `if`, a loop body).
    fn gen_nested(&mut self, s: &'a Stmt) -> BytecodeResult<()> {
        let mark = self.open_scope();
        self.gen_stat(s)?;
        self.close_scope(mark);
        Ok(())
    }

    pub(super) fn gen_stat(&mut self, s: &'a Stmt) -> BytecodeResult<()> {
        if self.config().debug && !matches!(s, Stmt::Block(_)) {
            self.code.line(s.span().line());
        }
        match s {
            Stmt::LocalVar(v) => {
                for d in &v.declarators {
                    let ty = self.attr().local_type(d.name_span);
                    let slot = self.declare(&d.name, &ty);
                    if let Some(init) = &d.init {
                        self.gen_expr_to(init, &ty)?;
                        self.code.store(&ty, slot)?;
                    }
                }
                Ok(())
            }
            Stmt::Expression(es) => self.gen_effect(&es.expr),
            Stmt::Block(b) => self.gen_block(b),
            Stmt::If(i) => {
                let otherwise = self.code.new_label();
                self.gen_cond(&i.cond, false, otherwise)?;
                self.gen_nested(&i.then_branch)?;
                match &i.else_branch {
                    Some(e) => {
                        let end = self.code.new_label();
                        self.code.goto(end)?;
                        self.code.place_if_used(otherwise)?;
                        self.gen_nested(e)?;
                        self.code.place_if_used(end)
                    }
                    None => self.code.place_if_used(otherwise),
                }
            }
            Stmt::While(w) => self.gen_while(None, w),
            Stmt::DoWhile(d) => self.gen_do_while(None, d),
            Stmt::For(f) => self.gen_for(None, f),
            Stmt::Labeled(l) => match l.body.as_ref() {
                Stmt::While(w) => self.gen_while(Some(&l.label), w),
                Stmt::DoWhile(d) => self.gen_do_while(Some(&l.label), d),
                Stmt::For(f) => self.gen_for(Some(&l.label), f),
                body => {
                    let exit = self.code.new_label();
                    self.env.push(GenContext::Labeled { label: &l.label, exit });
                    self.gen_nested(body)?;
                    self.env.pop();
                    self.code.place_if_used(exit)
                }
            },
            Stmt::Return(r) => self.gen_return(r),
            Stmt::Break(b) => {
                let target = self.find_target(b.label.as_deref(), false)?;
                let exit = match &self.env[target] {
                    GenContext::Loop { exit, .. } | GenContext::Labeled { exit, .. } | GenContext::Switch { exit } => *exit,
                    _ => return Err(BytecodeError::missing("break target")),
                };
                self.jump_out(target + 1, exit)
            }
            Stmt::Continue(c) => {
                let target = self.find_target(c.label.as_deref(), true)?;
                let GenContext::Loop { cont, .. } = &self.env[target] else {
                    return Err(BytecodeError::missing("continue target"));
                };
                let cont = *cont;
                self.jump_out(target + 1, cont)
            }
            Stmt::Yield(y) => {
                let target = self.switch_expr_target()?;
                let result = match &self.env[target] {
                    GenContext::SwitchExpr(sx) => sx.result.clone(),
                    _ => return Err(BytecodeError::missing("yield target")),
                };
                self.gen_expr_to(&y.value, &result)?;
                self.yield_value(target)
            }
            Stmt::Throw(t) => {
                self.gen_expr(&t.expr)?;
                self.code.athrow()
            }
            Stmt::Try(t) => self.gen_try(t),
            Stmt::Synchronized(s) => self.gen_synchronized(s),
            Stmt::Switch(sw) => self.gen_switch_stmt(sw),
            Stmt::ExplicitCtorCall(call) => Err(BytecodeError::missing(format!(
                "constructor call at line {} outside a constructor prologue",
                call.span.line()
            ))),
            Stmt::Empty(_) => Ok(()),
        }
    }

    fn gen_while(&mut self, label: Option<&'a str>, w: &'a WhileStmt) -> BytecodeResult<()> {
        let start = self.code.new_label();
        let exit = self.code.new_label();
        self.code.place(start)?;
        self.gen_cond(&w.cond, false, exit)?;
        self.env.push(GenContext::Loop { label, exit, cont: start });
        self.gen_nested(&w.body)?;
        self.env.pop();
        self.code.goto(start)?;
        self.code.place_if_used(exit)
    }

    fn gen_do_while(&mut self, label: Option<&'a str>, d: &'a DoWhileStmt) -> BytecodeResult<()> {
        let start = self.code.new_label();
        let cont = self.code.new_label();
        let exit = self.code.new_label();
        self.code.place(start)?;
        self.env.push(GenContext::Loop { label, exit, cont });
        self.gen_nested(&d.body)?;
        self.env.pop();
        self.code.place_if_used(cont)?;
        self.gen_cond(&d.cond, true, start)?;
        self.code.place_if_used(exit)
    }

    fn gen_for(&mut self, label: Option<&'a str>, f: &'a ForStmt) -> BytecodeResult<()> {
        let mark = self.open_scope();
        self.gen_stats(&f.init)?;
        let start = self.code.new_label();
        let cont = self.code.new_label();
        let exit = self.code.new_label();
        self.code.place(start)?;
        if let Some(cond) = &f.cond {
            self.gen_cond(cond, false, exit)?;
        }
        self.env.push(GenContext::Loop { label, exit, cont });
        self.gen_nested(&f.body)?;
        self.env.pop();
        self.code.place_if_used(cont)?;
        for u in &f.update {
            self.gen_effect(u)?;
        }
        self.code.goto(start)?;
        self.code.place_if_used(exit)?;
        self.close_scope(mark);
        Ok(())
    }

    fn gen_return(&mut self, r: &'a ReturnStmt) -> BytecodeResult<()> {
        let ret = self.return_type.clone();
        match &r.value {
            Some(v) => {
                self.gen_expr_to(v, &ret)?;
                if self.has_finalizers(0) {
                    let mark = self.code.begin_scope();
                    let slot = self.code.alloc_local(&ret);
                    self.code.store(&ret, slot)?;
                    let opened = self.unwind(0)?;
                    self.code.load(&ret, slot);
                    self.code.ret(&ret)?;
                    self.close_gaps(opened);
                    self.code.end_scope(mark);
                    Ok(())
                } else {
                    self.code.ret(&ret)
                }
            }
            None => {
                let opened = self.unwind(0)?;
                self.code.ret(&JType::Void)?;
                self.close_gaps(opened);
                Ok(())
            }
        }
    }

    // ----- jumps -----

    /// Index in `env` of the loop, label or switch a `break`/`continue`
    /// leaves.
    fn find_target(&self, label: Option<&str>, is_continue: bool) -> BytecodeResult<usize> {
        let found = self.env.iter().rposition(|c| match (c, label) {
            (GenContext::Loop { label: l, .. }, Some(name)) => *l == Some(name),
            (GenContext::Labeled { label: l, .. }, Some(name)) => !is_continue && *l == name,
            (GenContext::Loop { .. }, None) => true,
            (GenContext::Switch { .. }, None) => !is_continue,
            _ => false,
        });
        found.ok_or_else(|| BytecodeError::missing(format!("jump target {}", label.unwrap_or("<loop>"))))
    }

    pub(super) fn switch_expr_target(&self) -> BytecodeResult<usize> {
        self.env
            .iter()
            .rposition(|c| matches!(c, GenContext::SwitchExpr(_)))
            .ok_or_else(|| BytecodeError::missing("enclosing switch expression"))
    }

    /// Jumps to `target` after running the finalizers of `env[from..]`.
    fn jump_out(&mut self, from: usize, target: Label) -> BytecodeResult<()> {
        let opened = self.unwind(from)?;
        self.code.goto(target)?;
        self.close_gaps(opened);
        Ok(())
    }

    fn has_finalizers(&self, from: usize) -> bool {
        self.env[from.min(self.env.len())..]
            .iter()
            .any(|c| matches!(c, GenContext::Finally { .. } | GenContext::Monitor { .. }))
    }

    /// Inlines the finalizers of `env[from..]`, innermost first. Returns
    /// where each one's gap starts; [`Gen::close_gaps`] ends them after
    /// the jump.
    fn unwind(&mut self, from: usize) -> BytecodeResult<Vec<(usize, u16)>> {
        let mut opened = Vec::new();
        for i in (from..self.env.len()).rev() {
            let start = self.code.pc();
            match &self.env[i] {
                GenContext::Finally { body, .. } => {
                    let body = *body;
                    // the finalizer runs in the context it was declared in
                    let inner = self.env.split_off(i);
                    let result = self.gen_block(body);
                    self.env.extend(inner);
                    result?;
                }
                GenContext::Monitor { lock, .. } => {
                    let lock = *lock;
                    self.code.load(&JType::object(), lock);
                    self.code.monitor(MONITOREXIT)?;
                }
                _ => continue,
            }
            opened.push((i, start));
        }
        Ok(opened)
    }

    fn close_gaps(&mut self, opened: Vec<(usize, u16)>) {
        let end = self.code.pc();
        for (i, start) in opened {
            if let Some(GenContext::Finally { gaps, .. } | GenContext::Monitor { gaps, .. }) = self.env.get_mut(i) {
                gaps.push((start, end));
            }
        }
    }

    /// Leaves the switch expression at `env[target]` with its result on
    /// top of the stack.
    pub(super) fn yield_value(&mut self, target: usize) -> BytecodeResult<()> {
        let GenContext::SwitchExpr(sx) = &self.env[target] else {
            return Err(BytecodeError::missing("yield target"));
        };
        let sx = sx.clone();
        let result = VType::of(&sx.result);
        if sx.result_slot.is_none() && !self.has_finalizers(target + 1) {
            self.code.set_top(result)?;
            return self.code.goto(sx.exit);
        }
        let mark = self.code.begin_scope();
        let slot = match sx.result_slot {
            Some(slot) => slot,
            None => self.code.alloc_local(&sx.result),
        };
        self.code.store(&sx.result, slot)?;
        let opened = self.unwind(target + 1)?;
        for s in &sx.spilled {
            self.code.unspill(*s)?;
        }
        self.code.load(&sx.result, slot);
        self.code.set_top(result)?;
        self.code.goto(sx.exit)?;
        self.close_gaps(opened);
        if sx.result_slot.is_none() {
            self.code.end_scope(mark);
        }
        Ok(())
    }

    pub(super) fn push_switch(&mut self, exit: Label) {
        self.env.push(GenContext::Switch { exit });
    }

    /// Returns the index of the new context, the target of its yields.
    pub(super) fn push_switch_expr(&mut self, sx: SwitchExprContext) -> usize {
        self.env.push(GenContext::SwitchExpr(sx));
        self.env.len() - 1
    }

    pub(super) fn pop_context(&mut self) {
        self.env.pop();
    }

    // ----- exceptions -----

    /// Splits `[start, end)` around the gaps.
    fn ranges(start: u16, end: u16, gaps: &[(u16, u16)]) -> Vec<(u16, u16)> {
        let mut gaps = gaps.to_vec();
        gaps.sort_unstable();
        let mut out = Vec::new();
        let mut cur = start;
        for (gs, ge) in gaps {
            if ge <= cur || gs >= end {
                continue;
            }
            if gs > cur {
                out.push((cur, gs));
            }
            cur = cur.max(ge);
        }
        if cur < end {
            out.push((cur, end));
        }
        out
    }

    /// Runs the finalizer of the innermost `Finally` context (if the try
    /// has one) and jumps to `exit`.
    fn complete_try_part(&mut self, finalizer: Option<usize>, exit: Label) -> BytecodeResult<()> {
        if !self.code.is_alive() {
            return Ok(());
        }
        match finalizer {
            Some(i) => self.jump_out(i, exit),
            None => self.code.goto(exit),
        }
    }

    fn gen_try(&mut self, t: &'a TryStmt) -> BytecodeResult<()> {
        let locals = self.code.locals_snapshot();
        let exit = self.code.new_label();
        let finalizer = match &t.finally {
            Some(body) => {
                self.env.push(GenContext::Finally { body, gaps: Vec::new() });
                Some(self.env.len() - 1)
            }
            None => None,
        };
        let start = self.code.pc();
        self.gen_block(&t.body)?;
        let end = self.code.pc();
        self.complete_try_part(finalizer, exit)?;

        for c in &t.catches {
            let caught = self.attr().local_type(c.name_span);
            let caught_name = match &caught {
                JType::Class(n) => n.clone(),
                _ => JAVA_LANG_THROWABLE.to_string(),
            };
            let gaps = self.gaps_of(finalizer);
            let handler = self.code.new_label();
            for ty in &c.types {
                let class = match self.cx.resolve(ty, &[]) {
                    JType::Class(n) => n,
                    _ => JAVA_LANG_THROWABLE.to_string(),
                };
                let index = self.pool.try_add_class(&class)?;
                for (s, e) in Self::ranges(start, end, &gaps) {
                    self.code.add_handler(s, e, handler, index, &caught_name, &locals)?;
                }
            }
            self.code.place_if_used(handler)?;
            let mark = self.open_scope();
            if self.config().debug {
                self.code.line(c.span.line());
            }
            let slot = self.declare(&c.name, &caught);
            self.code.store(&caught, slot)?;
            self.gen_block(&c.body)?;
            self.close_scope(mark);
            self.complete_try_part(finalizer, exit)?;
        }

        if let (Some(i), Some(body)) = (finalizer, &t.finally) {
            let gaps = self.gaps_of(Some(i));
            self.env.truncate(i);
            let end_all = self.code.pc();
            let catch_all = self.code.new_label();
            for (s, e) in Self::ranges(start, end_all, &gaps) {
                self.code.add_handler(s, e, catch_all, 0, JAVA_LANG_THROWABLE, &locals)?;
            }
            self.code.place_if_used(catch_all)?;
            let mark = self.code.begin_scope();
            let thrown = JType::class(JAVA_LANG_THROWABLE);
            let slot = self.code.alloc_local(&thrown);
            self.code.store(&thrown, slot)?;
            self.gen_block(body)?;
            self.code.load(&thrown, slot);
            self.code.athrow()?;
            self.code.end_scope(mark);
        }
        self.code.place_if_used(exit)
    }

    fn gaps_of(&self, context: Option<usize>) -> Vec<(u16, u16)> {
        match context.and_then(|i| self.env.get(i)) {
            Some(GenContext::Finally { gaps, .. } | GenContext::Monitor { gaps, .. }) => gaps.clone(),
            _ => Vec::new(),
        }
    }

    fn gen_synchronized(&mut self, s: &'a SynchronizedStmt) -> BytecodeResult<()> {
        let object = JType::object();
        self.gen_expr_to(&s.lock, &object)?;
        self.code.dup(DUP)?;
        let mark = self.code.begin_scope();
        let lock = self.code.alloc_local(&object);
        self.code.store(&object, lock)?;
        self.code.monitor(MONITORENTER)?;
        let locals = self.code.locals_snapshot();
        let start = self.code.pc();
        self.env.push(GenContext::Monitor { lock, gaps: Vec::new() });
        let index = self.env.len() - 1;
        self.gen_block(&s.body)?;
        let exit = self.code.new_label();
        self.complete_try_part(Some(index), exit)?;
        let gaps = self.gaps_of(Some(index));
        self.env.truncate(index);
        let end = self.code.pc();
        let catch_all = self.code.new_label();
        for (s, e) in Self::ranges(start, end, &gaps) {
            self.code.add_handler(s, e, catch_all, 0, JAVA_LANG_THROWABLE, &locals)?;
        }
        self.code.place_if_used(catch_all)?;
        let thrown = JType::class(JAVA_LANG_THROWABLE);
        let slot = self.code.alloc_local(&thrown);
        self.code.store(&thrown, slot)?;
        self.code.load(&object, lock);
        self.code.monitor(MONITOREXIT)?;
        self.code.load(&thrown, slot);
        self.code.athrow()?;
        self.code.place_if_used(exit)?;
        self.code.end_scope(mark);
        Ok(())
    }

    // ----- calls -----

    /// Arguments converted to the parameter types, trailing ones packed
    /// into an array for a variable arity call.
    pub(super) fn gen_args(&mut self, args: &'a [Expr], r: &MethodRef) -> BytecodeResult<()> {
        if !r.pack_varargs {
            for (a, p) in args.iter().zip(&r.params) {
                self.gen_expr_to(a, p)?;
            }
            return Ok(());
        }
        let fixed = r.params.len().saturating_sub(1);
        for (a, p) in args.iter().zip(&r.params[..fixed]) {
            self.gen_expr_to(a, p)?;
        }
        let array = r.params.last().cloned().unwrap_or(JType::Error);
        let elem = array.element().cloned().unwrap_or_else(JType::object);
        let rest = args.get(fixed..).unwrap_or(&[]);
        self.code.iconst(rest.len() as i32, self.pool)?;
        self.code.new_array(&elem, self.pool)?;
        for (i, a) in rest.iter().enumerate() {
            self.code.dup(DUP)?;
            self.code.iconst(i as i32, self.pool)?;
            self.gen_expr_to(a, &elem)?;
            self.code.array_store(&elem)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_skip_gaps() {
        assert_eq!(Gen::ranges(0, 20, &[]), vec![(0, 20)]);
        assert_eq!(Gen::ranges(0, 20, &[(5, 8)]), vec![(0, 5), (8, 20)]);
        assert_eq!(Gen::ranges(0, 20, &[(12, 30), (0, 3)]), vec![(3, 12)]);
        assert!(Gen::ranges(4, 4, &[]).is_empty());
    }
}
