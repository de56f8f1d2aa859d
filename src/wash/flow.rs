//! Flow phase: reachability, definite assignment and the jump rules of
//! switch expressions.
//!
//! Works like javac's AliveAnalyzer and AssignAnalyzer fused into one walk.
//! `alive` tracks whether the current point can be reached, `inits` the
//! variables definitely assigned there. Jumps record their `inits` on the
//! target they exit through; at a merge the recorded sets are intersected.
//! Dead code carries the universal set so merges ignore it.

use std::collections::{HashMap, HashSet};

use super::attr::{Attribution, NameRes};
use super::types::{ConstValue, JType};
use crate::ast::*;
use crate::diagnostics::{DiagnosticKind, DiagnosticSink};

/// Set of definitely assigned variables.
#[derive(Debug, Clone, Default, PartialEq)]
struct VarSet {
    bits: HashSet<usize>,
    /// Every variable, the state after an abrupt completion.
    all: bool,
}

impl VarSet {
    fn universe() -> Self {
        Self { bits: HashSet::new(), all: true }
    }

    fn contains(&self, v: usize) -> bool {
        self.all || self.bits.contains(&v)
    }

    fn insert(&mut self, v: usize) {
        if !self.all {
            self.bits.insert(v);
        }
    }

    fn intersect(&mut self, other: &VarSet) {
        if other.all {
            return;
        }
        if self.all {
            *self = other.clone();
            return;
        }
        self.bits.retain(|b| other.bits.contains(b));
    }

    fn union(&mut self, other: &VarSet) {
        if self.all {
            return;
        }
        if other.all {
            *self = VarSet::universe();
            return;
        }
        self.bits.extend(other.bits.iter().copied());
    }
}

/// Intersection of every set, `None` when there is none.
fn meet(sets: Vec<VarSet>) -> Option<VarSet> {
    let mut iter = sets.into_iter();
    let mut acc = iter.next()?;
    for s in iter {
        acc.intersect(&s);
    }
    Some(acc)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Loop,
    Switch,
    Labeled,
    SwitchExpression,
}

/// An enclosing statement that jumps can exit through.
#[derive(Debug)]
struct Target {
    kind: TargetKind,
    label: Option<String>,
    /// `inits` at each break (or yield, for switch expressions).
    breaks: Vec<VarSet>,
    continues: Vec<VarSet>,
}

impl Target {
    fn new(kind: TargetKind, label: Option<String>) -> Self {
        Self { kind, label, breaks: Vec::new(), continues: Vec::new() }
    }
}

struct Flow<'a> {
    unit: &'a CompilationUnit,
    attr: &'a Attribution,
    sink: &'a mut DiagnosticSink,
    class: String,
    alive: bool,
    inits: VarSet,
    vars: Vec<String>,
    scopes: Vec<Vec<(String, usize)>>,
    targets: Vec<Target>,
    /// Blank final fields being tracked, by name.
    fields: HashMap<String, usize>,
    tracked: Vec<(String, Span)>,
    fields_static: bool,
    in_ctor: bool,
    /// Switch expressions that drew an error here.
    erroneous: Vec<ExprId>,
}

/// Runs flow analysis over every declaration not in `skip` and marks the
/// switch expressions it rejected.
pub fn analyze(unit: &CompilationUnit, attr: &mut Attribution, skip: &HashSet<DeclId>, sink: &mut DiagnosticSink) {
    let erroneous = {
        let mut flow = Flow {
            unit,
            attr,
            sink,
            class: String::new(),
            alive: true,
            inits: VarSet::default(),
            vars: Vec::new(),
            scopes: Vec::new(),
            targets: Vec::new(),
            fields: HashMap::new(),
            tracked: Vec::new(),
            fields_static: false,
            in_ctor: false,
            erroneous: Vec::new(),
        };
        for id in unit.decls.ids().filter(|id| !skip.contains(id)) {
            flow.decl(id);
        }
        flow.erroneous
    };
    log::debug!("flow: {} switch(es) rejected", erroneous.len());
    for id in erroneous {
        if let Some(info) = attr.switches.get_mut(&id) {
            info.erroneous = true;
        }
    }
}

/// Blank final fields of `decl` with their name spans.
fn blank_finals(decl: &TypeDecl, want_static: bool) -> Vec<(String, Span)> {
    if decl.is_interface_like() {
        return Vec::new();
    }
    decl.fields()
        .filter(|f| f.modifiers.has(Modifier::Final) && f.modifiers.has(Modifier::Static) == want_static)
        .flat_map(|f| f.declarators.iter().filter(|d| d.init.is_none()).map(|d| (d.name.clone(), d.name_span)))
        .collect()
}

impl<'a> Flow<'a> {
    fn report(&mut self, kind: DiagnosticKind, span: Span) {
        self.sink.report(kind, span);
    }

    /// Fresh state for one body, tracking `fields`.
    fn reset(&mut self, fields: &[(String, Span)], is_static: bool) {
        self.alive = true;
        self.inits = VarSet::default();
        self.vars.clear();
        self.scopes = vec![Vec::new()];
        self.targets.clear();
        self.fields.clear();
        self.tracked = fields.to_vec();
        self.fields_static = is_static;
        self.in_ctor = false;
        for (name, _) in fields {
            let v = self.new_var(name);
            self.fields.insert(name.clone(), v);
        }
    }

    fn new_var(&mut self, name: &str) -> usize {
        self.vars.push(name.to_string());
        self.vars.len() - 1
    }

    fn declare(&mut self, name: &str, assigned: bool) -> usize {
        let v = self.new_var(name);
        if let Some(scope) = self.scopes.last_mut() {
            scope.push((name.to_string(), v));
        }
        if assigned {
            self.inits.insert(v);
        }
        v
    }

    fn lookup(&self, name: &str) -> Option<usize> {
        self.scopes.iter().rev().flat_map(|s| s.iter().rev()).find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    fn dead_code(&mut self) {
        self.alive = false;
        self.inits = VarSet::universe();
    }

    fn constant_true(&self, e: &Expr) -> bool {
        matches!(self.attr.constant(e.id), Some(ConstValue::Bool(true)))
    }

    /// Reports tracked fields not definitely assigned; `at` overrides the
    /// field's own span.
    fn check_fields(&mut self, fields: &[(String, Span)], at: Option<Span>) {
        for (name, span) in fields {
            let assigned = self.fields.get(name).map(|v| self.inits.contains(*v)).unwrap_or(true);
            if !assigned {
                self.report(DiagnosticKind::FieldMayNotBeInitialized(name.clone()), at.unwrap_or(*span));
            }
        }
    }

    // ----- declarations -----

    fn decl(&mut self, id: DeclId) {
        let unit = self.unit;
        let decl = &unit.decls[id];
        self.class = unit.binary_name(id);
        log::trace!("flow {}", self.class);

        let statics = blank_finals(decl, true);
        self.reset(&statics, true);
        for c in &decl.enum_constants {
            c.args.iter().for_each(|a| self.expr(a));
        }
        for member in &decl.members {
            match member {
                Member::Field(f) if f.modifiers.has(Modifier::Static) || decl.is_interface_like() => {
                    f.declarators.iter().filter_map(|d| d.init.as_ref()).for_each(|e| self.expr(e));
                }
                Member::Initializer(init) if init.is_static => self.block(&init.body),
                _ => {}
            }
        }
        self.check_fields(&statics, None);

        let instance = blank_finals(decl, false);
        self.reset(&instance, false);
        for member in &decl.members {
            match member {
                Member::Field(f) if !f.modifiers.has(Modifier::Static) && !decl.is_interface_like() => {
                    f.declarators.iter().filter_map(|d| d.init.as_ref()).for_each(|e| self.expr(e));
                }
                Member::Initializer(init) if !init.is_static => self.block(&init.body),
                _ => {}
            }
        }
        let field_inits = self.inits.clone();

        for member in &decl.members {
            match member {
                Member::Constructor(c) => self.constructor(c, &instance, &field_inits),
                Member::Method(m) => self.method(m),
                _ => {}
            }
        }
    }

    fn method(&mut self, m: &MethodDecl) {
        let Some(body) = &m.body else { return };
        self.reset(&[], m.is_static());
        for p in &m.params {
            self.declare(&p.name, true);
        }
        self.stmts(&body.stmts);
        if self.alive && !m.return_type.is_void() {
            self.report(DiagnosticKind::MissingReturn(m.return_type.to_string()), m.name_span);
        }
    }

    fn constructor(&mut self, c: &ConstructorDecl, fields: &[(String, Span)], field_inits: &VarSet) {
        self.reset(fields, false);
        self.in_ctor = true;
        let delegates = matches!(c.explicit_call(), Some(call) if call.kind == CtorCallKind::This);
        self.inits = if delegates { VarSet::universe() } else { field_inits.clone() };
        for p in &c.params {
            self.declare(&p.name, true);
        }
        let rest = match c.body.stmts.first() {
            Some(Stmt::ExplicitCtorCall(call)) => {
                call.args.iter().for_each(|a| self.expr(a));
                &c.body.stmts[1..]
            }
            _ => &c.body.stmts[..],
        };
        self.stmts(rest);
        if self.alive {
            let at = (c.origin == Origin::Source).then_some(c.name_span);
            self.check_fields(fields, at);
        }
    }

    // ----- statements -----

    fn block(&mut self, b: &Block) {
        self.scopes.push(Vec::new());
        self.stmts(&b.stmts);
        self.scopes.pop();
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        let mut reported = false;
        for s in stmts {
            if !self.alive && !reported {
                self.report(DiagnosticKind::UnreachableCode, s.span());
                reported = true;
                self.alive = true;
            }
            self.stmt(s, None);
        }
    }

    /// Statement in its own scope.
    fn nested(&mut self, s: &Stmt) {
        self.scopes.push(Vec::new());
        self.stmt(s, None);
        self.scopes.pop();
    }

    fn in_switch_expression(&self) -> bool {
        self.targets.iter().any(|t| t.kind == TargetKind::SwitchExpression)
    }

    fn stmt(&mut self, s: &Stmt, label: Option<String>) {
        match s {
            Stmt::LocalVar(v) => {
                for d in &v.declarators {
                    if let Some(init) = &d.init {
                        self.expr(init);
                    }
                    self.declare(&d.name, d.init.is_some());
                }
            }
            Stmt::Expression(es) => self.expr(&es.expr),
            Stmt::Block(b) => self.block(b),
            Stmt::Empty(_) => {}
            Stmt::If(i) => {
                self.expr(&i.cond);
                let start = self.inits.clone();
                self.nested(&i.then_branch);
                let (then_alive, then_inits) = (self.alive, self.inits.clone());
                self.alive = true;
                self.inits = start;
                if let Some(e) = &i.else_branch {
                    self.nested(e);
                }
                self.alive |= then_alive;
                self.inits.intersect(&then_inits);
            }
            Stmt::While(w) => {
                self.expr(&w.cond);
                let after_cond = self.inits.clone();
                self.targets.push(Target::new(TargetKind::Loop, label));
                self.nested(&w.body);
                let target = self.pop_target();
                self.loop_exit(self.constant_true(&w.cond), after_cond, target.breaks);
            }
            Stmt::DoWhile(d) => {
                self.targets.push(Target::new(TargetKind::Loop, label));
                self.nested(&d.body);
                let target = self.pop_target();
                let mut body_end = target.continues;
                if self.alive {
                    body_end.push(self.inits.clone());
                }
                let reaches_cond = !body_end.is_empty();
                self.inits = meet(body_end).unwrap_or_else(VarSet::universe);
                self.alive = reaches_cond;
                self.expr(&d.cond);
                let after_cond = if reaches_cond { self.inits.clone() } else { VarSet::universe() };
                let exits_normally = reaches_cond && !self.constant_true(&d.cond);
                let mut exits = target.breaks;
                if exits_normally {
                    exits.push(after_cond);
                }
                self.alive = !exits.is_empty();
                self.inits = meet(exits).unwrap_or_else(VarSet::universe);
            }
            Stmt::For(f) => {
                self.scopes.push(Vec::new());
                for s in &f.init {
                    self.stmt(s, None);
                }
                if let Some(c) = &f.cond {
                    self.expr(c);
                }
                let after_cond = self.inits.clone();
                self.targets.push(Target::new(TargetKind::Loop, label));
                self.nested(&f.body);
                let target = self.pop_target();
                let mut body_end = target.continues;
                if self.alive {
                    body_end.push(self.inits.clone());
                }
                if let Some(inits) = meet(body_end) {
                    self.alive = true;
                    self.inits = inits;
                    f.update.iter().for_each(|u| self.expr(u));
                }
                let forever = f.cond.as_ref().map(|c| self.constant_true(c)).unwrap_or(true);
                self.loop_exit(forever, after_cond, target.breaks);
                self.scopes.pop();
            }
            Stmt::Labeled(l) => match l.body.as_ref() {
                Stmt::While(_) | Stmt::DoWhile(_) | Stmt::For(_) | Stmt::Switch(_) => {
                    self.stmt(&l.body, Some(l.label.clone()))
                }
                body => {
                    self.targets.push(Target::new(TargetKind::Labeled, Some(l.label.clone())));
                    self.nested(body);
                    let target = self.pop_target();
                    self.merge_breaks(target.breaks);
                }
            },
            Stmt::Switch(sw) => self.switch_stmt(sw, label),
            Stmt::Return(r) => {
                if let Some(v) = &r.value {
                    self.expr(v);
                }
                if self.in_switch_expression() {
                    self.report(DiagnosticKind::ReturnInSwitchExpression, r.span);
                } else if self.in_ctor {
                    let tracked = self.tracked.clone();
                    self.check_fields(&tracked, Some(r.span));
                }
                self.dead_code();
            }
            Stmt::Break(b) => {
                match self.jump_target(b.label.as_deref(), false) {
                    Ok(i) => {
                        let inits = self.inits.clone();
                        self.targets[i].breaks.push(inits);
                    }
                    Err(kind) => self.report(kind, b.span),
                }
                self.dead_code();
            }
            Stmt::Continue(c) => {
                match self.jump_target(c.label.as_deref(), true) {
                    Ok(i) => {
                        let inits = self.inits.clone();
                        self.targets[i].continues.push(inits);
                    }
                    Err(kind) => self.report(kind, c.span),
                }
                self.dead_code();
            }
            Stmt::Yield(y) => {
                self.expr(&y.value);
                let inits = self.inits.clone();
                if let Some(t) = self.targets.iter_mut().rev().find(|t| t.kind == TargetKind::SwitchExpression) {
                    t.breaks.push(inits);
                }
                self.dead_code();
            }
            Stmt::Throw(t) => {
                self.expr(&t.expr);
                self.dead_code();
            }
            Stmt::Try(t) => self.try_stmt(t),
            Stmt::Synchronized(s) => {
                self.expr(&s.lock);
                self.block(&s.body);
            }
            Stmt::ExplicitCtorCall(call) => {
                let kind = if self.in_switch_expression() {
                    DiagnosticKind::ExplicitCallInSwitchExpression
                } else {
                    DiagnosticKind::MisplacedConstructorCall
                };
                self.report(kind, call.span);
                call.args.iter().for_each(|a| self.expr(a));
            }
        }
    }

    fn pop_target(&mut self) -> Target {
        self.targets.pop().unwrap_or_else(|| Target::new(TargetKind::Labeled, None))
    }

    /// State after a loop: the condition turning false (unless constant
    /// true) or any break.
    fn loop_exit(&mut self, forever: bool, after_cond: VarSet, breaks: Vec<VarSet>) {
        let mut exits = breaks;
        if !forever {
            exits.push(after_cond);
        }
        self.alive = !exits.is_empty();
        self.inits = meet(exits).unwrap_or_else(VarSet::universe);
    }

    fn merge_breaks(&mut self, breaks: Vec<VarSet>) {
        if breaks.is_empty() {
            return;
        }
        let mut exits = breaks;
        if self.alive {
            exits.push(self.inits.clone());
        }
        self.alive = true;
        self.inits = meet(exits).unwrap_or_else(VarSet::universe);
    }

    /// Index of the target a break or continue exits through.
    fn jump_target(&self, label: Option<&str>, is_continue: bool) -> Result<usize, DiagnosticKind> {
        for (i, t) in self.targets.iter().enumerate().rev() {
            if t.kind == TargetKind::SwitchExpression {
                return Err(if is_continue {
                    DiagnosticKind::ContinueOutOfSwitchExpression
                } else {
                    DiagnosticKind::BreakOutOfSwitchExpression
                });
            }
            let hit = match label {
                Some(l) => t.label.as_deref() == Some(l),
                None => t.kind == TargetKind::Loop || (!is_continue && t.kind == TargetKind::Switch),
            };
            if hit {
                if is_continue && t.kind != TargetKind::Loop {
                    return Err(DiagnosticKind::ContinueOutsideLoop);
                }
                return Ok(i);
            }
        }
        Err(match label {
            Some(l) => DiagnosticKind::MissingLabel(l.to_string()),
            None if is_continue => DiagnosticKind::ContinueOutsideLoop,
            None => DiagnosticKind::BreakOutsideLoop,
        })
    }

    fn try_stmt(&mut self, t: &TryStmt) {
        let start = self.inits.clone();
        self.block(&t.body);
        let mut alive = self.alive;
        let mut inits = self.inits.clone();
        for c in &t.catches {
            self.alive = true;
            self.inits = start.clone();
            self.scopes.push(Vec::new());
            self.declare(&c.name, true);
            self.block(&c.body);
            self.scopes.pop();
            if self.alive {
                inits.intersect(&self.inits);
            }
            alive |= self.alive;
        }
        if let Some(f) = &t.finally {
            self.alive = true;
            self.inits = start;
            self.block(f);
            let finally_alive = self.alive;
            inits.union(&self.inits);
            alive &= finally_alive;
        }
        self.alive = alive;
        self.inits = if alive { inits } else { VarSet::universe() };
    }

    fn switch_stmt(&mut self, sw: &SwitchStmt, label: Option<String>) {
        self.expr(&sw.selector);
        let start = self.inits.clone();
        self.targets.push(Target::new(TargetKind::Switch, label));
        self.cases(&sw.cases, &start, false);
        let target = self.pop_target();
        let mut exits = target.breaks;
        let has_default = self.attr.switches.get(&sw.selector.id).map(|i| i.has_default).unwrap_or(true);
        if !has_default {
            exits.push(start);
        }
        self.alive = !exits.is_empty();
        self.inits = meet(exits).unwrap_or_else(VarSet::universe);
    }

    fn switch_expression(&mut self, sw: &SwitchExpr) {
        let mark = self.sink.len();
        self.expr(&sw.selector);
        let start = self.inits.clone();
        let alive = self.alive;
        self.targets.push(Target::new(TargetKind::SwitchExpression, None));
        self.cases(&sw.cases, &start, true);
        let target = self.pop_target();
        self.alive = alive;
        self.inits = meet(target.breaks).unwrap_or(start);
        if self.sink.has_errors_since(mark) {
            self.erroneous.push(sw.selector.id);
        }
    }

    /// Walks the case bodies of a switch. The innermost target collects
    /// the exits; colon groups fall through into the next group.
    fn cases(&mut self, cases: &[SwitchCase], start: &VarSet, expression: bool) {
        self.scopes.push(Vec::new());
        let mut falls_through = false;
        let last = cases.len().saturating_sub(1);
        for (i, case) in cases.iter().enumerate() {
            if falls_through && self.alive {
                self.inits.intersect(start);
            } else {
                self.inits = start.clone();
            }
            self.alive = true;
            falls_through = false;
            match &case.body {
                CaseBody::Colon(stmts) => {
                    self.stmts(stmts);
                    if expression {
                        self.check_last_statement(stmts.last());
                    }
                    falls_through = true;
                    if i == last && self.alive {
                        if expression {
                            self.report(DiagnosticKind::ArmCompletesNormally, case.span);
                        } else {
                            self.exit_switch();
                        }
                    }
                }
                CaseBody::Arrow(ArrowBody::Expr(arm)) => {
                    self.expr(arm);
                    self.exit_switch();
                }
                CaseBody::Arrow(ArrowBody::Block(b)) => {
                    self.block(b);
                    if expression {
                        self.check_last_statement(b.stmts.last());
                        if self.alive {
                            self.report(DiagnosticKind::ArmCompletesNormally, b.span);
                        }
                    } else if self.alive {
                        self.exit_switch();
                    }
                }
                CaseBody::Arrow(ArrowBody::Throw(t)) => self.expr(&t.expr),
            }
            if !falls_through {
                self.dead_code();
            }
        }
        self.scopes.pop();
    }

    /// Records the current state as leaving the innermost switch.
    fn exit_switch(&mut self) {
        let inits = self.inits.clone();
        if let Some(t) = self.targets.last_mut() {
            t.breaks.push(inits);
        }
        self.dead_code();
    }

    fn check_last_statement(&mut self, last: Option<&Stmt>) {
        if let Some(s @ (Stmt::Continue(_) | Stmt::Return(_))) = last {
            self.report(DiagnosticKind::ContinueOrReturnLast, s.span());
        }
    }

    // ----- expressions -----

    fn use_local(&mut self, name: &str, span: Span) {
        let Some(v) = self.lookup(name) else { return };
        if !self.inits.contains(v) {
            self.report(DiagnosticKind::LocalMayNotBeInitialized(name.to_string()), span);
            self.inits.insert(v);
        }
    }

    /// Variable an assignment to `target` definitely assigns, if tracked.
    fn assigned_var(&self, target: &Expr) -> Option<usize> {
        let target = target.unparenthesized();
        match (self.attr.names.get(&target.id), &target.kind) {
            (Some(NameRes::Local(_)), ExprKind::Name(n)) => self.lookup(n),
            (Some(NameRes::Field(f)), kind) => {
                let simple = match kind {
                    ExprKind::Name(_) => true,
                    ExprKind::FieldAccess { target, .. } => matches!(target.kind, ExprKind::This),
                    _ => false,
                };
                (simple && f.owner == self.class && f.is_static == self.fields_static)
                    .then(|| self.fields.get(&f.name).copied())
                    .flatten()
            }
            _ => None,
        }
    }

    fn expr(&mut self, e: &Expr) {
        match &e.kind {
            ExprKind::Literal(_) | ExprKind::This | ExprKind::Super | ExprKind::ClassLit(_) => {}
            ExprKind::Name(n) => {
                if let Some(NameRes::Local(_)) = self.attr.names.get(&e.id) {
                    self.use_local(n, e.span);
                }
            }
            ExprKind::FieldAccess { target, .. } => self.expr(target),
            ExprKind::MethodCall { target, args, .. } => {
                if let Some(t) = target {
                    self.expr(t);
                }
                args.iter().for_each(|a| self.expr(a));
            }
            ExprKind::New { args, .. } => args.iter().for_each(|a| self.expr(a)),
            ExprKind::NewArray { dims, init, .. } => {
                dims.iter().for_each(|d| self.expr(d));
                if let Some(items) = init {
                    items.iter().for_each(|i| self.expr(i));
                }
            }
            ExprKind::ArrayInit(items) => items.iter().for_each(|i| self.expr(i)),
            ExprKind::ArrayAccess { array, index } => {
                self.expr(array);
                self.expr(index);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::IncDec { target, .. } => self.expr(target),
            ExprKind::Binary { op: BinaryOp::And | BinaryOp::Or, left, right } => {
                self.expr(left);
                let after_left = self.inits.clone();
                self.expr(right);
                self.inits = after_left;
            }
            ExprKind::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Assign { op, target, value } => match self.assigned_var(target) {
                Some(v) => {
                    if op.is_some() {
                        self.expr(target);
                    }
                    self.expr(value);
                    self.inits.insert(v);
                }
                None => {
                    self.expr(target);
                    self.expr(value);
                }
            },
            ExprKind::Conditional { cond, then_expr, else_expr } => {
                self.expr(cond);
                let start = self.inits.clone();
                self.expr(then_expr);
                let then_inits = std::mem::replace(&mut self.inits, start);
                self.expr(else_expr);
                self.inits.intersect(&then_inits);
            }
            ExprKind::Cast { expr, .. } | ExprKind::InstanceOf { expr, .. } => self.expr(expr),
            ExprKind::Parenthesized(inner) => self.expr(inner),
            ExprKind::Switch(sw) => self.switch_expression(sw),
            ExprKind::Lambda(l) => self.lambda(e, l),
        }
    }

    /// A lambda body is its own method: jumps cannot leave it and blank
    /// finals are not assigned by it. Captured locals must be assigned
    /// before it.
    fn lambda(&mut self, e: &Expr, l: &LambdaExpr) {
        let alive = self.alive;
        let inits = self.inits.clone();
        let targets = std::mem::take(&mut self.targets);
        let fields = std::mem::take(&mut self.fields);
        let in_ctor = std::mem::replace(&mut self.in_ctor, false);
        self.alive = true;
        self.scopes.push(Vec::new());
        for p in &l.params {
            self.declare(&p.name, true);
        }
        match &l.body {
            LambdaBody::Expr(value) => self.expr(value),
            LambdaBody::Block(b) => {
                self.stmts(&b.stmts);
                let ret = self.attr.lambdas.get(&e.id).map(|info| &info.method.ret);
                if let Some(ret) = ret.filter(|r| self.alive && **r != JType::Void) {
                    self.report(DiagnosticKind::MissingReturn(ret.java_name()), b.span);
                }
            }
        }
        self.scopes.pop();
        self.alive = alive;
        self.inits = inits;
        self.targets = targets;
        self.fields = fields;
        self.in_ctor = in_ctor;
    }
}
