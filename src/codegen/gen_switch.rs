//! Switch statements and switch expressions.
//!
//! Both forms share the dispatch: an `int` selector switches directly,
//! an enum selector goes through the `$SwitchMap$` of the top-level class
//! and a `String` selector switches on `hashCode()` first, resolves
//! collisions with `equals` and then switches on the position of the
//! matching label.
//!
//! A switch expression leaves exactly one value of its result type on
//! top of whatever was on the stack before it. When an arm contains a
//! `try` or `synchronized` block that stack is spilled to locals first,
//! since an exception handler starts with an empty stack, and every
//! yield restores it beneath the result.

use std::collections::BTreeMap;

use super::code::Label;
use super::error::{BytecodeError, BytecodeResult};
use super::frame::VType;
use super::gen::{Gen, SwitchExprContext};
use super::opcodes::*;
use super::switch_map::java_string_hash;
use crate::ast::*;
use crate::consts::{
    INCOMPATIBLE_CLASS_CHANGE_ERROR, JAVA_LANG_OBJECT, JAVA_LANG_STRING, JAVA_LANG_THROWABLE, MATCH_EXCEPTION,
};
use crate::wash::attr::{CaseValue, SelectorKind, SwitchInfo};
use crate::wash::types::JType;

/// Whether any of `stmts` opens an exception handler, looking through
/// nested statements but not into expressions.
fn opens_handler(stmts: &[&Stmt]) -> bool {
    stmts
        .iter()
        .any(|s| matches!(s, Stmt::Try(_) | Stmt::Synchronized(_)) || opens_handler(&s.children()))
}

fn case_opens_handler(case: &SwitchCase) -> bool {
    match &case.body {
        CaseBody::Colon(stmts) => opens_handler(&stmts.iter().collect::<Vec<_>>()),
        CaseBody::Arrow(ArrowBody::Block(b)) => opens_handler(&b.stmts.iter().collect::<Vec<_>>()),
        CaseBody::Arrow(_) => false,
    }
}

impl<'a, 'p> Gen<'a, 'p> {
    fn switch_info(&self, selector: &Expr) -> Option<SwitchInfo> {
        self.attr()
            .switches
            .get(&selector.id)
            .filter(|i| !i.erroneous && i.selector_kind != SelectorKind::Invalid)
            .cloned()
    }

    fn case_value(&self, label: &Expr) -> BytecodeResult<CaseValue> {
        self.attr()
            .case_labels
            .get(&label.id)
            .cloned()
            .ok_or_else(|| BytecodeError::missing(format!("case label at line {}", label.span.line())))
    }

    pub(super) fn gen_switch_stmt(&mut self, sw: &'a SwitchStmt) -> BytecodeResult<()> {
        let Some(info) = self.switch_info(&sw.selector) else {
            return self.gen_unresolved();
        };
        let exit = self.code.new_label();
        let mark = self.open_scope();
        let labels = self.gen_dispatch(&sw.selector, &sw.cases, &info, exit)?;
        self.push_switch(exit);
        for (case, label) in sw.cases.iter().zip(labels) {
            self.code.place(label)?;
            match &case.body {
                CaseBody::Colon(stmts) => self.gen_stats(stmts)?,
                CaseBody::Arrow(ArrowBody::Expr(e)) => {
                    if self.config().debug {
                        self.code.line(e.span.line());
                    }
                    self.gen_effect(e)?;
                    self.code.goto(exit)?;
                }
                CaseBody::Arrow(ArrowBody::Block(b)) => {
                    self.gen_block(b)?;
                    self.code.goto(exit)?;
                }
                CaseBody::Arrow(ArrowBody::Throw(t)) => {
                    self.gen_expr(&t.expr)?;
                    self.code.athrow()?;
                }
            }
        }
        self.pop_context();
        self.close_scope(mark);
        self.code.place_if_used(exit)
    }

    pub(super) fn gen_switch_expr(&mut self, e: &'a Expr, sw: &'a SwitchExpr) -> BytecodeResult<()> {
        let Some(info) = self.switch_info(&sw.selector) else {
            return self.gen_unresolved();
        };
        let result = info.result_type.clone().unwrap_or_else(|| self.attr().type_of(e.id));
        if result.is_error() {
            return self.gen_unresolved();
        }

        let mark = self.open_scope();
        let mut spilled = Vec::new();
        let mut result_slot = None;
        if sw.cases.iter().any(case_opens_handler) {
            let below: Vec<VType> = self.code.stack().to_vec();
            for t in &below {
                let width = if t.size() == 2 { JType::Long } else { JType::Int };
                spilled.push(self.code.alloc_local(&width));
            }
            for slot in spilled.iter().rev() {
                self.code.spill(*slot)?;
            }
            result_slot = Some(self.code.alloc_local(&result));
            log::trace!("switch expression at line {} spills {} value(s)", e.span.line(), spilled.len());
        }

        let exit = self.code.new_label();
        let fallback = self.code.new_label();
        let labels = self.gen_dispatch(&sw.selector, &sw.cases, &info, fallback)?;
        let target = self.push_switch_expr(SwitchExprContext { exit, result: result.clone(), spilled, result_slot });
        for (case, label) in sw.cases.iter().zip(labels) {
            self.code.place(label)?;
            match &case.body {
                CaseBody::Colon(stmts) => self.gen_stats(stmts)?,
                CaseBody::Arrow(ArrowBody::Expr(value)) => {
                    if self.config().debug {
                        self.code.line(value.span.line());
                    }
                    self.gen_expr_to(value, &result)?;
                    self.yield_value(target)?;
                }
                CaseBody::Arrow(ArrowBody::Block(b)) => self.gen_block(b)?,
                CaseBody::Arrow(ArrowBody::Throw(t)) => {
                    self.gen_expr(&t.expr)?;
                    self.code.athrow()?;
                }
            }
        }
        if !sw.has_default() {
            self.code.place_if_used(fallback)?;
            self.gen_no_match()?;
        }
        self.pop_context();
        self.code.place(exit)?;
        self.close_scope(mark);
        Ok(())
    }

    /// Default of an exhaustive switch expression, reached only when the
    /// selector's class changed after compilation.
    fn gen_no_match(&mut self) -> BytecodeResult<()> {
        if self.config().uses_match_exception() {
            self.code.new_object(MATCH_EXCEPTION, self.pool)?;
            self.code.dup(DUP)?;
            self.code.aconst_null();
            self.code.aconst_null();
            let params = [JType::string(), JType::class(JAVA_LANG_THROWABLE)];
            let desc = crate::wash::types::method_descriptor(&params, &JType::Void);
            let init = self.pool.try_add_method_ref(MATCH_EXCEPTION, super::defs::CONSTRUCTOR_METHOD_NAME, &desc)?;
            self.code.invoke_init(init, &params)?;
        } else {
            self.code.new_object(INCOMPATIBLE_CLASS_CHANGE_ERROR, self.pool)?;
            self.code.dup(DUP)?;
            let init =
                self.pool
                    .try_add_method_ref(INCOMPATIBLE_CLASS_CHANGE_ERROR, super::defs::CONSTRUCTOR_METHOD_NAME, "()V")?;
            self.code.invoke_init(init, &[])?;
        }
        self.code.athrow()
    }

    /// Evaluates the selector and jumps to the label of the matching case.
    /// Returns one label per case; a `default` case also receives every
    /// unmatched value, otherwise `fallback` does.
    fn gen_dispatch(
        &mut self,
        selector: &'a Expr,
        cases: &'a [SwitchCase],
        info: &SwitchInfo,
        fallback: Label,
    ) -> BytecodeResult<Vec<Label>> {
        let labels: Vec<Label> = cases.iter().map(|_| self.code.new_label()).collect();
        let default = cases.iter().position(SwitchCase::is_default).map(|i| labels[i]).unwrap_or(fallback);
        let valued = cases.iter().zip(&labels).flat_map(|(case, label)| {
            case.labels.iter().filter_map(move |l| match l {
                CaseLabel::Expr(e) => Some((e, *label)),
                CaseLabel::Default(_) => None,
            })
        });
        let valued: Vec<(&Expr, Label)> = valued.collect();

        match &info.selector_kind {
            SelectorKind::Int(_) => {
                let mut keys = Vec::new();
                for (e, label) in valued {
                    match self.case_value(e)? {
                        CaseValue::Int(v) => keys.push((v, label)),
                        other => return Err(BytecodeError::missing(format!("int case label, found {:?}", other))),
                    }
                }
                self.gen_expr_to(selector, &JType::Int)?;
                self.code.switch(&keys, default)?;
            }
            SelectorKind::Enum(enum_name) => {
                let mut keys = Vec::new();
                for (e, label) in valued {
                    match self.case_value(e)? {
                        CaseValue::EnumConst { name, .. } => keys.push((self.maps.key(enum_name, &name), label)),
                        other => return Err(BytecodeError::missing(format!("enum case label, found {:?}", other))),
                    }
                }
                let map_type = JType::array_of(JType::Int);
                let holder = self.maps.holder().to_string();
                let field_name = self.maps.field_for(enum_name);
                let field = self.pool.try_add_field_ref(&holder, &field_name, &map_type.descriptor())?;
                self.code.field(GETSTATIC, field, &map_type)?;
                self.gen_expr_to(selector, &JType::class(enum_name))?;
                self.invoke_library(INVOKEVIRTUAL, enum_name, "ordinal", &[], &JType::Int)?;
                self.code.array_load(&JType::Int)?;
                self.code.switch(&keys, default)?;
            }
            SelectorKind::String => {
                let mut strings = Vec::new();
                for (e, label) in valued {
                    match self.case_value(e)? {
                        CaseValue::Str(s) => strings.push((s, label)),
                        other => return Err(BytecodeError::missing(format!("string case label, found {:?}", other))),
                    }
                }
                self.gen_string_dispatch(selector, &strings, default)?;
            }
            SelectorKind::Invalid => return Err(BytecodeError::missing("switch selector type")),
        }
        Ok(labels)
    }

    /// `switch (s.hashCode())` over buckets of labels, each bucket an
    /// `equals` chain recording the matched label's position, then
    /// `switch (position)` to the case labels.
    fn gen_string_dispatch(&mut self, selector: &'a Expr, strings: &[(String, Label)], default: Label) -> BytecodeResult<()> {
        let string = JType::string();
        let mark = self.code.begin_scope();
        let s = self.code.alloc_local(&string);
        let position = self.code.alloc_local(&JType::Int);
        self.gen_expr_to(selector, &string)?;
        self.code.store(&string, s)?;
        self.code.iconst(-1, self.pool)?;
        self.code.store(&JType::Int, position)?;

        let mut buckets: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (i, (value, _)) in strings.iter().enumerate() {
            buckets.entry(java_string_hash(value)).or_default().push(i);
        }
        let second = self.code.new_label();
        let bucket_labels: Vec<(i32, Label)> = buckets.keys().map(|h| (*h, self.code.new_label())).collect();
        self.code.load(&string, s);
        self.invoke_library(INVOKEVIRTUAL, JAVA_LANG_STRING, "hashCode", &[], &JType::Int)?;
        self.code.switch(&bucket_labels, second)?;

        for ((_, label), members) in bucket_labels.iter().zip(buckets.values()) {
            self.code.place(*label)?;
            for i in members {
                let next = self.code.new_label();
                self.code.load(&string, s);
                let literal = self.pool.try_add_string(&strings[*i].0)?;
                self.code.ldc(literal, VType::object(JAVA_LANG_STRING))?;
                self.invoke_library(INVOKEVIRTUAL, JAVA_LANG_STRING, "equals", &[JType::class(JAVA_LANG_OBJECT)], &JType::Boolean)?;
                self.code.jump_if(IFEQ, next)?;
                self.code.iconst(*i as i32, self.pool)?;
                self.code.store(&JType::Int, position)?;
                self.code.goto(second)?;
                self.code.place(next)?;
            }
            self.code.goto(second)?;
        }

        self.code.place(second)?;
        self.code.load(&JType::Int, position);
        let keys: Vec<(i32, Label)> = strings.iter().enumerate().map(|(i, (_, label))| (i as i32, *label)).collect();
        self.code.switch(&keys, default)?;
        self.code.end_scope(mark);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    fn empty_block() -> Block {
        Block { stmts: Vec::new(), span: Span::default() }
    }

    #[test]
    fn handlers_found_through_nesting() {
        let try_stmt = Stmt::Try(TryStmt {
            body: empty_block(),
            catches: Vec::new(),
            finally: Some(empty_block()),
            span: Span::default(),
        });
        let nested = Stmt::Block(Block { stmts: vec![try_stmt], span: Span::default() });
        assert!(opens_handler(&[&nested]));
        assert!(!opens_handler(&[&Stmt::Empty(Span::default())]));
    }
}
