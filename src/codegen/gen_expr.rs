//! Expression and condition code generation.
//!
//! Values are produced in the type attribution gave them and converted
//! with [`Gen::coerce`] where the context expects another type. Boolean
//! expressions in branch position never materialize a value; see
//! [`Gen::gen_cond`], which plays the part of javac's `CondItem`.

use super::error::{BytecodeError, BytecodeResult};
use super::frame::VType;
use super::defs::ref_kinds::REF_INVOKE_STATIC;
use super::gen::Gen;
use super::lambda::PendingLambda;
use super::opcodes::*;
use crate::ast::*;
use crate::consts::{
    JAVA_LANG_CLASS, JAVA_LANG_OBJECT, JAVA_LANG_STRING, JAVA_LANG_STRING_BUILDER, LAMBDA_METAFACTORY,
    METAFACTORY_DESCRIPTOR,
};
use crate::wash::attr::{InvokeKind, MethodRef, NameRes};
use crate::wash::symtab::coerce_constant;
use crate::wash::types::{binary_promotion, method_descriptor, ConstValue, JType};

const INIT: &str = super::defs::CONSTRUCTOR_METHOD_NAME;

/// An assignable location, with its operands already on the stack.
#[derive(Debug, Clone)]
enum Place {
    Local { slot: u16, ty: JType },
    Static { index: u16, ty: JType },
    Field { index: u16, ty: JType },
    Array { elem: JType },
}

impl Place {
    fn ty(&self) -> &JType {
        match self {
            Place::Local { ty, .. } | Place::Static { ty, .. } | Place::Field { ty, .. } => ty,
            Place::Array { elem } => elem,
        }
    }

    /// Stack slots taken by the receiver or array and index.
    fn operand_slots(&self) -> u16 {
        match self {
            Place::Local { .. } | Place::Static { .. } => 0,
            Place::Field { .. } => 1,
            Place::Array { .. } => 2,
        }
    }
}

fn arith_op(op: BinaryOp) -> Option<u8> {
    Some(match op {
        BinaryOp::Add => IADD,
        BinaryOp::Sub => ISUB,
        BinaryOp::Mul => IMUL,
        BinaryOp::Div => IDIV,
        BinaryOp::Rem => IREM,
        BinaryOp::Shl => ISHL,
        BinaryOp::Shr => ISHR,
        BinaryOp::UShr => IUSHR,
        BinaryOp::BitAnd => IAND,
        BinaryOp::BitOr => IOR,
        BinaryOp::BitXor => IXOR,
        _ => return None,
    })
}

/// `if<cond>` and `if_icmp<cond>` for a comparison operator.
fn compare_ops(op: BinaryOp) -> (u8, u8) {
    match op {
        BinaryOp::Eq => (IFEQ, IF_ICMPEQ),
        BinaryOp::Ne => (IFNE, IF_ICMPNE),
        BinaryOp::Lt => (IFLT, IF_ICMPLT),
        BinaryOp::Ge => (IFGE, IF_ICMPGE),
        BinaryOp::Gt => (IFGT, IF_ICMPGT),
        _ => (IFLE, IF_ICMPLE),
    }
}

fn is_null_literal(e: &Expr) -> bool {
    matches!(e.unparenthesized().kind, ExprKind::Literal(Literal::Null))
}

fn primitive_keyword(t: &JType) -> &'static str {
    match t {
        JType::Boolean => "boolean",
        JType::Byte => "byte",
        JType::Short => "short",
        JType::Char => "char",
        JType::Long => "long",
        JType::Float => "float",
        JType::Double => "double",
        _ => "int",
    }
}

impl<'a, 'p> Gen<'a, 'p> {
    /// Compile-time value of `e`, literals included.
    pub(super) fn constant_of(&self, e: &Expr) -> Option<ConstValue> {
        if let Some(c) = self.attr().constant(e.id) {
            return Some(c.clone());
        }
        match &e.kind {
            ExprKind::Literal(lit) => match lit {
                Literal::Int(v) => Some(ConstValue::Int(*v)),
                Literal::Char(c) => Some(ConstValue::Int(i32::from(*c))),
                Literal::Long(v) => Some(ConstValue::Long(*v)),
                Literal::Float(v) => Some(ConstValue::Float(*v)),
                Literal::Double(v) => Some(ConstValue::Double(*v)),
                Literal::Bool(b) => Some(ConstValue::Bool(*b)),
                Literal::String(s) => Some(ConstValue::Str(s.clone())),
                Literal::Null => None,
            },
            _ => None,
        }
    }

    pub(super) fn push_constant(&mut self, c: &ConstValue) -> BytecodeResult<()> {
        match c {
            ConstValue::Int(v) => self.code.iconst(*v, self.pool),
            ConstValue::Bool(b) => self.code.iconst(i32::from(*b), self.pool),
            ConstValue::Long(v) => self.code.lconst(*v, self.pool),
            ConstValue::Float(v) => self.code.fconst(*v, self.pool),
            ConstValue::Double(v) => self.code.dconst(*v, self.pool),
            ConstValue::Str(s) => {
                let index = self.pool.try_add_string(s)?;
                self.code.ldc(index, VType::object(JAVA_LANG_STRING))
            }
        }
    }

    /// Evaluates `e` converted to `to`.
    pub(super) fn gen_expr_to(&mut self, e: &'a Expr, to: &JType) -> BytecodeResult<()> {
        if to.is_primitive() {
            if let Some(c) = self.constant_of(e).and_then(|c| coerce_constant(&c, to)) {
                return self.push_constant(&c);
            }
        }
        self.gen_expr(e)?;
        let from = self.attr().type_of(e.id);
        self.coerce(&from, to)
    }

    /// Evaluates `e` for its side effects only.
    pub(super) fn gen_effect(&mut self, e: &'a Expr) -> BytecodeResult<()> {
        match &e.kind {
            ExprKind::Assign { .. } => self.gen_assign(e, false),
            ExprKind::IncDec { .. } => self.gen_incdec(e, false),
            ExprKind::Parenthesized(inner) => self.gen_effect(inner),
            _ => {
                let depth = self.code.stack_depth();
                self.gen_expr(e)?;
                if self.code.is_alive() && self.code.stack_depth() > depth {
                    self.code.pop_value()?;
                }
                Ok(())
            }
        }
    }

    /// Code that fails at run time where analysis found an error.
    pub(super) fn gen_unresolved(&mut self) -> BytecodeResult<()> {
        let error = "java/lang/Error";
        self.code.new_object(error, self.pool)?;
        self.code.dup(DUP)?;
        let message = self.pool.try_add_string("Unresolved compilation problem")?;
        self.code.ldc(message, VType::object(JAVA_LANG_STRING))?;
        let init = self.pool.try_add_method_ref(error, INIT, "(Ljava/lang/String;)V")?;
        self.code.invoke_init(init, &[JType::string()])?;
        self.code.athrow()
    }

    /// Pushes the value of `e` in its attributed type.
    pub(super) fn gen_expr(&mut self, e: &'a Expr) -> BytecodeResult<()> {
        let ty = self.attr().type_of(e.id);
        if ty.is_error() {
            return self.gen_unresolved();
        }
        if ty.is_primitive() || ty.is_string() {
            if let Some(c) = self.attr().constant(e.id) {
                let c = coerce_constant(c, &ty).unwrap_or_else(|| c.clone());
                return self.push_constant(&c);
            }
        }
        match &e.kind {
            ExprKind::Literal(Literal::Null) => {
                self.code.aconst_null();
                Ok(())
            }
            ExprKind::Literal(_) => match self.constant_of(e) {
                Some(c) => self.push_constant(&c),
                None => Err(BytecodeError::missing("literal value")),
            },
            ExprKind::Name(n) => self.gen_name(e, n),
            ExprKind::This | ExprKind::Super => {
                self.code.load(&JType::Class(self.cx.class.to_string()), 0);
                Ok(())
            }
            ExprKind::FieldAccess { target, .. } => self.gen_field_access(e, target),
            ExprKind::MethodCall { target, args, .. } => self.gen_call(e, target.as_deref(), args),
            ExprKind::New { args, .. } => {
                let r = self.ctor_ref(e.id)?;
                let class = ty.internal_name();
                self.code.new_object(&class, self.pool)?;
                self.code.dup(DUP)?;
                self.gen_args(args, &r)?;
                let index = self.pool.try_add_method_ref(&class, INIT, &method_descriptor(&r.params, &JType::Void))?;
                self.code.invoke_init(index, &r.params)
            }
            ExprKind::NewArray { dims, init, .. } => match init {
                Some(items) => self.gen_array_init(&ty, items),
                None if dims.len() == 1 => {
                    self.gen_expr_to(&dims[0], &JType::Int)?;
                    let elem = ty.element().cloned().unwrap_or(JType::Error);
                    self.code.new_array(&elem, self.pool)
                }
                None => {
                    for d in dims {
                        self.gen_expr_to(d, &JType::Int)?;
                    }
                    self.code.multianewarray(&ty, dims.len() as u8, self.pool)
                }
            },
            ExprKind::ArrayInit(items) => self.gen_array_init(&ty, items),
            ExprKind::ArrayAccess { array, index } => {
                self.gen_expr(array)?;
                self.gen_expr_to(index, &JType::Int)?;
                self.code.array_load(&ty)
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Plus => self.gen_expr_to(operand, &ty),
                UnaryOp::Neg => {
                    self.gen_expr_to(operand, &ty)?;
                    self.code.neg(&ty)
                }
                UnaryOp::BitNot => {
                    self.gen_expr_to(operand, &ty)?;
                    if ty == JType::Long {
                        self.code.lconst(-1, self.pool)?;
                    } else {
                        self.code.iconst(-1, self.pool)?;
                    }
                    self.code.arith(IXOR, &ty)
                }
                UnaryOp::Not => {
                    self.gen_expr_to(operand, &JType::Boolean)?;
                    self.code.iconst(1, self.pool)?;
                    self.code.arith(IXOR, &JType::Boolean)
                }
            },
            ExprKind::IncDec { .. } => self.gen_incdec(e, true),
            ExprKind::Assign { .. } => self.gen_assign(e, true),
            ExprKind::Binary { op, left, right } => self.gen_binary(e, *op, left, right, &ty),
            ExprKind::Conditional { cond, then_expr, else_expr } => {
                let otherwise = self.code.new_label();
                let end = self.code.new_label();
                self.gen_cond(cond, false, otherwise)?;
                self.gen_expr_to(then_expr, &ty)?;
                self.code.set_top(VType::of(&ty))?;
                self.code.goto(end)?;
                self.code.place_if_used(otherwise)?;
                self.gen_expr_to(else_expr, &ty)?;
                self.code.set_top(VType::of(&ty))?;
                self.code.place_if_used(end)
            }
            ExprKind::Cast { expr, .. } => self.gen_expr_to(expr, &ty),
            ExprKind::InstanceOf { expr, .. } => {
                let operand = self.type_operand(e.id)?;
                self.gen_expr(expr)?;
                self.code.instance_of(&operand, self.pool)
            }
            ExprKind::ClassLit(_) => {
                let operand = self.type_operand(e.id)?;
                self.gen_class_literal(&operand)
            }
            ExprKind::Switch(sw) => self.gen_switch_expr(e, sw),
            ExprKind::Lambda(l) => self.gen_lambda(e, l),
            ExprKind::Parenthesized(inner) => self.gen_expr_to(inner, &ty),
        }
    }

    /// The captured values handed to a `metafactory` call site; the body
    /// is queued as a synthetic method of this class.
    fn gen_lambda(&mut self, e: &'a Expr, l: &'a LambdaExpr) -> BytecodeResult<()> {
        let info = self.attr().lambdas.get(&e.id).ok_or_else(|| BytecodeError::missing("lambda"))?;
        let mut captured = Vec::new();
        if info.captures_this {
            let this = JType::class(self.cx.class);
            self.code.load(&this, 0);
            captured.push(this);
        }
        for c in &info.captures {
            let (slot, ty) = self.local(&c.name)?;
            self.code.load(&ty, slot);
            captured.push(ty);
        }

        let sam = &info.method;
        let erased = method_descriptor(&sam.params, &sam.ret);
        let impl_params: Vec<JType> = captured.iter().chain(&sam.params).cloned().collect();
        let descriptor = method_descriptor(&impl_params, &sam.ret);
        let name = self.synthetics.lambda_name();
        let body = if self.cx.decl.is_interface_like() {
            self.pool.try_add_interface_method_ref(self.cx.class, &name, &descriptor)?
        } else {
            self.pool.try_add_method_ref(self.cx.class, &name, &descriptor)?
        };
        let body = self.pool.try_add_method_handle(REF_INVOKE_STATIC, body)?;
        let metafactory = self.pool.try_add_method_ref(LAMBDA_METAFACTORY, "metafactory", METAFACTORY_DESCRIPTOR)?;
        let metafactory = self.pool.try_add_method_handle(REF_INVOKE_STATIC, metafactory)?;
        let erased = self.pool.try_add_method_type(&erased)?;
        let index = self.synthetics.bootstraps.add(metafactory, vec![erased, body, erased]);

        let interface = JType::class(&info.interface);
        let call_site = self.pool.try_add_invoke_dynamic(index, &sam.name, &method_descriptor(&captured, &interface))?;
        self.code.invoke_dynamic(call_site, &captured, &interface)?;
        let enclosing = self.synthetics.enclosing.clone();
        self.synthetics.lambdas.push(PendingLambda { expr: e, lambda: l, name, descriptor, enclosing });
        Ok(())
    }

    fn type_operand(&self, id: ExprId) -> BytecodeResult<JType> {
        self.attr()
            .type_operands
            .get(&id)
            .cloned()
            .ok_or_else(|| BytecodeError::missing("type operand"))
    }

    fn ctor_ref(&self, id: ExprId) -> BytecodeResult<MethodRef> {
        self.attr().ctors.get(&id).cloned().ok_or_else(|| BytecodeError::missing("constructor"))
    }

    fn is_type_name(&self, e: &Expr) -> bool {
        matches!(self.attr().names.get(&e.id), Some(NameRes::Type(_)))
    }

    fn gen_name(&mut self, e: &'a Expr, name: &str) -> BytecodeResult<()> {
        match self.attr().names.get(&e.id) {
            Some(NameRes::Local(_)) => {
                let (slot, ty) = self.local(name)?;
                self.code.load(&ty, slot);
                Ok(())
            }
            Some(NameRes::Field(f)) => {
                let index = self.pool.try_add_field_ref(&f.owner, &f.name, &f.ty.descriptor())?;
                if f.is_static {
                    self.code.field(GETSTATIC, index, &f.ty)
                } else {
                    self.code.load(&JType::Class(self.cx.class.to_string()), 0);
                    self.code.field(GETFIELD, index, &f.ty)
                }
            }
            _ => Err(BytecodeError::missing(format!("value of {}", name))),
        }
    }

    fn gen_field_access(&mut self, e: &'a Expr, target: &'a Expr) -> BytecodeResult<()> {
        match self.attr().names.get(&e.id) {
            Some(NameRes::ArrayLength) => {
                self.gen_expr(target)?;
                self.code.arraylength()
            }
            Some(NameRes::Field(f)) => {
                let index = self.pool.try_add_field_ref(&f.owner, &f.name, &f.ty.descriptor())?;
                if f.is_static {
                    if !self.is_type_name(target) {
                        self.gen_effect(target)?;
                    }
                    self.code.field(GETSTATIC, index, &f.ty)
                } else {
                    self.gen_expr(target)?;
                    self.code.field(GETFIELD, index, &f.ty)
                }
            }
            _ => Err(BytecodeError::missing("field access")),
        }
    }

    fn gen_call(&mut self, e: &'a Expr, target: Option<&'a Expr>, args: &'a [Expr]) -> BytecodeResult<()> {
        let r = self
            .attr()
            .calls
            .get(&e.id)
            .cloned()
            .ok_or_else(|| BytecodeError::missing("method call"))?;
        match (r.kind, target) {
            (InvokeKind::Static, Some(t)) if !self.is_type_name(t) => self.gen_effect(t)?,
            (InvokeKind::Static, _) => {}
            (_, Some(t)) => self.gen_expr(t)?,
            (_, None) => self.code.load(&JType::Class(self.cx.class.to_string()), 0),
        }
        self.gen_args(args, &r)?;
        self.invoke(&r)
    }

    pub(super) fn invoke(&mut self, r: &MethodRef) -> BytecodeResult<()> {
        let desc = r.descriptor();
        let index = if r.interface {
            self.pool.try_add_interface_method_ref(&r.owner, &r.name, &desc)?
        } else {
            self.pool.try_add_method_ref(&r.owner, &r.name, &desc)?
        };
        let op = match r.kind {
            InvokeKind::Static => INVOKESTATIC,
            InvokeKind::Virtual => INVOKEVIRTUAL,
            InvokeKind::Interface => INVOKEINTERFACE,
            InvokeKind::Special => INVOKESPECIAL,
        };
        self.code.invoke(op, index, &r.params, &r.ret)
    }

    /// Calls a method of a library class.
    pub(super) fn invoke_library(
        &mut self,
        op: u8,
        owner: &str,
        name: &str,
        params: &[JType],
        ret: &JType,
    ) -> BytecodeResult<()> {
        let index = self.pool.try_add_method_ref(owner, name, &method_descriptor(params, ret))?;
        self.code.invoke(op, index, params, ret)
    }

    fn gen_array_init(&mut self, array: &JType, items: &'a [Expr]) -> BytecodeResult<()> {
        let elem = array.element().cloned().unwrap_or(JType::Error);
        self.code.iconst(items.len() as i32, self.pool)?;
        self.code.new_array(&elem, self.pool)?;
        for (i, item) in items.iter().enumerate() {
            self.code.dup(DUP)?;
            self.code.iconst(i as i32, self.pool)?;
            self.gen_expr_to(item, &elem)?;
            self.code.array_store(&elem)?;
        }
        Ok(())
    }

    fn gen_class_literal(&mut self, operand: &JType) -> BytecodeResult<()> {
        let class = JType::class(JAVA_LANG_CLASS);
        let holder = match operand {
            JType::Void => Some("java/lang/Void".to_string()),
            p if p.is_primitive() => p.boxed().map(|b| b.internal_name()),
            _ => None,
        };
        match holder {
            Some(owner) => {
                let index = self.pool.try_add_field_ref(&owner, "TYPE", &class.descriptor())?;
                self.code.field(GETSTATIC, index, &class)
            }
            None => {
                let index = self.pool.try_add_class(&operand.internal_name())?;
                self.code.ldc(index, VType::object(JAVA_LANG_CLASS))
            }
        }
    }

    fn gen_binary(&mut self, e: &'a Expr, op: BinaryOp, left: &'a Expr, right: &'a Expr, ty: &JType) -> BytecodeResult<()> {
        if op == BinaryOp::Add && ty.is_string() {
            return self.gen_concat(e);
        }
        if op.is_comparison() || matches!(op, BinaryOp::And | BinaryOp::Or) {
            return self.gen_cond_value(e);
        }
        let Some(opcode) = arith_op(op) else {
            return Err(BytecodeError::missing(format!("operator {}", op.symbol())));
        };
        self.gen_expr_to(left, ty)?;
        if op.is_shift() {
            self.gen_expr_to(right, &JType::Int)?;
        } else {
            self.gen_expr_to(right, ty)?;
        }
        self.code.arith(opcode, ty)
    }

    /// A boolean expression as a 0/1 value.
    fn gen_cond_value(&mut self, e: &'a Expr) -> BytecodeResult<()> {
        let otherwise = self.code.new_label();
        let end = self.code.new_label();
        self.gen_cond(e, false, otherwise)?;
        self.code.iconst(1, self.pool)?;
        self.code.goto(end)?;
        self.code.place_if_used(otherwise)?;
        self.code.iconst(0, self.pool)?;
        self.code.place_if_used(end)
    }

    // ----- string concatenation -----

    fn concat_parts(&self, e: &'a Expr, parts: &mut Vec<&'a Expr>) {
        match &e.kind {
            ExprKind::Binary { op: BinaryOp::Add, left, right }
                if self.attr().type_of(e.id).is_string() && self.attr().constant(e.id).is_none() =>
            {
                self.concat_parts(left, parts);
                self.concat_parts(right, parts);
            }
            _ => parts.push(e),
        }
    }

    fn gen_concat(&mut self, e: &'a Expr) -> BytecodeResult<()> {
        let mut parts = Vec::new();
        self.concat_parts(e, &mut parts);
        self.new_string_builder()?;
        for part in parts {
            self.gen_expr(part)?;
            let ty = self.attr().type_of(part.id);
            self.append(&ty)?;
        }
        self.invoke_library(INVOKEVIRTUAL, JAVA_LANG_STRING_BUILDER, "toString", &[], &JType::string())
    }

    fn new_string_builder(&mut self) -> BytecodeResult<()> {
        self.code.new_object(JAVA_LANG_STRING_BUILDER, self.pool)?;
        self.code.dup(DUP)?;
        let init = self.pool.try_add_method_ref(JAVA_LANG_STRING_BUILDER, INIT, "()V")?;
        self.code.invoke_init(init, &[])
    }

    /// `StringBuilder.append` for a value of type `ty` on top.
    fn append(&mut self, ty: &JType) -> BytecodeResult<()> {
        let param = match ty {
            JType::Byte | JType::Short | JType::Int => JType::Int,
            JType::Boolean | JType::Char | JType::Long | JType::Float | JType::Double => ty.clone(),
            t if t.is_string() => JType::string(),
            _ => JType::object(),
        };
        let builder = JType::class(JAVA_LANG_STRING_BUILDER);
        self.invoke_library(INVOKEVIRTUAL, JAVA_LANG_STRING_BUILDER, "append", &[param], &builder)
    }

    // ----- conversions -----

    /// Converts the value on top from `from` to `to`: primitive widening
    /// and narrowing, boxing, unboxing and checked reference casts.
    pub(super) fn coerce(&mut self, from: &JType, to: &JType) -> BytecodeResult<()> {
        if from == to || from.is_error() || to.is_error() || *to == JType::Void || *from == JType::Void {
            return Ok(());
        }
        match (from.is_primitive(), to.is_primitive()) {
            (true, true) => self.convert_primitive(from, to),
            (true, false) => {
                let prim = to.unboxed().unwrap_or_else(|| from.clone());
                self.convert_primitive(from, &prim)?;
                let Some(boxed) = prim.boxed() else { return Ok(()) };
                let owner = boxed.internal_name();
                self.invoke_library(INVOKESTATIC, &owner, "valueOf", &[prim], &boxed)?;
                self.coerce(&boxed, to)
            }
            (false, true) => {
                let prim = match from.unboxed() {
                    Some(p) => p,
                    None => {
                        let Some(boxed) = to.boxed() else { return Ok(()) };
                        self.code.checkcast(&boxed, self.pool)?;
                        to.clone()
                    }
                };
                let Some(boxed) = prim.boxed() else { return Ok(()) };
                let name = format!("{}Value", primitive_keyword(&prim));
                self.invoke_library(INVOKEVIRTUAL, &boxed.internal_name(), &name, &[], &prim)?;
                self.convert_primitive(&prim, to)
            }
            (false, false) => {
                let widening = *from == JType::Null
                    || matches!(to, JType::Class(n) if n == JAVA_LANG_OBJECT)
                    || self.table().is_subtype(from, to);
                if widening {
                    Ok(())
                } else {
                    self.code.checkcast(to, self.pool)
                }
            }
        }
    }

    fn convert_primitive(&mut self, from: &JType, to: &JType) -> BytecodeResult<()> {
        if from == to || *from == JType::Boolean || *to == JType::Boolean {
            return Ok(());
        }
        let stack_from = if from.is_int_like() { JType::Int } else { from.clone() };
        let stack_to = if to.is_int_like() { JType::Int } else { to.clone() };
        let op = match (&stack_from, &stack_to) {
            (JType::Int, JType::Long) => Some(I2L),
            (JType::Int, JType::Float) => Some(I2F),
            (JType::Int, JType::Double) => Some(I2D),
            (JType::Long, JType::Int) => Some(L2I),
            (JType::Long, JType::Float) => Some(L2F),
            (JType::Long, JType::Double) => Some(L2D),
            (JType::Float, JType::Int) => Some(F2I),
            (JType::Float, JType::Long) => Some(F2L),
            (JType::Float, JType::Double) => Some(F2D),
            (JType::Double, JType::Int) => Some(D2I),
            (JType::Double, JType::Long) => Some(D2L),
            (JType::Double, JType::Float) => Some(D2F),
            _ => None,
        };
        if let Some(op) = op {
            self.code.op_to(op, 1, VType::of(&stack_to))?;
        }
        if !from.widens_to(to) {
            let narrow = match to {
                JType::Byte => Some(I2B),
                JType::Short => Some(I2S),
                JType::Char => Some(I2C),
                _ => None,
            };
            if let Some(op) = narrow {
                self.code.op_to(op, 1, VType::Int)?;
            }
        }
        Ok(())
    }

    // ----- conditions -----

    /// Jumps to `target` when `e` evaluates to `jump_if`; falls through
    /// otherwise.
    pub(super) fn gen_cond(&mut self, e: &'a Expr, jump_if: bool, target: super::code::Label) -> BytecodeResult<()> {
        if let Some(ConstValue::Bool(b)) = self.attr().constant(e.id) {
            if *b == jump_if {
                self.code.goto(target)?;
            }
            return Ok(());
        }
        match &e.kind {
            ExprKind::Literal(Literal::Bool(b)) => {
                if *b == jump_if {
                    self.code.goto(target)?;
                }
                Ok(())
            }
            ExprKind::Parenthesized(inner) => self.gen_cond(inner, jump_if, target),
            ExprKind::Unary { op: UnaryOp::Not, operand } => self.gen_cond(operand, !jump_if, target),
            ExprKind::Binary { op: BinaryOp::And, left, right } => {
                if jump_if {
                    let skip = self.code.new_label();
                    self.gen_cond(left, false, skip)?;
                    self.gen_cond(right, true, target)?;
                    self.code.place_if_used(skip)
                } else {
                    self.gen_cond(left, false, target)?;
                    self.gen_cond(right, false, target)
                }
            }
            ExprKind::Binary { op: BinaryOp::Or, left, right } => {
                if jump_if {
                    self.gen_cond(left, true, target)?;
                    self.gen_cond(right, true, target)
                } else {
                    let skip = self.code.new_label();
                    self.gen_cond(left, true, skip)?;
                    self.gen_cond(right, false, target)?;
                    self.code.place_if_used(skip)
                }
            }
            ExprKind::Binary { op, left, right } if op.is_comparison() => {
                self.gen_compare(*op, left, right, jump_if, target)
            }
            _ => {
                self.gen_expr_to(e, &JType::Boolean)?;
                self.code.jump_if(if jump_if { IFNE } else { IFEQ }, target)
            }
        }
    }

    fn gen_compare(
        &mut self,
        op: BinaryOp,
        left: &'a Expr,
        right: &'a Expr,
        jump_if: bool,
        target: super::code::Label,
    ) -> BytecodeResult<()> {
        let lt = self.attr().type_of(left.id);
        let rt = self.attr().type_of(right.id);
        let pick = |opcode: u8| if jump_if { opcode } else { negate(opcode) };
        let (if_op, icmp_op) = compare_ops(op);

        if !lt.is_primitive() && !rt.is_primitive() && matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            let eq = op == BinaryOp::Eq;
            if is_null_literal(right) || is_null_literal(left) {
                let other = if is_null_literal(right) { left } else { right };
                self.gen_expr(other)?;
                return self.code.jump_if(pick(if eq { IFNULL } else { IFNONNULL }), target);
            }
            self.gen_expr(left)?;
            self.gen_expr(right)?;
            return self.code.jump_if(pick(if eq { IF_ACMPEQ } else { IF_ACMPNE }), target);
        }

        let t = if lt.unboxed_or_self() == JType::Boolean {
            JType::Boolean
        } else {
            binary_promotion(&lt, &rt).unwrap_or(JType::Int)
        };
        self.gen_expr_to(left, &t)?;
        if t.is_int_like() {
            if matches!(self.constant_of(right).and_then(|c| coerce_constant(&c, &t)), Some(ConstValue::Int(0))) {
                return self.code.jump_if(pick(if_op), target);
            }
            self.gen_expr_to(right, &t)?;
            return self.code.jump_if(pick(icmp_op), target);
        }
        self.gen_expr_to(right, &t)?;
        let cmp = match (&t, op) {
            (JType::Long, _) => LCMP,
            (JType::Float, BinaryOp::Lt | BinaryOp::Le) => FCMPG,
            (JType::Float, _) => FCMPL,
            (_, BinaryOp::Lt | BinaryOp::Le) => DCMPG,
            _ => DCMPL,
        };
        self.code.op_to(cmp, 2, VType::Int)?;
        self.code.jump_if(pick(if_op), target)
    }

    // ----- assignment -----

    /// Pushes the receiver or array and index of an assignable `target`.
    fn gen_place(&mut self, target: &'a Expr) -> BytecodeResult<Place> {
        let target = target.unparenthesized();
        match &target.kind {
            ExprKind::Name(n) => match self.attr().names.get(&target.id) {
                Some(NameRes::Local(_)) => {
                    let (slot, ty) = self.local(n)?;
                    Ok(Place::Local { slot, ty })
                }
                Some(NameRes::Field(f)) => {
                    let index = self.pool.try_add_field_ref(&f.owner, &f.name, &f.ty.descriptor())?;
                    if f.is_static {
                        Ok(Place::Static { index, ty: f.ty.clone() })
                    } else {
                        self.code.load(&JType::Class(self.cx.class.to_string()), 0);
                        Ok(Place::Field { index, ty: f.ty.clone() })
                    }
                }
                _ => Err(BytecodeError::missing(format!("assignable {}", n))),
            },
            ExprKind::FieldAccess { target: receiver, .. } => match self.attr().names.get(&target.id) {
                Some(NameRes::Field(f)) => {
                    let index = self.pool.try_add_field_ref(&f.owner, &f.name, &f.ty.descriptor())?;
                    if f.is_static {
                        if !self.is_type_name(receiver) {
                            self.gen_effect(receiver)?;
                        }
                        Ok(Place::Static { index, ty: f.ty.clone() })
                    } else {
                        self.gen_expr(receiver)?;
                        Ok(Place::Field { index, ty: f.ty.clone() })
                    }
                }
                _ => Err(BytecodeError::missing("assignable field")),
            },
            ExprKind::ArrayAccess { array, index } => {
                self.gen_expr(array)?;
                self.gen_expr_to(index, &JType::Int)?;
                Ok(Place::Array { elem: self.attr().type_of(target.id) })
            }
            _ => Err(BytecodeError::missing("assignable expression")),
        }
    }

    /// Duplicates the operands of `place` so it can be read and written.
    fn dup_place(&mut self, place: &Place) -> BytecodeResult<()> {
        match place.operand_slots() {
            0 => Ok(()),
            1 => self.code.dup(DUP),
            _ => self.code.dup(DUP2),
        }
    }

    fn load_place(&mut self, place: &Place) -> BytecodeResult<()> {
        match place {
            Place::Local { slot, ty } => {
                self.code.load(ty, *slot);
                Ok(())
            }
            Place::Static { index, ty } => self.code.field(GETSTATIC, *index, ty),
            Place::Field { index, ty } => self.code.field(GETFIELD, *index, ty),
            Place::Array { elem } => self.code.array_load(elem),
        }
    }

    fn store_place(&mut self, place: &Place) -> BytecodeResult<()> {
        match place {
            Place::Local { slot, ty } => self.code.store(ty, *slot),
            Place::Static { index, ty } => self.code.field(PUTSTATIC, *index, ty),
            Place::Field { index, ty } => self.code.field(PUTFIELD, *index, ty),
            Place::Array { elem } => self.code.array_store(elem),
        }
    }

    fn gen_assign(&mut self, e: &'a Expr, want_value: bool) -> BytecodeResult<()> {
        let ExprKind::Assign { op, target, value } = &e.kind else {
            return Err(BytecodeError::missing("assignment"));
        };
        let place = self.gen_place(target)?;
        let ty = place.ty().clone();
        match op {
            None => self.gen_expr_to(value, &ty)?,
            Some(BinaryOp::Add) if ty.is_string() => {
                self.dup_place(&place)?;
                self.load_place(&place)?;
                self.new_string_builder()?;
                self.code.swap()?;
                self.append(&ty)?;
                self.gen_expr(value)?;
                let vt = self.attr().type_of(value.id);
                self.append(&vt)?;
                self.invoke_library(INVOKEVIRTUAL, JAVA_LANG_STRING_BUILDER, "toString", &[], &JType::string())?;
            }
            Some(op) => {
                let vt = self.attr().type_of(value.id);
                let op_type = if op.is_shift() {
                    ty.promoted()
                } else if ty.unboxed_or_self() == JType::Boolean {
                    JType::Boolean
                } else {
                    binary_promotion(&ty, &vt).unwrap_or(JType::Int)
                };
                let opcode = arith_op(*op).ok_or_else(|| BytecodeError::missing("compound operator"))?;
                self.dup_place(&place)?;
                self.load_place(&place)?;
                self.coerce(&ty, &op_type)?;
                let rhs = if op.is_shift() { JType::Int } else { op_type.clone() };
                self.gen_expr_to(value, &rhs)?;
                self.code.arith(opcode, &op_type)?;
                self.coerce(&op_type, &ty)?;
            }
        }
        if want_value {
            self.code.dup_value_under(place.operand_slots())?;
        }
        self.store_place(&place)
    }

    fn gen_incdec(&mut self, e: &'a Expr, want_value: bool) -> BytecodeResult<()> {
        let ExprKind::IncDec { increment, prefix, target } = &e.kind else {
            return Err(BytecodeError::missing("increment"));
        };
        let place = self.gen_place(target)?;
        let ty = place.ty().clone();
        if let Place::Local { slot, ty: JType::Int } = &place {
            let delta = if *increment { 1 } else { -1 };
            if want_value && !*prefix {
                self.code.load(&JType::Int, *slot);
            }
            self.code.iinc(*slot, delta);
            if want_value && *prefix {
                self.code.load(&JType::Int, *slot);
            }
            return Ok(());
        }
        let op_type = ty.promoted();
        self.dup_place(&place)?;
        self.load_place(&place)?;
        if want_value && !*prefix {
            self.code.dup_value_under(place.operand_slots())?;
        }
        self.coerce(&ty, &op_type)?;
        let one = match op_type {
            JType::Long => ConstValue::Long(1),
            JType::Float => ConstValue::Float(1.0),
            JType::Double => ConstValue::Double(1.0),
            _ => ConstValue::Int(1),
        };
        self.push_constant(&one)?;
        self.code.arith(if *increment { IADD } else { ISUB }, &op_type)?;
        self.coerce(&op_type, &ty)?;
        if want_value && *prefix {
            self.code.dup_value_under(place.operand_slots())?;
        }
        self.store_place(&place)
    }
}
