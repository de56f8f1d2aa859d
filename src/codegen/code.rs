//! Bytecode buffer with a symbolic operand stack.
//!
//! Every instruction declares the values it pops and pushes. Branch targets
//! collect the frames of all incoming edges, so inconsistent stacks are
//! rejected here, before any class file bytes exist, and the same state
//! yields `max_stack`, `max_locals` and the `StackMapTable`.
//!
//! Like javac, emitting while the current position is unreachable (after
//! `goto`, `athrow`, a return or a switch) is a no-op until a label that
//! some live code jumps to is placed.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::attribute::{AttributeInfo, CodeAttribute, ExceptionTableEntry, LineNumberEntry, NamedAttribute};
use super::constpool::ConstantPool;
use super::error::{BytecodeError, BytecodeResult};
use super::frame::{encode_frames, Frame, VType};
use super::opcodes::*;
use super::switch_optimizer::{self, SwitchShape};
use crate::wash::types::JType;

/// A position in the code, placed once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

#[derive(Debug, Default)]
struct LabelState {
    pc: Option<u16>,
    /// Join of the frames of the forward edges seen so far.
    pending: Option<Frame>,
}

#[derive(Debug)]
struct Fixup {
    /// Offset of the operand to patch.
    at: usize,
    /// Offset of the instruction the jump is relative to.
    base: usize,
    label: Label,
    wide: bool,
}

#[derive(Debug)]
struct Handler {
    start: u16,
    end: u16,
    handler: Label,
    catch_type: u16,
}

#[derive(Debug)]
pub struct Code {
    bytes: Vec<u8>,
    stack: Vec<VType>,
    stack_slots: u16,
    max_stack: u16,
    locals: Vec<VType>,
    next_local: u16,
    max_locals: u16,
    alive: bool,
    labels: Vec<LabelState>,
    fixups: Vec<Fixup>,
    frames: BTreeMap<u16, Frame>,
    targets: BTreeSet<u16>,
    handlers: Vec<Handler>,
    lines: Vec<LineNumberEntry>,
    /// Class created by the `new` at each offset.
    news: HashMap<u16, String>,
    this_class: String,
}

impl Code {
    /// A method body whose locals start with `this` (unless static) and the
    /// parameters. In constructors `this` is uninitialized until the
    /// `super(...)`/`this(...)` call.
    pub fn new(this_class: &str, is_static: bool, is_constructor: bool, params: &[JType]) -> Self {
        let mut code = Self {
            bytes: Vec::new(),
            stack: Vec::new(),
            stack_slots: 0,
            max_stack: 0,
            locals: Vec::new(),
            next_local: 0,
            max_locals: 0,
            alive: true,
            labels: Vec::new(),
            fixups: Vec::new(),
            frames: BTreeMap::new(),
            targets: BTreeSet::new(),
            handlers: Vec::new(),
            lines: Vec::new(),
            news: HashMap::new(),
            this_class: this_class.to_string(),
        };
        if !is_static {
            let this = if is_constructor { VType::UninitializedThis } else { VType::object(this_class) };
            let slot = code.alloc_local(&JType::object());
            code.set_local(slot, this);
        }
        for p in params {
            let slot = code.alloc_local(p);
            code.set_local(slot, VType::of(p));
        }
        code
    }

    pub fn pc(&self) -> u16 {
        self.bytes.len() as u16
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn stack(&self) -> &[VType] {
        &self.stack
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn locals_snapshot(&self) -> Vec<VType> {
        self.locals.clone()
    }

    // ----- locals -----

    /// Current local allocation mark, restored by [`Code::end_scope`].
    pub fn begin_scope(&self) -> u16 {
        self.next_local
    }

    /// Frees the slots allocated since `mark`; they become unusable.
    pub fn end_scope(&mut self, mark: u16) {
        self.next_local = mark;
        if self.locals.len() > usize::from(mark) {
            self.locals.truncate(usize::from(mark));
        }
    }

    pub fn alloc_local(&mut self, ty: &JType) -> u16 {
        let slot = self.next_local;
        self.next_local += ty.size().max(1);
        self.max_locals = self.max_locals.max(self.next_local);
        slot
    }

    fn set_local(&mut self, slot: u16, t: VType) {
        let i = usize::from(slot);
        let width = usize::from(t.size());
        if self.locals.len() < i + width {
            self.locals.resize(i + width, VType::Top);
        }
        // a wide value overwritten in its second half is gone
        if i > 0 && self.locals[i - 1].size() == 2 {
            self.locals[i - 1] = VType::Top;
        }
        self.locals[i] = t;
        if width == 2 {
            self.locals[i + 1] = VType::Top;
        }
    }

    // ----- stack bookkeeping -----

    fn push(&mut self, t: VType) {
        self.stack_slots += t.size();
        self.max_stack = self.max_stack.max(self.stack_slots);
        self.stack.push(t);
    }

    fn pop(&mut self) -> BytecodeResult<VType> {
        let t = self.stack.pop().ok_or(BytecodeError::StackUnderflow { pc: self.pc() })?;
        self.stack_slots -= t.size();
        Ok(t)
    }

    fn pop_n(&mut self, n: usize) -> BytecodeResult<()> {
        for _ in 0..n {
            self.pop()?;
        }
        Ok(())
    }

    /// Replaces the type of the value on top of the stack, so the arms of a
    /// conditional or switch agree at their join.
    pub fn set_top(&mut self, t: VType) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        self.pop()?;
        self.push(t);
        Ok(())
    }

    fn emit(&mut self, op: u8, operands: &[u8]) {
        self.bytes.push(op);
        self.bytes.extend_from_slice(operands);
    }

    // ----- constants -----

    pub fn aconst_null(&mut self) {
        if !self.alive {
            return;
        }
        self.emit(ACONST_NULL, &[]);
        self.push(VType::Null);
    }

    pub fn iconst(&mut self, v: i32, pool: &mut ConstantPool) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        if (-1..=5).contains(&v) {
            self.emit((i32::from(ICONST_0) + v) as u8, &[]);
        } else if let Ok(b) = i8::try_from(v) {
            self.emit(BIPUSH, &[b as u8]);
        } else if let Ok(s) = i16::try_from(v) {
            self.emit(SIPUSH, &s.to_be_bytes());
        } else {
            let index = pool.try_add_integer(v)?;
            return self.ldc(index, VType::Int);
        }
        self.push(VType::Int);
        Ok(())
    }

    pub fn lconst(&mut self, v: i64, pool: &mut ConstantPool) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        if v == 0 || v == 1 {
            self.emit(LCONST_0 + v as u8, &[]);
            self.push(VType::Long);
            return Ok(());
        }
        let index = pool.try_add_long(v)?;
        self.ldc(index, VType::Long)
    }

    pub fn fconst(&mut self, v: f32, pool: &mut ConstantPool) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        // -0.0 is not 0.0
        if (v == 0.0 && v.is_sign_positive()) || v == 1.0 || v == 2.0 {
            self.emit(FCONST_0 + v as u8, &[]);
            self.push(VType::Float);
            return Ok(());
        }
        let index = pool.try_add_float(v)?;
        self.ldc(index, VType::Float)
    }

    pub fn dconst(&mut self, v: f64, pool: &mut ConstantPool) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        if (v == 0.0 && v.is_sign_positive()) || v == 1.0 {
            self.emit(DCONST_0 + v as u8, &[]);
            self.push(VType::Double);
            return Ok(());
        }
        let index = pool.try_add_double(v)?;
        self.ldc(index, VType::Double)
    }

    /// Loads the pool constant at `index`.
    pub fn ldc(&mut self, index: u16, t: VType) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        if t.size() == 2 {
            self.emit(LDC2_W, &index.to_be_bytes());
        } else if let Ok(narrow) = u8::try_from(index) {
            self.emit(LDC, &[narrow]);
        } else {
            self.emit(LDC_W, &index.to_be_bytes());
        }
        self.push(t);
        Ok(())
    }

    // ----- locals access -----

    /// Offset of the int/long/float/double/reference variant of a
    /// type-grouped opcode.
    fn type_offset(ty: &JType) -> u8 {
        match ty {
            JType::Long => 1,
            JType::Float => 2,
            JType::Double => 3,
            t if t.is_primitive() => 0,
            _ => 4,
        }
    }

    fn vtype_offset(t: &VType) -> u8 {
        match t {
            VType::Int => 0,
            VType::Long => 1,
            VType::Float => 2,
            VType::Double => 3,
            _ => 4,
        }
    }

    fn local_op(&mut self, base: u8, short_base: u8, offset: u8, slot: u16) {
        if slot <= 3 {
            self.emit(short_base + offset * 4 + slot as u8, &[]);
        } else if let Ok(narrow) = u8::try_from(slot) {
            self.emit(base + offset, &[narrow]);
        } else {
            let mut operands = vec![base + offset];
            operands.extend_from_slice(&slot.to_be_bytes());
            self.emit(WIDE, &operands);
        }
    }

    pub fn load(&mut self, ty: &JType, slot: u16) {
        if !self.alive {
            return;
        }
        self.local_op(ILOAD, ILOAD_0, Self::type_offset(ty), slot);
        let t = match self.locals.get(usize::from(slot)) {
            Some(t) if t.is_reference() && !ty.is_primitive() => t.clone(),
            _ => VType::of(ty),
        };
        self.push(t);
    }

    pub fn store(&mut self, ty: &JType, slot: u16) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        self.local_op(ISTORE, ISTORE_0, Self::type_offset(ty), slot);
        let value = self.pop()?;
        let t = match value {
            VType::UninitializedThis | VType::Uninitialized(_) => value,
            _ => VType::of(ty),
        };
        self.set_local(slot, t);
        Ok(())
    }

    /// Stores the value on top keeping its exact verification type.
    pub fn spill(&mut self, slot: u16) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        let value = self.pop()?;
        self.local_op(ISTORE, ISTORE_0, Self::vtype_offset(&value), slot);
        self.set_local(slot, value);
        Ok(())
    }

    /// Reloads a value stored by [`Code::spill`].
    pub fn unspill(&mut self, slot: u16) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        let value = self
            .locals
            .get(usize::from(slot))
            .cloned()
            .ok_or_else(|| BytecodeError::missing(format!("spilled local {}", slot)))?;
        self.local_op(ILOAD, ILOAD_0, Self::vtype_offset(&value), slot);
        self.push(value);
        Ok(())
    }

    pub fn iinc(&mut self, slot: u16, delta: i16) {
        if !self.alive {
            return;
        }
        match (u8::try_from(slot), i8::try_from(delta)) {
            (Ok(s), Ok(d)) => self.emit(IINC, &[s, d as u8]),
            _ => {
                let mut operands = vec![IINC];
                operands.extend_from_slice(&slot.to_be_bytes());
                operands.extend_from_slice(&delta.to_be_bytes());
                self.emit(WIDE, &operands);
            }
        }
    }

    // ----- stack manipulation -----

    /// `dup`, `dup_x1`, `dup_x2`, `dup2`, `dup2_x1` or `dup2_x2`.
    pub fn dup(&mut self, op: u8) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        let (copy, skip) = match op {
            DUP => (1, 0),
            DUP_X1 => (1, 1),
            DUP_X2 => (1, 2),
            DUP2 => (2, 0),
            DUP2_X1 => (2, 1),
            _ => (2, 2),
        };
        let pc = self.pc();
        self.emit(op, &[]);
        let copied = self.take_slots(copy, pc)?;
        let skipped = self.take_slots(skip, pc)?;
        for t in copied.iter().chain(&skipped).chain(&copied) {
            self.push(t.clone());
        }
        Ok(())
    }

    /// Pops values covering exactly `slots` slots; returned bottom first.
    fn take_slots(&mut self, slots: u16, pc: u16) -> BytecodeResult<Vec<VType>> {
        let mut taken = Vec::new();
        let mut n = 0;
        while n < slots {
            let t = self.pop()?;
            n += t.size();
            taken.push(t);
        }
        if n != slots {
            return Err(BytecodeError::StackUnderflow { pc });
        }
        taken.reverse();
        Ok(taken)
    }

    /// `dup` or `dup2` for the value on top.
    pub fn dup_value(&mut self) -> BytecodeResult<()> {
        let wide = self.stack.last().map(|t| t.size() == 2).unwrap_or(false);
        self.dup(if wide { DUP2 } else { DUP })
    }

    /// Duplicates the top value under the `below` slots beneath it.
    pub fn dup_value_under(&mut self, below: u16) -> BytecodeResult<()> {
        let wide = self.stack.last().map(|t| t.size() == 2).unwrap_or(false);
        let op = match (wide, below) {
            (false, 0) => DUP,
            (false, 1) => DUP_X1,
            (false, _) => DUP_X2,
            (true, 0) => DUP2,
            (true, 1) => DUP2_X1,
            (true, _) => DUP2_X2,
        };
        self.dup(op)
    }

    /// `pop` or `pop2` for the value on top.
    pub fn pop_value(&mut self) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        let t = self.pop()?;
        self.emit(if t.size() == 2 { POP2 } else { POP }, &[]);
        Ok(())
    }

    pub fn swap(&mut self) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        self.emit(SWAP, &[]);
        let a = self.pop()?;
        let b = self.pop()?;
        self.push(a);
        self.push(b);
        Ok(())
    }

    // ----- arithmetic -----

    /// `op` is the int form of an arithmetic group (`IADD`, `ISHL`, ...);
    /// `ty` is the promoted operand type.
    pub fn arith(&mut self, op: u8, ty: &JType) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        let shift_or_logic = (ISHL..=LXOR).contains(&op);
        let code = if shift_or_logic {
            op + u8::from(*ty == JType::Long)
        } else {
            op + Self::type_offset(ty)
        };
        self.emit(code, &[]);
        self.pop_n(2)?;
        self.push(VType::of(ty));
        Ok(())
    }

    pub fn neg(&mut self, ty: &JType) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        self.emit(INEG + Self::type_offset(ty), &[]);
        let t = self.pop()?;
        self.push(t);
        Ok(())
    }

    /// A conversion or comparison popping `pops` values and pushing one.
    pub fn op_to(&mut self, op: u8, pops: usize, result: VType) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        self.emit(op, &[]);
        self.pop_n(pops)?;
        self.push(result);
        Ok(())
    }

    // ----- arrays -----

    fn array_offset(elem: &JType) -> u8 {
        match elem {
            JType::Int => 0,
            JType::Long => 1,
            JType::Float => 2,
            JType::Double => 3,
            JType::Boolean | JType::Byte => 5,
            JType::Char => 6,
            JType::Short => 7,
            _ => 4,
        }
    }

    pub fn array_load(&mut self, elem: &JType) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        self.emit(IALOAD + Self::array_offset(elem), &[]);
        self.pop_n(2)?;
        self.push(VType::of(elem));
        Ok(())
    }

    pub fn array_store(&mut self, elem: &JType) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        self.emit(IASTORE + Self::array_offset(elem), &[]);
        self.pop_n(3)
    }

    pub fn arraylength(&mut self) -> BytecodeResult<()> {
        self.op_to(ARRAYLENGTH, 1, VType::Int)
    }

    /// `newarray` or `anewarray` for a one-dimensional array of `elem`.
    pub fn new_array(&mut self, elem: &JType, pool: &mut ConstantPool) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        use super::opcodes::array_types::*;
        let atype = match elem {
            JType::Boolean => Some(T_BOOLEAN),
            JType::Char => Some(T_CHAR),
            JType::Float => Some(T_FLOAT),
            JType::Double => Some(T_DOUBLE),
            JType::Byte => Some(T_BYTE),
            JType::Short => Some(T_SHORT),
            JType::Int => Some(T_INT),
            JType::Long => Some(T_LONG),
            _ => None,
        };
        match atype {
            Some(t) => self.emit(NEWARRAY, &[t]),
            None => {
                let index = pool.try_add_class(&elem.internal_name())?;
                self.emit(ANEWARRAY, &index.to_be_bytes());
            }
        }
        self.pop()?;
        self.push(VType::of(&JType::array_of(elem.clone())));
        Ok(())
    }

    pub fn multianewarray(&mut self, array: &JType, dims: u8, pool: &mut ConstantPool) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        let index = pool.try_add_class(&array.internal_name())?;
        let mut operands = index.to_be_bytes().to_vec();
        operands.push(dims);
        self.emit(MULTIANEWARRAY, &operands);
        self.pop_n(usize::from(dims))?;
        self.push(VType::of(array));
        Ok(())
    }

    // ----- objects -----

    pub fn new_object(&mut self, class: &str, pool: &mut ConstantPool) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        let index = pool.try_add_class(class)?;
        let pc = self.pc();
        self.emit(NEW, &index.to_be_bytes());
        self.news.insert(pc, class.to_string());
        self.push(VType::Uninitialized(pc));
        Ok(())
    }

    pub fn checkcast(&mut self, ty: &JType, pool: &mut ConstantPool) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        let index = pool.try_add_class(&ty.internal_name())?;
        self.emit(CHECKCAST, &index.to_be_bytes());
        self.pop()?;
        self.push(VType::of(ty));
        Ok(())
    }

    pub fn instance_of(&mut self, ty: &JType, pool: &mut ConstantPool) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        let index = pool.try_add_class(&ty.internal_name())?;
        self.emit(INSTANCEOF, &index.to_be_bytes());
        self.pop()?;
        self.push(VType::Int);
        Ok(())
    }

    /// `getstatic`/`getfield`/`putstatic`/`putfield` on the field ref at `index`.
    pub fn field(&mut self, op: u8, index: u16, ty: &JType) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        self.emit(op, &index.to_be_bytes());
        match op {
            GETSTATIC => self.push(VType::of(ty)),
            GETFIELD => {
                self.pop()?;
                self.push(VType::of(ty));
            }
            PUTSTATIC => {
                self.pop()?;
            }
            _ => self.pop_n(2)?,
        }
        Ok(())
    }

    /// Any invoke instruction but `invokedynamic`; `args` counts values.
    pub fn invoke(&mut self, op: u8, index: u16, params: &[JType], ret: &JType) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        if op == INVOKEINTERFACE {
            let slots: u16 = params.iter().map(JType::size).sum::<u16>() + 1;
            let mut operands = index.to_be_bytes().to_vec();
            operands.push(slots as u8);
            operands.push(0);
            self.emit(op, &operands);
        } else {
            self.emit(op, &index.to_be_bytes());
        }
        self.pop_n(params.len())?;
        if op != INVOKESTATIC {
            self.pop()?;
        }
        if *ret != JType::Void {
            self.push(VType::of(ret));
        }
        Ok(())
    }

    /// `invokespecial <init>`: the receiver and every copy of it become
    /// initialized.
    pub fn invoke_init(&mut self, index: u16, params: &[JType]) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        self.emit(INVOKESPECIAL, &index.to_be_bytes());
        self.pop_n(params.len())?;
        let receiver = self.pop()?;
        let initialized = match &receiver {
            VType::UninitializedThis => VType::object(&self.this_class),
            VType::Uninitialized(pc) => match self.news.get(pc) {
                Some(class) => VType::object(class),
                None => return Err(BytecodeError::missing(format!("new at {}", pc))),
            },
            other => other.clone(),
        };
        for t in self.stack.iter_mut().chain(self.locals.iter_mut()) {
            if *t == receiver {
                *t = initialized.clone();
            }
        }
        Ok(())
    }

    pub fn invoke_dynamic(&mut self, index: u16, params: &[JType], ret: &JType) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        let mut operands = index.to_be_bytes().to_vec();
        operands.extend_from_slice(&[0, 0]);
        self.emit(INVOKEDYNAMIC, &operands);
        self.pop_n(params.len())?;
        if *ret != JType::Void {
            self.push(VType::of(ret));
        }
        Ok(())
    }

    pub fn monitor(&mut self, op: u8) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        self.emit(op, &[]);
        self.pop()?;
        Ok(())
    }

    // ----- control transfer -----

    pub fn athrow(&mut self) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        self.emit(ATHROW, &[]);
        self.pop()?;
        self.alive = false;
        Ok(())
    }

    /// Returns `ty` (`Void` for a plain `return`).
    pub fn ret(&mut self, ty: &JType) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        if *ty == JType::Void {
            self.emit(RETURN, &[]);
        } else {
            self.emit(IRETURN + Self::type_offset(ty), &[]);
            self.pop()?;
        }
        self.alive = false;
        Ok(())
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(LabelState::default());
        Label(self.labels.len() - 1)
    }

    pub fn is_placed(&self, label: Label) -> bool {
        self.labels[label.0].pc.is_some()
    }

    /// Records the current state as an incoming edge of `label`.
    fn edge(&mut self, label: Label) -> BytecodeResult<()> {
        let pc = self.pc();
        match self.labels[label.0].pc {
            Some(target) => {
                self.targets.insert(target);
                let frame = self.frames.get(&target).ok_or(BytecodeError::UnplacedLabel { label: label.0 })?;
                if frame.stack != self.stack || !frame.accepts_locals(&self.locals) {
                    return Err(BytecodeError::StackMismatch {
                        pc,
                        expected: Frame::stack_display(&frame.stack),
                        found: Frame::stack_display(&self.stack),
                    });
                }
            }
            None => {
                let state = &mut self.labels[label.0];
                match &mut state.pending {
                    Some(frame) => {
                        if frame.stack != self.stack {
                            return Err(BytecodeError::StackMismatch {
                                pc,
                                expected: Frame::stack_display(&frame.stack),
                                found: Frame::stack_display(&self.stack),
                            });
                        }
                        frame.merge_locals(&self.locals);
                    }
                    None => {
                        state.pending = Some(Frame { locals: self.locals.clone(), stack: self.stack.clone() });
                    }
                }
            }
        }
        Ok(())
    }

    fn emit_branch(&mut self, op: u8, label: Label) {
        let base = self.bytes.len();
        self.emit(op, &[0, 0]);
        self.fixups.push(Fixup { at: base + 1, base, label, wide: false });
    }

    /// Conditional branch; pops its operands first.
    pub fn jump_if(&mut self, op: u8, label: Label) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        let pops = match op {
            IF_ICMPEQ..=IF_ACMPNE => 2,
            _ => 1,
        };
        self.pop_n(pops)?;
        self.edge(label)?;
        self.emit_branch(op, label);
        Ok(())
    }

    pub fn goto(&mut self, label: Label) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        self.edge(label)?;
        self.emit_branch(GOTO, label);
        self.alive = false;
        Ok(())
    }

    /// Places `label` here. Code after it is reachable if the previous
    /// instruction falls through or some edge targets the label.
    pub fn place(&mut self, label: Label) -> BytecodeResult<()> {
        let pc = self.pc();
        if self.alive {
            self.edge(label)?;
        }
        let state = &mut self.labels[label.0];
        state.pc = Some(pc);
        if let Some(mut frame) = state.pending.take() {
            // a second label at the same offset shares one frame
            if let Some(existing) = self.frames.get(&pc) {
                frame.merge_locals(&existing.locals);
            }
            // slots of scopes that ended before this label are gone
            frame.locals.truncate(usize::from(self.next_local));
            self.stack_slots = frame.stack.iter().map(VType::size).sum();
            self.stack = frame.stack.clone();
            self.locals = frame.locals.clone();
            self.frames.insert(pc, frame);
            self.alive = true;
        }
        Ok(())
    }

    /// Places `label` if any edge reaches it; otherwise stays unreachable.
    pub fn place_if_used(&mut self, label: Label) -> BytecodeResult<()> {
        if self.alive || self.labels[label.0].pending.is_some() {
            self.place(label)?;
        }
        Ok(())
    }

    /// `tableswitch` or `lookupswitch` on the int on top of the stack.
    pub fn switch(&mut self, cases: &[(i32, Label)], default: Label) -> BytecodeResult<()> {
        if !self.alive {
            return Ok(());
        }
        self.pop()?;
        let mut sorted: Vec<(i32, Label)> = cases.to_vec();
        sorted.sort_by_key(|(k, _)| *k);
        sorted.dedup_by_key(|(k, _)| *k);
        for (_, label) in &sorted {
            self.edge(*label)?;
        }
        self.edge(default)?;

        let keys: Vec<i32> = sorted.iter().map(|(k, _)| *k).collect();
        let base = self.bytes.len();
        let shape = switch_optimizer::choose(&keys);
        let op = match shape {
            SwitchShape::Table { .. } => TABLESWITCH,
            SwitchShape::Lookup => LOOKUPSWITCH,
        };
        self.bytes.push(op);
        self.bytes.extend(std::iter::repeat(0).take(switch_optimizer::padding(base)));
        self.wide_target(base, default);
        match shape {
            SwitchShape::Table { low, high } => {
                self.bytes.extend_from_slice(&low.to_be_bytes());
                self.bytes.extend_from_slice(&high.to_be_bytes());
                let mut iter = sorted.iter().peekable();
                for key in low..=high {
                    match iter.peek() {
                        Some((k, label)) if *k == key => {
                            self.wide_target(base, *label);
                            iter.next();
                        }
                        _ => self.wide_target(base, default),
                    }
                }
            }
            SwitchShape::Lookup => {
                self.bytes.extend_from_slice(&(sorted.len() as i32).to_be_bytes());
                for (key, label) in &sorted {
                    self.bytes.extend_from_slice(&key.to_be_bytes());
                    self.wide_target(base, *label);
                }
            }
        }
        self.alive = false;
        Ok(())
    }

    fn wide_target(&mut self, base: usize, label: Label) {
        let at = self.bytes.len();
        self.bytes.extend_from_slice(&[0, 0, 0, 0]);
        self.fixups.push(Fixup { at, base, label, wide: true });
    }

    // ----- exceptions and debug info -----

    /// Protects `[start, end)` with the handler at `handler`, entered with
    /// `locals` and a `caught` exception on the stack. `catch_type` 0
    /// catches everything. Empty ranges are dropped.
    pub fn add_handler(
        &mut self,
        start: u16,
        end: u16,
        handler: Label,
        catch_type: u16,
        caught: &str,
        locals: &[VType],
    ) -> BytecodeResult<()> {
        if start >= end {
            return Ok(());
        }
        self.handlers.push(Handler { start, end, handler, catch_type });
        let incoming = Frame { locals: locals.to_vec(), stack: vec![VType::object(caught)] };
        let state = &mut self.labels[handler.0];
        match &mut state.pending {
            Some(frame) => frame.merge_locals(&incoming.locals),
            None => state.pending = Some(incoming),
        }
        Ok(())
    }

    /// Whether `handler` received any protected range.
    pub fn has_handler(&self, handler: Label) -> bool {
        self.handlers.iter().any(|h| h.handler == handler)
    }

    pub fn line(&mut self, line: usize) {
        if !self.alive || line == 0 {
            return;
        }
        let line_number = line.min(usize::from(u16::MAX)) as u16;
        let start_pc = self.pc();
        match self.lines.last_mut() {
            Some(last) if last.line_number == line_number => {}
            Some(last) if last.start_pc == start_pc => last.line_number = line_number,
            _ => self.lines.push(LineNumberEntry { start_pc, line_number }),
        }
    }

    /// Resolves jumps and builds the `Code` attribute.
    pub fn finish(mut self, pool: &mut ConstantPool, emit_frames: bool, debug: bool) -> BytecodeResult<CodeAttribute> {
        if self.bytes.len() > usize::from(u16::MAX) {
            return Err(BytecodeError::CodeTooLarge { size: self.bytes.len() });
        }
        for fixup in &self.fixups {
            let target = self.labels[fixup.label.0].pc.ok_or(BytecodeError::UnplacedLabel { label: fixup.label.0 })?;
            let offset = i64::from(target) - fixup.base as i64;
            if fixup.wide {
                self.bytes[fixup.at..fixup.at + 4].copy_from_slice(&(offset as i32).to_be_bytes());
            } else {
                let narrow = i16::try_from(offset).map_err(|_| BytecodeError::BranchTooFar { offset })?;
                self.bytes[fixup.at..fixup.at + 2].copy_from_slice(&narrow.to_be_bytes());
            }
            self.targets.insert(target);
        }

        let mut exception_table = Vec::with_capacity(self.handlers.len());
        for h in &self.handlers {
            let handler_pc =
                self.labels[h.handler.0].pc.ok_or(BytecodeError::UnplacedLabel { label: h.handler.0 })?;
            self.targets.insert(handler_pc);
            exception_table.push(ExceptionTableEntry {
                start_pc: h.start,
                end_pc: h.end,
                handler_pc,
                catch_type: h.catch_type,
            });
        }

        let mut attributes = Vec::new();
        if emit_frames {
            let frames: Vec<(u16, Frame)> = self
                .targets
                .iter()
                .filter_map(|pc| self.frames.get(pc).map(|f| (*pc, f.clone())))
                .collect();
            if !frames.is_empty() {
                let encoded = encode_frames(&frames, pool)?;
                attributes.push(NamedAttribute::new(pool, AttributeInfo::StackMapTable(encoded))?);
            }
        }
        if debug && !self.lines.is_empty() {
            attributes.push(NamedAttribute::new(pool, AttributeInfo::LineNumberTable(self.lines.clone()))?);
        }

        Ok(CodeAttribute {
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            code: self.bytes,
            exception_table,
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ConstantPool {
        ConstantPool::new()
    }

    #[test]
    fn static_method_locals_and_stack() {
        let mut pool = pool();
        let mut code = Code::new("A", true, false, &[JType::Int, JType::Long]);
        code.load(&JType::Int, 0);
        code.iconst(1000, &mut pool).unwrap();
        code.arith(IADD, &JType::Int).unwrap();
        code.ret(&JType::Int).unwrap();
        let attr = code.finish(&mut pool, true, false).unwrap();
        assert_eq!(attr.code, vec![ILOAD_0, SIPUSH, 0x03, 0xe8, IADD, IRETURN]);
        assert_eq!(attr.max_stack, 2);
        assert_eq!(attr.max_locals, 3);
        assert!(attr.attributes.is_empty());
    }

    #[test]
    fn forward_branch_records_a_frame() {
        let mut pool = pool();
        let mut code = Code::new("A", true, false, &[JType::Int]);
        let else_label = code.new_label();
        let end = code.new_label();
        code.load(&JType::Int, 0);
        code.jump_if(IFEQ, else_label).unwrap();
        code.iconst(1, &mut pool).unwrap();
        code.goto(end).unwrap();
        code.place(else_label).unwrap();
        code.iconst(2, &mut pool).unwrap();
        code.place(end).unwrap();
        code.ret(&JType::Int).unwrap();
        let attr = code.finish(&mut pool, true, false).unwrap();
        assert_eq!(attr.code, vec![ILOAD_0, IFEQ, 0, 7, ICONST_0 + 1, GOTO, 0, 4, ICONST_0 + 2, IRETURN]);
        match &attr.attributes[0].info {
            AttributeInfo::StackMapTable(frames) => {
                assert_eq!(frames.len(), 2);
                assert_eq!(frames[0].offset_delta, 8);
                assert_eq!(frames[1].stack.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn dead_code_is_not_emitted() {
        let mut pool = pool();
        let mut code = Code::new("A", true, false, &[]);
        code.ret(&JType::Void).unwrap();
        code.iconst(3, &mut pool).unwrap();
        code.pop_value().unwrap();
        assert!(!code.is_alive());
        assert_eq!(code.pc(), 1);
    }

    #[test]
    fn mismatched_stacks_are_rejected() {
        let mut pool = pool();
        let mut code = Code::new("A", true, false, &[JType::Int]);
        let join = code.new_label();
        code.load(&JType::Int, 0);
        code.jump_if(IFEQ, join).unwrap();
        code.iconst(1, &mut pool).unwrap();
        let err = code.place(join).unwrap_err();
        assert!(matches!(err, BytecodeError::StackMismatch { .. }));
    }

    #[test]
    fn constructor_receiver_is_initialized() {
        let mut pool = pool();
        let mut code = Code::new("A", false, true, &[]);
        assert_eq!(code.locals_snapshot(), vec![VType::UninitializedThis]);
        code.load(&JType::object(), 0);
        let init = pool.try_add_method_ref("java/lang/Object", "<init>", "()V").unwrap();
        code.invoke_init(init, &[]).unwrap();
        assert_eq!(code.locals_snapshot(), vec![VType::object("A")]);
    }

    #[test]
    fn new_dup_init_leaves_one_object() {
        let mut pool = pool();
        let mut code = Code::new("A", true, false, &[]);
        code.new_object("B", &mut pool).unwrap();
        code.dup(DUP).unwrap();
        let init = pool.try_add_method_ref("B", "<init>", "()V").unwrap();
        code.invoke_init(init, &[]).unwrap();
        assert_eq!(code.stack(), &[VType::object("B")]);
    }

    #[test]
    fn dense_switch_becomes_a_table() {
        let mut pool = pool();
        let mut code = Code::new("A", true, false, &[JType::Int]);
        let a = code.new_label();
        let b = code.new_label();
        let c = code.new_label();
        let d = code.new_label();
        code.load(&JType::Int, 0);
        code.switch(&[(1, a), (2, b), (3, c)], d).unwrap();
        for l in [a, b, c, d] {
            code.place(l).unwrap();
            code.ret(&JType::Void).unwrap();
        }
        let attr = code.finish(&mut pool, true, false).unwrap();
        assert_eq!(attr.code[1], TABLESWITCH);
        // operands aligned at 4; the first target follows three offsets at 28
        assert_eq!(&attr.code[4..8], &30i32.to_be_bytes());
        assert_eq!(&attr.code[8..16], &[0, 0, 0, 1, 0, 0, 0, 3]);
        assert_eq!(&attr.code[16..20], &27i32.to_be_bytes());
    }

    #[test]
    fn two_sparse_keys_use_a_lookup() {
        let mut pool = pool();
        let mut code = Code::new("A", true, false, &[JType::Int]);
        let a = code.new_label();
        let d = code.new_label();
        code.load(&JType::Int, 0);
        code.switch(&[(10, a), (-5, a)], d).unwrap();
        code.place(a).unwrap();
        code.place(d).unwrap();
        code.ret(&JType::Void).unwrap();
        let attr = code.finish(&mut pool, true, false).unwrap();
        assert_eq!(attr.code[1], LOOKUPSWITCH);
        assert_eq!(&attr.code[8..12], &2i32.to_be_bytes());
        assert_eq!(&attr.code[12..16], &(-5i32).to_be_bytes());
    }

    #[test]
    fn wide_dups_move_categories() {
        let mut pool = pool();
        let mut code = Code::new("A", true, false, &[]);
        code.iconst(1, &mut pool).unwrap();
        code.lconst(7, &mut pool).unwrap();
        code.dup_value_under(1).unwrap();
        assert_eq!(code.stack(), &[VType::Long, VType::Int, VType::Long]);
        assert_eq!(code.max_stack, 5);
    }

    #[test]
    fn handler_frame_has_the_exception() {
        let mut pool = pool();
        let mut code = Code::new("A", true, false, &[]);
        let handler = code.new_label();
        let start = code.pc();
        let locals = code.locals_snapshot();
        code.iconst(1, &mut pool).unwrap();
        code.pop_value().unwrap();
        let end = code.pc();
        code.ret(&JType::Void).unwrap();
        code.add_handler(start, end, handler, 0, "java/lang/Throwable", &locals).unwrap();
        code.place(handler).unwrap();
        assert_eq!(code.stack(), &[VType::object("java/lang/Throwable")]);
        code.athrow().unwrap();
        let attr = code.finish(&mut pool, true, false).unwrap();
        assert_eq!(attr.exception_table.len(), 1);
        assert_eq!(attr.exception_table[0].handler_pc, 3);
    }

    #[test]
    fn spilled_values_keep_their_type() {
        let mut pool = pool();
        let mut code = Code::new("A", true, false, &[]);
        code.new_object("B", &mut pool).unwrap();
        let slot = code.alloc_local(&JType::object());
        code.spill(slot).unwrap();
        assert!(code.stack().is_empty());
        code.unspill(slot).unwrap();
        assert!(matches!(code.stack(), [VType::Uninitialized(0)]));
    }
}
