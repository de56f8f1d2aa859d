//! Verification types and StackMapTable frames.
//!
//! [`VType`] is the symbolic form the code buffer tracks while emitting;
//! [`VerificationType`] is its constant-pool-indexed class file encoding.

use std::fmt;

use super::constpool::ConstantPool;
use super::error::ConstPoolResult;
use crate::wash::types::JType;

/// Type of one operand stack entry or local variable slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VType {
    Top,
    Int,
    Float,
    Long,
    Double,
    Null,
    UninitializedThis,
    /// Class or array by internal name (`java/lang/String`, `[I`).
    Object(String),
    /// Result of the `new` at this offset, before its constructor ran.
    Uninitialized(u16),
}

impl VType {
    pub fn of(ty: &JType) -> VType {
        match ty {
            JType::Boolean | JType::Byte | JType::Short | JType::Char | JType::Int => VType::Int,
            JType::Long => VType::Long,
            JType::Float => VType::Float,
            JType::Double => VType::Double,
            JType::Null => VType::Null,
            JType::Void | JType::Error => VType::Top,
            other => VType::Object(other.internal_name()),
        }
    }

    pub fn object(name: &str) -> VType {
        VType::Object(name.to_string())
    }

    /// Slots taken on the stack or in the locals.
    pub fn size(&self) -> u16 {
        match self {
            VType::Long | VType::Double => 2,
            _ => 1,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, VType::Null | VType::Object(_) | VType::UninitializedThis | VType::Uninitialized(_))
    }

    pub fn to_verification(&self, pool: &mut ConstantPool) -> ConstPoolResult<VerificationType> {
        Ok(match self {
            VType::Top => VerificationType::Top,
            VType::Int => VerificationType::Integer,
            VType::Float => VerificationType::Float,
            VType::Long => VerificationType::Long,
            VType::Double => VerificationType::Double,
            VType::Null => VerificationType::Null,
            VType::UninitializedThis => VerificationType::UninitializedThis,
            VType::Object(name) => VerificationType::Object(pool.try_add_class(name)?),
            VType::Uninitialized(offset) => VerificationType::Uninitialized(*offset),
        })
    }
}

impl fmt::Display for VType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VType::Top => write!(f, "top"),
            VType::Int => write!(f, "int"),
            VType::Float => write!(f, "float"),
            VType::Long => write!(f, "long"),
            VType::Double => write!(f, "double"),
            VType::Null => write!(f, "null"),
            VType::UninitializedThis => write!(f, "uninitializedThis"),
            VType::Object(name) => write!(f, "{}", name),
            VType::Uninitialized(offset) => write!(f, "uninitialized({})", offset),
        }
    }
}

/// Locals (one entry per slot, the second slot of a long or double is
/// `Top`) and operand stack (one entry per value) at an instruction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub locals: Vec<VType>,
    pub stack: Vec<VType>,
}

impl Frame {
    /// Joins the locals of `other` into this frame; differing slots become
    /// unusable. Stacks must already agree.
    pub fn merge_locals(&mut self, other: &[VType]) {
        let n = self.locals.len().max(other.len());
        self.locals.resize(n, VType::Top);
        for (i, slot) in self.locals.iter_mut().enumerate() {
            if other.get(i) != Some(slot) {
                *slot = VType::Top;
            }
        }
        self.fix_wide_slots();
    }

    /// A long or double whose second half was lost is unusable too.
    fn fix_wide_slots(&mut self) {
        for i in 0..self.locals.len() {
            if self.locals[i].size() == 2 && self.locals.get(i + 1) != Some(&VType::Top) {
                self.locals[i] = VType::Top;
            }
        }
    }

    /// Whether a state with `locals` can jump here: every slot this frame
    /// relies on holds the same type.
    pub fn accepts_locals(&self, locals: &[VType]) -> bool {
        self.locals
            .iter()
            .enumerate()
            .all(|(i, t)| *t == VType::Top || locals.get(i) == Some(t))
    }

    pub fn stack_display(stack: &[VType]) -> String {
        stack.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
    }

    /// Class file form of the locals: one entry per value, trailing unusable
    /// slots dropped.
    pub fn encoded_locals(&self, pool: &mut ConstantPool) -> ConstPoolResult<Vec<VerificationType>> {
        let mut end = self.locals.len();
        while end > 0 && self.locals[end - 1] == VType::Top {
            end -= 1;
        }
        let mut out = Vec::new();
        let mut i = 0;
        while i < end {
            let t = &self.locals[i];
            out.push(t.to_verification(pool)?);
            i += usize::from(t.size());
        }
        Ok(out)
    }
}

/// VerificationTypeInfo as defined in JVMS 4.7.4
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    /// cpool index to CONSTANT_Class
    Object(u16),
    /// offset of the `new` instruction
    Uninitialized(u16),
}

impl VerificationType {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            VerificationType::Top => bytes.push(0),
            VerificationType::Integer => bytes.push(1),
            VerificationType::Float => bytes.push(2),
            VerificationType::Double => bytes.push(3),
            VerificationType::Long => bytes.push(4),
            VerificationType::Null => bytes.push(5),
            VerificationType::UninitializedThis => bytes.push(6),
            VerificationType::Object(cp_index) => {
                bytes.push(7);
                bytes.extend_from_slice(&cp_index.to_be_bytes());
            }
            VerificationType::Uninitialized(offset) => {
                bytes.push(8);
                bytes.extend_from_slice(&offset.to_be_bytes());
            }
        }
        bytes
    }
}

/// One StackMapTable entry. Every frame is written as a `full_frame`.
#[derive(Debug, Clone, PartialEq)]
pub struct StackMapFrame {
    pub offset_delta: u16,
    pub locals: Vec<VerificationType>,
    pub stack: Vec<VerificationType>,
}

impl StackMapFrame {
    pub const FULL_FRAME: u8 = 255;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![Self::FULL_FRAME];
        bytes.extend_from_slice(&self.offset_delta.to_be_bytes());
        bytes.extend_from_slice(&(self.locals.len() as u16).to_be_bytes());
        for l in &self.locals {
            bytes.extend_from_slice(&l.to_bytes());
        }
        bytes.extend_from_slice(&(self.stack.len() as u16).to_be_bytes());
        for s in &self.stack {
            bytes.extend_from_slice(&s.to_bytes());
        }
        bytes
    }
}

/// Encodes the frames recorded at `pcs` (ascending) as StackMapTable entries.
pub fn encode_frames(frames: &[(u16, Frame)], pool: &mut ConstantPool) -> ConstPoolResult<Vec<StackMapFrame>> {
    let mut out = Vec::with_capacity(frames.len());
    let mut previous: Option<u16> = None;
    for (pc, frame) in frames {
        let offset_delta = match previous {
            None => *pc,
            Some(p) => pc - p - 1,
        };
        previous = Some(*pc);
        let locals = frame.encoded_locals(pool)?;
        let stack = frame.stack.iter().map(|t| t.to_verification(pool)).collect::<ConstPoolResult<Vec<_>>>()?;
        out.push(StackMapFrame { offset_delta, locals, stack });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merging_drops_disagreeing_slots() {
        let mut f = Frame { locals: vec![VType::object("A"), VType::Int, VType::Long, VType::Top], stack: vec![] };
        f.merge_locals(&[VType::object("A"), VType::Float, VType::Long, VType::Top]);
        assert_eq!(f.locals, vec![VType::object("A"), VType::Top, VType::Long, VType::Top]);
        f.merge_locals(&[VType::object("A")]);
        assert_eq!(f.locals, vec![VType::object("A"), VType::Top, VType::Top, VType::Top]);
    }

    #[test]
    fn wide_locals_encode_once() {
        let mut pool = ConstantPool::new();
        let f = Frame { locals: vec![VType::Long, VType::Top, VType::Int, VType::Top], stack: vec![] };
        let encoded = f.encoded_locals(&mut pool).unwrap();
        assert_eq!(encoded, vec![VerificationType::Long, VerificationType::Integer]);
    }

    #[test]
    fn offset_deltas_are_relative() {
        let mut pool = ConstantPool::new();
        let frames = vec![(4, Frame::default()), (10, Frame::default())];
        let encoded = encode_frames(&frames, &mut pool).unwrap();
        assert_eq!(encoded[0].offset_delta, 4);
        assert_eq!(encoded[1].offset_delta, 5);
        assert_eq!(encoded[0].to_bytes(), vec![255, 0, 4, 0, 0, 0, 0]);
    }

    #[test]
    fn frames_accept_more_precise_locals() {
        let f = Frame { locals: vec![VType::Int, VType::Top], stack: vec![] };
        assert!(f.accepts_locals(&[VType::Int, VType::object("A")]));
        assert!(!f.accepts_locals(&[VType::Float]));
    }
}
