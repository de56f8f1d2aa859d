//! Constant pool and constants for Java class files

use std::collections::HashMap;

use super::error::{ConstPoolError, ConstPoolResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    InvokeDynamic(u16, u16),
}

pub mod constant_tags {
    pub const CONSTANT_UTF8: u8 = 1;
    pub const CONSTANT_INTEGER: u8 = 3;
    pub const CONSTANT_FLOAT: u8 = 4;
    pub const CONSTANT_LONG: u8 = 5;
    pub const CONSTANT_DOUBLE: u8 = 6;
    pub const CONSTANT_CLASS: u8 = 7;
    pub const CONSTANT_STRING: u8 = 8;
    pub const CONSTANT_FIELDREF: u8 = 9;
    pub const CONSTANT_METHODREF: u8 = 10;
    pub const CONSTANT_INTERFACEMETHODREF: u8 = 11;
    pub const CONSTANT_NAMEANDTYPE: u8 = 12;
    pub const CONSTANT_METHODHANDLE: u8 = 15;
    pub const CONSTANT_METHODTYPE: u8 = 16;
    pub const CONSTANT_INVOKEDYNAMIC: u8 = 18;
}

impl Constant {
    pub fn tag(&self) -> u8 {
        use constant_tags::*;
        match self {
            Constant::Utf8(_) => CONSTANT_UTF8,
            Constant::Integer(_) => CONSTANT_INTEGER,
            Constant::Float(_) => CONSTANT_FLOAT,
            Constant::Long(_) => CONSTANT_LONG,
            Constant::Double(_) => CONSTANT_DOUBLE,
            Constant::Class(_) => CONSTANT_CLASS,
            Constant::String(_) => CONSTANT_STRING,
            Constant::FieldRef(..) => CONSTANT_FIELDREF,
            Constant::MethodRef(..) => CONSTANT_METHODREF,
            Constant::InterfaceMethodRef(..) => CONSTANT_INTERFACEMETHODREF,
            Constant::NameAndType(..) => CONSTANT_NAMEANDTYPE,
            Constant::MethodHandle(..) => CONSTANT_METHODHANDLE,
            Constant::MethodType(_) => CONSTANT_METHODTYPE,
            Constant::InvokeDynamic(..) => CONSTANT_INVOKEDYNAMIC,
        }
    }

    /// Long and double entries take two pool slots.
    pub fn width(&self) -> u16 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }

    fn key(&self) -> ConstKey {
        match self {
            Constant::Utf8(s) => ConstKey::Utf8(s.clone()),
            Constant::Integer(v) => ConstKey::Bits(self.tag(), *v as u32 as u64),
            Constant::Float(v) => ConstKey::Bits(self.tag(), v.to_bits() as u64),
            Constant::Long(v) => ConstKey::Bits(self.tag(), *v as u64),
            Constant::Double(v) => ConstKey::Bits(self.tag(), v.to_bits()),
            Constant::Class(a) | Constant::String(a) | Constant::MethodType(a) => ConstKey::Refs(self.tag(), *a, 0),
            Constant::FieldRef(a, b)
            | Constant::MethodRef(a, b)
            | Constant::InterfaceMethodRef(a, b)
            | Constant::NameAndType(a, b)
            | Constant::InvokeDynamic(a, b) => ConstKey::Refs(self.tag(), *a, *b),
            Constant::MethodHandle(kind, r) => ConstKey::Refs(self.tag(), u16::from(*kind), *r),
        }
    }
}

/// Identity of a constant for deduplication; floats compare by bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    Utf8(String),
    Bits(u8, u64),
    Refs(u8, u16, u16),
}

/// A class file constant pool. Indices are 1-based; long and double
/// entries occupy two indices, the second of which is unusable.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    /// `(index, constant)` in insertion order.
    pub(crate) constants: Vec<(u16, Constant)>,
    index: HashMap<ConstKey, u16>,
    next: u16,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self { constants: Vec::new(), index: HashMap::new(), next: 1 }
    }

    /// `constant_pool_count` as written to the class file.
    pub fn count(&self) -> u16 {
        self.next.max(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.constants.iter().map(|(i, c)| (*i, c))
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.constants
            .binary_search_by_key(&index, |(i, _)| *i)
            .ok()
            .map(|pos| &self.constants[pos].1)
    }

    fn try_add(&mut self, constant: Constant) -> ConstPoolResult<u16> {
        let key = constant.key();
        if let Some(&index) = self.index.get(&key) {
            return Ok(index);
        }
        let index = self.next;
        let next = u32::from(index) + u32::from(constant.width());
        if next > u32::from(u16::MAX) {
            return Err(ConstPoolError::OutOfSpace);
        }
        self.next = next as u16;
        self.constants.push((index, constant));
        self.index.insert(key, index);
        Ok(index)
    }

    pub fn try_add_utf8(&mut self, value: &str) -> ConstPoolResult<u16> {
        let len = modified_utf8_len(value);
        if len > usize::from(u16::MAX) {
            return Err(ConstPoolError::Utf8TooLong { len });
        }
        self.try_add(Constant::Utf8(value.to_string()))
    }

    pub fn try_add_class(&mut self, name: &str) -> ConstPoolResult<u16> {
        let name_index = self.try_add_utf8(name)?;
        self.try_add(Constant::Class(name_index))
    }

    pub fn try_add_string(&mut self, value: &str) -> ConstPoolResult<u16> {
        let utf8 = self.try_add_utf8(value)?;
        self.try_add(Constant::String(utf8))
    }

    pub fn try_add_integer(&mut self, value: i32) -> ConstPoolResult<u16> {
        self.try_add(Constant::Integer(value))
    }

    pub fn try_add_float(&mut self, value: f32) -> ConstPoolResult<u16> {
        self.try_add(Constant::Float(value))
    }

    pub fn try_add_long(&mut self, value: i64) -> ConstPoolResult<u16> {
        self.try_add(Constant::Long(value))
    }

    pub fn try_add_double(&mut self, value: f64) -> ConstPoolResult<u16> {
        self.try_add(Constant::Double(value))
    }

    pub fn try_add_name_and_type(&mut self, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let name_index = self.try_add_utf8(name)?;
        let descriptor_index = self.try_add_utf8(descriptor)?;
        self.try_add(Constant::NameAndType(name_index, descriptor_index))
    }

    pub fn try_add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let class_index = self.try_add_class(class)?;
        let nat = self.try_add_name_and_type(name, descriptor)?;
        self.try_add(Constant::FieldRef(class_index, nat))
    }

    pub fn try_add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let class_index = self.try_add_class(class)?;
        let nat = self.try_add_name_and_type(name, descriptor)?;
        self.try_add(Constant::MethodRef(class_index, nat))
    }

    pub fn try_add_interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let class_index = self.try_add_class(class)?;
        let nat = self.try_add_name_and_type(name, descriptor)?;
        self.try_add(Constant::InterfaceMethodRef(class_index, nat))
    }

    pub fn try_add_method_handle(&mut self, kind: u8, reference: u16) -> ConstPoolResult<u16> {
        self.try_add(Constant::MethodHandle(kind, reference))
    }

    pub fn try_add_method_type(&mut self, descriptor: &str) -> ConstPoolResult<u16> {
        let d = self.try_add_utf8(descriptor)?;
        self.try_add(Constant::MethodType(d))
    }

    pub fn try_add_invoke_dynamic(&mut self, bootstrap: u16, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let nat = self.try_add_name_and_type(name, descriptor)?;
        self.try_add(Constant::InvokeDynamic(bootstrap, nat))
    }

    // ----- lookups -----

    pub fn utf8(&self, index: u16) -> ConstPoolResult<&str> {
        match self.get(index) {
            Some(Constant::Utf8(s)) => Ok(s),
            _ => Err(ConstPoolError::InvalidIndex(index)),
        }
    }

    /// Internal name behind a CONSTANT_Class.
    pub fn class_name(&self, index: u16) -> ConstPoolResult<&str> {
        match self.get(index) {
            Some(Constant::Class(name)) => self.utf8(*name),
            _ => Err(ConstPoolError::InvalidIndex(index)),
        }
    }

    /// `(name, descriptor)` of a CONSTANT_NameAndType.
    pub fn name_and_type(&self, index: u16) -> ConstPoolResult<(&str, &str)> {
        match self.get(index) {
            Some(Constant::NameAndType(n, d)) => Ok((self.utf8(*n)?, self.utf8(*d)?)),
            _ => Err(ConstPoolError::InvalidIndex(index)),
        }
    }

    /// `(class, name, descriptor)` of a field or method reference.
    pub fn member_ref(&self, index: u16) -> ConstPoolResult<(&str, &str, &str)> {
        match self.get(index) {
            Some(Constant::FieldRef(c, nat))
            | Some(Constant::MethodRef(c, nat))
            | Some(Constant::InterfaceMethodRef(c, nat)) => {
                let (name, desc) = self.name_and_type(*nat)?;
                Ok((self.class_name(*c)?, name, desc))
            }
            _ => Err(ConstPoolError::InvalidIndex(index)),
        }
    }
}

/// Length of `s` in the class file's modified UTF-8.
pub fn modified_utf8_len(s: &str) -> usize {
    s.chars()
        .map(|c| match c as u32 {
            0 => 2,
            1..=0x7f => 1,
            0x80..=0x7ff => 2,
            0x800..=0xffff => 3,
            _ => 6,
        })
        .sum()
}

/// Encodes `s` in modified UTF-8: NUL as two bytes, supplementary characters
/// as surrogate pairs.
pub fn to_modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut units = [0u16; 2];
    for c in s.chars() {
        let code = c as u32;
        if code != 0 && code < 0x80 {
            out.push(code as u8);
            continue;
        }
        for unit in c.encode_utf16(&mut units).iter() {
            let u = u32::from(*unit);
            if u < 0x800 {
                out.push((0xc0 | (u >> 6)) as u8);
                out.push((0x80 | (u & 0x3f)) as u8);
            } else {
                out.push((0xe0 | (u >> 12)) as u8);
                out.push((0x80 | ((u >> 6) & 0x3f)) as u8);
                out.push((0x80 | (u & 0x3f)) as u8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_deduplicated() {
        let mut pool = ConstantPool::new();
        let a = pool.try_add_method_ref("java/lang/Object", "<init>", "()V").unwrap();
        let b = pool.try_add_method_ref("java/lang/Object", "<init>", "()V").unwrap();
        assert_eq!(a, b);
        let c1 = pool.try_add_class("java/lang/Object").unwrap();
        assert_eq!(pool.class_name(c1).unwrap(), "java/lang/Object");
        assert_eq!(pool.member_ref(a).unwrap(), ("java/lang/Object", "<init>", "()V"));
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.try_add_long(7).unwrap(), 1);
        assert_eq!(pool.try_add_integer(7).unwrap(), 3);
        assert_eq!(pool.try_add_double(1.5).unwrap(), 4);
        assert_eq!(pool.count(), 6);
        assert!(pool.get(2).is_none());
    }

    #[test]
    fn float_keys_compare_by_bits() {
        let mut pool = ConstantPool::new();
        let zero = pool.try_add_float(0.0).unwrap();
        let neg_zero = pool.try_add_float(-0.0).unwrap();
        assert_ne!(zero, neg_zero);
        assert_eq!(pool.try_add_float(f32::NAN).unwrap(), pool.try_add_float(f32::NAN).unwrap());
    }

    #[test]
    fn modified_utf8_encodes_nul_and_supplementary() {
        assert_eq!(to_modified_utf8("a\0"), vec![b'a', 0xc0, 0x80]);
        assert_eq!(to_modified_utf8("\u{1F600}").len(), 6);
        assert_eq!(modified_utf8_len("\u{1F600}"), 6);
    }
}
