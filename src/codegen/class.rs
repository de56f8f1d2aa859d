//! Core classfile structure

use super::attribute::NamedAttribute;
use super::constpool::ConstantPool;
use super::defs::{major_versions, MAGIC};
use super::field::FieldInfo;
use super::method::MethodInfo;

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<NamedAttribute>,
}

impl ClassFile {
    pub fn new(major_version: u16) -> Self {
        Self {
            magic: MAGIC,
            minor_version: 0,
            major_version,
            constant_pool: ConstantPool::new(),
            access_flags: 0,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Internal name of this class.
    pub fn name(&self) -> &str {
        self.constant_pool.class_name(self.this_class).unwrap_or("")
    }

    /// Internal name of the superclass; `None` only for `java/lang/Object`.
    pub fn super_name(&self) -> Option<&str> {
        if self.super_class == 0 {
            None
        } else {
            self.constant_pool.class_name(self.super_class).ok()
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| self.constant_pool.utf8(f.name_index).ok() == Some(name))
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| {
            self.constant_pool.utf8(m.name_index).ok() == Some(name)
                && self.constant_pool.utf8(m.descriptor_index).ok() == Some(descriptor)
        })
    }

    /// `(name, descriptor)` of every method, in declaration order.
    pub fn method_signatures(&self) -> Vec<(&str, &str)> {
        self.methods
            .iter()
            .map(|m| {
                (
                    self.constant_pool.utf8(m.name_index).unwrap_or(""),
                    self.constant_pool.utf8(m.descriptor_index).unwrap_or(""),
                )
            })
            .collect()
    }

    pub fn attribute(&self, name: &str) -> Option<&super::attribute::AttributeInfo> {
        super::attribute::find(&self.attributes, name)
    }
}

impl Default for ClassFile {
    fn default() -> Self {
        Self::new(major_versions::JAVA_17)
    }
}
