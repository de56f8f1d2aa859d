//! MethodInfo structure

use super::attribute::{find, write_attributes, AttributeInfo, CodeAttribute, NamedAttribute};

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<NamedAttribute>,
}

impl MethodInfo {
    pub fn new(access_flags: u16, name_index: u16, descriptor_index: u16) -> Self {
        Self { access_flags, name_index, descriptor_index, attributes: Vec::new() }
    }

    /// The `Code` attribute; absent for abstract and native methods.
    pub fn code(&self) -> Option<&CodeAttribute> {
        match find(&self.attributes, "Code") {
            Some(AttributeInfo::Code(code)) => Some(code),
            _ => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        find(&self.attributes, name)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.access_flags.to_be_bytes());
        bytes.extend_from_slice(&self.name_index.to_be_bytes());
        bytes.extend_from_slice(&self.descriptor_index.to_be_bytes());
        write_attributes(&mut bytes, &self.attributes);
        bytes
    }
}
