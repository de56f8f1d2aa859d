//! Trait-based serialization for classfile structures

use std::io::Write;

use super::attribute::NamedAttribute;
use super::class::ClassFile;
use super::constpool::{to_modified_utf8, Constant, ConstantPool};

/// An object which can be written into a classfile.
pub trait ClassfileWritable {
    /// Writes the bytes of this object into the given buffer.
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()>;

    /// Writes the bytes of this object into a newly created buffer.
    fn to_classfile_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_to_classfile(&mut buffer);
        buffer
    }
}

impl ClassfileWritable for ClassFile {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.magic.to_be_bytes())?;
        buffer.write_all(&self.minor_version.to_be_bytes())?;
        buffer.write_all(&self.major_version.to_be_bytes())?;
        self.constant_pool.write_to_classfile(buffer)?;
        buffer.write_all(&self.access_flags.to_be_bytes())?;
        buffer.write_all(&self.this_class.to_be_bytes())?;
        buffer.write_all(&self.super_class.to_be_bytes())?;

        buffer.write_all(&(self.interfaces.len() as u16).to_be_bytes())?;
        for interface in &self.interfaces {
            buffer.write_all(&interface.to_be_bytes())?;
        }
        buffer.write_all(&(self.fields.len() as u16).to_be_bytes())?;
        for field in &self.fields {
            buffer.write_all(&field.to_bytes())?;
        }
        buffer.write_all(&(self.methods.len() as u16).to_be_bytes())?;
        for method in &self.methods {
            buffer.write_all(&method.to_bytes())?;
        }
        buffer.write_all(&(self.attributes.len() as u16).to_be_bytes())?;
        for attribute in &self.attributes {
            attribute.write_to_classfile(buffer)?;
        }
        Ok(())
    }
}

impl ClassfileWritable for NamedAttribute {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.to_bytes())
    }
}

impl ClassfileWritable for ConstantPool {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.count().to_be_bytes())?;
        for (_, constant) in self.iter() {
            constant.write_to_classfile(buffer)?;
        }
        Ok(())
    }
}

impl ClassfileWritable for Constant {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&[self.tag()])?;
        match self {
            Constant::Utf8(value) => {
                let bytes = to_modified_utf8(value);
                buffer.write_all(&(bytes.len() as u16).to_be_bytes())?;
                buffer.write_all(&bytes)?;
            }
            Constant::Integer(value) => buffer.write_all(&value.to_be_bytes())?,
            Constant::Float(value) => buffer.write_all(&value.to_bits().to_be_bytes())?,
            Constant::Long(value) => buffer.write_all(&value.to_be_bytes())?,
            Constant::Double(value) => buffer.write_all(&value.to_bits().to_be_bytes())?,
            Constant::Class(index) | Constant::String(index) | Constant::MethodType(index) => {
                buffer.write_all(&index.to_be_bytes())?
            }
            Constant::FieldRef(a, b)
            | Constant::MethodRef(a, b)
            | Constant::InterfaceMethodRef(a, b)
            | Constant::NameAndType(a, b)
            | Constant::InvokeDynamic(a, b) => {
                buffer.write_all(&a.to_be_bytes())?;
                buffer.write_all(&b.to_be_bytes())?;
            }
            Constant::MethodHandle(kind, reference) => {
                buffer.write_all(&[*kind])?;
                buffer.write_all(&reference.to_be_bytes())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_class_header() {
        let mut class = ClassFile::new(61);
        class.this_class = class.constant_pool.try_add_class("A").unwrap();
        class.super_class = class.constant_pool.try_add_class("java/lang/Object").unwrap();
        let bytes = class.to_classfile_bytes();
        assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 61]);
        // A, Class A, java/lang/Object, Class java/lang/Object
        assert_eq!(&bytes[8..10], &[0, 5]);
        // header, pool entries, flags and indices, four empty counts
        assert_eq!(bytes.len(), 10 + (4 + 3 + 19 + 3) + 6 + 8);
    }

    #[test]
    fn float_constants_are_written_by_bits() {
        assert_eq!(Constant::Float(1.0).to_classfile_bytes(), vec![4, 0x3f, 0x80, 0, 0]);
    }
}
