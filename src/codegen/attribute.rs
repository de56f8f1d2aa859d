//! Attributes of class files, fields, methods, `Code` and record components.
//!
//! Attributes are kept structured until serialization so the verifier and
//! tests can inspect them; [`AttributeInfo::to_bytes`] produces the payload
//! that follows `attribute_name_index` and `attribute_length`.

use super::constpool::ConstantPool;
use super::error::ConstPoolResult;
use super::frame::StackMapFrame;

/// An attribute together with the pool index of its name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedAttribute {
    pub name_index: u16,
    pub info: AttributeInfo,
}

impl NamedAttribute {
    pub fn new(pool: &mut ConstantPool, info: AttributeInfo) -> ConstPoolResult<Self> {
        let name_index = pool.try_add_utf8(info.name())?;
        Ok(Self { name_index, info })
    }

    pub fn name(&self) -> &'static str {
        self.info.name()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let payload = self.info.to_bytes();
        let mut bytes = Vec::with_capacity(payload.len() + 6);
        bytes.extend_from_slice(&self.name_index.to_be_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&payload);
        bytes
    }
}

/// Finds the first attribute of the given kind.
pub fn find<'a>(attributes: &'a [NamedAttribute], name: &str) -> Option<&'a AttributeInfo> {
    attributes.iter().find(|a| a.name() == name).map(|a| &a.info)
}

/// Whether the annotation attributes are the runtime-visible kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Invisible,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeInfo {
    Code(CodeAttribute),
    StackMapTable(Vec<StackMapFrame>),
    LineNumberTable(Vec<LineNumberEntry>),
    /// Class indices of the `throws` clause.
    Exceptions(Vec<u16>),
    ConstantValue(u16),
    SourceFile(u16),
    Signature(u16),
    Record(Vec<RecordComponentInfo>),
    MethodParameters(Vec<MethodParameter>),
    BootstrapMethods(Vec<BootstrapMethod>),
    InnerClasses(Vec<InnerClassEntry>),
    NestHost(u16),
    NestMembers(Vec<u16>),
    Annotations(Visibility, Vec<AnnotationInfo>),
    ParameterAnnotations(Visibility, Vec<Vec<AnnotationInfo>>),
    TypeAnnotations(Visibility, Vec<TypeAnnotationInfo>),
    AnnotationDefault(ElementValueInfo),
}

impl AttributeInfo {
    pub fn name(&self) -> &'static str {
        match self {
            AttributeInfo::Code(_) => "Code",
            AttributeInfo::StackMapTable(_) => "StackMapTable",
            AttributeInfo::LineNumberTable(_) => "LineNumberTable",
            AttributeInfo::Exceptions(_) => "Exceptions",
            AttributeInfo::ConstantValue(_) => "ConstantValue",
            AttributeInfo::SourceFile(_) => "SourceFile",
            AttributeInfo::Signature(_) => "Signature",
            AttributeInfo::Record(_) => "Record",
            AttributeInfo::MethodParameters(_) => "MethodParameters",
            AttributeInfo::BootstrapMethods(_) => "BootstrapMethods",
            AttributeInfo::InnerClasses(_) => "InnerClasses",
            AttributeInfo::NestHost(_) => "NestHost",
            AttributeInfo::NestMembers(_) => "NestMembers",
            AttributeInfo::Annotations(Visibility::Visible, _) => "RuntimeVisibleAnnotations",
            AttributeInfo::Annotations(Visibility::Invisible, _) => "RuntimeInvisibleAnnotations",
            AttributeInfo::ParameterAnnotations(Visibility::Visible, _) => "RuntimeVisibleParameterAnnotations",
            AttributeInfo::ParameterAnnotations(Visibility::Invisible, _) => "RuntimeInvisibleParameterAnnotations",
            AttributeInfo::TypeAnnotations(Visibility::Visible, _) => "RuntimeVisibleTypeAnnotations",
            AttributeInfo::TypeAnnotations(Visibility::Invisible, _) => "RuntimeInvisibleTypeAnnotations",
            AttributeInfo::AnnotationDefault(_) => "AnnotationDefault",
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut b = Vec::new();
        match self {
            AttributeInfo::Code(code) => code.write(&mut b),
            AttributeInfo::StackMapTable(frames) => {
                put_u16(&mut b, frames.len());
                for f in frames {
                    b.extend_from_slice(&f.to_bytes());
                }
            }
            AttributeInfo::LineNumberTable(lines) => {
                put_u16(&mut b, lines.len());
                for l in lines {
                    b.extend_from_slice(&l.start_pc.to_be_bytes());
                    b.extend_from_slice(&l.line_number.to_be_bytes());
                }
            }
            AttributeInfo::Exceptions(indices) | AttributeInfo::NestMembers(indices) => {
                put_u16(&mut b, indices.len());
                for i in indices {
                    b.extend_from_slice(&i.to_be_bytes());
                }
            }
            AttributeInfo::ConstantValue(i)
            | AttributeInfo::SourceFile(i)
            | AttributeInfo::Signature(i)
            | AttributeInfo::NestHost(i) => b.extend_from_slice(&i.to_be_bytes()),
            AttributeInfo::Record(components) => {
                put_u16(&mut b, components.len());
                for c in components {
                    b.extend_from_slice(&c.name_index.to_be_bytes());
                    b.extend_from_slice(&c.descriptor_index.to_be_bytes());
                    write_attributes(&mut b, &c.attributes);
                }
            }
            AttributeInfo::MethodParameters(params) => {
                b.push(params.len() as u8);
                for p in params {
                    b.extend_from_slice(&p.name_index.to_be_bytes());
                    b.extend_from_slice(&p.access_flags.to_be_bytes());
                }
            }
            AttributeInfo::BootstrapMethods(methods) => {
                put_u16(&mut b, methods.len());
                for m in methods {
                    b.extend_from_slice(&m.method_ref.to_be_bytes());
                    put_u16(&mut b, m.arguments.len());
                    for a in &m.arguments {
                        b.extend_from_slice(&a.to_be_bytes());
                    }
                }
            }
            AttributeInfo::InnerClasses(entries) => {
                put_u16(&mut b, entries.len());
                for e in entries {
                    b.extend_from_slice(&e.inner_class_info.to_be_bytes());
                    b.extend_from_slice(&e.outer_class_info.to_be_bytes());
                    b.extend_from_slice(&e.inner_name.to_be_bytes());
                    b.extend_from_slice(&e.access_flags.to_be_bytes());
                }
            }
            AttributeInfo::Annotations(_, annotations) => {
                put_u16(&mut b, annotations.len());
                for a in annotations {
                    a.write(&mut b);
                }
            }
            AttributeInfo::ParameterAnnotations(_, params) => {
                b.push(params.len() as u8);
                for p in params {
                    put_u16(&mut b, p.len());
                    for a in p {
                        a.write(&mut b);
                    }
                }
            }
            AttributeInfo::TypeAnnotations(_, annotations) => {
                put_u16(&mut b, annotations.len());
                for a in annotations {
                    a.write(&mut b);
                }
            }
            AttributeInfo::AnnotationDefault(value) => value.write(&mut b),
        }
        b
    }
}

fn put_u16(b: &mut Vec<u8>, n: usize) {
    b.extend_from_slice(&(n as u16).to_be_bytes());
}

pub(crate) fn write_attributes(b: &mut Vec<u8>, attributes: &[NamedAttribute]) {
    put_u16(b, attributes.len());
    for a in attributes {
        b.extend_from_slice(&a.to_bytes());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Vec<NamedAttribute>,
}

impl CodeAttribute {
    fn write(&self, b: &mut Vec<u8>) {
        b.extend_from_slice(&self.max_stack.to_be_bytes());
        b.extend_from_slice(&self.max_locals.to_be_bytes());
        b.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        b.extend_from_slice(&self.code);
        put_u16(b, self.exception_table.len());
        for e in &self.exception_table {
            b.extend_from_slice(&e.start_pc.to_be_bytes());
            b.extend_from_slice(&e.end_pc.to_be_bytes());
            b.extend_from_slice(&e.handler_pc.to_be_bytes());
            b.extend_from_slice(&e.catch_type.to_be_bytes());
        }
        write_attributes(b, &self.attributes);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// 0 catches everything (`finally`).
    pub catch_type: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumberEntry {
    pub start_pc: u16,
    pub line_number: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordComponentInfo {
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<NamedAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodParameter {
    pub name_index: u16,
    pub access_flags: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BootstrapMethod {
    pub method_ref: u16,
    pub arguments: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerClassEntry {
    pub inner_class_info: u16,
    /// 0 for local and anonymous classes.
    pub outer_class_info: u16,
    /// 0 for anonymous classes.
    pub inner_name: u16,
    pub access_flags: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationInfo {
    pub type_index: u16,
    pub elements: Vec<(u16, ElementValueInfo)>,
}

impl AnnotationInfo {
    fn write(&self, b: &mut Vec<u8>) {
        b.extend_from_slice(&self.type_index.to_be_bytes());
        put_u16(b, self.elements.len());
        for (name, value) in &self.elements {
            b.extend_from_slice(&name.to_be_bytes());
            value.write(b);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValueInfo {
    /// `B C D F I J S Z s` with the index of the constant.
    Const(u8, u16),
    Enum { type_name: u16, const_name: u16 },
    Class(u16),
    Annotation(AnnotationInfo),
    Array(Vec<ElementValueInfo>),
}

impl ElementValueInfo {
    fn write(&self, b: &mut Vec<u8>) {
        match self {
            ElementValueInfo::Const(tag, index) => {
                b.push(*tag);
                b.extend_from_slice(&index.to_be_bytes());
            }
            ElementValueInfo::Enum { type_name, const_name } => {
                b.push(b'e');
                b.extend_from_slice(&type_name.to_be_bytes());
                b.extend_from_slice(&const_name.to_be_bytes());
            }
            ElementValueInfo::Class(index) => {
                b.push(b'c');
                b.extend_from_slice(&index.to_be_bytes());
            }
            ElementValueInfo::Annotation(a) => {
                b.push(b'@');
                a.write(b);
            }
            ElementValueInfo::Array(values) => {
                b.push(b'[');
                put_u16(b, values.len());
                for v in values {
                    v.write(b);
                }
            }
        }
    }
}

/// `target_type` and `target_info` of a type annotation (JVMS 4.7.20.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeAnnotationTarget {
    /// 0x13: type of a field or record component.
    Field,
    /// 0x14: return type of a method.
    MethodReturn,
    /// 0x16: type of the formal parameter at this index.
    FormalParameter(u8),
}

impl TypeAnnotationTarget {
    pub fn target_type(self) -> u8 {
        match self {
            TypeAnnotationTarget::Field => 0x13,
            TypeAnnotationTarget::MethodReturn => 0x14,
            TypeAnnotationTarget::FormalParameter(_) => 0x16,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotationInfo {
    pub target: TypeAnnotationTarget,
    /// `(type_path_kind, type_argument_index)` steps.
    pub path: Vec<(u8, u8)>,
    pub annotation: AnnotationInfo,
}

impl TypeAnnotationInfo {
    fn write(&self, b: &mut Vec<u8>) {
        b.push(self.target.target_type());
        if let TypeAnnotationTarget::FormalParameter(index) = self.target {
            b.push(index);
        }
        b.push(self.path.len() as u8);
        for (kind, arg) in &self.path {
            b.push(*kind);
            b.push(*arg);
        }
        self.annotation.write(b);
    }
}
