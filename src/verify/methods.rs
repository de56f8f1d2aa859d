use crate::codegen::attribute::AttributeInfo;
use crate::codegen::class::ClassFile;
use crate::codegen::defs::access_flags;
use crate::codegen::method::MethodInfo;
use crate::wash::types::parse_method_descriptor;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MethodsVerifyError {
    #[error("Method {0}{1} has a malformed descriptor")]
    BadDescriptor(String, String),
    #[error("Method {0}{1} must not have a Code attribute")]
    UnexpectedCode(String, String),
    #[error("Method {0}{1} has no Code attribute")]
    MissingCode(String, String),
    #[error("Method {0}{1} has code but max_stack 0")]
    ZeroMaxStack(String, String),
    #[error("Method {0}{1}: MethodParameters lists {2} parameters, descriptor has {3}")]
    ParameterCount(String, String, usize, usize),
    #[error("Invalid constant pool index {0}")]
    InvalidIndex(u16),
}

pub type Result<T> = std::result::Result<T, MethodsVerifyError>;

pub fn verify(class_file: &ClassFile) -> Result<()> {
    for method in &class_file.methods {
        verify_method(class_file, method)?;
    }
    Ok(())
}

fn verify_method(class_file: &ClassFile, method: &MethodInfo) -> Result<()> {
    let pool = &class_file.constant_pool;
    let name = pool.utf8(method.name_index).map_err(|_| MethodsVerifyError::InvalidIndex(method.name_index))?;
    let desc =
        pool.utf8(method.descriptor_index).map_err(|_| MethodsVerifyError::InvalidIndex(method.descriptor_index))?;
    let (params, _) =
        parse_method_descriptor(desc).ok_or_else(|| MethodsVerifyError::BadDescriptor(name.into(), desc.into()))?;

    let bodiless = method.access_flags & (access_flags::ACC_ABSTRACT | access_flags::ACC_NATIVE) != 0;
    match (method.code(), bodiless) {
        (Some(_), true) => return Err(MethodsVerifyError::UnexpectedCode(name.into(), desc.into())),
        (None, false) => return Err(MethodsVerifyError::MissingCode(name.into(), desc.into())),
        (Some(code), false) if !code.code.is_empty() && code.max_stack == 0 => {
            // a lone `return` needs no operand stack
            if code.code.len() > 1 {
                return Err(MethodsVerifyError::ZeroMaxStack(name.into(), desc.into()));
            }
        }
        _ => {}
    }

    if let Some(AttributeInfo::MethodParameters(list)) = method.attribute("MethodParameters") {
        if list.len() != params.len() {
            return Err(MethodsVerifyError::ParameterCount(name.into(), desc.into(), list.len(), params.len()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::attribute::{CodeAttribute, MethodParameter, NamedAttribute};

    fn class_with(method: impl FnOnce(&mut ClassFile) -> MethodInfo) -> ClassFile {
        let mut class = ClassFile::new(61);
        let m = method(&mut class);
        class.methods.push(m);
        class
    }

    fn code(max_stack: u16, bytes: Vec<u8>) -> AttributeInfo {
        AttributeInfo::Code(CodeAttribute {
            max_stack,
            max_locals: 1,
            code: bytes,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        })
    }

    #[test]
    fn abstract_methods_have_no_code() {
        let class = class_with(|c| {
            let pool = &mut c.constant_pool;
            let mut m = MethodInfo::new(
                access_flags::ACC_ABSTRACT,
                pool.try_add_utf8("f").unwrap(),
                pool.try_add_utf8("()V").unwrap(),
            );
            m.attributes.push(NamedAttribute::new(pool, code(0, vec![0xb1])).unwrap());
            m
        });
        assert!(matches!(verify(&class), Err(MethodsVerifyError::UnexpectedCode(..))));
    }

    #[test]
    fn method_parameters_match_the_descriptor() {
        let class = class_with(|c| {
            let pool = &mut c.constant_pool;
            let mut m = MethodInfo::new(0, pool.try_add_utf8("<init>").unwrap(), pool.try_add_utf8("(II)V").unwrap());
            m.attributes.push(NamedAttribute::new(pool, code(1, vec![0x2a, 0xb1])).unwrap());
            let p = MethodParameter { name_index: pool.try_add_utf8("x").unwrap(), access_flags: access_flags::ACC_MANDATED };
            m.attributes.push(NamedAttribute::new(pool, AttributeInfo::MethodParameters(vec![p])).unwrap());
            m
        });
        assert_eq!(verify(&class), Err(MethodsVerifyError::ParameterCount("<init>".into(), "(II)V".into(), 1, 2)));
    }
}
