use crate::codegen::attribute::AttributeInfo;
use crate::codegen::class::ClassFile;
use crate::codegen::constpool::{Constant, ConstantPool};
use crate::codegen::defs::ref_kinds;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConstantPoolVerifyError {
    #[error("Invalid constant pool index {0}")]
    InvalidConstantPoolIndex(u16),
    #[error("Invalid constant pool index type {0}")]
    InvalidConstantPoolIndexType(u16),
    #[error("Invalid method handle kind {0}")]
    InvalidReferenceKind(u8),
    #[error("BootstrapMethods attribute not defined")]
    BootstrapMethodsNotDefined,
    #[error("Invalid bootstrap method index {0}")]
    InvalidBootstrapMethodIndex(u16),
}

pub type Result<T> = std::result::Result<T, ConstantPoolVerifyError>;

/// Verify the ClassFile ConstantPool
pub fn verify(class_file: &ClassFile) -> Result<()> {
    let pool = &class_file.constant_pool;
    let bootstraps = class_file.attributes.iter().find_map(|a| match &a.info {
        AttributeInfo::BootstrapMethods(m) => Some(m.len()),
        _ => None,
    });
    for (index, constant) in pool.iter() {
        let expect = |target: u16, ok: fn(&Constant) -> bool| -> Result<()> {
            match pool.get(target) {
                Some(c) if ok(c) => Ok(()),
                Some(_) => Err(ConstantPoolVerifyError::InvalidConstantPoolIndexType(index)),
                None => Err(ConstantPoolVerifyError::InvalidConstantPoolIndex(index)),
            }
        };
        match constant {
            Constant::Class(name) | Constant::String(name) | Constant::MethodType(name) => expect(*name, is_utf8)?,
            Constant::FieldRef(class, nat) | Constant::MethodRef(class, nat) | Constant::InterfaceMethodRef(class, nat) => {
                expect(*class, |c| matches!(c, Constant::Class(_)))?;
                expect(*nat, is_name_and_type)?;
            }
            Constant::NameAndType(name, desc) => {
                expect(*name, is_utf8)?;
                expect(*desc, is_utf8)?;
            }
            Constant::MethodHandle(kind, reference) => verify_method_handle(pool, index, *kind, *reference)?,
            Constant::InvokeDynamic(bootstrap, nat) => {
                let count = bootstraps.ok_or(ConstantPoolVerifyError::BootstrapMethodsNotDefined)?;
                if usize::from(*bootstrap) >= count {
                    return Err(ConstantPoolVerifyError::InvalidBootstrapMethodIndex(*bootstrap));
                }
                expect(*nat, is_name_and_type)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn is_utf8(c: &Constant) -> bool {
    matches!(c, Constant::Utf8(_))
}

fn is_name_and_type(c: &Constant) -> bool {
    matches!(c, Constant::NameAndType(..))
}

fn verify_method_handle(pool: &ConstantPool, index: u16, kind: u8, reference: u16) -> Result<()> {
    let target = pool.get(reference).ok_or(ConstantPoolVerifyError::InvalidConstantPoolIndex(index))?;
    let ok = match kind {
        ref_kinds::REF_GET_FIELD | ref_kinds::REF_GET_STATIC | 3 | 4 => matches!(target, Constant::FieldRef(..)),
        ref_kinds::REF_INVOKE_VIRTUAL | 8 => matches!(target, Constant::MethodRef(..)),
        ref_kinds::REF_INVOKE_STATIC | ref_kinds::REF_INVOKE_SPECIAL => {
            matches!(target, Constant::MethodRef(..) | Constant::InterfaceMethodRef(..))
        }
        9 => matches!(target, Constant::InterfaceMethodRef(..)),
        other => return Err(ConstantPoolVerifyError::InvalidReferenceKind(other)),
    };
    if ok {
        Ok(())
    } else {
        Err(ConstantPoolVerifyError::InvalidConstantPoolIndexType(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invokedynamic_needs_bootstrap_methods() {
        let mut class = ClassFile::new(61);
        class.this_class = class.constant_pool.try_add_class("A").unwrap();
        class.constant_pool.try_add_invoke_dynamic(0, "toString", "(LA;)Ljava/lang/String;").unwrap();
        assert_eq!(verify(&class), Err(ConstantPoolVerifyError::BootstrapMethodsNotDefined));
    }

    #[test]
    fn getter_handles_must_name_fields() {
        let mut class = ClassFile::new(61);
        let method = class.constant_pool.try_add_method_ref("A", "x", "()I").unwrap();
        class.constant_pool.try_add_method_handle(ref_kinds::REF_GET_FIELD, method).unwrap();
        assert!(matches!(verify(&class), Err(ConstantPoolVerifyError::InvalidConstantPoolIndexType(_))));
    }
}
