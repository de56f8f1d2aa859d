//! Class-file level checks run on every generated class before it is
//! written out.
//!
//! Each sub-verifier owns one concern and its own error enum; [`verify`]
//! runs them in order and wraps the first failure in [`VerifyError`].

pub mod attributes;
pub mod class_access_flags;
pub mod constant_pool;
pub mod methods;

use crate::codegen::class::ClassFile;
use crate::codegen::constpool::Constant;
use crate::codegen::defs::access_flags;

pub type VerifyResult<T> = Result<T, VerifyError>;

#[derive(thiserror::Error, Debug)]
pub enum VerifyError {
    #[error(transparent)]
    ConstantPool(#[from] constant_pool::ConstantPoolVerifyError),
    #[error(transparent)]
    AccessFlags(#[from] class_access_flags::ClassAccessFlagsError),
    #[error(transparent)]
    Attributes(#[from] attributes::AttributesVerifyError),
    #[error(transparent)]
    Methods(#[from] methods::MethodsVerifyError),
    #[error("this_class {0} is not a Class constant")]
    ThisClass(u16),
    #[error("super_class {0} is not a Class constant")]
    SuperClass(u16),
}

/// Verify the ClassFile by running all sub-verifiers.
pub fn verify(class_file: &ClassFile) -> VerifyResult<()> {
    constant_pool::verify(class_file)?;
    class_access_flags::verify(class_file)?;
    verify_this_class(class_file)?;
    verify_super_class(class_file)?;
    methods::verify(class_file)?;
    attributes::verify(class_file)?;
    log::trace!("verified {}", class_file.name());
    Ok(())
}

fn verify_this_class(class_file: &ClassFile) -> VerifyResult<()> {
    match class_file.constant_pool.get(class_file.this_class) {
        Some(Constant::Class(_)) => Ok(()),
        _ => Err(VerifyError::ThisClass(class_file.this_class)),
    }
}

fn verify_super_class(class_file: &ClassFile) -> VerifyResult<()> {
    let super_class = class_file.super_class;
    // only java/lang/Object has no super class
    let is_interface = class_file.access_flags & access_flags::ACC_INTERFACE != 0;
    if !is_interface && super_class == 0 {
        return Ok(());
    }
    match class_file.constant_pool.get(super_class) {
        Some(Constant::Class(_)) => Ok(()),
        _ => Err(VerifyError::SuperClass(super_class)),
    }
}
