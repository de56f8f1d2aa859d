use crate::codegen::attribute::AttributeInfo;
use crate::codegen::class::ClassFile;
use crate::codegen::defs::major_versions;
use crate::codegen::constpool::Constant;
use crate::consts::JAVA_LANG_RECORD;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum AttributesVerifyError {
    #[error("Attribute {0} requires class file version >= {1}")]
    AttributeRequiresVersion(&'static str, u16),
    #[error("Duplicate class attribute: {0}")]
    DuplicateClassAttribute(&'static str),
    #[error("Record attribute on a class that does not extend java/lang/Record")]
    RecordOnNonRecord,
    #[error("Invalid attribute content: {0}")]
    InvalidContent(&'static str),
}

pub type Result<T> = std::result::Result<T, AttributesVerifyError>;

pub fn verify(class_file: &ClassFile) -> Result<()> {
    let major = class_file.major_version;
    let mut seen: Vec<&'static str> = Vec::new();
    for a in &class_file.attributes {
        let name = match &a.info {
            AttributeInfo::Record(_) => {
                if major < major_versions::JAVA_16 {
                    return Err(AttributesVerifyError::AttributeRequiresVersion("Record", major_versions::JAVA_16));
                }
                if class_file.super_name() != Some(JAVA_LANG_RECORD) {
                    return Err(AttributesVerifyError::RecordOnNonRecord);
                }
                "Record"
            }
            AttributeInfo::NestHost(host) => {
                if !is_class(class_file, *host) {
                    return Err(AttributesVerifyError::InvalidContent("NestHost.host_class"));
                }
                "NestHost"
            }
            AttributeInfo::NestMembers(members) => {
                if !members.iter().all(|m| is_class(class_file, *m)) {
                    return Err(AttributesVerifyError::InvalidContent("NestMembers.classes"));
                }
                "NestMembers"
            }
            AttributeInfo::BootstrapMethods(methods) => {
                let handles = methods.iter().all(|m| {
                    matches!(class_file.constant_pool.get(m.method_ref), Some(Constant::MethodHandle(..)))
                });
                if !handles {
                    return Err(AttributesVerifyError::InvalidContent("BootstrapMethods.bootstrap_method_ref"));
                }
                "BootstrapMethods"
            }
            AttributeInfo::InnerClasses(_) => "InnerClasses",
            AttributeInfo::Signature(_) => "Signature",
            AttributeInfo::SourceFile(_) => "SourceFile",
            _ => continue,
        };
        if seen.contains(&name) {
            return Err(AttributesVerifyError::DuplicateClassAttribute(name));
        }
        seen.push(name);
    }
    if seen.contains(&"NestHost") && seen.contains(&"NestMembers") {
        return Err(AttributesVerifyError::InvalidContent("NestHost with NestMembers"));
    }
    Ok(())
}

fn is_class(class_file: &ClassFile, index: u16) -> bool {
    matches!(class_file.constant_pool.get(index), Some(Constant::Class(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::attribute::NamedAttribute;

    fn class(super_name: &str, major: u16) -> ClassFile {
        let mut class = ClassFile::new(major);
        class.this_class = class.constant_pool.try_add_class("R").unwrap();
        class.super_class = class.constant_pool.try_add_class(super_name).unwrap();
        let record = NamedAttribute::new(&mut class.constant_pool, AttributeInfo::Record(Vec::new())).unwrap();
        class.attributes.push(record);
        class
    }

    #[test]
    fn record_attribute_rules() {
        assert!(verify(&class(JAVA_LANG_RECORD, 61)).is_ok());
        assert_eq!(verify(&class("java/lang/Object", 61)), Err(AttributesVerifyError::RecordOnNonRecord));
        assert!(matches!(
            verify(&class(JAVA_LANG_RECORD, 59)),
            Err(AttributesVerifyError::AttributeRequiresVersion("Record", _))
        ));
    }
}
