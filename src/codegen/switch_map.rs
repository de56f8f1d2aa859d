//! `$SwitchMap$` tables for switches on enums.
//!
//! A switch on an enum does not use ordinals directly, since they may
//! change when the enum is recompiled. Like javac, each top-level class
//! gets a synthetic holder `Outer$1` with one `int[]` per switched enum,
//! filled in its static initializer from `ordinal()` to a key that is
//! stable within this compilation. Constants missing at run time are
//! skipped through a `NoSuchFieldError` handler.

use super::attribute::{AttributeInfo, InnerClassEntry, NamedAttribute};
use super::class::ClassFile;
use super::code::Code;
use super::constpool::ConstantPool;
use super::defs::access_flags::*;
use super::defs::STATIC_INITIALIZER_METHOD_NAME;
use super::error::{ClassGenerationError, CodeGenResult};
use super::field::FieldInfo;
use super::method::MethodInfo;
use super::opcodes::*;
use crate::config::Config;
use crate::consts::{JAVA_LANG_OBJECT, NO_SUCH_FIELD_ERROR};
use crate::wash::types::JType;

#[derive(Debug, Clone, PartialEq)]
struct SwitchMap {
    enum_name: String,
    field: String,
    /// Constants in order of first use; the key of each is its position
    /// plus one.
    constants: Vec<String>,
}

/// The switch maps of one top-level class.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchMaps {
    holder: String,
    maps: Vec<SwitchMap>,
}

impl SwitchMaps {
    pub fn new(outermost: &str) -> Self {
        Self { holder: format!("{}$1", outermost), maps: Vec::new() }
    }

    /// Internal name of the holder class.
    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    fn map_for(&mut self, enum_name: &str) -> &mut SwitchMap {
        let index = match self.maps.iter().position(|m| m.enum_name == enum_name) {
            Some(i) => i,
            None => {
                let field = format!("$SwitchMap${}", enum_name.replace(['/', '.'], "$"));
                log::trace!("switch map {} in {}", field, self.holder);
                self.maps.push(SwitchMap { enum_name: enum_name.to_string(), field, constants: Vec::new() });
                self.maps.len() - 1
            }
        };
        &mut self.maps[index]
    }

    /// Name of the `int[]` field mapping the ordinals of `enum_name`.
    pub fn field_for(&mut self, enum_name: &str) -> String {
        self.map_for(enum_name).field.clone()
    }

    /// Switch key of `constant`, assigned on first use.
    pub fn key(&mut self, enum_name: &str, constant: &str) -> i32 {
        let map = self.map_for(enum_name);
        let index = match map.constants.iter().position(|c| c == constant) {
            Some(i) => i,
            None => {
                map.constants.push(constant.to_string());
                map.constants.len() - 1
            }
        };
        index as i32 + 1
    }

    /// The holder class, nested in `outermost`.
    pub fn generate(&self, outermost: &str, config: &Config) -> CodeGenResult<ClassFile> {
        let mut class = ClassFile::new(config.target_major);
        let pool = &mut class.constant_pool;
        class.access_flags = ACC_SUPER | ACC_SYNTHETIC;
        class.this_class = pool.try_add_class(&self.holder)?;
        class.super_class = pool.try_add_class(JAVA_LANG_OBJECT)?;

        let map_type = JType::array_of(JType::Int);
        for map in &self.maps {
            let name = pool.try_add_utf8(&map.field)?;
            let desc = pool.try_add_utf8(&map_type.descriptor())?;
            class.fields.push(FieldInfo::new(ACC_STATIC | ACC_FINAL | ACC_SYNTHETIC, name, desc));
        }

        let code = self
            .static_initializer(pool)
            .and_then(|code| code.finish(pool, config.emit_frames, false))
            .map_err(|source| ClassGenerationError::MethodGeneration {
                method: format!("{}.{}", self.holder, STATIC_INITIALIZER_METHOD_NAME),
                source,
            })?;
        let name = pool.try_add_utf8(STATIC_INITIALIZER_METHOD_NAME)?;
        let desc = pool.try_add_utf8("()V")?;
        let mut clinit = MethodInfo::new(ACC_STATIC, name, desc);
        clinit.attributes.push(NamedAttribute::new(pool, AttributeInfo::Code(code))?);
        class.methods.push(clinit);

        let inner = pool.try_add_class(&self.holder)?;
        let host = pool.try_add_class(outermost)?;
        let entry = InnerClassEntry {
            inner_class_info: inner,
            outer_class_info: 0,
            inner_name: 0,
            access_flags: ACC_STATIC | ACC_SYNTHETIC,
        };
        let inner_classes = NamedAttribute::new(pool, AttributeInfo::InnerClasses(vec![entry]))?;
        let nest_host = NamedAttribute::new(pool, AttributeInfo::NestHost(host))?;
        class.attributes.push(nest_host);
        class.attributes.push(inner_classes);
        Ok(class)
    }

    fn static_initializer(&self, pool: &mut ConstantPool) -> super::error::BytecodeResult<Code> {
        let mut code = Code::new(&self.holder, true, false, &[]);
        let map_type = JType::array_of(JType::Int);
        let error = JType::class(NO_SUCH_FIELD_ERROR);
        let error_index = pool.try_add_class(NO_SUCH_FIELD_ERROR)?;
        for map in &self.maps {
            let enum_type = JType::class(&map.enum_name);
            let values_type = JType::array_of(enum_type.clone());
            let field = pool.try_add_field_ref(&self.holder, &map.field, &map_type.descriptor())?;

            let values = pool.try_add_method_ref(&map.enum_name, "values", &format!("(){}", values_type.descriptor()))?;
            code.invoke(INVOKESTATIC, values, &[], &values_type)?;
            code.arraylength()?;
            code.new_array(&JType::Int, pool)?;
            code.field(PUTSTATIC, field, &map_type)?;

            let ordinal = pool.try_add_method_ref(&map.enum_name, "ordinal", "()I")?;
            for (i, constant) in map.constants.iter().enumerate() {
                let locals = code.locals_snapshot();
                let start = code.pc();
                code.field(GETSTATIC, field, &map_type)?;
                let constant_field = pool.try_add_field_ref(&map.enum_name, constant, &enum_type.descriptor())?;
                code.field(GETSTATIC, constant_field, &enum_type)?;
                code.invoke(INVOKEVIRTUAL, ordinal, &[], &JType::Int)?;
                code.iconst(i as i32 + 1, pool)?;
                code.array_store(&JType::Int)?;
                let end = code.pc();
                let next = code.new_label();
                code.goto(next)?;
                let handler = code.new_label();
                code.add_handler(start, end, handler, error_index, NO_SUCH_FIELD_ERROR, &locals)?;
                code.place(handler)?;
                let mark = code.begin_scope();
                let slot = code.alloc_local(&error);
                code.store(&error, slot)?;
                code.end_scope(mark);
                code.place(next)?;
            }
        }
        code.ret(&JType::Void)?;
        Ok(code)
    }
}

/// Java's `String.hashCode`, over UTF-16 code units.
pub fn java_string_hash(s: &str) -> i32 {
    s.encode_utf16().fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(i32::from(c)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_first_use() {
        let mut maps = SwitchMaps::new("p/Outer");
        assert_eq!(maps.holder(), "p/Outer$1");
        assert!(maps.is_empty());
        assert_eq!(maps.key("p/Color", "BLUE"), 1);
        assert_eq!(maps.key("p/Color", "RED"), 2);
        assert_eq!(maps.key("p/Color", "BLUE"), 1);
        assert_eq!(maps.key("p/Outer$Size", "S"), 1);
        assert_eq!(maps.field_for("p/Outer$Size"), "$SwitchMap$p$Outer$Size");
    }

    #[test]
    fn holder_class_shape() {
        let mut maps = SwitchMaps::new("Outer");
        maps.key("Color", "RED");
        maps.key("Color", "GREEN");
        let class = maps.generate("Outer", &Config::default()).unwrap();
        assert_eq!(class.name(), "Outer$1");
        assert_eq!(class.access_flags, ACC_SUPER | ACC_SYNTHETIC);
        assert!(class.field("$SwitchMap$Color").is_some());
        let clinit = class.method("<clinit>", "()V").unwrap();
        let code = clinit.code().unwrap();
        assert_eq!(code.exception_table.len(), 2);
        assert!(class.attribute("NestHost").is_some());
    }

    #[test]
    fn string_hashes_match_java() {
        assert_eq!(java_string_hash(""), 0);
        assert_eq!(java_string_hash("a"), 97);
        assert_eq!(java_string_hash("Aa"), java_string_hash("BB"));
        assert_eq!(java_string_hash("hello"), 99162322);
    }
}
