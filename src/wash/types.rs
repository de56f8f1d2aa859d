//! Erased Java types as seen by attribution and code generation.

use std::fmt;

use crate::consts::{JAVA_LANG_OBJECT, JAVA_LANG_STRING};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JType {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Void,
    /// Type of the `null` literal.
    Null,
    /// Class or interface by internal name, `java/lang/String`.
    Class(String),
    Array(Box<JType>),
    /// Result of an expression that already produced a diagnostic.
    Error,
}

/// Compile-time constant values.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Str(String),
}

impl ConstValue {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            ConstValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl JType {
    pub fn object() -> Self {
        JType::Class(JAVA_LANG_OBJECT.to_string())
    }

    pub fn string() -> Self {
        JType::Class(JAVA_LANG_STRING.to_string())
    }

    pub fn class(name: &str) -> Self {
        JType::Class(name.to_string())
    }

    pub fn array_of(elem: JType) -> Self {
        JType::Array(Box::new(elem))
    }

    pub fn from_primitive_name(name: &str) -> Option<JType> {
        let t = match name {
            "boolean" => JType::Boolean,
            "byte" => JType::Byte,
            "short" => JType::Short,
            "char" => JType::Char,
            "int" => JType::Int,
            "long" => JType::Long,
            "float" => JType::Float,
            "double" => JType::Double,
            "void" => JType::Void,
            _ => return None,
        };
        Some(t)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            JType::Boolean | JType::Byte | JType::Short | JType::Char | JType::Int | JType::Long | JType::Float | JType::Double
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_primitive() && *self != JType::Boolean
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, JType::Byte | JType::Short | JType::Char | JType::Int | JType::Long)
    }

    /// byte, short, char and int all live in an int slot.
    pub fn is_int_like(&self) -> bool {
        matches!(self, JType::Byte | JType::Short | JType::Char | JType::Int | JType::Boolean)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, JType::Class(_) | JType::Array(_) | JType::Null)
    }

    pub fn is_error(&self) -> bool {
        *self == JType::Error
    }

    pub fn is_string(&self) -> bool {
        matches!(self, JType::Class(n) if n == JAVA_LANG_STRING)
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            JType::Class(n) => Some(n),
            _ => None,
        }
    }

    pub fn element(&self) -> Option<&JType> {
        match self {
            JType::Array(e) => Some(e),
            _ => None,
        }
    }

    /// Local variable slots occupied.
    pub fn size(&self) -> u16 {
        match self {
            JType::Long | JType::Double => 2,
            JType::Void => 0,
            _ => 1,
        }
    }

    pub fn descriptor(&self) -> String {
        match self {
            JType::Boolean => "Z".into(),
            JType::Byte => "B".into(),
            JType::Short => "S".into(),
            JType::Char => "C".into(),
            JType::Int => "I".into(),
            JType::Long => "J".into(),
            JType::Float => "F".into(),
            JType::Double => "D".into(),
            JType::Void => "V".into(),
            JType::Class(n) => format!("L{};", n),
            JType::Array(e) => format!("[{}", e.descriptor()),
            JType::Null | JType::Error => format!("L{};", JAVA_LANG_OBJECT),
        }
    }

    /// Name used by `checkcast`, `anewarray` and class constants.
    pub fn internal_name(&self) -> String {
        match self {
            JType::Class(n) => n.clone(),
            other => other.descriptor(),
        }
    }

    /// Box class for a primitive.
    pub fn boxed(&self) -> Option<JType> {
        let name = match self {
            JType::Boolean => "java/lang/Boolean",
            JType::Byte => "java/lang/Byte",
            JType::Short => "java/lang/Short",
            JType::Char => "java/lang/Character",
            JType::Int => "java/lang/Integer",
            JType::Long => "java/lang/Long",
            JType::Float => "java/lang/Float",
            JType::Double => "java/lang/Double",
            _ => return None,
        };
        Some(JType::class(name))
    }

    /// Primitive behind a box class.
    pub fn unboxed(&self) -> Option<JType> {
        let t = match self.class_name()? {
            "java/lang/Boolean" => JType::Boolean,
            "java/lang/Byte" => JType::Byte,
            "java/lang/Short" => JType::Short,
            "java/lang/Character" => JType::Char,
            "java/lang/Integer" => JType::Int,
            "java/lang/Long" => JType::Long,
            "java/lang/Float" => JType::Float,
            "java/lang/Double" => JType::Double,
            _ => return None,
        };
        Some(t)
    }

    /// The primitive view of a primitive or box type.
    pub fn unboxed_or_self(&self) -> JType {
        if self.is_primitive() {
            self.clone()
        } else {
            self.unboxed().unwrap_or_else(|| self.clone())
        }
    }

    fn numeric_rank(&self) -> u8 {
        match self {
            JType::Byte => 1,
            JType::Short => 2,
            JType::Char => 2,
            JType::Int => 3,
            JType::Long => 4,
            JType::Float => 5,
            JType::Double => 6,
            _ => 0,
        }
    }

    /// Widening primitive conversion (identity included).
    pub fn widens_to(&self, to: &JType) -> bool {
        if self == to {
            return true;
        }
        if !self.is_numeric() || !to.is_numeric() {
            return false;
        }
        match (self, to) {
            (_, JType::Char) => false,
            (JType::Char, JType::Short) | (JType::Char, JType::Byte) => false,
            (JType::Short, JType::Byte) => false,
            _ => self.numeric_rank() < to.numeric_rank(),
        }
    }

    /// Unary numeric promotion.
    pub fn promoted(&self) -> JType {
        match self.unboxed_or_self() {
            JType::Byte | JType::Short | JType::Char => JType::Int,
            other => other,
        }
    }

    /// Source-level name used in diagnostics: `int`, `String`, `Outer.Inner[]`.
    pub fn java_name(&self) -> String {
        match self {
            JType::Class(n) => {
                let simple = n.rsplit('/').next().unwrap_or(n);
                simple.replace('$', ".")
            }
            JType::Array(e) => format!("{}[]", e.java_name()),
            JType::Null => "null".into(),
            JType::Error => "<error>".into(),
            prim => prim.descriptor_keyword().to_string(),
        }
    }

    fn descriptor_keyword(&self) -> &'static str {
        match self {
            JType::Boolean => "boolean",
            JType::Byte => "byte",
            JType::Short => "short",
            JType::Char => "char",
            JType::Int => "int",
            JType::Long => "long",
            JType::Float => "float",
            JType::Double => "double",
            _ => "void",
        }
    }
}

impl fmt::Display for JType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.java_name())
    }
}

/// Binary numeric promotion of two (possibly boxed) numeric operands.
pub fn binary_promotion(a: &JType, b: &JType) -> Option<JType> {
    let a = a.unboxed_or_self();
    let b = b.unboxed_or_self();
    if !a.is_numeric() || !b.is_numeric() {
        return None;
    }
    let t = if a == JType::Double || b == JType::Double {
        JType::Double
    } else if a == JType::Float || b == JType::Float {
        JType::Float
    } else if a == JType::Long || b == JType::Long {
        JType::Long
    } else {
        JType::Int
    };
    Some(t)
}

/// Whether an int constant fits the narrower integral type.
pub fn int_constant_fits(value: i32, to: &JType) -> bool {
    match to {
        JType::Byte => i8::try_from(value).is_ok(),
        JType::Short => i16::try_from(value).is_ok(),
        JType::Char => u16::try_from(value).is_ok(),
        JType::Int | JType::Long | JType::Float | JType::Double => true,
        _ => false,
    }
}

/// Method descriptor `(params)ret`.
pub fn method_descriptor(params: &[JType], ret: &JType) -> String {
    let mut d = String::from("(");
    for p in params {
        d.push_str(&p.descriptor());
    }
    d.push(')');
    d.push_str(&ret.descriptor());
    d
}

/// Parses a field descriptor; `None` on malformed input.
pub fn parse_field_descriptor(desc: &str) -> Option<(JType, &str)> {
    let mut chars = desc.chars();
    let t = match chars.next()? {
        'Z' => JType::Boolean,
        'B' => JType::Byte,
        'S' => JType::Short,
        'C' => JType::Char,
        'I' => JType::Int,
        'J' => JType::Long,
        'F' => JType::Float,
        'D' => JType::Double,
        'V' => JType::Void,
        'L' => {
            let end = desc.find(';')?;
            return Some((JType::Class(desc[1..end].to_string()), &desc[end + 1..]));
        }
        '[' => {
            let (elem, rest) = parse_field_descriptor(&desc[1..])?;
            return Some((JType::array_of(elem), rest));
        }
        _ => return None,
    };
    Some((t, &desc[1..]))
}

/// Splits a method descriptor into parameter and return types.
pub fn parse_method_descriptor(desc: &str) -> Option<(Vec<JType>, JType)> {
    let mut rest = desc.strip_prefix('(')?;
    let mut params = Vec::new();
    while !rest.starts_with(')') {
        let (t, r) = parse_field_descriptor(rest)?;
        params.push(t);
        rest = r;
    }
    let (ret, tail) = parse_field_descriptor(&rest[1..])?;
    if !tail.is_empty() {
        return None;
    }
    Some((params, ret))
}
