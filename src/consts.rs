use std::collections::HashSet;

use once_cell::sync::Lazy;

// Parser: global gas limit (upper bound on parser steps across a file)
pub const PARSER_MAX_GAS: usize = 5_000_000;

pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";
pub const JAVA_LANG_RECORD: &str = "java/lang/Record";
pub const JAVA_LANG_ENUM: &str = "java/lang/Enum";
pub const JAVA_LANG_STRING: &str = "java/lang/String";
pub const JAVA_LANG_CLASS: &str = "java/lang/Class";
pub const JAVA_LANG_THROWABLE: &str = "java/lang/Throwable";
pub const JAVA_LANG_STRING_BUILDER: &str = "java/lang/StringBuilder";
pub const OBJECT_METHODS: &str = "java/lang/runtime/ObjectMethods";
pub const MATCH_EXCEPTION: &str = "java/lang/MatchException";
pub const INCOMPATIBLE_CLASS_CHANGE_ERROR: &str = "java/lang/IncompatibleClassChangeError";
pub const NO_SUCH_FIELD_ERROR: &str = "java/lang/NoSuchFieldError";

pub const LAMBDA_METAFACTORY: &str = "java/lang/invoke/LambdaMetafactory";
pub const METAFACTORY_DESCRIPTOR: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;";

pub const OBJECT_METHODS_BOOTSTRAP_DESCRIPTOR: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/TypeDescriptor;Ljava/lang/Class;Ljava/lang/String;[Ljava/lang/invoke/MethodHandle;)Ljava/lang/Object;";

/// Zero-argument methods of `Object` whose names a record component may not
/// take, because the generated accessor would clash with them.
pub static ILLEGAL_COMPONENT_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "clone", "finalize", "getClass", "hashCode", "notify", "notifyAll", "toString", "wait",
    ]
    .into_iter()
    .collect()
});

/// Simple names from java.lang that resolve without an import
pub const JAVA_LANG_SIMPLE_TYPES: &[&str] = &[
    "Object", "String", "Record", "Enum", "Class", "Throwable", "Exception", "Error",
    "RuntimeException", "StringBuilder", "System", "Math", "Cloneable", "Comparable",
    "Integer", "Long", "Float", "Double", "Boolean", "Character", "Short", "Byte", "Number",
    "Void", "IllegalArgumentException", "IllegalStateException", "NullPointerException",
    "ArithmeticException", "IncompatibleClassChangeError", "MatchException", "NoSuchFieldError",
    "ArrayIndexOutOfBoundsException", "ClassCastException", "UnsupportedOperationException",
    "Deprecated", "SafeVarargs", "Override", "FunctionalInterface", "SuppressWarnings",
    "Runnable", "Iterable",
];
