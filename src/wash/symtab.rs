//! Class table: user declarations of the unit plus a catalogue of the
//! `java.lang` members the compiler knows without a class path.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use super::types::{binary_promotion, int_constant_fits, parse_method_descriptor, ConstValue, JType};
use crate::ast::*;
use crate::consts::{JAVA_LANG_ENUM, JAVA_LANG_OBJECT, JAVA_LANG_RECORD, JAVA_LANG_SIMPLE_TYPES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

impl From<TypeKind> for ClassKind {
    fn from(kind: TypeKind) -> Self {
        match kind {
            TypeKind::Class => ClassKind::Class,
            TypeKind::Interface => ClassKind::Interface,
            TypeKind::Enum => ClassKind::Enum,
            TypeKind::Record => ClassKind::Record,
            TypeKind::Annotation => ClassKind::Annotation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSym {
    pub owner: String,
    pub name: String,
    pub ty: JType,
    pub is_static: bool,
    pub is_final: bool,
    /// Final without an initializer.
    pub blank: bool,
    pub constant: Option<ConstValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSym {
    pub owner: String,
    pub name: String,
    pub params: Vec<JType>,
    pub ret: JType,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_private: bool,
    pub varargs: bool,
}

impl MethodSym {
    pub fn descriptor(&self) -> String {
        super::types::method_descriptor(&self.params, &self.ret)
    }
}

#[derive(Debug, Clone)]
pub struct ClassSym {
    pub name: String,
    pub kind: ClassKind,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub is_final: bool,
    pub is_abstract: bool,
    pub fields: Vec<FieldSym>,
    pub methods: Vec<MethodSym>,
    pub ctors: Vec<MethodSym>,
    pub enum_constants: Vec<String>,
    pub decl: Option<DeclId>,
}

impl ClassSym {
    fn empty(name: &str, kind: ClassKind, super_class: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            super_class: super_class.map(str::to_string),
            interfaces: Vec::new(),
            is_final: false,
            is_abstract: false,
            fields: Vec::new(),
            methods: Vec::new(),
            ctors: Vec::new(),
            enum_constants: Vec::new(),
            decl: None,
        }
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, ClassKind::Interface | ClassKind::Annotation)
    }
}

/// Type variables and enclosing declaration visible where a type is written.
#[derive(Debug, Clone, Copy)]
pub struct TypeScope<'a> {
    pub decl: Option<DeclId>,
    pub method_tparams: &'a [TypeParam],
}

impl<'a> TypeScope<'a> {
    pub fn of(decl: DeclId) -> TypeScope<'static> {
        TypeScope { decl: Some(decl), method_tparams: &[] }
    }
}

struct BuiltinClass {
    name: &'static str,
    super_class: Option<&'static str>,
    kind: ClassKind,
    is_final: bool,
    /// `[static ]name(desc)ret`; constructors use `<init>`.
    methods: &'static [&'static str],
    /// `[static ]name:desc`
    fields: &'static [&'static str],
}

const THROWABLE_CTORS: &[&str] = &["<init>()V", "<init>(Ljava/lang/String;)V", "<init>(Ljava/lang/String;Ljava/lang/Throwable;)V"];

macro_rules! exception {
    ($name:expr, $sup:expr) => {
        BuiltinClass {
            name: $name,
            super_class: Some($sup),
            kind: ClassKind::Class,
            is_final: false,
            methods: THROWABLE_CTORS,
            fields: &[],
        }
    };
}

macro_rules! boxed {
    ($name:expr, $sup:expr, $prim:expr, $value:expr) => {
        BuiltinClass {
            name: $name,
            super_class: Some($sup),
            kind: ClassKind::Class,
            is_final: true,
            methods: &[
                concat!("static valueOf(", $prim, ")L", $name, ";"),
                concat!($value, "()", $prim),
                "intValue()I",
                "longValue()J",
                "floatValue()F",
                "doubleValue()D",
                "toString()Ljava/lang/String;",
                concat!("static toString(", $prim, ")Ljava/lang/String;"),
                "hashCode()I",
                "equals(Ljava/lang/Object;)Z",
            ],
            fields: &[concat!("static MAX_VALUE:", $prim), concat!("static MIN_VALUE:", $prim)],
        }
    };
}

macro_rules! functional {
    ($name:expr, $method:expr) => {
        BuiltinClass {
            name: $name,
            super_class: Some("java/lang/Object"),
            kind: ClassKind::Interface,
            is_final: false,
            methods: &[$method],
            fields: &[],
        }
    };
}

static BUILTINS: &[BuiltinClass] = &[
    BuiltinClass {
        name: "java/lang/Object",
        super_class: None,
        kind: ClassKind::Class,
        is_final: false,
        methods: &[
            "<init>()V",
            "toString()Ljava/lang/String;",
            "hashCode()I",
            "equals(Ljava/lang/Object;)Z",
            "getClass()Ljava/lang/Class;",
        ],
        fields: &[],
    },
    BuiltinClass {
        name: "java/lang/Record",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Class,
        is_final: false,
        methods: &["<init>()V"],
        fields: &[],
    },
    BuiltinClass {
        name: "java/lang/Enum",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Class,
        is_final: false,
        methods: &[
            "<init>(Ljava/lang/String;I)V",
            "ordinal()I",
            "name()Ljava/lang/String;",
            "compareTo(Ljava/lang/Enum;)I",
            "static valueOf(Ljava/lang/Class;Ljava/lang/String;)Ljava/lang/Enum;",
        ],
        fields: &[],
    },
    BuiltinClass {
        name: "java/lang/String",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Class,
        is_final: true,
        methods: &[
            "length()I",
            "charAt(I)C",
            "isEmpty()Z",
            "concat(Ljava/lang/String;)Ljava/lang/String;",
            "substring(I)Ljava/lang/String;",
            "substring(II)Ljava/lang/String;",
            "indexOf(Ljava/lang/String;)I",
            "trim()Ljava/lang/String;",
            "toUpperCase()Ljava/lang/String;",
            "toLowerCase()Ljava/lang/String;",
            "equals(Ljava/lang/Object;)Z",
            "hashCode()I",
            "toString()Ljava/lang/String;",
            "static valueOf(Ljava/lang/Object;)Ljava/lang/String;",
            "static valueOf(I)Ljava/lang/String;",
            "static valueOf(J)Ljava/lang/String;",
            "static valueOf(D)Ljava/lang/String;",
            "static valueOf(Z)Ljava/lang/String;",
            "static valueOf(C)Ljava/lang/String;",
        ],
        fields: &[],
    },
    BuiltinClass {
        name: "java/lang/Class",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Class,
        is_final: true,
        methods: &[
            "getName()Ljava/lang/String;",
            "getSimpleName()Ljava/lang/String;",
            "getSuperclass()Ljava/lang/Class;",
            "isRecord()Z",
        ],
        fields: &[],
    },
    BuiltinClass {
        name: "java/lang/StringBuilder",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Class,
        is_final: true,
        methods: &[
            "<init>()V",
            "<init>(Ljava/lang/String;)V",
            "append(Ljava/lang/String;)Ljava/lang/StringBuilder;",
            "append(Ljava/lang/Object;)Ljava/lang/StringBuilder;",
            "append(I)Ljava/lang/StringBuilder;",
            "append(J)Ljava/lang/StringBuilder;",
            "append(F)Ljava/lang/StringBuilder;",
            "append(D)Ljava/lang/StringBuilder;",
            "append(Z)Ljava/lang/StringBuilder;",
            "append(C)Ljava/lang/StringBuilder;",
            "length()I",
            "toString()Ljava/lang/String;",
        ],
        fields: &[],
    },
    BuiltinClass {
        name: "java/lang/System",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Class,
        is_final: true,
        methods: &["static identityHashCode(Ljava/lang/Object;)I", "static currentTimeMillis()J"],
        fields: &["static out:Ljava/io/PrintStream;", "static err:Ljava/io/PrintStream;"],
    },
    BuiltinClass {
        name: "java/io/PrintStream",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Class,
        is_final: false,
        methods: &[
            "println()V",
            "println(Z)V",
            "println(C)V",
            "println(I)V",
            "println(J)V",
            "println(F)V",
            "println(D)V",
            "println(Ljava/lang/String;)V",
            "println(Ljava/lang/Object;)V",
            "print(Z)V",
            "print(C)V",
            "print(I)V",
            "print(J)V",
            "print(F)V",
            "print(D)V",
            "print(Ljava/lang/String;)V",
            "print(Ljava/lang/Object;)V",
        ],
        fields: &[],
    },
    BuiltinClass {
        name: "java/lang/Math",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Class,
        is_final: true,
        methods: &[
            "static abs(I)I",
            "static abs(J)J",
            "static abs(D)D",
            "static max(II)I",
            "static max(JJ)J",
            "static max(DD)D",
            "static min(II)I",
            "static min(JJ)J",
            "static min(DD)D",
        ],
        fields: &[],
    },
    BuiltinClass {
        name: "java/lang/Number",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Class,
        is_final: false,
        methods: &["intValue()I", "longValue()J", "floatValue()F", "doubleValue()D"],
        fields: &[],
    },
    boxed!("java/lang/Integer", "java/lang/Number", "I", "intValue"),
    boxed!("java/lang/Long", "java/lang/Number", "J", "longValue"),
    boxed!("java/lang/Float", "java/lang/Number", "F", "floatValue"),
    boxed!("java/lang/Double", "java/lang/Number", "D", "doubleValue"),
    boxed!("java/lang/Short", "java/lang/Number", "S", "shortValue"),
    boxed!("java/lang/Byte", "java/lang/Number", "B", "byteValue"),
    BuiltinClass {
        name: "java/lang/Character",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Class,
        is_final: true,
        methods: &[
            "static valueOf(C)Ljava/lang/Character;",
            "charValue()C",
            "toString()Ljava/lang/String;",
            "hashCode()I",
            "equals(Ljava/lang/Object;)Z",
        ],
        fields: &[],
    },
    BuiltinClass {
        name: "java/lang/Boolean",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Class,
        is_final: true,
        methods: &[
            "static valueOf(Z)Ljava/lang/Boolean;",
            "booleanValue()Z",
            "toString()Ljava/lang/String;",
            "hashCode()I",
            "equals(Ljava/lang/Object;)Z",
        ],
        fields: &["static TRUE:Ljava/lang/Boolean;", "static FALSE:Ljava/lang/Boolean;"],
    },
    BuiltinClass {
        name: "java/lang/Throwable",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Class,
        is_final: false,
        methods: &[
            "<init>()V",
            "<init>(Ljava/lang/String;)V",
            "<init>(Ljava/lang/String;Ljava/lang/Throwable;)V",
            "getMessage()Ljava/lang/String;",
            "getCause()Ljava/lang/Throwable;",
            "printStackTrace()V",
        ],
        fields: &[],
    },
    exception!("java/lang/Exception", "java/lang/Throwable"),
    exception!("java/lang/Error", "java/lang/Throwable"),
    exception!("java/lang/RuntimeException", "java/lang/Exception"),
    exception!("java/lang/IllegalArgumentException", "java/lang/RuntimeException"),
    exception!("java/lang/IllegalStateException", "java/lang/RuntimeException"),
    exception!("java/lang/NullPointerException", "java/lang/RuntimeException"),
    exception!("java/lang/ArithmeticException", "java/lang/RuntimeException"),
    exception!("java/lang/ArrayIndexOutOfBoundsException", "java/lang/RuntimeException"),
    exception!("java/lang/ClassCastException", "java/lang/RuntimeException"),
    exception!("java/lang/UnsupportedOperationException", "java/lang/RuntimeException"),
    exception!("java/lang/MatchException", "java/lang/RuntimeException"),
    exception!("java/lang/IncompatibleClassChangeError", "java/lang/Error"),
    exception!("java/lang/NoSuchFieldError", "java/lang/IncompatibleClassChangeError"),
    BuiltinClass {
        name: "java/lang/Comparable",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Interface,
        is_final: false,
        methods: &["compareTo(Ljava/lang/Object;)I"],
        fields: &[],
    },
    functional!("java/lang/Runnable", "run()V"),
    functional!("java/util/function/Supplier", "get()Ljava/lang/Object;"),
    functional!("java/util/function/Function", "apply(Ljava/lang/Object;)Ljava/lang/Object;"),
    functional!("java/util/function/Consumer", "accept(Ljava/lang/Object;)V"),
    functional!("java/util/function/Predicate", "test(Ljava/lang/Object;)Z"),
    functional!("java/util/function/IntSupplier", "getAsInt()I"),
    functional!("java/util/function/IntUnaryOperator", "applyAsInt(I)I"),
    functional!("java/util/function/IntBinaryOperator", "applyAsInt(II)I"),
    functional!("java/util/function/IntPredicate", "test(I)Z"),
    BuiltinClass {
        name: "java/lang/Cloneable",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Interface,
        is_final: false,
        methods: &[],
        fields: &[],
    },
    BuiltinClass {
        name: "java/lang/Deprecated",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Annotation,
        is_final: false,
        methods: &[],
        fields: &[],
    },
    BuiltinClass {
        name: "java/lang/SafeVarargs",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Annotation,
        is_final: false,
        methods: &[],
        fields: &[],
    },
    BuiltinClass {
        name: "java/lang/Override",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Annotation,
        is_final: false,
        methods: &[],
        fields: &[],
    },
    BuiltinClass {
        name: "java/lang/FunctionalInterface",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Annotation,
        is_final: false,
        methods: &[],
        fields: &[],
    },
    BuiltinClass {
        name: "java/lang/SuppressWarnings",
        super_class: Some("java/lang/Object"),
        kind: ClassKind::Annotation,
        is_final: false,
        methods: &["value()[Ljava/lang/String;"],
        fields: &[],
    },
];

static BUILTIN_SYMS: Lazy<HashMap<String, ClassSym>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for b in BUILTINS {
        let mut sym = ClassSym::empty(b.name, b.kind, b.super_class);
        sym.is_final = b.is_final;
        for spec in b.methods {
            let (is_static, rest) = match spec.strip_prefix("static ") {
                Some(rest) => (true, rest),
                None => (false, *spec),
            };
            let Some(paren) = rest.find('(') else { continue };
            let Some((params, ret)) = parse_method_descriptor(&rest[paren..]) else { continue };
            let name = &rest[..paren];
            let m = MethodSym {
                owner: b.name.to_string(),
                name: name.to_string(),
                params,
                ret,
                is_static,
                is_abstract: b.kind == ClassKind::Interface,
                is_private: false,
                varargs: false,
            };
            if name == "<init>" {
                sym.ctors.push(m);
            } else {
                sym.methods.push(m);
            }
        }
        for spec in b.fields {
            let (is_static, rest) = match spec.strip_prefix("static ") {
                Some(rest) => (true, rest),
                None => (false, *spec),
            };
            let Some((name, desc)) = rest.split_once(':') else { continue };
            let Some((ty, _)) = super::types::parse_field_descriptor(desc) else { continue };
            sym.fields.push(FieldSym {
                owner: b.name.to_string(),
                name: name.to_string(),
                ty,
                is_static,
                is_final: true,
                blank: false,
                constant: None,
            });
        }
        map.insert(b.name.to_string(), sym);
    }
    map
});

/// Result of a method lookup.
#[derive(Debug, Clone)]
pub enum MethodLookup {
    Found(MethodSym),
    /// Methods of that name exist but none accepts the arguments.
    Inapplicable,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct ClassTable {
    classes: HashMap<String, ClassSym>,
    imports: HashMap<String, String>,
    wildcard_imports: Vec<String>,
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassTable {
    /// Table holding only the built-in catalogue.
    pub fn new() -> Self {
        Self { classes: BUILTIN_SYMS.clone(), imports: HashMap::new(), wildcard_imports: Vec::new() }
    }

    /// Enter every declaration of `unit`.
    pub fn build(unit: &CompilationUnit) -> Self {
        let mut table = Self::new();
        for import in &unit.imports {
            if import.is_static {
                continue;
            }
            let internal = import.name.replace('.', "/");
            if import.is_wildcard {
                table.wildcard_imports.push(internal);
            } else if let Some(simple) = import.name.rsplit('.').next() {
                table.imports.insert(simple.to_string(), internal);
            }
        }
        // headers first so member signatures can name any declaration
        for id in unit.decls.ids() {
            let decl = &unit.decls[id];
            let name = unit.binary_name(id);
            let mut sym = ClassSym::empty(&name, decl.kind.into(), None);
            sym.decl = Some(id);
            table.classes.insert(name, sym);
        }
        for id in unit.decls.ids() {
            let sym = table.enter_members(unit, id);
            table.classes.insert(sym.name.clone(), sym);
        }
        log::debug!("class table: {} classes ({} from source)", table.classes.len(), unit.decls.len());
        table
    }

    fn enter_members(&self, unit: &CompilationUnit, id: DeclId) -> ClassSym {
        let decl = &unit.decls[id];
        let name = unit.binary_name(id);
        let resolve = |t: &TypeRef, tparams: &[TypeParam]| {
            self.resolve_type_ref(unit, TypeScope { decl: Some(id), method_tparams: tparams }, t)
                .unwrap_or(JType::Error)
        };
        let mut sym = ClassSym::empty(&name, decl.kind.into(), None);
        sym.decl = Some(id);
        sym.super_class = Some(match decl.kind {
            TypeKind::Record => JAVA_LANG_RECORD.to_string(),
            TypeKind::Enum => JAVA_LANG_ENUM.to_string(),
            TypeKind::Class => match &decl.extends {
                Some(t) => match resolve(t, &[]) {
                    JType::Class(n) => n,
                    _ => JAVA_LANG_OBJECT.to_string(),
                },
                None => JAVA_LANG_OBJECT.to_string(),
            },
            TypeKind::Interface | TypeKind::Annotation => JAVA_LANG_OBJECT.to_string(),
        });
        sym.interfaces = decl
            .implements
            .iter()
            .filter_map(|t| match resolve(t, &[]) {
                JType::Class(n) => Some(n),
                _ => None,
            })
            .collect();
        sym.is_final = matches!(decl.kind, TypeKind::Record | TypeKind::Enum) || decl.modifiers.has(Modifier::Final);
        sym.is_abstract = decl.modifiers.has(Modifier::Abstract) || decl.is_interface_like();
        let interface = decl.is_interface_like();

        for c in &decl.enum_constants {
            sym.enum_constants.push(c.name.clone());
            sym.fields.push(FieldSym {
                owner: name.clone(),
                name: c.name.clone(),
                ty: JType::Class(name.clone()),
                is_static: true,
                is_final: true,
                blank: false,
                constant: None,
            });
        }
        if decl.kind == TypeKind::Enum {
            let this_ty = JType::Class(name.clone());
            sym.methods.push(MethodSym {
                owner: name.clone(),
                name: "values".into(),
                params: vec![],
                ret: JType::array_of(this_ty.clone()),
                is_static: true,
                is_abstract: false,
                is_private: false,
                varargs: false,
            });
            sym.methods.push(MethodSym {
                owner: name.clone(),
                name: "valueOf".into(),
                params: vec![JType::string()],
                ret: this_ty,
                is_static: true,
                is_abstract: false,
                is_private: false,
                varargs: false,
            });
        }

        for member in &decl.members {
            match member {
                Member::Field(f) => {
                    let is_static = interface || f.modifiers.has(Modifier::Static);
                    let is_final = interface || f.modifiers.has(Modifier::Final);
                    for d in &f.declarators {
                        let ty = resolve(&f.ty.with_extra_dims(d.extra_dims), &[]);
                        let constant = if is_static && is_final {
                            d.init.as_ref().and_then(|init| {
                                fold_constant(init, &|e| self.constant_of_sibling(&sym, e))
                                    .and_then(|(_, v)| coerce_constant(&v, &ty))
                            })
                        } else {
                            None
                        };
                        sym.fields.push(FieldSym {
                            owner: name.clone(),
                            name: d.name.clone(),
                            ty,
                            is_static,
                            is_final,
                            blank: is_final && d.init.is_none(),
                            constant,
                        });
                    }
                }
                Member::Method(m) => {
                    let params: Vec<JType> = m.params.iter().map(|p| resolve(&p.effective_type(), &m.type_params)).collect();
                    let ret = resolve(&m.return_type, &m.type_params);
                    let is_static = m.modifiers.has(Modifier::Static);
                    sym.methods.push(MethodSym {
                        owner: name.clone(),
                        name: m.name.clone(),
                        params,
                        ret,
                        is_static,
                        is_abstract: m.body.is_none() && m.object_method.is_none() && !m.modifiers.has(Modifier::Native),
                        is_private: m.modifiers.has(Modifier::Private),
                        varargs: m.is_varargs(),
                    });
                }
                Member::Constructor(c) => {
                    let params = c.params.iter().map(|p| resolve(&p.effective_type(), &c.type_params)).collect();
                    sym.ctors.push(MethodSym {
                        owner: name.clone(),
                        name: "<init>".into(),
                        params,
                        ret: JType::Void,
                        is_static: false,
                        is_abstract: false,
                        is_private: c.modifiers.has(Modifier::Private),
                        varargs: c.params.last().map(|p| p.varargs).unwrap_or(false),
                    });
                }
                Member::Initializer(_) => {}
            }
        }
        if decl.is_record() {
            let components: Vec<(String, JType)> =
                decl.components.iter().map(|c| (c.name.clone(), resolve(&c.effective_type(), &[]))).collect();
            Self::enter_record_fallbacks(&mut sym, &components, decl.components.last().map(|c| c.varargs).unwrap_or(false));
        }
        sym
    }

    /// A record that was not lowered still exposes its fields, accessors and
    /// canonical constructor, so uses of it resolve.
    fn enter_record_fallbacks(sym: &mut ClassSym, components: &[(String, JType)], varargs: bool) {
        for (name, ty) in components {
            if !sym.fields.iter().any(|f| &f.name == name) {
                sym.fields.push(FieldSym {
                    owner: sym.name.clone(),
                    name: name.clone(),
                    ty: ty.clone(),
                    is_static: false,
                    is_final: true,
                    blank: true,
                    constant: None,
                });
            }
            if !sym.methods.iter().any(|m| &m.name == name && m.params.is_empty()) {
                sym.methods.push(MethodSym {
                    owner: sym.name.clone(),
                    name: name.clone(),
                    params: vec![],
                    ret: ty.clone(),
                    is_static: false,
                    is_abstract: false,
                    is_private: false,
                    varargs: false,
                });
            }
        }
        let params: Vec<JType> = components.iter().map(|(_, t)| t.clone()).collect();
        if !sym.ctors.iter().any(|c| c.params == params) {
            sym.ctors.push(MethodSym {
                owner: sym.name.clone(),
                name: "<init>".into(),
                params,
                ret: JType::Void,
                is_static: false,
                is_abstract: false,
                is_private: false,
                varargs,
            });
        }
    }

    fn constant_of_sibling(&self, sym: &ClassSym, expr: &Expr) -> Option<(JType, ConstValue)> {
        match &expr.kind {
            ExprKind::Name(n) => sym
                .fields
                .iter()
                .find(|f| &f.name == n)
                .and_then(|f| f.constant.clone().map(|c| (f.ty.clone(), c))),
            _ => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ClassSym> {
        self.classes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassSym> {
        self.classes.values()
    }

    /// Internal name for a simple or dotted type name written at `scope`.
    pub fn lookup_type_name(&self, unit: &CompilationUnit, scope: Option<DeclId>, name: &str) -> Option<String> {
        if let Some((head, rest)) = name.split_once('.') {
            if let Some(outer) = self.lookup_type_name(unit, scope, head) {
                let candidate = format!("{}${}", outer, rest.replace('.', "$"));
                if self.contains(&candidate) {
                    return Some(candidate);
                }
            }
            // fully qualified; unknown classes are kept opaque
            return Some(name.replace('.', "/"));
        }

        let mut cur = scope;
        while let Some(id) = cur {
            let decl = &unit.decls[id];
            if decl.name == name {
                return Some(unit.binary_name(id));
            }
            for nested in &decl.nested {
                if unit.decls[*nested].name == name {
                    return Some(unit.binary_name(*nested));
                }
            }
            cur = decl.enclosing;
        }
        for decl in unit.decls.top_level() {
            if decl.name == name {
                return Some(unit.binary_name(decl.id));
            }
        }
        if let Some(internal) = self.imports.get(name) {
            return Some(internal.clone());
        }
        if JAVA_LANG_SIMPLE_TYPES.contains(&name) {
            return Some(format!("java/lang/{}", name));
        }
        let io = format!("java/io/{}", name);
        if self.contains(&io) {
            return Some(io);
        }
        self.wildcard_imports.first().map(|pkg| format!("{}/{}", pkg, name))
    }

    /// Erased type of a written type. `Err` carries the unresolvable name.
    pub fn resolve_type_ref(&self, unit: &CompilationUnit, scope: TypeScope<'_>, ty: &TypeRef) -> Result<JType, String> {
        let base = self.resolve_base(unit, scope, &ty.name, 0)?;
        let mut t = base;
        for _ in 0..ty.array_dims {
            t = JType::array_of(t);
        }
        Ok(t)
    }

    fn resolve_base(&self, unit: &CompilationUnit, scope: TypeScope<'_>, name: &str, depth: usize) -> Result<JType, String> {
        if let Some(p) = JType::from_primitive_name(name) {
            return Ok(p);
        }
        if name == "?" {
            return Ok(JType::object());
        }
        if depth > 8 {
            return Ok(JType::object());
        }
        let tparam = scope.method_tparams.iter().find(|p| p.name == name).cloned().or_else(|| {
            let mut cur = scope.decl;
            while let Some(id) = cur {
                let decl = &unit.decls[id];
                if let Some(p) = decl.type_params.iter().find(|p| p.name == name) {
                    return Some(p.clone());
                }
                if decl.is_static() && decl.enclosing.is_some() {
                    break;
                }
                cur = decl.enclosing;
            }
            None
        });
        if let Some(p) = tparam {
            return match p.bounds.first() {
                Some(bound) => self.resolve_base(unit, scope, &bound.name, depth + 1),
                None => Ok(JType::object()),
            };
        }
        self.lookup_type_name(unit, scope.decl, name).map(JType::Class).ok_or_else(|| name.to_string())
    }

    pub fn is_interface(&self, name: &str) -> bool {
        self.get(name).map(ClassSym::is_interface).unwrap_or(false)
    }

    /// The single abstract method of the functional interface `name`,
    /// inherited ones included. Redeclared public `Object` methods do not
    /// count.
    pub fn functional_method(&self, name: &str) -> Option<MethodSym> {
        if self.get(name)?.kind != ClassKind::Interface {
            return None;
        }
        let object = self.get(JAVA_LANG_OBJECT);
        let mut found: Vec<&MethodSym> = Vec::new();
        let mut seen = HashSet::new();
        let mut work = vec![name.to_string()];
        while let Some(cur) = work.pop() {
            if !seen.insert(cur.clone()) {
                continue;
            }
            let Some(sym) = self.get(&cur) else { continue };
            for m in sym.methods.iter().filter(|m| m.is_abstract && !m.is_static) {
                let from_object =
                    object.is_some_and(|o| o.methods.iter().any(|om| om.name == m.name && om.params == m.params));
                if !from_object && !found.iter().any(|f| f.name == m.name && f.params == m.params) {
                    found.push(m);
                }
            }
            work.extend(sym.interfaces.iter().cloned());
        }
        match found.as_slice() {
            [single] => Some((*single).clone()),
            _ => None,
        }
    }

    pub fn is_subclass(&self, sub: &str, sup: &str) -> bool {
        if sub == sup || sup == JAVA_LANG_OBJECT {
            return true;
        }
        let mut seen = HashSet::new();
        let mut work = vec![sub.to_string()];
        while let Some(cur) = work.pop() {
            if cur == sup {
                return true;
            }
            if !seen.insert(cur.clone()) {
                continue;
            }
            if let Some(sym) = self.get(&cur) {
                if let Some(s) = &sym.super_class {
                    work.push(s.clone());
                }
                work.extend(sym.interfaces.iter().cloned());
            }
        }
        false
    }

    /// Reference subtyping, including arrays and the null type.
    pub fn is_subtype(&self, from: &JType, to: &JType) -> bool {
        match (from, to) {
            (JType::Error, _) | (_, JType::Error) => true,
            (a, b) if a == b => true,
            (JType::Null, b) => b.is_reference(),
            (JType::Class(a), JType::Class(b)) => self.is_subclass(a, b),
            (JType::Array(_), JType::Class(b)) => {
                b == JAVA_LANG_OBJECT || b == "java/lang/Cloneable" || b == "java/io/Serializable"
            }
            (JType::Array(a), JType::Array(b)) => a.is_reference() && b.is_reference() && self.is_subtype(a, b),
            _ => false,
        }
    }

    /// Method invocation conversion; `loose` permits boxing and unboxing.
    pub fn is_convertible(&self, from: &JType, to: &JType, loose: bool) -> bool {
        if from.is_error() || to.is_error() {
            return true;
        }
        if from.is_primitive() && to.is_primitive() {
            return from.widens_to(to);
        }
        if from.is_reference() && to.is_reference() {
            return self.is_subtype(from, to);
        }
        if !loose {
            return false;
        }
        if from.is_primitive() {
            return from.boxed().map(|b| self.is_subtype(&b, to)).unwrap_or(false);
        }
        match from.unboxed() {
            Some(p) => p.widens_to(to),
            None => false,
        }
    }

    /// Assignment conversion, with narrowing of int constants.
    pub fn is_assignable(&self, from: &JType, to: &JType, constant: Option<&ConstValue>) -> bool {
        if self.is_convertible(from, to, true) {
            return true;
        }
        if let (Some(ConstValue::Int(v)), true) = (constant, from.is_int_like() && *from != JType::Boolean) {
            let target = to.unboxed_or_self();
            if matches!(target, JType::Byte | JType::Short | JType::Char) && int_constant_fits(*v, &target) {
                return true;
            }
        }
        false
    }

    /// Casting conversion, enough for checked casts and numeric casts.
    pub fn is_castable(&self, from: &JType, to: &JType) -> bool {
        if from.is_error() || to.is_error() {
            return true;
        }
        if from.is_numeric() && to.is_numeric() {
            return true;
        }
        if from.is_primitive() || to.is_primitive() {
            return self.is_convertible(from, to, true);
        }
        if self.is_subtype(from, to) || self.is_subtype(to, from) {
            return true;
        }
        match (from, to) {
            (JType::Class(a), JType::Class(b)) => {
                let final_a = self.get(a).map(|s| s.is_final).unwrap_or(false);
                let final_b = self.get(b).map(|s| s.is_final).unwrap_or(false);
                (self.is_interface(a) && !final_b) || (self.is_interface(b) && !final_a)
            }
            _ => false,
        }
    }

    /// Least upper bound of reference types along superclass chains.
    pub fn lub(&self, types: &[JType]) -> JType {
        let refs: Vec<&JType> = types.iter().filter(|t| **t != JType::Null && !t.is_error()).collect();
        let Some(first) = refs.first() else {
            return JType::object();
        };
        if refs.iter().all(|t| t == first) {
            return (*first).clone();
        }
        let mut candidate = match first {
            JType::Class(n) => Some(n.clone()),
            _ => None,
        };
        while let Some(c) = candidate {
            let ct = JType::Class(c.clone());
            if refs.iter().all(|t| self.is_subtype(t, &ct)) {
                return ct;
            }
            candidate = self.get(&c).and_then(|s| s.super_class.clone());
        }
        JType::object()
    }

    pub fn find_field(&self, class: &str, name: &str) -> Option<&FieldSym> {
        let mut seen = HashSet::new();
        let mut work = vec![class.to_string()];
        while let Some(cur) = work.pop() {
            if !seen.insert(cur.clone()) {
                continue;
            }
            let Some(sym) = self.get(&cur) else { continue };
            if let Some(f) = sym.fields.iter().find(|f| f.name == name) {
                return Some(f);
            }
            work.extend(sym.interfaces.iter().rev().cloned());
            if let Some(s) = &sym.super_class {
                work.push(s.clone());
            }
        }
        None
    }

    /// All methods named `name` visible in `class`, most derived first;
    /// overridden signatures are dropped.
    pub fn methods_named(&self, class: &str, name: &str) -> Vec<&MethodSym> {
        let mut out: Vec<&MethodSym> = Vec::new();
        let mut seen = HashSet::new();
        let mut work = std::collections::VecDeque::from([class.to_string()]);
        let mut reached_object = false;
        while let Some(cur) = work.pop_front() {
            if !seen.insert(cur.clone()) {
                continue;
            }
            let Some(sym) = self.get(&cur) else { continue };
            if cur == JAVA_LANG_OBJECT {
                reached_object = true;
            }
            for m in sym.methods.iter().filter(|m| m.name == name) {
                if !out.iter().any(|o| o.params == m.params) {
                    out.push(m);
                }
            }
            if let Some(s) = &sym.super_class {
                work.push_back(s.clone());
            }
            work.extend(sym.interfaces.iter().cloned());
        }
        // interfaces inherit Object's public methods
        if !reached_object {
            if let Some(obj) = self.get(JAVA_LANG_OBJECT) {
                for m in obj.methods.iter().filter(|m| m.name == name) {
                    if !out.iter().any(|o| o.params == m.params) {
                        out.push(m);
                    }
                }
            }
        }
        out
    }

    pub fn resolve_method(&self, class: &str, name: &str, args: &[JType]) -> MethodLookup {
        let candidates = self.methods_named(class, name);
        if candidates.is_empty() {
            return MethodLookup::NotFound;
        }
        match self.select(&candidates, args) {
            Some(m) => MethodLookup::Found(m.clone()),
            None => MethodLookup::Inapplicable,
        }
    }

    pub fn resolve_ctor(&self, class: &str, args: &[JType]) -> Option<MethodSym> {
        let sym = self.get(class)?;
        let candidates: Vec<&MethodSym> = sym.ctors.iter().collect();
        self.select(&candidates, args).cloned()
    }

    /// Strict phase, then loose phase, then variable arity; the first most
    /// specific candidate in declaration order wins.
    fn select<'m>(&self, candidates: &[&'m MethodSym], args: &[JType]) -> Option<&'m MethodSym> {
        for loose in [false, true] {
            let applicable: Vec<&MethodSym> = candidates
                .iter()
                .copied()
                .filter(|m| {
                    m.params.len() == args.len()
                        && m.params.iter().zip(args).all(|(p, a)| self.is_convertible(a, p, loose))
                })
                .collect();
            if let Some(best) = self.most_specific(&applicable) {
                return Some(best);
            }
        }
        let applicable: Vec<&MethodSym> = candidates
            .iter()
            .copied()
            .filter(|m| m.varargs && args.len() + 1 >= m.params.len())
            .filter(|m| {
                let fixed = m.params.len() - 1;
                let Some(elem) = m.params[fixed].element() else { return false };
                m.params[..fixed].iter().zip(args).all(|(p, a)| self.is_convertible(a, p, true))
                    && args[fixed..].iter().all(|a| self.is_convertible(a, elem, true))
            })
            .collect();
        self.most_specific(&applicable)
    }

    fn most_specific<'m>(&self, applicable: &[&'m MethodSym]) -> Option<&'m MethodSym> {
        applicable
            .iter()
            .copied()
            .find(|m| {
                applicable.iter().all(|other| {
                    m.params.len() != other.params.len()
                        || m.params.iter().zip(&other.params).all(|(a, b)| self.is_convertible(a, b, false))
                })
            })
            .or_else(|| applicable.first().copied())
    }
}

/// Folds a constant expression. `names` supplies the values of simple names
/// and field accesses.
pub fn fold_constant(expr: &Expr, names: &dyn Fn(&Expr) -> Option<(JType, ConstValue)>) -> Option<(JType, ConstValue)> {
    match &expr.kind {
        ExprKind::Literal(lit) => match lit {
            Literal::Int(v) => Some((JType::Int, ConstValue::Int(*v))),
            Literal::Long(v) => Some((JType::Long, ConstValue::Long(*v))),
            Literal::Float(v) => Some((JType::Float, ConstValue::Float(*v))),
            Literal::Double(v) => Some((JType::Double, ConstValue::Double(*v))),
            Literal::Char(c) => Some((JType::Char, ConstValue::Int(i32::from(*c)))),
            Literal::String(s) => Some((JType::string(), ConstValue::Str(s.clone()))),
            Literal::Bool(b) => Some((JType::Boolean, ConstValue::Bool(*b))),
            Literal::Null => None,
        },
        ExprKind::Parenthesized(inner) => fold_constant(inner, names),
        ExprKind::Name(_) | ExprKind::FieldAccess { .. } => names(expr),
        ExprKind::Unary { op, operand } => {
            let (t, v) = fold_constant(operand, names)?;
            match (op, v) {
                (UnaryOp::Plus, v) if t.is_numeric() => Some((t.promoted(), v)),
                (UnaryOp::Neg, ConstValue::Int(i)) => Some((JType::Int, ConstValue::Int(i.wrapping_neg()))),
                (UnaryOp::Neg, ConstValue::Long(i)) => Some((JType::Long, ConstValue::Long(i.wrapping_neg()))),
                (UnaryOp::Neg, ConstValue::Float(f)) => Some((JType::Float, ConstValue::Float(-f))),
                (UnaryOp::Neg, ConstValue::Double(f)) => Some((JType::Double, ConstValue::Double(-f))),
                (UnaryOp::BitNot, ConstValue::Int(i)) => Some((JType::Int, ConstValue::Int(!i))),
                (UnaryOp::BitNot, ConstValue::Long(i)) => Some((JType::Long, ConstValue::Long(!i))),
                (UnaryOp::Not, ConstValue::Bool(b)) => Some((JType::Boolean, ConstValue::Bool(!b))),
                _ => None,
            }
        }
        ExprKind::Binary { op, left, right } => {
            let (lt, lv) = fold_constant(left, names)?;
            let (rt, rv) = fold_constant(right, names)?;
            fold_binary(*op, &lt, lv, &rt, rv)
        }
        ExprKind::Cast { ty, expr } => {
            let (t, v) = fold_constant(expr, names)?;
            let target = JType::from_primitive_name(&ty.name).filter(|_| ty.array_dims == 0);
            match target {
                Some(target) => coerce_constant(&v, &target).map(|v| (target, v)),
                None if ty.name == "String" && t.is_string() => Some((t, v)),
                None => None,
            }
        }
        ExprKind::Conditional { cond, then_expr, else_expr } => {
            let (_, c) = fold_constant(cond, names)?;
            let a = fold_constant(then_expr, names)?;
            let b = fold_constant(else_expr, names)?;
            match c {
                ConstValue::Bool(true) if a.0 == b.0 => Some(a),
                ConstValue::Bool(false) if a.0 == b.0 => Some(b),
                _ => None,
            }
        }
        _ => None,
    }
}

fn as_i64(v: &ConstValue) -> Option<i64> {
    match v {
        ConstValue::Int(i) => Some(i64::from(*i)),
        ConstValue::Long(l) => Some(*l),
        _ => None,
    }
}

fn as_f64(v: &ConstValue) -> Option<f64> {
    match v {
        ConstValue::Int(i) => Some(f64::from(*i)),
        ConstValue::Long(l) => Some(*l as f64),
        ConstValue::Float(f) => Some(f64::from(*f)),
        ConstValue::Double(d) => Some(*d),
        _ => None,
    }
}

fn render(t: &JType, v: &ConstValue) -> String {
    match (t, v) {
        (JType::Char, ConstValue::Int(c)) => char::from_u32(*c as u32).map(String::from).unwrap_or_default(),
        (_, ConstValue::Int(i)) => i.to_string(),
        (_, ConstValue::Long(l)) => l.to_string(),
        (_, ConstValue::Float(f)) => format!("{:?}", f),
        (_, ConstValue::Double(d)) => format!("{:?}", d),
        (_, ConstValue::Bool(b)) => b.to_string(),
        (_, ConstValue::Str(s)) => s.clone(),
    }
}

fn fold_binary(op: BinaryOp, lt: &JType, lv: ConstValue, rt: &JType, rv: ConstValue) -> Option<(JType, ConstValue)> {
    if op == BinaryOp::Add && (lt.is_string() || rt.is_string()) {
        return Some((JType::string(), ConstValue::Str(format!("{}{}", render(lt, &lv), render(rt, &rv)))));
    }
    if let (ConstValue::Bool(a), ConstValue::Bool(b)) = (&lv, &rv) {
        let r = match op {
            BinaryOp::And | BinaryOp::BitAnd => *a && *b,
            BinaryOp::Or | BinaryOp::BitOr => *a || *b,
            BinaryOp::BitXor | BinaryOp::Ne => a != b,
            BinaryOp::Eq => a == b,
            _ => return None,
        };
        return Some((JType::Boolean, ConstValue::Bool(r)));
    }
    if op.is_shift() {
        let shift = as_i64(&rv)?;
        return match lt.promoted() {
            JType::Int => {
                let a = as_i64(&lv)? as i32;
                let s = (shift & 31) as u32;
                let r = match op {
                    BinaryOp::Shl => a.wrapping_shl(s),
                    BinaryOp::Shr => a.wrapping_shr(s),
                    _ => ((a as u32).wrapping_shr(s)) as i32,
                };
                Some((JType::Int, ConstValue::Int(r)))
            }
            JType::Long => {
                let a = as_i64(&lv)?;
                let s = (shift & 63) as u32;
                let r = match op {
                    BinaryOp::Shl => a.wrapping_shl(s),
                    BinaryOp::Shr => a.wrapping_shr(s),
                    _ => ((a as u64).wrapping_shr(s)) as i64,
                };
                Some((JType::Long, ConstValue::Long(r)))
            }
            _ => None,
        };
    }
    let t = binary_promotion(lt, rt)?;
    if op.is_comparison() {
        let r = match (&t, op) {
            (JType::Int | JType::Long, _) => {
                let (a, b) = (as_i64(&lv)?, as_i64(&rv)?);
                match op {
                    BinaryOp::Eq => a == b,
                    BinaryOp::Ne => a != b,
                    BinaryOp::Lt => a < b,
                    BinaryOp::Le => a <= b,
                    BinaryOp::Gt => a > b,
                    _ => a >= b,
                }
            }
            _ => {
                let (a, b) = (as_f64(&lv)?, as_f64(&rv)?);
                match op {
                    BinaryOp::Eq => a == b,
                    BinaryOp::Ne => a != b,
                    BinaryOp::Lt => a < b,
                    BinaryOp::Le => a <= b,
                    BinaryOp::Gt => a > b,
                    _ => a >= b,
                }
            }
        };
        return Some((JType::Boolean, ConstValue::Bool(r)));
    }
    match t {
        JType::Int => {
            let (a, b) = (as_i64(&lv)? as i32, as_i64(&rv)? as i32);
            let r = match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div if b != 0 => a.wrapping_div(b),
                BinaryOp::Rem if b != 0 => a.wrapping_rem(b),
                BinaryOp::BitAnd => a & b,
                BinaryOp::BitOr => a | b,
                BinaryOp::BitXor => a ^ b,
                _ => return None,
            };
            Some((JType::Int, ConstValue::Int(r)))
        }
        JType::Long => {
            let (a, b) = (as_i64(&lv)?, as_i64(&rv)?);
            let r = match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div if b != 0 => a.wrapping_div(b),
                BinaryOp::Rem if b != 0 => a.wrapping_rem(b),
                BinaryOp::BitAnd => a & b,
                BinaryOp::BitOr => a | b,
                BinaryOp::BitXor => a ^ b,
                _ => return None,
            };
            Some((JType::Long, ConstValue::Long(r)))
        }
        JType::Float | JType::Double => {
            let (a, b) = (as_f64(&lv)?, as_f64(&rv)?);
            let r = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                _ => return None,
            };
            if t == JType::Float {
                Some((JType::Float, ConstValue::Float(r as f32)))
            } else {
                Some((JType::Double, ConstValue::Double(r)))
            }
        }
        _ => None,
    }
}

/// Converts a constant to the representation of type `to`.
pub fn coerce_constant(v: &ConstValue, to: &JType) -> Option<ConstValue> {
    let to = to.unboxed_or_self();
    if to.is_string() {
        return v.as_str().map(|s| ConstValue::Str(s.to_string()));
    }
    let r = match (&to, v) {
        (JType::Boolean, ConstValue::Bool(b)) => ConstValue::Bool(*b),
        (JType::Int, _) => ConstValue::Int(match v {
            ConstValue::Int(i) => *i,
            ConstValue::Long(l) => *l as i32,
            ConstValue::Float(f) => *f as i32,
            ConstValue::Double(d) => *d as i32,
            _ => return None,
        }),
        (JType::Short, _) => ConstValue::Int(i32::from(as_i64(v).map(|i| i as i16).or_else(|| as_f64(v).map(|f| f as i32 as i16))?)),
        (JType::Byte, _) => ConstValue::Int(i32::from(as_i64(v).map(|i| i as i8).or_else(|| as_f64(v).map(|f| f as i32 as i8))?)),
        (JType::Char, _) => ConstValue::Int(i32::from(as_i64(v).map(|i| i as u16).or_else(|| as_f64(v).map(|f| f as i32 as u16))?)),
        (JType::Long, _) => ConstValue::Long(match v {
            ConstValue::Int(i) => i64::from(*i),
            ConstValue::Long(l) => *l,
            ConstValue::Float(f) => *f as i64,
            ConstValue::Double(d) => *d as i64,
            _ => return None,
        }),
        (JType::Float, _) => ConstValue::Float(as_f64(v)? as f32),
        (JType::Double, _) => ConstValue::Double(match v {
            ConstValue::Float(f) => f64::from(*f),
            other => as_f64(other)?,
        }),
        _ => return None,
    };
    Some(r)
}
