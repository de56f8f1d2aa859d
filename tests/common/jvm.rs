//! A small bytecode interpreter for the classes the compiler generates.
//!
//! It executes `ClassFile` values directly, models the handful of
//! `java.lang` classes generated code touches (strings, builders, boxes,
//! enums, records and common exceptions) and implements the
//! `ObjectMethods` bootstrap behind record `toString`/`hashCode`/`equals`.
//! Unsupported library calls panic with the member they name.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use recswitch::codegen::attribute::{AttributeInfo, CodeAttribute};
use recswitch::codegen::defs::ref_kinds::REF_INVOKE_STATIC;
use recswitch::codegen::opcodes::*;
use recswitch::codegen::{ClassFile, Constant, GeneratedClass};
use recswitch::wash::types::{parse_method_descriptor, JType};

pub type Ref = Rc<RefCell<Object>>;

#[derive(Debug, Clone)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    Ref(Ref),
    /// Second half of a long or double local; also the result of `void`.
    Void,
}

impl Value {
    pub fn int(&self) -> i32 {
        match self {
            Value::Int(v) => *v,
            other => panic!("expected int, found {:?}", other),
        }
    }

    pub fn long(&self) -> i64 {
        match self {
            Value::Long(v) => *v,
            other => panic!("expected long, found {:?}", other),
        }
    }

    pub fn float(&self) -> f32 {
        match self {
            Value::Float(v) => *v,
            other => panic!("expected float, found {:?}", other),
        }
    }

    pub fn double(&self) -> f64 {
        match self {
            Value::Double(v) => *v,
            other => panic!("expected double, found {:?}", other),
        }
    }

    pub fn boolean(&self) -> bool {
        self.int() != 0
    }

    pub fn reference(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            Value::Null => None,
            other => panic!("expected reference, found {:?}", other),
        }
    }

    fn is_wide(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    fn default_for(desc: &str) -> Value {
        match desc.as_bytes().first() {
            Some(b'J') => Value::Long(0),
            Some(b'F') => Value::Float(0.0),
            Some(b'D') => Value::Double(0.0),
            Some(b'L') | Some(b'[') => Value::Null,
            _ => Value::Int(0),
        }
    }
}

#[derive(Debug)]
pub struct Object {
    pub class: String,
    pub kind: ObjectKind,
    pub hash: i32,
}

#[derive(Debug)]
pub enum ObjectKind {
    Fields(HashMap<String, Value>),
    Str(String),
    Builder(String),
    Array(Vec<Value>),
    Boxed(Value),
    Class(String),
    /// Result of a `LambdaMetafactory` call site: `sam` forwards to the static
    /// implementation method with the captured values in front.
    Lambda { owner: String, method: String, desc: String, sam: String, captured: Vec<Value> },
}

/// An exception that escaped the called method.
#[derive(Debug, Clone)]
pub struct Thrown(pub Ref);

impl Thrown {
    pub fn class(&self) -> String {
        self.0.borrow().class.clone()
    }

    pub fn message(&self) -> Option<String> {
        let obj = self.0.borrow();
        let ObjectKind::Fields(fields) = &obj.kind else { return None };
        let Some(Value::Ref(r)) = fields.get("message") else { return None };
        let message = r.borrow();
        let text = match &message.kind {
            ObjectKind::Str(s) => Some(s.clone()),
            _ => None,
        };
        text
    }
}

type Exec<T> = Result<T, Thrown>;

/// Library classes with their super class.
const LIBRARY_SUPERS: &[(&str, &str)] = &[
    ("java/lang/Throwable", "java/lang/Object"),
    ("java/lang/Exception", "java/lang/Throwable"),
    ("java/lang/Error", "java/lang/Throwable"),
    ("java/lang/RuntimeException", "java/lang/Exception"),
    ("java/lang/ArithmeticException", "java/lang/RuntimeException"),
    ("java/lang/NullPointerException", "java/lang/RuntimeException"),
    ("java/lang/ClassCastException", "java/lang/RuntimeException"),
    ("java/lang/IllegalArgumentException", "java/lang/RuntimeException"),
    ("java/lang/IllegalStateException", "java/lang/RuntimeException"),
    ("java/lang/IndexOutOfBoundsException", "java/lang/RuntimeException"),
    ("java/lang/ArrayIndexOutOfBoundsException", "java/lang/IndexOutOfBoundsException"),
    ("java/lang/UnsupportedOperationException", "java/lang/RuntimeException"),
    ("java/lang/MatchException", "java/lang/RuntimeException"),
    ("java/lang/LinkageError", "java/lang/Error"),
    ("java/lang/IncompatibleClassChangeError", "java/lang/LinkageError"),
    ("java/lang/NoSuchFieldError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/Record", "java/lang/Object"),
    ("java/lang/Enum", "java/lang/Object"),
    ("java/lang/Number", "java/lang/Object"),
    ("java/lang/Integer", "java/lang/Number"),
    ("java/lang/Long", "java/lang/Number"),
    ("java/lang/Short", "java/lang/Number"),
    ("java/lang/Byte", "java/lang/Number"),
    ("java/lang/Float", "java/lang/Number"),
    ("java/lang/Double", "java/lang/Number"),
    ("java/lang/Character", "java/lang/Object"),
    ("java/lang/Boolean", "java/lang/Object"),
    ("java/lang/String", "java/lang/Object"),
    ("java/lang/StringBuilder", "java/lang/Object"),
];

pub struct Jvm {
    classes: HashMap<String, Rc<ClassFile>>,
    statics: HashMap<(String, String), Value>,
    initialized: HashSet<String>,
    strings: HashMap<String, Ref>,
    next_hash: i32,
    /// Instructions left before the run is declared runaway.
    fuel: u64,
}

impl Jvm {
    pub fn new(classes: &[GeneratedClass]) -> Self {
        Self {
            classes: classes.iter().map(|c| (c.name.clone(), Rc::new(c.class_file.clone()))).collect(),
            statics: HashMap::new(),
            initialized: HashSet::new(),
            strings: HashMap::new(),
            next_hash: 0x1b6d3586,
            fuel: 5_000_000,
        }
    }

    // ----- public entry points -----

    pub fn call_static(&mut self, class: &str, name: &str, desc: &str, args: Vec<Value>) -> Exec<Value> {
        self.ensure_init(class)?;
        let (owner, _) = self
            .find_method(class, name, desc)
            .unwrap_or_else(|| panic!("no method {}.{}{}", class, name, desc));
        self.run_method(&owner, name, desc, args)
    }

    pub fn new_object(&mut self, class: &str, desc: &str, args: Vec<Value>) -> Exec<Value> {
        self.ensure_init(class)?;
        let obj = self.allocate(class);
        let mut all = vec![obj.clone()];
        all.extend(args);
        self.run_method(class, "<init>", desc, all)?;
        Ok(obj)
    }

    pub fn call_virtual(&mut self, receiver: &Value, name: &str, desc: &str, args: Vec<Value>) -> Exec<Value> {
        let mut all = vec![receiver.clone()];
        all.extend(args);
        self.invoke_virtual(name, desc, all)
    }

    pub fn get_static(&mut self, class: &str, name: &str) -> Exec<Value> {
        self.ensure_init(class)?;
        Ok(self.static_value(class, name))
    }

    pub fn string(&mut self, s: &str) -> Value {
        Value::Ref(self.new_ref("java/lang/String", ObjectKind::Str(s.to_string())))
    }

    /// Content of a `String` value; `None` for null.
    pub fn as_string(&self, v: &Value) -> Option<String> {
        let r = v.reference()?;
        let o = r.borrow();
        let text = match &o.kind {
            ObjectKind::Str(s) => s.clone(),
            other => panic!("not a string: {:?}", other),
        };
        Some(text)
    }

    /// Java's `String.valueOf(Object)`.
    pub fn to_java_string(&mut self, v: &Value) -> Exec<String> {
        self.stringify(v, "Ljava/lang/Object;")
    }

    pub fn int_array(&mut self, values: &[i32]) -> Value {
        let data = values.iter().map(|v| Value::Int(*v)).collect();
        Value::Ref(self.new_ref("[I", ObjectKind::Array(data)))
    }

    pub fn enum_constant(&mut self, class: &str, name: &str) -> Value {
        self.get_static(class, name).unwrap_or_else(|t| panic!("initializing {} threw {}", class, t.class()))
    }

    // ----- objects -----

    fn new_ref(&mut self, class: &str, kind: ObjectKind) -> Ref {
        self.next_hash = self.next_hash.wrapping_mul(1103515245).wrapping_add(12345) & 0x7fff_ffff;
        Rc::new(RefCell::new(Object { class: class.to_string(), kind, hash: self.next_hash }))
    }

    fn allocate(&mut self, class: &str) -> Value {
        let mut fields = HashMap::new();
        let mut current = Some(class.to_string());
        while let Some(name) = current {
            match self.classes.get(&name).cloned() {
                Some(cf) => {
                    for f in &cf.fields {
                        if f.access_flags & 0x0008 == 0 {
                            let fname = cf.constant_pool.utf8(f.name_index).unwrap().to_string();
                            let desc = cf.constant_pool.utf8(f.descriptor_index).unwrap();
                            fields.insert(fname, Value::default_for(desc));
                        }
                    }
                    current = cf.super_name().map(str::to_string);
                }
                None => current = None,
            }
        }
        Value::Ref(self.new_ref(class, ObjectKind::Fields(fields)))
    }

    fn throw_new(&mut self, class: &str, message: Option<&str>) -> Thrown {
        let mut fields = HashMap::new();
        if let Some(m) = message {
            fields.insert("message".to_string(), self.string(m));
        }
        Thrown(self.new_ref(class, ObjectKind::Fields(fields)))
    }

    fn intern(&mut self, s: &str) -> Value {
        if let Some(r) = self.strings.get(s) {
            return Value::Ref(r.clone());
        }
        let r = self.new_ref("java/lang/String", ObjectKind::Str(s.to_string()));
        self.strings.insert(s.to_string(), r.clone());
        Value::Ref(r)
    }

    fn super_of(&self, class: &str) -> Option<String> {
        if let Some(cf) = self.classes.get(class) {
            return cf.super_name().map(str::to_string);
        }
        if class == "java/lang/Object" {
            return None;
        }
        Some(
            LIBRARY_SUPERS
                .iter()
                .find(|(c, _)| *c == class)
                .map(|(_, s)| s.to_string())
                .unwrap_or_else(|| "java/lang/Object".to_string()),
        )
    }

    fn interfaces_of(&self, class: &str) -> Vec<String> {
        match self.classes.get(class) {
            Some(cf) => cf.interfaces.iter().map(|i| cf.constant_pool.class_name(*i).unwrap().to_string()).collect(),
            None => match class {
                "java/lang/String" => vec!["java/lang/CharSequence".into(), "java/lang/Comparable".into()],
                "java/lang/Enum" => vec!["java/lang/Comparable".into()],
                _ => Vec::new(),
            },
        }
    }

    fn is_subclass(&self, class: &str, target: &str) -> bool {
        if target == "java/lang/Object" {
            return true;
        }
        let mut current = Some(class.to_string());
        while let Some(c) = current {
            if c == target || self.implements(&c, target) {
                return true;
            }
            current = self.super_of(&c);
        }
        false
    }

    fn implements(&self, class: &str, target: &str) -> bool {
        self.interfaces_of(class).iter().any(|i| i == target || self.implements(i, target))
    }

    fn instance_of(&self, r: &Ref, target: &str) -> bool {
        let class = r.borrow().class.clone();
        if class.starts_with('[') || target.starts_with('[') {
            return class == target || target == "java/lang/Object" || array_assignable(&class, target, self);
        }
        self.is_subclass(&class, target)
    }

    // ----- classes -----

    fn ensure_init(&mut self, class: &str) -> Exec<()> {
        if self.initialized.contains(class) || !self.classes.contains_key(class) {
            return Ok(());
        }
        self.initialized.insert(class.to_string());
        if let Some(sup) = self.super_of(class) {
            self.ensure_init(&sup)?;
        }
        let has_clinit = self.classes[class].method("<clinit>", "()V").is_some();
        if has_clinit {
            self.run_method(class, "<clinit>", "()V", Vec::new())?;
        }
        Ok(())
    }

    fn static_value(&self, class: &str, name: &str) -> Value {
        let mut current = Some(class.to_string());
        while let Some(c) = current {
            if let Some(v) = self.statics.get(&(c.clone(), name.to_string())) {
                return v.clone();
            }
            if let Some(cf) = self.classes.get(&c) {
                if let Some(f) = cf.field(name) {
                    let desc = cf.constant_pool.utf8(f.descriptor_index).unwrap();
                    for a in &f.attributes {
                        if let AttributeInfo::ConstantValue(i) = &a.info {
                            return match cf.constant_pool.get(*i) {
                                Some(Constant::Integer(v)) => Value::Int(*v),
                                Some(Constant::Long(v)) => Value::Long(*v),
                                Some(Constant::Float(v)) => Value::Float(*v),
                                Some(Constant::Double(v)) => Value::Double(*v),
                                other => panic!("constant value {:?}", other),
                            };
                        }
                    }
                    return Value::default_for(desc);
                }
            }
            current = self.super_of(&c).filter(|s| self.classes.contains_key(s));
        }
        panic!("no static field {}.{}", class, name)
    }

    fn static_owner(&self, class: &str, name: &str) -> String {
        let mut current = Some(class.to_string());
        while let Some(c) = current {
            if self.classes.get(&c).map_or(false, |cf| cf.field(name).is_some()) {
                return c;
            }
            current = self.super_of(&c).filter(|s| self.classes.contains_key(s));
        }
        class.to_string()
    }

    /// The generated class declaring `name desc`, searching supers.
    fn find_method(&self, class: &str, name: &str, desc: &str) -> Option<(String, Rc<ClassFile>)> {
        let mut current = Some(class.to_string());
        while let Some(c) = current {
            let cf = self.classes.get(&c)?.clone();
            if cf.method(name, desc).is_some() {
                return Some((c, cf));
            }
            current = cf.super_name().map(str::to_string);
        }
        None
    }

    /// A default method inherited from a generated interface.
    fn find_default(&self, class: &str, name: &str, desc: &str) -> Option<String> {
        let mut current = Some(class.to_string());
        while let Some(c) = current {
            for i in self.interfaces_of(&c) {
                if let Some(cf) = self.classes.get(&i) {
                    if cf.method(name, desc).and_then(|m| m.code()).is_some() {
                        return Some(i);
                    }
                }
                if let Some(found) = self.find_default(&i, name, desc) {
                    return Some(found);
                }
            }
            current = self.super_of(&c).filter(|s| self.classes.contains_key(s));
        }
        None
    }

    fn run_method(&mut self, class: &str, name: &str, desc: &str, args: Vec<Value>) -> Exec<Value> {
        let cf = self.classes[class].clone();
        let method = cf.method(name, desc).unwrap_or_else(|| panic!("no method {}.{}{}", class, name, desc));
        let code = method
            .code()
            .unwrap_or_else(|| panic!("abstract method {}.{}{} invoked", class, name, desc))
            .clone();
        let mut locals = vec![Value::Void; usize::from(code.max_locals).max(args.len() * 2)];
        let mut slot = 0;
        for a in args {
            let wide = a.is_wide();
            locals[slot] = a;
            slot += if wide { 2 } else { 1 };
        }
        self.execute(&cf, &code, locals)
    }

    // ----- invocation -----

    fn invoke_virtual(&mut self, name: &str, desc: &str, args: Vec<Value>) -> Exec<Value> {
        let receiver = match &args[0] {
            Value::Ref(r) => r.clone(),
            Value::Null => return Err(self.throw_new("java/lang/NullPointerException", None)),
            other => panic!("receiver {:?}", other),
        };
        let target = match &receiver.borrow().kind {
            ObjectKind::Lambda { owner, method, desc, sam, captured } if sam == name => {
                Some((owner.clone(), method.clone(), desc.clone(), captured.clone()))
            }
            _ => None,
        };
        if let Some((owner, method, impl_desc, mut captured)) = target {
            captured.extend(args.into_iter().skip(1));
            return self.run_method(&owner, &method, &impl_desc, captured);
        }
        let class = receiver.borrow().class.clone();
        if let Some((owner, _)) = self.find_method(&class, name, desc) {
            if self.classes[&owner].method(name, desc).and_then(|m| m.code()).is_some() {
                return self.run_method(&owner, name, desc, args);
            }
        }
        if let Some(owner) = self.find_default(&class, name, desc) {
            return self.run_method(&owner, name, desc, args);
        }
        let library = self.library_class_of(&class);
        self.native(&library, name, desc, args)
    }

    /// The first library class above `class`.
    fn library_class_of(&self, class: &str) -> String {
        let mut current = class.to_string();
        while self.classes.contains_key(&current) {
            match self.super_of(&current) {
                Some(s) => current = s,
                None => break,
            }
        }
        current
    }

    fn invoke_special(&mut self, owner: &str, name: &str, desc: &str, args: Vec<Value>) -> Exec<Value> {
        if let Some((found, _)) = self.find_method(owner, name, desc) {
            if name != "<init>" || found == owner {
                return self.run_method(&found, name, desc, args);
            }
        }
        self.native(owner, name, desc, args)
    }

    fn invoke_static(&mut self, owner: &str, name: &str, desc: &str, args: Vec<Value>) -> Exec<Value> {
        if self.classes.contains_key(owner) {
            self.ensure_init(owner)?;
            if let Some((found, _)) = self.find_method(owner, name, desc) {
                return self.run_method(&found, name, desc, args);
            }
        }
        self.native(owner, name, desc, args)
    }

    fn stringify(&mut self, v: &Value, desc: &str) -> Exec<String> {
        Ok(match (desc, v) {
            ("Z", Value::Int(i)) => (*i != 0).to_string(),
            ("C", Value::Int(i)) => char::from_u32(*i as u32 & 0xffff).map(String::from).unwrap_or_default(),
            (_, Value::Int(i)) => i.to_string(),
            (_, Value::Long(l)) => l.to_string(),
            (_, Value::Float(f)) => format_float(f64::from(*f)),
            (_, Value::Double(d)) => format_float(*d),
            (_, Value::Null) => "null".to_string(),
            (_, Value::Ref(r)) => {
                let shown = {
                    let o = r.borrow();
                    match &o.kind {
                        ObjectKind::Str(s) | ObjectKind::Builder(s) => Some(s.clone()),
                        ObjectKind::Boxed(inner) => Some(match (o.class.as_str(), inner) {
                            ("java/lang/Boolean", Value::Int(i)) => (*i != 0).to_string(),
                            ("java/lang/Character", Value::Int(i)) => {
                                char::from_u32(*i as u32).map(String::from).unwrap_or_default()
                            }
                            (_, Value::Int(i)) => i.to_string(),
                            (_, Value::Long(l)) => l.to_string(),
                            (_, Value::Float(f)) => format_float(f64::from(*f)),
                            (_, Value::Double(d)) => format_float(*d),
                            (_, other) => panic!("boxed {:?}", other),
                        }),
                        ObjectKind::Array(_) => Some(format!("{}@{:x}", o.class, o.hash)),
                        ObjectKind::Class(name) => Some(format!("class {}", name.replace('/', "."))),
                        ObjectKind::Lambda { .. } => Some(format!("{}$$Lambda@{:x}", o.class, o.hash)),
                        ObjectKind::Fields(_) => None,
                    }
                };
                match shown {
                    Some(s) => s,
                    None => {
                        let s = self.invoke_virtual("toString", "()Ljava/lang/String;", vec![v.clone()])?;
                        self.as_string(&s).unwrap_or_else(|| "null".to_string())
                    }
                }
            }
            (_, Value::Void) => panic!("stringify void"),
        })
    }

    fn java_hash(&mut self, v: &Value) -> Exec<i32> {
        Ok(match v {
            Value::Int(i) => *i,
            Value::Long(l) => (*l ^ (*l >> 32)) as i32,
            Value::Float(f) => f.to_bits() as i32,
            Value::Double(d) => {
                let b = d.to_bits();
                (b ^ (b >> 32)) as i32
            }
            Value::Null => 0,
            Value::Ref(_) => self.invoke_virtual("hashCode", "()I", vec![v.clone()])?.int(),
            Value::Void => 0,
        })
    }

    fn java_equals(&mut self, a: &Value, b: &Value) -> Exec<bool> {
        Ok(match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Ref(_), _) => self.invoke_virtual("equals", "(Ljava/lang/Object;)Z", vec![a.clone(), b.clone()])?.boolean(),
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Long(x), Value::Long(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
            (Value::Double(x), Value::Double(y)) => x.to_bits() == y.to_bits(),
            _ => false,
        })
    }

    fn native(&mut self, owner: &str, name: &str, desc: &str, args: Vec<Value>) -> Exec<Value> {
        let (params, ret) = parse_method_descriptor(desc).unwrap_or_else(|| panic!("bad descriptor {}", desc));
        let param_desc = |i: usize| params.get(i).map(JType::descriptor).unwrap_or_default();
        let this = args.first().cloned().unwrap_or(Value::Null);
        let field = |v: &Value, f: &str| -> Value {
            match &v.reference().unwrap().borrow().kind {
                ObjectKind::Fields(m) => m.get(f).cloned().unwrap_or(Value::Null),
                other => panic!("no field {} on {:?}", f, other),
            }
        };
        let set_field = |v: &Value, f: &str, value: Value| {
            if let ObjectKind::Fields(m) = &mut v.reference().unwrap().borrow_mut().kind {
                m.insert(f.to_string(), value);
            }
        };

        let result = match (owner, name) {
            (_, "<init>") if self.is_subclass(owner, "java/lang/Throwable") => {
                if let Some(first) = args.get(1) {
                    if param_desc(0) == "Ljava/lang/String;" {
                        set_field(&this, "message", first.clone());
                    }
                }
                Value::Void
            }
            ("java/lang/Object", "<init>") | ("java/lang/Record", "<init>") => Value::Void,
            ("java/lang/Enum", "<init>") => {
                set_field(&this, "$name", args[1].clone());
                set_field(&this, "$ordinal", args[2].clone());
                Value::Void
            }
            ("java/lang/Enum", "ordinal") => field(&this, "$ordinal"),
            ("java/lang/Enum", "name") | ("java/lang/Enum", "toString") => field(&this, "$name"),
            ("java/lang/Enum", "valueOf") => {
                let class = match &args[0].reference().unwrap().borrow().kind {
                    ObjectKind::Class(c) => c.clone(),
                    other => panic!("class literal {:?}", other),
                };
                let constant = self.as_string(&args[1]).unwrap();
                self.ensure_init(&class)?;
                if self.classes[&class].field(&constant).is_none() {
                    return Err(self.throw_new("java/lang/IllegalArgumentException", Some(&constant)));
                }
                self.static_value(&class, &constant)
            }
            (_, "getMessage") => field(&this, "message"),
            (_, "hashCode") if owner == "java/lang/String" => {
                let s = self.as_string(&this).unwrap();
                Value::Int(s.encode_utf16().fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(i32::from(c))))
            }
            ("java/lang/String", "equals") => {
                let a = self.as_string(&this);
                let equal = match &args[1] {
                    Value::Ref(r) => matches!(&r.borrow().kind, ObjectKind::Str(s) if Some(s) == a.as_ref()),
                    _ => false,
                };
                Value::Int(i32::from(equal))
            }
            ("java/lang/String", "length") => Value::Int(self.as_string(&this).unwrap().encode_utf16().count() as i32),
            ("java/lang/String", "isEmpty") => Value::Int(i32::from(self.as_string(&this).unwrap().is_empty())),
            ("java/lang/String", "charAt") => {
                let s: Vec<u16> = self.as_string(&this).unwrap().encode_utf16().collect();
                match s.get(args[1].int() as usize) {
                    Some(c) => Value::Int(i32::from(*c)),
                    None => return Err(self.throw_new("java/lang/StringIndexOutOfBoundsException", None)),
                }
            }
            ("java/lang/String", "toString") => this,
            ("java/lang/String", "concat") => {
                let s = self.as_string(&this).unwrap() + &self.as_string(&args[1]).unwrap();
                self.string(&s)
            }
            ("java/lang/String", "valueOf") => {
                let s = self.stringify(&args[0], &param_desc(0))?;
                self.string(&s)
            }
            ("java/lang/StringBuilder", "<init>") => {
                let initial = match args.get(1) {
                    Some(v) => self.stringify(v, &param_desc(0))?,
                    None => String::new(),
                };
                this.reference().unwrap().borrow_mut().kind = ObjectKind::Builder(initial);
                Value::Void
            }
            ("java/lang/StringBuilder", "append") => {
                let s = self.stringify(&args[1], &param_desc(0))?;
                if let ObjectKind::Builder(b) = &mut this.reference().unwrap().borrow_mut().kind {
                    b.push_str(&s);
                }
                this
            }
            ("java/lang/StringBuilder", "toString") => {
                let s = match &this.reference().unwrap().borrow().kind {
                    ObjectKind::Builder(b) => b.clone(),
                    other => panic!("builder {:?}", other),
                };
                self.string(&s)
            }
            (box_class, "valueOf") if is_box(box_class) && params.len() == 1 && params[0].is_primitive() => {
                Value::Ref(self.new_ref(box_class, ObjectKind::Boxed(args[0].clone())))
            }
            (box_class, unbox) if is_box(box_class) && unbox.ends_with("Value") => {
                let inner = match &this.reference().unwrap().borrow().kind {
                    ObjectKind::Boxed(v) => v.clone(),
                    other => panic!("unboxing {:?}", other),
                };
                convert_primitive(inner, &ret)
            }
            (box_class, "equals") if is_box(box_class) => {
                let same = match (&this, &args[1]) {
                    (Value::Ref(a), Value::Ref(b)) => {
                        let (a, b) = (a.borrow(), b.borrow());
                        a.class == b.class
                            && matches!((&a.kind, &b.kind), (ObjectKind::Boxed(x), ObjectKind::Boxed(y)) if format!("{:?}", x) == format!("{:?}", y))
                    }
                    _ => false,
                };
                Value::Int(i32::from(same))
            }
            (box_class, "hashCode") if is_box(box_class) => {
                let inner = match &this.reference().unwrap().borrow().kind {
                    ObjectKind::Boxed(v) => v.clone(),
                    other => panic!("boxed {:?}", other),
                };
                Value::Int(self.java_hash(&inner)?)
            }
            (_, "toString") if params.is_empty() => {
                let (class, hash, is_boxed) = {
                    let o = this.reference().unwrap().borrow();
                    (o.class.clone(), o.hash, matches!(o.kind, ObjectKind::Boxed(_)))
                };
                let s = if is_boxed {
                    self.stringify(&this, "Ljava/lang/Object;")?
                } else {
                    format!("{}@{:x}", class.replace('/', "."), hash)
                };
                self.string(&s)
            }
            (_, "hashCode") if params.is_empty() => Value::Int(this.reference().unwrap().borrow().hash),
            (_, "equals") if params.len() == 1 => {
                let same = match (&this, &args[1]) {
                    (Value::Ref(a), Value::Ref(b)) => Rc::ptr_eq(a, b),
                    _ => false,
                };
                Value::Int(i32::from(same))
            }
            (array, "clone") if array.starts_with('[') => {
                let (class, data) = {
                    let o = this.reference().unwrap().borrow();
                    match &o.kind {
                        ObjectKind::Array(d) => (o.class.clone(), d.clone()),
                        other => panic!("clone of {:?}", other),
                    }
                };
                Value::Ref(self.new_ref(&class, ObjectKind::Array(data)))
            }
            ("java/lang/Math", "max") => match (&args[0], &args[1]) {
                (Value::Int(a), Value::Int(b)) => Value::Int(*a.max(b)),
                (Value::Long(a), Value::Long(b)) => Value::Long(*a.max(b)),
                (Value::Double(a), Value::Double(b)) => Value::Double(a.max(*b)),
                other => panic!("Math.max{:?}", other),
            },
            ("java/lang/Math", "min") => match (&args[0], &args[1]) {
                (Value::Int(a), Value::Int(b)) => Value::Int(*a.min(b)),
                (Value::Long(a), Value::Long(b)) => Value::Long(*a.min(b)),
                (Value::Double(a), Value::Double(b)) => Value::Double(a.min(*b)),
                other => panic!("Math.min{:?}", other),
            },
            ("java/lang/Math", "abs") => match &args[0] {
                Value::Int(a) => Value::Int(a.wrapping_abs()),
                Value::Long(a) => Value::Long(a.wrapping_abs()),
                Value::Double(a) => Value::Double(a.abs()),
                other => panic!("Math.abs({:?})", other),
            },
            ("java/lang/Integer", "parseInt") => {
                let s = self.as_string(&args[0]).unwrap();
                match s.parse::<i32>() {
                    Ok(v) => Value::Int(v),
                    Err(_) => return Err(self.throw_new("java/lang/NumberFormatException", Some(&s))),
                }
            }
            _ => panic!("unsupported library member {}.{}{}", owner, name, desc),
        };
        Ok(result)
    }

    /// Instance produced by a `LambdaMetafactory.metafactory` call site, or `None`
    /// when the call site uses another bootstrap.
    fn lambda_object(&mut self, cf: &ClassFile, call_site: u16, captured: &[Value]) -> Option<Value> {
        let pool = &cf.constant_pool;
        let (bootstrap, nat) = match pool.get(call_site) {
            Some(Constant::InvokeDynamic(b, n)) => (*b, *n),
            other => panic!("call site {:?}", other),
        };
        let (sam, site_desc) = pool.name_and_type(nat).unwrap();
        let entry = cf
            .attributes
            .iter()
            .find_map(|a| match &a.info {
                AttributeInfo::BootstrapMethods(m) => Some(m[usize::from(bootstrap)].clone()),
                _ => None,
            })
            .expect("BootstrapMethods");
        let (owner, method, _) = match pool.get(entry.method_ref) {
            Some(Constant::MethodHandle(_, r)) => pool.member_ref(*r).unwrap(),
            other => panic!("bootstrap handle {:?}", other),
        };
        if (owner, method) != ("java/lang/invoke/LambdaMetafactory", "metafactory") {
            return None;
        }
        let (impl_owner, impl_name, impl_desc) = match pool.get(entry.arguments[1]) {
            Some(Constant::MethodHandle(REF_INVOKE_STATIC, r)) => pool.member_ref(*r).unwrap(),
            other => panic!("implementation handle {:?}", other),
        };
        let interface = match parse_method_descriptor(site_desc) {
            Some((_, JType::Class(c))) => c,
            other => panic!("lambda call site type {:?}", other),
        };
        let kind = ObjectKind::Lambda {
            owner: impl_owner.to_string(),
            method: impl_name.to_string(),
            desc: impl_desc.to_string(),
            sam: sam.to_string(),
            captured: captured.to_vec(),
        };
        Some(Value::Ref(self.new_ref(&interface, kind)))
    }

    /// `ObjectMethods.bootstrap` applied to a record receiver.
    fn object_method(&mut self, cf: &ClassFile, call_site: u16, args: Vec<Value>) -> Exec<Value> {
        let pool = &cf.constant_pool;
        let (bootstrap, nat) = match pool.get(call_site) {
            Some(Constant::InvokeDynamic(b, n)) => (*b, *n),
            other => panic!("call site {:?}", other),
        };
        let (name, _) = pool.name_and_type(nat).unwrap();
        let methods = cf
            .attributes
            .iter()
            .find_map(|a| match &a.info {
                AttributeInfo::BootstrapMethods(m) => Some(m.clone()),
                _ => None,
            })
            .expect("BootstrapMethods");
        let entry = &methods[usize::from(bootstrap)];
        let (owner, method, _) = match pool.get(entry.method_ref) {
            Some(Constant::MethodHandle(_, r)) => pool.member_ref(*r).unwrap(),
            other => panic!("bootstrap handle {:?}", other),
        };
        assert_eq!((owner, method), ("java/lang/runtime/ObjectMethods", "bootstrap"));
        let record_class = pool.class_name(entry.arguments[0]).unwrap().to_string();
        let names = match pool.get(entry.arguments[1]) {
            Some(Constant::String(i)) => pool.utf8(*i).unwrap().to_string(),
            other => panic!("names {:?}", other),
        };
        let getters: Vec<String> = entry.arguments[2..]
            .iter()
            .map(|h| match pool.get(*h) {
                Some(Constant::MethodHandle(1, r)) => pool.member_ref(*r).unwrap().1.to_string(),
                other => panic!("getter {:?}", other),
            })
            .collect();
        let component_descs: Vec<String> = entry.arguments[2..]
            .iter()
            .map(|h| match pool.get(*h) {
                Some(Constant::MethodHandle(_, r)) => pool.member_ref(*r).unwrap().2.to_string(),
                _ => unreachable!(),
            })
            .collect();
        let read = |v: &Value, f: &str| -> Value {
            match &v.reference().unwrap().borrow().kind {
                ObjectKind::Fields(m) => m[f].clone(),
                other => panic!("record {:?}", other),
            }
        };

        match name {
            "toString" => {
                let simple = record_class.rsplit(['/', '$']).next().unwrap_or(&record_class).to_string();
                let labels: Vec<&str> = if names.is_empty() { Vec::new() } else { names.split(';').collect() };
                let mut parts = Vec::new();
                for ((label, getter), desc) in labels.iter().zip(&getters).zip(&component_descs) {
                    let value = read(&args[0], getter);
                    parts.push(format!("{}={}", label, self.stringify(&value, desc)?));
                }
                let s = format!("{}[{}]", simple, parts.join(", "));
                Ok(self.string(&s))
            }
            "hashCode" => {
                let mut result = 0i32;
                for getter in &getters {
                    let value = read(&args[0], getter);
                    result = result.wrapping_mul(31).wrapping_add(self.java_hash(&value)?);
                }
                Ok(Value::Int(result))
            }
            "equals" => {
                let other = match &args[1] {
                    Value::Ref(r) if r.borrow().class == record_class => args[1].clone(),
                    _ => return Ok(Value::Int(0)),
                };
                for getter in &getters {
                    let (a, b) = (read(&args[0], getter), read(&other, getter));
                    if !self.java_equals(&a, &b)? {
                        return Ok(Value::Int(0));
                    }
                }
                Ok(Value::Int(1))
            }
            other => panic!("ObjectMethods cannot bootstrap {}", other),
        }
    }

    // ----- the interpreter loop -----

    fn execute(&mut self, cf: &Rc<ClassFile>, code: &CodeAttribute, mut locals: Vec<Value>) -> Exec<Value> {
        let bytes = &code.code;
        let pool = &cf.constant_pool;
        let mut stack: Vec<Value> = Vec::new();
        let mut pc: usize = 0;

        macro_rules! pop {
            () => {
                stack.pop().expect("operand stack underflow")
            };
        }
        let u1 = |at: usize| bytes[at];
        let u2 = |at: usize| u16::from_be_bytes([bytes[at], bytes[at + 1]]);
        let i2 = |at: usize| i16::from_be_bytes([bytes[at], bytes[at + 1]]);
        let i4 = |at: usize| i32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        loop {
            self.fuel = self.fuel.checked_sub(1).expect("instruction budget exhausted");
            let op = bytes[pc];
            let start = pc;
            let mut next = pc + 1;
            let outcome: Exec<Option<Value>> = (|| -> Exec<Option<Value>> {
                match op {
                    NOP => {}
                    ACONST_NULL => stack.push(Value::Null),
                    0x02..=0x08 => stack.push(Value::Int(i32::from(op) - 3)),
                    0x09 | 0x0a => stack.push(Value::Long(i64::from(op - LCONST_0))),
                    0x0b..=0x0d => stack.push(Value::Float(f32::from(op - FCONST_0))),
                    0x0e | 0x0f => stack.push(Value::Double(f64::from(op - DCONST_0))),
                    BIPUSH => {
                        stack.push(Value::Int(i32::from(u1(pc + 1) as i8)));
                        next = pc + 2;
                    }
                    SIPUSH => {
                        stack.push(Value::Int(i32::from(i2(pc + 1))));
                        next = pc + 3;
                    }
                    LDC | LDC_W | LDC2_W => {
                        let index = if op == LDC { u16::from(u1(pc + 1)) } else { u2(pc + 1) };
                        next = if op == LDC { pc + 2 } else { pc + 3 };
                        let value = match pool.get(index) {
                            Some(Constant::Integer(v)) => Value::Int(*v),
                            Some(Constant::Float(v)) => Value::Float(*v),
                            Some(Constant::Long(v)) => Value::Long(*v),
                            Some(Constant::Double(v)) => Value::Double(*v),
                            Some(Constant::String(s)) => {
                                let s = pool.utf8(*s).unwrap().to_string();
                                self.intern(&s)
                            }
                            Some(Constant::Class(_)) => {
                                let name = pool.class_name(index).unwrap().to_string();
                                Value::Ref(self.new_ref("java/lang/Class", ObjectKind::Class(name)))
                            }
                            other => panic!("ldc {:?}", other),
                        };
                        stack.push(value);
                    }
                    ILOAD..=ALOAD => {
                        stack.push(locals[usize::from(u1(pc + 1))].clone());
                        next = pc + 2;
                    }
                    0x1a..=0x2d => stack.push(locals[usize::from((op - ILOAD_0) % 4)].clone()),
                    IALOAD..=SALOAD => {
                        let index = pop!().int();
                        let array = pop!();
                        let value = self.array_get(&array, index)?;
                        stack.push(value);
                    }
                    ISTORE..=ASTORE => {
                        locals[usize::from(u1(pc + 1))] = pop!();
                        next = pc + 2;
                    }
                    0x3b..=0x4e => locals[usize::from((op - ISTORE_0) % 4)] = pop!(),
                    IASTORE..=SASTORE => {
                        let mut value = pop!();
                        let index = pop!().int();
                        let array = pop!();
                        value = match (op, value) {
                            (BASTORE, Value::Int(v)) if !matches!(array_class(&array).as_str(), "[Z") => Value::Int(i32::from(v as i8)),
                            (CASTORE, Value::Int(v)) => Value::Int(v & 0xffff),
                            (SASTORE, Value::Int(v)) => Value::Int(i32::from(v as i16)),
                            (_, v) => v,
                        };
                        self.array_set(&array, index, value)?;
                    }
                    POP => {
                        pop!();
                    }
                    POP2 => {
                        if !pop!().is_wide() {
                            pop!();
                        }
                    }
                    DUP => {
                        let v = stack.last().cloned().expect("dup");
                        stack.push(v);
                    }
                    DUP_X1 => {
                        let a = pop!();
                        let b = pop!();
                        stack.extend([a.clone(), b, a]);
                    }
                    DUP_X2 => {
                        let a = pop!();
                        let b = pop!();
                        if b.is_wide() {
                            stack.extend([a.clone(), b, a]);
                        } else {
                            let c = pop!();
                            stack.extend([a.clone(), c, b, a]);
                        }
                    }
                    DUP2 => {
                        let a = pop!();
                        if a.is_wide() {
                            stack.extend([a.clone(), a]);
                        } else {
                            let b = pop!();
                            stack.extend([b.clone(), a.clone(), b, a]);
                        }
                    }
                    DUP2_X1 => {
                        let a = pop!();
                        if a.is_wide() {
                            let b = pop!();
                            stack.extend([a.clone(), b, a]);
                        } else {
                            let b = pop!();
                            let c = pop!();
                            stack.extend([b.clone(), a.clone(), c, b, a]);
                        }
                    }
                    DUP2_X2 => {
                        let a = pop!();
                        let b = pop!();
                        match (a.is_wide(), b.is_wide()) {
                            (true, true) => stack.extend([a.clone(), b, a]),
                            (true, false) => {
                                let c = pop!();
                                stack.extend([a.clone(), c, b, a]);
                            }
                            (false, _) => {
                                let c = pop!();
                                if c.is_wide() {
                                    stack.extend([b.clone(), a.clone(), c, b, a]);
                                } else {
                                    let d = pop!();
                                    stack.extend([b.clone(), a.clone(), d, c, b, a]);
                                }
                            }
                        }
                    }
                    SWAP => {
                        let a = pop!();
                        let b = pop!();
                        stack.extend([a, b]);
                    }
                    0x60..=0x73 => {
                        let b = pop!();
                        let a = pop!();
                        let kind = (op - IADD) / 4;
                        let value = match (kind, a, b) {
                            (0, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(b)),
                            (0, Value::Long(a), Value::Long(b)) => Value::Long(a.wrapping_add(b)),
                            (0, Value::Float(a), Value::Float(b)) => Value::Float(a + b),
                            (0, Value::Double(a), Value::Double(b)) => Value::Double(a + b),
                            (1, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_sub(b)),
                            (1, Value::Long(a), Value::Long(b)) => Value::Long(a.wrapping_sub(b)),
                            (1, Value::Float(a), Value::Float(b)) => Value::Float(a - b),
                            (1, Value::Double(a), Value::Double(b)) => Value::Double(a - b),
                            (2, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_mul(b)),
                            (2, Value::Long(a), Value::Long(b)) => Value::Long(a.wrapping_mul(b)),
                            (2, Value::Float(a), Value::Float(b)) => Value::Float(a * b),
                            (2, Value::Double(a), Value::Double(b)) => Value::Double(a * b),
                            (3 | 4, Value::Int(_), Value::Int(0)) | (3 | 4, Value::Long(_), Value::Long(0)) => {
                                return Err(self.throw_new("java/lang/ArithmeticException", Some("/ by zero")));
                            }
                            (3, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_div(b)),
                            (3, Value::Long(a), Value::Long(b)) => Value::Long(a.wrapping_div(b)),
                            (3, Value::Float(a), Value::Float(b)) => Value::Float(a / b),
                            (3, Value::Double(a), Value::Double(b)) => Value::Double(a / b),
                            (4, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_rem(b)),
                            (4, Value::Long(a), Value::Long(b)) => Value::Long(a.wrapping_rem(b)),
                            (4, Value::Float(a), Value::Float(b)) => Value::Float(a % b),
                            (4, Value::Double(a), Value::Double(b)) => Value::Double(a % b),
                            other => panic!("arithmetic {:#x} on {:?}", op, other),
                        };
                        stack.push(value);
                    }
                    0x74..=0x77 => {
                        let value = match pop!() {
                            Value::Int(a) => Value::Int(a.wrapping_neg()),
                            Value::Long(a) => Value::Long(a.wrapping_neg()),
                            Value::Float(a) => Value::Float(-a),
                            Value::Double(a) => Value::Double(-a),
                            other => panic!("neg {:?}", other),
                        };
                        stack.push(value);
                    }
                    ISHL..=LXOR => {
                        let b = pop!();
                        let a = pop!();
                        let value = match (op, a, b) {
                            (ISHL, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_shl(b as u32 & 31)),
                            (ISHR, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_shr(b as u32 & 31)),
                            (IUSHR, Value::Int(a), Value::Int(b)) => Value::Int(((a as u32) >> (b as u32 & 31)) as i32),
                            (LSHL, Value::Long(a), Value::Int(b)) => Value::Long(a.wrapping_shl(b as u32 & 63)),
                            (LSHR, Value::Long(a), Value::Int(b)) => Value::Long(a.wrapping_shr(b as u32 & 63)),
                            (LUSHR, Value::Long(a), Value::Int(b)) => Value::Long(((a as u64) >> (b as u32 & 63)) as i64),
                            (IAND, Value::Int(a), Value::Int(b)) => Value::Int(a & b),
                            (IOR, Value::Int(a), Value::Int(b)) => Value::Int(a | b),
                            (IXOR, Value::Int(a), Value::Int(b)) => Value::Int(a ^ b),
                            (LAND, Value::Long(a), Value::Long(b)) => Value::Long(a & b),
                            (LOR, Value::Long(a), Value::Long(b)) => Value::Long(a | b),
                            (LXOR, Value::Long(a), Value::Long(b)) => Value::Long(a ^ b),
                            other => panic!("bitwise {:#x} on {:?}", op, other),
                        };
                        stack.push(value);
                    }
                    IINC => {
                        let slot = usize::from(u1(pc + 1));
                        let delta = i32::from(u1(pc + 2) as i8);
                        locals[slot] = Value::Int(locals[slot].int().wrapping_add(delta));
                        next = pc + 3;
                    }
                    I2L..=I2S => {
                        let v = pop!();
                        let converted = match (op, v) {
                            (I2L, Value::Int(a)) => Value::Long(i64::from(a)),
                            (I2F, Value::Int(a)) => Value::Float(a as f32),
                            (I2D, Value::Int(a)) => Value::Double(f64::from(a)),
                            (L2I, Value::Long(a)) => Value::Int(a as i32),
                            (L2F, Value::Long(a)) => Value::Float(a as f32),
                            (L2D, Value::Long(a)) => Value::Double(a as f64),
                            (F2I, Value::Float(a)) => Value::Int(a as i32),
                            (F2L, Value::Float(a)) => Value::Long(a as i64),
                            (F2D, Value::Float(a)) => Value::Double(f64::from(a)),
                            (D2I, Value::Double(a)) => Value::Int(a as i32),
                            (D2L, Value::Double(a)) => Value::Long(a as i64),
                            (D2F, Value::Double(a)) => Value::Float(a as f32),
                            (I2B, Value::Int(a)) => Value::Int(i32::from(a as i8)),
                            (I2C, Value::Int(a)) => Value::Int(a & 0xffff),
                            (I2S, Value::Int(a)) => Value::Int(i32::from(a as i16)),
                            other => panic!("conversion {:#x} on {:?}", op, other),
                        };
                        stack.push(converted);
                    }
                    LCMP => {
                        let b = pop!().long();
                        let a = pop!().long();
                        stack.push(Value::Int(a.cmp(&b) as i32));
                    }
                    FCMPL | FCMPG | DCMPL | DCMPG => {
                        let b = pop!();
                        let a = pop!();
                        let (a, b) = match (a, b) {
                            (Value::Float(a), Value::Float(b)) => (f64::from(a), f64::from(b)),
                            (Value::Double(a), Value::Double(b)) => (a, b),
                            other => panic!("compare {:?}", other),
                        };
                        let result = match a.partial_cmp(&b) {
                            Some(o) => o as i32,
                            None if op == FCMPG || op == DCMPG => 1,
                            None => -1,
                        };
                        stack.push(Value::Int(result));
                    }
                    IFEQ..=IFLE => {
                        let v = pop!().int();
                        let taken = match op {
                            IFEQ => v == 0,
                            IFNE => v != 0,
                            IFLT => v < 0,
                            IFGE => v >= 0,
                            IFGT => v > 0,
                            _ => v <= 0,
                        };
                        next = if taken { offset(pc, i32::from(i2(pc + 1))) } else { pc + 3 };
                    }
                    IF_ICMPEQ..=IF_ICMPLE => {
                        let b = pop!().int();
                        let a = pop!().int();
                        let taken = match op {
                            IF_ICMPEQ => a == b,
                            IF_ICMPNE => a != b,
                            IF_ICMPLT => a < b,
                            IF_ICMPGE => a >= b,
                            IF_ICMPGT => a > b,
                            _ => a <= b,
                        };
                        next = if taken { offset(pc, i32::from(i2(pc + 1))) } else { pc + 3 };
                    }
                    IF_ACMPEQ | IF_ACMPNE => {
                        let b = pop!();
                        let a = pop!();
                        let same = match (&a, &b) {
                            (Value::Null, Value::Null) => true,
                            (Value::Ref(x), Value::Ref(y)) => Rc::ptr_eq(x, y),
                            _ => false,
                        };
                        let taken = same == (op == IF_ACMPEQ);
                        next = if taken { offset(pc, i32::from(i2(pc + 1))) } else { pc + 3 };
                    }
                    IFNULL | IFNONNULL => {
                        let is_null = matches!(pop!(), Value::Null);
                        let taken = is_null == (op == IFNULL);
                        next = if taken { offset(pc, i32::from(i2(pc + 1))) } else { pc + 3 };
                    }
                    GOTO => next = offset(pc, i32::from(i2(pc + 1))),
                    TABLESWITCH => {
                        let base = (pc + 4) & !3;
                        let default = i4(base);
                        let low = i4(base + 4);
                        let high = i4(base + 8);
                        let key = pop!().int();
                        next = if key < low || key > high {
                            offset(pc, default)
                        } else {
                            offset(pc, i4(base + 12 + 4 * (key - low) as usize))
                        };
                    }
                    LOOKUPSWITCH => {
                        let base = (pc + 4) & !3;
                        let default = i4(base);
                        let pairs = i4(base + 4) as usize;
                        let key = pop!().int();
                        next = offset(pc, default);
                        for i in 0..pairs {
                            if i4(base + 8 + 8 * i) == key {
                                next = offset(pc, i4(base + 12 + 8 * i));
                                break;
                            }
                        }
                    }
                    IRETURN..=ARETURN => return Ok(Some(pop!())),
                    RETURN => return Ok(Some(Value::Void)),
                    GETSTATIC | PUTSTATIC => {
                        let (class, name, _) = pool.member_ref(u2(pc + 1)).unwrap();
                        let (class, name) = (class.to_string(), name.to_string());
                        self.ensure_init(&class)?;
                        let owner = self.static_owner(&class, &name);
                        if op == GETSTATIC {
                            let v = self.static_value(&owner, &name);
                            stack.push(v);
                        } else {
                            let v = pop!();
                            self.statics.insert((owner, name), v);
                        }
                        next = pc + 3;
                    }
                    GETFIELD => {
                        let (_, name, _) = pool.member_ref(u2(pc + 1)).unwrap();
                        let target = pop!();
                        let Some(r) = target.reference() else {
                            return Err(self.throw_new("java/lang/NullPointerException", None));
                        };
                        let v = match &r.borrow().kind {
                            ObjectKind::Fields(m) => m.get(name).cloned().unwrap_or_else(|| panic!("no field {}", name)),
                            other => panic!("getfield on {:?}", other),
                        };
                        stack.push(v);
                        next = pc + 3;
                    }
                    PUTFIELD => {
                        let (_, name, _) = pool.member_ref(u2(pc + 1)).unwrap();
                        let value = pop!();
                        let target = pop!();
                        let Some(r) = target.reference() else {
                            return Err(self.throw_new("java/lang/NullPointerException", None));
                        };
                        if let ObjectKind::Fields(m) = &mut r.borrow_mut().kind {
                            m.insert(name.to_string(), value);
                        }
                        next = pc + 3;
                    }
                    INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC | INVOKEINTERFACE => {
                        let (owner, name, desc) = pool.member_ref(u2(pc + 1)).unwrap();
                        let (owner, name, desc) = (owner.to_string(), name.to_string(), desc.to_string());
                        let (params, ret) = parse_method_descriptor(&desc).unwrap();
                        let count = params.len() + usize::from(op != INVOKESTATIC);
                        let args = stack.split_off(stack.len() - count);
                        let result = match op {
                            INVOKESTATIC => self.invoke_static(&owner, &name, &desc, args)?,
                            INVOKESPECIAL => self.invoke_special(&owner, &name, &desc, args)?,
                            _ => self.invoke_virtual(&name, &desc, args)?,
                        };
                        if ret != JType::Void {
                            stack.push(result);
                        }
                        next = if op == INVOKEINTERFACE { pc + 5 } else { pc + 3 };
                    }
                    INVOKEDYNAMIC => {
                        let index = u2(pc + 1);
                        let (_, desc) = match pool.get(index) {
                            Some(Constant::InvokeDynamic(_, nat)) => pool.name_and_type(*nat).unwrap(),
                            other => panic!("invokedynamic {:?}", other),
                        };
                        let (params, _) = parse_method_descriptor(desc).unwrap();
                        let args = stack.split_off(stack.len() - params.len());
                        let result = match self.lambda_object(cf, index, &args) {
                            Some(lambda) => lambda,
                            None => self.object_method(cf, index, args)?,
                        };
                        stack.push(result);
                        next = pc + 5;
                    }
                    NEW => {
                        let class = pool.class_name(u2(pc + 1)).unwrap().to_string();
                        self.ensure_init(&class)?;
                        let obj = if self.classes.contains_key(&class) {
                            self.allocate(&class)
                        } else {
                            Value::Ref(self.new_ref(&class, ObjectKind::Fields(HashMap::new())))
                        };
                        stack.push(obj);
                        next = pc + 3;
                    }
                    NEWARRAY => {
                        let len = pop!().int();
                        if len < 0 {
                            return Err(self.throw_new("java/lang/NegativeArraySizeException", None));
                        }
                        let (class, zero) = match u1(pc + 1) {
                            array_types::T_BOOLEAN => ("[Z", Value::Int(0)),
                            array_types::T_CHAR => ("[C", Value::Int(0)),
                            array_types::T_FLOAT => ("[F", Value::Float(0.0)),
                            array_types::T_DOUBLE => ("[D", Value::Double(0.0)),
                            array_types::T_BYTE => ("[B", Value::Int(0)),
                            array_types::T_SHORT => ("[S", Value::Int(0)),
                            array_types::T_INT => ("[I", Value::Int(0)),
                            _ => ("[J", Value::Long(0)),
                        };
                        let array = self.new_ref(class, ObjectKind::Array(vec![zero; len as usize]));
                        stack.push(Value::Ref(array));
                        next = pc + 2;
                    }
                    ANEWARRAY => {
                        let elem = pool.class_name(u2(pc + 1)).unwrap();
                        let class = if elem.starts_with('[') { format!("[{}", elem) } else { format!("[L{};", elem) };
                        let len = pop!().int();
                        if len < 0 {
                            return Err(self.throw_new("java/lang/NegativeArraySizeException", None));
                        }
                        let array = self.new_ref(&class, ObjectKind::Array(vec![Value::Null; len as usize]));
                        stack.push(Value::Ref(array));
                        next = pc + 3;
                    }
                    MULTIANEWARRAY => {
                        let class = pool.class_name(u2(pc + 1)).unwrap().to_string();
                        let dims = usize::from(u1(pc + 3));
                        let counts: Vec<i32> = stack.split_off(stack.len() - dims).iter().map(Value::int).collect();
                        let array = self.multi_array(&class, &counts);
                        stack.push(array);
                        next = pc + 4;
                    }
                    ARRAYLENGTH => {
                        let array = pop!();
                        let Some(r) = array.reference() else {
                            return Err(self.throw_new("java/lang/NullPointerException", None));
                        };
                        let len = match &r.borrow().kind {
                            ObjectKind::Array(d) => d.len() as i32,
                            other => panic!("arraylength on {:?}", other),
                        };
                        stack.push(Value::Int(len));
                    }
                    ATHROW => {
                        let v = pop!();
                        return Err(match v {
                            Value::Ref(r) => Thrown(r),
                            _ => self.throw_new("java/lang/NullPointerException", None),
                        });
                    }
                    CHECKCAST | INSTANCEOF => {
                        let class = pool.class_name(u2(pc + 1)).unwrap().to_string();
                        let v = pop!();
                        let ok = match &v {
                            Value::Ref(r) => self.instance_of(r, &class),
                            _ => op == CHECKCAST,
                        };
                        if op == CHECKCAST {
                            if !ok {
                                return Err(self.throw_new("java/lang/ClassCastException", Some(&class)));
                            }
                            stack.push(v);
                        } else {
                            stack.push(Value::Int(i32::from(ok)));
                        }
                        next = pc + 3;
                    }
                    MONITORENTER | MONITOREXIT => {
                        if matches!(pop!(), Value::Null) {
                            return Err(self.throw_new("java/lang/NullPointerException", None));
                        }
                    }
                    WIDE => {
                        let inner = u1(pc + 1);
                        let slot = usize::from(u2(pc + 2));
                        match inner {
                            ILOAD..=ALOAD => stack.push(locals[slot].clone()),
                            ISTORE..=ASTORE => locals[slot] = pop!(),
                            IINC => {
                                let delta = i32::from(i2(pc + 4));
                                locals[slot] = Value::Int(locals[slot].int().wrapping_add(delta));
                            }
                            other => panic!("wide {:#x}", other),
                        }
                        next = if inner == IINC { pc + 6 } else { pc + 4 };
                    }
                    other => panic!("unsupported opcode {:#x} at {}", other, pc),
                }
                Ok(None)
            })();

            match outcome {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => pc = next,
                Err(thrown) => {
                    let class = thrown.class();
                    let handler = code.exception_table.iter().find(|e| {
                        usize::from(e.start_pc) <= start
                            && start < usize::from(e.end_pc)
                            && (e.catch_type == 0 || self.is_subclass(&class, pool.class_name(e.catch_type).unwrap()))
                    });
                    match handler {
                        Some(h) => {
                            stack.clear();
                            stack.push(Value::Ref(thrown.0));
                            pc = usize::from(h.handler_pc);
                        }
                        None => return Err(thrown),
                    }
                }
            }
        }
    }

    fn array_get(&mut self, array: &Value, index: i32) -> Exec<Value> {
        let Some(r) = array.reference() else {
            return Err(self.throw_new("java/lang/NullPointerException", None));
        };
        let value = match &r.borrow().kind {
            ObjectKind::Array(d) => d.get(index as usize).filter(|_| index >= 0).cloned(),
            other => panic!("array load on {:?}", other),
        };
        match value {
            Some(v) => Ok(v),
            None => Err(self.throw_new("java/lang/ArrayIndexOutOfBoundsException", None)),
        }
    }

    fn array_set(&mut self, array: &Value, index: i32, value: Value) -> Exec<()> {
        let Some(r) = array.reference() else {
            return Err(self.throw_new("java/lang/NullPointerException", None));
        };
        let stored = match &mut r.borrow_mut().kind {
            ObjectKind::Array(d) if index >= 0 && (index as usize) < d.len() => {
                d[index as usize] = value;
                true
            }
            ObjectKind::Array(_) => false,
            other => panic!("array store on {:?}", other),
        };
        if stored {
            Ok(())
        } else {
            Err(self.throw_new("java/lang/ArrayIndexOutOfBoundsException", None))
        }
    }

    fn multi_array(&mut self, class: &str, counts: &[i32]) -> Value {
        let elem = &class[1..];
        let data = match counts.split_first() {
            Some((n, rest)) if !rest.is_empty() => (0..*n).map(|_| self.multi_array(elem, rest)).collect(),
            Some((n, _)) => vec![Value::default_for(elem); *n as usize],
            None => Vec::new(),
        };
        Value::Ref(self.new_ref(class, ObjectKind::Array(data)))
    }
}

fn offset(pc: usize, delta: i32) -> usize {
    (pc as i64 + i64::from(delta)) as usize
}

fn is_box(class: &str) -> bool {
    matches!(
        class,
        "java/lang/Integer"
            | "java/lang/Long"
            | "java/lang/Short"
            | "java/lang/Byte"
            | "java/lang/Character"
            | "java/lang/Boolean"
            | "java/lang/Float"
            | "java/lang/Double"
    )
}

fn convert_primitive(v: Value, to: &JType) -> Value {
    match (v, to) {
        (Value::Int(i), JType::Long) => Value::Long(i64::from(i)),
        (Value::Int(i), JType::Float) => Value::Float(i as f32),
        (Value::Int(i), JType::Double) => Value::Double(f64::from(i)),
        (Value::Long(l), JType::Int) => Value::Int(l as i32),
        (Value::Long(l), JType::Double) => Value::Double(l as f64),
        (Value::Double(d), JType::Int) => Value::Int(d as i32),
        (Value::Float(f), JType::Double) => Value::Double(f64::from(f)),
        (v, _) => v,
    }
}

fn array_class(v: &Value) -> String {
    v.reference().map(|r| r.borrow().class.clone()).unwrap_or_default()
}

fn array_assignable(class: &str, target: &str, jvm: &Jvm) -> bool {
    match (class.strip_prefix('['), target.strip_prefix('[')) {
        (Some(c), Some(t)) => {
            if c == t {
                return true;
            }
            match (c.strip_prefix('L').and_then(|c| c.strip_suffix(';')), t.strip_prefix('L').and_then(|t| t.strip_suffix(';'))) {
                (Some(c), Some(t)) => jvm.is_subclass(c, t),
                _ => false,
            }
        }
        _ => false,
    }
}

/// Java's `Double.toString` for the values tests produce.
fn format_float(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if d == d.trunc() && d.abs() < 1e7 {
        format!("{:.1}", d)
    } else {
        format!("{}", d)
    }
}
