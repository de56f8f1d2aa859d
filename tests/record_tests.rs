mod common;

use common::*;
use recswitch::codegen::attribute::AttributeInfo;
use recswitch::codegen::defs::access_flags::*;

#[test]
fn compact_constructor_assigns_after_body() {
    let src = r#"
record X(int i) {
    X {
        i = i / 2;
    }
}
class Main {
    static int run() { return new X(10).i(); }
}
"#;
    assert_eq!(run_int(src, "Main", "run"), 5);
}

#[test]
fn record_point_has_two_int_components() {
    let out = compile_ok("record Point(int x, int y){}");
    let point = &out.class("Point").expect("Point").class_file;
    let pool = &point.constant_pool;
    match point.attribute("Record") {
        Some(AttributeInfo::Record(components)) => {
            let shape: Vec<(&str, &str)> = components
                .iter()
                .map(|c| (pool.utf8(c.name_index).unwrap(), pool.utf8(c.descriptor_index).unwrap()))
                .collect();
            assert_eq!(shape, vec![("x", "I"), ("y", "I")]);
        }
        other => panic!("no Record attribute: {other:?}"),
    }
    assert_eq!(point.access_flags & (ACC_FINAL | ACC_SUPER), ACC_FINAL | ACC_SUPER);
    assert!(point.field("x").is_some() && point.field("y").is_some());
    assert!(point.method("x", "()I").is_some());
    assert!(point.method("<init>", "(II)V").is_some());
}

#[test]
fn zero_component_record_extends_record() {
    let out = compile_ok("record Empty() {}");
    let empty = &out.class("Empty").unwrap().class_file;
    assert_eq!(empty.super_name(), Some("java/lang/Record"));
    match empty.attribute("Record") {
        Some(AttributeInfo::Record(components)) => assert!(components.is_empty()),
        other => panic!("no Record attribute: {other:?}"),
    }
    assert!(empty.method("<init>", "()V").is_some());
}

#[test]
fn object_methods_follow_components() {
    let src = r#"
record Pair(String name, int count) {}
class Main {
    static String show() { return new Pair("a", 3).toString(); }
    static int same() {
        Pair p = new Pair("k", 7);
        Pair q = new Pair("k", 7);
        Pair r = new Pair("k", 8);
        int n = 0;
        if (p.equals(q)) n = n + 1;
        if (!p.equals(r)) n = n + 10;
        if (p.hashCode() == q.hashCode()) n = n + 100;
        if (!p.equals(null)) n = n + 1000;
        return n;
    }
}
"#;
    assert_eq!(run_string(src, "Main", "show").as_deref(), Some("Pair[name=a, count=3]"));
    assert_eq!(run_int(src, "Main", "same"), 1111);
}

#[test]
fn empty_record_renders_brackets() {
    let src = r#"
record Unit() {}
class Main {
    static String show() { return new Unit().toString(); }
    static int hash() { return new Unit().hashCode(); }
}
"#;
    assert_eq!(run_string(src, "Main", "show").as_deref(), Some("Unit[]"));
    assert_eq!(run_int(src, "Main", "hash"), 0);
}

#[test]
fn varargs_component_prints_as_array() {
    let src = r#"
record Bag(int... items) {}
class Main {
    static String show() { return new Bag(1, 2, 3).toString(); }
    static int second() { return new Bag(4, 5).items()[1]; }
}
"#;
    let shown = run_string(src, "Main", "show").unwrap();
    assert!(shown.starts_with("Bag[items=[I@"), "{shown}");
    assert_eq!(run_int(src, "Main", "second"), 5);
}

#[test]
fn explicit_members_replace_generated_ones() {
    let src = r#"
record Temp(int degrees) {
    public int degrees() { return degrees + 1; }
    public String toString() { return "T" + degrees; }
}
class Main {
    static int read() { return new Temp(20).degrees(); }
    static String show() { return new Temp(7).toString(); }
}
"#;
    assert_eq!(run_int(src, "Main", "read"), 21);
    assert_eq!(run_string(src, "Main", "show").as_deref(), Some("T7"));
    let out = compile_ok(src);
    let temp = &out.class("Temp").unwrap().class_file;
    // equals and hashCode still come from the bootstrap
    assert!(temp.method("equals", "(Ljava/lang/Object;)Z").is_some());
    assert!(temp.method("hashCode", "()I").is_some());
}

#[test]
fn non_canonical_constructor_delegates() {
    let src = r#"
record Range(int lo, int hi) {
    Range(int single) { this(single, single + 1); }
    int width() { return hi - lo; }
}
class Main {
    static int run() { return new Range(4).width() * 10 + new Range(2, 9).width(); }
}
"#;
    assert_eq!(run_int(src, "Main", "run"), 17);
}

#[test]
fn nested_record_mirrors_visibility() {
    let out = compile_ok("class Outer { private record Inner(long v) {} }");
    let inner = &out.class("Outer$Inner").expect("nested record").class_file;
    let ctor = inner.method("<init>", "(J)V").expect("canonical constructor");
    assert_eq!(ctor.access_flags & ACC_PRIVATE, ACC_PRIVATE);
    assert!(inner.attribute("NestHost").is_some());
    assert!(ctor.attribute("MethodParameters").is_some());
}

fn canonical_parameter_flags(src: &str, desc: &str) -> Option<Vec<u16>> {
    let out = compile_ok(src);
    let r = &out.class("R").expect("record").class_file;
    let ctor = r.method("<init>", desc).expect("canonical constructor");
    match ctor.attribute("MethodParameters") {
        Some(AttributeInfo::MethodParameters(params)) => Some(params.iter().map(|p| p.access_flags).collect()),
        Some(other) => panic!("unexpected {other:?}"),
        None => None,
    }
}

#[test]
fn language_supplied_parameters_are_mandated() {
    let implicit = canonical_parameter_flags("record R(int a, String b) {}", "(ILjava/lang/String;)V").unwrap();
    assert_eq!(implicit, vec![ACC_MANDATED, ACC_MANDATED]);

    let compact = canonical_parameter_flags("record R(int a, long b) { R { a = a + 1; } }", "(IJ)V").unwrap();
    assert_eq!(compact, vec![ACC_MANDATED, ACC_MANDATED]);

    let explicit = canonical_parameter_flags("record R(int a) { R(int a) { this.a = a; } }", "(I)V");
    assert!(explicit.unwrap_or_default().iter().all(|f| f & ACC_MANDATED == 0));
}

#[test]
fn static_members_are_allowed() {
    let src = r#"
record Counter(int start) {
    static int base = 40;
    static int next(Counter c) { return base + c.start(); }
}
class Main {
    static int run() { return Counter.next(new Counter(2)); }
}
"#;
    assert_eq!(run_int(src, "Main", "run"), 42);
}

#[test]
fn illegal_component_name_is_rejected() {
    assert_eq!(
        error_messages("record X(int myInt, int finalize){}"),
        vec!["Illegal component name finalize in record X".to_string()]
    );
}

#[test]
fn duplicate_components_and_instance_fields() {
    let msgs = error_messages("record R(int a, int a) {}");
    assert_eq!(msgs.iter().filter(|m| *m == "Duplicate component a in record").count(), 2);
    assert_eq!(msgs.iter().filter(|m| *m == "Duplicate parameter a").count(), 2);

    err_contains("record R(int a) { int extra; }", "User declared non-static fields extra are not permitted in a record");
    err_contains("record R(int a) { { } }", "Instance Initializer is not allowed in a record declaration");
    err_contains("class C extends R {} record R(int a) {}", "The type C cannot subclass the final class R");
}

#[test]
fn canonical_constructor_rules() {
    err_contains("record R(int a) { R { return; } }", "The body of a compact constructor must not contain a return statement");
    err_contains("record R(int a) { R { this.a = a; } }", "Illegal explicit assignment of a final field a in compact constructor");
    err_contains(
        "record R(int a) { R(int b) { this.a = b; } }",
        "Illegal parameter name b in canonical constructor, expected a, the corresponding component name",
    );
    err_contains("record R(int a) { R(int a) throws Exception { this.a = a; } }", "Throws clause not allowed for canonical constructor");
    // a normal canonical constructor may return once every field is assigned
    ok("record R(int a) { R(int a) { this.a = a; return; } }");
    err_contains("record R(int a) { R(int a) { return; } }", "The blank final field a may not have been initialized");
}

#[test]
fn safe_varargs_warning_moves_to_explicit_constructor() {
    let implicit = recswitch::check("record R<T>(T... items) {\n}");
    assert_eq!(implicit.len(), 1);
    assert!(!implicit[0].is_error());
    assert_eq!(implicit[0].span.start.line, 1);

    let explicit = recswitch::check("record R<T>(T... items) {\n    R {\n    }\n}");
    assert_eq!(explicit.len(), 1);
    assert_eq!(explicit[0].message(), "Type safety: Potential heap pollution via varargs parameter items");
    assert_eq!(explicit[0].span.start.line, 2);

    assert!(recswitch::check("record R<T>(T... items) {\n    @SafeVarargs R {\n    }\n}").is_empty());
}
