mod common;

use recswitch::codegen::attribute::AttributeInfo;
use recswitch::codegen::defs::major_versions::*;
use recswitch::codegen::{ClassFile, Constant};
use recswitch::{compile, Config};

fn classes_of(src: &str, config: &Config) -> Vec<recswitch::GeneratedClass> {
    common::init_logger();
    let out = compile(src, config).unwrap();
    assert!(!out.has_errors(), "{:?}", out.diagnostics);
    out.classes
}

fn class_constants(cf: &ClassFile) -> Vec<String> {
    cf.constant_pool
        .iter()
        .filter_map(|(i, c)| match c {
            Constant::Class(_) => cf.constant_pool.class_name(i).ok().map(str::to_string),
            _ => None,
        })
        .collect()
}

const EXHAUSTIVE: &str = "enum E { A, B } class T { int m(E e) { return switch (e) { case A -> 1; case B -> 2; }; } }";

#[test]
fn exhaustive_enum_switch_failure_depends_on_target() {
    let old = classes_of(EXHAUSTIVE, &Config::default());
    let t = &old.iter().find(|c| c.name == "T").unwrap().class_file;
    assert_eq!(t.major_version, JAVA_17);
    assert!(class_constants(t).contains(&"java/lang/IncompatibleClassChangeError".to_string()));

    let new = classes_of(EXHAUSTIVE, &Config::default().with_target(JAVA_21));
    let t = &new.iter().find(|c| c.name == "T").unwrap().class_file;
    assert!(class_constants(t).contains(&"java/lang/MatchException".to_string()));
}

#[test]
fn switch_methods_carry_stack_maps() {
    let classes = classes_of(
        "class T { String m(String s) { return switch (s) { case \"a\" -> \"x\"; default -> \"y\"; }; } }",
        &Config::default(),
    );
    let t = &classes[0].class_file;
    let code = t.method("m", "(Ljava/lang/String;)Ljava/lang/String;").unwrap().code().unwrap();
    assert!(code.max_stack >= 2);
    assert!(code.attributes.iter().any(|a| matches!(a.info, AttributeInfo::StackMapTable(_))));

    let frameless = classes_of(
        "class T { int m(int i) { return switch (i) { case 1 -> 2; default -> 3; }; } }",
        &Config { emit_frames: false, ..Config::default() },
    );
    let code = frameless[0].class_file.method("m", "(I)I").unwrap().code().unwrap();
    assert!(code.attributes.iter().all(|a| !matches!(a.info, AttributeInfo::StackMapTable(_))));
}

#[test]
fn record_object_methods_share_one_bootstrap() {
    let classes = classes_of("record P(int a, String b) {}", &Config::default());
    let p = &classes[0].class_file;
    match p.attribute("BootstrapMethods") {
        Some(AttributeInfo::BootstrapMethods(methods)) => {
            assert_eq!(methods.len(), 1);
            // class, names, one getter handle per component
            assert_eq!(methods[0].arguments.len(), 4);
            match p.constant_pool.get(methods[0].arguments[1]) {
                Some(Constant::String(s)) => assert_eq!(p.constant_pool.utf8(*s).unwrap(), "a;b"),
                other => panic!("names argument {other:?}"),
            }
        }
        other => panic!("no BootstrapMethods: {other:?}"),
    }
    for (name, desc) in [
        ("toString", "()Ljava/lang/String;"),
        ("hashCode", "()I"),
        ("equals", "(Ljava/lang/Object;)Z"),
    ] {
        assert!(p.method(name, desc).is_some(), "{name}");
    }
}

#[test]
fn generated_bytes_match_the_structures() {
    let classes = classes_of("record P(int a) {} class Q { int m(P p) { return p.a(); } }", &Config::default());
    for class in &classes {
        assert_eq!(&class.bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        let major = u16::from_be_bytes([class.bytes[6], class.bytes[7]]);
        assert_eq!(major, class.class_file.major_version);
        recswitch::verify::verify(&class.class_file).unwrap();
    }
}
