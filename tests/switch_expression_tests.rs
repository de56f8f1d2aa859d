mod common;

use common::*;

#[test]
fn cast_of_switch_expression_converts_each_arm() {
    let src = r#"
class Main {
    static int pick(int i) { return (int) switch (i) { case 1 -> 1.0; default -> 0; }; }
}
"#;
    let mut jvm = load(src);
    assert_eq!(jvm.call_static("Main", "pick", "(I)I", vec![Value::Int(2)]).unwrap().int(), 0);
    assert_eq!(jvm.call_static("Main", "pick", "(I)I", vec![Value::Int(1)]).unwrap().int(), 1);
}

#[test]
fn finally_yield_overrides_try_yield() {
    let src = r#"
class Main {
    static int run(int i) {
        int t = switch (i) {
            default -> {
                try {
                    yield 1;
                } finally {
                    yield 3;
                }
            }
        };
        return t;
    }
}
"#;
    let mut jvm = load(src);
    for i in [0, 1, 7] {
        assert_eq!(jvm.call_static("Main", "run", "(I)I", vec![Value::Int(i)]).unwrap().int(), 3);
    }
}

#[test]
fn try_inside_arm_keeps_operands_below_the_switch() {
    let src = r#"
class Main {
    static int parse(int i) {
        return 100 + switch (i) {
            case 0 -> {
                try {
                    yield 10 / i;
                } catch (ArithmeticException e) {
                    yield -1;
                }
            }
            default -> 10 / i;
        };
    }
}
"#;
    let mut jvm = load(src);
    assert_eq!(jvm.call_static("Main", "parse", "(I)I", vec![Value::Int(0)]).unwrap().int(), 99);
    assert_eq!(jvm.call_static("Main", "parse", "(I)I", vec![Value::Int(5)]).unwrap().int(), 102);
}

#[test]
fn string_selector_survives_hash_collisions() {
    let src = r#"
class Main {
    static int code(String s) {
        return switch (s) {
            case "Aa" -> 1;
            case "BB" -> 2;
            case "C", "D" -> 3;
            default -> 0;
        };
    }
}
"#;
    let mut jvm = load(src);
    for (input, expected) in [("Aa", 1), ("BB", 2), ("C", 3), ("D", 3), ("E", 0)] {
        let s = jvm.string(input);
        assert_eq!(jvm.call_static("Main", "code", "(Ljava/lang/String;)I", vec![s]).unwrap().int(), expected, "{input}");
    }
}

#[test]
fn enum_selector_goes_through_the_switch_map() {
    let src = r#"
enum Color { RED, GREEN, BLUE }
class Main {
    static int weight(Color c) {
        return switch (c) {
            case RED -> 1;
            case GREEN, BLUE -> 2;
        };
    }
}
"#;
    let out = compile_ok(src);
    assert!(out.class("Main$1").is_some(), "switch map holder");
    let mut jvm = Jvm::new(&out.classes);
    for (name, expected) in [("RED", 1), ("GREEN", 2), ("BLUE", 2)] {
        let c = jvm.enum_constant("Color", name);
        assert_eq!(jvm.call_static("Main", "weight", "(LColor;)I", vec![c]).unwrap().int(), expected);
    }
}

#[test]
fn exhaustive_enum_switch_rejects_null() {
    let src = r#"
enum Side { L, R }
class Main {
    static int flip(Side s) { return switch (s) { case L -> 1; case R -> 0; }; }
}
"#;
    let mut jvm = load(src);
    let thrown = jvm.call_static("Main", "flip", "(LSide;)I", vec![Value::Null]).unwrap_err();
    assert_eq!(thrown.class(), "java/lang/NullPointerException");
}

#[test]
fn yield_binds_to_the_switch_expression_across_statements() {
    let src = r#"
class Main {
    static int run(int i, int j) {
        return switch (i) {
            case 1:
                switch (j) {
                    case 1:
                        yield 11;
                    default:
                        break;
                }
                yield 10;
            default:
                yield 0;
        };
    }
}
"#;
    let mut jvm = load(src);
    let mut call = |i, j| jvm.call_static("Main", "run", "(II)I", vec![Value::Int(i), Value::Int(j)]).unwrap().int();
    assert_eq!(call(1, 1), 11);
    assert_eq!(call(1, 2), 10);
    assert_eq!(call(3, 1), 0);
}

#[test]
fn standalone_results_are_promoted() {
    let src = r#"
class Main {
    static String show(int i) {
        return "" + switch (i) { case 0 -> 1; case 1 -> 2L; default -> 'c'; };
    }
    static long wide(int i) {
        long v = switch (i) { case 0 -> 1; default -> 5000000000L; };
        return v;
    }
}
"#;
    let mut jvm = load(src);
    let shown = jvm.call_static("Main", "show", "(I)Ljava/lang/String;", vec![Value::Int(0)]).unwrap();
    assert_eq!(jvm.as_string(&shown).as_deref(), Some("1"));
    let shown = jvm.call_static("Main", "show", "(I)Ljava/lang/String;", vec![Value::Int(2)]).unwrap();
    assert_eq!(jvm.as_string(&shown).as_deref(), Some("99"));
    assert_eq!(jvm.call_static("Main", "wide", "(I)J", vec![Value::Int(3)]).unwrap().long(), 5_000_000_000);
}

#[test]
fn arguments_take_the_parameter_type() {
    let src = r#"
class Main {
    static int twice(Integer v) { return v * 2; }
    static int run(int i) { return twice(switch (i) { case 0 -> 4; default -> i; }); }
}
"#;
    let mut jvm = load(src);
    assert_eq!(jvm.call_static("Main", "run", "(I)I", vec![Value::Int(0)]).unwrap().int(), 8);
    assert_eq!(jvm.call_static("Main", "run", "(I)I", vec![Value::Int(21)]).unwrap().int(), 42);
}

#[test]
fn constant_selector_still_switches() {
    let src = r#"
class Main {
    static final int K = 2;
    static int run() { return switch (K) { case 1 -> 10; case 2 -> 20; default -> 30; }; }
}
"#;
    assert_eq!(run_int(src, "Main", "run"), 20);
}

#[test]
fn duplicate_enum_labels_in_two_lists() {
    let src = r#"
enum E { A, B, C }
class T {
    void m(E e) {
        switch (e) {
            case A, B:
                break;
            case B, C:
                break;
        }
    }
}
"#;
    let msgs = error_messages(src);
    assert_eq!(msgs, vec!["Duplicate case".to_string(), "Duplicate case".to_string()]);
}

#[test]
fn missing_default_and_type_mismatch() {
    err_contains(
        "class T { int m(int i) { return switch (i) { case 1 -> 1; }; } }",
        "A switch expression should have a default case",
    );
    err_contains(
        "enum E { A, B } class T { int m(E e) { return switch (e) { case B -> 1; }; } }",
        "A Switch expression should cover all possible values",
    );
    err_contains(
        "class T { int m(int i) { return switch (i) { case 1 -> \"x\"; default -> 0; }; } }",
        "Type mismatch: cannot convert from String to int",
    );
}

#[test]
fn enum_statement_only_warns() {
    let src = "enum E { A, B } class T { void m(E e) { switch (e) { case A: break; } } }";
    let all = recswitch::check(src);
    assert!(all.iter().all(|d| !d.is_error()), "{all:?}");
    assert!(all
        .iter()
        .any(|d| d.message() == "The enum constant B needs a corresponding case label in this enum switch on E"));
}

#[test]
fn jumps_out_of_switch_expressions_are_rejected() {
    err_contains(
        "class T { int m(int i) { while (true) { int x = switch (i) { default -> { break; } }; } } }",
        "Breaking out of switch expressions not permitted",
    );
    err_contains(
        "class T { int m(int i) { return switch (i) { default -> { return 1; } }; } }",
        "Return within switch expressions not permitted",
    );
    err_contains("class T { void m() { yield 1; } }", "yield outside of switch expression");
}

#[test]
fn break_with_a_literal_is_a_syntax_error() {
    err_contains(
        "class T { int m(int i) { return switch (i) { default -> { break 1; } }; } }",
        "Syntax error on token \"1\", delete this token",
    );
}

#[test]
fn mixed_case_kinds_and_bad_selectors() {
    err_contains(
        "class T { int m(int i) { return switch (i) { case 1 -> 1; case 2: yield 2; default -> 3; }; } }",
        "Different case kinds used in the switch",
    );
    err_contains(
        "class T { int m(long l) { return switch (l) { default -> 0; }; } }",
        "Cannot switch on a value of type long",
    );
}

#[test]
fn arms_may_produce_capturing_lambdas() {
    let src = r#"
import java.util.function.IntSupplier;
class Main {
    static int run(int i) {
        int base = 40;
        IntSupplier s = switch (i) {
            case 0 -> () -> base + i;
            case 1 -> () -> {
                int twice = base * 2;
                return twice + i;
            };
            default -> () -> -1;
        };
        return s.getAsInt();
    }
}
"#;
    let out = compile_ok(src);
    let main = &out.class("Main").unwrap().class_file;
    assert!(main.method("lambda$run$0", "(II)I").is_some());
    assert!(main.method("lambda$run$2", "()I").is_some());
    let mut jvm = Jvm::new(&out.classes);
    let mut call = |i| jvm.call_static("Main", "run", "(I)I", vec![Value::Int(i)]).unwrap().int();
    assert_eq!(call(0), 40);
    assert_eq!(call(1), 81);
    assert_eq!(call(5), -1);
}

#[test]
fn lambdas_in_arms_reach_the_enclosing_instance() {
    let src = r#"
import java.util.function.IntUnaryOperator;
interface Step { int next(int v); }
class Counter {
    int start = 5;
    int bump(int k) {
        IntUnaryOperator op = switch (k) {
            case 0 -> x -> x + start;
            default -> x -> twice(x) * k;
        };
        return op.applyAsInt(10);
    }
    int twice(int x) { return x * 2; }
    static int apply(Step s, int v) { return s.next(v); }
}
class Main {
    static int run(int k) { return new Counter().bump(k); }
    static int passed(int k) {
        return switch (k) {
            case 0 -> Counter.apply(v -> v, 1);
            default -> Counter.apply(v -> v + k, 1);
        };
    }
}
"#;
    let mut jvm = load(src);
    assert_eq!(jvm.call_static("Main", "run", "(I)I", vec![Value::Int(0)]).unwrap().int(), 15);
    assert_eq!(jvm.call_static("Main", "run", "(I)I", vec![Value::Int(3)]).unwrap().int(), 60);
    assert_eq!(jvm.call_static("Main", "passed", "(I)I", vec![Value::Int(0)]).unwrap().int(), 1);
    assert_eq!(jvm.call_static("Main", "passed", "(I)I", vec![Value::Int(4)]).unwrap().int(), 5);
}

#[test]
fn lambda_bodies_are_separate_from_the_switch() {
    // a return inside a lambda body leaves the lambda, not the switch expression
    ok(r#"
import java.util.function.IntSupplier;
class T {
    int m(int i) {
        IntSupplier s = switch (i) { default -> () -> { return i; }; };
        return s.getAsInt();
    }
}
"#);
    err_contains(
        "import java.util.function.IntSupplier; class T { void m(int i) { i++; IntSupplier s = switch (i) { default -> () -> i; }; } }",
        "Local variable i defined in an enclosing scope must be final or effectively final",
    );
    err_contains(
        "class T { void m(int i) { Object o = switch (i) { default -> () -> 1; }; } }",
        "The target type of this expression must be a functional interface",
    );
    err_contains(
        "import java.util.function.IntSupplier; class T { void m(int i) { IntSupplier s = switch (i) { default -> x -> 1; }; } }",
        "Lambda expression's signature does not match the signature of the functional interface method getAsInt()",
    );
}
