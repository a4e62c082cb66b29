use pang_compiler::ast::Program;
use pang_compiler::diagnostics::{ColorMode, DiagnosticEngine};
use pang_compiler::parser::parse_source;
use pang_compiler::symbols::TypeChecker;

fn check(source: &str) -> DiagnosticEngine {
    let mut diagnostics = DiagnosticEngine::new(ColorMode::Never);
    let main_module = parse_source(source, "main.pang", &mut diagnostics);
    assert!(
        !diagnostics.has_errors(),
        "parse failed: {:?}",
        diagnostics.diagnostics()
    );
    let program = Program {
        modules: vec![],
        main_module,
    };
    let mut checker = TypeChecker::new(&mut diagnostics);
    checker.analyze(&program);
    diagnostics
}

fn messages(diagnostics: &DiagnosticEngine) -> Vec<String> {
    diagnostics
        .diagnostics()
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

fn assert_clean(source: &str) {
    let diagnostics = check(source);
    assert!(
        !diagnostics.has_errors(),
        "unexpected errors: {:?}",
        messages(&diagnostics)
    );
}

fn assert_error_containing(source: &str, needle: &str) {
    let diagnostics = check(source);
    assert!(diagnostics.has_errors(), "expected an error for: {source}");
    assert!(
        messages(&diagnostics).iter().any(|m| m.contains(needle)),
        "no message containing {:?} in {:?}",
        needle,
        messages(&diagnostics)
    );
}

#[test]
fn hello_world_checks_clean() {
    let source = "foreign fn printf(fmt: cptr u8, args: raw_va_list) -> i32\nfn main() -> i32 {\n    printf(\"Hello\\n\")\n    return 0\n}";
    let diagnostics = check(source);
    assert_eq!(diagnostics.error_count(), 0);
    assert_eq!(diagnostics.warning_count(), 0);
}

#[test]
fn integer_promotion_in_initializers_and_returns() {
    assert_clean(
        "fn main() -> i32 {\n    let a: i16 = 1\n    let b: i64 = 2\n    return (a + b) as i32\n}",
    );
}

#[test]
fn arithmetic_takes_the_common_numeric_type() {
    assert_clean("fn f(a: i16, b: i64) -> i64 { return a + b }");
    assert_clean("fn f(a: i32, b: f64) -> f64 { return a * b }");
    assert_error_containing(
        "fn f(a: bool, b: i32) -> i32 { return a + b }",
        "Invalid operands for arithmetic operation",
    );
}

#[test]
fn immutable_assignment_is_rejected() {
    let diagnostics = check("fn main() -> i32 {\n    let x: i32 = 1\n    x = 2\n    return 0\n}");
    assert_eq!(diagnostics.error_count(), 1);
    assert!(messages(&diagnostics)[0].contains("Cannot assign to immutable variable: x"));
}

#[test]
fn mutable_assignment_is_allowed() {
    assert_clean("fn main() -> i32 {\n    let mut x: i32 = 1\n    x = 2\n    return x\n}");
}

#[test]
fn postfix_on_immutable_is_rejected() {
    assert_error_containing(
        "fn f() -> void {\n    let x: i32 = 1\n    x++\n}",
        "Cannot modify immutable variable: x",
    );
}

#[test]
fn undefined_identifier_is_reported_once() {
    let diagnostics = check("fn f() -> i32 { return missing + 1 }");
    let count = messages(&diagnostics)
        .iter()
        .filter(|m| m.contains("Undefined identifier: missing"))
        .count();
    assert_eq!(count, 1);
    // The error type suppresses cascades: no arithmetic complaint follows.
    assert_eq!(diagnostics.error_count(), 1);
}

#[test]
fn redefinition_in_same_scope() {
    assert_error_containing(
        "fn f() -> void {\n    let x: i32 = 1\n    let x: i32 = 2\n}",
        "Redefinition of variable x",
    );
}

#[test]
fn inner_scope_shadowing_is_allowed() {
    assert_clean("fn f() -> void {\n    let x: i32 = 1\n    {\n        let x: i32 = 2\n    }\n}");
}

#[test]
fn shift_requires_equal_width_integers() {
    assert_clean("fn f(a: i32, b: i32) -> i32 { return a << b }");
    assert_error_containing(
        "fn f(a: i32, b: i64) -> i32 { return a << b }",
        "Invalid operands for bitwise shift operation",
    );
    assert_error_containing(
        "fn f(a: f64, b: f64) -> f64 { return a >> b }",
        "Invalid operands for bitwise shift operation",
    );
}

#[test]
fn comparisons_produce_bool_under_promotion() {
    assert_clean("fn f(a: i32, b: f64) -> bool { return a < b }");
    assert_error_containing(
        "fn f(a: string, b: i32) -> bool { return a < b }",
        "Cannot compare incompatible types",
    );
}

#[test]
fn logical_operators_accept_bools_and_numerics() {
    assert_clean("fn f(a: bool, b: bool) -> bool { return a && b }");
    assert_clean("fn f(a: i32) -> bool { return a || 0 }");
    assert_error_containing(
        "fn f(a: string) -> bool { return a && a }",
        "Logical operators require boolean or numeric operands",
    );
}

#[test]
fn conditions_must_be_boolean() {
    assert_clean("fn f(a: bool) -> void { if a { } }");
    assert_error_containing(
        "fn f(a: i32) -> void { if a { } }",
        "If condition must be boolean",
    );
    assert_error_containing(
        "fn f(a: i32) -> void { while a { } }",
        "While condition must be boolean",
    );
}

#[test]
fn call_arity_is_checked() {
    assert_error_containing(
        "foreign fn abs(x: i32) -> i32\nfn f() -> i32 { return abs(1, 2) }",
        "Incorrect number of arguments",
    );
}

#[test]
fn argument_types_are_checked() {
    assert_error_containing(
        "foreign fn abs(x: i32) -> i32\nfn f() -> i32 { return abs(\"no\") }",
        "Argument type mismatch",
    );
}

#[test]
fn string_literal_passes_as_cptr_u8() {
    assert_clean("foreign fn puts(s: cptr u8) -> i32\nfn f() -> i32 { return puts(\"hi\") }");
    assert_clean(
        "foreign fn scribble(p: cptr void) -> void\nfn f() -> void { scribble(\"hi\") }",
    );
}

#[test]
fn variadic_foreign_call_accepts_extra_arguments() {
    assert_clean(
        "foreign fn printf(fmt: cptr u8, args: raw_va_list) -> i32\nfn main() -> i32 {\n    printf(\"%d %s\\n\", 42, \"ok\")\n    return 0\n}",
    );
}

#[test]
fn calling_a_non_function_is_an_error() {
    assert_error_containing(
        "fn f() -> void {\n    let x: i32 = 1\n    x(2)\n}",
        "Cannot call non-function",
    );
}

#[test]
fn member_access_is_unsupported() {
    assert_error_containing(
        "fn f(a: i32) -> void { a.b }",
        "Member access not supported for type",
    );
}

#[test]
fn invalid_cast_is_a_warning_not_an_error() {
    let diagnostics = check("fn f() -> void {\n    let x: i32 = cast<i32>(null)\n}");
    assert!(!diagnostics.has_errors());
    assert_eq!(diagnostics.warning_count(), 1);
    assert!(messages(&diagnostics)[0].contains("Potentially unsafe cast"));
}

#[test]
fn failed_try_cast_warns_and_keeps_source_type() {
    let diagnostics = check("fn f() -> void {\n    let x = try_cast<i32>(null)\n}");
    assert!(!diagnostics.has_errors());
    assert_eq!(diagnostics.warning_count(), 1);
    assert!(messages(&diagnostics)[0].contains("try_cast failed"));
}

#[test]
fn invalid_as_cast_is_an_error() {
    assert_error_containing(
        "fn f(p: cptr u8) -> void {\n    let x: i32 = p as i32\n}",
        "Cannot cast from",
    );
}

#[test]
fn return_type_is_checked() {
    assert_error_containing(
        "fn f() -> i32 { return \"s\" }",
        "Return type mismatch",
    );
    assert_error_containing("fn f() -> i32 { return }", "Missing return value");
    assert_clean("fn f() -> void { return }");
}

#[test]
fn pointer_null_comparison_is_allowed() {
    assert_clean("fn f(p: cptr u8) -> bool { return p == null }");
}

#[test]
fn enum_variants_are_constants_of_the_enum_type() {
    assert_clean("enum Color { Red, Green }\nfn f() -> void {\n    let c = Red\n}");
}

#[test]
fn class_name_acts_as_constructor() {
    assert_clean(
        "class Point {\n    let x: i32\n    Point(a: i32) -> self {\n    }\n}\nfn f() -> void {\n    let p = Point(1)\n}",
    );
    assert_error_containing(
        "class Point {\n    Point(a: i32) -> self {\n    }\n}\nfn f() -> void {\n    let p = Point(1, 2)\n}",
        "Incorrect number of arguments",
    );
}

#[test]
fn for_binder_is_an_integer() {
    assert_clean("fn f() -> void {\n    for i in 10 {\n        let x: i32 = i\n    }\n}");
}

#[test]
fn exported_symbols_are_visible_through_imports() {
    let mut diagnostics = DiagnosticEngine::new(ColorMode::Never);
    let mut util = parse_source(
        "export fn helper() -> i32 { return 1 }",
        "util.pang",
        &mut diagnostics,
    );
    util.name = "util".to_string();
    let main_module = parse_source(
        "import \"util\"\nfn main() -> i32 { return helper() }",
        "main.pang",
        &mut diagnostics,
    );
    let program = Program {
        modules: vec![util],
        main_module,
    };
    let mut checker = TypeChecker::new(&mut diagnostics);
    checker.analyze(&program);
    assert!(checker.exports()["util"].contains_key("helper"));
    assert!(!diagnostics.has_errors(), "{:?}", messages(&diagnostics));
}

#[test]
fn unexported_symbols_are_not_visible() {
    let mut diagnostics = DiagnosticEngine::new(ColorMode::Never);
    let mut util = parse_source(
        "fn helper() -> i32 { return 1 }",
        "util.pang",
        &mut diagnostics,
    );
    util.name = "util".to_string();
    let main_module = parse_source(
        "import \"util\"\nfn main() -> i32 { return helper() }",
        "main.pang",
        &mut diagnostics,
    );
    let program = Program {
        modules: vec![util],
        main_module,
    };
    let mut checker = TypeChecker::new(&mut diagnostics);
    checker.analyze(&program);
    assert!(diagnostics.has_errors());
    assert!(messages(&diagnostics)
        .iter()
        .any(|m| m.contains("Undefined identifier: helper")));
}

#[test]
fn named_imports_limit_visibility() {
    let util_source = "export fn helper() -> i32 { return 1 }\nexport fn other() -> i32 { return 2 }";

    // Importing { helper } makes only helper visible.
    let mut diagnostics = DiagnosticEngine::new(ColorMode::Never);
    let mut util = parse_source(util_source, "util.pang", &mut diagnostics);
    util.name = "util".to_string();
    let main_module = parse_source(
        "import \"util\" { helper }\nfn main() -> i32 { return helper() }",
        "main.pang",
        &mut diagnostics,
    );
    let program = Program {
        modules: vec![util],
        main_module,
    };
    let mut checker = TypeChecker::new(&mut diagnostics);
    checker.analyze(&program);
    assert!(!diagnostics.has_errors(), "{:?}", messages(&diagnostics));

    let mut diagnostics = DiagnosticEngine::new(ColorMode::Never);
    let mut util = parse_source(util_source, "util.pang", &mut diagnostics);
    util.name = "util".to_string();
    let main_module = parse_source(
        "import \"util\" { helper }\nfn main() -> i32 { return other() }",
        "main.pang",
        &mut diagnostics,
    );
    let program = Program {
        modules: vec![util],
        main_module,
    };
    let mut checker = TypeChecker::new(&mut diagnostics);
    checker.analyze(&program);
    assert!(diagnostics.has_errors());
    assert!(messages(&diagnostics)
        .iter()
        .any(|m| m.contains("Undefined identifier: other")));
}

#[test]
fn type_names_are_collected_for_codegen() {
    let mut diagnostics = DiagnosticEngine::new(ColorMode::Never);
    let main_module = parse_source(
        "struct Vec2 { x: f64, y: f64 }\nenum Mode { On, Off }\nclass Widget {\n}",
        "main.pang",
        &mut diagnostics,
    );
    let program = Program {
        modules: vec![],
        main_module,
    };
    let mut checker = TypeChecker::new(&mut diagnostics);
    checker.analyze(&program);
    let names = checker.into_type_names();
    assert!(names.contains("Vec2"));
    assert!(names.contains("Mode"));
    assert!(names.contains("Widget"));
}
