use std::collections::HashSet;

use inkwell::context::Context;

use pang_compiler::ast::Program;
use pang_compiler::diagnostics::{ColorMode, DiagnosticEngine};
use pang_compiler::llvm_codegen::CodeGenerator;
use pang_compiler::parser::parse_source;

struct Lowered {
    ir: String,
    verified: bool,
    errors: Vec<String>,
}

fn lower(source: &str) -> Lowered {
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

    let context = Context::create();
    let mut codegen = CodeGenerator::new(&context, &mut diagnostics, false, HashSet::new());
    codegen.generate(&program);
    let verified = codegen.verify();
    let ir = codegen.print_ir();

    Lowered {
        ir,
        verified,
        errors: diagnostics
            .diagnostics()
            .iter()
            .filter(|d| {
                matches!(
                    d.severity,
                    pang_compiler::diagnostics::Severity::Error
                        | pang_compiler::diagnostics::Severity::Fatal
                )
            })
            .map(|d| d.message.clone())
            .collect(),
    }
}

fn lower_clean(source: &str) -> Lowered {
    let lowered = lower(source);
    assert!(
        lowered.errors.is_empty(),
        "unexpected codegen errors: {:?}",
        lowered.errors
    );
    assert!(lowered.verified, "module failed verification:\n{}", lowered.ir);
    lowered
}

#[test]
fn hello_world_lowers_to_a_variadic_printf_call() {
    let lowered = lower_clean(
        "foreign fn printf(fmt: cptr u8, args: raw_va_list) -> i32\nfn main() -> i32 {\n    printf(\"Hello\\n\")\n    return 0\n}",
    );
    assert!(lowered.ir.contains("declare i32 @printf"), "{}", lowered.ir);
    assert!(lowered.ir.contains("define i32 @main"), "{}", lowered.ir);
    assert!(lowered.ir.contains("Hello"), "{}", lowered.ir);
}

#[test]
fn integer_promotion_widens_then_truncates() {
    let lowered = lower_clean(
        "fn main() -> i32 {\n    let mut a: i16 = 1\n    let mut b: i64 = 2\n    return (a + b) as i32\n}",
    );
    assert!(lowered.ir.contains("sext i16"), "{}", lowered.ir);
    assert!(lowered.ir.contains("add"), "{}", lowered.ir);
    assert!(lowered.ir.contains("trunc"), "{}", lowered.ir);
}

#[test]
fn parameters_get_entry_block_slots() {
    let lowered = lower_clean("fn add(a: i32, b: i32) -> i32 { return a + b }");
    assert!(lowered.ir.contains("alloca i32"), "{}", lowered.ir);
    assert!(lowered.ir.contains("define i32 @add"), "{}", lowered.ir);
}

#[test]
fn void_functions_get_an_implicit_return() {
    let lowered = lower_clean("fn noop() -> void {\n}");
    assert!(lowered.ir.contains("define void @noop"), "{}", lowered.ir);
    assert!(lowered.ir.contains("ret void"), "{}", lowered.ir);
}

#[test]
fn if_else_lowers_to_branches() {
    let lowered = lower_clean(
        "fn pick(a: i32) -> i32 {\n    if a > 0 {\n        return 1\n    } else {\n        return 2\n    }\n}",
    );
    assert!(lowered.ir.contains("br i1"), "{}", lowered.ir);
    assert!(lowered.ir.contains("then"), "{}", lowered.ir);
    assert!(lowered.ir.contains("else"), "{}", lowered.ir);
}

#[test]
fn while_loops_reenter_the_condition_block() {
    let lowered = lower_clean(
        "fn count(n: i32) -> i32 {\n    let mut i: i32 = 0\n    while i < n {\n        i = i + 1\n    }\n    return i\n}",
    );
    assert!(lowered.ir.contains("loop"), "{}", lowered.ir);
    assert!(lowered.ir.contains("afterloop"), "{}", lowered.ir);
}

#[test]
fn global_constants_fold_and_resolve_through_references() {
    let lowered = lower_clean(
        "const LIMIT: i32 = 10\nconst COPY: i32 = LIMIT\nfn f() -> i32 { return COPY }",
    );
    assert!(lowered.ir.contains("@LIMIT"), "{}", lowered.ir);
    assert!(lowered.ir.contains("@COPY"), "{}", lowered.ir);
}

#[test]
fn non_constant_global_initializer_is_rejected() {
    let lowered = lower(
        "fn f() -> i32 { return 1 }\nlet mut g: i32 = f()\n",
    );
    assert_eq!(lowered.errors.len(), 1);
    assert!(lowered.errors[0].contains("must be a compile-time constant"));
}

#[test]
fn variadic_arguments_get_c_promotions() {
    let lowered = lower_clean(
        "foreign fn printf(fmt: cptr u8, args: raw_va_list) -> i32\nfn main() -> i32 {\n    let mut s: i16 = 1\n    printf(\"%d\", s)\n    return 0\n}",
    );
    // i16 is sign-extended to i32 before being passed through varargs.
    assert!(lowered.ir.contains("promote"), "{}", lowered.ir);
}

#[test]
fn casts_to_and_from_bool() {
    let lowered = lower_clean(
        "fn to_flag(a: i32) -> bool { return cast<bool>(a) }\nfn from_flag(b: bool) -> i32 { return cast<i32>(b) }",
    );
    assert!(lowered.ir.contains("icmp ne"), "{}", lowered.ir);
    assert!(lowered.ir.contains("zext"), "{}", lowered.ir);
}

#[test]
fn postfix_increment_stores_but_returns_the_original() {
    let lowered = lower_clean(
        "fn bump() -> i32 {\n    let mut x: i32 = 1\n    return x++\n}",
    );
    assert!(lowered.ir.contains("postinc"), "{}", lowered.ir);
}

#[test]
fn string_literals_use_processed_contents() {
    let lowered = lower_clean(
        "foreign fn puts(s: cptr u8) -> i32\nfn main() -> i32 {\n    puts(\"a\\tb\")\n    return 0\n}",
    );
    // \t is lowered as the real tab byte (printed as \09), not as the two
    // source characters.
    assert!(lowered.ir.contains("\\09"), "{}", lowered.ir);
}

#[test]
fn power_operator_is_diagnosed() {
    let lowered = lower("fn f(a: i32) -> i32 { return a ** a }");
    assert!(lowered
        .errors
        .iter()
        .any(|m| m.contains("Power operator not supported")));
}

#[test]
fn unknown_callee_is_diagnosed() {
    let lowered = lower("fn f() -> void {\n    missing()\n}");
    assert!(lowered
        .errors
        .iter()
        .any(|m| m.contains("Unknown function: missing")));
}

#[test]
fn local_constants_fold_away() {
    let lowered = lower_clean(
        "fn f() -> i32 {\n    let ten: i32 = 10\n    let mut x: i32 = 1\n    x = x + ten\n    return x\n}",
    );
    // `ten` binds as a constant: no second alloca for it.
    let allocas = lowered.ir.matches("alloca").count();
    assert_eq!(allocas, 1, "{}", lowered.ir);
}

#[test]
fn float_arithmetic_uses_float_instructions() {
    let lowered = lower_clean(
        "fn area(w: f64, h: f64) -> f64 { return w * h }",
    );
    assert!(lowered.ir.contains("fmul"), "{}", lowered.ir);
}

#[test]
fn mixed_int_float_promotes_to_float() {
    let lowered = lower_clean(
        "fn scale(n: i32, f: f64) -> f64 { return n * f }",
    );
    assert!(lowered.ir.contains("sitofp"), "{}", lowered.ir);
    assert!(lowered.ir.contains("fmul"), "{}", lowered.ir);
}
