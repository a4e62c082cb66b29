use pang_compiler::ast::*;
use pang_compiler::diagnostics::{ColorMode, DiagnosticEngine};
use pang_compiler::parser::parse_source;
use pang_compiler::token::TokenKind;

fn parse(source: &str) -> (Module, DiagnosticEngine) {
    let mut diagnostics = DiagnosticEngine::new(ColorMode::Never);
    let module = parse_source(source, "test.pang", &mut diagnostics);
    (module, diagnostics)
}

fn parse_ok(source: &str) -> Module {
    let (module, diagnostics) = parse(source);
    assert!(
        !diagnostics.has_errors(),
        "unexpected parse errors: {:?}",
        diagnostics.diagnostics()
    );
    module
}

fn first_function(module: &Module) -> &FunctionDecl {
    module
        .declarations
        .iter()
        .find_map(|d| match &d.kind {
            DeclKind::Function(f) => Some(f),
            _ => None,
        })
        .expect("expected a function declaration")
}

fn return_expr(function: &FunctionDecl) -> &Expr {
    function
        .body
        .as_ref()
        .expect("function has no body")
        .iter()
        .find_map(|s| match &s.kind {
            StmtKind::Return(Some(e)) => Some(e),
            _ => None,
        })
        .expect("expected a return with a value")
}

#[test]
fn multiplicative_binds_tighter_than_additive() {
    let module = parse_ok("fn f() -> i32 { return 1 + 2 * 3 }");
    let expr = return_expr(first_function(&module));
    let ExprKind::Binary { op, right, .. } = &expr.kind else {
        panic!("expected binary expression");
    };
    assert_eq!(*op, TokenKind::Plus);
    let ExprKind::Binary { op: inner, .. } = &right.kind else {
        panic!("expected nested binary on the right");
    };
    assert_eq!(*inner, TokenKind::Star);
}

#[test]
fn shift_binds_tighter_than_relational() {
    let module = parse_ok("fn f(a: i32) -> bool { return a << 2 < 3 }");
    let expr = return_expr(first_function(&module));
    let ExprKind::Binary { op, left, .. } = &expr.kind else {
        panic!("expected binary expression");
    };
    assert_eq!(*op, TokenKind::Less);
    let ExprKind::Binary { op: inner, .. } = &left.kind else {
        panic!("expected shift on the left");
    };
    assert_eq!(*inner, TokenKind::Shl);
}

#[test]
fn power_is_right_associative() {
    let module = parse_ok("fn f() -> i32 { return 2 ** 3 ** 2 }");
    let expr = return_expr(first_function(&module));
    let ExprKind::Binary { op, left, right } = &expr.kind else {
        panic!("expected binary expression");
    };
    assert_eq!(*op, TokenKind::Power);
    assert!(matches!(left.kind, ExprKind::Literal(_)));
    assert!(matches!(
        right.kind,
        ExprKind::Binary {
            op: TokenKind::Power,
            ..
        }
    ));
}

#[test]
fn assignment_is_right_associative() {
    let module = parse_ok("fn f() -> void { a = b = c }");
    let body = first_function(&module).body.as_ref().unwrap();
    let StmtKind::Expression(expr) = &body[0].kind else {
        panic!("expected expression statement");
    };
    let ExprKind::Assignment { value, .. } = &expr.kind else {
        panic!("expected assignment");
    };
    assert!(matches!(value.kind, ExprKind::Assignment { .. }));
}

#[test]
fn as_cast_parses_after_arithmetic() {
    let module = parse_ok("fn f(a: i16, b: i64) -> i32 { return (a + b) as i32 }");
    let expr = return_expr(first_function(&module));
    let ExprKind::As { expr: inner, .. } = &expr.kind else {
        panic!("expected as-expression");
    };
    assert!(matches!(inner.kind, ExprKind::Binary { .. }));
}

#[test]
fn cast_and_try_cast_parse() {
    let module = parse_ok("fn f(x: i64) -> i32 { return cast<i32>(x) }");
    let expr = return_expr(first_function(&module));
    assert!(matches!(expr.kind, ExprKind::Cast { is_safe: false, .. }));

    let module = parse_ok("fn f(x: i64) -> i32 { return try_cast<i32>(x) }");
    let expr = return_expr(first_function(&module));
    assert!(matches!(expr.kind, ExprKind::Cast { is_safe: true, .. }));
}

#[test]
fn postfix_chain_shapes() {
    let module = parse_ok("fn f() -> void { foo(1).bar[2] }");
    let body = first_function(&module).body.as_ref().unwrap();
    let StmtKind::Expression(expr) = &body[0].kind else {
        panic!("expected expression statement");
    };
    let ExprKind::Index { object, .. } = &expr.kind else {
        panic!("expected index at the top");
    };
    let ExprKind::Member { object: inner, .. } = &object.kind else {
        panic!("expected member below index");
    };
    assert!(matches!(inner.kind, ExprKind::Call { .. }));
}

#[test]
fn unary_and_postfix_operators() {
    let module = parse_ok("fn f(x: i32) -> i32 { return -x + x++ }");
    let expr = return_expr(first_function(&module));
    let ExprKind::Binary { left, right, .. } = &expr.kind else {
        panic!("expected binary expression");
    };
    assert!(matches!(
        left.kind,
        ExprKind::Unary {
            op: TokenKind::Minus,
            ..
        }
    ));
    assert!(matches!(
        right.kind,
        ExprKind::Postfix {
            op: TokenKind::Increment,
            ..
        }
    ));
}

#[test]
fn semicolons_and_newlines_both_terminate() {
    parse_ok("fn f() -> i32 { let a: i32 = 1; return a }");
    parse_ok("fn f() -> i32 {\n    let a: i32 = 1\n    return a\n}");
}

#[test]
fn extra_semicolons_are_diagnosed_but_recovered() {
    let (module, diagnostics) = parse("let x: i32 = 1;;\n");
    assert!(diagnostics.has_errors());
    assert!(diagnostics
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("Unexpected extra semicolon")));
    assert_eq!(module.declarations.len(), 1);
}

#[test]
fn missing_arrow_defaults_to_void_with_warning() {
    let (module, diagnostics) = parse("fn f() { return }");
    assert!(!diagnostics.has_errors());
    assert_eq!(diagnostics.warning_count(), 1);
    assert!(first_function(&module).return_type.is_void());
}

#[test]
fn foreign_function_declaration() {
    let module = parse_ok("foreign fn printf(fmt: cptr u8, args: raw_va_list) -> i32");
    let f = first_function(&module);
    assert!(f.is_foreign);
    assert!(f.body.is_none());
    assert!(f.is_variadic());
    let TypeKind::Pointer { kind, pointee } = &f.parameters[0].ty.kind else {
        panic!("expected pointer parameter type");
    };
    assert_eq!(*kind, PointerKind::Cptr);
    assert!(matches!(pointee.kind, TypeKind::Primitive(TokenKind::U8)));
}

#[test]
fn import_forms() {
    let module = parse_ok("import \"io\"\nimport \"m\" { a, b }\nimport \"n\" { * }\n");
    assert_eq!(module.imports.len(), 3);
    assert!(module.imports[0].is_wildcard);
    assert_eq!(module.imports[0].module_path, "io");
    assert!(!module.imports[1].is_wildcard);
    assert_eq!(module.imports[1].imported_items, vec!["a", "b"]);
    assert!(module.imports[2].is_wildcard);
}

#[test]
fn export_flags_declarations() {
    let module = parse_ok("export fn f() -> i32 { return 0 }\nexport let limit: i32 = 10\n");
    assert!(first_function(&module).is_exported);
    let exported_var = module.declarations.iter().any(|d| {
        matches!(
            &d.kind,
            DeclKind::Variable(v) if v.name == "limit" && v.is_exported
        )
    });
    assert!(exported_var);
}

#[test]
fn class_with_field_constructor_and_method() {
    let source = "class Point {\n    let x: i32\n    Point(a: i32) -> self {\n    }\n    fn get() -> i32 { return 0 }\n}";
    let module = parse_ok(source);
    let DeclKind::Class(class) = &module.declarations[0].kind else {
        panic!("expected class declaration");
    };
    assert_eq!(class.members.len(), 3);
    let ctor = class.constructor().expect("constructor not found");
    assert_eq!(ctor.parameters.len(), 1);
    assert!(matches!(
        ctor.return_type.kind,
        TypeKind::Primitive(TokenKind::SelfKw)
    ));
}

#[test]
fn constructor_must_return_self() {
    let (_, diagnostics) = parse("class P {\n    P() -> i32 {\n    }\n}");
    assert!(diagnostics.has_errors());
    assert!(diagnostics
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("Constructor must return 'self'")));
}

#[test]
fn pointer_array_and_const_types() {
    let module = parse_ok("fn f(p: cptr cptr u8, a: i32[4], c: const i32) -> void { }");
    let f = first_function(&module);

    let TypeKind::Pointer { pointee, .. } = &f.parameters[0].ty.kind else {
        panic!("expected pointer type");
    };
    assert!(matches!(pointee.kind, TypeKind::Pointer { .. }));

    let TypeKind::Array { element, size } = &f.parameters[1].ty.kind else {
        panic!("expected array type");
    };
    assert_eq!(*size, 4);
    assert!(matches!(element.kind, TypeKind::Primitive(TokenKind::I32)));

    assert!(matches!(f.parameters[2].ty.kind, TypeKind::Const(_)));
}

#[test]
fn negative_array_size_is_an_error() {
    let (_, diagnostics) = parse("fn f(a: i32[0]) -> void { }");
    assert!(diagnostics.has_errors());
    assert!(diagnostics
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("Expected positive array size")));
}

#[test]
fn generic_type_arguments_parse() {
    let module = parse_ok("fn f(b: Box<i32>) -> void { }");
    let f = first_function(&module);
    let TypeKind::Generic { base, arguments } = &f.parameters[0].ty.kind else {
        panic!("expected generic type");
    };
    assert_eq!(base, "Box");
    assert_eq!(arguments.len(), 1);
}

#[test]
fn struct_and_enum_declarations() {
    let module = parse_ok("struct S {\n    a: i32\n    b: f64\n}\nenum E { A, B }\nforeign struct FS { x: i32 }\nforeign enum FE { Y }\n");
    let mut structs = 0;
    let mut enums = 0;
    for decl in &module.declarations {
        match &decl.kind {
            DeclKind::Struct(s) => {
                structs += 1;
                if s.name == "S" {
                    assert_eq!(s.fields.len(), 2);
                    assert!(!s.is_foreign);
                } else {
                    assert!(s.is_foreign);
                }
            }
            DeclKind::Enum(e) => {
                enums += 1;
                if e.name == "E" {
                    assert_eq!(e.variants.len(), 2);
                } else {
                    assert!(e.is_foreign);
                }
            }
            _ => {}
        }
    }
    assert_eq!(structs, 2);
    assert_eq!(enums, 2);
}

#[test]
fn type_alias_and_foreign_const() {
    let module = parse_ok("type Handle = cptr void\nforeign const EOF_MARKER: i32\n");
    assert_eq!(module.declarations.len(), 2);
    let DeclKind::Variable(alias) = &module.declarations[0].kind else {
        panic!("expected alias as variable declaration");
    };
    assert!(alias.ty.is_some());
    assert!(alias.initializer.is_none());
    let DeclKind::Variable(foreign_const) = &module.declarations[1].kind else {
        panic!("expected foreign const as variable declaration");
    };
    assert!(foreign_const.initializer.is_none());
    assert!(!foreign_const.is_mutable);
}

#[test]
fn let_mut_is_mutable() {
    let module = parse_ok("fn f() -> void { let mut x: i32 = 1\n let y: i32 = 2 }");
    let body = first_function(&module).body.as_ref().unwrap();
    let StmtKind::Declaration(decl) = &body[0].kind else {
        panic!("expected declaration statement");
    };
    let DeclKind::Variable(x) = &decl.kind else {
        panic!("expected variable");
    };
    assert!(x.is_mutable);
    let StmtKind::Declaration(decl) = &body[1].kind else {
        panic!("expected declaration statement");
    };
    let DeclKind::Variable(y) = &decl.kind else {
        panic!("expected variable");
    };
    assert!(!y.is_mutable);
}

#[test]
fn control_flow_statements_parse() {
    let source = "fn f(x: i32) -> void {\n    if x > 0 {\n        g()\n    } else {\n        h()\n    }\n    while x < 10 {\n        x = x + 1\n    }\n    for item in xs {\n        g()\n    }\n}";
    let module = parse_ok(source);
    let body = first_function(&module).body.as_ref().unwrap();
    assert!(matches!(body[0].kind, StmtKind::If { .. }));
    assert!(matches!(body[1].kind, StmtKind::While { .. }));
    assert!(matches!(body[2].kind, StmtKind::For { .. }));
}

#[test]
fn error_recovery_keeps_later_declarations() {
    let (module, diagnostics) = parse("fn () -> i32 { }\nfn ok() -> i32 { return 1 }\n");
    assert!(diagnostics.has_errors());
    let ok_exists = module
        .declarations
        .iter()
        .any(|d| matches!(&d.kind, DeclKind::Function(f) if f.name == "ok"));
    assert!(ok_exists);
}

#[test]
fn foreign_class_is_rejected() {
    let (_, diagnostics) = parse("foreign class C { }\n");
    assert!(diagnostics.has_errors());
    assert!(diagnostics
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("Foreign classes are not supported")));
}
