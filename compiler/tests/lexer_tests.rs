use pang_compiler::diagnostics::{ColorMode, DiagnosticEngine};
use pang_compiler::lexer::tokenize;
use pang_compiler::token::{Token, TokenKind, TokenValue};

fn lex(source: &str) -> (Vec<Token>, DiagnosticEngine) {
    let mut diagnostics = DiagnosticEngine::new(ColorMode::Never);
    let tokens = tokenize(source, "test.pang", &mut diagnostics);
    (tokens, diagnostics)
}

fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
    tokens.iter().map(|t| t.kind).collect()
}

#[test]
fn stream_ends_with_single_eof() {
    let (tokens, diagnostics) = lex("let x = 1   ");
    assert!(!diagnostics.has_errors());
    assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    assert_eq!(
        tokens.iter().filter(|t| t.kind == TokenKind::Eof).count(),
        1
    );
}

#[test]
fn newline_tokens_match_line_terminators() {
    let (tokens, _) = lex("a\nb\n\nc");
    let newlines = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Newline)
        .count();
    assert_eq!(newlines, 3);
}

#[test]
fn compound_operators_lex_as_single_tokens() {
    let (tokens, diagnostics) = lex("+= ++ -> == <= << && :: ** %= != >>");
    assert!(!diagnostics.has_errors());
    assert_eq!(
        kinds(&tokens),
        vec![
            TokenKind::PlusAssign,
            TokenKind::Increment,
            TokenKind::Arrow,
            TokenKind::Equal,
            TokenKind::LessEqual,
            TokenKind::Shl,
            TokenKind::AndAnd,
            TokenKind::ColonColon,
            TokenKind::Power,
            TokenKind::PercentAssign,
            TokenKind::NotEqual,
            TokenKind::Shr,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn keywords_and_identifiers() {
    let (tokens, _) = lex("fn foreign raw_va_list foo try_cast");
    assert_eq!(tokens[0].kind, TokenKind::Fn);
    assert_eq!(tokens[1].kind, TokenKind::Foreign);
    assert_eq!(tokens[2].kind, TokenKind::RawVaList);
    assert_eq!(tokens[3].kind, TokenKind::Identifier);
    assert_eq!(tokens[3].lexeme, "foo");
    assert_eq!(tokens[4].kind, TokenKind::TryCast);
}

#[test]
fn booleans_and_null_become_literals() {
    let (tokens, _) = lex("true false null");
    assert_eq!(tokens[0].kind, TokenKind::BooleanLiteral);
    assert_eq!(tokens[0].value, TokenValue::Bool(true));
    assert_eq!(tokens[1].kind, TokenKind::BooleanLiteral);
    assert_eq!(tokens[1].value, TokenValue::Bool(false));
    assert_eq!(tokens[2].kind, TokenKind::NullLiteral);
}

#[test]
fn line_comments_are_filtered() {
    let (tokens, diagnostics) = lex("1 // comment text\n2");
    assert!(!diagnostics.has_errors());
    assert_eq!(
        kinds(&tokens),
        vec![
            TokenKind::IntegerLiteral,
            TokenKind::Newline,
            TokenKind::IntegerLiteral,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn block_comments_nest() {
    let (tokens, diagnostics) = lex("/* a /* nested */ b */ 42");
    assert!(!diagnostics.has_errors());
    assert_eq!(tokens[0].kind, TokenKind::IntegerLiteral);
    assert_eq!(tokens[0].value, TokenValue::Int(42));
}

#[test]
fn unterminated_block_comment_reports() {
    let (_, diagnostics) = lex("/* never closed");
    assert_eq!(diagnostics.error_count(), 1);
    assert!(diagnostics.diagnostics()[0]
        .message
        .contains("Unterminated block comment"));
}

#[test]
fn nested_comment_then_unterminated_string() {
    let (_, diagnostics) = lex("/* outer /* inner */ still in */ \"oops");
    assert_eq!(diagnostics.error_count(), 1);
    assert!(diagnostics.diagnostics()[0]
        .message
        .contains("Unterminated string"));
}

#[test]
fn string_escapes_are_processed() {
    let (tokens, diagnostics) = lex(r#""a\n\tb\\\"\0""#);
    assert!(!diagnostics.has_errors());
    assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
    assert_eq!(
        tokens[0].value,
        TokenValue::Str("a\n\tb\\\"\0".to_string())
    );
    // The lexeme keeps the raw quoted span.
    assert!(tokens[0].lexeme.starts_with('"'));
    assert!(tokens[0].lexeme.ends_with('"'));
}

#[test]
fn unknown_escape_keeps_character() {
    let (tokens, diagnostics) = lex(r#""a\qb""#);
    assert_eq!(diagnostics.error_count(), 1);
    assert!(diagnostics.diagnostics()[0]
        .message
        .contains("Unknown escape sequence"));
    assert_eq!(tokens[0].value, TokenValue::Str("aqb".to_string()));
}

#[test]
fn multi_line_strings_are_allowed() {
    let (tokens, diagnostics) = lex("\"line one\nline two\"");
    assert!(!diagnostics.has_errors());
    assert_eq!(
        tokens[0].value,
        TokenValue::Str("line one\nline two".to_string())
    );
}

#[test]
fn numeric_literals_carry_values_and_suffixes() {
    let (tokens, diagnostics) = lex("42 42i64 3000000000 1.5 1.5f32 7u8");
    assert!(!diagnostics.has_errors());
    assert_eq!(tokens[0].value, TokenValue::Int(42));
    assert_eq!(tokens[1].kind, TokenKind::IntegerLiteral);
    assert_eq!(tokens[1].lexeme, "42i64");
    assert_eq!(tokens[1].value, TokenValue::Int(42));
    assert_eq!(tokens[2].value, TokenValue::Int(3_000_000_000));
    assert_eq!(tokens[3].kind, TokenKind::FloatLiteral);
    assert_eq!(tokens[3].value, TokenValue::Float(1.5));
    assert_eq!(tokens[4].lexeme, "1.5f32");
    assert_eq!(tokens[5].lexeme, "7u8");
}

#[test]
fn dot_without_fraction_digit_is_member_access() {
    let (tokens, _) = lex("1.x");
    assert_eq!(tokens[0].kind, TokenKind::IntegerLiteral);
    assert_eq!(tokens[1].kind, TokenKind::Dot);
    assert_eq!(tokens[2].kind, TokenKind::Identifier);
}

#[test]
fn unexpected_character_recovers_with_synthetic_identifier() {
    let (tokens, diagnostics) = lex("let @ x");
    assert_eq!(diagnostics.error_count(), 1);
    assert!(diagnostics.diagnostics()[0]
        .message
        .contains("Unexpected character"));
    assert_eq!(tokens[0].kind, TokenKind::Let);
    assert_eq!(tokens[1].kind, TokenKind::Identifier);
    assert_eq!(tokens[1].lexeme, "@");
    assert_eq!(tokens[2].kind, TokenKind::Identifier);
    assert_eq!(tokens[2].lexeme, "x");
}

#[test]
fn locations_are_one_based_and_derived_from_offsets() {
    let (tokens, _) = lex("ab\ncd");
    assert_eq!(tokens[0].location.line, 1);
    assert_eq!(tokens[0].location.column, 1);
    // tokens[1] is the newline, tokens[2] is `cd`.
    assert_eq!(tokens[2].location.line, 2);
    assert_eq!(tokens[2].location.column, 1);
    assert_eq!(tokens[2].location.offset, 3);
}

#[test]
fn crlf_line_endings_are_accepted() {
    let (tokens, diagnostics) = lex("let a = 1\r\nlet b = 2\r\n");
    assert!(!diagnostics.has_errors());
    let newlines = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Newline)
        .count();
    assert_eq!(newlines, 2);
}
