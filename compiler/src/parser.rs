use std::path::Path;

use crate::ast::*;
use crate::diagnostics::{DiagnosticEngine, Severity};
use crate::lexer::tokenize;
use crate::token::{Token, TokenKind, TokenValue};

/// Lexes and parses one source file into a module. The module name is the
/// file stem of `filename`.
pub fn parse_source(source: &str, filename: &str, diagnostics: &mut DiagnosticEngine) -> Module {
    let tokens = tokenize(source, filename, diagnostics);
    let name = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main")
        .to_string();
    let mut parser = Parser::new(tokens, diagnostics);
    parser.parse_module(name, filename.to_string())
}

/// Marker for an already-reported syntax error. Carriers unwind to the
/// nearest recovery point, which resynchronizes the token stream.
pub struct ParseInterrupt;

type PResult<T> = Result<T, ParseInterrupt>;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: &'a mut DiagnosticEngine,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, diagnostics: &'a mut DiagnosticEngine) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics,
        }
    }

    pub fn parse_module(&mut self, name: String, file_path: String) -> Module {
        let mut imports = Vec::new();
        let mut declarations = Vec::new();

        while !self.is_at_end() {
            self.skip_newlines();
            if self.is_at_end() {
                break;
            }
            match self.declaration() {
                Ok(Some(decl)) => match decl.kind {
                    DeclKind::Import(import) => imports.push(import),
                    _ => declarations.push(decl),
                },
                Ok(None) => {}
                Err(ParseInterrupt) => self.synchronize(),
            }
        }

        Module {
            name,
            file_path,
            imports,
            declarations,
        }
    }

    // ----- token plumbing -----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.pos += 1;
        }
        self.previous().clone()
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn match_any(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(*kind) {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.pos += 1;
        }
    }

    fn report_error(&mut self, message: &str) {
        let token = self.peek().clone();
        self.diagnostics.report(
            token.location.clone(),
            format!("{}, found {} '{}'", message, token.kind.name(), token.lexeme),
            Severity::Error,
            Some(token.lexeme),
        );
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            self.report_error(message);
            Err(ParseInterrupt)
        }
    }

    fn consume_identifier(&mut self, message: &str) -> PResult<Token> {
        self.consume(TokenKind::Identifier, message)
    }

    /// Statements end at `;`, a newline, a closing `}`, or EOF. Extra
    /// semicolons are diagnosed but recovered from.
    fn consume_terminator(&mut self) -> PResult<()> {
        if self.check(TokenKind::Semicolon) {
            self.advance();
            while self.check(TokenKind::Semicolon) {
                self.report_error("Unexpected extra semicolon");
                self.advance();
            }
            Ok(())
        } else if self.check(TokenKind::Newline) || self.check(TokenKind::RBrace) || self.is_at_end()
        {
            Ok(())
        } else {
            self.report_error("Expected ';' or newline after statement");
            Err(ParseInterrupt)
        }
    }

    /// Skips to the next declaration boundary after a syntax error.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fn
                | TokenKind::Let
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return
                | TokenKind::Const
                | TokenKind::Import
                | TokenKind::Struct
                | TokenKind::Enum
                | TokenKind::Foreign
                | TokenKind::Type => return,
                _ => {}
            }
            self.advance();
        }
    }

    /// Skips to the next statement boundary inside a block.
    fn synchronize_statement(&mut self) {
        while !self.is_at_end() && !self.check(TokenKind::RBrace) {
            if self.check(TokenKind::Semicolon) {
                self.advance();
                return;
            }
            if self.check(TokenKind::Newline) {
                return;
            }
            match self.peek().kind {
                TokenKind::Let
                | TokenKind::Const
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::LBrace => return,
                _ => {}
            }
            self.advance();
        }
    }

    // ----- declarations -----

    fn declaration(&mut self) -> PResult<Option<Decl>> {
        self.skip_newlines();
        if self.is_at_end() {
            return Ok(None);
        }

        if self.match_kind(TokenKind::Export) {
            let decl = self.declaration()?;
            return Ok(decl.map(mark_exported));
        }

        if self.match_kind(TokenKind::Foreign) {
            if self.match_kind(TokenKind::Fn) {
                return self.foreign_function_declaration().map(Some);
            }
            if self.match_kind(TokenKind::Struct) {
                return self.struct_declaration(true).map(Some);
            }
            if self.match_kind(TokenKind::Enum) {
                return self.enum_declaration(true).map(Some);
            }
            if self.match_kind(TokenKind::Class) {
                self.report_error(
                    "Foreign classes are not supported - C standard library has no classes",
                );
                return Ok(None);
            }
            if self.match_kind(TokenKind::Const) {
                return self.foreign_const_declaration().map(Some);
            }
            self.report_error("Expected 'fn', 'struct', 'enum', or 'const' after 'foreign'");
            return Ok(None);
        }

        if self.match_kind(TokenKind::Type) {
            return self.type_alias().map(Some);
        }
        if self.match_kind(TokenKind::Fn) {
            return self.function_declaration().map(Some);
        }
        if self.match_kind(TokenKind::Class) {
            return self.class_declaration().map(Some);
        }
        if self.match_kind(TokenKind::Struct) {
            return self.struct_declaration(false).map(Some);
        }
        if self.match_kind(TokenKind::Enum) {
            return self.enum_declaration(false).map(Some);
        }
        if self.match_kind(TokenKind::Import) {
            return self.import_declaration().map(Some);
        }
        if self.match_kind(TokenKind::Let) {
            let is_mutable = self.match_kind(TokenKind::Mut);
            return self.variable_declaration(is_mutable).map(Some);
        }
        if self.match_kind(TokenKind::Const) {
            return self.const_declaration().map(Some);
        }

        self.report_error("Expected declaration");
        Err(ParseInterrupt)
    }

    fn function_declaration(&mut self) -> PResult<Decl> {
        let name = self.consume_identifier("Expected function name")?;

        self.consume(TokenKind::LParen, "Expected '(' after function name")?;
        let parameters = self.parameter_list()?;
        self.consume(TokenKind::RParen, "Expected ')' after parameters")?;

        let return_type = self.function_return_type(&name)?;

        while self.match_kind(TokenKind::Newline) {}
        self.consume(TokenKind::LBrace, "Expected '{' before function body")?;
        let body = self.block()?;

        Ok(Decl::new(
            DeclKind::Function(FunctionDecl {
                name: name.lexeme.clone(),
                parameters,
                return_type,
                body: Some(body),
                is_foreign: false,
                is_exported: false,
            }),
            name.location,
        ))
    }

    fn function_return_type(&mut self, name: &Token) -> PResult<Type> {
        if self.match_kind(TokenKind::Arrow) {
            self.parse_type()
        } else {
            self.diagnostics.warning(
                self.previous().location.clone(),
                "Function return type inference not yet implemented, defaulting to void.",
            );
            Ok(Type::new(
                TypeKind::Primitive(TokenKind::Void),
                name.location.clone(),
            ))
        }
    }

    fn foreign_function_declaration(&mut self) -> PResult<Decl> {
        let name = self.consume_identifier("Expected foreign function name")?;

        self.consume(TokenKind::LParen, "Expected '(' after foreign function name")?;
        let parameters = self.parameter_list()?;
        self.consume(TokenKind::RParen, "Expected ')' after parameters")?;

        self.consume(TokenKind::Arrow, "Expected '->' after parameters")?;
        let return_type = self.parse_type()?;

        self.consume_terminator()?;

        Ok(Decl::new(
            DeclKind::Function(FunctionDecl {
                name: name.lexeme.clone(),
                parameters,
                return_type,
                body: None,
                is_foreign: true,
                is_exported: false,
            }),
            name.location,
        ))
    }

    fn variable_declaration(&mut self, is_mutable: bool) -> PResult<Decl> {
        let name = self.consume_identifier("Expected variable name")?;

        let ty = if self.match_kind(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let initializer = if self.match_kind(TokenKind::Assign) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume_terminator()?;

        Ok(Decl::new(
            DeclKind::Variable(VariableDecl {
                name: name.lexeme.clone(),
                ty,
                initializer,
                is_mutable,
                is_exported: false,
            }),
            name.location,
        ))
    }

    fn const_declaration(&mut self) -> PResult<Decl> {
        let name = self.consume_identifier("Expected constant name")?;

        self.consume(TokenKind::Colon, "Expected ':' after constant name")?;
        let ty = self.parse_type()?;

        self.consume(TokenKind::Assign, "Expected '=' after constant type")?;
        let initializer = self.expression()?;

        self.consume_terminator()?;

        Ok(Decl::new(
            DeclKind::Variable(VariableDecl {
                name: name.lexeme.clone(),
                ty: Some(ty),
                initializer: Some(initializer),
                is_mutable: false,
                is_exported: false,
            }),
            name.location,
        ))
    }

    /// Foreign constants carry no initializer; the symbol is defined in C.
    fn foreign_const_declaration(&mut self) -> PResult<Decl> {
        let name = self.consume_identifier("Expected foreign constant name")?;

        self.consume(TokenKind::Colon, "Expected ':' after foreign constant name")?;
        let ty = self.parse_type()?;

        self.consume_terminator()?;

        Ok(Decl::new(
            DeclKind::Variable(VariableDecl {
                name: name.lexeme.clone(),
                ty: Some(ty),
                initializer: None,
                is_mutable: false,
                is_exported: false,
            }),
            name.location,
        ))
    }

    /// Type aliases are represented as immutable variables carrying the
    /// aliased type and no initializer.
    fn type_alias(&mut self) -> PResult<Decl> {
        let name = self.consume_identifier("Expected type alias name")?;

        self.consume(TokenKind::Assign, "Expected '=' after type alias name")?;
        let aliased = self.parse_type()?;

        self.consume_terminator()?;

        Ok(Decl::new(
            DeclKind::Variable(VariableDecl {
                name: name.lexeme.clone(),
                ty: Some(aliased),
                initializer: None,
                is_mutable: false,
                is_exported: false,
            }),
            name.location,
        ))
    }

    fn import_declaration(&mut self) -> PResult<Decl> {
        let location = self.previous().location.clone();
        let path_token = self.consume(
            TokenKind::StringLiteral,
            "Expected module path string after 'import'",
        )?;
        let module_path = match path_token.value {
            TokenValue::Str(s) => s,
            _ => path_token.lexeme.trim_matches('"').to_string(),
        };

        let mut imported_items = Vec::new();
        let mut is_wildcard = false;

        if self.match_kind(TokenKind::LBrace) {
            if self.match_kind(TokenKind::Star) {
                is_wildcard = true;
            } else {
                loop {
                    let item = self.consume_identifier("Expected import item name")?;
                    imported_items.push(item.lexeme);
                    if !self.match_kind(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RBrace, "Expected '}' after import items")?;
        } else {
            is_wildcard = true;
        }

        self.consume_terminator()?;

        Ok(Decl::new(
            DeclKind::Import(ImportDecl {
                module_path,
                imported_items,
                is_wildcard,
                location: location.clone(),
            }),
            location,
        ))
    }

    fn class_declaration(&mut self) -> PResult<Decl> {
        let name = self.consume_identifier("Expected class name")?;

        let mut generic_parameters = Vec::new();
        if self.match_kind(TokenKind::Less) {
            loop {
                let param = self.consume_identifier("Expected generic parameter name")?;
                generic_parameters.push(param.lexeme);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
            self.consume(TokenKind::Greater, "Expected '>' after generic parameters")?;
        }

        let base_class = if self.match_kind(TokenKind::Colon) {
            Some(
                self.consume_identifier("Expected base class name")?
                    .lexeme,
            )
        } else {
            None
        };

        self.consume(TokenKind::LBrace, "Expected '{' after class declaration")?;

        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            self.skip_newlines();
            if self.check(TokenKind::RBrace) {
                break;
            }

            if self.match_kind(TokenKind::Let) {
                members.push(ClassMember::Field(self.field_member()?));
            } else if self.check(TokenKind::Identifier) && self.peek().lexeme == name.lexeme {
                members.push(ClassMember::Method(self.constructor_member(&name)?));
            } else if self.match_kind(TokenKind::Fn) {
                members.push(ClassMember::Method(self.method_member()?));
            } else {
                self.report_error("Expected field, constructor, or method declaration");
                self.advance();
            }
        }

        self.consume(TokenKind::RBrace, "Expected '}' after class body")?;

        Ok(Decl::new(
            DeclKind::Class(ClassDecl {
                name: name.lexeme.clone(),
                generic_parameters,
                base_class,
                members,
                is_exported: false,
            }),
            name.location,
        ))
    }

    fn field_member(&mut self) -> PResult<FieldMember> {
        let name = self.consume_identifier("Expected field name")?;
        self.consume(TokenKind::Colon, "Expected ':' after field name")?;
        let ty = self.parse_type()?;

        let initializer = if self.match_kind(TokenKind::Assign) {
            Some(self.expression()?)
        } else {
            None
        };
        self.skip_newlines();

        Ok(FieldMember {
            name: name.lexeme,
            ty,
            initializer,
            is_public: true,
            location: name.location,
        })
    }

    /// A constructor is spelled as the class name with a parameter list and a
    /// declared return type of `self`.
    fn constructor_member(&mut self, class_name: &Token) -> PResult<MethodMember> {
        let name = self.advance();

        self.consume(TokenKind::LParen, "Expected '(' after constructor name")?;
        let parameters = self.parameter_list()?;
        self.consume(TokenKind::RParen, "Expected ')' after constructor parameters")?;
        self.consume(TokenKind::Arrow, "Expected '->' after constructor parameters")?;

        if !self.match_kind(TokenKind::SelfKw) {
            self.report_error("Constructor must return 'self'");
            return Err(ParseInterrupt);
        }

        self.consume(TokenKind::LBrace, "Expected '{' before constructor body")?;
        let body = self.block()?;

        Ok(MethodMember {
            name: class_name.lexeme.clone(),
            parameters,
            return_type: Type::new(
                TypeKind::Primitive(TokenKind::SelfKw),
                name.location.clone(),
            ),
            body,
            is_public: true,
            is_static: false,
            is_virtual: false,
            is_override: false,
            location: name.location,
        })
    }

    fn method_member(&mut self) -> PResult<MethodMember> {
        let name = self.consume_identifier("Expected method name")?;

        self.consume(TokenKind::LParen, "Expected '(' after method name")?;
        let parameters = self.parameter_list()?;
        self.consume(TokenKind::RParen, "Expected ')' after parameters")?;

        let return_type = self.function_return_type(&name)?;

        while self.match_kind(TokenKind::Newline) {}
        self.consume(TokenKind::LBrace, "Expected '{' before method body")?;
        let body = self.block()?;

        Ok(MethodMember {
            name: name.lexeme.clone(),
            parameters,
            return_type,
            body,
            is_public: true,
            is_static: false,
            is_virtual: false,
            is_override: false,
            location: name.location,
        })
    }

    fn struct_declaration(&mut self, is_foreign: bool) -> PResult<Decl> {
        let name = self.consume_identifier("Expected struct name")?;

        self.consume(TokenKind::LBrace, "Expected '{' after struct name")?;

        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            self.skip_newlines();
            if self.check(TokenKind::RBrace) {
                break;
            }

            let field_name = self.consume_identifier("Expected field name")?;
            self.consume(TokenKind::Colon, "Expected ':' after field name")?;
            let field_type = self.parse_type()?;

            fields.push(StructField {
                name: field_name.lexeme,
                ty: field_type,
                location: field_name.location,
            });

            if !self.match_kind(TokenKind::Comma) {
                self.skip_newlines();
            }
        }

        self.consume(TokenKind::RBrace, "Expected '}' after struct body")?;

        Ok(Decl::new(
            DeclKind::Struct(StructDecl {
                name: name.lexeme.clone(),
                fields,
                is_foreign,
                is_exported: false,
            }),
            name.location,
        ))
    }

    fn enum_declaration(&mut self, is_foreign: bool) -> PResult<Decl> {
        let name = self.consume_identifier("Expected enum name")?;

        self.consume(TokenKind::LBrace, "Expected '{' after enum name")?;

        let mut variants = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            self.skip_newlines();
            if self.check(TokenKind::RBrace) {
                break;
            }

            let variant_name = self.consume_identifier("Expected variant name")?;
            variants.push(EnumVariant {
                name: variant_name.lexeme,
                associated_types: Vec::new(),
                location: variant_name.location,
            });

            if !self.match_kind(TokenKind::Comma) {
                self.skip_newlines();
            }
        }

        self.consume(TokenKind::RBrace, "Expected '}' after enum body")?;

        Ok(Decl::new(
            DeclKind::Enum(EnumDecl {
                name: name.lexeme.clone(),
                variants,
                is_foreign,
                is_exported: false,
            }),
            name.location,
        ))
    }

    // ----- parameters and arguments -----

    fn parameter_list(&mut self) -> PResult<Vec<Param>> {
        let mut parameters = Vec::new();
        self.skip_newlines();

        if self.check(TokenKind::RParen) {
            return Ok(parameters);
        }

        loop {
            if self.is_at_end() {
                self.report_error("Expected ')' to close parameter list, but reached end of file");
                return Err(ParseInterrupt);
            }

            parameters.push(self.parameter()?);

            if self.check(TokenKind::RParen) {
                break;
            }
            self.consume(TokenKind::Comma, "Expected ',' after parameter")?;
            self.skip_newlines();
        }

        Ok(parameters)
    }

    fn parameter(&mut self) -> PResult<Param> {
        // `self` needs no type annotation.
        if self.match_kind(TokenKind::SelfKw) {
            let token = self.previous().clone();
            return Ok(Param {
                name: "self".to_string(),
                ty: Type::new(
                    TypeKind::Primitive(TokenKind::SelfKw),
                    token.location.clone(),
                ),
                location: token.location,
            });
        }

        let name = self.consume_identifier("Expected parameter name")?;
        self.consume(TokenKind::Colon, "Expected ':' after parameter name")?;
        let ty = self.parse_type()?;

        Ok(Param {
            name: name.lexeme,
            ty,
            location: name.location,
        })
    }

    fn argument_list(&mut self) -> PResult<Vec<Expr>> {
        let mut arguments = Vec::new();
        self.skip_newlines();

        if self.check(TokenKind::RParen) {
            return Ok(arguments);
        }

        loop {
            if self.is_at_end() {
                self.report_error("Expected ')' to close argument list, but reached end of file");
                return Err(ParseInterrupt);
            }

            arguments.push(self.expression()?);

            if self.check(TokenKind::RParen) {
                break;
            }
            self.consume(TokenKind::Comma, "Expected ',' after argument")?;
            self.skip_newlines();
        }

        Ok(arguments)
    }

    // ----- statements -----

    fn statement(&mut self) -> PResult<Stmt> {
        self.skip_newlines();
        if self.match_kind(TokenKind::If) {
            return self.if_statement();
        }
        if self.match_kind(TokenKind::While) {
            return self.while_statement();
        }
        if self.match_kind(TokenKind::For) {
            return self.for_statement();
        }
        if self.match_kind(TokenKind::Return) {
            return self.return_statement();
        }
        if self.match_kind(TokenKind::LBrace) {
            let location = self.previous().location.clone();
            let statements = self.block()?;
            return Ok(Stmt::new(StmtKind::Block(statements), location));
        }
        self.expression_statement()
    }

    /// Parses the statements of a block whose `{` has been consumed, up to
    /// and including the matching `}`.
    fn block(&mut self) -> PResult<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            self.skip_newlines();
            if self.check(TokenKind::RBrace) || self.is_at_end() {
                break;
            }

            let result = if self.check(TokenKind::Let) || self.check(TokenKind::Const) {
                self.declaration_statement()
            } else {
                self.statement()
            };

            match result {
                Ok(stmt) => statements.push(stmt),
                Err(ParseInterrupt) => self.synchronize_statement(),
            }
        }

        self.consume(TokenKind::RBrace, "Expected '}' after block")?;
        Ok(statements)
    }

    fn declaration_statement(&mut self) -> PResult<Stmt> {
        let location = self.peek().location.clone();
        match self.declaration()? {
            Some(decl) => Ok(Stmt::new(StmtKind::Declaration(Box::new(decl)), location)),
            None => Err(ParseInterrupt),
        }
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        let location = self.previous().location.clone();
        let condition = self.expression()?;
        let then_branch = Box::new(self.statement()?);

        let else_branch = if self.match_kind(TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            location,
        ))
    }

    fn while_statement(&mut self) -> PResult<Stmt> {
        let location = self.previous().location.clone();
        let condition = self.expression()?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::new(StmtKind::While { condition, body }, location))
    }

    fn for_statement(&mut self) -> PResult<Stmt> {
        let binder = self.consume_identifier("Expected iterator name")?;
        self.consume(TokenKind::In, "Expected 'in' after iterator")?;
        let iterable = self.expression()?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::new(
            StmtKind::For {
                binder: binder.lexeme,
                iterable,
                body,
            },
            binder.location,
        ))
    }

    fn return_statement(&mut self) -> PResult<Stmt> {
        let location = self.previous().location.clone();

        let value = if !self.check(TokenKind::Semicolon)
            && !self.check(TokenKind::Newline)
            && !self.check(TokenKind::RBrace)
            && !self.is_at_end()
        {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume_terminator()?;
        Ok(Stmt::new(StmtKind::Return(value), location))
    }

    fn expression_statement(&mut self) -> PResult<Stmt> {
        let expr = self.expression()?;
        let location = expr.location.clone();
        self.consume_terminator()?;
        Ok(Stmt::new(StmtKind::Expression(expr), location))
    }

    // ----- expressions, lowest precedence first -----

    pub fn expression(&mut self) -> PResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> PResult<Expr> {
        let expr = self.as_expression()?;

        if self.match_any(&[
            TokenKind::Assign,
            TokenKind::PlusAssign,
            TokenKind::MinusAssign,
            TokenKind::StarAssign,
            TokenKind::SlashAssign,
            TokenKind::PercentAssign,
        ]) {
            let op = self.previous().kind;
            let value = self.assignment()?; // right associative
            let location = expr.location.clone();
            return Ok(Expr::new(
                ExprKind::Assignment {
                    target: Box::new(expr),
                    op,
                    value: Box::new(value),
                },
                location,
            ));
        }

        Ok(expr)
    }

    fn as_expression(&mut self) -> PResult<Expr> {
        let mut expr = self.logical_or()?;

        while self.match_kind(TokenKind::As) {
            let target = self.parse_type()?;
            let location = expr.location.clone();
            expr = Expr::new(
                ExprKind::As {
                    expr: Box::new(expr),
                    target: Box::new(target),
                },
                location,
            );
        }

        Ok(expr)
    }

    fn binary_loop(
        &mut self,
        operators: &[TokenKind],
        mut next: impl FnMut(&mut Self) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let mut expr = next(self)?;

        while self.match_any(operators) {
            let op = self.previous().kind;
            let right = next(self)?;
            let location = expr.location.clone();
            expr = Expr::new(
                ExprKind::Binary {
                    left: Box::new(expr),
                    op,
                    right: Box::new(right),
                },
                location,
            );
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> PResult<Expr> {
        self.binary_loop(&[TokenKind::OrOr], Self::logical_and)
    }

    fn logical_and(&mut self) -> PResult<Expr> {
        self.binary_loop(&[TokenKind::AndAnd], Self::equality)
    }

    fn equality(&mut self) -> PResult<Expr> {
        self.binary_loop(&[TokenKind::NotEqual, TokenKind::Equal], Self::comparison)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        self.binary_loop(
            &[
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
            ],
            Self::shift,
        )
    }

    fn shift(&mut self) -> PResult<Expr> {
        self.binary_loop(&[TokenKind::Shl, TokenKind::Shr], Self::term)
    }

    fn term(&mut self) -> PResult<Expr> {
        self.binary_loop(&[TokenKind::Minus, TokenKind::Plus], Self::factor)
    }

    fn factor(&mut self) -> PResult<Expr> {
        self.binary_loop(
            &[TokenKind::Slash, TokenKind::Star, TokenKind::Percent],
            Self::power,
        )
    }

    fn power(&mut self) -> PResult<Expr> {
        let expr = self.unary()?;

        if self.match_kind(TokenKind::Power) {
            let right = self.power()?; // right associative
            let location = expr.location.clone();
            return Ok(Expr::new(
                ExprKind::Binary {
                    left: Box::new(expr),
                    op: TokenKind::Power,
                    right: Box::new(right),
                },
                location,
            ));
        }

        Ok(expr)
    }

    fn unary(&mut self) -> PResult<Expr> {
        if self.match_any(&[TokenKind::Not, TokenKind::Minus]) {
            let op = self.previous().kind;
            let location = self.previous().location.clone();
            let operand = self.unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                location,
            ));
        }

        self.call()
    }

    fn call(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_kind(TokenKind::LParen) {
                let arguments = self.argument_list()?;
                self.consume(TokenKind::RParen, "Expected ')' after arguments")?;
                let location = expr.location.clone();
                expr = Expr::new(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        arguments,
                    },
                    location,
                );
            } else if self.match_kind(TokenKind::Dot) {
                let name = self.consume_identifier("Expected property name after '.'")?;
                let location = expr.location.clone();
                expr = Expr::new(
                    ExprKind::Member {
                        object: Box::new(expr),
                        member: name.lexeme,
                    },
                    location,
                );
            } else if self.match_kind(TokenKind::LBracket) {
                let index = self.expression()?;
                self.consume(TokenKind::RBracket, "Expected ']' after index")?;
                let location = expr.location.clone();
                expr = Expr::new(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    location,
                );
            } else if self.match_any(&[TokenKind::Increment, TokenKind::Decrement]) {
                let op = self.previous().kind;
                let location = expr.location.clone();
                expr = Expr::new(
                    ExprKind::Postfix {
                        operand: Box::new(expr),
                        op,
                    },
                    location,
                );
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn primary(&mut self) -> PResult<Expr> {
        if self.match_any(&[TokenKind::Cast, TokenKind::TryCast]) {
            let is_safe = self.previous().kind == TokenKind::TryCast;
            let location = self.previous().location.clone();

            self.consume(TokenKind::Less, "Expected '<' after cast")?;
            let target = self.parse_type()?;
            self.consume(TokenKind::Greater, "Expected '>' after cast type")?;
            self.consume(TokenKind::LParen, "Expected '(' after cast<T>")?;
            let expr = self.expression()?;
            self.consume(TokenKind::RParen, "Expected ')' after cast expression")?;

            return Ok(Expr::new(
                ExprKind::Cast {
                    target: Box::new(target),
                    expr: Box::new(expr),
                    is_safe,
                },
                location,
            ));
        }

        if self.match_any(&[
            TokenKind::BooleanLiteral,
            TokenKind::NullLiteral,
            TokenKind::IntegerLiteral,
            TokenKind::FloatLiteral,
            TokenKind::StringLiteral,
        ]) {
            let token = self.previous().clone();
            let location = token.location.clone();
            return Ok(Expr::new(ExprKind::Literal(token), location));
        }

        if self.match_any(&[TokenKind::Identifier, TokenKind::SelfKw]) {
            let token = self.previous().clone();
            return Ok(Expr::new(
                ExprKind::Identifier(token.lexeme),
                token.location,
            ));
        }

        if self.match_kind(TokenKind::LParen) {
            let expr = self.expression()?;
            self.consume(TokenKind::RParen, "Expected ')' after expression")?;
            return Ok(expr);
        }

        self.report_error("Expected expression");
        Err(ParseInterrupt)
    }

    // ----- types -----

    pub fn parse_type(&mut self) -> PResult<Type> {
        if self.match_kind(TokenKind::Const) {
            let location = self.previous().location.clone();
            let inner = self.parse_type()?;
            return Ok(Type::new(TypeKind::Const(Box::new(inner)), location));
        }

        // Pointer qualifiers nest: `cptr cptr u8`, `shared unique Node`.
        if self.match_any(&[
            TokenKind::Cptr,
            TokenKind::Unique,
            TokenKind::Shared,
            TokenKind::Weak,
        ]) {
            let kind = match self.previous().kind {
                TokenKind::Cptr => PointerKind::Cptr,
                TokenKind::Unique => PointerKind::Unique,
                TokenKind::Shared => PointerKind::Shared,
                _ => PointerKind::Weak,
            };
            let location = self.previous().location.clone();
            let pointee = self.parse_type()?;
            return Ok(Type::new(
                TypeKind::Pointer {
                    kind,
                    pointee: Box::new(pointee),
                },
                location,
            ));
        }

        let base = self.primitive_type()?;

        if self.match_kind(TokenKind::LBracket) {
            let size = match (&self.peek().kind, &self.peek().value) {
                (TokenKind::IntegerLiteral, TokenValue::Int(v)) if *v > 0 => *v as u64,
                _ => {
                    self.report_error("Expected positive array size");
                    return Err(ParseInterrupt);
                }
            };
            self.advance();
            self.consume(TokenKind::RBracket, "Expected ']' after array type")?;
            let location = base.location.clone();
            return Ok(Type::new(
                TypeKind::Array {
                    element: Box::new(base),
                    size,
                },
                location,
            ));
        }

        Ok(base)
    }

    fn primitive_type(&mut self) -> PResult<Type> {
        if self.match_any(&[
            TokenKind::I8,
            TokenKind::I16,
            TokenKind::I32,
            TokenKind::I64,
            TokenKind::U8,
            TokenKind::U16,
            TokenKind::U32,
            TokenKind::U64,
            TokenKind::F32,
            TokenKind::F64,
            TokenKind::Bool,
            TokenKind::String,
            TokenKind::Void,
            TokenKind::SelfKw,
            TokenKind::RawVaList,
        ]) {
            let token = self.previous().clone();
            return Ok(Type::new(TypeKind::Primitive(token.kind), token.location));
        }

        if self.match_kind(TokenKind::Identifier) {
            let name = self.previous().clone();

            if self.match_kind(TokenKind::Less) {
                let mut arguments = Vec::new();
                loop {
                    arguments.push(self.parse_type()?);
                    if !self.match_kind(TokenKind::Comma) {
                        break;
                    }
                }
                self.consume(
                    TokenKind::Greater,
                    "Expected '>' after generic type arguments",
                )?;
                return Ok(Type::new(
                    TypeKind::Generic {
                        base: name.lexeme,
                        arguments,
                    },
                    name.location,
                ));
            }

            return Ok(Type::new(TypeKind::Named(name.lexeme), name.location));
        }

        self.report_error("Expected type");
        Err(ParseInterrupt)
    }
}

fn mark_exported(mut decl: Decl) -> Decl {
    match &mut decl.kind {
        DeclKind::Function(f) => f.is_exported = true,
        DeclKind::Variable(v) => v.is_exported = true,
        DeclKind::Class(c) => c.is_exported = true,
        DeclKind::Struct(s) => s.is_exported = true,
        DeclKind::Enum(e) => e.is_exported = true,
        DeclKind::Import(_) => {}
    }
    decl
}
