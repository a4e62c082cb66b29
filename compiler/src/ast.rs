use crate::diagnostics::SourceLocation;
use crate::token::{Token, TokenKind};

// The AST is a strict tree: every node exclusively owns its children, and
// walks are plain `match`es over the sum types below.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Cptr,
    Unique,
    Shared,
    Weak,
}

#[derive(Debug, Clone)]
pub struct Type {
    pub kind: TypeKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    /// Built-in type keyed by its token kind (`i32`, `bool`, `self`, ...).
    Primitive(TokenKind),
    /// User-defined type referenced by name.
    Named(String),
    Const(Box<Type>),
    Array {
        element: Box<Type>,
        size: u64,
    },
    Pointer {
        kind: PointerKind,
        pointee: Box<Type>,
    },
    Generic {
        base: String,
        arguments: Vec<Type>,
    },
}

impl Type {
    pub fn new(kind: TypeKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(TokenKind::Void))
    }

    /// A bare `raw_va_list` parameter flags the enclosing function variadic.
    pub fn is_raw_va_list(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(TokenKind::RawVaList))
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Wraps the literal token, value payload included.
    Literal(Token),
    Identifier(String),
    Binary {
        left: Box<Expr>,
        op: TokenKind,
        right: Box<Expr>,
    },
    Unary {
        op: TokenKind,
        operand: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        member: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Assignment {
        target: Box<Expr>,
        op: TokenKind,
        value: Box<Expr>,
    },
    Postfix {
        operand: Box<Expr>,
        op: TokenKind,
    },
    Cast {
        target: Box<Type>,
        expr: Box<Expr>,
        /// true for `try_cast`, false for `cast`.
        is_safe: bool,
    },
    As {
        expr: Box<Expr>,
        target: Box<Type>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expression(Expr),
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    For {
        binder: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Declaration(Box<Decl>),
}

impl Stmt {
    pub fn new(kind: StmtKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub parameters: Vec<Param>,
    pub return_type: Type,
    /// None for foreign functions.
    pub body: Option<Vec<Stmt>>,
    pub is_foreign: bool,
    pub is_exported: bool,
}

impl FunctionDecl {
    pub fn is_variadic(&self) -> bool {
        self.parameters.iter().any(|p| p.ty.is_raw_va_list())
    }
}

#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: String,
    /// None means the type is inferred from the initializer.
    pub ty: Option<Type>,
    pub initializer: Option<Expr>,
    pub is_mutable: bool,
    pub is_exported: bool,
}

#[derive(Debug, Clone)]
pub struct FieldMember {
    pub name: String,
    pub ty: Type,
    pub initializer: Option<Expr>,
    pub is_public: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct MethodMember {
    pub name: String,
    pub parameters: Vec<Param>,
    pub return_type: Type,
    pub body: Vec<Stmt>,
    pub is_public: bool,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum ClassMember {
    Field(FieldMember),
    Method(MethodMember),
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub generic_parameters: Vec<String>,
    pub base_class: Option<String>,
    pub members: Vec<ClassMember>,
    pub is_exported: bool,
}

impl ClassDecl {
    /// The constructor is the method named after the class; the parser has
    /// already required its declared return type to be `self`.
    pub fn constructor(&self) -> Option<&MethodMember> {
        self.members.iter().find_map(|m| match m {
            ClassMember::Method(method) if method.name == self.name => Some(method),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<StructField>,
    pub is_foreign: bool,
    pub is_exported: bool,
}

#[derive(Debug, Clone)]
pub struct EnumVariant {
    pub name: String,
    pub associated_types: Vec<Type>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub variants: Vec<EnumVariant>,
    pub is_foreign: bool,
    pub is_exported: bool,
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    /// Path as written, e.g. "cstdlib/stdio".
    pub module_path: String,
    /// Empty when `is_wildcard` is set.
    pub imported_items: Vec<String>,
    pub is_wildcard: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct Decl {
    pub kind: DeclKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Function(FunctionDecl),
    Variable(VariableDecl),
    Class(ClassDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Import(ImportDecl),
}

impl Decl {
    pub fn new(kind: DeclKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

/// One compilation unit: a single source file.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub file_path: String,
    pub imports: Vec<ImportDecl>,
    pub declarations: Vec<Decl>,
}

/// The whole program: every loaded module plus the entry-point module.
/// Modules appear in dependency-load order, dependencies first.
#[derive(Debug, Clone)]
pub struct Program {
    pub modules: Vec<Module>,
    pub main_module: Module,
}
