use crate::diagnostics::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    IntegerLiteral,
    FloatLiteral,
    StringLiteral,
    BooleanLiteral,
    NullLiteral,

    Identifier,

    // Keywords
    Fn,
    Class,
    Struct,
    Enum,
    If,
    Else,
    While,
    For,
    In,
    Return,
    Let,
    Mut,
    Const,
    True,
    False,
    Null,
    New,
    Delete,
    This,
    Super,
    Impl,
    Trait,
    Switch,
    Case,
    Import,
    Export,
    Module,
    Pub,
    Priv,
    Static,
    Virtual,
    Override,
    Abstract,
    Operator,
    SelfKw,
    Cast,
    TryCast,
    As,
    Type,

    // Type keywords
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    String,
    Void,
    Unique,
    Shared,
    Weak,
    Foreign,
    Cptr,
    RawVaList,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AndAnd,
    OrOr,
    Not,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    Increment,
    Decrement,
    Power,
    ColonColon,
    Dot,
    Arrow,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Colon,
    Question,

    // Special
    Eof,
    Newline,
    Comment,
}

impl TokenKind {
    /// Upper-case token name used by the `--tokens` dump.
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::IntegerLiteral => "INTEGER_LITERAL",
            TokenKind::FloatLiteral => "FLOAT_LITERAL",
            TokenKind::StringLiteral => "STRING_LITERAL",
            TokenKind::BooleanLiteral => "BOOLEAN_LITERAL",
            TokenKind::NullLiteral => "NULL_LITERAL",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Fn => "FN",
            TokenKind::Class => "CLASS",
            TokenKind::Struct => "STRUCT",
            TokenKind::Enum => "ENUM",
            TokenKind::If => "IF",
            TokenKind::Else => "ELSE",
            TokenKind::While => "WHILE",
            TokenKind::For => "FOR",
            TokenKind::In => "IN",
            TokenKind::Return => "RETURN",
            TokenKind::Let => "LET",
            TokenKind::Mut => "MUT",
            TokenKind::Const => "CONST",
            TokenKind::True => "TRUE",
            TokenKind::False => "FALSE",
            TokenKind::Null => "NULL",
            TokenKind::New => "NEW",
            TokenKind::Delete => "DELETE",
            TokenKind::This => "THIS",
            TokenKind::Super => "SUPER",
            TokenKind::Impl => "IMPL",
            TokenKind::Trait => "TRAIT",
            TokenKind::Switch => "SWITCH",
            TokenKind::Case => "CASE",
            TokenKind::Import => "IMPORT",
            TokenKind::Export => "EXPORT",
            TokenKind::Module => "MODULE",
            TokenKind::Pub => "PUB",
            TokenKind::Priv => "PRIV",
            TokenKind::Static => "STATIC",
            TokenKind::Virtual => "VIRTUAL",
            TokenKind::Override => "OVERRIDE",
            TokenKind::Abstract => "ABSTRACT",
            TokenKind::Operator => "OPERATOR",
            TokenKind::SelfKw => "SELF",
            TokenKind::Cast => "CAST",
            TokenKind::TryCast => "TRY_CAST",
            TokenKind::As => "AS",
            TokenKind::Type => "TYPE",
            TokenKind::I8 => "I8",
            TokenKind::I16 => "I16",
            TokenKind::I32 => "I32",
            TokenKind::I64 => "I64",
            TokenKind::U8 => "U8",
            TokenKind::U16 => "U16",
            TokenKind::U32 => "U32",
            TokenKind::U64 => "U64",
            TokenKind::F32 => "F32",
            TokenKind::F64 => "F64",
            TokenKind::Bool => "BOOL",
            TokenKind::String => "STRING",
            TokenKind::Void => "VOID",
            TokenKind::Unique => "UNIQUE",
            TokenKind::Shared => "SHARED",
            TokenKind::Weak => "WEAK",
            TokenKind::Foreign => "FOREIGN",
            TokenKind::Cptr => "CPTR",
            TokenKind::RawVaList => "RAW_VA_LIST",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Star => "MULTIPLY",
            TokenKind::Slash => "DIVIDE",
            TokenKind::Percent => "MODULO",
            TokenKind::Assign => "ASSIGN",
            TokenKind::PlusAssign => "PLUS_ASSIGN",
            TokenKind::MinusAssign => "MINUS_ASSIGN",
            TokenKind::StarAssign => "MULTIPLY_ASSIGN",
            TokenKind::SlashAssign => "DIVIDE_ASSIGN",
            TokenKind::PercentAssign => "MODULO_ASSIGN",
            TokenKind::Equal => "EQUAL",
            TokenKind::NotEqual => "NOT_EQUAL",
            TokenKind::Less => "LESS",
            TokenKind::LessEqual => "LESS_EQUAL",
            TokenKind::Greater => "GREATER",
            TokenKind::GreaterEqual => "GREATER_EQUAL",
            TokenKind::AndAnd => "LOGICAL_AND",
            TokenKind::OrOr => "LOGICAL_OR",
            TokenKind::Not => "LOGICAL_NOT",
            TokenKind::Ampersand => "BITWISE_AND",
            TokenKind::Pipe => "BITWISE_OR",
            TokenKind::Caret => "BITWISE_XOR",
            TokenKind::Tilde => "BITWISE_NOT",
            TokenKind::Shl => "BITWISE_LEFT_SHIFT",
            TokenKind::Shr => "BITWISE_RIGHT_SHIFT",
            TokenKind::Increment => "INCREMENT",
            TokenKind::Decrement => "DECREMENT",
            TokenKind::Power => "POWER",
            TokenKind::ColonColon => "SCOPE_RESOLUTION",
            TokenKind::Dot => "MEMBER_ACCESS",
            TokenKind::Arrow => "ARROW",
            TokenKind::LParen => "LEFT_PAREN",
            TokenKind::RParen => "RIGHT_PAREN",
            TokenKind::LBrace => "LEFT_BRACE",
            TokenKind::RBrace => "RIGHT_BRACE",
            TokenKind::LBracket => "LEFT_BRACKET",
            TokenKind::RBracket => "RIGHT_BRACKET",
            TokenKind::Semicolon => "SEMICOLON",
            TokenKind::Comma => "COMMA",
            TokenKind::Colon => "COLON",
            TokenKind::Question => "QUESTION",
            TokenKind::Eof => "EOF",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Comment => "COMMENT",
        }
    }
}

/// Payload carried by literal tokens. Every other token carries `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TokenValue {
    #[default]
    None,
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Processed string contents with escape sequences resolved. The raw
    /// quoted span stays in the lexeme.
    Str(String),
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub location: SourceLocation,
    pub value: TokenValue,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            location,
            value: TokenValue::None,
        }
    }

    pub fn with_value(
        kind: TokenKind,
        lexeme: impl Into<String>,
        location: SourceLocation,
        value: TokenValue,
    ) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            location,
            value,
        }
    }

    pub fn describe(&self) -> String {
        format!("{} '{}' at {}", self.kind.name(), self.lexeme, self.location)
    }
}

/// Maps an identifier to its keyword kind, if it is one. `true`, `false` and
/// `null` are resolved to literal kinds by the lexer itself.
pub fn keyword_kind(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "fn" => TokenKind::Fn,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "in" => TokenKind::In,
        "return" => TokenKind::Return,
        "switch" => TokenKind::Switch,
        "case" => TokenKind::Case,
        "class" => TokenKind::Class,
        "struct" => TokenKind::Struct,
        "enum" => TokenKind::Enum,
        "let" => TokenKind::Let,
        "mut" => TokenKind::Mut,
        "const" => TokenKind::Const,
        "this" => TokenKind::This,
        "super" => TokenKind::Super,
        "impl" => TokenKind::Impl,
        "trait" => TokenKind::Trait,
        "virtual" => TokenKind::Virtual,
        "override" => TokenKind::Override,
        "abstract" => TokenKind::Abstract,
        "operator" => TokenKind::Operator,
        "self" => TokenKind::SelfKw,
        "cast" => TokenKind::Cast,
        "try_cast" => TokenKind::TryCast,
        "as" => TokenKind::As,
        "new" => TokenKind::New,
        "delete" => TokenKind::Delete,
        "pub" => TokenKind::Pub,
        "priv" => TokenKind::Priv,
        "static" => TokenKind::Static,
        "import" => TokenKind::Import,
        "export" => TokenKind::Export,
        "module" => TokenKind::Module,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "i8" => TokenKind::I8,
        "i16" => TokenKind::I16,
        "i32" => TokenKind::I32,
        "i64" => TokenKind::I64,
        "u8" => TokenKind::U8,
        "u16" => TokenKind::U16,
        "u32" => TokenKind::U32,
        "u64" => TokenKind::U64,
        "f32" => TokenKind::F32,
        "f64" => TokenKind::F64,
        "bool" => TokenKind::Bool,
        "string" => TokenKind::String,
        "void" => TokenKind::Void,
        "unique" => TokenKind::Unique,
        "shared" => TokenKind::Shared,
        "weak" => TokenKind::Weak,
        "foreign" => TokenKind::Foreign,
        "cptr" => TokenKind::Cptr,
        "raw_va_list" => TokenKind::RawVaList,
        "type" => TokenKind::Type,
        _ => return None,
    };
    Some(kind)
}
