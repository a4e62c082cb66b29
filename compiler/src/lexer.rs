use crate::diagnostics::{DiagnosticEngine, Severity, SourceLocation};
use crate::token::{keyword_kind, Token, TokenKind, TokenValue};

pub struct Lexer<'a> {
    source: &'a str,
    filename: String,
    len: usize,
    pos: usize,
    diagnostics: &'a mut DiagnosticEngine,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, filename: &str, diagnostics: &'a mut DiagnosticEngine) -> Self {
        Self {
            source,
            filename: filename.to_string(),
            len: source.len(),
            pos: 0,
            diagnostics,
        }
    }

    /// Lexes the whole input. Comment tokens are consumed internally and not
    /// returned; the stream always ends with a single EOF token.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            if token.kind == TokenKind::Comment {
                continue;
            }
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.len
    }

    fn peek_char(&self) -> Option<char> {
        if self.pos < self.len {
            Some(self.source.as_bytes()[self.pos] as char)
        } else {
            None
        }
    }

    fn peek_next_char(&self) -> Option<char> {
        if self.pos + 1 < self.len {
            Some(self.source.as_bytes()[self.pos + 1] as char)
        } else {
            None
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += 1;
        Some(c)
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Line and column are recomputed from the byte offset each time.
    fn location_at(&self, offset: usize) -> SourceLocation {
        let mut line = 1;
        let mut line_start = 0;
        for (i, b) in self.source.as_bytes()[..offset.min(self.len)].iter().enumerate() {
            if *b == b'\n' {
                line += 1;
                line_start = i + 1;
            }
        }
        let length = if self.pos > offset { self.pos - offset } else { 1 };
        SourceLocation::new(&self.filename, line, offset - line_start + 1, offset, length)
    }

    fn make_token(&self, kind: TokenKind, lexeme: &str, start: usize) -> Token {
        Token::new(kind, lexeme, self.location_at(start))
    }

    fn report(&mut self, message: String, start: usize, length: usize) {
        let mut location = self.location_at(start);
        location.length = length;
        self.diagnostics.report(location, message, Severity::Error, None);
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == ' ' || c == '\r' || c == '\t' {
                self.advance();
            } else {
                break;
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.pos;
        let c = match self.advance() {
            Some(c) => c,
            None => return self.make_token(TokenKind::Eof, "", self.pos),
        };

        match c {
            '(' => return self.make_token(TokenKind::LParen, "(", start),
            ')' => return self.make_token(TokenKind::RParen, ")", start),
            '{' => return self.make_token(TokenKind::LBrace, "{", start),
            '}' => return self.make_token(TokenKind::RBrace, "}", start),
            '[' => return self.make_token(TokenKind::LBracket, "[", start),
            ']' => return self.make_token(TokenKind::RBracket, "]", start),
            ',' => return self.make_token(TokenKind::Comma, ",", start),
            ';' => return self.make_token(TokenKind::Semicolon, ";", start),
            '?' => return self.make_token(TokenKind::Question, "?", start),
            '~' => return self.make_token(TokenKind::Tilde, "~", start),
            '^' => return self.make_token(TokenKind::Caret, "^", start),
            '.' => return self.make_token(TokenKind::Dot, ".", start),
            '%' => {
                if self.matches('=') {
                    return self.make_token(TokenKind::PercentAssign, "%=", start);
                }
                return self.make_token(TokenKind::Percent, "%", start);
            }
            _ => {}
        }

        match c {
            '+' => {
                if self.matches('=') {
                    self.make_token(TokenKind::PlusAssign, "+=", start)
                } else if self.matches('+') {
                    self.make_token(TokenKind::Increment, "++", start)
                } else {
                    self.make_token(TokenKind::Plus, "+", start)
                }
            }
            '-' => {
                if self.matches('=') {
                    self.make_token(TokenKind::MinusAssign, "-=", start)
                } else if self.matches('-') {
                    self.make_token(TokenKind::Decrement, "--", start)
                } else if self.matches('>') {
                    self.make_token(TokenKind::Arrow, "->", start)
                } else {
                    self.make_token(TokenKind::Minus, "-", start)
                }
            }
            '*' => {
                if self.matches('=') {
                    self.make_token(TokenKind::StarAssign, "*=", start)
                } else if self.matches('*') {
                    self.make_token(TokenKind::Power, "**", start)
                } else {
                    self.make_token(TokenKind::Star, "*", start)
                }
            }
            '/' => {
                if self.matches('=') {
                    self.make_token(TokenKind::SlashAssign, "/=", start)
                } else if self.matches('/') {
                    self.lex_line_comment(start)
                } else if self.matches('*') {
                    self.lex_block_comment(start)
                } else {
                    self.make_token(TokenKind::Slash, "/", start)
                }
            }
            '!' => {
                if self.matches('=') {
                    self.make_token(TokenKind::NotEqual, "!=", start)
                } else {
                    self.make_token(TokenKind::Not, "!", start)
                }
            }
            '=' => {
                if self.matches('=') {
                    self.make_token(TokenKind::Equal, "==", start)
                } else {
                    self.make_token(TokenKind::Assign, "=", start)
                }
            }
            '<' => {
                if self.matches('=') {
                    self.make_token(TokenKind::LessEqual, "<=", start)
                } else if self.matches('<') {
                    self.make_token(TokenKind::Shl, "<<", start)
                } else {
                    self.make_token(TokenKind::Less, "<", start)
                }
            }
            '>' => {
                if self.matches('=') {
                    self.make_token(TokenKind::GreaterEqual, ">=", start)
                } else if self.matches('>') {
                    self.make_token(TokenKind::Shr, ">>", start)
                } else {
                    self.make_token(TokenKind::Greater, ">", start)
                }
            }
            '&' => {
                if self.matches('&') {
                    self.make_token(TokenKind::AndAnd, "&&", start)
                } else {
                    self.make_token(TokenKind::Ampersand, "&", start)
                }
            }
            '|' => {
                if self.matches('|') {
                    self.make_token(TokenKind::OrOr, "||", start)
                } else {
                    self.make_token(TokenKind::Pipe, "|", start)
                }
            }
            ':' => {
                if self.matches(':') {
                    self.make_token(TokenKind::ColonColon, "::", start)
                } else {
                    self.make_token(TokenKind::Colon, ":", start)
                }
            }
            '"' => {
                self.pos = start;
                self.lex_string()
            }
            '0'..='9' => {
                self.pos = start;
                self.lex_number()
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                self.pos = start;
                self.lex_identifier()
            }
            '\n' => self.make_token(TokenKind::Newline, "\n", start),
            other => {
                self.report(format!("Unexpected character: {}", other), start, 1);
                // Hand the parser a synthetic identifier so it can continue.
                let lexeme = other.to_string();
                self.make_token(TokenKind::Identifier, &lexeme, start)
            }
        }
    }

    fn lex_line_comment(&mut self, start: usize) -> Token {
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        let lexeme = self.source[start..self.pos].to_string();
        self.make_token(TokenKind::Comment, &lexeme, start)
    }

    /// Block comments nest: each `/*` opens another level.
    fn lex_block_comment(&mut self, start: usize) -> Token {
        let mut nesting = 1usize;
        while !self.is_at_end() && nesting > 0 {
            if self.peek_char() == Some('/') && self.peek_next_char() == Some('*') {
                self.advance();
                self.advance();
                nesting += 1;
            } else if self.peek_char() == Some('*') && self.peek_next_char() == Some('/') {
                self.advance();
                self.advance();
                nesting -= 1;
            } else {
                self.advance();
            }
        }

        if nesting > 0 {
            self.report("Unterminated block comment".to_string(), start, self.pos - start);
        }

        let lexeme = self.source[start..self.pos].to_string();
        self.make_token(TokenKind::Comment, &lexeme, start)
    }

    fn lex_string(&mut self) -> Token {
        let start = self.pos;
        self.advance(); // opening quote

        let content_start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == '"' {
                break;
            }
            // An escape pair never terminates the literal, `\"` included.
            if c == '\\' && self.peek_next_char().is_some() {
                self.advance();
            }
            self.advance();
        }
        let content_end = self.pos;

        if self.is_at_end() {
            self.report("Unterminated string".to_string(), start, self.pos - start);
            let lexeme = self.source[start..self.pos].to_string();
            let raw = self.source[content_start..content_end].to_string();
            return Token::with_value(
                TokenKind::StringLiteral,
                lexeme,
                self.location_at(start),
                TokenValue::Str(raw),
            );
        }

        self.advance(); // closing quote
        let lexeme = self.source[start..self.pos].to_string();
        let raw = self.source[content_start..content_end].to_string();
        let processed = self.unescape(&raw, start);
        Token::with_value(
            TokenKind::StringLiteral,
            lexeme,
            self.location_at(start),
            TokenValue::Str(processed),
        )
    }

    fn unescape(&mut self, raw: &str, string_start: usize) -> String {
        let mut out = String::with_capacity(raw.len());
        let mut chars = raw.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some('0') => out.push('\0'),
                Some(other) => {
                    self.report(
                        format!("Unknown escape sequence: \\{}", other),
                        string_start,
                        self.pos - string_start,
                    );
                    out.push(other);
                }
                None => out.push('\\'),
            }
        }
        out
    }

    fn lex_number(&mut self) -> Token {
        let start = self.pos;

        while matches!(self.peek_char(), Some('0'..='9')) {
            self.advance();
        }

        let mut is_float = false;
        if self.peek_char() == Some('.') && matches!(self.peek_next_char(), Some('0'..='9')) {
            is_float = true;
            self.advance();
            while matches!(self.peek_char(), Some('0'..='9')) {
                self.advance();
            }
        }

        // Optional alphanumeric type suffix (i8..u64, f32, f64).
        let number_end = self.pos;
        if matches!(self.peek_char(), Some('a'..='z' | 'A'..='Z' | '_')) {
            while matches!(
                self.peek_char(),
                Some('a'..='z' | 'A'..='Z' | '0'..='9' | '_')
            ) {
                self.advance();
            }
        }

        let lexeme = self.source[start..self.pos].to_string();
        let number_part = &self.source[start..number_end];

        if is_float {
            match number_part.parse::<f64>() {
                Ok(value) => Token::with_value(
                    TokenKind::FloatLiteral,
                    lexeme,
                    self.location_at(start),
                    TokenValue::Float(value),
                ),
                Err(_) => {
                    self.report(
                        format!("Invalid number format: {}", lexeme),
                        start,
                        self.pos - start,
                    );
                    Token::with_value(
                        TokenKind::FloatLiteral,
                        lexeme,
                        self.location_at(start),
                        TokenValue::Float(0.0),
                    )
                }
            }
        } else {
            match number_part.parse::<i64>() {
                Ok(value) => Token::with_value(
                    TokenKind::IntegerLiteral,
                    lexeme,
                    self.location_at(start),
                    TokenValue::Int(value),
                ),
                Err(_) => {
                    self.report(
                        format!("Invalid number format: {}", lexeme),
                        start,
                        self.pos - start,
                    );
                    Token::with_value(
                        TokenKind::IntegerLiteral,
                        lexeme,
                        self.location_at(start),
                        TokenValue::Int(0),
                    )
                }
            }
        }
    }

    fn lex_identifier(&mut self) -> Token {
        let start = self.pos;
        while matches!(
            self.peek_char(),
            Some('a'..='z' | 'A'..='Z' | '0'..='9' | '_')
        ) {
            self.advance();
        }

        let lexeme = self.source[start..self.pos].to_string();
        match keyword_kind(&lexeme) {
            Some(TokenKind::True) => Token::with_value(
                TokenKind::BooleanLiteral,
                lexeme,
                self.location_at(start),
                TokenValue::Bool(true),
            ),
            Some(TokenKind::False) => Token::with_value(
                TokenKind::BooleanLiteral,
                lexeme,
                self.location_at(start),
                TokenValue::Bool(false),
            ),
            Some(TokenKind::Null) => self.make_token(TokenKind::NullLiteral, &lexeme, start),
            Some(kind) => self.make_token(kind, &lexeme, start),
            None => self.make_token(TokenKind::Identifier, &lexeme, start),
        }
    }
}

/// Convenience wrapper used by the driver and tests.
pub fn tokenize(source: &str, filename: &str, diagnostics: &mut DiagnosticEngine) -> Vec<Token> {
    Lexer::new(source, filename, diagnostics).tokenize()
}
