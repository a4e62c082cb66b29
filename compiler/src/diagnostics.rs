use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::IsTerminal;

/// A position in a source file. Line and column are 1-based and are always
/// derived from the byte offset by scanning the owning source text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub filename: String,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub length: usize,
}

impl SourceLocation {
    pub fn new(
        filename: impl Into<String>,
        line: usize,
        column: usize,
        offset: usize,
        length: usize,
    ) -> Self {
        Self {
            filename: filename.into(),
            line,
            column,
            offset,
            length,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }

    fn ansi_color(self) -> &'static str {
        match self {
            Severity::Info => "\x1b[36m",
            Severity::Warning => "\x1b[33m",
            Severity::Error => "\x1b[31m",
            Severity::Fatal => "\x1b[1;31m",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: SourceLocation,
    pub message: String,
    /// Lexeme of the offending token, if any. Controls the underline width.
    pub lexeme: Option<String>,
}

/// Color policy for diagnostic rendering. `Auto` enables ANSI sequences only
/// when standard error is a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    Always,
    #[default]
    Auto,
    Never,
}

impl ColorMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "always" => Some(ColorMode::Always),
            "auto" => Some(ColorMode::Auto),
            "never" => Some(ColorMode::Never),
            _ => None,
        }
    }

    fn enabled(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stderr().is_terminal(),
        }
    }
}

/// Collects diagnostics across all compilation stages and renders them to
/// standard error. Messages are kept and printed in insertion order.
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    has_errors: bool,
    color: ColorMode,
    sources: HashMap<String, String>,
}

impl DiagnosticEngine {
    pub fn new(color: ColorMode) -> Self {
        Self {
            diagnostics: Vec::new(),
            has_errors: false,
            color,
            sources: HashMap::new(),
        }
    }

    /// Registers a source text so snippets can be rendered without re-reading
    /// the file from disk.
    pub fn add_source(&mut self, filename: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(filename.into(), source.into());
    }

    pub fn report(
        &mut self,
        location: SourceLocation,
        message: impl Into<String>,
        severity: Severity,
        lexeme: Option<String>,
    ) {
        if matches!(severity, Severity::Error | Severity::Fatal) {
            self.has_errors = true;
        }
        self.diagnostics.push(Diagnostic {
            severity,
            location,
            message: message.into(),
            lexeme,
        });
    }

    pub fn error(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.report(location, message, Severity::Error, None);
    }

    pub fn warning(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.report(location, message, Severity::Warning, None);
    }

    pub fn info(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.report(location, message, Severity::Info, None);
    }

    pub fn fatal(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.report(location, message, Severity::Fatal, None);
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d.severity, Severity::Error | Severity::Fatal))
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Renders every diagnostic to standard error, one message per issue,
    /// each terminated by a blank line.
    pub fn print(&self) {
        let colored = self.color.enabled();
        for d in &self.diagnostics {
            eprint!("{}", self.render(d, colored));
        }
    }

    fn render(&self, d: &Diagnostic, colored: bool) -> String {
        let mut out = String::new();
        if colored {
            out.push_str(&format!(
                "{}{}\x1b[0m: {}\n",
                d.severity.ansi_color(),
                d.severity.label(),
                d.message
            ));
        } else {
            out.push_str(&format!("{}: {}\n", d.severity.label(), d.message));
        }
        out.push_str(&format!("--> {}\n", d.location));
        if let Some(snippet) = self.snippet(d) {
            out.push_str(&snippet);
        }
        out.push('\n');
        out
    }

    /// Three-line context snippet: the preceding line (when present), the
    /// offending line, and an underline whose width is max(1, lexeme length).
    fn snippet(&self, d: &Diagnostic) -> Option<String> {
        if d.location.line == 0 || d.location.filename.is_empty() {
            return None;
        }
        let source = match self.sources.get(&d.location.filename) {
            Some(s) => s.clone(),
            None => fs::read_to_string(&d.location.filename).ok()?,
        };
        let lines: Vec<&str> = source.lines().collect();
        let idx = d.location.line - 1;
        let line_text = lines.get(idx)?;

        let mut out = String::new();
        if idx > 0 {
            out.push_str(&format!("{:>4} | {}\n", d.location.line - 1, lines[idx - 1]));
        }
        out.push_str(&format!("{:>4} | {}\n", d.location.line, line_text));

        let width = d.lexeme.as_ref().map(|l| l.len()).unwrap_or(0).max(1);
        let indent = d.location.column.saturating_sub(1);
        let mut underline = String::from("^");
        for _ in 1..width {
            underline.push('~');
        }
        out.push_str(&format!("     | {}{}\n", " ".repeat(indent), underline));
        Some(out)
    }
}
