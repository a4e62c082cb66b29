use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::ast::*;
use crate::diagnostics::{DiagnosticEngine, SourceLocation};
use crate::token::{Token, TokenKind, TokenValue};

// ---------------------------------------------------------------------------
// Semantic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SemanticTypeKind {
    Primitive(String),
    Array(Box<SemanticType>),
    Pointer {
        kind: String,
        pointee: Box<SemanticType>,
    },
    Function {
        parameters: Vec<SemanticType>,
        return_type: Box<SemanticType>,
    },
    Void,
    /// Compatible with everything; suppresses cascading errors.
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticType {
    pub kind: SemanticTypeKind,
    pub is_const: bool,
}

const INTEGER_TYPE_NAMES: &[&str] = &["i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64"];
const FLOAT_TYPE_NAMES: &[&str] = &["f32", "f64"];
const CASTABLE_TYPE_NAMES: &[&str] = &[
    "i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64", "f32", "f64", "bool", "string",
];

pub fn is_integer_name(name: &str) -> bool {
    INTEGER_TYPE_NAMES.contains(&name)
}

pub fn is_float_name(name: &str) -> bool {
    FLOAT_TYPE_NAMES.contains(&name)
}

pub fn is_numeric_name(name: &str) -> bool {
    is_integer_name(name) || is_float_name(name)
}

impl SemanticType {
    pub fn primitive(name: impl Into<String>) -> Self {
        Self {
            kind: SemanticTypeKind::Primitive(name.into()),
            is_const: false,
        }
    }

    pub fn array(element: SemanticType) -> Self {
        Self {
            kind: SemanticTypeKind::Array(Box::new(element)),
            is_const: false,
        }
    }

    pub fn pointer(kind: impl Into<String>, pointee: SemanticType) -> Self {
        Self {
            kind: SemanticTypeKind::Pointer {
                kind: kind.into(),
                pointee: Box::new(pointee),
            },
            is_const: false,
        }
    }

    pub fn function(parameters: Vec<SemanticType>, return_type: SemanticType) -> Self {
        Self {
            kind: SemanticTypeKind::Function {
                parameters,
                return_type: Box::new(return_type),
            },
            is_const: false,
        }
    }

    pub fn void() -> Self {
        Self {
            kind: SemanticTypeKind::Void,
            is_const: false,
        }
    }

    pub fn error() -> Self {
        Self {
            kind: SemanticTypeKind::Error,
            is_const: false,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, SemanticTypeKind::Error)
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, SemanticTypeKind::Void)
    }

    pub fn primitive_name(&self) -> Option<&str> {
        match &self.kind {
            SemanticTypeKind::Primitive(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.primitive_name().is_some_and(is_integer_name)
    }

    pub fn is_float(&self) -> bool {
        self.primitive_name().is_some_and(is_float_name)
    }

    pub fn is_numeric(&self) -> bool {
        self.primitive_name().is_some_and(is_numeric_name)
    }

    pub fn is_bool(&self) -> bool {
        self.primitive_name() == Some("bool")
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, SemanticTypeKind::Pointer { .. })
    }

    /// Width-based rank used by the usual arithmetic conversions:
    /// 8-bit -> 1, 16-bit -> 2, 32-bit -> 3, 64-bit -> 4.
    pub fn numeric_rank(&self) -> Option<u32> {
        match self.primitive_name()? {
            "i8" | "u8" => Some(1),
            "i16" | "u16" => Some(2),
            "i32" | "u32" | "f32" => Some(3),
            "i64" | "u64" | "f64" => Some(4),
            _ => None,
        }
    }

    pub fn is_compatible_with(&self, other: &SemanticType) -> bool {
        match (&self.kind, &other.kind) {
            (SemanticTypeKind::Error, _) | (_, SemanticTypeKind::Error) => true,
            (SemanticTypeKind::Primitive(a), SemanticTypeKind::Primitive(b)) => a == b,
            (SemanticTypeKind::Void, SemanticTypeKind::Void) => true,
            (SemanticTypeKind::Array(a), SemanticTypeKind::Array(b)) => a.is_compatible_with(b),
            // Pointer compatibility is structural; the pointer kind is not
            // part of the comparison.
            (
                SemanticTypeKind::Pointer { pointee: a, .. },
                SemanticTypeKind::Pointer { pointee: b, .. },
            ) => a.is_compatible_with(b),
            (
                SemanticTypeKind::Function {
                    parameters: pa,
                    return_type: ra,
                },
                SemanticTypeKind::Function {
                    parameters: pb,
                    return_type: rb,
                },
            ) => {
                ra.is_compatible_with(rb)
                    && pa.len() == pb.len()
                    && pa.iter().zip(pb.iter()).all(|(a, b)| a.is_compatible_with(b))
            }
            _ => false,
        }
    }

    /// The usual arithmetic conversions: float-dominant, otherwise the wider
    /// integer by rank. On an equal-rank signed/unsigned pair the unsigned
    /// operand wins, keeping the result symmetric.
    pub fn common_numeric(a: &SemanticType, b: &SemanticType) -> Option<SemanticType> {
        let an = a.primitive_name()?;
        let bn = b.primitive_name()?;
        if !is_numeric_name(an) || !is_numeric_name(bn) {
            return None;
        }

        if is_float_name(an) || is_float_name(bn) {
            if an == "f64" || bn == "f64" {
                return Some(SemanticType::primitive("f64"));
            }
            if an == "f32" {
                return Some(SemanticType::primitive("f32"));
            }
            if bn == "f32" {
                return Some(SemanticType::primitive("f32"));
            }
        }

        let ar = a.numeric_rank()?;
        let br = b.numeric_rank()?;
        if ar > br {
            Some(SemanticType::primitive(an))
        } else if br > ar {
            Some(SemanticType::primitive(bn))
        } else if an.starts_with('u') {
            Some(SemanticType::primitive(an))
        } else {
            Some(SemanticType::primitive(bn))
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SemanticTypeKind::Primitive(name) => write!(f, "{}", name),
            SemanticTypeKind::Void => write!(f, "void"),
            SemanticTypeKind::Array(element) => write!(f, "[{}]", element),
            SemanticTypeKind::Pointer { pointee, .. } => write!(f, "*{}", pointee),
            SemanticTypeKind::Function {
                parameters,
                return_type,
            } => {
                write!(f, "fn(")?;
                for (i, p) in parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", return_type)
            }
            SemanticTypeKind::Error => write!(f, "<error>"),
        }
    }
}

/// Integer literals default to i32, widen to i64 past 32-bit signed range,
/// and a type suffix on the lexeme overrides both.
pub fn integer_literal_type_name(lexeme: &str, value: i64) -> &'static str {
    match literal_suffix(lexeme) {
        Some("i8") => "i8",
        Some("i16") => "i16",
        Some("i32") => "i32",
        Some("i64") => "i64",
        Some("u8") => "u8",
        Some("u16") => "u16",
        Some("u32") => "u32",
        Some("u64") => "u64",
        _ => {
            if value > i32::MAX as i64 {
                "i64"
            } else {
                "i32"
            }
        }
    }
}

/// Float literals default to f64; an `f32` suffix overrides.
pub fn float_literal_is_f32(lexeme: &str) -> bool {
    literal_suffix(lexeme) == Some("f32")
}

fn literal_suffix(lexeme: &str) -> Option<&str> {
    let bytes = lexeme.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() {
        Some(&lexeme[i..])
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Symbols and scopes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: SemanticType,
    pub is_mutable: bool,
    pub is_initialized: bool,
    /// Module that declared this symbol; empty for built-ins and locals.
    pub declared_module: String,
    pub is_exported: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub symbols: HashMap<String, Symbol>,
}

#[derive(Debug, Clone)]
pub struct ImportInfo {
    pub module_path: String,
    pub items: Vec<String>,
    pub is_wildcard: bool,
}

// ---------------------------------------------------------------------------
// Type checker
// ---------------------------------------------------------------------------

/// Walks the program, resolves names against a scope arena and assigns a
/// semantic type to every expression it visits. Scopes live in a `Vec` and
/// are addressed by index; `current_scope` moves down on enter and back to
/// the parent index on exit.
pub struct TypeChecker<'a> {
    diagnostics: &'a mut DiagnosticEngine,
    scopes: Vec<Scope>,
    current_scope: ScopeId,
    current_return_type: Option<SemanticType>,
    current_module: String,
    module_imports: HashMap<String, Vec<ImportInfo>>,
    exports: HashMap<String, HashMap<String, Symbol>>,
    type_names: HashSet<String>,
}

const GLOBAL_SCOPE: ScopeId = ScopeId(0);

impl<'a> TypeChecker<'a> {
    pub fn new(diagnostics: &'a mut DiagnosticEngine) -> Self {
        Self {
            diagnostics,
            scopes: vec![Scope {
                parent: None,
                symbols: HashMap::new(),
            }],
            current_scope: GLOBAL_SCOPE,
            current_return_type: None,
            current_module: String::new(),
            module_imports: HashMap::new(),
            exports: HashMap::new(),
            type_names: HashSet::new(),
        }
    }

    pub fn analyze(&mut self, program: &Program) {
        // Pass A: walk every module (loader order), then the entry module,
        // populating the global scope.
        for module in &program.modules {
            self.check_module(module);
        }
        self.check_module(&program.main_module);

        // Pass B: collect each module's exported symbols.
        for module in &program.modules {
            self.collect_module_exports(&module.name);
        }
        self.collect_module_exports(&program.main_module.name);
    }

    /// Export table: module name -> (symbol name -> exported symbol copy).
    pub fn exports(&self) -> &HashMap<String, HashMap<String, Symbol>> {
        &self.exports
    }

    /// Names of classes, structs and enums seen during analysis. The code
    /// generator uses this instead of guessing from capitalization.
    pub fn into_type_names(self) -> HashSet<String> {
        self.type_names
    }

    // ----- scopes -----

    fn enter_scope(&mut self) {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(self.current_scope),
            symbols: HashMap::new(),
        });
        self.current_scope = id;
    }

    fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current_scope.0].parent {
            self.current_scope = parent;
        }
    }

    fn define(&mut self, name: &str, symbol: Symbol) {
        self.scopes[self.current_scope.0]
            .symbols
            .insert(name.to_string(), symbol);
    }

    fn is_defined_in_current_scope(&self, name: &str) -> bool {
        self.scopes[self.current_scope.0].symbols.contains_key(name)
    }

    /// Walks the scope chain innermost-first; the first hit wins, and a hit
    /// that is not visible from the current module is treated as undefined.
    fn lookup(&self, name: &str) -> Option<&Symbol> {
        let mut scope = self.current_scope;
        loop {
            if let Some(symbol) = self.scopes[scope.0].symbols.get(name) {
                if self.is_symbol_visible(symbol) {
                    return Some(symbol);
                }
                return None;
            }
            scope = self.scopes[scope.0].parent?;
        }
    }

    fn is_symbol_visible(&self, symbol: &Symbol) -> bool {
        if symbol.declared_module.is_empty() || symbol.declared_module == self.current_module {
            return true;
        }
        if !symbol.is_exported {
            return false;
        }
        self.module_imports
            .get(&self.current_module)
            .map(|imports| {
                imports.iter().any(|import| {
                    import.module_path == symbol.declared_module
                        && (import.is_wildcard || import.items.iter().any(|i| i == &symbol.name))
                })
            })
            .unwrap_or(false)
    }

    fn declared_module_for_current_scope(&self) -> String {
        if self.current_scope == GLOBAL_SCOPE {
            self.current_module.clone()
        } else {
            String::new()
        }
    }

    // ----- modules -----

    fn check_module(&mut self, module: &Module) {
        self.current_module = module.name.clone();

        let imports = module
            .imports
            .iter()
            .map(|i| ImportInfo {
                module_path: i.module_path.clone(),
                items: i.imported_items.clone(),
                is_wildcard: i.is_wildcard,
            })
            .collect();
        self.module_imports.insert(module.name.clone(), imports);

        for decl in &module.declarations {
            self.check_decl(decl);
        }
    }

    fn collect_module_exports(&mut self, module_name: &str) {
        let mut exported = HashMap::new();
        for (name, symbol) in &self.scopes[GLOBAL_SCOPE.0].symbols {
            if symbol.is_exported && symbol.declared_module == module_name {
                exported.insert(name.clone(), symbol.clone());
            }
        }
        self.exports.insert(module_name.to_string(), exported);
    }

    // ----- declarations -----

    fn check_decl(&mut self, decl: &Decl) {
        match &decl.kind {
            DeclKind::Function(f) => self.check_function(f, &decl.location),
            DeclKind::Variable(v) => self.check_variable(v, &decl.location),
            DeclKind::Class(c) => self.check_class(c, &decl.location),
            DeclKind::Struct(s) => self.check_struct(s, &decl.location),
            DeclKind::Enum(e) => self.check_enum(e, &decl.location),
            // Symbol injection for imports happens through the visibility
            // check; the declaration itself needs no analysis.
            DeclKind::Import(_) => {}
        }
    }

    fn check_function(&mut self, f: &FunctionDecl, location: &SourceLocation) {
        let param_types: Vec<SemanticType> = f
            .parameters
            .iter()
            .map(|p| self.convert_type(&p.ty))
            .collect();
        let return_type = self.convert_type(&f.return_type);

        let function_type = SemanticType::function(param_types, return_type.clone());
        let declared_module = self.declared_module_for_current_scope();
        self.define(
            &f.name,
            Symbol {
                name: f.name.clone(),
                ty: function_type,
                is_mutable: false,
                is_initialized: true,
                declared_module,
                is_exported: f.is_exported,
                location: location.clone(),
            },
        );

        if f.is_foreign {
            return;
        }
        let Some(body) = &f.body else { return };

        self.enter_scope();
        for param in &f.parameters {
            let param_type = self.convert_type(&param.ty);
            self.define(
                &param.name,
                Symbol {
                    name: param.name.clone(),
                    ty: param_type,
                    is_mutable: false,
                    is_initialized: true,
                    declared_module: String::new(),
                    is_exported: false,
                    location: param.location.clone(),
                },
            );
        }

        let old_return = self.current_return_type.replace(return_type);
        for stmt in body {
            self.check_stmt(stmt);
        }
        self.current_return_type = old_return;
        self.exit_scope();
    }

    fn check_variable(&mut self, v: &VariableDecl, location: &SourceLocation) {
        let declared = v.ty.as_ref().map(|t| self.convert_type(t));
        let init_type = v.initializer.as_ref().map(|e| self.check_expr(e));

        let var_type = match (declared, init_type) {
            (Some(declared), Some(init)) => {
                if !self.is_implicitly_convertible(&init, &declared) {
                    self.diagnostics.error(
                        location.clone(),
                        format!(
                            "Type mismatch in variable initialization: expected {}, got {}",
                            declared, init
                        ),
                    );
                }
                declared
            }
            (Some(declared), None) => declared,
            (None, Some(init)) => init,
            (None, None) => {
                self.diagnostics.error(
                    location.clone(),
                    format!("Cannot infer type for variable {}", v.name),
                );
                SemanticType::error()
            }
        };

        if self.is_defined_in_current_scope(&v.name) {
            self.diagnostics.error(
                location.clone(),
                format!("Redefinition of variable {}", v.name),
            );
            return;
        }

        let declared_module = self.declared_module_for_current_scope();
        self.define(
            &v.name,
            Symbol {
                name: v.name.clone(),
                ty: var_type,
                is_mutable: v.is_mutable,
                is_initialized: v.initializer.is_some(),
                declared_module,
                is_exported: v.is_exported,
                location: location.clone(),
            },
        );
    }

    fn check_class(&mut self, c: &ClassDecl, location: &SourceLocation) {
        self.type_names.insert(c.name.clone());
        let declared_module = self.declared_module_for_current_scope();

        self.define(
            &c.name,
            Symbol {
                name: c.name.clone(),
                ty: SemanticType::primitive(c.name.clone()),
                is_mutable: false,
                is_initialized: true,
                declared_module: declared_module.clone(),
                is_exported: c.is_exported,
                location: location.clone(),
            },
        );

        // The class name doubles as its constructor function.
        let constructor_params: Vec<SemanticType> = c
            .constructor()
            .map(|ctor| {
                ctor.parameters
                    .iter()
                    .map(|p| self.convert_type(&p.ty))
                    .collect()
            })
            .unwrap_or_default();
        let constructor_type =
            SemanticType::function(constructor_params, SemanticType::primitive(c.name.clone()));
        self.define(
            &c.name,
            Symbol {
                name: c.name.clone(),
                ty: constructor_type,
                is_mutable: false,
                is_initialized: true,
                declared_module,
                is_exported: c.is_exported,
                location: location.clone(),
            },
        );

        self.enter_scope();
        for member in &c.members {
            match member {
                ClassMember::Method(method) => self.check_method(c, method),
                ClassMember::Field(field) => {
                    let field_type = self.convert_type(&field.ty);
                    if field_type.is_error() {
                        self.diagnostics.error(
                            field.location.clone(),
                            format!("Invalid field type: {}", field.name),
                        );
                    }
                }
            }
        }
        self.exit_scope();
    }

    fn check_method(&mut self, class: &ClassDecl, method: &MethodMember) {
        let param_types: Vec<SemanticType> = method
            .parameters
            .iter()
            .map(|p| self.method_param_type(class, p))
            .collect();

        // A declared return of `self` means the enclosing class.
        let mut return_type = self.convert_type(&method.return_type);
        if return_type.primitive_name() == Some("self") {
            return_type = SemanticType::primitive(class.name.clone());
        }

        let method_type = SemanticType::function(param_types, return_type.clone());
        self.define(
            &method.name,
            Symbol {
                name: method.name.clone(),
                ty: method_type,
                is_mutable: false,
                is_initialized: true,
                declared_module: String::new(),
                is_exported: false,
                location: method.location.clone(),
            },
        );

        self.enter_scope();
        for param in &method.parameters {
            let param_type = self.method_param_type(class, param);
            self.define(
                &param.name,
                Symbol {
                    name: param.name.clone(),
                    ty: param_type,
                    is_mutable: false,
                    is_initialized: true,
                    declared_module: String::new(),
                    is_exported: false,
                    location: param.location.clone(),
                },
            );
        }

        let is_constructor = method.name == class.name;
        if is_constructor && !method.parameters.iter().any(|p| p.name == "self") {
            self.define(
                "self",
                Symbol {
                    name: "self".to_string(),
                    ty: SemanticType::primitive(class.name.clone()),
                    is_mutable: true,
                    is_initialized: true,
                    declared_module: String::new(),
                    is_exported: false,
                    location: method.location.clone(),
                },
            );
        }

        let old_return = self.current_return_type.replace(return_type);
        for stmt in &method.body {
            self.check_stmt(stmt);
        }
        self.current_return_type = old_return;
        self.exit_scope();
    }

    fn method_param_type(&mut self, class: &ClassDecl, param: &Param) -> SemanticType {
        if param.name == "self" {
            SemanticType::primitive(class.name.clone())
        } else {
            self.convert_type(&param.ty)
        }
    }

    fn check_struct(&mut self, s: &StructDecl, location: &SourceLocation) {
        self.type_names.insert(s.name.clone());
        let declared_module = self.declared_module_for_current_scope();
        self.define(
            &s.name,
            Symbol {
                name: s.name.clone(),
                ty: SemanticType::primitive(s.name.clone()),
                is_mutable: false,
                is_initialized: true,
                declared_module,
                is_exported: s.is_exported,
                location: location.clone(),
            },
        );

        for field in &s.fields {
            let field_type = self.convert_type(&field.ty);
            if field_type.is_error() {
                self.diagnostics.error(
                    field.location.clone(),
                    format!("Invalid field type: {}", field.name),
                );
            }
        }
    }

    fn check_enum(&mut self, e: &EnumDecl, location: &SourceLocation) {
        self.type_names.insert(e.name.clone());
        let declared_module = self.declared_module_for_current_scope();
        self.define(
            &e.name,
            Symbol {
                name: e.name.clone(),
                ty: SemanticType::primitive(e.name.clone()),
                is_mutable: false,
                is_initialized: true,
                declared_module: declared_module.clone(),
                is_exported: e.is_exported,
                location: location.clone(),
            },
        );

        // Each variant becomes a constant of the enum type.
        for variant in &e.variants {
            self.define(
                &variant.name,
                Symbol {
                    name: variant.name.clone(),
                    ty: SemanticType::primitive(e.name.clone()),
                    is_mutable: false,
                    is_initialized: true,
                    declared_module: declared_module.clone(),
                    is_exported: e.is_exported,
                    location: variant.location.clone(),
                },
            );
        }
    }

    // ----- statements -----

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.check_expr(expr);
            }
            StmtKind::Block(statements) => {
                self.enter_scope();
                for s in statements {
                    self.check_stmt(s);
                }
                self.exit_scope();
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond_type = self.check_expr(condition);
                if !cond_type.is_compatible_with(&SemanticType::primitive("bool")) {
                    self.diagnostics
                        .error(condition.location.clone(), "If condition must be boolean");
                }
                self.check_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch);
                }
            }
            StmtKind::While { condition, body } => {
                let cond_type = self.check_expr(condition);
                if !cond_type.is_compatible_with(&SemanticType::primitive("bool")) {
                    self.diagnostics
                        .error(condition.location.clone(), "While condition must be boolean");
                }
                self.check_stmt(body);
            }
            StmtKind::For {
                binder,
                iterable,
                body,
            } => {
                self.check_expr(iterable);
                self.enter_scope();
                self.define(
                    binder,
                    Symbol {
                        name: binder.clone(),
                        ty: SemanticType::primitive("i32"),
                        is_mutable: false,
                        is_initialized: true,
                        declared_module: String::new(),
                        is_exported: false,
                        location: stmt.location.clone(),
                    },
                );
                self.check_stmt(body);
                self.exit_scope();
            }
            StmtKind::Return(value) => match value {
                Some(expr) => {
                    let return_type = self.check_expr(expr);
                    if let Some(expected) = self.current_return_type.clone() {
                        if !self.is_implicitly_convertible(&return_type, &expected) {
                            self.diagnostics.error(
                                stmt.location.clone(),
                                format!(
                                    "Return type mismatch: expected {}, got {}",
                                    expected, return_type
                                ),
                            );
                        }
                    }
                }
                None => {
                    if let Some(expected) = &self.current_return_type {
                        if !expected.is_void() && !expected.is_error() {
                            self.diagnostics
                                .error(stmt.location.clone(), "Missing return value");
                        }
                    }
                }
            },
            StmtKind::Declaration(decl) => self.check_decl(decl),
        }
    }

    // ----- expressions -----

    pub fn check_expr(&mut self, expr: &Expr) -> SemanticType {
        match &expr.kind {
            ExprKind::Literal(token) => self.literal_type(token, &expr.location),
            ExprKind::Identifier(name) => match self.lookup(name) {
                Some(symbol) => symbol.ty.clone(),
                None => {
                    self.diagnostics.error(
                        expr.location.clone(),
                        format!("Undefined identifier: {}", name),
                    );
                    SemanticType::error()
                }
            },
            ExprKind::Binary { left, op, right } => self.check_binary(left, *op, right, expr),
            ExprKind::Unary { op, operand } => self.check_unary(*op, operand, expr),
            ExprKind::Call { callee, arguments } => self.check_call(callee, arguments, expr),
            ExprKind::Member { object, .. } => {
                let object_type = self.check_expr(object);
                if object_type.is_error() {
                    return SemanticType::error();
                }
                self.diagnostics.error(
                    expr.location.clone(),
                    format!("Member access not supported for type: {}", object_type),
                );
                SemanticType::error()
            }
            ExprKind::Index { object, index } => {
                let object_type = self.check_expr(object);
                let index_type = self.check_expr(index);
                if object_type.is_error() || index_type.is_error() {
                    return SemanticType::error();
                }
                let SemanticTypeKind::Array(element) = &object_type.kind else {
                    self.diagnostics
                        .error(expr.location.clone(), "Cannot index non-array type");
                    return SemanticType::error();
                };
                if !index_type.is_integer() {
                    self.diagnostics
                        .error(expr.location.clone(), "Array index must be integer");
                    return SemanticType::error();
                }
                (**element).clone()
            }
            ExprKind::Assignment { target, op, value } => {
                self.check_assignment(target, *op, value, expr)
            }
            ExprKind::Postfix { operand, .. } => {
                let operand_type = self.check_expr(operand);
                if operand_type.is_error() {
                    return SemanticType::error();
                }
                if let ExprKind::Identifier(name) = &operand.kind {
                    let immutable = self.lookup(name).is_some_and(|s| !s.is_mutable);
                    if immutable {
                        self.diagnostics.error(
                            expr.location.clone(),
                            format!("Cannot modify immutable variable: {}", name),
                        );
                    }
                }
                if !operand_type.is_numeric() {
                    self.diagnostics.error(
                        expr.location.clone(),
                        "Increment/decrement requires numeric operand",
                    );
                    return SemanticType::error();
                }
                operand_type
            }
            ExprKind::Cast {
                target,
                expr: inner,
                is_safe,
            } => self.check_cast(target, inner, *is_safe, expr),
            ExprKind::As {
                expr: inner,
                target,
            } => self.check_as(inner, target, expr),
        }
    }

    fn literal_type(&mut self, token: &Token, location: &SourceLocation) -> SemanticType {
        match token.kind {
            TokenKind::IntegerLiteral => {
                let value = match token.value {
                    TokenValue::Int(v) => v,
                    _ => 0,
                };
                SemanticType::primitive(integer_literal_type_name(&token.lexeme, value))
            }
            TokenKind::FloatLiteral => {
                if float_literal_is_f32(&token.lexeme) {
                    SemanticType::primitive("f32")
                } else {
                    SemanticType::primitive("f64")
                }
            }
            TokenKind::BooleanLiteral => SemanticType::primitive("bool"),
            TokenKind::StringLiteral => SemanticType::primitive("string"),
            TokenKind::NullLiteral => SemanticType::primitive("null"),
            _ => {
                self.diagnostics
                    .error(location.clone(), "Unknown literal type");
                SemanticType::error()
            }
        }
    }

    fn check_binary(&mut self, left: &Expr, op: TokenKind, right: &Expr, expr: &Expr) -> SemanticType {
        let left_type = self.check_expr(left);
        let right_type = self.check_expr(right);

        if left_type.is_error() || right_type.is_error() {
            return SemanticType::error();
        }

        match op {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::Power => {
                match SemanticType::common_numeric(&left_type, &right_type) {
                    Some(result) => result,
                    None => {
                        self.diagnostics.error(
                            expr.location.clone(),
                            "Invalid operands for arithmetic operation",
                        );
                        SemanticType::error()
                    }
                }
            }
            TokenKind::Shl | TokenKind::Shr => {
                if left_type.is_integer()
                    && right_type.is_integer()
                    && left_type.numeric_rank() == right_type.numeric_rank()
                {
                    left_type
                } else {
                    self.diagnostics.error(
                        expr.location.clone(),
                        "Invalid operands for bitwise shift operation",
                    );
                    SemanticType::error()
                }
            }
            TokenKind::Equal
            | TokenKind::NotEqual
            | TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual => {
                let both_numeric = left_type.is_numeric() && right_type.is_numeric();
                if both_numeric
                    || left_type.is_compatible_with(&right_type)
                    || self.is_null_comparison(&left_type, &right_type)
                {
                    SemanticType::primitive("bool")
                } else {
                    self.diagnostics
                        .error(expr.location.clone(), "Cannot compare incompatible types");
                    SemanticType::error()
                }
            }
            TokenKind::AndAnd | TokenKind::OrOr => {
                let both_bool = left_type.is_bool() && right_type.is_bool();
                // Numeric operands are allowed: non-zero means true.
                let both_numeric = left_type.is_numeric() && right_type.is_numeric();
                if both_bool || both_numeric {
                    SemanticType::primitive("bool")
                } else {
                    self.diagnostics.error(
                        expr.location.clone(),
                        "Logical operators require boolean or numeric operands",
                    );
                    SemanticType::error()
                }
            }
            _ => {
                self.diagnostics
                    .error(expr.location.clone(), "Unknown binary operator");
                SemanticType::error()
            }
        }
    }

    fn check_unary(&mut self, op: TokenKind, operand: &Expr, expr: &Expr) -> SemanticType {
        let operand_type = self.check_expr(operand);
        if operand_type.is_error() {
            return SemanticType::error();
        }

        match op {
            TokenKind::Minus => {
                if operand_type.is_numeric() {
                    operand_type
                } else {
                    self.diagnostics
                        .error(expr.location.clone(), "Unary minus requires numeric operand");
                    SemanticType::error()
                }
            }
            TokenKind::Not => {
                if operand_type.is_bool() || operand_type.is_numeric() {
                    SemanticType::primitive("bool")
                } else {
                    self.diagnostics.error(
                        expr.location.clone(),
                        "Logical not requires boolean or numeric operand",
                    );
                    SemanticType::error()
                }
            }
            _ => {
                self.diagnostics
                    .error(expr.location.clone(), "Unknown unary operator");
                SemanticType::error()
            }
        }
    }

    fn check_call(&mut self, callee: &Expr, arguments: &[Expr], expr: &Expr) -> SemanticType {
        let callee_type = self.check_expr(callee);
        let argument_types: Vec<SemanticType> =
            arguments.iter().map(|a| self.check_expr(a)).collect();

        if callee_type.is_error() {
            return SemanticType::error();
        }

        let SemanticTypeKind::Function {
            parameters,
            return_type,
        } = &callee_type.kind
        else {
            self.diagnostics
                .error(expr.location.clone(), "Cannot call non-function");
            return SemanticType::error();
        };

        // Foreign variadic functions accept any argument count; each argument
        // only has to be representable as a C vararg.
        if let ExprKind::Identifier(name) = &callee.kind {
            if self.is_foreign_variadic(name, parameters) {
                for (arg, arg_type) in arguments.iter().zip(&argument_types) {
                    if !arg_type.is_error() && !self.is_variadic_compatible(arg_type) {
                        self.diagnostics.error(
                            arg.location.clone(),
                            format!(
                                "Argument type not compatible with variadic function: {}",
                                arg_type
                            ),
                        );
                    }
                }
                return (**return_type).clone();
            }
        }

        if arguments.len() != parameters.len() {
            self.diagnostics
                .error(expr.location.clone(), "Incorrect number of arguments");
            return SemanticType::error();
        }

        for ((arg, arg_type), param_type) in arguments.iter().zip(&argument_types).zip(parameters) {
            if !arg_type.is_error() && !self.is_argument_compatible(arg_type, param_type) {
                self.diagnostics.error(
                    arg.location.clone(),
                    format!(
                        "Argument type mismatch: expected {}, got {}",
                        param_type, arg_type
                    ),
                );
            }
        }

        (**return_type).clone()
    }

    fn check_assignment(
        &mut self,
        target: &Expr,
        op: TokenKind,
        value: &Expr,
        expr: &Expr,
    ) -> SemanticType {
        let target_type = self.check_expr(target);
        let value_type = self.check_expr(value);

        match &target.kind {
            ExprKind::Identifier(name) => {
                let immutable = self.lookup(name).is_some_and(|s| !s.is_mutable);
                if immutable {
                    self.diagnostics.error(
                        expr.location.clone(),
                        format!("Cannot assign to immutable variable: {}", name),
                    );
                }
            }
            _ => {
                self.diagnostics
                    .error(expr.location.clone(), "Invalid assignment target");
            }
        }

        if target_type.is_error() || value_type.is_error() {
            return SemanticType::error();
        }

        if op != TokenKind::Assign {
            let both_numeric = target_type.is_numeric() && value_type.is_numeric();
            if !both_numeric && !target_type.is_compatible_with(&value_type) {
                self.diagnostics
                    .error(expr.location.clone(), "Type mismatch in compound assignment");
                return SemanticType::error();
            }
        } else if !self.is_implicitly_convertible(&value_type, &target_type) {
            self.diagnostics.error(
                expr.location.clone(),
                format!(
                    "Type mismatch in assignment: expected {}, got {}",
                    target_type, value_type
                ),
            );
            return SemanticType::error();
        }

        // The assignment expression evaluates to the assigned value.
        target_type
    }

    fn check_cast(
        &mut self,
        target: &Type,
        inner: &Expr,
        is_safe: bool,
        expr: &Expr,
    ) -> SemanticType {
        let source_type = self.check_expr(inner);
        let target_type = self.convert_type(target);

        if source_type.is_error() {
            return SemanticType::error();
        }

        if self.is_castable(&source_type) && self.is_castable(&target_type) {
            return target_type;
        }

        if is_safe {
            // try_cast yields the source value on failure.
            self.diagnostics.warning(
                expr.location.clone(),
                format!(
                    "try_cast failed: cannot cast from {} to {}",
                    source_type, target_type
                ),
            );
            source_type
        } else {
            self.diagnostics.warning(
                expr.location.clone(),
                format!(
                    "Potentially unsafe cast from {} to {}",
                    source_type, target_type
                ),
            );
            target_type
        }
    }

    fn check_as(&mut self, inner: &Expr, target: &Type, expr: &Expr) -> SemanticType {
        let source_type = self.check_expr(inner);
        let target_type = self.convert_type(target);

        if source_type.is_error() {
            return SemanticType::error();
        }

        if !self.is_castable(&source_type) || !self.is_castable(&target_type) {
            self.diagnostics.error(
                expr.location.clone(),
                format!(
                    "Cannot cast from {} to {} using 'as' operator",
                    source_type, target_type
                ),
            );
            return SemanticType::error();
        }

        target_type
    }

    fn is_castable(&self, ty: &SemanticType) -> bool {
        ty.primitive_name()
            .is_some_and(|name| CASTABLE_TYPE_NAMES.contains(&name))
    }

    // ----- helpers -----

    fn is_implicitly_convertible(&self, from: &SemanticType, to: &SemanticType) -> bool {
        if from.is_compatible_with(to) {
            return true;
        }
        // Numeric promotion: any numeric initializes/assigns any numeric.
        from.is_numeric() && to.is_numeric()
    }

    fn is_null_comparison(&self, left: &SemanticType, right: &SemanticType) -> bool {
        let is_null = |t: &SemanticType| t.primitive_name() == Some("null");
        (left.is_pointer() && is_null(right)) || (right.is_pointer() && is_null(left))
    }

    /// Known C variadic functions, plus anything declared with a trailing
    /// `raw_va_list` parameter.
    fn is_foreign_variadic(&self, name: &str, parameters: &[SemanticType]) -> bool {
        const KNOWN_VARIADIC: &[&str] = &[
            "printf", "fprintf", "sprintf", "snprintf", "scanf", "fscanf", "sscanf",
        ];
        if KNOWN_VARIADIC.contains(&name) {
            return true;
        }
        parameters
            .last()
            .and_then(|p| p.primitive_name())
            .is_some_and(|n| n == "raw_va_list")
    }

    fn is_variadic_compatible(&self, ty: &SemanticType) -> bool {
        match &ty.kind {
            SemanticTypeKind::Primitive(name) => {
                is_numeric_name(name)
                    || name == "bool"
                    || name == "string"
                    || name == "UserDefinedType"
            }
            SemanticTypeKind::Pointer { .. } | SemanticTypeKind::Array(_) => true,
            _ => false,
        }
    }

    fn is_argument_compatible(&self, arg: &SemanticType, param: &SemanticType) -> bool {
        if arg.is_compatible_with(param) {
            return true;
        }
        // String literals may be passed where C expects a byte or void
        // pointer.
        if arg.primitive_name() == Some("string") {
            if let SemanticTypeKind::Pointer { kind, pointee } = &param.kind {
                if kind == "cptr" {
                    return pointee.primitive_name() == Some("u8") || pointee.is_void();
                }
            }
        }
        false
    }

    fn convert_type(&mut self, ast_type: &Type) -> SemanticType {
        match &ast_type.kind {
            TypeKind::Primitive(token) => match token {
                TokenKind::I8 => SemanticType::primitive("i8"),
                TokenKind::I16 => SemanticType::primitive("i16"),
                TokenKind::I32 => SemanticType::primitive("i32"),
                TokenKind::I64 => SemanticType::primitive("i64"),
                TokenKind::U8 => SemanticType::primitive("u8"),
                TokenKind::U16 => SemanticType::primitive("u16"),
                TokenKind::U32 => SemanticType::primitive("u32"),
                TokenKind::U64 => SemanticType::primitive("u64"),
                TokenKind::F32 => SemanticType::primitive("f32"),
                TokenKind::F64 => SemanticType::primitive("f64"),
                TokenKind::Bool => SemanticType::primitive("bool"),
                TokenKind::String => SemanticType::primitive("string"),
                TokenKind::Void => SemanticType::void(),
                TokenKind::SelfKw => SemanticType::primitive("self"),
                TokenKind::RawVaList => SemanticType::primitive("raw_va_list"),
                _ => SemanticType::error(),
            },
            // User-defined types are opaque at this stage.
            TypeKind::Named(_) => SemanticType::primitive("UserDefinedType"),
            TypeKind::Const(inner) => {
                let mut converted = self.convert_type(inner);
                converted.is_const = true;
                converted
            }
            TypeKind::Array { element, .. } => SemanticType::array(self.convert_type(element)),
            TypeKind::Pointer { kind, pointee } => {
                let kind_name = match kind {
                    PointerKind::Cptr => "cptr",
                    PointerKind::Unique => "unique_ptr",
                    PointerKind::Shared => "shared_ptr",
                    PointerKind::Weak => "weak_ptr",
                };
                SemanticType::pointer(kind_name, self.convert_type(pointee))
            }
            // Type arguments are parsed but ignored at this stage.
            TypeKind::Generic { base, .. } => SemanticType::primitive(base.clone()),
        }
    }

    /// Registers a built-in function signature in the global scope. Built-ins
    /// use the registry's coarse type names rather than source-level types.
    pub fn register_builtin_function(
        &mut self,
        name: &str,
        return_type: &str,
        parameters: &[(String, String)],
    ) {
        let map_type = |type_name: &str| match type_name {
            "void" => SemanticType::void(),
            "int" => SemanticType::primitive("i32"),
            "float" => SemanticType::primitive("f64"),
            "bool" => SemanticType::primitive("bool"),
            "string" => SemanticType::primitive("string"),
            _ => SemanticType::error(),
        };

        let param_types: Vec<SemanticType> =
            parameters.iter().map(|(_, ty)| map_type(ty)).collect();
        let function_type = SemanticType::function(param_types, map_type(return_type));

        self.scopes[GLOBAL_SCOPE.0].symbols.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                ty: function_type,
                is_mutable: false,
                is_initialized: true,
                declared_module: String::new(),
                is_exported: false,
                location: SourceLocation::default(),
            },
        );
    }
}
