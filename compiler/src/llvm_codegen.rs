use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use inkwell::builder::{Builder, BuilderError};
use inkwell::context::Context;
use inkwell::module::{Linkage, Module as LlvmModule};
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
};
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, PointerType};
use inkwell::values::{
    BasicMetadataValueEnum, BasicValueEnum, FunctionValue, GlobalValue, IntValue, PointerValue,
};
use inkwell::{AddressSpace, FloatPredicate, IntPredicate, OptimizationLevel};
use thiserror::Error;

use crate::ast::*;
use crate::diagnostics::{DiagnosticEngine, SourceLocation};
use crate::symbols::{float_literal_is_f32, integer_literal_type_name};
use crate::token::{Token, TokenKind, TokenValue};

/// Internal failure while driving the SSA builder. These are not source
/// diagnostics; they surface as a single codegen error on the declaration
/// being lowered.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("{0}")]
    Builder(#[from] BuilderError),
    #[error("{0}")]
    Llvm(String),
}

type CgResult<T> = Result<T, CodegenError>;

/// Where a variable's current value lives.
#[derive(Debug, Clone, Copy)]
enum Storage<'ctx> {
    /// Stack slot rooted in the function's entry block.
    Slot(PointerValue<'ctx>),
    Global(GlobalValue<'ctx>),
    /// Folded constant bound directly, no storage.
    Value(BasicValueEnum<'ctx>),
}

#[derive(Debug, Clone)]
#[allow(unused)]
struct VariableInfo<'ctx> {
    storage: Storage<'ctx>,
    /// Value type of the variable; loads need it since pointers are opaque.
    ty: BasicTypeEnum<'ctx>,
    is_const: bool,
    is_exported: bool,
    is_initialized: bool,
    is_global: bool,
    location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CastMode {
    /// `as`: always succeeds, falls back to a bitcast.
    As,
    /// `cast<T>`: unsupported combinations are diagnosed.
    Cast,
    /// `try_cast<T>`: unsupported combinations yield the source value.
    TryCast,
}

/// Lowers the checked AST to an LLVM module. Expression values are threaded
/// through return values; a recovered error inside an expression produces
/// `None` and the enclosing statement is skipped without further noise.
pub struct CodeGenerator<'ctx, 'a> {
    context: &'ctx Context,
    module: LlvmModule<'ctx>,
    builder: Builder<'ctx>,
    diagnostics: &'a mut DiagnosticEngine,
    verbose: bool,

    /// Global symbol table; locals are keyed by a namespaced name so that
    /// the same identifier in different functions or nested scopes cannot
    /// clash.
    symbol_table: HashMap<String, VariableInfo<'ctx>>,
    /// Innermost-last stack of scopes mapping a plain name to its key in
    /// `symbol_table`.
    local_scopes: Vec<HashMap<String, String>>,

    current_function: Option<FunctionValue<'ctx>>,
    current_function_name: String,

    /// Class/struct/enum names collected by the semantic analyzer.
    type_names: HashSet<String>,
}

impl<'ctx, 'a> CodeGenerator<'ctx, 'a> {
    pub fn new(
        context: &'ctx Context,
        diagnostics: &'a mut DiagnosticEngine,
        verbose: bool,
        type_names: HashSet<String>,
    ) -> Self {
        let module = context.create_module("pang_module");
        let builder = context.create_builder();
        Self {
            context,
            module,
            builder,
            diagnostics,
            verbose,
            symbol_table: HashMap::new(),
            local_scopes: Vec::new(),
            current_function: None,
            current_function_name: String::new(),
            type_names,
        }
    }

    pub fn generate(&mut self, program: &Program) {
        for module in &program.modules {
            self.gen_module(module);
        }
        self.gen_module(&program.main_module);
    }

    fn gen_module(&mut self, module: &Module) {
        for decl in &module.declarations {
            if let Err(e) = self.gen_decl(decl) {
                self.diagnostics.error(
                    decl.location.clone(),
                    format!("Code generation failed: {}", e),
                );
                // Reset function context so later declarations start clean.
                self.current_function = None;
                self.current_function_name.clear();
                self.local_scopes.clear();
            }
        }
    }

    fn gen_decl(&mut self, decl: &Decl) -> CgResult<()> {
        match &decl.kind {
            DeclKind::Function(f) => self.gen_function(f, &decl.location),
            DeclKind::Variable(v) => self.gen_variable(v, &decl.location),
            // Classes, structs and enums only populate the type checker's
            // scope; they emit no IR at this stage.
            DeclKind::Class(_) | DeclKind::Struct(_) | DeclKind::Enum(_) => Ok(()),
            DeclKind::Import(_) => Ok(()),
        }
    }

    // ----- functions -----

    fn gen_function(&mut self, f: &FunctionDecl, location: &SourceLocation) -> CgResult<()> {
        let mut param_types: Vec<BasicMetadataTypeEnum<'ctx>> = Vec::new();
        let mut is_variadic = false;

        for param in &f.parameters {
            // `raw_va_list` is not itself a parameter; it marks the function
            // variadic and ends the fixed parameter list.
            if param.ty.is_raw_va_list() {
                is_variadic = true;
                break;
            }
            match self.convert_type(&param.ty) {
                Some(ty) => param_types.push(ty.into()),
                None => {
                    self.diagnostics.error(
                        param.location.clone(),
                        format!("Invalid parameter type for '{}'", param.name),
                    );
                    return Ok(());
                }
            }
        }

        let fn_type = if f.return_type.is_void() {
            self.context.void_type().fn_type(&param_types, is_variadic)
        } else {
            match self.convert_type(&f.return_type) {
                Some(ret) => ret.fn_type(&param_types, is_variadic),
                None => {
                    self.diagnostics
                        .error(location.clone(), "Invalid return type");
                    return Ok(());
                }
            }
        };

        if f.is_foreign {
            let function = self
                .module
                .add_function(&f.name, fn_type, Some(Linkage::External));
            self.set_parameter_names(function, &f.parameters);
            return Ok(());
        }

        let function = self.module.add_function(&f.name, fn_type, None);
        self.set_parameter_names(function, &f.parameters);
        let Some(body) = &f.body else { return Ok(()) };

        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);

        let old_function = self.current_function.replace(function);
        let old_name = std::mem::replace(&mut self.current_function_name, f.name.clone());
        self.local_scopes.push(HashMap::new());

        // Every parameter gets its own stack slot in the entry block.
        for (i, param) in f.parameters.iter().enumerate() {
            if param.ty.is_raw_va_list() {
                break;
            }
            let Some(param_type) = self.convert_type(&param.ty) else {
                break;
            };
            let Some(arg) = function.get_nth_param(i as u32) else {
                break;
            };
            let slot = self.builder.build_alloca(param_type, &param.name)?;
            self.builder.build_store(slot, arg)?;
            self.bind_local(
                &param.name,
                VariableInfo {
                    storage: Storage::Slot(slot),
                    ty: param_type,
                    is_const: false,
                    is_exported: false,
                    is_initialized: true,
                    is_global: false,
                    location: param.location.clone(),
                },
            );
        }

        let mut result = Ok(());
        for stmt in body {
            result = self.gen_stmt(stmt);
            if result.is_err() {
                break;
            }
        }

        if result.is_ok() && f.return_type.is_void() && !self.current_block_terminated() {
            self.builder.build_return(None)?;
        }

        self.local_scopes.pop();
        self.current_function = old_function;
        self.current_function_name = old_name;
        result
    }

    fn set_parameter_names(&self, function: FunctionValue<'ctx>, parameters: &[Param]) {
        for (i, param) in parameters.iter().enumerate() {
            if param.ty.is_raw_va_list() {
                break;
            }
            if let Some(value) = function.get_nth_param(i as u32) {
                match value {
                    BasicValueEnum::IntValue(v) => v.set_name(&param.name),
                    BasicValueEnum::FloatValue(v) => v.set_name(&param.name),
                    BasicValueEnum::PointerValue(v) => v.set_name(&param.name),
                    _ => {}
                }
            }
        }
    }

    // ----- statements -----

    fn gen_stmt(&mut self, stmt: &Stmt) -> CgResult<()> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.gen_expr(expr)?;
                Ok(())
            }
            StmtKind::Block(statements) => {
                self.local_scopes.push(HashMap::new());
                let mut result = Ok(());
                for s in statements {
                    result = self.gen_stmt(s);
                    if result.is_err() {
                        break;
                    }
                }
                self.local_scopes.pop();
                result
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.gen_if(condition, then_branch, else_branch.as_deref()),
            StmtKind::While { condition, body } => self.gen_while(condition, body),
            StmtKind::For { .. } => {
                self.diagnostics
                    .error(stmt.location.clone(), "For loops not yet implemented");
                Ok(())
            }
            StmtKind::Return(value) => {
                if self.current_block_terminated() {
                    return Ok(());
                }
                match value {
                    Some(expr) => {
                        if let Some(v) = self.gen_expr(expr)? {
                            self.builder.build_return(Some(&v))?;
                        }
                    }
                    None => {
                        self.builder.build_return(None)?;
                    }
                }
                Ok(())
            }
            StmtKind::Declaration(decl) => self.gen_decl(decl),
        }
    }

    fn gen_if(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> CgResult<()> {
        let Some(cond_value) = self.gen_expr(condition)? else {
            return Ok(());
        };
        let cond = self.evaluate_condition(cond_value)?;
        let Some(function) = self.current_function else {
            return Ok(());
        };

        let then_block = self.context.append_basic_block(function, "then");
        let else_block = else_branch.map(|_| self.context.append_basic_block(function, "else"));
        let merge_block = self.context.append_basic_block(function, "ifcont");

        self.builder
            .build_conditional_branch(cond, then_block, else_block.unwrap_or(merge_block))?;

        self.builder.position_at_end(then_block);
        self.gen_stmt(then_branch)?;
        let then_terminated = self.current_block_terminated();
        if !then_terminated {
            self.builder.build_unconditional_branch(merge_block)?;
        }

        let mut else_terminated = false;
        if let (Some(else_stmt), Some(else_block)) = (else_branch, else_block) {
            self.builder.position_at_end(else_block);
            self.gen_stmt(else_stmt)?;
            else_terminated = self.current_block_terminated();
            if !else_terminated {
                self.builder.build_unconditional_branch(merge_block)?;
            }
        }

        if then_terminated && else_terminated {
            // Both arms terminate: the merge block is unreachable.
            let _ = merge_block.remove_from_function();
        } else {
            self.builder.position_at_end(merge_block);
        }
        Ok(())
    }

    fn gen_while(&mut self, condition: &Expr, body: &Stmt) -> CgResult<()> {
        let Some(function) = self.current_function else {
            return Ok(());
        };

        let loop_block = self.context.append_basic_block(function, "loop");
        let body_block = self.context.append_basic_block(function, "loopbody");
        let after_block = self.context.append_basic_block(function, "afterloop");

        self.builder.build_unconditional_branch(loop_block)?;

        // The condition block is re-entered on each iteration.
        self.builder.position_at_end(loop_block);
        let cond = match self.gen_expr(condition)? {
            Some(v) => self.evaluate_condition(v)?,
            None => {
                self.builder.build_unconditional_branch(after_block)?;
                self.builder.position_at_end(after_block);
                return Ok(());
            }
        };
        self.builder
            .build_conditional_branch(cond, body_block, after_block)?;

        self.builder.position_at_end(body_block);
        self.gen_stmt(body)?;
        if !self.current_block_terminated() {
            self.builder.build_unconditional_branch(loop_block)?;
        }

        self.builder.position_at_end(after_block);
        Ok(())
    }

    fn current_block_terminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .and_then(|b| b.get_terminator())
            .is_some()
    }

    // ----- variables -----

    fn gen_variable(&mut self, v: &VariableDecl, location: &SourceLocation) -> CgResult<()> {
        if self.current_function.is_none() {
            return self.gen_global_variable(v, location);
        }

        // A local constant folds to a value binding with no storage when the
        // initializer is a compile-time constant.
        if !v.is_mutable {
            if let Some(init) = &v.initializer {
                if let Some(mut constant) = self.fold_constant(init) {
                    let mut ty = constant.get_type();
                    if let Some(declared) = v.ty.as_ref().and_then(|t| self.convert_type(t)) {
                        if let Some(coerced) = self.coerce_constant(constant, declared) {
                            constant = coerced;
                            ty = declared;
                        }
                    }
                    self.bind_local(
                        &v.name,
                        VariableInfo {
                            storage: Storage::Value(constant),
                            ty,
                            is_const: true,
                            is_exported: v.is_exported,
                            is_initialized: true,
                            is_global: false,
                            location: location.clone(),
                        },
                    );
                    return Ok(());
                }
            }
        }

        let declared = v.ty.as_ref().and_then(|t| self.convert_type(t));
        let init_value = match &v.initializer {
            Some(expr) => self.gen_expr(expr)?,
            None => None,
        };

        let Some(ty) = declared.or(init_value.map(|v| v.get_type())) else {
            self.diagnostics.error(
                location.clone(),
                format!("Cannot determine variable type for {}", v.name),
            );
            return Ok(());
        };

        let slot = self.create_entry_alloca(ty, &v.name)?;
        if let Some(value) = init_value {
            let coerced = self.coerce_to_type(value, ty)?;
            self.builder.build_store(slot, coerced)?;
        }

        self.bind_local(
            &v.name,
            VariableInfo {
                storage: Storage::Slot(slot),
                ty,
                is_const: !v.is_mutable,
                is_exported: v.is_exported,
                is_initialized: v.initializer.is_some(),
                is_global: false,
                location: location.clone(),
            },
        );
        Ok(())
    }

    fn gen_global_variable(&mut self, v: &VariableDecl, location: &SourceLocation) -> CgResult<()> {
        let declared = v.ty.as_ref().and_then(|t| self.convert_type(t));

        let folded = match &v.initializer {
            Some(init) => match self.fold_constant(init) {
                Some(constant) => Some(constant),
                None => {
                    self.diagnostics.error(
                        location.clone(),
                        format!(
                            "Global initializer for '{}' must be a compile-time constant",
                            v.name
                        ),
                    );
                    return Ok(());
                }
            },
            None => None,
        };

        let Some(ty) = declared.or(folded.map(|f| f.get_type())) else {
            self.diagnostics.error(
                location.clone(),
                format!("Cannot determine variable type for {}", v.name),
            );
            return Ok(());
        };

        let global = self.module.add_global(ty, None, &v.name);
        global.set_constant(!v.is_mutable);
        match folded {
            Some(constant) => {
                let constant = self.coerce_constant(constant, ty).unwrap_or(constant);
                global.set_linkage(if v.is_exported {
                    Linkage::External
                } else {
                    Linkage::Internal
                });
                global.set_initializer(&constant);
            }
            None => {
                // No initializer: the symbol is defined elsewhere, as with a
                // foreign constant.
                global.set_linkage(Linkage::External);
            }
        }

        self.symbol_table.insert(
            v.name.clone(),
            VariableInfo {
                storage: Storage::Global(global),
                ty,
                is_const: !v.is_mutable,
                is_exported: v.is_exported,
                is_initialized: v.initializer.is_some(),
                is_global: true,
                location: location.clone(),
            },
        );
        Ok(())
    }

    /// Evaluates an initializer without emitting instructions. Identifier
    /// references resolve through the symbol table and are accepted only
    /// when they name a constant.
    fn fold_constant(&self, expr: &Expr) -> Option<BasicValueEnum<'ctx>> {
        match &expr.kind {
            ExprKind::Literal(token) => match token.kind {
                TokenKind::IntegerLiteral => {
                    let value = match token.value {
                        TokenValue::Int(v) => v,
                        _ => 0,
                    };
                    Some(
                        self.integer_literal_type(&token.lexeme, value)
                            .const_int(value as u64, true)
                            .into(),
                    )
                }
                TokenKind::FloatLiteral => {
                    let value = match token.value {
                        TokenValue::Float(v) => v,
                        _ => 0.0,
                    };
                    if float_literal_is_f32(&token.lexeme) {
                        Some(self.context.f32_type().const_float(value).into())
                    } else {
                        Some(self.context.f64_type().const_float(value).into())
                    }
                }
                TokenKind::BooleanLiteral => {
                    let value = matches!(token.value, TokenValue::Bool(true));
                    Some(self.context.bool_type().const_int(value as u64, false).into())
                }
                TokenKind::NullLiteral => Some(self.ptr_type().const_null().into()),
                _ => None,
            },
            ExprKind::Identifier(name) => {
                let info = self.lookup_variable(name)?;
                match info.storage {
                    Storage::Value(value) => Some(value),
                    Storage::Global(global) if info.is_const => global.get_initializer(),
                    _ => None,
                }
            }
            ExprKind::Unary {
                op: TokenKind::Minus,
                operand,
            } => match self.fold_constant(operand)? {
                BasicValueEnum::IntValue(i) => Some(i.const_neg().into()),
                BasicValueEnum::FloatValue(f) => Some(f.const_neg().into()),
                _ => None,
            },
            _ => None,
        }
    }

    // ----- expressions -----

    fn gen_expr(&mut self, expr: &Expr) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        match &expr.kind {
            ExprKind::Literal(token) => self.gen_literal(token, &expr.location),
            ExprKind::Identifier(name) => self.gen_identifier(name, &expr.location),
            ExprKind::Binary { left, op, right } => {
                self.gen_binary(left, *op, right, &expr.location)
            }
            ExprKind::Unary { op, operand } => self.gen_unary(*op, operand, &expr.location),
            ExprKind::Call { callee, arguments } => {
                self.gen_call(callee, arguments, &expr.location)
            }
            ExprKind::Member { .. } => {
                self.diagnostics
                    .error(expr.location.clone(), "Member access not yet implemented");
                Ok(None)
            }
            ExprKind::Index { .. } => {
                self.diagnostics
                    .error(expr.location.clone(), "Array indexing not yet implemented");
                Ok(None)
            }
            ExprKind::Assignment { target, op, value } => {
                self.gen_assignment(target, *op, value, &expr.location)
            }
            ExprKind::Postfix { operand, op } => self.gen_postfix(operand, *op, &expr.location),
            ExprKind::Cast {
                target,
                expr: inner,
                is_safe,
            } => {
                let Some(source) = self.gen_expr(inner)? else {
                    return Ok(None);
                };
                let Some(target_type) = self.convert_type(target) else {
                    self.diagnostics
                        .error(expr.location.clone(), "Invalid target type for cast");
                    return Ok(None);
                };
                let mode = if *is_safe {
                    CastMode::TryCast
                } else {
                    CastMode::Cast
                };
                self.gen_cast_value(source, target_type, mode, &expr.location)
            }
            ExprKind::As {
                expr: inner,
                target,
            } => {
                let Some(source) = self.gen_expr(inner)? else {
                    return Ok(None);
                };
                let Some(target_type) = self.convert_type(target) else {
                    self.diagnostics
                        .error(expr.location.clone(), "Invalid target type for 'as' cast");
                    return Ok(None);
                };
                self.gen_cast_value(source, target_type, CastMode::As, &expr.location)
            }
        }
    }

    fn integer_literal_type(&self, lexeme: &str, value: i64) -> inkwell::types::IntType<'ctx> {
        match integer_literal_type_name(lexeme, value) {
            "i8" | "u8" => self.context.i8_type(),
            "i16" | "u16" => self.context.i16_type(),
            "i64" | "u64" => self.context.i64_type(),
            _ => self.context.i32_type(),
        }
    }

    fn gen_literal(
        &mut self,
        token: &Token,
        location: &SourceLocation,
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        match token.kind {
            TokenKind::IntegerLiteral => {
                let value = match token.value {
                    TokenValue::Int(v) => v,
                    _ => 0,
                };
                let int_type = self.integer_literal_type(&token.lexeme, value);
                Ok(Some(int_type.const_int(value as u64, true).into()))
            }
            TokenKind::FloatLiteral => {
                let value = match token.value {
                    TokenValue::Float(v) => v,
                    _ => 0.0,
                };
                let v: BasicValueEnum = if float_literal_is_f32(&token.lexeme) {
                    self.context.f32_type().const_float(value).into()
                } else {
                    self.context.f64_type().const_float(value).into()
                };
                Ok(Some(v))
            }
            TokenKind::BooleanLiteral => {
                let value = matches!(token.value, TokenValue::Bool(true));
                Ok(Some(
                    self.context.bool_type().const_int(value as u64, false).into(),
                ))
            }
            TokenKind::StringLiteral => {
                // The processed (unescaped) contents become a private global
                // byte array; the expression value is the pointer to it.
                let text = match &token.value {
                    TokenValue::Str(s) => s.clone(),
                    _ => String::new(),
                };
                let global = self.builder.build_global_string_ptr(&text, ".str")?;
                Ok(Some(global.as_pointer_value().into()))
            }
            TokenKind::NullLiteral => Ok(Some(self.ptr_type().const_null().into())),
            _ => {
                self.diagnostics
                    .error(location.clone(), "Unknown literal type");
                Ok(None)
            }
        }
    }

    fn gen_identifier(
        &mut self,
        name: &str,
        location: &SourceLocation,
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        if let Some(function) = self.module.get_function(name) {
            return Ok(Some(function.as_global_value().as_pointer_value().into()));
        }

        // Known variables win over the type-identifier check, so that an
        // uppercase-named constant is still a load and not a placeholder.
        if let Some(info) = self.lookup_variable(name).cloned() {
            let value = match info.storage {
                Storage::Slot(ptr) => self.builder.build_load(ptr, name)?,
                Storage::Global(global) => {
                    self.builder.build_load(global.as_pointer_value(), name)?
                }
                Storage::Value(value) => value,
            };
            return Ok(Some(value));
        }

        // Constructors are not lowered yet; a type name used as a value gets
        // a null placeholder.
        if self.is_type_identifier(name) {
            return Ok(Some(self.ptr_type().const_null().into()));
        }

        self.diagnostics
            .error(location.clone(), format!("Unknown variable: {}", name));
        Ok(None)
    }

    fn gen_binary(
        &mut self,
        left: &Expr,
        op: TokenKind,
        right: &Expr,
        location: &SourceLocation,
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        let left_value = self.gen_expr(left)?;
        let right_value = self.gen_expr(right)?;
        let (Some(left_value), Some(right_value)) = (left_value, right_value) else {
            return Ok(None);
        };

        if op == TokenKind::Power {
            self.diagnostics.error(
                location.clone(),
                "Power operator not supported in code generation",
            );
            return Ok(None);
        }

        self.gen_numeric_binop(op, left_value, right_value, location)
    }

    fn gen_numeric_binop(
        &mut self,
        op: TokenKind,
        left: BasicValueEnum<'ctx>,
        right: BasicValueEnum<'ctx>,
        location: &SourceLocation,
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        let (left, right) = self.promote_to_common_type(left, right)?;

        match (left, right) {
            (BasicValueEnum::IntValue(l), BasicValueEnum::IntValue(r)) => {
                self.gen_int_binop(op, l, r, location)
            }
            (BasicValueEnum::FloatValue(l), BasicValueEnum::FloatValue(r)) => {
                self.gen_float_binop(op, l, r, location)
            }
            (BasicValueEnum::PointerValue(l), BasicValueEnum::PointerValue(r)) => {
                self.gen_pointer_binop(op, l, r, location)
            }
            _ => {
                self.diagnostics
                    .error(location.clone(), "Type mismatch in binary expression");
                Ok(None)
            }
        }
    }

    fn gen_int_binop(
        &mut self,
        op: TokenKind,
        l: IntValue<'ctx>,
        r: IntValue<'ctx>,
        location: &SourceLocation,
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        let value: IntValue<'ctx> = match op {
            TokenKind::Plus => self.builder.build_int_add(l, r, "addtmp")?,
            TokenKind::Minus => self.builder.build_int_sub(l, r, "subtmp")?,
            TokenKind::Star => self.builder.build_int_mul(l, r, "multmp")?,
            TokenKind::Slash => self.builder.build_int_signed_div(l, r, "divtmp")?,
            TokenKind::Percent => self.builder.build_int_signed_rem(l, r, "modtmp")?,
            TokenKind::Shl => self.builder.build_left_shift(l, r, "shltmp")?,
            TokenKind::Shr => self.builder.build_right_shift(l, r, true, "ashrtmp")?,
            TokenKind::Less => {
                self.builder
                    .build_int_compare(IntPredicate::SLT, l, r, "cmptmp")?
            }
            TokenKind::LessEqual => {
                self.builder
                    .build_int_compare(IntPredicate::SLE, l, r, "cmptmp")?
            }
            TokenKind::Greater => {
                self.builder
                    .build_int_compare(IntPredicate::SGT, l, r, "cmptmp")?
            }
            TokenKind::GreaterEqual => {
                self.builder
                    .build_int_compare(IntPredicate::SGE, l, r, "cmptmp")?
            }
            TokenKind::Equal => {
                self.builder
                    .build_int_compare(IntPredicate::EQ, l, r, "cmptmp")?
            }
            TokenKind::NotEqual => {
                self.builder
                    .build_int_compare(IntPredicate::NE, l, r, "cmptmp")?
            }
            TokenKind::AndAnd | TokenKind::OrOr => {
                // Non-i1 integers are collapsed to booleans first.
                let lb = self.int_to_bool(l)?;
                let rb = self.int_to_bool(r)?;
                if op == TokenKind::AndAnd {
                    self.builder.build_and(lb, rb, "andtmp")?
                } else {
                    self.builder.build_or(lb, rb, "ortmp")?
                }
            }
            _ => {
                self.diagnostics
                    .error(location.clone(), "Unknown binary operator for integers");
                return Ok(None);
            }
        };
        Ok(Some(value.into()))
    }

    fn gen_float_binop(
        &mut self,
        op: TokenKind,
        l: inkwell::values::FloatValue<'ctx>,
        r: inkwell::values::FloatValue<'ctx>,
        location: &SourceLocation,
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        let value: BasicValueEnum<'ctx> = match op {
            TokenKind::Plus => self.builder.build_float_add(l, r, "addtmp")?.into(),
            TokenKind::Minus => self.builder.build_float_sub(l, r, "subtmp")?.into(),
            TokenKind::Star => self.builder.build_float_mul(l, r, "multmp")?.into(),
            TokenKind::Slash => self.builder.build_float_div(l, r, "divtmp")?.into(),
            TokenKind::Less => self
                .builder
                .build_float_compare(FloatPredicate::OLT, l, r, "cmptmp")?
                .into(),
            TokenKind::LessEqual => self
                .builder
                .build_float_compare(FloatPredicate::OLE, l, r, "cmptmp")?
                .into(),
            TokenKind::Greater => self
                .builder
                .build_float_compare(FloatPredicate::OGT, l, r, "cmptmp")?
                .into(),
            TokenKind::GreaterEqual => self
                .builder
                .build_float_compare(FloatPredicate::OGE, l, r, "cmptmp")?
                .into(),
            TokenKind::Equal => self
                .builder
                .build_float_compare(FloatPredicate::OEQ, l, r, "cmptmp")?
                .into(),
            TokenKind::NotEqual => self
                .builder
                .build_float_compare(FloatPredicate::ONE, l, r, "cmptmp")?
                .into(),
            _ => {
                self.diagnostics
                    .error(location.clone(), "Unknown binary operator for floats");
                return Ok(None);
            }
        };
        Ok(Some(value))
    }

    fn gen_pointer_binop(
        &mut self,
        op: TokenKind,
        l: PointerValue<'ctx>,
        r: PointerValue<'ctx>,
        location: &SourceLocation,
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        // Pointers (null comparisons included) support equality only.
        let predicate = match op {
            TokenKind::Equal => IntPredicate::EQ,
            TokenKind::NotEqual => IntPredicate::NE,
            _ => {
                self.diagnostics
                    .error(location.clone(), "Unsupported pointer comparison operator");
                return Ok(None);
            }
        };

        let li = self
            .builder
            .build_ptr_to_int(l, self.context.i64_type(), "ptrint")?;
        let ri = self
            .builder
            .build_ptr_to_int(r, self.context.i64_type(), "ptrint")?;
        let value = self.builder.build_int_compare(predicate, li, ri, "cmptmp")?;
        Ok(Some(value.into()))
    }

    fn gen_unary(
        &mut self,
        op: TokenKind,
        operand: &Expr,
        location: &SourceLocation,
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        let Some(value) = self.gen_expr(operand)? else {
            return Ok(None);
        };

        match op {
            TokenKind::Minus => match value {
                BasicValueEnum::IntValue(i) => {
                    Ok(Some(self.builder.build_int_neg(i, "negtmp")?.into()))
                }
                BasicValueEnum::FloatValue(f) => {
                    Ok(Some(self.builder.build_float_neg(f, "negtmp")?.into()))
                }
                _ => {
                    self.diagnostics
                        .error(location.clone(), "Invalid type for unary minus");
                    Ok(None)
                }
            },
            TokenKind::Not => {
                let b = self.evaluate_condition(value)?;
                Ok(Some(self.builder.build_not(b, "nottmp")?.into()))
            }
            _ => {
                self.diagnostics
                    .error(location.clone(), "Unknown unary operator");
                Ok(None)
            }
        }
    }

    fn gen_call(
        &mut self,
        callee: &Expr,
        arguments: &[Expr],
        location: &SourceLocation,
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        let name = match &callee.kind {
            ExprKind::Identifier(name) => name.clone(),
            ExprKind::Member { .. } => {
                self.diagnostics
                    .error(location.clone(), "Method calls not yet implemented");
                return Ok(None);
            }
            _ => {
                self.diagnostics
                    .error(location.clone(), "Complex function calls not yet supported");
                return Ok(None);
            }
        };

        let Some(function) = self.module.get_function(&name) else {
            self.diagnostics.error(
                location.clone(),
                format!(
                    "Unknown function: {} (functions must be declared with 'fn' or 'foreign fn')",
                    name
                ),
            );
            return Ok(None);
        };

        let mut args: Vec<BasicMetadataValueEnum<'ctx>> = Vec::with_capacity(arguments.len());
        for arg in arguments {
            let Some(value) = self.gen_expr(arg)? else {
                return Ok(None);
            };
            args.push(value.into());
        }

        let fixed = function.count_params() as usize;
        if function.get_type().is_var_arg() {
            // Standard C varargs promotions for the trailing arguments.
            for value in args.iter_mut().skip(fixed) {
                match *value {
                    BasicMetadataValueEnum::FloatValue(f)
                        if f.get_type() == self.context.f32_type() =>
                    {
                        *value = self
                            .builder
                            .build_float_ext(f, self.context.f64_type(), "f2d")?
                            .into();
                    }
                    BasicMetadataValueEnum::IntValue(i)
                        if i.get_type().get_bit_width() < 32 =>
                    {
                        *value = self
                            .builder
                            .build_int_s_extend(i, self.context.i32_type(), "promote")?
                            .into();
                    }
                    _ => {}
                }
            }
        } else if args.len() != fixed {
            self.diagnostics
                .error(location.clone(), "Incorrect number of arguments");
            return Ok(None);
        }

        let call_name = if function.get_type().get_return_type().is_some() {
            "calltmp"
        } else {
            ""
        };
        let call = self.builder.build_call(function, &args, call_name)?;
        Ok(call.try_as_basic_value().left())
    }

    fn gen_assignment(
        &mut self,
        target: &Expr,
        op: TokenKind,
        value: &Expr,
        location: &SourceLocation,
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        let Some(mut new_value) = self.gen_expr(value)? else {
            return Ok(None);
        };

        let ExprKind::Identifier(name) = &target.kind else {
            self.diagnostics.error(
                location.clone(),
                "Complex left-hand side assignments not yet supported",
            );
            return Ok(None);
        };

        let Some(info) = self.lookup_variable(name).cloned() else {
            self.diagnostics
                .error(location.clone(), format!("Unknown variable: {}", name));
            return Ok(None);
        };

        let ptr = match info.storage {
            Storage::Slot(p) => p,
            Storage::Global(g) => g.as_pointer_value(),
            Storage::Value(_) => {
                self.diagnostics.error(
                    location.clone(),
                    format!("Cannot assign to constant: {}", name),
                );
                return Ok(None);
            }
        };

        if op != TokenKind::Assign {
            let current = self.builder.build_load(ptr, name)?;
            let base_op = match op {
                TokenKind::PlusAssign => TokenKind::Plus,
                TokenKind::MinusAssign => TokenKind::Minus,
                TokenKind::StarAssign => TokenKind::Star,
                TokenKind::SlashAssign => TokenKind::Slash,
                TokenKind::PercentAssign => TokenKind::Percent,
                _ => {
                    self.diagnostics
                        .error(location.clone(), "Unknown compound assignment operator");
                    return Ok(None);
                }
            };
            let Some(combined) = self.gen_numeric_binop(base_op, current, new_value, location)?
            else {
                return Ok(None);
            };
            new_value = combined;
        }

        let coerced = self.coerce_to_type(new_value, info.ty)?;
        self.builder.build_store(ptr, coerced)?;

        // The assignment expression evaluates to the stored value.
        Ok(Some(coerced))
    }

    fn gen_postfix(
        &mut self,
        operand: &Expr,
        op: TokenKind,
        location: &SourceLocation,
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        let ExprKind::Identifier(name) = &operand.kind else {
            self.diagnostics.error(
                location.clone(),
                "Complex postfix operations not yet supported",
            );
            return Ok(None);
        };

        let Some(info) = self.lookup_variable(name).cloned() else {
            self.diagnostics
                .error(location.clone(), format!("Unknown variable: {}", name));
            return Ok(None);
        };

        let ptr = match info.storage {
            Storage::Slot(p) => p,
            Storage::Global(g) => g.as_pointer_value(),
            Storage::Value(_) => {
                self.diagnostics.error(
                    location.clone(),
                    format!("Cannot modify constant: {}", name),
                );
                return Ok(None);
            }
        };

        let current = self.builder.build_load(ptr, name)?;
        let new_value: BasicValueEnum<'ctx> = match current {
            BasicValueEnum::IntValue(i) => {
                let one = i.get_type().const_int(1, false);
                if op == TokenKind::Increment {
                    self.builder.build_int_add(i, one, "postinc")?.into()
                } else {
                    self.builder.build_int_sub(i, one, "postdec")?.into()
                }
            }
            BasicValueEnum::FloatValue(f) => {
                let one = f.get_type().const_float(1.0);
                if op == TokenKind::Increment {
                    self.builder.build_float_add(f, one, "postinc")?.into()
                } else {
                    self.builder.build_float_sub(f, one, "postdec")?.into()
                }
            }
            _ => {
                self.diagnostics.error(
                    location.clone(),
                    "Invalid type for postfix increment/decrement",
                );
                return Ok(None);
            }
        };
        self.builder.build_store(ptr, new_value)?;

        // Postfix operators return the original value.
        Ok(Some(current))
    }

    // ----- casts and coercions -----

    fn gen_cast_value(
        &mut self,
        source: BasicValueEnum<'ctx>,
        target: BasicTypeEnum<'ctx>,
        mode: CastMode,
        location: &SourceLocation,
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        let source_type = source.get_type();
        if source_type == target {
            return Ok(Some(source));
        }

        // i1 rows come first; the generic integer rows would shadow them.
        if let BasicTypeEnum::IntType(t) = target {
            if t.get_bit_width() == 1 {
                return match source {
                    BasicValueEnum::IntValue(i) => {
                        let zero = i.get_type().const_int(0, false);
                        Ok(Some(
                            self.builder
                                .build_int_compare(IntPredicate::NE, i, zero, "tobool")?
                                .into(),
                        ))
                    }
                    BasicValueEnum::FloatValue(f) => {
                        let zero = f.get_type().const_float(0.0);
                        Ok(Some(
                            self.builder
                                .build_float_compare(FloatPredicate::ONE, f, zero, "tobool")?
                                .into(),
                        ))
                    }
                    _ => self.cast_fallback(source, target, mode, location),
                };
            }
        }

        if let BasicValueEnum::IntValue(i) = source {
            if i.get_type().get_bit_width() == 1 {
                return match target {
                    BasicTypeEnum::IntType(t) => Ok(Some(
                        self.builder.build_int_z_extend(i, t, "zext")?.into(),
                    )),
                    BasicTypeEnum::FloatType(t) => {
                        let widened =
                            self.builder
                                .build_int_z_extend(i, self.context.i32_type(), "zext")?;
                        Ok(Some(
                            self.builder
                                .build_signed_int_to_float(widened, t, "sitofp")?
                                .into(),
                        ))
                    }
                    _ => self.cast_fallback(source, target, mode, location),
                };
            }
        }

        match (source, target) {
            (BasicValueEnum::IntValue(i), BasicTypeEnum::IntType(t)) => {
                let source_bits = i.get_type().get_bit_width();
                let target_bits = t.get_bit_width();
                if source_bits < target_bits {
                    Ok(Some(self.builder.build_int_s_extend(i, t, "sext")?.into()))
                } else {
                    Ok(Some(self.builder.build_int_truncate(i, t, "trunc")?.into()))
                }
            }
            (BasicValueEnum::IntValue(i), BasicTypeEnum::FloatType(t)) => Ok(Some(
                self.builder.build_signed_int_to_float(i, t, "sitofp")?.into(),
            )),
            (BasicValueEnum::FloatValue(f), BasicTypeEnum::IntType(t)) => Ok(Some(
                self.builder.build_float_to_signed_int(f, t, "fptosi")?.into(),
            )),
            (BasicValueEnum::FloatValue(f), BasicTypeEnum::FloatType(t)) => {
                if f.get_type() == self.context.f32_type() {
                    Ok(Some(self.builder.build_float_ext(f, t, "fpext")?.into()))
                } else {
                    Ok(Some(self.builder.build_float_trunc(f, t, "fptrunc")?.into()))
                }
            }
            _ => self.cast_fallback(source, target, mode, location),
        }
    }

    fn cast_fallback(
        &mut self,
        source: BasicValueEnum<'ctx>,
        target: BasicTypeEnum<'ctx>,
        mode: CastMode,
        location: &SourceLocation,
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        match mode {
            CastMode::As => match (source, target) {
                (BasicValueEnum::PointerValue(p), BasicTypeEnum::IntType(t)) => Ok(Some(
                    self.builder.build_ptr_to_int(p, t, "ptrtoint")?.into(),
                )),
                (BasicValueEnum::IntValue(i), BasicTypeEnum::PointerType(t)) => Ok(Some(
                    self.builder.build_int_to_ptr(i, t, "inttoptr")?.into(),
                )),
                _ => Ok(Some(self.builder.build_bit_cast(source, target, "bitcast")?)),
            },
            CastMode::Cast => {
                self.diagnostics
                    .error(location.clone(), "Unsupported cast operation");
                Ok(None)
            }
            // A failed try_cast yields the original value.
            CastMode::TryCast => Ok(Some(source)),
        }
    }

    /// Adjusts a value to a storage type, sign-extending, truncating or
    /// converting as needed.
    fn coerce_to_type(
        &mut self,
        value: BasicValueEnum<'ctx>,
        ty: BasicTypeEnum<'ctx>,
    ) -> CgResult<BasicValueEnum<'ctx>> {
        if value.get_type() == ty {
            return Ok(value);
        }
        Ok(self
            .gen_cast_value(value, ty, CastMode::As, &SourceLocation::default())?
            .unwrap_or(value))
    }

    fn coerce_constant(
        &self,
        value: BasicValueEnum<'ctx>,
        target: BasicTypeEnum<'ctx>,
    ) -> Option<BasicValueEnum<'ctx>> {
        if value.get_type() == target {
            return Some(value);
        }
        match (value, target) {
            (BasicValueEnum::IntValue(i), BasicTypeEnum::IntType(t)) => {
                let v = i.get_sign_extended_constant()?;
                Some(t.const_int(v as u64, true).into())
            }
            (BasicValueEnum::IntValue(i), BasicTypeEnum::FloatType(t)) => {
                let v = i.get_sign_extended_constant()?;
                Some(t.const_float(v as f64).into())
            }
            (BasicValueEnum::FloatValue(f), BasicTypeEnum::FloatType(t)) => {
                let (v, _) = f.get_constant()?;
                Some(t.const_float(v).into())
            }
            (BasicValueEnum::FloatValue(f), BasicTypeEnum::IntType(t)) => {
                let (v, _) = f.get_constant()?;
                Some(t.const_int(v as i64 as u64, true).into())
            }
            _ => None,
        }
    }

    /// Collapses a value to an i1 for branching: non-zero means true.
    fn evaluate_condition(&mut self, value: BasicValueEnum<'ctx>) -> CgResult<IntValue<'ctx>> {
        match value {
            BasicValueEnum::IntValue(i) => self.int_to_bool(i),
            BasicValueEnum::FloatValue(f) => {
                let zero = f.get_type().const_float(0.0);
                Ok(self
                    .builder
                    .build_float_compare(FloatPredicate::ONE, f, zero, "tobool")?)
            }
            BasicValueEnum::PointerValue(p) => {
                let as_int = self
                    .builder
                    .build_ptr_to_int(p, self.context.i64_type(), "ptrint")?;
                let zero = self.context.i64_type().const_int(0, false);
                Ok(self
                    .builder
                    .build_int_compare(IntPredicate::NE, as_int, zero, "tobool")?)
            }
            _ => Err(CodegenError::Llvm("invalid condition value".to_string())),
        }
    }

    fn int_to_bool(&mut self, value: IntValue<'ctx>) -> CgResult<IntValue<'ctx>> {
        if value.get_type().get_bit_width() == 1 {
            return Ok(value);
        }
        let zero = value.get_type().const_int(0, false);
        Ok(self
            .builder
            .build_int_compare(IntPredicate::NE, value, zero, "tobool")?)
    }

    /// Promotes mismatched numeric operands to their common type: floats
    /// dominate, otherwise the wider width wins; integers widen with sign
    /// extension.
    fn promote_to_common_type(
        &mut self,
        left: BasicValueEnum<'ctx>,
        right: BasicValueEnum<'ctx>,
    ) -> CgResult<(BasicValueEnum<'ctx>, BasicValueEnum<'ctx>)> {
        match (left, right) {
            (BasicValueEnum::IntValue(l), BasicValueEnum::IntValue(r)) => {
                let lw = l.get_type().get_bit_width();
                let rw = r.get_type().get_bit_width();
                if lw == rw {
                    Ok((left, right))
                } else if lw < rw {
                    let widened = self.builder.build_int_s_extend(l, r.get_type(), "sext")?;
                    Ok((widened.into(), right))
                } else {
                    let widened = self.builder.build_int_s_extend(r, l.get_type(), "sext")?;
                    Ok((left, widened.into()))
                }
            }
            (BasicValueEnum::FloatValue(l), BasicValueEnum::FloatValue(r)) => {
                if l.get_type() == r.get_type() {
                    Ok((left, right))
                } else if l.get_type() == self.context.f32_type() {
                    let widened =
                        self.builder
                            .build_float_ext(l, self.context.f64_type(), "fpext")?;
                    Ok((widened.into(), right))
                } else {
                    let widened =
                        self.builder
                            .build_float_ext(r, self.context.f64_type(), "fpext")?;
                    Ok((left, widened.into()))
                }
            }
            (BasicValueEnum::IntValue(l), BasicValueEnum::FloatValue(r)) => {
                let converted = self
                    .builder
                    .build_signed_int_to_float(l, r.get_type(), "sitofp")?;
                Ok((converted.into(), right))
            }
            (BasicValueEnum::FloatValue(l), BasicValueEnum::IntValue(r)) => {
                let converted = self
                    .builder
                    .build_signed_int_to_float(r, l.get_type(), "sitofp")?;
                Ok((left, converted.into()))
            }
            _ => Ok((left, right)),
        }
    }

    // ----- type lowering -----

    fn ptr_type(&self) -> PointerType<'ctx> {
        self.context.i8_type().ptr_type(AddressSpace::default())
    }

    /// Lowering erases signedness, decays arrays to pointers and erases
    /// pointer kinds. `None` means the type has no value representation
    /// (void).
    fn convert_type(&self, ty: &Type) -> Option<BasicTypeEnum<'ctx>> {
        match &ty.kind {
            TypeKind::Primitive(token) => match token {
                TokenKind::I8 | TokenKind::U8 => Some(self.context.i8_type().into()),
                TokenKind::I16 | TokenKind::U16 => Some(self.context.i16_type().into()),
                TokenKind::I32 | TokenKind::U32 => Some(self.context.i32_type().into()),
                TokenKind::I64 | TokenKind::U64 => Some(self.context.i64_type().into()),
                TokenKind::F32 => Some(self.context.f32_type().into()),
                TokenKind::F64 => Some(self.context.f64_type().into()),
                TokenKind::Bool => Some(self.context.bool_type().into()),
                TokenKind::String | TokenKind::SelfKw | TokenKind::RawVaList => {
                    Some(self.ptr_type().into())
                }
                TokenKind::Void => None,
                _ => None,
            },
            TypeKind::Named(_) => Some(self.ptr_type().into()),
            TypeKind::Const(inner) => self.convert_type(inner),
            TypeKind::Array { .. } | TypeKind::Pointer { .. } => Some(self.ptr_type().into()),
            TypeKind::Generic { .. } => Some(self.ptr_type().into()),
        }
    }

    fn is_type_identifier(&self, name: &str) -> bool {
        if self.type_names.contains(name) {
            return true;
        }
        // Heuristic fallback for modules that bypassed analysis.
        if name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
            return true;
        }
        matches!(
            name,
            "i8" | "i16"
                | "i32"
                | "i64"
                | "u8"
                | "u16"
                | "u32"
                | "u64"
                | "f32"
                | "f64"
                | "bool"
                | "string"
                | "void"
        )
    }

    // ----- variable table -----

    fn bind_local(&mut self, name: &str, info: VariableInfo<'ctx>) {
        let key = format!(
            "{}::{}::{}",
            self.current_function_name,
            self.local_scopes.len(),
            name
        );
        self.symbol_table.insert(key.clone(), info);
        if let Some(scope) = self.local_scopes.last_mut() {
            scope.insert(name.to_string(), key);
        }
    }

    fn lookup_variable(&self, name: &str) -> Option<&VariableInfo<'ctx>> {
        for scope in self.local_scopes.iter().rev() {
            if let Some(key) = scope.get(name) {
                return self.symbol_table.get(key);
            }
        }
        self.symbol_table.get(name)
    }

    fn create_entry_alloca(
        &self,
        ty: BasicTypeEnum<'ctx>,
        name: &str,
    ) -> CgResult<PointerValue<'ctx>> {
        let function = self
            .current_function
            .ok_or_else(|| CodegenError::Llvm("alloca outside of a function".to_string()))?;
        let entry = function
            .get_first_basic_block()
            .ok_or_else(|| CodegenError::Llvm("function has no entry block".to_string()))?;

        let entry_builder = self.context.create_builder();
        match entry.get_first_instruction() {
            Some(first) => entry_builder.position_before(&first),
            None => entry_builder.position_at_end(entry),
        }
        Ok(entry_builder.build_alloca(ty, name)?)
    }

    // ----- output -----

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn verify(&mut self) -> bool {
        self.log_verbose("Starting module verification...");
        match self.module.verify() {
            Ok(()) => {
                self.log_verbose("Module verification completed successfully.");
                true
            }
            Err(e) => {
                self.diagnostics.error(
                    SourceLocation::default(),
                    format!("Module verification failed: {}", e),
                );
                false
            }
        }
    }

    pub fn print_ir(&self) -> String {
        self.module.print_to_string().to_string()
    }

    /// Writes the textual IR verbatim to `path`.
    pub fn emit_ir_to_file(&mut self, path: &Path) -> bool {
        match self.module.print_to_file(path) {
            Ok(()) => true,
            Err(e) => {
                self.diagnostics.error(
                    SourceLocation::default(),
                    format!("Failed to open output file '{}': {}", path.display(), e),
                );
                false
            }
        }
    }

    fn emit_object_file(&mut self, path: &Path) -> bool {
        Target::initialize_all(&InitializationConfig::default());

        let triple = TargetMachine::get_default_triple();
        self.module.set_triple(&triple);

        let target = match Target::from_triple(&triple) {
            Ok(t) => t,
            Err(e) => {
                self.diagnostics.error(
                    SourceLocation::default(),
                    format!("Failed to look up target: {}", e),
                );
                return false;
            }
        };

        let Some(machine) = target.create_target_machine(
            &triple,
            "generic",
            "",
            OptimizationLevel::Default,
            RelocMode::PIC,
            CodeModel::Default,
        ) else {
            self.diagnostics.error(
                SourceLocation::default(),
                "Failed to create target machine",
            );
            return false;
        };

        self.module
            .set_data_layout(&machine.get_target_data().get_data_layout());

        match machine.write_to_file(&self.module, FileType::Object, path) {
            Ok(()) => true,
            Err(e) => {
                self.diagnostics.error(
                    SourceLocation::default(),
                    format!("Failed to write object file: {}", e),
                );
                false
            }
        }
    }

    /// Emits `<output>.o`, drives the first working external linker and
    /// deletes the object file on success.
    pub fn compile_to_executable(&mut self, output: &Path) -> bool {
        let os = detect_operating_system();
        self.log_verbose(&format!("Target OS detected: {}", os));

        let mut exe_path = output.to_path_buf();
        if os == "Windows" && exe_path.extension().and_then(|e| e.to_str()) != Some("exe") {
            exe_path.set_extension("exe");
        }

        let obj_path = PathBuf::from(format!("{}.o", output.display()));
        self.log_verbose(&format!("Generating object file: {}", obj_path.display()));
        if !self.emit_object_file(&obj_path) {
            return false;
        }

        self.link_object_to_executable(&obj_path, &exe_path)
    }

    fn link_object_to_executable(&mut self, obj_path: &Path, exe_path: &Path) -> bool {
        for (program, args) in linker_commands(obj_path, exe_path) {
            self.log_verbose(&format!("Trying linker: {}", program));
            match Command::new(&program).args(&args).output() {
                Ok(output) if output.status.success() => {
                    if exe_path.exists() {
                        let _ = fs::remove_file(obj_path);
                        self.log_verbose(&format!("Linking successful with: {}", program));
                        return true;
                    }
                    self.log_verbose("Linker reported success but executable not found");
                }
                Ok(output) => {
                    self.log_verbose(&format!(
                        "Linking failed with exit code: {}",
                        output.status
                    ));
                }
                Err(_) => {
                    self.log_verbose(&format!("Linker not available: {}", program));
                }
            }
        }

        let _ = fs::remove_file(obj_path);
        self.diagnostics
            .fatal(SourceLocation::default(), no_linker_message());
        false
    }

    fn log_verbose(&self, message: &str) {
        if self.verbose {
            println!("[verbose] {}", message);
        }
    }
}

fn detect_operating_system() -> &'static str {
    if cfg!(target_os = "windows") {
        "Windows"
    } else if cfg!(target_os = "macos") {
        "macOS"
    } else if cfg!(target_os = "linux") {
        "Linux"
    } else {
        "Unix"
    }
}

/// Linker invocations in order of preference for the host OS.
fn linker_commands(obj_path: &Path, exe_path: &Path) -> Vec<(String, Vec<String>)> {
    let obj = obj_path.display().to_string();
    let exe = exe_path.display().to_string();
    let s = |v: &str| v.to_string();

    match detect_operating_system() {
        "Windows" => vec![
            (s("clang"), vec![s("-o"), exe.clone(), obj.clone(), s("-lmsvcrt")]),
            (
                s("gcc"),
                vec![s("-o"), exe.clone(), obj.clone(), s("-lm"), s("-lmsvcrt")],
            ),
            (
                s("x86_64-w64-mingw32-gcc"),
                vec![s("-o"), exe.clone(), obj.clone(), s("-lm")],
            ),
            (
                s("clang-cl"),
                vec![
                    format!("/Fe:{}", exe),
                    obj.clone(),
                    s("msvcrt.lib"),
                    s("legacy_stdio_definitions.lib"),
                ],
            ),
            (
                s("link.exe"),
                vec![
                    format!("/OUT:{}", exe),
                    obj,
                    s("/SUBSYSTEM:CONSOLE"),
                    s("msvcrt.lib"),
                    s("legacy_stdio_definitions.lib"),
                ],
            ),
        ],
        "Linux" => ["clang", "gcc", "clang-15", "clang-14"]
            .iter()
            .map(|linker| {
                (
                    s(linker),
                    vec![s("-o"), exe.clone(), obj.clone(), s("-lm"), s("-lpthread")],
                )
            })
            .collect(),
        "macOS" => ["clang", "gcc", "gcc-13", "gcc-12"]
            .iter()
            .map(|linker| (s(linker), vec![s("-o"), exe.clone(), obj.clone()]))
            .collect(),
        _ => ["clang", "gcc"]
            .iter()
            .map(|linker| {
                (
                    s(linker),
                    vec![s("-o"), exe.clone(), obj.clone(), s("-lm")],
                )
            })
            .collect(),
    }
}

fn no_linker_message() -> String {
    let os = detect_operating_system();
    let mut message = String::new();
    message.push_str("Failed to create executable: No compatible linker found.\n");
    message.push_str(&format!("Detected OS: {}\n", os));
    message.push_str("Please install one of the following linkers:\n");

    match os {
        "Windows" => {
            message.push_str("  - Clang (clang-cl or clang) - Recommended\n");
            message.push_str("  - Microsoft Visual Studio (link.exe)\n");
            message.push_str("  - GCC (MinGW/MSYS2)\n");
        }
        "Linux" => {
            message.push_str("  - Clang (clang) - Recommended\n");
            message.push_str("  - GCC (gcc)\n");
            message.push_str("  - Install via: sudo apt install clang (Ubuntu/Debian)\n");
            message.push_str("  - Install via: sudo yum install clang (RHEL/CentOS)\n");
        }
        "macOS" => {
            message.push_str("  - Clang (clang) - Usually pre-installed with Xcode\n");
            message.push_str("  - GCC (gcc) - Install via Homebrew: brew install gcc\n");
            message.push_str("  - Install Xcode Command Line Tools: xcode-select --install\n");
        }
        _ => {
            message.push_str("  - Clang (clang)\n");
            message.push_str("  - GCC (gcc)\n");
        }
    }

    message.push_str("\nAlternatively, use --llvm flag to generate LLVM IR instead.");
    message
}
