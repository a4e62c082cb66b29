use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use inkwell::context::Context;

use pang_compiler::builtins::BuiltinsRegistry;
use pang_compiler::diagnostics::{ColorMode, DiagnosticEngine};
use pang_compiler::lexer::tokenize;
use pang_compiler::llvm_codegen::CodeGenerator;
use pang_compiler::module_loader::{LoaderOptions, ModuleLoader};
use pang_compiler::symbols::TypeChecker;

#[derive(Parser, Debug)]
#[command(name = "pangc", about = "Compiler for the pang language")]
struct Cli {
    /// Input source file
    input: PathBuf,

    /// Output file
    #[arg(short = 'o', default_value = "a.exe")]
    output: PathBuf,

    /// Enable verbose output (show all compilation steps)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Control colored diagnostics
    #[arg(long = "color", value_enum, default_value_t = ColorArg::Auto)]
    color: ColorArg,

    /// Output LLVM IR instead of an executable
    #[arg(long)]
    llvm: bool,

    /// Print tokens and exit
    #[arg(long)]
    tokens: bool,

    /// Print the AST and exit
    #[arg(long)]
    ast: bool,

    /// Don't auto-import the standard library
    #[arg(long = "no-stdlib")]
    no_stdlib: bool,

    /// Don't register built-in functions
    #[arg(long = "no-builtins")]
    no_builtins: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorArg {
    Always,
    Auto,
    Never,
}

impl From<ColorArg> for ColorMode {
    fn from(value: ColorArg) -> Self {
        match value {
            ColorArg::Always => ColorMode::Always,
            ColorArg::Auto => ColorMode::Auto,
            ColorArg::Never => ColorMode::Never,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let mut diagnostics = DiagnosticEngine::new(cli.color.into());

    if cli.tokens {
        run_tokens_mode(&cli, &mut diagnostics);
    }

    if cli.verbose {
        println!("[verbose] Creating program: {}", cli.input.display());
    }

    let loader = ModuleLoader::new(
        &mut diagnostics,
        LoaderOptions {
            auto_import_stdlib: !cli.no_stdlib,
            verbose: cli.verbose,
            ..LoaderOptions::default()
        },
    );
    let program = loader.load_program(&cli.input);

    let Some(program) = program else {
        diagnostics.print();
        process::exit(1);
    };
    if diagnostics.has_errors() {
        diagnostics.print();
        process::exit(1);
    }

    if cli.ast {
        println!("Abstract Syntax Tree:");
        println!("Main module: {}", program.main_module.name);
        println!("Imported modules: {}", program.modules.len());
        for module in &program.modules {
            println!("  - {} ({})", module.name, module.file_path);
        }
        println!("{:#?}", program.main_module);
        return;
    }

    if cli.verbose {
        println!("[verbose] Running semantic analysis...");
    }

    let registry = BuiltinsRegistry::new();
    let type_names = {
        let mut checker = TypeChecker::new(&mut diagnostics);
        if !cli.no_builtins {
            registry.register_with_type_checker(&mut checker);
        }
        checker.analyze(&program);
        checker.into_type_names()
    };

    if diagnostics.has_errors() {
        diagnostics.print();
        process::exit(1);
    }

    if cli.verbose {
        println!("[verbose] Generating LLVM IR...");
    }

    let context = Context::create();
    let mut codegen = CodeGenerator::new(&context, &mut diagnostics, cli.verbose, type_names);
    codegen.generate(&program);

    let mut failed = !codegen.verify() || codegen.has_errors();
    let mut success_message = None;

    if !failed {
        if cli.verbose {
            println!("[verbose] Code generation completed.");
            println!("[verbose] Emitting code to file: {}", cli.output.display());
        }

        if cli.llvm {
            if codegen.emit_ir_to_file(&cli.output) {
                success_message =
                    Some(format!("LLVM IR generated successfully: {}", cli.output.display()));
            } else {
                failed = true;
            }
        } else if codegen.compile_to_executable(&cli.output) {
            success_message = Some(format!("Compiled successfully: {}", cli.output.display()));
        } else {
            failed = true;
        }
    }

    if failed {
        diagnostics.print();
        process::exit(1);
    }

    if let Some(message) = success_message {
        println!("{}", message);
    }
    // Warnings never fail compilation, but they are still shown.
    if !diagnostics.is_empty() {
        diagnostics.print();
    }
}

fn run_tokens_mode(cli: &Cli, diagnostics: &mut DiagnosticEngine) -> ! {
    let source = match fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: Could not open file '{}': {}", cli.input.display(), e);
            process::exit(1);
        }
    };

    let filename = cli.input.to_string_lossy().to_string();
    diagnostics.add_source(&filename, &source);
    let tokens = tokenize(&source, &filename, diagnostics);

    if diagnostics.has_errors() {
        diagnostics.print();
        process::exit(1);
    }

    println!("Tokens:");
    for token in &tokens {
        println!("{}", token.describe());
    }
    process::exit(0);
}
