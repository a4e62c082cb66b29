use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::{ImportDecl, Module, Program};
use crate::diagnostics::{DiagnosticEngine, SourceLocation};
use crate::parser::parse_source;

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Modules the entry module implicitly imports (wildcard) unless
    /// `--no-stdlib` was given.
    pub implicit_imports: Vec<String>,
    pub auto_import_stdlib: bool,
    pub verbose: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            implicit_imports: vec!["io".to_string()],
            auto_import_stdlib: true,
            verbose: false,
        }
    }
}

/// Resolves imports, parses each module once, detects import cycles and
/// assembles the program. Modules end up in `Program::modules` in dependency
/// order: every import is loaded before its importer.
pub struct ModuleLoader<'a> {
    diagnostics: &'a mut DiagnosticEngine,
    options: LoaderOptions,
    /// Base directory module paths are resolved against (the entry file's
    /// directory), with `stdlib/` underneath it.
    search_root: PathBuf,
    loaded: Vec<Module>,
    loaded_names: HashSet<String>,
    /// Modules currently being loaded, for circular-dependency detection.
    loading: HashSet<String>,
}

impl<'a> ModuleLoader<'a> {
    pub fn new(diagnostics: &'a mut DiagnosticEngine, options: LoaderOptions) -> Self {
        Self {
            diagnostics,
            options,
            search_root: PathBuf::from("."),
            loaded: Vec::new(),
            loaded_names: HashSet::new(),
            loading: HashSet::new(),
        }
    }

    /// Loads the entry file and, transitively, everything it imports.
    /// Returns `None` when the entry module itself cannot be read or parsed;
    /// import failures are recorded as diagnostics on the returned program.
    pub fn load_program(mut self, main_file: &Path) -> Option<Program> {
        self.search_root = main_file
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let source = match fs::read_to_string(main_file) {
            Ok(s) => s,
            Err(e) => {
                self.diagnostics.fatal(
                    SourceLocation::default(),
                    format!("Could not open file '{}': {}", main_file.display(), e),
                );
                return None;
            }
        };

        let filename = main_file.to_string_lossy().to_string();
        self.diagnostics.add_source(&filename, &source);
        let mut main_module = parse_source(&source, &filename, self.diagnostics);
        if self.diagnostics.has_errors() {
            return None;
        }

        if self.options.auto_import_stdlib {
            // Implicit imports go to the front of the entry module's list.
            for (i, module_name) in self.options.implicit_imports.clone().iter().enumerate() {
                if self.options.verbose {
                    println!("Auto-importing standard library module: {}", module_name);
                }
                main_module.imports.insert(
                    i,
                    ImportDecl {
                        module_path: module_name.clone(),
                        imported_items: Vec::new(),
                        is_wildcard: true,
                        location: SourceLocation::default(),
                    },
                );
            }
        }

        for import in main_module.imports.clone() {
            self.load_module(&import.module_path);
        }

        Some(Program {
            modules: self.loaded,
            main_module,
        })
    }

    fn load_module(&mut self, module_path: &str) -> bool {
        if self.loaded_names.contains(module_path) {
            return true;
        }

        if self.loading.contains(module_path) {
            self.diagnostics.error(
                SourceLocation::default(),
                format!("Circular dependency detected for module: {}", module_path),
            );
            return false;
        }

        let Some(file_path) = self.resolve_module_path(module_path) else {
            self.diagnostics.fatal(
                SourceLocation::default(),
                format!("Could not find module: {}", module_path),
            );
            return false;
        };

        if self.options.verbose {
            println!("Loading module: {} from {}", module_path, file_path.display());
        }

        self.loading.insert(module_path.to_string());

        let source = match fs::read_to_string(&file_path) {
            Ok(s) => s,
            Err(e) => {
                self.diagnostics.fatal(
                    SourceLocation::default(),
                    format!("Could not open file '{}': {}", file_path.display(), e),
                );
                self.loading.remove(module_path);
                return false;
            }
        };

        let filename = file_path.to_string_lossy().to_string();
        self.diagnostics.add_source(&filename, &source);
        let mut module = parse_source(&source, &filename, self.diagnostics);
        if self.diagnostics.has_errors() {
            self.loading.remove(module_path);
            return false;
        }

        // The module is known by the path it was imported as.
        module.name = module_path.to_string();

        // Dependencies load (and are inserted) before the importer.
        for import in module.imports.clone() {
            self.load_module(&import.module_path);
        }

        self.loading.remove(module_path);
        self.loaded_names.insert(module_path.to_string());
        self.loaded.push(module);

        if self.options.verbose {
            println!("Successfully loaded module: {}", module_path);
        }

        true
    }

    /// First existing candidate wins: `p.pang`, `p`, `stdlib/p.pang`,
    /// `stdlib/p`.
    fn resolve_module_path(&self, module_path: &str) -> Option<PathBuf> {
        let candidates = [
            self.search_root.join(format!("{}.pang", module_path)),
            self.search_root.join(module_path),
            self.search_root.join("stdlib").join(format!("{}.pang", module_path)),
            self.search_root.join("stdlib").join(module_path),
        ];

        candidates.into_iter().find(|c| c.is_file())
    }
}
