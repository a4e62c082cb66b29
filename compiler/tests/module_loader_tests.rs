use std::fs;
use std::path::Path;

use pang_compiler::ast::Program;
use pang_compiler::diagnostics::{ColorMode, DiagnosticEngine};
use pang_compiler::module_loader::{LoaderOptions, ModuleLoader};
use tempfile::tempdir;

fn write(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn load(dir: &Path, main: &str, options: LoaderOptions) -> (Option<Program>, DiagnosticEngine) {
    let mut diagnostics = DiagnosticEngine::new(ColorMode::Never);
    let program = ModuleLoader::new(&mut diagnostics, options).load_program(&dir.join(main));
    (program, diagnostics)
}

fn no_stdlib() -> LoaderOptions {
    LoaderOptions {
        auto_import_stdlib: false,
        ..LoaderOptions::default()
    }
}

#[test]
fn loads_a_single_module() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.pang", "fn main() -> i32 { return 0 }\n");

    let (program, diagnostics) = load(dir.path(), "main.pang", no_stdlib());
    let program = program.expect("program should load");
    assert!(!diagnostics.has_errors());
    assert_eq!(program.main_module.name, "main");
    assert!(program.modules.is_empty());
}

#[test]
fn imports_are_loaded_before_the_importer() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "main.pang",
        "import \"util\"\nfn main() -> i32 { return 0 }\n",
    );
    write(dir.path(), "util.pang", "export fn helper() -> i32 { return 1 }\n");

    let (program, diagnostics) = load(dir.path(), "main.pang", no_stdlib());
    let program = program.expect("program should load");
    assert!(!diagnostics.has_errors());
    assert_eq!(program.modules.len(), 1);
    assert_eq!(program.modules[0].name, "util");
}

#[test]
fn transitive_imports_come_in_dependency_order() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.pang", "import \"a\"\nfn main() -> i32 { return 0 }\n");
    write(dir.path(), "a.pang", "import \"b\"\nexport fn fa() -> i32 { return 1 }\n");
    write(dir.path(), "b.pang", "export fn fb() -> i32 { return 2 }\n");

    let (program, diagnostics) = load(dir.path(), "main.pang", no_stdlib());
    let program = program.expect("program should load");
    assert!(!diagnostics.has_errors());
    let names: Vec<&str> = program.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["b", "a"]);
}

#[test]
fn a_module_is_loaded_only_once() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "main.pang",
        "import \"a\"\nimport \"b\"\nfn main() -> i32 { return 0 }\n",
    );
    write(dir.path(), "a.pang", "import \"shared\"\nexport fn fa() -> i32 { return 1 }\n");
    write(dir.path(), "b.pang", "import \"shared\"\nexport fn fb() -> i32 { return 2 }\n");
    write(dir.path(), "shared.pang", "export fn fs() -> i32 { return 3 }\n");

    let (program, diagnostics) = load(dir.path(), "main.pang", no_stdlib());
    let program = program.expect("program should load");
    assert!(!diagnostics.has_errors());
    let shared_count = program.modules.iter().filter(|m| m.name == "shared").count();
    assert_eq!(shared_count, 1);
    assert_eq!(program.modules.len(), 3);
}

#[test]
fn missing_module_is_a_fatal_error() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "main.pang",
        "import \"nope\"\nfn main() -> i32 { return 0 }\n",
    );

    let (_, diagnostics) = load(dir.path(), "main.pang", no_stdlib());
    assert!(diagnostics.has_errors());
    assert!(diagnostics
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("Could not find module: nope")));
}

#[test]
fn circular_imports_are_reported_exactly_once() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.pang", "import \"b\"\nexport fn fa() -> i32 { return 1 }\n");
    write(dir.path(), "b.pang", "import \"a\"\nexport fn fb() -> i32 { return 2 }\n");

    let (_, diagnostics) = load(dir.path(), "a.pang", no_stdlib());
    let circular = diagnostics
        .diagnostics()
        .iter()
        .filter(|d| d.message.contains("Circular dependency detected for module"))
        .count();
    assert_eq!(circular, 1);
}

#[test]
fn modules_resolve_from_the_stdlib_subdirectory() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.pang", "import \"io\"\nfn main() -> i32 { return 0 }\n");
    write(
        dir.path(),
        "stdlib/io.pang",
        "export foreign fn printf(fmt: cptr u8, args: raw_va_list) -> i32\n",
    );

    let (program, diagnostics) = load(dir.path(), "main.pang", no_stdlib());
    let program = program.expect("program should load");
    assert!(!diagnostics.has_errors());
    assert_eq!(program.modules[0].name, "io");
}

#[test]
fn stdlib_io_is_implicitly_imported() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.pang", "fn main() -> i32 { return 0 }\n");
    write(
        dir.path(),
        "stdlib/io.pang",
        "export foreign fn printf(fmt: cptr u8, args: raw_va_list) -> i32\n",
    );

    let (program, diagnostics) = load(dir.path(), "main.pang", LoaderOptions::default());
    let program = program.expect("program should load");
    assert!(!diagnostics.has_errors());
    // The implicit wildcard import sits at the front of the import list.
    assert_eq!(program.main_module.imports[0].module_path, "io");
    assert!(program.main_module.imports[0].is_wildcard);
    assert_eq!(program.modules[0].name, "io");
}

#[test]
fn pang_extension_is_preferred_over_bare_files() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.pang", "import \"m\"\nfn main() -> i32 { return 0 }\n");
    write(dir.path(), "m.pang", "export fn ok() -> i32 { return 1 }\n");
    write(dir.path(), "m", "this is not pang source at all @@@\n");

    let (program, diagnostics) = load(dir.path(), "main.pang", no_stdlib());
    assert!(program.is_some());
    assert!(!diagnostics.has_errors());
}

#[test]
fn parse_errors_in_an_imported_module_are_surfaced() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.pang", "import \"bad\"\nfn main() -> i32 { return 0 }\n");
    write(dir.path(), "bad.pang", "fn ( { \n");

    let (_, diagnostics) = load(dir.path(), "main.pang", no_stdlib());
    assert!(diagnostics.has_errors());
}
