use crate::symbols::TypeChecker;

/// Signature of a compiler-provided function, described with the coarse type
/// names ("int", "float", "bool", "string", "void") the registry uses.
#[derive(Debug, Clone)]
pub struct BuiltinFunction {
    pub name: String,
    pub return_type: String,
    pub parameters: Vec<(String, String)>,
}

/// Registry of built-in functions. Constructed by the driver and passed to
/// the stages that need it; there is no global instance.
///
/// The default registry is empty: every function, `printf` included, reaches
/// the compiler through `foreign fn` declarations in the standard library,
/// and `--no-builtins` simply skips registration.
#[derive(Debug, Default)]
pub struct BuiltinsRegistry {
    functions: Vec<BuiltinFunction>,
}

impl BuiltinsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, function: BuiltinFunction) {
        self.functions.push(function);
    }

    pub fn functions(&self) -> &[BuiltinFunction] {
        &self.functions
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.functions.iter().any(|f| f.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn register_with_type_checker(&self, checker: &mut TypeChecker) {
        for function in &self.functions {
            checker.register_builtin_function(
                &function.name,
                &function.return_type,
                &function.parameters,
            );
        }
    }
}
