use crate::interp::{execute, Host};
use crate::parser::compile;
use crate::value::{sys_module, Module, ModuleRef, Value};
use crate::RuntimeError;
use std::collections::{HashMap, HashSet};

/// In-memory host serving modules from a name → source map and capturing
/// output, for exercising the interpreter without an archive.
pub struct MockHost {
    sources: HashMap<String, String>,
    packages: HashSet<String>,
    modules: HashMap<String, ModuleRef>,
    output: String,
    errors: String,
}

impl Default for MockHost {
    fn default() -> Self {
        let mut modules = HashMap::new();
        modules.insert("sys".to_owned(), sys_module(&[]));
        Self {
            sources: HashMap::new(),
            packages: HashSet::new(),
            modules,
            output: String::new(),
            errors: String::new(),
        }
    }
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_module(mut self, name: &str, source: &str) -> Self {
        self.sources.insert(name.to_owned(), source.to_owned());
        self
    }

    #[must_use]
    pub fn with_package(mut self, name: &str, source: &str) -> Self {
        self.packages.insert(name.to_owned());
        self.with_module(name, source)
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn errors(&self) -> &str {
        &self.errors
    }

    pub fn module(&self, name: &str) -> Option<ModuleRef> {
        self.modules.get(name).cloned()
    }

    /// Execute `source` as `__main__`. The main module is not cached.
    pub fn run_main(&mut self, source: &str) -> Result<ModuleRef, RuntimeError> {
        let code = compile(source, "<main>")?;
        let module = Module::new("__main__");
        module.set("__file__", Value::str("<main>"));
        execute(&code, &module, self)?;
        Ok(module)
    }
}

impl Host for MockHost {
    fn import_module(&mut self, name: &str) -> Result<ModuleRef, RuntimeError> {
        if let Some(module) = self.modules.get(name) {
            return Ok(module.clone());
        }
        let parent = name.rsplit_once('.').map(|(p, _)| p.to_owned());
        if let Some(parent) = &parent {
            self.import_module(parent)?;
            if let Some(module) = self.modules.get(name) {
                return Ok(module.clone());
            }
        }
        let Some(source) = self.sources.get(name).cloned() else {
            return Err(RuntimeError::Import(format!("No module named '{name}'")));
        };

        let origin = format!("<mock>/{name}");
        let module = Module::new(name);
        module.set("__file__", Value::str(origin.as_str()));
        if self.packages.contains(name) {
            module.set("__path__", Value::list(vec![]));
            module.set("__package__", Value::str(name));
        } else {
            module.set("__package__", Value::str(parent.clone().unwrap_or_default()));
        }

        let code = compile(&source, &origin)?;
        self.modules.insert(name.to_owned(), module.clone());
        if let Err(e) = execute(&code, &module, self) {
            self.modules.remove(name);
            return Err(e);
        }
        if let (Some(parent), Some((_, leaf))) = (parent, name.rsplit_once('.')) {
            if let Some(parent) = self.modules.get(&parent) {
                parent.set(leaf, Value::Module(module.clone()));
            }
        }
        Ok(module)
    }

    fn write_output(&mut self, text: &str) -> Result<(), RuntimeError> {
        self.output.push_str(text);
        Ok(())
    }

    fn write_error(&mut self, text: &str) -> Result<(), RuntimeError> {
        self.errors.push_str(text);
        Ok(())
    }
}
