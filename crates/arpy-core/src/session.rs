//! The interpreter context imports resolve against.

use crate::provider::ModuleProvider;
use crate::CoreError;
use arpy_runtime::{
    argv_of, execute, set_argv, sys_module, CodeUnit, Host, Module, ModuleRef, RuntimeError,
    Value,
};
use arpy_schema::ModuleName;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use tracing::{debug, trace};

/// Owns the provider chain, the module cache, the `sys` module and the
/// output streams used by running code.
///
/// Sessions are independent of each other; nothing here is process-global.
pub struct Session {
    /// Highest priority first.
    providers: Vec<Rc<dyn ModuleProvider>>,
    modules: HashMap<String, ModuleRef>,
    sys: ModuleRef,
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
}

impl Default for Session {
    fn default() -> Self {
        Self::with_output(io::stdout(), io::stderr())
    }
}

fn same_provider(a: &Rc<dyn ModuleProvider>, b: &Rc<dyn ModuleProvider>) -> bool {
    Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session writing program output to the given streams.
    pub fn with_output(stdout: impl Write + 'static, stderr: impl Write + 'static) -> Self {
        let sys = sys_module(&[]);
        let mut modules = HashMap::new();
        modules.insert("sys".to_owned(), sys.clone());
        Self {
            providers: Vec::new(),
            modules,
            sys,
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    /// Insert `provider` at the front of the chain. Returns `false` when it
    /// was already installed, in which case the chain is unchanged.
    pub fn install(&mut self, provider: Rc<dyn ModuleProvider>) -> bool {
        if self.is_installed(&provider) {
            return false;
        }
        debug!("installing {}", provider.label());
        self.providers.insert(0, provider);
        true
    }

    /// Remove `provider` from the chain. Returns `false` when it was absent.
    pub fn uninstall(&mut self, provider: &Rc<dyn ModuleProvider>) -> bool {
        let before = self.providers.len();
        self.providers.retain(|p| !same_provider(p, provider));
        let removed = self.providers.len() != before;
        if removed {
            debug!("uninstalled {}", provider.label());
        }
        removed
    }

    pub fn is_installed(&self, provider: &Rc<dyn ModuleProvider>) -> bool {
        self.providers.iter().any(|p| same_provider(p, provider))
    }

    /// Labels of the installed providers, highest priority first.
    pub fn provider_labels(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.label()).collect()
    }

    pub fn argv(&self) -> Vec<String> {
        argv_of(&self.sys)
    }

    pub fn set_argv(&mut self, argv: &[String]) {
        set_argv(&self.sys, argv);
    }

    /// Install a new argument vector, returning the previous one.
    pub fn replace_argv(&mut self, argv: &[String]) -> Vec<String> {
        let previous = self.argv();
        self.set_argv(argv);
        previous
    }

    /// The cached module for `name`, if it has been imported.
    pub fn module(&self, name: &str) -> Option<ModuleRef> {
        self.modules.get(name).cloned()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Import `name`, executing it at most once per session.
    ///
    /// Parents are imported first. The module is cached before its body runs
    /// so cyclic imports see the partially initialized module, and dropped
    /// from the cache again if the body fails.
    pub fn import(&mut self, name: &str) -> Result<ModuleRef, CoreError> {
        if let Some(module) = self.modules.get(name) {
            return Ok(module.clone());
        }

        let identity = ModuleName::new(name);
        let parent = identity.parent();
        if let Some(parent) = &parent {
            self.import(parent)?;
            if let Some(module) = self.modules.get(name) {
                return Ok(module.clone());
            }
        }

        let provider = self
            .providers
            .iter()
            .find(|p| p.provides(name))
            .cloned()
            .ok_or_else(|| CoreError::NoModule(name.to_owned()))?;
        let loaded = provider.load(name)?;
        debug!("importing {name} via {}", loaded.loader);

        let module = Module::new(name);
        if let Some(origin) = &loaded.spec.origin {
            module.set("__file__", Value::str(origin.as_str()));
        }
        module.set("__loader__", Value::str(loaded.loader.as_str()));
        if loaded.spec.is_package {
            let path = loaded
                .search_path
                .iter()
                .map(|p| Value::str(p.as_str()))
                .collect();
            module.set("__path__", Value::list(path));
            module.set("__package__", Value::str(name));
        } else {
            let package = parent.as_ref().map_or("", ModuleName::as_str);
            module.set("__package__", Value::str(package));
        }

        self.modules.insert(name.to_owned(), module.clone());
        if let Some(code) = &loaded.code {
            if let Err(e) = execute(code, &module, self) {
                self.modules.remove(name);
                return Err(e.into());
            }
        }

        if let Some(parent) = parent.and_then(|p| self.modules.get(p.as_str())) {
            parent.set(identity.last_segment(), Value::Module(module.clone()));
        }
        Ok(module)
    }

    /// Execute `code` as the top-level `__main__` module. The module is not
    /// cached, so importing `__main__` later resolves through the chain.
    pub fn run_main(
        &mut self,
        code: &CodeUnit,
        file: &str,
        package: Option<&str>,
    ) -> Result<ModuleRef, CoreError> {
        let module = Module::new("__main__");
        module.set("__file__", Value::str(file));
        module.set("__package__", Value::str(package.unwrap_or_default()));
        trace!("running {} as __main__", code.origin());
        let result = execute(code, &module, self);
        self.flush()?;
        result?;
        Ok(module)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()?;
        self.stderr.flush()
    }
}

impl Host for Session {
    fn import_module(&mut self, name: &str) -> Result<ModuleRef, RuntimeError> {
        self.import(name).map_err(|e| match e {
            CoreError::Runtime(inner) => inner,
            other => RuntimeError::Import(other.to_string()),
        })
    }

    fn write_output(&mut self, text: &str) -> Result<(), RuntimeError> {
        self.stdout.write_all(text.as_bytes())?;
        Ok(())
    }

    fn write_error(&mut self, text: &str) -> Result<(), RuntimeError> {
        self.stderr.write_all(text.as_bytes())?;
        Ok(())
    }
}

/// Cloneable in-memory writer for capturing session output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;
    use arpy_runtime::compile;

    fn session_with(provider: MemoryProvider) -> (Session, SharedBuffer) {
        let out = SharedBuffer::new();
        let mut session = Session::with_output(out.clone(), io::sink());
        session.install(Rc::new(provider));
        (session, out)
    }

    #[test]
    fn import_executes_once() {
        let (mut session, out) =
            session_with(MemoryProvider::new("m").with_module("once", "print('ran')\n"));
        let first = session.import("once").unwrap();
        let second = session.import("once").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(out.contents(), "ran\n");
    }

    #[test]
    fn parents_are_imported_and_bound() {
        let provider = MemoryProvider::new("m")
            .with_package("app", "print('app init')\n")
            .with_module("app.util", "VALUE = 42\n");
        let (mut session, out) = session_with(provider);
        let util = session.import("app.util").unwrap();
        let app = session.module("app").unwrap();
        assert_eq!(app.get("util"), Some(Value::Module(util.clone())));
        assert_eq!(util.get("VALUE"), Some(Value::Int(42)));
        assert_eq!(util.get("__package__"), Some(Value::str("app")));
        assert_eq!(out.contents(), "app init\n");
    }

    #[test]
    fn namespace_package_has_empty_path_and_no_file() {
        let (mut session, _) =
            session_with(MemoryProvider::new("m").with_module("ns.inner.leaf", "x = 1\n"));
        session.import("ns.inner.leaf").unwrap();
        let ns = session.module("ns").unwrap();
        assert!(ns.is_package());
        assert_eq!(ns.get("__path__"), Some(Value::list(vec![])));
        assert!(ns.get("__file__").is_none());
    }

    #[test]
    fn unknown_module_is_not_found() {
        let mut session = Session::with_output(io::sink(), io::sink());
        assert!(matches!(
            session.import("nowhere"),
            Err(CoreError::NoModule(n)) if n == "nowhere"
        ));
    }

    #[test]
    fn failed_body_is_evicted_from_cache() {
        let (mut session, _) =
            session_with(MemoryProvider::new("m").with_module("bad", "x = 1\nboom()\n"));
        assert!(session.import("bad").is_err());
        assert!(!session.is_loaded("bad"));
    }

    #[test]
    fn cyclic_import_sees_partial_module() {
        let provider = MemoryProvider::new("m")
            .with_module("a", "FIRST = 1\nimport b\nprint(b.SEEN)\n")
            .with_module("b", "import a\nSEEN = a.FIRST\n");
        let (mut session, out) = session_with(provider);
        session.import("a").unwrap();
        assert_eq!(out.contents(), "1\n");
    }

    #[test]
    fn most_recent_provider_wins() {
        let out = SharedBuffer::new();
        let mut session = Session::with_output(out.clone(), io::sink());
        session.install(Rc::new(
            MemoryProvider::new("old").with_module("shared", "print('old')\n"),
        ));
        session.install(Rc::new(
            MemoryProvider::new("new").with_module("shared", "print('new')\n"),
        ));
        session.import("shared").unwrap();
        assert_eq!(out.contents(), "new\n");
        assert_eq!(
            session.provider_labels(),
            vec!["MemoryProvider(new)", "MemoryProvider(old)"]
        );
    }

    #[test]
    fn install_twice_is_noop_and_uninstall_removes() {
        let mut session = Session::with_output(io::sink(), io::sink());
        let provider: Rc<dyn ModuleProvider> =
            Rc::new(MemoryProvider::new("m").with_module("x", ""));
        assert!(session.install(provider.clone()));
        assert!(!session.install(provider.clone()));
        assert_eq!(session.provider_labels().len(), 1);
        assert!(session.uninstall(&provider));
        assert!(!session.uninstall(&provider));
        assert!(session.import("x").is_err());
    }

    #[test]
    fn argv_round_trip() {
        let mut session = Session::with_output(io::sink(), io::sink());
        assert!(session.argv().is_empty());
        let previous = session.replace_argv(&["prog".to_owned(), "a".to_owned()]);
        assert!(previous.is_empty());
        assert_eq!(session.argv(), vec!["prog", "a"]);
        session.set_argv(&previous);
        assert!(session.argv().is_empty());
    }

    #[test]
    fn run_main_is_not_cached() {
        let out = SharedBuffer::new();
        let mut session = Session::with_output(out.clone(), io::sink());
        let code = compile("import sys\nprint(__name__, len(sys.argv))\n", "<test>").unwrap();
        session.set_argv(&["prog".to_owned()]);
        let main = session.run_main(&code, "prog", None).unwrap();
        assert_eq!(main.get("__file__"), Some(Value::str("prog")));
        assert!(!session.is_loaded("__main__"));
        assert_eq!(out.contents(), "__main__ 1\n");
    }

    #[test]
    fn sessions_are_independent() {
        let (mut first, _) =
            session_with(MemoryProvider::new("m").with_module("only_here", ""));
        let mut second = Session::with_output(io::sink(), io::sink());
        first.import("only_here").unwrap();
        assert!(second.import("only_here").is_err());
    }
}
