use crate::CoreError;
use arpy_runtime::{compile, CodeUnit};
use arpy_schema::ModuleName;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// What a provider knows about an identity before loading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSpec {
    pub name: ModuleName,
    pub is_package: bool,
    /// `None` for namespace packages, which have no backing source.
    pub origin: Option<String>,
}

/// A module ready for the session to bind and execute.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub spec: ModuleSpec,
    /// Compiled body; `None` for namespace packages.
    pub code: Option<CodeUnit>,
    /// Package search path. Empty for leaf modules and namespace packages.
    pub search_path: Vec<String>,
    /// Description of the provider, exposed as `__loader__`.
    pub loader: String,
}

/// A source of importable modules consulted by a [`crate::Session`].
///
/// Providers are asked in chain order; the first whose `provides` answers
/// `true` loads the identity.
pub trait ModuleProvider {
    /// Human-readable label for logs and `__loader__`.
    fn label(&self) -> String;

    fn provides(&self, name: &str) -> bool;

    fn describe(&self, name: &str) -> Option<ModuleSpec>;

    fn load(&self, name: &str) -> Result<LoadedModule, CoreError>;

    /// Raw source text of a backed identity.
    fn source(&self, name: &str) -> Option<String>;
}

/// Provider serving modules from in-memory source text.
///
/// Identities registered with [`MemoryProvider::with_package`] are packages;
/// prefixes of registered identities are namespace packages.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    label: String,
    sources: BTreeMap<String, String>,
    packages: BTreeSet<String>,
}

impl MemoryProvider {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_module(mut self, name: &str, source: &str) -> Self {
        let name = ModuleName::new(name);
        for prefix in name.strict_prefixes() {
            self.packages.insert(prefix.into_inner());
        }
        self.sources.insert(name.into_inner(), source.to_owned());
        self
    }

    #[must_use]
    pub fn with_package(mut self, name: &str, source: &str) -> Self {
        self.packages.insert(name.to_owned());
        self.with_module(name, source)
    }

    fn origin(&self, name: &str) -> String {
        format!("<{}>/{name}", self.label)
    }
}

impl ModuleProvider for MemoryProvider {
    fn label(&self) -> String {
        format!("MemoryProvider({})", self.label)
    }

    fn provides(&self, name: &str) -> bool {
        self.sources.contains_key(name) || self.packages.contains(name)
    }

    fn describe(&self, name: &str) -> Option<ModuleSpec> {
        if !self.provides(name) {
            return None;
        }
        Some(ModuleSpec {
            name: ModuleName::new(name),
            is_package: self.packages.contains(name),
            origin: self.sources.contains_key(name).then(|| self.origin(name)),
        })
    }

    fn load(&self, name: &str) -> Result<LoadedModule, CoreError> {
        let spec = self
            .describe(name)
            .ok_or_else(|| CoreError::NoModule(name.to_owned()))?;
        let code = match (self.sources.get(name), &spec.origin) {
            (Some(source), Some(origin)) => Some(compile(source, origin)?),
            _ => None,
        };
        let search_path = if spec.is_package && code.is_some() {
            vec![format!("<{}>", self.label)]
        } else {
            Vec::new()
        };
        Ok(LoadedModule {
            spec,
            code,
            search_path,
            loader: self.label(),
        })
    }

    fn source(&self, name: &str) -> Option<String> {
        self.sources.get(name).cloned()
    }
}
