use crate::CoreError;
use arpy_schema::{ModuleName, PACKAGE_INIT, RESERVED_PREFIX, SOURCE_SUFFIX};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Dotted module identities derived from an archive's entry names.
///
/// Every identity with a backing entry (leaf modules and `__init__`-backed
/// packages) maps to that entry. Every strict prefix of a registered identity
/// is a package, whether or not it has a backing entry; those without one are
/// namespace packages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleIndex {
    entries: BTreeMap<ModuleName, String>,
    modules: BTreeSet<ModuleName>,
    packages: BTreeSet<ModuleName>,
}

impl ModuleIndex {
    /// Index the source entries among `names`. Non-source entries and the
    /// reserved `META-INF/` area are ignored.
    ///
    /// Fails with [`CoreError::AmbiguousLayout`] when an identity would be
    /// both a leaf module and a package, or is backed by two entries.
    pub fn from_entry_names<'a, I>(names: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let init_suffix = format!(".{PACKAGE_INIT}");
        let mut index = ModuleIndex::default();

        for entry in names {
            // Only the `META-INF/` directory is reserved, matching what the
            // builder skips; a sibling such as `META-INFO.py` is ordinary source.
            if entry.starts_with(RESERVED_PREFIX) {
                continue;
            }
            let Some(stem) = entry.strip_suffix(SOURCE_SUFFIX) else {
                continue;
            };
            let dotted = stem.replace(['/', '\\'], ".");
            if dotted.split('.').any(str::is_empty) {
                debug!("skipping entry with empty path segment: {entry}");
                continue;
            }

            let (name, is_package) = match dotted.strip_suffix(&init_suffix) {
                Some(parent) => (ModuleName::new(parent), true),
                None => (ModuleName::new(dotted), false),
            };

            if let Some(existing) = index.entries.get(&name) {
                if existing != entry {
                    return Err(CoreError::AmbiguousLayout {
                        name: name.into_inner(),
                        entry: entry.to_owned(),
                    });
                }
                continue;
            }

            for prefix in name.strict_prefixes() {
                index.packages.insert(prefix);
            }
            index.entries.insert(name.clone(), entry.to_owned());
            if is_package {
                index.packages.insert(name);
            } else {
                index.modules.insert(name);
            }
        }

        if let Some(name) = index.modules.intersection(&index.packages).next() {
            let entry = index.entries.get(name).cloned().unwrap_or_default();
            return Err(CoreError::AmbiguousLayout {
                name: name.to_string(),
                entry,
            });
        }
        Ok(index)
    }

    /// Whether `name` is a leaf module.
    pub fn is_module(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    pub fn is_package(&self, name: &str) -> bool {
        self.packages.contains(name)
    }

    /// A package identity with no backing `__init__` entry.
    pub fn is_namespace_package(&self, name: &str) -> bool {
        self.is_package(name) && !self.entries.contains_key(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.is_module(name) || self.is_package(name)
    }

    /// The archive entry backing `name`, if any.
    pub fn entry_for(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Leaf module identities, sorted.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleName> {
        self.modules.iter()
    }

    /// Package identities (backed and namespace), sorted.
    pub fn packages(&self) -> impl Iterator<Item = &ModuleName> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len() + self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.packages.is_empty()
    }
}
