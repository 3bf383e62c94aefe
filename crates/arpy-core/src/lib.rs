//! Archive-backed module resolution for arpy.
//!
//! This crate ties the archive container and the embedded interpreter
//! together: `ModuleIndex` maps archive entries to dotted module identities,
//! `ArchiveLoader` serves those identities through the `ModuleProvider` trait,
//! `Session` owns the provider chain and module cache that imports resolve
//! against, and the runner executes an archive's entry module as `__main__`.

pub mod build;
pub mod index;
pub mod loader;
pub mod provider;
pub mod runner;
pub mod session;

pub use build::{build_archive, BuildOptions};
pub use index::ModuleIndex;
pub use loader::{ArchiveLoader, LoaderGuard};
pub use provider::{LoadedModule, MemoryProvider, ModuleProvider, ModuleSpec};
pub use runner::{info, run, ArchiveInfo};
pub use session::{Session, SharedBuffer};

use arpy_archive::ArchiveError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] arpy_schema::ManifestError),
    #[error(transparent)]
    Archive(ArchiveError),
    #[error(transparent)]
    Runtime(#[from] arpy_runtime::RuntimeError),
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("archive {archive} has no module '{name}'")]
    ModuleNotFound { archive: String, name: String },
    #[error("no module named '{0}'")]
    NoModule(String),
    #[error("archive {archive} has no entry module '{name}'")]
    EntryNotFound { archive: String, name: String },
    #[error("ambiguous layout: '{name}' is both a module and a package (entry {entry})")]
    AmbiguousLayout { name: String, entry: String },
    #[error("archive {0} is closed")]
    ArchiveClosed(String),
    #[error("archive {archive}: entry {entry} is not valid UTF-8 source")]
    InvalidSource { archive: String, entry: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ArchiveError> for CoreError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::NotFound(path) => CoreError::NotFound(path),
            other => CoreError::Archive(other),
        }
    }
}

impl CoreError {
    /// Exit status requested by a `sys.exit` inside the program, if this
    /// error is one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CoreError::Runtime(e) => e.exit_code(),
            _ => None,
        }
    }
}
