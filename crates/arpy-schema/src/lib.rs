//! Manifest format, module names, and project configuration for arpy.
//!
//! This crate defines the schema layer: the JSON manifest stored at
//! [`MANIFEST_PATH`] inside every archive (`Manifest`), the dotted module
//! identity newtype (`ModuleName`), the truncated content digest
//! (`Checksum`), and the optional `arpy.toml` build defaults
//! (`ProjectConfig`).

pub mod config;
pub mod manifest;
pub mod types;

pub use config::{load_project_config, BuildSection, PackageSection, ProjectConfig, CONFIG_FILE};
pub use manifest::{
    parse_manifest_bytes, parse_manifest_file, parse_manifest_str, Manifest, ManifestError,
    DEFAULT_MAIN_MODULE, DEFAULT_VERSION, FORMAT_VERSION, LANGUAGE_VERSION, MANIFEST_PATH,
    RESERVED_PREFIX,
};
pub use types::{Checksum, ModuleName, CHECKSUM_LEN};

/// File suffix of packaged source modules.
pub const SOURCE_SUFFIX: &str = ".py";

/// Final segment naming a package initializer (`pkg/__init__.py`).
pub const PACKAGE_INIT: &str = "__init__";

/// Conventional archive file extension.
pub const ARCHIVE_EXTENSION: &str = "arpy";
