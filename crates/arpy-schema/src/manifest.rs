use crate::types::{Checksum, ModuleName};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Reserved archive path holding the manifest. Always written last.
pub const MANIFEST_PATH: &str = "META-INF/manifest.json";
/// Entries under this prefix are metadata, never modules.
pub const RESERVED_PREFIX: &str = "META-INF/";
/// Manifest format written by this version of arpy.
pub const FORMAT_VERSION: &str = "1.0.0";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_MAIN_MODULE: &str = "__main__";
/// Version of the script dialect understood by the bundled interpreter.
pub const LANGUAGE_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("failed to parse project config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("manifest is not valid UTF-8")]
    NotUtf8,
    #[error("invalid project config: {0}")]
    InvalidConfig(String),
}

/// Metadata record stored at [`MANIFEST_PATH`].
///
/// Every field has a default so that partial or legacy manifests still
/// load; an archive without any manifest uses [`Manifest::default`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Manifest {
    #[serde(alias = "arpy_version")]
    pub format_version: String,
    pub name: String,
    pub version: String,
    pub main_module: ModuleName,
    pub author: String,
    pub description: String,
    /// RFC 3339 build timestamp; empty when unknown.
    pub created: String,
    #[serde(alias = "python_requires")]
    pub minimum_host_version: String,
    /// Archive-relative paths of the packaged source files, in build order.
    pub modules: Vec<String>,
    pub checksum: Checksum,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION.to_owned(),
            name: "unnamed".to_owned(),
            version: DEFAULT_VERSION.to_owned(),
            main_module: ModuleName::new(DEFAULT_MAIN_MODULE),
            author: String::new(),
            description: String::new(),
            created: String::new(),
            minimum_host_version: String::new(),
            modules: Vec::new(),
            checksum: Checksum::default(),
        }
    }
}

impl Manifest {
    /// Start a manifest for a fresh build of `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            minimum_host_version: format!(">={LANGUAGE_VERSION}"),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[must_use]
    pub fn with_main_module(mut self, main: impl Into<ModuleName>) -> Self {
        self.main_module = main.into();
        self
    }

    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Pretty-printed JSON, the on-archive representation.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn parse_manifest_str(input: &str) -> Result<Manifest, ManifestError> {
    Ok(serde_json::from_str(input)?)
}

pub fn parse_manifest_bytes(input: &[u8]) -> Result<Manifest, ManifestError> {
    let text = std::str::from_utf8(input).map_err(|_| ManifestError::NotUtf8)?;
    parse_manifest_str(text.trim_start_matches('\u{feff}'))
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let content = fs::read(path)?;
    parse_manifest_bytes(&content)
}
