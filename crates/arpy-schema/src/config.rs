//! Optional `arpy.toml` build defaults read from the source root.

use crate::manifest::ManifestError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE: &str = "arpy.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub package: PackageSection,
    #[serde(default)]
    pub build: BuildSection,
}

/// Manifest metadata defaults; command-line flags take precedence.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Extra `*.ext` patterns packaged as resources.
    #[serde(default)]
    pub include: Vec<String>,
    /// Extra directory names skipped during the walk.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl ProjectConfig {
    pub fn parse(input: &str) -> Result<Self, ManifestError> {
        let config: ProjectConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        for pattern in &self.build.include {
            if !pattern.starts_with("*.") || pattern.len() < 3 || pattern[2..].contains(['/', '*']) {
                return Err(ManifestError::InvalidConfig(format!(
                    "include pattern '{pattern}' must look like '*.ext'"
                )));
            }
        }
        for dir in &self.build.exclude {
            if dir.is_empty() || dir.contains(['/', '\\']) {
                return Err(ManifestError::InvalidConfig(format!(
                    "exclude entry '{dir}' must be a single directory name"
                )));
            }
        }
        if let Some(main) = &self.package.main {
            if main.is_empty() || main.split('.').any(str::is_empty) {
                return Err(ManifestError::InvalidConfig(format!(
                    "main module '{main}' is not a dotted name"
                )));
            }
        }
        Ok(())
    }
}

/// Load `<root>/arpy.toml`, returning `None` when the file is absent.
pub fn load_project_config(root: &Path) -> Result<Option<ProjectConfig>, ManifestError> {
    let path = root.join(CONFIG_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    ProjectConfig::parse(&content).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let input = r#"
[package]
name = "demo"
version = "0.2.0"
main = "app.__main__"
author = "someone"
description = "demo project"

[build]
include = ["*.toml", "*.md"]
exclude = ["tests", "venv"]
"#;
        let config = ProjectConfig::parse(input).expect("should parse");
        assert_eq!(config.package.name.as_deref(), Some("demo"));
        assert_eq!(config.package.main.as_deref(), Some("app.__main__"));
        assert_eq!(config.build.include, vec!["*.toml", "*.md"]);
        assert_eq!(config.build.exclude.len(), 2);
    }

    #[test]
    fn empty_config_is_default() {
        assert_eq!(ProjectConfig::parse("").unwrap(), ProjectConfig::default());
    }

    #[test]
    fn rejects_unknown_fields() {
        let input = r#"
[package]
name = "demo"
entry = "oops"
"#;
        assert!(ProjectConfig::parse(input).is_err());
    }

    #[test]
    fn rejects_bad_include_pattern() {
        let input = r#"
[build]
include = ["src/*.py"]
"#;
        assert!(matches!(
            ProjectConfig::parse(input),
            Err(ManifestError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_nested_exclude() {
        let input = r#"
[build]
exclude = ["a/b"]
"#;
        assert!(ProjectConfig::parse(input).is_err());
    }

    #[test]
    fn rejects_bad_main_module() {
        let input = r#"
[package]
main = "app..main"
"#;
        assert!(ProjectConfig::parse(input).is_err());
    }

    #[test]
    fn load_returns_none_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_project_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[package]\nname = \"from-file\"\n",
        )
        .unwrap();
        let config = load_project_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.package.name.as_deref(), Some("from-file"));
    }
}
