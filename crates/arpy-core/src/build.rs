use crate::index::ModuleIndex;
use crate::CoreError;
use arpy_archive::{default_output_path, ArchiveBuilder, ArchiveError, BuildOutput};
use arpy_schema::{load_project_config, Manifest, PackageSection};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Explicit build settings. Anything left `None` falls back to the source
/// root's `arpy.toml`, then to the built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub output: Option<PathBuf>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub main: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
}

/// Package the tree at `source_root` into an archive.
///
/// The packaged source names are indexed before anything is written, so a
/// layout where a name is both a module and a package fails without
/// producing output.
pub fn build_archive(source_root: &Path, options: &BuildOptions) -> Result<BuildOutput, CoreError> {
    if !source_root.exists() {
        return Err(CoreError::NotFound(source_root.to_path_buf()));
    }
    if !source_root.is_dir() {
        return Err(ArchiveError::NotADirectory(source_root.to_path_buf()).into());
    }

    let config = load_project_config(source_root)?.unwrap_or_default();
    let mut builder = ArchiveBuilder::new(source_root);
    for pattern in &config.build.include {
        builder = builder.include_resource(pattern.as_str());
    }
    for dir in &config.build.exclude {
        builder = builder.exclude_dir(dir.as_str());
    }

    let plan = builder.plan()?;
    let source_names = plan.source_names();
    let index = ModuleIndex::from_entry_names(source_names.iter().map(String::as_str))?;

    let manifest = resolve_manifest(source_root, options, &config.package);
    if index.entry_for(&manifest.main_module).is_none() {
        warn!(
            "entry module '{}' is not among the packaged sources; the archive will not be runnable",
            manifest.main_module
        );
    }

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(source_root));
    let built = plan.write(manifest, &output)?;
    info!(
        "built {} ({} sources, checksum {})",
        built.archive_path.display(),
        source_names.len(),
        built.manifest.checksum
    );
    Ok(built)
}

fn directory_name(source_root: &Path) -> String {
    source_root
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .or_else(|| source_root.file_name())
        .map_or_else(|| "unnamed".to_owned(), |n| n.to_string_lossy().into_owned())
}

fn resolve_manifest(source_root: &Path, options: &BuildOptions, config: &PackageSection) -> Manifest {
    let pick = |flag: &Option<String>, configured: &Option<String>| {
        flag.clone().or_else(|| configured.clone())
    };

    let name = pick(&options.name, &config.name).unwrap_or_else(|| directory_name(source_root));
    let mut manifest = Manifest::new(name);
    if let Some(version) = pick(&options.version, &config.version) {
        manifest = manifest.with_version(version);
    }
    if let Some(main) = pick(&options.main, &config.main) {
        manifest = manifest.with_main_module(main);
    }
    if let Some(author) = pick(&options.author, &config.author) {
        manifest = manifest.with_author(author);
    }
    if let Some(description) = pick(&options.description, &config.description) {
        manifest = manifest.with_description(description);
    }
    manifest
}
