use crate::loader::ArchiveLoader;
use crate::provider::ModuleProvider;
use crate::session::Session;
use crate::CoreError;
use arpy_runtime::CodeUnit;
use arpy_schema::Manifest;
use serde::Serialize;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info};

/// Run the archive at `archive` as a program and return its exit status.
///
/// The entry module named by the manifest is executed as `__main__` with
/// `sys.argv` set to `[archive, args...]`. The previous `argv` is restored
/// and the loader closed on every exit path. A `sys.exit(code)` inside the
/// program becomes the returned status.
pub fn run(session: &mut Session, archive: &Path, args: &[String]) -> Result<i32, CoreError> {
    if !archive.exists() {
        return Err(CoreError::NotFound(archive.to_path_buf()));
    }

    let mut guard = ArchiveLoader::activate(session, archive)?;
    let loader = Rc::clone(guard.loader());
    let entry = loader.manifest().main_module.clone();
    let archive_display = archive.display().to_string();

    if loader.index().entry_for(&entry).is_none() {
        return Err(CoreError::EntryNotFound {
            archive: archive_display,
            name: entry.into_inner(),
        });
    }
    let code = entry_code(&loader, &entry)?;

    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push(archive_display.clone());
    argv.extend(args.iter().cloned());
    let previous = guard.replace_argv(&argv);

    info!("running {} (entry {entry})", archive.display());
    let parent = entry.parent();
    let result = match &parent {
        Some(package) => guard.import(package).map(drop),
        None => Ok(()),
    }
    .and_then(|()| {
        guard
            .run_main(&code, &archive_display, parent.as_deref())
            .map(drop)
    });

    guard.set_argv(&previous);
    drop(guard);

    match result {
        Ok(()) => Ok(0),
        Err(e) => match e.exit_code() {
            Some(code) => {
                debug!("program exited with status {code}");
                Ok(code)
            }
            None => Err(e),
        },
    }
}

fn entry_code(loader: &ArchiveLoader, entry: &str) -> Result<CodeUnit, CoreError> {
    let loaded = loader.load(entry)?;
    loaded.code.ok_or_else(|| CoreError::EntryNotFound {
        archive: loader.path().display().to_string(),
        name: entry.to_owned(),
    })
}

/// Manifest and module listing of an archive.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveInfo {
    pub manifest: Manifest,
    /// Leaf module identities, sorted.
    pub modules: Vec<String>,
    /// Package identities, sorted.
    pub packages: Vec<String>,
    /// Every entry name, in archive order.
    pub entries: Vec<String>,
}

/// Read an archive's manifest and index without installing it anywhere.
pub fn info(archive: &Path) -> Result<ArchiveInfo, CoreError> {
    let loader = ArchiveLoader::open(archive)?;
    let info = ArchiveInfo {
        manifest: loader.manifest().clone(),
        modules: loader.index().modules().map(ToString::to_string).collect(),
        packages: loader.index().packages().map(ToString::to_string).collect(),
        entries: loader.entry_names(),
    };
    loader.release();
    Ok(info)
}
