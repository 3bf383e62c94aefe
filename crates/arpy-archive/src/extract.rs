//! Archive extraction with path traversal protection.

use crate::reader::ArchiveReader;
use crate::ArchiveError;
use std::fs;
use std::path::{Component, Path};
use tracing::{debug, info};

/// Unpack every entry of the archive at `archive_path` into `dest_dir`,
/// including the manifest. Returns the entry names written, in archive order.
///
/// All entry names are validated before anything is written, so an archive
/// containing a single escaping path extracts nothing.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<Vec<String>, ArchiveError> {
    let reader = ArchiveReader::open(archive_path)?;
    for name in reader.names() {
        validate_entry_path(name)?;
    }

    fs::create_dir_all(dest_dir)?;
    let mut written = Vec::with_capacity(reader.len());
    for entry in reader.entries() {
        let dest = dest_dir.join(&entry.name);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, &entry.contents)?;
        debug!("extracted {}", entry.name);
        written.push(entry.name.clone());
    }

    info!(
        "extracted {} entries from {} into {}",
        written.len(),
        archive_path.display(),
        dest_dir.display()
    );
    Ok(written)
}

/// Reject absolute names and any `..` component.
fn validate_entry_path(name: &str) -> Result<(), ArchiveError> {
    let traversal = || ArchiveError::PathTraversal {
        path: name.to_owned(),
    };
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(traversal());
    }
    let path = Path::new(name);
    if path.is_absolute() {
        return Err(traversal());
    }
    for component in path.components() {
        if matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        ) {
            return Err(traversal());
        }
    }
    if name.split(['/', '\\']).any(|seg| seg == "..") {
        return Err(traversal());
    }
    Ok(())
}
