use crate::ArchiveError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A file discovered under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    /// Path relative to the source root, spelled with the host's separator.
    pub relative: String,
}

/// Enumerates files beneath a source root and reads their bytes.
///
/// The builder never touches the filesystem directly; tests substitute a
/// walker that reports paths in a foreign separator convention.
pub trait SourceWalker {
    fn walk(&self, root: &Path) -> Result<Vec<WalkedFile>, ArchiveError>;

    fn read(&self, root: &Path, file: &WalkedFile) -> Result<Vec<u8>, ArchiveError>;
}

/// Walks the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWalker;

impl SourceWalker for FsWalker {
    fn walk(&self, root: &Path) -> Result<Vec<WalkedFile>, ArchiveError> {
        let meta = fs::metadata(root).map_err(|e| ArchiveError::from_open(root, e))?;
        if !meta.is_dir() {
            return Err(ArchiveError::NotADirectory(root.to_path_buf()));
        }
        let mut files = Vec::new();
        collect_files(root, root, &mut files)?;
        Ok(files)
    }

    fn read(&self, root: &Path, file: &WalkedFile) -> Result<Vec<u8>, ArchiveError> {
        Ok(fs::read(root.join(&file.relative))?)
    }
}

/// Recursively collect regular files (following file symlinks only).
fn collect_files(root: &Path, current: &Path, out: &mut Vec<WalkedFile>) -> Result<(), ArchiveError> {
    for entry in fs::read_dir(current)? {
        let entry = entry?;
        let full: PathBuf = entry.path();
        let file_type = entry.file_type()?;

        let is_file = if file_type.is_dir() {
            collect_files(root, &full, out)?;
            continue;
        } else if file_type.is_symlink() {
            match fs::metadata(&full) {
                Ok(target) if target.is_file() => true,
                Ok(_) => {
                    warn!("skipping symlinked directory {}", full.display());
                    false
                }
                Err(e) => {
                    warn!("skipping dangling symlink {}: {e}", full.display());
                    false
                }
            }
        } else {
            file_type.is_file()
        };

        if is_file {
            let rel = full
                .strip_prefix(root)
                .map_err(|e| ArchiveError::Io(std::io::Error::other(format!("path strip: {e}"))))?
                .to_string_lossy()
                .into_owned();
            out.push(WalkedFile { relative: rel });
        }
    }
    Ok(())
}

/// Convert a host-spelled relative path into an archive entry name.
///
/// Both separators collapse to '/', empty and `.` segments are dropped, so
/// `pkg\sub.py`, `./pkg/sub.py` and `pkg//sub.py` all become `pkg/sub.py`.
pub fn normalize_entry_name(relative: &str) -> String {
    relative
        .split(['/', '\\'])
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}
