//! Archive container handling for arpy.
//!
//! This crate provides the storage layer: `ArchiveBuilder` walks a source tree
//! (through the `SourceWalker` seam) and writes a gzip-compressed tar archive
//! whose entry names are always '/'-separated, `ArchiveReader` opens an archive
//! read-only into memory, `compute_checksum` derives the truncated content
//! digest recorded in the manifest, `extract_archive` unpacks with path
//! traversal protection, and `verify_archive` recomputes the digest on demand.

pub mod builder;
pub mod checksum;
pub mod extract;
pub mod reader;
pub mod verify;
pub mod walker;

pub use builder::{default_output_path, ArchiveBuilder, BuildOutput, BuildPlan, PlannedEntry};
pub use checksum::compute_checksum;
pub use extract::extract_archive;
pub use reader::{ArchiveEntry, ArchiveReader};
pub use verify::{verify_archive, verify_reader, VerifyReport};
pub use walker::{normalize_entry_name, FsWalker, SourceWalker, WalkedFile};

use arpy_schema::ManifestError;
use std::path::PathBuf;
use thiserror::Error;

/// Resource patterns packaged alongside source files by default.
pub const DEFAULT_RESOURCE_PATTERNS: &[&str] = &["*.json", "*.yaml", "*.yml", "*.txt", "*.cfg"];

/// Directory names never descended into.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &["__pycache__"];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("archive entry name is not valid UTF-8: {0}")]
    InvalidEntryName(String),
    #[error("archive entry escapes the destination directory: {path}")]
    PathTraversal { path: String },
}

impl ArchiveError {
    /// Map an `open`-style I/O failure on `path` to [`ArchiveError::NotFound`]
    /// when the file is missing.
    pub(crate) fn from_open(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            ArchiveError::NotFound(path.to_path_buf())
        } else {
            ArchiveError::Io(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn archive_error_display_not_found() {
        let e = ArchiveError::NotFound(PathBuf::from("/missing/demo.arpy"));
        assert!(e.to_string().contains("/missing/demo.arpy"));
    }

    #[test]
    fn archive_error_display_path_traversal() {
        let e = ArchiveError::PathTraversal {
            path: "../evil.py".to_owned(),
        };
        assert!(e.to_string().contains("../evil.py"));
    }

    #[test]
    fn from_open_maps_missing_file() {
        let err = std::io::Error::from(std::io::ErrorKind::NotFound);
        let mapped = ArchiveError::from_open(Path::new("x.arpy"), err);
        assert!(matches!(mapped, ArchiveError::NotFound(_)));
    }

    #[test]
    fn from_open_keeps_other_errors() {
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let mapped = ArchiveError::from_open(Path::new("x.arpy"), err);
        assert!(matches!(mapped, ArchiveError::Io(_)));
    }
}
