use crate::checksum::compute_checksum;
use crate::walker::{normalize_entry_name, FsWalker, SourceWalker};
use crate::{ArchiveError, DEFAULT_EXCLUDED_DIRS, DEFAULT_RESOURCE_PATTERNS};
use arpy_schema::{Manifest, ARCHIVE_EXTENSION, MANIFEST_PATH, RESERVED_PREFIX, SOURCE_SUFFIX};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// A file selected for packaging, already read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEntry {
    /// '/'-separated archive path.
    pub name: String,
    pub contents: Vec<u8>,
}

/// The content entries of an archive, before anything is written.
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    /// Source modules, sorted by name. Listed in the manifest.
    pub sources: Vec<PlannedEntry>,
    /// Adjunct resources, sorted by name.
    pub resources: Vec<PlannedEntry>,
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub archive_path: PathBuf,
    /// Content entries in write order (the manifest is not included).
    pub entries: Vec<String>,
    pub manifest: Manifest,
}

/// Walks a source tree and writes an arpy archive.
pub struct ArchiveBuilder<W = FsWalker> {
    source_root: PathBuf,
    walker: W,
    resource_patterns: Vec<String>,
    excluded_dirs: Vec<String>,
}

impl ArchiveBuilder<FsWalker> {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            walker: FsWalker,
            resource_patterns: DEFAULT_RESOURCE_PATTERNS
                .iter()
                .map(|p| (*p).to_owned())
                .collect(),
            excluded_dirs: DEFAULT_EXCLUDED_DIRS
                .iter()
                .map(|d| (*d).to_owned())
                .collect(),
        }
    }
}

impl<W: SourceWalker> ArchiveBuilder<W> {
    /// Replace the file enumeration strategy.
    pub fn with_walker<V: SourceWalker>(self, walker: V) -> ArchiveBuilder<V> {
        ArchiveBuilder {
            source_root: self.source_root,
            walker,
            resource_patterns: self.resource_patterns,
            excluded_dirs: self.excluded_dirs,
        }
    }

    /// Package files matching `*.ext` as resources too.
    #[must_use]
    pub fn include_resource(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if !self.resource_patterns.contains(&pattern) {
            self.resource_patterns.push(pattern);
        }
        self
    }

    /// Skip every directory with this name.
    #[must_use]
    pub fn exclude_dir(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.excluded_dirs.contains(&name) {
            self.excluded_dirs.push(name);
        }
        self
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Enumerate and read every file that will be packaged.
    pub fn plan(&self) -> Result<BuildPlan, ArchiveError> {
        let walked = self.walker.walk(&self.source_root)?;
        let mut plan = BuildPlan::default();

        for file in walked {
            let name = normalize_entry_name(&file.relative);
            if name.is_empty() || self.is_excluded(&name) {
                continue;
            }
            if name.starts_with(RESERVED_PREFIX) {
                warn!("skipping {name}: {RESERVED_PREFIX} is reserved for archive metadata");
                continue;
            }
            let is_source = name.ends_with(SOURCE_SUFFIX);
            if !is_source && !self.is_resource(&name) {
                continue;
            }

            let contents = self.walker.read(&self.source_root, &file)?;
            debug!("planned {name} ({} bytes)", contents.len());
            let entry = PlannedEntry { name, contents };
            if is_source {
                plan.sources.push(entry);
            } else {
                plan.resources.push(entry);
            }
        }

        plan.sources.sort_by(|a, b| a.name.cmp(&b.name));
        plan.resources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(plan)
    }

    /// Plan and write in one step.
    pub fn build(&self, manifest: Manifest, output: &Path) -> Result<BuildOutput, ArchiveError> {
        let plan = self.plan()?;
        plan.write(manifest, output)
    }

    fn is_excluded(&self, name: &str) -> bool {
        let mut segments: Vec<&str> = name.split('/').collect();
        segments.pop();
        segments
            .iter()
            .any(|seg| self.excluded_dirs.iter().any(|d| d == seg))
    }

    fn is_resource(&self, name: &str) -> bool {
        let file_name = name.rsplit('/').next().unwrap_or(name);
        self.resource_patterns.iter().any(|pattern| {
            pattern
                .strip_prefix('*')
                .is_some_and(|suffix| file_name.ends_with(suffix) && file_name.len() > suffix.len())
        })
    }
}

impl BuildPlan {
    /// Names of the source entries, in manifest order.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|e| e.name.clone()).collect()
    }

    /// All content entries in write order.
    pub fn entries(&self) -> impl Iterator<Item = &PlannedEntry> {
        self.sources.iter().chain(self.resources.iter())
    }

    /// Write the archive to `output`, finishing with the manifest entry.
    ///
    /// The manifest's `modules`, `checksum` and (if empty) `created` fields are
    /// filled in here. The archive is assembled in a temporary file beside
    /// `output` and renamed into place, so a failed build leaves no partial
    /// archive behind.
    pub fn write(self, mut manifest: Manifest, output: &Path) -> Result<BuildOutput, ArchiveError> {
        manifest.modules = self.source_names();
        manifest.checksum =
            compute_checksum(self.entries().map(|e| (e.name.as_str(), e.contents.as_slice())));
        if manifest.created.is_empty() {
            manifest.created = chrono::Utc::now().to_rfc3339();
        }
        let manifest_json = manifest.to_json()?;

        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;
        let tmp = NamedTempFile::new_in(&parent)?;

        let encoder = GzEncoder::new(tmp, Compression::default());
        let mut ar = tar::Builder::new(encoder);
        let mut written = Vec::new();
        for entry in self.entries() {
            append_entry(&mut ar, &entry.name, &entry.contents)?;
            written.push(entry.name.clone());
        }
        append_entry(&mut ar, MANIFEST_PATH, manifest_json.as_bytes())?;

        let encoder = ar.into_inner()?;
        let mut tmp = encoder.finish()?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(output).map_err(|e| ArchiveError::Io(e.error))?;

        info!(
            "wrote {} ({} entries, checksum {})",
            output.display(),
            written.len(),
            manifest.checksum
        );
        Ok(BuildOutput {
            archive_path: output.to_path_buf(),
            entries: written,
            manifest,
        })
    }
}

/// Append one regular-file entry with deterministic header fields.
fn append_entry<T: Write>(ar: &mut tar::Builder<T>, name: &str, data: &[u8]) -> Result<(), ArchiveError> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    ar.append_data(&mut header, name, data)?;
    Ok(())
}

/// `<source-dir-name>.arpy` in the current directory.
pub fn default_output_path(source_root: &Path) -> PathBuf {
    let stem = source_root
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .or_else(|| source_root.file_name())
        .map_or_else(|| "archive".to_owned(), |n| n.to_string_lossy().into_owned());
    PathBuf::from(format!("{stem}.{ARCHIVE_EXTENSION}"))
}
