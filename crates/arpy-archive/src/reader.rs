use crate::ArchiveError;
use arpy_schema::{parse_manifest_bytes, Manifest, MANIFEST_PATH};
use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One regular-file entry of an opened archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub contents: Vec<u8>,
}

/// A read-only, fully in-memory view of an archive.
///
/// Opening decompresses every regular-file entry; later reads never touch the
/// file again. Dropping the reader releases the data.
#[derive(Debug)]
pub struct ArchiveReader {
    path: PathBuf,
    entries: Vec<ArchiveEntry>,
    by_name: HashMap<String, usize>,
    manifest: Manifest,
    manifest_present: bool,
}

impl ArchiveReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ArchiveError::from_open(path, e))?;
        let mut ar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

        let mut entries: Vec<ArchiveEntry> = Vec::new();
        let mut by_name = HashMap::new();
        for entry in ar.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let raw = entry.path_bytes().into_owned();
            let name = String::from_utf8(raw)
                .map_err(|e| ArchiveError::InvalidEntryName(String::from_utf8_lossy(e.as_bytes()).into_owned()))?;
            let name = name.strip_prefix("./").unwrap_or(&name).to_owned();

            let mut contents = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
            entry.read_to_end(&mut contents)?;

            if by_name.contains_key(&name) {
                warn!("duplicate archive entry {name}; keeping the first copy");
                continue;
            }
            by_name.insert(name.clone(), entries.len());
            entries.push(ArchiveEntry { name, contents });
        }

        let (manifest, manifest_present) = match by_name.get(MANIFEST_PATH) {
            Some(&idx) => (parse_manifest_bytes(&entries[idx].contents)?, true),
            None => {
                debug!("{} has no manifest; using defaults", path.display());
                (Manifest::default(), false)
            }
        };

        debug!("opened {} ({} entries)", path.display(), entries.len());
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            by_name,
            manifest,
            manifest_present,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry names in archive order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn read(&self, name: &str) -> Option<&[u8]> {
        self.by_name
            .get(name)
            .map(|&idx| self.entries[idx].contents.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// The archive's manifest, or the default one when it has none.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_present(&self) -> bool {
        self.manifest_present
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn write_raw_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut ar = tar::Builder::new(GzEncoder::new(file, Compression::fast()));
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            ar.append_data(&mut header, name, *data).unwrap();
        }
        ar.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn missing_archive_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = ArchiveReader::open(dir.path().join("nope.arpy"));
        assert!(matches!(result, Err(ArchiveError::NotFound(_))));
    }

    #[test]
    fn archive_without_manifest_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.arpy");
        write_raw_archive(&path, &[("__main__.py", b"print('hi')\n")]);

        let reader = ArchiveReader::open(&path).unwrap();
        assert!(!reader.manifest_present());
        assert_eq!(reader.manifest(), &Manifest::default());
        assert_eq!(reader.read("__main__.py"), Some(&b"print('hi')\n"[..]));
    }

    #[test]
    fn reads_manifest_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.arpy");
        let manifest = Manifest::new("named").with_main_module("app.main");
        let json = manifest.to_json().unwrap();
        write_raw_archive(&path, &[("app/main.py", b""), (MANIFEST_PATH, json.as_bytes())]);

        let reader = ArchiveReader::open(&path).unwrap();
        assert!(reader.manifest_present());
        assert_eq!(reader.manifest().name, "named");
        assert_eq!(reader.manifest().main_module, "app.main");
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.arpy");
        write_raw_archive(&path, &[(MANIFEST_PATH, b"{ nope")]);
        assert!(matches!(
            ArchiveReader::open(&path),
            Err(ArchiveError::Manifest(_))
        ));
    }

    #[test]
    fn leading_dot_slash_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.arpy");
        write_raw_archive(&path, &[("./pkg/mod.py", b"x = 1\n")]);
        let reader = ArchiveReader::open(&path).unwrap();
        assert!(reader.contains("pkg/mod.py"));
    }

    #[test]
    fn not_an_archive_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.arpy");
        std::fs::write(&path, b"definitely not gzip").unwrap();
        assert!(matches!(ArchiveReader::open(&path), Err(ArchiveError::Io(_))));
    }
}
