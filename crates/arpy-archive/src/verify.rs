use crate::checksum::compute_checksum;
use crate::reader::ArchiveReader;
use crate::ArchiveError;
use arpy_schema::Checksum;
use serde::Serialize;
use std::path::Path;

/// Outcome of recomputing an archive's content digest.
///
/// The checksum is advisory metadata: nothing else in arpy consults it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VerifyReport {
    /// Digest recorded in the manifest (empty when there is no manifest).
    pub recorded: Checksum,
    pub computed: Checksum,
    pub manifest_present: bool,
    pub entries_checked: usize,
}

impl VerifyReport {
    pub fn matches(&self) -> bool {
        self.manifest_present && self.recorded == self.computed
    }
}

pub fn verify_archive(path: &Path) -> Result<VerifyReport, ArchiveError> {
    let reader = ArchiveReader::open(path)?;
    Ok(verify_reader(&reader))
}

pub fn verify_reader(reader: &ArchiveReader) -> VerifyReport {
    let computed = compute_checksum(
        reader
            .entries()
            .iter()
            .map(|e| (e.name.as_str(), e.contents.as_slice())),
    );
    let entries_checked = reader
        .names()
        .filter(|n| *n != arpy_schema::MANIFEST_PATH)
        .count();
    VerifyReport {
        recorded: reader.manifest().checksum.clone(),
        computed,
        manifest_present: reader.manifest_present(),
        entries_checked,
    }
}
