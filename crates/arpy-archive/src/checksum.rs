use arpy_schema::{Checksum, MANIFEST_PATH};

/// Digest over `(name, content)` pairs, independent of input order.
///
/// Entries are hashed in lexicographic name order, name bytes first and then
/// content bytes, and the blake3 hex digest is truncated to
/// [`arpy_schema::CHECKSUM_LEN`] characters. The manifest entry is skipped so
/// the digest can be embedded in the manifest it describes.
pub fn compute_checksum<'a, I>(entries: I) -> Checksum
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut sorted: Vec<(&str, &[u8])> = entries
        .into_iter()
        .filter(|(name, _)| *name != MANIFEST_PATH)
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = blake3::Hasher::new();
    for (name, content) in sorted {
        hasher.update(name.as_bytes());
        hasher.update(content);
    }
    Checksum::from_digest_hex(hasher.finalize().to_hex().as_str())
}
