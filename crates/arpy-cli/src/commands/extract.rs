use super::{json_pretty, EXIT_SUCCESS};
use arpy_archive::extract_archive;
use arpy_schema::MANIFEST_PATH;
use std::path::{Path, PathBuf};

/// `a/b/app.arpy` unpacks into `a/b/app` unless told otherwise.
fn default_destination(archive: &Path) -> PathBuf {
    let stem = archive
        .file_stem()
        .map_or_else(|| "extracted".into(), ToOwned::to_owned);
    archive.with_file_name(stem)
}

pub fn run(archive: &Path, output: Option<&Path>, json: bool) -> Result<u8, String> {
    if !archive.exists() {
        return Err(format!("not found: {}", archive.display()));
    }
    let dest = output.map_or_else(|| default_destination(archive), Path::to_path_buf);
    let written = extract_archive(archive, &dest).map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "destination": dest,
            "entries": written,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        let files = written.iter().filter(|n| *n != MANIFEST_PATH).count();
        println!("extracted {files} files into {}", dest.display());
    }
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_defaults_to_archive_stem() {
        assert_eq!(
            default_destination(Path::new("out/demo.arpy")),
            PathBuf::from("out/demo")
        );
        assert_eq!(default_destination(Path::new("demo.arpy")), PathBuf::from("demo"));
    }
}
