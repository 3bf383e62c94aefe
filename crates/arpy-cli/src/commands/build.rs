use super::{json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use arpy_core::{build_archive, BuildOptions};
use std::path::Path;

pub fn run(source: &Path, options: &BuildOptions, json: bool) -> Result<u8, String> {
    let pb = if json {
        None
    } else {
        Some(spinner("packaging sources..."))
    };

    let built = match build_archive(source, options) {
        Ok(b) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "archive built");
            }
            b
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "build failed");
            }
            return Err(e.to_string());
        }
    };

    if json {
        let payload = serde_json::json!({
            "archive": built.archive_path,
            "entries": built.entries,
            "manifest": built.manifest,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("built {}", built.archive_path.display());
        println!(
            "{} {} (main {}, checksum {})",
            built.manifest.name,
            built.manifest.version,
            built.manifest.main_module,
            built.manifest.checksum
        );
        println!("packaged {} files:", built.entries.len());
        for entry in &built.entries {
            println!("  {entry}");
        }
    }
    Ok(EXIT_SUCCESS)
}
