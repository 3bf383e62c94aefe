use super::{colorize_status, json_pretty, EXIT_ARCHIVE_ERROR, EXIT_SUCCESS};
use arpy_archive::verify_archive;
use std::path::Path;

pub fn run(archive: &Path, json: bool) -> Result<u8, String> {
    let report = verify_archive(archive).map_err(|e| e.to_string())?;
    let status = if !report.manifest_present {
        "unverified"
    } else if report.matches() {
        "ok"
    } else {
        "mismatch"
    };

    if json {
        let payload = serde_json::json!({
            "status": status,
            "recorded": report.recorded,
            "computed": report.computed,
            "entries_checked": report.entries_checked,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("checksum: {}", colorize_status(status));
        println!("  recorded: {}", report.recorded);
        println!("  computed: {}", report.computed);
        println!("  entries:  {}", report.entries_checked);
    }

    if report.matches() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_ARCHIVE_ERROR)
    }
}
