use arpy_core::{run as run_archive, Session};
use std::path::Path;

/// Execute the archive with this process's stdio and exit with the
/// program's status.
pub fn run(archive: &Path, args: &[String]) -> Result<u8, String> {
    let mut session = Session::new();
    let status = run_archive(&mut session, archive, args).map_err(|e| e.to_string())?;
    Ok((status & 0xff) as u8)
}
