use super::{json_pretty, or_dash, EXIT_SUCCESS};
use arpy_core::info;
use console::Style;
use std::path::Path;

pub fn run(archive: &Path, json: bool) -> Result<u8, String> {
    let info = info(archive).map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&info)?);
        return Ok(EXIT_SUCCESS);
    }

    let heading = Style::new().bold();
    let m = &info.manifest;
    println!("{}", heading.apply_to(archive.display()));
    println!("name:         {}", m.name);
    println!("version:      {}", m.version);
    println!("author:       {}", or_dash(&m.author));
    println!("description:  {}", or_dash(&m.description));
    println!("created:      {}", or_dash(&m.created));
    println!("main:         {}", m.main_module);
    println!("checksum:     {}", or_dash(m.checksum.as_str()));

    println!();
    println!("{} ({})", heading.apply_to("modules"), info.modules.len());
    for module in &info.modules {
        println!("  {module}");
    }
    println!();
    println!("{} ({})", heading.apply_to("packages"), info.packages.len());
    for package in &info.packages {
        println!("  {package}");
    }
    Ok(EXIT_SUCCESS)
}
