use super::exit_codes;
use crate::cli::args::{OutputFormat, ScanArgs};
use evalboard_core::identity;
use evalboard_core::scan::scan_tree;
use serde_json::json;

pub fn cmd_scan(args: ScanArgs) -> anyhow::Result<i32> {
    let files = scan_tree(&args.root)?;

    match args.format {
        OutputFormat::Json => {
            let entries: Vec<_> = files
                .iter()
                .map(|f| {
                    json!({
                        "path": f.path,
                        "root_folder": f.root_folder,
                        "model_folder": f.model_folder,
                        "identity": identity::parse(&f.model_folder),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            for f in &files {
                let id = match identity::parse(&f.model_folder) {
                    Some(id) => format!("{} | {} | {}", id.model_name, id.language, id.shots),
                    None => "(undecodable folder name)".to_string(),
                };
                println!("{}  [{}]", f.path.display(), id);
            }
            eprintln!("{} result files", files.len());
        }
    }

    Ok(exit_codes::OK)
}
