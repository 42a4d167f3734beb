use crate::model::CandidateFile;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub fn is_result_file(name: &str) -> bool {
    name.starts_with("results_") && name.ends_with(".json")
}

/// Walks `root/<root_folder>/<model_folder>/<run>/results_*.json`.
///
/// Anything that is not a directory at the three folder levels, or not a
/// result file inside a run folder, is skipped. Entries are visited in name
/// order so repeated scans agree.
pub fn scan_tree(root: &Path) -> Result<Vec<CandidateFile>> {
    let mut out = Vec::new();

    for (root_folder, root_path) in sorted_entries(root)? {
        if !root_path.is_dir() {
            continue;
        }
        tracing::debug!(event = "scan_root", root_folder = %root_folder);

        for (model_folder, model_path) in sorted_entries(&root_path)? {
            if !model_path.is_dir() {
                continue;
            }
            tracing::debug!(event = "scan_model", model_folder = %model_folder);

            for (_, run_path) in sorted_entries(&model_path)? {
                if !run_path.is_dir() {
                    continue;
                }
                for (file_name, file_path) in sorted_entries(&run_path)? {
                    if !is_result_file(&file_name) || !file_path.is_file() {
                        continue;
                    }
                    out.push(CandidateFile {
                        path: file_path,
                        root_folder: root_folder.clone(),
                        model_folder: model_folder.clone(),
                    });
                }
            }
        }
    }

    tracing::info!(event = "scan_done", root = %root.display(), files = out.len());
    Ok(out)
}

fn sorted_entries(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    let rd = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list directory: {}", dir.display()))?;
    for entry in rd {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().to_string();
        entries.push((name, entry.path()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}
