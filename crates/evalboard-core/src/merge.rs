//! Overlay of the current results tree onto the gold tree.
//!
//! Both trees are copied into one temporary directory, gold first, so a file
//! present at the same relative path in both ends up with the current
//! content. The directory is removed when [`MergedTree`] drops, which covers
//! early returns through `?` as well.

use crate::errors::StructuralError;
use anyhow::{Context, Result};
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub overwritten: usize,
}

#[derive(Debug)]
pub struct MergedTree {
    dir: TempDir,
    pub gold: CopyStats,
    pub current: CopyStats,
}

impl MergedTree {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Removes the merged copy now rather than on drop, surfacing I/O errors.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .with_context(|| format!("failed to remove merged tree {}", path.display()))
    }
}

/// Builds the merged tree inside `scratch_parent`.
pub fn overlay(gold_root: &Path, current_root: &Path, scratch_parent: &Path) -> Result<MergedTree> {
    if !gold_root.is_dir() {
        return Err(StructuralError(format!(
            "gold results folder not found: {}",
            gold_root.display()
        ))
        .into());
    }
    if !current_root.is_dir() {
        return Err(StructuralError(format!(
            "current results folder not found: {}",
            current_root.display()
        ))
        .into());
    }

    std::fs::create_dir_all(scratch_parent)
        .with_context(|| format!("failed to create {}", scratch_parent.display()))?;
    let dir = tempfile::Builder::new()
        .prefix(".evalboard-merge-")
        .tempdir_in(scratch_parent)
        .with_context(|| format!("failed to create temp dir in {}", scratch_parent.display()))?;

    let gold = copy_tree(gold_root, dir.path())?;
    let current = copy_tree(current_root, dir.path())?;

    tracing::info!(
        event = "merge_overlay",
        gold_files = gold.files,
        current_files = current.files,
        overwritten = current.overwritten,
        merged = %dir.path().display()
    );

    Ok(MergedTree { dir, gold, current })
}

/// Recursive copy of `src` into `dst`; existing files are replaced.
///
/// Symlinked folders and files are followed, so their contents land in the
/// merged tree as plain copies.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<CopyStats> {
    let mut stats = CopyStats::default();
    std::fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;

    for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", src.display()))?;
        let from = entry.path();
        let rel = from
            .strip_prefix(src)
            .with_context(|| format!("{} is outside {}", from.display(), src.display()))?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let to = dst.join(rel);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&to)
                .with_context(|| format!("failed to create {}", to.display()))?;
            continue;
        }
        if to.exists() {
            stats.overwritten += 1;
            tracing::debug!(event = "merge_overwrite", path = %to.display());
        }
        std::fs::copy(from, &to)
            .with_context(|| format!("failed to copy {} to {}", from.display(), to.display()))?;
        stats.files += 1;
    }
    Ok(stats)
}
