//! End-to-end flow: overlay the two trees, scan and extract once, reshape,
//! join configs, reduce, and optionally normalize.

use crate::config::ReportConfig;
use crate::extract::extract_all;
use crate::join::{group_max, join_configs};
use crate::merge::overlay;
use crate::model::{MergedReport, NormalizedScoreTable};
use crate::normalize::{normalize, ReferenceTable};
use crate::reshape::reshape;
use crate::scan::scan_tree;
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ReportInputs {
    pub current_root: PathBuf,
    pub gold_root: PathBuf,
    /// Where the transient merged tree is created.
    pub scratch_parent: PathBuf,
    pub reference: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub gold_files: usize,
    pub current_files: usize,
    pub overwritten: usize,
    pub files: usize,
    pub score_records: usize,
    pub config_records: usize,
    pub pivot_rows: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub report: MergedReport,
    pub normalized: Option<NormalizedScoreTable>,
    pub stats: RunStats,
}

/// Scan, extract, reshape and reduce a single results tree.
pub async fn generate_results(root: &Path, cfg: &ReportConfig) -> Result<(MergedReport, RunStats)> {
    let files = scan_tree(root)?;
    let mut stats = RunStats {
        files: files.len(),
        ..RunStats::default()
    };

    let extraction = extract_all(files).await?;
    stats.score_records = extraction.scores.len();
    stats.config_records = extraction.configs.len();

    let pivot = reshape(&extraction, cfg);
    stats.pivot_rows = pivot.rows.len();

    let report = group_max(join_configs(&pivot, &extraction.configs));
    Ok((report, stats))
}

/// Drops metrics the results sheet does not show and models left without
/// any score.
pub fn reportable(report: MergedReport, cfg: &ReportConfig) -> MergedReport {
    let rows: Vec<_> = report
        .rows
        .into_iter()
        .filter(|r| !cfg.is_excluded_from_report(&r.metric))
        .collect();
    let models = report
        .models
        .into_iter()
        .filter(|m| rows.iter().any(|r| r.scores.contains_key(m)))
        .collect();
    MergedReport { models, rows }
}

pub async fn run(inputs: &ReportInputs, cfg: &ReportConfig) -> Result<PipelineOutput> {
    // Fail on a bad reference table before any copying happens.
    let references = match &inputs.reference {
        Some(path) => Some(ReferenceTable::load(path)?),
        None => None,
    };

    let merged = overlay(&inputs.gold_root, &inputs.current_root, &inputs.scratch_parent)?;
    let (report, mut stats) = generate_results(merged.root(), cfg).await?;
    stats.gold_files = merged.gold.files;
    stats.current_files = merged.current.files;
    stats.overwritten = merged.current.overwritten;
    merged.close()?;

    let report = reportable(report, cfg);
    let normalized = match &references {
        Some(refs) => Some(normalize(&report, refs, cfg)?),
        None => None,
    };

    Ok(PipelineOutput {
        report,
        normalized,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MergedReportRow;

    #[test]
    fn test_reportable_hides_norm_metrics() {
        let row = |metric: &str, model: &str| MergedReportRow {
            task: "arc".into(),
            metric: metric.into(),
            random_flag: None,
            language: None,
            output_type: None,
            scores: [(model.to_string(), 0.5)].into_iter().collect(),
        };
        let report = MergedReport {
            models: vec!["a".into(), "b".into()],
            rows: vec![row("acc", "a"), row("acc_norm", "b")],
        };
        let shown = reportable(report, &ReportConfig::default());
        assert_eq!(shown.rows.len(), 1);
        assert_eq!(shown.models, vec!["a"]);
    }
}
