use crate::model::{MergedReport, NormalizedScoreTable};
use crate::pipeline::RunStats;
use std::path::Path;

pub fn print_summary(
    stats: &RunStats,
    report: &MergedReport,
    normalized: Option<&NormalizedScoreTable>,
    out: &Path,
) {
    eprintln!(
        "\nMerged {} gold + {} current files ({} overwritten by current)",
        stats.gold_files, stats.current_files, stats.overwritten
    );
    eprintln!(
        "Parsed {} result files: {} scores, {} task configs",
        stats.files, stats.score_records, stats.config_records
    );

    eprintln!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprintln!(
        "Report: {} rows (task × metric) across {} models",
        report.rows.len(),
        report.models.len()
    );
    for model in &report.models {
        let covered = report
            .rows
            .iter()
            .filter(|r| r.scores.contains_key(model))
            .count();
        eprintln!("  {:<40} {:>4} rows", model, covered);
    }

    if let Some(table) = normalized {
        eprintln!("\nNormalized mean by language:");
        let header: Vec<String> = table.languages.iter().map(|l| format!("{:>10}", l)).collect();
        eprintln!("  {:<40} {}", "", header.join(" "));
        for row in &table.rows {
            let cells: Vec<String> = table
                .languages
                .iter()
                .map(|l| {
                    row.by_language
                        .get(l)
                        .map(|v| format!("{:>10.3}", v))
                        .unwrap_or_else(|| format!("{:>10}", "-"))
                })
                .collect();
            eprintln!("  {:<40} {}", row.model, cells.join(" "));
        }
    }

    eprintln!("\n✅ Report saved to {}", out.display());
}
