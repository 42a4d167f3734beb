use super::exit_codes;
use crate::cli::args::ReportArgs;
use anyhow::Context;
use evalboard_core::config::resolve_config;
use evalboard_core::model::{MergedReport, NormalizedScoreTable};
use evalboard_core::pipeline::{self, ReportInputs, RunStats};
use evalboard_core::report::console::print_summary;
use evalboard_core::report::xlsx::{report_file_name, write_report};
use serde::Serialize;

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    stats: &'a RunStats,
    report: &'a MergedReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    normalized: Option<&'a NormalizedScoreTable>,
}

pub async fn cmd_report(args: ReportArgs) -> anyhow::Result<i32> {
    let cfg = resolve_config(args.config.as_deref(), args.strict_config)?;

    let inputs = ReportInputs {
        current_root: args.evaluation_folder.join("results"),
        gold_root: args.evaluation_folder_gold.join("results"),
        scratch_parent: args.evaluation_folder.clone(),
        reference: args.reference.clone(),
    };
    tracing::info!(
        event = "report_start",
        current = %inputs.current_root.display(),
        gold = %inputs.gold_root.display(),
        reference = ?inputs.reference
    );

    let out = pipeline::run(&inputs, &cfg).await?;
    if out.report.rows.is_empty() {
        tracing::warn!(event = "report_empty", "no scores found in either tree");
    }

    let now = chrono::Local::now();
    let out_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| args.evaluation_folder.join("reports"));
    let path = out_dir.join(report_file_name(&cfg.report_prefix, now.naive_local()));
    write_report(&path, &out.report, out.normalized.as_ref(), &cfg)?;

    if let Some(json_path) = &args.json {
        let doc = JsonReport {
            generated_at: now.to_rfc3339(),
            stats: &out.stats,
            report: &out.report,
            normalized: out.normalized.as_ref(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        std::fs::write(json_path, json)
            .with_context(|| format!("failed to write {}", json_path.display()))?;
        eprintln!("wrote {}", json_path.display());
    }

    print_summary(&out.stats, &out.report, out.normalized.as_ref(), &path);
    Ok(exit_codes::OK)
}
