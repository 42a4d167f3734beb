use super::style::{highlight, Highlight, Polarity};
use crate::config::ReportConfig;
use crate::model::{MergedReport, NormalizedScoreTable};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};
use std::path::Path;

const BEST_FILL: u32 = 0x90EE90;
const WORST_FILL: u32 = 0xF08080;

/// `<prefix><YYYY-MM-DD_HH-MM-SS>.xlsx`
pub fn report_file_name(prefix: &str, generated_at: NaiveDateTime) -> String {
    format!("{}{}.xlsx", prefix, generated_at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Row-wise tags for the results sheet, one vector per report row aligned
/// with `report.models`.
pub fn results_highlights(report: &MergedReport, cfg: &ReportConfig) -> Vec<Vec<Option<Highlight>>> {
    report
        .rows
        .iter()
        .map(|row| {
            let values: Vec<Option<f64>> = report
                .models
                .iter()
                .map(|m| row.scores.get(m).copied())
                .collect();
            let polarity = if cfg.is_inverted(&row.metric) {
                Polarity::Inverted
            } else {
                Polarity::Default
            };
            highlight(&values, cfg.highlight_count, polarity)
        })
        .collect()
}

/// Column-wise tags for the normalized sheet, indexed `[language][model row]`.
pub fn normalized_highlights(
    table: &NormalizedScoreTable,
    cfg: &ReportConfig,
) -> Vec<Vec<Option<Highlight>>> {
    table
        .languages
        .iter()
        .map(|lang| {
            let values: Vec<Option<f64>> = table
                .rows
                .iter()
                .map(|r| r.by_language.get(lang).copied())
                .collect();
            highlight(&values, cfg.highlight_count, Polarity::Default)
        })
        .collect()
}

struct Formats {
    header: Format,
    best: Format,
    worst: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold(),
            best: Format::new().set_background_color(Color::RGB(BEST_FILL)),
            worst: Format::new().set_background_color(Color::RGB(WORST_FILL)),
        }
    }

    fn for_tag(&self, tag: Option<Highlight>) -> Option<&Format> {
        match tag {
            Some(Highlight::Best) => Some(&self.best),
            Some(Highlight::Worst) => Some(&self.worst),
            None => None,
        }
    }
}

fn col(i: usize) -> Result<u16> {
    u16::try_from(i).context("too many columns for a worksheet")
}

fn row(i: usize) -> Result<u32> {
    u32::try_from(i).context("too many rows for a worksheet")
}

fn write_cell(
    sheet: &mut Worksheet,
    r: u32,
    c: u16,
    value: Option<f64>,
    format: Option<&Format>,
) -> Result<()> {
    match (value, format) {
        (Some(v), Some(f)) => {
            sheet.write_number_with_format(r, c, v, f)?;
        }
        (Some(v), None) => {
            sheet.write_number(r, c, v)?;
        }
        (None, _) => {}
    }
    Ok(())
}

fn write_results_sheet(
    sheet: &mut Worksheet,
    report: &MergedReport,
    cfg: &ReportConfig,
    formats: &Formats,
) -> Result<()> {
    sheet.set_name(&cfg.results_sheet)?;
    sheet.write_string_with_format(0, 0, "task", &formats.header)?;
    sheet.write_string_with_format(0, 1, "metric", &formats.header)?;
    for (i, model) in report.models.iter().enumerate() {
        sheet.write_string_with_format(0, col(i + 2)?, model, &formats.header)?;
    }

    let tags = results_highlights(report, cfg);
    for (ri, (data, row_tags)) in report.rows.iter().zip(&tags).enumerate() {
        let r = row(ri + 1)?;
        sheet.write_string(r, 0, &data.task)?;
        sheet.write_string(r, 1, &data.metric)?;
        for (mi, model) in report.models.iter().enumerate() {
            let value = data.scores.get(model).copied();
            write_cell(sheet, r, col(mi + 2)?, value, formats.for_tag(row_tags[mi]))?;
        }
    }

    sheet.set_column_width(0, 32.0)?;
    sheet.set_column_width(1, 16.0)?;
    sheet.set_freeze_panes(1, 2)?;
    Ok(())
}

fn write_normalized_sheet(
    sheet: &mut Worksheet,
    table: &NormalizedScoreTable,
    cfg: &ReportConfig,
    formats: &Formats,
) -> Result<()> {
    sheet.set_name(&cfg.normalized_sheet)?;
    sheet.write_string_with_format(0, 0, "model", &formats.header)?;
    for (i, lang) in table.languages.iter().enumerate() {
        sheet.write_string_with_format(0, col(i + 1)?, lang, &formats.header)?;
    }

    let tags = normalized_highlights(table, cfg);
    for (ri, data) in table.rows.iter().enumerate() {
        let r = row(ri + 1)?;
        sheet.write_string(r, 0, &data.model)?;
        for (li, lang) in table.languages.iter().enumerate() {
            let value = data.by_language.get(lang).copied();
            write_cell(sheet, r, col(li + 1)?, value, formats.for_tag(tags[li][ri]))?;
        }
    }

    sheet.set_column_width(0, 32.0)?;
    sheet.set_freeze_panes(1, 1)?;
    Ok(())
}

/// Writes the results sheet and, when given, the normalized sheet.
pub fn write_report(
    path: &Path,
    report: &MergedReport,
    normalized: Option<&NormalizedScoreTable>,
    cfg: &ReportConfig,
) -> Result<()> {
    let formats = Formats::new();
    let mut workbook = Workbook::new();

    write_results_sheet(workbook.add_worksheet(), report, cfg, &formats)?;
    if let Some(table) = normalized {
        write_normalized_sheet(workbook.add_worksheet(), table, cfg, &formats)?;
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    tracing::info!(
        event = "report_written",
        path = %path.display(),
        rows = report.rows.len(),
        models = report.models.len(),
        normalized = normalized.is_some()
    );
    Ok(())
}
