use crate::config::ReportConfig;
use crate::errors::{DegenerateReferenceError, ReferenceMissingError};
use crate::model::{MergedReport, NormalizedScoreRow, NormalizedScoreTable};
use anyhow::{Context, Result};
use calamine::{open_workbook_auto, RangeDeserializerBuilder, Reader};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Random-baseline and ceiling for one (task, metric), on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NormalizationReference {
    pub task: String,
    pub metric: String,
    #[serde(alias = "Random")]
    pub random: f64,
    #[serde(alias = "Max")]
    pub max: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    entries: HashMap<(String, String), NormalizationReference>,
}

impl ReferenceTable {
    pub fn from_entries(entries: impl IntoIterator<Item = NormalizationReference>) -> Self {
        let mut map = HashMap::new();
        for e in entries {
            let key = (e.task.clone(), e.metric.clone());
            if map.contains_key(&key) {
                tracing::warn!(
                    event = "reference_duplicate",
                    task = %e.task,
                    metric = %e.metric,
                    "duplicate reference row, keeping the first"
                );
                continue;
            }
            map.insert(key, e);
        }
        Self { entries: map }
    }

    /// Reads the reference table. `.xlsx`/`.xls`/`.ods` files are read from
    /// their first sheet, anything else as CSV. Both expect
    /// `task,metric,random,max` headers (`Random`/`Max` also accepted).
    pub fn load(path: &Path) -> Result<Self> {
        let is_spreadsheet = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                matches!(
                    e.to_ascii_lowercase().as_str(),
                    "xlsx" | "xlsm" | "xls" | "ods"
                )
            });
        let entries = if is_spreadsheet {
            read_spreadsheet(path)?
        } else {
            read_csv(path)?
        };
        tracing::info!(
            event = "reference_loaded",
            path = %path.display(),
            format = if is_spreadsheet { "spreadsheet" } else { "csv" },
            entries = entries.len()
        );
        Ok(Self::from_entries(entries))
    }

    pub fn get(&self, task: &str, metric: &str) -> Option<&NormalizationReference> {
        self.entries.get(&(task.to_string(), metric.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn read_csv(path: &Path) -> Result<Vec<NormalizationReference>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open reference table: {}", path.display()))?;

    let mut entries = Vec::new();
    for (i, rec) in rdr.deserialize::<NormalizationReference>().enumerate() {
        let rec = rec.with_context(|| {
            format!("reference table {} row {}: invalid", path.display(), i + 2)
        })?;
        entries.push(rec);
    }
    Ok(entries)
}

fn read_spreadsheet(path: &Path) -> Result<Vec<NormalizationReference>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open reference table: {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .with_context(|| format!("reference table {} has no sheets", path.display()))?
        .with_context(|| format!("failed to read reference table: {}", path.display()))?;

    let rows = RangeDeserializerBuilder::new()
        .from_range::<_, NormalizationReference>(&range)
        .with_context(|| format!("reference table {}: bad header row", path.display()))?;
    let mut entries = Vec::new();
    for (i, rec) in rows.enumerate() {
        let rec = rec.with_context(|| {
            format!("reference table {} row {}: invalid", path.display(), i + 2)
        })?;
        entries.push(rec);
    }
    Ok(entries)
}

/// `(raw - random) / (max - random)`, where fractional metrics are first
/// lifted to the 0-100 scale of the reference.
pub fn normalized_value(
    value: f64,
    reference: &NormalizationReference,
    cfg: &ReportConfig,
) -> Result<f64, DegenerateReferenceError> {
    if reference.max == reference.random {
        return Err(DegenerateReferenceError {
            task: reference.task.clone(),
            metric: reference.metric.clone(),
        });
    }
    let raw = if cfg.is_raw_scale(&reference.metric) {
        value
    } else {
        value * 100.0
    };
    Ok((raw - reference.random) / (reference.max - reference.random))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean normalized score per (language, model).
///
/// Scores are averaged per (task, language) first and then per language, so
/// a task with many metrics weighs as much as a task with one.
pub fn normalize(
    report: &MergedReport,
    references: &ReferenceTable,
    cfg: &ReportConfig,
) -> Result<NormalizedScoreTable> {
    // (task, language) -> model -> normalized values
    let mut per_task: BTreeMap<(String, String), BTreeMap<String, Vec<f64>>> = BTreeMap::new();

    for row in &report.rows {
        if row.task.is_empty() {
            continue;
        }
        let reference = references
            .get(&row.task, &row.metric)
            .ok_or_else(|| ReferenceMissingError {
                task: row.task.clone(),
                metric: row.metric.clone(),
            })?;
        let Some(language) = row.language.clone() else {
            tracing::debug!(
                event = "normalize_skip",
                task = %row.task,
                metric = %row.metric,
                "row has no language"
            );
            continue;
        };

        let cell = per_task.entry((row.task.clone(), language)).or_default();
        for (model, score) in &row.scores {
            let v = normalized_value(*score, reference, cfg)?;
            cell.entry(model.clone()).or_default().push(v);
        }
    }

    // language -> model -> per-task means
    let mut per_language: BTreeMap<String, BTreeMap<String, Vec<f64>>> = BTreeMap::new();
    for ((_, language), models) in per_task {
        let lang = per_language.entry(language).or_default();
        for (model, values) in models {
            lang.entry(model).or_default().push(mean(&values));
        }
    }

    let languages: Vec<String> = per_language.keys().cloned().collect();
    let mut by_model: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for (language, models) in per_language {
        for (model, task_means) in models {
            by_model
                .entry(model)
                .or_default()
                .insert(language.clone(), mean(&task_means));
        }
    }

    let mut rows: Vec<NormalizedScoreRow> = by_model
        .into_iter()
        .map(|(model, by_language)| NormalizedScoreRow { model, by_language })
        .collect();

    let priority: Vec<&String> = cfg
        .locale_priority
        .iter()
        .filter(|l| languages.contains(l))
        .collect();
    rows.sort_by(|a, b| compare_by_priority(a, b, &priority));

    tracing::info!(
        event = "normalize_done",
        languages = languages.len(),
        models = rows.len()
    );
    Ok(NormalizedScoreTable { languages, rows })
}

/// Descending on each priority language in turn; missing scores sort last.
fn compare_by_priority(
    a: &NormalizedScoreRow,
    b: &NormalizedScoreRow,
    priority: &[&String],
) -> Ordering {
    for lang in priority {
        let ord = match (
            a.by_language.get(lang.as_str()),
            b.by_language.get(lang.as_str()),
        ) {
            (Some(x), Some(y)) => y.partial_cmp(x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.model.cmp(&b.model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MergedReportRow;

    fn reference(task: &str, metric: &str, random: f64, max: f64) -> NormalizationReference {
        NormalizationReference {
            task: task.into(),
            metric: metric.into(),
            random,
            max,
        }
    }

    fn row(task: &str, metric: &str, language: &str, scores: &[(&str, f64)]) -> MergedReportRow {
        MergedReportRow {
            task: task.into(),
            metric: metric.into(),
            random_flag: None,
            language: Some(language.into()),
            output_type: None,
            scores: scores.iter().map(|(m, s)| (m.to_string(), *s)).collect(),
        }
    }

    #[test]
    fn test_fractional_metric_is_scaled() {
        let cfg = ReportConfig::default();
        let v = normalized_value(0.5, &reference("t", "acc", 0.0, 100.0), &cfg).unwrap();
        assert!((v - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_raw_scale_metric_is_not_scaled() {
        let cfg = ReportConfig::default();
        let v = normalized_value(30.0, &reference("t", "bleu", 10.0, 50.0), &cfg).unwrap();
        assert!((v - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_endpoints_and_overshoot() {
        let cfg = ReportConfig::default();
        let r = reference("t", "acc", 25.0, 75.0);
        assert_eq!(normalized_value(0.25, &r, &cfg).unwrap(), 0.0);
        assert_eq!(normalized_value(0.75, &r, &cfg).unwrap(), 1.0);
        assert!(normalized_value(0.10, &r, &cfg).unwrap() < 0.0);
    }

    #[test]
    fn test_degenerate_reference_fails() {
        let cfg = ReportConfig::default();
        let err = normalized_value(0.5, &reference("t", "acc", 50.0, 50.0), &cfg).unwrap_err();
        assert_eq!(err.task, "t");
    }

    #[test]
    fn test_missing_reference_is_fatal() {
        let cfg = ReportConfig::default();
        let report = MergedReport {
            models: vec!["a".into()],
            rows: vec![row("arc", "acc", "English", &[("a", 0.5)])],
        };
        let err = normalize(&report, &ReferenceTable::default(), &cfg).unwrap_err();
        let missing = err.downcast_ref::<ReferenceMissingError>().unwrap();
        assert_eq!(missing.metric, "acc");
    }

    #[test]
    fn test_average_by_task_then_language() {
        let cfg = ReportConfig::default();
        let refs = ReferenceTable::from_entries([
            reference("arc", "acc", 0.0, 100.0),
            reference("arc", "acc_norm", 0.0, 100.0),
            reference("belebele", "acc", 0.0, 100.0),
            reference("arc_ca", "acc", 0.0, 100.0),
        ]);
        let report = MergedReport {
            models: vec!["a".into(), "b".into()],
            rows: vec![
                // arc English mean: (0.2 + 0.4) / 2 = 0.3
                row("arc", "acc", "English", &[("a", 0.2), ("b", 0.9)]),
                row("arc", "acc_norm", "English", &[("a", 0.4)]),
                row("belebele", "acc", "English", &[("a", 0.7), ("b", 0.5)]),
                row("arc_ca", "acc", "Catalan", &[("b", 0.6)]),
            ],
        };

        let table = normalize(&report, &refs, &cfg).unwrap();
        assert_eq!(table.languages, vec!["Catalan", "English"]);
        assert!((table.score("a", "English").unwrap() - 0.5).abs() < 1e-9);
        assert!((table.score("b", "English").unwrap() - 0.7).abs() < 1e-9);
        assert!((table.score("b", "Catalan").unwrap() - 0.6).abs() < 1e-9);
        assert_eq!(table.score("a", "Catalan"), None);

        // Catalan has priority over English; "a" has no Catalan score.
        let order: Vec<_> = table.rows.iter().map(|r| r.model.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.csv");
        std::fs::write(
            &path,
            "task,metric,random,Max\narc, acc ,25,100\nflores_ca-en,bleu,0,60\n",
        )
        .unwrap();

        let refs = ReferenceTable::load(&path).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs.get("arc", "acc").unwrap().random, 25.0);
        assert_eq!(refs.get("flores_ca-en", "bleu").unwrap().max, 60.0);
    }

    #[test]
    fn test_load_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task_normalized.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (c, h) in ["task", "metric", "random", "Max"].iter().enumerate() {
            sheet.write_string(0, c as u16, *h).unwrap();
        }
        sheet.write_string(1, 0, "arc").unwrap();
        sheet.write_string(1, 1, "acc").unwrap();
        sheet.write_number(1, 2, 25.0).unwrap();
        sheet.write_number(1, 3, 100.0).unwrap();
        sheet.write_string(2, 0, "flores_ca-en").unwrap();
        sheet.write_string(2, 1, "bleu").unwrap();
        sheet.write_number(2, 2, 0.0).unwrap();
        sheet.write_number(2, 3, 60.0).unwrap();
        workbook.save(&path).unwrap();

        let refs = ReferenceTable::load(&path).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs.get("arc", "acc").unwrap().random, 25.0);
        assert_eq!(refs.get("flores_ca-en", "bleu").unwrap().max, 60.0);
    }
}
