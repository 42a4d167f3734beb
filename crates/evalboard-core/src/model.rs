use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// A `results_*.json` file found by the scanner, with the two folder levels
/// above its run directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub root_folder: String,
    pub model_folder: String,
}

/// One metric value for one task in one result file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRecord {
    pub file_id: String,
    pub task: String,
    /// Raw harness key, e.g. `acc,none`. Never `alias`.
    pub metric_name: String,
    pub value: serde_json::Value,
    pub execution_datetime: Option<NaiveDateTime>,
    pub root_folder: String,
    pub model_folder: String,
}

/// Derived from `config.random_seed`. Variant order matches the textual
/// order of the labels so max-reduction agrees with string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RandomFlag {
    #[serde(rename = "No-Random")]
    NoRandom,
    #[serde(rename = "Random")]
    Random,
}

impl RandomFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RandomFlag::NoRandom => "No-Random",
            RandomFlag::Random => "Random",
        }
    }
}

impl fmt::Display for RandomFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskConfigRecord {
    pub file_id: String,
    pub task: String,
    pub metric_list: Vec<String>,
    pub output_type: Option<String>,
    pub model: Option<String>,
    pub random_flag: RandomFlag,
    pub model_name_sanitized: Option<String>,
    pub execution_datetime: Option<NaiveDateTime>,
    pub root_folder: String,
    pub model_folder: String,
}

/// Everything pulled out of a batch of result files.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub scores: Vec<ScoreRecord>,
    pub configs: Vec<TaskConfigRecord>,
}

impl Extraction {
    pub fn extend(&mut self, other: Extraction) {
        self.scores.extend(other.scores);
        self.configs.extend(other.configs);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RunIdentity {
    pub model_name: String,
    pub language: String,
    pub shots: String,
}

/// Row key of the pre-join pivot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PivotKey {
    pub execution_datetime: Option<NaiveDateTime>,
    pub task: String,
    pub language: Option<String>,
    pub shots: Option<String>,
    pub metric: String,
    /// Suffix after the comma in the harness key (the filter name).
    pub random: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WideResultRow {
    pub key: PivotKey,
    pub scores: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PivotTable {
    pub models: Vec<String>,
    pub rows: Vec<WideResultRow>,
}

/// One (task, metric) line of the final report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedReportRow {
    pub task: String,
    pub metric: String,
    pub random_flag: Option<String>,
    pub language: Option<String>,
    pub output_type: Option<String>,
    pub scores: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedReport {
    pub models: Vec<String>,
    pub rows: Vec<MergedReportRow>,
}

impl MergedReport {
    pub fn get(&self, task: &str, metric: &str) -> Option<&MergedReportRow> {
        self.rows
            .iter()
            .find(|r| r.task == task && r.metric == metric)
    }
}

/// Mean normalized score of one model, per language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedScoreRow {
    pub model: String,
    pub by_language: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedScoreTable {
    pub languages: Vec<String>,
    pub rows: Vec<NormalizedScoreRow>,
}

impl NormalizedScoreTable {
    pub fn score(&self, model: &str, language: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| r.model == model)
            .and_then(|r| r.by_language.get(language).copied())
    }
}
