use crate::errors::FileFormatError;
use crate::model::{CandidateFile, Extraction, RandomFlag, ScoreRecord, TaskConfigRecord};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::task::JoinSet;

/// A result file read once from disk.
#[derive(Debug, Clone)]
pub struct RawResultFile {
    pub path: PathBuf,
    pub content: Value,
    pub execution_datetime: Option<NaiveDateTime>,
}

impl RawResultFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read result file: {}", path.display()))?;
        let content: Value = serde_json::from_str(&text).map_err(|e| FileFormatError {
            path: path.to_path_buf(),
            reason: format!("invalid JSON: {}", e),
        })?;

        for key in ["results", "configs"] {
            if !content.get(key).is_some_and(|v| v.is_object()) {
                return Err(FileFormatError {
                    path: path.to_path_buf(),
                    reason: format!("missing top-level object '{}'", key),
                }
                .into());
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            execution_datetime: execution_datetime(path),
            content,
        })
    }

    pub fn file_id(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"results_(\d{4}-\d{2}-\d{2})T(\d{2})-(\d{2})-(\d{2})(\.\d+)\.json")
            .expect("static regex")
    })
}

/// Parses `results_<date>T<HH>-<MM>-<SS>.<fraction>.json`. Anything else
/// yields `None`.
pub fn execution_datetime(path: &Path) -> Option<NaiveDateTime> {
    let name = path.file_name()?.to_string_lossy();
    let caps = timestamp_re().captures(&name)?;
    let iso = format!(
        "{}T{}:{}:{}{}",
        &caps[1], &caps[2], &caps[3], &caps[4], &caps[5]
    );
    NaiveDateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Metric names containing `rouge1` collapse to plain `rouge1`.
pub fn canonical_metric(name: &str) -> String {
    if name.contains("rouge1") {
        "rouge1".to_string()
    } else {
        name.to_string()
    }
}

/// Splits one parsed file into score and task-config records.
pub fn extract_records(raw: &RawResultFile, file: &CandidateFile) -> Result<Extraction> {
    let file_id = raw.file_id();
    let mut out = Extraction::default();

    let results = raw
        .content
        .get("results")
        .and_then(|v| v.as_object())
        .into_iter()
        .flatten();
    for (task, metrics) in results {
        let metrics = metrics.as_object().ok_or_else(|| FileFormatError {
            path: raw.path.clone(),
            reason: format!("results entry '{}' is not an object", task),
        })?;
        for (metric_name, value) in metrics {
            if metric_name == "alias" {
                continue;
            }
            out.scores.push(ScoreRecord {
                file_id: file_id.clone(),
                task: task.clone(),
                metric_name: metric_name.clone(),
                value: value.clone(),
                execution_datetime: raw.execution_datetime,
                root_folder: file.root_folder.clone(),
                model_folder: file.model_folder.clone(),
            });
        }
    }

    let top_config = raw.content.get("config");
    let random_flag = match top_config.and_then(|c| c.get("random_seed")) {
        Some(seed) if !seed.is_null() => RandomFlag::NoRandom,
        _ => RandomFlag::Random,
    };
    let model = raw
        .content
        .get("model_name")
        .and_then(|v| v.as_str())
        .or_else(|| top_config.and_then(|c| c.get("model")).and_then(|v| v.as_str()))
        .map(String::from);
    let model_name_sanitized = raw
        .content
        .get("model_name_sanitized")
        .and_then(|v| v.as_str())
        .map(String::from);

    let configs = raw
        .content
        .get("configs")
        .and_then(|v| v.as_object())
        .into_iter()
        .flatten();
    for (task_key, task_config) in configs {
        let Some(task_config) = task_config.as_object() else {
            tracing::warn!(
                event = "config_entry_skipped",
                file = %raw.path.display(),
                task = %task_key,
                "task config is not an object"
            );
            continue;
        };
        let task = task_config
            .get("task")
            .and_then(|v| v.as_str())
            .unwrap_or(task_key)
            .to_string();
        let metric_list = task_config
            .get("metric_list")
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|m| m.get("metric").and_then(|v| v.as_str()))
                    .filter(|m| !m.is_empty())
                    .map(canonical_metric)
                    .collect()
            })
            .unwrap_or_default();
        let output_type = task_config
            .get("output_type")
            .and_then(|v| v.as_str())
            .map(String::from);

        out.configs.push(TaskConfigRecord {
            file_id: file_id.clone(),
            task,
            metric_list,
            output_type,
            model: model.clone(),
            random_flag,
            model_name_sanitized: model_name_sanitized.clone(),
            execution_datetime: raw.execution_datetime,
            root_folder: file.root_folder.clone(),
            model_folder: file.model_folder.clone(),
        });
    }

    Ok(out)
}

pub fn extract_file(file: &CandidateFile) -> Result<Extraction> {
    let raw = RawResultFile::load(&file.path)?;
    let out = extract_records(&raw, file)?;
    tracing::debug!(
        event = "file_parsed",
        file = %file.path.display(),
        scores = out.scores.len(),
        configs = out.configs.len()
    );
    Ok(out)
}

/// Extracts every file on the blocking pool and reassembles the records in
/// scan order. The first failing file aborts the batch.
pub async fn extract_all(files: Vec<CandidateFile>) -> Result<Extraction> {
    let total = files.len();
    let mut set = JoinSet::new();
    for (idx, file) in files.into_iter().enumerate() {
        set.spawn_blocking(move || (idx, extract_file(&file)));
    }

    let mut parts = Vec::with_capacity(total);
    while let Some(joined) = set.join_next().await {
        let (idx, res) = joined.context("extraction task panicked")?;
        parts.push((idx, res?));
    }
    parts.sort_by_key(|(idx, _)| *idx);

    let mut out = Extraction::default();
    for (_, part) in parts {
        out.extend(part);
    }
    tracing::info!(
        event = "extract_done",
        files = total,
        scores = out.scores.len(),
        configs = out.configs.len()
    );
    Ok(out)
}
