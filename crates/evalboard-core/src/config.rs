use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;

/// Knobs for the report pipeline. Every field has a default, so an absent
/// config file behaves like an empty one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Bulk per-sample columns written by the harness, never scores.
    pub artifact_metrics: Vec<String>,
    pub skip_metric_substrings: Vec<String>,
    /// Metrics hidden from the final results sheet.
    pub report_exclude_substrings: Vec<String>,
    /// Metrics already stored on the 0-100 scale of the reference table.
    pub raw_scale_metrics: Vec<String>,
    /// Lower-is-better metrics; highlight polarity flips for them.
    pub inverted_metrics: Vec<String>,
    pub locale_priority: Vec<String>,
    pub highlight_count: usize,
    pub report_prefix: String,
    pub results_sheet: String,
    pub normalized_sheet: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            artifact_metrics: [
                "sources,none",
                "targets,none",
                "bleu_segments,none",
                "ter_segments,none",
                "chrf_segments,none",
                "comet_segments,none",
                "translations,none",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            skip_metric_substrings: vec!["_stderr".to_string()],
            report_exclude_substrings: vec!["_norm".to_string()],
            raw_scale_metrics: ["bleu", "chrf", "mcc", "exact_match"]
                .into_iter()
                .map(String::from)
                .collect(),
            inverted_metrics: vec!["ter".to_string()],
            locale_priority: ["Valencian", "Catalan", "Spanish", "English"]
                .into_iter()
                .map(String::from)
                .collect(),
            highlight_count: 1,
            report_prefix: "merged_results_".to_string(),
            results_sheet: "results".to_string(),
            normalized_sheet: "normalized".to_string(),
        }
    }
}

impl ReportConfig {
    pub fn is_artifact(&self, metric_key: &str) -> bool {
        self.artifact_metrics.iter().any(|a| a == metric_key)
            || self
                .skip_metric_substrings
                .iter()
                .any(|s| metric_key.contains(s.as_str()))
    }

    pub fn is_excluded_from_report(&self, metric: &str) -> bool {
        self.report_exclude_substrings
            .iter()
            .any(|s| metric.contains(s.as_str()))
    }

    pub fn is_raw_scale(&self, metric: &str) -> bool {
        self.raw_scale_metrics.iter().any(|m| m == metric)
    }

    pub fn is_inverted(&self, metric: &str) -> bool {
        self.inverted_metrics.iter().any(|m| m == metric)
    }

    /// Applies `EVALBOARD_*` environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        if let Ok(v) = env::var("EVALBOARD_HIGHLIGHT_COUNT") {
            if let Ok(n) = v.parse() {
                self.highlight_count = n;
            }
        }
        if let Ok(v) = env::var("EVALBOARD_REPORT_PREFIX") {
            self.report_prefix = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.highlight_count == 0 {
            return Err(ConfigError("highlight_count must be at least 1".into()));
        }
        if self.results_sheet.trim().is_empty() || self.normalized_sheet.trim().is_empty() {
            return Err(ConfigError("sheet names must not be empty".into()));
        }
        if self.results_sheet == self.normalized_sheet {
            return Err(ConfigError(format!(
                "results_sheet and normalized_sheet are both '{}'",
                self.results_sheet
            )));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path, strict: bool) -> Result<ReportConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;

    let mut ignored_keys = HashSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);

    let cfg: ReportConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    // Anchor blocks and x- extensions are allowed in any mode.
    let meaningful_unknowns: Vec<_> = ignored_keys
        .iter()
        .filter(|k| !k.starts_with('_') && !k.starts_with("x-"))
        .collect();

    if !meaningful_unknowns.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "Unknown fields detected in strict mode: {:?} (file: {})",
                meaningful_unknowns,
                path.display()
            )));
        }
        tracing::warn!(
            event = "config_unknown_fields",
            fields = ?meaningful_unknowns,
            file = %path.display(),
            "ignored unknown config fields"
        );
    }

    cfg.validate()?;
    Ok(cfg)
}

/// Loads `path` when given, otherwise the defaults; env overrides apply to both.
pub fn resolve_config(path: Option<&Path>, strict: bool) -> Result<ReportConfig, ConfigError> {
    let mut cfg = match path {
        Some(p) => load_config(p, strict)?,
        None => ReportConfig::default(),
    };
    cfg.apply_env();
    cfg.validate()?;
    Ok(cfg)
}
