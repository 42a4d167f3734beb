//! Score records to the pre-join wide table: clean, attach identity and
//! column name, melt into long rows, then pivot with first-seen cells.

use crate::config::ReportConfig;
use crate::identity;
use crate::model::{
    Extraction, PivotKey, PivotTable, RunIdentity, ScoreRecord, TaskConfigRecord, WideResultRow,
};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// One score in long form, before pivoting.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub key: PivotKey,
    pub model: String,
    pub score: f64,
}

pub fn drop_artifacts(scores: Vec<ScoreRecord>, cfg: &ReportConfig) -> Vec<ScoreRecord> {
    scores
        .into_iter()
        .filter(|s| !cfg.is_artifact(&s.metric_name))
        .collect()
}

/// Keeps the first occurrence of every fully identical record.
pub fn dedup_records(scores: Vec<ScoreRecord>) -> Vec<ScoreRecord> {
    let mut seen = HashSet::new();
    scores
        .into_iter()
        .filter(|s| {
            seen.insert((
                s.file_id.clone(),
                s.task.clone(),
                s.metric_name.clone(),
                s.value.to_string(),
                s.execution_datetime,
                s.root_folder.clone(),
                s.model_folder.clone(),
            ))
        })
        .collect()
}

/// `acc,none` -> (`acc`, `none`); a key without a comma has an empty suffix.
pub fn split_metric_key(key: &str) -> (String, String) {
    match key.split_once(',') {
        Some((metric, random)) => (metric.to_string(), random.to_string()),
        None => (key.to_string(), String::new()),
    }
}

type RunKey = (Option<NaiveDateTime>, String);

/// `model_name_sanitized` per (execution_datetime, model_folder), first seen.
pub fn sanitized_names(configs: &[TaskConfigRecord]) -> HashMap<RunKey, Option<String>> {
    let mut out: HashMap<RunKey, Option<String>> = HashMap::new();
    for c in configs {
        let key = (c.execution_datetime, c.model_folder.clone());
        match out.get(&key) {
            None => {
                out.insert(key, c.model_name_sanitized.clone());
            }
            Some(existing) if *existing != c.model_name_sanitized => {
                tracing::warn!(
                    event = "join_ambiguity",
                    stage = "sanitized_name",
                    model_folder = %c.model_folder,
                    kept = ?existing,
                    dropped = ?c.model_name_sanitized,
                    "conflicting sanitized model names for one run"
                );
            }
            Some(_) => {}
        }
    }
    out
}

struct IdentityCache {
    known: HashMap<String, Option<RunIdentity>>,
}

impl IdentityCache {
    fn new() -> Self {
        Self {
            known: HashMap::new(),
        }
    }

    fn get(&mut self, model_folder: &str) -> Option<RunIdentity> {
        if let Some(hit) = self.known.get(model_folder) {
            return hit.clone();
        }
        let parsed = identity::parse(model_folder);
        if parsed.is_none() {
            tracing::warn!(
                event = "identifier_format",
                model_folder = %model_folder,
                "cannot decode model/language/shots from folder name"
            );
        }
        self.known.insert(model_folder.to_string(), parsed.clone());
        parsed
    }
}

/// Joins identity and column name onto each record and melts it into a
/// long row. Records that cannot be given a column, or whose value is not
/// numeric, are dropped.
pub fn to_long_form(scores: &[ScoreRecord], configs: &[TaskConfigRecord]) -> Vec<LongRow> {
    let names = sanitized_names(configs);
    let mut identities = IdentityCache::new();
    let mut out = Vec::with_capacity(scores.len());
    let mut unnamed = 0usize;
    let mut non_numeric = 0usize;

    for s in scores {
        let identity = identities.get(&s.model_folder);
        let sanitized = names
            .get(&(s.execution_datetime, s.model_folder.clone()))
            .cloned()
            .flatten();
        let Some(model) = sanitized.or_else(|| identity.as_ref().map(|i| i.model_name.clone()))
        else {
            unnamed += 1;
            continue;
        };
        let Some(score) = s.value.as_f64() else {
            non_numeric += 1;
            continue;
        };

        let (metric, random) = split_metric_key(&s.metric_name);
        out.push(LongRow {
            key: PivotKey {
                execution_datetime: s.execution_datetime,
                task: s.task.clone(),
                language: identity.as_ref().map(|i| i.language.clone()),
                shots: identity.as_ref().map(|i| i.shots.clone()),
                metric,
                random,
            },
            model,
            score,
        });
    }

    if unnamed > 0 {
        tracing::warn!(
            event = "records_dropped",
            reason = "no_model_name",
            count = unnamed
        );
    }
    if non_numeric > 0 {
        tracing::debug!(
            event = "records_dropped",
            reason = "non_numeric",
            count = non_numeric
        );
    }
    out
}

/// Long rows to one row per key with a column per model. When two rows land
/// in the same cell the first one wins.
pub fn pivot(rows: Vec<LongRow>) -> PivotTable {
    let mut table: BTreeMap<PivotKey, BTreeMap<String, f64>> = BTreeMap::new();
    let mut models = BTreeSet::new();
    let mut collisions = 0usize;

    for row in rows {
        models.insert(row.model.clone());
        let cells = table.entry(row.key).or_default();
        match cells.get(&row.model) {
            None => {
                cells.insert(row.model, row.score);
            }
            Some(kept) => {
                if *kept != row.score {
                    collisions += 1;
                }
            }
        }
    }

    if collisions > 0 {
        tracing::warn!(
            event = "join_ambiguity",
            stage = "pivot",
            cells = collisions,
            "differing scores for one pivot cell, kept first seen"
        );
    }

    PivotTable {
        models: models.into_iter().collect(),
        rows: table
            .into_iter()
            .map(|(key, scores)| WideResultRow { key, scores })
            .collect(),
    }
}

/// Runs the whole reshaping pass over an extraction.
pub fn reshape(extraction: &Extraction, cfg: &ReportConfig) -> PivotTable {
    let before = extraction.scores.len();
    let cleaned = dedup_records(drop_artifacts(extraction.scores.clone(), cfg));
    let long = to_long_form(&cleaned, &extraction.configs);
    let table = pivot(long);
    tracing::info!(
        event = "pivot_done",
        records = before,
        kept = cleaned.len(),
        rows = table.rows.len(),
        models = table.models.len()
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RandomFlag;
    use serde_json::json;

    const FOLDER: &str = "results_Aitana-6.3B_5_Catalan_5-shot_3064";

    fn score(task: &str, metric: &str, value: serde_json::Value) -> ScoreRecord {
        ScoreRecord {
            file_id: "results_a.json".into(),
            task: task.into(),
            metric_name: metric.into(),
            value,
            execution_datetime: None,
            root_folder: "root".into(),
            model_folder: FOLDER.into(),
        }
    }

    fn config(task: &str, sanitized: Option<&str>) -> TaskConfigRecord {
        TaskConfigRecord {
            file_id: "results_a.json".into(),
            task: task.into(),
            metric_list: vec!["acc".into()],
            output_type: None,
            model: None,
            random_flag: RandomFlag::Random,
            model_name_sanitized: sanitized.map(String::from),
            execution_datetime: None,
            root_folder: "root".into(),
            model_folder: FOLDER.into(),
        }
    }

    #[test]
    fn test_artifacts_and_stderr_are_dropped() {
        let cfg = ReportConfig::default();
        let kept = drop_artifacts(
            vec![
                score("t", "acc,none", json!(0.5)),
                score("t", "acc_stderr,none", json!(0.1)),
                score("t", "translations,none", json!(["a"])),
            ],
            &cfg,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].metric_name, "acc,none");
    }

    #[test]
    fn test_exact_duplicates_collapse() {
        let rows = dedup_records(vec![
            score("t", "acc,none", json!(0.5)),
            score("t", "acc,none", json!(0.5)),
            score("t", "acc,none", json!(0.6)),
        ]);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_split_metric_key() {
        assert_eq!(
            split_metric_key("acc,none"),
            ("acc".to_string(), "none".to_string())
        );
        assert_eq!(
            split_metric_key("exact_match,strict-match"),
            ("exact_match".to_string(), "strict-match".to_string())
        );
        assert_eq!(split_metric_key("bleu"), ("bleu".to_string(), String::new()));
    }

    #[test]
    fn test_long_form_joins_identity_and_name() {
        let rows = to_long_form(
            &[score("arc", "acc,none", json!(0.5))],
            &[config("arc", Some("org__aitana"))],
        );
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.model, "org__aitana");
        assert_eq!(r.key.language.as_deref(), Some("Catalan"));
        assert_eq!(r.key.shots.as_deref(), Some("5_shot"));
        assert_eq!(r.key.metric, "acc");
        assert_eq!(r.key.random, "none");
    }

    #[test]
    fn test_long_form_falls_back_to_decoded_model() {
        let rows = to_long_form(&[score("arc", "acc,none", json!(0.5))], &[]);
        assert_eq!(rows[0].model, "Aitana-6.3B");
    }

    #[test]
    fn test_undecodable_folder_without_name_is_dropped() {
        let mut s = score("arc", "acc,none", json!(0.5));
        s.model_folder = "odd".into();
        assert!(to_long_form(&[s], &[]).is_empty());
    }

    #[test]
    fn test_undecodable_folder_with_name_is_kept() {
        let mut s = score("arc", "acc,none", json!(0.5));
        s.model_folder = "odd".into();
        let mut c = config("arc", Some("m"));
        c.model_folder = "odd".into();
        let rows = to_long_form(&[s], &[c]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key.language, None);
        assert_eq!(rows[0].key.shots, None);
    }

    #[test]
    fn test_pivot_keeps_first_seen() {
        let key = PivotKey {
            execution_datetime: None,
            task: "arc".into(),
            language: Some("English".into()),
            shots: Some("5_shot".into()),
            metric: "acc".into(),
            random: "none".into(),
        };
        let table = pivot(vec![
            LongRow {
                key: key.clone(),
                model: "b".into(),
                score: 0.3,
            },
            LongRow {
                key: key.clone(),
                model: "a".into(),
                score: 0.7,
            },
            LongRow {
                key: key.clone(),
                model: "a".into(),
                score: 0.9,
            },
        ]);
        assert_eq!(table.models, vec!["a", "b"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].scores["a"], 0.7);
        assert_eq!(table.rows[0].scores["b"], 0.3);
    }
}
