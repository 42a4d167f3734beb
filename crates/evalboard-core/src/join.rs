use crate::model::{MergedReport, MergedReportRow, PivotTable, RandomFlag, TaskConfigRecord};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};

/// A task config with its metric list exploded to one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigMetric {
    pub execution_datetime: Option<NaiveDateTime>,
    pub task: String,
    pub metric: String,
    pub output_type: Option<String>,
    pub random_flag: RandomFlag,
}

pub fn explode(configs: &[TaskConfigRecord]) -> Vec<ConfigMetric> {
    configs
        .iter()
        .flat_map(|c| {
            c.metric_list.iter().map(move |m| ConfigMetric {
                execution_datetime: c.execution_datetime,
                task: c.task.clone(),
                metric: m.clone(),
                output_type: c.output_type.clone(),
                random_flag: c.random_flag,
            })
        })
        .collect()
}

/// Pivot row after the config join, before grouping.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub task: String,
    pub metric: String,
    pub random_flag: String,
    pub language: Option<String>,
    pub output_type: Option<String>,
    pub scores: BTreeMap<String, f64>,
}

type JoinKey = (Option<NaiveDateTime>, String, String);

/// Right join of the exploded configs onto the pivot on
/// (execution_datetime, task, metric). Every pivot row survives; a row that
/// matches several configs is repeated once per match.
pub fn join_configs(pivot: &PivotTable, configs: &[TaskConfigRecord]) -> Vec<JoinedRow> {
    let exploded = explode(configs);
    let mut index: HashMap<JoinKey, Vec<&ConfigMetric>> = HashMap::new();
    for c in &exploded {
        index
            .entry((c.execution_datetime, c.task.clone(), c.metric.clone()))
            .or_default()
            .push(c);
    }

    let mut out = Vec::with_capacity(pivot.rows.len());
    let mut unmatched = 0usize;
    for row in &pivot.rows {
        let key = (
            row.key.execution_datetime,
            row.key.task.clone(),
            row.key.metric.clone(),
        );
        match index.get(&key) {
            Some(matches) => {
                for c in matches {
                    out.push(JoinedRow {
                        task: row.key.task.clone(),
                        metric: row.key.metric.clone(),
                        random_flag: c.random_flag.to_string(),
                        language: row.key.language.clone(),
                        output_type: c.output_type.clone(),
                        scores: row.scores.clone(),
                    });
                }
            }
            None => {
                unmatched += 1;
                out.push(JoinedRow {
                    task: row.key.task.clone(),
                    metric: row.key.metric.clone(),
                    random_flag: row.key.random.clone(),
                    language: row.key.language.clone(),
                    output_type: None,
                    scores: row.scores.clone(),
                });
            }
        }
    }

    tracing::debug!(
        event = "config_join",
        rows = out.len(),
        unmatched = unmatched
    );
    out
}

/// Collapses joined rows to one per (task, metric), keeping the maximum of
/// every column. This is where gold and current executions meet.
pub fn group_max(rows: Vec<JoinedRow>) -> MergedReport {
    let mut groups: BTreeMap<(String, String), MergedReportRow> = BTreeMap::new();
    let mut reduced_cells = 0usize;

    for row in rows {
        let key = (row.task.clone(), row.metric.clone());
        let Some(acc) = groups.get_mut(&key) else {
            groups.insert(
                key,
                MergedReportRow {
                    task: row.task,
                    metric: row.metric,
                    random_flag: Some(row.random_flag),
                    language: row.language,
                    output_type: row.output_type,
                    scores: row.scores,
                },
            );
            continue;
        };

        acc.random_flag = acc.random_flag.take().max(Some(row.random_flag));
        acc.language = acc.language.take().max(row.language);
        acc.output_type = acc.output_type.take().max(row.output_type);
        for (model, score) in row.scores {
            match acc.scores.get_mut(&model) {
                Some(kept) => {
                    if *kept != score {
                        reduced_cells += 1;
                    }
                    if score > *kept {
                        *kept = score;
                    }
                }
                None => {
                    acc.scores.insert(model, score);
                }
            }
        }
    }

    if reduced_cells > 0 {
        tracing::info!(
            event = "join_ambiguity",
            stage = "merge",
            cells = reduced_cells,
            "duplicate (task, metric) scores reduced to maximum"
        );
    }

    let rows: Vec<MergedReportRow> = groups.into_values().collect();
    let mut models: Vec<String> = rows
        .iter()
        .flat_map(|r| r.scores.keys().cloned())
        .collect();
    models.sort();
    models.dedup();

    MergedReport { models, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PivotKey, WideResultRow};

    fn pivot_row(ts: Option<&str>, task: &str, metric: &str, scores: &[(&str, f64)]) -> WideResultRow {
        WideResultRow {
            key: PivotKey {
                execution_datetime: ts.map(|t| {
                    NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S").unwrap()
                }),
                task: task.into(),
                language: Some("Catalan".into()),
                shots: Some("5_shot".into()),
                metric: metric.into(),
                random: "none".into(),
            },
            scores: scores.iter().map(|(m, s)| (m.to_string(), *s)).collect(),
        }
    }

    fn config(ts: Option<&str>, task: &str, metrics: &[&str], flag: RandomFlag) -> TaskConfigRecord {
        TaskConfigRecord {
            file_id: "f".into(),
            task: task.into(),
            metric_list: metrics.iter().map(|m| m.to_string()).collect(),
            output_type: Some("multiple_choice".into()),
            model: None,
            random_flag: flag,
            model_name_sanitized: None,
            execution_datetime: ts.map(|t| {
                NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S").unwrap()
            }),
            root_folder: "r".into(),
            model_folder: "m".into(),
        }
    }

    #[test]
    fn test_explode_one_row_per_metric() {
        let rows = explode(&[config(None, "t", &["acc", "acc_norm"], RandomFlag::Random)]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].metric, "acc_norm");
    }

    #[test]
    fn test_right_join_keeps_unmatched_pivot_rows() {
        let pivot = PivotTable {
            models: vec!["a".into()],
            rows: vec![
                pivot_row(Some("2024-01-01 00:00:00"), "arc", "acc", &[("a", 0.5)]),
                pivot_row(Some("2024-01-01 00:00:00"), "arc", "brier", &[("a", 0.2)]),
            ],
        };
        let configs = [config(
            Some("2024-01-01 00:00:00"),
            "arc",
            &["acc"],
            RandomFlag::NoRandom,
        )];

        let joined = join_configs(&pivot, &configs);
        assert_eq!(joined.len(), 2);
        let acc = joined.iter().find(|r| r.metric == "acc").unwrap();
        assert_eq!(acc.random_flag, "No-Random");
        assert_eq!(acc.output_type.as_deref(), Some("multiple_choice"));
        let brier = joined.iter().find(|r| r.metric == "brier").unwrap();
        assert_eq!(brier.random_flag, "none");
        assert_eq!(brier.output_type, None);
    }

    #[test]
    fn test_join_requires_same_execution() {
        let pivot = PivotTable {
            models: vec!["a".into()],
            rows: vec![pivot_row(Some("2024-01-01 00:00:00"), "arc", "acc", &[("a", 0.5)])],
        };
        let configs = [config(
            Some("2024-02-02 00:00:00"),
            "arc",
            &["acc"],
            RandomFlag::NoRandom,
        )];
        let joined = join_configs(&pivot, &configs);
        assert_eq!(joined[0].output_type, None);
    }

    #[test]
    fn test_group_keeps_maximum_per_model() {
        let pivot = PivotTable {
            models: vec!["a".into(), "b".into()],
            rows: vec![
                pivot_row(Some("2024-01-01 00:00:00"), "arc", "acc", &[("a", 0.7)]),
                pivot_row(Some("2024-01-02 00:00:00"), "arc", "acc", &[("a", 0.9), ("b", 0.1)]),
                pivot_row(Some("2024-01-03 00:00:00"), "arc", "acc", &[("a", 0.5)]),
                pivot_row(None, "hella", "acc", &[("b", 0.4)]),
            ],
        };
        let report = group_max(join_configs(&pivot, &[]));

        assert_eq!(report.models, vec!["a", "b"]);
        assert_eq!(report.rows.len(), 2);
        let arc = report.get("arc", "acc").unwrap();
        assert_eq!(arc.scores["a"], 0.9);
        assert_eq!(arc.scores["b"], 0.1);
        assert_eq!(report.get("hella", "acc").unwrap().scores["b"], 0.4);
    }

    #[test]
    fn test_rows_sorted_by_task_then_metric() {
        let pivot = PivotTable {
            models: vec!["a".into()],
            rows: vec![
                pivot_row(None, "b_task", "acc", &[("a", 0.1)]),
                pivot_row(None, "a_task", "f1", &[("a", 0.1)]),
                pivot_row(None, "a_task", "acc", &[("a", 0.1)]),
            ],
        };
        let report = group_max(join_configs(&pivot, &[]));
        let keys: Vec<_> = report
            .rows
            .iter()
            .map(|r| (r.task.as_str(), r.metric.as_str()))
            .collect();
        assert_eq!(keys, vec![("a_task", "acc"), ("a_task", "f1"), ("b_task", "acc")]);
    }
}
