use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    Best,
    Worst,
}

/// Which end of a series is favorable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// The `n` smallest values are tagged best, the `n` largest worst.
    Default,
    /// Edit-rate style metrics: the `n` largest are best, the `n` smallest worst.
    Inverted,
}

/// Tags the `n` smallest and `n` largest present values of a series.
///
/// Every value equal to a selected extreme is tagged, so ties share a tag.
/// A value that falls in both sets is tagged best. Missing values are never
/// tagged.
pub fn highlight(values: &[Option<f64>], n: usize, polarity: Polarity) -> Vec<Option<Highlight>> {
    let mut present: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() || n == 0 {
        return vec![None; values.len()];
    }
    present.sort_by(|a, b| a.total_cmp(b));

    let k = n.min(present.len());
    let smallest = &present[..k];
    let largest = &present[present.len() - k..];

    let (best, worst) = match polarity {
        Polarity::Default => (smallest, largest),
        Polarity::Inverted => (largest, smallest),
    };

    values
        .iter()
        .map(|v| {
            let v = (*v)?;
            if best.contains(&v) {
                Some(Highlight::Best)
            } else if worst.contains(&v) {
                Some(Highlight::Worst)
            } else {
                None
            }
        })
        .collect()
}
