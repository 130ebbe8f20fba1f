//! Small numeric helpers for rankings

use std::cmp::Ordering;

/// Percentage change from `from` to `to`; `None` when `from` is not positive
#[inline]
pub fn pct_change(from: f64, to: f64) -> Option<f64> {
    (from > 0.0).then(|| (to - from) / from * 100.0)
}

/// Population standard deviation; `None` for an empty slice
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt())
}

/// Sort descending by score and keep the top `limit`.
///
/// Stable: entries that arrive ordered by id keep id order on ties.
/// Non-finite scores are dropped.
pub fn rank_desc<T>(mut entries: Vec<T>, limit: usize, score: impl Fn(&T) -> f64) -> Vec<T> {
    entries.retain(|e| score(e).is_finite());
    entries.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal));
    entries.truncate(limit);
    entries
}
