//! Ranking of scored quiz results
//!
//! Scores in `[0, 1]` map onto five ordinal labels by `floor(score * 4)`,
//! clamped to the label range.

use serde::Serialize;

/// Ordinal labels, lowest to highest
pub const SCORE_LABELS: [&str; 5] = [
    "Not recommended",
    "Slightly recommended",
    "Recommended",
    "Highly recommended",
    "Extremely recommended",
];

/// Index into `SCORE_LABELS` for a score
pub fn label_index(score: f64) -> usize {
    if score.is_nan() {
        return 0;
    }
    (score * 4.0).floor().clamp(0.0, 4.0) as usize
}

pub fn label_for(score: f64) -> &'static str {
    SCORE_LABELS[label_index(score)]
}

/// A scored entry with its rank label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry<K> {
    pub key: K,
    pub score: f64,
    pub label: &'static str,
}

/// Sort by descending score; equal scores keep their input order
pub fn rank<K, I>(scores: I) -> Vec<RankedEntry<K>>
where
    I: IntoIterator<Item = (K, f64)>,
{
    let mut ranked: Vec<RankedEntry<K>> = scores
        .into_iter()
        .map(|(key, score)| RankedEntry {
            key,
            score,
            label: label_for(score),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}
