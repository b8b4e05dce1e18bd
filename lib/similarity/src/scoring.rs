//! Score normalization and combination
//!
//! Strategies produce one score per candidate. Before combining, each
//! strategy's distribution can be normalized so that scales (BM25 is
//! unbounded, cosine is [-1, 1]) become comparable.

use serde::{Deserialize, Serialize};

pub const DEFAULT_RRF_K: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    None,
    #[default]
    MinMax,
    ZScore,
    Softmax,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CombinationMethod {
    #[default]
    WeightedAverage,
    ReciprocalRank,
    Max,
    Min,
}

pub fn normalize(scores: &[f32], method: NormalizationMethod) -> Vec<f32> {
    match method {
        NormalizationMethod::None => scores.to_vec(),
        NormalizationMethod::MinMax => min_max_normalize(scores),
        NormalizationMethod::ZScore => z_score_normalize(scores),
        NormalizationMethod::Softmax => softmax(scores),
    }
}

/// Map to [0, 1]; minimum -> 0, maximum -> 1, all-equal -> 1.0
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let Some((min, max)) = min_max(scores) else {
        return Vec::new();
    };
    let range = max - min;
    if range <= f32::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / range).collect()
}

/// Standard score clipped to [0, 1]; all-equal -> 1.0
pub fn z_score_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let n = scores.len() as f32;
    let mean = scores.iter().sum::<f32>() / n;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n;
    let std_dev = variance.sqrt();
    if std_dev <= f32::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores
        .iter()
        .map(|s| ((s - mean) / std_dev).clamp(0.0, 1.0))
        .collect()
}

/// Numerically stable softmax; output sums to 1.0
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let Some((_, max)) = min_max(scores) else {
        return Vec::new();
    };
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn min_max(scores: &[f32]) -> Option<(f32, f32)> {
    let mut iter = scores.iter().copied().filter(|s| s.is_finite());
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), s| (lo.min(s), hi.max(s))))
}

/// Weights re-normalized to sum to 1; uniform when absent or degenerate
pub fn normalize_weights(weights: Option<&[f32]>, count: usize) -> Vec<f32> {
    if count == 0 {
        return Vec::new();
    }
    let uniform = vec![1.0 / count as f32; count];
    let Some(weights) = weights else {
        return uniform;
    };
    let padded: Vec<f32> = (0..count)
        .map(|i| weights.get(i).copied().unwrap_or(0.0).max(0.0))
        .collect();
    let sum: f32 = padded.iter().sum();
    if sum <= 0.0 {
        return uniform;
    }
    padded.into_iter().map(|w| w / sum).collect()
}

/// Combine per-strategy score lists (`per_strategy[s][i]` is strategy `s`'s
/// score for item `i`) into one score per item.
///
/// Lists shorter than `item_count` contribute 0 for the missing items.
pub fn combine(
    per_strategy: &[Vec<f32>],
    item_count: usize,
    weights: Option<&[f32]>,
    method: CombinationMethod,
    rrf_k: f32,
) -> Vec<f32> {
    if item_count == 0 {
        return Vec::new();
    }
    if per_strategy.is_empty() {
        return vec![0.0; item_count];
    }
    let score = |s: usize, i: usize| per_strategy[s].get(i).copied().unwrap_or(0.0);

    match method {
        CombinationMethod::WeightedAverage => {
            let weights = normalize_weights(weights, per_strategy.len());
            (0..item_count)
                .map(|i| {
                    weights
                        .iter()
                        .enumerate()
                        .map(|(s, w)| w * score(s, i))
                        .sum()
                })
                .collect()
        }
        CombinationMethod::ReciprocalRank => {
            reciprocal_rank_fusion(per_strategy, item_count, rrf_k)
        }
        CombinationMethod::Max => (0..item_count)
            .map(|i| {
                (0..per_strategy.len())
                    .map(|s| score(s, i))
                    .fold(f32::NEG_INFINITY, f32::max)
            })
            .collect(),
        CombinationMethod::Min => (0..item_count)
            .map(|i| {
                (0..per_strategy.len())
                    .map(|s| score(s, i))
                    .fold(f32::INFINITY, f32::min)
            })
            .collect(),
    }
}

/// Sum of 1 / (rank + k) across strategies, ranks 1-based by descending score
pub fn reciprocal_rank_fusion(per_strategy: &[Vec<f32>], item_count: usize, k: f32) -> Vec<f32> {
    let mut fused = vec![0.0f32; item_count];
    for scores in per_strategy {
        for (rank, item) in ranks(scores, item_count).into_iter().enumerate() {
            fused[item] += 1.0 / (rank as f32 + 1.0 + k);
        }
    }
    fused
}

/// Item indices ordered best-first; ties keep input order
fn ranks(scores: &[f32], item_count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..item_count).collect();
    let score = |i: usize| scores.get(i).copied().unwrap_or(0.0);
    order.sort_by(|&a, &b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_bounds() {
        let normalized = min_max_normalize(&[2.0, 5.0, 3.5, 8.0]);
        assert_eq!(normalized[0], 0.0);
        assert_eq!(normalized[3], 1.0);
        assert!(normalized.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_min_max_all_equal_is_one() {
        let normalized = min_max_normalize(&[0.4, 0.4, 0.4]);
        assert_eq!(normalized, vec![1.0, 1.0, 1.0]);
        assert!(min_max_normalize(&[]).is_empty());
    }

    #[test]
    fn test_z_score_clipped() {
        let normalized = z_score_normalize(&[1.0, 2.0, 3.0, 10.0]);
        assert!(normalized.iter().all(|s| (0.0..=1.0).contains(s)));
        assert_eq!(z_score_normalize(&[3.0, 3.0]), vec![1.0, 1.0]);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        for scores in [vec![1.0, 2.0, 3.0], vec![100.0, 100.0], vec![-5.0, 0.0, 1000.0]] {
            let sum: f32 = softmax(&scores).iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "sum was {sum}");
        }
    }

    #[test]
    fn test_weights_default_uniform_and_renormalize() {
        assert_eq!(normalize_weights(None, 4), vec![0.25; 4]);
        let w = normalize_weights(Some(&[2.0, 6.0]), 2);
        assert!((w[0] - 0.25).abs() < 1e-6 && (w[1] - 0.75).abs() < 1e-6);
        assert_eq!(normalize_weights(Some(&[0.0, 0.0]), 2), vec![0.5, 0.5]);
    }

    #[test]
    fn test_weighted_average_missing_contribution_is_zero() {
        let per_strategy = vec![vec![1.0, 1.0], vec![1.0]];
        let combined = combine(&per_strategy, 2, None, CombinationMethod::WeightedAverage, DEFAULT_RRF_K);
        assert!((combined[0] - 1.0).abs() < 1e-6);
        assert!((combined[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_max_min() {
        let per_strategy = vec![vec![0.2, 0.9], vec![0.7, 0.1]];
        assert_eq!(combine(&per_strategy, 2, None, CombinationMethod::Max, DEFAULT_RRF_K), vec![0.7, 0.9]);
        assert_eq!(combine(&per_strategy, 2, None, CombinationMethod::Min, DEFAULT_RRF_K), vec![0.2, 0.1]);
    }

    #[test]
    fn test_rrf_prefers_consistent_rank() {
        // items: 0 = X, 1 = Y, 2 = Z
        // strategy A ranks X=1, Y=2, Z=3; strategy B ranks Y=1, Z=2, X=3
        let a = vec![0.9, 0.8, 0.1];
        let b = vec![0.1, 0.9, 0.5];
        let fused = reciprocal_rank_fusion(&[a, b], 3, DEFAULT_RRF_K);
        assert!(fused[1] >= fused[0], "Y {} should rank at or above X {}", fused[1], fused[0]);
    }
}
