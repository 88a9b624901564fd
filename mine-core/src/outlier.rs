//! Local Outlier Factor (LOF) over a VP-tree kNN graph.

use crate::distance_space::{DistanceSpace, DistanceSpaceConfig};
use crate::record::MineRecord;
use crate::vptree::VpTree;

/// Configuration for [`compute_outliers`].
#[derive(Clone, Debug)]
pub struct OutlierConfig {
    /// Neighbourhood size before clamping to `[1, n-1]`.
    pub k: usize,
    /// Distance-space configuration shared with clustering/embedding/neighbors.
    pub space: DistanceSpaceConfig,
}

/// Per-entry novelty and LOF scores, parallel to the selection passed to
/// [`compute_outliers`].
#[derive(Clone, Debug, Default)]
pub struct OutlierResult {
    /// Local Outlier Factor per entry; `1.0` for degenerate neighbourhoods.
    pub lof: Vec<f64>,
    /// Mean kNN distance per entry.
    pub novelty: Vec<f64>,
}

/// Computes LOF and novelty for `records[selection[*]]`.
#[must_use]
pub fn compute_outliers(records: &[MineRecord], selection: &[usize], cfg: &OutlierConfig) -> OutlierResult {
    let n = selection.len();
    if n == 0 {
        return OutlierResult::default();
    }
    if n == 1 {
        return OutlierResult {
            lof: vec![1.0],
            novelty: vec![0.0],
        };
    }

    let k = cfg.k.clamp(1, n - 1);
    let space = DistanceSpace::build(records, selection, &cfg.space);
    let dist = space.as_distance_fn();

    let items: Vec<i64> = (0..n as i64).collect();
    let tree = VpTree::build(items, &dist);

    let mut neighbours: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
    let mut kdist = vec![0.0f64; n];
    let mut novelty = vec![0.0f64; n];

    for i in 0..n {
        let hits = tree.k_nearest(i as i64, k);
        let mean = if hits.is_empty() {
            0.0
        } else {
            hits.iter().map(|h| h.distance).sum::<f64>() / hits.len() as f64
        };
        kdist[i] = hits.last().map_or(0.0, |h| h.distance);
        novelty[i] = mean;
        neighbours.push(hits.into_iter().map(|h| (h.id as usize, h.distance)).collect());
    }

    let mut lrd = vec![0.0f64; n];
    for i in 0..n {
        if neighbours[i].is_empty() {
            lrd[i] = 0.0;
            continue;
        }
        let sum: f64 = neighbours[i]
            .iter()
            .map(|&(o, d)| kdist[o].max(d))
            .sum();
        lrd[i] = if sum > 0.0 { k as f64 / sum } else { 0.0 };
    }

    let mut lof = vec![1.0f64; n];
    for i in 0..n {
        if neighbours[i].is_empty() || !lrd[i].is_finite() || lrd[i] <= 0.0 {
            lof[i] = 1.0;
            continue;
        }
        let ratios: Vec<f64> = neighbours[i]
            .iter()
            .map(|&(o, _)| lrd[o] / lrd[i])
            .filter(|r| r.is_finite())
            .collect();
        lof[i] = if ratios.is_empty() {
            1.0
        } else {
            ratios.iter().sum::<f64>() / ratios.len() as f64
        };
    }

    OutlierResult { lof, novelty }
}

/// Returns up to `top_k` selection indices sorted by
/// `(lof descending, seed ascending, index ascending)`.
#[must_use]
pub fn select_top_outlier_indices(
    result: &OutlierResult,
    records: &[MineRecord],
    selection: &[usize],
    top_k: usize,
) -> Vec<usize> {
    let mut order: Vec<usize> = (0..selection.len()).collect();
    order.sort_by(|&a, &b| {
        result.lof[b]
            .partial_cmp(&result.lof[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| records[selection[a]].seed.cmp(&records[selection[b]].seed))
            .then_with(|| selection[a].cmp(&selection[b]))
    });
    order.truncate(top_k);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MineMetric;

    fn record_with(seed: u64, population: i32) -> MineRecord {
        let mut r = MineRecord::default();
        r.seed = seed;
        r.stats.population = population;
        r
    }

    #[test]
    fn single_record_is_degenerate() {
        let records = vec![record_with(1, 100)];
        let cfg = OutlierConfig {
            k: 5,
            space: DistanceSpaceConfig {
                metrics: vec![MineMetric::Population],
                ..DistanceSpaceConfig::default()
            },
        };
        let result = compute_outliers(&records, &[0], &cfg);
        assert_eq!(result.lof, vec![1.0]);
        assert_eq!(result.novelty, vec![0.0]);
    }

    #[test]
    fn outlier_is_far_from_a_tight_cluster() {
        let mut records: Vec<MineRecord> = (0..9).map(|i| record_with(i as u64, 100 + i)).collect();
        records.push(record_with(9, 100_000));
        let selection: Vec<usize> = (0..10).collect();
        let cfg = OutlierConfig {
            k: 3,
            space: DistanceSpaceConfig {
                metrics: vec![MineMetric::Population],
                ..DistanceSpaceConfig::default()
            },
        };
        let result = compute_outliers(&records, &selection, &cfg);
        let outlier_lof = result.lof[9];
        let max_cluster_lof = result.lof[..9].iter().cloned().fold(f64::MIN, f64::max);
        assert!(outlier_lof > max_cluster_lof);
    }
}
