//! k-medoids clustering with deterministic farthest-first initialization.

use crate::distance_space::{DistanceSpace, DistanceSpaceConfig};
use crate::record::MineRecord;

/// Configuration for [`compute_clustering`].
#[derive(Clone, Debug)]
pub struct ClusteringConfig {
    /// Requested cluster count before clamping to `[1, n]`.
    pub k: usize,
    /// Maximum refinement iterations.
    pub max_iters: usize,
    /// Distance-space configuration shared with outlier/embedding/neighbors.
    pub space: DistanceSpaceConfig,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            k: 4,
            max_iters: 30,
            space: DistanceSpaceConfig::default(),
        }
    }
}

/// Result of a k-medoids run over a selection.
#[derive(Clone, Debug, Default)]
pub struct ClusteringResult {
    /// Resolved cluster count.
    pub k: usize,
    /// `assignment[i]` is the cluster id (`0..k`) of selection-local entry `i`.
    pub assignment: Vec<usize>,
    /// Member count per cluster.
    pub cluster_sizes: Vec<usize>,
    /// Selection-local index of each cluster's medoid.
    pub medoid_entry: Vec<usize>,
    /// Record index (into the original `records` slice) of each cluster's medoid.
    pub medoid_rec_index: Vec<usize>,
    /// Sum of distances from every point to its medoid.
    pub total_cost: f64,
    /// Mean silhouette coefficient across all points.
    pub avg_silhouette: f64,
}

fn tie_break_better(records: &[MineRecord], selection: &[usize], a: usize, b: usize) -> bool {
    let ra = &records[selection[a]];
    let rb = &records[selection[b]];
    if ra.score != rb.score {
        return ra.score > rb.score;
    }
    ra.seed < rb.seed
}

fn farthest_unpicked(
    records: &[MineRecord],
    selection: &[usize],
    dist: &impl Fn(usize, usize) -> f64,
    picked: &[usize],
    n: usize,
) -> Option<usize> {
    let mut best: Option<usize> = None;
    let mut best_dist = f64::NEG_INFINITY;
    for i in 0..n {
        if picked.contains(&i) {
            continue;
        }
        let nearest = picked.iter().map(|&m| dist(i, m)).fold(f64::INFINITY, f64::min);
        let replace = match best {
            None => true,
            Some(b) => nearest > best_dist || (nearest == best_dist && tie_break_better(records, selection, i, b)),
        };
        if replace {
            best = Some(i);
            best_dist = nearest;
        }
    }
    best
}

fn farthest_first_init(
    records: &[MineRecord],
    selection: &[usize],
    dist: &impl Fn(usize, usize) -> f64,
    k: usize,
) -> Vec<usize> {
    let n = selection.len();
    let mut best = 0usize;
    for i in 1..n {
        if tie_break_better(records, selection, i, best) {
            best = i;
        }
    }
    let mut medoids = vec![best];

    while medoids.len() < k {
        match farthest_unpicked(records, selection, dist, &medoids, n) {
            Some(next) => medoids.push(next),
            None => break,
        }
    }
    medoids
}

/// Computes k-medoids clustering over `records[selection[*]]`.
#[must_use]
pub fn compute_clustering(records: &[MineRecord], selection: &[usize], cfg: &ClusteringConfig) -> ClusteringResult {
    let n = selection.len();
    if n == 0 {
        return ClusteringResult::default();
    }
    let k = cfg.k.clamp(1, n);

    let space = DistanceSpace::build(records, selection, &cfg.space);
    let dist = |i: usize, j: usize| space.distance(i, j);

    let mut medoids = farthest_first_init(records, selection, &dist, k);
    let mut assignment = vec![0usize; n];

    for _ in 0..cfg.max_iters.max(1) {
        for (i, slot) in assignment.iter_mut().enumerate() {
            let mut best_cluster = 0usize;
            let mut best_dist = f64::INFINITY;
            for (c, &medoid) in medoids.iter().enumerate() {
                let d = dist(i, medoid);
                if d < best_dist {
                    best_dist = d;
                    best_cluster = c;
                }
            }
            *slot = best_cluster;
        }

        let mut changed = false;
        let mut next_medoids = medoids.clone();
        for c in 0..k {
            let members: Vec<usize> = (0..n).filter(|&i| assignment[i] == c).collect();
            if members.is_empty() {
                if let Some(replacement) = farthest_unpicked(records, selection, &dist, &next_medoids, n) {
                    if replacement != medoids[c] {
                        changed = true;
                    }
                    next_medoids[c] = replacement;
                }
                continue;
            }
            let mut best_member = members[0];
            let mut best_cost = f64::INFINITY;
            for &m in &members {
                let cost: f64 = members.iter().map(|&o| dist(m, o)).sum();
                if cost < best_cost {
                    best_cost = cost;
                    best_member = m;
                }
            }
            if best_member != medoids[c] {
                changed = true;
            }
            next_medoids[c] = best_member;
        }
        medoids = next_medoids;
        if !changed {
            break;
        }
    }

    for (i, slot) in assignment.iter_mut().enumerate() {
        let mut best_cluster = 0usize;
        let mut best_dist = f64::INFINITY;
        for (c, &medoid) in medoids.iter().enumerate() {
            let d = dist(i, medoid);
            if d < best_dist {
                best_dist = d;
                best_cluster = c;
            }
        }
        *slot = best_cluster;
    }

    let mut cluster_sizes = vec![0usize; k];
    for &c in &assignment {
        cluster_sizes[c] += 1;
    }

    let total_cost: f64 = (0..n).map(|i| dist(i, medoids[assignment[i]])).sum();

    let mut silhouettes = Vec::with_capacity(n);
    for i in 0..n {
        let own = assignment[i];
        let same: Vec<usize> = (0..n).filter(|&j| j != i && assignment[j] == own).collect();
        let a = if same.is_empty() {
            0.0
        } else {
            same.iter().map(|&j| dist(i, j)).sum::<f64>() / same.len() as f64
        };
        let mut b = f64::INFINITY;
        for c in 0..k {
            if c == own {
                continue;
            }
            let members: Vec<usize> = (0..n).filter(|&j| assignment[j] == c).collect();
            if members.is_empty() {
                continue;
            }
            let mean = members.iter().map(|&j| dist(i, j)).sum::<f64>() / members.len() as f64;
            b = b.min(mean);
        }
        let s = if !b.is_finite() || same.is_empty() {
            0.0
        } else {
            let denom = a.max(b);
            if denom > 0.0 { (b - a) / denom } else { 0.0 }
        };
        silhouettes.push(s);
    }
    let avg_silhouette = if silhouettes.is_empty() {
        0.0
    } else {
        silhouettes.iter().sum::<f64>() / silhouettes.len() as f64
    };

    ClusteringResult {
        k,
        medoid_entry: medoids.clone(),
        medoid_rec_index: medoids.iter().map(|&m| selection[m]).collect(),
        assignment,
        cluster_sizes,
        total_cost,
        avg_silhouette,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MineMetric;

    fn record_with(seed: u64, population: i32, score: f64) -> MineRecord {
        let mut r = MineRecord::default();
        r.seed = seed;
        r.stats.population = population;
        r.score = score;
        r
    }

    fn cfg(k: usize) -> ClusteringConfig {
        ClusteringConfig {
            k,
            max_iters: 30,
            space: DistanceSpaceConfig {
                metrics: vec![MineMetric::Population],
                ..DistanceSpaceConfig::default()
            },
        }
    }

    #[test]
    fn k_is_clamped_to_selection_size() {
        let records = vec![record_with(1, 10, 1.0), record_with(2, 20, 2.0)];
        let selection: Vec<usize> = (0..2).collect();
        let result = compute_clustering(&records, &selection, &cfg(10));
        assert_eq!(result.k, 2);
    }

    #[test]
    fn every_point_is_assigned_and_sizes_sum_to_n() {
        let records: Vec<MineRecord> = (0..12).map(|i| record_with(i as u64, i * 100, f64::from(i))).collect();
        let selection: Vec<usize> = (0..12).collect();
        let result = compute_clustering(&records, &selection, &cfg(3));
        assert_eq!(result.assignment.len(), 12);
        assert_eq!(result.cluster_sizes.iter().sum::<usize>(), 12);
    }

    #[test]
    fn tight_clusters_yield_low_total_cost() {
        let mut records = Vec::new();
        for i in 0..5 {
            records.push(record_with(i, 100 + i as i32, f64::from(i)));
        }
        for i in 0..5 {
            records.push(record_with(100 + i, 100_000 + i as i32, f64::from(i)));
        }
        let selection: Vec<usize> = (0..10).collect();
        let result = compute_clustering(&records, &selection, &cfg(2));
        assert_eq!(result.cluster_sizes.len(), 2);
        assert!(result.cluster_sizes.iter().all(|&s| s == 5));
    }
}
