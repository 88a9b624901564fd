//! Classical (Torgerson) MDS: a 2-D Euclidean embedding recovered from a
//! pairwise distance matrix via power iteration.

use crate::distance_space::{DistanceSpace, DistanceSpaceConfig};
use crate::record::MineRecord;

/// Result of [`compute_embedding`].
#[derive(Clone, Debug, Default)]
pub struct EmbeddingResult {
    /// First coordinate per selection-local entry.
    pub x: Vec<f64>,
    /// Second coordinate per selection-local entry.
    pub y: Vec<f64>,
    /// Largest eigenvalue of the double-centered Gram matrix.
    pub eigenvalue1: f64,
    /// Second-largest eigenvalue of the double-centered Gram matrix.
    pub eigenvalue2: f64,
    /// Whether the embedding computation completed without a hard failure.
    pub ok: bool,
    /// Set when the distance structure is highly non-Euclidean
    /// (`eigenvalue1 <= 0`).
    pub warning: Option<String>,
}

fn squared_distance_matrix(space: &DistanceSpace) -> Vec<Vec<f64>> {
    let n = space.len();
    let mut d2 = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = space.distance(i, j);
            let sq = d * d;
            d2[i][j] = sq;
            d2[j][i] = sq;
        }
    }
    d2
}

fn double_center(d2: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = d2.len();
    let row_mean: Vec<f64> = d2.iter().map(|row| row.iter().sum::<f64>() / n as f64).collect();
    let grand_mean = row_mean.iter().sum::<f64>() / n as f64;

    let mut b = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in 0..n {
            b[i][j] = -0.5 * (d2[i][j] - row_mean[i] - row_mean[j] + grand_mean);
        }
    }
    b
}

fn gershgorin_min_bound(b: &[Vec<f64>]) -> f64 {
    let n = b.len();
    let mut min_bound = f64::INFINITY;
    for i in 0..n {
        let radius: f64 = (0..n).filter(|&j| j != i).map(|j| b[i][j].abs()).sum();
        min_bound = min_bound.min(b[i][i] - radius);
    }
    min_bound
}

fn matvec_shifted(b: &[Vec<f64>], v: &[f64], shift: f64) -> Vec<f64> {
    let n = b.len();
    (0..n)
        .map(|i| b[i].iter().zip(v.iter()).map(|(&bij, &vj)| bij * vj).sum::<f64>() + shift * v[i])
        .collect()
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn normalize(v: &mut [f64]) {
    let n = norm(v);
    if n > 0.0 {
        for x in v.iter_mut() {
            *x /= n;
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum()
}

fn rayleigh(b: &[Vec<f64>], v: &[f64]) -> f64 {
    let bv = matvec_shifted(b, v, 0.0);
    dot(v, &bv)
}

/// Computes a 2-D classical-MDS embedding of `records[selection[*]]` under
/// `space`, running `power_iters` simultaneous-iteration steps.
#[must_use]
pub fn compute_embedding(
    records: &[MineRecord],
    selection: &[usize],
    space_cfg: &DistanceSpaceConfig,
    power_iters: usize,
) -> EmbeddingResult {
    let n = selection.len();
    if n == 0 {
        return EmbeddingResult {
            ok: true,
            ..EmbeddingResult::default()
        };
    }
    if n == 1 {
        return EmbeddingResult {
            x: vec![0.0],
            y: vec![0.0],
            ok: true,
            ..EmbeddingResult::default()
        };
    }

    let space = DistanceSpace::build(records, selection, space_cfg);
    let d2 = squared_distance_matrix(&space);
    let b = double_center(&d2);

    let min_bound = gershgorin_min_bound(&b);
    let shift = -min_bound + 1e-6;

    let mut v1: Vec<f64> = (0..n).map(|i| if i % 2 == 1 { -1.0 } else { 1.0 }).collect();
    let mut v2: Vec<f64> = (0..n).map(|i| if i % 3 == 0 { 1.0 } else { -1.0 }).collect();
    normalize(&mut v1);
    normalize(&mut v2);

    for _ in 0..power_iters.max(1) {
        let mut w1 = matvec_shifted(&b, &v1, shift);
        normalize(&mut w1);

        let mut w2 = matvec_shifted(&b, &v2, shift);
        let proj = dot(&w1, &w2);
        for i in 0..n {
            w2[i] -= proj * w1[i];
        }
        normalize(&mut w2);

        v1 = w1;
        v2 = w2;
    }

    let eigenvalue1 = rayleigh(&b, &v1);
    let eigenvalue2 = rayleigh(&b, &v2);

    let x: Vec<f64> = v1.iter().map(|&c| c * eigenvalue1.max(0.0).sqrt()).collect();
    let y: Vec<f64> = v2.iter().map(|&c| c * eigenvalue2.max(0.0).sqrt()).collect();

    let warning = if eigenvalue1 <= 0.0 {
        Some("distance structure is highly non-Euclidean".to_owned())
    } else {
        None
    };

    EmbeddingResult {
        x,
        y,
        eigenvalue1,
        eigenvalue2,
        ok: true,
        warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MineMetric;

    fn record_with(population: i32) -> MineRecord {
        let mut r = MineRecord::default();
        r.stats.population = population;
        r
    }

    fn cfg() -> DistanceSpaceConfig {
        DistanceSpaceConfig {
            metrics: vec![MineMetric::Population],
            robust_scaling: false,
            ..DistanceSpaceConfig::default()
        }
    }

    #[test]
    fn single_point_embeds_at_origin() {
        let records = vec![record_with(100)];
        let result = compute_embedding(&records, &[0], &cfg(), 50);
        assert_eq!(result.x, vec![0.0]);
        assert_eq!(result.y, vec![0.0]);
        assert!(result.ok);
    }

    #[test]
    fn collinear_points_separate_along_the_first_axis() {
        let records: Vec<MineRecord> = (0..6).map(|i| record_with(i * 100)).collect();
        let selection: Vec<usize> = (0..6).collect();
        let result = compute_embedding(&records, &selection, &cfg(), 100);
        assert!(result.ok);
        assert!(result.eigenvalue1 > 0.0);

        let mut order: Vec<usize> = (0..6).collect();
        order.sort_by(|&a, &b| result.x[a].partial_cmp(&result.x[b]).unwrap());
        let ascending = order == (0..6).collect::<Vec<_>>();
        let descending = order == (0..6).rev().collect::<Vec<_>>();
        assert!(ascending || descending);
    }
}
