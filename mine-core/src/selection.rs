//! Diverse top-K selection via Maximal Marginal Relevance (MMR).

use crate::distance_space::MineDiversityMode;
use crate::phash::hamming_distance_64;
use crate::record::MineRecord;

/// `sqrt(7)`, the dimensionality of the raw MMR feature vector. [`MineDiversityMode::Layout`]
/// scales its Hamming-based distance by this constant so it sits on the same
/// scale as the 7-D scalar Euclidean distance.
const LAYOUT_SCALE: f64 = 2.645_751_311_064_59;

/// Configuration for [`select_diverse_top_k`].
#[derive(Clone, Copy, Debug)]
pub struct MmrConfig {
    /// Whether to run MMR at all; when `false` (or `top_k <= 1`), the plain
    /// sorted prefix is returned.
    pub diverse: bool,
    /// Number of entries to return.
    pub top_k: usize,
    /// Candidate pool size before diversification; `0` resolves to
    /// `max(50, 10*top_k)`, clamped to the candidate count.
    pub candidate_pool: usize,
    /// Balance between relevance and diversity in `[0, 1]`; `1.0` is
    /// pure-relevance, `0.0` is pure-diversity.
    pub score_weight: f64,
    /// Distance space used to measure diversity.
    pub mode: MineDiversityMode,
    /// Blend weight for [`MineDiversityMode::Hybrid`], clamped to `[0, 1]`.
    pub layout_weight: f64,
}

impl Default for MmrConfig {
    fn default() -> Self {
        Self {
            diverse: true,
            top_k: 10,
            candidate_pool: 0,
            score_weight: 0.5,
            mode: MineDiversityMode::Scalar,
            layout_weight: 0.5,
        }
    }
}

fn raw_features(record: &MineRecord) -> [f64; 7] {
    let area = record.area();
    [
        f64::from(record.stats.population) / area,
        f64::from(record.stats.happiness),
        f64::from(record.stats.traffic_congestion),
        record.sea_flood_frac,
        record.pond_max_depth,
        f64::from(record.stats.avg_land_value),
        f64::from(record.road_tiles) / area,
    ]
}

fn min_max_normalize(columns: &mut [Vec<f64>]) {
    for column in columns.iter_mut() {
        let lo = column.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let denom = if hi > lo { hi - lo } else { 1.0 };
        for v in column.iter_mut() {
            *v = (*v - lo) / denom;
        }
    }
}

/// Selects a diverse top-`cfg.top_k` subset of `records[selection[*]]`.
///
/// Candidates are first sorted by `(score descending, seed ascending)`. If
/// diversification is disabled or `top_k <= 1`, the sorted prefix is
/// returned verbatim. Otherwise MMR runs over a candidate pool as described
/// in the ranking module's documentation, returning indices into `selection`.
#[must_use]
pub fn select_diverse_top_k(
    records: &[MineRecord],
    selection: &[usize],
    cfg: &MmrConfig,
) -> Vec<usize> {
    let mut order: Vec<usize> = (0..selection.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = &records[selection[a]];
        let rb = &records[selection[b]];
        rb.score
            .partial_cmp(&ra.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| ra.seed.cmp(&rb.seed))
    });

    let top_k = cfg.top_k.min(order.len());
    if !cfg.diverse || top_k <= 1 {
        order.truncate(top_k);
        return order;
    }

    let pool_size = if cfg.candidate_pool == 0 {
        (10 * cfg.top_k).max(50)
    } else {
        cfg.candidate_pool
    }
    .min(order.len());
    let pool = &order[..pool_size];

    let mut feature_cols: Vec<Vec<f64>> = (0..7).map(|_| Vec::with_capacity(pool.len())).collect();
    let mut score_col = Vec::with_capacity(pool.len());
    for &idx in pool {
        let record = &records[selection[idx]];
        let raw = raw_features(record);
        for (col, v) in feature_cols.iter_mut().zip(raw) {
            col.push(v);
        }
        score_col.push(record.score);
    }
    min_max_normalize(&mut feature_cols);
    min_max_normalize(std::slice::from_mut(&mut score_col));

    let n = pool.len();
    let scalar_dist = |i: usize, j: usize| -> f64 {
        let sq: f64 = (0..7)
            .map(|c| (feature_cols[c][i] - feature_cols[c][j]).powi(2))
            .sum();
        sq.sqrt() / 7.0f64.sqrt()
    };
    let layout_dist = |i: usize, j: usize| -> f64 {
        let a = records[selection[pool[i]]].overlay_phash;
        let b = records[selection[pool[j]]].overlay_phash;
        (f64::from(hamming_distance_64(a, b)) / 64.0) * LAYOUT_SCALE
    };
    let layout_weight = cfg.layout_weight.clamp(0.0, 1.0);
    let dist = |i: usize, j: usize| -> f64 {
        match cfg.mode {
            MineDiversityMode::Scalar => scalar_dist(i, j),
            MineDiversityMode::Layout => layout_dist(i, j),
            MineDiversityMode::Hybrid => {
                (1.0 - layout_weight) * scalar_dist(i, j) + layout_weight * layout_dist(i, j)
            }
        }
    };

    let mut picked: Vec<usize> = Vec::with_capacity(top_k);
    let mut remaining: Vec<usize> = (0..n).collect();

    let seed_pos = remaining
        .iter()
        .position(|&p| p == 0)
        .expect("candidate 0 is always present in the pool");
    picked.push(remaining.remove(seed_pos));

    let score_weight = cfg.score_weight.clamp(0.0, 1.0);
    while picked.len() < top_k && !remaining.is_empty() {
        let mut best_pos = 0usize;
        let mut best_mmr = f64::NEG_INFINITY;
        for (pos, &cand) in remaining.iter().enumerate() {
            let nearest = picked
                .iter()
                .map(|&p| dist(cand, p))
                .fold(f64::INFINITY, f64::min);
            let mmr = score_weight * score_col[cand] + (1.0 - score_weight) * nearest;
            if mmr > best_mmr {
                best_mmr = mmr;
                best_pos = pos;
            }
        }
        picked.push(remaining.remove(best_pos));
    }

    picked.into_iter().map(|p| pool[p]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(seed: u64, population: i32, score: f64, phash: u64) -> MineRecord {
        let mut r = MineRecord::default();
        r.seed = seed;
        r.w = 16;
        r.h = 16;
        r.stats.population = population;
        r.score = score;
        r.overlay_phash = phash;
        r
    }

    #[test]
    fn non_diverse_returns_sorted_prefix() {
        let records = vec![
            record_with(1, 10, 1.0, 0),
            record_with(2, 20, 3.0, 0),
            record_with(3, 30, 2.0, 0),
        ];
        let selection: Vec<usize> = (0..3).collect();
        let cfg = MmrConfig {
            diverse: false,
            top_k: 2,
            ..MmrConfig::default()
        };
        let picked = select_diverse_top_k(&records, &selection, &cfg);
        assert_eq!(picked, vec![1, 2]);
    }

    #[test]
    fn mmr_seeds_with_highest_scoring_candidate() {
        let records: Vec<MineRecord> = (0..10)
            .map(|i| record_with(i as u64, 100 + i, f64::from(i), u64::from(i as u32)))
            .collect();
        let selection: Vec<usize> = (0..10).collect();
        let cfg = MmrConfig {
            diverse: true,
            top_k: 3,
            candidate_pool: 10,
            ..MmrConfig::default()
        };
        let picked = select_diverse_top_k(&records, &selection, &cfg);
        assert_eq!(picked[0], 9);
        assert_eq!(picked.len(), 3);
    }

    #[test]
    fn mmr_prefers_diverse_candidates_over_near_duplicates() {
        let mut records = Vec::new();
        records.push(record_with(1, 100, 10.0, 0x0000_0000));
        records.push(record_with(2, 100, 9.9, 0x0000_0000));
        records.push(record_with(3, 1, 9.0, 0xFFFF_FFFF_FFFF_FFFF));
        let selection: Vec<usize> = (0..3).collect();
        let cfg = MmrConfig {
            diverse: true,
            top_k: 2,
            candidate_pool: 3,
            score_weight: 0.0,
            mode: MineDiversityMode::Layout,
            ..MmrConfig::default()
        };
        let picked = select_diverse_top_k(&records, &selection, &cfg);
        assert_eq!(picked[0], 0);
        assert_eq!(picked[1], 2);
    }
}
