//! Non-dominated sorting (NSGA-II) over an arbitrary objective vector.

use crate::record::{MineMetric, MineRecord, CROWDING_INFINITY};

/// One objective axis: a metric and whether larger values are preferred.
#[derive(Clone, Copy, Debug)]
pub struct ParetoObjective {
    /// Metric read from each record.
    pub metric: MineMetric,
    /// Whether larger values dominate (min objectives are negated internally).
    pub maximize: bool,
}

/// Per-selection-entry rank and crowding distance, plus the front partition.
#[derive(Clone, Debug)]
pub struct ParetoResult {
    /// `rank[i]` is the index of the front containing selection entry `i`.
    pub rank: Vec<i32>,
    /// `crowding[i]` is the crowding distance of selection entry `i` within its front.
    pub crowding: Vec<f64>,
    /// Fronts in peel order; every selection index appears in exactly one front.
    pub fronts: Vec<Vec<usize>>,
}

fn value_matrix(records: &[MineRecord], selection: &[usize], objectives: &[ParetoObjective]) -> Vec<Vec<f64>> {
    selection
        .iter()
        .map(|&idx| {
            let record = &records[idx];
            objectives
                .iter()
                .map(|obj| {
                    let v = obj.metric.value(record);
                    if obj.maximize { v } else { -v }
                })
                .collect()
        })
        .collect()
}

fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly_better = false;
    for (&av, &bv) in a.iter().zip(b.iter()) {
        if av < bv {
            return false;
        }
        if av > bv {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Computes Pareto ranks, crowding distances, and front partition for
/// `records[selection[*]]` under `objectives`.
#[must_use]
pub fn compute_pareto(
    records: &[MineRecord],
    selection: &[usize],
    objectives: &[ParetoObjective],
) -> ParetoResult {
    let n = selection.len();
    let values = value_matrix(records, selection, objectives);

    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            if dominates(&values[i], &values[j]) {
                dominated_by[i].push(j);
            } else if dominates(&values[j], &values[i]) {
                domination_count[i] += 1;
            }
        }
    }

    let mut rank = vec![-1i32; n];
    let mut fronts: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();
    let mut front_index = 0i32;
    let mut remaining_count = domination_count.clone();

    while !current.is_empty() {
        for &i in &current {
            rank[i] = front_index;
        }
        let mut next = Vec::new();
        for &i in &current {
            for &j in &dominated_by[i] {
                remaining_count[j] -= 1;
                if remaining_count[j] == 0 {
                    next.push(j);
                }
            }
        }
        fronts.push(current);
        current = next;
        front_index += 1;
    }

    let mut crowding = vec![0.0f64; n];
    let m = objectives.len();
    for front in &fronts {
        if front.len() <= 2 {
            for &i in front {
                crowding[i] = CROWDING_INFINITY;
            }
            continue;
        }
        for obj_idx in 0..m {
            let mut sorted = front.clone();
            sorted.sort_by(|&a, &b| {
                values[a][obj_idx]
                    .partial_cmp(&values[b][obj_idx])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let lo = values[sorted[0]][obj_idx];
            let hi = values[sorted[sorted.len() - 1]][obj_idx];
            let span = if hi > lo { hi - lo } else { 1.0 };

            crowding[sorted[0]] = CROWDING_INFINITY;
            crowding[sorted[sorted.len() - 1]] = CROWDING_INFINITY;
            for w in 1..sorted.len() - 1 {
                let prev = values[sorted[w - 1]][obj_idx];
                let next = values[sorted[w + 1]][obj_idx];
                if crowding[sorted[w]] < CROWDING_INFINITY {
                    crowding[sorted[w]] += (next - prev) / span;
                }
            }
        }
    }

    ParetoResult {
        rank,
        crowding,
        fronts,
    }
}

/// Returns up to `top_k` selection indices, walking fronts in order and
/// (when `use_crowding`) sorting each front by crowding distance descending.
#[must_use]
pub fn select_top_pareto_indices(result: &ParetoResult, top_k: usize, use_crowding: bool) -> Vec<usize> {
    let mut out = Vec::with_capacity(top_k.min(result.rank.len()));
    for front in &result.fronts {
        if out.len() >= top_k {
            break;
        }
        let mut ordered = front.clone();
        if use_crowding {
            ordered.sort_by(|&a, &b| {
                result.crowding[b]
                    .partial_cmp(&result.crowding[a])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        for idx in ordered {
            if out.len() >= top_k {
                break;
            }
            out.push(idx);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(population: i32, congestion: f32) -> MineRecord {
        let mut r = MineRecord::default();
        r.stats.population = population;
        r.stats.traffic_congestion = congestion;
        r
    }

    #[test]
    fn fronts_partition_every_index_exactly_once() {
        let records = vec![
            record_with(100, 0.1),
            record_with(200, 0.5),
            record_with(50, 0.05),
            record_with(300, 0.9),
        ];
        let selection: Vec<usize> = (0..4).collect();
        let objectives = [
            ParetoObjective { metric: MineMetric::Population, maximize: true },
            ParetoObjective { metric: MineMetric::TrafficCongestion, maximize: false },
        ];
        let result = compute_pareto(&records, &selection, &objectives);

        let mut seen = vec![false; 4];
        for front in &result.fronts {
            for &i in front {
                assert!(!seen[i], "index {i} appeared in more than one front");
                seen[i] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));

        for (f, front) in result.fronts.iter().enumerate() {
            for &i in front {
                assert_eq!(result.rank[i], f as i32);
            }
        }
    }

    #[test]
    fn boundary_points_get_large_crowding_constant() {
        let records = vec![record_with(10, 0.9), record_with(50, 0.5), record_with(100, 0.1)];
        let selection: Vec<usize> = (0..3).collect();
        let objectives = [
            ParetoObjective { metric: MineMetric::Population, maximize: true },
            ParetoObjective { metric: MineMetric::TrafficCongestion, maximize: false },
        ];
        let result = compute_pareto(&records, &selection, &objectives);
        assert_eq!(result.fronts[0].len(), 3);
        assert!(result.crowding[selection[0]] >= 1e29);
        assert!(result.crowding[selection[2]] >= 1e29);
    }

    #[test]
    fn select_top_respects_front_order() {
        let records = vec![
            record_with(100, 0.1),
            record_with(90, 0.2),
            record_with(10, 0.9),
        ];
        let selection: Vec<usize> = (0..3).collect();
        let objectives = [ParetoObjective { metric: MineMetric::Population, maximize: true }];
        let result = compute_pareto(&records, &selection, &objectives);
        let top = select_top_pareto_indices(&result, 1, true);
        assert_eq!(top, vec![0]);
    }
}
