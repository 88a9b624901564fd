//! k-nearest-neighbour graph construction over a standardized distance space.

use crate::distance_space::{DistanceSpace, DistanceSpaceConfig};
use crate::record::MineRecord;
use crate::vptree::{Neighbour, VpTree};

/// A kNN graph over a selection: `neighbors[i]` lists entry `i`'s nearest
/// neighbours in the chosen distance space, ascending by `(distance, id)`.
#[derive(Clone, Debug, Default)]
pub struct NeighborGraph {
    /// Per-entry neighbour lists, parallel to the selection.
    pub neighbors: Vec<Vec<Neighbour>>,
}

/// Builds a kNN graph over `records[selection[*]]`, with `k` clamped to
/// `[0, n-1]`.
#[must_use]
pub fn compute_neighbor_graph(
    records: &[MineRecord],
    selection: &[usize],
    cfg: &DistanceSpaceConfig,
    k: usize,
) -> NeighborGraph {
    let n = selection.len();
    if n == 0 {
        return NeighborGraph::default();
    }
    let k = k.min(n - 1);
    if k == 0 {
        return NeighborGraph {
            neighbors: vec![Vec::new(); n],
        };
    }

    let space = DistanceSpace::build(records, selection, cfg);
    let dist = space.as_distance_fn();
    let items: Vec<i64> = (0..n as i64).collect();
    let tree = VpTree::build(items, &dist);

    let neighbors = (0..n as i64).map(|q| tree.k_nearest(q, k)).collect();
    NeighborGraph { neighbors }
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

    #[test]
    fn k_is_clamped_to_selection_size_minus_one() {
        let records = vec![record_with(10), record_with(20)];
        let cfg = DistanceSpaceConfig {
            metrics: vec![MineMetric::Population],
            ..DistanceSpaceConfig::default()
        };
        let graph = compute_neighbor_graph(&records, &[0, 1], &cfg, 50);
        assert_eq!(graph.neighbors[0].len(), 1);
        assert_eq!(graph.neighbors[0][0].id, 1);
    }

    #[test]
    fn nearest_neighbor_is_the_closest_by_population() {
        let records: Vec<MineRecord> = vec![10, 11, 1000, 12].into_iter().map(record_with).collect();
        let selection: Vec<usize> = (0..4).collect();
        let cfg = DistanceSpaceConfig {
            metrics: vec![MineMetric::Population],
            robust_scaling: false,
            ..DistanceSpaceConfig::default()
        };
        let graph = compute_neighbor_graph(&records, &selection, &cfg, 1);
        assert_eq!(graph.neighbors[0][0].id, 1);
    }
}
