//! Vantage-point metric tree with deterministic construction and best-first
//! k-nearest-neighbour search.
//!
//! The tree is an arena of nodes addressed by index rather than pointers, so
//! it can be built once and queried from multiple threads. Distances are
//! supplied by the caller as a closure, letting the same tree implementation
//! serve the scalar, layout, and hybrid distance spaces used throughout the
//! analysis modules.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

const NONE: i64 = -1;

#[derive(Clone, Copy, Debug)]
struct Node {
    vp: i64,
    threshold: f64,
    left: i64,
    right: i64,
}

impl Node {
    const fn leaf() -> Self {
        Self {
            vp: NONE,
            threshold: 0.0,
            left: NONE,
            right: NONE,
        }
    }
}

/// A candidate neighbour: an item id paired with its distance to the query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbour {
    /// Distance from the query point.
    pub distance: f64,
    /// Candidate item id.
    pub id: i64,
}

impl Neighbour {
    /// Returns `true` when `self` is strictly a better (closer) candidate
    /// than `other`, with ties broken by the smaller id.
    fn better_than(&self, other: &Self) -> bool {
        match self.distance.partial_cmp(&other.distance) {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => self.id < other.id,
            _ => false,
        }
    }
}

impl Eq for Neighbour {}

impl PartialOrd for Neighbour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbour {
    /// Ordered so a `BinaryHeap<Neighbour>` is a max-heap by distance (worst
    /// candidate on top), with ties broken by larger id on top.
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// A deterministic vantage-point tree over an arbitrary distance function.
pub struct VpTree<'d> {
    nodes: Vec<Node>,
    root: i64,
    dist: Box<dyn Fn(i64, i64) -> f64 + 'd>,
}

impl<'d> VpTree<'d> {
    /// Builds a tree over `items` using `dist` as the metric.
    ///
    /// Construction is deterministic: the last remaining item is always
    /// chosen as the vantage point, the rest are sorted by `(distance, id)`
    /// ascending, and the median splits the near/far children.
    pub fn build(mut items: Vec<i64>, dist: impl Fn(i64, i64) -> f64 + 'd) -> Self {
        let mut nodes = Vec::new();
        let root = Self::build_node(&mut items, &dist, &mut nodes);
        Self { nodes, root, dist: Box::new(dist) }
    }

    fn build_node(items: &mut Vec<i64>, dist: &impl Fn(i64, i64) -> f64, nodes: &mut Vec<Node>) -> i64 {
        if items.is_empty() {
            return NONE;
        }

        let Some(vp) = items.pop() else {
            return NONE;
        };

        if items.is_empty() {
            nodes.push(Node {
                vp,
                threshold: 0.0,
                left: NONE,
                right: NONE,
            });
            return (nodes.len() - 1) as i64;
        }

        let mut dists: Vec<(f64, i64)> = items.iter().map(|&id| (dist(vp, id), id)).collect();
        dists.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });

        let mid = dists.len() / 2;
        let threshold = dists.get(mid).map_or(0.0, |&(d, _)| d);

        let mut inner: Vec<i64> = dists[..mid].iter().map(|&(_, id)| id).collect();
        let mut outer: Vec<i64> = dists[mid..].iter().map(|&(_, id)| id).collect();

        let node_index = nodes.len() as i64;
        nodes.push(Node::leaf());

        let left = Self::build_node(&mut inner, dist, nodes);
        let right = Self::build_node(&mut outer, dist, nodes);

        if let Some(node) = nodes.get_mut(node_index as usize) {
            *node = Node {
                vp,
                threshold,
                left,
                right,
            };
        }
        node_index
    }

    /// Returns the `k` nearest neighbours of `query`, ascending by
    /// `(distance, id)`. Returns an empty vector when the tree is empty or
    /// `k == 0`.
    #[must_use]
    pub fn k_nearest(&self, query: i64, k: usize) -> Vec<Neighbour> {
        if k == 0 || self.root == NONE {
            return Vec::new();
        }

        let mut heap: BinaryHeap<Neighbour> = BinaryHeap::with_capacity(k);
        let mut tau = f64::INFINITY;
        self.search(self.root, query, k, &mut heap, &mut tau);

        let mut out: Vec<Neighbour> = heap.into_vec();
        out.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    fn search(&self, node_index: i64, query: i64, k: usize, heap: &mut BinaryHeap<Neighbour>, tau: &mut f64) {
        if node_index == NONE {
            return;
        }
        let Some(&node) = self.nodes.get(node_index as usize) else {
            return;
        };

        let d = (self.dist)(query, node.vp);
        if node.vp != query {
            self.maybe_add(heap, tau, k, Neighbour { distance: d, id: node.vp });
        }

        let (near, far) = if d < node.threshold {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        self.search(near, query, k, heap, tau);

        let could_hit_far = if d < node.threshold {
            d + *tau >= node.threshold
        } else {
            d - *tau <= node.threshold
        };
        if could_hit_far {
            self.search(far, query, k, heap, tau);
        }
    }

    fn maybe_add(&self, heap: &mut BinaryHeap<Neighbour>, tau: &mut f64, k: usize, candidate: Neighbour) {
        if heap.len() < k {
            heap.push(candidate);
            if heap.len() == k {
                if let Some(worst) = heap.peek() {
                    *tau = worst.distance;
                }
            }
            return;
        }

        let Some(worst) = heap.peek().copied() else {
            return;
        };
        if candidate.better_than(&worst) {
            heap.pop();
            heap.push(candidate);
            if let Some(new_worst) = heap.peek() {
                *tau = new_worst.distance;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(points: &[(i64, f64)], query: f64, k: usize) -> Vec<Neighbour> {
        let mut all: Vec<Neighbour> = points
            .iter()
            .map(|&(id, v)| Neighbour {
                distance: (v - query).abs(),
                id,
            })
            .collect();
        all.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        all.truncate(k);
        all
    }

    #[test]
    fn matches_brute_force_on_a_line() {
        let points: Vec<(i64, f64)> = (0..50).map(|i| (i, f64::from(i) * 1.7)).collect();
        let values: std::collections::HashMap<i64, f64> = points.iter().copied().collect();
        let ids: Vec<i64> = points.iter().map(|&(id, _)| id).collect();

        let dist = move |a: i64, b: i64| {
            let va = values.get(&a).copied().unwrap_or(0.0);
            let vb = values.get(&b).copied().unwrap_or(0.0);
            (va - vb).abs()
        };

        let tree = VpTree::build(ids.clone(), dist);

        for &(query_id, query_val) in &points {
            let expected = brute_force(&points, query_val, 5);
            let actual = tree.k_nearest(query_id, 5);
            assert_eq!(actual.len(), expected.len());
            for (a, e) in actual.iter().zip(expected.iter()) {
                assert_eq!(a.id, e.id);
                assert!((a.distance - e.distance).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn empty_tree_returns_empty() {
        let tree = VpTree::build(Vec::new(), |_, _| 0.0);
        assert!(tree.k_nearest(0, 3).is_empty());
    }

    #[test]
    fn zero_k_returns_empty() {
        let tree = VpTree::build(vec![0, 1, 2], |a, b| (a - b).unsigned_abs() as f64);
        assert!(tree.k_nearest(0, 0).is_empty());
    }

    #[test]
    fn single_item_tree() {
        let tree = VpTree::build(vec![42], |_, _| 0.0);
        let result = tree.k_nearest(0, 1);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, 42);
    }
}
