//! 2D k-d tree over location coordinates
//!
//! Neighbor search for distance-band, k-nearest and default-threshold
//! computations. Distances follow the tree's [`DistanceMethod`]; the splitting
//! plane offset `|dx|` (or `|dy|`) is a lower bound for both metrics, so the
//! same pruning rule serves Euclidean and Manhattan queries.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use std::cmp::Ordering;

use super::DistanceMethod;

/// A 2D k-d tree over `(x, y)` coordinates, addressed by input index.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    coords: Vec<(f64, f64)>,
    metric: DistanceMethod,
}

#[derive(Debug)]
struct KdNode {
    /// Index into `coords`
    point_idx: usize,
    /// Split dimension: 0 = x, 1 = y
    split_dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// A query hit: input index and its distance to the query point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub index: usize,
    pub distance: f64,
}

/// Distance first, input order second
fn hit_order(a: &Hit, b: &Hit) -> Ordering {
    a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index))
}

impl KdTree {
    /// Build a tree over the given coordinates.
    ///
    /// Construction is O(n log n) using median splits.
    pub fn build(coords: &[(f64, f64)], metric: DistanceMethod) -> Self {
        let mut nodes = Vec::with_capacity(coords.len());
        if !coords.is_empty() {
            let mut indices: Vec<usize> = (0..coords.len()).collect();
            build_recursive(coords, &mut indices, 0, &mut nodes);
        }
        Self {
            nodes,
            coords: coords.to_vec(),
            metric,
        }
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn metric(&self) -> DistanceMethod {
        self.metric
    }

    pub fn coord(&self, i: usize) -> (f64, f64) {
        self.coords[i]
    }

    /// Distance between two indexed points
    pub fn distance_between(&self, i: usize, j: usize) -> f64 {
        let (xi, yi) = self.coords[i];
        let (xj, yj) = self.coords[j];
        self.metric.distance(xi, yi, xj, yj)
    }

    /// The k nearest points to (qx, qy), sorted by distance then index.
    pub fn k_nearest(&self, qx: f64, qy: f64, k: usize) -> Vec<Hit> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }
        // Kept sorted ascending; the last element is the current k-th best
        let mut best: Vec<Hit> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, qx, qy, k, &mut best);
        best
    }

    /// All points within `radius` (inclusive) of (qx, qy), sorted by
    /// distance then index.
    pub fn within_radius(&self, qx: f64, qy: f64, radius: f64) -> Vec<Hit> {
        if self.nodes.is_empty() || radius < 0.0 || radius.is_nan() {
            return Vec::new();
        }
        let mut results = Vec::new();
        self.radius_recursive(0, qx, qy, radius, &mut results);
        results.sort_by(hit_order);
        results
    }

    fn knn_recursive(&self, node_idx: usize, qx: f64, qy: f64, k: usize, best: &mut Vec<Hit>) {
        let node = &self.nodes[node_idx];
        let (px, py) = self.coords[node.point_idx];
        let hit = Hit {
            index: node.point_idx,
            distance: self.metric.distance(qx, qy, px, py),
        };

        let full = best.len() >= k;
        if !full || hit_order(&hit, &best[best.len() - 1]) == Ordering::Less {
            let pos = best
                .binary_search_by(|probe| hit_order(probe, &hit))
                .unwrap_or_else(|e| e);
            best.insert(pos, hit);
            best.truncate(k);
        }

        let diff = if node.split_dim == 0 { qx - px } else { qy - py };
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.knn_recursive(child, qx, qy, k, best);
        }

        // `<=` keeps equal-distance candidates reachable for index tie-breaks
        let bound = if best.len() >= k { best[best.len() - 1].distance } else { f64::INFINITY };
        if diff.abs() <= bound {
            if let Some(child) = second {
                self.knn_recursive(child, qx, qy, k, best);
            }
        }
    }

    fn radius_recursive(&self, node_idx: usize, qx: f64, qy: f64, radius: f64, results: &mut Vec<Hit>) {
        let node = &self.nodes[node_idx];
        let (px, py) = self.coords[node.point_idx];
        let distance = self.metric.distance(qx, qy, px, py);

        if distance <= radius {
            results.push(Hit {
                index: node.point_idx,
                distance,
            });
        }

        // Left holds keys <= the split key, right holds keys >= it
        let diff = if node.split_dim == 0 { qx - px } else { qy - py };

        if let Some(left) = node.left {
            if diff <= 0.0 || diff.abs() <= radius {
                self.radius_recursive(left, qx, qy, radius, results);
            }
        }
        if let Some(right) = node.right {
            if diff >= 0.0 || diff.abs() <= radius {
                self.radius_recursive(right, qx, qy, radius, results);
            }
        }
    }
}

fn build_recursive(
    coords: &[(f64, f64)],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let n = indices.len();
    let split_dim = (depth % 2) as u8;

    let key = |i: usize| if split_dim == 0 { coords[i].0 } else { coords[i].1 };
    indices.sort_by(|&a, &b| key(a).total_cmp(&key(b)));

    let median = n / 2;
    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx: indices[median],
        split_dim,
        left: None,
        right: None,
    });

    if median > 0 {
        let left = build_recursive(coords, &mut indices[..median], depth + 1, nodes);
        nodes[node_idx].left = Some(left);
    }
    if median + 1 < n {
        let right = build_recursive(coords, &mut indices[median + 1..], depth + 1, nodes);
        nodes[node_idx].right = Some(right);
    }

    node_idx
}
