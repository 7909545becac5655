//! Spatial weights construction
//!
//! Turns a location set and a [`WeightsConfig`] into [`NeighborWeights`]:
//!
//! | Concept | Neighbors of `i` | `w_ij` |
//! |---|---|---|
//! | FixedDistanceBand | `d_ij <= t` | 1 |
//! | InverseDistance | all, or `d_ij <= t` when `t > 0` | `1/d_ij` |
//! | InverseDistanceSquared | all, or `d_ij <= t` when `t > 0` | `1/d_ij²` |
//! | ZoneOfIndifference | all | 1 if `d_ij <= t`, else `t/d_ij` |
//! | KNearestNeighbors | the k closest (ties by input order) | 1 |
//! | Contiguity | shared boundary (Queen/Rook/Bishop) | 1 |
//!
//! Coincident locations (`d_ij = 0`) get weight 1 under the inverse concepts.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use geostat_core::{Error, Result};

use super::contiguity::{contiguity_rows, ContiguityType};
use super::kdtree::KdTree;
use super::location::validate_locations;
use super::{DistanceMethod, Location, NeighborWeights};
use crate::maybe_rayon::*;

/// How neighbor relationships and raw weights are defined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpatialConcept {
    InverseDistance,
    InverseDistanceSquared,
    #[default]
    FixedDistanceBand,
    ZoneOfIndifference,
    KNearestNeighbors,
    Contiguity(ContiguityType),
}

impl SpatialConcept {
    pub fn name(&self) -> &'static str {
        match self {
            SpatialConcept::InverseDistance => "InverseDistance",
            SpatialConcept::InverseDistanceSquared => "InverseDistanceSquared",
            SpatialConcept::FixedDistanceBand => "FixedDistanceBand",
            SpatialConcept::ZoneOfIndifference => "ZoneOfIndifference",
            SpatialConcept::KNearestNeighbors => "KNearestNeighbors",
            SpatialConcept::Contiguity(ContiguityType::Queen) => "QueenContiguity",
            SpatialConcept::Contiguity(ContiguityType::Rook) => "RookContiguity",
            SpatialConcept::Contiguity(ContiguityType::Bishop) => "BishopContiguity",
        }
    }

    /// Whether the concept is driven by a distance threshold
    pub fn uses_threshold(&self) -> bool {
        matches!(
            self,
            SpatialConcept::InverseDistance
                | SpatialConcept::InverseDistanceSquared
                | SpatialConcept::FixedDistanceBand
                | SpatialConcept::ZoneOfIndifference
        )
    }
}

/// Parameters for spatial weights construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    pub concept: SpatialConcept,
    pub distance_method: DistanceMethod,
    /// Distance threshold. `None` selects the default band (see
    /// [`default_threshold`]) for FixedDistanceBand and ZoneOfIndifference,
    /// and no truncation for the inverse-distance concepts.
    pub threshold: Option<f64>,
    /// Neighbor count for KNearestNeighbors
    pub k: usize,
    /// Include each location as its own neighbor with weight 1
    pub self_neighbors: bool,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            concept: SpatialConcept::FixedDistanceBand,
            distance_method: DistanceMethod::Euclidean,
            threshold: None,
            k: 8,
            self_neighbors: false,
        }
    }
}

impl WeightsConfig {
    /// Fixed distance band with an explicit threshold
    pub fn distance_band(threshold: f64) -> Self {
        Self {
            threshold: Some(threshold),
            ..Default::default()
        }
    }

    pub fn k_nearest(k: usize) -> Self {
        Self {
            concept: SpatialConcept::KNearestNeighbors,
            k,
            ..Default::default()
        }
    }

    pub fn contiguity(kind: ContiguityType) -> Self {
        Self {
            concept: SpatialConcept::Contiguity(kind),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.threshold {
            if !t.is_finite() || t < 0.0 {
                return Err(Error::invalid("threshold", t, "must be a non-negative finite distance"));
            }
            let needs_positive = matches!(
                self.concept,
                SpatialConcept::FixedDistanceBand | SpatialConcept::ZoneOfIndifference
            );
            if needs_positive && t == 0.0 {
                return Err(Error::invalid("threshold", t, "must be > 0 for this concept"));
            }
        }
        if self.concept == SpatialConcept::KNearestNeighbors && self.k == 0 {
            return Err(Error::invalid("k", self.k, "must be > 0"));
        }
        Ok(())
    }
}

/// Builds [`NeighborWeights`] for one location set and configuration.
#[derive(Debug)]
pub struct SpatialWeightsBuilder<'a> {
    locations: &'a [Location],
    config: WeightsConfig,
}

impl<'a> SpatialWeightsBuilder<'a> {
    pub fn new(locations: &'a [Location], config: WeightsConfig) -> Self {
        Self { locations, config }
    }

    /// Compute the neighbor structure.
    ///
    /// Fails on an empty location set, fewer than two distinct coordinates,
    /// or an invalid configuration.
    pub fn build(&self) -> Result<NeighborWeights> {
        self.config.validate()?;
        validate_locations(self.locations)?;

        let cfg = &self.config;
        let coords: Vec<(f64, f64)> = self.locations.iter().map(Location::coord).collect();
        let tree = KdTree::build(&coords, cfg.distance_method);

        let (mut rows, threshold) = match cfg.concept {
            SpatialConcept::FixedDistanceBand => {
                let t = self.resolve_threshold(&tree)?;
                (band_rows(&tree, &coords, t), Some(t))
            }
            SpatialConcept::InverseDistance | SpatialConcept::InverseDistanceSquared => {
                let power = if cfg.concept == SpatialConcept::InverseDistance { 1 } else { 2 };
                let t = cfg.threshold.filter(|&t| t > 0.0);
                (inverse_rows(&tree, &coords, t, power), t)
            }
            SpatialConcept::ZoneOfIndifference => {
                let t = self.resolve_threshold(&tree)?;
                (indifference_rows(&tree, &coords, t), Some(t))
            }
            SpatialConcept::KNearestNeighbors => {
                let n = coords.len();
                let k = if cfg.k >= n {
                    warn!(k = cfg.k, n, "k exceeds the number of other locations, clamping");
                    n - 1
                } else {
                    cfg.k
                };
                (knn_rows(&tree, &coords, k), None)
            }
            SpatialConcept::Contiguity(kind) => (contiguity_rows(self.locations, kind)?, None),
        };

        if cfg.self_neighbors {
            for (i, row) in rows.iter_mut().enumerate() {
                row.push((i, 1.0));
            }
        }

        let weights = NeighborWeights::from_rows(rows, cfg.concept, threshold).with_distance_method(cfg.distance_method);
        let summary = weights.summary();
        debug!(
            concept = cfg.concept.name(),
            distance = cfg.distance_method.name(),
            threshold = ?threshold,
            min = summary.min,
            max = summary.max,
            mean = summary.mean,
            "built spatial weights"
        );
        if summary.isolated > 0 {
            warn!(isolated = summary.isolated, "locations without neighbors");
        }
        Ok(weights)
    }

    fn resolve_threshold(&self, tree: &KdTree) -> Result<f64> {
        match self.config.threshold {
            Some(t) => Ok(t),
            None => default_threshold_with(tree),
        }
    }
}

/// Build weights for `locations` under `config`.
pub fn build_weights(locations: &[Location], config: &WeightsConfig) -> Result<NeighborWeights> {
    SpatialWeightsBuilder::new(locations, config.clone()).build()
}

/// Default distance band: the largest nearest-neighbor distance.
///
/// Every location is guaranteed at least one neighbor at this threshold.
/// Coincident duplicates are skipped when looking for the nearest neighbor,
/// so the band is always positive when two distinct locations exist.
pub fn default_threshold(locations: &[Location], method: DistanceMethod) -> Result<f64> {
    validate_locations(locations)?;
    let coords: Vec<(f64, f64)> = locations.iter().map(Location::coord).collect();
    default_threshold_with(&KdTree::build(&coords, method))
}

fn default_threshold_with(tree: &KdTree) -> Result<f64> {
    let n = tree.len();
    let nearest: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| nearest_distinct_distance(tree, i))
        .collect();
    let max_nn = nearest.into_iter().fold(0.0, f64::max);
    if max_nn > 0.0 && max_nn.is_finite() {
        Ok(max_nn)
    } else {
        Err(Error::InsufficientLocations { found: 1 })
    }
}

/// Distance from `i` to the closest location at a different coordinate
fn nearest_distinct_distance(tree: &KdTree, i: usize) -> f64 {
    let n = tree.len();
    let (x, y) = tree.coord(i);
    let mut k = 2;
    loop {
        let hits = tree.k_nearest(x, y, k.min(n));
        if let Some(hit) = hits.iter().find(|h| h.distance > 0.0) {
            return hit.distance;
        }
        if k >= n {
            return 0.0;
        }
        k *= 2;
    }
}

fn band_rows(tree: &KdTree, coords: &[(f64, f64)], t: f64) -> Vec<Vec<(usize, f64)>> {
    (0..coords.len())
        .into_par_iter()
        .map(|i| {
            let (x, y) = coords[i];
            tree.within_radius(x, y, t)
                .into_iter()
                .filter(|h| h.index != i)
                .map(|h| (h.index, 1.0))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn inverse_weight(d: f64, power: i32) -> f64 {
    if d > 0.0 {
        1.0 / d.powi(power)
    } else {
        1.0
    }
}

fn inverse_rows(
    tree: &KdTree,
    coords: &[(f64, f64)],
    threshold: Option<f64>,
    power: i32,
) -> Vec<Vec<(usize, f64)>> {
    (0..coords.len())
        .into_par_iter()
        .map(|i| match threshold {
            Some(t) => {
                let (x, y) = coords[i];
                tree.within_radius(x, y, t)
                    .into_iter()
                    .filter(|h| h.index != i)
                    .map(|h| (h.index, inverse_weight(h.distance, power)))
                    .collect::<Vec<_>>()
            }
            None => (0..coords.len())
                .filter(|&j| j != i)
                .map(|j| (j, inverse_weight(tree.distance_between(i, j), power)))
                .collect::<Vec<_>>(),
        })
        .collect()
}

fn indifference_rows(tree: &KdTree, coords: &[(f64, f64)], t: f64) -> Vec<Vec<(usize, f64)>> {
    (0..coords.len())
        .into_par_iter()
        .map(|i| {
            (0..coords.len())
                .filter(|&j| j != i)
                .map(|j| {
                    let d = tree.distance_between(i, j);
                    (j, if d <= t { 1.0 } else { t / d })
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// k nearest other locations; ties at the k-th distance resolve by input order
fn knn_rows(tree: &KdTree, coords: &[(f64, f64)], k: usize) -> Vec<Vec<(usize, f64)>> {
    (0..coords.len())
        .into_par_iter()
        .map(|i| {
            let (x, y) = coords[i];
            // k + 1 because the query point itself is in the tree
            let hits = tree.k_nearest(x, y, k + 1);
            let Some(kth) = hits.iter().filter(|h| h.index != i).nth(k - 1).map(|h| h.distance) else {
                return Vec::new();
            };
            // Everything up to the k-th distance, so input-order tie-breaks see all candidates
            tree.within_radius(x, y, kth)
                .into_iter()
                .filter(|h| h.index != i)
                .take(k)
                .map(|h| (h.index, 1.0))
                .collect::<Vec<_>>()
        })
        .collect()
}
