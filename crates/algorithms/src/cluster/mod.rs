//! Cluster detection over case counts and a population at risk
//!
//! - **besag_newell**: one circle per case location, grown until it holds
//!   a fixed population
//! - **gam**: Openshaw's Geographical Analysis Machine, a grid scan of
//!   circles over a range of radii
//! - **fitness**: Poisson / binomial significance of one circle
//! - **density**: raster of accepted-circle coverage
//! - **cancel**: cooperative cancellation flag
//!
//! Both scans return an empty candidate list, not an error, when the
//! population sums to zero or there are no cases.

pub mod besag_newell;
pub mod cancel;
pub mod density;
pub mod fitness;
pub mod gam;

use serde::Serialize;

use geostat_core::{Error, Extent, FeatureCollection, Raster, Result};

use crate::statistics::{MissingValuePolicy, SpatialDataset};
use crate::weights::{extent_of, DistanceMethod, KdTree, Location};

pub use besag_newell::{besag_newell, BesagNewellParams};
pub use cancel::CancelFlag;
pub use density::{density_surface, DensityParams};
pub use fitness::FitnessFunction;
pub use gam::{gam, GamParams};

const NAME: &str = "cluster detection";

/// Locations with their case count and population at risk
#[derive(Debug, Clone)]
pub struct CaseData {
    pub locations: Vec<Location>,
    pub cases: Vec<f64>,
    pub population: Vec<f64>,
}

impl CaseData {
    /// Validate aligned, non-negative counts
    pub fn new(locations: Vec<Location>, cases: Vec<f64>, population: Vec<f64>) -> Result<Self> {
        if locations.is_empty() {
            return Err(Error::EmptyInput);
        }
        let n = locations.len();
        for (name, len) in [("cases", cases.len()), ("population", population.len())] {
            if len != n {
                return Err(Error::invalid(name, len, format!("expected {n} values, one per location")));
            }
        }
        for (field, values) in [("cases", &cases), ("population", &population)] {
            if let Some(index) = values.iter().position(|v| !(v.is_finite() && *v >= 0.0)) {
                return Err(Error::NonPositiveValue {
                    statistic: NAME,
                    field: field.into(),
                    index,
                    value: values[index],
                });
            }
        }
        Ok(Self {
            locations,
            cases,
            population,
        })
    }

    /// Read the case and population fields of a feature collection
    pub fn from_features(
        features: &FeatureCollection,
        case_field: &str,
        population_field: &str,
        policy: MissingValuePolicy,
    ) -> Result<Self> {
        let ds = SpatialDataset::from_features(features, case_field, Some(population_field), policy)?;
        let population = ds.secondary.map(|a| a.values).unwrap_or_default();
        Self::new(ds.locations, ds.primary.values, population)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn total_cases(&self) -> f64 {
        self.cases.iter().sum()
    }

    pub fn total_population(&self) -> f64 {
        self.population.iter().sum()
    }

    /// Overall case rate, `None` without population or cases
    pub fn case_rate(&self) -> Option<f64> {
        let (cases, pop) = (self.total_cases(), self.total_population());
        (pop > 0.0 && cases > 0.0).then(|| cases / pop)
    }

    pub fn extent(&self) -> Option<Extent> {
        extent_of(&self.locations)
    }

    pub(crate) fn tree(&self) -> KdTree {
        let coords: Vec<(f64, f64)> = self.locations.iter().map(Location::coord).collect();
        KdTree::build(&coords, DistanceMethod::Euclidean)
    }

    /// Candidate for the circle at (x, y) with `radius` (boundary inclusive)
    pub(crate) fn circle(
        &self,
        tree: &KdTree,
        x: f64,
        y: f64,
        radius: f64,
        rate: f64,
        fitness: FitnessFunction,
    ) -> ClusterCandidate {
        let (observed, population) = tree
            .within_radius(x, y, radius)
            .iter()
            .fold((0.0, 0.0), |(c, p), hit| (c + self.cases[hit.index], p + self.population[hit.index]));
        let expected = population * rate;
        ClusterCandidate {
            x,
            y,
            radius,
            observed,
            expected,
            population,
            p_value: fitness.p_value(observed, population, rate),
        }
    }
}

/// A scanned circle and its significance
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterCandidate {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    /// Cases inside the circle
    pub observed: f64,
    /// Population inside times the overall case rate
    pub expected: f64,
    pub population: f64,
    pub p_value: f64,
}

impl ClusterCandidate {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (x - self.x).hypot(y - self.y) <= self.radius
    }

    /// Observed over expected cases
    pub fn relative_risk(&self) -> f64 {
        if self.expected > 0.0 {
            self.observed / self.expected
        } else {
            0.0
        }
    }

    /// Intersection area over the area of the smaller circle, in [0, 1]
    pub fn overlap(&self, other: &ClusterCandidate) -> f64 {
        let d = (self.x - other.x).hypot(self.y - other.y);
        let (r1, r2) = (self.radius, other.radius);
        let small = r1.min(r2);
        if small <= 0.0 {
            return if d <= r1.max(r2) { 1.0 } else { 0.0 };
        }
        if d >= r1 + r2 {
            return 0.0;
        }
        if d <= (r1 - r2).abs() {
            return 1.0;
        }
        let a1 = r1 * r1 * ((d * d + r1 * r1 - r2 * r2) / (2.0 * d * r1)).clamp(-1.0, 1.0).acos();
        let a2 = r2 * r2 * ((d * d + r2 * r2 - r1 * r1) / (2.0 * d * r2)).clamp(-1.0, 1.0).acos();
        let kite = 0.5 * ((-d + r1 + r2) * (d + r1 - r2) * (d - r1 + r2) * (d + r1 + r2)).max(0.0).sqrt();
        ((a1 + a2 - kite) / (std::f64::consts::PI * small * small)).clamp(0.0, 1.0)
    }
}

/// Output of a cluster scan
#[derive(Debug, Clone)]
pub struct ClusterResult {
    /// Accepted circles, most significant first
    pub candidates: Vec<ClusterCandidate>,
    /// Coverage count per cell; `None` for an empty or zero-size extent
    pub density: Option<Raster<f64>>,
    /// Overall case rate (0 when undefined)
    pub case_rate: f64,
    /// Number of candidate circles tested
    pub evaluated: usize,
    /// Whether the scan stopped early on a [`CancelFlag`]
    pub cancelled: bool,
}

impl ClusterResult {
    pub(crate) fn empty(density: Option<Raster<f64>>) -> Self {
        Self {
            candidates: Vec::new(),
            density,
            case_rate: 0.0,
            evaluated: 0,
            cancelled: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Validate a significance threshold in (0, 1]
pub(crate) fn check_threshold(threshold: f64) -> Result<()> {
    if threshold.is_finite() && threshold > 0.0 && threshold <= 1.0 {
        Ok(())
    } else {
        Err(Error::invalid("threshold", threshold, "must be in (0, 1]"))
    }
}

/// Most significant first; ties by position for a stable order
pub(crate) fn sort_by_significance(candidates: &mut [ClusterCandidate]) {
    candidates.sort_by(|a, b| {
        a.p_value
            .total_cmp(&b.p_value)
            .then(a.radius.total_cmp(&b.radius))
            .then(a.x.total_cmp(&b.x))
            .then(a.y.total_cmp(&b.y))
    });
}
