//! Besag–Newell cluster test
//!
//! Each location with at least one case becomes a circle center. The circle
//! grows through its nearest locations until the accumulated population
//! reaches `k`; its case count is then tested against the fitness function
//! with expectation `population · rate`.
//!
//! Reference:
//! Besag, J. & Newell, J. (1991). The detection of clusters in rare
//! diseases. Journal of the Royal Statistical Society A, 154(1).

use serde::{Deserialize, Serialize};
use tracing::debug;

use geostat_core::{Error, Result};

use super::{
    check_threshold, density_surface, sort_by_significance, CancelFlag, CaseData, ClusterCandidate, ClusterResult,
    DensityParams, FitnessFunction,
};
use crate::maybe_rayon::*;
use crate::weights::KdTree;

/// Parameters for the Besag–Newell test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BesagNewellParams {
    /// Population each circle must reach (default: 1000)
    pub k: f64,
    /// Circles with p below this are accepted (default: 0.01)
    pub threshold: f64,
    pub fitness: FitnessFunction,
    pub density: DensityParams,
}

impl Default for BesagNewellParams {
    fn default() -> Self {
        Self {
            k: 1000.0,
            threshold: 0.01,
            fitness: FitnessFunction::Poisson,
            density: DensityParams::default(),
        }
    }
}

impl BesagNewellParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.k.is_finite() && self.k > 0.0) {
            return Err(Error::invalid("k", self.k, "must be > 0"));
        }
        check_threshold(self.threshold)?;
        self.density.validate()
    }
}

/// Radius at which the circle around location `center` holds `k` population.
///
/// Nearest locations are fetched in doubling batches. When the whole data set
/// holds less than `k`, the circle reaches the farthest location.
fn radius_for(tree: &KdTree, data: &CaseData, center: usize, k: f64) -> f64 {
    let n = tree.len();
    let (x, y) = tree.coord(center);
    let mut batch = 16.min(n);
    loop {
        let hits = tree.k_nearest(x, y, batch);
        let mut accumulated = 0.0;
        for hit in &hits {
            accumulated += data.population[hit.index];
            if accumulated >= k {
                return hit.distance;
            }
        }
        if batch >= n {
            return hits.last().map_or(0.0, |h| h.distance);
        }
        batch = (batch * 2).min(n);
    }
}

/// Run the Besag–Newell test.
///
/// Returns an empty result when the population sums to zero or there are no
/// cases. Identical circles from coincident centers are reported once.
pub fn besag_newell(data: &CaseData, params: &BesagNewellParams, cancel: &CancelFlag) -> Result<ClusterResult> {
    params.validate()?;
    let extent = data.extent().ok_or(Error::EmptyInput)?;

    let Some(rate) = data.case_rate() else {
        debug!("no cases or no population, nothing to scan");
        return Ok(ClusterResult::empty(density_surface(&[], &extent, &params.density)?));
    };

    let tree = data.tree();
    let centers: Vec<usize> = (0..data.len()).filter(|&i| data.cases[i] > 0.0).collect();

    let evaluated: Vec<Option<ClusterCandidate>> = centers
        .into_par_iter()
        .map(|i| {
            if cancel.is_cancelled() {
                return None;
            }
            let radius = radius_for(&tree, data, i, params.k);
            let (x, y) = tree.coord(i);
            Some(data.circle(&tree, x, y, radius, rate, params.fitness))
        })
        .collect();

    let cancelled = evaluated.iter().any(Option::is_none);
    let count = evaluated.iter().flatten().count();
    let mut candidates: Vec<ClusterCandidate> = evaluated
        .into_iter()
        .flatten()
        .filter(|c| c.p_value < params.threshold)
        .collect();
    sort_by_significance(&mut candidates);
    candidates.dedup_by(|a, b| a == b);

    debug!(
        evaluated = count,
        accepted = candidates.len(),
        cancelled,
        "Besag-Newell scan"
    );
    Ok(ClusterResult {
        density: density_surface(&candidates, &extent, &params.density)?,
        candidates,
        case_rate: rate,
        evaluated: count,
        cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::test_support::hot_block;
    use crate::weights::Location;

    #[test]
    fn test_finds_the_hot_block() {
        let data = hot_block();
        let params = BesagNewellParams {
            k: 500.0,
            ..Default::default()
        };
        let result = besag_newell(&data, &params, &CancelFlag::new()).unwrap();
        assert_eq!(result.evaluated, 100);
        assert!(!result.cancelled);
        assert!(!result.is_empty());

        let best = result.candidates[0];
        assert!((1.0..=3.0).contains(&best.x) && (1.0..=3.0).contains(&best.y));
        assert!(best.population >= 500.0);
        assert!(result.candidates.iter().all(|c| c.p_value < 0.01));

        let density = result.density.unwrap();
        let (row, col) = density.cell_at(2.0, 2.0).unwrap();
        assert!(density.get(row, col).unwrap() >= 1.0);
    }

    #[test]
    fn test_population_short_of_k_uses_everything() {
        let data = hot_block();
        let tree = data.tree();
        let r = radius_for(&tree, &data, 0, 1e9);
        assert!((r - 9f64.hypot(9.0)).abs() < 1e-12);
    }

    #[test]
    fn test_permissive_threshold_never_loses_clusters() {
        let data = hot_block();
        let mut previous = 0;
        for threshold in [0.001, 0.01, 0.05, 0.2, 1.0] {
            let params = BesagNewellParams {
                k: 300.0,
                threshold,
                ..Default::default()
            };
            let n = besag_newell(&data, &params, &CancelFlag::new()).unwrap().candidates.len();
            assert!(n >= previous);
            previous = n;
        }
    }

    #[test]
    fn test_no_cases_is_empty_not_error() {
        let locations = (0..4).map(|i| Location::new(i, i as f64, 0.0)).collect();
        let data = CaseData::new(locations, vec![0.0; 4], vec![10.0; 4]).unwrap();
        let result = besag_newell(&data, &BesagNewellParams::default(), &CancelFlag::new()).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.evaluated, 0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = besag_newell(&hot_block(), &BesagNewellParams::default(), &cancel).unwrap();
        assert!(result.cancelled);
        assert!(result.is_empty());
    }

    #[test]
    fn test_invalid_params() {
        let data = hot_block();
        for params in [
            BesagNewellParams { k: 0.0, ..Default::default() },
            BesagNewellParams { threshold: 0.0, ..Default::default() },
            BesagNewellParams { threshold: 1.5, ..Default::default() },
        ] {
            assert!(besag_newell(&data, &params, &CancelFlag::new()).unwrap_err().is_configuration());
        }
    }
}
