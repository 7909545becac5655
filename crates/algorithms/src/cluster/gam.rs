//! Openshaw's Geographical Analysis Machine (GAM)
//!
//! Circles of radius `min_radius, min_radius + increment, ..., max_radius`
//! are centered on a square grid whose spacing is `grid_factor · radius`.
//! Every circle holding at least one case is tested with the fitness
//! function. Significant circles are then accepted greedily, most
//! significant first, skipping any circle that overlaps an accepted one by
//! more than `overlap_ratio` (intersection over the smaller circle).
//!
//! Reference:
//! Openshaw, S., Charlton, M., Wymer, C. & Craft, A. (1987). A Mark 1
//! Geographical Analysis Machine for the automated analysis of point data
//! sets. International Journal of GIS, 1(4).

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use geostat_core::{Error, Extent, Result};

use super::{
    check_threshold, density_surface, sort_by_significance, CancelFlag, CaseData, ClusterCandidate, ClusterResult,
    DensityParams, FitnessFunction,
};
use crate::maybe_rayon::*;

/// Upper bound on grid centers per radius
const MAX_CENTERS_PER_RADIUS: usize = 4_000_000;

/// Parameters for the GAM scan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamParams {
    /// Smallest radius (default: the extent's default search radius `r0`)
    pub min_radius: Option<f64>,
    /// Largest radius (default: `3 · r0`)
    pub max_radius: Option<f64>,
    /// Radius step (default: `r0`)
    pub radius_increment: Option<f64>,
    /// Maximum overlap of an accepted circle with earlier ones (default: 0.5)
    pub overlap_ratio: f64,
    /// Grid spacing as a fraction of the radius (default: 0.2)
    pub grid_factor: f64,
    /// Circles with p below this are significant (default: 0.01)
    pub threshold: f64,
    pub fitness: FitnessFunction,
    pub density: DensityParams,
}

impl Default for GamParams {
    fn default() -> Self {
        Self {
            min_radius: None,
            max_radius: None,
            radius_increment: None,
            overlap_ratio: 0.5,
            grid_factor: 0.2,
            threshold: 0.01,
            fitness: FitnessFunction::Poisson,
            density: DensityParams::default(),
        }
    }
}

/// Radii resolved against the data extent
#[derive(Debug, Clone, Copy, PartialEq)]
struct RadiusRange {
    min: f64,
    max: f64,
    step: f64,
}

impl RadiusRange {
    fn radii(&self) -> Vec<f64> {
        let count = ((self.max - self.min) / self.step + 1e-9).floor() as usize + 1;
        (0..count).map(|i| self.min + i as f64 * self.step).collect()
    }
}

impl GamParams {
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &'static str, v: Option<f64>| match v {
            Some(r) if !(r.is_finite() && r > 0.0) => Err(Error::invalid(name, r, "must be > 0")),
            _ => Ok(()),
        };
        positive("min_radius", self.min_radius)?;
        positive("max_radius", self.max_radius)?;
        positive("radius_increment", self.radius_increment)?;
        if let (Some(lo), Some(hi)) = (self.min_radius, self.max_radius) {
            if hi < lo {
                return Err(Error::invalid("max_radius", hi, format!("must be >= min_radius ({lo})")));
            }
        }
        if !(0.0..=1.0).contains(&self.overlap_ratio) {
            return Err(Error::invalid("overlap_ratio", self.overlap_ratio, "must be in [0, 1]"));
        }
        if !(self.grid_factor.is_finite() && self.grid_factor > 0.0) {
            return Err(Error::invalid("grid_factor", self.grid_factor, "must be > 0"));
        }
        check_threshold(self.threshold)?;
        self.density.validate()
    }

    fn radius_range(&self, extent: &Extent) -> Result<RadiusRange> {
        let r0 = extent.default_search_radius();
        let min = self.min_radius.unwrap_or(r0);
        let max = self.max_radius.unwrap_or(3.0 * min.max(r0));
        let step = self.radius_increment.unwrap_or(if r0 > 0.0 { r0 } else { min });
        if !(min > 0.0 && step > 0.0) {
            return Err(Error::invalid("min_radius", min, "no default for a zero-size extent; set it explicitly"));
        }
        if max < min {
            return Err(Error::invalid("max_radius", max, format!("must be >= min_radius ({min})")));
        }
        Ok(RadiusRange { min, max, step })
    }
}

/// Grid of circle centers covering `extent` at `spacing`
fn grid_centers(extent: &Extent, spacing: f64) -> Result<Vec<(f64, f64)>> {
    let cols = (extent.width() / spacing).floor() as usize + 1;
    let rows = (extent.height() / spacing).floor() as usize + 1;
    if cols.saturating_mul(rows) > MAX_CENTERS_PER_RADIUS {
        return Err(Error::invalid(
            "grid_factor",
            spacing,
            format!("grid of {cols}x{rows} centers is too fine"),
        ));
    }
    Ok((0..rows)
        .flat_map(|r| (0..cols).map(move |c| (c, r)))
        .map(|(c, r)| (extent.min_x + c as f64 * spacing, extent.min_y + r as f64 * spacing))
        .collect())
}

/// Greedy acceptance in significance order
fn accept(mut significant: Vec<ClusterCandidate>, overlap_ratio: f64) -> Vec<ClusterCandidate> {
    sort_by_significance(&mut significant);
    let mut accepted: Vec<ClusterCandidate> = Vec::new();
    for c in significant {
        if accepted.iter().all(|a| a.overlap(&c) <= overlap_ratio) {
            accepted.push(c);
        }
    }
    accepted
}

/// Run a GAM scan.
///
/// Returns an empty result when the population sums to zero or there are no
/// cases. When `cancel` fires, circles evaluated so far still go through
/// acceptance and the result is flagged `cancelled`.
pub fn gam(data: &CaseData, params: &GamParams, cancel: &CancelFlag) -> Result<ClusterResult> {
    params.validate()?;
    let extent = data.extent().ok_or(Error::EmptyInput)?;
    let range = params.radius_range(&extent)?;

    let Some(rate) = data.case_rate() else {
        debug!("no cases or no population, nothing to scan");
        return Ok(ClusterResult::empty(density_surface(&[], &extent, &params.density)?));
    };

    let tree = data.tree();
    let mut significant = Vec::new();
    let mut evaluated = 0usize;
    let mut cancelled = false;

    for radius in range.radii() {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        let centers = grid_centers(&extent, params.grid_factor * radius)?;
        let circles: Vec<Option<ClusterCandidate>> = centers
            .into_par_iter()
            .map(|(x, y)| {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(data.circle(&tree, x, y, radius, rate, params.fitness))
            })
            .collect();

        cancelled |= circles.iter().any(Option::is_none);
        for c in circles.into_iter().flatten() {
            evaluated += 1;
            if c.observed > 0.0 && c.p_value < params.threshold {
                significant.push(c);
            }
        }
        debug!(radius, evaluated, significant = significant.len(), "GAM radius done");
        if cancelled {
            break;
        }
    }
    if cancelled {
        warn!(evaluated, "GAM scan cancelled, returning partial result");
    }

    let candidates = accept(significant, params.overlap_ratio);
    debug!(accepted = candidates.len(), "GAM scan");
    Ok(ClusterResult {
        density: density_surface(&candidates, &extent, &params.density)?,
        candidates,
        case_rate: rate,
        evaluated,
        cancelled,
    })
}
