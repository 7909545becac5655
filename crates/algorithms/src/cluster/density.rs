//! Density surface of accepted cluster circles

use serde::{Deserialize, Serialize};

use geostat_core::{Error, Extent, Raster, Result};

use super::ClusterCandidate;
use crate::maybe_rayon::*;

/// Parameters for the density raster
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityParams {
    /// Cell size in map units (default: `min(width, height) / 250` of the extent)
    pub cell_size: Option<f64>,
}

impl DensityParams {
    pub fn validate(&self) -> Result<()> {
        match self.cell_size {
            Some(c) if !(c.is_finite() && c > 0.0) => Err(Error::invalid("cell_size", c, "must be > 0")),
            _ => Ok(()),
        }
    }
}

/// Number of circles covering each cell center.
///
/// Returns `None` when the extent has no size (all locations coincide) and
/// no explicit cell size was given.
pub fn density_surface(
    candidates: &[ClusterCandidate],
    extent: &Extent,
    params: &DensityParams,
) -> Result<Option<Raster<f64>>> {
    params.validate()?;
    let cell_size = params.cell_size.unwrap_or_else(|| extent.default_cell_size());
    if cell_size <= 0.0 {
        return Ok(None);
    }

    let mut raster = Raster::<f64>::covering(extent, cell_size)?;
    let (rows, cols) = raster.shape();
    let transform = *raster.transform();

    let counts: Vec<f64> = (0..rows * cols)
        .into_par_iter()
        .map(|idx| {
            let (x, y) = transform.pixel_to_geo(idx % cols, idx / cols);
            candidates.iter().filter(|c| c.contains(x, y)).count() as f64
        })
        .collect();
    for (cell, count) in raster.data_mut().iter_mut().zip(counts) {
        *cell = count;
    }
    Ok(Some(raster))
}
