//! Lee's L and S
//!
//! With standardized fields `zx`, `zy` (mean 0, Σz² = n) and spatial lags
//! `lx = V·zx`, `ly = V·zy`:
//!
//! ```text
//! L   = Σ_i lx_i · ly_i / Σ_i (Σ_j v_ij)²
//! S   = Σ_i lx_i²       / Σ_i (Σ_j v_ij)²      (L of a field with itself)
//! L_i = n · lx_i · ly_i / Σ_i (Σ_j v_ij)²
//! ```
//!
//! The global expectation is analytic,
//! `E[L] = r · (n·tr(VᵀV) - 1ᵀVᵀV1) / ((n - 1) · 1ᵀVᵀV1)` with `r` the
//! Pearson correlation (`r = 1` for S). Variances come from seeded random
//! permutations: joint relabelling for the global statistics, conditional
//! permutation (location `i` held fixed) for the local ones.
//!
//! Reference:
//! Lee, S.-I. (2001). Developing a bivariate spatial association measure:
//! an integration of Pearson's r and Moran's I. J. Geographical Systems, 3.

use serde::{Deserialize, Serialize};
use tracing::debug;

use geostat_core::{Error, Result};

use super::permutation::{summarize, Lcg};
use super::{
    check_attribute, AttributeVector, AutocorrelationResult, AutocorrelationStatistic, LocalResult,
    SignificanceLevel, StatisticInput,
};
use crate::maybe_rayon::*;
use crate::weights::NeighborWeights;

const NAME_L: &str = "Lee's L";
const NAME_S: &str = "Lee's S";

/// Permutation settings for Lee's statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeesParams {
    /// Number of random permutations (default: 999)
    pub permutations: usize,
    /// PRNG seed (default: 42)
    pub seed: u64,
}

impl Default for LeesParams {
    fn default() -> Self {
        Self {
            permutations: 999,
            seed: 42,
        }
    }
}

impl LeesParams {
    pub fn validate(&self) -> Result<()> {
        if self.permutations == 0 {
            return Err(Error::invalid("permutations", self.permutations, "must be > 0"));
        }
        Ok(())
    }
}

/// Bivariate Lee's L over (primary, secondary)
#[derive(Debug, Clone, Copy, Default)]
pub struct LeesL {
    pub params: LeesParams,
}

/// Univariate Lee's S over the primary field
#[derive(Debug, Clone, Copy, Default)]
pub struct LeesS {
    pub params: LeesParams,
}

impl AutocorrelationStatistic for LeesL {
    fn name(&self) -> &'static str {
        NAME_L
    }

    fn global(&self, input: StatisticInput<'_>, weights: &NeighborWeights) -> Result<AutocorrelationResult> {
        global_lees_l(input.primary, input.require_secondary()?, weights, &self.params)
    }

    fn local(
        &self,
        input: StatisticInput<'_>,
        weights: &NeighborWeights,
        level: SignificanceLevel,
    ) -> Result<Vec<LocalResult>> {
        local_lees_l(input.primary, input.require_secondary()?, weights, &self.params, level)
    }
}

impl AutocorrelationStatistic for LeesS {
    fn name(&self) -> &'static str {
        NAME_S
    }

    fn global(&self, input: StatisticInput<'_>, weights: &NeighborWeights) -> Result<AutocorrelationResult> {
        global_lees_s(input.primary, weights, &self.params)
    }

    fn local(
        &self,
        input: StatisticInput<'_>,
        weights: &NeighborWeights,
        level: SignificanceLevel,
    ) -> Result<Vec<LocalResult>> {
        local_lees_s(input.primary, weights, &self.params, level)
    }
}

/// Standardized fields plus the weight sums shared by every Lee computation
struct Prepared {
    zx: Vec<f64>,
    zy: Vec<f64>,
    /// Σ_i (Σ_j v_ij)²
    smoothing: f64,
}

fn prepare(
    statistic: &'static str,
    x: &AttributeVector,
    y: &AttributeVector,
    weights: &NeighborWeights,
    params: &LeesParams,
) -> Result<Prepared> {
    params.validate()?;
    check_attribute(statistic, x, weights, 3)?;
    check_attribute(statistic, y, weights, 3)?;

    let smoothing: f64 = weights.row_sums().iter().map(|s| s * s).sum();
    if smoothing <= 0.0 {
        return Err(Error::NumericalDegeneracy {
            statistic,
            reason: "no location has a neighbor".into(),
        });
    }
    // check_attribute guarantees a non-constant field
    let standardize = |a: &AttributeVector| a.standardized().unwrap_or_else(|| vec![0.0; a.len()]);
    Ok(Prepared {
        zx: standardize(x),
        zy: standardize(y),
        smoothing,
    })
}

fn lee_global_value(weights: &NeighborWeights, zx: &[f64], zy: &[f64], smoothing: f64) -> f64 {
    let lx = weights.lag(zx);
    let ly = weights.lag(zy);
    lx.iter().zip(&ly).map(|(a, b)| a * b).sum::<f64>() / smoothing
}

fn global_lee(
    statistic: &'static str,
    x: &AttributeVector,
    y: &AttributeVector,
    weights: &NeighborWeights,
    params: &LeesParams,
) -> Result<AutocorrelationResult> {
    let p = prepare(statistic, x, y, weights, params)?;
    let n = x.len();
    let nf = n as f64;

    let observed = lee_global_value(weights, &p.zx, &p.zy, p.smoothing);
    let r = p.zx.iter().zip(&p.zy).map(|(a, b)| a * b).sum::<f64>() / nf;
    let trace: f64 = weights.iter().map(|(_, _, w)| w * w).sum();
    let expected = r * (nf * trace - p.smoothing) / ((nf - 1.0) * p.smoothing);

    let permuted: Vec<f64> = (0..params.permutations)
        .into_par_iter()
        .map(|k| {
            let mut rng = Lcg::stream(params.seed, k as u64);
            let mut order: Vec<usize> = (0..n).collect();
            rng.shuffle(&mut order);
            let px: Vec<f64> = order.iter().map(|&o| p.zx[o]).collect();
            let py: Vec<f64> = order.iter().map(|&o| p.zy[o]).collect();
            lee_global_value(weights, &px, &py, p.smoothing)
        })
        .collect();
    let variance = summarize(observed, &permuted).variance;

    debug!(statistic, observed, expected, variance, r, "Lee's global statistic");
    Ok(AutocorrelationResult::from_moments(statistic, n, observed, expected, variance, weights))
}

/// Global Lee's L between two fields
pub fn global_lees_l(
    x: &AttributeVector,
    y: &AttributeVector,
    weights: &NeighborWeights,
    params: &LeesParams,
) -> Result<AutocorrelationResult> {
    global_lee(NAME_L, x, y, weights, params)
}

/// Global Lee's S of one field
pub fn global_lees_s(x: &AttributeVector, weights: &NeighborWeights, params: &LeesParams) -> Result<AutocorrelationResult> {
    global_lee(NAME_S, x, x, weights, params)
}

fn local_lee(
    statistic: &'static str,
    x: &AttributeVector,
    y: &AttributeVector,
    weights: &NeighborWeights,
    params: &LeesParams,
    level: SignificanceLevel,
) -> Result<Vec<LocalResult>> {
    let p = prepare(statistic, x, y, weights, params)?;
    let n = x.len();
    let nf = n as f64;
    let scale = nf / p.smoothing;

    let results = (0..n)
        .into_par_iter()
        .map(|i| {
            let self_weight = weights.weight(i, i);
            let others: Vec<(usize, f64)> = weights
                .neighbors(i)
                .iter()
                .filter(|nb| nb.index != i)
                .map(|nb| (nb.index, nb.weight))
                .collect();
            if others.is_empty() {
                return LocalResult::isolated();
            }

            let lag = |z: &[f64], pick: &dyn Fn(usize) -> usize| {
                self_weight * z[i] + others.iter().enumerate().map(|(t, &(_, w))| w * z[pick(t)]).sum::<f64>()
            };
            let lx = lag(&p.zx, &|t| others[t].0);
            let ly = lag(&p.zy, &|t| others[t].0);
            let index = scale * lx * ly;

            // Conditional permutation: neighbor slots drawn from the other n - 1 locations
            let mut rng = Lcg::stream(params.seed, i as u64);
            let mut pool: Vec<usize> = (0..n).filter(|&j| j != i).collect();
            let permuted: Vec<f64> = (0..params.permutations)
                .map(|_| {
                    rng.partial_shuffle(&mut pool, others.len());
                    scale * lag(&p.zx, &|t| pool[t]) * lag(&p.zy, &|t| pool[t])
                })
                .collect();

            let summary = summarize(index, &permuted);
            let z = if summary.variance > 0.0 {
                (index - summary.mean) / summary.variance.sqrt()
            } else {
                0.0
            };
            LocalResult::from_z(index, summary.mean, summary.variance, z, others.len(), (p.zx[i], ly), level)
        })
        .collect();

    Ok(results)
}

/// Local Lee's L_i between two fields
pub fn local_lees_l(
    x: &AttributeVector,
    y: &AttributeVector,
    weights: &NeighborWeights,
    params: &LeesParams,
    level: SignificanceLevel,
) -> Result<Vec<LocalResult>> {
    local_lee(NAME_L, x, y, weights, params, level)
}

/// Local Lee's S_i of one field
pub fn local_lees_s(
    x: &AttributeVector,
    weights: &NeighborWeights,
    params: &LeesParams,
    level: SignificanceLevel,
) -> Result<Vec<LocalResult>> {
    local_lee(NAME_S, x, x, weights, params, level)
}
