//! Getis-Ord statistics
//!
//! - **General G**: `G = Σ_{i≠j} w_ij x_i x_j / Σ_{i≠j} x_i x_j`, defined for
//!   strictly positive values only.
//! - **Local Gi / Gi\***: standardized local sums. A location whose weights
//!   row contains itself (self-neighbors) gets Gi\*; otherwise Gi, which
//!   excludes `x_i` from the reference mean and variance.
//!
//! Reference:
//! Getis, A. & Ord, J.K. (1992). The analysis of spatial association by use
//! of distance statistics. Geographical Analysis, 24(3).
//! Ord, J.K. & Getis, A. (1995). Local spatial autocorrelation statistics:
//! distributional issues and an application. Geographical Analysis, 27(4).

use tracing::debug;

use geostat_core::{Error, Result};

use super::{
    check_attribute, nonzero_s0, AttributeVector, AutocorrelationResult, AutocorrelationStatistic, LocalResult,
    SignificanceLevel, StatisticInput,
};
use crate::maybe_rayon::*;
use crate::weights::NeighborWeights;

const NAME: &str = "Getis-Ord General G";

#[derive(Debug, Clone, Copy, Default)]
pub struct GetisOrdG;

impl AutocorrelationStatistic for GetisOrdG {
    fn name(&self) -> &'static str {
        NAME
    }

    fn global(&self, input: StatisticInput<'_>, weights: &NeighborWeights) -> Result<AutocorrelationResult> {
        general_g(input.primary, weights)
    }

    fn local(
        &self,
        input: StatisticInput<'_>,
        weights: &NeighborWeights,
        level: SignificanceLevel,
    ) -> Result<Vec<LocalResult>> {
        local_getis_ord(input.primary, weights, level)
    }
}

fn check_positive(values: &AttributeVector) -> Result<()> {
    match values.values.iter().position(|&v| v <= 0.0) {
        Some(index) => Err(Error::NonPositiveValue {
            statistic: NAME,
            field: values.field.clone(),
            index,
            value: values.values[index],
        }),
        None => Ok(()),
    }
}

/// General G with the Getis & Ord (1992) randomization variance.
///
/// Every value must be strictly positive; the first violation is reported
/// before anything else is computed. Self entries in `weights` are ignored.
pub fn general_g(values: &AttributeVector, weights: &NeighborWeights) -> Result<AutocorrelationResult> {
    if values.len() == weights.len() {
        check_positive(values)?;
    }
    check_attribute(NAME, values, weights, 4)?;

    let w = weights.without_self();
    let s0 = nonzero_s0(NAME, &w)?;
    let x = &values.values;
    let n = x.len() as f64;

    let m1: f64 = x.iter().sum();
    let m2: f64 = x.iter().map(|v| v * v).sum();
    let m3: f64 = x.iter().map(|v| v.powi(3)).sum();
    let m4: f64 = x.iter().map(|v| v.powi(4)).sum();

    let numerator: f64 = w.iter().map(|(i, j, wij)| wij * x[i] * x[j]).sum();
    let denominator = m1 * m1 - m2;
    let observed = numerator / denominator;
    let expected = s0 / (n * (n - 1.0));

    let (s1, s2) = (w.s1(), w.s2());
    let s02 = s0 * s0;
    let b0 = (n * n - 3.0 * n + 3.0) * s1 - n * s2 + 3.0 * s02;
    let b1 = -((n * n - n) * s1 - 2.0 * n * s2 + 6.0 * s02);
    let b2 = -(2.0 * n * s1 - (n + 3.0) * s2 + 6.0 * s02);
    let b3 = 4.0 * (n - 1.0) * s1 - 2.0 * (n + 1.0) * s2 + 8.0 * s02;
    let b4 = s1 - s2 + s02;

    let eg2 = (b0 * m2 * m2 + b1 * m4 + b2 * m1 * m1 * m2 + b3 * m1 * m3 + b4 * m1.powi(4))
        / (denominator * denominator * n * (n - 1.0) * (n - 2.0) * (n - 3.0));
    let variance = eg2 - expected * expected;

    if !(variance.is_finite() && variance > 0.0) {
        return Err(Error::NumericalDegeneracy {
            statistic: NAME,
            reason: format!("non-positive variance {variance}"),
        });
    }

    debug!(g = observed, expected, variance, "General G");
    Ok(AutocorrelationResult::from_moments(NAME, values.len(), observed, expected, variance, weights))
}

/// Local Gi / Gi\* z-scores.
///
/// `index` is the local ratio `Σ_j w_ij x_j / Σ_j x_j`. Significant
/// positive z-scores are typed HighHigh (hot spot), negative ones LowLow
/// (cold spot).
pub fn local_getis_ord(
    values: &AttributeVector,
    weights: &NeighborWeights,
    level: SignificanceLevel,
) -> Result<Vec<LocalResult>> {
    check_attribute(NAME, values, weights, 3)?;

    let x = &values.values;
    let n = x.len();
    let nf = n as f64;
    let total: f64 = x.iter().sum();
    let total_sq: f64 = x.iter().map(|v| v * v).sum();

    let results = (0..n)
        .into_par_iter()
        .map(|i| {
            let star = weights.has_self(i);
            let (mut wi, mut s1i, mut local_sum, mut count) = (0.0, 0.0, 0.0, 0usize);
            for nb in weights.neighbors(i) {
                wi += nb.weight;
                s1i += nb.weight * nb.weight;
                local_sum += nb.weight * x[nb.index];
                if nb.index != i {
                    count += 1;
                }
            }
            if count == 0 {
                return LocalResult::isolated();
            }

            // Reference population: all n values for Gi*, the other n - 1 for Gi
            let (m, sum, sum_sq) = if star {
                (nf, total, total_sq)
            } else {
                (nf - 1.0, total - x[i], total_sq - x[i] * x[i])
            };
            let mean = sum / m;
            let sd = (sum_sq / m - mean * mean).max(0.0).sqrt();
            let spread = ((m * s1i - wi * wi) / (m - 1.0)).max(0.0).sqrt();

            let z = if sd > 0.0 && spread > 0.0 {
                (local_sum - mean * wi) / (sd * spread)
            } else {
                0.0
            };
            let index = if sum != 0.0 { local_sum / sum } else { 0.0 };
            let expected = wi / m;
            let variance = if mean != 0.0 {
                (m * s1i - wi * wi) / (m * m * (m - 1.0)) * (sd * sd) / (mean * mean)
            } else {
                0.0
            };
            LocalResult::from_z(index, expected, variance, z, count, (z, z), level)
        })
        .collect();

    Ok(results)
}
