//! Geary's C
//!
//! Global: `C = (n - 1) · Σ w_ij (x_i - x_j)² / (2 · S0 · Σ z_i²)`, expected 1,
//! randomization variance. Values below 1 indicate positive spatial
//! autocorrelation.
//!
//! Local (Anselin 2019): `c_i = Σ_j w_ij (z_i - z_j)² / m2`, tested with the
//! exact conditional-randomization moments: holding `z_i` fixed, the
//! neighbor values are a sample without replacement from the other `n - 1`
//! locations.
//!
//! Reference:
//! Geary, R.C. (1954). The contiguity ratio and statistical mapping.
//! The Incorporated Statistician, 5(3).

use tracing::debug;

use geostat_core::{Error, Result};

use super::{
    check_attribute, nonzero_s0, AttributeVector, AutocorrelationResult, AutocorrelationStatistic, LocalResult,
    SignificanceLevel, StatisticInput,
};
use crate::maybe_rayon::*;
use crate::weights::NeighborWeights;

const NAME: &str = "Geary's C";

#[derive(Debug, Clone, Copy, Default)]
pub struct GearysC;

impl AutocorrelationStatistic for GearysC {
    fn name(&self) -> &'static str {
        NAME
    }

    fn global(&self, input: StatisticInput<'_>, weights: &NeighborWeights) -> Result<AutocorrelationResult> {
        global_gearys_c(input.primary, weights)
    }

    fn local(
        &self,
        input: StatisticInput<'_>,
        weights: &NeighborWeights,
        level: SignificanceLevel,
    ) -> Result<Vec<LocalResult>> {
        local_gearys_c(input.primary, weights, level)
    }
}

pub fn global_gearys_c(values: &AttributeVector, weights: &NeighborWeights) -> Result<AutocorrelationResult> {
    check_attribute(NAME, values, weights, 4)?;
    let s0 = nonzero_s0(NAME, weights)?;

    let x = &values.values;
    let n = x.len() as f64;
    let z = values.deviations();
    let m2: f64 = z.iter().map(|v| v * v).sum();
    let m4: f64 = z.iter().map(|v| v.powi(4)).sum();

    let squared_diffs: f64 = weights
        .iter()
        .map(|(i, j, w)| w * (x[i] - x[j]) * (x[i] - x[j]))
        .sum();
    let observed = (n - 1.0) * squared_diffs / (2.0 * s0 * m2);

    let (s1, s2) = (weights.s1(), weights.s2());
    let k = n * m4 / (m2 * m2);
    let a = (n - 1.0) * s1 * (n * n - 3.0 * n + 3.0 - (n - 1.0) * k);
    let b = 0.25 * (n - 1.0) * s2 * (n * n + 3.0 * n - 6.0 - (n * n - n + 2.0) * k);
    let c = s0 * s0 * (n * n - 3.0 - (n - 1.0) * (n - 1.0) * k);
    let variance = (a - b + c) / (n * (n - 2.0) * (n - 3.0) * s0 * s0);

    if !(variance.is_finite() && variance > 0.0) {
        return Err(Error::NumericalDegeneracy {
            statistic: NAME,
            reason: format!("non-positive variance {variance}"),
        });
    }

    debug!(c = observed, variance, "global Geary's C");
    Ok(AutocorrelationResult::from_moments(NAME, values.len(), observed, 1.0, variance, weights))
}

/// Local Geary's c.
///
/// Significant locations with `c_i` below expectation are typed by the
/// Moran quadrant of (`z_i`, lag); those above expectation are outliers
/// (HighLow / LowHigh by the sign of `z_i`).
pub fn local_gearys_c(
    values: &AttributeVector,
    weights: &NeighborWeights,
    level: SignificanceLevel,
) -> Result<Vec<LocalResult>> {
    check_attribute(NAME, values, weights, 3)?;

    let n = values.len();
    let z = values.deviations();
    let m2 = z.iter().map(|v| v * v).sum::<f64>() / n as f64;
    let pop = (n - 1) as f64;

    let results = (0..n)
        .into_par_iter()
        .map(|i| {
            let (mut wi, mut wi2, mut lag, mut c, mut count) = (0.0, 0.0, 0.0, 0.0, 0usize);
            for nb in weights.neighbors(i).iter().filter(|nb| nb.index != i) {
                let d = z[i] - z[nb.index];
                wi += nb.weight;
                wi2 += nb.weight * nb.weight;
                lag += nb.weight * z[nb.index];
                c += nb.weight * d * d;
                count += 1;
            }
            if count == 0 {
                return LocalResult::isolated();
            }

            // Moments of y_j = (z_i - z_j)² over the n - 1 other locations
            let (mut sum_y, mut sum_y2) = (0.0, 0.0);
            for (j, zj) in z.iter().enumerate() {
                if j != i {
                    let y = (z[i] - zj) * (z[i] - zj);
                    sum_y += y;
                    sum_y2 += y * y;
                }
            }
            let mu = sum_y / pop;
            let sigma2 = (sum_y2 / pop - mu * mu).max(0.0);

            let index = c / m2;
            let expected = wi * mu / m2;
            let variance = sigma2 * (wi2 - (wi * wi - wi2) / (pop - 1.0)) / (m2 * m2);
            let quadrant = if index < expected { (z[i], lag) } else { (z[i], -z[i]) };
            LocalResult::from_moments(index, expected, variance, count, quadrant, level)
        })
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::test_support::{checkerboard, queen};
    use crate::statistics::ClusterType;
    use crate::weights::{SpatialConcept, StandardizationMethod};
    use approx::assert_relative_eq;

    #[test]
    fn test_checkerboard_reference_values() {
        let w = queen(3, StandardizationMethod::None);
        let x = AttributeVector::new("x", checkerboard(3));
        let r = global_gearys_c(&x, &w).unwrap();
        assert_relative_eq!(r.observed, 1.08, epsilon = 1e-9);
        assert_eq!(r.expected, 1.0);
        assert_relative_eq!(r.variance, 0.01571428571428572, epsilon = 1e-9);
        assert_relative_eq!(r.z_score, 0.638179228173973, epsilon = 1e-6);
    }

    #[test]
    fn test_gradient_is_positively_autocorrelated() {
        let w = queen(5, StandardizationMethod::Row);
        let x = AttributeVector::new("row", (0..25).map(|i| (i / 5) as f64).collect());
        let r = global_gearys_c(&x, &w).unwrap();
        assert_relative_eq!(r.observed, 0.17104, epsilon = 1e-9);
        assert!(r.z_score < -2.58);
        assert!(r.p_value < 0.01);
    }

    #[test]
    fn test_constant_field_is_rejected() {
        let w = queen(3, StandardizationMethod::Row);
        let x = AttributeVector::new("flat", vec![1.0; 9]);
        assert!(matches!(global_gearys_c(&x, &w), Err(Error::ZeroVariance { .. })));
    }

    #[test]
    fn test_local_moments() {
        let w = queen(5, StandardizationMethod::Row);
        let values: Vec<f64> = (0..25)
            .map(|i| if i % 5 < 2 && i / 5 < 2 { 10.0 } else { 1.0 })
            .collect();
        let x = AttributeVector::new("x", values);
        let local = local_gearys_c(&x, &w, SignificanceLevel::NinetyFive).unwrap();

        // Corner of the high block: identical neighbors
        assert_eq!(local[0].index, 0.0);
        assert_relative_eq!(local[0].expected, 6.510416666666665, epsilon = 1e-9);
        assert_relative_eq!(local[0].variance, 1.8428489205917866, epsilon = 1e-9);
        assert_relative_eq!(local[0].z_score, -4.79583152331272, epsilon = 1e-6);
        assert_eq!(local[0].cluster, ClusterType::HighHigh);

        assert_relative_eq!(local[6].index, 4.650297619047619, epsilon = 1e-9);
        assert_eq!(local[24].cluster, ClusterType::NotSignificant);
    }

    #[test]
    fn test_local_isolated() {
        let w = NeighborWeights::from_rows(
            vec![vec![(1, 1.0)], vec![(0, 1.0)], vec![(3, 1.0)], vec![(2, 1.0)], vec![]],
            SpatialConcept::FixedDistanceBand,
            Some(1.0),
        );
        let x = AttributeVector::new("x", vec![1.0, 3.0, 2.0, 7.0, 4.0]);
        let local = local_gearys_c(&x, &w, SignificanceLevel::NinetyFive).unwrap();
        assert_eq!(local[4].num_neighbors, 0);
        assert_eq!(local[4].p_value, 1.0);
    }
}
