//! Moran's I
//!
//! Global: `I = (n / S0) · Σ w_ij z_i z_j / Σ z_i²` with `z = x - mean(x)`,
//! tested under the randomization assumption (kurtosis-corrected variance).
//!
//! Local (Anselin 1995): `I_i = (z_i / m2) · Σ_j w_ij z_j`, `m2 = Σ z² / n`.
//!
//! Reference:
//! Cliff, A.D. & Ord, J.K. (1981). Spatial Processes. Pion.
//! Anselin, L. (1995). Local indicators of spatial association: LISA.
//! Geographical Analysis, 27(2).

use tracing::debug;

use geostat_core::{Error, Result};

use super::{
    check_attribute, nonzero_s0, AttributeVector, AutocorrelationResult, AutocorrelationStatistic, LocalResult,
    SignificanceLevel, StatisticInput,
};
use crate::maybe_rayon::*;
use crate::weights::NeighborWeights;

const NAME: &str = "Moran's I";

/// Moran's I strategy for [`AutocorrelationStatistic`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MoransI;

impl AutocorrelationStatistic for MoransI {
    fn name(&self) -> &'static str {
        NAME
    }

    fn global(&self, input: StatisticInput<'_>, weights: &NeighborWeights) -> Result<AutocorrelationResult> {
        global_morans_i(input.primary, weights)
    }

    fn local(
        &self,
        input: StatisticInput<'_>,
        weights: &NeighborWeights,
        level: SignificanceLevel,
    ) -> Result<Vec<LocalResult>> {
        local_morans_i(input.primary, weights, level)
    }
}

/// Global Moran's I with the randomization variance.
///
/// Requires n >= 4 and a non-constant field.
pub fn global_morans_i(values: &AttributeVector, weights: &NeighborWeights) -> Result<AutocorrelationResult> {
    check_attribute(NAME, values, weights, 4)?;
    let s0 = nonzero_s0(NAME, weights)?;

    let n = values.len() as f64;
    let z = values.deviations();
    let lag = weights.lag(&z);
    let cross: f64 = z.iter().zip(&lag).map(|(a, b)| a * b).sum();
    let m2: f64 = z.iter().map(|v| v * v).sum();
    let m4: f64 = z.iter().map(|v| v.powi(4)).sum();

    let observed = (n / s0) * (cross / m2);
    let expected = -1.0 / (n - 1.0);

    let (s1, s2) = (weights.s1(), weights.s2());
    let b2 = n * m4 / (m2 * m2);
    let a = n * ((n * n - 3.0 * n + 3.0) * s1 - n * s2 + 3.0 * s0 * s0);
    let b = b2 * ((n * n - n) * s1 - 2.0 * n * s2 + 6.0 * s0 * s0);
    let c = (n - 1.0) * (n - 2.0) * (n - 3.0) * s0 * s0;
    let variance = (a - b) / c - expected * expected;

    if !(variance.is_finite() && variance > 0.0) {
        return Err(Error::NumericalDegeneracy {
            statistic: NAME,
            reason: format!("non-positive variance {variance}"),
        });
    }

    debug!(i = observed, expected, variance, s0, s1, s2, "global Moran's I");
    Ok(AutocorrelationResult::from_moments(NAME, values.len(), observed, expected, variance, weights))
}

/// Local Moran's I with Anselin's randomization moments.
///
/// Self entries are ignored; locations without neighbors get
/// [`LocalResult::isolated`].
pub fn local_morans_i(
    values: &AttributeVector,
    weights: &NeighborWeights,
    level: SignificanceLevel,
) -> Result<Vec<LocalResult>> {
    check_attribute(NAME, values, weights, 3)?;

    let n = values.len();
    let nf = n as f64;
    let z = values.deviations();
    let m2 = z.iter().map(|v| v * v).sum::<f64>() / nf;
    let m4 = z.iter().map(|v| v.powi(4)).sum::<f64>() / nf;
    let b2 = m4 / (m2 * m2);

    let results = (0..n)
        .into_par_iter()
        .map(|i| {
            let (mut wi, mut wi2, mut lag, mut count) = (0.0, 0.0, 0.0, 0usize);
            for nb in weights.neighbors(i).iter().filter(|nb| nb.index != i) {
                wi += nb.weight;
                wi2 += nb.weight * nb.weight;
                lag += nb.weight * z[nb.index];
                count += 1;
            }
            if count == 0 {
                return LocalResult::isolated();
            }

            let index = z[i] / m2 * lag;
            let expected = -wi / (nf - 1.0);
            let variance = wi2 * (nf - b2) / (nf - 1.0)
                + (wi * wi - wi2) * (2.0 * b2 - nf) / ((nf - 1.0) * (nf - 2.0))
                - expected * expected;
            LocalResult::from_moments(index, expected, variance, count, (z[i], lag), level)
        })
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::test_support::{checkerboard, queen};
    use crate::statistics::ClusterType;
    use crate::weights::StandardizationMethod;
    use approx::assert_relative_eq;

    #[test]
    fn test_checkerboard_reference_values() {
        let w = queen(3, StandardizationMethod::None);
        let x = AttributeVector::new("x", checkerboard(3));
        let r = global_morans_i(&x, &w).unwrap();
        assert_relative_eq!(r.observed, -0.19, epsilon = 1e-9);
        assert_relative_eq!(r.expected, -0.125, epsilon = 1e-12);
        assert_relative_eq!(r.variance, 0.018660714285714287, epsilon = 1e-9);
        assert_relative_eq!(r.z_score, -0.47582715691056154, epsilon = 1e-6);
        assert_eq!(r.n, 9);
    }

    #[test]
    fn test_constant_field_is_rejected() {
        let w = queen(3, StandardizationMethod::Row);
        let x = AttributeVector::new("flat", vec![2.0; 9]);
        let err = global_morans_i(&x, &w).unwrap_err();
        assert_eq!(
            err,
            Error::ZeroVariance {
                statistic: NAME,
                field: "flat".into()
            }
        );
        assert!(local_morans_i(&x, &w, SignificanceLevel::NinetyFive).is_err());
    }

    #[test]
    fn test_too_few_locations() {
        let w = NeighborWeights::from_rows(
            vec![vec![(1, 1.0)], vec![(0, 1.0), (2, 1.0)], vec![(1, 1.0)]],
            crate::weights::SpatialConcept::FixedDistanceBand,
            Some(1.0),
        );
        let x = AttributeVector::new("x", vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            global_morans_i(&x, &w),
            Err(Error::InsufficientData { required: 4, found: 3, .. })
        ));
    }

    #[test]
    fn test_local_sums_to_global() {
        let w = queen(4, StandardizationMethod::Row);
        let x = AttributeVector::new("x", (0..16).map(|i| ((i * 7) % 5) as f64).collect());
        let global = global_morans_i(&x, &w).unwrap();
        let local = local_morans_i(&x, &w, SignificanceLevel::NinetyFive).unwrap();
        let sum: f64 = local.iter().map(|r| r.index).sum();
        assert_relative_eq!(sum, global.observed * w.s0(), epsilon = 1e-9);
    }

    #[test]
    fn test_local_hot_spot_classification() {
        // High block in one corner of a 5x5 lattice
        let w = queen(5, StandardizationMethod::Row);
        let values: Vec<f64> = (0..25)
            .map(|i| if i % 5 < 2 && i / 5 < 2 { 10.0 } else { 1.0 })
            .collect();
        let x = AttributeVector::new("x", values);
        let local = local_morans_i(&x, &w, SignificanceLevel::Ninety).unwrap();
        assert_eq!(local[0].cluster, ClusterType::HighHigh);
        assert!(local[0].z_score > 1.65);
        assert_eq!(local[0].num_neighbors, 3);
        assert_eq!(local[24].cluster, ClusterType::NotSignificant);
    }

    #[test]
    fn test_isolated_location() {
        let w = NeighborWeights::from_rows(
            vec![
                vec![(1, 1.0)],
                vec![(0, 1.0), (2, 1.0)],
                vec![(1, 1.0), (3, 1.0)],
                vec![(2, 1.0)],
                vec![],
            ],
            crate::weights::SpatialConcept::FixedDistanceBand,
            Some(1.0),
        );
        let x = AttributeVector::new("x", vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let local = local_morans_i(&x, &w, SignificanceLevel::NinetyFive).unwrap();
        assert_eq!(local[4], LocalResult::isolated());
        assert!(local.iter().all(|r| r.z_score.is_finite()));
    }
}
