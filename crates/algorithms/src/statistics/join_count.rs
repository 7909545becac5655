//! Join count statistics for a binary (black/white) attribute
//!
//! Non-zero values are black (B), zero values white (W). Joins are the
//! undirected neighbor pairs of the weights structure, taken as binary
//! (any positive `w_ij` or `w_ji` is one join). Moments follow Cliff & Ord
//! under non-free sampling (labels permuted with fixed black/white counts):
//!
//! ```text
//! E[BB] = J · n1(n1-1) / (n(n-1))
//! E[BW] = 2J · n1·n0 / (n(n-1))
//! Var[BB] = ¼ [S1·n1⁽²⁾/n⁽²⁾ + (S2 - 2S1)·n1⁽³⁾/n⁽³⁾ + (S0² + S1 - S2)·n1⁽⁴⁾/n⁽⁴⁾] - E[BB]²
//! Var[BW] = ¼ [2S1·n1·n0/n⁽²⁾ + (S2 - 2S1)·n1·n0·(n - 2)/n⁽³⁾
//!              + 4(S0² + S1 - S2)·n1⁽²⁾·n0⁽²⁾/n⁽⁴⁾] - E[BW]²
//! ```
//!
//! with `a⁽ᵏ⁾` the falling factorial. WW mirrors BB with `n0`.
//!
//! The local join count (Anselin & Li 2019) counts black neighbors of each
//! black location; its p-value is the exact hypergeometric tail.

use serde::Serialize;
use tracing::debug;

use geostat_core::{Error, Result};

use super::distribution::{hypergeometric_sf, two_tailed_p};
use super::{
    check_attribute, AttributeVector, AutocorrelationResult, AutocorrelationStatistic, ClusterType, ConfidenceBin,
    LocalResult, SignificanceLevel, StatisticInput, WeightsEcho,
};
use crate::maybe_rayon::*;
use crate::weights::NeighborWeights;

const NAME: &str = "Join Count";

#[derive(Debug, Clone, Copy, Default)]
pub struct JoinCount;

impl AutocorrelationStatistic for JoinCount {
    fn name(&self) -> &'static str {
        NAME
    }

    /// The BW join, the usual single-number summary
    fn global(&self, input: StatisticInput<'_>, weights: &NeighborWeights) -> Result<AutocorrelationResult> {
        let jc = join_count(input.primary, weights)?;
        if jc.bw.variance <= 0.0 {
            return Err(Error::NumericalDegeneracy {
                statistic: NAME,
                reason: "BW join count has zero variance".into(),
            });
        }
        Ok(AutocorrelationResult::from_moments(
            NAME,
            jc.n,
            jc.bw.observed,
            jc.bw.expected,
            jc.bw.variance,
            weights,
        ))
    }

    fn local(
        &self,
        input: StatisticInput<'_>,
        weights: &NeighborWeights,
        level: SignificanceLevel,
    ) -> Result<Vec<LocalResult>> {
        local_join_count(input.primary, weights, level)
    }
}

/// Observed count and null moments of one join type
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JoinStatistic {
    pub observed: f64,
    pub expected: f64,
    pub variance: f64,
    pub std_dev: f64,
    /// Zero when the variance is zero
    pub z_score: f64,
    pub p_value: f64,
}

impl JoinStatistic {
    fn new(observed: f64, expected: f64, variance: f64) -> Self {
        let variance = variance.max(0.0);
        let std_dev = variance.sqrt();
        let z_score = if std_dev > 0.0 { (observed - expected) / std_dev } else { 0.0 };
        Self {
            observed,
            expected,
            variance,
            std_dev,
            z_score,
            p_value: two_tailed_p(z_score),
        }
    }
}

/// BB / WW / BW join counts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinCountResult {
    pub n: usize,
    pub black: usize,
    pub white: usize,
    /// Number of undirected joins J
    pub joins: usize,
    pub bb: JoinStatistic,
    pub ww: JoinStatistic,
    pub bw: JoinStatistic,
    pub weights: WeightsEcho,
}

/// Symmetric binary adjacency lists (sorted, no self joins)
fn binary_adjacency(weights: &NeighborWeights) -> Vec<Vec<usize>> {
    let mut adj = vec![Vec::new(); weights.len()];
    for (i, j, _) in weights.iter().filter(|&(i, j, _)| i != j) {
        adj[i].push(j);
        adj[j].push(i);
    }
    for row in &mut adj {
        row.sort_unstable();
        row.dedup();
    }
    adj
}

fn falling(a: f64, k: usize) -> f64 {
    (0..k).map(|t| a - t as f64).product()
}

pub fn join_count(values: &AttributeVector, weights: &NeighborWeights) -> Result<JoinCountResult> {
    check_attribute(NAME, values, weights, 4)?;

    let black: Vec<bool> = values.values.iter().map(|&v| v != 0.0).collect();
    let adj = binary_adjacency(weights);

    let (mut bb, mut ww, mut bw, mut joins) = (0usize, 0usize, 0usize, 0usize);
    for (i, row) in adj.iter().enumerate() {
        for &j in row.iter().filter(|&&j| j > i) {
            joins += 1;
            match (black[i], black[j]) {
                (true, true) => bb += 1,
                (false, false) => ww += 1,
                _ => bw += 1,
            }
        }
    }
    if joins == 0 {
        return Err(Error::NumericalDegeneracy {
            statistic: NAME,
            reason: "no joins between locations".into(),
        });
    }

    let n = values.len();
    let n1 = black.iter().filter(|&&b| b).count();
    let n0 = n - n1;
    let (nf, b, w, j) = (n as f64, n1 as f64, n0 as f64, joins as f64);

    let s0 = 2.0 * j;
    let s1 = 4.0 * j;
    let s2: f64 = adj.iter().map(|row| (2.0 * row.len() as f64).powi(2)).sum();
    let tail = s0 * s0 + s1 - s2;

    let same = |k: f64| {
        let e = j * k * (k - 1.0) / (nf * (nf - 1.0));
        let v = 0.25
            * (s1 * falling(k, 2) / falling(nf, 2)
                + (s2 - 2.0 * s1) * falling(k, 3) / falling(nf, 3)
                + tail * falling(k, 4) / falling(nf, 4))
            - e * e;
        (e, v)
    };
    let (e_bb, v_bb) = same(b);
    let (e_ww, v_ww) = same(w);
    let e_bw = 2.0 * j * b * w / (nf * (nf - 1.0));
    let v_bw = 0.25
        * (2.0 * s1 * b * w / falling(nf, 2)
            + (s2 - 2.0 * s1) * b * w * (nf - 2.0) / falling(nf, 3)
            + 4.0 * tail * falling(b, 2) * falling(w, 2) / falling(nf, 4))
        - e_bw * e_bw;

    debug!(n, black = n1, joins, bb, ww, bw, "join counts");
    Ok(JoinCountResult {
        n,
        black: n1,
        white: n0,
        joins,
        bb: JoinStatistic::new(bb as f64, e_bb, v_bb),
        ww: JoinStatistic::new(ww as f64, e_ww, v_ww),
        bw: JoinStatistic::new(bw as f64, e_bw, v_bw),
        weights: WeightsEcho::from(weights),
    })
}

/// Local join count: black neighbors of each black location.
///
/// White locations are reported with index 0 and p = 1. The p-value is
/// `P(X >= BB_i)` for `X` hypergeometric: `k_i` neighbors drawn from the
/// other `n - 1` locations, `n1 - 1` of which are black.
pub fn local_join_count(
    values: &AttributeVector,
    weights: &NeighborWeights,
    level: SignificanceLevel,
) -> Result<Vec<LocalResult>> {
    check_attribute(NAME, values, weights, 3)?;

    let black: Vec<bool> = values.values.iter().map(|&v| v != 0.0).collect();
    let adj = binary_adjacency(weights);
    let n = black.len() as u64;
    let n1 = black.iter().filter(|&&b| b).count() as u64;

    let results = (0..black.len())
        .into_par_iter()
        .map(|i| {
            let k = adj[i].len() as u64;
            if k == 0 {
                return LocalResult::isolated();
            }
            if !black[i] {
                return LocalResult {
                    num_neighbors: k as usize,
                    ..LocalResult::isolated()
                };
            }

            let count = adj[i].iter().filter(|&&j| black[j]).count() as u64;
            let (pop, marked) = ((n - 1) as f64, (n1 - 1) as f64);
            let kf = k as f64;
            let expected = kf * marked / pop;
            let variance = if pop > 1.0 {
                kf * (marked / pop) * ((pop - marked) / pop) * ((pop - kf) / (pop - 1.0))
            } else {
                0.0
            };
            let z_score = if variance > 0.0 {
                (count as f64 - expected) / variance.sqrt()
            } else {
                0.0
            };
            let p_value = hypergeometric_sf(count, n - 1, n1 - 1, k);
            let significant = count > 0 && p_value < level.alpha();

            LocalResult {
                index: count as f64,
                expected,
                variance,
                z_score,
                p_value,
                num_neighbors: k as usize,
                bin: ConfidenceBin::from_z(z_score),
                cluster: if significant { ClusterType::HighHigh } else { ClusterType::NotSignificant },
            }
        })
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::test_support::{checkerboard, queen};
    use crate::weights::{SpatialConcept, StandardizationMethod};
    use approx::assert_relative_eq;

    fn complete_graph(n: usize) -> NeighborWeights {
        let rows = (0..n).map(|i| (0..n).filter(|&j| j != i).map(|j| (j, 1.0)).collect()).collect();
        NeighborWeights::from_rows(rows, SpatialConcept::FixedDistanceBand, None)
    }

    fn path_graph(n: usize) -> NeighborWeights {
        let rows = (0..n)
            .map(|i| {
                let mut row = Vec::new();
                if i > 0 {
                    row.push((i - 1, 1.0));
                }
                if i + 1 < n {
                    row.push((i + 1, 1.0));
                }
                row
            })
            .collect();
        NeighborWeights::from_rows(rows, SpatialConcept::FixedDistanceBand, None)
    }

    /// Mean and population variance of each join count over every labelling
    /// with `n1` black locations.
    fn enumerate(weights: &NeighborWeights, n1: usize) -> [(f64, f64); 3] {
        let n = weights.len();
        let mut samples: [Vec<f64>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for mask in 0u32..(1 << n) {
            if mask.count_ones() as usize != n1 {
                continue;
            }
            let values = (0..n).map(|i| f64::from((mask >> i) & 1)).collect();
            let jc = join_count(&AttributeVector::new("b", values), weights).unwrap();
            samples[0].push(jc.bb.observed);
            samples[1].push(jc.ww.observed);
            samples[2].push(jc.bw.observed);
        }
        samples.map(|s| {
            let m = s.iter().sum::<f64>() / s.len() as f64;
            let v = s.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / s.len() as f64;
            (m, v)
        })
    }

    fn assert_moments_match(weights: &NeighborWeights, n1: usize) {
        let n = weights.len();
        let values = (0..n).map(|i| if i < n1 { 1.0 } else { 0.0 }).collect();
        let jc = join_count(&AttributeVector::new("b", values), weights).unwrap();
        let [bb, ww, bw] = enumerate(weights, n1);
        for (stat, (mean, var)) in [(jc.bb, bb), (jc.ww, ww), (jc.bw, bw)] {
            assert_relative_eq!(stat.expected, mean, epsilon = 1e-9);
            assert_relative_eq!(stat.variance, var, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_complete_graph_expectations() {
        for n in 4..=6 {
            for n1 in 1..n {
                let w = complete_graph(n);
                let values = (0..n).map(|i| if i < n1 { 1.0 } else { 0.0 }).collect();
                let jc = join_count(&AttributeVector::new("b", values), &w).unwrap();
                let (b, wh) = (n1 as f64, (n - n1) as f64);
                assert_eq!(jc.joins, n * (n - 1) / 2);
                assert_relative_eq!(jc.bb.expected, b * (b - 1.0) / 2.0, epsilon = 1e-9);
                assert_relative_eq!(jc.ww.expected, wh * (wh - 1.0) / 2.0, epsilon = 1e-9);
                assert_relative_eq!(jc.bw.expected, b * wh, epsilon = 1e-9);
                // Every labelling has the same counts on a complete graph
                assert!(jc.bb.variance.abs() < 1e-9 && jc.bw.variance.abs() < 1e-9);
                assert_eq!(jc.bw.observed, b * wh);
            }
        }
    }

    #[test]
    fn test_moments_match_enumeration() {
        for n in 4..=6 {
            for n1 in 1..n {
                assert_moments_match(&path_graph(n), n1);
            }
        }
        assert_moments_match(&queen(2, StandardizationMethod::None), 2);
    }

    #[test]
    fn test_checkerboard_has_only_bw_rook_joins() {
        // Rook adjacency on a checkerboard: every join is black-white
        let w = crate::weights::build_weights(
            &crate::statistics::test_support::lattice(3),
            &crate::weights::WeightsConfig::distance_band(1.0),
        )
        .unwrap();
        let jc = join_count(&AttributeVector::new("b", checkerboard(3)), &w).unwrap();
        assert_eq!(jc.joins, 12);
        assert_eq!(jc.bb.observed, 0.0);
        assert_eq!(jc.bw.observed, 12.0);
        assert!(jc.bw.z_score > 0.0);

        let global = JoinCount.global(StatisticInput::univariate(&AttributeVector::new("b", checkerboard(3))), &w);
        assert_eq!(global.unwrap().observed, 12.0);
    }

    #[test]
    fn test_row_standardized_weights_count_joins_once() {
        let raw = queen(3, StandardizationMethod::None);
        let row = queen(3, StandardizationMethod::Row);
        let x = AttributeVector::new("b", checkerboard(3));
        assert_eq!(join_count(&x, &raw).unwrap(), {
            let mut r = join_count(&x, &row).unwrap();
            r.weights = WeightsEcho::from(&raw);
            r
        });
    }

    #[test]
    fn test_single_color_is_rejected() {
        let w = queen(3, StandardizationMethod::None);
        let err = join_count(&AttributeVector::new("b", vec![1.0; 9]), &w).unwrap_err();
        assert!(matches!(err, Error::ZeroVariance { .. }));
    }

    #[test]
    fn test_local_join_count() {
        // Black block in one corner of a 5x5 queen lattice
        let w = queen(5, StandardizationMethod::None);
        let values: Vec<f64> = (0..25)
            .map(|i| if i % 5 < 2 && i / 5 < 2 { 1.0 } else { 0.0 })
            .collect();
        let local = local_join_count(&AttributeVector::new("b", values), &w, SignificanceLevel::NinetyFive).unwrap();

        // Corner: 3 neighbors, all black; P = C(3,3)/C(24,3)
        assert_eq!(local[0].index, 3.0);
        assert_relative_eq!(local[0].p_value, 1.0 / 2024.0, epsilon = 1e-12);
        assert_eq!(local[0].cluster, ClusterType::HighHigh);

        // White location
        assert_eq!(local[24].index, 0.0);
        assert_eq!(local[24].p_value, 1.0);
        assert_eq!(local[24].num_neighbors, 3);
    }
}
