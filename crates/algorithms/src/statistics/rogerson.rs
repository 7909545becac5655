//! Rogerson's R
//!
//! A chi-square-type clustering statistic over case counts and a population
//! at risk. With case shares `r_i = c_i / Σc`, population shares
//! `p_i = pop_i / Σpop` and standardized residuals `u_i = (r_i - p_i) / √p_i`:
//!
//! ```text
//! R   = Σ_i Σ_j w_ij u_i u_j        (w_ii = 1, w_ij^κ off the diagonal)
//! U_i = Σ_j w_ij u_j                (local score)
//! ```
//!
//! Under the multinomial null with `N = Σc` cases and `s = √p`,
//! `E[u uᵀ] = (I - s sᵀ) / N`, so `E[R] = (tr W - Σ w_ij s_i s_j) / N` and,
//! with `A = (W + Wᵀ) / 2`, `Var[R] = 2 (tr A² - 2|As|² + (sᵀAs)²) / N²`.
//!
//! Reference:
//! Rogerson, P.A. (1999). The detection of clusters using a spatial version
//! of the chi-square goodness-of-fit statistic. Geographical Analysis, 31(2).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use geostat_core::{Error, Result};

use super::{
    AttributeVector, AutocorrelationResult, AutocorrelationStatistic, LocalResult, SignificanceLevel,
    StatisticInput,
};
use crate::maybe_rayon::*;
use crate::weights::NeighborWeights;

const NAME: &str = "Rogerson's R";

/// Parameters for Rogerson's R
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RogersonParams {
    /// Power applied to off-diagonal weights (default: 1.0)
    pub kappa: f64,
}

impl Default for RogersonParams {
    fn default() -> Self {
        Self { kappa: 1.0 }
    }
}

impl RogersonParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.kappa.is_finite() && self.kappa > 0.0) {
            return Err(Error::invalid("kappa", self.kappa, "must be > 0"));
        }
        Ok(())
    }
}

/// Rogerson's R over (cases, population)
#[derive(Debug, Clone, Copy, Default)]
pub struct RogersonR {
    pub params: RogersonParams,
}

impl AutocorrelationStatistic for RogersonR {
    fn name(&self) -> &'static str {
        NAME
    }

    fn global(&self, input: StatisticInput<'_>, weights: &NeighborWeights) -> Result<AutocorrelationResult> {
        global_rogerson_r(input.primary, input.require_secondary()?, weights, &self.params)
    }

    fn local(
        &self,
        input: StatisticInput<'_>,
        weights: &NeighborWeights,
        level: SignificanceLevel,
    ) -> Result<Vec<LocalResult>> {
        local_rogerson_r(input.primary, input.require_secondary()?, weights, &self.params, level)
    }
}

/// Residuals and shares derived from the two fields
struct Residuals {
    /// Standardized residuals u_i
    u: Vec<f64>,
    /// √p_i
    s: Vec<f64>,
    /// Total case count N
    total_cases: f64,
}

fn residuals(
    cases: &AttributeVector,
    population: &AttributeVector,
    weights: &NeighborWeights,
    params: &RogersonParams,
) -> Result<Residuals> {
    params.validate()?;
    let n = cases.len();
    if population.len() != n || weights.len() != n {
        return Err(Error::invalid(
            "weights",
            weights.len(),
            format!("expected {} rows for fields '{}' and '{}'", n, cases.field, population.field),
        ));
    }
    if n < 3 {
        return Err(Error::InsufficientData {
            statistic: NAME,
            required: 3,
            found: n,
        });
    }
    // Populations must be positive; case counts may be zero
    if let Some(index) = population.values.iter().position(|&v| v <= 0.0) {
        return Err(non_positive(population, index));
    }
    if let Some(index) = cases.values.iter().position(|&v| v < 0.0) {
        return Err(non_positive(cases, index));
    }

    let total_cases: f64 = cases.values.iter().sum();
    if total_cases <= 0.0 {
        return Err(Error::NumericalDegeneracy {
            statistic: NAME,
            reason: format!("field '{}' has no cases", cases.field),
        });
    }
    if cases.is_constant() {
        return Err(zero_variance(cases));
    }
    let total_pop: f64 = population.values.iter().sum();

    let s: Vec<f64> = population.values.iter().map(|p| (p / total_pop).sqrt()).collect();
    let u: Vec<f64> = cases
        .values
        .iter()
        .zip(&s)
        .map(|(c, si)| (c / total_cases - si * si) / si)
        .collect();
    // Case shares proportional to population shares
    if u.iter().all(|v| v.abs() <= 1e-12) {
        return Err(zero_variance(cases));
    }
    Ok(Residuals { u, s, total_cases })
}

fn zero_variance(field: &AttributeVector) -> Error {
    Error::ZeroVariance {
        statistic: NAME,
        field: field.field.clone(),
    }
}

fn non_positive(field: &AttributeVector, index: usize) -> Error {
    Error::NonPositiveValue {
        statistic: NAME,
        field: field.field.clone(),
        index,
        value: field.values[index],
    }
}

/// Off-diagonal weight with the kappa power applied
fn powered(w: f64, kappa: f64) -> f64 {
    if kappa == 1.0 {
        w
    } else {
        w.powf(kappa)
    }
}

pub fn global_rogerson_r(
    cases: &AttributeVector,
    population: &AttributeVector,
    weights: &NeighborWeights,
    params: &RogersonParams,
) -> Result<AutocorrelationResult> {
    let res = residuals(cases, population, weights, params)?;
    let (u, s) = (&res.u, &res.s);
    let n = u.len();
    let big_n = res.total_cases;

    // Diagonal terms (w_ii = 1)
    let mut observed: f64 = u.iter().map(|v| v * v).sum();
    let mut cross_s = 1.0; // Σ_i s_i² = Σ p_i
    // Symmetric part A of the off-diagonal weights, keyed (min, max)
    let mut sym: HashMap<(usize, usize), f64> = HashMap::new();
    for (i, j, w) in weights.iter().filter(|&(i, j, _)| i != j) {
        let w = powered(w, params.kappa);
        observed += w * u[i] * u[j];
        cross_s += w * s[i] * s[j];
        *sym.entry((i.min(j), i.max(j))).or_insert(0.0) += w / 2.0;
    }

    let expected = (n as f64 - cross_s) / big_n;

    let mut trace_a2 = n as f64;
    let mut a_s = s.clone();
    for (&(i, j), &a) in &sym {
        trace_a2 += 2.0 * a * a;
        a_s[i] += a * s[j];
        a_s[j] += a * s[i];
    }
    let as_norm2: f64 = a_s.iter().map(|v| v * v).sum();
    let s_a_s: f64 = s.iter().zip(&a_s).map(|(a, b)| a * b).sum();
    let variance = 2.0 * (trace_a2 - 2.0 * as_norm2 + s_a_s * s_a_s) / (big_n * big_n);

    if !(variance.is_finite() && variance > 0.0) {
        return Err(Error::NumericalDegeneracy {
            statistic: NAME,
            reason: format!("non-positive variance {variance}"),
        });
    }

    debug!(r = observed, expected, variance, cases = big_n, "Rogerson's R");
    Ok(AutocorrelationResult::from_moments(NAME, n, observed, expected, variance, weights))
}

/// Local score statistics `U_i` with `Var[U_i] = (Σ_j w_ij² - (Σ_j w_ij s_j)²) / N`.
pub fn local_rogerson_r(
    cases: &AttributeVector,
    population: &AttributeVector,
    weights: &NeighborWeights,
    params: &RogersonParams,
    level: SignificanceLevel,
) -> Result<Vec<LocalResult>> {
    let res = residuals(cases, population, weights, params)?;
    let (u, s) = (&res.u, &res.s);
    let kappa = params.kappa;

    let results = (0..u.len())
        .into_par_iter()
        .map(|i| {
            let (mut score, mut w2, mut ws, mut count) = (u[i], 1.0, s[i], 0usize);
            for nb in weights.neighbors(i).iter().filter(|nb| nb.index != i) {
                let w = powered(nb.weight, kappa);
                score += w * u[nb.index];
                w2 += w * w;
                ws += w * s[nb.index];
                count += 1;
            }
            if count == 0 {
                return LocalResult::isolated();
            }
            let variance = (w2 - ws * ws) / res.total_cases;
            LocalResult::from_moments(score, 0.0, variance, count, (u[i], score - u[i]), level)
        })
        .collect();

    Ok(results)
}
