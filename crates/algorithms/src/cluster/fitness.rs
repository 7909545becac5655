//! Fitness functions: the significance test of one candidate circle

use serde::{Deserialize, Serialize};

use crate::statistics::distribution::{binomial_sf, poisson_sf};

/// Null distribution of the case count inside a circle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FitnessFunction {
    /// Cases ~ Poisson(population · rate)
    #[default]
    Poisson,
    /// Cases ~ Binomial(population, rate)
    Binomial,
}

impl FitnessFunction {
    pub fn name(&self) -> &'static str {
        match self {
            FitnessFunction::Poisson => "Poisson",
            FitnessFunction::Binomial => "Binomial",
        }
    }

    /// Upper-tail probability `P(X >= observed)`.
    ///
    /// Counts are rounded to the nearest integer; the binomial trial count is
    /// the rounded population.
    pub fn p_value(&self, observed: f64, population: f64, rate: f64) -> f64 {
        let k = observed.max(0.0).round() as u64;
        match self {
            FitnessFunction::Poisson => poisson_sf(k, population * rate),
            FitnessFunction::Binomial => binomial_sf(k, population.max(0.0).round() as u64, rate),
        }
    }
}
