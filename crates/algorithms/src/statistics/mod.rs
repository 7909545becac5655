//! Spatial autocorrelation statistics
//!
//! - **morans_i**: Global / Local Moran's I
//! - **gearys_c**: Global / Local Geary's C
//! - **getis_ord**: General G and Local Gi / Gi*
//! - **lees**: Lee's L (bivariate) and S (univariate)
//! - **rogerson**: Rogerson's R and its local score
//! - **join_count**: BB / WW / BW joins and the local join count
//! - **analysis**: feature-collection pipeline (extract, weigh, compute, annotate)
//!
//! Every statistic consumes an attribute vector aligned with a
//! [`NeighborWeights`] structure and reports an [`AutocorrelationResult`]
//! (global) or one [`LocalResult`] per location.

pub mod analysis;
pub mod attribute;
pub mod distribution;
pub mod gearys_c;
pub mod getis_ord;
pub mod join_count;
pub mod lees;
pub mod morans_i;
pub mod permutation;
pub mod result;
pub mod rogerson;

use serde::{Deserialize, Serialize};

use geostat_core::{Error, Result};

use crate::weights::NeighborWeights;

pub use analysis::{analyze_global, analyze_join_count, analyze_local, AnalysisConfig, ErrorPolicy, LocalAnalysis};
pub use attribute::{AttributeVector, MissingValuePolicy, SpatialDataset};
pub use gearys_c::{global_gearys_c, local_gearys_c, GearysC};
pub use getis_ord::{general_g, local_getis_ord, GetisOrdG};
pub use join_count::{join_count, local_join_count, JoinCount, JoinCountResult, JoinStatistic};
pub use lees::{global_lees_l, global_lees_s, local_lees_l, local_lees_s, LeesL, LeesParams, LeesS};
pub use morans_i::{global_morans_i, local_morans_i, MoransI};
pub use result::{
    AutocorrelationResult, ClusterType, ConfidenceBin, LocalResult, SignificanceLevel, WeightsEcho,
};
pub use rogerson::{global_rogerson_r, local_rogerson_r, RogersonParams, RogersonR};

/// Attribute input of a statistic: one field, or two for the bivariate ones
#[derive(Debug, Clone, Copy)]
pub struct StatisticInput<'a> {
    pub primary: &'a AttributeVector,
    pub secondary: Option<&'a AttributeVector>,
}

impl<'a> StatisticInput<'a> {
    pub fn univariate(primary: &'a AttributeVector) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn bivariate(primary: &'a AttributeVector, secondary: &'a AttributeVector) -> Self {
        Self {
            primary,
            secondary: Some(secondary),
        }
    }

    pub(crate) fn require_secondary(&self) -> Result<&'a AttributeVector> {
        self.secondary.ok_or(Error::MissingField("second attribute field"))
    }
}

/// A spatial autocorrelation statistic with global and local forms.
pub trait AutocorrelationStatistic {
    fn name(&self) -> &'static str;

    fn global(&self, input: StatisticInput<'_>, weights: &NeighborWeights) -> Result<AutocorrelationResult>;

    fn local(
        &self,
        input: StatisticInput<'_>,
        weights: &NeighborWeights,
        level: SignificanceLevel,
    ) -> Result<Vec<LocalResult>>;
}

/// The statistic family as a tagged variant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Statistic {
    MoransI,
    GearysC,
    GetisOrdG,
    LeesL(LeesParams),
    LeesS(LeesParams),
    RogersonR(RogersonParams),
    JoinCount,
}

/// Attribute names written by a local analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalColumns {
    pub index: Option<&'static str>,
    pub z_score: &'static str,
    pub p_value: &'static str,
    pub cluster: Option<&'static str>,
    pub bin: Option<&'static str>,
}

/// Neighbor count column written for every local statistic
pub const NUM_NEIGHBORS_COLUMN: &str = "NumNbrs";

const COTYPE: Option<&str> = Some("COType");

impl Statistic {
    /// Whether the statistic needs a second attribute field
    pub fn is_bivariate(&self) -> bool {
        matches!(self, Statistic::LeesL(_) | Statistic::RogersonR(_))
    }

    pub fn local_columns(&self) -> LocalColumns {
        let prefixed = |index, z_score, p_value| LocalColumns {
            index: Some(index),
            z_score,
            p_value,
            cluster: COTYPE,
            bin: None,
        };
        match self {
            Statistic::MoransI => prefixed("LMiIndex", "LMiZScore", "LMiPValue"),
            Statistic::GearysC => prefixed("LGiIndex", "LGiZScore", "LGiPValue"),
            Statistic::LeesL(_) => prefixed("LLiIndex", "LLiZScore", "LLiPValue"),
            Statistic::LeesS(_) => prefixed("LSiIndex", "LSiZScore", "LSiPValue"),
            Statistic::RogersonR(_) => prefixed("LRiIndex", "LRiZScore", "LRiPValue"),
            Statistic::JoinCount => prefixed("LJcIndex", "LJcZScore", "LJcPValue"),
            Statistic::GetisOrdG => LocalColumns {
                index: None,
                z_score: "GiZScore",
                p_value: "GiPValue",
                cluster: None,
                bin: Some("GiBin"),
            },
        }
    }

    fn implementation(&self) -> Box<dyn AutocorrelationStatistic> {
        match *self {
            Statistic::MoransI => Box::new(MoransI),
            Statistic::GearysC => Box::new(GearysC),
            Statistic::GetisOrdG => Box::new(GetisOrdG),
            Statistic::LeesL(params) => Box::new(LeesL { params }),
            Statistic::LeesS(params) => Box::new(LeesS { params }),
            Statistic::RogersonR(params) => Box::new(RogersonR { params }),
            Statistic::JoinCount => Box::new(JoinCount),
        }
    }
}

impl AutocorrelationStatistic for Statistic {
    fn name(&self) -> &'static str {
        self.implementation().name()
    }

    fn global(&self, input: StatisticInput<'_>, weights: &NeighborWeights) -> Result<AutocorrelationResult> {
        self.implementation().global(input, weights)
    }

    fn local(
        &self,
        input: StatisticInput<'_>,
        weights: &NeighborWeights,
        level: SignificanceLevel,
    ) -> Result<Vec<LocalResult>> {
        self.implementation().local(input, weights, level)
    }
}

/// Shared preconditions: aligned lengths, enough locations, non-constant values.
pub(crate) fn check_attribute(
    statistic: &'static str,
    values: &AttributeVector,
    weights: &NeighborWeights,
    required: usize,
) -> Result<()> {
    if values.len() != weights.len() {
        return Err(Error::invalid(
            "weights",
            weights.len(),
            format!("expected {} rows to match field '{}'", values.len(), values.field),
        ));
    }
    if values.len() < required {
        return Err(Error::InsufficientData {
            statistic,
            required,
            found: values.len(),
        });
    }
    if values.is_constant() {
        return Err(Error::ZeroVariance {
            statistic,
            field: values.field.clone(),
        });
    }
    Ok(())
}

/// S0 of `weights`, failing when no location has a neighbor
pub(crate) fn nonzero_s0(statistic: &'static str, weights: &NeighborWeights) -> Result<f64> {
    let s0 = weights.s0();
    if s0 > 0.0 {
        Ok(s0)
    } else {
        Err(Error::NumericalDegeneracy {
            statistic,
            reason: "no location has a neighbor (S0 = 0)".into(),
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::weights::{build_weights, standardize, Location, NeighborWeights, StandardizationMethod, WeightsConfig};

    /// `side x side` unit lattice, row-major from the origin
    pub fn lattice(side: usize) -> Vec<Location> {
        (0..side * side)
            .map(|i| Location::new(i, (i % side) as f64, (i / side) as f64))
            .collect()
    }

    /// Queen adjacency (band 1.5) over a lattice
    pub fn queen(side: usize, method: StandardizationMethod) -> NeighborWeights {
        let raw = build_weights(&lattice(side), &WeightsConfig::distance_band(1.5)).unwrap();
        standardize(&raw, method)
    }

    /// 1 on even (row + col), 0 elsewhere
    pub fn checkerboard(side: usize) -> Vec<f64> {
        (0..side * side)
            .map(|i| if (i % side + i / side) % 2 == 0 { 1.0 } else { 0.0 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::StandardizationMethod;

    #[test]
    fn test_dispatch_names_and_columns() {
        let all = [
            Statistic::MoransI,
            Statistic::GearysC,
            Statistic::GetisOrdG,
            Statistic::LeesL(LeesParams::default()),
            Statistic::LeesS(LeesParams::default()),
            Statistic::RogersonR(RogersonParams::default()),
            Statistic::JoinCount,
        ];
        let names: Vec<&str> = all.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["Moran's I", "Geary's C", "Getis-Ord General G", "Lee's L", "Lee's S", "Rogerson's R", "Join Count"]
        );
        assert_eq!(Statistic::MoransI.local_columns().index, Some("LMiIndex"));
        assert_eq!(Statistic::GetisOrdG.local_columns().bin, Some("GiBin"));
        assert!(Statistic::LeesL(LeesParams::default()).is_bivariate());
        assert!(!Statistic::LeesS(LeesParams::default()).is_bivariate());
    }

    #[test]
    fn test_length_mismatch_is_configuration_error() {
        let w = test_support::queen(3, StandardizationMethod::Row);
        let x = AttributeVector::new("x", vec![1.0, 2.0, 3.0]);
        let err = Statistic::MoransI.global(StatisticInput::univariate(&x), &w).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_missing_secondary_field() {
        let w = test_support::queen(3, StandardizationMethod::Row);
        let x = AttributeVector::new("x", test_support::checkerboard(3));
        let err = Statistic::LeesL(LeesParams::default())
            .global(StatisticInput::univariate(&x), &w)
            .unwrap_err();
        assert_eq!(err, Error::MissingField("second attribute field"));
    }
}
