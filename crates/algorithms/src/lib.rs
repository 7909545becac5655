//! # geostat algorithms
//!
//! Spatial autocorrelation and cluster detection over point and polygon
//! feature sets.
//!
//! ## Modules
//!
//! - **weights**: neighbor structures (distance band, inverse distance,
//!   zone of indifference, k-nearest, polygon contiguity) and standardization
//! - **statistics**: Moran's I, Geary's C, Getis-Ord G / Gi*, Lee's L / S,
//!   Rogerson's R, Join Count, in global and local form
//! - **cluster**: Besag–Newell and GAM scans with a density surface

pub(crate) mod maybe_rayon;

pub mod cluster;
pub mod statistics;
pub mod weights;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cluster::{
        besag_newell, gam, BesagNewellParams, CancelFlag, CaseData, ClusterCandidate, ClusterResult,
        DensityParams, FitnessFunction, GamParams,
    };
    pub use crate::statistics::{
        analyze_global, analyze_join_count, analyze_local, AnalysisConfig, AttributeVector,
        AutocorrelationResult, AutocorrelationStatistic, ClusterType, ErrorPolicy, LeesParams, LocalAnalysis,
        LocalResult, MissingValuePolicy, RogersonParams, SignificanceLevel, Statistic, StatisticInput,
    };
    pub use crate::weights::{
        build_weights, standardize, ContiguityType, DistanceMethod, Location, NeighborWeights, SpatialConcept,
        StandardizationMethod, WeightsConfig,
    };
    pub use geostat_core::prelude::*;
}
