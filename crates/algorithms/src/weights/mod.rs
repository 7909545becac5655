//! Spatial weights
//!
//! - **location**: representative coordinates (and boundaries) from features
//! - **kdtree**: neighbor search under a [`DistanceMethod`]
//! - **contiguity**: Queen/Rook/Bishop polygon adjacency via an R-tree
//! - **builder**: [`SpatialWeightsBuilder`] for every [`SpatialConcept`]
//! - **standardize**: row standardization

mod builder;
mod contiguity;
mod distance;
mod kdtree;
mod location;
mod matrix;
mod standardize;

pub use builder::{build_weights, default_threshold, SpatialConcept, SpatialWeightsBuilder, WeightsConfig};
pub use contiguity::{contiguity_rows, ContiguityType};
pub use distance::DistanceMethod;
pub use kdtree::{Hit, KdTree};
pub use location::{distinct_count, extent_of, validate_locations, Location};
pub use matrix::{Neighbor, NeighborSummary, NeighborWeights};
pub use standardize::{standardize, StandardizationMethod};
