//! # geostat core
//!
//! Core types shared by the geostat spatial-statistics engine:
//! - `Feature` / `FeatureCollection`: vector input and annotated output
//! - `Extent`: analysis bounds and the extent-derived default heuristics
//! - `Raster<T>`: georeferenced grid for density surfaces
//! - `Error`: the error taxonomy every operation reports through

pub mod error;
pub mod extent;
pub mod raster;
pub mod vector;

pub use error::{Error, ErrorCategory, Result};
pub use extent::Extent;
pub use raster::{GeoTransform, Raster, RasterElement};
pub use vector::{AttributeValue, Feature, FeatureCollection};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::extent::Extent;
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection};
}
