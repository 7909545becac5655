//! Attribute extraction
//!
//! Reads locations and one or two numeric fields out of a feature
//! collection. Missing or non-finite values follow an explicit
//! [`MissingValuePolicy`]: fail on the first one, or drop the feature (and
//! its location) from the analysis.

use serde::{Deserialize, Serialize};
use tracing::warn;

use geostat_core::{AttributeValue, Error, FeatureCollection, Result};

use crate::weights::Location;

/// What to do with features whose field value is missing or non-finite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissingValuePolicy {
    /// Report the first offending feature as a data error
    #[default]
    Fail,
    /// Exclude the feature from the analysis
    Drop,
}

/// Numeric values of one field, aligned with the analysis locations
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeVector {
    pub field: String,
    pub values: Vec<f64>,
}

impl AttributeVector {
    pub fn new(field: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            field: field.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Deviations from the mean
    pub fn deviations(&self) -> Vec<f64> {
        let mean = self.mean();
        self.values.iter().map(|v| v - mean).collect()
    }

    /// Σ (x - mean)²
    pub fn sum_sq_dev(&self) -> f64 {
        self.deviations().iter().map(|d| d * d).sum()
    }

    /// Whether every value is (numerically) the same
    pub fn is_constant(&self) -> bool {
        let scale = self.values.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);
        self.sum_sq_dev() <= f64::EPSILON * scale * scale * self.values.len() as f64
    }

    /// Values standardized to mean 0 and Σz² = n; `None` for a constant field
    pub fn standardized(&self) -> Option<Vec<f64>> {
        if self.is_constant() {
            return None;
        }
        let n = self.len() as f64;
        let sd = (self.sum_sq_dev() / n).sqrt();
        Some(self.deviations().iter().map(|d| d / sd).collect())
    }
}

/// Locations plus their attribute values, ready for weights construction
#[derive(Debug, Clone)]
pub struct SpatialDataset {
    pub locations: Vec<Location>,
    pub primary: AttributeVector,
    pub secondary: Option<AttributeVector>,
    /// Input feature indices that were dropped
    pub dropped: Vec<usize>,
}

impl SpatialDataset {
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Extract locations and the named field(s).
    ///
    /// Booleans read as 1/0 so binary fields can feed Join Count.
    pub fn from_features(
        features: &FeatureCollection,
        primary: &str,
        secondary: Option<&str>,
        policy: MissingValuePolicy,
    ) -> Result<Self> {
        if features.is_empty() {
            return Err(Error::EmptyInput);
        }
        if primary.is_empty() {
            return Err(Error::MissingField("attribute field"));
        }
        for field in std::iter::once(primary).chain(secondary) {
            if !features.has_field(field) {
                return Err(Error::FieldNotFound {
                    field: field.to_string(),
                });
            }
        }

        let mut locations = Vec::with_capacity(features.len());
        let mut xs = Vec::with_capacity(features.len());
        let mut ys = Vec::new();
        let mut dropped = Vec::new();

        for (index, feature) in features.iter().enumerate() {
            let row = Location::from_feature(index, feature).and_then(|loc| {
                let x = numeric_value(feature.get_property(primary), primary, index)?;
                let y = secondary
                    .map(|f| numeric_value(feature.get_property(f), f, index))
                    .transpose()?;
                Ok((loc, x, y))
            });
            match row {
                Ok((loc, x, y)) => {
                    locations.push(loc);
                    xs.push(x);
                    if let Some(y) = y {
                        ys.push(y);
                    }
                }
                // Non-numeric fields are a schema problem, never dropped
                Err(e @ Error::NonNumericField { .. }) => return Err(e),
                Err(e) => match policy {
                    MissingValuePolicy::Fail => return Err(e),
                    MissingValuePolicy::Drop => dropped.push(index),
                },
            }
        }

        if !dropped.is_empty() {
            warn!(count = dropped.len(), field = primary, "dropped features with missing values or geometry");
        }
        if locations.is_empty() {
            return Err(Error::InsufficientData {
                statistic: "attribute extraction",
                required: 1,
                found: 0,
            });
        }

        Ok(Self {
            locations,
            primary: AttributeVector::new(primary, xs),
            secondary: secondary.map(|f| AttributeVector::new(f, ys)),
            dropped,
        })
    }
}

fn numeric_value(value: Option<&AttributeValue>, field: &str, feature: usize) -> Result<f64> {
    let missing = || Error::MissingValue {
        field: field.to_string(),
        feature,
    };
    match value {
        None | Some(AttributeValue::Null) => Err(missing()),
        Some(AttributeValue::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
        Some(v) => match v.as_f64() {
            Some(x) if x.is_finite() => Ok(x),
            Some(_) => Err(missing()),
            None => Err(Error::NonNumericField {
                field: field.to_string(),
                feature,
            }),
        },
    }
}
