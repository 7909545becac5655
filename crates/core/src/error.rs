//! Error types for geostat

use thiserror::Error;

/// Coarse grouping of [`Error`] variants.
///
/// Callers use this to decide whether a failure is their fault (bad
/// parameters), the data's fault, or a degenerate numeric configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or invalid input parameters, detected before any computation
    Configuration,
    /// The attribute data cannot support the requested statistic
    Data,
    /// The computation produced an undefined quantity (zero denominators)
    Numerical,
    /// The caller asked the operation to stop
    Cancelled,
}

/// Main error type for geostat operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("No input locations")]
    EmptyInput,

    #[error("Missing required input: {0}")]
    MissingField(&'static str),

    #[error("Field '{field}' not found in feature schema")]
    FieldNotFound { field: String },

    #[error("Field '{field}' is not numeric (feature {feature})")]
    NonNumericField { field: String, feature: usize },

    #[error("Field '{field}' has a missing or non-finite value (feature {feature})")]
    MissingValue { field: String, feature: usize },

    #[error("Feature {feature} has no usable geometry")]
    MissingGeometry { feature: usize },

    #[error("Need at least 2 distinct locations, found {found}")]
    InsufficientLocations { found: usize },

    #[error("{statistic}: need at least {required} valid locations, found {found}")]
    InsufficientData {
        statistic: &'static str,
        required: usize,
        found: usize,
    },

    #[error("{statistic}: field '{field}' has zero variance")]
    ZeroVariance {
        statistic: &'static str,
        field: String,
    },

    #[error("{statistic}: field '{field}' requires positive values, got {value} at location {index}")]
    NonPositiveValue {
        statistic: &'static str,
        field: String,
        index: usize,
        value: f64,
    },

    #[error("{statistic}: {reason}")]
    NumericalDegeneracy {
        statistic: &'static str,
        reason: String,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`]
    pub fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Which part of the error taxonomy this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidParameter { .. }
            | Error::EmptyInput
            | Error::MissingField(_)
            | Error::IndexOutOfBounds { .. }
            | Error::InvalidDimensions { .. } => ErrorCategory::Configuration,
            Error::FieldNotFound { .. }
            | Error::NonNumericField { .. }
            | Error::MissingValue { .. }
            | Error::MissingGeometry { .. }
            | Error::InsufficientLocations { .. }
            | Error::InsufficientData { .. }
            | Error::ZeroVariance { .. }
            | Error::NonPositiveValue { .. } => ErrorCategory::Data,
            Error::NumericalDegeneracy { .. } | Error::Other(_) => ErrorCategory::Numerical,
            Error::Cancelled => ErrorCategory::Cancelled,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_data(&self) -> bool {
        self.category() == ErrorCategory::Data
    }
}

/// Result type alias for geostat operations
pub type Result<T> = std::result::Result<T, Error>;
