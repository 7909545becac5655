//! Result records and significance classification

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::weights::{DistanceMethod, NeighborWeights, SpatialConcept, StandardizationMethod};

/// Confidence level used to classify local results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignificanceLevel {
    /// 90 %, |z| >= 1.65
    Ninety,
    /// 95 %, |z| >= 1.96
    #[default]
    NinetyFive,
    /// 99 %, |z| >= 2.58
    NinetyNine,
}

impl SignificanceLevel {
    /// Critical |z| for this level
    pub fn critical_z(&self) -> f64 {
        match self {
            SignificanceLevel::Ninety => 1.65,
            SignificanceLevel::NinetyFive => 1.96,
            SignificanceLevel::NinetyNine => 2.58,
        }
    }

    pub fn alpha(&self) -> f64 {
        match self {
            SignificanceLevel::Ninety => 0.10,
            SignificanceLevel::NinetyFive => 0.05,
            SignificanceLevel::NinetyNine => 0.01,
        }
    }

    pub fn is_significant(&self, z: f64) -> bool {
        z.abs() >= self.critical_z()
    }
}

/// Signed confidence bin of a z-score: ±3 (99 %), ±2 (95 %), ±1 (90 %), 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfidenceBin(pub i8);

impl ConfidenceBin {
    pub fn from_z(z: f64) -> Self {
        if !z.is_finite() {
            return ConfidenceBin(0);
        }
        let level = if z.abs() >= SignificanceLevel::NinetyNine.critical_z() {
            3
        } else if z.abs() >= SignificanceLevel::NinetyFive.critical_z() {
            2
        } else if z.abs() >= SignificanceLevel::Ninety.critical_z() {
            1
        } else {
            0
        };
        ConfidenceBin(if z < 0.0 { -level } else { level })
    }
}

/// Cluster/outlier type of a local result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClusterType {
    /// High value among high neighbors (hot spot)
    HighHigh,
    /// Low value among low neighbors (cold spot)
    LowLow,
    /// High outlier among low neighbors
    HighLow,
    /// Low outlier among high neighbors
    LowHigh,
    #[default]
    NotSignificant,
}

impl ClusterType {
    /// Classify from the sign of the location's own deviation and of its
    /// spatial lag, given whether the local statistic is significant.
    pub fn from_quadrant(own: f64, lag: f64, significant: bool) -> Self {
        if !significant {
            return ClusterType::NotSignificant;
        }
        match (own >= 0.0, lag >= 0.0) {
            (true, true) => ClusterType::HighHigh,
            (false, false) => ClusterType::LowLow,
            (true, false) => ClusterType::HighLow,
            (false, true) => ClusterType::LowHigh,
        }
    }

    /// Attribute code written to annotated features
    pub fn code(&self) -> &'static str {
        match self {
            ClusterType::HighHigh => "HH",
            ClusterType::LowLow => "LL",
            ClusterType::HighLow => "HL",
            ClusterType::LowHigh => "LH",
            ClusterType::NotSignificant => "",
        }
    }
}

/// Weights configuration a result was computed with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightsEcho {
    pub concept: SpatialConcept,
    pub distance_method: DistanceMethod,
    pub standardization: StandardizationMethod,
    pub threshold: Option<f64>,
}

impl From<&NeighborWeights> for WeightsEcho {
    fn from(w: &NeighborWeights) -> Self {
        Self {
            concept: w.concept(),
            distance_method: w.distance_method(),
            standardization: w.standardization(),
            threshold: w.threshold(),
        }
    }
}

/// Result of a global autocorrelation statistic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutocorrelationResult {
    pub statistic: &'static str,
    /// Number of locations that entered the computation
    pub n: usize,
    pub observed: f64,
    pub expected: f64,
    pub variance: f64,
    pub z_score: f64,
    pub p_value: f64,
    pub weights: WeightsEcho,
    /// Zero-valued substitute produced by lenient error handling
    pub placeholder: bool,
}

impl AutocorrelationResult {
    /// Assemble a result from observed/expected/variance; z and the
    /// two-tailed normal p-value are derived here.
    pub fn from_moments(
        statistic: &'static str,
        n: usize,
        observed: f64,
        expected: f64,
        variance: f64,
        weights: &NeighborWeights,
    ) -> Self {
        let z_score = if variance > 0.0 {
            (observed - expected) / variance.sqrt()
        } else {
            0.0
        };
        Self {
            statistic,
            n,
            observed,
            expected,
            variance,
            z_score,
            p_value: super::distribution::two_tailed_p(z_score),
            weights: WeightsEcho::from(weights),
            placeholder: false,
        }
    }

    /// Zero-valued result flagged as a placeholder (p = 1, never significant)
    pub fn placeholder(statistic: &'static str, weights: WeightsEcho) -> Self {
        Self {
            statistic,
            n: 0,
            observed: 0.0,
            expected: 0.0,
            variance: 0.0,
            z_score: 0.0,
            p_value: 1.0,
            weights,
            placeholder: true,
        }
    }

    pub fn is_significant(&self, level: SignificanceLevel) -> bool {
        !self.placeholder && self.p_value < level.alpha()
    }
}

impl fmt::Display for AutocorrelationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (n = {})", self.statistic, self.n)?;
        writeln!(f, "  observed: {:.6}", self.observed)?;
        writeln!(f, "  expected: {:.6}", self.expected)?;
        writeln!(f, "  variance: {:.6}", self.variance)?;
        writeln!(f, "  z-score:  {:.6}", self.z_score)?;
        write!(f, "  p-value:  {:.6}", self.p_value)?;
        if self.placeholder {
            write!(f, " (placeholder)")?;
        }
        Ok(())
    }
}

/// Per-location result of a local statistic
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocalResult {
    pub index: f64,
    pub expected: f64,
    pub variance: f64,
    pub z_score: f64,
    pub p_value: f64,
    pub num_neighbors: usize,
    pub bin: ConfidenceBin,
    pub cluster: ClusterType,
}

impl LocalResult {
    /// Result for a location with no neighbors: no spatial term, never significant
    pub fn isolated() -> Self {
        Self {
            index: 0.0,
            expected: 0.0,
            variance: 0.0,
            z_score: 0.0,
            p_value: 1.0,
            num_neighbors: 0,
            bin: ConfidenceBin(0),
            cluster: ClusterType::NotSignificant,
        }
    }

    /// Normal-approximation result; `quadrant` is (own deviation, lag)
    /// for cluster typing.
    pub fn from_moments(
        index: f64,
        expected: f64,
        variance: f64,
        num_neighbors: usize,
        quadrant: (f64, f64),
        level: SignificanceLevel,
    ) -> Self {
        let z_score = if variance > 0.0 {
            (index - expected) / variance.sqrt()
        } else {
            0.0
        };
        Self::from_z(index, expected, variance, z_score, num_neighbors, quadrant, level)
    }

    pub fn from_z(
        index: f64,
        expected: f64,
        variance: f64,
        z_score: f64,
        num_neighbors: usize,
        quadrant: (f64, f64),
        level: SignificanceLevel,
    ) -> Self {
        Self {
            index,
            expected,
            variance,
            z_score,
            p_value: super::distribution::two_tailed_p(z_score),
            num_neighbors,
            bin: ConfidenceBin::from_z(z_score),
            cluster: ClusterType::from_quadrant(quadrant.0, quadrant.1, level.is_significant(z_score)),
        }
    }
}
