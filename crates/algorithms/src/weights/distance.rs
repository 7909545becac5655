//! Distance methods used for neighbor search and distance-based weights

use serde::{Deserialize, Serialize};

/// How raw geometric distance between two locations is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMethod {
    /// Straight-line distance: `sqrt(dx² + dy²)`
    #[default]
    Euclidean,
    /// City-block distance: `|dx| + |dy|`
    Manhattan,
}

impl DistanceMethod {
    /// Distance between (x1, y1) and (x2, y2)
    #[inline]
    pub fn distance(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
        let dx = x1 - x2;
        let dy = y1 - y2;
        match self {
            DistanceMethod::Euclidean => (dx * dx + dy * dy).sqrt(),
            DistanceMethod::Manhattan => dx.abs() + dy.abs(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceMethod::Euclidean => "Euclidean",
            DistanceMethod::Manhattan => "Manhattan",
        }
    }
}
