//! Weight standardization

use serde::{Deserialize, Serialize};

use super::{Neighbor, NeighborWeights};

/// Standardization applied after weights construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StandardizationMethod {
    /// Keep raw weights
    None,
    /// Divide each row by its row sum
    #[default]
    Row,
}

impl StandardizationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            StandardizationMethod::None => "None",
            StandardizationMethod::Row => "Row",
        }
    }
}

/// Apply a standardization method.
///
/// Row standardization divides every row by its sum so that each non-empty
/// row sums to 1. Rows whose sum is zero (isolated locations) stay empty;
/// they contribute no spatial term downstream.
pub fn standardize(weights: &NeighborWeights, method: StandardizationMethod) -> NeighborWeights {
    match method {
        StandardizationMethod::None => weights.with_rows(weights.rows().to_vec(), StandardizationMethod::None),
        StandardizationMethod::Row => {
            let rows = weights
                .rows()
                .iter()
                .map(|row| {
                    let sum: f64 = row.iter().map(|nb| nb.weight).sum();
                    if sum > 0.0 {
                        row.iter()
                            .map(|nb| Neighbor {
                                index: nb.index,
                                weight: nb.weight / sum,
                            })
                            .collect()
                    } else {
                        Vec::new()
                    }
                })
                .collect();
            weights.with_rows(rows, StandardizationMethod::Row)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::SpatialConcept;

    #[test]
    fn test_row_sums_are_one() {
        let raw = NeighborWeights::from_rows(
            vec![
                vec![(1, 0.5), (2, 0.25)],
                vec![(0, 3.0)],
                vec![],
                vec![(0, 1.0), (1, 1.0), (2, 1.0)],
            ],
            SpatialConcept::InverseDistance,
            None,
        );
        let w = standardize(&raw, StandardizationMethod::Row);
        assert_eq!(w.standardization(), StandardizationMethod::Row);
        for i in 0..w.len() {
            if raw.neighbor_count(i) > 0 {
                assert!((w.row_sum(i) - 1.0).abs() < 1e-9);
            } else {
                assert_eq!(w.row_sum(i), 0.0);
            }
        }
        assert!((w.weight(0, 1) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_none_keeps_weights() {
        let raw = NeighborWeights::from_rows(
            vec![vec![(1, 2.0)], vec![(0, 2.0)]],
            SpatialConcept::FixedDistanceBand,
            Some(1.0),
        );
        let w = standardize(&raw, StandardizationMethod::None);
        assert_eq!(w.weight(0, 1), 2.0);
        assert_eq!(w.threshold(), Some(1.0));
    }
}
