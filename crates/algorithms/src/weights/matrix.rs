//! Sparse row-wise neighbor weights

use serde::Serialize;

use super::{DistanceMethod, SpatialConcept, StandardizationMethod};

/// One neighbor entry of a row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub index: usize,
    pub weight: f64,
}

/// Neighbor-count summary of a weights structure
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NeighborSummary {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub isolated: usize,
}

/// Row-wise spatial weights: for each location `i`, its neighbors `j` with
/// non-negative weights `w_ij`.
///
/// Rows are sorted by neighbor index. Symmetry is not assumed: k-nearest
/// rows are generally asymmetric, so every derived quantity (S1, S2,
/// column sums) reads the structure as a directed graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborWeights {
    rows: Vec<Vec<Neighbor>>,
    concept: SpatialConcept,
    distance_method: DistanceMethod,
    standardization: StandardizationMethod,
    /// Distance threshold actually used (distance concepts only)
    threshold: Option<f64>,
}

impl NeighborWeights {
    /// Build from rows of `(neighbor, weight)` pairs.
    ///
    /// Zero weights are dropped and each row is sorted by neighbor index.
    pub fn from_rows(
        rows: Vec<Vec<(usize, f64)>>,
        concept: SpatialConcept,
        threshold: Option<f64>,
    ) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| {
                let mut row: Vec<Neighbor> = row
                    .into_iter()
                    .filter(|&(_, w)| w > 0.0)
                    .map(|(index, weight)| Neighbor { index, weight })
                    .collect();
                row.sort_by_key(|nb| nb.index);
                row
            })
            .collect();
        Self {
            rows,
            concept,
            distance_method: DistanceMethod::Euclidean,
            standardization: StandardizationMethod::None,
            threshold,
        }
    }

    /// Record the distance method the rows were computed with
    pub fn with_distance_method(mut self, method: DistanceMethod) -> Self {
        self.distance_method = method;
        self
    }

    pub(crate) fn with_rows(&self, rows: Vec<Vec<Neighbor>>, standardization: StandardizationMethod) -> Self {
        Self {
            rows,
            concept: self.concept,
            distance_method: self.distance_method,
            standardization,
            threshold: self.threshold,
        }
    }

    /// Copy with every diagonal entry removed
    pub fn without_self(&self) -> Self {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| row.iter().copied().filter(|nb| nb.index != i).collect())
            .collect();
        self.with_rows(rows, self.standardization)
    }

    /// Number of locations (rows)
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn concept(&self) -> SpatialConcept {
        self.concept
    }

    pub fn distance_method(&self) -> DistanceMethod {
        self.distance_method
    }

    pub fn standardization(&self) -> StandardizationMethod {
        self.standardization
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    /// Neighbors of location `i`
    pub fn neighbors(&self, i: usize) -> &[Neighbor] {
        &self.rows[i]
    }

    pub fn rows(&self) -> &[Vec<Neighbor>] {
        &self.rows
    }

    /// `w_ij`, zero if `j` is not a neighbor of `i`
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        let row = &self.rows[i];
        row.binary_search_by_key(&j, |nb| nb.index)
            .map(|pos| row[pos].weight)
            .unwrap_or(0.0)
    }

    /// Iterate `(i, j, w_ij)` over every stored entry
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().map(move |nb| (i, nb.index, nb.weight)))
    }

    /// Number of neighbors of `i` (a self entry counts)
    pub fn neighbor_count(&self, i: usize) -> usize {
        self.rows[i].len()
    }

    /// `Σ_j w_ij`
    pub fn row_sum(&self, i: usize) -> f64 {
        self.rows[i].iter().map(|nb| nb.weight).sum()
    }

    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.row_sum(i)).collect()
    }

    /// `Σ_i w_ij` for every `j`
    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.len()];
        for (_, j, w) in self.iter() {
            sums[j] += w;
        }
        sums
    }

    /// Whether location `i` has itself as a neighbor
    pub fn has_self(&self, i: usize) -> bool {
        self.weight(i, i) > 0.0
    }

    /// Locations with an empty neighbor set
    pub fn isolated(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.rows[i].is_empty()).collect()
    }

    pub fn summary(&self) -> NeighborSummary {
        let counts: Vec<usize> = self.rows.iter().map(Vec::len).collect();
        let n = counts.len().max(1);
        NeighborSummary {
            min: counts.iter().copied().min().unwrap_or(0),
            max: counts.iter().copied().max().unwrap_or(0),
            mean: counts.iter().sum::<usize>() as f64 / n as f64,
            isolated: counts.iter().filter(|&&c| c == 0).count(),
        }
    }

    /// `w_ij == w_ji` for all pairs, within `tolerance`
    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        self.iter().all(|(i, j, w)| (self.weight(j, i) - w).abs() <= tolerance)
    }

    /// S0 = Σ_i Σ_j w_ij
    pub fn s0(&self) -> f64 {
        self.iter().map(|(_, _, w)| w).sum()
    }

    /// S1 = ½ Σ_i Σ_j (w_ij + w_ji)²
    pub fn s1(&self) -> f64 {
        let mut total = 0.0;
        for (i, j, w) in self.iter() {
            let wji = self.weight(j, i);
            total += (w + wji) * (w + wji);
            // (j, i) is not stored, so its identical term must be added here
            if wji == 0.0 {
                total += w * w;
            }
        }
        total / 2.0
    }

    /// S2 = Σ_i (Σ_j w_ij + Σ_j w_ji)²
    pub fn s2(&self) -> f64 {
        let cols = self.column_sums();
        (0..self.len())
            .map(|i| {
                let t = self.row_sum(i) + cols[i];
                t * t
            })
            .sum()
    }

    /// Spatial lag `Σ_j w_ij v_j` for every location
    pub fn lag(&self, values: &[f64]) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|nb| nb.weight * values[nb.index]).sum())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn asymmetric() -> NeighborWeights {
        // 0 -> 1 (2.0), 1 -> 0 (1.0), 1 -> 2 (1.0), 2 -> nothing
        NeighborWeights::from_rows(
            vec![vec![(1, 2.0)], vec![(2, 1.0), (0, 1.0)], vec![]],
            SpatialConcept::InverseDistance,
            None,
        )
    }

    #[test]
    fn test_rows_sorted_and_lookup() {
        let w = asymmetric();
        assert_eq!(w.neighbors(1)[0].index, 0);
        assert_eq!(w.weight(0, 1), 2.0);
        assert_eq!(w.weight(2, 0), 0.0);
        assert_eq!(w.isolated(), vec![2]);
        assert!(!w.is_symmetric(1e-12));
    }

    #[test]
    fn test_weight_sums_match_dense_definition() {
        let w = asymmetric();
        let n = w.len();
        let mut s1 = 0.0;
        let mut s2 = 0.0;
        for i in 0..n {
            let mut row = 0.0;
            let mut col = 0.0;
            for j in 0..n {
                let t = w.weight(i, j) + w.weight(j, i);
                s1 += t * t;
                row += w.weight(i, j);
                col += w.weight(j, i);
            }
            s2 += (row + col) * (row + col);
        }
        assert_relative_eq!(w.s0(), 4.0);
        assert_relative_eq!(w.s1(), s1 / 2.0, epsilon = 1e-12);
        assert_relative_eq!(w.s2(), s2, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_weights_dropped() {
        let w = NeighborWeights::from_rows(
            vec![vec![(1, 0.0)], vec![(0, 1.0)]],
            SpatialConcept::FixedDistanceBand,
            Some(1.0),
        );
        assert_eq!(w.neighbor_count(0), 0);
        assert_eq!(w.summary().isolated, 1);
    }

    #[test]
    fn test_without_self() {
        let w = NeighborWeights::from_rows(
            vec![vec![(0, 1.0), (1, 1.0)], vec![(0, 1.0), (1, 1.0)]],
            SpatialConcept::FixedDistanceBand,
            Some(1.0),
        );
        assert!(w.has_self(0));
        let off = w.without_self();
        assert!(!off.has_self(0) && !off.has_self(1));
        assert_eq!(off.s0(), 2.0);
    }

    #[test]
    fn test_lag() {
        let w = asymmetric();
        let lag = w.lag(&[1.0, 10.0, 100.0]);
        assert_eq!(lag, vec![20.0, 101.0, 0.0]);
    }
}
