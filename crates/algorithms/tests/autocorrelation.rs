//! End-to-end tests of the autocorrelation engine on small synthetic layouts.

use approx::assert_relative_eq;
use geostat_algorithms::statistics::{
    analyze_global, analyze_local, join_count, AnalysisConfig, AttributeVector, AutocorrelationStatistic,
    ClusterType, LeesParams, RogersonParams, Statistic, StatisticInput,
};
use geostat_algorithms::weights::{
    build_weights, standardize, Location, NeighborWeights, SpatialConcept, StandardizationMethod, WeightsConfig,
};
use geostat_core::{Error, Feature, FeatureCollection};

fn lattice(side: usize) -> Vec<Location> {
    (0..side * side)
        .map(|i| Location::new(i, (i % side) as f64, (i / side) as f64))
        .collect()
}

fn lattice_features(side: usize, value: impl Fn(usize) -> f64) -> FeatureCollection {
    (0..side * side)
        .map(|i| Feature::point((i % side) as f64, (i / side) as f64).with_property("value", value(i)))
        .collect()
}

fn queen(side: usize, method: StandardizationMethod) -> NeighborWeights {
    let raw = build_weights(&lattice(side), &WeightsConfig::distance_band(1.5)).unwrap();
    standardize(&raw, method)
}

// ---------------------------------------------------------------------------
// Known values
// ---------------------------------------------------------------------------

#[test]
fn row_gradient_on_lattice_is_strongly_clustered() {
    let features = lattice_features(5, |i| (i / 5) as f64);
    let config = AnalysisConfig {
        weights: WeightsConfig::distance_band(1.5),
        standardization: StandardizationMethod::Row,
        ..Default::default()
    };
    let r = analyze_global(&features, &Statistic::MoransI, "value", None, &config).unwrap();

    assert_relative_eq!(r.observed, 0.7493333333333329, epsilon = 1e-9);
    assert_relative_eq!(r.expected, -1.0 / 24.0, epsilon = 1e-12);
    assert_relative_eq!(r.variance, 0.0119128326745718, epsilon = 1e-9);
    assert_relative_eq!(r.z_score, 7.247178572616299, epsilon = 1e-6);
    assert!(r.p_value < 0.01);
    assert_eq!(r.weights.threshold, Some(1.5));
}

#[test]
fn checkerboard_moran_reference_values() {
    let w = queen(3, StandardizationMethod::None);
    let x = AttributeVector::new(
        "x",
        (0..9).map(|i| if (i % 3 + i / 3) % 2 == 0 { 1.0 } else { 0.0 }).collect(),
    );
    let r = Statistic::MoransI.global(StatisticInput::univariate(&x), &w).unwrap();
    assert_relative_eq!(r.observed, -0.19, epsilon = 1e-9);
    assert_relative_eq!(r.expected, -0.125, epsilon = 1e-12);
    assert_relative_eq!(r.z_score, -0.47582715691056154, epsilon = 1e-6);
}

// ---------------------------------------------------------------------------
// Weights invariants
// ---------------------------------------------------------------------------

#[test]
fn row_standardized_rows_sum_to_one() {
    let mut locations = lattice(4);
    locations.push(Location::new(16, 100.0, 100.0));
    let config = WeightsConfig {
        concept: SpatialConcept::InverseDistance,
        threshold: Some(2.0),
        ..Default::default()
    };
    let raw = build_weights(&locations, &config).unwrap();
    let w = standardize(&raw, StandardizationMethod::Row);

    for i in 0..w.len() {
        if raw.neighbors(i).is_empty() {
            assert_eq!(w.row_sum(i), 0.0);
        } else {
            assert_relative_eq!(w.row_sum(i), 1.0, epsilon = 1e-9);
        }
    }
    assert_eq!(w.isolated(), vec![16]);
}

#[test]
fn k_nearest_weights_are_not_symmetric() {
    let locations = vec![
        Location::new(0, 0.0, 0.0),
        Location::new(1, 1.0, 0.0),
        Location::new(2, 3.0, 0.0),
    ];
    let w = build_weights(&locations, &WeightsConfig::k_nearest(1)).unwrap();
    // 1 is 2's nearest neighbor, but 1's nearest is 0
    assert_eq!(w.weight(2, 1), 1.0);
    assert_eq!(w.weight(1, 2), 0.0);
    assert!(!w.is_symmetric(1e-12));

    let x = AttributeVector::new("x", vec![1.0, 2.0, 7.0]);
    let local = Statistic::MoransI
        .local(StatisticInput::univariate(&x), &w, Default::default())
        .unwrap();
    assert_eq!(local.len(), 3);
    assert!(local.iter().all(|r| r.z_score.is_finite()));
}

// ---------------------------------------------------------------------------
// Undefined inputs
// ---------------------------------------------------------------------------

#[test]
fn constant_field_is_an_error_for_every_statistic() {
    let w = queen(3, StandardizationMethod::Row);
    let flat = AttributeVector::new("flat", vec![2.0; 9]);
    let other = AttributeVector::new("y", (1..=9).map(f64::from).collect());

    let statistics = [
        Statistic::MoransI,
        Statistic::GearysC,
        Statistic::GetisOrdG,
        Statistic::LeesL(LeesParams::default()),
        Statistic::LeesS(LeesParams::default()),
        Statistic::JoinCount,
        Statistic::RogersonR(RogersonParams::default()),
    ];
    for statistic in statistics {
        let input = StatisticInput::bivariate(&flat, &other);
        let err = statistic.global(input, &w).unwrap_err();
        assert!(
            matches!(err, Error::ZeroVariance { .. }),
            "{}: {err:?}",
            statistic.name()
        );
        assert!(err.is_data());
    }
}

#[test]
fn general_g_rejects_non_positive_values_first() {
    let w = queen(3, StandardizationMethod::None);
    let x = AttributeVector::new("income", vec![4.0, 2.0, 0.0, 5.0, 1.0, 3.0, 2.0, -1.0, 6.0]);
    let err = Statistic::GetisOrdG.global(StatisticInput::univariate(&x), &w).unwrap_err();
    assert!(err.is_data());
    assert!(matches!(err, Error::NonPositiveValue { index: 2, .. }));
}

#[test]
fn missing_field_is_reported_by_name() {
    let features = lattice_features(3, |i| i as f64);
    let err = analyze_global(&features, &Statistic::MoransI, "nope", None, &AnalysisConfig::default()).unwrap_err();
    assert_eq!(err, Error::FieldNotFound { field: "nope".into() });
}

// ---------------------------------------------------------------------------
// Join counts
// ---------------------------------------------------------------------------

/// Every labelling of a complete graph has the same join counts, so the
/// closed-form expectations must equal the observed counts exactly.
#[test]
fn join_count_expectations_on_complete_graph() {
    for n in 4..=6 {
        let rows = (0..n).map(|i| (0..n).filter(|&j| j != i).map(|j| (j, 1.0)).collect()).collect();
        let w = NeighborWeights::from_rows(rows, SpatialConcept::FixedDistanceBand, None);
        for n1 in 1..n {
            let x = AttributeVector::new("b", (0..n).map(|i| if i < n1 { 1.0 } else { 0.0 }).collect());
            let jc = join_count(&x, &w).unwrap();
            let (b, wh) = (n1 as f64, (n - n1) as f64);
            assert_relative_eq!(jc.bb.expected, b * (b - 1.0) / 2.0, epsilon = 1e-9);
            assert_relative_eq!(jc.ww.expected, wh * (wh - 1.0) / 2.0, epsilon = 1e-9);
            assert_relative_eq!(jc.bw.expected, b * wh, epsilon = 1e-9);
            assert_eq!(jc.bb.observed, b * (b - 1.0) / 2.0);
            assert!(jc.bw.std_dev.abs() < 1e-6);
        }
    }
}

// ---------------------------------------------------------------------------
// Local annotation
// ---------------------------------------------------------------------------

#[test]
fn local_moran_marks_hot_corner() {
    let features = lattice_features(5, |i| if i % 5 < 2 && i / 5 < 2 { 10.0 } else { 1.0 });
    let config = AnalysisConfig {
        weights: WeightsConfig::distance_band(1.5),
        ..Default::default()
    };
    let out = analyze_local(&features, &Statistic::MoransI, "value", None, &config).unwrap();
    assert_eq!(out.results[0].cluster, ClusterType::HighHigh);
    for f in out.features.iter() {
        assert!(f.get_f64("LMiZScore").is_some());
        assert!(f.get_property("NumNbrs").is_some());
    }
}
