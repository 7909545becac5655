//! Feature-level analysis pipeline
//!
//! Extract locations and attribute values from a [`FeatureCollection`],
//! build and standardize the weights, run one statistic, and either return
//! the global record or write the local results back onto the features.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use geostat_core::{AttributeValue, Error, ErrorCategory, FeatureCollection, Result};

use super::{
    AutocorrelationResult, AutocorrelationStatistic, ClusterType, JoinCountResult, LocalResult, MissingValuePolicy,
    SignificanceLevel, SpatialDataset, Statistic, StatisticInput, WeightsEcho, NUM_NEIGHBORS_COLUMN,
};
use crate::weights::{build_weights, standardize, NeighborWeights, StandardizationMethod, WeightsConfig};

/// How failures of a global statistic are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Every error reaches the caller
    #[default]
    Strict,
    /// Data and numerical errors become a placeholder result (`placeholder = true`).
    /// Configuration errors are still returned.
    Lenient,
}

/// Configuration of one analysis run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub weights: WeightsConfig,
    pub standardization: StandardizationMethod,
    /// Confidence level for local cluster typing
    pub confidence: SignificanceLevel,
    pub missing_values: MissingValuePolicy,
    pub error_policy: ErrorPolicy,
}

impl AnalysisConfig {
    /// Configuration echo for results produced before weights exist
    fn echo(&self) -> WeightsEcho {
        WeightsEcho {
            concept: self.weights.concept,
            distance_method: self.weights.distance_method,
            standardization: self.standardization,
            threshold: self.weights.threshold,
        }
    }
}

/// Output of [`analyze_local`]
#[derive(Debug, Clone)]
pub struct LocalAnalysis {
    /// Input features with the result columns added. Dropped features are
    /// carried through without annotation.
    pub features: FeatureCollection,
    /// One result per analysed location
    pub results: Vec<LocalResult>,
    /// Source feature index of each entry in `results`
    pub feature_indices: Vec<usize>,
    pub weights: WeightsEcho,
}

impl LocalAnalysis {
    /// Number of locations classified as a cluster or outlier
    pub fn significant_count(&self) -> usize {
        self.results.iter().filter(|r| r.cluster != ClusterType::NotSignificant).count()
    }
}

fn prepare(
    features: &FeatureCollection,
    statistic: &Statistic,
    primary: &str,
    secondary: Option<&str>,
    config: &AnalysisConfig,
) -> Result<(SpatialDataset, NeighborWeights)> {
    config.weights.validate()?;
    let secondary = if statistic.is_bivariate() {
        Some(secondary.ok_or(Error::MissingField("second attribute field"))?)
    } else {
        None
    };

    let dataset = SpatialDataset::from_features(features, primary, secondary, config.missing_values)?;
    let raw = build_weights(&dataset.locations, &config.weights)?;
    let weights = standardize(&raw, config.standardization);
    debug!(
        statistic = statistic.name(),
        locations = dataset.len(),
        dropped = dataset.dropped.len(),
        "prepared analysis input"
    );
    Ok((dataset, weights))
}

fn input(dataset: &SpatialDataset) -> StatisticInput<'_> {
    StatisticInput {
        primary: &dataset.primary,
        secondary: dataset.secondary.as_ref(),
    }
}

/// Run the global form of `statistic` over a feature collection.
///
/// `secondary` names the second field of the bivariate statistics (Lee's L:
/// the y variable; Rogerson's R: the population at risk) and is ignored by
/// the others.
pub fn analyze_global(
    features: &FeatureCollection,
    statistic: &Statistic,
    primary: &str,
    secondary: Option<&str>,
    config: &AnalysisConfig,
) -> Result<AutocorrelationResult> {
    let outcome = prepare(features, statistic, primary, secondary, config)
        .and_then(|(dataset, weights)| statistic.global(input(&dataset), &weights));

    match outcome {
        Err(e) if config.error_policy == ErrorPolicy::Lenient && recoverable(&e) => {
            warn!(statistic = statistic.name(), error = %e, "substituting placeholder result");
            Ok(AutocorrelationResult::placeholder(statistic.name(), config.echo()))
        }
        Ok(result) => {
            debug!(
                statistic = result.statistic,
                observed = result.observed,
                z = result.z_score,
                p = result.p_value,
                "global result"
            );
            Ok(result)
        }
        Err(e) => Err(e),
    }
}

fn recoverable(e: &Error) -> bool {
    matches!(e.category(), ErrorCategory::Data | ErrorCategory::Numerical)
}

/// BB / WW / BW join counts of a binary field (non-zero or `true` is black)
pub fn analyze_join_count(
    features: &FeatureCollection,
    field: &str,
    config: &AnalysisConfig,
) -> Result<JoinCountResult> {
    let (dataset, weights) = prepare(features, &Statistic::JoinCount, field, None, config)?;
    super::join_count(&dataset.primary, &weights)
}

/// Run the local form of `statistic` and annotate the features.
///
/// Columns follow [`Statistic::local_columns`]; every analysed feature also
/// gets [`NUM_NEIGHBORS_COLUMN`]. Errors are always returned.
pub fn analyze_local(
    features: &FeatureCollection,
    statistic: &Statistic,
    primary: &str,
    secondary: Option<&str>,
    config: &AnalysisConfig,
) -> Result<LocalAnalysis> {
    let (dataset, weights) = prepare(features, statistic, primary, secondary, config)?;
    let results = statistic.local(input(&dataset), &weights, config.confidence)?;

    let columns = statistic.local_columns();
    let mut annotated = features.clone();
    for (loc, r) in dataset.locations.iter().zip(&results) {
        let feature = &mut annotated.features[loc.feature];
        if let Some(name) = columns.index {
            feature.set_property(name, r.index);
        }
        feature.set_property(columns.z_score, r.z_score);
        feature.set_property(columns.p_value, r.p_value);
        if let Some(name) = columns.cluster {
            feature.set_property(name, r.cluster.code());
        }
        if let Some(name) = columns.bin {
            feature.set_property(name, AttributeValue::Int(i64::from(r.bin.0)));
        }
        feature.set_property(NUM_NEIGHBORS_COLUMN, AttributeValue::Int(r.num_neighbors as i64));
    }

    let analysis = LocalAnalysis {
        features: annotated,
        feature_indices: dataset.locations.iter().map(|l| l.feature).collect(),
        results,
        weights: WeightsEcho::from(&weights),
    };
    debug!(
        statistic = statistic.name(),
        significant = analysis.significant_count(),
        "local analysis complete"
    );
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::{LeesParams, RogersonParams};
    use crate::weights::SpatialConcept;
    use geostat_core::Feature;

    fn lattice_features(side: usize, value: impl Fn(usize) -> f64) -> FeatureCollection {
        (0..side * side)
            .map(|i| {
                Feature::point((i % side) as f64, (i / side) as f64)
                    .with_property("x", value(i))
                    .with_property("pop", 100.0 + i as f64)
            })
            .collect()
    }

    fn hot_corner(i: usize) -> f64 {
        if i % 5 < 2 && i / 5 < 2 {
            10.0
        } else {
            1.0
        }
    }

    fn band(t: f64) -> AnalysisConfig {
        AnalysisConfig {
            weights: WeightsConfig::distance_band(t),
            ..Default::default()
        }
    }

    #[test]
    fn test_global_echoes_configuration() {
        let fc = lattice_features(5, |i| (i / 5) as f64);
        let r = analyze_global(&fc, &Statistic::MoransI, "x", None, &band(1.5)).unwrap();
        assert_eq!(r.n, 25);
        assert_eq!(r.weights.concept, SpatialConcept::FixedDistanceBand);
        assert_eq!(r.weights.standardization, StandardizationMethod::Row);
        assert_eq!(r.weights.threshold, Some(1.5));
        assert!(!r.placeholder);
        assert!(r.observed > 0.0);
    }

    #[test]
    fn test_strict_surfaces_zero_variance() {
        let fc = lattice_features(3, |_| 4.0);
        let err = analyze_global(&fc, &Statistic::GearysC, "x", None, &band(1.5)).unwrap_err();
        assert!(matches!(err, Error::ZeroVariance { .. }));
    }

    #[test]
    fn test_lenient_substitutes_placeholder() {
        let fc = lattice_features(3, |_| 4.0);
        let config = AnalysisConfig {
            error_policy: ErrorPolicy::Lenient,
            ..band(1.5)
        };
        let r = analyze_global(&fc, &Statistic::GearysC, "x", None, &config).unwrap();
        assert!(r.placeholder);
        assert_eq!(r.p_value, 1.0);
        assert!(!r.is_significant(SignificanceLevel::Ninety));
    }

    #[test]
    fn test_lenient_keeps_configuration_errors() {
        let fc = lattice_features(3, |i| i as f64);
        let config = AnalysisConfig {
            weights: WeightsConfig::k_nearest(0),
            error_policy: ErrorPolicy::Lenient,
            ..Default::default()
        };
        let err = analyze_global(&fc, &Statistic::MoransI, "x", None, &config).unwrap_err();
        assert!(err.is_configuration());

        let err = analyze_global(&fc, &Statistic::LeesL(LeesParams::default()), "x", None, &config).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_bivariate_uses_secondary_field() {
        let fc = lattice_features(3, |i| 1.0 + (i % 3) as f64);
        let r = analyze_global(
            &fc,
            &Statistic::RogersonR(RogersonParams::default()),
            "x",
            Some("pop"),
            &band(1.5),
        )
        .unwrap();
        assert_eq!(r.statistic, "Rogerson's R");
        assert!(r.variance > 0.0);
    }

    #[test]
    fn test_local_annotates_features() {
        let fc = lattice_features(5, hot_corner);
        let out = analyze_local(&fc, &Statistic::MoransI, "x", None, &band(1.5)).unwrap();
        assert_eq!(out.results.len(), 25);
        assert_eq!(out.results[0].cluster, ClusterType::HighHigh);

        let f0 = &out.features.features[0];
        assert!(f0.get_f64("LMiIndex").unwrap() > 0.0);
        assert!(f0.get_f64("LMiZScore").unwrap() > 1.96);
        assert_eq!(f0.get_property("COType"), Some(&AttributeValue::String("HH".into())));
        assert_eq!(f0.get_property("NumNbrs"), Some(&AttributeValue::Int(3)));
        assert!(out.significant_count() >= 1);
    }

    #[test]
    fn test_local_getis_ord_columns() {
        let fc = lattice_features(5, hot_corner);
        let out = analyze_local(&fc, &Statistic::GetisOrdG, "x", None, &band(1.5)).unwrap();
        let f0 = &out.features.features[0];
        assert_eq!(f0.get_property("GiBin"), Some(&AttributeValue::Int(3)));
        assert!(f0.get_property("COType").is_none());
        assert!(f0.get_property("LMiIndex").is_none());
    }

    #[test]
    fn test_dropped_features_are_not_annotated() {
        let mut fc = lattice_features(3, |i| i as f64);
        fc.features[4].set_property("x", AttributeValue::Null);
        let config = AnalysisConfig {
            missing_values: MissingValuePolicy::Drop,
            ..band(1.5)
        };
        let out = analyze_local(&fc, &Statistic::MoransI, "x", None, &config).unwrap();
        assert_eq!(out.results.len(), 8);
        assert!(!out.feature_indices.contains(&4));
        assert!(out.features.features[4].get_property("LMiIndex").is_none());
        assert!(out.features.features[5].get_property("LMiIndex").is_some());
    }

    #[test]
    fn test_join_count_from_boolean_field() {
        let fc: FeatureCollection = (0..9)
            .map(|i| Feature::point((i % 3) as f64, (i / 3) as f64).with_property("b", (i % 3 + i / 3) % 2 == 0))
            .collect();
        let jc = analyze_join_count(&fc, "b", &band(1.0)).unwrap();
        assert_eq!((jc.black, jc.white), (5, 4));
        assert_eq!(jc.bw.observed, 12.0);
    }
}
