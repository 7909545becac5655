//! geostat CLI - spatial autocorrelation and cluster detection

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geo_types::{Geometry, LineString, Point, Polygon};
use geostat_algorithms::cluster::{
    besag_newell, gam, BesagNewellParams, CancelFlag, CaseData, ClusterResult, DensityParams, FitnessFunction,
    GamParams,
};
use geostat_algorithms::statistics::{
    analyze_global, analyze_join_count, analyze_local, AnalysisConfig, AutocorrelationStatistic, ErrorPolicy,
    LeesParams, MissingValuePolicy, RogersonParams, SignificanceLevel, Statistic,
};
use geostat_algorithms::weights::{
    build_weights, standardize, ContiguityType, DistanceMethod, SpatialConcept, StandardizationMethod,
    WeightsConfig,
};
use geostat_core::{AttributeValue, Feature, FeatureCollection};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geostat")]
#[command(author, version, about = "Spatial autocorrelation and cluster detection", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the neighbor structure of a feature file
    Weights {
        /// Input JSON feature list
        input: PathBuf,
        #[command(flatten)]
        weights: WeightsArgs,
    },
    /// Global statistic (one result record)
    Global {
        #[command(flatten)]
        stat: StatArgs,
        /// Replace data/numerical failures with a placeholder result
        #[arg(long)]
        lenient: bool,
    },
    /// Local statistic (features annotated with result columns)
    Local {
        #[command(flatten)]
        stat: StatArgs,
        /// Confidence level for cluster typing: 90, 95, 99
        #[arg(short, long, default_value = "95")]
        confidence: u8,
    },
    /// BB / WW / BW join counts of a binary field
    JoinCount {
        /// Input JSON feature list
        input: PathBuf,
        /// Binary field (non-zero or true is black)
        #[arg(short, long)]
        field: String,
        #[command(flatten)]
        weights: WeightsArgs,
    },
    /// Besag-Newell cluster test
    BesagNewell {
        #[command(flatten)]
        cases: CaseArgs,
        /// Population each circle must reach
        #[arg(short, long, default_value = "1000")]
        k: f64,
    },
    /// Openshaw's Geographical Analysis Machine
    Gam {
        #[command(flatten)]
        cases: CaseArgs,
        /// Smallest radius (default: extent / 30)
        #[arg(long)]
        min_radius: Option<f64>,
        /// Largest radius (default: 3 x min radius)
        #[arg(long)]
        max_radius: Option<f64>,
        /// Radius step (default: extent / 30)
        #[arg(long)]
        radius_increment: Option<f64>,
        /// Maximum overlap ratio between accepted circles
        #[arg(long, default_value = "0.5")]
        overlap: f64,
        /// Grid spacing as a fraction of the radius
        #[arg(long, default_value = "0.2")]
        grid_factor: f64,
    },
}

#[derive(Args)]
struct WeightsArgs {
    /// Spatial concept: band, inverse, inverse-squared, zone, knn, queen, rook, bishop
    #[arg(long, default_value = "band")]
    concept: String,
    /// Distance method: euclidean, manhattan
    #[arg(long, default_value = "euclidean")]
    distance: String,
    /// Distance threshold (default: largest nearest-neighbor distance)
    #[arg(short, long)]
    threshold: Option<f64>,
    /// Neighbor count for knn
    #[arg(short, long, default_value = "8")]
    k: usize,
    /// Include each location as its own neighbor
    #[arg(long)]
    self_neighbors: bool,
    /// Standardization: row, none
    #[arg(long, default_value = "row")]
    standardization: String,
}

#[derive(Args)]
struct StatArgs {
    /// Input JSON feature list
    input: PathBuf,
    /// Statistic: moran, geary, getis-ord, lees-l, lees-s, rogerson, join-count
    #[arg(short, long)]
    statistic: String,
    /// Attribute field (cases for rogerson)
    #[arg(short, long)]
    field: String,
    /// Second field (y for lees-l, population for rogerson)
    #[arg(long)]
    second: Option<String>,
    /// Drop features with missing values instead of failing
    #[arg(long)]
    drop_missing: bool,
    /// Permutations for Lee's statistics
    #[arg(long, default_value = "999")]
    permutations: usize,
    /// Random seed for Lee's statistics
    #[arg(long, default_value = "42")]
    seed: u64,
    /// Weight decay power for Rogerson's R
    #[arg(long, default_value = "1.0")]
    kappa: f64,
    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[command(flatten)]
    weights: WeightsArgs,
}

#[derive(Args)]
struct CaseArgs {
    /// Input JSON feature list
    input: PathBuf,
    /// Case count field
    #[arg(long)]
    cases: String,
    /// Population field
    #[arg(long)]
    population: String,
    /// Significance threshold
    #[arg(long, default_value = "0.01")]
    threshold: f64,
    /// Fitness function: poisson, binomial
    #[arg(long, default_value = "poisson")]
    fitness: String,
    /// Density raster cell size (default: extent / 250)
    #[arg(long)]
    cell_size: Option<f64>,
    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

// ─── JSON feature format ────────────────────────────────────────────────

/// One input/output feature: a point (`x`, `y`) or a polygon ring
#[derive(Clone, Serialize, Deserialize)]
struct JsonFeature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y: Option<f64>,
    /// Exterior ring as [x, y] pairs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    polygon: Option<Vec<(f64, f64)>>,
    #[serde(default)]
    properties: HashMap<String, AttributeValue>,
}

impl JsonFeature {
    fn into_feature(self) -> Feature {
        let geometry: Option<Geometry<f64>> = match (self.polygon, self.x, self.y) {
            (Some(ring), _, _) => Some(Polygon::new(LineString::from(ring), vec![]).into()),
            (None, Some(x), Some(y)) => Some(Point::new(x, y).into()),
            _ => None,
        };
        Feature {
            geometry,
            properties: self.properties,
            id: self.id,
        }
    }
}

fn read_features(path: &Path) -> Result<(Vec<JsonFeature>, FeatureCollection)> {
    let pb = spinner("Reading features...");
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let raw: Vec<JsonFeature> = serde_json::from_str(&text).context("Failed to parse feature list")?;
    let features: FeatureCollection = raw.iter().cloned().map(JsonFeature::into_feature).collect();
    pb.finish_and_clear();
    info!("Input: {} features", features.len());
    Ok((raw, features))
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Output saved to: {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn done(name: &str, elapsed: std::time::Duration) {
    info!("{} finished in {:.2?}", name, elapsed);
}

impl WeightsArgs {
    fn config(&self) -> Result<(WeightsConfig, StandardizationMethod)> {
        let concept = match self.concept.to_lowercase().as_str() {
            "band" | "fixed" | "fixed-distance-band" => SpatialConcept::FixedDistanceBand,
            "inverse" | "idw" | "inverse-distance" => SpatialConcept::InverseDistance,
            "inverse-squared" | "inverse-distance-squared" => SpatialConcept::InverseDistanceSquared,
            "zone" | "zone-of-indifference" => SpatialConcept::ZoneOfIndifference,
            "knn" | "k-nearest" => SpatialConcept::KNearestNeighbors,
            "queen" => SpatialConcept::Contiguity(ContiguityType::Queen),
            "rook" => SpatialConcept::Contiguity(ContiguityType::Rook),
            "bishop" => SpatialConcept::Contiguity(ContiguityType::Bishop),
            other => anyhow::bail!("Unknown concept: {}. Use band, inverse, inverse-squared, zone, knn, queen, rook or bishop.", other),
        };
        let distance_method = match self.distance.to_lowercase().as_str() {
            "euclidean" | "e" => DistanceMethod::Euclidean,
            "manhattan" | "m" => DistanceMethod::Manhattan,
            other => anyhow::bail!("Unknown distance method: {}. Use euclidean or manhattan.", other),
        };
        let standardization = match self.standardization.to_lowercase().as_str() {
            "row" | "r" => StandardizationMethod::Row,
            "none" | "n" => StandardizationMethod::None,
            other => anyhow::bail!("Unknown standardization: {}. Use row or none.", other),
        };
        let config = WeightsConfig {
            concept,
            distance_method,
            threshold: self.threshold,
            k: self.k,
            self_neighbors: self.self_neighbors,
        };
        Ok((config, standardization))
    }
}

impl StatArgs {
    fn statistic(&self) -> Result<Statistic> {
        let lees = LeesParams {
            permutations: self.permutations,
            seed: self.seed,
        };
        Ok(match self.statistic.to_lowercase().as_str() {
            "moran" | "morans-i" | "i" => Statistic::MoransI,
            "geary" | "gearys-c" | "c" => Statistic::GearysC,
            "getis-ord" | "g" | "gi" => Statistic::GetisOrdG,
            "lees-l" | "l" => Statistic::LeesL(lees),
            "lees-s" | "s" => Statistic::LeesS(lees),
            "rogerson" | "r" => Statistic::RogersonR(RogersonParams { kappa: self.kappa }),
            "join-count" | "jc" => Statistic::JoinCount,
            other => anyhow::bail!(
                "Unknown statistic: {}. Use moran, geary, getis-ord, lees-l, lees-s, rogerson or join-count.",
                other
            ),
        })
    }

    fn analysis_config(&self) -> Result<AnalysisConfig> {
        let (weights, standardization) = self.weights.config()?;
        Ok(AnalysisConfig {
            weights,
            standardization,
            missing_values: if self.drop_missing {
                MissingValuePolicy::Drop
            } else {
                MissingValuePolicy::Fail
            },
            ..Default::default()
        })
    }
}

impl CaseArgs {
    fn fitness(&self) -> Result<FitnessFunction> {
        Ok(match self.fitness.to_lowercase().as_str() {
            "poisson" | "p" => FitnessFunction::Poisson,
            "binomial" | "b" => FitnessFunction::Binomial,
            other => anyhow::bail!("Unknown fitness function: {}. Use poisson or binomial.", other),
        })
    }

    fn data(&self) -> Result<CaseData> {
        let (_, features) = read_features(&self.input)?;
        CaseData::from_features(&features, &self.cases, &self.population, MissingValuePolicy::Fail)
            .context("Failed to read case and population fields")
    }
}

fn parse_confidence(level: u8) -> Result<SignificanceLevel> {
    Ok(match level {
        90 => SignificanceLevel::Ninety,
        95 => SignificanceLevel::NinetyFive,
        99 => SignificanceLevel::NinetyNine,
        other => anyhow::bail!("Unknown confidence level: {}. Use 90, 95 or 99.", other),
    })
}

/// JSON summary of a cluster scan
#[derive(Serialize)]
struct ClusterReport<'a> {
    method: &'static str,
    case_rate: f64,
    evaluated: usize,
    cancelled: bool,
    candidates: &'a [geostat_algorithms::cluster::ClusterCandidate],
    density: Option<DensityReport>,
}

#[derive(Serialize)]
struct DensityReport {
    rows: usize,
    cols: usize,
    cell_size: f64,
    bounds: (f64, f64, f64, f64),
    max_coverage: f64,
}

fn report<'a>(method: &'static str, result: &'a ClusterResult) -> ClusterReport<'a> {
    ClusterReport {
        method,
        case_rate: result.case_rate,
        evaluated: result.evaluated,
        cancelled: result.cancelled,
        candidates: &result.candidates,
        density: result.density.as_ref().map(|d| DensityReport {
            rows: d.rows(),
            cols: d.cols(),
            cell_size: d.cell_size(),
            bounds: d.bounds(),
            max_coverage: d.data().iter().copied().fold(0.0, f64::max),
        }),
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Weights { input, weights } => {
            let (_, features) = read_features(&input)?;
            let (config, method) = weights.config()?;
            let start = Instant::now();
            let dataset = features
                .iter()
                .enumerate()
                .map(|(i, f)| geostat_algorithms::weights::Location::from_feature(i, f))
                .collect::<geostat_core::Result<Vec<_>>>()
                .context("Failed to extract locations")?;
            let w = standardize(&build_weights(&dataset, &config).context("Failed to build weights")?, method);
            done("Weights", start.elapsed());

            #[derive(Serialize)]
            struct WeightsReport {
                locations: usize,
                concept: &'static str,
                threshold: Option<f64>,
                s0: f64,
                symmetric: bool,
                neighbors: geostat_algorithms::weights::NeighborSummary,
                isolated: Vec<usize>,
            }
            write_json(
                &WeightsReport {
                    locations: w.len(),
                    concept: w.concept().name(),
                    threshold: w.threshold(),
                    s0: w.s0(),
                    symmetric: w.is_symmetric(1e-12),
                    neighbors: w.summary(),
                    isolated: w.isolated(),
                },
                None,
            )?;
        }

        Commands::Global { stat, lenient } => {
            let (_, features) = read_features(&stat.input)?;
            let statistic = stat.statistic()?;
            let mut config = stat.analysis_config()?;
            if lenient {
                config.error_policy = ErrorPolicy::Lenient;
            }
            let start = Instant::now();
            let result = analyze_global(&features, &statistic, &stat.field, stat.second.as_deref(), &config)
                .with_context(|| format!("Failed to compute {}", statistic.name()))?;
            done(statistic.name(), start.elapsed());
            info!("\n{}", result);
            write_json(&result, stat.output.as_deref())?;
        }

        Commands::Local { stat, confidence } => {
            let (raw, features) = read_features(&stat.input)?;
            let statistic = stat.statistic()?;
            let config = AnalysisConfig {
                confidence: parse_confidence(confidence)?,
                ..stat.analysis_config()?
            };
            let start = Instant::now();
            let pb = spinner(&format!("Computing local {}...", statistic.name()));
            let analysis = analyze_local(&features, &statistic, &stat.field, stat.second.as_deref(), &config)
                .with_context(|| format!("Failed to compute local {}", statistic.name()))?;
            pb.finish_and_clear();
            done(statistic.name(), start.elapsed());
            info!(
                "{} of {} locations significant",
                analysis.significant_count(),
                analysis.results.len()
            );

            let annotated: Vec<JsonFeature> = raw
                .into_iter()
                .zip(analysis.features)
                .map(|(mut json, feature)| {
                    json.properties = feature.properties;
                    json
                })
                .collect();
            write_json(&annotated, stat.output.as_deref())?;
        }

        Commands::JoinCount { input, field, weights } => {
            let (_, features) = read_features(&input)?;
            let (weights, standardization) = weights.config()?;
            let config = AnalysisConfig {
                weights,
                standardization,
                ..Default::default()
            };
            let start = Instant::now();
            let result = analyze_join_count(&features, &field, &config).context("Failed to compute join counts")?;
            done("Join Count", start.elapsed());
            write_json(&result, None)?;
        }

        Commands::BesagNewell { cases, k } => {
            let data = cases.data()?;
            let params = BesagNewellParams {
                k,
                threshold: cases.threshold,
                fitness: cases.fitness()?,
                density: DensityParams {
                    cell_size: cases.cell_size,
                },
            };
            let start = Instant::now();
            let pb = spinner("Scanning circles...");
            let result = besag_newell(&data, &params, &CancelFlag::new()).context("Besag-Newell scan failed")?;
            pb.finish_and_clear();
            done("Besag-Newell", start.elapsed());
            info!("{} clusters from {} circles", result.candidates.len(), result.evaluated);
            write_json(&report("Besag-Newell", &result), cases.output.as_deref())?;
        }

        Commands::Gam {
            cases,
            min_radius,
            max_radius,
            radius_increment,
            overlap,
            grid_factor,
        } => {
            let data = cases.data()?;
            let params = GamParams {
                min_radius,
                max_radius,
                radius_increment,
                overlap_ratio: overlap,
                grid_factor,
                threshold: cases.threshold,
                fitness: cases.fitness()?,
                density: DensityParams {
                    cell_size: cases.cell_size,
                },
            };
            let start = Instant::now();
            let pb = spinner("Scanning circles...");
            let result = gam(&data, &params, &CancelFlag::new()).context("GAM scan failed")?;
            pb.finish_and_clear();
            done("GAM", start.elapsed());
            info!("{} clusters from {} circles", result.candidates.len(), result.evaluated);
            write_json(&report("GAM", &result), cases.output.as_deref())?;
        }
    }

    Ok(())
}
