//! Benchmarks for autocorrelation statistics and cluster scans

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geostat_algorithms::cluster::{gam, CancelFlag, CaseData, GamParams};
use geostat_algorithms::statistics::{
    AttributeVector, AutocorrelationStatistic, SignificanceLevel, Statistic, StatisticInput,
};
use geostat_algorithms::weights::{build_weights, standardize, Location, StandardizationMethod, WeightsConfig};

fn lattice(side: usize) -> Vec<Location> {
    (0..side * side)
        .map(|i| Location::new(i, (i % side) as f64, (i / side) as f64))
        .collect()
}

fn surface(side: usize) -> AttributeVector {
    let values = (0..side * side)
        .map(|i| {
            let (col, row) = (i % side, i / side);
            (row + col) as f64 + ((row * 7 + col * 13) % 100) as f64 / 10.0 + 1.0
        })
        .collect();
    AttributeVector::new("value", values)
}

fn bench_global(c: &mut Criterion) {
    let mut group = c.benchmark_group("global");

    for side in [32, 64, 128].iter() {
        let raw = build_weights(&lattice(*side), &WeightsConfig::distance_band(1.5)).unwrap();
        let w = standardize(&raw, StandardizationMethod::Row);
        let x = surface(*side);

        for statistic in [Statistic::MoransI, Statistic::GearysC] {
            group.bench_with_input(BenchmarkId::new(statistic.name(), side * side), side, |b, _| {
                b.iter(|| statistic.global(StatisticInput::univariate(black_box(&x)), &w).unwrap())
            });
        }
    }

    group.finish();
}

fn bench_local(c: &mut Criterion) {
    let mut group = c.benchmark_group("local");

    for side in [32, 64, 128].iter() {
        let w = build_weights(&lattice(*side), &WeightsConfig::distance_band(1.5)).unwrap();
        let x = surface(*side);

        for statistic in [Statistic::MoransI, Statistic::GetisOrdG] {
            group.bench_with_input(BenchmarkId::new(statistic.name(), side * side), side, |b, _| {
                b.iter(|| {
                    statistic
                        .local(StatisticInput::univariate(black_box(&x)), &w, SignificanceLevel::NinetyFive)
                        .unwrap()
                })
            });
        }
    }

    group.finish();
}

fn bench_gam(c: &mut Criterion) {
    let mut group = c.benchmark_group("gam");
    group.sample_size(10);

    for side in [16, 32].iter() {
        let n = side * side;
        let cases = (0..n).map(|i| ((i * 7) % 5) as f64).collect();
        let data = CaseData::new(lattice(*side), cases, vec![100.0; n]).unwrap();
        let params = GamParams {
            min_radius: Some(1.0),
            max_radius: Some(3.0),
            radius_increment: Some(1.0),
            ..Default::default()
        };

        group.bench_with_input(BenchmarkId::from_parameter(n), side, |b, _| {
            b.iter(|| gam(black_box(&data), &params, &CancelFlag::new()).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_global, bench_local, bench_gam);
criterion_main!(benches);
