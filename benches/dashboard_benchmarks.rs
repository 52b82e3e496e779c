use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use happiness_dashboard::controls::{default_cluster_features, ClusterFeature};
use happiness_dashboard::*;
use std::fmt::Write;
use std::sync::Arc;

const SIZES: [usize; 3] = [150, 1000, 10000];

fn record(i: usize) -> CountryRecord {
    let t = (i % 97) as f64 / 97.0;
    CountryRecord {
        country: format!("Country {}", i),
        ladder_score: 2.0 + 6.0 * t,
        logged_gdp: 7.0 + 4.5 * ((i % 89) as f64 / 89.0),
        social_support: 0.3 + 0.6 * t,
        healthy_life_expectancy: 50.0 + 25.0 * ((i % 83) as f64 / 83.0),
        freedom: 0.4 + 0.5 * ((i % 79) as f64 / 79.0),
        generosity: -0.2 + 0.5 * ((i % 73) as f64 / 73.0),
        corruption: 0.1 + 0.8 * ((i % 71) as f64 / 71.0),
    }
}

fn synthetic_table(size: usize) -> Arc<Table> {
    let records: Vec<CountryRecord> = (0..size).map(record).collect();
    Arc::new(Table::from_records("bench", &records))
}

fn synthetic_csv(size: usize) -> String {
    let mut csv = String::from(
        "Country name,Ladder score,Logged GDP per capita,Social support,Healthy life expectancy,\
         Freedom to make life choices,Generosity,Perceptions of corruption\n",
    );
    for i in 0..size {
        let r = record(i);
        // Every tenth row misses its corruption score
        let corruption = if i % 10 == 0 {
            String::new()
        } else {
            r.corruption.to_string()
        };
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{},{}",
            r.country,
            r.ladder_score,
            r.logged_gdp,
            r.social_support,
            r.healthy_life_expectancy,
            r.freedom,
            r.generosity,
            corruption
        );
    }
    csv
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("dataset_load");

    for size in SIZES.iter() {
        let csv = synthetic_csv(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &csv, |b, csv| {
            b.iter(|| dataset::load_from_reader(black_box(csv.as_bytes())).unwrap());
        });
    }
    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_by_criteria");
    let criteria = FilterCriteria {
        happiness: Range::new(3.0, 8.0),
        gdp: Range::new(7.0, 11.5),
    };

    for size in SIZES.iter() {
        let table = synthetic_table(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &table, |b, table| {
            b.iter(|| {
                FilterView::by_criteria("bench", Arc::clone(table), black_box(&criteria))
                    .unwrap()
                    .materialize()
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_cluster(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster");
    group.sample_size(20);
    let features: Vec<ClusterFeature> = default_cluster_features().into_iter().collect();

    for size in SIZES.iter() {
        let table = synthetic_table(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &table, |b, table| {
            b.iter(|| cluster::cluster(table, black_box(&features), 4).unwrap());
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_all");
    group.sample_size(20);

    for size in SIZES.iter() {
        let table = synthetic_table(*size);

        group.bench_with_input(BenchmarkId::new("cold", size), &table, |b, table| {
            b.iter(|| Dashboard::new(Arc::clone(table)).render_all());
        });

        let dashboard = Dashboard::new(Arc::clone(&table));
        dashboard.render_all();
        group.bench_with_input(BenchmarkId::new("memoized", size), &dashboard, |b, dashboard| {
            b.iter(|| dashboard.render_all());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_load, bench_filter, bench_cluster, bench_render);

criterion_main!(benches);
