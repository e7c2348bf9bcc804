use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use example_runner::comparison::Comparator;
use example_runner::config::ToleranceConfig;
use example_runner::dataset::{Dataset, DatasetCollection};
use std::hint::black_box;

fn collection(rows: usize, columns: usize, offset: f64) -> DatasetCollection {
    let data = (0..rows)
        .map(|r| {
            (0..columns)
                .map(|c| (r as f64 * 0.01).sin() * (c + 1) as f64 + offset)
                .collect()
        })
        .collect();
    let labels = (0..columns).map(|c| format!("q{}", c)).collect();
    let mut collection = DatasetCollection::new();
    collection.insert("bench/state", Dataset::from_rows("bench/state", data, None, labels).unwrap());
    collection
}

fn bench_compare(c: &mut Criterion) {
    let comparator = Comparator::new(ToleranceConfig::default(), 200);
    let mut group = c.benchmark_group("compare");
    for rows in [1_000usize, 10_000] {
        let reference = collection(rows, 16, 0.0);
        let equal = reference.clone();
        let deviating = collection(rows, 16, 1e-3);

        group.bench_with_input(BenchmarkId::new("equal", rows), &rows, |b, _| {
            b.iter(|| comparator.compare("MBS.dataset.json", black_box(&reference), black_box(&equal)))
        });
        group.bench_with_input(BenchmarkId::new("deviating", rows), &rows, |b, _| {
            b.iter(|| comparator.compare("MBS.dataset.json", black_box(&reference), black_box(&deviating)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compare);
criterion_main!(benches);
