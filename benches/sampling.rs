use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use synthcol::{
    Alignment, Number, Shape, model::NoiseModel, redistribute, sample_number, seed,
};

fn redistribution(c: &mut Criterion) {
    let mut group = c.benchmark_group("redistribute");
    let freq = [1., 2., 3., 4., 5., 4., 3., 2., 1.];

    for size in [1_000, 100_000, 10_000_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut rng = seed::rng(0);
            b.iter(|| {
                redistribute(&freq, size as usize, Some(64), Alignment::Both, &mut rng).unwrap()
            });
        });
    }
}

fn numbers(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_number");
    let shape = Shape {
        relative_freq: Some(&[1., 3., 5., 3., 1.]),
        ..Shape::default()
    };

    for size in [1_000, 100_000, 1_000_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut rng = seed::rng(0);
            b.iter_with_large_drop(|| {
                sample_number(
                    Number::Float(-100.),
                    Number::Float(100.),
                    &shape,
                    size as usize,
                    &mut rng,
                )
                .unwrap()
            });
        });
    }
}

fn noise_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("noise_table");

    let size = 100_000;
    group
        .sample_size(10)
        .throughput(Throughput::Elements(size * 8));
    group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
        b.iter_with_large_drop(|| {
            NoiseModel::builder()
                .size(size as usize)
                .num_columns(8)
                .seed(0)
                .build()
                .build_table()
                .unwrap()
        });
    });
}

criterion_group!(benches, redistribution, numbers, noise_table);
criterion_main!(benches);
