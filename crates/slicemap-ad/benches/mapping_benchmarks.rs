//! Performance benchmarks for column mapping
//!
//! Benchmarks forward mapping and backward passes of the dynamic, static and
//! parallel differentiable mappers

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use slicemap_ad::{map_cols, map_cols_parallel, map_cols_static};
use slicemap_core::{Matrix, Scalar, SliceFn};
use slicemap_exec::{map_static_columns, par_map_static_columns, ParallelConfig};
use std::hint::black_box;

/// Small dense layer on 4-vectors
struct Layer;

impl SliceFn<f64> for Layer {
    fn apply<S: Scalar<f64>>(&self, x: &[S]) -> anyhow::Result<Vec<S>> {
        let a = (x[0].clone() * x[1].clone() - x[2].clone()).tanh();
        let b = (x[3].clone() + x[0].clone() * S::from_f64(0.5)).sin();
        Ok(vec![a.clone() * b.clone(), a + x[3].exp(), b.powi(2)])
    }
}

fn input(batch: usize) -> Matrix<f64> {
    Matrix::from_fn(4, batch, |row, col| ((row * 31 + col * 7) % 17) as f64 * 0.1 - 0.8)
}

/// Benchmark the plain forward mappers
fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward");

    for batch in [256, 4096, 65536].iter() {
        group.throughput(Throughput::Elements(*batch as u64));
        let m = input(*batch);

        group.bench_with_input(BenchmarkId::new("sequential", batch), &m, |bencher, m| {
            bencher.iter(|| {
                let out =
                    map_static_columns(|x: &[f64; 4]| Layer.apply(x.as_slice()), black_box(m)).unwrap();
                black_box(out);
            });
        });

        let config = ParallelConfig::new().with_workers(4);
        group.bench_with_input(BenchmarkId::new("parallel_4", batch), &m, |bencher, m| {
            bencher.iter(|| {
                let out = par_map_static_columns(
                    |x: &[f64; 4]| Layer.apply(x.as_slice()),
                    black_box(m),
                    &config,
                )
                .unwrap();
                black_box(out);
            });
        });
    }
    group.finish();
}

/// Benchmark forward + backward of the differentiable wrappers
fn bench_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("backward");

    for batch in [256, 4096].iter() {
        group.throughput(Throughput::Elements(*batch as u64));
        let m = input(*batch);
        let g = Matrix::from_fn(3, *batch, |_, _| 1.0);

        group.bench_with_input(BenchmarkId::new("dynamic_tape", batch), &m, |bencher, m| {
            bencher.iter(|| {
                let (_, pb) = map_cols(&Layer, black_box(m)).unwrap();
                black_box(pb.backward(&g).unwrap());
            });
        });

        group.bench_with_input(BenchmarkId::new("static_jacobian", batch), &m, |bencher, m| {
            bencher.iter(|| {
                let (_, pb) = map_cols_static::<4, _, _>(&Layer, black_box(m)).unwrap();
                black_box(pb.backward(&g).unwrap());
            });
        });

        group.bench_with_input(BenchmarkId::new("parallel_4", batch), &m, |bencher, m| {
            bencher.iter(|| {
                let (_, pb) = map_cols_parallel::<4, _, _>(&Layer, black_box(m), 4).unwrap();
                black_box(pb.backward(&g).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_forward, bench_backward);
criterion_main!(benches);
