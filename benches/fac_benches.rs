use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use RustedPoissonFAC::Examples::fac_examples::fac_examples;

fn bench_direct_coarse_solve(c: &mut Criterion) {
    c.bench_function("FAC example 1", |b| b.iter(|| fac_examples(black_box(1))));
}

fn bench_two_level_smoothing(c: &mut Criterion) {
    c.bench_function("FAC example 2", |b| b.iter(|| fac_examples(black_box(2))));
}

criterion_group!(benches, bench_direct_coarse_solve, bench_two_level_smoothing);
criterion_main!(benches);
