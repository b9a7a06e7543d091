use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use artfima_rs::tacvf::{artfima_tacvf, tacvf_fi};
use artfima_rs::ParameterVector;

fn bench_tacvf(c: &mut Criterion) {
    let mut group = c.benchmark_group("tacvf");
    for &maxlag in &[255usize, 1023] {
        group.bench_with_input(BenchmarkId::new("fi", maxlag), &maxlag, |b, &m| {
            b.iter(|| tacvf_fi(std::hint::black_box(0.35), 0.2, m))
        });

        let params = ParameterVector::new(Some(0.35), Some(0.2), vec![0.5], vec![-0.3]);
        group.bench_with_input(BenchmarkId::new("artfima_1_1", maxlag), &maxlag, |b, &m| {
            b.iter(|| artfima_tacvf(std::hint::black_box(&params), m, 1.0))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tacvf);
criterion_main!(benches);
