use criterion::{black_box, criterion_group, criterion_main, Criterion};
use raptorq_fec::gf256;
use raptorq_fec::matrix::DenseMatrix;

fn bench_gf256_mul(c: &mut Criterion) {
    let a: Vec<u8> = (0..=255u8).collect();
    c.bench_function("gf256_mul_sweep", |b| {
        b.iter(|| {
            let mut acc = 0u8;
            for &x in black_box(&a) {
                acc ^= gf256::mul(x, black_box(0x35));
            }
            acc
        });
    });
}

fn bench_row_scaled_add(c: &mut Criterion) {
    let mut m = DenseMatrix::zero(2, 1500);
    for i in 0..1500 {
        m.set(0, i, (i % 251) as u8);
    }
    c.bench_function("row_scaled_add_1500", |b| {
        b.iter(|| {
            m.row_scaled_add(1, 0, black_box(0x35));
        });
    });
}

criterion_group!(benches, bench_gf256_mul, bench_row_scaled_add);
criterion_main!(benches);
