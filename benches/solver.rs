use criterion::{black_box, criterion_group, criterion_main, Criterion};
use raptorq_fec::matrix::DenseMatrix;
use raptorq_fec::params::Parameters;
use raptorq_fec::precode::PrecodeMatrix;
use raptorq_fec::solver;
use raptorq_fec::work_state::KeepWorking;

fn bench_solve_k100_no_loss(c: &mut Criterion) {
    let params = Parameters::new(100);

    c.bench_function("solve_k100_overhead2", |b| {
        b.iter(|| {
            let pm = PrecodeMatrix::gen(params, 2);
            let mut d = DenseMatrix::zero(pm.a.rows(), 8);
            for r in 0..pm.a.rows() {
                for col in 0..8 {
                    d.set(r, col, ((r * 13 + col) % 251) as u8);
                }
            }
            let kw = KeepWorking::new();
            let (outcome, _ops) = solver::intermediate(pm.a, &mut d, &params, &kw);
            black_box(outcome)
        });
    });
}

fn bench_precode_gen(c: &mut Criterion) {
    let params = Parameters::new(100);
    c.bench_function("precode_gen_k100", |b| {
        b.iter(|| black_box(PrecodeMatrix::gen(params, 2)));
    });
}

criterion_group!(benches, bench_solve_k100_no_loss, bench_precode_gen);
criterion_main!(benches);
