//! Interval fixpoint benchmarks.
//!
//! Run with:
//! ```bash
//! cargo bench --bench interval_fixpoint
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use dataflow_rs::abst::Bounds;
use dataflow_rs::cfg::{BinOp, Function, FunctionBuilder, Predicate};
use dataflow_rs::config::AnalysisConfig;
use dataflow_rs::dataflow::solve;
use dataflow_rs::ranges::IntervalAnalysis;

/// `n` sequential counting loops, each `while (i_k < limit) i_k = i_k + step`.
fn chained_loops(n: usize, limit: i64, step: i64) -> Function {
    let mut b = FunctionBuilder::new("main");
    let entry = b.block("entry");
    let mut prev = entry;
    let mut vars = Vec::new();
    for k in 0..n {
        vars.push(b.alloca(entry, &format!("i{}", k)));
    }
    for (k, &var) in vars.iter().enumerate() {
        let init = b.block(format!("init{}", k));
        let cond = b.block(format!("cond{}", k));
        let body = b.block(format!("body{}", k));
        b.br(prev, init);
        b.store(init, 0, var);
        b.br(init, cond);
        let r = b.load(cond, var);
        let c = b.cmp(cond, Predicate::Slt, r, limit);
        let exit = b.block(format!("exit{}", k));
        b.cond_br(cond, c, body, exit);
        let r1 = b.load(body, var);
        let r2 = b.binary(body, BinOp::Add, r1, step);
        b.store(body, r2, var);
        b.br(body, cond);
        prev = exit;
    }
    b.other(prev);
    b.build().unwrap()
}

fn bench_loop_limit(c: &mut Criterion) {
    let mut group = c.benchmark_group("intervals/loop_limit");
    let config = AnalysisConfig::default().with_bounds(Bounds::for_loops());

    for limit in [10, 50, 100, 190] {
        let func = chained_loops(1, limit, 1);
        group.bench_with_input(BenchmarkId::new("limit", limit), &func, |b, func| {
            b.iter(|| solve(IntervalAnalysis::new(&config), func));
        });
    }

    group.finish();
}

fn bench_chained_loops(c: &mut Criterion) {
    let mut group = c.benchmark_group("intervals/chained_loops");
    group.sample_size(20);
    let config = AnalysisConfig::default().with_bounds(Bounds::for_loops());

    for n in [1, 4, 16] {
        let func = chained_loops(n, 100, 3);
        group.bench_with_input(BenchmarkId::new("loops", n), &func, |b, func| {
            b.iter(|| solve(IntervalAnalysis::new(&config), func));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_loop_limit, bench_chained_loops);
criterion_main!(benches);
