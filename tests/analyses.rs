//! End-to-end tests for the analyses.
//!
//! Each test builds a small procedure, runs one or more analyses to a fixpoint
//! and checks either the raw states or the rendered reports.

use dataflow_rs::abst::{Abst, Bounds};
use dataflow_rs::busy::BusyExpressions;
use dataflow_rs::cfg::{BinOp, Function, FunctionBuilder, Predicate};
use dataflow_rs::config::AnalysisConfig;
use dataflow_rs::dataflow::{solve, Solver};
use dataflow_rs::interval::Interval;
use dataflow_rs::ranges::IntervalAnalysis;
use dataflow_rs::report::{BusyReport, DifferenceReport, IntervalReport, TaintReport};
use dataflow_rs::taint::TaintAnalysis;

// ─── Fixtures ──────────────────────────────────────────────────────────────────

/// ```text
/// entry:  retval = 0; n = 10; i = 0; s = 0
/// cond:   if (i < n) body else done
/// body:   s = s + i; i = i + 1; goto cond
/// done:   retval = s
/// ```
fn summation() -> Function {
    let mut b = FunctionBuilder::new("main");
    let entry = b.block("entry");
    let cond = b.block("cond");
    let body = b.block("body");
    let done = b.block("done");

    let retval = b.alloca(entry, "retval");
    let n = b.alloca(entry, "n");
    let i = b.alloca(entry, "i");
    let s = b.alloca(entry, "s");
    b.store(entry, 0, retval);
    b.store(entry, 10, n);
    b.store(entry, 0, i);
    b.store(entry, 0, s);
    b.br(entry, cond);

    let ri = b.load(cond, i);
    let rn = b.load(cond, n);
    let c = b.cmp(cond, Predicate::Slt, ri, rn);
    b.cond_br(cond, c, body, done);

    let s1 = b.load(body, s);
    let i1 = b.load(body, i);
    let s2 = b.binary(body, BinOp::Add, s1, i1);
    b.store(body, s2, s);
    let i2 = b.load(body, i);
    let i3 = b.binary(body, BinOp::Add, i2, 1);
    b.store(body, i3, i);
    b.br(body, cond);

    let s3 = b.load(done, s);
    b.store(done, s3, retval);
    b.other(done);
    b.build().unwrap()
}

fn var(func: &Function, name: &str) -> dataflow_rs::cfg::InstId {
    func.find_value(name).unwrap()
}

// ─── Intervals ─────────────────────────────────────────────────────────────────

#[test]
fn summation_intervals() {
    let f = summation();
    let config = AnalysisConfig::default().with_bounds(Bounds::for_loops());
    let result = solve(IntervalAnalysis::new(&config), &f);
    let b = &config.bounds;

    let body = result.entry_at("body").unwrap();
    assert_eq!(body[&var(&f, "i")], Interval::range(0, 9, b));
    assert_eq!(body[&var(&f, "n")], Interval::range(10, 10, b));

    let done = result.entry_at("done").unwrap();
    assert_eq!(done[&var(&f, "i")], Interval::range(10, 10, b));
    // `s` grows without a guard and saturates.
    assert_eq!(done[&var(&f, "s")], Interval::new(Abst::Value(0), Abst::PosInf));
}

#[test]
fn summation_reports() {
    let f = summation();
    let config = AnalysisConfig::default().with_bounds(Bounds::for_loops());
    let result = solve(IntervalAnalysis::new(&config), &f);

    let intervals = IntervalReport::new(&f, &result, &config).to_string();
    println!("{}", intervals);
    assert!(intervals.starts_with("body:\nn: [10, 10]\ni: [1, 10]\ns: [0, INF]\n"));
    assert!(intervals.contains("\ndone:\nn: [10, 10]\ni: [10, 10]\ns: [0, INF]\n"));
    assert!(!intervals.contains("retval"));

    let diff = DifferenceReport::new(&f, &result, &config).to_string();
    println!("{}", diff);
    assert!(diff.contains("entry:\nsep(n, i) = 10\nsep(n, s) = 10\nsep(i, s) = 0\n"));
    assert!(!diff.contains("retval"));
}

#[test]
fn narrow_window_saturates_constants() {
    let mut b = FunctionBuilder::new("main");
    let entry = b.block("entry");
    let x = b.alloca(entry, "x");
    let y = b.alloca(entry, "y");
    b.store(entry, 500, x);
    b.store(entry, -3, y);
    let f = b.build().unwrap();

    let config = AnalysisConfig::default().with_bounds(Bounds::for_loops());
    let result = solve(IntervalAnalysis::new(&config), &f);
    let exit = result.exit_at("entry").unwrap();
    assert_eq!(exit[&x], Interval::new(Abst::PosInf, Abst::PosInf));
    assert_eq!(exit[&y], Interval::range(-3, -3, &config.bounds));
}

#[test]
fn converged_solver_is_stable() {
    let f = summation();
    let config = AnalysisConfig::default().with_bounds(Bounds::for_loops());

    let mut intervals = Solver::new(IntervalAnalysis::new(&config), &f);
    intervals.run();
    let before = intervals.result();
    assert_eq!(intervals.run(), 1);
    assert_eq!(intervals.result(), before);

    let mut busy = Solver::new(BusyExpressions::new(), &f);
    busy.run();
    let before = busy.result();
    assert_eq!(busy.run(), f.exit_blocks().len());
    assert_eq!(busy.result(), before);
}

// ─── Taint ─────────────────────────────────────────────────────────────────────

#[test]
fn taint_through_arithmetic() {
    let mut b = FunctionBuilder::new("main");
    let entry = b.block("entry");
    let next = b.block("next");
    let source = b.alloca(entry, "source");
    let k = b.alloca(entry, "k");
    let x = b.alloca(entry, "x");
    b.store(entry, 4, k);
    let r0 = b.load(entry, source);
    let r1 = b.load(entry, k);
    let r2 = b.binary(entry, BinOp::Mul, r1, r0);
    b.store(entry, r2, x);
    b.br(entry, next);
    b.store(next, r1, x);
    let f = b.build().unwrap();

    let result = solve(TaintAnalysis::new(&AnalysisConfig::default()), &f);
    let text = TaintReport::new(&f, &result).to_string();
    // The store in `next` uses a register of `entry`, which carries no taint there.
    assert_eq!(text, "entry: {source, x}\nnext: {source}\n");
}

// ─── Busy expressions ──────────────────────────────────────────────────────────

#[test]
fn busy_expressions_in_loop() {
    let f = summation();
    let result = solve(BusyExpressions::new(), &f);
    let text = BusyReport::new(&result).to_string();
    println!("{}", text);
    assert!(text.contains("body\n\tEntry: {\"i + 1\", \"s + i\"}\n\tExit: {}\n"));
    assert!(text.contains("done\n\tEntry: {}\n\tExit: {}\n"));
}
