use clap::{Parser, ValueEnum};

use dataflow_rs::abst::Bounds;
use dataflow_rs::busy::BusyExpressions;
use dataflow_rs::cfg::{BinOp, CfgError, Function, FunctionBuilder, Predicate};
use dataflow_rs::config::AnalysisConfig;
use dataflow_rs::dataflow::solve;
use dataflow_rs::ranges::IntervalAnalysis;
use dataflow_rs::report::{BusyReport, DifferenceReport, IntervalReport, TaintPathReport, TaintReport};
use dataflow_rs::taint::{TaintAnalysis, TaintPathAnalysis};

#[derive(Debug, Copy, Clone, ValueEnum)]
enum AnalysisKind {
    Taint,
    TaintPaths,
    Busy,
    Intervals,
    Difference,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Program {
    /// Copies `source` through a chain of variables, then overwrites some.
    Straight,
    /// Two-way branch with arithmetic on both sides.
    Diamond,
    /// Counting loop: `i = 0; while (i < 100) i = i + 1;`
    Loop,
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Analysis to run.
    #[arg(long, value_enum, default_value = "intervals")]
    analysis: AnalysisKind,

    /// Sample procedure to analyze.
    #[arg(long, value_enum, default_value = "loop")]
    program: Program,

    /// Smallest finite value of the integer domain.
    #[arg(long, value_name = "INT", allow_negative_numbers = true)]
    min: Option<i64>,

    /// Largest finite value of the integer domain.
    #[arg(long, value_name = "INT", allow_negative_numbers = true)]
    max: Option<i64>,

    /// Use the narrow [-200, 200] window suited to loops.
    ///
    /// This is the default for the loop program when neither --min nor --max is given.
    #[arg(long)]
    loop_bounds: bool,

    /// Print the procedure before the report.
    #[arg(long)]
    show: bool,
}

fn straight() -> Result<Function, CfgError> {
    let mut b = FunctionBuilder::new("main");
    let entry = b.block("entry");
    let clear = b.block("clear");

    let retval = b.alloca(entry, "retval");
    let source = b.alloca(entry, "source");
    let t = b.alloca(entry, "t");
    let x = b.alloca(entry, "x");
    b.store(entry, 0, retval);
    let r0 = b.load(entry, source);
    b.store(entry, r0, t);
    let r1 = b.load(entry, t);
    let r2 = b.binary(entry, BinOp::Add, r1, 1);
    b.store(entry, r2, x);
    b.br(entry, clear);

    b.store(clear, 0, t);
    b.store(clear, 0, source);
    b.other(clear);
    b.build()
}

fn diamond() -> Result<Function, CfgError> {
    let mut b = FunctionBuilder::new("main");
    let entry = b.block("entry");
    let then_bb = b.block("if.then");
    let else_bb = b.block("if.else");
    let end = b.block("if.end");

    let retval = b.alloca(entry, "retval");
    let a = b.alloca(entry, "a");
    let bv = b.alloca(entry, "b");
    let x = b.alloca(entry, "x");
    b.store(entry, 0, retval);
    b.store(entry, 7, a);
    b.store(entry, 3, bv);
    let r = b.load(entry, a);
    let c = b.cmp(entry, Predicate::Sgt, r, 0);
    b.cond_br(entry, c, then_bb, else_bb);

    let l1 = b.load(then_bb, a);
    let l2 = b.load(then_bb, bv);
    let l3 = b.binary(then_bb, BinOp::Sub, l1, l2);
    b.store(then_bb, l3, x);
    b.br(then_bb, end);

    let r1 = b.load(else_bb, a);
    let r2 = b.load(else_bb, bv);
    let r3 = b.binary(else_bb, BinOp::Sub, r1, r2);
    let r4 = b.binary(else_bb, BinOp::Mul, r3, 2);
    b.store(else_bb, r4, x);
    b.br(else_bb, end);

    b.other(end);
    b.build()
}

fn counting_loop() -> Result<Function, CfgError> {
    let mut b = FunctionBuilder::new("main");
    let entry = b.block("entry");
    let cond = b.block("while.cond");
    let body = b.block("while.body");
    let end = b.block("while.end");

    let retval = b.alloca(entry, "retval");
    let i = b.alloca(entry, "i");
    let s = b.alloca(entry, "s");
    b.store(entry, 0, retval);
    b.store(entry, 0, i);
    b.store(entry, 0, s);
    b.br(entry, cond);

    let r = b.load(cond, i);
    let c = b.cmp(cond, Predicate::Slt, r, 100);
    b.cond_br(cond, c, body, end);

    let r1 = b.load(body, i);
    let r2 = b.binary(body, BinOp::Add, r1, 1);
    b.store(body, r2, i);
    let r3 = b.load(body, s);
    let r4 = b.binary(body, BinOp::Add, r3, 2);
    b.store(body, r4, s);
    b.br(body, cond);

    b.other(end);
    b.build()
}

/// Integer window for the run.
///
/// Explicit `--min`/`--max` win. Without them the loop program defaults to the
/// narrow window.
fn select_bounds(args: &Cli) -> color_eyre::Result<Bounds> {
    if args.min.is_none() && args.max.is_none() {
        if args.loop_bounds || matches!(args.program, Program::Loop) {
            return Ok(Bounds::for_loops());
        }
        return Ok(Bounds::unbounded());
    }
    let base = if args.loop_bounds {
        Bounds::for_loops()
    } else {
        Bounds::unbounded()
    };
    let min = args.min.unwrap_or(base.min());
    let max = args.max.unwrap_or(base.max());
    Bounds::try_new(min, max)
        .ok_or_else(|| color_eyre::eyre::eyre!("--min ({}) must not exceed --max ({})", min, max))
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    println!("args = {:?}", args);

    let config = AnalysisConfig::default().with_bounds(select_bounds(&args)?);
    log::info!("bounds = {}", config.bounds);

    let func = match args.program {
        Program::Straight => straight()?,
        Program::Diamond => diamond()?,
        Program::Loop => counting_loop()?,
    };
    if matches!((args.analysis, args.program), (AnalysisKind::TaintPaths, Program::Loop)) {
        color_eyre::eyre::bail!("taint paths require an acyclic procedure");
    }
    if args.show {
        println!("{}\n", func);
    }

    let time_analysis = std::time::Instant::now();
    match args.analysis {
        AnalysisKind::Taint => {
            let result = solve(TaintAnalysis::new(&config), &func);
            print!("{}", TaintReport::new(&func, &result));
        }
        AnalysisKind::TaintPaths => {
            let result = solve(TaintPathAnalysis::new(&config), &func);
            print!("{}", TaintPathReport::new(&func, &result));
        }
        AnalysisKind::Busy => {
            let result = solve(BusyExpressions::new(), &func);
            print!("{}", BusyReport::new(&result));
        }
        AnalysisKind::Intervals => {
            let result = solve(IntervalAnalysis::new(&config), &func);
            print!("{}", IntervalReport::new(&func, &result, &config));
        }
        AnalysisKind::Difference => {
            let result = solve(IntervalAnalysis::new(&config), &func);
            print!("{}", DifferenceReport::new(&func, &result, &config));
        }
    }
    log::info!("analysis done in {:.3}s", time_analysis.elapsed().as_secs_f64());

    Ok(())
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn bounds(argv: &[&str]) -> color_eyre::Result<Bounds> {
        let args = Cli::try_parse_from(std::iter::once("analyze").chain(argv.iter().copied()))?;
        select_bounds(&args)
    }

    #[test]
    fn test_default_run_uses_loop_window() {
        assert_eq!(bounds(&[]).unwrap(), Bounds::for_loops());
        assert_eq!(bounds(&["--analysis", "difference"]).unwrap(), Bounds::for_loops());
    }

    #[test]
    fn test_acyclic_programs_are_unbounded() {
        assert_eq!(bounds(&["--program", "diamond"]).unwrap(), Bounds::unbounded());
        assert_eq!(bounds(&["--program", "straight", "--loop-bounds"]).unwrap(), Bounds::for_loops());
    }

    #[test]
    fn test_explicit_window() {
        assert_eq!(bounds(&["--min", "-5", "--max", "5"]).unwrap(), Bounds::new(-5, 5));
        assert_eq!(bounds(&["--max", "7"]).unwrap(), Bounds::new(i64::MIN, 7));
        assert_eq!(bounds(&["--loop-bounds", "--max", "7"]).unwrap(), Bounds::new(-200, 7));
        assert!(bounds(&["--min", "3", "--max", "1"]).is_err());
    }

    #[test]
    fn test_default_loop_run_converges() {
        let func = counting_loop().unwrap();
        let config = AnalysisConfig::default().with_bounds(bounds(&[]).unwrap());
        let result = solve(IntervalAnalysis::new(&config), &func);
        let end = result.exit_at("while.end").unwrap();
        let i = func.find_value("i").unwrap();
        assert_eq!(end[&i], dataflow_rs::interval::Interval::range(100, 100, &config.bounds));
    }
}
