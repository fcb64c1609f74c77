//! # dataflow-rs: Intraprocedural dataflow analyses in Rust
//!
//! **`dataflow-rs`** runs classic dataflow analyses over the control-flow graph of a single procedure:
//! taint propagation, very busy expressions, and interval abstract interpretation with a pairwise
//! separation report.
//!
//! ## Key Features
//!
//! - **One engine, many analyses**: every analysis implements the [`Analysis`][crate::dataflow::Analysis] trait
//!   and is driven to a fixpoint by the same worklist [`Solver`][crate::dataflow::Solver], forward or backward.
//! - **Saturating integers**: the [`Abst`][crate::abst::Abst] domain clamps every result into a configurable
//!   window, which bounds the height of the interval lattice and makes loops converge.
//! - **Path-sensitive intervals**: conditional branches narrow the compared variables separately on each edge,
//!   and edges that cannot be taken are never explored.
//! - **Arena CFG**: blocks and instructions are plain indices into a [`Function`][crate::cfg::Function].
//!
//! ## Basic Usage
//!
//! ```rust
//! use dataflow_rs::abst::Bounds;
//! use dataflow_rs::cfg::{FunctionBuilder, Predicate};
//! use dataflow_rs::config::AnalysisConfig;
//! use dataflow_rs::dataflow::solve;
//! use dataflow_rs::ranges::IntervalAnalysis;
//! use dataflow_rs::report::IntervalReport;
//!
//! // 1. Build the procedure: x = 10; if (x > 5) { ... } else { ... }
//! let mut b = FunctionBuilder::new("main");
//! let entry = b.block("entry");
//! let taken = b.block("taken");
//! let skipped = b.block("skipped");
//! let x = b.alloca(entry, "x");
//! b.store(entry, 10, x);
//! let r = b.load(entry, x);
//! let c = b.cmp(entry, Predicate::Sgt, r, 5);
//! b.cond_br(entry, c, taken, skipped);
//! let f = b.build().unwrap();
//!
//! // 2. Run the analysis
//! let config = AnalysisConfig::default().with_bounds(Bounds::for_loops());
//! let result = solve(IntervalAnalysis::new(&config), &f);
//!
//! // 3. The false edge is infeasible
//! assert!(result.entry_at("skipped").is_none());
//! println!("{}", IntervalReport::new(&f, &result, &config));
//! ```
//!
//! ## Core Components
//!
//! - **[`cfg`]**: The procedure under analysis, and its builder.
//! - **[`dataflow`]**: The worklist engine.
//! - **[`taint`]**, **[`busy`]**, **[`ranges`]**: The analyses.
//! - **[`report`]**: Textual rendering of results.

pub mod abst;
pub mod busy;
pub mod cfg;
pub mod config;
pub mod dataflow;
pub mod interval;
pub mod ranges;
pub mod report;
pub mod taint;
