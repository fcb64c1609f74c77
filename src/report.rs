//! Textual reports.
//!
//! Each report borrows a [`Function`] and a converged [`DataflowResult`] and
//! renders one section per visited block, sorted by block label. Blocks the
//! worklist never reached have no section.
//!
//! ```text
//! taint        entry: {source, x}
//! paths        entry
//!                  x: {entry->loop}
//! busy         entry
//!                  Entry: {"a + b"}
//!                  Exit: {}
//! intervals    entry:
//!              x: [0, 10]
//! difference   entry:
//!              sep(x, y) = 7
//! ```

use std::fmt;

use crate::busy::BusyState;
use crate::cfg::Function;
use crate::config::AnalysisConfig;
use crate::dataflow::DataflowResult;
use crate::ranges::{separations, IntervalState};
use crate::taint::{TaintPaths, TaintSet};

fn write_set<I, T>(f: &mut fmt::Formatter<'_>, items: I, quote: bool) -> fmt::Result
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    write!(f, "{{")?;
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        if quote {
            write!(f, "\"{}\"", item)?;
        } else {
            write!(f, "{}", item)?;
        }
    }
    write!(f, "}}")
}

/// Tainted variables at each block exit.
pub struct TaintReport<'a> {
    func: &'a Function,
    result: &'a DataflowResult<TaintSet>,
}

impl<'a> TaintReport<'a> {
    pub fn new(func: &'a Function, result: &'a DataflowResult<TaintSet>) -> Self {
        Self { func, result }
    }
}

impl fmt::Display for TaintReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, block) in self.result.blocks_by_label() {
            let Some(tainted) = self.result.exit(block) else {
                continue;
            };
            write!(f, "{}: ", label)?;
            write_set(f, tainted.iter().map(|&v| self.func.value_name(v)), false)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Taint paths of each tainted variable at each block exit.
pub struct TaintPathReport<'a> {
    func: &'a Function,
    result: &'a DataflowResult<TaintPaths>,
}

impl<'a> TaintPathReport<'a> {
    pub fn new(func: &'a Function, result: &'a DataflowResult<TaintPaths>) -> Self {
        Self { func, result }
    }
}

impl fmt::Display for TaintPathReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, block) in self.result.blocks_by_label() {
            let Some(paths) = self.result.exit(block) else {
                continue;
            };
            writeln!(f, "{}", label)?;
            for (&v, ps) in paths {
                write!(f, "\t{}: ", self.func.value_name(v))?;
                write_set(f, ps, false)?;
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Very busy expressions at each block entry and exit.
pub struct BusyReport<'a> {
    result: &'a DataflowResult<BusyState>,
}

impl<'a> BusyReport<'a> {
    pub fn new(result: &'a DataflowResult<BusyState>) -> Self {
        Self { result }
    }
}

impl fmt::Display for BusyReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let empty = BusyState::default();
        for (label, block) in self.result.blocks_by_label() {
            writeln!(f, "{}", label)?;
            write!(f, "\tEntry: ")?;
            write_set(f, &self.result.entry(block).unwrap_or(&empty).exprs, true)?;
            write!(f, "\n\tExit: ")?;
            write_set(f, &self.result.exit(block).unwrap_or(&empty).exprs, true)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Variable intervals at each block exit.
pub struct IntervalReport<'a> {
    func: &'a Function,
    result: &'a DataflowResult<IntervalState>,
    config: &'a AnalysisConfig,
}

impl<'a> IntervalReport<'a> {
    pub fn new(func: &'a Function, result: &'a DataflowResult<IntervalState>, config: &'a AnalysisConfig) -> Self {
        Self { func, result, config }
    }
}

impl fmt::Display for IntervalReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (label, block)) in self.result.blocks_by_label().into_iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}:", label)?;
            let Some(state) = self.result.exit(block) else {
                continue;
            };
            for (&v, interval) in state {
                let name = self.func.value_name(v);
                if name != self.config.return_slot {
                    writeln!(f, "{}: {}", name, interval)?;
                }
            }
        }
        Ok(())
    }
}

/// Pairwise separations at each block exit.
pub struct DifferenceReport<'a> {
    func: &'a Function,
    result: &'a DataflowResult<IntervalState>,
    config: &'a AnalysisConfig,
}

impl<'a> DifferenceReport<'a> {
    pub fn new(func: &'a Function, result: &'a DataflowResult<IntervalState>, config: &'a AnalysisConfig) -> Self {
        Self { func, result, config }
    }
}

impl fmt::Display for DifferenceReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (label, block)) in self.result.blocks_by_label().into_iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}:", label)?;
            let Some(state) = self.result.exit(block) else {
                continue;
            };
            for (a, b, sep) in separations(self.func, state, self.config) {
                writeln!(f, "sep({}, {}) = {}", self.func.value_name(a), self.func.value_name(b), sep)?;
            }
        }
        Ok(())
    }
}
