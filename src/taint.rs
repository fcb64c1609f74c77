//! Taint propagation.
//!
//! A forward "may" analysis tracking which stack variables may hold data
//! derived from the source variable (named by [`AnalysisConfig::taint_source`]).
//!
//! - The source taints itself wherever it is declared.
//! - A load from a tainted variable, or a binary operation with a tainted
//!   operand, yields a tainted register.
//! - Storing a tainted value taints the destination; storing anything else
//!   untaints it, unless the destination is the source itself.
//!
//! Registers never leave the block that defines them: they are erased from
//! the state at the end of every block.
//!
//! [`TaintPathAnalysis`] additionally records, for each tainted variable, every
//! sequence of block labels (`entry->loop->exit`) along which it got tainted.
//!
//! Both analyses assume an acyclic CFG. A loop makes the path sets grow
//! without bound.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::cfg::{BlockId, Function, InstId, InstKind, Operand};
use crate::config::AnalysisConfig;
use crate::dataflow::{Analysis, BlockFlow, Direction};

/// Tainted values, by defining instruction.
pub type TaintSet = BTreeSet<InstId>;

/// Paths establishing the taint of each value.
pub type TaintPaths = BTreeMap<InstId, BTreeSet<String>>;

fn operand_inst(op: &Operand) -> Option<InstId> {
    op.as_inst()
}

#[derive(Debug, Clone)]
pub struct TaintAnalysis {
    source: String,
}

impl TaintAnalysis {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            source: config.taint_source.clone(),
        }
    }

    fn transfer_inst(&self, func: &Function, id: InstId, tainted: &mut TaintSet) {
        if func.value_name(id) == self.source {
            tainted.insert(id);
        }
        match func.kind(id) {
            InstKind::Load { addr } => {
                if tainted.contains(addr) {
                    tainted.insert(id);
                }
            }
            InstKind::Binary { lhs, rhs, .. } => {
                if [lhs, rhs].into_iter().filter_map(operand_inst).any(|v| tainted.contains(&v)) {
                    tainted.insert(id);
                }
            }
            InstKind::Store { value, addr } => {
                let value_tainted = operand_inst(value).is_some_and(|v| tainted.contains(&v));
                if value_tainted {
                    tainted.insert(*addr);
                } else if func.value_name(*addr) != self.source && tainted.remove(addr) {
                    debug!("untaint {}", func.value_name(*addr));
                }
            }
            _ => {}
        }
    }
}

impl Analysis for TaintAnalysis {
    type State = TaintSet;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn boundary(&self, _func: &Function) -> TaintSet {
        TaintSet::new()
    }

    fn transfer(&self, func: &Function, block: BlockId, state: &TaintSet) -> BlockFlow<TaintSet> {
        let mut tainted = state.clone();
        for &id in func.insts(block) {
            self.transfer_inst(func, id, &mut tainted);
        }
        tainted.retain(|&v| func.is_variable(v));
        BlockFlow::uniform(tainted)
    }

    fn combine(&self, recorded: &mut TaintSet, incoming: &TaintSet) {
        recorded.extend(incoming.iter().copied());
    }
}

/// Taint analysis with path history.
#[derive(Debug, Clone)]
pub struct TaintPathAnalysis {
    source: String,
}

impl TaintPathAnalysis {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            source: config.taint_source.clone(),
        }
    }

    /// Copies the paths of `from` (if tainted) onto `to`.
    fn propagate(paths: &mut TaintPaths, from: InstId, to: InstId) -> bool {
        match paths.get(&from) {
            Some(origin) => {
                let origin = origin.clone();
                paths.entry(to).or_default().extend(origin);
                true
            }
            None => false,
        }
    }

    fn transfer_inst(&self, func: &Function, id: InstId, label: &str, paths: &mut TaintPaths) {
        if func.value_name(id) == self.source {
            paths.entry(id).or_insert_with(|| BTreeSet::from([label.to_string()]));
        }
        match func.kind(id) {
            InstKind::Load { addr } => {
                Self::propagate(paths, *addr, id);
            }
            InstKind::Binary { lhs, rhs, .. } => {
                for v in [lhs, rhs].into_iter().filter_map(operand_inst) {
                    Self::propagate(paths, v, id);
                }
            }
            InstKind::Store { value, addr } => {
                let propagated = operand_inst(value).is_some_and(|v| Self::propagate(paths, v, *addr));
                if !propagated && func.value_name(*addr) != self.source {
                    paths.remove(addr);
                }
            }
            _ => {}
        }
    }
}

impl Analysis for TaintPathAnalysis {
    type State = TaintPaths;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn boundary(&self, _func: &Function) -> TaintPaths {
        TaintPaths::new()
    }

    fn transfer(&self, func: &Function, block: BlockId, state: &TaintPaths) -> BlockFlow<TaintPaths> {
        let label = func.label(block);
        let mut paths: TaintPaths = state
            .iter()
            .map(|(&v, ps)| (v, ps.iter().map(|p| format!("{}->{}", p, label)).collect()))
            .collect();
        for &id in func.insts(block) {
            self.transfer_inst(func, id, label, &mut paths);
        }
        paths.retain(|&v, _| func.is_variable(v));
        BlockFlow::uniform(paths)
    }

    fn combine(&self, recorded: &mut TaintPaths, incoming: &TaintPaths) {
        for (v, ps) in incoming {
            recorded.entry(*v).or_default().extend(ps.iter().cloned());
        }
    }
}
