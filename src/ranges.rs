//! Interval analysis and variable separations.
//!
//! [`IntervalAnalysis`] is a forward analysis mapping each stack variable to an
//! [`Interval`] at every block boundary. Merges take the interval hull.
//!
//! Conditional branches on a comparison are path-sensitive: each outcome gets
//! its own snapshot in which the compared variables are narrowed by
//! [`Interval::compare`]. An outcome whose narrowed range is empty is
//! infeasible, and its successor is not reached along that edge.
//!
//! All arithmetic is clamped through the configured [`Bounds`]. On CFGs with
//! loops the window must be narrow ([`Bounds::for_loops`]) for the fixpoint to
//! be reached in reasonable time.
//!
//! [`separations`] derives the difference report from a converged state.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};

use crate::abst::{Abst, Bounds};
use crate::cfg::{BinOp, BlockId, Function, InstId, InstKind, Operand, Predicate};
use crate::config::AnalysisConfig;
use crate::dataflow::{Analysis, BlockFlow, Direction};
use crate::interval::Interval;

/// Interval of each variable.
pub type IntervalState = BTreeMap<InstId, Interval>;

/// States flowing along the two edges of a comparison; `None` if infeasible.
#[derive(Debug, Clone)]
struct Outcomes {
    on_true: Option<IntervalState>,
    on_false: Option<IntervalState>,
}

#[derive(Debug, Clone)]
pub struct IntervalAnalysis {
    bounds: Bounds,
}

impl IntervalAnalysis {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self { bounds: config.bounds }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    fn operand(&self, state: &IntervalState, op: &Operand) -> Interval {
        match op {
            Operand::Const(n) => Interval::constant(*n, &self.bounds),
            Operand::Inst(id) => state.get(id).copied().unwrap_or_default(),
        }
    }

    fn binary(&self, func: &Function, id: InstId, op: BinOp, lhs: &Interval, rhs: &Interval) -> Interval {
        let b = &self.bounds;
        match op {
            BinOp::Add => lhs.add(rhs, b),
            BinOp::Sub => lhs.sub(rhs, b),
            BinOp::Mul => lhs.mul(rhs, b),
            BinOp::SDiv | BinOp::UDiv => lhs.div(rhs, b),
            BinOp::SRem | BinOp::URem => lhs.rem(rhs, b),
            _ => {
                warn!("undefined binary operation: {}", func.format_inst(id));
                Interval::empty()
            }
        }
    }

    /// Narrows the variable behind `op`, if `op` was loaded from one.
    fn write_back(func: &Function, state: &mut IntervalState, op: &Operand, value: Interval) {
        let Operand::Inst(id) = op else {
            return;
        };
        match func.kind(*id) {
            InstKind::Load { addr } => {
                state.insert(*addr, value);
            }
            _ => debug!("cannot narrow {}: not a loaded variable", func.format_inst(*id)),
        }
    }

    /// Snapshot of `state` under the assumption `lhs <pred> rhs`.
    fn assume(
        &self,
        func: &Function,
        state: &IntervalState,
        pred: Predicate,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Option<IntervalState> {
        let (l, r) = Interval::compare(pred.relation(), &self.operand(state, lhs), &self.operand(state, rhs), &self.bounds);
        if l.is_empty() || r.is_empty() {
            return None;
        }
        let mut snapshot = state.clone();
        Self::write_back(func, &mut snapshot, lhs, l);
        Self::write_back(func, &mut snapshot, rhs, r);
        snapshot.retain(|&v, _| func.is_variable(v));
        Some(snapshot)
    }
}

impl Analysis for IntervalAnalysis {
    type State = IntervalState;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn boundary(&self, _func: &Function) -> IntervalState {
        IntervalState::new()
    }

    fn transfer(&self, func: &Function, block: BlockId, state: &IntervalState) -> BlockFlow<IntervalState> {
        let mut state = state.clone();
        let mut outcomes: HashMap<InstId, Outcomes> = HashMap::new();

        for &id in func.insts(block) {
            match func.kind(id) {
                InstKind::Alloca => {
                    state.insert(id, Interval::top());
                }
                InstKind::Load { addr } => {
                    let value = state.get(addr).copied().unwrap_or_default();
                    state.insert(id, value);
                }
                InstKind::Store { value, addr } => {
                    let value = self.operand(&state, value);
                    state.insert(*addr, value);
                }
                InstKind::Binary { op, lhs, rhs } => {
                    let value = self.binary(func, id, *op, &self.operand(&state, lhs), &self.operand(&state, rhs));
                    state.insert(id, value);
                }
                InstKind::Cmp { pred, lhs, rhs } => {
                    let on_true = self.assume(func, &state, *pred, lhs, rhs);
                    let on_false = self.assume(func, &state, pred.inverse(), lhs, rhs);
                    outcomes.insert(id, Outcomes { on_true, on_false });
                }
                InstKind::CondBr { .. } | InstKind::Br { .. } | InstKind::Other => {}
            }
        }
        state.retain(|&v, _| func.is_variable(v));

        let Some(InstKind::CondBr {
            cond,
            then_dest,
            else_dest,
        }) = func.terminator(block)
        else {
            return BlockFlow::uniform(state);
        };

        let edges = match cond {
            Operand::Const(n) => {
                let dest = if *n != 0 { *then_dest } else { *else_dest };
                vec![(dest, state.clone())]
            }
            Operand::Inst(c) => match outcomes.remove(c) {
                Some(Outcomes { on_true, on_false }) => {
                    if on_true.is_none() {
                        debug!("{} -> {} is infeasible", func.label(block), func.label(*then_dest));
                    }
                    if on_false.is_none() {
                        debug!("{} -> {} is infeasible", func.label(block), func.label(*else_dest));
                    }
                    on_true
                        .map(|s| (*then_dest, s))
                        .into_iter()
                        .chain(on_false.map(|s| (*else_dest, s)))
                        .collect()
                }
                None => return BlockFlow::uniform(state),
            },
        };
        BlockFlow::split(state, edges)
    }

    fn combine(&self, recorded: &mut IntervalState, incoming: &IntervalState) {
        for (v, interval) in incoming {
            let merged = recorded.get(v).copied().unwrap_or_default().union_with(interval);
            recorded.insert(*v, merged);
        }
    }
}

/// `sep` of every unordered pair of variables in `state`, in id order.
///
/// The return slot named by `config` is left out.
pub fn separations(func: &Function, state: &IntervalState, config: &AnalysisConfig) -> Vec<(InstId, InstId, Abst)> {
    let vars: Vec<(InstId, &Interval)> = state
        .iter()
        .filter(|(v, _)| func.value_name(**v) != config.return_slot)
        .map(|(v, i)| (*v, i))
        .collect();
    let mut pairs = Vec::new();
    for (i, (a, ia)) in vars.iter().enumerate() {
        for (b, ib) in &vars[i + 1..] {
            pairs.push((*a, *b, ia.sep(ib, &config.bounds)));
        }
    }
    pairs
}
