//! Worklist fixpoint engine.
//!
//! An [`Analysis`] describes a dataflow problem: its lattice ([`Analysis::State`]),
//! traversal [`Direction`], the state seeded at the boundary blocks, a per-block
//! transfer function and a combine operator (join for "may" analyses, meet for
//! "must" ones). A [`Solver`] drives it to a fixpoint over a [`Function`].
//!
//! The worklist is a stack of `(block, incoming state)` pairs. Visiting a block
//! combines the incoming state into the block's recorded state at the near end
//! (entry for forward, exit for backward), runs the transfer function, combines
//! the result into the far end, and pushes the neighbours only when something
//! changed or the block was seen for the first time.
//!
//! Termination relies on the lattice: the clamped interval domain has finite
//! chains, while the set-based analyses assume an acyclic CFG.

use std::fmt::Debug;

use log::debug;

use crate::cfg::{BlockId, Function};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    /// Follows successors, seeded at the entry block.
    Forward,
    /// Follows predecessors, seeded at every exit block reachable from the entry.
    Backward,
}

/// Result of running a transfer function over one block.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BlockFlow<S> {
    /// State at the far end of the block.
    pub state: S,
    /// Per-edge states, overriding `state` for the listed successors.
    ///
    /// Only meaningful for forward analyses. A successor missing from the list
    /// is not reached from this block at all.
    pub edges: Option<Vec<(BlockId, S)>>,
}

impl<S> BlockFlow<S> {
    /// The same state flows along every outgoing edge.
    pub fn uniform(state: S) -> Self {
        Self { state, edges: None }
    }

    /// Each listed edge carries its own state.
    pub fn split(state: S, edges: Vec<(BlockId, S)>) -> Self {
        Self {
            state,
            edges: Some(edges),
        }
    }
}

/// A dataflow problem over a single [`Function`].
pub trait Analysis {
    type State: Clone + PartialEq + Debug;

    fn direction(&self) -> Direction;

    /// State flowing into the seed blocks.
    fn boundary(&self, func: &Function) -> Self::State;

    /// Transfers `state` across `block`, in the analysis direction.
    fn transfer(&self, func: &Function, block: BlockId, state: &Self::State) -> BlockFlow<Self::State>;

    /// Combines `incoming` into `recorded` in place.
    fn combine(&self, recorded: &mut Self::State, incoming: &Self::State);
}

/// Worklist driver holding the per-block states of one analysis.
///
/// `None` marks a block that has never been visited.
pub struct Solver<'f, A: Analysis> {
    analysis: A,
    func: &'f Function,
    entry: Vec<Option<A::State>>,
    exit: Vec<Option<A::State>>,
}

impl<'f, A: Analysis> Solver<'f, A> {
    pub fn new(analysis: A, func: &'f Function) -> Self {
        let n = func.num_blocks();
        Self {
            analysis,
            func,
            entry: vec![None; n],
            exit: vec![None; n],
        }
    }

    pub fn analysis(&self) -> &A {
        &self.analysis
    }

    fn seeds(&self) -> Vec<BlockId> {
        match self.analysis.direction() {
            Direction::Forward => vec![self.func.entry()],
            Direction::Backward => self.func.exit_blocks(),
        }
    }

    fn merge(&self, recorded: &Option<A::State>, incoming: A::State) -> A::State {
        match recorded {
            None => incoming,
            Some(old) => {
                let mut state = old.clone();
                self.analysis.combine(&mut state, &incoming);
                state
            }
        }
    }

    /// Runs the worklist until it drains and returns the number of block visits.
    ///
    /// Running again on a converged solver visits only the seed blocks and
    /// changes nothing.
    pub fn run(&mut self) -> usize {
        let direction = self.analysis.direction();
        let boundary = self.analysis.boundary(self.func);
        let mut stack: Vec<(BlockId, A::State)> =
            self.seeds().into_iter().rev().map(|b| (b, boundary.clone())).collect();
        let mut visits = 0;

        while let Some((block, incoming)) = stack.pop() {
            visits += 1;
            let i = block.index();
            let first = self.entry[i].is_none() && self.exit[i].is_none();
            debug!("visit {} (#{}, first = {})", self.func.label(block), visits, first);

            let (near, far) = match direction {
                Direction::Forward => (&self.entry[i], &self.exit[i]),
                Direction::Backward => (&self.exit[i], &self.entry[i]),
            };
            let near_state = self.merge(near, incoming);
            let flow = self.analysis.transfer(self.func, block, &near_state);
            let far_state = self.merge(far, flow.state);

            let changed = first || near.as_ref() != Some(&near_state) || far.as_ref() != Some(&far_state);
            if !changed {
                continue;
            }

            match direction {
                Direction::Forward => {
                    match flow.edges {
                        Some(edges) => stack.extend(edges),
                        None => stack.extend(self.func.successors(block).iter().map(|&s| (s, far_state.clone()))),
                    }
                    self.entry[i] = Some(near_state);
                    self.exit[i] = Some(far_state);
                }
                Direction::Backward => {
                    stack.extend(self.func.predecessors(block).iter().map(|&p| (p, far_state.clone())));
                    self.exit[i] = Some(near_state);
                    self.entry[i] = Some(far_state);
                }
            }
        }

        debug!("converged after {} visits", visits);
        visits
    }

    pub fn entry(&self, block: BlockId) -> Option<&A::State> {
        self.entry[block.index()].as_ref()
    }

    pub fn exit(&self, block: BlockId) -> Option<&A::State> {
        self.exit[block.index()].as_ref()
    }

    /// Freezes the current states.
    pub fn result(&self) -> DataflowResult<A::State> {
        DataflowResult {
            labels: self.func.blocks().map(|b| self.func.label(b).to_string()).collect(),
            entry: self.entry.clone(),
            exit: self.exit.clone(),
        }
    }

    pub fn into_result(self) -> DataflowResult<A::State> {
        DataflowResult {
            labels: self.func.blocks().map(|b| self.func.label(b).to_string()).collect(),
            entry: self.entry,
            exit: self.exit,
        }
    }
}

/// Runs `analysis` over `func` to a fixpoint.
pub fn solve<A: Analysis>(analysis: A, func: &Function) -> DataflowResult<A::State> {
    let mut solver = Solver::new(analysis, func);
    solver.run();
    solver.into_result()
}

/// Per-block entry and exit states of a converged analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct DataflowResult<S> {
    labels: Vec<String>,
    entry: Vec<Option<S>>,
    exit: Vec<Option<S>>,
}

impl<S> DataflowResult<S> {
    pub fn entry(&self, block: BlockId) -> Option<&S> {
        self.entry.get(block.index())?.as_ref()
    }

    pub fn exit(&self, block: BlockId) -> Option<&S> {
        self.exit.get(block.index())?.as_ref()
    }

    fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn entry_at(&self, label: &str) -> Option<&S> {
        self.entry[self.position(label)?].as_ref()
    }

    pub fn exit_at(&self, label: &str) -> Option<&S> {
        self.exit[self.position(label)?].as_ref()
    }

    pub fn is_reached(&self, block: BlockId) -> bool {
        self.entry(block).is_some() || self.exit(block).is_some()
    }

    /// Visited blocks with their labels, sorted by label.
    pub fn blocks_by_label(&self) -> Vec<(&str, BlockId)> {
        let mut blocks: Vec<_> = self
            .labels
            .iter()
            .enumerate()
            .filter(|(i, _)| self.entry[*i].is_some() || self.exit[*i].is_some())
            .map(|(i, label)| (label.as_str(), BlockId::from_index(i)))
            .collect();
        blocks.sort();
        blocks
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use test_log::test;

    use super::*;
    use crate::cfg::FunctionBuilder;

    /// Collects the labels of the blocks on some path, in either direction.
    struct Trail(Direction);

    impl Analysis for Trail {
        type State = BTreeSet<String>;

        fn direction(&self) -> Direction {
            self.0
        }

        fn boundary(&self, _func: &Function) -> Self::State {
            BTreeSet::new()
        }

        fn transfer(&self, func: &Function, block: BlockId, state: &Self::State) -> BlockFlow<Self::State> {
            let mut state = state.clone();
            state.insert(func.label(block).to_string());
            BlockFlow::uniform(state)
        }

        fn combine(&self, recorded: &mut Self::State, incoming: &Self::State) {
            recorded.extend(incoming.iter().cloned());
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// entry -> {left, right} -> join; `dead` is unreachable.
    fn diamond() -> Function {
        let mut b = FunctionBuilder::new("f");
        let entry = b.block("entry");
        let left = b.block("left");
        let right = b.block("right");
        let join = b.block("join");
        let dead = b.block("dead");
        let x = b.alloca(entry, "x");
        let r = b.load(entry, x);
        b.cond_br(entry, r, left, right);
        b.br(left, join);
        b.br(right, join);
        b.br(dead, join);
        b.build().unwrap()
    }

    #[test]
    fn test_forward_join() {
        let f = diamond();
        let result = solve(Trail(Direction::Forward), &f);
        assert_eq!(result.exit_at("join"), Some(&set(&["entry", "join", "left", "right"])));
        assert_eq!(result.entry_at("left"), Some(&set(&["entry"])));
        assert_eq!(result.exit_at("dead"), None);
        assert!(!result.is_reached(f.find_block("dead").unwrap()));
    }

    #[test]
    fn test_backward_join() {
        let f = diamond();
        let result = solve(Trail(Direction::Backward), &f);
        assert_eq!(result.entry_at("entry"), Some(&set(&["entry", "join", "left", "right"])));
        assert_eq!(result.exit_at("join"), Some(&set(&[])));
        // Not reachable from the entry, but still a predecessor of the exit.
        assert_eq!(result.entry_at("dead"), Some(&set(&["dead", "join"])));
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let f = diamond();
        for direction in [Direction::Forward, Direction::Backward] {
            let mut solver = Solver::new(Trail(direction), &f);
            let first = solver.run();
            assert!(first >= 4);
            let before = solver.result();
            let again = solver.run();
            println!("{:?}: {} visits, then {}", direction, first, again);
            assert_eq!(again, 1);
            assert_eq!(solver.result(), before);
        }
    }

    #[test]
    fn test_split_edges() {
        struct OnlyThen;

        impl Analysis for OnlyThen {
            type State = u32;

            fn direction(&self) -> Direction {
                Direction::Forward
            }

            fn boundary(&self, _func: &Function) -> u32 {
                0
            }

            fn transfer(&self, func: &Function, block: BlockId, state: &u32) -> BlockFlow<u32> {
                match func.successors(block).first() {
                    Some(&first) => BlockFlow::split(*state + 1, vec![(first, *state + 1)]),
                    None => BlockFlow::uniform(*state + 1),
                }
            }

            fn combine(&self, recorded: &mut u32, incoming: &u32) {
                *recorded = (*recorded).max(*incoming);
            }
        }

        let f = diamond();
        let result = solve(OnlyThen, &f);
        assert_eq!(result.exit_at("join"), Some(&3));
        assert_eq!(result.entry_at("right"), None);
        let labels: Vec<_> = result.blocks_by_label().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["entry", "join", "left"]);
    }
}
