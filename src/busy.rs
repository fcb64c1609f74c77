//! Very busy expressions.
//!
//! A backward "must" analysis: an expression is very busy at a point if every
//! path from that point evaluates it before any of its operand variables is
//! redefined. Expressions are the syntactic strings `"<lhs> <op> <rhs>"` of
//! arithmetic instructions, with loaded registers rendered as the variable they
//! were loaded from and constants as decimals.
//!
//! Blocks are processed in two passes: a forward pass maps each load register
//! to its variable, then a backward pass applies gen before kill at each
//! instruction. A store to `v` kills every expression mentioning `v` (unless it
//! stores `v` back into itself), and so does the declaration of `v`.
//!
//! The analysis assumes an acyclic CFG.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::debug;

use crate::cfg::{BlockId, Function, InstId, InstKind, Operand};
use crate::dataflow::{Analysis, BlockFlow, Direction};

/// Busy expressions at a block boundary.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct BusyState {
    /// All busy expressions.
    pub exprs: BTreeSet<String>,
    /// Busy expressions mentioning each variable.
    pub by_var: BTreeMap<InstId, BTreeSet<String>>,
}

impl BusyState {
    fn kill(&mut self, var: InstId) {
        if let Some(killed) = self.by_var.remove(&var) {
            debug!("kill {:?}", killed);
            self.exprs.retain(|e| !killed.contains(e));
        }
    }

    fn gen(&mut self, expr: String, vars: impl IntoIterator<Item = InstId>) {
        for var in vars {
            self.by_var.entry(var).or_default().insert(expr.clone());
        }
        self.exprs.insert(expr);
    }
}

#[derive(Debug, Default, Clone)]
pub struct BusyExpressions;

impl BusyExpressions {
    pub fn new() -> Self {
        Self
    }

    /// Load register -> loaded variable, for the loads of `block`.
    fn loads(func: &Function, block: BlockId) -> HashMap<InstId, InstId> {
        func.insts(block)
            .iter()
            .filter_map(|&id| match func.kind(id) {
                InstKind::Load { addr } => Some((id, *addr)),
                _ => None,
            })
            .collect()
    }

    /// Text of an operand, and the variable it reads if any.
    fn render(func: &Function, loads: &HashMap<InstId, InstId>, op: &Operand) -> (String, Option<InstId>) {
        match op {
            Operand::Const(n) => (n.to_string(), None),
            Operand::Inst(id) => match loads.get(id) {
                Some(&var) => (func.value_name(var).to_string(), Some(var)),
                None => (func.value_name(*id).to_string(), None),
            },
        }
    }

    fn transfer_inst(func: &Function, loads: &HashMap<InstId, InstId>, id: InstId, state: &mut BusyState) {
        match func.kind(id) {
            InstKind::Binary { op, lhs, rhs } => {
                if let Some(symbol) = op.symbol() {
                    let (l, lv) = Self::render(func, loads, lhs);
                    let (r, rv) = Self::render(func, loads, rhs);
                    state.gen(format!("{} {} {}", l, symbol, r), lv.into_iter().chain(rv));
                }
            }
            InstKind::Store { value, addr } => {
                let copied = value.as_inst().and_then(|v| loads.get(&v));
                if copied != Some(addr) {
                    state.kill(*addr);
                }
            }
            InstKind::Alloca => state.kill(id),
            _ => {}
        }
    }
}

impl Analysis for BusyExpressions {
    type State = BusyState;

    fn direction(&self) -> Direction {
        Direction::Backward
    }

    fn boundary(&self, _func: &Function) -> BusyState {
        BusyState::default()
    }

    fn transfer(&self, func: &Function, block: BlockId, state: &BusyState) -> BlockFlow<BusyState> {
        let loads = Self::loads(func, block);
        let mut state = state.clone();
        for &id in func.insts(block).iter().rev() {
            Self::transfer_inst(func, &loads, id, &mut state);
        }
        BlockFlow::uniform(state)
    }

    fn combine(&self, recorded: &mut BusyState, incoming: &BusyState) {
        recorded.exprs.retain(|e| incoming.exprs.contains(e));
        recorded.by_var.retain(|var, exprs| match incoming.by_var.get(var) {
            Some(other) => {
                exprs.retain(|e| other.contains(e));
                !exprs.is_empty()
            }
            None => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::cfg::{BinOp, FunctionBuilder, Predicate};
    use crate::dataflow::solve;

    fn exprs(state: &BusyState) -> Vec<&str> {
        state.exprs.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_must_merge() {
        let mut b = FunctionBuilder::new("main");
        let entry = b.block("entry");
        let left = b.block("left");
        let right = b.block("right");

        let a = b.alloca(entry, "a");
        let x = b.alloca(entry, "x");
        let r = b.load(entry, a);
        let c = b.cmp(entry, Predicate::Sgt, r, 0);
        b.cond_br(entry, c, left, right);

        let l1 = b.load(left, a);
        let l2 = b.binary(left, BinOp::Add, l1, 1);
        b.store(left, l2, x);

        let r1 = b.load(right, a);
        let r2 = b.binary(right, BinOp::Mul, r1, 2);
        let r3 = b.load(right, a);
        let r4 = b.binary(right, BinOp::Add, r3, 1);
        b.store(right, r2, x);
        b.store(right, r4, x);
        let f = b.build().unwrap();

        let result = solve(BusyExpressions::new(), &f);
        assert_eq!(exprs(result.entry_at("left").unwrap()), vec!["a + 1"]);
        assert_eq!(exprs(result.entry_at("right").unwrap()), vec!["a * 2", "a + 1"]);

        let exit = result.exit_at("entry").unwrap();
        assert_eq!(exprs(exit), vec!["a + 1"]);
        assert_eq!(exit.by_var[&a], BTreeSet::from(["a + 1".to_string()]));

        // Declaring `a` kills everything that mentions it.
        assert!(result.entry_at("entry").unwrap().exprs.is_empty());
    }

    #[test]
    fn test_store_kills_operands() {
        let mut b = FunctionBuilder::new("main");
        let init = b.block("init");
        let body = b.block("body");

        let a = b.alloca(init, "a");
        let bv = b.alloca(init, "b");
        let c = b.alloca(init, "c");
        b.store(init, 1, a);
        b.br(init, body);

        let r1 = b.load(body, a);
        let r2 = b.load(body, bv);
        let r3 = b.binary(body, BinOp::Sub, r1, r2);
        b.store(body, r3, c);
        let f = b.build().unwrap();

        let result = solve(BusyExpressions::new(), &f);
        let body_entry = result.entry_at("body").unwrap();
        assert_eq!(exprs(body_entry), vec!["a - b"]);
        assert_eq!(body_entry.by_var.keys().copied().collect::<Vec<_>>(), vec![a, bv]);
        assert_eq!(exprs(result.exit_at("init").unwrap()), vec!["a - b"]);
        assert!(result.entry_at("init").unwrap().exprs.is_empty());
        assert!(exprs(result.exit_at("body").unwrap()).is_empty());
    }

    #[test]
    fn test_self_copy_does_not_kill() {
        let mut b = FunctionBuilder::new("main");
        let entry = b.block("entry");
        let exit = b.block("exit");
        let a = b.alloca(entry, "a");
        b.br(entry, exit);

        let r0 = b.load(exit, a);
        b.store(exit, r0, a);
        let r1 = b.load(exit, a);
        let r2 = b.binary(exit, BinOp::SRem, r1, 3);
        let r3 = b.binary(exit, BinOp::Shl, r2, 1);
        b.other(exit);
        let f = b.build().unwrap();
        assert_eq!(f.value_name(r3), "%6");

        let result = solve(BusyExpressions::new(), &f);
        // `shl` is not an arithmetic expression, and `%5` is not a variable.
        assert_eq!(exprs(result.entry_at("exit").unwrap()), vec!["a % 3"]);
    }

    #[test]
    fn test_register_operand() {
        let mut b = FunctionBuilder::new("main");
        let entry = b.block("entry");
        let a = b.alloca(entry, "a");
        let r1 = b.load(entry, a);
        let r2 = b.binary(entry, BinOp::Mul, r1, r1);
        let r3 = b.binary(entry, BinOp::SDiv, r2, 2);
        b.store(entry, r3, a);
        let f = b.build().unwrap();

        let mut solver = crate::dataflow::Solver::new(BusyExpressions::new(), &f);
        solver.run();
        let entry_state = solver.entry(entry).unwrap().clone();
        // `a * a` dies at the declaration of `a`; `%2 / 2` mentions no variable.
        assert_eq!(exprs(&entry_state), vec!["%2 / 2"]);
        assert_eq!(f.value_name(r2), "%2");
        assert!(entry_state.by_var.is_empty());
        assert_eq!(solver.run(), 1);
        assert_eq!(solver.entry(entry), Some(&entry_state));
    }
}
