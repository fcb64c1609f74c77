//! Control-flow graph of a single procedure.
//!
//! A [`Function`] is an arena of basic blocks and instructions addressed by
//! [`BlockId`] and [`InstId`]. Instructions follow a small load/store
//! vocabulary ([`InstKind`]): stack slots are introduced by `alloca`, values
//! flow through registers (the results of `load`, binary operations and
//! comparisons), and a block ends in at most one branch.
//!
//! Functions are constructed with a [`FunctionBuilder`]:
//!
//! ```
//! use dataflow_rs::cfg::{FunctionBuilder, Predicate};
//!
//! let mut b = FunctionBuilder::new("main");
//! let entry = b.block("entry");
//! let then_bb = b.block("then");
//! let else_bb = b.block("else");
//!
//! let x = b.alloca(entry, "x");
//! b.store(entry, 10, x);
//! let r = b.load(entry, x);
//! let c = b.cmp(entry, Predicate::Sgt, r, 5);
//! b.cond_br(entry, c, then_bb, else_bb);
//!
//! let f = b.build().unwrap();
//! assert_eq!(f.successors(f.entry()), &[then_bb, else_bb]);
//! assert_eq!(f.predecessors(then_bb), &[entry]);
//! assert_eq!(f.label(else_bb), "else");
//! ```

use std::collections::HashSet;
use std::fmt;

use crate::interval::Relation;

/// Index of a basic block in its [`Function`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockId(usize);

impl BlockId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Index of an instruction in its [`Function`].
///
/// An instruction id doubles as the name of the value the instruction produces.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct InstId(usize);

impl InstId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Instruction operand: the result of another instruction, or an integer literal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Operand {
    Inst(InstId),
    Const(i64),
}

impl Operand {
    pub fn as_inst(self) -> Option<InstId> {
        match self {
            Operand::Inst(id) => Some(id),
            Operand::Const(_) => None,
        }
    }
}

impl From<InstId> for Operand {
    fn from(id: InstId) -> Self {
        Operand::Inst(id)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Const(value)
    }
}

/// Binary opcodes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
}

impl BinOp {
    /// Source-level symbol of an arithmetic opcode; `None` for bitwise ones.
    pub fn symbol(self) -> Option<char> {
        match self {
            BinOp::Add => Some('+'),
            BinOp::Sub => Some('-'),
            BinOp::Mul => Some('*'),
            BinOp::SDiv | BinOp::UDiv => Some('/'),
            BinOp::SRem | BinOp::URem => Some('%'),
            BinOp::Shl | BinOp::LShr | BinOp::AShr | BinOp::And | BinOp::Or | BinOp::Xor => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::UDiv => "udiv",
            BinOp::SRem => "srem",
            BinOp::URem => "urem",
            BinOp::Shl => "shl",
            BinOp::LShr => "lshr",
            BinOp::AShr => "ashr",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Integer comparison predicates.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Predicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl Predicate {
    /// The order relation this predicate asserts.
    ///
    /// Signedness is not modelled: unsigned predicates map to the same relation.
    pub fn relation(self) -> Relation {
        match self {
            Predicate::Eq => Relation::Eq,
            Predicate::Ne => Relation::Ne,
            Predicate::Ugt | Predicate::Sgt => Relation::Gt,
            Predicate::Uge | Predicate::Sge => Relation::Ge,
            Predicate::Ult | Predicate::Slt => Relation::Lt,
            Predicate::Ule | Predicate::Sle => Relation::Le,
        }
    }

    /// Predicate of the false edge.
    pub fn inverse(self) -> Predicate {
        match self {
            Predicate::Eq => Predicate::Ne,
            Predicate::Ne => Predicate::Eq,
            Predicate::Ugt => Predicate::Ule,
            Predicate::Uge => Predicate::Ult,
            Predicate::Ult => Predicate::Uge,
            Predicate::Ule => Predicate::Ugt,
            Predicate::Sgt => Predicate::Sle,
            Predicate::Sge => Predicate::Slt,
            Predicate::Slt => Predicate::Sge,
            Predicate::Sle => Predicate::Sgt,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Predicate::Eq => "eq",
            Predicate::Ne => "ne",
            Predicate::Ugt => "ugt",
            Predicate::Uge => "uge",
            Predicate::Ult => "ult",
            Predicate::Ule => "ule",
            Predicate::Sgt => "sgt",
            Predicate::Sge => "sge",
            Predicate::Slt => "slt",
            Predicate::Sle => "sle",
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Instruction kinds.
///
/// `Load`, `Binary` and `Cmp` define a register: the instruction itself.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum InstKind {
    /// Stack slot; the only kind of value that is a program variable.
    Alloca,
    /// Reads the variable at `addr`.
    Load { addr: InstId },
    /// Writes `value` into the variable at `addr`.
    Store { value: Operand, addr: InstId },
    Binary { op: BinOp, lhs: Operand, rhs: Operand },
    Cmp { pred: Predicate, lhs: Operand, rhs: Operand },
    CondBr { cond: Operand, then_dest: BlockId, else_dest: BlockId },
    Br { dest: BlockId },
    /// Anything the analyses do not interpret (calls, returns, ...).
    Other,
}

impl InstKind {
    pub fn is_terminator(&self) -> bool {
        matches!(self, InstKind::CondBr { .. } | InstKind::Br { .. })
    }

    /// Value operands, in order (addresses and branch targets excluded).
    pub fn operands(&self) -> Vec<Operand> {
        match self {
            InstKind::Store { value, .. } => vec![*value],
            InstKind::Binary { lhs, rhs, .. } | InstKind::Cmp { lhs, rhs, .. } => vec![*lhs, *rhs],
            InstKind::CondBr { cond, .. } => vec![*cond],
            InstKind::Alloca | InstKind::Load { .. } | InstKind::Br { .. } | InstKind::Other => vec![],
        }
    }

    /// Address operand of a load or store.
    pub fn address(&self) -> Option<InstId> {
        match self {
            InstKind::Load { addr } | InstKind::Store { addr, .. } => Some(*addr),
            _ => None,
        }
    }

    fn targets(&self) -> Vec<BlockId> {
        match self {
            InstKind::CondBr { then_dest, else_dest, .. } => vec![*then_dest, *else_dest],
            InstKind::Br { dest } => vec![*dest],
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Instruction {
    name: String,
    block: BlockId,
    kind: InstKind,
}

impl Instruction {
    /// Declared name, or `%<index>` for anonymous values.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn kind(&self) -> &InstKind {
        &self.kind
    }

    pub fn is_alloca(&self) -> bool {
        matches!(self.kind, InstKind::Alloca)
    }
}

#[derive(Debug, Clone)]
struct Block {
    label: String,
    insts: Vec<InstId>,
    succs: Vec<BlockId>,
    preds: Vec<BlockId>,
}

/// A single procedure: blocks, instructions and the edges between blocks.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    entry: BlockId,
    blocks: Vec<Block>,
    insts: Vec<Instruction>,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len()).map(BlockId)
    }

    /// Instructions of `block`, in program order.
    pub fn insts(&self, block: BlockId) -> &[InstId] {
        &self.blocks[block.0].insts
    }

    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.insts[id.0]
    }

    pub fn kind(&self, id: InstId) -> &InstKind {
        &self.insts[id.0].kind
    }

    /// Name of the value produced by `id`.
    pub fn value_name(&self, id: InstId) -> &str {
        &self.insts[id.0].name
    }

    /// Whether `id` is a program variable (a stack slot).
    pub fn is_variable(&self, id: InstId) -> bool {
        self.insts[id.0].is_alloca()
    }

    /// All program variables, in instruction order.
    pub fn variables(&self) -> impl Iterator<Item = InstId> + '_ {
        self.insts.iter().enumerate().filter(|(_, inst)| inst.is_alloca()).map(|(i, _)| InstId(i))
    }

    pub fn find_value(&self, name: &str) -> Option<InstId> {
        self.insts.iter().position(|inst| inst.name == name).map(InstId)
    }

    /// Stable display label of `block`: its declared name, or `%bb<index>`.
    pub fn label(&self, block: BlockId) -> &str {
        &self.blocks[block.0].label
    }

    pub fn find_block(&self, label: &str) -> Option<BlockId> {
        self.blocks.iter().position(|b| b.label == label).map(BlockId)
    }

    pub fn terminator(&self, block: BlockId) -> Option<&InstKind> {
        let last = self.blocks[block.0].insts.last()?;
        let kind = self.kind(*last);
        kind.is_terminator().then_some(kind)
    }

    pub fn successors(&self, block: BlockId) -> &[BlockId] {
        &self.blocks[block.0].succs
    }

    pub fn predecessors(&self, block: BlockId) -> &[BlockId] {
        &self.blocks[block.0].preds
    }

    /// Blocks without successors that are reachable from the entry, in index order.
    pub fn exit_blocks(&self) -> Vec<BlockId> {
        let mut seen = HashSet::new();
        let mut leaves = Vec::new();
        let mut stack = vec![self.entry];
        while let Some(block) = stack.pop() {
            if !seen.insert(block) {
                continue;
            }
            let succs = self.successors(block);
            if succs.is_empty() {
                leaves.push(block);
            } else {
                stack.extend(succs.iter().copied());
            }
        }
        leaves.sort();
        leaves
    }

    fn format_operand(&self, op: Operand) -> String {
        match op {
            Operand::Inst(id) => self.value_name(id).to_string(),
            Operand::Const(n) => n.to_string(),
        }
    }

    /// One-line textual form of an instruction, for diagnostics.
    pub fn format_inst(&self, id: InstId) -> String {
        let name = self.value_name(id);
        match self.kind(id) {
            InstKind::Alloca => format!("{} = alloca", name),
            InstKind::Load { addr } => format!("{} = load {}", name, self.value_name(*addr)),
            InstKind::Store { value, addr } => {
                format!("store {}, {}", self.format_operand(*value), self.value_name(*addr))
            }
            InstKind::Binary { op, lhs, rhs } => format!(
                "{} = {} {}, {}",
                name,
                op,
                self.format_operand(*lhs),
                self.format_operand(*rhs)
            ),
            InstKind::Cmp { pred, lhs, rhs } => format!(
                "{} = icmp {} {}, {}",
                name,
                pred,
                self.format_operand(*lhs),
                self.format_operand(*rhs)
            ),
            InstKind::CondBr {
                cond,
                then_dest,
                else_dest,
            } => format!(
                "br {}, {}, {}",
                self.format_operand(*cond),
                self.label(*then_dest),
                self.label(*else_dest)
            ),
            InstKind::Br { dest } => format!("br {}", self.label(*dest)),
            InstKind::Other => format!("{} = <other>", name),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "define {} {{", self.name)?;
        for block in self.blocks() {
            if block != self.entry {
                writeln!(f)?;
            }
            writeln!(f, "{}:", self.label(block))?;
            for &id in self.insts(block) {
                writeln!(f, "  {}", self.format_inst(id))?;
            }
        }
        write!(f, "}}")
    }
}

/// Error type for CFG construction.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CfgError {
    /// The function has no blocks, hence no entry.
    NoBlocks,
    UnknownBlock(BlockId),
    UnknownValue(InstId),
    /// A load or store address that is not an `alloca`.
    NotAVariable { inst: InstId, addr: InstId },
    DuplicateLabel(String),
    /// Declared names must not start with `%`, which is reserved for synthesized names.
    ReservedName(String),
    InstructionAfterTerminator { block: String },
}

impl fmt::Display for CfgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CfgError::NoBlocks => write!(f, "function has no blocks"),
            CfgError::UnknownBlock(b) => write!(f, "unknown block {}", b),
            CfgError::UnknownValue(v) => write!(f, "unknown value {}", v),
            CfgError::NotAVariable { inst, addr } => {
                write!(f, "address {} of instruction {} is not a stack slot", addr, inst)
            }
            CfgError::DuplicateLabel(label) => write!(f, "duplicate block label '{}'", label),
            CfgError::ReservedName(name) => write!(f, "name '{}' uses the reserved '%' prefix", name),
            CfgError::InstructionAfterTerminator { block } => {
                write!(f, "block '{}' has instructions after its terminator", block)
            }
        }
    }
}

impl std::error::Error for CfgError {}

#[derive(Debug)]
struct PendingInst {
    block: BlockId,
    name: Option<String>,
    kind: InstKind,
}

/// Incremental constructor for a [`Function`].
///
/// The first block created is the entry block. Nothing is checked until
/// [`FunctionBuilder::build`], which validates the whole function at once.
#[derive(Debug)]
pub struct FunctionBuilder {
    name: String,
    blocks: Vec<Option<String>>,
    insts: Vec<PendingInst>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
            insts: Vec::new(),
        }
    }

    /// Appends a block labelled `name`.
    pub fn block(&mut self, name: impl Into<String>) -> BlockId {
        self.blocks.push(Some(name.into()));
        BlockId(self.blocks.len() - 1)
    }

    /// Appends a block whose label is synthesized.
    pub fn anonymous_block(&mut self) -> BlockId {
        self.blocks.push(None);
        BlockId(self.blocks.len() - 1)
    }

    /// Appends an instruction to `block`.
    pub fn push(&mut self, block: BlockId, name: Option<&str>, kind: InstKind) -> InstId {
        self.insts.push(PendingInst {
            block,
            name: name.map(str::to_string),
            kind,
        });
        InstId(self.insts.len() - 1)
    }

    /// Renames a value.
    pub fn set_name(&mut self, id: InstId, name: impl Into<String>) {
        if let Some(inst) = self.insts.get_mut(id.0) {
            inst.name = Some(name.into());
        }
    }

    pub fn alloca(&mut self, block: BlockId, name: &str) -> InstId {
        self.push(block, Some(name), InstKind::Alloca)
    }

    pub fn load(&mut self, block: BlockId, addr: InstId) -> InstId {
        self.push(block, None, InstKind::Load { addr })
    }

    pub fn store(&mut self, block: BlockId, value: impl Into<Operand>, addr: InstId) -> InstId {
        let value = value.into();
        self.push(block, None, InstKind::Store { value, addr })
    }

    pub fn binary(&mut self, block: BlockId, op: BinOp, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> InstId {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        self.push(block, None, InstKind::Binary { op, lhs, rhs })
    }

    pub fn cmp(&mut self, block: BlockId, pred: Predicate, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> InstId {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        self.push(block, None, InstKind::Cmp { pred, lhs, rhs })
    }

    pub fn cond_br(&mut self, block: BlockId, cond: impl Into<Operand>, then_dest: BlockId, else_dest: BlockId) -> InstId {
        let cond = cond.into();
        self.push(
            block,
            None,
            InstKind::CondBr {
                cond,
                then_dest,
                else_dest,
            },
        )
    }

    pub fn br(&mut self, block: BlockId, dest: BlockId) -> InstId {
        self.push(block, None, InstKind::Br { dest })
    }

    pub fn other(&mut self, block: BlockId) -> InstId {
        self.push(block, None, InstKind::Other)
    }

    /// Validates the function and computes block labels and edges.
    pub fn build(self) -> Result<Function, CfgError> {
        if self.blocks.is_empty() {
            return Err(CfgError::NoBlocks);
        }

        let mut labels = HashSet::new();
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for (i, name) in self.blocks.into_iter().enumerate() {
            let label = match name {
                Some(name) if name.starts_with('%') => return Err(CfgError::ReservedName(name)),
                Some(name) => name,
                None => format!("%bb{}", i),
            };
            if !labels.insert(label.clone()) {
                return Err(CfgError::DuplicateLabel(label));
            }
            blocks.push(Block {
                label,
                insts: Vec::new(),
                succs: Vec::new(),
                preds: Vec::new(),
            });
        }

        let num_insts = self.insts.len();
        let mut insts = Vec::with_capacity(num_insts);
        for (i, pending) in self.insts.into_iter().enumerate() {
            let id = InstId(i);
            let block = blocks.get_mut(pending.block.0).ok_or(CfgError::UnknownBlock(pending.block))?;
            block.insts.push(id);
            let name = match pending.name {
                Some(name) if name.starts_with('%') => return Err(CfgError::ReservedName(name)),
                Some(name) => name,
                None => format!("%{}", i),
            };
            insts.push(Instruction {
                name,
                block: pending.block,
                kind: pending.kind,
            });
        }

        for (i, inst) in insts.iter().enumerate() {
            for op in inst.kind.operands() {
                if let Operand::Inst(v) = op {
                    if v.0 >= num_insts {
                        return Err(CfgError::UnknownValue(v));
                    }
                }
            }
            if let Some(addr) = inst.kind.address() {
                let target = insts.get(addr.0).ok_or(CfgError::UnknownValue(addr))?;
                if !target.is_alloca() {
                    return Err(CfgError::NotAVariable { inst: InstId(i), addr });
                }
            }
            for target in inst.kind.targets() {
                if target.0 >= blocks.len() {
                    return Err(CfgError::UnknownBlock(target));
                }
            }
        }

        for b in 0..blocks.len() {
            let ids = &blocks[b].insts;
            if let Some(pos) = ids.iter().position(|id| insts[id.0].kind.is_terminator()) {
                if pos + 1 != ids.len() {
                    return Err(CfgError::InstructionAfterTerminator {
                        block: blocks[b].label.clone(),
                    });
                }
                blocks[b].succs = insts[ids[pos].0].kind.targets();
            }
        }

        for b in 0..blocks.len() {
            for succ in blocks[b].succs.clone() {
                let preds = &mut blocks[succ.0].preds;
                if !preds.contains(&BlockId(b)) {
                    preds.push(BlockId(b));
                }
            }
        }

        Ok(Function {
            name: self.name,
            entry: BlockId(0),
            blocks,
            insts,
        })
    }
}
