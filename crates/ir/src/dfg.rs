//! Per-function data-flow graph: values, instructions, blocks, and the
//! operand arena.
//!
//! Def-use edges are arena entries keyed by [`OperandId`]; each value keeps a
//! use list of operand ids. Bidirectional consistency of the graph is then an
//! index-equality question rather than a pointer-identity one.

use cranelift_entity::{entity_impl, PrimaryMap};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{
    inst::{InstKind, LocKind},
    types::Type,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(u32);
entity_impl!(ValueId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstId(u32);
entity_impl!(InstId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u32);
entity_impl!(BlockId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperandId(u32);
entity_impl!(OperandId);

/// A value definition: an instruction result or a block argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Inst { inst: InstId, idx: usize, ty: Type },
    BlockArg { block: BlockId, idx: usize, ty: Type },
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Value::Inst { ty, .. } | Value::BlockArg { ty, .. } => *ty,
        }
    }
}

/// A (user-instruction, used-value) edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    pub user: InstId,
    /// Slot position within the user's operand list.
    pub index: usize,
    pub value: ValueId,
}

#[derive(Debug, Clone)]
pub struct InstData {
    pub kind: InstKind,
    pub operands: SmallVec<[OperandId; 4]>,
    pub results: SmallVec<[ValueId; 2]>,
    pub loc: LocKind,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub args: SmallVec<[ValueId; 4]>,
    pub insts: Vec<InstId>,
    /// Stored redundantly with terminator targets; the verifier checks that
    /// both views agree.
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
}

#[derive(Debug, Default)]
pub struct DataFlowGraph {
    pub values: PrimaryMap<ValueId, Value>,
    pub insts: PrimaryMap<InstId, InstData>,
    pub blocks: PrimaryMap<BlockId, Block>,
    pub operands: PrimaryMap<OperandId, Operand>,
    use_lists: FxHashMap<ValueId, SmallVec<[OperandId; 4]>>,
    inst_block: FxHashMap<InstId, BlockId>,
}

impl DataFlowGraph {
    pub fn make_block(&mut self) -> BlockId {
        self.blocks.push(Block::default())
    }

    pub fn make_block_arg(&mut self, block: BlockId, ty: Type) -> ValueId {
        let idx = self.blocks[block].args.len();
        let value = self.values.push(Value::BlockArg { block, idx, ty });
        self.blocks[block].args.push(value);
        value
    }

    /// Creates an instruction with results of the given types and records
    /// def-use edges for each of its operand slots.
    pub fn make_inst(&mut self, kind: InstKind, result_tys: &[Type], loc: LocKind) -> InstId {
        let args = kind.args();
        let inst = self.insts.push(InstData {
            kind,
            operands: SmallVec::new(),
            results: SmallVec::new(),
            loc,
        });

        for (index, value) in args.into_iter().enumerate() {
            let operand = self.operands.push(Operand { user: inst, index, value });
            self.insts[inst].operands.push(operand);
            self.use_lists.entry(value).or_default().push(operand);
        }

        for (idx, ty) in result_tys.iter().enumerate() {
            let value = self.values.push(Value::Inst { inst, idx, ty: *ty });
            self.insts[inst].results.push(value);
        }

        inst
    }

    pub fn append_inst(&mut self, block: BlockId, inst: InstId) {
        self.blocks[block].insts.push(inst);
        self.inst_block.insert(inst, block);
    }

    pub fn inst(&self, inst: InstId) -> &InstData {
        &self.insts[inst]
    }

    pub fn value(&self, value: ValueId) -> &Value {
        &self.values[value]
    }

    pub fn has_value(&self, value: ValueId) -> bool {
        self.values.is_valid(value)
    }

    pub fn value_ty(&self, value: ValueId) -> Type {
        self.values[value].ty()
    }

    pub fn block(&self, block: BlockId) -> &Block {
        &self.blocks[block]
    }

    pub fn has_block(&self, block: BlockId) -> bool {
        self.blocks.is_valid(block)
    }

    /// The block an instruction is inserted into, if any.
    pub fn inst_block(&self, inst: InstId) -> Option<BlockId> {
        self.inst_block.get(&inst).copied()
    }

    /// Use list of a value, in operand-creation order.
    pub fn uses(&self, value: ValueId) -> &[OperandId] {
        self.use_lists
            .get(&value)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    pub fn operand(&self, operand: OperandId) -> &Operand {
        &self.operands[operand]
    }


    /// Returns `true` if `value` is a result of an `apply` instruction.
    pub fn is_apply_result(&self, value: ValueId) -> bool {
        match self.values[value] {
            Value::Inst { inst, .. } => {
                matches!(self.insts[inst].kind, InstKind::Apply { .. })
            }
            Value::BlockArg { .. } => false,
        }
    }
}
