//! Construction helpers for modules and function bodies.
//!
//! The builder is deliberately permissive: it records exactly what it is
//! given and performs no legality checking, so malformed bodies can be
//! constructed for negative verification tests. The only bookkeeping it does
//! is structural: inserting a terminator records the corresponding pred/succ
//! edges.

use smallvec::SmallVec;

use crate::{
    dfg::{BlockId, InstId, ValueId},
    function::{Function, Signature},
    inst::{InstKind, LocKind},
    module::{FuncRef, GlobalRef, GlobalVariable, Module, VTable, VTableRef},
    types::Type,
};

#[derive(Default)]
pub struct ModuleBuilder {
    pub module: Module,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_function(&mut self, sig: Signature) -> FuncRef {
        self.module.funcs.push(Function::new(sig))
    }

    pub fn func_mut(&mut self, func: FuncRef) -> &mut Function {
        &mut self.module.funcs[func]
    }

    /// Borrows a function for body construction.
    pub fn build_function(&mut self, func: FuncRef) -> FunctionBuilder<'_> {
        FunctionBuilder::new(&mut self.module.funcs[func])
    }

    pub fn add_global(&mut self, global: GlobalVariable) -> GlobalRef {
        self.module.globals.push(global)
    }

    pub fn add_vtable(&mut self, vtable: VTable) -> VTableRef {
        self.module.vtables.push(vtable)
    }

    pub fn build(self) -> Module {
        self.module
    }
}

pub struct FunctionBuilder<'a> {
    pub func: &'a mut Function,
    cursor: Option<BlockId>,
}

impl<'a> FunctionBuilder<'a> {
    pub fn new(func: &'a mut Function) -> Self {
        Self { func, cursor: None }
    }

    /// Creates a block and appends it to the layout order.
    pub fn make_block(&mut self) -> BlockId {
        let block = self.func.dfg.make_block();
        self.func.block_order.push(block);
        block
    }

    pub fn append_block_arg(&mut self, block: BlockId, ty: Type) -> ValueId {
        self.func.dfg.make_block_arg(block, ty)
    }

    pub fn switch_to_block(&mut self, block: BlockId) {
        self.cursor = Some(block);
    }

    pub fn current_block(&self) -> Option<BlockId> {
        self.cursor
    }

    /// Inserts an instruction at the cursor and returns its results.
    /// Terminators also record pred/succ edges for their targets.
    pub fn insert(&mut self, kind: InstKind, result_tys: &[Type]) -> SmallVec<[ValueId; 2]> {
        self.insert_with_loc(kind, result_tys, LocKind::Regular)
    }

    pub fn insert_with_loc(
        &mut self,
        kind: InstKind,
        result_tys: &[Type],
        loc: LocKind,
    ) -> SmallVec<[ValueId; 2]> {
        let inst = self.insert_inst(kind, result_tys, loc);
        self.func.dfg.inst(inst).results.clone()
    }

    /// Like [`Self::insert`], but returns the instruction id.
    pub fn insert_inst(&mut self, kind: InstKind, result_tys: &[Type], loc: LocKind) -> InstId {
        let Some(block) = self.cursor else {
            // Building without a cursor is a usage error in construction
            // code, not in verified IR.
            panic!("no block selected");
        };

        let targets = kind.branch_targets();
        let inst = self.func.dfg.make_inst(kind, result_tys, loc);
        self.func.dfg.append_inst(block, inst);

        for target in targets {
            self.func.dfg.blocks[block].succs.push(target);
            if self.func.dfg.has_block(target) {
                self.func.dfg.blocks[target].preds.push(block);
            }
        }

        inst
    }

    /// Single result of the last inserted instruction shape.
    pub fn insert_one(&mut self, kind: InstKind, result_ty: Type) -> ValueId {
        let inst = self.insert_inst(kind, &[result_ty], LocKind::Regular);
        // make_inst always materializes one value per requested result type.
        self.func.dfg.inst(inst).results[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        inst::InstKind,
        linkage::Linkage,
        types::{Type, TypeStore},
    };
    use smallvec::smallvec;

    #[test]
    fn terminators_record_edges() {
        let mut store = TypeStore::default();
        let unit = store.make_tuple(&[]);
        let ret = Type::object(unit);

        let sig = Signature::new("f", Linkage::Private, &[], ret);
        let mut func = Function::new(sig);
        let mut fb = FunctionBuilder::new(&mut func);

        let entry = fb.make_block();
        let exit = fb.make_block();

        fb.switch_to_block(entry);
        fb.insert_inst(
            InstKind::Br {
                dest: exit,
                args: smallvec![],
            },
            &[],
            LocKind::Regular,
        );

        fb.switch_to_block(exit);
        let unit_val = fb.insert_one(InstKind::Tuple { elems: smallvec![] }, ret);
        fb.insert_inst(InstKind::Return { value: unit_val }, &[], LocKind::Regular);

        assert_eq!(func.dfg.block(entry).succs, vec![exit]);
        assert_eq!(func.dfg.block(exit).preds, vec![entry]);
        assert!(func.dfg.block(exit).succs.is_empty());
    }
}
