//! Stack allocation discipline.
//!
//! `alloc_stack` and `dealloc_stack` must nest: deallocation happens in
//! reverse allocation order, every path to a return leaves the stack empty,
//! and control-flow merges see the same stack from every predecessor.

use basalt_ir::{InstKind, ValueId};
use rustc_hash::FxHashMap;

use super::FuncVerifier;
use crate::diagnostic::{Diagnostic, DiagnosticCode};

impl FuncVerifier<'_> {
    pub(super) fn check_stack_discipline(&mut self) {
        let Some(entry) = self.func.entry_block() else {
            return;
        };
        if !self.func.dfg.has_block(entry) {
            return;
        }

        let mut entry_stacks: FxHashMap<_, Vec<ValueId>> = FxHashMap::default();
        entry_stacks.insert(entry, Vec::new());
        let mut worklist = vec![entry];

        while let Some(block) = worklist.pop() {
            let mut stack = entry_stacks[&block].clone();
            let insts = self.func.dfg.block(block).insts.clone();

            for inst in insts {
                if !self.func.dfg.insts.is_valid(inst) {
                    continue;
                }
                let kind = self.func.dfg.inst(inst).kind.clone();
                match kind {
                    InstKind::AllocStack { .. } => {
                        if let Some(container) =
                            self.func.dfg.inst(inst).results.first().copied()
                        {
                            stack.push(container);
                        }
                    }
                    InstKind::DeallocStack { operand } => match stack.last().copied() {
                        Some(top) if top == operand => {
                            stack.pop();
                        }
                        _ if stack.contains(&operand) => {
                            self.emit_inst_note(
                                DiagnosticCode::DeallocOrderMismatch,
                                "dealloc_stack does not release the innermost allocation",
                                inst,
                                format!("expected v{} on top", operand.as_u32()),
                            );
                            stack.retain(|v| *v != operand);
                        }
                        _ => {
                            self.emit_inst(
                                DiagnosticCode::StackUnbalanced,
                                "dealloc_stack releases an allocation not live on this path",
                                inst,
                            );
                        }
                    },
                    other if other.is_return() => {
                        if !stack.is_empty() {
                            self.emit_inst_note(
                                DiagnosticCode::StackNotEmptyAtReturn,
                                "function returns with live stack allocations",
                                inst,
                                format!("{} allocation(s) outstanding", stack.len()),
                            );
                        }
                    }
                    other => {
                        for target in other.branch_targets() {
                            if !self.func.dfg.has_block(target) {
                                continue;
                            }
                            match entry_stacks.get(&target) {
                                Some(seen) => {
                                    if *seen != stack {
                                        self.emit(
                                            Diagnostic::error(
                                                DiagnosticCode::StackMismatchAtMerge,
                                                "predecessors reach this block with different stacks",
                                                self.block_loc(target),
                                            )
                                            .with_note(format!(
                                                "edge from block{}",
                                                block.as_u32()
                                            )),
                                        );
                                    }
                                }
                                None => {
                                    entry_stacks.insert(target, stack.clone());
                                    worklist.push(target);
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
