mod dispatch;
mod generics;
mod module_invariants;
mod stack;
mod type_rules;

use std::collections::VecDeque;

use basalt_ir::{
    BlockId, DisplayInst, FuncRef, Function, InstId, InstKind, LocKind, Module, Type, Value,
    ValueId,
};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    VerifierConfig,
    diagnostic::{Diagnostic, DiagnosticCode, DiagnosticContext, Location},
    report::VerificationReport,
};

pub use module_invariants::{verify_global, verify_vtable, verify_witness_table};

pub fn verify_module(module: &Module, cfg: &VerifierConfig) -> VerificationReport {
    let mut report = VerificationReport::default();

    let func_refs: Vec<_> = module.iter_functions().collect();
    let mut func_reports: Vec<_> = func_refs
        .into_par_iter()
        .map(|func_ref| (func_ref, verify_function(module, func_ref, cfg)))
        .collect();

    // Functions first, module tables after, so diagnostics surface in the
    // order the entities are checked.
    func_reports.sort_by_key(|(func_ref, _)| func_ref.as_u32());
    for (_, func_report) in func_reports {
        let had_errors = func_report.has_errors();
        report.absorb(func_report, cfg.max_diagnostics);
        if cfg.fail_fast && had_errors {
            return report;
        }
    }

    module_invariants::verify_module_invariants(module, cfg, &mut report);
    report
}

pub fn verify_function(
    module: &Module,
    func_ref: FuncRef,
    cfg: &VerifierConfig,
) -> VerificationReport {
    let Some(func) = module.funcs.get(func_ref) else {
        let mut report = VerificationReport::default();
        report.push(
            Diagnostic::error(
                DiagnosticCode::InvalidFuncRef,
                "function reference is not present in the module",
                Location::Function(func_ref),
            ),
            cfg.max_diagnostics,
        );
        return report;
    };

    let mut verifier = FuncVerifier::new(module, func_ref, func, cfg);
    verifier.run();
    verifier.report
}

pub fn verify_module_or_panic(module: &Module, cfg: &VerifierConfig) {
    let report = verify_module(module, cfg);
    if report.has_errors() {
        eprintln!("BASALT_IR_VERIFY_FAILURE: module");
        eprintln!("{report}");
        panic!("BASALT_IR_VERIFY_FAILURE");
    }
}

pub fn verify_function_or_panic(module: &Module, func_ref: FuncRef, cfg: &VerifierConfig) {
    let report = verify_function(module, func_ref, cfg);
    if report.has_errors() {
        eprintln!("BASALT_IR_VERIFY_FAILURE: function {}", func_ref.as_u32());
        eprintln!("{report}");
        panic!("BASALT_IR_VERIFY_FAILURE");
    }
}

struct FuncVerifier<'a> {
    module: &'a Module,
    func_ref: FuncRef,
    func: &'a Function,
    cfg: &'a VerifierConfig,
    report: VerificationReport,

    block_pos: FxHashMap<BlockId, usize>,
    inst_pos: FxHashMap<InstId, (BlockId, usize)>,
    reachable: FxHashSet<BlockId>,
    idom: FxHashMap<BlockId, BlockId>,
}

impl<'a> FuncVerifier<'a> {
    fn new(module: &'a Module, func_ref: FuncRef, func: &'a Function, cfg: &'a VerifierConfig) -> Self {
        Self {
            module,
            func_ref,
            func,
            cfg,
            report: VerificationReport::default(),
            block_pos: FxHashMap::default(),
            inst_pos: FxHashMap::default(),
            reachable: FxHashSet::default(),
            idom: FxHashMap::default(),
        }
    }

    fn run(&mut self) {
        if self.check_declaration_shape() {
            return;
        }

        self.check_entry_and_env();
        self.check_block_structure();
        self.check_cfg_edges();
        self.check_epilog();
        if self.bail() {
            return;
        }

        if self.cfg.should_check_dominance() {
            self.compute_dominator_tree();
            self.check_use_dominance();
            if self.bail() {
                return;
            }
        }

        if self.cfg.should_check_use_lists() {
            self.check_use_lists();
            if self.bail() {
                return;
            }
        }

        if self.cfg.should_check_types() {
            self.check_archetype_legality();
            self.check_inst_rules();
            if self.bail() {
                return;
            }
        }

        if self.cfg.should_check_stack_discipline() {
            self.check_stack_discipline();
        }
    }

    fn bail(&self) -> bool {
        self.cfg.fail_fast && self.report.has_errors()
    }

    fn emit(&mut self, diagnostic: Diagnostic) {
        self.report.push(diagnostic, self.cfg.max_diagnostics);
    }

    fn inst_loc(&self, inst: InstId) -> Location {
        Location::Inst {
            func: self.func_ref,
            block: self.func.dfg.inst_block(inst),
            inst,
        }
    }

    fn inst_context(&self) -> DiagnosticContext {
        DiagnosticContext {
            function_name: self.func.sig.name().to_string(),
        }
    }

    fn inst_snippet(&self, inst: InstId) -> String {
        DisplayInst::new(self.func, &self.module.types, inst).to_string()
    }

    fn emit_inst(&mut self, code: DiagnosticCode, message: impl Into<String>, inst: InstId) {
        let diagnostic = Diagnostic::error(code, message, self.inst_loc(inst))
            .with_context(self.inst_context())
            .with_snippet(self.inst_snippet(inst));
        self.emit(diagnostic);
    }

    fn emit_inst_note(
        &mut self,
        code: DiagnosticCode,
        message: impl Into<String>,
        inst: InstId,
        note: impl Into<String>,
    ) {
        let diagnostic = Diagnostic::error(code, message, self.inst_loc(inst))
            .with_context(self.inst_context())
            .with_snippet(self.inst_snippet(inst))
            .with_note(note);
        self.emit(diagnostic);
    }

    fn warn_inst(&mut self, code: DiagnosticCode, message: impl Into<String>, inst: InstId) {
        let diagnostic = Diagnostic::warning(code, message, self.inst_loc(inst))
            .with_context(self.inst_context())
            .with_snippet(self.inst_snippet(inst));
        self.emit(diagnostic);
    }

    fn block_loc(&self, block: BlockId) -> Location {
        Location::Block {
            func: self.func_ref,
            block,
        }
    }

    /// Operand type, if the value reference is valid. Reference validity
    /// itself is reported by the structural phase.
    fn val_ty(&self, value: ValueId) -> Option<Type> {
        if self.func.dfg.has_value(value) {
            Some(self.func.dfg.value_ty(value))
        } else {
            None
        }
    }

    /// Returns `true` for bodiless declarations, which have nothing further
    /// to verify.
    fn check_declaration_shape(&mut self) -> bool {
        if self.func.is_external_declaration() {
            if self.func.sig.linkage().has_definition() {
                self.emit(Diagnostic::error(
                    DiagnosticCode::MissingEntryBlock,
                    "function linkage requires a definition but the body is empty",
                    Location::Function(self.func_ref),
                ));
            }
            return true;
        }

        if self.func.sig.linkage().is_available_externally() {
            self.emit(Diagnostic::error(
                DiagnosticCode::ExternalFunctionWithBody,
                "external declaration linkage on a function with a body",
                Location::Function(self.func_ref),
            ));
        }

        false
    }

    fn check_entry_and_env(&mut self) {
        let env_len = self.func.generic_env.len();
        match self.func.sig.generic_sig() {
            Some(sig) => {
                if env_len != sig.params.len() {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::MissingGenericEnv,
                            "generic environment does not cover the generic signature",
                            Location::Function(self.func_ref),
                        )
                        .with_note(format!(
                            "signature declares {} parameters, environment has {} archetypes",
                            sig.params.len(),
                            env_len
                        )),
                    );
                }
            }
            None => {
                if env_len != 0 {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::MissingGenericEnv,
                        "non-generic function carries a generic environment",
                        Location::Function(self.func_ref),
                    ));
                }
            }
        }

        let Some(entry) = self.func.entry_block() else {
            return;
        };
        if !self.func.dfg.has_block(entry) {
            return;
        }

        let params = self.func.sig.params().to_vec();
        let entry_args = self.func.dfg.block(entry).args.clone();
        if entry_args.len() != params.len() {
            self.emit(
                Diagnostic::error(
                    DiagnosticCode::EntryArgMismatch,
                    "entry block argument count does not match the signature",
                    self.block_loc(entry),
                )
                .with_note(format!(
                    "expected {}, found {}",
                    params.len(),
                    entry_args.len()
                )),
            );
            return;
        }

        for (index, (arg, param)) in entry_args.iter().zip(&params).enumerate() {
            let Some(arg_ty) = self.val_ty(*arg) else {
                continue;
            };

            let category_ok = arg_ty.category == param.category;
            let base_ok = basalt_ir::subst::ty_matches_in_context(
                &self.module.types,
                arg_ty.base,
                param.base,
                &self.func.generic_env,
            );
            if !category_ok || !base_ok {
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::EntryArgMismatch,
                        "entry block argument type does not match the signature parameter",
                        Location::Value {
                            func: self.func_ref,
                            value: *arg,
                        },
                    )
                    .with_note(format!("parameter index {index}")),
                );
            }
        }
    }

    fn check_block_structure(&mut self) {
        let mut listed = FxHashSet::default();
        for (pos, block) in self.func.block_order.iter().enumerate() {
            let block = *block;
            if !self.func.dfg.has_block(block) {
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::InvalidBlockRef,
                        "block order references a block that does not exist",
                        Location::Function(self.func_ref),
                    )
                    .with_note(format!("invalid block id {}", block.as_u32())),
                );
                continue;
            }
            if !listed.insert(block) {
                self.emit(Diagnostic::error(
                    DiagnosticCode::InvalidBlockRef,
                    "block appears twice in the block order",
                    self.block_loc(block),
                ));
                continue;
            }
            self.block_pos.insert(block, pos);
        }

        let blocks: Vec<_> = self.block_pos.keys().copied().collect();
        let mut ordered = blocks;
        ordered.sort_by_key(|block| self.block_pos[block]);

        for block in ordered {
            let insts = self.func.dfg.block(block).insts.clone();
            if insts.is_empty() {
                self.emit(Diagnostic::error(
                    DiagnosticCode::EmptyBlock,
                    "block has no instructions",
                    self.block_loc(block),
                ));
                continue;
            }

            for (index, inst) in insts.iter().enumerate() {
                let inst = *inst;
                if !self.func.dfg.insts.is_valid(inst) {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::InvalidInstRef,
                            "block lists an instruction that does not exist",
                            self.block_loc(block),
                        )
                        .with_note(format!("invalid instruction id {}", inst.as_u32())),
                    );
                    continue;
                }
                self.inst_pos.insert(inst, (block, index));

                let data = self.func.dfg.inst(inst);
                let is_last = index + 1 == insts.len();
                if data.kind.is_terminator() && !is_last {
                    self.emit_inst(
                        DiagnosticCode::TerminatorNotLast,
                        "terminator appears before the end of its block",
                        inst,
                    );
                }
                if is_last && !data.kind.is_terminator() {
                    self.emit_inst(
                        DiagnosticCode::MissingTerminator,
                        "block does not end in a terminator",
                        inst,
                    );
                }

                self.check_location_kind(inst);
                self.check_inst_refs(inst);
            }

            for arg in self.func.dfg.block(block).args.clone() {
                if !self.func.dfg.has_value(arg) {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::InvalidValueRef,
                            "block argument references a missing value",
                            self.block_loc(block),
                        )
                        .with_note(format!("invalid value id {}", arg.as_u32())),
                    );
                }
            }
        }
    }

    /// Location placement is advisory; misplaced kinds point at debug-info
    /// bugs, not at ill-formed IR.
    fn check_location_kind(&mut self, inst: InstId) {
        let data = self.func.dfg.inst(inst);
        match data.loc {
            LocKind::Return | LocKind::ImplicitReturn => {
                if !data.kind.is_return() {
                    self.warn_inst(
                        DiagnosticCode::LocationKindMisplaced,
                        "return location kind on a non-return instruction",
                        inst,
                    );
                }
            }
            LocKind::ArtificialUnreachable => {
                if !matches!(data.kind, InstKind::Unreachable) {
                    self.warn_inst(
                        DiagnosticCode::LocationKindMisplaced,
                        "artificial-unreachable location kind on a reachable instruction",
                        inst,
                    );
                }
            }
            LocKind::Cleanup | LocKind::Inlined => {
                if data.kind.is_return() {
                    self.warn_inst(
                        DiagnosticCode::LocationKindMisplaced,
                        "cleanup or inlined location kind on a return instruction",
                        inst,
                    );
                }
            }
            LocKind::Regular | LocKind::File => {}
        }
    }

    /// Every entity id an instruction carries must resolve.
    fn check_inst_refs(&mut self, inst: InstId) {
        let kind = self.func.dfg.inst(inst).kind.clone();

        for value in kind.args() {
            if !self.func.dfg.has_value(value) {
                self.emit_inst_note(
                    DiagnosticCode::InvalidValueRef,
                    "instruction references a value outside the value table",
                    inst,
                    format!("invalid value id {}", value.as_u32()),
                );
            }
        }

        for target in kind.branch_targets() {
            if !self.func.dfg.has_block(target) {
                self.emit_inst_note(
                    DiagnosticCode::InvalidBlockRef,
                    "terminator targets a block that does not exist",
                    inst,
                    format!("invalid block id {}", target.as_u32()),
                );
            }
        }

        let mut check_ty = |verifier: &mut Self, ty: basalt_ir::TyId| {
            if !verifier.module.types.is_valid(ty) {
                verifier.emit_inst_note(
                    DiagnosticCode::InvalidTypeRef,
                    "instruction references a type outside the type store",
                    inst,
                    format!("invalid type id {}", ty.as_u32()),
                );
            }
        };

        match &kind {
            InstKind::AllocStack { ty }
            | InstKind::AllocRef { ty }
            | InstKind::IntLiteral { ty, .. } => check_ty(self, *ty),
            InstKind::FunctionRef { func } => {
                if self.module.funcs.get(*func).is_none() {
                    self.emit_inst_note(
                        DiagnosticCode::InvalidFuncRef,
                        "instruction references an unknown function",
                        inst,
                        format!("invalid function id {}", func.as_u32()),
                    );
                }
            }
            InstKind::GlobalAddr { global } => {
                if self.module.globals.get(*global).is_none() {
                    self.emit_inst_note(
                        DiagnosticCode::InvalidGlobalRef,
                        "instruction references an unknown global",
                        inst,
                        format!("invalid global id {}", global.as_u32()),
                    );
                }
            }
            InstKind::Apply {
                substs,
                substituted_ty,
                ..
            }
            | InstKind::PartialApply {
                substs,
                substituted_ty,
                ..
            } => {
                check_ty(self, *substituted_ty);
                for sub in substs.clone() {
                    check_ty(self, sub.replacement);
                }
            }
            InstKind::ClassMethod { method, .. }
            | InstKind::SuperMethod { method, .. }
            | InstKind::DynamicMethod { method, .. } => self.check_method_ref(inst, *method),
            InstKind::WitnessMethod {
                lookup_ty,
                conformance,
                method,
            } => {
                check_ty(self, *lookup_ty);
                self.check_method_ref(inst, *method);
                if let Some(conf) = conformance {
                    self.check_conformance_ref(inst, *conf);
                }
            }
            InstKind::InitExistential {
                concrete_ty,
                conformances,
                ..
            } => {
                check_ty(self, *concrete_ty);
                for conf in conformances.iter().flatten().copied().collect::<Vec<_>>() {
                    self.check_conformance_ref(inst, conf);
                }
            }
            InstKind::InitExistentialRef { conformances, .. } => {
                for conf in conformances.iter().flatten().copied().collect::<Vec<_>>() {
                    self.check_conformance_ref(inst, conf);
                }
            }
            InstKind::CheckedCastBr { cast_ty, .. } => check_ty(self, cast_ty.base),
            InstKind::UnconditionalCheckedCast { .. } => {}
            _ => {}
        }
    }

    fn check_method_ref(&mut self, inst: InstId, method: basalt_ir::MethodRef) {
        if self.module.decls.methods.get(method).is_none() {
            self.emit_inst_note(
                DiagnosticCode::InvalidMethodRef,
                "instruction references an unknown method",
                inst,
                format!("invalid method id {}", method.as_u32()),
            );
        }
    }

    fn check_conformance_ref(&mut self, inst: InstId, conf: basalt_ir::ConformanceRef) {
        if self.module.conformances.get(conf).is_none() {
            self.emit_inst_note(
                DiagnosticCode::InvalidConformanceRef,
                "instruction references an unknown conformance",
                inst,
                format!("invalid conformance id {}", conf.as_u32()),
            );
        }
    }

    fn block_terminator(&self, block: BlockId) -> Option<InstId> {
        let last = *self.func.dfg.block(block).insts.last()?;
        if !self.func.dfg.insts.is_valid(last) {
            return None;
        }
        if self.func.dfg.inst(last).kind.is_terminator() {
            Some(last)
        } else {
            None
        }
    }

    fn check_cfg_edges(&mut self) {
        let entry = self.func.entry_block();
        let blocks: Vec<_> = self.func.block_order.clone();

        for block in blocks.iter().copied() {
            if !self.func.dfg.has_block(block) {
                continue;
            }

            let recorded_succs = self.func.dfg.block(block).succs.clone();
            let Some(terminator) = self.block_terminator(block) else {
                continue;
            };
            let targets = self.func.dfg.inst(terminator).kind.branch_targets();

            if recorded_succs.as_slice() != targets.as_slice() {
                self.emit_inst_note(
                    DiagnosticCode::EdgeTerminatorMismatch,
                    "recorded successor list disagrees with the terminator",
                    terminator,
                    format!(
                        "recorded {:?}, terminator has {:?}",
                        recorded_succs.iter().map(|b| b.as_u32()).collect::<Vec<_>>(),
                        targets.iter().map(|b| b.as_u32()).collect::<Vec<_>>()
                    ),
                );
            }

            for target in targets.iter().copied() {
                if !self.func.dfg.has_block(target) {
                    continue;
                }
                if Some(target) == entry {
                    self.emit_inst(
                        DiagnosticCode::BranchTargetMismatch,
                        "entry block may not be a branch target",
                        terminator,
                    );
                }

                let out = targets.iter().filter(|t| **t == target).count();
                let back = self
                    .func
                    .dfg
                    .block(target)
                    .preds
                    .iter()
                    .filter(|p| **p == block)
                    .count();
                if out != back {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::EdgeAsymmetry,
                            "successor edge has no matching predecessor record",
                            self.block_loc(block),
                        )
                        .with_note(format!(
                            "edge to block{}: {out} outgoing, {back} recorded back-edges",
                            target.as_u32()
                        )),
                    );
                }
            }

            self.check_branch_args(terminator);
        }

        // Predecessor lists may not invent edges either.
        for block in blocks {
            if !self.func.dfg.has_block(block) {
                continue;
            }
            for pred in self.func.dfg.block(block).preds.clone() {
                if !self.func.dfg.has_block(pred) {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::InvalidBlockRef,
                            "predecessor list references a block that does not exist",
                            self.block_loc(block),
                        )
                        .with_note(format!("invalid block id {}", pred.as_u32())),
                    );
                    continue;
                }
                let forward = self
                    .func
                    .dfg
                    .block(pred)
                    .succs
                    .iter()
                    .any(|s| *s == block);
                if !forward {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::EdgeAsymmetry,
                            "predecessor edge has no matching successor record",
                            self.block_loc(block),
                        )
                        .with_note(format!("claimed predecessor block{}", pred.as_u32())),
                    );
                }
            }
        }
    }

    /// Argument lists on plain branches must line up with the target block
    /// arguments. Switch and cast terminators have their own edge rules.
    fn check_branch_args(&mut self, terminator: InstId) {
        let kind = self.func.dfg.inst(terminator).kind.clone();
        match kind {
            InstKind::Br { dest, args } => {
                self.check_edge_args(terminator, dest, &args);
            }
            InstKind::CondBr {
                cond,
                then_dest,
                then_args,
                else_dest,
                else_args,
            } => {
                let _ = cond;
                self.check_edge_args(terminator, then_dest, &then_args);
                self.check_edge_args(terminator, else_dest, &else_args);
            }
            _ => {}
        }
    }

    fn check_edge_args(&mut self, terminator: InstId, dest: BlockId, args: &[ValueId]) {
        if !self.func.dfg.has_block(dest) {
            return;
        }
        let dest_args = self.func.dfg.block(dest).args.clone();
        if dest_args.len() != args.len() {
            self.emit_inst_note(
                DiagnosticCode::BranchArgMismatch,
                "branch argument count does not match the target block",
                terminator,
                format!(
                    "block{} expects {}, branch passes {}",
                    dest.as_u32(),
                    dest_args.len(),
                    args.len()
                ),
            );
            return;
        }

        for (index, (passed, expected)) in args.iter().zip(&dest_args).enumerate() {
            let (Some(passed_ty), Some(expected_ty)) =
                (self.val_ty(*passed), self.val_ty(*expected))
            else {
                continue;
            };
            if passed_ty != expected_ty {
                self.emit_inst_note(
                    DiagnosticCode::BranchArgMismatch,
                    "branch argument type does not match the target block argument",
                    terminator,
                    format!("argument index {index}"),
                );
            }
        }
    }

    fn check_epilog(&mut self) {
        let mut return_blocks = Vec::new();
        for block in self.func.block_order.clone() {
            if !self.func.dfg.has_block(block) {
                continue;
            }
            if let Some(terminator) = self.block_terminator(block) {
                if self.func.dfg.inst(terminator).kind.is_return() {
                    return_blocks.push(block);
                }
            }
        }

        if return_blocks.len() > 1 {
            let mut diagnostic = Diagnostic::error(
                DiagnosticCode::MultipleEpilogBlocks,
                "function has more than one returning block",
                Location::Function(self.func_ref),
            );
            for block in return_blocks {
                diagnostic = diagnostic.with_note(format!("returns in block{}", block.as_u32()));
            }
            self.emit(diagnostic);
        }
    }

    fn compute_dominator_tree(&mut self) {
        let Some(entry) = self.func.entry_block() else {
            return;
        };
        if !self.func.dfg.has_block(entry) {
            return;
        }

        let mut succs: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
        let mut preds: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
        for block in self.func.block_order.iter().copied() {
            if !self.func.dfg.has_block(block) {
                continue;
            }
            let Some(terminator) = self.block_terminator(block) else {
                continue;
            };
            for target in self.func.dfg.inst(terminator).kind.branch_targets() {
                if !self.func.dfg.has_block(target) {
                    continue;
                }
                succs.entry(block).or_default().push(target);
                preds.entry(target).or_default().push(block);
            }
        }

        self.reachable = compute_reachable(entry, &succs);
        self.idom = compute_idom(entry, &self.reachable, &succs, &preds, &self.block_pos);
    }

    fn check_use_dominance(&mut self) {
        let blocks: Vec<_> = self
            .func
            .block_order
            .iter()
            .copied()
            .filter(|block| self.reachable.contains(block))
            .collect();

        for block in blocks {
            let insts = self.func.dfg.block(block).insts.clone();
            for (use_index, inst) in insts.iter().enumerate() {
                let inst = *inst;
                if !self.func.dfg.insts.is_valid(inst) {
                    continue;
                }
                for value in self.func.dfg.inst(inst).kind.args() {
                    if !self.func.dfg.has_value(value) {
                        continue;
                    }
                    self.check_one_use(inst, value, block, use_index);
                }
            }
        }
    }

    fn check_one_use(&mut self, user: InstId, value: ValueId, use_block: BlockId, use_index: usize) {
        match *self.func.dfg.value(value) {
            Value::Inst { inst: def_inst, .. } => {
                let Some((def_block, def_index)) = self.inst_pos.get(&def_inst).copied() else {
                    self.emit_inst_note(
                        DiagnosticCode::UseNotDominated,
                        "operand is defined by an instruction outside the block order",
                        user,
                        format!("defining instruction inst{}", def_inst.as_u32()),
                    );
                    return;
                };

                let dominated = if def_block == use_block {
                    def_index < use_index
                } else {
                    self.reachable.contains(&def_block)
                        && dominates(def_block, use_block, &self.idom, &self.block_pos)
                };
                if !dominated {
                    self.emit_inst_note(
                        DiagnosticCode::UseNotDominated,
                        "operand definition does not properly dominate its use",
                        user,
                        format!("value v{}", value.as_u32()),
                    );
                }
            }
            Value::BlockArg {
                block: def_block, ..
            } => {
                let dominated = self.reachable.contains(&def_block)
                    && dominates(def_block, use_block, &self.idom, &self.block_pos);
                if !dominated {
                    self.emit_inst_note(
                        DiagnosticCode::UseNotDominated,
                        "block argument does not dominate its use",
                        user,
                        format!("value v{}", value.as_u32()),
                    );
                }
            }
        }
    }

    /// Bidirectional def-use consistency: the operand arena, the per-value
    /// use lists, and the instruction payloads must agree.
    fn check_use_lists(&mut self) {
        let operand_ids: Vec<_> = self.func.dfg.operands.keys().collect();
        for op_id in operand_ids {
            let operand = *self.func.dfg.operand(op_id);

            if !self.func.dfg.insts.is_valid(operand.user) {
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::DanglingOperand,
                        "operand names a user instruction that does not exist",
                        Location::Function(self.func_ref),
                    )
                    .with_note(format!("operand {}", op_id.as_u32())),
                );
                continue;
            }

            let listed = self
                .func
                .dfg
                .inst(operand.user)
                .operands
                .get(operand.index)
                .copied();
            if listed != Some(op_id) {
                self.emit_inst_note(
                    DiagnosticCode::OperandUserMismatch,
                    "operand slot does not point back to the operand entry",
                    operand.user,
                    format!("operand {} claims slot {}", op_id.as_u32(), operand.index),
                );
            }

            if !self.func.dfg.has_value(operand.value) {
                self.emit_inst_note(
                    DiagnosticCode::DanglingOperand,
                    "operand references a value that does not exist",
                    operand.user,
                    format!("invalid value id {}", operand.value.as_u32()),
                );
                continue;
            }

            if !self.func.dfg.uses(operand.value).contains(&op_id) {
                self.emit_inst_note(
                    DiagnosticCode::UseListBroken,
                    "operand is missing from the use list of its value",
                    operand.user,
                    format!("value v{}", operand.value.as_u32()),
                );
            }
        }

        let value_ids: Vec<_> = self.func.dfg.values.keys().collect();
        for value in value_ids {
            for op_id in self.func.dfg.uses(value).to_vec() {
                if !self.func.dfg.operands.is_valid(op_id) {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::UseListBroken,
                            "use list references an operand that does not exist",
                            Location::Value {
                                func: self.func_ref,
                                value,
                            },
                        )
                        .with_note(format!("operand {}", op_id.as_u32())),
                    );
                    continue;
                }
                if self.func.dfg.operand(op_id).value != value {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::UseListBroken,
                        "use list entry belongs to a different value",
                        Location::Value {
                            func: self.func_ref,
                            value,
                        },
                    ));
                }
            }
        }

        // The operand arena must mirror the instruction payload exactly.
        let inst_ids: Vec<_> = self.func.dfg.insts.keys().collect();
        for inst in inst_ids {
            let data = self.func.dfg.inst(inst);
            let payload_args = data.kind.args();
            let arena_args: Vec<_> = data
                .operands
                .iter()
                .filter_map(|op| {
                    if self.func.dfg.operands.is_valid(*op) {
                        Some(self.func.dfg.operand(*op).value)
                    } else {
                        None
                    }
                })
                .collect();
            if payload_args.as_slice() != arena_args.as_slice() {
                self.emit_inst(
                    DiagnosticCode::UseListBroken,
                    "operand arena disagrees with the instruction payload",
                    inst,
                );
            }
        }
    }
}

fn compute_reachable(
    entry: BlockId,
    succs: &FxHashMap<BlockId, Vec<BlockId>>,
) -> FxHashSet<BlockId> {
    let mut seen = FxHashSet::default();
    let mut queue = VecDeque::new();

    seen.insert(entry);
    queue.push_back(entry);

    while let Some(block) = queue.pop_front() {
        let mut targets = succs.get(&block).cloned().unwrap_or_default();
        targets.sort_by_key(|b| b.as_u32());

        for target in targets {
            if seen.insert(target) {
                queue.push_back(target);
            }
        }
    }

    seen
}

fn compute_idom(
    root: BlockId,
    nodes: &FxHashSet<BlockId>,
    succs: &FxHashMap<BlockId, Vec<BlockId>>,
    preds: &FxHashMap<BlockId, Vec<BlockId>>,
    block_pos: &FxHashMap<BlockId, usize>,
) -> FxHashMap<BlockId, BlockId> {
    let mut rpo = compute_rpo(root, nodes, succs, block_pos);
    if rpo.is_empty() {
        rpo.push(root);
    }

    let rpo_index: FxHashMap<_, _> = rpo
        .iter()
        .enumerate()
        .map(|(idx, block)| (*block, idx))
        .collect();

    let mut idom = FxHashMap::default();
    idom.insert(root, root);

    let mut changed = true;
    while changed {
        changed = false;

        for block in rpo.iter().copied().skip(1) {
            let mut pred_candidates: Vec<_> = preds
                .get(&block)
                .into_iter()
                .flatten()
                .copied()
                .filter(|pred| nodes.contains(pred) && idom.contains_key(pred))
                .collect();
            pred_candidates.sort_by_key(|pred| pred.as_u32());

            let Some(mut new_idom) = pred_candidates.first().copied() else {
                continue;
            };

            for pred in pred_candidates.into_iter().skip(1) {
                new_idom = intersect_idom(pred, new_idom, &idom, &rpo_index);
            }

            if idom.get(&block).copied() != Some(new_idom) {
                idom.insert(block, new_idom);
                changed = true;
            }
        }
    }

    idom
}

fn compute_rpo(
    root: BlockId,
    nodes: &FxHashSet<BlockId>,
    succs: &FxHashMap<BlockId, Vec<BlockId>>,
    block_pos: &FxHashMap<BlockId, usize>,
) -> Vec<BlockId> {
    let mut order = Vec::new();
    let mut seen = FxHashSet::default();
    let mut stack = vec![(root, false)];

    while let Some((block, expanded)) = stack.pop() {
        if !nodes.contains(&block) {
            continue;
        }

        if expanded {
            order.push(block);
            continue;
        }

        if !seen.insert(block) {
            continue;
        }

        stack.push((block, true));

        let mut children = succs.get(&block).cloned().unwrap_or_default();
        children.retain(|child| nodes.contains(child));
        children.sort_by_key(|child| {
            (
                block_pos.get(child).copied().unwrap_or(usize::MAX),
                child.as_u32(),
            )
        });

        for child in children.into_iter().rev() {
            stack.push((child, false));
        }
    }

    order.reverse();
    order
}

fn intersect_idom(
    mut lhs: BlockId,
    mut rhs: BlockId,
    idom: &FxHashMap<BlockId, BlockId>,
    rpo_index: &FxHashMap<BlockId, usize>,
) -> BlockId {
    while lhs != rhs {
        while rpo_index.get(&lhs).copied().unwrap_or(usize::MAX)
            > rpo_index.get(&rhs).copied().unwrap_or(usize::MAX)
        {
            lhs = idom[&lhs];
        }

        while rpo_index.get(&rhs).copied().unwrap_or(usize::MAX)
            > rpo_index.get(&lhs).copied().unwrap_or(usize::MAX)
        {
            rhs = idom[&rhs];
        }
    }

    lhs
}

fn dominates(
    dom: BlockId,
    block: BlockId,
    idom: &FxHashMap<BlockId, BlockId>,
    block_pos: &FxHashMap<BlockId, usize>,
) -> bool {
    if dom == block {
        return true;
    }

    let mut current = block;
    let mut steps = 0usize;
    let step_limit = block_pos.len().saturating_add(1);
    while let Some(parent) = idom.get(&current).copied() {
        if parent == dom {
            return true;
        }
        if parent == current {
            return false;
        }
        current = parent;
        steps += 1;
        if steps > step_limit {
            break;
        }
    }

    false
}
