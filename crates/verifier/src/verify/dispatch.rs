//! Multi-way terminators: integer and enum switches, conditional casts.

use basalt_ir::{BlockId, CheckedCastKind, InstId, Type, ValueId};
use rustc_hash::FxHashSet;

use super::FuncVerifier;
use crate::diagnostic::DiagnosticCode;

impl FuncVerifier<'_> {
    fn dest_arg_count(&self, dest: BlockId) -> Option<usize> {
        if self.func.dfg.has_block(dest) {
            Some(self.func.dfg.block(dest).args.len())
        } else {
            None
        }
    }

    fn expect_argless_dest(&mut self, inst: InstId, dest: BlockId, code: DiagnosticCode) {
        if let Some(count) = self.dest_arg_count(dest) {
            if count != 0 {
                self.emit_inst_note(
                    code,
                    "switch destination must not take block arguments",
                    inst,
                    format!("block{} expects {count}", dest.as_u32()),
                );
            }
        }
    }

    pub(super) fn check_switch_int(
        &mut self,
        inst: InstId,
        operand: ValueId,
        cases: &[(i128, BlockId)],
        default: Option<BlockId>,
    ) {
        if let Some(op_ty) = self.expect_object(inst, operand, "switch_int operand") {
            if self.module.types.as_int(op_ty.base).is_none() {
                self.emit_inst(
                    DiagnosticCode::OperandTypeMismatch,
                    "switch_int operand must have an integer type",
                    inst,
                );
            }
        }

        let mut seen = FxHashSet::default();
        for (value, dest) in cases {
            if !seen.insert(*value) {
                self.emit_inst_note(
                    DiagnosticCode::DuplicateSwitchCase,
                    "switch_int lists the same value twice",
                    inst,
                    format!("case value {value}"),
                );
            }
            self.expect_argless_dest(inst, *dest, DiagnosticCode::SwitchCaseArgMismatch);
        }

        if let Some(default) = default {
            self.expect_argless_dest(inst, default, DiagnosticCode::DefaultWithArguments);
        }
    }

    pub(super) fn check_switch_enum(
        &mut self,
        inst: InstId,
        operand: ValueId,
        cases: &[(usize, BlockId)],
        default: Option<BlockId>,
        is_addr: bool,
    ) {
        let op_ty = if is_addr {
            self.expect_address(inst, operand, "switch_enum_addr operand")
        } else {
            self.expect_object(inst, operand, "switch_enum operand")
        };
        let Some(op_ty) = op_ty else {
            return;
        };
        let Some(e) = self.module.types.as_enum(op_ty.base) else {
            self.emit_inst(
                DiagnosticCode::OperandTypeMismatch,
                "switch operand must have an enum type",
                inst,
            );
            return;
        };
        let num_cases = self.module.decls.enums[e].cases.len();

        let mut seen = FxHashSet::default();
        for (case, dest) in cases {
            if self.module.decls.enum_case(e, *case).is_none() {
                self.emit_inst_note(
                    DiagnosticCode::CaseMismatch,
                    "switch lists a case the enum does not declare",
                    inst,
                    format!("case index {case}"),
                );
                continue;
            }
            if !seen.insert(*case) {
                self.emit_inst_note(
                    DiagnosticCode::DuplicateSwitchCase,
                    "switch lists the same enum case twice",
                    inst,
                    format!("case index {case}"),
                );
                continue;
            }
            self.check_enum_case_dest(inst, e, *case, *dest, is_addr);
        }

        let exhaustive = seen.len() == num_cases;
        if !exhaustive && default.is_none() {
            self.emit_inst(
                DiagnosticCode::MissingSwitchCase,
                "switch does not cover every enum case and has no default",
                inst,
            );
        }
        if exhaustive && default.is_some() {
            self.emit_inst(
                DiagnosticCode::SpuriousDefault,
                "exhaustive switch must not carry a default destination",
                inst,
            );
        }
        if let Some(default) = default {
            self.expect_argless_dest(inst, default, DiagnosticCode::DefaultWithArguments);
        }
    }

    /// A case destination takes the payload as its sole argument, or nothing.
    /// Address switches never forward the payload.
    fn check_enum_case_dest(
        &mut self,
        inst: InstId,
        e: basalt_ir::EnumRef,
        case: usize,
        dest: BlockId,
        is_addr: bool,
    ) {
        let Some(arg_count) = self.dest_arg_count(dest) else {
            return;
        };
        if is_addr {
            if arg_count != 0 {
                self.emit_inst_note(
                    DiagnosticCode::SwitchCaseArgMismatch,
                    "switch_enum_addr destinations take no block arguments",
                    inst,
                    format!("block{} expects {arg_count}", dest.as_u32()),
                );
            }
            return;
        }

        match arg_count {
            0 => {}
            1 => {
                let payload = self
                    .module
                    .decls
                    .enum_case(e, case)
                    .and_then(|decl| decl.payload);
                let Some(payload) = payload else {
                    self.emit_inst_note(
                        DiagnosticCode::SwitchCaseArgMismatch,
                        "destination takes an argument but the case has no payload",
                        inst,
                        format!("case index {case}"),
                    );
                    return;
                };
                let arg = self.func.dfg.block(dest).args[0];
                if let Some(arg_ty) = self.val_ty(arg) {
                    if arg_ty != Type::object(payload) {
                        self.emit_inst_note(
                            DiagnosticCode::SwitchCaseArgMismatch,
                            "destination argument type does not match the case payload",
                            inst,
                            format!("case index {case}"),
                        );
                    }
                }
            }
            _ => self.emit_inst_note(
                DiagnosticCode::SwitchCaseArgMismatch,
                "case destination takes more than one block argument",
                inst,
                format!("block{} expects {arg_count}", dest.as_u32()),
            ),
        }
    }

    pub(super) fn check_checked_cast_br(
        &mut self,
        inst: InstId,
        operand: ValueId,
        kind: CheckedCastKind,
        cast_ty: Type,
        success: BlockId,
        failure: BlockId,
    ) {
        if let Some(op_ty) = self.val_ty(operand) {
            self.check_cast_shape(inst, kind, op_ty, cast_ty);
        }

        if let Some(count) = self.dest_arg_count(success) {
            if count != 1 {
                self.emit_inst_note(
                    DiagnosticCode::BranchArgMismatch,
                    "success destination must take the cast value as its sole argument",
                    inst,
                    format!("block{} expects {count}", success.as_u32()),
                );
            } else {
                let arg = self.func.dfg.block(success).args[0];
                if let Some(arg_ty) = self.val_ty(arg) {
                    if arg_ty != cast_ty {
                        self.emit_inst(
                            DiagnosticCode::BranchArgMismatch,
                            "success destination argument does not have the cast type",
                            inst,
                        );
                    }
                }
            }
        }

        if let Some(count) = self.dest_arg_count(failure) {
            if count != 0 {
                self.emit_inst_note(
                    DiagnosticCode::BranchArgMismatch,
                    "failure destination must not take block arguments",
                    inst,
                    format!("block{} expects {count}", failure.as_u32()),
                );
            }
        }
    }

    pub(super) fn check_cast_shape(
        &mut self,
        inst: InstId,
        kind: CheckedCastKind,
        src: Type,
        dest: Type,
    ) {
        if src.category != dest.category {
            self.emit_inst(
                DiagnosticCode::AddressObjectMismatch,
                "checked cast source and destination categories differ",
                inst,
            );
            return;
        }

        let types = &self.module.types;
        let src = src.base;
        let dest = dest.base;
        let ok = match kind {
            CheckedCastKind::Downcast => {
                types.as_class(src).is_some()
                    && types.as_class(dest).is_some()
                    && types.is_superclass_of(src, dest, &self.module.decls)
            }
            CheckedCastKind::SuperToArchetype => {
                types.may_have_superclass(src)
                    && types
                        .as_archetype(dest)
                        .is_some_and(|a| types.archetype(a).requires_class)
            }
            CheckedCastKind::ArchetypeToConcrete => {
                types.as_archetype(src).is_some() && types.as_archetype(dest).is_none()
            }
            CheckedCastKind::ArchetypeToArchetype => {
                types.as_archetype(src).is_some() && types.as_archetype(dest).is_some()
            }
            CheckedCastKind::ExistentialToArchetype => {
                types.is_existential(src) && types.as_archetype(dest).is_some()
            }
            CheckedCastKind::ExistentialToConcrete => {
                types.is_existential(src)
                    && types.as_archetype(dest).is_none()
                    && !types.is_existential(dest)
            }
            CheckedCastKind::ConcreteToArchetype => {
                types.as_archetype(src).is_none()
                    && !types.is_existential(src)
                    && types.as_archetype(dest).is_some()
            }
            CheckedCastKind::ConcreteToExistential => {
                types.as_archetype(src).is_none()
                    && !types.is_existential(src)
                    && types.is_existential(dest)
            }
        };
        if !ok {
            self.emit_inst(
                DiagnosticCode::InvalidCastShape,
                "operand and result do not fit the declared cast kind",
                inst,
            );
        }
    }
}
