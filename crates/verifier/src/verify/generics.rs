//! Generic calls, method lookup, and existential containers.

use basalt_ir::{
    subst, ArchetypeKind, CallingConv, ConformanceRef, FuncRepr, GenericParamDef, InstId,
    MethodOwner, MethodRef, ParamConvention, ParamInfo, ProtocolRef, Requirement,
    ResultConvention, Substitution, TyId, Type, ValueId,
};

use super::FuncVerifier;
use crate::diagnostic::{Diagnostic, DiagnosticCode, Location};

impl FuncVerifier<'_> {
    /// Every archetype a value mentions must be grounded: a primary
    /// archetype of this function's environment, an opened archetype, or a
    /// protocol `Self`.
    pub(super) fn check_archetype_legality(&mut self) {
        let mut archetypes = Vec::new();
        let value_ids: Vec<_> = self.func.dfg.values.keys().collect();

        for value in value_ids {
            let ty = self.func.dfg.value_ty(value);
            archetypes.clear();
            subst::collect_archetypes(&self.module.types, ty.base, &mut archetypes);

            for arch in archetypes.drain(..) {
                let grounded = match self.module.types.archetype(arch).kind {
                    ArchetypeKind::Primary { .. } => self.func.generic_env.contains(&arch),
                    ArchetypeKind::Opened { .. } | ArchetypeKind::SelfOf(_) => true,
                };
                if !grounded {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::EscapedArchetype,
                            "value type mentions an archetype foreign to this function",
                            Location::Value {
                                func: self.func_ref,
                                value,
                            },
                        )
                        .with_note(format!(
                            "archetype {}",
                            self.module.types.archetype(arch).name
                        )),
                    );
                }
            }
        }
    }

    /// Common substitution handling for `apply` and `partial_apply`. Returns
    /// the instantiated callee type when the call site is well formed.
    fn check_callee(
        &mut self,
        inst: InstId,
        callee: ValueId,
        substs: &[Substitution],
        substituted_ty: TyId,
    ) -> Option<TyId> {
        let callee_ty = self.expect_object(inst, callee, "callee")?;
        let Some(callee_fn) = self.module.types.as_func(callee_ty.base).cloned() else {
            self.emit_inst(
                DiagnosticCode::OperandTypeMismatch,
                "callee must have a function type",
                inst,
            );
            return None;
        };

        if let Some(sig) = &callee_fn.sig {
            if substs.len() != sig.params.len() {
                self.emit_inst_note(
                    DiagnosticCode::SubstitutionShapeMismatch,
                    "substitution count does not match the callee's generic signature",
                    inst,
                    format!("expected {}, found {}", sig.params.len(), substs.len()),
                );
                return None;
            }
            if !subst::substituted_callee_matches(
                &self.module.types,
                substituted_ty,
                callee_ty.base,
                substs,
            ) {
                self.emit_inst(
                    DiagnosticCode::CalleeSignatureMismatch,
                    "recorded callee type is not the substituted generic type",
                    inst,
                );
                return None;
            }
        } else {
            if !substs.is_empty() {
                self.emit_inst(
                    DiagnosticCode::SubstitutionShapeMismatch,
                    "substitutions applied to a monomorphic callee",
                    inst,
                );
                return None;
            }
            if substituted_ty != callee_ty.base {
                self.emit_inst(
                    DiagnosticCode::CalleeSignatureMismatch,
                    "recorded callee type differs from the callee's type",
                    inst,
                );
                return None;
            }
        }

        Some(substituted_ty)
    }

    fn check_call_arg(&mut self, inst: InstId, index: usize, arg: ValueId, param: ParamInfo) {
        let Some(ty) = self.val_ty(arg) else {
            return;
        };
        let ok = match param.convention {
            ParamConvention::Indirect | ParamConvention::IndirectInout => {
                ty.is_address() && ty.base == param.ty
            }
            ParamConvention::DirectOwned
            | ParamConvention::DirectUnowned
            | ParamConvention::DirectGuaranteed => ty.is_object() && ty.base == param.ty,
        };
        if !ok {
            self.emit_inst_note(
                DiagnosticCode::OperandTypeMismatch,
                "call argument does not match the parameter convention and type",
                inst,
                format!("argument index {index}"),
            );
        }
    }

    pub(super) fn check_apply(
        &mut self,
        inst: InstId,
        callee: ValueId,
        substs: &[Substitution],
        substituted_ty: TyId,
        args: &[ValueId],
    ) {
        let Some(callee_ty) = self.check_callee(inst, callee, substs, substituted_ty) else {
            return;
        };
        let Some(callee_fn) = self.module.types.as_func(callee_ty).cloned() else {
            return;
        };

        if args.len() != callee_fn.params.len() {
            self.emit_inst_note(
                DiagnosticCode::ArityMismatch,
                "argument count does not match the callee",
                inst,
                format!("expected {}, found {}", callee_fn.params.len(), args.len()),
            );
            return;
        }
        for (index, (arg, param)) in args.iter().zip(callee_fn.params.iter()).enumerate() {
            self.check_call_arg(inst, index, *arg, *param);
        }

        if let Some(res) = self.result(inst, 0) {
            if !res.is_object() || res.base != callee_fn.result.ty {
                self.emit_inst(
                    DiagnosticCode::ResultTypeMismatch,
                    "apply result type does not match the callee result",
                    inst,
                );
            }
        }
    }

    pub(super) fn check_partial_apply(
        &mut self,
        inst: InstId,
        callee: ValueId,
        substs: &[Substitution],
        substituted_ty: TyId,
        args: &[ValueId],
    ) {
        let Some(callee_ty) = self.check_callee(inst, callee, substs, substituted_ty) else {
            return;
        };
        let Some(callee_fn) = self.module.types.as_func(callee_ty).cloned() else {
            return;
        };

        if args.len() > callee_fn.params.len() {
            self.emit_inst_note(
                DiagnosticCode::ArityMismatch,
                "partial_apply provides more arguments than the callee takes",
                inst,
                format!("callee takes {}, found {}", callee_fn.params.len(), args.len()),
            );
            return;
        }

        // Applied arguments bind the parameter suffix.
        let split = callee_fn.params.len() - args.len();
        for (index, (arg, param)) in args.iter().zip(&callee_fn.params[split..]).enumerate() {
            self.check_call_arg(inst, split + index, *arg, *param);
        }

        let Some(res) = self.result(inst, 0) else {
            return;
        };
        if !res.is_object() {
            self.emit_inst(
                DiagnosticCode::AddressObjectMismatch,
                "partial_apply result must be an object value",
                inst,
            );
        }
        let Some(res_fn) = self.module.types.as_func(res.base).cloned() else {
            self.emit_inst(
                DiagnosticCode::PartialApplyShapeMismatch,
                "partial_apply must produce a function value",
                inst,
            );
            return;
        };

        // An interior-pointer result convention cannot outlive the partial
        // application; it degrades to unowned.
        let expected_result_conv = match callee_fn.result.convention {
            ResultConvention::UnownedInnerPointer => ResultConvention::Unowned,
            other => other,
        };

        let shape_ok = res_fn.repr == FuncRepr::Thick
            && res_fn.sig.is_none()
            && res_fn.params.as_slice() == &callee_fn.params[..split]
            && res_fn.result.ty == callee_fn.result.ty
            && res_fn.result.convention == expected_result_conv;
        if !shape_ok {
            self.emit_inst(
                DiagnosticCode::PartialApplyShapeMismatch,
                "partial_apply result does not match the unapplied parameter prefix",
                inst,
            );
        }
    }

    pub(super) fn check_class_method(
        &mut self,
        inst: InstId,
        operand: ValueId,
        method: MethodRef,
        is_super: bool,
    ) {
        let Some(decl) = self.module.decls.methods.get(method).cloned() else {
            return;
        };
        let MethodOwner::Class(owner) = decl.owner else {
            self.emit_inst(
                DiagnosticCode::OperandTypeMismatch,
                "method lookup requires a class member",
                inst,
            );
            return;
        };

        if let Some(op_ty) = self.expect_object(inst, operand, "method lookup operand") {
            let op_class = match self.module.types.as_class(op_ty.base) {
                Some(class) => Some(class),
                None => self
                    .module
                    .types
                    .any_metatype(op_ty.base)
                    .and_then(|(instance, _)| self.module.types.as_class(instance)),
            };
            match op_class {
                Some(class) => {
                    let related = if is_super {
                        self.module.decls.is_strict_superclass(owner, class)
                    } else {
                        self.module.decls.is_ancestor_class(owner, class)
                    };
                    if !related {
                        self.emit_inst(
                            DiagnosticCode::OperandTypeMismatch,
                            "method owner is not reachable from the operand class",
                            inst,
                        );
                    }
                }
                None => self.emit_inst(
                    DiagnosticCode::OperandTypeMismatch,
                    "method lookup operand must be a class instance or class metatype",
                    inst,
                ),
            }
        }

        self.expect_method_result(inst, CallingConv::Method);
    }

    pub(super) fn check_witness_method(
        &mut self,
        inst: InstId,
        lookup_ty: TyId,
        conformance: Option<ConformanceRef>,
        method: MethodRef,
    ) {
        let Some(decl) = self.module.decls.methods.get(method).cloned() else {
            return;
        };
        let MethodOwner::Protocol(protocol) = decl.owner else {
            self.emit_inst(
                DiagnosticCode::WitnessSelfShapeMismatch,
                "witness_method requires a protocol requirement",
                inst,
            );
            return;
        };

        match conformance {
            Some(conf) => {
                let Some(conf_data) = self.module.conformances.get(conf).copied() else {
                    return;
                };
                if conf_data.protocol != protocol {
                    self.emit_inst(
                        DiagnosticCode::ExistentialProtocolViolation,
                        "conformance cites a different protocol than the requirement",
                        inst,
                    );
                }
                if conf_data.ty != lookup_ty {
                    self.emit_inst(
                        DiagnosticCode::ExistentialProtocolViolation,
                        "conformance covers a different type than the lookup type",
                        inst,
                    );
                }
                if self.module.witness_table_for(conf).is_none() {
                    self.emit_inst(
                        DiagnosticCode::MissingWitnessTableForConformance,
                        "no witness table covers the cited conformance",
                        inst,
                    );
                }
            }
            None => {
                if self.module.types.as_archetype(lookup_ty).is_none() {
                    self.emit_inst(
                        DiagnosticCode::ExistentialProtocolViolation,
                        "unconstrained witness lookup requires an archetype lookup type",
                        inst,
                    );
                }
            }
        }

        self.check_witness_result_shape(inst, protocol);
    }

    /// The witness function type opens with a `Self` parameter at depth 0
    /// index 0, marked for witness metadata and constrained to the protocol.
    fn check_witness_result_shape(&mut self, inst: InstId, protocol: ProtocolRef) {
        let Some(res) = self.result(inst, 0) else {
            return;
        };
        let Some(res_fn) = self.module.types.as_func(res.base).cloned() else {
            self.emit_inst(
                DiagnosticCode::ResultTypeMismatch,
                "witness_method must produce a function value",
                inst,
            );
            return;
        };

        if res_fn.cc != CallingConv::WitnessMethod {
            self.emit_inst(
                DiagnosticCode::RepresentationMismatch,
                "witness_method result must use the witness calling convention",
                inst,
            );
        }

        let Some(sig) = &res_fn.sig else {
            self.emit_inst(
                DiagnosticCode::WitnessSelfShapeMismatch,
                "witness_method must produce a polymorphic function",
                inst,
            );
            return;
        };

        let self_ok = sig.params.first() == Some(&GenericParamDef { depth: 0, index: 0 });
        let reqs_ok = matches!(
            (sig.requirements.first(), sig.requirements.get(1)),
            (
                Some(Requirement::WitnessMarker(marked)),
                Some(Requirement::Conformance(constrained, required))
            ) if marked == constrained && *required == protocol
        );
        if !self_ok || !reqs_ok {
            self.emit_inst(
                DiagnosticCode::WitnessSelfShapeMismatch,
                "witness signature must open with a constrained Self parameter",
                inst,
            );
        }
    }

    pub(super) fn check_dynamic_method(&mut self, inst: InstId, operand: ValueId, method: MethodRef) {
        let Some(decl) = self.module.decls.methods.get(method).cloned() else {
            return;
        };
        if !decl.is_dynamic {
            self.emit_inst(
                DiagnosticCode::DynamicMethodShapeMismatch,
                "dynamic_method requires a runtime-discoverable method",
                inst,
            );
        }

        if let Some(op_ty) = self.expect_object(inst, operand, "dynamic_method operand") {
            if !self.module.types.is_any_object(op_ty.base) {
                self.emit_inst(
                    DiagnosticCode::DynamicMethodShapeMismatch,
                    "dynamic_method operand must be the class-erasure existential",
                    inst,
                );
            }
        }

        // A dynamic `Self` result has no statically known class; the lookup
        // result erases it.
        if decl.has_dynamic_self_result {
            if let Some(res) = self.result(inst, 0) {
                if let Some(res_fn) = self.module.types.as_func(res.base) {
                    if !self.module.types.is_any_object(res_fn.result.ty) {
                        self.emit_inst(
                            DiagnosticCode::DynamicMethodShapeMismatch,
                            "dynamic Self result must be erased to the class-erasure existential",
                            inst,
                        );
                    }
                }
            }
        }

        self.expect_method_result(inst, CallingConv::Method);
    }

    fn expect_method_result(&mut self, inst: InstId, cc: CallingConv) {
        let Some(res) = self.result(inst, 0) else {
            return;
        };
        let Some(res_fn) = self.module.types.as_func(res.base) else {
            self.emit_inst(
                DiagnosticCode::ResultTypeMismatch,
                "method lookup must produce a function value",
                inst,
            );
            return;
        };
        if res_fn.cc != cc {
            self.emit_inst(
                DiagnosticCode::RepresentationMismatch,
                "method lookup result uses the wrong calling convention",
                inst,
            );
        }
    }

    fn result_is_opened_from(&self, res_base: TyId, source: TyId) -> bool {
        self.module
            .types
            .as_archetype(res_base)
            .is_some_and(|arch| {
                self.module.types.archetype(arch).kind
                    == ArchetypeKind::Opened {
                        existential: source,
                    }
            })
    }

    pub(super) fn check_open_existential(&mut self, inst: InstId, operand: ValueId, is_ref: bool) {
        let op_ty = if is_ref {
            self.expect_object(inst, operand, "open_existential_ref operand")
        } else {
            self.expect_address(inst, operand, "open_existential operand")
        };
        let Some(op_ty) = op_ty else {
            return;
        };

        let source_ok = if is_ref {
            self.module.types.is_class_existential(op_ty.base)
        } else {
            self.module.types.is_existential(op_ty.base)
        };
        if !source_ok {
            self.emit_inst(
                DiagnosticCode::ExistentialProtocolViolation,
                "open_existential operand must be an existential container",
                inst,
            );
            return;
        }

        let Some(res) = self.result(inst, 0) else {
            return;
        };
        let category_ok = if is_ref { res.is_object() } else { res.is_address() };
        if !category_ok || !self.result_is_opened_from(res.base, op_ty.base) {
            self.emit_inst(
                DiagnosticCode::ExistentialProtocolViolation,
                "open_existential must produce the archetype opened from its operand",
                inst,
            );
        }
    }

    pub(super) fn check_init_existential(
        &mut self,
        inst: InstId,
        operand: ValueId,
        concrete_ty: TyId,
        conformances: &[Option<ConformanceRef>],
    ) {
        let Some(op_ty) = self.expect_address(inst, operand, "init_existential destination")
        else {
            return;
        };
        if !self.module.types.is_existential(op_ty.base) {
            self.emit_inst(
                DiagnosticCode::ExistentialProtocolViolation,
                "init_existential destination must be an existential container",
                inst,
            );
            return;
        }
        if self.module.types.is_class_existential(op_ty.base) {
            self.emit_inst(
                DiagnosticCode::ExistentialProtocolViolation,
                "class-bound existentials are initialized with init_existential_ref",
                inst,
            );
        }
        if self.module.types.is_existential(concrete_ty) {
            self.emit_inst(
                DiagnosticCode::ExistentialProtocolViolation,
                "existential containers do not nest",
                inst,
            );
        }

        self.check_conformance_list(inst, op_ty.base, concrete_ty, conformances);
        self.check_result_matches(inst, Type::address(concrete_ty));
    }

    pub(super) fn check_init_existential_ref(
        &mut self,
        inst: InstId,
        operand: ValueId,
        conformances: &[Option<ConformanceRef>],
    ) {
        let Some(op_ty) = self.expect_object(inst, operand, "init_existential_ref operand") else {
            return;
        };
        if !self.module.types.has_reference_semantics(op_ty.base) {
            self.emit_inst(
                DiagnosticCode::ReferenceSemanticsRequired,
                "init_existential_ref erases a reference value",
                inst,
            );
        }

        let Some(res) = self.result(inst, 0) else {
            return;
        };
        if !res.is_object() || !self.module.types.is_class_existential(res.base) {
            self.emit_inst(
                DiagnosticCode::ExistentialProtocolViolation,
                "init_existential_ref must produce a class-bound existential",
                inst,
            );
            return;
        }

        self.check_conformance_list(inst, res.base, op_ty.base, conformances);
    }

    fn check_conformance_list(
        &mut self,
        inst: InstId,
        existential: TyId,
        concrete: TyId,
        conformances: &[Option<ConformanceRef>],
    ) {
        let protocols: Vec<_> = self
            .module
            .types
            .existential_protocols(existential)
            .map(|p| p.to_vec())
            .unwrap_or_default();

        if conformances.len() != protocols.len() {
            self.emit_inst_note(
                DiagnosticCode::ExistentialProtocolViolation,
                "conformance count does not match the existential's protocols",
                inst,
                format!(
                    "expected {}, found {}",
                    protocols.len(),
                    conformances.len()
                ),
            );
            return;
        }

        for (index, (conf, protocol)) in conformances.iter().zip(protocols).enumerate() {
            let Some(conf) = *conf else {
                continue;
            };
            let Some(conf_data) = self.module.conformances.get(conf).copied() else {
                continue;
            };
            if conf_data.protocol != protocol || conf_data.ty != concrete {
                self.emit_inst_note(
                    DiagnosticCode::ExistentialProtocolViolation,
                    "conformance does not cover the erased type and protocol",
                    inst,
                    format!("conformance index {index}"),
                );
            }
            if self.module.witness_table_for(conf).is_none() {
                self.emit_inst_note(
                    DiagnosticCode::MissingWitnessTableForConformance,
                    "no witness table covers the cited conformance",
                    inst,
                    format!("conformance index {index}"),
                );
            }
        }
    }

    fn check_result_matches(&mut self, inst: InstId, expected: Type) {
        if let Some(res) = self.result(inst, 0) {
            if res != expected {
                self.emit_inst(
                    DiagnosticCode::ResultTypeMismatch,
                    "result type does not match the initialized payload",
                    inst,
                );
            }
        }
    }

    pub(super) fn check_upcast_existential(&mut self, inst: InstId, src: ValueId, dest: ValueId) {
        let src_ty = self.expect_address(inst, src, "upcast_existential source");
        let dest_ty = self.expect_address(inst, dest, "upcast_existential destination");
        let (Some(src_ty), Some(dest_ty)) = (src_ty, dest_ty) else {
            return;
        };
        self.check_protocol_subset(inst, src_ty.base, dest_ty.base);
    }

    pub(super) fn check_upcast_existential_ref(&mut self, inst: InstId, operand: ValueId) {
        let op_ty = self.expect_object(inst, operand, "upcast_existential_ref operand");
        let res = self.result(inst, 0);
        let (Some(op_ty), Some(res)) = (op_ty, res) else {
            return;
        };
        if !res.is_object() {
            self.emit_inst(
                DiagnosticCode::AddressObjectMismatch,
                "upcast_existential_ref result must be an object value",
                inst,
            );
        }
        self.check_protocol_subset(inst, op_ty.base, res.base);
    }

    /// An existential upcast may only drop protocols: source and destination
    /// must be distinct existentials with the same class constraint.
    fn check_protocol_subset(&mut self, inst: InstId, src: TyId, dest: TyId) {
        let src_protocols = self
            .module
            .types
            .existential_protocols(src)
            .map(|p| p.to_vec());
        let dest_protocols = self
            .module
            .types
            .existential_protocols(dest)
            .map(|p| p.to_vec());
        let (Some(src_protocols), Some(dest_protocols)) = (src_protocols, dest_protocols) else {
            self.emit_inst(
                DiagnosticCode::ExistentialProtocolViolation,
                "existential upcast requires existential operand and result",
                inst,
            );
            return;
        };

        if src == dest {
            self.emit_inst(
                DiagnosticCode::ExistentialProtocolViolation,
                "existential upcast must change the existential type",
                inst,
            );
            return;
        }
        if self.module.types.is_class_existential(src)
            != self.module.types.is_class_existential(dest)
        {
            self.emit_inst(
                DiagnosticCode::ExistentialProtocolViolation,
                "existential upcast must preserve the class constraint",
                inst,
            );
        }

        let subset = dest_protocols
            .iter()
            .all(|p| src_protocols.contains(p));
        if !subset {
            self.emit_inst(
                DiagnosticCode::ExistentialProtocolViolation,
                "existential upcast may not introduce protocols",
                inst,
            );
        }
    }

    pub(super) fn check_deinit_existential(&mut self, inst: InstId, operand: ValueId) {
        let Some(op_ty) = self.expect_address(inst, operand, "deinit_existential operand") else {
            return;
        };
        if !self.module.types.is_existential(op_ty.base)
            || self.module.types.is_class_existential(op_ty.base)
        {
            self.emit_inst(
                DiagnosticCode::ExistentialProtocolViolation,
                "deinit_existential operates on opaque existential containers",
                inst,
            );
        }
    }

    pub(super) fn check_project_existential(&mut self, inst: InstId, operand: ValueId, is_ref: bool) {
        let op_ty = if is_ref {
            self.expect_object(inst, operand, "project_existential_ref operand")
        } else {
            self.expect_address(inst, operand, "project_existential operand")
        };
        let Some(op_ty) = op_ty else {
            return;
        };

        let source_ok = if is_ref {
            self.module.types.is_class_existential(op_ty.base)
        } else {
            self.module.types.is_existential(op_ty.base)
        };
        if !source_ok {
            self.emit_inst(
                DiagnosticCode::ExistentialProtocolViolation,
                "projection operand must be an existential container",
                inst,
            );
            return;
        }

        let Some(res) = self.result(inst, 0) else {
            return;
        };
        let category_ok = if is_ref { res.is_object() } else { res.is_address() };
        if !category_ok || !self.result_is_opened_from(res.base, op_ty.base) {
            self.emit_inst(
                DiagnosticCode::ExistentialProtocolViolation,
                "projection must produce the archetype opened from its operand",
                inst,
            );
        }
    }
}
