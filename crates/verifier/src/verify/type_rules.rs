//! Per-instruction operand and result legality.
//!
//! Instruction kinds form a closed enum, so this dispatch is an exhaustive
//! match: an instruction added to the catalogue without a rule here fails to
//! compile rather than silently passing verification.

use basalt_ir::{InstId, InstKind, TyData, Type, ValueId};

use super::FuncVerifier;
use crate::diagnostic::DiagnosticCode;

impl FuncVerifier<'_> {
    pub(super) fn check_inst_rules(&mut self) {
        for block in self.func.block_order.clone() {
            if !self.func.dfg.has_block(block) {
                continue;
            }
            for inst in self.func.dfg.block(block).insts.clone() {
                if !self.func.dfg.insts.is_valid(inst) {
                    continue;
                }
                self.check_inst(inst);
                if self.bail() {
                    return;
                }
            }
        }
    }

    pub(super) fn result(&self, inst: InstId, idx: usize) -> Option<Type> {
        let value = *self.func.dfg.inst(inst).results.get(idx)?;
        Some(self.func.dfg.value_ty(value))
    }

    pub(super) fn expect_object(&mut self, inst: InstId, value: ValueId, role: &str) -> Option<Type> {
        let ty = self.val_ty(value)?;
        if !ty.is_object() {
            self.emit_inst(
                DiagnosticCode::AddressObjectMismatch,
                format!("{role} must be an object value"),
                inst,
            );
        }
        Some(ty)
    }

    pub(super) fn expect_address(&mut self, inst: InstId, value: ValueId, role: &str) -> Option<Type> {
        let ty = self.val_ty(value)?;
        if !ty.is_address() {
            self.emit_inst(
                DiagnosticCode::AddressObjectMismatch,
                format!("{role} must be an address value"),
                inst,
            );
        }
        Some(ty)
    }

    fn expect_result(&mut self, inst: InstId, expected: Type, what: &str) {
        let Some(found) = self.result(inst, 0) else {
            self.emit_inst(
                DiagnosticCode::ResultTypeMismatch,
                format!("instruction is missing its {what} result"),
                inst,
            );
            return;
        };
        if found != expected {
            self.emit_inst(
                DiagnosticCode::ResultTypeMismatch,
                format!("result type does not match the {what}"),
                inst,
            );
        }
    }

    fn check_inst(&mut self, inst: InstId) {
        let kind = self.func.dfg.inst(inst).kind.clone();
        match kind {
            InstKind::AllocStack { ty } => {
                let results = self.func.dfg.inst(inst).results.clone();
                if results.len() != 2 {
                    self.emit_inst(
                        DiagnosticCode::ResultTypeMismatch,
                        "alloc_stack must produce a container and an address",
                        inst,
                    );
                    return;
                }
                if self.func.dfg.value_ty(results[0]) != Type::local_storage(ty) {
                    self.emit_inst(
                        DiagnosticCode::ResultTypeMismatch,
                        "alloc_stack container result must have local-storage category",
                        inst,
                    );
                }
                if self.func.dfg.value_ty(results[1]) != Type::address(ty) {
                    self.emit_inst(
                        DiagnosticCode::ResultTypeMismatch,
                        "alloc_stack address result does not match the allocated type",
                        inst,
                    );
                }
            }

            InstKind::AllocRef { ty } => {
                if self.module.types.as_class(ty).is_none() {
                    self.emit_inst(
                        DiagnosticCode::ReferenceSemanticsRequired,
                        "alloc_ref requires a class type",
                        inst,
                    );
                }
                self.expect_result(inst, Type::object(ty), "allocated class type");
            }

            InstKind::DeallocStack { operand } => {
                if let Some(ty) = self.val_ty(operand) {
                    if !ty.is_local_storage() {
                        self.emit_inst(
                            DiagnosticCode::AddressObjectMismatch,
                            "dealloc_stack operand must be a stack container",
                            inst,
                        );
                    }
                }
            }

            InstKind::DeallocRef { operand } => {
                if let Some(ty) = self.expect_object(inst, operand, "dealloc_ref operand") {
                    if !self.module.types.is_heap_object_reference(ty.base) {
                        self.emit_inst(
                            DiagnosticCode::ReferenceSemanticsRequired,
                            "dealloc_ref operand must reference a heap object",
                            inst,
                        );
                    }
                }
            }

            InstKind::Load { addr } => {
                if let Some(ty) = self.expect_address(inst, addr, "load source") {
                    self.expect_result(inst, Type::object(ty.base), "loaded type");
                }
            }

            InstKind::Store { src, dest } => {
                let src_ty = self.expect_object(inst, src, "stored value");
                let dest_ty = self.expect_address(inst, dest, "store destination");
                if let (Some(src_ty), Some(dest_ty)) = (src_ty, dest_ty) {
                    if src_ty.base != dest_ty.base {
                        self.emit_inst(
                            DiagnosticCode::OperandTypeMismatch,
                            "stored value type does not match the destination",
                            inst,
                        );
                    }
                }
            }

            InstKind::CopyAddr { src, dest } => {
                let src_ty = self.expect_address(inst, src, "copy_addr source");
                let dest_ty = self.expect_address(inst, dest, "copy_addr destination");
                if let (Some(src_ty), Some(dest_ty)) = (src_ty, dest_ty) {
                    if src_ty.base != dest_ty.base {
                        self.emit_inst(
                            DiagnosticCode::OperandTypeMismatch,
                            "copy_addr operands have different types",
                            inst,
                        );
                    }
                }
            }

            InstKind::DestroyAddr { operand } => {
                self.expect_address(inst, operand, "destroy_addr operand");
            }

            InstKind::IntLiteral { ty, .. } => {
                if self.module.types.as_int(ty).is_none() {
                    self.emit_inst(
                        DiagnosticCode::OperandTypeMismatch,
                        "int_literal requires an integer type",
                        inst,
                    );
                    return;
                }
                self.expect_result(inst, Type::object(ty), "literal type");
            }

            InstKind::FunctionRef { func } => {
                let Some(target) = self.module.funcs.get(func) else {
                    return;
                };
                let target_polymorphic = target.sig.is_polymorphic();
                let Some(res) = self.result(inst, 0) else {
                    return;
                };
                if !res.is_object() {
                    self.emit_inst(
                        DiagnosticCode::AddressObjectMismatch,
                        "function_ref result must be an object value",
                        inst,
                    );
                }
                let Some(func_ty) = self.module.types.as_func(res.base).cloned() else {
                    self.emit_inst(
                        DiagnosticCode::ResultTypeMismatch,
                        "function_ref result must have a function type",
                        inst,
                    );
                    return;
                };
                if func_ty.repr != basalt_ir::FuncRepr::Thin {
                    self.emit_inst(
                        DiagnosticCode::RepresentationMismatch,
                        "function_ref produces a thin function reference",
                        inst,
                    );
                }
                if func_ty.is_polymorphic() != target_polymorphic {
                    self.emit_inst(
                        DiagnosticCode::CalleeSignatureMismatch,
                        "function_ref type genericity disagrees with the referenced function",
                        inst,
                    );
                }
            }

            InstKind::GlobalAddr { global } => {
                let Some(gv) = self.module.globals.get(global) else {
                    return;
                };
                let base = gv.ty.base;
                self.expect_result(inst, Type::address(base), "global storage type");
            }

            InstKind::StrongRetain { operand } | InstKind::StrongRelease { operand } => {
                if let Some(ty) = self.expect_object(inst, operand, "reference-counting operand") {
                    if !self.module.types.has_reference_semantics(ty.base) {
                        self.emit_inst(
                            DiagnosticCode::ReferenceSemanticsRequired,
                            "operand does not have reference semantics",
                            inst,
                        );
                    }
                }
            }

            InstKind::StrongRetainAutoreleased { operand } => {
                if let Some(ty) = self.expect_object(inst, operand, "retain operand") {
                    if !self.module.types.has_reference_semantics(ty.base) {
                        self.emit_inst(
                            DiagnosticCode::ReferenceSemanticsRequired,
                            "operand does not have reference semantics",
                            inst,
                        );
                    }
                }
                if self.func.dfg.has_value(operand) && !self.func.dfg.is_apply_result(operand) {
                    self.emit_inst(
                        DiagnosticCode::OperandTypeMismatch,
                        "strong_retain_autoreleased must consume the result of an apply",
                        inst,
                    );
                }
            }

            InstKind::RetainValue { operand } | InstKind::ReleaseValue { operand } => {
                self.expect_object(inst, operand, "value operand");
            }

            InstKind::AutoreleaseValue { operand } => {
                if let Some(ty) = self.expect_object(inst, operand, "autorelease operand") {
                    if !self.module.types.has_reference_semantics(ty.base) {
                        self.emit_inst(
                            DiagnosticCode::ReferenceSemanticsRequired,
                            "autorelease operand does not have reference semantics",
                            inst,
                        );
                    }
                }
            }

            InstKind::Struct { fields } => {
                let Some(res) = self.result(inst, 0) else {
                    return;
                };
                let Some(s) = self.module.types.as_struct(res.base) else {
                    self.emit_inst(
                        DiagnosticCode::ResultTypeMismatch,
                        "struct must produce a struct type",
                        inst,
                    );
                    return;
                };
                let stored: Vec<_> = self.module.decls.structs[s]
                    .stored_fields()
                    .map(|f| f.ty)
                    .collect();
                if stored.len() != fields.len() {
                    self.emit_inst_note(
                        DiagnosticCode::FieldMismatch,
                        "struct operand count does not match the stored fields",
                        inst,
                        format!("expected {}, found {}", stored.len(), fields.len()),
                    );
                    return;
                }
                for (index, (value, field_ty)) in fields.iter().zip(stored).enumerate() {
                    let Some(ty) = self.val_ty(*value) else {
                        continue;
                    };
                    if !ty.is_object() || ty.base != field_ty {
                        self.emit_inst_note(
                            DiagnosticCode::FieldMismatch,
                            "struct operand type does not match its field",
                            inst,
                            format!("field index {index}"),
                        );
                    }
                }
            }

            InstKind::Tuple { elems } => {
                let Some(res) = self.result(inst, 0) else {
                    return;
                };
                let Some(elem_tys) = self.module.types.as_tuple(res.base).map(|e| e.to_vec())
                else {
                    self.emit_inst(
                        DiagnosticCode::ResultTypeMismatch,
                        "tuple must produce a tuple type",
                        inst,
                    );
                    return;
                };
                if elem_tys.len() != elems.len() {
                    self.emit_inst(
                        DiagnosticCode::ArityMismatch,
                        "tuple operand count does not match the tuple type",
                        inst,
                    );
                    return;
                }
                for (index, (value, elem_ty)) in elems.iter().zip(elem_tys).enumerate() {
                    let Some(ty) = self.val_ty(*value) else {
                        continue;
                    };
                    if !ty.is_object() || ty.base != elem_ty {
                        self.emit_inst_note(
                            DiagnosticCode::OperandTypeMismatch,
                            "tuple operand type does not match its element",
                            inst,
                            format!("element index {index}"),
                        );
                    }
                }
            }

            InstKind::Enum { case, operand } => {
                let Some(res) = self.result(inst, 0) else {
                    return;
                };
                let Some(e) = self.module.types.as_enum(res.base) else {
                    self.emit_inst(
                        DiagnosticCode::ResultTypeMismatch,
                        "enum must produce an enum type",
                        inst,
                    );
                    return;
                };
                let Some(case_decl) = self.module.decls.enum_case(e, case).cloned() else {
                    self.emit_inst_note(
                        DiagnosticCode::CaseMismatch,
                        "enum case index is out of bounds",
                        inst,
                        format!("case index {case}"),
                    );
                    return;
                };
                match (case_decl.payload, operand) {
                    (Some(payload), Some(value)) => {
                        if let Some(ty) = self.val_ty(value) {
                            if !ty.is_object() || ty.base != payload {
                                self.emit_inst(
                                    DiagnosticCode::CaseMismatch,
                                    "enum payload type does not match the case declaration",
                                    inst,
                                );
                            }
                        }
                    }
                    (Some(_), None) => self.emit_inst(
                        DiagnosticCode::CaseMismatch,
                        "enum case declares a payload but none is provided",
                        inst,
                    ),
                    (None, Some(_)) => self.emit_inst(
                        DiagnosticCode::CaseMismatch,
                        "enum case has no payload but an operand is provided",
                        inst,
                    ),
                    (None, None) => {}
                }
            }

            InstKind::StructExtract { operand, field } => {
                self.check_struct_projection(inst, operand, field, false);
            }
            InstKind::StructElementAddr { operand, field } => {
                self.check_struct_projection(inst, operand, field, true);
            }

            InstKind::TupleExtract { operand, index } => {
                self.check_tuple_projection(inst, operand, index, false);
            }
            InstKind::TupleElementAddr { operand, index } => {
                self.check_tuple_projection(inst, operand, index, true);
            }

            InstKind::RefElementAddr { operand, field } => {
                let Some(op_ty) = self.expect_object(inst, operand, "ref_element_addr operand")
                else {
                    return;
                };
                let Some(class) = self.module.types.as_class(op_ty.base) else {
                    self.emit_inst(
                        DiagnosticCode::OperandTypeMismatch,
                        "ref_element_addr operand must be a class instance",
                        inst,
                    );
                    return;
                };
                let Some(field_decl) = self.module.decls.class_field(class, field).cloned() else {
                    self.emit_inst_note(
                        DiagnosticCode::FieldMismatch,
                        "class field index is out of bounds",
                        inst,
                        format!("field index {field}"),
                    );
                    return;
                };
                if !field_decl.has_storage || field_decl.is_static {
                    self.emit_inst(
                        DiagnosticCode::FieldMismatch,
                        "projected class member is not a stored instance field",
                        inst,
                    );
                    return;
                }
                self.expect_result(inst, Type::address(field_decl.ty), "field type");
            }

            InstKind::InitEnumDataAddr { operand, case }
            | InstKind::UncheckedTakeEnumDataAddr { operand, case } => {
                self.check_enum_data_projection(inst, operand, case, true);
            }
            InstKind::UncheckedEnumData { operand, case } => {
                self.check_enum_data_projection(inst, operand, case, false);
            }

            InstKind::InjectEnumAddr { operand, case } => {
                let Some(op_ty) = self.expect_address(inst, operand, "inject_enum_addr operand")
                else {
                    return;
                };
                let Some(e) = self.module.types.as_enum(op_ty.base) else {
                    self.emit_inst(
                        DiagnosticCode::OperandTypeMismatch,
                        "inject_enum_addr operand must be an enum address",
                        inst,
                    );
                    return;
                };
                if self.module.decls.enum_case(e, case).is_none() {
                    self.emit_inst_note(
                        DiagnosticCode::CaseMismatch,
                        "enum case index is out of bounds",
                        inst,
                        format!("case index {case}"),
                    );
                }
            }

            InstKind::Metatype => {
                let Some(res) = self.result(inst, 0) else {
                    return;
                };
                if !res.is_object() || !self.module.types.is_plain_metatype(res.base) {
                    self.emit_inst(
                        DiagnosticCode::ResultTypeMismatch,
                        "metatype must produce a metatype object",
                        inst,
                    );
                }
            }

            InstKind::ValueMetatype { operand } => {
                let op_ty = self.expect_object(inst, operand, "value_metatype operand");
                let Some(res) = self.result(inst, 0) else {
                    return;
                };
                let instance_ok = self
                    .module
                    .types
                    .any_metatype(res.base)
                    .is_some_and(|(instance, _)| {
                        Some(instance) == op_ty.map(|ty| ty.base)
                            && self.module.types.is_plain_metatype(res.base)
                    });
                if !instance_ok {
                    self.emit_inst(
                        DiagnosticCode::ResultTypeMismatch,
                        "value_metatype result must be the metatype of its operand type",
                        inst,
                    );
                }
            }

            InstKind::ExistentialMetatype { operand } => {
                let Some(op_ty) = self.expect_object(inst, operand, "existential_metatype operand")
                else {
                    return;
                };
                if !self.module.types.is_existential(op_ty.base) {
                    self.emit_inst(
                        DiagnosticCode::OperandTypeMismatch,
                        "existential_metatype operand must be an existential",
                        inst,
                    );
                    return;
                }
                let Some(res) = self.result(inst, 0) else {
                    return;
                };
                let ok = self.module.types.is_existential_metatype(res.base)
                    && self
                        .module
                        .types
                        .any_metatype(res.base)
                        .is_some_and(|(instance, _)| instance == op_ty.base);
                if !ok {
                    self.emit_inst(
                        DiagnosticCode::ResultTypeMismatch,
                        "result must be the existential metatype of the operand type",
                        inst,
                    );
                }
            }

            InstKind::ThickToForeignMetatype { operand } => {
                self.check_metatype_repr_conversion(
                    inst,
                    operand,
                    basalt_ir::MetatypeRepr::Thick,
                    basalt_ir::MetatypeRepr::Foreign,
                );
            }
            InstKind::ForeignToThickMetatype { operand } => {
                self.check_metatype_repr_conversion(
                    inst,
                    operand,
                    basalt_ir::MetatypeRepr::Foreign,
                    basalt_ir::MetatypeRepr::Thick,
                );
            }

            InstKind::ThinToThickFunction { operand } => {
                let op_ty = self.expect_object(inst, operand, "thin_to_thick_function operand");
                let res = self.result(inst, 0);
                let (Some(op_ty), Some(res)) = (op_ty, res) else {
                    return;
                };
                let op_fn = self.module.types.as_func(op_ty.base).cloned();
                let res_fn = self.module.types.as_func(res.base).cloned();
                let (Some(op_fn), Some(res_fn)) = (op_fn, res_fn) else {
                    self.emit_inst(
                        DiagnosticCode::OperandTypeMismatch,
                        "thin_to_thick_function requires function types",
                        inst,
                    );
                    return;
                };
                let shape_ok = op_fn.repr == basalt_ir::FuncRepr::Thin
                    && res_fn.repr == basalt_ir::FuncRepr::Thick
                    && op_fn.params == res_fn.params
                    && op_fn.result == res_fn.result
                    && op_fn.cc == res_fn.cc
                    && op_fn.sig == res_fn.sig;
                if !shape_ok {
                    self.emit_inst(
                        DiagnosticCode::RepresentationMismatch,
                        "thin_to_thick_function may only change the representation",
                        inst,
                    );
                }
            }

            InstKind::ConvertFunction { operand } => {
                let op_ty = self.expect_object(inst, operand, "convert_function operand");
                let res = self.result(inst, 0);
                let (Some(op_ty), Some(res)) = (op_ty, res) else {
                    return;
                };
                let op_fn = self.module.types.as_func(op_ty.base).cloned();
                let res_fn = self.module.types.as_func(res.base).cloned();
                let (Some(op_fn), Some(res_fn)) = (op_fn, res_fn) else {
                    self.emit_inst(
                        DiagnosticCode::InvalidCastShape,
                        "convert_function requires function types",
                        inst,
                    );
                    return;
                };
                if op_fn.repr != res_fn.repr || op_fn.params.len() != res_fn.params.len() {
                    self.emit_inst(
                        DiagnosticCode::InvalidCastShape,
                        "convert_function may not change representation or arity",
                        inst,
                    );
                }
            }

            InstKind::Upcast { operand } => self.check_upcast(inst, operand),

            InstKind::UncheckedRefCast { operand } => {
                let op_ty = self.expect_object(inst, operand, "unchecked_ref_cast operand");
                let res = self.result(inst, 0);
                let (Some(op_ty), Some(res)) = (op_ty, res) else {
                    return;
                };
                if !self.module.types.is_heap_object_reference(op_ty.base)
                    || !self.module.types.is_heap_object_reference(res.base)
                {
                    self.emit_inst(
                        DiagnosticCode::ReferenceSemanticsRequired,
                        "unchecked_ref_cast converts between heap object references",
                        inst,
                    );
                }
            }

            InstKind::UncheckedAddrCast { operand } => {
                self.expect_address(inst, operand, "unchecked_addr_cast operand");
                if let Some(res) = self.result(inst, 0) {
                    if !res.is_address() {
                        self.emit_inst(
                            DiagnosticCode::AddressObjectMismatch,
                            "unchecked_addr_cast result must be an address",
                            inst,
                        );
                    }
                }
            }

            InstKind::AddressToPointer { operand } => {
                self.expect_address(inst, operand, "address_to_pointer operand");
                let Some(res) = self.result(inst, 0) else {
                    return;
                };
                let is_raw = matches!(self.module.types.data(res.base), TyData::RawPointer);
                if !res.is_object() || !is_raw {
                    self.emit_inst(
                        DiagnosticCode::ResultTypeMismatch,
                        "address_to_pointer must produce a raw pointer",
                        inst,
                    );
                }
            }

            InstKind::UnconditionalCheckedCast { operand, kind } => {
                let op_ty = self.val_ty(operand);
                let res = self.result(inst, 0);
                if let (Some(op_ty), Some(res)) = (op_ty, res) {
                    self.check_cast_shape(inst, kind, op_ty, res);
                }
            }

            InstKind::Apply {
                callee,
                substs,
                substituted_ty,
                args,
            } => self.check_apply(inst, callee, &substs, substituted_ty, &args),

            InstKind::PartialApply {
                callee,
                substs,
                substituted_ty,
                args,
            } => self.check_partial_apply(inst, callee, &substs, substituted_ty, &args),

            InstKind::ClassMethod { operand, method } => {
                self.check_class_method(inst, operand, method, false);
            }
            InstKind::SuperMethod { operand, method } => {
                self.check_class_method(inst, operand, method, true);
            }
            InstKind::WitnessMethod {
                lookup_ty,
                conformance,
                method,
            } => self.check_witness_method(inst, lookup_ty, conformance, method),
            InstKind::DynamicMethod { operand, method } => {
                self.check_dynamic_method(inst, operand, method);
            }

            InstKind::OpenExistential { operand } => self.check_open_existential(inst, operand, false),
            InstKind::OpenExistentialRef { operand } => {
                self.check_open_existential(inst, operand, true);
            }
            InstKind::InitExistential {
                operand,
                concrete_ty,
                conformances,
            } => self.check_init_existential(inst, operand, concrete_ty, &conformances),
            InstKind::InitExistentialRef {
                operand,
                conformances,
            } => self.check_init_existential_ref(inst, operand, &conformances),
            InstKind::UpcastExistential { src, dest } => {
                self.check_upcast_existential(inst, src, dest);
            }
            InstKind::UpcastExistentialRef { operand } => {
                self.check_upcast_existential_ref(inst, operand);
            }
            InstKind::DeinitExistential { operand } => self.check_deinit_existential(inst, operand),
            InstKind::ProjectExistential { operand } => {
                self.check_project_existential(inst, operand, false);
            }
            InstKind::ProjectExistentialRef { operand } => {
                self.check_project_existential(inst, operand, true);
            }

            InstKind::CondFail { operand } => {
                let ok = self
                    .val_ty(operand)
                    .is_some_and(|ty| ty.is_object() && self.module.types.as_int(ty.base) == Some(1));
                if !ok {
                    self.emit_inst(
                        DiagnosticCode::OperandTypeMismatch,
                        "cond_fail condition must be an i1 object",
                        inst,
                    );
                }
            }

            InstKind::Return { value } => {
                if let Some(ty) = self.val_ty(value) {
                    if ty != self.func.sig.ret() {
                        self.emit_inst(
                            DiagnosticCode::ReturnTypeMismatch,
                            "returned value type does not match the signature",
                            inst,
                        );
                    }
                }
            }

            InstKind::AutoreleaseReturn { value } => {
                if let Some(ty) = self.val_ty(value) {
                    if ty != self.func.sig.ret() {
                        self.emit_inst(
                            DiagnosticCode::ReturnTypeMismatch,
                            "returned value type does not match the signature",
                            inst,
                        );
                    }
                    if !self.module.types.has_reference_semantics(ty.base) {
                        self.emit_inst(
                            DiagnosticCode::ReferenceSemanticsRequired,
                            "autorelease_return requires a reference value",
                            inst,
                        );
                    }
                }
            }

            InstKind::Unreachable | InstKind::Br { .. } => {}

            InstKind::CondBr { cond, .. } => {
                let ok = self
                    .val_ty(cond)
                    .is_some_and(|ty| ty.is_object() && self.module.types.as_int(ty.base) == Some(1));
                if !ok {
                    self.emit_inst(
                        DiagnosticCode::OperandTypeMismatch,
                        "cond_br condition must be an i1 object",
                        inst,
                    );
                }
            }

            InstKind::SwitchInt {
                operand,
                cases,
                default,
            } => self.check_switch_int(inst, operand, &cases, default),

            InstKind::SwitchEnum {
                operand,
                cases,
                default,
            } => self.check_switch_enum(inst, operand, &cases, default, false),

            InstKind::SwitchEnumAddr {
                operand,
                cases,
                default,
            } => self.check_switch_enum(inst, operand, &cases, default, true),

            InstKind::CheckedCastBr {
                operand,
                kind,
                cast_ty,
                success,
                failure,
            } => self.check_checked_cast_br(inst, operand, kind, cast_ty, success, failure),
        }
    }

    fn check_struct_projection(&mut self, inst: InstId, operand: ValueId, field: usize, addr: bool) {
        let op_ty = if addr {
            self.expect_address(inst, operand, "struct projection operand")
        } else {
            self.expect_object(inst, operand, "struct projection operand")
        };
        let Some(op_ty) = op_ty else {
            return;
        };
        let Some(s) = self.module.types.as_struct(op_ty.base) else {
            self.emit_inst(
                DiagnosticCode::OperandTypeMismatch,
                "struct projection operand must have a struct type",
                inst,
            );
            return;
        };
        let Some(field_decl) = self.module.decls.struct_field(s, field).cloned() else {
            self.emit_inst_note(
                DiagnosticCode::FieldMismatch,
                "struct field index is out of bounds",
                inst,
                format!("field index {field}"),
            );
            return;
        };
        if !field_decl.has_storage || field_decl.is_static {
            self.emit_inst(
                DiagnosticCode::FieldMismatch,
                "projected struct member is not a stored instance field",
                inst,
            );
            return;
        }
        let expected = if addr {
            Type::address(field_decl.ty)
        } else {
            Type::object(field_decl.ty)
        };
        self.expect_result(inst, expected, "field type");
    }

    fn check_tuple_projection(&mut self, inst: InstId, operand: ValueId, index: usize, addr: bool) {
        let op_ty = if addr {
            self.expect_address(inst, operand, "tuple projection operand")
        } else {
            self.expect_object(inst, operand, "tuple projection operand")
        };
        let Some(op_ty) = op_ty else {
            return;
        };
        let Some(elem) = self
            .module
            .types
            .as_tuple(op_ty.base)
            .and_then(|elems| elems.get(index).copied())
        else {
            self.emit_inst_note(
                DiagnosticCode::OperandTypeMismatch,
                "tuple projection index is out of bounds or operand is not a tuple",
                inst,
                format!("element index {index}"),
            );
            return;
        };
        let expected = if addr {
            Type::address(elem)
        } else {
            Type::object(elem)
        };
        self.expect_result(inst, expected, "element type");
    }

    fn check_enum_data_projection(&mut self, inst: InstId, operand: ValueId, case: usize, addr: bool) {
        let op_ty = if addr {
            self.expect_address(inst, operand, "enum projection operand")
        } else {
            self.expect_object(inst, operand, "enum projection operand")
        };
        let Some(op_ty) = op_ty else {
            return;
        };
        let Some(e) = self.module.types.as_enum(op_ty.base) else {
            self.emit_inst(
                DiagnosticCode::OperandTypeMismatch,
                "enum projection operand must have an enum type",
                inst,
            );
            return;
        };
        let payload = self
            .module
            .decls
            .enum_case(e, case)
            .and_then(|decl| decl.payload);
        let Some(payload) = payload else {
            self.emit_inst_note(
                DiagnosticCode::CaseMismatch,
                "projected enum case does not carry a payload",
                inst,
                format!("case index {case}"),
            );
            return;
        };
        let expected = if addr {
            Type::address(payload)
        } else {
            Type::object(payload)
        };
        self.expect_result(inst, expected, "payload type");
    }

    fn check_metatype_repr_conversion(
        &mut self,
        inst: InstId,
        operand: ValueId,
        from: basalt_ir::MetatypeRepr,
        to: basalt_ir::MetatypeRepr,
    ) {
        let op_ty = self.expect_object(inst, operand, "metatype conversion operand");
        let res = self.result(inst, 0);
        let (Some(op_ty), Some(res)) = (op_ty, res) else {
            return;
        };
        let op_meta = self.module.types.any_metatype(op_ty.base);
        let res_meta = self.module.types.any_metatype(res.base);
        let ok = matches!(
            (op_meta, res_meta),
            (Some((op_instance, Some(op_repr))), Some((res_instance, Some(res_repr))))
                if op_instance == res_instance && op_repr == from && res_repr == to
        );
        if !ok {
            self.emit_inst(
                DiagnosticCode::RepresentationMismatch,
                "metatype conversion must only change the representation",
                inst,
            );
        }
    }

    fn check_upcast(&mut self, inst: InstId, operand: ValueId) {
        let op_ty = self.expect_object(inst, operand, "upcast operand");
        let res = self.result(inst, 0);
        let (Some(op_ty), Some(res)) = (op_ty, res) else {
            return;
        };

        let types = &self.module.types;
        let class_ok = types.is_superclass_of(res.base, op_ty.base, &self.module.decls);

        let meta_ok = match (types.any_metatype(op_ty.base), types.any_metatype(res.base)) {
            (Some((op_instance, _)), Some((res_instance, _))) => {
                types.is_plain_metatype(op_ty.base)
                    && types.is_plain_metatype(res.base)
                    && types.is_superclass_of(res_instance, op_instance, &self.module.decls)
            }
            _ => false,
        };

        if !class_ok && !meta_ok {
            self.emit_inst(
                DiagnosticCode::InvalidCastShape,
                "upcast result must be a strict superclass of the operand",
                inst,
            );
        }
    }
}
