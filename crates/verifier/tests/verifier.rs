use basalt_ir::{
    CallingConv, CaseDecl, CheckedCastKind, ClassDecl, EnumDecl, FieldDecl, FuncRef, FuncRepr,
    FuncTyData, GenericParamDef, GenericSig, GlobalVariable, InstKind, Linkage, LocKind,
    MethodDecl, MethodOwner, ModuleBuilder, Operand, ParamConvention, ParamInfo, ProtocolDecl,
    ResultConvention, ResultInfo, Signature, StructDecl, Type, VTable, WitnessTable,
    WitnessTableEntry,
};
use basalt_verifier::{
    verify_function, verify_global, verify_module, DiagnosticCode, VerificationLevel,
    VerificationReport, VerifierConfig,
};
use smallvec::smallvec;

fn standard() -> VerifierConfig {
    VerifierConfig::default()
}

fn full() -> VerifierConfig {
    VerifierConfig::for_level(VerificationLevel::Full)
}

fn has_code(report: &VerificationReport, code: DiagnosticCode) -> bool {
    report.diagnostics.iter().any(|diag| diag.code == code)
}

fn assert_code(report: &VerificationReport, code: DiagnosticCode) {
    assert!(
        has_code(report, code),
        "expected {code:?}, got:\n{report}"
    );
}

/// A private function returning the empty tuple.
fn unit_function(mb: &mut ModuleBuilder, name: &str) -> FuncRef {
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new(name, Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    let value = fb.insert_one(InstKind::Tuple { elems: smallvec![] }, ret);
    fb.insert_inst(InstKind::Return { value }, &[], LocKind::Return);
    func
}

fn finish_with_unit_return(fb: &mut basalt_ir::FunctionBuilder<'_>, ret: Type) {
    let value = fb.insert_one(InstKind::Tuple { elems: smallvec![] }, ret);
    fb.insert(InstKind::Return { value }, &[]);
}

#[test]
fn minimal_function_passes() {
    let mut mb = ModuleBuilder::new();
    let func = unit_function(&mut mb, "main");
    let module = mb.build();

    let report = verify_function(&module, func, &full());
    assert!(report.is_ok(), "{report}");
}

#[test]
fn module_verification_is_deterministic() {
    let mut mb = ModuleBuilder::new();
    unit_function(&mut mb, "a");
    unit_function(&mut mb, "b");
    let module = mb.build();

    let report = verify_module(&module, &full());
    assert!(report.is_ok(), "{report}");
}

#[test]
fn empty_block_is_reported() {
    let mut mb = ModuleBuilder::new();
    let func = unit_function(&mut mb, "f");
    let mut fb = mb.build_function(func);
    fb.make_block();
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::EmptyBlock);
}

#[test]
fn missing_terminator_is_reported() {
    let mut mb = ModuleBuilder::new();
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    fb.insert_one(InstKind::Tuple { elems: smallvec![] }, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::MissingTerminator);
}

#[test]
fn terminator_before_end_of_block() {
    let mut mb = ModuleBuilder::new();
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    let value = fb.insert_one(InstKind::Tuple { elems: smallvec![] }, ret);
    fb.insert(InstKind::Return { value }, &[]);
    fb.insert_one(InstKind::Tuple { elems: smallvec![] }, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::TerminatorNotLast);
}

#[test]
fn external_linkage_with_body() {
    let mut mb = ModuleBuilder::new();
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::PublicExternal, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::ExternalFunctionWithBody);
}

#[test]
fn bodiless_function_with_defining_linkage() {
    let mut mb = ModuleBuilder::new();
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Public, &[], ret));
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::MissingEntryBlock);
}

#[test]
fn entry_args_must_match_signature() {
    let mut mb = ModuleBuilder::new();
    let unit = mb.module.types.make_tuple(&[]);
    let i32_ty = mb.module.types.make_int(32);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new(
        "f",
        Linkage::Private,
        &[Type::object(i32_ty)],
        ret,
    ));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::EntryArgMismatch);
}

#[test]
fn branch_args_must_match_target() {
    let mut mb = ModuleBuilder::new();
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    let exit = fb.make_block();

    fb.switch_to_block(entry);
    let value = fb.insert_one(InstKind::Tuple { elems: smallvec![] }, ret);
    fb.insert(
        InstKind::Br {
            dest: exit,
            args: smallvec![value],
        },
        &[],
    );

    fb.switch_to_block(exit);
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::BranchArgMismatch);
}

#[test]
fn block_arg_edges_pass() {
    let mut mb = ModuleBuilder::new();
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    let exit = fb.make_block();
    let passed = fb.append_block_arg(exit, ret);

    fb.switch_to_block(entry);
    let value = fb.insert_one(InstKind::Tuple { elems: smallvec![] }, ret);
    fb.insert(
        InstKind::Br {
            dest: exit,
            args: smallvec![value],
        },
        &[],
    );

    fb.switch_to_block(exit);
    fb.insert(InstKind::Return { value: passed }, &[]);
    let module = mb.build();

    let report = verify_function(&module, func, &full());
    assert!(report.is_ok(), "{report}");
}

#[test]
fn corrupted_predecessor_list() {
    let mut mb = ModuleBuilder::new();
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    let exit = fb.make_block();

    fb.switch_to_block(entry);
    fb.insert(
        InstKind::Br {
            dest: exit,
            args: smallvec![],
        },
        &[],
    );
    fb.switch_to_block(exit);
    finish_with_unit_return(&mut fb, ret);

    mb.func_mut(func).dfg.blocks[exit].preds.push(entry);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::EdgeAsymmetry);
}

#[test]
fn multiple_epilog_blocks() {
    let mut mb = ModuleBuilder::new();
    let unit = mb.module.types.make_tuple(&[]);
    let i1 = mb.module.types.make_int(1);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    let then_block = fb.make_block();
    let else_block = fb.make_block();

    fb.switch_to_block(entry);
    let cond = fb.insert_one(
        InstKind::IntLiteral { value: 0, ty: i1 },
        Type::object(i1),
    );
    fb.insert(
        InstKind::CondBr {
            cond,
            then_dest: then_block,
            then_args: smallvec![],
            else_dest: else_block,
            else_args: smallvec![],
        },
        &[],
    );

    fb.switch_to_block(then_block);
    finish_with_unit_return(&mut fb, ret);
    fb.switch_to_block(else_block);
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::MultipleEpilogBlocks);
}

#[test]
fn use_from_unreachable_block() {
    let mut mb = ModuleBuilder::new();
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    let dead = fb.make_block();
    let exit = fb.make_block();

    fb.switch_to_block(entry);
    fb.insert(
        InstKind::Br {
            dest: exit,
            args: smallvec![],
        },
        &[],
    );

    fb.switch_to_block(dead);
    let value = fb.insert_one(InstKind::Tuple { elems: smallvec![] }, ret);
    fb.insert(
        InstKind::Br {
            dest: exit,
            args: smallvec![],
        },
        &[],
    );

    fb.switch_to_block(exit);
    fb.insert(InstKind::Return { value }, &[]);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::UseNotDominated);
}

#[test]
fn load_result_must_match_address() {
    let mut mb = ModuleBuilder::new();
    let unit = mb.module.types.make_tuple(&[]);
    let i32_ty = mb.module.types.make_int(32);
    let i64_ty = mb.module.types.make_int(64);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    let slots = fb.insert(
        InstKind::AllocStack { ty: i32_ty },
        &[Type::local_storage(i32_ty), Type::address(i32_ty)],
    );
    fb.insert_one(InstKind::Load { addr: slots[1] }, Type::object(i64_ty));
    fb.insert(InstKind::DeallocStack { operand: slots[0] }, &[]);
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::ResultTypeMismatch);
}

#[test]
fn store_operand_must_match_destination() {
    let mut mb = ModuleBuilder::new();
    let unit = mb.module.types.make_tuple(&[]);
    let i32_ty = mb.module.types.make_int(32);
    let i64_ty = mb.module.types.make_int(64);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    let slots = fb.insert(
        InstKind::AllocStack { ty: i32_ty },
        &[Type::local_storage(i32_ty), Type::address(i32_ty)],
    );
    let wide = fb.insert_one(
        InstKind::IntLiteral {
            value: 1,
            ty: i64_ty,
        },
        Type::object(i64_ty),
    );
    fb.insert(
        InstKind::Store {
            src: wide,
            dest: slots[1],
        },
        &[],
    );
    fb.insert(InstKind::DeallocStack { operand: slots[0] }, &[]);
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::OperandTypeMismatch);
}

#[test]
fn struct_operands_must_cover_stored_fields() {
    let mut mb = ModuleBuilder::new();
    let i32_ty = mb.module.types.make_int(32);
    let s = mb.module.decls.structs.push(StructDecl {
        name: "Pair".into(),
        fields: vec![
            FieldDecl {
                name: "a".into(),
                ty: i32_ty,
                is_static: false,
                has_storage: true,
            },
            FieldDecl {
                name: "b".into(),
                ty: i32_ty,
                is_static: false,
                has_storage: true,
            },
        ],
    });
    let pair_ty = mb.module.types.make_struct(s);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    let one = fb.insert_one(
        InstKind::IntLiteral {
            value: 1,
            ty: i32_ty,
        },
        Type::object(i32_ty),
    );
    fb.insert_one(
        InstKind::Struct {
            fields: smallvec![one],
        },
        Type::object(pair_ty),
    );
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::FieldMismatch);
}

fn option_like_enum(mb: &mut ModuleBuilder) -> (basalt_ir::EnumRef, basalt_ir::TyId) {
    let i32_ty = mb.module.types.make_int(32);
    let e = mb.module.decls.enums.push(EnumDecl {
        name: "Opt".into(),
        cases: vec![
            CaseDecl {
                name: "none".into(),
                payload: None,
            },
            CaseDecl {
                name: "some".into(),
                payload: Some(i32_ty),
            },
        ],
    });
    let ty = mb.module.types.make_enum(e);
    (e, ty)
}

#[test]
fn switch_enum_must_be_covered() {
    let mut mb = ModuleBuilder::new();
    let (_, enum_ty) = option_like_enum(&mut mb);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    let none_dest = fb.make_block();

    fb.switch_to_block(entry);
    let scrutinee = fb.insert_one(
        InstKind::Enum {
            case: 0,
            operand: None,
        },
        Type::object(enum_ty),
    );
    fb.insert(
        InstKind::SwitchEnum {
            operand: scrutinee,
            cases: vec![(0, none_dest)],
            default: None,
        },
        &[],
    );

    fb.switch_to_block(none_dest);
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::MissingSwitchCase);
}

#[test]
fn switch_enum_rejects_duplicate_cases() {
    let mut mb = ModuleBuilder::new();
    let (_, enum_ty) = option_like_enum(&mut mb);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    let first = fb.make_block();
    let second = fb.make_block();
    let fallback = fb.make_block();

    fb.switch_to_block(entry);
    let scrutinee = fb.insert_one(
        InstKind::Enum {
            case: 0,
            operand: None,
        },
        Type::object(enum_ty),
    );
    fb.insert(
        InstKind::SwitchEnum {
            operand: scrutinee,
            cases: vec![(0, first), (0, second)],
            default: Some(fallback),
        },
        &[],
    );

    for block in [first, second, fallback] {
        fb.switch_to_block(block);
        finish_with_unit_return(&mut fb, ret);
    }
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::DuplicateSwitchCase);
}

#[test]
fn exhaustive_switch_enum_rejects_default() {
    let mut mb = ModuleBuilder::new();
    let (_, enum_ty) = option_like_enum(&mut mb);
    let i32_ty = mb.module.types.make_int(32);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    let none_dest = fb.make_block();
    let some_dest = fb.make_block();
    fb.append_block_arg(some_dest, Type::object(i32_ty));
    let fallback = fb.make_block();

    fb.switch_to_block(entry);
    let scrutinee = fb.insert_one(
        InstKind::Enum {
            case: 0,
            operand: None,
        },
        Type::object(enum_ty),
    );
    fb.insert(
        InstKind::SwitchEnum {
            operand: scrutinee,
            cases: vec![(0, none_dest), (1, some_dest)],
            default: Some(fallback),
        },
        &[],
    );

    for block in [none_dest, some_dest, fallback] {
        fb.switch_to_block(block);
        finish_with_unit_return(&mut fb, ret);
    }
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::SpuriousDefault);
}

#[test]
fn payloadless_case_dest_takes_no_argument() {
    let mut mb = ModuleBuilder::new();
    let (_, enum_ty) = option_like_enum(&mut mb);
    let i32_ty = mb.module.types.make_int(32);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    let none_dest = fb.make_block();
    fb.append_block_arg(none_dest, Type::object(i32_ty));
    let fallback = fb.make_block();

    fb.switch_to_block(entry);
    let scrutinee = fb.insert_one(
        InstKind::Enum {
            case: 0,
            operand: None,
        },
        Type::object(enum_ty),
    );
    fb.insert(
        InstKind::SwitchEnum {
            operand: scrutinee,
            cases: vec![(0, none_dest)],
            default: Some(fallback),
        },
        &[],
    );

    fb.switch_to_block(none_dest);
    finish_with_unit_return(&mut fb, ret);
    fb.switch_to_block(fallback);
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::SwitchCaseArgMismatch);
}

fn monomorphic_callee(mb: &mut ModuleBuilder) -> (FuncRef, basalt_ir::TyId, basalt_ir::TyId) {
    let i32_ty = mb.module.types.make_int(32);
    let fn_ty = mb.module.types.make_func(FuncTyData {
        params: vec![ParamInfo {
            ty: i32_ty,
            convention: ParamConvention::DirectOwned,
        }],
        result: ResultInfo {
            ty: i32_ty,
            convention: ResultConvention::Owned,
        },
        repr: FuncRepr::Thin,
        cc: CallingConv::Freestanding,
        sig: None,
    });
    let callee = mb.declare_function(Signature::new(
        "callee",
        Linkage::PublicExternal,
        &[Type::object(i32_ty)],
        Type::object(i32_ty),
    ));
    (callee, fn_ty, i32_ty)
}

#[test]
fn apply_checks_arity() {
    let mut mb = ModuleBuilder::new();
    let (callee, fn_ty, i32_ty) = monomorphic_callee(&mut mb);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    let callee_val = fb.insert_one(InstKind::FunctionRef { func: callee }, Type::object(fn_ty));
    fb.insert_one(
        InstKind::Apply {
            callee: callee_val,
            substs: smallvec![],
            substituted_ty: fn_ty,
            args: smallvec![],
        },
        Type::object(i32_ty),
    );
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::ArityMismatch);
}

#[test]
fn apply_rejects_substitutions_on_monomorphic_callee() {
    let mut mb = ModuleBuilder::new();
    let (callee, fn_ty, i32_ty) = monomorphic_callee(&mut mb);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    let callee_val = fb.insert_one(InstKind::FunctionRef { func: callee }, Type::object(fn_ty));
    let arg = fb.insert_one(
        InstKind::IntLiteral {
            value: 7,
            ty: i32_ty,
        },
        Type::object(i32_ty),
    );
    fb.insert_one(
        InstKind::Apply {
            callee: callee_val,
            substs: smallvec![basalt_ir::Substitution {
                replacement: i32_ty
            }],
            substituted_ty: fn_ty,
            args: smallvec![arg],
        },
        Type::object(i32_ty),
    );
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::SubstitutionShapeMismatch);
}

#[test]
fn well_formed_apply_passes() {
    let mut mb = ModuleBuilder::new();
    let (callee, fn_ty, i32_ty) = monomorphic_callee(&mut mb);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    let callee_val = fb.insert_one(InstKind::FunctionRef { func: callee }, Type::object(fn_ty));
    let arg = fb.insert_one(
        InstKind::IntLiteral {
            value: 7,
            ty: i32_ty,
        },
        Type::object(i32_ty),
    );
    fb.insert_one(
        InstKind::Apply {
            callee: callee_val,
            substs: smallvec![],
            substituted_ty: fn_ty,
            args: smallvec![arg],
        },
        Type::object(i32_ty),
    );
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &full());
    assert!(report.is_ok(), "{report}");
}

#[test]
fn upcast_requires_superclass_relation() {
    let mut mb = ModuleBuilder::new();
    let a = mb.module.decls.classes.push(ClassDecl {
        name: "A".into(),
        superclass: None,
        fields: vec![],
    });
    let c = mb.module.decls.classes.push(ClassDecl {
        name: "C".into(),
        superclass: None,
        fields: vec![],
    });
    let a_ty = mb.module.types.make_class(a);
    let c_ty = mb.module.types.make_class(c);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    let obj = fb.insert_one(InstKind::AllocRef { ty: c_ty }, Type::object(c_ty));
    fb.insert_one(InstKind::Upcast { operand: obj }, Type::object(a_ty));
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::InvalidCastShape);
}

#[test]
fn checked_cast_br_success_dest_takes_cast_value() {
    let mut mb = ModuleBuilder::new();
    let a = mb.module.decls.classes.push(ClassDecl {
        name: "A".into(),
        superclass: None,
        fields: vec![],
    });
    let b = mb.module.decls.classes.push(ClassDecl {
        name: "B".into(),
        superclass: Some(a),
        fields: vec![],
    });
    let a_ty = mb.module.types.make_class(a);
    let b_ty = mb.module.types.make_class(b);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    let success = fb.make_block();
    let failure = fb.make_block();

    fb.switch_to_block(entry);
    let obj = fb.insert_one(InstKind::AllocRef { ty: a_ty }, Type::object(a_ty));
    fb.insert(
        InstKind::CheckedCastBr {
            operand: obj,
            kind: CheckedCastKind::Downcast,
            cast_ty: Type::object(b_ty),
            success,
            failure,
        },
        &[],
    );

    fb.switch_to_block(success);
    finish_with_unit_return(&mut fb, ret);
    fb.switch_to_block(failure);
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::BranchArgMismatch);
}

#[test]
fn stack_allocations_must_be_released() {
    let mut mb = ModuleBuilder::new();
    let i32_ty = mb.module.types.make_int(32);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    fb.insert(
        InstKind::AllocStack { ty: i32_ty },
        &[Type::local_storage(i32_ty), Type::address(i32_ty)],
    );
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &full());
    assert_code(&report, DiagnosticCode::StackNotEmptyAtReturn);
}

#[test]
fn stack_deallocation_order_is_lifo() {
    let mut mb = ModuleBuilder::new();
    let i32_ty = mb.module.types.make_int(32);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    let outer = fb.insert(
        InstKind::AllocStack { ty: i32_ty },
        &[Type::local_storage(i32_ty), Type::address(i32_ty)],
    );
    let inner = fb.insert(
        InstKind::AllocStack { ty: i32_ty },
        &[Type::local_storage(i32_ty), Type::address(i32_ty)],
    );
    fb.insert(InstKind::DeallocStack { operand: outer[0] }, &[]);
    fb.insert(InstKind::DeallocStack { operand: inner[0] }, &[]);
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &full());
    assert_code(&report, DiagnosticCode::DeallocOrderMismatch);
}

#[test]
fn merges_require_equal_stacks() {
    let mut mb = ModuleBuilder::new();
    let i1 = mb.module.types.make_int(1);
    let i32_ty = mb.module.types.make_int(32);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    let alloc_path = fb.make_block();
    let skip_path = fb.make_block();
    let merge = fb.make_block();

    fb.switch_to_block(entry);
    let cond = fb.insert_one(
        InstKind::IntLiteral { value: 0, ty: i1 },
        Type::object(i1),
    );
    fb.insert(
        InstKind::CondBr {
            cond,
            then_dest: alloc_path,
            then_args: smallvec![],
            else_dest: skip_path,
            else_args: smallvec![],
        },
        &[],
    );

    fb.switch_to_block(alloc_path);
    fb.insert(
        InstKind::AllocStack { ty: i32_ty },
        &[Type::local_storage(i32_ty), Type::address(i32_ty)],
    );
    fb.insert(
        InstKind::Br {
            dest: merge,
            args: smallvec![],
        },
        &[],
    );

    fb.switch_to_block(skip_path);
    fb.insert(
        InstKind::Br {
            dest: merge,
            args: smallvec![],
        },
        &[],
    );

    fb.switch_to_block(merge);
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &full());
    assert_code(&report, DiagnosticCode::StackMismatchAtMerge);
}

#[test]
fn escaped_archetype_is_reported() {
    let mut mb = ModuleBuilder::new();
    let arch = mb.module.types.make_archetype(basalt_ir::ArchetypeData {
        name: "T".into(),
        kind: basalt_ir::ArchetypeKind::Primary { depth: 0, index: 0 },
        requires_class: false,
        conforms_to: vec![],
    });
    let arch_ty = mb.module.types.make_archetype_ty(arch);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    fb.insert(
        InstKind::AllocStack { ty: arch_ty },
        &[Type::local_storage(arch_ty), Type::address(arch_ty)],
    );
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::EscapedArchetype);
}

#[test]
fn corrupted_operand_arena() {
    let mut mb = ModuleBuilder::new();
    let func = unit_function(&mut mb, "f");

    let f = mb.func_mut(func);
    let user = f.dfg.insts.keys().next().unwrap();
    let value = f.dfg.values.keys().next().unwrap();
    f.dfg.operands.push(Operand {
        user,
        index: 99,
        value,
    });
    let module = mb.build();

    let report = verify_function(&module, func, &full());
    assert_code(&report, DiagnosticCode::OperandUserMismatch);
}

#[test]
fn duplicate_function_symbols() {
    let mut mb = ModuleBuilder::new();
    unit_function(&mut mb, "dup");
    unit_function(&mut mb, "dup");
    let module = mb.build();

    let report = verify_module(&module, &standard());
    assert_code(&report, DiagnosticCode::DuplicateSymbol);
}

#[test]
fn globals_store_object_types() {
    let mut mb = ModuleBuilder::new();
    let i32_ty = mb.module.types.make_int(32);
    let global = mb.add_global(GlobalVariable {
        name: "g".into(),
        linkage: Linkage::Public,
        ty: Type::address(i32_ty),
    });
    let module = mb.build();

    let report = verify_global(&module, global, &standard());
    assert_code(&report, DiagnosticCode::GlobalAddressType);
}

#[test]
fn one_vtable_per_class() {
    let mut mb = ModuleBuilder::new();
    let class = mb.module.decls.classes.push(ClassDecl {
        name: "A".into(),
        superclass: None,
        fields: vec![],
    });
    mb.add_vtable(VTable {
        class,
        entries: vec![],
    });
    mb.add_vtable(VTable {
        class,
        entries: vec![],
    });
    let module = mb.build();

    let report = verify_module(&module, &standard());
    assert_code(&report, DiagnosticCode::DuplicateVTable);
}

/// Freestanding `(i32, i32) -> i32` whose result is an interior pointer.
fn pair_callee(
    mb: &mut ModuleBuilder,
    result_conv: ResultConvention,
) -> (FuncRef, basalt_ir::TyId, basalt_ir::TyId) {
    let i32_ty = mb.module.types.make_int(32);
    let fn_ty = mb.module.types.make_func(FuncTyData {
        params: vec![
            ParamInfo {
                ty: i32_ty,
                convention: ParamConvention::DirectOwned,
            },
            ParamInfo {
                ty: i32_ty,
                convention: ParamConvention::DirectOwned,
            },
        ],
        result: ResultInfo {
            ty: i32_ty,
            convention: result_conv,
        },
        repr: FuncRepr::Thin,
        cc: CallingConv::Freestanding,
        sig: None,
    });
    let callee = mb.declare_function(Signature::new(
        "pair",
        Linkage::PublicExternal,
        &[Type::object(i32_ty), Type::object(i32_ty)],
        Type::object(i32_ty),
    ));
    (callee, fn_ty, i32_ty)
}

fn partial_apply_one(
    mb: &mut ModuleBuilder,
    func: FuncRef,
    callee: FuncRef,
    fn_ty: basalt_ir::TyId,
    i32_ty: basalt_ir::TyId,
    result_ty: basalt_ir::TyId,
    ret: Type,
) {
    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    let callee_val = fb.insert_one(InstKind::FunctionRef { func: callee }, Type::object(fn_ty));
    let arg = fb.insert_one(
        InstKind::IntLiteral {
            value: 2,
            ty: i32_ty,
        },
        Type::object(i32_ty),
    );
    fb.insert_one(
        InstKind::PartialApply {
            callee: callee_val,
            substs: smallvec![],
            substituted_ty: fn_ty,
            args: smallvec![arg],
        },
        Type::object(result_ty),
    );
    finish_with_unit_return(&mut fb, ret);
}

#[test]
fn partial_apply_normalizes_inner_pointer_result() {
    let mut mb = ModuleBuilder::new();
    let (callee, fn_ty, i32_ty) = pair_callee(&mut mb, ResultConvention::UnownedInnerPointer);
    let result_ty = mb.module.types.make_func(FuncTyData {
        params: vec![ParamInfo {
            ty: i32_ty,
            convention: ParamConvention::DirectOwned,
        }],
        result: ResultInfo {
            ty: i32_ty,
            convention: ResultConvention::Unowned,
        },
        repr: FuncRepr::Thick,
        cc: CallingConv::Freestanding,
        sig: None,
    });
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));
    partial_apply_one(&mut mb, func, callee, fn_ty, i32_ty, result_ty, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &full());
    assert!(report.is_ok(), "{report}");
}

#[test]
fn partial_apply_rejects_surviving_inner_pointer_result() {
    let mut mb = ModuleBuilder::new();
    let (callee, fn_ty, i32_ty) = pair_callee(&mut mb, ResultConvention::UnownedInnerPointer);
    let result_ty = mb.module.types.make_func(FuncTyData {
        params: vec![ParamInfo {
            ty: i32_ty,
            convention: ParamConvention::DirectOwned,
        }],
        result: ResultInfo {
            ty: i32_ty,
            convention: ResultConvention::UnownedInnerPointer,
        },
        repr: FuncRepr::Thick,
        cc: CallingConv::Freestanding,
        sig: None,
    });
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));
    partial_apply_one(&mut mb, func, callee, fn_ty, i32_ty, result_ty, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::PartialApplyShapeMismatch);
}

#[test]
fn generic_callee_requires_substitutions() {
    let mut mb = ModuleBuilder::new();
    let i32_ty = mb.module.types.make_int(32);
    let t = mb.module.types.make_generic_param(0, 0);
    let sig = GenericSig {
        params: vec![GenericParamDef { depth: 0, index: 0 }],
        requirements: vec![],
    };
    let fn_ty = mb.module.types.make_func(FuncTyData {
        params: vec![ParamInfo {
            ty: t,
            convention: ParamConvention::DirectOwned,
        }],
        result: ResultInfo {
            ty: i32_ty,
            convention: ResultConvention::Owned,
        },
        repr: FuncRepr::Thin,
        cc: CallingConv::Freestanding,
        sig: Some(sig.clone()),
    });
    let callee = mb.declare_function(
        Signature::new(
            "id",
            Linkage::PublicExternal,
            &[Type::object(i32_ty)],
            Type::object(i32_ty),
        )
        .with_generic_sig(sig),
    );
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    let callee_val = fb.insert_one(InstKind::FunctionRef { func: callee }, Type::object(fn_ty));
    let arg = fb.insert_one(
        InstKind::IntLiteral {
            value: 7,
            ty: i32_ty,
        },
        Type::object(i32_ty),
    );
    fb.insert_one(
        InstKind::Apply {
            callee: callee_val,
            substs: smallvec![],
            substituted_ty: fn_ty,
            args: smallvec![arg],
        },
        Type::object(i32_ty),
    );
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::SubstitutionShapeMismatch);
}

#[test]
fn dynamic_self_results_are_erased() {
    let mut mb = ModuleBuilder::new();
    let class = mb.module.decls.classes.push(ClassDecl {
        name: "A".into(),
        superclass: None,
        fields: vec![],
    });
    let class_ty = mb.module.types.make_class(class);
    let any_object = mb.module.types.make_any_object();
    let method_ty = mb.module.types.make_func(FuncTyData {
        params: vec![],
        result: ResultInfo {
            ty: class_ty,
            convention: ResultConvention::Owned,
        },
        repr: FuncRepr::Thick,
        cc: CallingConv::Method,
        sig: None,
    });
    let method = mb.module.decls.methods.push(MethodDecl {
        name: "clone".into(),
        owner: MethodOwner::Class(class),
        is_static: false,
        is_dynamic: true,
        has_dynamic_self_result: true,
        ty: method_ty,
    });
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new(
        "f",
        Linkage::Private,
        &[Type::object(any_object)],
        ret,
    ));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    let obj = fb.append_block_arg(entry, Type::object(any_object));
    fb.switch_to_block(entry);
    // The lookup result still returns the concrete class.
    fb.insert_one(
        InstKind::DynamicMethod {
            operand: obj,
            method,
        },
        Type::object(method_ty),
    );
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::DynamicMethodShapeMismatch);
}

#[test]
fn existential_upcast_must_change_type() {
    let mut mb = ModuleBuilder::new();
    let p = mb.module.decls.protocols.push(ProtocolDecl {
        name: "P".into(),
        requires_class: false,
    });
    let ext_ty = mb.module.types.make_existential(&[p], false);
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    let src = fb.insert(
        InstKind::AllocStack { ty: ext_ty },
        &[Type::local_storage(ext_ty), Type::address(ext_ty)],
    );
    let dest = fb.insert(
        InstKind::AllocStack { ty: ext_ty },
        &[Type::local_storage(ext_ty), Type::address(ext_ty)],
    );
    fb.insert(
        InstKind::UpcastExistential {
            src: src[1],
            dest: dest[1],
        },
        &[],
    );
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert_code(&report, DiagnosticCode::ExistentialProtocolViolation);
}

#[test]
fn function_and_global_share_namespace() {
    let mut mb = ModuleBuilder::new();
    let i32_ty = mb.module.types.make_int(32);
    unit_function(&mut mb, "dup");
    mb.add_global(GlobalVariable {
        name: "dup".into(),
        linkage: Linkage::Public,
        ty: Type::object(i32_ty),
    });
    let module = mb.build();

    let report = verify_module(&module, &standard());
    assert_code(&report, DiagnosticCode::DuplicateSymbol);
}

#[test]
fn misplaced_location_kind_is_a_warning() {
    let mut mb = ModuleBuilder::new();
    let unit = mb.module.types.make_tuple(&[]);
    let ret = Type::object(unit);
    let func = mb.declare_function(Signature::new("f", Linkage::Private, &[], ret));

    let mut fb = mb.build_function(func);
    let entry = fb.make_block();
    fb.switch_to_block(entry);
    fb.insert_with_loc(InstKind::Tuple { elems: smallvec![] }, &[ret], LocKind::Return);
    finish_with_unit_return(&mut fb, ret);
    let module = mb.build();

    let report = verify_function(&module, func, &standard());
    assert!(report.is_ok(), "{report}");
    assert_code(&report, DiagnosticCode::LocationKindMisplaced);
    assert_eq!(report.warnings().count(), 1);
}

#[test]
fn witness_must_be_at_least_as_visible_as_table() {
    let mut mb = ModuleBuilder::new();
    let protocol = mb.module.decls.protocols.push(ProtocolDecl {
        name: "P".into(),
        requires_class: false,
    });
    let i32_ty = mb.module.types.make_int(32);
    let fn_ty = mb.module.types.make_func(FuncTyData {
        params: vec![],
        result: ResultInfo {
            ty: i32_ty,
            convention: ResultConvention::Owned,
        },
        repr: FuncRepr::Thin,
        cc: CallingConv::WitnessMethod,
        sig: None,
    });
    let requirement = mb.module.decls.methods.push(MethodDecl {
        name: "req".into(),
        owner: MethodOwner::Protocol(protocol),
        is_static: false,
        is_dynamic: false,
        has_dynamic_self_result: false,
        ty: fn_ty,
    });
    let witness = unit_function(&mut mb, "witness");
    let conformance = mb.module.make_conformance(protocol, i32_ty);
    mb.module.add_witness_table(WitnessTable {
        conformance,
        linkage: Linkage::Public,
        is_definition: true,
        entries: vec![WitnessTableEntry::Method {
            requirement,
            witness,
        }],
    });
    let module = mb.build();

    let report = verify_module(&module, &standard());
    assert_code(&report, DiagnosticCode::WitnessTableEntryInvalid);
}
