//! The closed instruction catalogue.
//!
//! Instructions form one tagged enum so that every verifier check site is an
//! exhaustive match: adding a kind forces the compiler to flag every check
//! that has not decided what to do with it.

use smallvec::SmallVec;

use crate::{
    dfg::{BlockId, ValueId},
    decl::MethodRef,
    module::{ConformanceRef, FuncRef, GlobalRef},
    types::{TyId, Type},
};

/// One positional generic-parameter replacement attached to a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Substitution {
    pub replacement: TyId,
}

/// The shape contract of a checked cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckedCastKind {
    Downcast,
    SuperToArchetype,
    ArchetypeToConcrete,
    ArchetypeToArchetype,
    ExistentialToArchetype,
    ExistentialToConcrete,
    ConcreteToArchetype,
    ConcreteToExistential,
}

/// Source-location kind attached to an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LocKind {
    #[default]
    Regular,
    File,
    Cleanup,
    Inlined,
    Return,
    ImplicitReturn,
    ArtificialUnreachable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstKind {
    // Allocation and deallocation.
    AllocStack {
        ty: TyId,
    },
    AllocRef {
        ty: TyId,
    },
    DeallocStack {
        operand: ValueId,
    },
    DeallocRef {
        operand: ValueId,
    },

    // Memory.
    Load {
        addr: ValueId,
    },
    Store {
        src: ValueId,
        dest: ValueId,
    },
    CopyAddr {
        src: ValueId,
        dest: ValueId,
    },
    DestroyAddr {
        operand: ValueId,
    },

    // Constants and references.
    IntLiteral {
        value: i128,
        ty: TyId,
    },
    FunctionRef {
        func: FuncRef,
    },
    GlobalAddr {
        global: GlobalRef,
    },

    // Reference counting.
    StrongRetain {
        operand: ValueId,
    },
    StrongRelease {
        operand: ValueId,
    },
    RetainValue {
        operand: ValueId,
    },
    ReleaseValue {
        operand: ValueId,
    },
    AutoreleaseValue {
        operand: ValueId,
    },
    StrongRetainAutoreleased {
        operand: ValueId,
    },

    // Aggregate construction.
    Struct {
        fields: SmallVec<[ValueId; 4]>,
    },
    Tuple {
        elems: SmallVec<[ValueId; 4]>,
    },
    Enum {
        case: usize,
        operand: Option<ValueId>,
    },

    // Aggregate projection.
    StructExtract {
        operand: ValueId,
        field: usize,
    },
    StructElementAddr {
        operand: ValueId,
        field: usize,
    },
    TupleExtract {
        operand: ValueId,
        index: usize,
    },
    TupleElementAddr {
        operand: ValueId,
        index: usize,
    },
    RefElementAddr {
        operand: ValueId,
        field: usize,
    },
    InitEnumDataAddr {
        operand: ValueId,
        case: usize,
    },
    UncheckedEnumData {
        operand: ValueId,
        case: usize,
    },
    UncheckedTakeEnumDataAddr {
        operand: ValueId,
        case: usize,
    },
    InjectEnumAddr {
        operand: ValueId,
        case: usize,
    },

    // Metatypes.
    Metatype,
    ValueMetatype {
        operand: ValueId,
    },
    ExistentialMetatype {
        operand: ValueId,
    },
    ThickToForeignMetatype {
        operand: ValueId,
    },
    ForeignToThickMetatype {
        operand: ValueId,
    },

    // Function conversions.
    ThinToThickFunction {
        operand: ValueId,
    },
    ConvertFunction {
        operand: ValueId,
    },

    // Casts.
    Upcast {
        operand: ValueId,
    },
    UncheckedRefCast {
        operand: ValueId,
    },
    UncheckedAddrCast {
        operand: ValueId,
    },
    AddressToPointer {
        operand: ValueId,
    },
    UnconditionalCheckedCast {
        operand: ValueId,
        kind: CheckedCastKind,
    },

    // Calls.
    Apply {
        callee: ValueId,
        substs: SmallVec<[Substitution; 2]>,
        /// Callee type after substitution, as recorded at the call site.
        substituted_ty: TyId,
        args: SmallVec<[ValueId; 4]>,
    },
    PartialApply {
        callee: ValueId,
        substs: SmallVec<[Substitution; 2]>,
        substituted_ty: TyId,
        args: SmallVec<[ValueId; 4]>,
    },

    // Method lookup.
    ClassMethod {
        operand: ValueId,
        method: MethodRef,
    },
    SuperMethod {
        operand: ValueId,
        method: MethodRef,
    },
    WitnessMethod {
        lookup_ty: TyId,
        conformance: Option<ConformanceRef>,
        method: MethodRef,
    },
    DynamicMethod {
        operand: ValueId,
        method: MethodRef,
    },

    // Existential containers.
    OpenExistential {
        operand: ValueId,
    },
    OpenExistentialRef {
        operand: ValueId,
    },
    InitExistential {
        operand: ValueId,
        concrete_ty: TyId,
        conformances: SmallVec<[Option<ConformanceRef>; 2]>,
    },
    InitExistentialRef {
        operand: ValueId,
        conformances: SmallVec<[Option<ConformanceRef>; 2]>,
    },
    UpcastExistential {
        src: ValueId,
        dest: ValueId,
    },
    UpcastExistentialRef {
        operand: ValueId,
    },
    DeinitExistential {
        operand: ValueId,
    },
    ProjectExistential {
        operand: ValueId,
    },
    ProjectExistentialRef {
        operand: ValueId,
    },

    CondFail {
        operand: ValueId,
    },

    // Terminators.
    Return {
        value: ValueId,
    },
    AutoreleaseReturn {
        value: ValueId,
    },
    Unreachable,
    Br {
        dest: BlockId,
        args: SmallVec<[ValueId; 4]>,
    },
    CondBr {
        cond: ValueId,
        then_dest: BlockId,
        then_args: SmallVec<[ValueId; 4]>,
        else_dest: BlockId,
        else_args: SmallVec<[ValueId; 4]>,
    },
    SwitchInt {
        operand: ValueId,
        cases: Vec<(i128, BlockId)>,
        default: Option<BlockId>,
    },
    SwitchEnum {
        operand: ValueId,
        cases: Vec<(usize, BlockId)>,
        default: Option<BlockId>,
    },
    SwitchEnumAddr {
        operand: ValueId,
        cases: Vec<(usize, BlockId)>,
        default: Option<BlockId>,
    },
    CheckedCastBr {
        operand: ValueId,
        kind: CheckedCastKind,
        cast_ty: Type,
        success: BlockId,
        failure: BlockId,
    },
}

impl InstKind {
    /// Operand values in slot order.
    pub fn args(&self) -> SmallVec<[ValueId; 4]> {
        use InstKind::*;

        let mut out = SmallVec::new();
        match self {
            AllocStack { .. }
            | AllocRef { .. }
            | IntLiteral { .. }
            | FunctionRef { .. }
            | GlobalAddr { .. }
            | Metatype
            | WitnessMethod { .. }
            | Unreachable => {}

            DeallocStack { operand }
            | DeallocRef { operand }
            | Load { addr: operand }
            | DestroyAddr { operand }
            | StrongRetain { operand }
            | StrongRelease { operand }
            | RetainValue { operand }
            | ReleaseValue { operand }
            | AutoreleaseValue { operand }
            | StrongRetainAutoreleased { operand }
            | StructExtract { operand, .. }
            | StructElementAddr { operand, .. }
            | TupleExtract { operand, .. }
            | TupleElementAddr { operand, .. }
            | RefElementAddr { operand, .. }
            | InitEnumDataAddr { operand, .. }
            | UncheckedEnumData { operand, .. }
            | UncheckedTakeEnumDataAddr { operand, .. }
            | InjectEnumAddr { operand, .. }
            | ValueMetatype { operand }
            | ExistentialMetatype { operand }
            | ThickToForeignMetatype { operand }
            | ForeignToThickMetatype { operand }
            | ThinToThickFunction { operand }
            | ConvertFunction { operand }
            | Upcast { operand }
            | UncheckedRefCast { operand }
            | UncheckedAddrCast { operand }
            | AddressToPointer { operand }
            | UnconditionalCheckedCast { operand, .. }
            | ClassMethod { operand, .. }
            | SuperMethod { operand, .. }
            | DynamicMethod { operand, .. }
            | OpenExistential { operand }
            | OpenExistentialRef { operand }
            | InitExistential { operand, .. }
            | InitExistentialRef { operand, .. }
            | UpcastExistentialRef { operand }
            | DeinitExistential { operand }
            | ProjectExistential { operand }
            | ProjectExistentialRef { operand }
            | CondFail { operand }
            | Return { value: operand }
            | AutoreleaseReturn { value: operand }
            | SwitchInt { operand, .. }
            | SwitchEnum { operand, .. }
            | SwitchEnumAddr { operand, .. }
            | CheckedCastBr { operand, .. } => out.push(*operand),

            Store { src, dest } | CopyAddr { src, dest } | UpcastExistential { src, dest } => {
                out.push(*src);
                out.push(*dest);
            }

            Enum { operand, .. } => {
                if let Some(operand) = operand {
                    out.push(*operand);
                }
            }

            Struct { fields } => out.extend(fields.iter().copied()),
            Tuple { elems } => out.extend(elems.iter().copied()),

            Apply { callee, args, .. } | PartialApply { callee, args, .. } => {
                out.push(*callee);
                out.extend(args.iter().copied());
            }

            Br { args, .. } => out.extend(args.iter().copied()),
            CondBr {
                cond,
                then_args,
                else_args,
                ..
            } => {
                out.push(*cond);
                out.extend(then_args.iter().copied());
                out.extend(else_args.iter().copied());
            }
        }
        out
    }

    pub fn is_terminator(&self) -> bool {
        use InstKind::*;
        matches!(
            self,
            Return { .. }
                | AutoreleaseReturn { .. }
                | Unreachable
                | Br { .. }
                | CondBr { .. }
                | SwitchInt { .. }
                | SwitchEnum { .. }
                | SwitchEnumAddr { .. }
                | CheckedCastBr { .. }
        )
    }

    /// Returns `true` for the epilog class of terminators.
    pub fn is_return(&self) -> bool {
        matches!(
            self,
            InstKind::Return { .. } | InstKind::AutoreleaseReturn { .. }
        )
    }

    /// Successor blocks in edge order. Empty for non-terminators and for
    /// function-exiting terminators.
    pub fn branch_targets(&self) -> SmallVec<[BlockId; 2]> {
        use InstKind::*;

        let mut out = SmallVec::new();
        match self {
            Br { dest, .. } => out.push(*dest),
            CondBr {
                then_dest,
                else_dest,
                ..
            } => {
                out.push(*then_dest);
                out.push(*else_dest);
            }
            SwitchInt { cases, default, .. } => {
                out.extend(cases.iter().map(|(_, dest)| *dest));
                out.extend(default.iter().copied());
            }
            SwitchEnum { cases, default, .. } | SwitchEnumAddr { cases, default, .. } => {
                out.extend(cases.iter().map(|(_, dest)| *dest));
                out.extend(default.iter().copied());
            }
            CheckedCastBr {
                success, failure, ..
            } => {
                out.push(*success);
                out.push(*failure);
            }
            _ => {}
        }
        out
    }

    pub fn name(&self) -> &'static str {
        use InstKind::*;
        match self {
            AllocStack { .. } => "alloc_stack",
            AllocRef { .. } => "alloc_ref",
            DeallocStack { .. } => "dealloc_stack",
            DeallocRef { .. } => "dealloc_ref",
            Load { .. } => "load",
            Store { .. } => "store",
            CopyAddr { .. } => "copy_addr",
            DestroyAddr { .. } => "destroy_addr",
            IntLiteral { .. } => "int_literal",
            FunctionRef { .. } => "function_ref",
            GlobalAddr { .. } => "global_addr",
            StrongRetain { .. } => "strong_retain",
            StrongRelease { .. } => "strong_release",
            RetainValue { .. } => "retain_value",
            ReleaseValue { .. } => "release_value",
            AutoreleaseValue { .. } => "autorelease_value",
            StrongRetainAutoreleased { .. } => "strong_retain_autoreleased",
            Struct { .. } => "struct",
            Tuple { .. } => "tuple",
            Enum { .. } => "enum",
            StructExtract { .. } => "struct_extract",
            StructElementAddr { .. } => "struct_element_addr",
            TupleExtract { .. } => "tuple_extract",
            TupleElementAddr { .. } => "tuple_element_addr",
            RefElementAddr { .. } => "ref_element_addr",
            InitEnumDataAddr { .. } => "init_enum_data_addr",
            UncheckedEnumData { .. } => "unchecked_enum_data",
            UncheckedTakeEnumDataAddr { .. } => "unchecked_take_enum_data_addr",
            InjectEnumAddr { .. } => "inject_enum_addr",
            Metatype => "metatype",
            ValueMetatype { .. } => "value_metatype",
            ExistentialMetatype { .. } => "existential_metatype",
            ThickToForeignMetatype { .. } => "thick_to_foreign_metatype",
            ForeignToThickMetatype { .. } => "foreign_to_thick_metatype",
            ThinToThickFunction { .. } => "thin_to_thick_function",
            ConvertFunction { .. } => "convert_function",
            Upcast { .. } => "upcast",
            UncheckedRefCast { .. } => "unchecked_ref_cast",
            UncheckedAddrCast { .. } => "unchecked_addr_cast",
            AddressToPointer { .. } => "address_to_pointer",
            UnconditionalCheckedCast { .. } => "unconditional_checked_cast",
            Apply { .. } => "apply",
            PartialApply { .. } => "partial_apply",
            ClassMethod { .. } => "class_method",
            SuperMethod { .. } => "super_method",
            WitnessMethod { .. } => "witness_method",
            DynamicMethod { .. } => "dynamic_method",
            OpenExistential { .. } => "open_existential",
            OpenExistentialRef { .. } => "open_existential_ref",
            InitExistential { .. } => "init_existential",
            InitExistentialRef { .. } => "init_existential_ref",
            UpcastExistential { .. } => "upcast_existential",
            UpcastExistentialRef { .. } => "upcast_existential_ref",
            DeinitExistential { .. } => "deinit_existential",
            ProjectExistential { .. } => "project_existential",
            ProjectExistentialRef { .. } => "project_existential_ref",
            CondFail { .. } => "cond_fail",
            Return { .. } => "return",
            AutoreleaseReturn { .. } => "autorelease_return",
            Unreachable => "unreachable",
            Br { .. } => "br",
            CondBr { .. } => "cond_br",
            SwitchInt { .. } => "switch_int",
            SwitchEnum { .. } => "switch_enum",
            SwitchEnumAddr { .. } => "switch_enum_addr",
            CheckedCastBr { .. } => "checked_cast_br",
        }
    }
}
