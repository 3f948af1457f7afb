pub mod builder;
pub mod decl;
pub mod dfg;
pub mod function;
pub mod inst;
pub mod ir_writer;
pub mod linkage;
pub mod module;
pub mod subst;
pub mod types;

pub use builder::{FunctionBuilder, ModuleBuilder};
pub use decl::{
    CaseDecl, ClassDecl, ClassRef, DeclStore, EnumDecl, EnumRef, FieldDecl, MethodDecl,
    MethodOwner, MethodRef, ProtocolDecl, ProtocolRef, StructDecl, StructRef,
};
pub use dfg::{Block, BlockId, DataFlowGraph, InstData, InstId, Operand, OperandId, Value, ValueId};
pub use function::{Function, Signature};
pub use inst::{CheckedCastKind, InstKind, LocKind, Substitution};
pub use ir_writer::{DisplayInst, DisplayTy, DisplayType};
pub use linkage::Linkage;
pub use module::{
    Conformance, ConformanceRef, FuncRef, GlobalRef, GlobalVariable, Module, VTable, VTableEntry,
    VTableRef, WitnessTable, WitnessTableEntry, WitnessTableRef,
};
pub use types::{
    ArchetypeData, ArchetypeId, ArchetypeKind, CallingConv, FuncRepr, FuncTyData, GenericParamDef,
    GenericSig, MetatypeRepr, ParamConvention, ParamInfo, Requirement, ResultConvention,
    ResultInfo, TyCategory, TyData, TyId, Type, TypeStore,
};
