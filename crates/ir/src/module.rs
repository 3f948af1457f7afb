use cranelift_entity::{entity_impl, PrimaryMap};
use rustc_hash::FxHashMap;

use crate::{
    decl::{ClassRef, DeclStore, MethodRef, ProtocolRef},
    function::Function,
    linkage::Linkage,
    types::{TyId, Type, TypeStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncRef(u32);
entity_impl!(FuncRef);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalRef(u32);
entity_impl!(GlobalRef);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VTableRef(u32);
entity_impl!(VTableRef);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WitnessTableRef(u32);
entity_impl!(WitnessTableRef);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConformanceRef(u32);
entity_impl!(ConformanceRef);

/// A (conforming type, protocol) pair cited by existential and witness
/// instructions. Instructions carry `Option<ConformanceRef>`; `None` is the
/// unconstrained sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Conformance {
    pub protocol: ProtocolRef,
    pub ty: TyId,
}

#[derive(Debug, Clone)]
pub struct GlobalVariable {
    pub name: String,
    pub linkage: Linkage,
    /// Stored type; must be an object type.
    pub ty: Type,
}

#[derive(Debug, Clone, Copy)]
pub struct VTableEntry {
    pub method: MethodRef,
    pub is_curried: bool,
    pub is_foreign: bool,
    pub implementation: FuncRef,
}

#[derive(Debug, Clone)]
pub struct VTable {
    pub class: ClassRef,
    pub entries: Vec<VTableEntry>,
}

#[derive(Debug, Clone, Copy)]
pub enum WitnessTableEntry {
    Method {
        requirement: MethodRef,
        witness: FuncRef,
    },
    AssociatedType {
        witness: TyId,
    },
}

#[derive(Debug, Clone)]
pub struct WitnessTable {
    pub conformance: ConformanceRef,
    pub linkage: Linkage,
    /// Declaration-only tables carry no entries.
    pub is_definition: bool,
    pub entries: Vec<WitnessTableEntry>,
}

/// Top-level container owning every IR entity.
#[derive(Default)]
pub struct Module {
    pub types: TypeStore,
    pub decls: DeclStore,
    pub funcs: PrimaryMap<FuncRef, Function>,
    pub globals: PrimaryMap<GlobalRef, GlobalVariable>,
    pub vtables: PrimaryMap<VTableRef, VTable>,
    pub witness_tables: PrimaryMap<WitnessTableRef, WitnessTable>,
    pub conformances: PrimaryMap<ConformanceRef, Conformance>,
    witness_table_index: FxHashMap<ConformanceRef, WitnessTableRef>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter_functions(&self) -> impl Iterator<Item = FuncRef> {
        self.funcs.keys()
    }

    pub fn make_conformance(&mut self, protocol: ProtocolRef, ty: TyId) -> ConformanceRef {
        self.conformances.push(Conformance { protocol, ty })
    }

    pub fn conformance(&self, conf: ConformanceRef) -> Conformance {
        self.conformances[conf]
    }

    pub fn add_witness_table(&mut self, table: WitnessTable) -> WitnessTableRef {
        let conformance = table.conformance;
        let table_ref = self.witness_tables.push(table);
        self.witness_table_index.entry(conformance).or_insert(table_ref);
        table_ref
    }

    /// Looks up the witness table covering a conformance, if one is present.
    pub fn witness_table_for(&self, conf: ConformanceRef) -> Option<WitnessTableRef> {
        self.witness_table_index.get(&conf).copied()
    }
}
