use smallvec::SmallVec;

use crate::{
    dfg::{BlockId, DataFlowGraph},
    linkage::Linkage,
    types::{ArchetypeId, GenericSig, Type},
};

#[derive(Debug, Clone)]
pub struct Signature {
    name: String,
    linkage: Linkage,
    params: SmallVec<[Type; 8]>,
    ret: Type,
    /// Present iff the function is generic.
    generic_sig: Option<GenericSig>,
}

impl Signature {
    pub fn new(name: &str, linkage: Linkage, params: &[Type], ret: Type) -> Self {
        Self {
            name: name.to_string(),
            linkage,
            params: params.into(),
            ret,
            generic_sig: None,
        }
    }

    pub fn with_generic_sig(mut self, sig: GenericSig) -> Self {
        self.generic_sig = Some(sig);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn params(&self) -> &[Type] {
        &self.params
    }

    pub fn ret(&self) -> Type {
        self.ret
    }

    pub fn generic_sig(&self) -> Option<&GenericSig> {
        self.generic_sig.as_ref()
    }

    pub fn is_polymorphic(&self) -> bool {
        self.generic_sig.is_some()
    }
}

pub struct Function {
    pub sig: Signature,
    /// Primary archetypes standing for the signature's generic parameters
    /// within the body.
    pub generic_env: Vec<ArchetypeId>,
    pub dfg: DataFlowGraph,
    /// Ordered block list; the first block is the entry.
    pub block_order: Vec<BlockId>,
}

impl Function {
    pub fn new(sig: Signature) -> Self {
        Self {
            sig,
            generic_env: Vec::new(),
            dfg: DataFlowGraph::default(),
            block_order: Vec::new(),
        }
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.block_order.first().copied()
    }

    /// A function without a body is an external declaration.
    pub fn is_external_declaration(&self) -> bool {
        self.block_order.is_empty()
    }
}
