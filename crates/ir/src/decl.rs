//! Nominal type and member declarations referenced by the IR.
//!
//! These are the pieces of the surface-language type checker's output that
//! instructions refer to by index: struct/class fields, enum cases, protocol
//! and class methods.

use cranelift_entity::{entity_impl, PrimaryMap};

use crate::types::TyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StructRef(u32);
entity_impl!(StructRef);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnumRef(u32);
entity_impl!(EnumRef);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassRef(u32);
entity_impl!(ClassRef);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolRef(u32);
entity_impl!(ProtocolRef);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodRef(u32);
entity_impl!(MethodRef);

/// A stored or computed member of a struct or class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TyId,
    pub is_static: bool,
    /// `false` for computed properties.
    pub has_storage: bool,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

impl StructDecl {
    /// Stored, non-static fields in declaration order.
    pub fn stored_fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.fields.iter().filter(|f| f.has_storage && !f.is_static)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaseDecl {
    pub name: String,
    /// Lowered payload type, if the case declares one.
    pub payload: Option<TyId>,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub cases: Vec<CaseDecl>,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub superclass: Option<ClassRef>,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone)]
pub struct ProtocolDecl {
    pub name: String,
    /// Class-constrained protocols may be carried as direct object references
    /// rather than boxed existential containers.
    pub requires_class: bool,
}

/// The declaration context a method belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodOwner {
    Class(ClassRef),
    Protocol(ProtocolRef),
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub owner: MethodOwner,
    pub is_static: bool,
    /// Eligible for runtime-introspected dispatch (`dynamic_method`).
    pub is_dynamic: bool,
    /// Declared to return dynamic `Self`.
    pub has_dynamic_self_result: bool,
    /// Lowered function type; the self parameter is last.
    pub ty: TyId,
}

/// Owns every declaration instructions can reference.
#[derive(Debug, Default)]
pub struct DeclStore {
    pub structs: PrimaryMap<StructRef, StructDecl>,
    pub enums: PrimaryMap<EnumRef, EnumDecl>,
    pub classes: PrimaryMap<ClassRef, ClassDecl>,
    pub protocols: PrimaryMap<ProtocolRef, ProtocolDecl>,
    pub methods: PrimaryMap<MethodRef, MethodDecl>,
}

impl DeclStore {
    pub fn struct_field(&self, s: StructRef, field: usize) -> Option<&FieldDecl> {
        self.structs[s].fields.get(field)
    }

    pub fn class_field(&self, c: ClassRef, field: usize) -> Option<&FieldDecl> {
        self.classes[c].fields.get(field)
    }

    pub fn enum_case(&self, e: EnumRef, case: usize) -> Option<&CaseDecl> {
        self.enums[e].cases.get(case)
    }

    /// Walks the superclass chain starting at `class`, inclusive.
    pub fn superclass_chain(&self, class: ClassRef) -> SuperclassChain<'_> {
        SuperclassChain {
            decls: self,
            next: Some(class),
        }
    }

    /// Returns `true` if `ancestor` is `class` or one of its superclasses.
    pub fn is_ancestor_class(&self, ancestor: ClassRef, class: ClassRef) -> bool {
        self.superclass_chain(class).any(|c| c == ancestor)
    }

    /// Returns `true` if `sup` is a proper superclass of `sub`.
    pub fn is_strict_superclass(&self, sup: ClassRef, sub: ClassRef) -> bool {
        sup != sub && self.is_ancestor_class(sup, sub)
    }
}

pub struct SuperclassChain<'a> {
    decls: &'a DeclStore,
    next: Option<ClassRef>,
}

impl Iterator for SuperclassChain<'_> {
    type Item = ClassRef;

    fn next(&mut self) -> Option<ClassRef> {
        let current = self.next?;
        self.next = self.decls.classes[current].superclass;
        Some(current)
    }
}
