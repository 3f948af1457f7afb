//! Interned type representations.
//!
//! A [`Type`] pairs an interned representation type ([`TyId`]) with a
//! category: object (value-of) or address (location-of), plus the local
//! storage category produced by `alloc_stack`. Interning makes type equality
//! an index comparison.

use cranelift_entity::{entity_impl, PrimaryMap};
use rustc_hash::FxHashMap;

use crate::decl::{ClassRef, DeclStore, EnumRef, ProtocolRef, StructRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TyId(u32);
entity_impl!(TyId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchetypeId(u32);
entity_impl!(ArchetypeId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TyCategory {
    Object,
    Address,
    /// Opaque container storage produced by `alloc_stack` and consumed by
    /// `dealloc_stack`.
    LocalStorage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type {
    pub base: TyId,
    pub category: TyCategory,
}

impl Type {
    pub fn object(base: TyId) -> Self {
        Self {
            base,
            category: TyCategory::Object,
        }
    }

    pub fn address(base: TyId) -> Self {
        Self {
            base,
            category: TyCategory::Address,
        }
    }

    pub fn local_storage(base: TyId) -> Self {
        Self {
            base,
            category: TyCategory::LocalStorage,
        }
    }

    pub fn is_object(self) -> bool {
        self.category == TyCategory::Object
    }

    pub fn is_address(self) -> bool {
        self.category == TyCategory::Address
    }

    pub fn is_local_storage(self) -> bool {
        self.category == TyCategory::LocalStorage
    }

    /// The same representation type as an object type.
    pub fn object_type(self) -> Type {
        Type::object(self.base)
    }

    /// The same representation type as an address type.
    pub fn address_type(self) -> Type {
        Type::address(self.base)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetatypeRepr {
    Thin,
    Thick,
    Foreign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuncRepr {
    Thin,
    Thick,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallingConv {
    Freestanding,
    Method,
    WitnessMethod,
    C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamConvention {
    DirectOwned,
    DirectUnowned,
    DirectGuaranteed,
    Indirect,
    IndirectInout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultConvention {
    Owned,
    Unowned,
    /// An interior pointer whose validity depends on the lifetime of `self`.
    /// Degrades to `Unowned` under partial application.
    UnownedInnerPointer,
    Autoreleased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamInfo {
    pub ty: TyId,
    pub convention: ParamConvention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultInfo {
    pub ty: TyId,
    pub convention: ResultConvention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericParamDef {
    pub depth: u16,
    pub index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// Marks a generic parameter as requiring witness-table metadata.
    WitnessMarker(TyId),
    Conformance(TyId, ProtocolRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericSig {
    pub params: Vec<GenericParamDef>,
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncTyData {
    pub params: Vec<ParamInfo>,
    pub result: ResultInfo,
    pub repr: FuncRepr,
    pub cc: CallingConv,
    /// Present iff the function type is polymorphic.
    pub sig: Option<GenericSig>,
}

impl FuncTyData {
    pub fn is_polymorphic(&self) -> bool {
        self.sig.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TyData {
    Int(u16),
    RawPointer,
    /// An opaque heap reference.
    NativeObject,
    Tuple(Vec<TyId>),
    Struct(StructRef),
    Enum(EnumRef),
    Class(ClassRef),
    /// A protocol-composition existential. An empty, class-constrained
    /// composition is the `AnyObject` erasure.
    Existential {
        protocols: Vec<ProtocolRef>,
        requires_class: bool,
    },
    Archetype(ArchetypeId),
    /// An unbound generic parameter, as it appears in polymorphic function
    /// signatures before being mapped into a concrete context.
    GenericParam {
        depth: u16,
        index: u16,
    },
    Func(FuncTyData),
    Metatype {
        instance: TyId,
        repr: Option<MetatypeRepr>,
    },
    ExistentialMetatype {
        instance: TyId,
        repr: Option<MetatypeRepr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchetypeKind {
    /// Declared generic parameter of a function's generic environment.
    Primary { depth: u16, index: u16 },
    /// Introduced dynamically by opening an existential; valid anywhere.
    Opened { existential: TyId },
    /// The implicit `Self` parameter of a protocol.
    SelfOf(ProtocolRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchetypeData {
    pub name: String,
    pub kind: ArchetypeKind,
    pub requires_class: bool,
    pub conforms_to: Vec<ProtocolRef>,
}

#[derive(Debug, Default)]
pub struct TypeStore {
    types: PrimaryMap<TyId, TyData>,
    rev_types: FxHashMap<TyData, TyId>,
    archetypes: PrimaryMap<ArchetypeId, ArchetypeData>,
}

impl TypeStore {
    pub fn intern(&mut self, data: TyData) -> TyId {
        if let Some(id) = self.rev_types.get(&data) {
            return *id;
        }
        let id = self.types.push(data.clone());
        self.rev_types.insert(data, id);
        id
    }

    pub fn data(&self, ty: TyId) -> &TyData {
        &self.types[ty]
    }

    pub fn is_valid(&self, ty: TyId) -> bool {
        self.types.is_valid(ty)
    }

    pub fn make_archetype(&mut self, data: ArchetypeData) -> ArchetypeId {
        self.archetypes.push(data)
    }

    pub fn archetype(&self, id: ArchetypeId) -> &ArchetypeData {
        &self.archetypes[id]
    }

    pub fn make_int(&mut self, bits: u16) -> TyId {
        self.intern(TyData::Int(bits))
    }

    pub fn make_tuple(&mut self, elems: &[TyId]) -> TyId {
        self.intern(TyData::Tuple(elems.to_vec()))
    }

    pub fn make_struct(&mut self, s: StructRef) -> TyId {
        self.intern(TyData::Struct(s))
    }

    pub fn make_enum(&mut self, e: EnumRef) -> TyId {
        self.intern(TyData::Enum(e))
    }

    pub fn make_class(&mut self, c: ClassRef) -> TyId {
        self.intern(TyData::Class(c))
    }

    pub fn make_existential(&mut self, protocols: &[ProtocolRef], requires_class: bool) -> TyId {
        self.intern(TyData::Existential {
            protocols: protocols.to_vec(),
            requires_class,
        })
    }

    pub fn make_any_object(&mut self) -> TyId {
        self.make_existential(&[], true)
    }

    pub fn make_archetype_ty(&mut self, id: ArchetypeId) -> TyId {
        self.intern(TyData::Archetype(id))
    }

    pub fn make_generic_param(&mut self, depth: u16, index: u16) -> TyId {
        self.intern(TyData::GenericParam { depth, index })
    }

    pub fn make_func(&mut self, data: FuncTyData) -> TyId {
        self.intern(TyData::Func(data))
    }

    pub fn make_metatype(&mut self, instance: TyId, repr: Option<MetatypeRepr>) -> TyId {
        self.intern(TyData::Metatype { instance, repr })
    }

    pub fn make_existential_metatype(
        &mut self,
        instance: TyId,
        repr: Option<MetatypeRepr>,
    ) -> TyId {
        self.intern(TyData::ExistentialMetatype { instance, repr })
    }

    pub fn as_struct(&self, ty: TyId) -> Option<StructRef> {
        match self.data(ty) {
            TyData::Struct(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_enum(&self, ty: TyId) -> Option<EnumRef> {
        match self.data(ty) {
            TyData::Enum(e) => Some(*e),
            _ => None,
        }
    }

    pub fn as_class(&self, ty: TyId) -> Option<ClassRef> {
        match self.data(ty) {
            TyData::Class(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_tuple(&self, ty: TyId) -> Option<&[TyId]> {
        match self.data(ty) {
            TyData::Tuple(elems) => Some(elems),
            _ => None,
        }
    }

    pub fn as_func(&self, ty: TyId) -> Option<&FuncTyData> {
        match self.data(ty) {
            TyData::Func(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_archetype(&self, ty: TyId) -> Option<ArchetypeId> {
        match self.data(ty) {
            TyData::Archetype(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_int(&self, ty: TyId) -> Option<u16> {
        match self.data(ty) {
            TyData::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    pub fn is_existential(&self, ty: TyId) -> bool {
        matches!(self.data(ty), TyData::Existential { .. })
    }

    pub fn is_class_existential(&self, ty: TyId) -> bool {
        matches!(
            self.data(ty),
            TyData::Existential {
                requires_class: true,
                ..
            }
        )
    }

    pub fn is_any_object(&self, ty: TyId) -> bool {
        matches!(
            self.data(ty),
            TyData::Existential {
                protocols,
                requires_class: true,
            } if protocols.is_empty()
        )
    }

    pub fn existential_protocols(&self, ty: TyId) -> Option<&[ProtocolRef]> {
        match self.data(ty) {
            TyData::Existential { protocols, .. } => Some(protocols),
            _ => None,
        }
    }

    pub fn is_opened_archetype(&self, ty: TyId) -> bool {
        self.as_archetype(ty)
            .is_some_and(|a| matches!(self.archetype(a).kind, ArchetypeKind::Opened { .. }))
    }

    /// Metatype or existential metatype: `(instance, representation)`.
    pub fn any_metatype(&self, ty: TyId) -> Option<(TyId, Option<MetatypeRepr>)> {
        match self.data(ty) {
            TyData::Metatype { instance, repr } | TyData::ExistentialMetatype { instance, repr } => {
                Some((*instance, *repr))
            }
            _ => None,
        }
    }

    pub fn is_plain_metatype(&self, ty: TyId) -> bool {
        matches!(self.data(ty), TyData::Metatype { .. })
    }

    pub fn is_existential_metatype(&self, ty: TyId) -> bool {
        matches!(self.data(ty), TyData::ExistentialMetatype { .. })
    }

    /// Reference semantics: the representation is a single retainable
    /// reference.
    pub fn has_reference_semantics(&self, ty: TyId) -> bool {
        match self.data(ty) {
            TyData::Class(_) | TyData::NativeObject => true,
            TyData::Existential { requires_class, .. } => *requires_class,
            TyData::Archetype(a) => self.archetype(*a).requires_class,
            _ => false,
        }
    }

    /// Class instance, or archetype constrained to a class.
    pub fn may_have_superclass(&self, ty: TyId) -> bool {
        match self.data(ty) {
            TyData::Class(_) => true,
            TyData::Archetype(a) => self.archetype(*a).requires_class,
            _ => false,
        }
    }

    pub fn is_heap_object_reference(&self, ty: TyId) -> bool {
        self.may_have_superclass(ty) || matches!(self.data(ty), TyData::NativeObject)
    }

    /// Returns `true` if `sup` names a proper superclass of `sub`.
    pub fn is_superclass_of(&self, sup: TyId, sub: TyId, decls: &DeclStore) -> bool {
        match (self.as_class(sup), self.as_class(sub)) {
            (Some(sup), Some(sub)) => decls.is_strict_superclass(sup, sub),
            _ => false,
        }
    }

    pub fn all_types(&self) -> impl Iterator<Item = (TyId, &TyData)> {
        self.types.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut store = TypeStore::default();
        let a = store.make_int(32);
        let b = store.make_int(32);
        let c = store.make_int(64);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let t1 = store.make_tuple(&[a, c]);
        let t2 = store.make_tuple(&[a, c]);
        assert_eq!(t1, t2);
    }

    #[test]
    fn any_object_shape() {
        let mut store = TypeStore::default();
        let any_object = store.make_any_object();
        assert!(store.is_any_object(any_object));
        assert!(store.is_class_existential(any_object));
        assert!(store.has_reference_semantics(any_object));
    }
}
