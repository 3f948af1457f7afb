//! Human-readable rendering of types and instructions, used by diagnostic
//! snippets.

use std::fmt;

use crate::{
    dfg::DataFlowGraph,
    function::Function,
    inst::InstKind,
    types::{TyCategory, TyData, TyId, Type, TypeStore},
    InstId,
};

pub struct DisplayTy<'a> {
    store: &'a TypeStore,
    ty: TyId,
}

impl<'a> DisplayTy<'a> {
    pub fn new(store: &'a TypeStore, ty: TyId) -> Self {
        Self { store, ty }
    }
}

impl fmt::Display for DisplayTy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_ty(f, self.store, self.ty)
    }
}

fn write_ty(f: &mut fmt::Formatter<'_>, store: &TypeStore, ty: TyId) -> fmt::Result {
    match store.data(ty) {
        TyData::Int(bits) => write!(f, "i{bits}"),
        TyData::RawPointer => write!(f, "rawptr"),
        TyData::NativeObject => write!(f, "native_object"),
        TyData::Tuple(elems) => {
            write!(f, "(")?;
            for (i, elem) in elems.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_ty(f, store, *elem)?;
            }
            write!(f, ")")
        }
        TyData::Struct(s) => write!(f, "struct{}", s.as_u32()),
        TyData::Enum(e) => write!(f, "enum{}", e.as_u32()),
        TyData::Class(c) => write!(f, "class{}", c.as_u32()),
        TyData::Existential {
            protocols,
            requires_class,
        } => {
            if protocols.is_empty() && *requires_class {
                return write!(f, "any_object");
            }
            write!(f, "any<")?;
            for (i, p) in protocols.iter().enumerate() {
                if i > 0 {
                    write!(f, " & ")?;
                }
                write!(f, "proto{}", p.as_u32())?;
            }
            if *requires_class {
                if !protocols.is_empty() {
                    write!(f, " & ")?;
                }
                write!(f, "class")?;
            }
            write!(f, ">")
        }
        TyData::Archetype(a) => write!(f, "{}", store.archetype(*a).name),
        TyData::GenericParam { depth, index } => write!(f, "T{depth}_{index}"),
        TyData::Func(func) => {
            write!(f, "fn(")?;
            for (i, param) in func.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_ty(f, store, param.ty)?;
            }
            write!(f, ") -> ")?;
            write_ty(f, store, func.result.ty)
        }
        TyData::Metatype { instance, .. } => {
            write!(f, "meta<")?;
            write_ty(f, store, *instance)?;
            write!(f, ">")
        }
        TyData::ExistentialMetatype { instance, .. } => {
            write!(f, "exist_meta<")?;
            write_ty(f, store, *instance)?;
            write!(f, ">")
        }
    }
}

pub struct DisplayType<'a> {
    store: &'a TypeStore,
    ty: Type,
}

impl<'a> DisplayType<'a> {
    pub fn new(store: &'a TypeStore, ty: Type) -> Self {
        Self { store, ty }
    }
}

impl fmt::Display for DisplayType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty.category {
            TyCategory::Object => {}
            TyCategory::Address => write!(f, "*")?,
            TyCategory::LocalStorage => write!(f, "@local ")?,
        }
        write_ty(f, self.store, self.ty.base)
    }
}

/// Renders an instruction in roughly textual-IR form, for diagnostics.
pub struct DisplayInst<'a> {
    func: &'a Function,
    store: &'a TypeStore,
    inst: InstId,
}

impl<'a> DisplayInst<'a> {
    pub fn new(func: &'a Function, store: &'a TypeStore, inst: InstId) -> Self {
        Self { func, store, inst }
    }
}

impl fmt::Display for DisplayInst<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dfg: &DataFlowGraph = &self.func.dfg;
        let data = dfg.inst(self.inst);

        for (i, result) in data.results.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "v{}", result.as_u32())?;
        }
        if !data.results.is_empty() {
            write!(f, " = ")?;
        }

        write!(f, "{}", data.kind.name())?;
        let args = data.kind.args();
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " v{}", arg.as_u32())?;
        }

        match &data.kind {
            InstKind::AllocStack { ty } | InstKind::AllocRef { ty } => {
                write!(f, " {}", DisplayTy::new(self.store, *ty))?;
            }
            InstKind::IntLiteral { value, ty } => {
                write!(f, " {value} {}", DisplayTy::new(self.store, *ty))?;
            }
            InstKind::FunctionRef { func } => write!(f, " fn{}", func.as_u32())?,
            InstKind::GlobalAddr { global } => write!(f, " g{}", global.as_u32())?,
            InstKind::Br { dest, .. } => write!(f, " block{}", dest.as_u32())?,
            InstKind::CondBr {
                then_dest,
                else_dest,
                ..
            } => write!(
                f,
                " block{}, block{}",
                then_dest.as_u32(),
                else_dest.as_u32()
            )?,
            _ => {}
        }

        if let Some(result) = data.results.first() {
            write!(
                f,
                " : {}",
                DisplayType::new(self.store, dfg.value_ty(*result))
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        function::Signature,
        inst::LocKind,
        linkage::Linkage,
    };

    #[test]
    fn inst_rendering() {
        let mut store = TypeStore::default();
        let i32_ty = store.make_int(32);
        let obj = Type::object(i32_ty);

        let sig = Signature::new("f", Linkage::Private, &[], obj);
        let mut func = Function::new(sig);
        let block = func.dfg.make_block();
        func.block_order.push(block);

        let lit = func.dfg.make_inst(
            InstKind::IntLiteral {
                value: 7,
                ty: i32_ty,
            },
            &[obj],
            LocKind::Regular,
        );
        func.dfg.append_inst(block, lit);

        let rendered = DisplayInst::new(&func, &store, lit).to_string();
        assert_eq!(rendered, "v0 = int_literal 7 i32 : i32");
    }
}
