//! Generic substitution application.
//!
//! Verification is read-only, so substitution is implemented as a structural
//! comparison against an already-recorded result rather than construction of
//! new interned types: `ty_matches_substituted` asks whether a concrete type
//! is exactly what applying a substitution list to a pattern type would
//! produce.

use crate::{
    inst::Substitution,
    types::{ArchetypeId, ArchetypeKind, TyData, TyId, TypeStore},
};

/// Returns `true` if `concrete` equals `pattern` with every depth-0 generic
/// parameter `i` replaced by `subs[i]`.
pub fn ty_matches_substituted(
    store: &TypeStore,
    concrete: TyId,
    pattern: TyId,
    subs: &[Substitution],
) -> bool {
    match store.data(pattern) {
        TyData::GenericParam { depth: 0, index } => subs
            .get(*index as usize)
            .is_some_and(|sub| sub.replacement == concrete),

        TyData::Tuple(pattern_elems) => match store.data(concrete) {
            TyData::Tuple(concrete_elems) => {
                pattern_elems.len() == concrete_elems.len()
                    && pattern_elems
                        .iter()
                        .zip(concrete_elems)
                        .all(|(p, c)| ty_matches_substituted(store, *c, *p, subs))
            }
            _ => false,
        },

        TyData::Func(pattern_fn) => match store.data(concrete) {
            TyData::Func(concrete_fn) => {
                pattern_fn.params.len() == concrete_fn.params.len()
                    && pattern_fn.repr == concrete_fn.repr
                    && pattern_fn.cc == concrete_fn.cc
                    && pattern_fn.sig == concrete_fn.sig
                    && pattern_fn.result.convention == concrete_fn.result.convention
                    && ty_matches_substituted(
                        store,
                        concrete_fn.result.ty,
                        pattern_fn.result.ty,
                        subs,
                    )
                    && pattern_fn.params.iter().zip(&concrete_fn.params).all(|(p, c)| {
                        p.convention == c.convention
                            && ty_matches_substituted(store, c.ty, p.ty, subs)
                    })
            }
            _ => false,
        },

        TyData::Metatype { instance, repr } => match store.data(concrete) {
            TyData::Metatype {
                instance: concrete_instance,
                repr: concrete_repr,
            } => repr == concrete_repr
                && ty_matches_substituted(store, *concrete_instance, *instance, subs),
            _ => false,
        },

        TyData::ExistentialMetatype { instance, repr } => match store.data(concrete) {
            TyData::ExistentialMetatype {
                instance: concrete_instance,
                repr: concrete_repr,
            } => repr == concrete_repr
                && ty_matches_substituted(store, *concrete_instance, *instance, subs),
            _ => false,
        },

        // Leaves (including archetypes, which stand for themselves) are
        // interned, so equality is index equality.
        _ => concrete == pattern,
    }
}

/// Checks that applying `subs` to a polymorphic function type reproduces the
/// recorded instantiated type: same shape, no remaining generic signature.
pub fn substituted_callee_matches(
    store: &TypeStore,
    substituted: TyId,
    generic: TyId,
    subs: &[Substitution],
) -> bool {
    let (Some(substituted_fn), Some(generic_fn)) =
        (store.as_func(substituted), store.as_func(generic))
    else {
        return false;
    };

    substituted_fn.sig.is_none()
        && substituted_fn.params.len() == generic_fn.params.len()
        && substituted_fn.repr == generic_fn.repr
        && substituted_fn.cc == generic_fn.cc
        && substituted_fn.result.convention == generic_fn.result.convention
        && ty_matches_substituted(store, substituted_fn.result.ty, generic_fn.result.ty, subs)
        && generic_fn
            .params
            .iter()
            .zip(&substituted_fn.params)
            .all(|(p, c)| {
                p.convention == c.convention && ty_matches_substituted(store, c.ty, p.ty, subs)
            })
}

/// Returns `true` if `ctx_ty` is `sig_ty` mapped into a function's archetype
/// context: every generic parameter replaced by the matching primary
/// archetype of `env`.
pub fn ty_matches_in_context(
    store: &TypeStore,
    ctx_ty: TyId,
    sig_ty: TyId,
    env: &[ArchetypeId],
) -> bool {
    match store.data(sig_ty) {
        TyData::GenericParam { depth, index } => match store.as_archetype(ctx_ty) {
            Some(arch) => {
                env.contains(&arch)
                    && store.archetype(arch).kind
                        == ArchetypeKind::Primary {
                            depth: *depth,
                            index: *index,
                        }
            }
            None => false,
        },

        TyData::Tuple(sig_elems) => match store.data(ctx_ty) {
            TyData::Tuple(ctx_elems) => {
                sig_elems.len() == ctx_elems.len()
                    && sig_elems
                        .iter()
                        .zip(ctx_elems)
                        .all(|(s, c)| ty_matches_in_context(store, *c, *s, env))
            }
            _ => false,
        },

        TyData::Func(sig_fn) => match store.data(ctx_ty) {
            TyData::Func(ctx_fn) => {
                sig_fn.params.len() == ctx_fn.params.len()
                    && sig_fn.repr == ctx_fn.repr
                    && sig_fn.cc == ctx_fn.cc
                    && sig_fn.sig == ctx_fn.sig
                    && sig_fn.result.convention == ctx_fn.result.convention
                    && ty_matches_in_context(store, ctx_fn.result.ty, sig_fn.result.ty, env)
                    && sig_fn.params.iter().zip(&ctx_fn.params).all(|(s, c)| {
                        s.convention == c.convention
                            && ty_matches_in_context(store, c.ty, s.ty, env)
                    })
            }
            _ => false,
        },

        TyData::Metatype { instance, repr } => match store.data(ctx_ty) {
            TyData::Metatype {
                instance: ctx_instance,
                repr: ctx_repr,
            } => repr == ctx_repr && ty_matches_in_context(store, *ctx_instance, *instance, env),
            _ => false,
        },

        TyData::ExistentialMetatype { instance, repr } => match store.data(ctx_ty) {
            TyData::ExistentialMetatype {
                instance: ctx_instance,
                repr: ctx_repr,
            } => repr == ctx_repr && ty_matches_in_context(store, *ctx_instance, *instance, env),
            _ => false,
        },

        _ => ctx_ty == sig_ty,
    }
}

/// Collects every archetype mentioned anywhere in `ty`.
pub fn collect_archetypes(store: &TypeStore, ty: TyId, out: &mut Vec<ArchetypeId>) {
    match store.data(ty) {
        TyData::Archetype(a) => out.push(*a),
        TyData::Tuple(elems) => {
            for elem in elems {
                collect_archetypes(store, *elem, out);
            }
        }
        TyData::Func(f) => {
            for param in &f.params {
                collect_archetypes(store, param.ty, out);
            }
            collect_archetypes(store, f.result.ty, out);
        }
        TyData::Metatype { instance, .. } | TyData::ExistentialMetatype { instance, .. } => {
            collect_archetypes(store, *instance, out);
        }
        _ => {}
    }
}
