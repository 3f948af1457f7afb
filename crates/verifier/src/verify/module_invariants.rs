//! Module-level tables: symbol uniqueness, globals, vtables, witness tables.

use basalt_ir::{
    GlobalRef, GlobalVariable, MethodOwner, Module, VTable, VTableRef, WitnessTable,
    WitnessTableEntry, WitnessTableRef,
};
use rustc_hash::FxHashMap;

use crate::{
    VerifierConfig,
    diagnostic::{Diagnostic, DiagnosticCode, Location},
    report::VerificationReport,
};

pub(super) fn verify_module_invariants(
    module: &Module,
    cfg: &VerifierConfig,
    report: &mut VerificationReport,
) {
    // Functions and globals share one linkage namespace.
    let mut symbol_holders: FxHashMap<&str, Vec<String>> = FxHashMap::default();
    for (func_ref, func) in module.funcs.iter() {
        symbol_holders
            .entry(func.sig.name())
            .or_default()
            .push(format!("func{}", func_ref.as_u32()));
    }
    for (global_ref, gv) in module.globals.iter() {
        symbol_holders
            .entry(gv.name.as_str())
            .or_default()
            .push(format!("global{}", global_ref.as_u32()));
        check_global(module, global_ref, gv, cfg, report);
    }
    for (name, holders) in symbol_holders {
        if holders.len() > 1 {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::DuplicateSymbol,
                    format!("linkage symbol `{name}` has more than one definition"),
                    Location::Module,
                )
                .with_note(format!("claimed by {}", holders.join(", "))),
                cfg.max_diagnostics,
            );
        }
    }

    let mut vtable_classes = FxHashMap::default();
    for (vt_ref, vt) in module.vtables.iter() {
        if let Some(prior) = vtable_classes.insert(vt.class, vt_ref) {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::DuplicateVTable,
                    "class has more than one vtable",
                    Location::VTable(vt_ref),
                )
                .with_note(format!("first table is vtable{}", prior.as_u32())),
                cfg.max_diagnostics,
            );
        }
        check_vtable(module, vt_ref, vt, cfg, report);
    }

    let mut witness_conformances = FxHashMap::default();
    for (wt_ref, wt) in module.witness_tables.iter() {
        if let Some(prior) = witness_conformances.insert(wt.conformance, wt_ref) {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::DuplicateWitnessTable,
                    "conformance has more than one witness table",
                    Location::WitnessTable(wt_ref),
                )
                .with_note(format!("first table is witness_table{}", prior.as_u32())),
                cfg.max_diagnostics,
            );
        }
        check_witness_table(module, wt_ref, wt, cfg, report);
    }
}

fn check_global(
    module: &Module,
    global_ref: GlobalRef,
    gv: &GlobalVariable,
    cfg: &VerifierConfig,
    report: &mut VerificationReport,
) {
    if !gv.ty.is_object() {
        report.push(
            Diagnostic::error(
                DiagnosticCode::GlobalAddressType,
                "global stored type must be an object type",
                Location::Global(global_ref),
            )
            .with_note(format!("global `{}`", gv.name)),
            cfg.max_diagnostics,
        );
    }
    if !module.types.is_valid(gv.ty.base) {
        report.push(
            Diagnostic::error(
                DiagnosticCode::InvalidTypeRef,
                "global references a type outside the type store",
                Location::Global(global_ref),
            ),
            cfg.max_diagnostics,
        );
    }
}

fn check_vtable(
    module: &Module,
    vt_ref: VTableRef,
    vt: &VTable,
    cfg: &VerifierConfig,
    report: &mut VerificationReport,
) {
    let loc = Location::VTable(vt_ref);
    if module.decls.classes.get(vt.class).is_none() {
        report.push(
            Diagnostic::error(
                DiagnosticCode::VTableEntryInvalid,
                "vtable names a class that does not exist",
                loc,
            ),
            cfg.max_diagnostics,
        );
        return;
    }

    for (index, entry) in vt.entries.iter().enumerate() {
        let Some(method) = module.decls.methods.get(entry.method) else {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::InvalidMethodRef,
                    "vtable entry references an unknown method",
                    loc,
                )
                .with_note(format!("entry index {index}")),
                cfg.max_diagnostics,
            );
            continue;
        };

        let owner_ok = match method.owner {
            MethodOwner::Class(owner) => module.decls.is_ancestor_class(owner, vt.class),
            MethodOwner::Protocol(_) => false,
        };
        if !owner_ok {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::VTableEntryInvalid,
                    "vtable entry method does not belong to the class or its ancestors",
                    loc,
                )
                .with_note(format!("entry index {index}")),
                cfg.max_diagnostics,
            );
        }
        if entry.is_curried || entry.is_foreign {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::VTableEntryInvalid,
                    "curried and foreign entries do not belong in a vtable",
                    loc,
                )
                .with_note(format!("entry index {index}")),
                cfg.max_diagnostics,
            );
        }
        if module.funcs.get(entry.implementation).is_none() {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::InvalidFuncRef,
                    "vtable entry implementation does not exist",
                    loc,
                )
                .with_note(format!("entry index {index}")),
                cfg.max_diagnostics,
            );
        }
    }
}

fn check_witness_table(
    module: &Module,
    wt_ref: WitnessTableRef,
    wt: &WitnessTable,
    cfg: &VerifierConfig,
    report: &mut VerificationReport,
) {
    let loc = Location::WitnessTable(wt_ref);
    let Some(conformance) = module.conformances.get(wt.conformance).copied() else {
        report.push(
            Diagnostic::error(
                DiagnosticCode::InvalidConformanceRef,
                "witness table references an unknown conformance",
                loc,
            ),
            cfg.max_diagnostics,
        );
        return;
    };

    if !wt.is_definition && !wt.entries.is_empty() {
        report.push(
            Diagnostic::error(
                DiagnosticCode::WitnessTableEntryInvalid,
                "declaration-only witness table carries entries",
                loc,
            ),
            cfg.max_diagnostics,
        );
    }

    for (index, entry) in wt.entries.iter().enumerate() {
        match *entry {
            WitnessTableEntry::Method {
                requirement,
                witness,
            } => {
                let owner_ok = module
                    .decls
                    .methods
                    .get(requirement)
                    .is_some_and(|decl| decl.owner == MethodOwner::Protocol(conformance.protocol));
                if !owner_ok {
                    report.push(
                        Diagnostic::error(
                            DiagnosticCode::WitnessTableEntryInvalid,
                            "witness entry requirement is not a member of the conformed protocol",
                            loc,
                        )
                        .with_note(format!("entry index {index}")),
                        cfg.max_diagnostics,
                    );
                }
                let Some(witness_fn) = module.funcs.get(witness) else {
                    report.push(
                        Diagnostic::error(
                            DiagnosticCode::InvalidFuncRef,
                            "witness entry implementation does not exist",
                            loc,
                        )
                        .with_note(format!("entry index {index}")),
                        cfg.max_diagnostics,
                    );
                    continue;
                };
                if witness_fn.sig.linkage().is_less_visible_than(wt.linkage) {
                    report.push(
                        Diagnostic::error(
                            DiagnosticCode::WitnessTableEntryInvalid,
                            "witness function is less visible than its table",
                            loc,
                        )
                        .with_note(format!(
                            "entry index {index}, function `{}`",
                            witness_fn.sig.name()
                        )),
                        cfg.max_diagnostics,
                    );
                }
            }
            WitnessTableEntry::AssociatedType { witness } => {
                if !module.types.is_valid(witness) {
                    report.push(
                        Diagnostic::error(
                            DiagnosticCode::InvalidTypeRef,
                            "associated-type witness references a type outside the type store",
                            loc,
                        )
                        .with_note(format!("entry index {index}")),
                        cfg.max_diagnostics,
                    );
                }
            }
        }
    }
}

pub fn verify_global(
    module: &Module,
    global: GlobalRef,
    cfg: &VerifierConfig,
) -> VerificationReport {
    let mut report = VerificationReport::default();
    match module.globals.get(global) {
        Some(gv) => check_global(module, global, gv, cfg, &mut report),
        None => report.push(
            Diagnostic::error(
                DiagnosticCode::InvalidGlobalRef,
                "global reference is not present in the module",
                Location::Global(global),
            ),
            cfg.max_diagnostics,
        ),
    }
    report
}

pub fn verify_vtable(module: &Module, vtable: VTableRef, cfg: &VerifierConfig) -> VerificationReport {
    let mut report = VerificationReport::default();
    match module.vtables.get(vtable) {
        Some(vt) => check_vtable(module, vtable, vt, cfg, &mut report),
        None => report.push(
            Diagnostic::error(
                DiagnosticCode::InvalidGlobalRef,
                "vtable reference is not present in the module",
                Location::VTable(vtable),
            ),
            cfg.max_diagnostics,
        ),
    }
    report
}

pub fn verify_witness_table(
    module: &Module,
    table: WitnessTableRef,
    cfg: &VerifierConfig,
) -> VerificationReport {
    let mut report = VerificationReport::default();
    match module.witness_tables.get(table) {
        Some(wt) => check_witness_table(module, table, wt, cfg, &mut report),
        None => report.push(
            Diagnostic::error(
                DiagnosticCode::InvalidConformanceRef,
                "witness table reference is not present in the module",
                Location::WitnessTable(table),
            ),
            cfg.max_diagnostics,
        ),
    }
    report
}
