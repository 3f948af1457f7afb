mod config;
mod diagnostic;
mod report;
mod verify;

pub use config::{VerificationLevel, VerifierConfig};
pub use diagnostic::{Diagnostic, DiagnosticCode, DiagnosticContext, Location, Note, Severity};
pub use report::VerificationReport;
pub use verify::{
    verify_function, verify_function_or_panic, verify_global, verify_module,
    verify_module_or_panic, verify_vtable, verify_witness_table,
};

#[macro_export]
macro_rules! debug_verify_module {
    ($module:expr) => {{
        if cfg!(debug_assertions) || cfg!(feature = "verify-ir") {
            let cfg = $crate::VerifierConfig::for_level($crate::VerificationLevel::Full);
            let report = $crate::verify_module($module, &cfg);
            if report.has_errors() {
                eprintln!("BASALT_IR_VERIFY_FAILURE: module");
                eprintln!("{report}");
                panic!("BASALT_IR_VERIFY_FAILURE");
            }
        }
    }};
}

#[macro_export]
macro_rules! debug_verify_func {
    ($module:expr, $func_ref:expr) => {{
        if cfg!(debug_assertions) || cfg!(feature = "verify-ir") {
            let cfg = $crate::VerifierConfig::for_level($crate::VerificationLevel::Full);
            let report = $crate::verify_function($module, $func_ref, &cfg);
            if report.has_errors() {
                eprintln!(
                    "BASALT_IR_VERIFY_FAILURE: function {}",
                    ($func_ref).as_u32()
                );
                eprintln!("{report}");
                panic!("BASALT_IR_VERIFY_FAILURE");
            }
        }
    }};
}
