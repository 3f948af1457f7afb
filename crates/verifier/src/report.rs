//! Diagnostic accumulation with a bound on retained entries.

use std::fmt;

use crate::diagnostic::Diagnostic;

/// Diagnostics collected by one verification run.
///
/// A limit of zero retains everything; past the limit, diagnostics are
/// counted but dropped.
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub diagnostics: Vec<Diagnostic>,
    dropped: usize,
}

impl VerificationReport {
    pub fn is_ok(&self) -> bool {
        !self.has_errors()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|diag| diag.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|diag| !diag.is_error())
    }

    /// Number of diagnostics discarded once the retention limit was reached.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub(crate) fn push(&mut self, diagnostic: Diagnostic, limit: usize) {
        if limit != 0 && self.diagnostics.len() >= limit {
            self.dropped += 1;
            return;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Folds another report into this one under the same retention limit.
    pub(crate) fn absorb(&mut self, other: VerificationReport, limit: usize) {
        self.dropped += other.dropped;
        for diagnostic in other.diagnostics {
            self.push(diagnostic, limit);
        }
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.diagnostics.is_empty() {
            return "verification succeeded".fmt(f);
        }

        for diagnostic in &self.diagnostics {
            write!(f, "{diagnostic}")?;
        }
        if self.dropped > 0 {
            writeln!(f, "... and {} more", self.dropped)?;
        }

        Ok(())
    }
}
