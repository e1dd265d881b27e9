//! Diagnostic kinds and the collector the transformer reports them through
//! (§7: "Malformed input", "Unknown operation", "Over-deep clone",
//! "Contradictory options" — plus the severities that let a caller tell a
//! hard failure from a warning it can proceed past).
//!
//! `Diagnostic` is the typed value a caller pattern-matches on; `anyhow`
//! remains the return type at crate boundaries that merely need to
//! propagate a cause with context (deep-clone recursion, malformed
//! `ParsedFunc` fields) rather than be matched on, mirroring how the rest
//! of this workspace splits the two.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// The four diagnostic kinds named by §7. `Malformed` and `OverDeepClone`
/// are always `Severity::Error` (no partial result is produced);
/// `UnknownOperation` and `ContradictoryOptions` are always
/// `Severity::Warning` (the transform proceeds).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("unknown operation `{0}`, call left untouched")]
    UnknownOperation(String),

    #[error("clone recursion exceeded depth {max}, aborting specialization")]
    OverDeepClone { max: u32 },

    #[error("contradictory options: {0}; preferring the declared type parameter")]
    ContradictoryOptions(String),
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::MalformedInput(_) | Diagnostic::OverDeepClone { .. } => Severity::Error,
            Diagnostic::UnknownOperation(_) | Diagnostic::ContradictoryOptions(_) => {
                Severity::Warning
            }
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

/// Accumulates diagnostics for one specialization. The transformer never
/// masks a diagnostic silently (§7): every push is also logged at the
/// matching `tracing` level by the caller's span.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        match diag.severity() {
            Severity::Error => tracing::error!(%diag, "diagnostic"),
            Severity::Warning => tracing::warn!(%diag, "diagnostic"),
        }
        self.entries.push(diag);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| !d.is_error())
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn malformed_and_over_deep_are_errors() {
        assert_eq!(
            Diagnostic::MalformedInput("missing body".into()).severity(),
            Severity::Error
        );
        assert_eq!(
            Diagnostic::OverDeepClone { max: 1000 }.severity(),
            Severity::Error
        );
    }

    #[test]
    fn unknown_op_and_contradictory_are_warnings() {
        assert_eq!(
            Diagnostic::UnknownOperation("Frobnicate".into()).severity(),
            Severity::Warning
        );
        assert_eq!(
            Diagnostic::ContradictoryOptions("type arg vs type param".into()).severity(),
            Severity::Warning
        );
    }

    #[test]
    fn collector_partitions_by_severity() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::UnknownOperation("Foo".into()));
        diags.push(Diagnostic::MalformedInput("no params".into()));
        assert!(diags.has_errors());
        assert_eq!(diags.errors().count(), 1);
        assert_eq!(diags.warnings().count(), 1);
    }
}
