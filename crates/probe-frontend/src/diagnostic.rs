//! Diagnostics: errors, warnings and notes about the program being compiled.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::options::LintCategory;

/// Severity of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Note => write!(f, "note"),
        }
    }
}

/// A message about a source location (or about the whole compilation).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Name of the unit the location refers to.
    pub source: Option<String>,
    /// 1-based line, 0 when unknown.
    pub line: u32,
    /// 1-based column, 0 when unknown.
    pub column: u32,
    /// Lint category for lint warnings.
    pub lint: Option<LintCategory>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            source: None,
            line: 0,
            column: 0,
            lint: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self::new(Severity::Note, message)
    }

    /// Attach a source position.
    pub fn at(mut self, source: impl Into<String>, line: u32, column: u32) -> Self {
        self.source = Some(source.into());
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_lint(mut self, lint: LintCategory) -> Self {
        self.lint = Some(lint);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Renders like `Probe.probe:12: error: message`.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, self.line) {
            (Some(source), 0) => write!(f, "{source}: ")?,
            (Some(source), line) => write!(f, "{source}:{line}: ")?,
            (None, _) => {}
        }
        write!(f, "{}: ", self.severity)?;
        if let Some(lint) = self.lint {
            write!(f, "[{lint}] ")?;
        }
        write!(f, "{}", self.message)
    }
}

/// Receiver of diagnostics produced during a task.
pub trait DiagnosticListener {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Listener that keeps every diagnostic in arrival order.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Whether at least one error-severity diagnostic was collected.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl DiagnosticListener for DiagnosticCollector {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// The task's reporting channel. Counts what passes through and forwards
/// everything to the task's [`DiagnosticListener`].
pub struct Log<'a> {
    listener: &'a mut dyn DiagnosticListener,
    errors: usize,
    warnings: usize,
}

impl<'a> Log<'a> {
    pub fn new(listener: &'a mut dyn DiagnosticListener) -> Self {
        Self {
            listener,
            errors: 0,
            warnings: 0,
        }
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Note => {}
        }
        self.listener.report(diagnostic);
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }
}

impl fmt::Debug for Log<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Log")
            .field("errors", &self.errors)
            .field("warnings", &self.warnings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendering_matches_compiler_style() {
        let d = Diagnostic::error("cannot find symbol: class Foo").at("A.probe", 3, 9);
        assert_eq!(d.to_string(), "A.probe:3: error: cannot find symbol: class Foo");

        let w = Diagnostic::warning("Old has been deprecated")
            .at("B.probe", 1, 1)
            .with_lint(LintCategory::Deprecation);
        assert_eq!(w.to_string(), "B.probe:1: warning: [deprecation] Old has been deprecated");

        assert_eq!(Diagnostic::note("done").to_string(), "note: done");
        assert_eq!(Diagnostic::warning("w").at("C.probe", 0, 0).to_string(), "C.probe: warning: w");
    }

    #[test]
    fn log_counts_and_forwards() {
        let mut collector = DiagnosticCollector::new();
        {
            let mut log = Log::new(&mut collector);
            log.report(Diagnostic::error("e1"));
            log.report(Diagnostic::warning("w1"));
            log.report(Diagnostic::note("n1"));
            log.report(Diagnostic::error("e2"));
            assert_eq!(log.error_count(), 2);
            assert_eq!(log.warning_count(), 1);
        }
        assert_eq!(collector.len(), 4);
        assert!(collector.has_errors());
    }

    #[test]
    fn collector_without_errors() {
        let mut collector = DiagnosticCollector::new();
        collector.report(Diagnostic::warning("only a warning"));
        assert!(!collector.has_errors());
        assert!(!collector.is_empty());
    }
}
