//! Safety verifier.
//!
//! [`Verifier`] is a frontend [`Plugin`]. Each task it is initialised for
//! gets an [`AttributionListener`] in its listener slot, composed with
//! whatever listener was already there. When analysis of a top-level type
//! finishes, the listener checks the type's trust exemption and, unless it
//! is exempt, runs the configured [`RestrictedPolicy`] over the attributed
//! tree. Violations become error diagnostics in the task's log.

pub mod listeners;
pub mod policy;
pub mod trust;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use probe_frontend::{
    ClassDecl, Context, Diagnostic, FrontendResult, Log, Plugin, TaskEvent, TaskEventKind,
    TaskListener, UnitTree,
};
use tracing::{debug, info};

use crate::messages::MessageCatalog;

pub use listeners::TaskListeners;
pub use policy::{Construct, RestrictedPolicy, RuleTable, Violation};
pub use trust::{Trust, TrustValue};

/// Name the verifier registers under.
pub const VERIFIER_NAME: &str = "verifier";

const MALFORMED_TRUST: &str = "no.complex.unsafe.value";
const VIOLATION: &str = "policy.violation";

/// State of one invocation.
#[derive(Debug, Default)]
struct VerifierState {
    /// Qualified names of examined classes, in examination order.
    class_names: Vec<String>,
    /// Entered units, searched for the declaration behind an analyze event.
    pending: Vec<Arc<UnitTree>>,
}

fn lock(state: &Mutex<VerifierState>) -> MutexGuard<'_, VerifierState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Restricted-subset verifier plugin.
///
/// One verifier belongs to one compiler; its class registry describes the
/// most recent invocation.
pub struct Verifier {
    policy: Arc<dyn RestrictedPolicy>,
    messages: Arc<MessageCatalog>,
    state: Arc<Mutex<VerifierState>>,
}

impl Verifier {
    pub fn new(policy: Arc<dyn RestrictedPolicy>, messages: Arc<MessageCatalog>) -> Self {
        Self {
            policy,
            messages,
            state: Arc::default(),
        }
    }

    /// Baseline rule table and the built-in messages.
    pub fn baseline() -> Self {
        Self::new(
            Arc::new(RuleTable::baseline()),
            Arc::new(MessageCatalog::builtin()),
        )
    }

    pub fn policy(&self) -> &dyn RestrictedPolicy {
        self.policy.as_ref()
    }

    /// Fully-qualified names of the classes examined during the last
    /// invocation, exempt ones included.
    pub fn class_names(&self) -> Vec<String> {
        lock(&self.state).class_names.clone()
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::baseline()
    }
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verifier")
            .field("policy", &self.policy.name())
            .field("state", &*lock(&self.state))
            .finish()
    }
}

impl Plugin for Verifier {
    fn name(&self) -> &str {
        VERIFIER_NAME
    }

    fn init(&self, cx: &mut Context) -> FrontendResult<()> {
        *lock(&self.state) = VerifierState::default();

        let listener = Box::new(AttributionListener {
            policy: Arc::clone(&self.policy),
            messages: Arc::clone(&self.messages),
            state: Arc::clone(&self.state),
        });
        match cx.take_task_listener() {
            Some(existing) => {
                debug!("Composing verifier with the installed task listener");
                cx.put_task_listener(Box::new(TaskListeners::new().with(existing).with(listener)))
            }
            None => cx.put_task_listener(listener),
        }
    }
}

/// Verifies each top-level type once its analysis has finished.
pub struct AttributionListener {
    policy: Arc<dyn RestrictedPolicy>,
    messages: Arc<MessageCatalog>,
    state: Arc<Mutex<VerifierState>>,
}

impl AttributionListener {
    fn verify(&self, tree: &UnitTree, class: &ClassDecl, log: &mut Log<'_>) {
        let qualified = match tree.package_name() {
            Some(pkg) => format!("{pkg}.{}", class.name.name),
            None => class.name.name.clone(),
        };
        lock(&self.state).class_names.push(qualified.clone());

        let trust = Trust::of(&class.modifiers);
        for span in trust.malformed() {
            log.report(
                Diagnostic::warning(self.messages.get(MALFORMED_TRUST)).at(
                    &tree.source_name,
                    span.line,
                    span.col,
                ),
            );
        }
        if trust.is_exempt() {
            debug!(class = %qualified, "Trusted class, skipping verification");
            return;
        }

        let violations = self.policy.check(class);
        if !violations.is_empty() {
            info!(
                class = %qualified,
                policy = self.policy.name(),
                violations = violations.len(),
                "Class violates the restricted policy"
            );
        }
        for violation in violations {
            let text = self.messages.get(&violation.message_key);
            let message = self.messages.format(VIOLATION, &[&qualified, &text]);
            log.report(Diagnostic::error(message).at(
                &tree.source_name,
                violation.span.line,
                violation.span.col,
            ));
        }
    }
}

impl TaskListener for AttributionListener {
    fn started(&mut self, event: &TaskEvent, _log: &mut Log<'_>) {
        if event.kind == TaskEventKind::Enter {
            if let Some(unit) = &event.unit {
                lock(&self.state).pending.push(Arc::clone(unit));
            }
        }
    }

    fn finished(&mut self, event: &TaskEvent, log: &mut Log<'_>) {
        if event.kind != TaskEventKind::Analyze {
            return;
        }
        let Some(symbol) = &event.type_symbol else {
            return;
        };
        let found = lock(&self.state).pending.iter().find_map(|tree| {
            tree.types
                .iter()
                .any(|decl| decl.id == symbol.decl)
                .then(|| Arc::clone(tree))
        });
        let Some(tree) = found else {
            return;
        };
        if let Some(class) = tree.types.iter().find(|decl| decl.id == symbol.decl) {
            self.verify(&tree, class, log);
        }
    }
}

impl fmt::Debug for AttributionListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributionListener")
            .field("policy", &self.policy.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_frontend::{
        CompilationUnit, DiagnosticCollector, Frontend, Location, UnitKind, UnitManager,
    };

    fn run(verifier: Arc<Verifier>, source: &str) -> (bool, DiagnosticCollector) {
        let out = tempfile::tempdir().unwrap();
        let frontend = Frontend::system();
        let mut manager = frontend.standard_manager();
        manager
            .set_location(Location::ClassOutput, vec![out.path().to_path_buf()])
            .unwrap();
        let mut diagnostics = DiagnosticCollector::new();
        let unit = CompilationUnit::from_text("p/Probe.probe", source, UnitKind::Source);
        let ok = {
            let mut task = frontend
                .task(&mut manager, &mut diagnostics, Vec::new(), vec![unit])
                .unwrap();
            task.add_plugin(verifier);
            task.call().unwrap()
        };
        (ok, diagnostics)
    }

    #[test]
    fn violations_name_the_class() {
        let verifier = Arc::new(Verifier::baseline());
        let (ok, diagnostics) = run(
            Arc::clone(&verifier),
            "package p;\nclass Probe {\n  static void f() {\n    while (true) {}\n  }\n}\n",
        );
        assert!(!ok);
        let errors: Vec<_> = diagnostics
            .diagnostics()
            .iter()
            .filter(|d| d.is_error())
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "p.Probe: loops are not allowed");
        assert_eq!(errors[0].line, 4);
        assert_eq!(verifier.class_names(), vec!["p.Probe"]);
    }

    #[test]
    fn trusted_classes_are_recorded_but_not_walked() {
        let verifier = Arc::new(Verifier::baseline());
        let (ok, diagnostics) = run(
            Arc::clone(&verifier),
            "@Probe(trusted = true)\nclass Probe { static void f() { while (true) {} } }\n",
        );
        assert!(ok, "{:?}", diagnostics.diagnostics());
        assert_eq!(verifier.class_names(), vec!["Probe"]);
    }

    #[test]
    fn malformed_trust_warns_and_verifies() {
        let verifier = Arc::new(Verifier::baseline());
        let (ok, diagnostics) = run(
            Arc::clone(&verifier),
            "@Probe(unsafe = \"yes\")\nclass Probe { static void f() { throw null; } }\n",
        );
        assert!(!ok);
        let messages: Vec<_> = diagnostics
            .diagnostics()
            .iter()
            .map(|d| (d.severity, d.message.as_str()))
            .collect();
        assert!(messages.contains(&(
            probe_frontend::Severity::Warning,
            "the value of unsafe/trusted must be a boolean literal"
        )));
        assert!(messages.contains(&(
            probe_frontend::Severity::Error,
            "Probe: throwing exceptions is not allowed"
        )));
    }

    #[test]
    fn malformed_value_beside_a_true_one_warns_and_exempts() {
        let verifier = Arc::new(Verifier::baseline());
        let (ok, diagnostics) = run(
            Arc::clone(&verifier),
            "@A(unsafe = \"x\", trusted = true)\nclass Probe { static void f() { while (true) {} } }\n",
        );
        assert!(ok, "{:?}", diagnostics.diagnostics());
        let warnings: Vec<_> = diagnostics
            .diagnostics()
            .iter()
            .filter(|d| d.severity == probe_frontend::Severity::Warning)
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(warnings, vec!["the value of unsafe/trusted must be a boolean literal"]);
    }

    #[test]
    fn state_resets_per_invocation() {
        let verifier = Arc::new(Verifier::baseline());
        run(Arc::clone(&verifier), "class A {}\nclass B {}\n");
        assert_eq!(verifier.class_names(), vec!["A", "B"]);
        run(Arc::clone(&verifier), "class C {}\n");
        assert_eq!(verifier.class_names(), vec!["C"]);
    }
}
