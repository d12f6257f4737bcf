mod common;

use std::sync::{Arc, Mutex};

use common::compile_with;
use probe_frontend::{
    Diagnostic, Expr, Log, TaskEvent, TaskEventKind, TaskListener, Visitor,
};

type Journal = Arc<Mutex<Vec<String>>>;

struct Recorder {
    journal: Journal,
}

impl Recorder {
    fn record(&self, phase: &str, event: &TaskEvent) {
        let subject = event
            .type_symbol
            .as_ref()
            .map(|t| t.qualified_name.clone())
            .unwrap_or_else(|| event.source_name.clone());
        self.journal
            .lock()
            .unwrap()
            .push(format!("{phase} {} {subject}", event.kind));
    }
}

impl TaskListener for Recorder {
    fn started(&mut self, event: &TaskEvent, _log: &mut Log<'_>) {
        self.record("start", event);
    }

    fn finished(&mut self, event: &TaskEvent, _log: &mut Log<'_>) {
        self.record("end", event);
    }
}

#[test]
fn test_phase_order_for_one_unit() {
    let journal = Journal::default();
    let outcome = compile_with(
        &[("A.probe", "package p; class A { class B {} } class C {}")],
        Vec::new(),
        Some(Box::new(Recorder {
            journal: Arc::clone(&journal),
        })),
    );
    assert!(outcome.success);
    assert_eq!(
        *journal.lock().unwrap(),
        vec![
            "start parse A.probe",
            "end parse A.probe",
            "start enter A.probe",
            "end enter A.probe",
            "start analyze p.A",
            "end analyze p.A",
            "start analyze p.C",
            "end analyze p.C",
            "start generate p.A",
            "end generate p.A",
            "start generate p.C",
            "end generate p.C",
        ]
    );
}

#[test]
fn test_no_generate_events_after_errors() {
    let journal = Journal::default();
    let outcome = compile_with(
        &[("A.probe", "class A { int f() { return missing; } }")],
        Vec::new(),
        Some(Box::new(Recorder {
            journal: Arc::clone(&journal),
        })),
    );
    assert!(!outcome.success);
    assert!(journal
        .lock()
        .unwrap()
        .iter()
        .all(|entry| !entry.contains("generate")));
}

/// Counts attributed expressions in the tree handed over by `Analyze`.
struct ResolutionCheck {
    unresolved_names: Arc<Mutex<usize>>,
}

struct NameVisitor<'a> {
    unresolved: &'a mut usize,
}

impl Visitor for NameVisitor<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        if matches!(expr.kind, probe_frontend::ExprKind::Name(_)) && expr.resolution().is_none() {
            *self.unresolved += 1;
        }
        probe_frontend::ast::walk_expr(self, expr);
    }
}

impl TaskListener for ResolutionCheck {
    fn finished(&mut self, event: &TaskEvent, log: &mut Log<'_>) {
        if event.kind != TaskEventKind::Analyze {
            return;
        }
        let (Some(unit), Some(symbol)) = (&event.unit, &event.type_symbol) else {
            return;
        };
        let mut unresolved = 0;
        for class in unit.types.iter().filter(|c| c.id == symbol.decl) {
            NameVisitor {
                unresolved: &mut unresolved,
            }
            .visit_class(class);
        }
        *self.unresolved_names.lock().unwrap() += unresolved;
        log.report(Diagnostic::warning(format!("checked {}", symbol.qualified_name)));
    }
}

#[test]
fn test_analyze_event_carries_attributed_tree() {
    let unresolved = Arc::new(Mutex::new(0));
    let outcome = compile_with(
        &[(
            "A.probe",
            "class A { int x; int f(int y) { int z = y; return x + z; } }",
        )],
        Vec::new(),
        Some(Box::new(ResolutionCheck {
            unresolved_names: Arc::clone(&unresolved),
        })),
    );
    assert!(outcome.success);
    assert_eq!(*unresolved.lock().unwrap(), 0);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].message, "checked A");
}
