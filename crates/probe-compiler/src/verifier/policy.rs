//! Restricted-execution policies.
//!
//! A [`RestrictedPolicy`] inspects one attributed top-level declaration and
//! returns every violation it finds. [`RuleTable`] is the data-driven
//! implementation: a set of forbidden [`Construct`]s, loadable from YAML.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

use probe_frontend::ast::{
    walk_class, walk_expr, walk_stmt, ClassDecl, ExprKind, FieldDecl, MethodDecl, Modifier,
    Resolution, Stmt, StmtKind,
};
use probe_frontend::{Expr, Span, Visitor};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CompileError, CompileResult};

/// A language construct a policy can forbid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Construct {
    /// `while` and `for` statements.
    Loop,
    /// `new T(...)` and `new T[n]`.
    ObjectCreation,
    Throw,
    /// `synchronized (lock) { ... }`.
    Synchronized,
    /// Assignment whose target resolves to a field.
    FieldAssignment,
    /// Member classes at any depth.
    NestedClass,
    /// Non-static fields and methods.
    InstanceMember,
}

impl Construct {
    pub const ALL: [Construct; 7] = [
        Construct::Loop,
        Construct::ObjectCreation,
        Construct::Throw,
        Construct::Synchronized,
        Construct::FieldAssignment,
        Construct::NestedClass,
        Construct::InstanceMember,
    ];

    /// Default message catalog key.
    pub fn message_key(self) -> &'static str {
        match self {
            Self::Loop => "no.loops",
            Self::ObjectCreation => "no.new.object",
            Self::Throw => "no.throw",
            Self::Synchronized => "no.synchronized.blocks",
            Self::FieldAssignment => "no.assignment",
            Self::NestedClass => "no.nested.class",
            Self::InstanceMember => "no.instance.members",
        }
    }
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loop => "loop",
            Self::ObjectCreation => "object_creation",
            Self::Throw => "throw",
            Self::Synchronized => "synchronized",
            Self::FieldAssignment => "field_assignment",
            Self::NestedClass => "nested_class",
            Self::InstanceMember => "instance_member",
        };
        f.write_str(name)
    }
}

/// One offending construct at a source position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub construct: Construct,
    /// Message catalog key describing the violation.
    pub message_key: String,
    pub span: Span,
}

/// Restricted-subset policy consulted by the verifier.
pub trait RestrictedPolicy: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// All violations in `class` and its members, in source order.
    fn check(&self, class: &ClassDecl) -> Vec<Violation>;
}

/// Forbidden constructs with the message key reported for each.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    #[serde(default = "default_name")]
    pub name: String,

    /// Constructs that are rejected.
    #[serde(default)]
    pub forbid: BTreeSet<Construct>,

    /// Per-construct replacement message keys.
    #[serde(default)]
    pub message_keys: BTreeMap<Construct, String>,
}

fn default_name() -> String {
    "custom".to_string()
}

impl RuleTable {
    pub fn new(name: impl Into<String>, forbid: impl IntoIterator<Item = Construct>) -> Self {
        Self {
            name: name.into(),
            forbid: forbid.into_iter().collect(),
            message_keys: BTreeMap::new(),
        }
    }

    /// Loops, object creation, `throw` and `synchronized`.
    pub fn baseline() -> Self {
        Self::new(
            "baseline",
            [
                Construct::Loop,
                Construct::ObjectCreation,
                Construct::Throw,
                Construct::Synchronized,
            ],
        )
    }

    /// Every known construct.
    pub fn strict() -> Self {
        Self::new("strict", Construct::ALL)
    }

    /// Forbids nothing.
    pub fn permissive() -> Self {
        Self::new("permissive", [])
    }

    pub fn from_yaml_str(text: &str) -> CompileResult<Self> {
        serde_yaml::from_str(text).map_err(|e| CompileError::Policy(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> CompileResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| CompileError::Policy(format!("{}: {e}", path.display())))?;
        let table = Self::from_yaml_str(&text)?;
        debug!(
            path = %path.display(),
            policy = %table.name,
            rules = table.forbid.len(),
            "Loaded rule table"
        );
        Ok(table)
    }

    pub fn forbids(&self, construct: Construct) -> bool {
        self.forbid.contains(&construct)
    }

    pub fn message_key(&self, construct: Construct) -> &str {
        self.message_keys
            .get(&construct)
            .map(String::as_str)
            .unwrap_or_else(|| construct.message_key())
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::baseline()
    }
}

impl RestrictedPolicy for RuleTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, class: &ClassDecl) -> Vec<Violation> {
        let mut scan = RuleScan {
            table: self,
            violations: Vec::new(),
        };
        walk_class(&mut scan, class);
        scan.violations
    }
}

struct RuleScan<'t> {
    table: &'t RuleTable,
    violations: Vec<Violation>,
}

impl RuleScan<'_> {
    fn flag(&mut self, construct: Construct, span: Span) {
        if self.table.forbids(construct) {
            self.violations.push(Violation {
                construct,
                message_key: self.table.message_key(construct).to_string(),
                span,
            });
        }
    }
}

impl Visitor for RuleScan<'_> {
    fn visit_class(&mut self, class: &ClassDecl) {
        self.flag(Construct::NestedClass, class.span);
        walk_class(self, class);
    }

    fn visit_field(&mut self, field: &FieldDecl) {
        if !field.modifiers.has(Modifier::Static) {
            self.flag(Construct::InstanceMember, field.span);
        }
        if let Some(init) = &field.init {
            self.visit_expr(init);
        }
    }

    fn visit_method(&mut self, method: &MethodDecl) {
        if !method.modifiers.has(Modifier::Static) {
            self.flag(Construct::InstanceMember, method.span);
        }
        for stmt in &method.body.stmts {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::While { .. } | StmtKind::For { .. } => self.flag(Construct::Loop, stmt.span),
            StmtKind::Throw(_) => self.flag(Construct::Throw, stmt.span),
            StmtKind::Synchronized { .. } => self.flag(Construct::Synchronized, stmt.span),
            _ => {}
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::New { .. } | ExprKind::NewArray { .. } => {
                self.flag(Construct::ObjectCreation, expr.span)
            }
            ExprKind::Assign { target, .. } if assigns_field(target) => {
                self.flag(Construct::FieldAssignment, expr.span)
            }
            _ => {}
        }
        walk_expr(self, expr);
    }
}

/// Whether an assignment target refers to a field. Uses the resolution
/// recorded by analysis, falling back to the syntax for unattributed
/// trees.
fn assigns_field(target: &Expr) -> bool {
    match target.resolution() {
        Some(Resolution::Field { .. }) => true,
        Some(_) => false,
        None => matches!(target.kind, ExprKind::Field { .. }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_frontend::parser::Parser;

    fn check(table: &RuleTable, source: &str) -> Vec<Construct> {
        let tree = Parser::parse("P.probe", source).unwrap();
        table
            .check(&tree.types[0])
            .into_iter()
            .map(|v| v.construct)
            .collect()
    }

    #[test]
    fn baseline_forbids_control_constructs() {
        let body = r#"
            class P {
                static void f(int n, Object lock) {
                    while (n > 0) { n = n - 1; }
                    synchronized (lock) { }
                    throw new Error();
                }
            }
        "#;
        assert_eq!(
            check(&RuleTable::baseline(), body),
            vec![
                Construct::Loop,
                Construct::Synchronized,
                Construct::Throw,
                Construct::ObjectCreation,
            ]
        );
    }

    #[test]
    fn permissive_table_reports_nothing() {
        let body = "class P { int x; void f() { for (;;) { x = 1; } } class In {} }";
        assert!(check(&RuleTable::permissive(), body).is_empty());
    }

    #[test]
    fn strict_table_reports_members_and_assignments() {
        let body = "class P { int x; void f() { this.x = 1; } static class In {} }";
        assert_eq!(
            check(&RuleTable::strict(), body),
            vec![
                Construct::InstanceMember,
                Construct::InstanceMember,
                Construct::FieldAssignment,
                Construct::NestedClass,
            ]
        );
    }

    #[test]
    fn spans_point_at_the_construct() {
        let body = "class P {\n  static void f() {\n    while (true) {}\n  }\n}\n";
        let tree = Parser::parse("P.probe", body).unwrap();
        let violations = RuleTable::baseline().check(&tree.types[0]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].span.line, 3);
        assert_eq!(violations[0].message_key, "no.loops");
    }

    #[test]
    fn yaml_tables() {
        let table = RuleTable::from_yaml_str(
            "name: no-loops\nforbid: [loop, nested_class]\nmessage_keys:\n  loop: custom.loops\n",
        )
        .unwrap();
        assert_eq!(table.name, "no-loops");
        assert!(table.forbids(Construct::Loop));
        assert!(!table.forbids(Construct::Throw));
        assert_eq!(table.message_key(Construct::Loop), "custom.loops");
        assert_eq!(table.message_key(Construct::NestedClass), "no.nested.class");
    }

    #[test]
    fn unknown_constructs_are_rejected() {
        let err = RuleTable::from_yaml_str("forbid: [goto]\n").unwrap_err();
        assert!(matches!(err, CompileError::Policy(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        fs::write(&path, "forbid: [throw]\n").unwrap();
        let table = RuleTable::load(&path).unwrap();
        assert_eq!(table.name, "custom");
        assert_eq!(table.forbid.len(), 1);
    }
}
