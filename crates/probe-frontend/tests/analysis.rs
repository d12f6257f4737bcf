mod common;

use common::{compile, compile_with};
use probe_frontend::{FrontendOption, LanguageLevel, LintCategory, LintSet, Severity};

#[test]
fn test_clean_unit_produces_every_declared_type() {
    let outcome = compile(&[(
        "Main.probe",
        r#"
        package app;

        class Main {
            static int count = 0;
            int value;

            static class Entry {
                int key;
                static class Leaf {}
            }

            int twice(int x) {
                return x * 2;
            }

            static void main() {
                Main m = new Main();
                int y = m.twice(3);
                String s = "n" + y;
                count = count + y;
            }
        }

        class Helper {}
        "#,
    )]);
    assert!(outcome.success, "{:?}", outcome.diagnostics);
    assert_eq!(
        outcome.keys(),
        vec!["app.Helper", "app.Main", "app.Main$Entry", "app.Main$Entry$Leaf"]
    );
}

#[test]
fn test_syntax_error_fails_without_artifacts() {
    let outcome = compile(&[("A.probe", "class A { int x }")]);
    assert!(!outcome.success);
    assert!(outcome.has_error("';' expected"));
    assert!(outcome.artifacts.is_empty());
}

#[test]
fn test_unresolved_names() {
    let outcome = compile(&[(
        "A.probe",
        r#"
        class A {
            Missing field;
            int f() { return y; }
            void g() { h(); }
        }
        "#,
    )]);
    assert!(!outcome.success);
    assert!(outcome.has_error("cannot find symbol: class Missing"));
    assert!(outcome.has_error("cannot find symbol: variable y"));
    assert!(outcome.has_error("cannot find symbol: method h()"));
    assert!(outcome.artifacts.is_empty());
}

#[test]
fn test_type_errors() {
    let outcome = compile(&[(
        "A.probe",
        r#"
        class A {
            int v;
            void f() { int x = "s"; }
            int g() { }
            static int h() { return v; }
            void i() { return 1; }
            void j() { int a = 1; int a = 2; }
        }
        "#,
    )]);
    assert!(outcome.has_error("incompatible types: probe.lang.String cannot be converted to int"));
    assert!(outcome.has_error("missing return statement"));
    assert!(outcome.has_error("non-static variable v cannot be referenced from a static context"));
    assert!(outcome.has_error("incompatible types: unexpected return value"));
    assert!(outcome.has_error("variable a is already defined in method j()"));
}

#[test]
fn test_duplicate_and_cyclic_classes() {
    let outcome = compile(&[("A.probe", "class A {}"), ("B.probe", "class A {}")]);
    assert!(outcome.has_error("duplicate class: A"));

    let outcome = compile(&[("C.probe", "class C extends D {} class D extends C {}")]);
    assert!(outcome.has_error("cyclic inheritance involving"));
}

#[test]
fn test_inherited_members_resolve() {
    let outcome = compile(&[(
        "Shapes.probe",
        r#"
        class Base {
            int size;
            int get() { return size; }
        }
        class Derived extends Base {
            int twice() { return get() * 2 + size; }
            boolean same(Base other) { return other == this; }
        }
        "#,
    )]);
    assert!(outcome.success, "{:?}", outcome.diagnostics);
    assert_eq!(outcome.keys(), vec!["Base", "Derived"]);
}

#[test]
fn test_for_requires_newer_source_level() {
    let source = "class L { void f() { for (int i = 0; i < 3; i = i + 1) { } } }";
    let outcome = compile_with(
        &[("L.probe", source)],
        vec![FrontendOption::Source(LanguageLevel::V1)],
        None,
    );
    assert!(outcome.has_error("for statements are not supported in -source 1"));

    assert!(compile(&[("L.probe", source)]).success);
}

#[test]
fn test_empty_lint() {
    let source = "class E { void f(boolean b) { if (b); while (b); } }";
    let quiet = compile(&[("E.probe", source)]);
    assert!(quiet.success);
    assert!(quiet.diagnostics.is_empty());

    let linted = compile_with(
        &[("E.probe", source)],
        vec![FrontendOption::Lint(LintSet::Only(vec![LintCategory::Empty]))],
        None,
    );
    assert!(linted.success);
    let warnings: Vec<_> = linted
        .diagnostics
        .iter()
        .filter(|d| d.lint == Some(LintCategory::Empty))
        .map(|d| d.message.as_str())
        .collect();
    assert_eq!(
        warnings,
        vec!["empty statement after if", "empty statement after while"]
    );
}

#[test]
fn test_deprecation_warning_or_summary_note() {
    let sources = [
        ("Old.probe", "@Deprecated class Old {}"),
        ("User.probe", "class User { Old old; }"),
    ];

    let detailed = compile_with(&sources, vec![FrontendOption::Deprecation], None);
    assert!(detailed.success);
    let warning = detailed
        .diagnostics
        .iter()
        .find(|d| d.lint == Some(LintCategory::Deprecation))
        .expect("deprecation warning");
    assert_eq!(warning.message, "Old in unnamed package has been deprecated");
    assert_eq!(warning.source.as_deref(), Some("User.probe"));

    let summary = compile(&sources);
    assert!(summary.success);
    let notes: Vec<_> = summary
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Note)
        .map(|d| d.message.as_str())
        .collect();
    assert_eq!(notes[0], "User.probe uses or overrides a deprecated API.");
}

#[test]
fn test_annotations_are_not_resolved() {
    let outcome = compile(&[(
        "T.probe",
        "@Probe(trusted = true, name = \"t\") class T { @Anything int x; }",
    )]);
    assert!(outcome.success, "{:?}", outcome.diagnostics);
}

#[test]
fn test_builtin_string_methods() {
    let outcome = compile(&[(
        "S.probe",
        r#"
        class S {
            int f(String s) {
                if (s.isEmpty()) { return 0; }
                return s.length() + s.concat("x").hashCode();
            }
            void g() { throw new Error(); }
        }
        "#,
    )]);
    assert!(outcome.success, "{:?}", outcome.diagnostics);
}

#[test]
fn test_local_slots_are_bounded() {
    // Sibling blocks never reuse slots, so each adds one local to the method.
    let blocks = "{ int a; }".repeat(usize::from(u16::MAX) + 1);
    let source = format!("class Big {{ static void f() {{ {blocks} }} }}");
    let outcome = compile(&[("Big.probe", source.as_str())]);
    assert!(!outcome.success);
    let limit_errors = outcome
        .errors()
        .into_iter()
        .filter(|e| e == "too many local variables in method f()")
        .count();
    assert_eq!(limit_errors, 1, "{:?}", outcome.errors());
    assert!(outcome.artifacts.is_empty());
}
