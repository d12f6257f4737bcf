//! Driver behaviour: artifact keys, failure reporting, file inputs,
//! repeatability and isolation between threads.

use std::fs;
use std::sync::Arc;
use std::thread;

use probe_compiler::{CompileError, Compiler, CompilerOptions, Verifier};
use probe_frontend::{ClassFile, CompilationUnit, UnitKind};

const NESTED: &str = r#"
package app;

class Main {
    static int count = 0;

    static class Entry {
        static int key;
        static class Leaf {}
    }

    static int twice(int x) {
        return x * 2;
    }
}

class Helper {}
"#;

fn compiler() -> Compiler {
    Compiler::new(CompilerOptions::default())
}

fn lossy(err: Vec<u8>) -> String {
    String::from_utf8_lossy(&err).into_owned()
}

#[test]
fn test_keys_are_every_declared_type() {
    let mut err = Vec::new();
    let artifacts = compiler()
        .compile_source("app/Main.probe", NESTED, &mut err, None, None)
        .unwrap()
        .expect("clean source compiles");
    let keys: Vec<_> = artifacts.keys().cloned().collect();
    assert_eq!(
        keys,
        vec!["app.Helper", "app.Main", "app.Main$Entry", "app.Main$Entry$Leaf"]
    );
    for (name, bytes) in &artifacts {
        assert_eq!(&ClassFile::parse(bytes).unwrap().binary_name, name);
    }
    assert!(err.is_empty(), "{}", lossy(err));
}

#[test]
fn test_syntax_error_yields_none_and_an_error_line() {
    let mut err = Vec::new();
    let result = compiler()
        .compile_source("A.probe", "class A { int x }", &mut err, None, None)
        .unwrap();
    assert!(result.is_none());
    let text = lossy(err);
    assert!(text.lines().any(|l| l.starts_with("A.probe:1: error:")), "{text}");
}

#[test]
fn test_semantic_error_yields_none() {
    let mut err = Vec::new();
    let result = compiler()
        .compile_source(
            "A.probe",
            "class A {\n  static int f() { return missing; }\n}\n",
            &mut err,
            None,
            None,
        )
        .unwrap();
    assert!(result.is_none());
    assert!(lossy(err).contains("A.probe:2: error: cannot find symbol: variable missing"));
}

#[test]
fn test_warnings_alone_do_not_fail_and_are_not_printed() {
    let mut err = Vec::new();
    let result = compiler()
        .compile_source(
            "A.probe",
            "class A { static void f(boolean b) { if (b); } }",
            &mut err,
            None,
            None,
        )
        .unwrap();
    assert!(result.is_some());
    assert!(err.is_empty());
}

#[test]
fn test_warnings_are_printed_with_errors() {
    let mut err = Vec::new();
    let result = compiler()
        .compile_source(
            "A.probe",
            "class A { static void f(boolean b) { if (b); } static int g() { return x; } }",
            &mut err,
            None,
            None,
        )
        .unwrap();
    assert!(result.is_none());
    let text = lossy(err);
    assert!(text.contains("warning: [empty]"), "{text}");
    assert!(text.contains("error: cannot find symbol: variable x"), "{text}");
}

#[test]
fn test_compile_files_and_source_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("lib")).unwrap();
    fs::write(
        dir.path().join("Main.probe"),
        "import lib.Util;\nclass Main { static int f() { return Util.two(); } }\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("lib/Util.probe"),
        "package lib;\npublic class Util { static int two() { return 2; } }\n",
    )
    .unwrap();

    let mut err = Vec::new();
    let source_path = dir.path().to_string_lossy().into_owned();
    let artifacts = compiler()
        .compile_file(dir.path().join("Main.probe"), &mut err, Some(&source_path), None)
        .unwrap()
        .unwrap_or_else(|| panic!("{}", lossy(err.clone())));
    assert_eq!(artifacts.keys().collect::<Vec<_>>(), vec!["Main", "lib.Util"]);
    assert!(!dir.path().join("Main.class").exists());
}

#[test]
fn test_compile_against_class_path_artifacts() {
    let mut err = Vec::new();
    let lib = compiler()
        .compile_source(
            "lib/Util.probe",
            "package lib;\npublic class Util { static int two() { return 2; } }\n",
            &mut err,
            None,
            None,
        )
        .unwrap()
        .unwrap();

    let classes = tempfile::tempdir().unwrap();
    fs::create_dir_all(classes.path().join("lib")).unwrap();
    fs::write(classes.path().join("lib/Util.class"), &lib["lib.Util"]).unwrap();
    let class_path = classes.path().to_string_lossy().into_owned();

    let artifacts = compiler()
        .compile_source(
            "Main.probe",
            "import lib.*; class Main { static int f() { return Util.two(); } }",
            &mut err,
            None,
            Some(&class_path),
        )
        .unwrap()
        .unwrap_or_else(|| panic!("{}", lossy(err.clone())));
    assert_eq!(artifacts.keys().collect::<Vec<_>>(), vec!["Main"]);
}

#[test]
fn test_precomputed_units() {
    let unit = CompilationUnit::from_text("U.probe", "class U {}", UnitKind::Source);
    let mut err = Vec::new();
    let artifacts = compiler()
        .compile_units(vec![unit], &mut err, None, None)
        .unwrap()
        .unwrap();
    assert!(artifacts.contains_key("U"));
}

#[test]
fn test_missing_input_file_is_a_hard_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut err = Vec::new();
    let result = compiler().compile_file(dir.path().join("Nope.probe"), &mut err, None, None);
    assert!(matches!(result, Err(CompileError::Frontend(_))));
}

#[test]
fn test_repeated_compiles_are_identical_and_independent() {
    let compiler = compiler();
    let mut err = Vec::new();
    let first = compiler
        .compile_source("app/Main.probe", NESTED, &mut err, None, None)
        .unwrap()
        .unwrap();
    let second = compiler
        .compile_source("app/Main.probe", NESTED, &mut err, None, None)
        .unwrap()
        .unwrap();
    assert_eq!(first, second);

    let other = compiler
        .compile_source("Other.probe", "class Other {}", &mut err, None, None)
        .unwrap()
        .unwrap();
    assert_eq!(other.keys().collect::<Vec<_>>(), vec!["Other"]);
}

#[test]
fn test_concurrent_compilers_do_not_interfere() {
    let handles: Vec<_> = (0..6)
        .map(|i| {
            thread::spawn(move || {
                let verifier = Arc::new(Verifier::baseline());
                let compiler = Compiler::new(CompilerOptions::default()).with_plugin(verifier.clone());
                let name = format!("T{i}");
                let failing = i % 2 == 1;
                let source = if failing {
                    format!("class {name} {{ static void f(int n) {{ while (n > 0) {{ n = n - 1; }} }} }}")
                } else {
                    format!("class {name} {{ static class In{i} {{}} }}")
                };
                let mut err = Vec::new();
                for _ in 0..5 {
                    let result = compiler
                        .compile_source(&format!("{name}.probe"), &source, &mut err, None, None)
                        .unwrap();
                    assert_eq!(verifier.class_names(), vec![name.clone()]);
                    if failing {
                        assert!(result.is_none());
                    } else {
                        let keys: Vec<_> = result.unwrap().keys().cloned().collect();
                        assert_eq!(keys, vec![name.clone(), format!("{name}$In{i}")]);
                    }
                }
                (i, failing, lossy(err))
            })
        })
        .collect();

    for handle in handles {
        let (i, failing, err) = handle.join().unwrap();
        if !failing {
            assert!(err.is_empty(), "thread {i} got diagnostics: {err}");
            continue;
        }
        let own = format!("T{i}.probe:");
        assert!(err.lines().all(|line| line.starts_with(&own)), "thread {i}: {err}");
        let violations = err
            .lines()
            .filter(|line| line.ends_with(&format!("error: T{i}: loops are not allowed")))
            .count();
        assert_eq!(violations, 5, "thread {i}: {err}");
    }
}
