mod common;

use std::fs;

use common::{compile, compile_with};
use probe_frontend::symbols::OBJECT;
use probe_frontend::{ClassFile, DebugInfo, FrontendOption, LanguageLevel};

const PROGRAM: &str = r#"
package app;

@Deprecated
public class Main {
    static int count = 0;
    int value = 7;

    static class Entry {
        long weight;
    }

    int sum(int[] values) {
        int total = 0;
        for (int i = 0; i < values.length; i = i + 1) {
            total = total + values[i];
        }
        return total;
    }

    void guard(Main other) {
        synchronized (other) {
            other.value = 1;
        }
    }
}
"#;

#[test]
fn test_artifact_structure() {
    let outcome = compile_with(
        &[("Main.probe", PROGRAM)],
        vec![FrontendOption::Debug(DebugInfo::Lines)],
        None,
    );
    assert!(outcome.success, "{:?}", outcome.diagnostics);

    let main = ClassFile::parse(&outcome.artifacts["app.Main"]).unwrap();
    assert_eq!(main.binary_name, "app.Main");
    assert_eq!(main.superclass.as_deref(), Some(OBJECT));
    assert_eq!(main.outer, None);
    assert_eq!(main.nested, vec!["app.Main$Entry".to_string()]);
    assert!(main.is_deprecated());
    assert_eq!(main.target, LanguageLevel::LATEST);

    let fields: Vec<_> = main
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.descriptor.as_str()))
        .collect();
    assert_eq!(fields, vec![("count", "I"), ("value", "I")]);

    let methods: Vec<_> = main.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(methods, vec!["<init>", "sum", "guard", "<clinit>"]);
    let sum = &main.methods[1];
    assert_eq!(sum.descriptor, "([I)I");
    assert!(sum.max_locals >= 4);
    assert!(!sum.lines.is_empty());

    let entry = ClassFile::parse(&outcome.artifacts["app.Main$Entry"]).unwrap();
    assert_eq!(entry.outer.as_deref(), Some("app.Main"));
    assert!(!entry.is_deprecated());
    assert_eq!(entry.fields[0].descriptor, "J");
}

#[test]
fn test_line_tables_follow_debug_option() {
    let outcome = compile(&[("Main.probe", PROGRAM)]);
    let main = ClassFile::parse(&outcome.artifacts["app.Main"]).unwrap();
    assert!(main.methods.iter().all(|m| m.lines.is_empty()));
}

#[test]
fn test_generation_is_deterministic() {
    let first = compile(&[("Main.probe", PROGRAM)]);
    let second = compile(&[("Main.probe", PROGRAM)]);
    assert_eq!(first.artifacts, second.artifacts);
}

#[test]
fn test_source_path_types_are_loaded_and_compiled() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("lib")).unwrap();
    fs::write(
        dir.path().join("lib/Util.probe"),
        "package lib; public class Util { static int one() { return 1; } }",
    )
    .unwrap();

    let outcome = compile_with(
        &[(
            "Main.probe",
            "import lib.Util; class Main { int f() { return Util.one(); } }",
        )],
        vec![FrontendOption::SourcePath(
            dir.path().to_string_lossy().into_owned(),
        )],
        None,
    );
    assert!(outcome.success, "{:?}", outcome.diagnostics);
    assert_eq!(outcome.keys(), vec!["Main", "lib.Util"]);
}

#[test]
fn test_class_path_artifacts_satisfy_references() {
    let library = compile(&[(
        "Util.probe",
        "package lib; public class Util { static int one() { return 1; } int two() { return 2; } }",
    )]);
    assert!(library.success);

    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("lib")).unwrap();
    fs::write(dir.path().join("lib/Util.class"), &library.artifacts["lib.Util"]).unwrap();

    let class_path = vec![FrontendOption::ClassPath(
        dir.path().to_string_lossy().into_owned(),
    )];
    let outcome = compile_with(
        &[(
            "Main.probe",
            "import lib.*; class Main { int f(Util u) { return Util.one() + u.two(); } }",
        )],
        class_path.clone(),
        None,
    );
    assert!(outcome.success, "{:?}", outcome.diagnostics);
    assert_eq!(outcome.keys(), vec!["Main"]);

    let outcome = compile_with(
        &[("Main.probe", "import lib.*; class Main { int f() { return Util.three(); } }")],
        class_path,
        None,
    );
    assert!(outcome.has_error("cannot find symbol: method three() in class lib.Util"));
}

#[test]
fn test_corrupt_class_path_artifact_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Broken.class"), b"not an artifact").unwrap();

    let outcome = compile_with(
        &[("Main.probe", "class Main { Broken b; }")],
        vec![FrontendOption::ClassPath(
            dir.path().to_string_lossy().into_owned(),
        )],
        None,
    );
    assert!(!outcome.success);
    assert!(outcome.has_error("bad class file"));
}
