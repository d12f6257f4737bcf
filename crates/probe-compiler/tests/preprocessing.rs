//! Preprocessing through the compiler: includes, macros and line
//! continuation for top-level inputs and source path siblings.

use std::fs;
use std::path::Path;

use probe_compiler::{CompileError, Compiler, CompilerOptions};
use probe_preprocess::PreprocessError;

fn with_includes(dirs: &[&Path]) -> Compiler {
    let joined = std::env::join_paths(dirs).unwrap();
    Compiler::new(CompilerOptions {
        include_path: Some(joined.to_string_lossy().into_owned()),
        ..CompilerOptions::default()
    })
}

#[test]
fn test_include_and_continuation() {
    let include = tempfile::tempdir().unwrap();
    fs::write(include.path().join("limits.h"), "#define LIMIT 42\n").unwrap();

    let compiler = with_includes(&[include.path()]);
    let source = "#include \"limits.h\"\nclass Probe {\n  static int \\\n    limit() { return LIMIT; }\n}\n";
    let mut err = Vec::new();
    let artifacts = compiler
        .compile_source("Probe.probe", source, &mut err, None, None)
        .unwrap()
        .unwrap_or_else(|| panic!("{}", String::from_utf8_lossy(&err)));
    assert!(artifacts.contains_key("Probe"));
}

#[test]
fn test_first_include_directory_wins() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    fs::write(first.path().join("decl.h"), "class Picked {}\n").unwrap();
    fs::write(second.path().join("decl.h"), "class Shadowed {}\n").unwrap();

    let compiler = with_includes(&[first.path(), second.path()]);
    let mut err = Vec::new();
    let artifacts = compiler
        .compile_source("Main.probe", "#include <decl.h>\n", &mut err, None, None)
        .unwrap()
        .unwrap();
    assert_eq!(artifacts.keys().collect::<Vec<_>>(), vec!["Picked"]);
}

#[test]
fn test_missing_include_is_a_preprocess_error() {
    let include = tempfile::tempdir().unwrap();
    let compiler = with_includes(&[include.path()]);
    let mut err = Vec::new();
    let result = compiler.compile_source(
        "Probe.probe",
        "#include \"absent.h\"\nclass Probe {}\n",
        &mut err,
        None,
        None,
    );
    assert!(matches!(
        result,
        Err(CompileError::Preprocess(PreprocessError::FileNotFound { .. }))
    ));
    assert!(err.is_empty());
}

#[test]
fn test_without_include_path_directives_reach_the_frontend() {
    let compiler = Compiler::new(CompilerOptions::default());
    let mut err = Vec::new();
    let result = compiler
        .compile_source("Probe.probe", "#include \"x.h\"\nclass Probe {}\n", &mut err, None, None)
        .unwrap();
    assert!(result.is_none());
    assert!(!err.is_empty());
}

#[test]
fn test_source_path_siblings_are_preprocessed() {
    let include = tempfile::tempdir().unwrap();
    fs::write(include.path().join("two.h"), "#define TWO 2\n").unwrap();

    let src = tempfile::tempdir().unwrap();
    fs::create_dir_all(src.path().join("lib")).unwrap();
    fs::write(
        src.path().join("lib/Util.probe"),
        "package lib;\n#include \"two.h\"\npublic class Util {\n  static int two() { return TWO; }\n}\n",
    )
    .unwrap();

    let compiler = with_includes(&[include.path()]);
    let source_path = src.path().to_string_lossy().into_owned();
    let mut err = Vec::new();
    let artifacts = compiler
        .compile_source(
            "Main.probe",
            "import lib.Util;\nclass Main { static int f() { return Util.two(); } }\n",
            &mut err,
            Some(&source_path),
            None,
        )
        .unwrap()
        .unwrap_or_else(|| panic!("{}", String::from_utf8_lossy(&err)));
    assert_eq!(artifacts.keys().collect::<Vec<_>>(), vec!["Main", "lib.Util"]);
}

#[test]
fn test_sibling_with_missing_include_is_a_preprocess_error() {
    let include = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    fs::write(
        src.path().join("Dep.probe"),
        "#include \"gone.h\"\npublic class Dep {}\n",
    )
    .unwrap();

    let compiler = with_includes(&[include.path()]);
    let source_path = src.path().to_string_lossy().into_owned();
    let mut err = Vec::new();
    let result = compiler.compile_source(
        "Main.probe",
        "class Main { Dep d; }\n",
        &mut err,
        Some(&source_path),
        None,
    );
    assert!(
        matches!(result, Err(CompileError::Preprocess(PreprocessError::FileNotFound { .. }))),
        "{result:?}"
    );
}

#[test]
fn test_preprocessed_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Probe.probe");
    fs::write(&path, "#ifndef NAME\n#define NAME Probe\n#endif\nclass NAME {}\n").unwrap();

    let compiler = with_includes(&[]);
    let mut err = Vec::new();
    let artifacts = compiler
        .compile_file(&path, &mut err, None, None)
        .unwrap()
        .unwrap();
    assert_eq!(artifacts.keys().collect::<Vec<_>>(), vec!["Probe"]);
}
