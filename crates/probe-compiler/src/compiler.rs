//! Compiler driver.
//!
//! Every entry point converges on [`CompilerHelper::compile`], which runs
//! one frontend task over a fresh [`MemoryUnitStore`] with a fixed option
//! set and turns the outcome into `Ok(Some(artifacts))`, `Ok(None)` after
//! writing diagnostics, or a [`CompileError`].

use std::fmt;
use std::io::Write;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use probe_frontend::{
    ArtifactMap, CompilationUnit, DebugInfo, DiagnosticCollector, Frontend, FrontendError,
    FrontendOption, LanguageLevel, LintSet, Log, Plugin, TaskEvent, TaskListener, UnitManager,
};
use probe_preprocess::SearchPath;
use tracing::{debug, info, warn};

use crate::error::{CompileError, CompileResult};
use crate::store::MemoryUnitStore;

/// Construction-time settings of a [`Compiler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Include directories joined with the platform path separator.
    /// `None` disables preprocessing.
    pub include_path: Option<String>,
    pub generate_pack: bool,
    /// Extension for written artifacts, without the dot.
    pub pack_extension: String,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            include_path: None,
            generate_pack: true,
            pack_extension: "class".to_string(),
        }
    }
}

/// In-memory compiler for probe sources.
///
/// Invocations are synchronous. A compiler and its plugins serve one
/// thread at a time; use one instance per thread for parallel work.
pub struct Compiler {
    include_dirs: Option<SearchPath>,
    options: CompilerOptions,
    helper: CompilerHelper,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        let include_dirs = options.include_path.as_deref().map(SearchPath::parse);
        Self {
            include_dirs,
            options,
            helper: CompilerHelper::new(Frontend::system()),
        }
    }

    /// Register a plugin initialised by every task of this compiler.
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.helper.plugins.push(plugin);
        self
    }

    pub fn include_dirs(&self) -> Option<&SearchPath> {
        self.include_dirs.as_ref()
    }

    pub fn generate_pack(&self) -> bool {
        self.options.generate_pack
    }

    pub fn pack_extension(&self) -> &str {
        &self.options.pack_extension
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    fn new_store(&self) -> MemoryUnitStore {
        MemoryUnitStore::new(self.helper.frontend.standard_manager(), self.include_dirs.clone())
    }

    /// Compile one source held in memory. `name` is the unit name used in
    /// diagnostics.
    pub fn compile_source(
        &self,
        name: &str,
        text: &str,
        err: &mut dyn Write,
        source_path: Option<&str>,
        class_path: Option<&str>,
    ) -> CompileResult<Option<ArtifactMap>> {
        let unit = MemoryUnitStore::wrap(name, text, self.include_dirs.as_ref())?;
        self.helper
            .compile(self.new_store(), vec![unit], err, source_path, class_path)
    }

    pub fn compile_file(
        &self,
        path: impl AsRef<Path>,
        err: &mut dyn Write,
        source_path: Option<&str>,
        class_path: Option<&str>,
    ) -> CompileResult<Option<ArtifactMap>> {
        self.compile_files([path.as_ref().to_path_buf()], err, source_path, class_path)
    }

    /// Compile several source files in one task.
    pub fn compile_files<I, P>(
        &self,
        paths: I,
        err: &mut dyn Write,
        source_path: Option<&str>,
        class_path: Option<&str>,
    ) -> CompileResult<Option<ArtifactMap>>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        let units = self
            .helper
            .frontend
            .standard_manager()
            .units_for_paths(&paths)
            .into_iter()
            .map(|unit| MemoryUnitStore::adapt(unit, self.include_dirs.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.helper
            .compile(self.new_store(), units, err, source_path, class_path)
    }

    /// Compile units that are already preprocessed.
    pub fn compile_units(
        &self,
        units: Vec<CompilationUnit>,
        err: &mut dyn Write,
        source_path: Option<&str>,
        class_path: Option<&str>,
    ) -> CompileResult<Option<ArtifactMap>> {
        self.helper
            .compile(self.new_store(), units, err, source_path, class_path)
    }
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("include_dirs", &self.include_dirs)
            .field("options", &self.options)
            .field("plugins", &self.helper.plugins.len())
            .finish()
    }
}

/// Runs a single frontend task with the fixed option set.
pub struct CompilerHelper {
    frontend: Frontend,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl CompilerHelper {
    pub fn new(frontend: Frontend) -> Self {
        Self {
            frontend,
            plugins: Vec::new(),
        }
    }

    /// Options every task runs with, before the search locations.
    pub fn fixed_options() -> Vec<FrontendOption> {
        vec![
            FrontendOption::Lint(LintSet::All),
            FrontendOption::Debug(DebugInfo::Lines),
            FrontendOption::Deprecation,
            FrontendOption::Source(LanguageLevel::PINNED),
            FrontendOption::Target(LanguageLevel::PINNED),
        ]
    }

    /// Compile `units` through `store`. The store is closed on every
    /// path out of this function.
    pub fn compile(
        &self,
        store: MemoryUnitStore,
        units: Vec<CompilationUnit>,
        err: &mut dyn Write,
        source_path: Option<&str>,
        class_path: Option<&str>,
    ) -> CompileResult<Option<ArtifactMap>> {
        let mut store = CloseOnDrop(store);
        let mut options = Self::fixed_options();
        if let Some(source_path) = source_path {
            options.push(FrontendOption::SourcePath(source_path.to_string()));
        }
        if let Some(class_path) = class_path {
            options.push(FrontendOption::ClassPath(class_path.to_string()));
        }

        let unit_count = units.len();
        let mut diagnostics = DiagnosticCollector::new();
        let outcome = {
            let mut task = self
                .frontend
                .task(&mut *store, &mut diagnostics, options, units)?;
            task.set_task_listener(Box::new(PhaseTracer));
            for plugin in &self.plugins {
                task.add_plugin(Arc::clone(plugin));
            }
            task.call()
        };

        let success = match outcome {
            Ok(success) => success,
            Err(FrontendError::Io(io)) => {
                return Err(match store.take_deferred_error() {
                    Some(preprocess) => preprocess.into(),
                    None => FrontendError::Io(io).into(),
                });
            }
            Err(other) => return Err(other.into()),
        };

        if !success || diagnostics.has_errors() {
            let errors = diagnostics
                .diagnostics()
                .iter()
                .filter(|d| d.is_error())
                .count();
            info!(units = unit_count, errors, "Compilation failed");
            for diagnostic in diagnostics.diagnostics() {
                writeln!(err, "{diagnostic}").map_err(CompileError::Sink)?;
            }
            err.flush().map_err(CompileError::Sink)?;
            return Ok(None);
        }

        let artifacts = store.take_artifacts();
        info!(
            units = unit_count,
            artifacts = artifacts.len(),
            diagnostics = diagnostics.len(),
            "Compilation succeeded"
        );
        Ok(Some(artifacts))
    }
}

impl fmt::Debug for CompilerHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerHelper")
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

/// Scope guard closing the store however the invocation ends.
struct CloseOnDrop(MemoryUnitStore);

impl Deref for CloseOnDrop {
    type Target = MemoryUnitStore;

    fn deref(&self) -> &MemoryUnitStore {
        &self.0
    }
}

impl DerefMut for CloseOnDrop {
    fn deref_mut(&mut self) -> &mut MemoryUnitStore {
        &mut self.0
    }
}

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        if let Err(e) = self.0.close() {
            warn!(error = %e, "Closing the unit store failed");
        }
    }
}

/// Logs every phase event.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhaseTracer;

impl TaskListener for PhaseTracer {
    fn started(&mut self, event: &TaskEvent, _log: &mut Log<'_>) {
        debug!(
            phase = %event.kind,
            unit = %event.source_name,
            type_name = event.type_symbol.as_ref().map(|t| t.binary_name.as_str()),
            "Phase started"
        );
    }

    fn finished(&mut self, event: &TaskEvent, log: &mut Log<'_>) {
        debug!(
            phase = %event.kind,
            unit = %event.source_name,
            type_name = event.type_symbol.as_ref().map(|t| t.binary_name.as_str()),
            errors = log.error_count(),
            "Phase finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_path_is_split() {
        let joined = std::env::join_paths(["/a/include", "/b/include"]).unwrap();
        let compiler = Compiler::new(CompilerOptions {
            include_path: Some(joined.to_string_lossy().into_owned()),
            ..CompilerOptions::default()
        });
        let dirs = compiler.include_dirs().unwrap().dirs();
        assert_eq!(dirs, [PathBuf::from("/a/include"), PathBuf::from("/b/include")]);
    }

    #[test]
    fn no_include_path_means_no_preprocessing() {
        let compiler = Compiler::new(CompilerOptions::default());
        assert!(compiler.include_dirs().is_none());
        assert_eq!(compiler.pack_extension(), "class");
        assert!(compiler.generate_pack());
    }

    #[test]
    fn fixed_options_pin_the_language_level() {
        let options = probe_frontend::Options::from_options(CompilerHelper::fixed_options()).unwrap();
        assert_eq!(options.source(), LanguageLevel::PINNED);
        assert_eq!(options.target(), LanguageLevel::PINNED);
        assert_eq!(options.debug(), DebugInfo::Lines);
        assert!(options.lint_enabled(probe_frontend::LintCategory::Deprecation));
    }

    #[test]
    fn clean_source_yields_artifacts() {
        let compiler = Compiler::new(CompilerOptions::default());
        let mut err = Vec::new();
        let artifacts = compiler
            .compile_source("Hello.probe", "class Hello {}", &mut err, None, None)
            .unwrap()
            .unwrap();
        assert_eq!(artifacts.keys().collect::<Vec<_>>(), vec!["Hello"]);
        assert!(err.is_empty());
    }

    #[test]
    fn errors_yield_none_and_diagnostics() {
        let compiler = Compiler::new(CompilerOptions::default());
        let mut err = Vec::new();
        let result = compiler
            .compile_source("Bad.probe", "class Bad { void f() { g(); } }", &mut err, None, None)
            .unwrap();
        assert!(result.is_none());
        let text = String::from_utf8(err).unwrap();
        assert!(text.contains("Bad.probe:1: error: cannot find symbol"), "{text}");
    }
}
