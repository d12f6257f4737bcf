//! The frontend entry point and compilation tasks.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use tracing::{debug, info};

use crate::attr::Attr;
use crate::codegen;
use crate::diagnostic::{Diagnostic, DiagnosticListener, Log};
use crate::error::{FrontendError, FrontendResult};
use crate::event::{Context, Plugin, TaskEvent, TaskEventKind, TaskListener};
use crate::manager::{Location, StandardUnitManager, UnitManager};
use crate::options::{FrontendOption, Options};
use crate::session::Session;
use crate::symbols::SymbolOrigin;
use crate::unit::{CompilationUnit, UnitKind};

/// Handle to the probe language frontend.
#[derive(Clone, Copy, Debug, Default)]
pub struct Frontend {
    _private: (),
}

impl Frontend {
    /// The frontend shipped with this crate.
    pub fn system() -> Self {
        Self::default()
    }

    /// A fresh filesystem-backed unit manager.
    pub fn standard_manager(&self) -> StandardUnitManager {
        StandardUnitManager::new()
    }

    /// Create a task compiling `units`. Options are validated here;
    /// nothing runs until [`CompilationTask::call`].
    pub fn task<'a>(
        &self,
        manager: &'a mut dyn UnitManager,
        diagnostics: &'a mut dyn DiagnosticListener,
        options: impl IntoIterator<Item = FrontendOption>,
        units: Vec<CompilationUnit>,
    ) -> FrontendResult<CompilationTask<'a>> {
        let options = Options::from_options(options)?;
        Ok(CompilationTask {
            manager: Some(manager),
            diagnostics: Some(diagnostics),
            options,
            units,
            listener: None,
            plugins: Vec::new(),
        })
    }
}

/// One run of the frontend over a fixed set of units. A task can be
/// called once.
pub struct CompilationTask<'a> {
    manager: Option<&'a mut dyn UnitManager>,
    diagnostics: Option<&'a mut dyn DiagnosticListener>,
    options: Options,
    units: Vec<CompilationUnit>,
    listener: Option<Box<dyn TaskListener>>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl<'a> CompilationTask<'a> {
    /// Install the task listener, replacing any previous one.
    pub fn set_task_listener(&mut self, listener: Box<dyn TaskListener>) {
        self.listener = Some(listener);
    }

    /// Register a plugin, initialised when the task is called.
    pub fn add_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Run every phase. Returns `true` when no error was reported.
    ///
    /// Artifacts are written only when analysis reported no errors.
    pub fn call(&mut self) -> FrontendResult<bool> {
        let (Some(manager), Some(diagnostics)) = (self.manager.take(), self.diagnostics.take())
        else {
            return Err(FrontendError::AlreadyCalled);
        };

        if let Some(dirs) = self.options.source_path() {
            manager.set_location(Location::SourcePath, dirs.to_vec())?;
        }
        if let Some(dirs) = self.options.class_path() {
            manager.set_location(Location::ClassPath, dirs.to_vec())?;
        }

        let mut cx = Context::new(self.options.clone(), self.listener.take());
        for plugin in &self.plugins {
            debug!(plugin = plugin.name(), "Initialising plugin");
            plugin.init(&mut cx)?;
        }
        let (options, listener) = cx.into_parts();

        let mut session = Session::new(options, manager, listener, Log::new(diagnostics));
        let units = std::mem::take(&mut self.units);
        info!(units = units.len(), "Compilation task started");

        let mut parsed = Vec::with_capacity(units.len());
        for unit in units {
            if let Some(tree) = session.parse(&unit)? {
                parsed.push((unit, tree));
            }
        }
        for (unit, tree) in parsed {
            session.enter(unit, tree);
        }

        let mut analyzed = Vec::new();
        while let Some((unit, decl)) = session.todo.pop_front() {
            let entry = &session.sources[unit];
            let mut event = TaskEvent::new(TaskEventKind::Analyze, entry.unit.name())
                .with_unit(Arc::clone(&entry.tree));
            if let Some(symbol) = session.type_symbol(unit, decl) {
                event = event.with_type(symbol);
            }
            session.started(&event);
            Attr::attribute_top(&mut session, unit, decl)?;
            session.finished(&event);
            analyzed.push((unit, event));
        }

        report_deprecated_uses(&mut session);

        if session.log.error_count() == 0 {
            for (unit, analyze) in analyzed {
                let Some(symbol) = analyze.type_symbol.clone() else {
                    continue;
                };
                let owned = matches!(
                    session.symbols.get(&symbol.binary_name).map(|c| c.origin),
                    Some(SymbolOrigin::Source { decl, .. }) if decl == symbol.decl
                );
                if !owned {
                    continue;
                }
                let mut event = TaskEvent::new(TaskEventKind::Generate, analyze.source_name)
                    .with_type(symbol.clone());
                if let Some(tree) = analyze.unit {
                    event = event.with_unit(tree);
                }
                session.started(&event);
                generate_type(&mut session, unit, &symbol.binary_name, symbol.decl)?;
                session.finished(&event);
            }
        }

        session.manager.flush()?;
        let errors = session.log.error_count();
        info!(
            errors,
            warnings = session.log.warning_count(),
            "Compilation task finished"
        );
        Ok(errors == 0)
    }
}

fn generate_type(
    session: &mut Session<'_>,
    unit: usize,
    binary: &str,
    decl: crate::ast::DeclId,
) -> FrontendResult<()> {
    let tree = Arc::clone(&session.sources[unit].tree);
    let Some(class) = tree.find_type(decl) else {
        return Ok(());
    };
    for (name, bytes) in codegen::generate(class, binary, &session.symbols, &session.options)? {
        let sibling = &session.sources[unit].unit;
        let mut sink =
            session
                .manager
                .output_for(Location::ClassOutput, &name, UnitKind::Artifact, Some(sibling))?;
        sink.write_all(&bytes)?;
        sink.close()?;
        debug!(binary_name = %name, len = bytes.len(), "Wrote artifact");
    }
    Ok(())
}

/// Summary notes for deprecated uses that were not reported one by one.
fn report_deprecated_uses(session: &mut Session<'_>) {
    let uses = std::mem::take(&mut session.deprecated_uses);
    let subject = match uses.len() {
        0 => return,
        1 => uses
            .iter()
            .next()
            .map(|source| format!("{source} uses"))
            .unwrap_or_default(),
        _ => "Some input files use".to_string(),
    };
    session
        .log
        .report(Diagnostic::note(format!("{subject} or overrides a deprecated API.")));
    session
        .log
        .report(Diagnostic::note("Recompile with the deprecation lint for details."));
}

impl fmt::Debug for CompilationTask<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilationTask")
            .field("options", &self.options)
            .field("units", &self.units.len())
            .field("plugins", &self.plugins.len())
            .field("called", &self.manager.is_none())
            .finish()
    }
}
