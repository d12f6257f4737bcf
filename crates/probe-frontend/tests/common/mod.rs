#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use probe_frontend::{
    CompilationUnit, Diagnostic, DiagnosticCollector, Frontend, FrontendOption, FrontendResult,
    Location, OutputSink, StandardUnitManager, TaskListener, UnitKind, UnitManager,
};

pub type Outputs = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

/// Reads inputs from disk, keeps artifacts in memory.
#[derive(Default)]
pub struct MemoryOutputs {
    inner: StandardUnitManager,
    pub outputs: Outputs,
}

struct BufferSink {
    name: String,
    buffer: Vec<u8>,
    outputs: Outputs,
}

impl Write for BufferSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputSink for BufferSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        self.outputs.lock().unwrap().insert(self.name, self.buffer);
        Ok(())
    }
}

impl UnitManager for MemoryOutputs {
    fn set_location(&mut self, location: Location, dirs: Vec<PathBuf>) -> FrontendResult<()> {
        self.inner.set_location(location, dirs)
    }

    fn location(&self, location: Location) -> Option<&[PathBuf]> {
        self.inner.location(location)
    }

    fn unit_for_input(
        &mut self,
        location: Location,
        type_name: &str,
        kind: UnitKind,
    ) -> FrontendResult<Option<CompilationUnit>> {
        self.inner.unit_for_input(location, type_name, kind)
    }

    fn output_for(
        &mut self,
        _location: Location,
        type_name: &str,
        _kind: UnitKind,
        _sibling: Option<&CompilationUnit>,
    ) -> FrontendResult<Box<dyn OutputSink>> {
        Ok(Box::new(BufferSink {
            name: type_name.to_string(),
            buffer: Vec::new(),
            outputs: Arc::clone(&self.outputs),
        }))
    }
}

pub struct Outcome {
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub artifacts: BTreeMap<String, Vec<u8>>,
}

impl Outcome {
    pub fn errors(&self) -> Vec<String> {
        self.diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| d.message.clone())
            .collect()
    }

    pub fn has_error(&self, fragment: &str) -> bool {
        self.errors().iter().any(|e| e.contains(fragment))
    }

    pub fn keys(&self) -> Vec<&str> {
        self.artifacts.keys().map(String::as_str).collect()
    }
}

pub fn compile_with(
    sources: &[(&str, &str)],
    options: Vec<FrontendOption>,
    listener: Option<Box<dyn TaskListener>>,
) -> Outcome {
    let frontend = Frontend::system();
    let mut manager = MemoryOutputs::default();
    let outputs = Arc::clone(&manager.outputs);
    let mut diagnostics = DiagnosticCollector::new();
    let units = sources
        .iter()
        .map(|(name, text)| CompilationUnit::from_text(*name, *text, UnitKind::Source))
        .collect();

    let success = {
        let mut task = frontend
            .task(&mut manager, &mut diagnostics, options, units)
            .unwrap();
        if let Some(listener) = listener {
            task.set_task_listener(listener);
        }
        task.call().unwrap()
    };
    let artifacts = outputs.lock().unwrap().clone();
    Outcome {
        success,
        diagnostics: diagnostics.into_diagnostics(),
        artifacts,
    }
}

pub fn compile(sources: &[(&str, &str)]) -> Outcome {
    compile_with(sources, Vec::new(), None)
}
