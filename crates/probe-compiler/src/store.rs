//! In-memory unit store.
//!
//! [`MemoryUnitStore`] sits between the frontend and a
//! [`StandardUnitManager`]. Source units pass through the preprocessor on
//! their way in, and generated artifacts are captured in a shared map on
//! their way out instead of being written to disk.

use std::fmt;
use std::io::{self, Write};
use std::mem;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use probe_frontend::{
    ArtifactMap, CompilationUnit, FrontendResult, Location, OutputSink, StandardUnitManager,
    UnitKind, UnitManager,
};
use probe_preprocess::{PreprocessError, PreprocessResult, Preprocessor, SearchPath};
use tracing::{debug, trace};

/// Live handle to the artifact map of the current invocation.
pub type SharedArtifacts = Arc<Mutex<ArtifactMap>>;

fn lock(map: &SharedArtifacts) -> MutexGuard<'_, ArtifactMap> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Forwarding unit manager with preprocessing on input and in-memory
/// capture of artifacts on output.
pub struct MemoryUnitStore {
    inner: StandardUnitManager,
    search_path: Option<SearchPath>,
    artifacts: SharedArtifacts,
    deferred: Option<PreprocessError>,
}

impl MemoryUnitStore {
    /// `search_path` of `None` disables preprocessing entirely.
    pub fn new(inner: StandardUnitManager, search_path: Option<SearchPath>) -> Self {
        Self {
            inner,
            search_path,
            artifacts: SharedArtifacts::default(),
            deferred: None,
        }
    }

    pub fn search_path(&self) -> Option<&SearchPath> {
        self.search_path.as_ref()
    }

    /// A text-backed source unit, preprocessed when a search path is given.
    pub fn wrap(
        name: &str,
        text: &str,
        search_path: Option<&SearchPath>,
    ) -> PreprocessResult<CompilationUnit> {
        let text = match search_path {
            Some(search_path) => Preprocessor::new(search_path).run(text.as_bytes(), name)?,
            None => text.to_string(),
        };
        Ok(CompilationUnit::from_text(name, text, UnitKind::Source))
    }

    /// Preprocess an existing unit. Without a search path the unit is
    /// returned unchanged.
    pub fn adapt(
        unit: CompilationUnit,
        search_path: Option<&SearchPath>,
    ) -> PreprocessResult<CompilationUnit> {
        let Some(search_path) = search_path else {
            return Ok(unit);
        };
        let bytes = unit.read_bytes()?;
        let text = String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let processed = Preprocessor::new(search_path).run(text.as_bytes(), unit.name())?;
        trace!(unit = unit.name(), "Preprocessed unit");
        Ok(CompilationUnit::from_text(unit.name(), processed, unit.kind()))
    }

    /// The artifact map of the current invocation.
    pub fn artifacts(&self) -> SharedArtifacts {
        Arc::clone(&self.artifacts)
    }

    /// Move the captured artifacts out, leaving the map empty.
    pub fn take_artifacts(&self) -> ArtifactMap {
        mem::take(&mut *lock(&self.artifacts))
    }

    /// The preprocessing failure behind the last `unit_for_input` error,
    /// if that is what it was.
    pub fn take_deferred_error(&mut self) -> Option<PreprocessError> {
        self.deferred.take()
    }
}

impl fmt::Debug for MemoryUnitStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryUnitStore")
            .field("search_path", &self.search_path)
            .field("artifacts", &lock(&self.artifacts).len())
            .finish()
    }
}

impl UnitManager for MemoryUnitStore {
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
        let Some(unit) = self.inner.unit_for_input(location, type_name, kind)? else {
            return Ok(None);
        };
        if unit.kind() != UnitKind::Source {
            return Ok(Some(unit));
        }
        match Self::adapt(unit, self.search_path.as_ref()) {
            Ok(unit) => Ok(Some(unit)),
            Err(err) => {
                debug!(type_name, error = %err, "Preprocessing a source path unit failed");
                let io = io::Error::new(err.io_kind(), err.to_string());
                self.deferred = Some(err);
                Err(io.into())
            }
        }
    }

    fn output_for(
        &mut self,
        location: Location,
        type_name: &str,
        kind: UnitKind,
        sibling: Option<&CompilationUnit>,
    ) -> FrontendResult<Box<dyn OutputSink>> {
        if kind == UnitKind::Artifact {
            return Ok(Box::new(ArtifactSink::new(type_name, self.artifacts())));
        }
        self.inner.output_for(location, type_name, kind, sibling)
    }

    fn flush(&mut self) -> FrontendResult<()> {
        self.inner.flush()
    }

    /// Start over with an empty artifact map. Sinks still open commit to
    /// the old map.
    fn close(&mut self) -> FrontendResult<()> {
        self.artifacts = SharedArtifacts::default();
        self.deferred = None;
        Ok(())
    }
}

/// In-memory artifact output. The bytes are published into the map under
/// the sink's name on `close` or, failing that, when the sink is dropped.
pub struct ArtifactSink {
    name: String,
    buffer: Vec<u8>,
    target: SharedArtifacts,
    committed: bool,
}

impl ArtifactSink {
    pub fn new(name: impl Into<String>, target: SharedArtifacts) -> Self {
        Self {
            name: name.into(),
            buffer: Vec::new(),
            target,
            committed: false,
        }
    }

    fn commit(&mut self) {
        if self.committed {
            return;
        }
        self.committed = true;
        let bytes = mem::take(&mut self.buffer);
        trace!(binary_name = %self.name, len = bytes.len(), "Captured artifact");
        lock(&self.target).insert(self.name.clone(), bytes);
    }
}

impl Write for ArtifactSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputSink for ArtifactSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn close(mut self: Box<Self>) -> io::Result<()> {
        self.commit();
        Ok(())
    }
}

impl Drop for ArtifactSink {
    fn drop(&mut self) {
        self.commit();
    }
}
