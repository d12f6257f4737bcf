//! Unit managers: where the frontend reads inputs from and writes outputs
//! to.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::FrontendResult;
use crate::unit::{CompilationUnit, UnitKind};

/// Search or output location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    /// Sources resolved on demand during analysis.
    SourcePath,
    /// Compiled artifacts of dependencies.
    ClassPath,
    /// Where generated artifacts go.
    ClassOutput,
    /// Where generated sources go.
    SourceOutput,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourcePath => write!(f, "source path"),
            Self::ClassPath => write!(f, "class path"),
            Self::ClassOutput => write!(f, "class output"),
            Self::SourceOutput => write!(f, "source output"),
        }
    }
}

/// Writable destination for one generated output. Bytes become visible
/// only once the sink is closed.
pub trait OutputSink: Write + Send {
    /// Logical name of the output (binary type name for artifacts).
    fn name(&self) -> &str;

    /// Commit the written bytes.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Provider of inputs and consumer of outputs for a task.
pub trait UnitManager {
    fn set_location(&mut self, location: Location, dirs: Vec<PathBuf>) -> FrontendResult<()>;

    fn location(&self, location: Location) -> Option<&[PathBuf]>;

    /// Find the unit for a type name (`a.b.C`, or a binary name for
    /// artifacts) in a search location.
    fn unit_for_input(
        &mut self,
        location: Location,
        type_name: &str,
        kind: UnitKind,
    ) -> FrontendResult<Option<CompilationUnit>>;

    /// Open a sink for an output named by `type_name`. `sibling` is the
    /// unit the output was generated from.
    fn output_for(
        &mut self,
        location: Location,
        type_name: &str,
        kind: UnitKind,
        sibling: Option<&CompilationUnit>,
    ) -> FrontendResult<Box<dyn OutputSink>>;

    fn flush(&mut self) -> FrontendResult<()> {
        Ok(())
    }

    fn close(&mut self) -> FrontendResult<()> {
        Ok(())
    }
}

/// Filesystem-backed manager.
#[derive(Clone, Debug, Default)]
pub struct StandardUnitManager {
    locations: HashMap<Location, Vec<PathBuf>>,
}

impl StandardUnitManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// File-backed units for the given paths. The kind follows the
    /// extension.
    pub fn units_for_paths<I, P>(&self, paths: I) -> Vec<CompilationUnit>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .map(|p| {
                let path = p.as_ref();
                CompilationUnit::from_file(path, kind_of(path))
            })
            .collect()
    }

    /// Directories searched for `location`. Sources fall back to the class
    /// path when no source path is set.
    fn search_dirs(&self, location: Location) -> &[PathBuf] {
        match (location, self.locations.get(&location)) {
            (_, Some(dirs)) => dirs,
            (Location::SourcePath, None) => self
                .locations
                .get(&Location::ClassPath)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            _ => &[],
        }
    }
}

impl UnitManager for StandardUnitManager {
    fn set_location(&mut self, location: Location, dirs: Vec<PathBuf>) -> FrontendResult<()> {
        self.locations.insert(location, dirs);
        Ok(())
    }

    fn location(&self, location: Location) -> Option<&[PathBuf]> {
        self.locations.get(&location).map(Vec::as_slice)
    }

    fn unit_for_input(
        &mut self,
        location: Location,
        type_name: &str,
        kind: UnitKind,
    ) -> FrontendResult<Option<CompilationUnit>> {
        let relative = relative_path(type_name, kind);
        let found = self
            .search_dirs(location)
            .iter()
            .map(|dir| dir.join(&relative))
            .find(|candidate| candidate.is_file());
        if let Some(path) = &found {
            debug!(%location, type_name, path = %path.display(), "Resolved input unit");
        }
        Ok(found.map(|path| CompilationUnit::from_file(path, kind)))
    }

    fn output_for(
        &mut self,
        location: Location,
        type_name: &str,
        kind: UnitKind,
        sibling: Option<&CompilationUnit>,
    ) -> FrontendResult<Box<dyn OutputSink>> {
        let path = match self.locations.get(&location).and_then(|dirs| dirs.first()) {
            Some(dir) => dir.join(relative_path(type_name, kind)),
            None => {
                // No output directory: next to the originating file.
                let file_name = format!("{}{}", type_name.rsplit('.').next().unwrap_or(type_name), kind.extension());
                sibling
                    .and_then(CompilationUnit::path)
                    .and_then(Path::parent)
                    .map(|dir| dir.join(&file_name))
                    .unwrap_or_else(|| PathBuf::from(file_name))
            }
        };
        Ok(Box::new(FileSink {
            name: type_name.to_string(),
            path,
            buffer: Vec::new(),
        }))
    }
}

/// `a.b.C` → `a/b/C.probe`. Binary names keep their `$`.
fn relative_path(type_name: &str, kind: UnitKind) -> PathBuf {
    let mut path: PathBuf = type_name.split('.').collect();
    let file = format!("{}{}", type_name.rsplit('.').next().unwrap_or(type_name), kind.extension());
    path.set_file_name(file);
    path
}

fn kind_of(path: &Path) -> UnitKind {
    match path.extension().and_then(|e| e.to_str()) {
        Some("probe") => UnitKind::Source,
        Some("class") => UnitKind::Artifact,
        _ => UnitKind::Other,
    }
}

/// Sink writing its buffer to a file on close.
struct FileSink {
    name: String,
    path: PathBuf,
    buffer: Vec<u8>,
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, &self.buffer)
    }
}
