//! Compilation units: named pieces of content handed to or produced by the
//! frontend.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};
use url::Url;

/// Scheme used for units that do not correspond to a file on disk.
pub const MEMORY_SCHEME: &str = "mfm";

static FALLBACK_URI: LazyLock<Url> =
    LazyLock::new(|| Url::parse("mfm:///probe/probe_source").expect("static URI literal is valid"));

/// What a unit contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// Probe language source text.
    Source,
    /// Compiled binary artifact.
    Artifact,
    /// Anything else (listings, resources).
    Other,
}

impl UnitKind {
    /// File extension, including the dot, used for this kind on disk.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Source => ".probe",
            Self::Artifact => ".class",
            Self::Other => "",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Artifact => write!(f, "artifact"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Where a unit's content comes from.
#[derive(Clone, Debug)]
pub enum UnitOrigin {
    /// Read from disk each time the content is requested.
    File(PathBuf),
    /// Held in memory (raw text or preprocessor output).
    Text(Arc<str>),
}

/// An immutable, cheaply clonable compilation unit.
#[derive(Clone, Debug)]
pub struct CompilationUnit {
    name: String,
    kind: UnitKind,
    uri: Url,
    origin: UnitOrigin,
}

impl CompilationUnit {
    /// A unit backed by a file on disk. The name is the path as given.
    pub fn from_file(path: impl Into<PathBuf>, kind: UnitKind) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self {
            uri: to_uri(&name),
            name,
            kind,
            origin: UnitOrigin::File(path),
        }
    }

    /// A unit whose content is held in memory.
    pub fn from_text(name: impl Into<String>, text: impl Into<Arc<str>>, kind: UnitKind) -> Self {
        let name = name.into();
        Self {
            uri: to_uri(&name),
            name,
            kind,
            origin: UnitOrigin::Text(text.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn origin(&self) -> &UnitOrigin {
        &self.origin
    }

    /// Path on disk, for file-backed units.
    pub fn path(&self) -> Option<&Path> {
        match &self.origin {
            UnitOrigin::File(path) => Some(path),
            UnitOrigin::Text(_) => None,
        }
    }

    /// Character content. File-backed units must be valid UTF-8.
    pub fn char_content(&self) -> io::Result<Cow<'_, str>> {
        match &self.origin {
            UnitOrigin::Text(text) => Ok(Cow::Borrowed(text)),
            UnitOrigin::File(path) => fs::read_to_string(path).map(Cow::Owned),
        }
    }

    /// Raw byte content.
    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        match &self.origin {
            UnitOrigin::Text(text) => Ok(text.as_bytes().to_vec()),
            UnitOrigin::File(path) => fs::read(path),
        }
    }

    /// File stem of the unit name (`a/b/Probe.probe` → `Probe`).
    pub fn simple_name(&self) -> &str {
        let last = self.name.rsplit(['/', '\\']).next().unwrap_or(&self.name);
        last.split('.').next().unwrap_or(last)
    }
}

/// Identity of a unit name: a `file:` URI when the name is an existing
/// file, otherwise an `mfm:///` URI carrying the name.
pub fn to_uri(name: &str) -> Url {
    let path = Path::new(name);
    if path.exists() {
        if let Some(url) = std::path::absolute(path)
            .ok()
            .and_then(|abs| Url::from_file_path(abs).ok())
        {
            return url;
        }
    }
    let trimmed = name.trim_start_matches('/');
    Url::parse(&format!("{MEMORY_SCHEME}:///{trimmed}")).unwrap_or_else(|_| FALLBACK_URI.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_units_use_memory_scheme() {
        let unit = CompilationUnit::from_text("probes/Hello.probe", "class Hello {}", UnitKind::Source);
        assert_eq!(unit.uri().scheme(), MEMORY_SCHEME);
        assert_eq!(unit.uri().path(), "/probes/Hello.probe");
        assert_eq!(unit.char_content().unwrap(), "class Hello {}");
        assert_eq!(unit.simple_name(), "Hello");
        assert!(unit.path().is_none());
    }

    #[test]
    fn file_units_use_file_scheme_and_read_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lazy.probe");
        fs::write(&path, "class Lazy {}").unwrap();

        let unit = CompilationUnit::from_file(&path, UnitKind::Source);
        assert_eq!(unit.uri().scheme(), "file");
        assert_eq!(unit.simple_name(), "Lazy");

        fs::write(&path, "class Lazy { int x; }").unwrap();
        assert_eq!(unit.char_content().unwrap(), "class Lazy { int x; }");
        assert_eq!(unit.read_bytes().unwrap(), b"class Lazy { int x; }");
    }

    #[test]
    fn invalid_utf8_file_content_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Bad.probe");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        let unit = CompilationUnit::from_file(&path, UnitKind::Source);
        assert_eq!(unit.char_content().unwrap_err().kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn kind_extensions() {
        assert_eq!(UnitKind::Source.extension(), ".probe");
        assert_eq!(UnitKind::Artifact.extension(), ".class");
        assert_eq!(UnitKind::Other.extension(), "");
        assert_eq!(UnitKind::Artifact.to_string(), "artifact");
    }
}
