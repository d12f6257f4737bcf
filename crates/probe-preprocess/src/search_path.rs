//! Ordered include search path.

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Ordered list of directories used to resolve `#include` targets.
///
/// Whether preprocessing happens at all is decided by the caller holding an
/// `Option<SearchPath>`: `None` means sources are passed through untouched,
/// while `Some(SearchPath::default())` still preprocesses (continuation
/// lines, conditionals) but cannot resolve any include.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    /// Build a search path from directories, in priority order.
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a platform path-separator-delimited list (`:` on Unix, `;` on
    /// Windows). Empty segments are ignored.
    pub fn parse(joined: impl AsRef<OsStr>) -> Self {
        Self {
            dirs: std::env::split_paths(joined.as_ref())
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
        }
    }

    /// Directories in resolution order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Resolve `name` against each directory in order; the first existing
    /// regular file wins.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        if relative.is_absolute() {
            return relative.is_file().then(|| relative.to_path_buf());
        }
        self.dirs
            .iter()
            .map(|dir| dir.join(relative))
            .find(|candidate| candidate.is_file())
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for SearchPath {
    fn from_iter<T: IntoIterator<Item = P>>(iter: T) -> Self {
        Self::new(iter)
    }
}
