//! Typed frontend options.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FrontendError, FrontendResult};

/// Language feature level, used both for accepted source syntax and for
/// the artifact format version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LanguageLevel {
    /// Original language: no `for` statements.
    V1,
    /// Adds `for` statements.
    V2,
}

impl LanguageLevel {
    pub const LATEST: LanguageLevel = LanguageLevel::V2;

    /// Level the compiler driver pins both source and target to, so that
    /// verification sees the same syntax regardless of frontend defaults.
    pub const PINNED: LanguageLevel = LanguageLevel::V2;

    /// Numeric code stored in artifacts.
    pub fn code(self) -> u16 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            _ => None,
        }
    }
}

impl fmt::Display for LanguageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for LanguageLevel {
    type Err = FrontendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u16>()
            .ok()
            .and_then(Self::from_code)
            .ok_or_else(|| FrontendError::InvalidOption(format!("unknown language level '{s}'")))
    }
}

/// Optional warning categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LintCategory {
    /// Use of a type marked `@Deprecated`.
    Deprecation,
    /// Empty statement as the body of `if`/`while`/`for`.
    Empty,
}

impl LintCategory {
    pub const ALL: [LintCategory; 2] = [LintCategory::Deprecation, LintCategory::Empty];
}

impl fmt::Display for LintCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deprecation => write!(f, "deprecation"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// Which lint categories to enable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LintSet {
    All,
    Only(Vec<LintCategory>),
}

/// Debug metadata emitted into artifacts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugInfo {
    #[default]
    None,
    /// Line number tables for every method.
    Lines,
}

/// A single option as handed to [`Frontend::task`](crate::Frontend::task).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrontendOption {
    Lint(LintSet),
    Debug(DebugInfo),
    /// Report each use of a deprecated type instead of a summary note.
    Deprecation,
    Source(LanguageLevel),
    Target(LanguageLevel),
    /// Platform path-separator-delimited source search path.
    SourcePath(String),
    /// Platform path-separator-delimited artifact search path.
    ClassPath(String),
}

/// Resolved option set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    lints: BTreeSet<LintCategory>,
    debug: DebugInfo,
    source: LanguageLevel,
    target: LanguageLevel,
    source_path: Option<Vec<PathBuf>>,
    class_path: Option<Vec<PathBuf>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            lints: BTreeSet::new(),
            debug: DebugInfo::None,
            source: LanguageLevel::LATEST,
            target: LanguageLevel::LATEST,
            source_path: None,
            class_path: None,
        }
    }
}

impl Options {
    /// Resolve a list of options. Later options override earlier ones.
    pub fn from_options<I>(options: I) -> FrontendResult<Self>
    where
        I: IntoIterator<Item = FrontendOption>,
    {
        let mut resolved = Self::default();
        for option in options {
            match option {
                FrontendOption::Lint(LintSet::All) => resolved.lints.extend(LintCategory::ALL),
                FrontendOption::Lint(LintSet::Only(categories)) => resolved.lints.extend(categories),
                FrontendOption::Debug(debug) => resolved.debug = debug,
                FrontendOption::Deprecation => {
                    resolved.lints.insert(LintCategory::Deprecation);
                }
                FrontendOption::Source(level) => resolved.source = level,
                FrontendOption::Target(level) => resolved.target = level,
                FrontendOption::SourcePath(path) => resolved.source_path = Some(split(&path)),
                FrontendOption::ClassPath(path) => resolved.class_path = Some(split(&path)),
            }
        }
        if resolved.target < resolved.source {
            return Err(FrontendError::InvalidOption(format!(
                "target level {} is older than source level {}",
                resolved.target, resolved.source
            )));
        }
        Ok(resolved)
    }

    pub fn lint_enabled(&self, category: LintCategory) -> bool {
        self.lints.contains(&category)
    }

    pub fn debug(&self) -> DebugInfo {
        self.debug
    }

    pub fn source(&self) -> LanguageLevel {
        self.source
    }

    pub fn target(&self) -> LanguageLevel {
        self.target
    }

    pub fn source_path(&self) -> Option<&[PathBuf]> {
        self.source_path.as_deref()
    }

    pub fn class_path(&self) -> Option<&[PathBuf]> {
        self.class_path.as_deref()
    }
}

fn split(joined: &str) -> Vec<PathBuf> {
    std::env::split_paths(joined)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}
