//! Preprocessor error types.

use std::io;
use thiserror::Error;

/// Errors raised while preprocessing a source stream.
///
/// Every variant aborts the invocation that asked for preprocessing; the
/// frontend never sees partially preprocessed text.
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// An `#include` target was not found on any search path entry.
    #[error("{origin}: file not found: {name}")]
    FileNotFound { name: String, origin: String },

    /// A directive name the preprocessor does not understand.
    #[error("{origin}:{line}: unknown directive '#{directive}'")]
    UnknownDirective {
        directive: String,
        origin: String,
        line: usize,
    },

    /// A known directive with a missing or malformed operand.
    #[error("{origin}:{line}: malformed directive: {message}")]
    MalformedDirective {
        message: String,
        origin: String,
        line: usize,
    },

    /// `#else`/`#endif` without an opening conditional, or an
    /// unterminated conditional at end of input.
    #[error("{origin}:{line}: unbalanced conditional: {message}")]
    UnbalancedConditional {
        message: String,
        origin: String,
        line: usize,
    },

    /// Nested includes went deeper than the configured limit.
    #[error("{origin}: include depth limit of {limit} exceeded (include cycle?)")]
    IncludeDepthExceeded { origin: String, limit: usize },

    /// Underlying read failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PreprocessError {
    /// The I/O error kind this failure maps onto.
    pub fn io_kind(&self) -> io::ErrorKind {
        match self {
            Self::FileNotFound { .. } => io::ErrorKind::NotFound,
            Self::Io(e) => e.kind(),
            _ => io::ErrorKind::InvalidData,
        }
    }

    /// Whether this is the "include target not found" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound { .. })
    }
}

impl From<PreprocessError> for io::Error {
    fn from(err: PreprocessError) -> Self {
        match err {
            PreprocessError::Io(e) => e,
            other => io::Error::new(other.io_kind(), other.to_string()),
        }
    }
}

/// Result type for preprocessing operations.
pub type PreprocessResult<T> = Result<T, PreprocessError>;
