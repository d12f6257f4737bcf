//! Compiler error types.
//!
//! Only failures that abort an invocation before or outside the frontend's
//! own reporting end up here. Problems in the compiled program are
//! diagnostics written to the caller's sink, and the compile entry points
//! signal them with `Ok(None)`.

use std::io;

use probe_frontend::FrontendError;
use probe_preprocess::PreprocessError;
use thiserror::Error;

/// Errors that abort a compile invocation or a configuration load.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Preprocessing an input failed (for example a missing include).
    #[error("Preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),

    /// The frontend itself failed. Passed through untranslated.
    #[error(transparent)]
    Frontend(#[from] FrontendError),

    /// Writing diagnostics to the caller's sink failed.
    #[error("Cannot write diagnostics: {0}")]
    Sink(#[source] io::Error),

    /// A rule table could not be loaded or names an unknown construct.
    #[error("Invalid policy: {0}")]
    Policy(String),

    /// A message catalog override could not be loaded.
    #[error("Invalid message catalog: {0}")]
    Messages(String),

    /// Configuration could not be assembled.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Result type for compiler operations.
pub type CompileResult<T> = Result<T, CompileError>;
