//! Frontend error types.
//!
//! These cover failures of the frontend itself (I/O, misuse of the task
//! API). Problems in the program being compiled are never errors here; they
//! are reported as [`Diagnostic`](crate::Diagnostic)s.

use std::io;
use thiserror::Error;

/// Errors that abort a frontend task.
#[derive(Debug, Error)]
pub enum FrontendError {
    /// Reading an input or writing an output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The option set handed to the task is inconsistent.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// A second task listener was put into an occupied context slot.
    #[error("Task listener slot already occupied; compose listeners instead of replacing them")]
    DuplicateListener,

    /// A task was called twice.
    #[error("Task has already been called")]
    AlreadyCalled,

    /// Bytes handed to the artifact reader are not an artifact.
    #[error("Malformed artifact: {0}")]
    MalformedArtifact(String),

    /// A plugin failed to initialise.
    #[error("Plugin '{name}' failed to initialise: {message}")]
    PluginInit { name: String, message: String },
}

/// Result type for frontend operations.
pub type FrontendResult<T> = Result<T, FrontendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let err: FrontendError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, FrontendError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn plugin_error_names_plugin() {
        let err = FrontendError::PluginInit {
            name: "verifier".into(),
            message: "bad policy".into(),
        };
        assert_eq!(
            err.to_string(),
            "Plugin 'verifier' failed to initialise: bad policy"
        );
    }
}
