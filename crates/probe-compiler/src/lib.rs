//! # probe-compiler
//!
//! In-memory compilation of probe sources with a safety verifier.
//!
//! - [`Compiler`] runs the frontend over sources or files and returns the
//!   generated artifacts keyed by binary type name, never touching disk.
//! - [`MemoryUnitStore`] preprocesses sources (includes, macros, line
//!   continuation) on their way into the frontend, including sibling
//!   sources the frontend pulls from the source path.
//! - [`Verifier`] is a frontend plugin that rejects classes using
//!   constructs forbidden by a [`RestrictedPolicy`], unless the class is
//!   marked `trusted = true`.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use probe_compiler::{Compiler, CompilerOptions, Verifier};
//!
//! let verifier = Arc::new(Verifier::baseline());
//! let compiler = Compiler::new(CompilerOptions::default()).with_plugin(verifier.clone());
//! let mut err = Vec::new();
//! let artifacts = compiler
//!     .compile_source("Probe.probe", "class Probe {}", &mut err, None, None)
//!     .unwrap();
//! assert!(artifacts.is_some());
//! assert_eq!(verifier.class_names(), vec!["Probe"]);
//! ```

#![deny(unsafe_code)]

pub mod compiler;
pub mod config;
pub mod error;
pub mod messages;
pub mod store;
pub mod verifier;

pub use compiler::{Compiler, CompilerHelper, CompilerOptions, PhaseTracer};
pub use config::{CompilerConfig, LoggingConfig};
pub use error::{CompileError, CompileResult};
pub use messages::MessageCatalog;
pub use store::{ArtifactSink, MemoryUnitStore, SharedArtifacts};
pub use verifier::{
    Construct, RestrictedPolicy, RuleTable, TaskListeners, Trust, TrustValue, Verifier,
    Violation,
};

pub use probe_frontend::ArtifactMap;
