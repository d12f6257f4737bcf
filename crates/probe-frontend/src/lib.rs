//! # probe-frontend
//!
//! Frontend for the probe language: a small class-based language with
//! packages, imports, nested classes, fields and methods.
//!
//! A [`CompilationTask`] runs four phases over its units and fires a
//! [`TaskEvent`] around each step:
//!
//! 1. **parse** each unit into a [`UnitTree`];
//! 2. **enter** declarations into the symbol table;
//! 3. **analyze** each top-level type: resolve names and types, check
//!    the bodies, run lints;
//! 4. **generate** one artifact per top-level and nested type, written
//!    through the task's [`UnitManager`]. Skipped when analysis reported
//!    errors.
//!
//! Problems in the compiled program are [`Diagnostic`]s delivered to the
//! task's [`DiagnosticListener`]. [`FrontendError`] is reserved for
//! failures of the frontend itself.
//!
//! ```rust,no_run
//! use probe_frontend::{CompilationUnit, DiagnosticCollector, Frontend, UnitKind};
//!
//! let frontend = Frontend::system();
//! let mut manager = frontend.standard_manager();
//! let mut diagnostics = DiagnosticCollector::new();
//! let unit = CompilationUnit::from_text("Hello.probe", "class Hello {}", UnitKind::Source);
//! let mut task = frontend
//!     .task(&mut manager, &mut diagnostics, Vec::new(), vec![unit])
//!     .unwrap();
//! assert!(task.call().unwrap());
//! ```

#![deny(unsafe_code)]

pub mod artifact;
pub mod ast;
mod attr;
pub mod codegen;
pub mod diagnostic;
pub mod error;
pub mod event;
pub mod lexer;
pub mod manager;
pub mod options;
pub mod parser;
mod session;
pub mod symbols;
pub mod task;
pub mod unit;

pub use artifact::{ArtifactMap, ClassFile};
pub use ast::{AnnotationArg, ClassDecl, DeclId, Expr, ExprKind, Literal, Span, UnitTree, Visitor};
pub use codegen::Op;
pub use diagnostic::{Diagnostic, DiagnosticCollector, DiagnosticListener, Log, Severity};
pub use error::{FrontendError, FrontendResult};
pub use event::{Context, Plugin, TaskEvent, TaskEventKind, TaskListener};
pub use manager::{Location, OutputSink, StandardUnitManager, UnitManager};
pub use options::{DebugInfo, FrontendOption, LanguageLevel, LintCategory, LintSet, Options};
pub use symbols::TypeSymbol;
pub use task::{CompilationTask, Frontend};
pub use unit::{CompilationUnit, UnitKind, UnitOrigin, MEMORY_SCHEME};
