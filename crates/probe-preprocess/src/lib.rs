//! # probe-preprocess
//!
//! Text layer that runs before probe sources reach the language frontend.
//!
//! Two stages are stacked on top of any line-buffered reader:
//!
//! - [`ConcatenatingReader`] joins backslash-continued lines and
//!   normalises line terminators to the platform separator.
//! - [`Preprocessor`] expands `#include` directives against a
//!   [`SearchPath`] (first entry wins) and evaluates the small set of
//!   C-style directives probe sources may use (`#define`, `#undef`,
//!   `#ifdef`, `#ifndef`, `#else`, `#endif`).
//!
//! ```rust
//! use probe_preprocess::{preprocess_str, SearchPath, LINE_SEPARATOR};
//!
//! let out = preprocess_str("int a = \\\n  1;", "Demo.probe", &SearchPath::default()).unwrap();
//! assert_eq!(out, format!("int a =   1;{LINE_SEPARATOR}"));
//! ```

#![deny(unsafe_code)]

pub mod concat;
pub mod error;
pub mod preprocessor;
pub mod search_path;

pub use concat::ConcatenatingReader;
pub use error::{PreprocessError, PreprocessResult};
pub use preprocessor::{preprocess_str, Preprocessor, DEFAULT_MAX_INCLUDE_DEPTH};
pub use search_path::SearchPath;

/// Line terminator appended to every logical line of output.
#[cfg(windows)]
pub const LINE_SEPARATOR: &str = "\r\n";

/// Line terminator appended to every logical line of output.
#[cfg(not(windows))]
pub const LINE_SEPARATOR: &str = "\n";
