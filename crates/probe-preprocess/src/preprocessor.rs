//! Directive processing.
//!
//! The preprocessor reads the output of a [`ConcatenatingReader`] one
//! logical line at a time. Lines whose first non-blank character is `#` are
//! directives; everything else is copied to the output after macro
//! substitution, unless an enclosing conditional is inactive.
//!
//! Directive and suppressed lines are replaced by empty lines, so a file
//! without continuations or includes keeps its line numbering. Each
//! continuation join removes one line break, and an `#include` line is
//! replaced by the preprocessed content of the target, so lines after
//! either are shifted in the output.
//!
//! Comments are tracked only to keep them out of macro substitution and to
//! ignore `#` lines inside a block comment; they are copied through as is.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};

use tracing::{debug, trace};

use crate::concat::ConcatenatingReader;
use crate::error::{PreprocessError, PreprocessResult};
use crate::search_path::SearchPath;
use crate::LINE_SEPARATOR;

/// Nesting limit for `#include`, guarding against include cycles.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

/// One open `#ifdef`/`#ifndef` block.
#[derive(Clone, Copy, Debug)]
struct Conditional {
    /// Whether lines in the current branch are emitted.
    active: bool,
    /// Whether the enclosing context was emitting at the time of `#if…`.
    parent_active: bool,
    seen_else: bool,
    opened_at: usize,
}

/// Expands includes and evaluates directives over a source stream.
#[derive(Clone, Debug)]
pub struct Preprocessor<'a> {
    search_path: &'a SearchPath,
    defines: BTreeMap<String, String>,
    max_include_depth: usize,
}

impl<'a> Preprocessor<'a> {
    /// Create a preprocessor resolving includes against `search_path`.
    pub fn new(search_path: &'a SearchPath) -> Self {
        Self {
            search_path,
            defines: BTreeMap::new(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }

    /// Override the include nesting limit.
    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Predefine an object-like macro.
    pub fn define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.insert(name.into(), value.into());
        self
    }

    /// Macros currently defined, including those defined by processed input.
    pub fn defines(&self) -> &BTreeMap<String, String> {
        &self.defines
    }

    /// Preprocess `input`, naming it `source_name` in errors.
    pub fn run<R: BufRead>(&mut self, input: R, source_name: &str) -> PreprocessResult<String> {
        let mut out = String::new();
        self.process(input, source_name, 0, &mut out)?;
        Ok(out)
    }

    fn process<R: BufRead>(
        &mut self,
        input: R,
        source_name: &str,
        depth: usize,
        out: &mut String,
    ) -> PreprocessResult<()> {
        let mut lines = BufReader::new(ConcatenatingReader::new(input));
        let mut conditionals: Vec<Conditional> = Vec::new();
        let mut line = String::new();
        let mut line_no = 0usize;
        let mut in_comment = false;

        loop {
            line.clear();
            if lines.read_line(&mut line)? == 0 {
                break;
            }
            line_no += 1;
            let text = line.trim_end_matches(['\n', '\r']);
            let active = conditionals.last().map_or(true, |c| c.active);

            let directive = if in_comment {
                None
            } else {
                text.trim_start().strip_prefix('#')
            };
            let Some(directive) = directive else {
                let substituted = self.substitute(text, &mut in_comment);
                if active {
                    out.push_str(&substituted);
                }
                out.push_str(LINE_SEPARATOR);
                continue;
            };

            let directive = directive.trim();
            let (name, operand) = match directive.find(char::is_whitespace) {
                Some(split) => (&directive[..split], directive[split..].trim()),
                None => (directive, ""),
            };

            match name {
                "ifdef" | "ifndef" => {
                    let macro_name = require_identifier(operand, name, source_name, line_no)?;
                    let defined = self.defines.contains_key(macro_name);
                    let taken = if name == "ifdef" { defined } else { !defined };
                    conditionals.push(Conditional {
                        active: active && taken,
                        parent_active: active,
                        seen_else: false,
                        opened_at: line_no,
                    });
                }
                "else" => {
                    let Some(top) = conditionals.last_mut() else {
                        return Err(unbalanced("#else without #ifdef/#ifndef", source_name, line_no));
                    };
                    if top.seen_else {
                        return Err(unbalanced("duplicate #else", source_name, line_no));
                    }
                    top.seen_else = true;
                    top.active = top.parent_active && !top.active;
                }
                "endif" => {
                    if conditionals.pop().is_none() {
                        return Err(unbalanced("#endif without #ifdef/#ifndef", source_name, line_no));
                    }
                }
                _ if !active => {
                    // Directives inside a suppressed branch are not evaluated.
                }
                "define" => {
                    let (macro_name, value) = match operand.find(char::is_whitespace) {
                        Some(split) => (&operand[..split], operand[split..].trim()),
                        None => (operand, ""),
                    };
                    let macro_name = require_identifier(macro_name, name, source_name, line_no)?;
                    trace!(source = source_name, name = macro_name, "define");
                    self.defines.insert(macro_name.to_string(), value.to_string());
                }
                "undef" => {
                    let macro_name = require_identifier(operand, name, source_name, line_no)?;
                    self.defines.remove(macro_name);
                }
                "include" => {
                    let target = include_target(operand).ok_or_else(|| {
                        PreprocessError::MalformedDirective {
                            message: format!("expected \"file\" or <file>, found '{operand}'"),
                            origin: source_name.to_string(),
                            line: line_no,
                        }
                    })?;
                    self.include(target, source_name, depth, out)?;
                    continue;
                }
                "" => {
                    // A bare `#` is a null directive.
                }
                other => {
                    return Err(PreprocessError::UnknownDirective {
                        directive: other.to_string(),
                        origin: source_name.to_string(),
                        line: line_no,
                    });
                }
            }
            out.push_str(LINE_SEPARATOR);
        }

        if let Some(open) = conditionals.last() {
            return Err(unbalanced(
                "conditional block is never closed with #endif",
                source_name,
                open.opened_at,
            ));
        }
        Ok(())
    }

    fn include(
        &mut self,
        target: &str,
        source_name: &str,
        depth: usize,
        out: &mut String,
    ) -> PreprocessResult<()> {
        if depth >= self.max_include_depth {
            return Err(PreprocessError::IncludeDepthExceeded {
                origin: source_name.to_string(),
                limit: self.max_include_depth,
            });
        }
        let path = self
            .search_path
            .resolve(target)
            .ok_or_else(|| PreprocessError::FileNotFound {
                name: target.to_string(),
                origin: source_name.to_string(),
            })?;
        debug!(source = source_name, include = %path.display(), "resolved include");
        let reader = BufReader::new(File::open(&path)?);
        self.process(reader, &path.display().to_string(), depth + 1, out)
    }

    /// Replace whole identifiers naming a macro with its value. String and
    /// character literals, numbers and comments are copied unchanged.
    /// `in_comment` carries an open `/* */` comment across lines.
    fn substitute(&self, text: &str, in_comment: &mut bool) -> String {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(ch) = rest.chars().next() {
            if *in_comment {
                match rest.find("*/") {
                    Some(end) => {
                        *in_comment = false;
                        result.push_str(&rest[..end + 2]);
                        rest = &rest[end + 2..];
                        continue;
                    }
                    None => {
                        result.push_str(rest);
                        break;
                    }
                }
            }

            let len = match ch {
                '"' | '\'' => quoted_len(rest, ch),
                '/' if rest.starts_with("//") => rest.len(),
                '/' if rest.starts_with("/*") => {
                    *in_comment = true;
                    2
                }
                // A pp-number such as `10L` or `0x1F` is one token.
                c if c.is_ascii_digit() => token_len(rest, |c| is_ident_part(c) || c == '.'),
                c if is_ident_start(c) => {
                    let len = token_len(rest, is_ident_part);
                    let ident = &rest[..len];
                    result.push_str(self.defines.get(ident).map_or(ident, String::as_str));
                    rest = &rest[len..];
                    continue;
                }
                c => c.len_utf8(),
            };
            result.push_str(&rest[..len]);
            rest = &rest[len..];
        }
        result
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Byte length of the leading run of characters matching `part`.
fn token_len(text: &str, part: impl Fn(char) -> bool) -> usize {
    text.char_indices()
        .find(|&(_, c)| !part(c))
        .map_or(text.len(), |(i, _)| i)
}

/// Byte length of a literal opened by `quote`, through its closing quote
/// or to the end of the line when unterminated.
fn quoted_len(text: &str, quote: char) -> usize {
    let mut escaped = false;
    for (i, c) in text.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return i + c.len_utf8();
        }
    }
    text.len()
}

/// Preprocess a string with a fresh [`Preprocessor`].
pub fn preprocess_str(text: &str, source_name: &str, search_path: &SearchPath) -> PreprocessResult<String> {
    Preprocessor::new(search_path).run(text.as_bytes(), source_name)
}

fn include_target(operand: &str) -> Option<&str> {
    let inner = operand
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| operand.strip_prefix('<').and_then(|rest| rest.strip_suffix('>')))?;
    (!inner.is_empty()).then_some(inner)
}

fn require_identifier<'s>(
    operand: &'s str,
    directive: &str,
    source_name: &str,
    line: usize,
) -> PreprocessResult<&'s str> {
    let mut chars = operand.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(operand)
    } else {
        Err(PreprocessError::MalformedDirective {
            message: format!("#{directive} expects a macro name, found '{operand}'"),
            origin: source_name.to_string(),
            line,
        })
    }
}

fn unbalanced(message: &str, source_name: &str, line: usize) -> PreprocessError {
    PreprocessError::UnbalancedConditional {
        message: message.to_string(),
        origin: source_name.to_string(),
        line,
    }
}
