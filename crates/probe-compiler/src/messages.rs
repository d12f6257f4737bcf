//! Message catalog for verifier diagnostics.
//!
//! The catalog is immutable once built. Defaults are embedded; an override
//! file (YAML mapping of key to text) may replace any of them. Missing keys
//! render as the key itself so a bad lookup never hides a diagnostic.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{CompileError, CompileResult};

const DEFAULTS: &[(&str, &str)] = &[
    ("no.loops", "loops are not allowed"),
    ("no.new.object", "object creation is not allowed"),
    ("no.throw", "throwing exceptions is not allowed"),
    ("no.synchronized.blocks", "synchronized blocks are not allowed"),
    ("no.assignment", "assignment to fields is not allowed"),
    ("no.nested.class", "nested classes are not allowed"),
    ("no.instance.members", "instance members are not allowed"),
    (
        "no.complex.unsafe.value",
        "the value of unsafe/trusted must be a boolean literal",
    ),
    ("policy.violation", "{0}: {1}"),
];

/// Keyed, parameterised diagnostic texts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageCatalog {
    entries: BTreeMap<String, String>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MessageCatalog {
    /// The embedded default texts.
    pub fn builtin() -> Self {
        Self {
            entries: DEFAULTS
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// Defaults overridden by a YAML mapping.
    pub fn from_yaml_str(text: &str) -> CompileResult<Self> {
        let overrides: BTreeMap<String, String> =
            serde_yaml::from_str(text).map_err(|e| CompileError::Messages(e.to_string()))?;
        let mut catalog = Self::builtin();
        catalog.entries.extend(overrides);
        Ok(catalog)
    }

    /// Defaults overridden by the YAML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> CompileResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| CompileError::Messages(format!("{}: {e}", path.display())))?;
        let catalog = Self::from_yaml_str(&text)?;
        debug!(path = %path.display(), entries = catalog.entries.len(), "Loaded message catalog");
        Ok(catalog)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Text for `key`, or the key itself when absent.
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.entries.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Text for `key` with `{0}`, `{1}`, ... replaced by `args`.
    /// Placeholders without a matching argument are left as written.
    pub fn format(&self, key: &str, args: &[&dyn Display]) -> String {
        let template = self.get(key);
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let arg = after.find('}').and_then(|close| {
                let index: usize = after[..close].parse().ok()?;
                Some((close, args.get(index)?))
            });
            match arg {
                Some((close, value)) => {
                    out.push_str(&value.to_string());
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_texts() {
        let catalog = MessageCatalog::builtin();
        assert_eq!(catalog.get("no.loops"), "loops are not allowed");
        assert!(catalog.contains("no.complex.unsafe.value"));
    }

    #[test]
    fn unknown_key_renders_as_key() {
        let catalog = MessageCatalog::builtin();
        assert_eq!(catalog.get("no.such.key"), "no.such.key");
    }

    #[test]
    fn positional_arguments() {
        let catalog = MessageCatalog::builtin();
        let text = catalog.format("policy.violation", &[&"p.Probe", &"loops are not allowed"]);
        assert_eq!(text, "p.Probe: loops are not allowed");
        let missing = catalog.format("policy.violation", &[&"p.Probe"]);
        assert_eq!(missing, "p.Probe: {1}");
    }

    #[test]
    fn overrides_replace_defaults() {
        let catalog = MessageCatalog::from_yaml_str("no.loops: \"keine Schleifen\"\n").unwrap();
        assert_eq!(catalog.get("no.loops"), "keine Schleifen");
        assert_eq!(catalog.get("no.throw"), "throwing exceptions is not allowed");
    }

    #[test]
    fn malformed_override_is_rejected() {
        let err = MessageCatalog::from_yaml_str("- just\n- a list\n").unwrap_err();
        assert!(matches!(err, CompileError::Messages(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.yaml");
        fs::write(&path, "no.throw: no throwing\n").unwrap();
        let catalog = MessageCatalog::load(&path).unwrap();
        assert_eq!(catalog.get("no.throw"), "no throwing");
        assert!(matches!(
            MessageCatalog::load(dir.path().join("absent.yaml")),
            Err(CompileError::Messages(_))
        ));
    }
}
