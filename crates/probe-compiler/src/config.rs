//! Layered configuration for the compiler and its command-line driver.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compiler::CompilerOptions;

/// Environment variable prefix, e.g. `PROBEC_INCLUDE_PATH`.
pub const ENV_PREFIX: &str = "PROBEC";

/// Complete compiler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Include search path, joined with the platform path separator.
    #[serde(default)]
    pub include_path: Option<String>,

    /// Produce packs rather than plain class artifacts.
    #[serde(default = "default_true")]
    pub generate_pack: bool,

    /// Extension of written artifacts, without the dot.
    #[serde(default = "default_pack_extension")]
    pub pack_extension: String,

    /// Run the safety verifier.
    #[serde(default = "default_true")]
    pub verify: bool,

    /// YAML rule table replacing the baseline policy.
    #[serde(default)]
    pub policy: Option<PathBuf>,

    /// YAML message overrides.
    #[serde(default)]
    pub messages: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            include_path: None,
            generate_pack: true,
            pack_extension: default_pack_extension(),
            verify: true,
            policy: None,
            messages: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_pack_extension() -> String {
    "class".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl CompilerConfig {
    /// Defaults, then the optional file, then `PROBEC_*` environment
    /// variables. Nested keys use a double underscore
    /// (`PROBEC_LOGGING__LEVEL`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&CompilerConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Construction options for a [`Compiler`](crate::Compiler).
    pub fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            include_path: self.include_path.clone(),
            generate_pack: self.generate_pack,
            pack_extension: self.pack_extension.clone(),
        }
    }
}
