//! Configuration loading
//!
//! `defaults/modelex.default.toml` is embedded into the binary so that the documented
//! defaults and runtime behavior stay in sync. User files and single-key overrides are
//! layered on top through [`Loader`] before deserializing into [`ModelexConfig`].

use crate::modelex::tokenizer::TokenizerOptions;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

const DEFAULT_TOML: &str = include_str!("../../defaults/modelex.default.toml");

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelexConfig {
    pub tokenizer: TokenizerOptions,
    pub modes: ModesConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModesConfig {
    /// Mode files registered after the built-in modes.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive.
    pub filter: String,
}

/// File name picked up from the working directory when no `--config` is given.
pub const LOCAL_CONFIG: &str = "modelex.toml";

/// Layers configuration sources over the embedded defaults, later sources winning.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    pub fn new() -> Self {
        Self {
            builder: Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml)),
        }
    }

    /// Layer a TOML file that must exist.
    pub fn with_file(self, path: impl AsRef<Path>) -> Self {
        self.add_file(path.as_ref(), true)
    }

    /// Layer a TOML file if it exists.
    pub fn with_optional_file(self, path: impl AsRef<Path>) -> Self {
        self.add_file(path.as_ref(), false)
    }

    /// Layer the explicit file when there is one, otherwise [`LOCAL_CONFIG`] in `dir` if
    /// present.
    pub fn with_user_file(self, explicit: Option<&Path>, dir: impl AsRef<Path>) -> Self {
        match explicit {
            Some(path) => self.with_file(path),
            None => self.with_optional_file(dir.as_ref().join(LOCAL_CONFIG)),
        }
    }

    /// Override one dotted key, e.g. `output.format`.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<ModelexConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }

    fn add_file(mut self, path: &Path, required: bool) -> Self {
        let source = File::from(path).format(FileFormat::Toml).required(required);
        self.builder = self.builder.add_source(source);
        self
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
