//! Factory configuration and attribute files
//!
//! Both are plain TOML. A factory config looks like:
//!
//! ```toml
//! [factory]
//! base_path = "qrc:/NodeLink/resources/View/"
//! ready_timeout_ms = 5000
//! poll_slice_ms = 10
//! compile_mode = "asynchronous"
//!
//! [roots]
//! "qrc:/NodeLink/resources/" = "./resources"
//! ```
//!
//! An attribute file supplies the two attribute roles, and optionally a batch:
//!
//! ```toml
//! [context]
//! heading = "Input"
//!
//! [direct]
//! color = "#ff8800"
//!
//! [batch]
//! key = "node"
//! values = [1, 2, 3]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use crate::engine::CompileMode;
use crate::gate::{DEFAULT_POLL_SLICE, DEFAULT_READY_TIMEOUT};
use crate::value::{AttributeSet, Value};

/// Where relative template identifiers are looked up by default
pub const DEFAULT_BASE_PATH: &str = "qrc:/NodeLink/resources/View/";

/// Errors that can occur when loading configuration files
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration options for a component factory
#[derive(Debug, Clone, PartialEq)]
pub struct FactoryConfig {
    /// Prefix joined to relative template identifiers
    pub base_path: String,

    /// How long to wait for a loading template before giving up
    pub ready_timeout: Duration,

    /// Longest single hand-off to the host event loop while waiting
    pub poll_slice: Duration,

    /// Compile mode requested from the engine
    pub compile_mode: CompileMode,

    /// URI prefix -> directory, for engines that read from disk
    pub roots: IndexMap<String, PathBuf>,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
            poll_slice: DEFAULT_POLL_SLICE,
            compile_mode: CompileMode::Asynchronous,
            roots: IndexMap::new(),
        }
    }
}

/// TOML structure for deserializing factory configs
#[derive(Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    factory: TomlFactory,
    #[serde(default)]
    roots: IndexMap<String, PathBuf>,
}

#[derive(Deserialize, Default)]
struct TomlFactory {
    base_path: Option<String>,
    ready_timeout_ms: Option<u64>,
    poll_slice_ms: Option<u64>,
    compile_mode: Option<CompileMode>,
}

impl FactoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_poll_slice(mut self, slice: Duration) -> Self {
        self.poll_slice = slice;
        self
    }

    pub fn with_compile_mode(mut self, mode: CompileMode) -> Self {
        self.compile_mode = mode;
        self
    }

    /// Map URIs starting with `prefix` to files under `dir`
    pub fn with_root(mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.roots.insert(prefix.into(), dir.into());
        self
    }

    /// Load a config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(content.as_str())
    }

    /// Parse a config from TOML text. Missing keys keep their defaults.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let parsed: TomlConfig = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(base_path) = parsed.factory.base_path {
            config.base_path = base_path;
        }
        if let Some(ms) = parsed.factory.ready_timeout_ms {
            config.ready_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed.factory.poll_slice_ms {
            if ms == 0 {
                return Err(ConfigError::Invalid("poll_slice_ms must be positive".to_string()));
            }
            config.poll_slice = Duration::from_millis(ms);
        }
        if let Some(mode) = parsed.factory.compile_mode {
            config.compile_mode = mode;
        }
        config.roots = parsed.roots;

        Ok(config)
    }
}

/// One batch request: every value becomes an instance, written under `key`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchSpec {
    pub key: String,
    pub values: Vec<Value>,
}

/// Attribute roles for a single instantiation, read from TOML
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AttributeFile {
    /// Written into the construction context before the object exists
    #[serde(default)]
    pub context: AttributeSet,

    /// Written onto the object before completion
    #[serde(default)]
    pub direct: AttributeSet,

    #[serde(default)]
    pub batch: Option<BatchSpec>,
}

impl AttributeFile {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(content.as_str())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
