//! Runtime configuration
//!
//! Read from a TOML file (`cudajit.toml` by default) and then overridden by
//! environment variables:
//!
//! | variable                 | field            |
//! |--------------------------|------------------|
//! | `CUDAJIT_DRIVER_VERSION` | `driver_version` |
//! | `CUDAJIT_DUMP_DIR`       | `dump_dir`       |
//! | `CUDAJIT_TRACE`          | `trace_api`      |

use crate::diagnostics::{Error, Result};
use crate::driver::ApiVersion;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "cudajit.toml";

pub const ENV_DRIVER_VERSION: &str = "CUDAJIT_DRIVER_VERSION";
pub const ENV_DUMP_DIR: &str = "CUDAJIT_DUMP_DIR";
pub const ENV_TRACE: &str = "CUDAJIT_TRACE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Skip version detection and build the symbol table for this version
    pub driver_version: Option<ApiVersion>,
    /// Directory for IR/assembly dumps of compiled kernels
    pub dump_dir: Option<PathBuf>,
    /// Log every driver call
    pub trace_api: bool,
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| Error::ConfigIo {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }

    /// Load `path` if given, else the default file if present, else defaults;
    /// then apply the process environment
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.with_overrides(std::env::vars())
    }

    /// Apply `CUDAJIT_*` variables from an environment listing
    pub fn with_overrides<I, K, V>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                ENV_DRIVER_VERSION => self.driver_version = Some(value.parse()?),
                ENV_DUMP_DIR if value.is_empty() => self.dump_dir = None,
                ENV_DUMP_DIR => self.dump_dir = Some(PathBuf::from(value)),
                ENV_TRACE => self.trace_api = parse_flag(value),
                _ => {}
            }
        }
        Ok(self)
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}
