//! Runtime configuration for the rendering pipeline.
//!
//! All knobs are externally supplied: the engine's RPC port and pid file,
//! temp-file cleanup, the template path cache, PDF compaction, and the
//! optional alternate delivery target. The configuration is a plain TOML
//! file; every key has a default so an empty file (or none at all) yields a
//! working setup.
//!
//! ```toml
//! port = 8090
//! pid_file = "rapport-engine.pid"
//! unlink = true
//! use_cache = true
//! cache_dir = "/var/cache/rapport"
//! sources_root = "/usr/share/reports"
//! compact_on_merge = false
//! delivery_target = "printer"
//! ```
//!
//! Environment variables prefixed `RAPPORT_` override file values, which
//! keeps deployments scriptable without editing the file:
//! `RAPPORT_PORT`, `RAPPORT_PID_FILE`, `RAPPORT_UNLINK`, `RAPPORT_USE_CACHE`,
//! `RAPPORT_CACHE_DIR`, `RAPPORT_SOURCES_ROOT`, `RAPPORT_COMPACT_ON_MERGE`,
//! `RAPPORT_DELIVERY_TARGET`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::error::ReportError;

const fn default_port() -> u16 {
    8090
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("rapport-engine.pid")
}

const fn default_true() -> bool {
    true
}

fn default_sources_root() -> PathBuf {
    PathBuf::from(".")
}

/// Pipeline configuration.
///
/// Cheap to clone; components hold their own copy rather than sharing a
/// global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Port the external rendering engine listens on for RPC calls.
    #[serde(default = "default_port")]
    pub port: u16,

    /// File the engine process records its process id in. Used to report a
    /// missing engine early; the pipeline never manages the process itself.
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Remove temporary data/output files after each render. Disable to
    /// inspect the engine's inputs when debugging a report.
    #[serde(default = "default_true")]
    pub unlink: bool,

    /// Reuse previously resolved template paths across requests.
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Persistent staging directory for resolved templates. When unset,
    /// each resolution allocates a fresh unique temporary directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Root directory of the original template sources, handed to the
    /// engine as its sources/standard directory.
    #[serde(default = "default_sources_root")]
    pub sources_root: PathBuf,

    /// Run the external PDF optimizer over merged documents.
    #[serde(default)]
    pub compact_on_merge: bool,

    /// Name of a registered delivery target that receives rendered
    /// documents instead of the caller. Unset means direct return.
    #[serde(default)]
    pub delivery_target: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            pid_file: default_pid_file(),
            unlink: true,
            use_cache: true,
            cache_dir: None,
            sources_root: default_sources_root(),
            compact_on_merge: false,
            delivery_target: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment
    /// overrides. A missing file yields the defaults.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let mut config = if path.is_file() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            toml::from_str(&raw).map_err(|e| ReportError::ConfigError {
                message: format!("{}: {e}", path.display()),
            })?
        } else {
            Self::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, no file involved.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("RAPPORT_PORT") {
            self.port = port.parse().map_err(|_| ReportError::ConfigError {
                message: format!("RAPPORT_PORT is not a port number: {port}"),
            })?;
        }
        if let Ok(pid) = std::env::var("RAPPORT_PID_FILE") {
            self.pid_file = PathBuf::from(pid);
        }
        if let Ok(v) = std::env::var("RAPPORT_UNLINK") {
            self.unlink = parse_bool("RAPPORT_UNLINK", &v)?;
        }
        if let Ok(v) = std::env::var("RAPPORT_USE_CACHE") {
            self.use_cache = parse_bool("RAPPORT_USE_CACHE", &v)?;
        }
        if let Ok(dir) = std::env::var("RAPPORT_CACHE_DIR") {
            self.cache_dir = if dir.is_empty() { None } else { Some(PathBuf::from(dir)) };
        }
        if let Ok(dir) = std::env::var("RAPPORT_SOURCES_ROOT") {
            self.sources_root = PathBuf::from(dir);
        }
        if let Ok(v) = std::env::var("RAPPORT_COMPACT_ON_MERGE") {
            self.compact_on_merge = parse_bool("RAPPORT_COMPACT_ON_MERGE", &v)?;
        }
        if let Ok(target) = std::env::var("RAPPORT_DELIVERY_TARGET") {
            self.delivery_target = if target.is_empty() { None } else { Some(target) };
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ReportError::ConfigError {
            message: format!("{key} is not a boolean: {other}"),
        }
        .into()),
    }
}
